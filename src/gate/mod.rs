//! Gate Node: the edge process at a physical entry/exit.
//!
//! Local-first: the UI talks only to the local API, which applies changes to
//! the local store and queues events; two background workers reconcile with
//! the Cloud (snapshot pull + queue drain) and a WebSocket client carries
//! the realtime channel.

pub mod api;
pub mod cloud_client;
pub mod entities;
pub mod migrator;
pub mod reconciler;
pub mod store;
pub mod ws_client;

pub use api::{create_gate_router, GateState};
pub use cloud_client::{CloudCallError, CloudClient};
pub use store::{GateLocalStore, QueuedEvent};
pub use ws_client::{start_ws_client, WsHandle};
