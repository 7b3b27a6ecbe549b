//! # Parkwatch
//!
//! Distributed parking-lot control plane. A central Cloud coordinator owns
//! the authoritative slot/vehicle/transaction/payment state; Gate Nodes at
//! the physical entries keep admitting and releasing vehicles while offline
//! and reconcile through a durable event queue and periodic snapshots.
//!
//! ## Architecture
//!
//! - **support**: Cross-cutting utilities (errors, shutdown, the yard clock)
//! - **domain**: Core entities, repository traits, and value objects
//! - **application**: Mutation engine, reservation registry, fee/payment
//!   services, event bus, gate session registry
//! - **infrastructure**: External concerns (database, image storage)
//! - **interfaces**: Delivery mechanisms (Cloud HTTP REST + gate WebSocket)
//! - **gate**: The Gate Node (local store, local API, reconciler, WS client)
//! - **config**: Application configuration (TOML-based for the Cloud,
//!   env + `config.json` for the Gate)

pub mod application;
pub mod config;
pub mod domain;
pub mod gate;
pub mod infrastructure;
pub mod interfaces;
pub mod support;

// Re-export commonly used types at crate root
pub use application::events::{BusMessage, EventBus, SharedEventBus};
pub use config::{default_config_path, AppConfig, GateConfig};
pub use infrastructure::{init_database, DatabaseConfig, SeaOrmRepositoryProvider};
pub use interfaces::http::create_api_router;
