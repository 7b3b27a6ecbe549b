//! Application layer: use-case orchestration and in-process coordination.

pub mod events;
pub mod fees;
pub mod mutations;
pub mod payments;
pub mod reservations;
pub mod session;

pub use events::{BusMessage, EventBus, SharedEventBus};
pub use fees::{calc_fee, FeeQuote};
pub use mutations::{
    MutationEngine, VehicleInRequest, VehicleInResult, VehicleOutRequest, VehicleOutResult,
};
pub use payments::PaymentService;
pub use reservations::{ReservationRegistry, SharedReservationRegistry};
pub use session::{GateSessionRegistry, SharedGateSessionRegistry};
