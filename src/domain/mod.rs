//! Domain layer: entities, value objects, and repository traits.

pub mod error;
pub mod gate;
pub mod payment;
pub mod repositories;
pub mod slot;
pub mod transaction;
pub mod user;
pub mod vehicle;

pub use error::{DomainError, DomainResult};
pub use gate::{Gate, GateRepository, GateRole};
pub use payment::{Payment, PaymentMethod, PaymentRepository, PaymentStatus};
pub use repositories::RepositoryProvider;
pub use slot::{Slot, SlotRepository};
pub use transaction::{ParkingTransaction, TransactionRepository};
pub use user::{User, UserRepository};
pub use vehicle::Vehicle;
