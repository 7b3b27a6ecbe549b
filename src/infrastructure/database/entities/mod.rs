pub mod gate;
pub mod payment;
pub mod processed_event;
pub mod slot;
pub mod transaction;
pub mod user;
pub mod vehicle;
