mod event_bus;
mod types;

pub use event_bus::{EventBus, EventSubscriber, SharedEventBus};
pub use types::BusMessage;
