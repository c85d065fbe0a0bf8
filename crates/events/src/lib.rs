//! Domain events, their in-aggregate buffering, and pub/sub mechanics.

pub mod bus;
pub mod event;
pub mod handler;
pub mod in_memory_bus;
pub mod pending;

pub use bus::{EventBus, Subscription};
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use pending::PendingEvents;
