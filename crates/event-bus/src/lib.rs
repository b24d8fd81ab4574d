//! Publish/subscribe transport for committed submission events.
//!
//! Delivery is at-least-once with no ordering guarantee across submissions.
//! Consumers must be idempotent on [`EventId`](event_store::EventId).

mod bus;
mod error;
mod memory;

pub use bus::{EventBus, Subscription};
pub use error::{BusError, Result};
pub use memory::InMemoryEventBus;
