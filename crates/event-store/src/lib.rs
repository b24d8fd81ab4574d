//! Event store for the submission workflow.
//!
//! Every submission is one append-only stream of [`EventEnvelope`]s ordered
//! by a per-submission sequence ([`Version`]). Appends are guarded by an
//! expected version so concurrent writers cannot silently overwrite each other.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod snapshot;
pub mod store;

pub use common::{Actor, ActorRole, SubmissionId, UserId};
pub use error::{EventStoreError, Result};
pub use event::{CURRENT_SCHEMA_VERSION, EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use snapshot::Snapshot;
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream};
