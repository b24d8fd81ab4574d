//! Read side of the thesis submission workflow.
//!
//! This crate provides the query side of the CQRS pattern:
//! - [`EventProjector`], which keeps an event log and a current-state view
//!   idempotently, whatever the delivery order
//! - [`ProjectorPool`], which feeds the projector from the bus, one partition
//!   per worker, with retries and a dead-letter queue
//! - [`ProjectionProcessor`] for catch-up and rebuild from the event store
//! - [`QueryService`] for current state, paginated history and per-user listings

pub mod adapter;
pub mod error;
pub mod labels;
pub mod processor;
pub mod projection;
pub mod projector;
pub mod query;
pub mod read_store;
pub mod views;
pub mod worker;

pub use adapter::{ProjectedChange, adapt};
pub use error::{ProjectionError, Result};
pub use labels::{StateLabels, UNKNOWN_STATE, estado_legible, labels_for, siguiente_paso};
pub use processor::{CatchUpReport, ProjectionProcessor};
pub use projection::{ApplyOutcome, Projection};
pub use projector::{EventProjector, ProjectorStats};
pub use query::{
    DEFAULT_IDENTITY_TIMEOUT, HistoryPage, HistoryQuery, MAX_PAGE_SIZE, PageRequest, PersonDto,
    QueryService, SubjectRole, SubmissionStateDto, SubmissionSummary,
};
pub use read_store::{CommitOutcome, InMemoryReadStore, ReadModelStore};
pub use views::{CurrentStateRow, EventLogRow};
pub use worker::{
    DEFAULT_DEAD_LETTER_CAPACITY, DeadLetter, DeadLetterQueue, Dispatcher, ProjectorPool,
    WorkerConfig,
};
