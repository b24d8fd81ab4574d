//! Errors that stop the server from starting or running.

use event_store::EventStoreError;
use projections::ProjectionError;

/// Startup and serving failures.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("failed to connect to the database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("projection catch-up failed: {0}")]
    CatchUp(#[from] ProjectionError),

    #[error("failed to install metrics recorder: {0}")]
    Metrics(String),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ApiError>;
