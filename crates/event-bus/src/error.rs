use thiserror::Error;

/// Errors raised by event bus implementations.
#[derive(Debug, Error)]
pub enum BusError {
    /// The transport refused or lost the message.
    #[error("Publish failed: {0}")]
    Publish(String),
}

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;
