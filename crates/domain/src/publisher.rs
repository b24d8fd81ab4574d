//! Hand-off of committed events to the outside world.

use async_trait::async_trait;
use event_bus::{BusError, EventBus};
use event_store::EventEnvelope;
use thiserror::Error;

/// Failure to hand an event to the transport.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),
}

/// Receives events after they have been durably appended.
///
/// Implementations are never called for events whose append failed.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, envelope: &EventEnvelope) -> Result<(), PublishError>;
}

/// Publisher that drops everything. Used when no consumers are attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, _envelope: &EventEnvelope) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Publishes onto an [`EventBus`].
#[derive(Debug, Clone)]
pub struct BusPublisher<B> {
    bus: B,
}

impl<B: EventBus> BusPublisher<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

#[async_trait]
impl<B: EventBus> EventPublisher for BusPublisher<B> {
    async fn publish(&self, envelope: &EventEnvelope) -> Result<(), PublishError> {
        self.bus.publish(envelope.clone()).await?;
        Ok(())
    }
}
