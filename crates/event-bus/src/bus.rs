use std::sync::Arc;

use async_trait::async_trait;
use event_store::EventEnvelope;
use tokio::sync::mpsc::{UnboundedReceiver, error::TryRecvError};

use crate::Result;

/// A subscription to the bus.
///
/// Every subscription sees every published envelope, possibly more than once.
#[derive(Debug)]
pub struct Subscription {
    receiver: UnboundedReceiver<EventEnvelope>,
}

impl Subscription {
    pub fn new(receiver: UnboundedReceiver<EventEnvelope>) -> Self {
        Self { receiver }
    }

    /// Waits for the next envelope. Returns None once the bus is dropped.
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        self.receiver.recv().await
    }

    /// Takes the next envelope if one is already queued.
    pub fn try_recv(&mut self) -> Option<EventEnvelope> {
        match self.receiver.try_recv() {
            Ok(envelope) => Some(envelope),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

/// Transport between the write side and its consumers.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Hands an envelope to the transport.
    async fn publish(&self, envelope: EventEnvelope) -> Result<()>;

    /// Opens a new subscription that receives everything published from now on.
    fn subscribe(&self) -> Subscription;
}

#[async_trait]
impl<B> EventBus for Arc<B>
where
    B: EventBus + ?Sized,
{
    async fn publish(&self, envelope: EventEnvelope) -> Result<()> {
        (**self).publish(envelope).await
    }

    fn subscribe(&self) -> Subscription {
        (**self).subscribe()
    }
}
