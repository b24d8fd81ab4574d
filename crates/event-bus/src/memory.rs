use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use event_store::EventEnvelope;
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::{BusError, EventBus, Result, Subscription};

#[derive(Debug, Default)]
struct BusState {
    subscribers: Vec<UnboundedSender<EventEnvelope>>,
    deliveries_per_publish: usize,
    fail_on_publish: bool,
    published: u64,
}

/// In-process fan-out bus.
///
/// Every subscriber receives its own copy of each envelope. Redelivery can be
/// forced with [`InMemoryEventBus::set_duplicate_deliveries`] to exercise
/// idempotent consumers.
#[derive(Debug, Clone)]
pub struct InMemoryEventBus {
    state: Arc<RwLock<BusState>>,
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(BusState {
                deliveries_per_publish: 1,
                ..BusState::default()
            })),
        }
    }

    /// Delivers every published envelope `copies` times to each subscriber.
    pub fn set_duplicate_deliveries(&self, copies: usize) {
        self.state.write().unwrap().deliveries_per_publish = copies.max(1);
    }

    /// Makes every publish fail until reset.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().unwrap().fail_on_publish = fail;
    }

    /// Number of envelopes accepted so far.
    pub fn published_count(&self) -> u64 {
        self.state.read().unwrap().published
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.state
            .read()
            .unwrap()
            .subscribers
            .iter()
            .filter(|s| !s.is_closed())
            .count()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, envelope: EventEnvelope) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_publish {
            return Err(BusError::Publish("publishing disabled".to_string()));
        }

        let copies = state.deliveries_per_publish;
        state.subscribers.retain(|subscriber| {
            (0..copies).all(|_| subscriber.send(envelope.clone()).is_ok())
        });
        state.published += 1;

        tracing::trace!(
            event_id = %envelope.event_id,
            event_type = %envelope.event_type,
            subscribers = state.subscribers.len(),
            "published envelope"
        );
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.write().unwrap().subscribers.push(tx);
        Subscription::new(rx)
    }
}
