//! Shared application state: the write side, the read side and the
//! projector pool that links them.

use std::sync::Arc;

use domain::{BusPublisher, SubmissionService};
use event_bus::{EventBus, InMemoryEventBus};
use event_store::EventStore;
use projections::{
    DeadLetterQueue, Dispatcher, EventProjector, InMemoryReadStore, ProjectionProcessor,
    ProjectorPool, QueryService,
};

use crate::config::Config;

pub struct AppState<S: EventStore> {
    pub service: SubmissionService<S>,
    pub queries: QueryService<InMemoryReadStore>,
    pub projector: Arc<EventProjector<InMemoryReadStore>>,
    pub processor: ProjectionProcessor<S>,
    pub dispatcher: Dispatcher,
    pub dead_letters: DeadLetterQueue,
}

impl<S: EventStore + Clone + 'static> AppState<S> {
    /// Wires commands through the bus into a projector pool.
    ///
    /// Returns the pool separately so the caller can drain it on shutdown.
    pub fn build(event_store: S, config: &Config) -> (Arc<Self>, ProjectorPool) {
        let bus = InMemoryEventBus::new();
        let service = SubmissionService::new(event_store.clone())
            .with_publisher(Arc::new(BusPublisher::new(bus.clone())));

        let read_store = InMemoryReadStore::new();
        let projector = Arc::new(EventProjector::new(read_store.clone()));

        let pool = ProjectorPool::start(projector.clone(), config.worker_config());
        let dispatcher = pool.dispatcher();
        dispatcher.forward(bus.subscribe());

        let mut processor = ProjectionProcessor::new(event_store);
        processor.register(projector.clone());

        let state = Arc::new(Self {
            service,
            queries: QueryService::new(read_store).with_timeout(config.query_timeout),
            projector,
            processor,
            dispatcher,
            dead_letters: pool.dead_letters().clone(),
        });

        (state, pool)
    }
}
