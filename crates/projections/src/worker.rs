//! Partitioned worker pool feeding a projection from the event bus.
//!
//! Envelopes are routed by submission id, so every event of one submission is
//! applied by the same worker, one at a time. Different submissions proceed in
//! parallel. Transient failures are retried with linear backoff; envelopes that
//! still fail, or fail permanently, are parked in a dead-letter queue and the
//! worker moves on.

use std::collections::VecDeque;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use common::SubmissionId;
use event_bus::Subscription;
use event_store::EventEnvelope;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::projection::Projection;
use crate::{ProjectionError, Result};

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of partitions, one worker each.
    pub workers: usize,
    /// Attempts per envelope before it is dead-lettered.
    pub max_attempts: u32,
    /// Delay before the first retry; later retries wait a multiple of it.
    pub retry_backoff: Duration,
    /// Dead letters kept before the oldest are evicted.
    pub dead_letter_capacity: usize,
}

pub const DEFAULT_DEAD_LETTER_CAPACITY: usize = 10_000;

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_attempts: 3,
            retry_backoff: Duration::from_millis(50),
            dead_letter_capacity: DEFAULT_DEAD_LETTER_CAPACITY,
        }
    }
}

impl WorkerConfig {
    /// Delay after failed attempt `attempt` (1-based).
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        self.retry_backoff * attempt
    }
}

/// Partition that owns `submission_id` among `partitions` workers.
pub fn partition_for(submission_id: SubmissionId, partitions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    submission_id.hash(&mut hasher);
    (hasher.finish() % partitions.max(1) as u64) as usize
}

/// An envelope the pool gave up on.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub envelope: EventEnvelope,
    pub error: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

/// Shared, bounded list of dead letters.
///
/// Once `capacity` letters are held, each new one evicts the oldest. The
/// size is published as the `projector_dead_letter_queue_size` gauge.
#[derive(Debug, Clone)]
pub struct DeadLetterQueue {
    entries: Arc<Mutex<VecDeque<DeadLetter>>>,
    capacity: usize,
    evicted: Arc<AtomicU64>,
}

impl Default for DeadLetterQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_DEAD_LETTER_CAPACITY)
    }
}

impl DeadLetterQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
            evicted: Arc::new(AtomicU64::new(0)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<DeadLetter>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, letter: DeadLetter) {
        let mut entries = self.lock();
        while entries.len() >= self.capacity {
            if let Some(dropped) = entries.pop_front() {
                self.evicted.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("projector_dead_letters_evicted_total").increment(1);
                tracing::warn!(
                    event_id = %dropped.envelope.event_id,
                    "dead-letter queue full, oldest letter evicted"
                );
            }
        }
        entries.push_back(letter);
        metrics::gauge!("projector_dead_letter_queue_size").set(entries.len() as f64);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Letters dropped because the queue was full.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Oldest first.
    pub fn entries(&self) -> Vec<DeadLetter> {
        self.lock().iter().cloned().collect()
    }

    /// Removes and returns every dead letter, e.g. to replay them.
    pub fn drain(&self) -> Vec<DeadLetter> {
        let mut entries = self.lock();
        let drained = entries.drain(..).collect();
        metrics::gauge!("projector_dead_letter_queue_size").set(0.0);
        drained
    }
}

enum Job {
    Apply(EventEnvelope),
    Stop,
}

#[derive(Debug, Default)]
struct Progress {
    dispatched: AtomicU64,
    completed: AtomicU64,
}

/// Routes envelopes to the worker that owns their submission.
#[derive(Clone)]
pub struct Dispatcher {
    senders: Arc<Vec<UnboundedSender<Job>>>,
    progress: Arc<Progress>,
}

impl Dispatcher {
    pub fn partitions(&self) -> usize {
        self.senders.len()
    }

    pub fn partition_for(&self, submission_id: SubmissionId) -> usize {
        partition_for(submission_id, self.senders.len())
    }

    /// Queues an envelope on its partition.
    pub fn dispatch(&self, envelope: EventEnvelope) -> Result<()> {
        let partition = self.partition_for(envelope.submission_id);
        self.progress.dispatched.fetch_add(1, Ordering::SeqCst);
        if self.senders[partition].send(Job::Apply(envelope)).is_err() {
            self.progress.dispatched.fetch_sub(1, Ordering::SeqCst);
            return Err(ProjectionError::PoolClosed);
        }
        Ok(())
    }

    /// Envelopes queued or being applied right now.
    pub fn in_flight(&self) -> u64 {
        self.progress
            .dispatched
            .load(Ordering::SeqCst)
            .saturating_sub(self.progress.completed.load(Ordering::SeqCst))
    }

    /// Spawns a task that dispatches everything arriving on `subscription`.
    ///
    /// The task ends when the bus goes away or the pool shuts down.
    pub fn forward(&self, mut subscription: Subscription) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            while let Some(envelope) = subscription.recv().await {
                if dispatcher.dispatch(envelope).is_err() {
                    break;
                }
            }
            tracing::debug!("bus forwarding stopped");
        })
    }
}

/// A running set of projector workers.
pub struct ProjectorPool {
    dispatcher: Dispatcher,
    handles: Vec<JoinHandle<()>>,
    dead_letters: DeadLetterQueue,
}

impl ProjectorPool {
    /// Starts `config.workers` workers applying envelopes to `projection`.
    pub fn start(projection: Arc<dyn Projection>, config: WorkerConfig) -> Self {
        let workers = config.workers.max(1);
        let dead_letters = DeadLetterQueue::with_capacity(config.dead_letter_capacity);
        let progress = Arc::new(Progress::default());

        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.push(tx);
            handles.push(tokio::spawn(run_worker(
                index,
                rx,
                Arc::clone(&projection),
                config.clone(),
                dead_letters.clone(),
                Arc::clone(&progress),
            )));
        }

        tracing::info!(
            workers,
            projection = projection.name(),
            max_attempts = config.max_attempts,
            "projector pool started"
        );

        Self {
            dispatcher: Dispatcher {
                senders: Arc::new(senders),
                progress,
            },
            handles,
            dead_letters,
        }
    }

    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    pub fn dispatch(&self, envelope: EventEnvelope) -> Result<()> {
        self.dispatcher.dispatch(envelope)
    }

    pub fn dead_letters(&self) -> &DeadLetterQueue {
        &self.dead_letters
    }

    pub fn in_flight(&self) -> u64 {
        self.dispatcher.in_flight()
    }

    /// Envelopes fully handled, including dead-lettered ones.
    pub fn completed(&self) -> u64 {
        self.dispatcher.progress.completed.load(Ordering::SeqCst)
    }

    /// Waits until nothing is in flight. Returns false if `limit` passes first.
    pub async fn wait_idle(&self, limit: Duration) -> bool {
        let started = Instant::now();
        while self.in_flight() > 0 {
            if started.elapsed() >= limit {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        true
    }

    /// Lets every worker finish its queue, then stops it.
    pub async fn shutdown(self) {
        for sender in self.dispatcher.senders.iter() {
            let _ = sender.send(Job::Stop);
        }
        for handle in self.handles {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "projector worker panicked");
            }
        }
        tracing::info!("projector pool stopped");
    }
}

async fn run_worker(
    index: usize,
    mut jobs: UnboundedReceiver<Job>,
    projection: Arc<dyn Projection>,
    config: WorkerConfig,
    dead_letters: DeadLetterQueue,
    progress: Arc<Progress>,
) {
    while let Some(job) = jobs.recv().await {
        match job {
            Job::Apply(envelope) => {
                process(index, projection.as_ref(), &config, &dead_letters, envelope).await;
                progress.completed.fetch_add(1, Ordering::SeqCst);
            }
            Job::Stop => break,
        }
    }
    tracing::debug!(worker = index, "projector worker stopped");
}

#[tracing::instrument(
    skip(projection, config, dead_letters, envelope),
    fields(
        submission_id = %envelope.submission_id,
        event_type = %envelope.event_type,
        sequence = %envelope.sequence,
    )
)]
async fn process(
    worker: usize,
    projection: &dyn Projection,
    config: &WorkerConfig,
    dead_letters: &DeadLetterQueue,
    envelope: EventEnvelope,
) {
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match projection.handle(&envelope).await {
            Ok(outcome) => {
                tracing::trace!(%outcome, attempt, "envelope handled");
                return;
            }
            Err(err) if err.is_transient() && attempt < max_attempts => {
                tracing::warn!(attempt, error = %err, "apply failed, retrying");
                tokio::time::sleep(config.backoff_for_attempt(attempt)).await;
                attempt += 1;
            }
            Err(err) => {
                tracing::error!(attempt, error = %err, "envelope dead-lettered");
                metrics::counter!("projector_dead_letters_total").increment(1);
                dead_letters.push(DeadLetter {
                    envelope,
                    error: err.to_string(),
                    attempts: attempt,
                    failed_at: Utc::now(),
                });
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::ApplyOutcome;
    use async_trait::async_trait;
    use common::Actor;
    use event_store::Version;

    /// Records handled envelopes; fails the first `failures` calls per event.
    struct ScriptedProjection {
        failures: u32,
        permanent: bool,
        calls: Mutex<Vec<EventEnvelope>>,
        seen: Mutex<std::collections::HashMap<event_store::EventId, u32>>,
    }

    impl ScriptedProjection {
        fn new(failures: u32, permanent: bool) -> Self {
            Self {
                failures,
                permanent,
                calls: Mutex::new(Vec::new()),
                seen: Mutex::new(std::collections::HashMap::new()),
            }
        }

        fn handled(&self) -> Vec<EventEnvelope> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Projection for ScriptedProjection {
        fn name(&self) -> &'static str {
            "ScriptedProjection"
        }

        async fn handle(&self, event: &EventEnvelope) -> Result<ApplyOutcome> {
            let attempt = {
                let mut seen = self.seen.lock().unwrap();
                let count = seen.entry(event.event_id).or_insert(0);
                *count += 1;
                *count
            };
            if attempt <= self.failures {
                if self.permanent {
                    let bad = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
                    return Err(ProjectionError::Deserialization(bad));
                }
                return Err(ProjectionError::Apply("flaky".to_string()));
            }
            self.calls.lock().unwrap().push(event.clone());
            Ok(ApplyOutcome::Applied)
        }

        async fn reset(&self) -> Result<()> {
            Ok(())
        }
    }

    fn envelope(submission_id: SubmissionId, sequence: i64) -> EventEnvelope {
        EventEnvelope::builder()
            .submission_id(submission_id)
            .aggregate_type("Submission")
            .event_type("FormatoAPresented")
            .sequence(Version::new(sequence))
            .actor(Actor::system())
            .payload_raw(serde_json::json!({}))
            .build()
    }

    fn fast(workers: usize, max_attempts: u32) -> WorkerConfig {
        WorkerConfig {
            workers,
            max_attempts,
            retry_backoff: Duration::from_millis(1),
            dead_letter_capacity: 16,
        }
    }

    fn letter(sequence: i64) -> DeadLetter {
        DeadLetter {
            envelope: envelope(SubmissionId::new(), sequence),
            error: "flaky".to_string(),
            attempts: 3,
            failed_at: Utc::now(),
        }
    }

    #[test]
    fn dead_letter_queue_evicts_oldest_when_full() {
        let queue = DeadLetterQueue::with_capacity(2);
        for sequence in 1..=3 {
            queue.push(letter(sequence));
        }

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.capacity(), 2);
        assert_eq!(queue.evicted(), 1);
        let sequences: Vec<i64> = queue
            .entries()
            .iter()
            .map(|l| l.envelope.sequence.as_i64())
            .collect();
        assert_eq!(sequences, vec![2, 3]);

        assert_eq!(queue.drain().len(), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.evicted(), 1);
    }

    #[tokio::test]
    async fn pool_caps_its_dead_letters() {
        let projection = Arc::new(ScriptedProjection::new(1, true));
        let config = WorkerConfig {
            dead_letter_capacity: 2,
            ..fast(1, 1)
        };
        let pool = ProjectorPool::start(projection, config);

        for sequence in 1..=5 {
            pool.dispatch(envelope(SubmissionId::new(), sequence)).unwrap();
        }
        assert!(pool.wait_idle(Duration::from_secs(5)).await);

        assert_eq!(pool.dead_letters().len(), 2);
        assert_eq!(pool.dead_letters().evicted(), 3);
        pool.shutdown().await;
    }

    #[test]
    fn partition_is_stable() {
        let id = SubmissionId::new();
        let first = partition_for(id, 8);
        assert!(first < 8);
        assert_eq!(partition_for(id, 8), first);
        assert_eq!(partition_for(id, 1), 0);
    }

    #[test]
    fn backoff_grows_linearly() {
        let config = WorkerConfig {
            retry_backoff: Duration::from_millis(10),
            ..WorkerConfig::default()
        };
        assert_eq!(config.backoff_for_attempt(1), Duration::from_millis(10));
        assert_eq!(config.backoff_for_attempt(3), Duration::from_millis(30));
    }

    #[tokio::test]
    async fn one_submission_is_applied_in_dispatch_order() {
        let projection = Arc::new(ScriptedProjection::new(0, false));
        let pool = ProjectorPool::start(projection.clone(), fast(4, 3));
        let id = SubmissionId::new();

        for sequence in 1..=20 {
            pool.dispatch(envelope(id, sequence)).unwrap();
        }
        assert!(pool.wait_idle(Duration::from_secs(5)).await);

        let sequences: Vec<i64> = projection
            .handled()
            .iter()
            .map(|e| e.sequence.as_i64())
            .collect();
        assert_eq!(sequences, (1..=20).collect::<Vec<_>>());
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let projection = Arc::new(ScriptedProjection::new(2, false));
        let pool = ProjectorPool::start(projection.clone(), fast(2, 3));

        pool.dispatch(envelope(SubmissionId::new(), 1)).unwrap();
        assert!(pool.wait_idle(Duration::from_secs(5)).await);

        assert_eq!(projection.handled().len(), 1);
        assert!(pool.dead_letters().is_empty());
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn exhausted_retries_dead_letter() {
        let projection = Arc::new(ScriptedProjection::new(5, false));
        let pool = ProjectorPool::start(projection.clone(), fast(2, 3));

        pool.dispatch(envelope(SubmissionId::new(), 1)).unwrap();
        assert!(pool.wait_idle(Duration::from_secs(5)).await);

        let letters = pool.dead_letters().entries();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].attempts, 3);
        assert!(projection.handled().is_empty());
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn permanent_failures_skip_retries() {
        let projection = Arc::new(ScriptedProjection::new(1, true));
        let pool = ProjectorPool::start(projection.clone(), fast(1, 5));

        pool.dispatch(envelope(SubmissionId::new(), 1)).unwrap();
        assert!(pool.wait_idle(Duration::from_secs(5)).await);

        let letters = pool.dead_letters().drain();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].attempts, 1);
        assert!(pool.dead_letters().is_empty());
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_drains_queues_then_rejects() {
        let projection = Arc::new(ScriptedProjection::new(0, false));
        let pool = ProjectorPool::start(projection.clone(), fast(2, 1));
        let dispatcher = pool.dispatcher();

        for _ in 0..10 {
            dispatcher.dispatch(envelope(SubmissionId::new(), 1)).unwrap();
        }
        pool.shutdown().await;

        assert_eq!(projection.handled().len(), 10);
        assert!(matches!(
            dispatcher.dispatch(envelope(SubmissionId::new(), 1)),
            Err(ProjectionError::PoolClosed)
        ));
    }
}
