use common::{Actor, ActorRole, SubmissionId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    Aggregate, ArtifactRef, CreateSubmission, EvaluateFormatoA, Modality, Participant,
    Participants, PresentFormatoA, Submission, SubmissionEvent, SubmissionService,
};
use event_store::{AppendOptions, EventEnvelope, InMemoryEventStore, Version, store::EventStore};

fn coordinator() -> Actor {
    Actor::new(50, "Coordinación", ActorRole::Coordinator)
}

fn director() -> Actor {
    Actor::new(1, "Carlos Pérez", ActorRole::Director)
}

fn participants() -> Participants {
    Participants::new(
        Participant::new(1, "Carlos Pérez"),
        Participant::new(10, "Ana Torres"),
    )
}

fn create_command() -> CreateSubmission {
    CreateSubmission::new(
        director(),
        "Detección de plagas con visión artificial",
        Modality::Investigacion,
        participants(),
        ArtifactRef::new("mem://1/formato_a.pdf"),
    )
}

fn make_envelope(submission_id: SubmissionId, sequence: i64, event: &SubmissionEvent) -> EventEnvelope {
    EventEnvelope::builder()
        .submission_id(submission_id)
        .aggregate_type("Submission")
        .event_type(domain::DomainEvent::event_type(event))
        .sequence(Version::new(sequence))
        .actor(director())
        .payload(event)
        .unwrap()
        .build()
}

/// Create, present, reject, then `resubmits` corrected documents.
fn populate(rt: &tokio::runtime::Runtime, store: &InMemoryEventStore, resubmits: i64) -> SubmissionId {
    let submission_id = SubmissionId::new();

    rt.block_on(async {
        let mut events = vec![
            make_envelope(
                submission_id,
                1,
                &SubmissionEvent::submission_created(
                    submission_id,
                    "Detección de plagas",
                    Modality::Investigacion,
                    participants(),
                    ArtifactRef::new("mem://1/fa.pdf"),
                    None,
                ),
            ),
            make_envelope(submission_id, 2, &SubmissionEvent::formato_a_presented(1)),
            make_envelope(
                submission_id,
                3,
                &SubmissionEvent::formato_a_evaluated(false, 2, None, false),
            ),
        ];
        for sequence in 4..4 + resubmits {
            let artifact = ArtifactRef::new(format!("mem://{sequence}/fa.pdf"));
            events.push(make_envelope(
                submission_id,
                sequence,
                &SubmissionEvent::formato_a_resubmitted(2, artifact),
            ));
        }
        store.append(events, AppendOptions::new()).await.unwrap();
    });

    submission_id
}

fn bench_create_submission(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/create_submission", |b| {
        b.iter(|| {
            rt.block_on(async {
                let service = SubmissionService::new(InMemoryEventStore::new());
                service.create_submission(create_command()).await.unwrap();
            });
        });
    });
}

fn bench_formato_a_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/create_present_approve", |b| {
        b.iter(|| {
            rt.block_on(async {
                let service = SubmissionService::new(InMemoryEventStore::new());
                let cmd = create_command();
                let submission_id = cmd.submission_id;
                service.create_submission(cmd).await.unwrap();

                service
                    .present_formato_a(PresentFormatoA::new(submission_id, director()))
                    .await
                    .unwrap();

                service
                    .evaluate_formato_a(EvaluateFormatoA::new(submission_id, coordinator(), true))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_reconstruction(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let submission_id = populate(&rt, &store, 47);

    c.bench_function("domain/reconstruct_50_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                let events = store.get_events(submission_id).await.unwrap();
                let mut submission = Submission::default();
                for event in &events {
                    let domain_event: SubmissionEvent =
                        serde_json::from_value(event.payload.clone()).unwrap();
                    submission.apply(domain_event);
                }
            });
        });
    });
}

fn bench_load_through_handler(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let submission_id = populate(&rt, &store, 97);
    let service = SubmissionService::new(store);

    c.bench_function("domain/load_100_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                service.get_submission(submission_id).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_create_submission,
    bench_formato_a_cycle,
    bench_reconstruction,
    bench_load_through_handler,
);
criterion_main!(benches);
