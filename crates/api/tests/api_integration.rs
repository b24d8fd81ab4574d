//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use api::{AppState, Config};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Actor, ActorRole};
use domain::{
    ArtifactRef, CreateSubmission, EvaluateFormatoA, Modality, Participant, Participants,
    PresentFormatoA,
};
use event_store::InMemoryEventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::ProjectorPool;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn test_config() -> Config {
    Config {
        projector_workers: 2,
        projector_retry_backoff: Duration::from_millis(1),
        ..Config::default()
    }
}

fn setup() -> (
    axum::Router,
    Arc<AppState<InMemoryEventStore>>,
    ProjectorPool,
) {
    let (state, pool) = api::create_default_state(InMemoryEventStore::new(), &test_config());
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state, pool)
}

fn director() -> Actor {
    Actor::new(1, "Carlos Pérez", ActorRole::Director)
}

/// Waits until the projector has applied `count` envelopes and the pool is idle.
async fn wait_for_applied(state: &AppState<InMemoryEventStore>, pool: &ProjectorPool, count: u64) {
    for _ in 0..400 {
        if state.projector.stats().applied >= count && pool.in_flight() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("projector did not apply {count} envelopes in time");
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn approve_formato_a(state: &AppState<InMemoryEventStore>) -> common::SubmissionId {
    let cmd = CreateSubmission::new(
        director(),
        "Detección de plagas con visión artificial",
        Modality::Investigacion,
        Participants::new(
            Participant::new(1, "Carlos Pérez"),
            Participant::new(10, "Ana Torres"),
        ),
        ArtifactRef::new("mem://1/formato_a.pdf"),
    );
    let id = cmd.submission_id;
    state.service.create_submission(cmd).await.unwrap();
    state
        .service
        .present_formato_a(PresentFormatoA::new(id, director()))
        .await
        .unwrap();
    state
        .service
        .evaluate_formato_a(EvaluateFormatoA::new(
            id,
            Actor::new(50, "Coordinación de programa", ActorRole::Coordinator),
            true,
        ))
        .await
        .unwrap();
    id
}

#[tokio::test]
async fn test_health_check() {
    let (app, _state, _pool) = setup();

    let (status, json) = get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["projector"]["applied"], 0);
    assert_eq!(json["in_flight"], 0);
    assert_eq!(json["dead_letters"], 0);
    assert_eq!(json["dead_letters_evicted"], 0);
}

#[tokio::test]
async fn test_commands_reach_the_read_side() {
    let (app, state, pool) = setup();

    let id = approve_formato_a(&state).await;
    wait_for_applied(&state, &pool, 3).await;

    let view = state.queries.get_current_state(id).await.unwrap().unwrap();
    assert_eq!(view.state, "FormatoAApproved");

    let (status, json) = get_json(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["projector"]["applied"], 3);
    assert_eq!(json["dead_letters"], 0);
}

#[tokio::test]
async fn test_catch_up_after_live_delivery_finds_only_duplicates() {
    let (_app, state, pool) = setup();

    approve_formato_a(&state).await;
    wait_for_applied(&state, &pool, 3).await;

    let report = state.processor.run_catch_up().await.unwrap();
    assert_eq!(report.events_read, 3);
    assert_eq!(report.applied, 0);
    assert_eq!(report.duplicates, 3);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, state, pool) = setup();

    approve_formato_a(&state).await;
    wait_for_applied(&state, &pool, 3).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("submission_commands_total"));
    assert!(text.contains("projector_events_applied_total"));
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let (app, _state, _pool) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/orders")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pool_shuts_down_cleanly() {
    let (_app, state, pool) = setup();

    approve_formato_a(&state).await;
    wait_for_applied(&state, &pool, 3).await;
    pool.shutdown().await;

    assert!(state.dead_letters.is_empty());
}
