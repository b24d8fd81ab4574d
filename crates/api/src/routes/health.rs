//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use event_store::EventStore;
use projections::ProjectorStats;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub projector: ProjectorStats,
    pub in_flight: u64,
    pub dead_letters: usize,
    pub dead_letters_evicted: u64,
}

/// GET /health: liveness plus read-side progress.
///
/// Reports `degraded` while anything sits in the dead-letter queue.
pub async fn check<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    let dead_letters = state.dead_letters.len();
    Json(HealthResponse {
        status: if dead_letters == 0 { "ok" } else { "degraded" },
        projector: state.projector.stats(),
        in_flight: state.dispatcher.in_flight(),
        dead_letters,
        dead_letters_evicted: state.dead_letters.evicted(),
    })
}
