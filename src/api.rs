//! The small HTTP surface. POST /ack is the dismissal path: whatever
//! fronts the human posts the task here once the alert has been seen,
//! which re-arms the poll gate.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::notify::Acknowledger;
use crate::task::SearchTask;

#[derive(Clone)]
pub struct ApiState {
    pub acknowledger: Acknowledger,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/ack", post(ack))
        .with_state(state)
}

#[derive(Deserialize)]
struct AckReq {
    query: String,
    location: String,
}

async fn ack(
    State(state): State<ApiState>,
    Json(body): Json<AckReq>,
) -> (StatusCode, &'static str) {
    let task = SearchTask::new(body.query, body.location);
    match state.acknowledger.acknowledge(&task).await {
        Ok(()) => (StatusCode::OK, "acknowledged"),
        Err(e) => {
            tracing::warn!(target: "api", error = ?e, "acknowledge failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "store unavailable")
        }
    }
}
