//! HTTP intake.
//!
//! `POST /` (and `/api/v1/build`) accepts a build request, checks the shared
//! secret, schedules the pipeline and answers 200 straight away. Nothing the
//! pipeline does afterwards can change that response.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::error::IntakeError;
use crate::model::TaskPayload;
use crate::pipeline::Pipeline;

pub struct AppState {
    pub secret: String,
    pub pipeline: Pipeline,
}

#[derive(Debug, Serialize)]
struct Accepted {
    status: &'static str,
    task: String,
    round: u32,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(submit))
        .route("/api/v1/build", post(submit))
        .route("/health", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Every synchronous failure here is the caller's fault (body, secret or URL),
// so it maps to 400 or 403. Nothing before the acknowledgment can fail on our side.
async fn submit(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Accepted>, (StatusCode, String)> {
    let payload: TaskPayload = serde_json::from_slice(&body).map_err(|e| {
        let err = IntakeError::Body(e.to_string());
        tracing::warn!(error = %err, "Rejected build request");
        (StatusCode::BAD_REQUEST, err.to_string())
    })?;

    if let Err(e) = payload.authorize(&state.secret) {
        tracing::warn!(task = %payload.task, email = %payload.email, "Unauthorized build request");
        return Err((StatusCode::FORBIDDEN, e.to_string()));
    }

    let request = payload.into_request().map_err(|e| {
        tracing::warn!(error = %e, "Rejected build request");
        (StatusCode::BAD_REQUEST, e.to_string())
    })?;

    tracing::info!(
        task = %request.task,
        round = request.round,
        checks = request.checks.len(),
        attachments = request.attachments.len(),
        "Build request accepted"
    );
    let accepted = Accepted {
        status: "accepted",
        task: request.task.clone(),
        round: request.round,
    };
    // Detached: the handle is dropped and the run continues on its own.
    drop(state.pipeline.spawn(request));

    Ok(Json(accepted))
}
