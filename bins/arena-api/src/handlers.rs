// HTTP route handlers for the Arena API

use crate::error::ApiError;
use crate::metrics;
use crate::AppState;
use arena_common::types::{Submission, User};
use arena_judge::{RunReport, SubmitRequest};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RunBody {
    pub language: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    pub user_id: String,
    pub language: String,
    pub code: String,
}

fn require_code(code: &str) -> Result<(), ApiError> {
    if code.trim().is_empty() {
        return Err(ApiError::Validation("code must not be empty".to_string()));
    }
    Ok(())
}

/// POST /problems/:id/run - Judge against the visible cases
pub async fn run_code(
    State(state): State<Arc<AppState>>,
    Path(problem_id): Path<String>,
    Json(body): Json<RunBody>,
) -> Result<Json<RunReport>, ApiError> {
    require_code(&body.code)?;

    let start = Instant::now();
    let result = state.executor.run(&problem_id, &body.language, &body.code).await;

    match result {
        Ok(report) => {
            metrics::observe("run", &report.verdict.outcome.to_string(), start.elapsed());
            Ok(Json(report))
        }
        Err(e) => {
            let e = ApiError::from(e);
            metrics::observe("run", e.code(), start.elapsed());
            Err(e)
        }
    }
}

/// POST /problems/:id/submit - Judge against the hidden cases and persist
pub async fn submit_code(
    State(state): State<Arc<AppState>>,
    Path(problem_id): Path<String>,
    Json(body): Json<SubmitBody>,
) -> Result<(StatusCode, Json<Submission>), ApiError> {
    require_code(&body.code)?;
    if body.user_id.trim().is_empty() {
        return Err(ApiError::Validation("user_id must not be empty".to_string()));
    }

    let start = Instant::now();
    let request = SubmitRequest {
        user_id: body.user_id,
        problem_id,
        language: body.language,
        code: body.code,
    };

    match state.executor.submit(request).await {
        Ok(submission) => {
            metrics::observe("submit", submission.status.as_str(), start.elapsed());
            info!(
                submission_id = %submission.id,
                status = %submission.status,
                "Submission returned"
            );
            Ok((StatusCode::CREATED, Json(submission)))
        }
        Err(e) => {
            let e = ApiError::from(e);
            metrics::observe("submit", e.code(), start.elapsed());
            Err(e)
        }
    }
}

/// GET /submissions/:id - Fetch a stored submission
pub async fn get_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Submission>, ApiError> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::Validation("Invalid submission ID format".to_string()))?;

    state
        .stores
        .submissions
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("submission {} not found", id)))
}

/// GET /users/:id/stats - Solved set, counters and streak
pub async fn get_user_stats(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.stores.users.get(&user_id).await?))
}

/// GET /health - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus scrape endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
