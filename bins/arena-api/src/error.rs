use arena_common::error::StoreError;
use arena_judge::JudgeError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Structured error body returned by every endpoint on failure
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Judge(JudgeError),
    Validation(String),
    NotFound(String),
}

impl From<JudgeError> for ApiError {
    fn from(e: JudgeError) -> Self {
        ApiError::Judge(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Judge(JudgeError::Store(e))
    }
}

impl ApiError {
    /// Label used in metrics for failed requests
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Judge(e) => e.code(),
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
        }
    }

    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        let code = self.code();
        match self {
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, ErrorBody { code, message }),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, ErrorBody { code, message }),
            ApiError::Judge(e) => {
                let (status, message) = match &e {
                    JudgeError::ProblemNotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
                    JudgeError::UnsupportedLanguage(_) | JudgeError::NoTestCases(_) => {
                        (StatusCode::BAD_REQUEST, e.to_string())
                    }
                    JudgeError::BackendUnavailable(_) => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "Code execution service is unavailable".to_string(),
                    ),
                    JudgeError::InvalidResponse(_) => (
                        StatusCode::BAD_GATEWAY,
                        "Code execution service returned an invalid response".to_string(),
                    ),
                    JudgeError::Timeout { .. } => (
                        StatusCode::GATEWAY_TIMEOUT,
                        "Timed out waiting for execution results".to_string(),
                    ),
                    JudgeError::Store(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    ),
                };
                if status.is_server_error() {
                    tracing::error!(code, error = %e, "Request failed");
                }
                (status, ErrorBody { code, message })
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}
