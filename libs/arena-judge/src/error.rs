use arena_common::error::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Everything a run or submit can fail with.
///
/// Nothing here is retried automatically; callers decide.
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("problem not found: {0}")]
    ProblemNotFound(String),

    #[error("problem {0} has no test cases for this mode")]
    NoTestCases(String),

    /// Network failure or backend outage
    #[error("execution backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Backend answered, but not in the shape the protocol promises
    #[error("invalid response from execution backend: {0}")]
    InvalidResponse(String),

    #[error("execution did not finish within {}ms ({pending} of {total} cases pending)", .waited.as_millis())]
    Timeout {
        waited: Duration,
        pending: usize,
        total: usize,
    },

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl JudgeError {
    /// Short machine-readable code, used for metrics labels and API bodies
    pub fn code(&self) -> &'static str {
        match self {
            JudgeError::UnsupportedLanguage(_) => "UNSUPPORTED_LANGUAGE",
            JudgeError::ProblemNotFound(_) => "PROBLEM_NOT_FOUND",
            JudgeError::NoTestCases(_) => "NO_TEST_CASES",
            JudgeError::BackendUnavailable(_) => "BACKEND_UNAVAILABLE",
            JudgeError::InvalidResponse(_) => "INVALID_RESPONSE",
            JudgeError::Timeout { .. } => "TIMEOUT",
            JudgeError::Store(_) => "STORAGE_ERROR",
        }
    }
}

pub type JudgeResult<T> = Result<T, JudgeError>;
