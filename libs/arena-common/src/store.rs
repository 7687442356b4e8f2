//! Persistence collaborators used by the judge.
//!
//! The orchestrator only ever sees these traits; production wires in the
//! Redis implementations from [`crate::redis`], tests wire in fakes.

use crate::error::StoreError;
use crate::types::{Difficulty, NewSubmission, Problem, Submission, SubmissionUpdate, User};
use async_trait::async_trait;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ProblemStore: Send + Sync {
    async fn get(&self, problem_id: &str) -> StoreResult<Option<Problem>>;

    async fn put(&self, problem: &Problem) -> StoreResult<()>;
}

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Persist a new submission in the pending state.
    async fn create(&self, new: NewSubmission) -> StoreResult<Submission>;

    /// Move a pending submission to its terminal state.
    ///
    /// Returns false when the submission does not exist or is no longer pending.
    async fn finalize(&self, id: &Uuid, update: &SubmissionUpdate) -> StoreResult<bool>;

    async fn get(&self, id: &Uuid) -> StoreResult<Option<Submission>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Load a user profile. Unknown users read as an empty profile.
    async fn get(&self, user_id: &str) -> StoreResult<User>;

    /// Count one submit attempt, whatever its verdict.
    async fn record_submission(&self, user_id: &str) -> StoreResult<()>;

    /// Credit a solved problem exactly once.
    ///
    /// Adds the problem to the solved set and bumps the difficulty and
    /// accepted counters as one atomic step. Returns true only for the call
    /// that actually added the problem.
    async fn credit_solved(
        &self,
        user_id: &str,
        problem_id: &str,
        difficulty: Difficulty,
    ) -> StoreResult<bool>;
}

#[async_trait]
pub trait StreakUpdater: Send + Sync {
    async fn update(&self, user_id: &str) -> StoreResult<()>;
}
