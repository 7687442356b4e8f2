use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub output: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A problem as authored elsewhere. Read-only to the judge.
///
/// `start_code` and `reference_solution` are keyed by canonical language name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub id: String,
    pub title: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub visible_test_cases: Vec<TestCase>,
    #[serde(default)]
    pub hidden_test_cases: Vec<TestCase>,
    #[serde(default)]
    pub start_code: BTreeMap<String, String>,
    #[serde(default)]
    pub reference_solution: BTreeMap<String, String>,
}

/// One test case packaged for the execution backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub source_code: String,
    pub language_id: u32,
    pub stdin: String,
    pub expected_output: String,
}

/// Opaque handle for one queued execution job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionToken(pub String);

impl ExecutionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backend job state, interpreted from the numeric status id.
///
/// This is the only place status ids are given meaning:
/// 1 = in queue, 2 = processing, 3 = accepted, 4 = wrong answer,
/// 5 = time limit exceeded, 6 = compilation error, anything else is a
/// runtime (or unknown) error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Queued,
    Running,
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    CompilationError,
    RuntimeError,
}

impl ExecutionStatus {
    pub fn from_status_id(status_id: u32) -> Self {
        match status_id {
            1 => ExecutionStatus::Queued,
            2 => ExecutionStatus::Running,
            3 => ExecutionStatus::Accepted,
            4 => ExecutionStatus::WrongAnswer,
            5 => ExecutionStatus::TimeLimitExceeded,
            6 => ExecutionStatus::CompilationError,
            _ => ExecutionStatus::RuntimeError,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Queued | ExecutionStatus::Running)
    }
}

/// Raw per-case result as reported by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status_id: u32,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub compile_output: Option<String>,
    /// Wall time in seconds
    #[serde(default)]
    pub time: f64,
    /// Peak memory in kB
    #[serde(default)]
    pub memory: u64,
    #[serde(default)]
    pub expected_output: Option<String>,
}

impl ExecutionResult {
    pub fn status(&self) -> ExecutionStatus {
        ExecutionStatus::from_status_id(self.status_id)
    }
}

/// Reduced outcome of a whole run or submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    CompilationError,
    RuntimeError,
}

impl Outcome {
    /// Map a terminal, non-accepted case status onto the outcome it latches.
    pub fn from_status(status: ExecutionStatus) -> Self {
        match status {
            ExecutionStatus::Accepted => Outcome::Accepted,
            ExecutionStatus::WrongAnswer => Outcome::WrongAnswer,
            ExecutionStatus::TimeLimitExceeded => Outcome::TimeLimitExceeded,
            ExecutionStatus::CompilationError => Outcome::CompilationError,
            ExecutionStatus::Queued
            | ExecutionStatus::Running
            | ExecutionStatus::RuntimeError => Outcome::RuntimeError,
        }
    }

    pub fn submission_status(&self) -> SubmissionStatus {
        match self {
            Outcome::Accepted => SubmissionStatus::Accepted,
            Outcome::WrongAnswer => SubmissionStatus::Wrong,
            Outcome::TimeLimitExceeded
            | Outcome::CompilationError
            | Outcome::RuntimeError => SubmissionStatus::Error,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Accepted => "accepted",
            Outcome::WrongAnswer => "wrong_answer",
            Outcome::TimeLimitExceeded => "time_limit_exceeded",
            Outcome::CompilationError => "compilation_error",
            Outcome::RuntimeError => "runtime_error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub outcome: Outcome,
    pub test_cases_passed: u32,
    pub test_cases_total: u32,
    /// Seconds, summed over passed cases
    pub runtime: f64,
    /// kB, max over passed cases
    pub memory: u64,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Accepted,
    Wrong,
    Error,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Accepted => "accepted",
            SubmissionStatus::Wrong => "wrong",
            SubmissionStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SubmissionStatus::Pending),
            "accepted" => Some(SubmissionStatus::Accepted),
            "wrong" => Some(SubmissionStatus::Wrong),
            "error" => Some(SubmissionStatus::Error),
            _ => None,
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub user_id: String,
    pub problem_id: String,
    pub code: String,
    pub language: String,
    pub status: SubmissionStatus,
    pub test_cases_passed: u32,
    pub test_cases_total: u32,
    pub runtime: f64,
    pub memory: u64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to open a pending submission
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub user_id: String,
    pub problem_id: String,
    pub code: String,
    pub language: String,
    pub test_cases_total: u32,
}

impl NewSubmission {
    pub fn into_pending(self) -> Submission {
        Submission {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            problem_id: self.problem_id,
            code: self.code,
            language: self.language,
            status: SubmissionStatus::Pending,
            test_cases_passed: 0,
            test_cases_total: self.test_cases_total,
            runtime: 0.0,
            memory: 0,
            error_message: None,
            created_at: Utc::now(),
        }
    }
}

/// Terminal fields written once a verdict resolves
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionUpdate {
    pub status: SubmissionStatus,
    pub test_cases_passed: u32,
    pub runtime: f64,
    pub memory: u64,
    pub error_message: Option<String>,
}

impl From<&Verdict> for SubmissionUpdate {
    fn from(verdict: &Verdict) -> Self {
        Self {
            status: verdict.outcome.submission_status(),
            test_cases_passed: verdict.test_cases_passed,
            runtime: verdict.runtime,
            memory: verdict.memory,
            error_message: verdict.error_message.clone(),
        }
    }
}

/// Profile bookkeeping the judge touches on every submit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub solved_problems: HashSet<String>,
    pub easy_solved: u64,
    pub medium_solved: u64,
    pub hard_solved: u64,
    pub accepted_submissions: u64,
    pub total_submissions: u64,
    #[serde(flatten)]
    pub streak: Streak,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_solved_on: Option<NaiveDate>,
}

impl Streak {
    /// Streak after solving a new problem on `today`.
    pub fn advance(self, today: NaiveDate) -> Streak {
        let current = match self.last_solved_on {
            Some(last) if last == today => return self,
            Some(last) if last.succ_opt() == Some(today) => self.current_streak + 1,
            _ => 1,
        };

        Streak {
            current_streak: current,
            longest_streak: self.longest_streak.max(current),
            last_solved_on: Some(today),
        }
    }
}
