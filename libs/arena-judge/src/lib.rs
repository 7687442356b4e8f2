//! Submission orchestration: language resolution, batched dispatch to the
//! execution backend, result polling, and verdict aggregation.

pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod language;
pub mod poller;


pub use engine::{ExecutionBackend, Judge0Client};
pub use error::{JudgeError, JudgeResult};
pub use executor::{Executor, RunReport, Stores, SubmitRequest};
pub use language::LanguageResolver;
pub use poller::PollPolicy;
