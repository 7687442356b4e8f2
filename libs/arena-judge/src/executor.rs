/// Submission Executor - High-Level Orchestration
///
/// **Responsibility:**
/// Drive one run or submit through the whole pipeline and apply the
/// flow-specific policy.
///
/// **Architecture:**
/// 1. Resolve the language name (language.rs)
/// 2. Load the problem and pick its case list
/// 3. Submit every case as one batch (engine.rs)
/// 4. Poll until all cases are terminal (poller.rs)
/// 5. Reduce to a verdict (evaluator.rs)
/// 6. Submit only: persist the verdict and credit the user
///
/// This module is the glue layer - it knows nothing about:
/// - How the backend is reached (engine's job)
/// - How a verdict is derived (evaluator's job)
/// - How records are stored (the store traits)
use crate::engine::{submit_batch, ExecutionBackend};
use crate::error::{JudgeError, JudgeResult};
use crate::evaluator::aggregate;
use crate::language::LanguageResolver;
use crate::poller::{poll_until_done, PollPolicy};
use arena_common::store::{ProblemStore, StreakUpdater, SubmissionStore, UserStore};
use arena_common::types::{
    ExecutionRequest, ExecutionResult, NewSubmission, Outcome, Problem, Submission,
    SubmissionStatus, SubmissionUpdate, TestCase, Verdict,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// The persistence collaborators, injected at construction
#[derive(Clone)]
pub struct Stores {
    pub problems: Arc<dyn ProblemStore>,
    pub submissions: Arc<dyn SubmissionStore>,
    pub users: Arc<dyn UserStore>,
    pub streaks: Arc<dyn StreakUpdater>,
}

impl Stores {
    /// Use one value for every collaborator (e.g. a `RedisStore`)
    pub fn shared<S>(store: S) -> Self
    where
        S: ProblemStore + SubmissionStore + UserStore + StreakUpdater + 'static,
    {
        let store = Arc::new(store);
        Self {
            problems: store.clone(),
            submissions: store.clone(),
            users: store.clone(),
            streaks: store,
        }
    }
}

/// One executed case, as shown in the run test table
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub input: String,
    pub status: arena_common::types::ExecutionStatus,
    #[serde(flatten)]
    pub result: ExecutionResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub verdict: Verdict,
    pub cases: Vec<CaseReport>,
}

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub user_id: String,
    pub problem_id: String,
    pub language: String,
    pub code: String,
}

/// Message stored on a submission whose pipeline failed. Backend details
/// stay in the logs.
fn public_failure_message(err: &JudgeError) -> &'static str {
    match err {
        JudgeError::BackendUnavailable(_) => "Code execution service is unavailable",
        JudgeError::InvalidResponse(_) => "Code execution service returned an invalid response",
        JudgeError::Timeout { .. } => "Timed out waiting for execution results",
        _ => "Submission could not be judged",
    }
}

pub fn build_requests(code: &str, language_id: u32, cases: &[TestCase]) -> Vec<ExecutionRequest> {
    cases
        .iter()
        .map(|case| ExecutionRequest {
            source_code: code.to_string(),
            language_id,
            stdin: case.input.clone(),
            expected_output: case.output.clone(),
        })
        .collect()
}

/// Batch every case, poll until done and align results with their cases.
///
/// Results whose backend entry carries no expected output get the case's.
pub async fn execute_cases(
    backend: &dyn ExecutionBackend,
    policy: &PollPolicy,
    code: &str,
    language_id: u32,
    cases: &[TestCase],
) -> JudgeResult<Vec<ExecutionResult>> {
    let requests = build_requests(code, language_id, cases);
    let tokens = submit_batch(backend, &requests).await?;
    let mut results = poll_until_done(backend, &tokens, policy).await?;

    for (result, request) in results.iter_mut().zip(requests) {
        if result.expected_output.is_none() {
            result.expected_output = Some(request.expected_output);
        }
    }
    Ok(results)
}

/// Entry point for the run and submit flows
pub struct Executor {
    backend: Arc<dyn ExecutionBackend>,
    stores: Stores,
    languages: LanguageResolver,
    policy: PollPolicy,
}

impl Executor {
    pub fn new(
        backend: Arc<dyn ExecutionBackend>,
        stores: Stores,
        languages: LanguageResolver,
        policy: PollPolicy,
    ) -> Self {
        Self {
            backend,
            stores,
            languages,
            policy,
        }
    }

    pub fn languages(&self) -> &LanguageResolver {
        &self.languages
    }

    async fn load_problem(&self, problem_id: &str) -> JudgeResult<Problem> {
        self.stores
            .problems
            .get(problem_id)
            .await?
            .ok_or_else(|| JudgeError::ProblemNotFound(problem_id.to_string()))
    }

    /// Run against the visible cases. Nothing is persisted.
    #[instrument(skip(self, code), fields(code_size = code.len()))]
    pub async fn run(&self, problem_id: &str, language: &str, code: &str) -> JudgeResult<RunReport> {
        let lang = self.languages.resolve(language)?;
        let problem = self.load_problem(problem_id).await?;

        let cases = &problem.visible_test_cases;
        if cases.is_empty() {
            return Err(JudgeError::NoTestCases(problem.id));
        }

        let results =
            execute_cases(self.backend.as_ref(), &self.policy, code, lang.language_id, cases)
                .await?;
        let verdict = aggregate(&results);

        info!(
            outcome = %verdict.outcome,
            passed = verdict.test_cases_passed,
            total = verdict.test_cases_total,
            "Run completed"
        );

        let cases = cases
            .iter()
            .zip(results)
            .map(|(case, result)| CaseReport {
                input: case.input.clone(),
                status: result.status(),
                result,
            })
            .collect();

        Ok(RunReport { verdict, cases })
    }

    /// Judge against the hidden cases, persist the verdict, credit the user.
    ///
    /// The pending record is written before anything is dispatched. If the
    /// pipeline fails after that, the record is closed as `error` and the
    /// original failure is returned.
    #[instrument(
        skip(self, request),
        fields(user_id = %request.user_id, problem_id = %request.problem_id)
    )]
    pub async fn submit(&self, request: SubmitRequest) -> JudgeResult<Submission> {
        let lang = self.languages.resolve(&request.language)?;
        let problem = self.load_problem(&request.problem_id).await?;

        let cases = &problem.hidden_test_cases;
        if cases.is_empty() {
            return Err(JudgeError::NoTestCases(problem.id));
        }

        let pending = self
            .stores
            .submissions
            .create(NewSubmission {
                user_id: request.user_id.clone(),
                problem_id: problem.id.clone(),
                code: request.code.clone(),
                language: lang.name.to_string(),
                test_cases_total: cases.len() as u32,
            })
            .await?;
        info!(submission_id = %pending.id, cases = cases.len(), "Submission pending");

        if let Err(e) = self.stores.users.record_submission(&request.user_id).await {
            let e = JudgeError::from(e);
            self.abandon(&pending, &e).await;
            return Err(e);
        }

        let verdict = match execute_cases(
            self.backend.as_ref(),
            &self.policy,
            &request.code,
            lang.language_id,
            cases,
        )
        .await
        {
            Ok(results) => aggregate(&results),
            Err(e) => {
                self.abandon(&pending, &e).await;
                return Err(e);
            }
        };

        let update = SubmissionUpdate::from(&verdict);
        if !self.stores.submissions.finalize(&pending.id, &update).await? {
            warn!(submission_id = %pending.id, "Submission was no longer pending; skipping side effects");
            let stored = self.stores.submissions.get(&pending.id).await?;
            return Ok(stored.unwrap_or(pending));
        }

        info!(
            submission_id = %pending.id,
            status = %update.status,
            passed = update.test_cases_passed,
            total = verdict.test_cases_total,
            "Submission judged"
        );

        if verdict.outcome == Outcome::Accepted {
            let credited = self
                .stores
                .users
                .credit_solved(&request.user_id, &problem.id, problem.difficulty)
                .await?;
            if credited {
                self.stores.streaks.update(&request.user_id).await?;
                info!(difficulty = %problem.difficulty, "Problem newly solved");
            } else {
                debug!("Problem already solved; counters unchanged");
            }
        }

        Ok(Submission {
            status: update.status,
            test_cases_passed: update.test_cases_passed,
            runtime: update.runtime,
            memory: update.memory,
            error_message: update.error_message,
            ..pending
        })
    }

    /// Close a pending submission whose pipeline failed
    async fn abandon(&self, pending: &Submission, cause: &JudgeError) {
        let update = SubmissionUpdate {
            status: SubmissionStatus::Error,
            test_cases_passed: 0,
            runtime: 0.0,
            memory: 0,
            error_message: Some(public_failure_message(cause).to_string()),
        };

        match self.stores.submissions.finalize(&pending.id, &update).await {
            Ok(_) => warn!(submission_id = %pending.id, error = %cause, "Submission failed"),
            Err(e) => error!(
                submission_id = %pending.id,
                error = %e,
                cause = %cause,
                "Could not close failed submission; left pending"
            ),
        }
    }
}
