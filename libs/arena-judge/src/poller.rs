//! Result polling.
//!
//! Each token moves `queued -> running -> terminal`. The poller asks about
//! every still-pending token in one batched query per round, backs off
//! between rounds, and gives up with `Timeout` once the wait budget is spent.

use crate::engine::ExecutionBackend;
use crate::error::{JudgeError, JudgeResult};
use arena_common::config::PollConfig;
use arena_common::types::{ExecutionResult, ExecutionToken};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, instrument, warn};

/// Interval schedule and overall budget for one poll
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub backoff: f64,
    pub max_interval: Duration,
    pub max_wait: Duration,
}

impl PollPolicy {
    /// Interval to use after `current`
    pub fn next_interval(&self, current: Duration) -> Duration {
        // Overflowing products saturate at the cap
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff.max(1.0))
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollConfig::default().into()
    }
}

impl From<PollConfig> for PollPolicy {
    fn from(config: PollConfig) -> Self {
        Self {
            initial_interval: config.initial_interval,
            backoff: config.backoff,
            max_interval: config.max_interval,
            max_wait: config.max_wait,
        }
    }
}

/// Poll until every token is terminal.
///
/// The returned results line up with `tokens` by position, whatever order
/// the backend reports them in.
#[instrument(skip_all, fields(tokens = tokens.len()))]
pub async fn poll_until_done(
    backend: &dyn ExecutionBackend,
    tokens: &[ExecutionToken],
    policy: &PollPolicy,
) -> JudgeResult<Vec<ExecutionResult>> {
    let started = Instant::now();
    let deadline = started + policy.max_wait;

    let position: HashMap<&ExecutionToken, usize> =
        tokens.iter().enumerate().map(|(idx, t)| (t, idx)).collect();
    let mut results: Vec<Option<ExecutionResult>> = vec![None; tokens.len()];
    let mut pending: Vec<ExecutionToken> = tokens.to_vec();
    let mut interval = policy.initial_interval;
    let mut round = 0u32;

    while !pending.is_empty() {
        let now = Instant::now();
        if now >= deadline {
            warn!(
                pending = pending.len(),
                waited_ms = policy.max_wait.as_millis() as u64,
                "Polling budget exhausted"
            );
            return Err(JudgeError::Timeout {
                waited: now - started,
                pending: pending.len(),
                total: tokens.len(),
            });
        }

        sleep(interval.min(deadline - now)).await;
        round += 1;

        let entries = backend.fetch_batch(&pending).await?;
        let mut reported: HashSet<usize> = HashSet::with_capacity(entries.len());
        for entry in entries {
            let token = entry
                .token
                .clone()
                .map(ExecutionToken)
                .ok_or_else(|| JudgeError::InvalidResponse("status entry without token".into()))?;
            let idx = *position.get(&token).ok_or_else(|| {
                JudgeError::InvalidResponse(format!("status for unknown token {}", token))
            })?;

            reported.insert(idx);

            let result = entry.into_result()?;
            if result.status().is_terminal() {
                results[idx] = Some(result);
            }
        }

        if let Some(missing) = pending.iter().find(|t| !reported.contains(&position[*t])) {
            return Err(JudgeError::InvalidResponse(format!(
                "status response omitted token {}",
                missing
            )));
        }

        pending.retain(|t| results[position[t]].is_none());
        debug!(round, pending = pending.len(), "Poll round complete");
        interval = policy.next_interval(interval);
    }

    // Every slot is filled once nothing is pending
    results
        .into_iter()
        .enumerate()
        .map(|(idx, r)| {
            r.ok_or_else(|| JudgeError::InvalidResponse(format!("no result for case {}", idx)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{StatusEntry, SubmitEntry};
    use arena_common::types::ExecutionRequest;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted status rounds; records which tokens each round asked for
    struct ScriptedBackend {
        rounds: Mutex<VecDeque<Vec<StatusEntry>>>,
        /// Returned once the script runs out
        fallback: Vec<StatusEntry>,
        asked: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedBackend {
        fn new(rounds: Vec<Vec<StatusEntry>>, fallback: Vec<StatusEntry>) -> Self {
            Self {
                rounds: Mutex::new(rounds.into()),
                fallback,
                asked: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ExecutionBackend for ScriptedBackend {
        async fn post_batch(&self, _: &[ExecutionRequest]) -> JudgeResult<Vec<SubmitEntry>> {
            Ok(Vec::new())
        }

        async fn fetch_batch(&self, tokens: &[ExecutionToken]) -> JudgeResult<Vec<StatusEntry>> {
            self.asked
                .lock()
                .unwrap()
                .push(tokens.iter().map(|t| t.0.clone()).collect());
            let round = self.rounds.lock().unwrap().pop_front();
            Ok(round.unwrap_or_else(|| self.fallback.clone()))
        }
    }

    fn status(token: &str, status_id: u32, stdout: &str) -> StatusEntry {
        StatusEntry {
            token: Some(token.to_string()),
            status_id: Some(status_id),
            stdout: Some(stdout.to_string()),
            time: Some(0.01),
            memory: Some(100),
            ..Default::default()
        }
    }

    fn tokens(names: &[&str]) -> Vec<ExecutionToken> {
        names.iter().map(|n| ExecutionToken(n.to_string())).collect()
    }

    fn policy() -> PollPolicy {
        PollPolicy {
            initial_interval: Duration::from_millis(100),
            backoff: 2.0,
            max_interval: Duration::from_millis(400),
            max_wait: Duration::from_millis(2_000),
        }
    }

    #[test]
    fn test_backoff_is_capped() {
        let p = policy();
        let mut interval = p.initial_interval;
        let mut seen = Vec::new();
        for _ in 0..4 {
            interval = p.next_interval(interval);
            seen.push(interval.as_millis());
        }
        assert_eq!(seen, vec![200, 400, 400, 400]);
    }

    #[test]
    fn test_backoff_below_one_never_shrinks() {
        let p = PollPolicy {
            backoff: 0.5,
            ..policy()
        };
        assert_eq!(p.next_interval(Duration::from_millis(100)), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_follow_input_order() {
        let backend = ScriptedBackend::new(
            vec![vec![status("c", 3, "3"), status("a", 3, "1"), status("b", 4, "x")]],
            Vec::new(),
        );

        let results = poll_until_done(&backend, &tokens(&["a", "b", "c"]), &policy())
            .await
            .unwrap();

        let stdouts: Vec<_> = results.iter().map(|r| r.stdout.clone().unwrap()).collect();
        assert_eq!(stdouts, vec!["1", "x", "3"]);
        assert_eq!(results[1].status_id, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_pending_tokens_are_requeried() {
        let backend = ScriptedBackend::new(
            vec![
                vec![status("a", 3, "1"), status("b", 1, ""), status("c", 2, "")],
                vec![status("c", 3, "3"), status("b", 2, "")],
                vec![status("b", 3, "2")],
            ],
            Vec::new(),
        );

        let results = poll_until_done(&backend, &tokens(&["a", "b", "c"]), &policy())
            .await
            .unwrap();
        assert_eq!(results.len(), 3);

        let asked = backend.asked.lock().unwrap();
        assert_eq!(asked.len(), 3);
        assert_eq!(asked[0], vec!["a", "b", "c"]);
        assert_eq!(asked[1], vec!["b", "c"]);
        assert_eq!(asked[2], vec!["b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_terminal_times_out() {
        let backend = ScriptedBackend::new(Vec::new(), vec![status("a", 3, "1"), status("b", 2, "")]);
        let started = Instant::now();

        let err = poll_until_done(&backend, &tokens(&["a", "b"]), &policy())
            .await
            .unwrap_err();

        match err {
            JudgeError::Timeout { pending, total, waited } => {
                assert_eq!(pending, 1);
                assert_eq!(total, 2);
                assert!(waited >= Duration::from_millis(2_000));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        // The last sleep is clipped to the deadline
        assert!(started.elapsed() < Duration::from_millis(2_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_token_is_invalid_response() {
        let backend = ScriptedBackend::new(vec![vec![status("zzz", 3, "")]], Vec::new());
        let err = poll_until_done(&backend, &tokens(&["a"]), &policy())
            .await
            .unwrap_err();
        assert!(matches!(err, JudgeError::InvalidResponse(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_omitted_token_is_invalid_response() {
        let backend = ScriptedBackend::new(Vec::new(), vec![status("a", 2, "")]);
        let started = Instant::now();

        let err = poll_until_done(&backend, &tokens(&["a", "b"]), &policy())
            .await
            .unwrap_err();

        assert!(
            matches!(err, JudgeError::InvalidResponse(ref m) if m.ends_with("token b")),
            "{:?}",
            err
        );
        // Reported after the first round, not at the deadline
        assert_eq!(backend.asked.lock().unwrap().len(), 1);
        assert!(started.elapsed() < Duration::from_millis(2_000));
    }

    #[test]
    fn test_unbounded_backoff_is_capped_not_panicking() {
        for backoff in [f64::INFINITY, 1e300] {
            let p = PollPolicy {
                backoff,
                ..policy()
            };
            assert_eq!(p.next_interval(Duration::from_millis(100)), p.max_interval);
        }

        let p = PollPolicy {
            backoff: f64::NAN,
            ..policy()
        };
        assert_eq!(p.next_interval(Duration::from_millis(100)), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_token_list_returns_immediately() {
        let backend = ScriptedBackend::new(Vec::new(), Vec::new());
        let results = poll_until_done(&backend, &[], &policy()).await.unwrap();
        assert!(results.is_empty());
        assert!(backend.asked.lock().unwrap().is_empty());
    }
}
