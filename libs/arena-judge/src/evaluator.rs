/// Verdict Evaluator - Reduces Per-Case Results to One Verdict
///
/// **Core Responsibility:**
/// Turn the backend's per-case results into a single outcome plus metrics.
///
/// **Critical Properties:**
/// - Knows nothing about HTTP
/// - Knows nothing about Redis
/// - Pure function: (results) → verdict
///
/// **Aggregation Rules:**
/// - A case passes only when its status is accepted
/// - runtime = sum of time over passed cases (seconds)
/// - memory = max of memory over passed cases (kB)
/// - The FIRST non-accepted case decides the outcome and the error message;
///   later failures never overwrite it
/// - No results at all → accepted with zero counts
use arena_common::types::{ExecutionResult, ExecutionStatus, Outcome, Verdict};

fn non_empty(text: &Option<String>) -> Option<&str> {
    text.as_deref().map(str::trim_end).filter(|s| !s.trim().is_empty())
}

/// Human-readable explanation for a failed case
///
/// **Message Rules:**
/// - Wrong answer: expected vs actual output, plus stderr if any
/// - Time limit: fixed text, plus stderr if any
/// - Compile error: the compiler output as-is (trailing whitespace trimmed)
/// - Anything else: stderr, else compiler output, else the raw status id
pub fn failure_message(result: &ExecutionResult) -> String {
    let with_stderr = |head: String| match non_empty(&result.stderr) {
        Some(stderr) => format!("{}\n{}", head, stderr),
        None => head,
    };

    match result.status() {
        ExecutionStatus::WrongAnswer => {
            let expected = result.expected_output.as_deref().unwrap_or("").trim();
            let actual = result.stdout.as_deref().unwrap_or("").trim();
            with_stderr(format!(
                "Wrong answer: expected \"{}\", got \"{}\"",
                expected, actual
            ))
        }
        ExecutionStatus::TimeLimitExceeded => with_stderr("Time limit exceeded".to_string()),
        ExecutionStatus::CompilationError => non_empty(&result.compile_output)
            .unwrap_or("Compilation error")
            .to_string(),
        _ => non_empty(&result.stderr)
            .or_else(|| non_empty(&result.compile_output))
            .map(str::to_string)
            .unwrap_or_else(|| format!("Runtime error (status {})", result.status_id)),
    }
}

/// Aggregate case results into a verdict
pub fn aggregate(results: &[ExecutionResult]) -> Verdict {
    let mut passed = 0u32;
    let mut runtime = 0.0f64;
    let mut memory = 0u64;
    let mut failure: Option<(Outcome, String)> = None;

    for result in results {
        match result.status() {
            ExecutionStatus::Accepted => {
                passed += 1;
                runtime += result.time;
                memory = memory.max(result.memory);
            }
            status => {
                if failure.is_none() {
                    failure = Some((Outcome::from_status(status), failure_message(result)));
                }
            }
        }
    }

    let (outcome, error_message) = match failure {
        Some((outcome, message)) => (outcome, Some(message)),
        None => (Outcome::Accepted, None),
    };

    Verdict {
        outcome,
        test_cases_passed: passed,
        test_cases_total: results.len() as u32,
        runtime,
        memory,
        error_message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper to create a backend result
    fn make_result(status_id: u32, time: f64, memory: u64) -> ExecutionResult {
        ExecutionResult {
            status_id,
            stdout: None,
            stderr: None,
            compile_output: None,
            time,
            memory,
            expected_output: None,
        }
    }

    fn wrong(stdout: &str, expected: &str) -> ExecutionResult {
        ExecutionResult {
            stdout: Some(stdout.to_string()),
            expected_output: Some(expected.to_string()),
            ..make_result(4, 0.02, 900)
        }
    }

    #[test]
    fn test_all_accepted() {
        let results = vec![
            make_result(3, 0.25, 1200),
            make_result(3, 0.5, 3400),
            make_result(3, 0.125, 2100),
        ];

        let verdict = aggregate(&results);

        assert_eq!(verdict.outcome, Outcome::Accepted);
        assert_eq!(verdict.test_cases_passed, 3);
        assert_eq!(verdict.test_cases_total, 3);
        assert_eq!(verdict.runtime, 0.875);
        assert_eq!(verdict.memory, 3400);
        assert_eq!(verdict.error_message, None);
    }

    #[test]
    fn test_empty_results() {
        let verdict = aggregate(&[]);

        assert_eq!(verdict.test_cases_passed, 0);
        assert_eq!(verdict.test_cases_total, 0);
        assert_eq!(verdict.runtime, 0.0);
        assert_eq!(verdict.memory, 0);
    }

    #[test]
    fn test_first_failure_wins() {
        let results = vec![
            make_result(3, 0.1, 100),
            make_result(5, 2.0, 500),
            wrong("1", "2"),
            make_result(6, 0.0, 0),
        ];

        let verdict = aggregate(&results);

        assert_eq!(verdict.outcome, Outcome::TimeLimitExceeded);
        assert_eq!(verdict.test_cases_passed, 1);
        assert_eq!(verdict.error_message.as_deref(), Some("Time limit exceeded"));
    }

    #[test]
    fn test_outcome_independent_of_later_failures() {
        for later in [4, 5, 6, 11] {
            let results = vec![wrong("7", "8"), make_result(later, 0.0, 0)];
            let verdict = aggregate(&results);
            assert_eq!(verdict.outcome, Outcome::WrongAnswer, "later status {}", later);
        }
    }

    #[test]
    fn test_metrics_only_count_passed_cases() {
        let results = vec![
            make_result(3, 0.2, 1000),
            make_result(11, 1.5, 90000),
            make_result(3, 0.3, 800),
        ];

        let verdict = aggregate(&results);

        assert_eq!(verdict.outcome, Outcome::RuntimeError);
        assert_eq!(verdict.test_cases_passed, 2);
        assert_eq!(verdict.runtime, 0.5);
        assert_eq!(verdict.memory, 1000);
    }

    #[test]
    fn test_nothing_passes_zero_metrics() {
        let verdict = aggregate(&[make_result(6, 0.0, 0), make_result(6, 0.0, 0)]);
        assert_eq!(verdict.test_cases_passed, 0);
        assert_eq!(verdict.runtime, 0.0);
        assert_eq!(verdict.memory, 0);
    }

    #[test]
    fn test_wrong_answer_message() {
        let message = failure_message(&wrong("7\n", "8"));
        assert!(message.contains("\"8\""));
        assert!(message.contains("\"7\""));

        let with_stderr = ExecutionResult {
            stderr: Some("warning: unused\n".to_string()),
            ..wrong("7", "8")
        };
        assert!(failure_message(&with_stderr).ends_with("\nwarning: unused"));
    }

    #[test]
    fn test_compile_error_message_verbatim() {
        let result = ExecutionResult {
            compile_output: Some("syntax error line 3\n".to_string()),
            ..make_result(6, 0.0, 0)
        };
        assert_eq!(failure_message(&result), "syntax error line 3");
        assert_eq!(failure_message(&make_result(6, 0.0, 0)), "Compilation error");
    }

    #[test]
    fn test_runtime_error_message_fallbacks() {
        let result = ExecutionResult {
            stderr: Some("Segmentation fault".to_string()),
            ..make_result(11, 0.0, 0)
        };
        assert_eq!(failure_message(&result), "Segmentation fault");
        assert_eq!(failure_message(&make_result(13, 0.0, 0)), "Runtime error (status 13)");
    }
}
