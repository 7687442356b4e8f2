// CLI commands for the Arena judge
use anyhow::{bail, Context, Result};
use arena_common::config::AppConfig;
use arena_common::redis::RedisStore;
use arena_common::store::ProblemStore;
use arena_common::types::{ExecutionResult, Problem, TestCase};
use arena_judge::evaluator::aggregate;
use arena_judge::executor::execute_cases;
use arena_judge::{Judge0Client, LanguageResolver, PollPolicy};
use std::fs;
use std::path::Path;

fn load_resolver(config: &AppConfig) -> Result<LanguageResolver> {
    LanguageResolver::load_or_default(&config.languages_config)
        .with_context(|| format!("Failed to load {}", config.languages_config))
}

/// Read and validate a problem definition
fn load_problem(path: &Path) -> Result<Problem> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let problem: Problem = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    if problem.id.trim().is_empty() {
        bail!("Problem in {} has an empty id", path.display());
    }
    Ok(problem)
}

/// Print the resolver's language table
pub fn list_languages() -> Result<()> {
    let config = AppConfig::from_env();
    let resolver = load_resolver(&config)?;

    println!("{:<12} {:>4}  {}", "LANGUAGE", "ID", "ALIASES");
    for entry in resolver.languages() {
        println!(
            "{:<12} {:>4}  {}",
            entry.name,
            entry.language_id,
            entry.aliases.join(", ")
        );
    }
    Ok(())
}

/// Store a problem in Redis so the API can serve it
pub async fn import_problem(file: &Path) -> Result<()> {
    let problem = load_problem(file)?;
    let config = AppConfig::from_env();

    let store = RedisStore::connect(&config.redis_url)
        .await
        .context("Failed to connect to Redis")?;
    store
        .put(&problem)
        .await
        .with_context(|| format!("Failed to store problem {}", problem.id))?;

    println!(
        "✅ Imported problem '{}' ({}, {} visible / {} hidden cases)",
        problem.id,
        problem.difficulty,
        problem.visible_test_cases.len(),
        problem.hidden_test_cases.len()
    );
    Ok(())
}

fn one_line(text: &str, width: usize) -> String {
    let flat = text.trim_end().replace('\n', "\\n");
    if flat.chars().count() > width {
        let cut: String = flat.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        flat
    }
}

fn case_row(idx: usize, case: &TestCase, result: &ExecutionResult) -> String {
    format!(
        "{:>3}  {:<18} {:>7.3}s {:>8}kB  {:<20} {}",
        idx + 1,
        format!("{:?}", result.status()),
        result.time,
        result.memory,
        one_line(&case.output, 20),
        one_line(result.stdout.as_deref().unwrap_or(""), 20)
    )
}

/// Judge a local source file against a problem file without touching Redis
pub async fn run_source(problem: &Path, language: &str, source: &Path, hidden: bool) -> Result<()> {
    let problem = load_problem(problem)?;
    let code = fs::read_to_string(source)
        .with_context(|| format!("Failed to read {}", source.display()))?;

    let config = AppConfig::from_env();
    let resolver = load_resolver(&config)?;
    let resolved = resolver.resolve(language)?;

    let cases = if hidden {
        &problem.hidden_test_cases
    } else {
        &problem.visible_test_cases
    };
    if cases.is_empty() {
        bail!(
            "Problem '{}' has no {} test cases",
            problem.id,
            if hidden { "hidden" } else { "visible" }
        );
    }

    println!(
        "🚀 Judging {} ({}) against {} case(s) of '{}'",
        source.display(),
        resolved.name,
        cases.len(),
        problem.id
    );

    let backend = Judge0Client::new(&config.backend)?;
    let policy = PollPolicy::from(config.poll);

    let results = execute_cases(&backend, &policy, &code, resolved.language_id, cases).await?;

    println!();
    println!(
        "{:>3}  {:<18} {:>8} {:>10}  {:<20} {}",
        "#", "STATUS", "TIME", "MEMORY", "EXPECTED", "ACTUAL"
    );
    for (idx, (case, result)) in cases.iter().zip(&results).enumerate() {
        println!("{}", case_row(idx, case, result));
    }

    let verdict = aggregate(&results);
    println!();
    println!(
        "Verdict: {} ({}/{} passed, {:.3}s, {}kB)",
        verdict.outcome,
        verdict.test_cases_passed,
        verdict.test_cases_total,
        verdict.runtime,
        verdict.memory
    );
    if let Some(message) = &verdict.error_message {
        println!("{}", message);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_one_line_flattens_and_truncates() {
        assert_eq!(one_line("1\n2\n", 20), "1\\n2");
        assert_eq!(one_line("abcdefghij", 6), "abc...");
        assert_eq!(one_line("abc", 6), "abc");
    }

    #[test]
    fn test_load_problem_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "id": "two-sum",
                "title": "Two Sum",
                "difficulty": "easy",
                "visible_test_cases": [{{"input": "1 2", "output": "3"}}],
                "hidden_test_cases": [],
                "start_code": {{}},
                "reference_solution": {{}}
            }}"#
        )
        .unwrap();

        let problem = load_problem(file.path()).unwrap();
        assert_eq!(problem.id, "two-sum");
        assert_eq!(problem.visible_test_cases.len(), 1);
        assert!(problem.hidden_test_cases.is_empty());
    }

    #[test]
    fn test_case_row_shows_expected_and_actual() {
        let case = TestCase {
            input: "2 3".to_string(),
            output: "5".to_string(),
        };
        let result = ExecutionResult {
            status_id: 4,
            stdout: Some("6\n".to_string()),
            stderr: None,
            compile_output: None,
            time: 0.012,
            memory: 900,
            expected_output: Some("5".to_string()),
        };

        let row = case_row(0, &case, &result);
        assert!(row.starts_with("  1  WrongAnswer"), "{}", row);
        assert!(row.contains("0.012s"));
        assert!(row.contains("900kB"));
        assert!(row.trim_end().ends_with('6'));
    }

    #[test]
    fn test_load_problem_rejects_blank_id() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"id": " ", "title": "x", "difficulty": "hard",
                "visible_test_cases": [], "hidden_test_cases": [],
                "start_code": {{}}, "reference_solution": {{}}}}"#
        )
        .unwrap();

        assert!(load_problem(file.path()).is_err());
    }
}
