use crate::error::StoreError;
use crate::store::{ProblemStore, StoreResult, StreakUpdater, SubmissionStore, UserStore};
use crate::types::{
    Difficulty, NewSubmission, Problem, Streak, Submission, SubmissionStatus, SubmissionUpdate,
    User,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

/// Redis key scheme - shared by the API and the CLI so both read and write
/// the same records

pub const PROBLEM_PREFIX: &str = "arena:problem";
pub const SUBMISSION_PREFIX: &str = "arena:submission";
pub const USER_PREFIX: &str = "arena:user";

pub fn problem_key(problem_id: &str) -> String {
    format!("{}:{}", PROBLEM_PREFIX, problem_id)
}

pub fn submission_key(id: &Uuid) -> String {
    format!("{}:{}", SUBMISSION_PREFIX, id)
}

pub fn user_key(user_id: &str) -> String {
    format!("{}:{}", USER_PREFIX, user_id)
}

pub fn solved_key(user_id: &str) -> String {
    format!("{}:{}:solved", USER_PREFIX, user_id)
}

/// Hash field holding the per-difficulty solved counter
pub fn difficulty_field(difficulty: Difficulty) -> String {
    format!("{}_solved", difficulty)
}

/// Pending -> terminal, never twice.
/// ARGV: status, passed, runtime, memory, has_message, message
const FINALIZE_SCRIPT: &str = r#"
if redis.call('HGET', KEYS[1], 'status') ~= 'pending' then
    return 0
end
redis.call('HSET', KEYS[1],
    'status', ARGV[1],
    'test_cases_passed', ARGV[2],
    'runtime', ARGV[3],
    'memory', ARGV[4])
if ARGV[5] == '1' then
    redis.call('HSET', KEYS[1], 'error_message', ARGV[6])
end
return 1
"#;

/// Credit a problem only for the caller whose SADD inserted it.
/// KEYS: solved set, user hash. ARGV: problem id, difficulty field
const CREDIT_SCRIPT: &str = r#"
if redis.call('SADD', KEYS[1], ARGV[1]) == 0 then
    return 0
end
redis.call('HINCRBY', KEYS[2], ARGV[2], 1)
redis.call('HINCRBY', KEYS[2], 'accepted_submissions', 1)
return 1
"#;

/// All judge collaborators backed by one Redis connection manager
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn connect(redis_url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    pub async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

fn parse_field<T: FromStr>(
    map: &HashMap<String, String>,
    key: &str,
    field: &str,
) -> StoreResult<T> {
    let raw = map
        .get(field)
        .ok_or_else(|| StoreError::corrupt(key, format!("missing field '{}'", field)))?;
    raw.parse()
        .map_err(|_| StoreError::corrupt(key, format!("bad value for '{}': {}", field, raw)))
}

fn counter(map: &HashMap<String, String>, field: &str) -> u64 {
    map.get(field).and_then(|v| v.parse().ok()).unwrap_or(0)
}

fn submission_fields(submission: &Submission) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("id", submission.id.to_string()),
        ("user_id", submission.user_id.clone()),
        ("problem_id", submission.problem_id.clone()),
        ("code", submission.code.clone()),
        ("language", submission.language.clone()),
        ("status", submission.status.to_string()),
        ("test_cases_passed", submission.test_cases_passed.to_string()),
        ("test_cases_total", submission.test_cases_total.to_string()),
        ("runtime", submission.runtime.to_string()),
        ("memory", submission.memory.to_string()),
        ("created_at", submission.created_at.to_rfc3339()),
    ];
    if let Some(message) = &submission.error_message {
        fields.push(("error_message", message.clone()));
    }
    fields
}

fn submission_from_fields(key: &str, map: &HashMap<String, String>) -> StoreResult<Submission> {
    let text = |field: &str| -> StoreResult<String> {
        map.get(field)
            .cloned()
            .ok_or_else(|| StoreError::corrupt(key, format!("missing field '{}'", field)))
    };

    let status_raw = text("status")?;
    let status = SubmissionStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::corrupt(key, format!("unknown status '{}'", status_raw)))?;
    let created_at = DateTime::parse_from_rfc3339(&text("created_at")?)
        .map_err(|e| StoreError::corrupt(key, format!("bad created_at: {}", e)))?
        .with_timezone(&Utc);

    Ok(Submission {
        id: parse_field(map, key, "id")?,
        user_id: text("user_id")?,
        problem_id: text("problem_id")?,
        code: text("code")?,
        language: text("language")?,
        status,
        test_cases_passed: parse_field(map, key, "test_cases_passed")?,
        test_cases_total: parse_field(map, key, "test_cases_total")?,
        runtime: parse_field(map, key, "runtime")?,
        memory: parse_field(map, key, "memory")?,
        error_message: map.get("error_message").cloned(),
        created_at,
    })
}

fn streak_from_fields(map: &HashMap<String, String>) -> Streak {
    Streak {
        current_streak: counter(map, "current_streak") as u32,
        longest_streak: counter(map, "longest_streak") as u32,
        last_solved_on: map
            .get("last_solved_on")
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
    }
}

#[async_trait]
impl ProblemStore for RedisStore {
    async fn get(&self, problem_id: &str) -> StoreResult<Option<Problem>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(problem_key(problem_id)).await?;

        match payload {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, problem: &Problem) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(problem)?;
        let _: () = conn.set(problem_key(&problem.id), payload).await?;
        Ok(())
    }
}

#[async_trait]
impl SubmissionStore for RedisStore {
    async fn create(&self, new: NewSubmission) -> StoreResult<Submission> {
        let submission = new.into_pending();
        let key = submission_key(&submission.id);

        let mut conn = self.conn.clone();
        let _: () = conn.hset_multiple(&key, &submission_fields(&submission)[..]).await?;

        debug!(submission_id = %submission.id, "Pending submission stored");
        Ok(submission)
    }

    async fn finalize(&self, id: &Uuid, update: &SubmissionUpdate) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let (has_message, message) = match &update.error_message {
            Some(m) => ("1", m.as_str()),
            None => ("0", ""),
        };

        let applied: i32 = redis::Script::new(FINALIZE_SCRIPT)
            .key(submission_key(id))
            .arg(update.status.as_str())
            .arg(update.test_cases_passed)
            .arg(update.runtime.to_string())
            .arg(update.memory)
            .arg(has_message)
            .arg(message)
            .invoke_async(&mut conn)
            .await?;

        Ok(applied == 1)
    }

    async fn get(&self, id: &Uuid) -> StoreResult<Option<Submission>> {
        let key = submission_key(id);
        let mut conn = self.conn.clone();
        let map: HashMap<String, String> = conn.hgetall(&key).await?;

        if map.is_empty() {
            return Ok(None);
        }
        submission_from_fields(&key, &map).map(Some)
    }
}

#[async_trait]
impl UserStore for RedisStore {
    async fn get(&self, user_id: &str) -> StoreResult<User> {
        let mut conn = self.conn.clone();
        let map: HashMap<String, String> = conn.hgetall(user_key(user_id)).await?;
        let solved_problems: HashSet<String> = conn.smembers(solved_key(user_id)).await?;

        Ok(User {
            id: user_id.to_string(),
            solved_problems,
            easy_solved: counter(&map, &difficulty_field(Difficulty::Easy)),
            medium_solved: counter(&map, &difficulty_field(Difficulty::Medium)),
            hard_solved: counter(&map, &difficulty_field(Difficulty::Hard)),
            accepted_submissions: counter(&map, "accepted_submissions"),
            total_submissions: counter(&map, "total_submissions"),
            streak: streak_from_fields(&map),
        })
    }

    async fn record_submission(&self, user_id: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.hincr(user_key(user_id), "total_submissions", 1).await?;
        Ok(())
    }

    async fn credit_solved(
        &self,
        user_id: &str,
        problem_id: &str,
        difficulty: Difficulty,
    ) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let credited: i32 = redis::Script::new(CREDIT_SCRIPT)
            .key(solved_key(user_id))
            .key(user_key(user_id))
            .arg(problem_id)
            .arg(difficulty_field(difficulty))
            .invoke_async(&mut conn)
            .await?;

        Ok(credited == 1)
    }
}

#[async_trait]
impl StreakUpdater for RedisStore {
    async fn update(&self, user_id: &str) -> StoreResult<()> {
        let key = user_key(user_id);
        let mut conn = self.conn.clone();
        let map: HashMap<String, String> = conn.hgetall(&key).await?;

        let next = streak_from_fields(&map).advance(Utc::now().date_naive());
        let mut fields = vec![
            ("current_streak", next.current_streak.to_string()),
            ("longest_streak", next.longest_streak.to_string()),
        ];
        if let Some(day) = next.last_solved_on {
            fields.push(("last_solved_on", day.format("%Y-%m-%d").to_string()));
        }
        let _: () = conn.hset_multiple(&key, &fields[..]).await?;

        debug!(user_id, current_streak = next.current_streak, "Streak updated");
        Ok(())
    }
}


/// Scripts run against a live server. Start one locally and use
/// `cargo test -p arena-common -- --ignored` (REDIS_URL overrides the address).
#[cfg(test)]
mod live_tests {
    use super::*;

    async fn store() -> RedisStore {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        RedisStore::connect(&url).await.expect("redis reachable")
    }

    fn pending_for(user_id: &str) -> NewSubmission {
        NewSubmission {
            user_id: user_id.to_string(),
            problem_id: "p1".to_string(),
            code: "int main() {}".to_string(),
            language: "cpp".to_string(),
            test_cases_total: 2,
        }
    }

    #[tokio::test]
    #[ignore = "needs a running Redis"]
    async fn test_finalize_applies_once() {
        let store = store().await;
        let created = store.create(pending_for("live-finalize")).await.unwrap();

        let accepted = SubmissionUpdate {
            status: SubmissionStatus::Accepted,
            test_cases_passed: 2,
            runtime: 0.25,
            memory: 2048,
            error_message: None,
        };
        assert!(store.finalize(&created.id, &accepted).await.unwrap());

        let late = SubmissionUpdate {
            status: SubmissionStatus::Error,
            test_cases_passed: 0,
            runtime: 0.0,
            memory: 0,
            error_message: Some("late close".to_string()),
        };
        assert!(!store.finalize(&created.id, &late).await.unwrap());

        let stored = SubmissionStore::get(&store, &created.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubmissionStatus::Accepted);
        assert_eq!(stored.test_cases_passed, 2);
        assert_eq!(stored.memory, 2048);
        assert_eq!(stored.error_message, None);

        // Unknown ids are never "pending"
        assert!(!store.finalize(&Uuid::new_v4(), &accepted).await.unwrap());
    }

    #[tokio::test]
    #[ignore = "needs a running Redis"]
    async fn test_credit_solved_counts_once() {
        let store = store().await;
        let user_id = format!("live-credit-{}", Uuid::new_v4());

        let (a, b) = tokio::join!(
            store.credit_solved(&user_id, "p1", Difficulty::Hard),
            store.credit_solved(&user_id, "p1", Difficulty::Hard)
        );
        assert!(a.unwrap() ^ b.unwrap());

        assert!(!store.credit_solved(&user_id, "p1", Difficulty::Hard).await.unwrap());
        assert!(store.credit_solved(&user_id, "p2", Difficulty::Easy).await.unwrap());
        store.record_submission(&user_id).await.unwrap();

        let user = UserStore::get(&store, &user_id).await.unwrap();
        assert_eq!(user.hard_solved, 1);
        assert_eq!(user.easy_solved, 1);
        assert_eq!(user.accepted_submissions, 2);
        assert_eq!(user.total_submissions, 1);
        assert_eq!(user.solved_problems.len(), 2);
    }
}
