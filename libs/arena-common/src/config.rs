// Application configuration, read from the environment with local defaults

use std::env;
use std::time::Duration;

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_JUDGE0_URL: &str = "http://127.0.0.1:2358";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_LANGUAGES_CONFIG: &str = "config/languages.json";

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    /// Sent as X-RapidAPI-Key when set
    pub api_key: Option<String>,
    /// Sent as X-RapidAPI-Host when set
    pub api_host: Option<String>,
    pub http_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollConfig {
    pub initial_interval: Duration,
    pub backoff: f64,
    pub max_interval: Duration,
    pub max_wait: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(1000),
            backoff: 1.5,
            max_interval: Duration::from_millis(2000),
            max_wait: Duration::from_millis(30_000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub redis_url: String,
    pub bind_addr: String,
    pub languages_config: String,
    pub json_logs: bool,
    pub backend: BackendConfig,
    pub poll: PollConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparsable, zero or
    /// non-finite numbers fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let millis = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        let poll_defaults = PollConfig::default();
        let backoff = lookup("POLL_BACKOFF")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|b| b.is_finite() && *b >= 1.0)
            .unwrap_or(poll_defaults.backoff);

        Self {
            redis_url: text("REDIS_URL", DEFAULT_REDIS_URL),
            bind_addr: text("BIND_ADDR", DEFAULT_BIND_ADDR),
            languages_config: text("LANGUAGES_CONFIG", DEFAULT_LANGUAGES_CONFIG),
            json_logs: lookup("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            backend: BackendConfig {
                base_url: text("JUDGE0_URL", DEFAULT_JUDGE0_URL),
                api_key: lookup("JUDGE0_API_KEY").filter(|v| !v.is_empty()),
                api_host: lookup("JUDGE0_API_HOST").filter(|v| !v.is_empty()),
                http_timeout: millis("JUDGE0_HTTP_TIMEOUT_MS", Duration::from_secs(10)),
            },
            poll: PollConfig {
                initial_interval: millis("POLL_INTERVAL_MS", poll_defaults.initial_interval),
                backoff,
                max_interval: millis("POLL_MAX_INTERVAL_MS", poll_defaults.max_interval),
                max_wait: millis("POLL_MAX_WAIT_MS", poll_defaults.max_wait),
            },
        }
    }
}
