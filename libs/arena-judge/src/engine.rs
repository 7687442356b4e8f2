/// Execution Backend - Abstraction over the Remote Code Runner
///
/// **Core Responsibility:**
/// Move execution requests to the sandboxed backend and bring raw status
/// reports back.
///
/// **Critical Architectural Boundary:**
/// - Backend knows HOW to talk to the runner (Judge0 batch HTTP API)
/// - Backend does NOT interpret status ids
/// - Backend does NOT wait for completion (the poller does)
/// - Backend does NOT decide verdicts (the evaluator does)
///
/// The trait methods are raw transport. Contract checks on what comes back
/// (lengths, tokens) live in [`submit_batch`] and in the poller so every
/// backend implementation gets them for free.
use crate::error::{JudgeError, JudgeResult};
use arena_common::config::BackendConfig;
use arena_common::types::{ExecutionRequest, ExecutionResult, ExecutionToken};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, instrument, warn};

/// Fields requested on every status query
const STATUS_FIELDS: &str = "token,status_id,stdout,stderr,compile_output,time,memory,expected_output";

/// One element of the batch-submit response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitEntry {
    #[serde(default)]
    pub token: Option<String>,
}

/// One element of the batch-status response
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusEntry {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub status_id: Option<u32>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub compile_output: Option<String>,
    /// Judge0 reports seconds as a decimal string ("0.002")
    #[serde(default, deserialize_with = "seconds")]
    pub time: Option<f64>,
    #[serde(default)]
    pub memory: Option<u64>,
    #[serde(default)]
    pub expected_output: Option<String>,
}

impl StatusEntry {
    /// Convert into a result; the entry must carry a status id
    pub fn into_result(self) -> JudgeResult<ExecutionResult> {
        let status_id = self.status_id.ok_or_else(|| {
            JudgeError::InvalidResponse(format!(
                "status entry for token {:?} has no status_id",
                self.token
            ))
        })?;

        Ok(ExecutionResult {
            status_id,
            stdout: self.stdout,
            stderr: self.stderr,
            compile_output: self.compile_output,
            time: self.time.unwrap_or(0.0),
            memory: self.memory.unwrap_or(0),
            expected_output: self.expected_output,
        })
    }
}

fn seconds<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Transport to a code-execution service
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Queue every request in one call. Not idempotent.
    async fn post_batch(&self, requests: &[ExecutionRequest]) -> JudgeResult<Vec<SubmitEntry>>;

    /// Fetch the current state of every token in one call
    async fn fetch_batch(&self, tokens: &[ExecutionToken]) -> JudgeResult<Vec<StatusEntry>>;
}

/// Submit all requests as one batch and return one token per request, in order.
///
/// Fails with `InvalidResponse` if the backend does not answer with exactly
/// one token-bearing entry per request. Never retried: a second call would
/// queue a second set of jobs.
#[instrument(skip_all, fields(cases = requests.len()))]
pub async fn submit_batch(
    backend: &dyn ExecutionBackend,
    requests: &[ExecutionRequest],
) -> JudgeResult<Vec<ExecutionToken>> {
    if requests.is_empty() {
        return Ok(Vec::new());
    }

    let entries = backend.post_batch(requests).await?;

    if entries.len() != requests.len() {
        return Err(JudgeError::InvalidResponse(format!(
            "submitted {} cases but received {} entries",
            requests.len(),
            entries.len()
        )));
    }

    let tokens = entries
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| {
            entry
                .token
                .filter(|t| !t.trim().is_empty())
                .map(ExecutionToken)
                .ok_or_else(|| {
                    JudgeError::InvalidResponse(format!("batch entry {} carries no token", idx))
                })
        })
        .collect::<JudgeResult<Vec<_>>>()?;

    debug!(tokens = tokens.len(), "Batch queued");
    Ok(tokens)
}

#[derive(Serialize)]
struct BatchSubmitBody<'a> {
    submissions: &'a [ExecutionRequest],
}

#[derive(Deserialize)]
struct BatchStatusBody {
    submissions: Vec<StatusEntry>,
}

/// HTTP client for a Judge0-compatible backend
///
/// **Error Mapping:**
/// - connect failures, request timeouts, HTTP 5xx and 429 -> `BackendUnavailable`
/// - any other non-2xx, or a body that does not decode -> `InvalidResponse`
///
/// Response bodies of failed calls are logged at debug level and never
/// copied into the returned error.
#[derive(Debug, Clone)]
pub struct Judge0Client {
    base_url: String,
    client: reqwest::Client,
    api_key: Option<String>,
    api_host: Option<String>,
}

impl Judge0Client {
    pub fn new(config: &BackendConfig) -> JudgeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| JudgeError::BackendUnavailable(format!("http client setup: {}", e)))?;

        info!(base_url = %config.base_url, "Judge0 client configured");

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            api_key: config.api_key.clone(),
            api_host: config.api_host.clone(),
        })
    }

    fn batch_url(&self) -> String {
        format!("{}/submissions/batch", self.base_url)
    }

    fn with_auth(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(key) = &self.api_key {
            request = request.header("X-RapidAPI-Key", key);
        }
        if let Some(host) = &self.api_host {
            request = request.header("X-RapidAPI-Host", host);
        }
        request
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> JudgeResult<reqwest::Response> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!(status = %status, body = %body, "Backend rejected request");

        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!(status = %status, "Execution backend unavailable");
            Err(JudgeError::BackendUnavailable(format!("HTTP {}", status.as_u16())))
        } else {
            Err(JudgeError::InvalidResponse(format!("HTTP {}", status.as_u16())))
        }
    }
}

fn transport_error(e: reqwest::Error) -> JudgeError {
    if e.is_decode() {
        JudgeError::InvalidResponse(format!("undecodable body: {}", e))
    } else {
        JudgeError::BackendUnavailable(e.without_url().to_string())
    }
}

#[async_trait]
impl ExecutionBackend for Judge0Client {
    async fn post_batch(&self, requests: &[ExecutionRequest]) -> JudgeResult<Vec<SubmitEntry>> {
        let request = self
            .client
            .post(self.batch_url())
            .query(&[("base64_encoded", "false")])
            .json(&BatchSubmitBody {
                submissions: requests,
            });

        let response = self.send(self.with_auth(request)).await?;
        response.json().await.map_err(transport_error)
    }

    async fn fetch_batch(&self, tokens: &[ExecutionToken]) -> JudgeResult<Vec<StatusEntry>> {
        let joined = tokens
            .iter()
            .map(ExecutionToken::as_str)
            .collect::<Vec<_>>()
            .join(",");

        let request = self.client.get(self.batch_url()).query(&[
            ("tokens", joined.as_str()),
            ("base64_encoded", "false"),
            ("fields", STATUS_FIELDS),
        ]);

        let response = self.send(self.with_auth(request)).await?;
        let body: BatchStatusBody = response.json().await.map_err(transport_error)?;
        Ok(body.submissions)
    }
}
