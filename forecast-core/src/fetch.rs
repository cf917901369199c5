//! Resilient upstream fetching.
//!
//! Every attempt is bounded by a timeout covering both the request and the
//! body read. Timeouts, network failures and 5xx responses are retried with
//! exponential backoff; any other non-success status is terminal and returned
//! immediately. Responses are never served from an intermediate cache.

use std::time::Duration;

use reqwest::header::{CACHE_CONTROL, PRAGMA};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-upstream retry budget. Worst case wall time is roughly
/// `timeout * (max_retries + 1)` plus the backoff delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: 8_000,
            max_retries: 2,
            backoff_base_ms: 300,
        }
    }
}

impl RetryPolicy {
    pub fn new(timeout_ms: u64, max_retries: u32, backoff_base_ms: u64) -> Self {
        Self {
            timeout_ms,
            max_retries,
            backoff_base_ms,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Delay before retry `retry` (0-indexed): `backoff_base * 2^retry`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-retryable status (4xx or anything else that is neither success nor 5xx).
    #[error("upstream returned status {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// Every attempt failed with a retryable condition.
    #[error("upstream unavailable after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: String },

    #[error("failed to decode upstream response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to build upstream request: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    /// Whether the failure came from a transient condition (timeout, network
    /// error, 5xx). Only `Exhausted` qualifies; its retry budget is spent.
    /// Terminal statuses, undecodable bodies and unbuildable requests would
    /// fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Exhausted { .. })
    }

    /// The last observed status, when the failure came from an HTTP response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Outcome of one attempt that did not produce a usable body.
#[derive(Debug)]
enum AttemptFailure {
    Retryable(String),
    Terminal(FetchError),
}

/// Whether an HTTP status warrants another attempt.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
}

/// Shared HTTP client plus the retry loop.
#[derive(Debug, Clone)]
pub struct Fetcher {
    http: Client,
}

impl Fetcher {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self { http })
    }

    /// GET `url` with `query`, retrying per `policy`, and return the body text.
    pub async fn get_text(
        &self,
        url: &str,
        query: &[(&str, String)],
        policy: &RetryPolicy,
    ) -> Result<String, FetchError> {
        let attempts = policy.max_retries.saturating_add(1);
        let mut last = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = policy.delay_for_retry(attempt - 1);
                tracing::debug!(url, attempt, ?delay, "backing off before retry");
                tokio::time::sleep(delay).await;
            }

            match self.attempt(url, query, policy.timeout()).await {
                Ok(body) => {
                    if attempt > 0 {
                        tracing::info!(url, retries = attempt, "upstream succeeded after retry");
                    }
                    return Ok(body);
                }
                Err(AttemptFailure::Terminal(err)) => {
                    tracing::warn!(url, error = %err, "terminal upstream failure");
                    return Err(err);
                }
                Err(AttemptFailure::Retryable(reason)) => {
                    tracing::warn!(
                        url,
                        attempt = attempt + 1,
                        of = attempts,
                        %reason,
                        "retryable upstream failure"
                    );
                    last = reason;
                }
            }
        }

        Err(FetchError::Exhausted { attempts, last })
    }

    /// GET and decode JSON, see [`Fetcher::get_text`].
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        policy: &RetryPolicy,
    ) -> Result<T, FetchError> {
        let body = self.get_text(url, query, policy).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn attempt(
        &self,
        url: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<String, AttemptFailure> {
        let request = self
            .http
            .get(url)
            .query(query)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache");

        let call = async {
            let res = request.send().await?;
            let status = res.status();
            let body = res.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let (status, body) = match tokio::time::timeout(timeout, call).await {
            Err(_) => {
                return Err(AttemptFailure::Retryable(format!("timed out after {timeout:?}")));
            }
            Ok(Err(e)) if e.is_builder() => {
                return Err(AttemptFailure::Terminal(FetchError::Client(e)));
            }
            Ok(Err(e)) => {
                return Err(AttemptFailure::Retryable(format!("network error: {e}")));
            }
            Ok(Ok(pair)) => pair,
        };

        if status.is_success() {
            Ok(body)
        } else if is_retryable_status(status) {
            Err(AttemptFailure::Retryable(format!("status {status}")))
        } else {
            Err(AttemptFailure::Terminal(FetchError::Status {
                status,
                body: truncate_body(&body),
            }))
        }
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
