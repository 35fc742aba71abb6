// src/client/retry.rs

//! Bounded retries with exponential backoff for external requests.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RetrySection;

/// Outcome of a single failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    /// Transport failure, 5xx or 429: worth another try.
    Transient(String),
    /// Anything else: retrying will not help.
    Permanent(String),
}

impl AttemptError {
    pub fn message(&self) -> &str {
        match self {
            AttemptError::Transient(m) | AttemptError::Permanent(m) => m,
        }
    }

    /// Classify a reqwest transport error.
    pub fn from_transport(err: reqwest::Error) -> Self {
        AttemptError::Transient(err.to_string())
    }

    /// Classify a non-success HTTP status with the message extracted from
    /// its body.
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            AttemptError::Transient(message)
        } else {
            AttemptError::Permanent(message)
        }
    }
}

/// Backoff before retry number `attempt` (0-based): exponential, capped,
/// with 0.8x-1.2x jitter.
pub fn calculate_backoff(attempt: u32, policy: &RetrySection) -> Duration {
    let factor = 1u64 << attempt.min(32);
    let ms = policy
        .initial_backoff_ms
        .saturating_mul(factor)
        .min(policy.max_backoff_ms);
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

/// Run `attempt` until it succeeds, fails permanently, or has been retried
/// `policy.max_retries` times.
pub async fn with_retries<T, F, Fut>(
    policy: &RetrySection,
    what: &str,
    mut attempt: F,
) -> std::result::Result<T, AttemptError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, AttemptError>>,
{
    let mut retries = 0;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(AttemptError::Transient(message)) if retries < policy.max_retries => {
                let backoff = calculate_backoff(retries, policy);
                warn!(
                    request = %what,
                    attempt = retries + 1,
                    max_retries = policy.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %message,
                    "retrying request"
                );
                tokio::time::sleep(backoff).await;
                retries += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
