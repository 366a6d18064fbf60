//! Retry with exponential backoff for summarizer API calls.
//!
//! Memory blocks tolerate a failed summarizer call (the message is skipped
//! or the block truncates), but skipping is lossy, so transient failures
//! (429, 5xx, 408, connection drops) are retried first. Bad requests and auth
//! failures are returned immediately.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries (0 = a single attempt).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Backoff multiplier applied per attempt.
    pub multiplier: f64,
    /// Scale delays down by a per-attempt factor so concurrent sessions
    /// don't retry in lockstep.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Default backoff with the given number of retries.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..Default::default()
        }
    }

    /// A config that never retries.
    pub fn none() -> Self {
        Self::with_retries(0)
    }

    /// Delay before retry number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());
        if !self.jitter {
            return Duration::from_secs_f64(capped);
        }
        // Deterministic factors.
        let factor = [0.75, 0.90, 0.60, 0.85][(attempt % 4) as usize];
        Duration::from_secs_f64(capped * factor)
    }
}

/// Whether an error string from the chat client indicates a retryable failure.
pub fn is_transient_error(error: &str) -> bool {
    if ["408", "429", "500", "502", "503", "504"]
        .iter()
        .any(|s| error.contains(&format!("HTTP {s}")))
    {
        return true;
    }

    let lower = error.to_lowercase();
    [
        "request failed:",
        "failed to read response",
        "connection reset",
        "connection refused",
        "timed out",
        "timeout",
        "broken pipe",
    ]
    .iter()
    .any(|p| lower.contains(p))
}

/// Whether an error string indicates a failure that retrying cannot fix.
pub fn is_permanent_error(error: &str) -> bool {
    [
        "HTTP 400",
        "HTTP 401",
        "HTTP 402",
        "HTTP 403",
        "HTTP 404",
        "HTTP 422",
        "bad request",
        "unauthorized",
    ]
    .iter()
    .any(|p| error.contains(p))
}

/// Run `call` until it succeeds, fails permanently, or retries run out.
pub async fn retry_api_call<T, F, Fut>(config: &RetryConfig, mut call: F) -> Result<T, String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(v) => return Ok(v),
            Err(e)
                if attempt < config.max_retries
                    && is_transient_error(&e)
                    && !is_permanent_error(&e) =>
            {
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    "Transient summarizer API error (attempt {}/{}): {e}. Retrying in {delay:?}...",
                    attempt + 1,
                    config.max_retries,
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
