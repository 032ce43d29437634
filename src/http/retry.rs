//! Retry policy with backoff
//!
//! A single policy object decides how many attempts a logical request gets
//! and how long to wait between them. It knows nothing about HTTP beyond
//! `Error::is_retryable`, so it can be exercised with plain closures.

use crate::error::{Error, Result};
use crate::types::BackoffType;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Attempt limit and backoff schedule for one logical request
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_backoff: Duration,
    /// Upper bound for any single delay
    pub max_backoff: Duration,
    /// How the delay grows between retries
    pub backoff_type: BackoffType,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            backoff_type: BackoffType::Exponential,
        }
    }
}

impl RetryPolicy {
    /// Policy allowing `max_retries` retries after the first attempt
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_attempts: max_retries.saturating_add(1),
            ..Self::default()
        }
    }

    /// Set the backoff schedule
    #[must_use]
    pub fn backoff(mut self, backoff_type: BackoffType, base: Duration, max: Duration) -> Self {
        self.backoff_type = backoff_type;
        self.base_backoff = base;
        self.max_backoff = max;
        self
    }

    /// Delay before retry number `retry` (0 = first retry)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let delay = match self.backoff_type {
            BackoffType::Constant => self.base_backoff,
            BackoffType::Linear => self.base_backoff.saturating_mul(retry.saturating_add(1)),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(retry);
                self.base_backoff.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.max_backoff)
    }

    /// Run `op` until it succeeds, fails definitively, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. Retryable failures are
    /// absorbed with a backoff sleep; the final failure is collapsed into
    /// `RequestFailure` / `RateLimitExceeded` via `Error::into_request_failure`.
    pub async fn execute<T, F, Fut>(&self, label: &str, op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_until(label, &CancellationToken::new(), op).await
    }

    /// Like `execute`, but a cancelled `cancel` cuts any backoff sleep short
    /// with `Error::Cancelled` instead of issuing the next attempt.
    pub async fn execute_until<T, F, Fut>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut ctx = RetryContext::default();

        loop {
            ctx.attempt += 1;
            match op(ctx.attempt).await {
                Ok(value) => {
                    if ctx.attempt > 1 {
                        debug!("{label} succeeded on attempt {}/{max_attempts}", ctx.attempt);
                    }
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && ctx.attempt < max_attempts => {
                    let delay = self.delay_for(ctx.attempt - 1);
                    ctx.record_failure(&err, delay);
                    warn!(
                        "{label} failed ({}), attempt {}/{max_attempts}, retrying in {delay:?}",
                        ctx.last_error().unwrap_or_default(),
                        ctx.attempt,
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            debug!("{label} abandoned during backoff");
                            return Err(Error::Cancelled);
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                Err(err) => return Err(err.into_request_failure(ctx.attempt)),
            }
        }
    }
}

/// Per-request retry bookkeeping; lives only for one `execute` call
#[derive(Debug, Clone, Default)]
pub struct RetryContext {
    attempt: u32,
    last_error: Option<String>,
    last_delay: Option<Duration>,
}

impl RetryContext {
    /// Attempts made so far
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Description of the most recent retryable failure
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Most recent backoff delay
    pub fn last_delay(&self) -> Option<Duration> {
        self.last_delay
    }

    fn record_failure(&mut self, err: &Error, delay: Duration) {
        self.last_error = Some(err.to_string());
        self.last_delay = Some(delay);
    }
}
