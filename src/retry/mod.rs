//! Retry loop for statements that hit serialization conflicts.
//!
//! [`execute`] re-runs a single-attempt closure while it fails with a
//! retryable error ([`DbError::is_retryable`]), sleeping with exponential
//! backoff between attempts. The loop stops on success, on the first
//! non-retryable error, when the retry budget is spent, or when the context
//! is done. The budget comes from [`Context::max_retries`] when the caller
//! set one, otherwise from [`RetryPolicy::max_retries`].
//!
//! Errors are returned exactly as the attempt produced them, including the
//! last conflict when the budget runs out.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::{Context, DbError, Result};

pub const DEFAULT_MAX_RETRIES: usize = 50;
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_millis(5);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_millis(100);

/// Backoff and budget settings for the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt, used when the context carries none.
    pub max_retries: usize,
    /// Delay before the first retry.
    pub base_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff: DEFAULT_BASE_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = backoff;
        self
    }

    /// Retry budget for a call made under `ctx`.
    pub fn budget(&self, ctx: &Context) -> usize {
        ctx.max_retries().unwrap_or(self.max_retries)
    }

    /// Delay before retry number `retry` (1-based), doubling up to the cap.
    pub fn backoff(&self, retry: usize) -> Duration {
        let cap = self.max_backoff.max(self.base_backoff);
        let doublings = retry.saturating_sub(1).min(31) as u32;
        self.base_backoff.saturating_mul(1 << doublings).min(cap)
    }

    /// Decides what to do after `attempt` (1-based) failed with `err`: sleeps
    /// for the backoff and returns `Ok` when another attempt should follow.
    ///
    /// Returns the error back when the loop must stop. Loops that cannot be
    /// expressed as a single-attempt closure drive retries through this.
    pub async fn after_failure(&self, ctx: &Context, attempt: usize, err: DbError) -> Result<()> {
        if !err.is_retryable() {
            return Err(err);
        }
        let budget = self.budget(ctx);
        if attempt > budget {
            warn!(attempts = attempt, budget, error = %err, "retry budget exhausted");
            return Err(err);
        }

        let delay = self.backoff(attempt);
        debug!(attempt, ?delay, error = %err, "retrying after serialization conflict");
        tokio::select! {
            biased;
            reason = ctx.done_err() => Err(reason),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

/// Runs `op` under the default [`RetryPolicy`].
pub async fn execute<T, F, Fut>(ctx: &Context, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    execute_with(&RetryPolicy::default(), ctx, op).await
}

/// Runs `op`, retrying serialization conflicts as described in the module
/// docs. Each call of `op` must perform exactly one attempt.
pub async fn execute_with<T, F, Fut>(policy: &RetryPolicy, ctx: &Context, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        if let Some(reason) = ctx.err() {
            return Err(reason);
        }
        attempt += 1;

        let outcome = tokio::select! {
            biased;
            reason = ctx.done_err() => return Err(reason),
            outcome = op() => outcome,
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(err) => policy.after_failure(ctx, attempt, err).await?,
        }
    }
}
