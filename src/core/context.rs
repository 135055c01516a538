use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::DbError;

/// Request-scoped state passed alongside every driver call.
///
/// A context carries the cancellation signal, an optional deadline and an
/// optional retry limit. Contexts are never mutated in place: every `with_*`
/// method derives a child whose cancellation is linked to the parent, so
/// cancelling a parent cancels everything derived from it while cancelling a
/// child leaves the parent untouched.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
    max_retries: Option<usize>,
}

impl Context {
    /// Root context: never cancelled unless [`Context::cancel`] is called on it.
    pub fn background() -> Self {
        Self::default()
    }

    fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            max_retries: self.max_retries,
        }
    }

    /// Child context that can be cancelled independently of its parent.
    pub fn with_cancel(&self) -> Self {
        self.child()
    }

    /// Child context that expires after `timeout`, or at the parent's
    /// deadline if that comes first.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        let mut child = self.child();
        child.deadline = Some(match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        });
        child
    }

    /// Child context carrying a retry limit for the retry executor.
    pub fn with_max_retries(&self, max_retries: usize) -> Self {
        let mut child = self.child();
        child.max_retries = Some(max_retries);
        child
    }

    pub fn max_retries(&self) -> Option<usize> {
        self.max_retries
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancels this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Why the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<DbError> {
        if self.token.is_cancelled() {
            return Some(DbError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(DbError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Like [`Context::done`], but yields the reason.
    pub async fn done_err(&self) -> DbError {
        self.done().await;
        self.err().unwrap_or(DbError::Canceled)
    }
}
