//! Cancellation and deadlines for provider calls.

use crate::error::{CancelReason, Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Per-call context handed to every provider operation.
///
/// Each remote request an adapter makes is driven through [`CallContext::run`],
/// so a fired token or an elapsed deadline surfaces as [`Error::Cancelled`]
/// rather than as a transport failure.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context with a fresh token and no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A context bound to an existing token.
    #[must_use]
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Set a deadline relative to now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Set an absolute deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Derive a context that is cancelled with this one but can also be
    /// cancelled on its own.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// The underlying token.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Fail early if the context is already done.
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(Error::cancelled(operation, CancelReason::Cancelled));
        }
        if self.deadline.is_some_and(|d| d <= Instant::now()) {
            return Err(Error::cancelled(operation, CancelReason::DeadlineExceeded));
        }
        Ok(())
    }

    /// Drive `future` to completion unless the context is cancelled or the
    /// deadline passes first.
    pub async fn run<T, F>(&self, operation: &str, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check(operation)?;

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.token.cancelled() => {
                debug!(operation, "Provider call cancelled");
                Err(Error::cancelled(operation, CancelReason::Cancelled))
            }
            () = deadline => {
                debug!(operation, "Provider call exceeded its deadline");
                Err(Error::cancelled(operation, CancelReason::DeadlineExceeded))
            }
            result = future => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_passes_through_result() {
        let ctx = CallContext::new();
        let value = ctx.run("noop", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_run_passes_through_error() {
        let ctx = CallContext::new();
        let err = ctx
            .run::<(), _>("get blob", async {
                Err(Error::transport("github", "o/r", "boom"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }

    #[tokio::test]
    async fn test_already_cancelled_context_fails_before_request() {
        let ctx = CallContext::new();
        ctx.cancel();

        let mut issued = false;
        let err = ctx
            .run("list directory", async {
                issued = true;
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(!issued);
    }

    #[tokio::test]
    async fn test_cancel_during_call() {
        let ctx = CallContext::new();
        let canceller = ctx.clone();

        let handle = tokio::spawn(async move {
            ctx.run("get pull request", std::future::pending::<Result<()>>())
                .await
        });
        canceller.cancel();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            Error::Cancelled {
                reason: CancelReason::Cancelled,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let ctx = CallContext::new().with_timeout(Duration::from_secs(5));
        let err = ctx
            .run("create check run", std::future::pending::<Result<()>>())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Cancelled {
                reason: CancelReason::DeadlineExceeded,
                ..
            }
        ));
    }

    #[test]
    fn test_child_follows_parent() {
        let parent = CallContext::new();
        let child = parent.child();
        parent.cancel();
        assert!(child.check("op").is_err());
    }

    #[test]
    fn test_child_cancel_leaves_parent() {
        let parent = CallContext::new();
        let child = parent.child();
        child.cancel();
        assert!(parent.check("op").is_ok());
    }
}
