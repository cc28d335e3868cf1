//! Explicit cancellation and deadline propagation.
//!
//! Every verification call carries an [`ExecContext`] down to the point where
//! a reviewer subprocess is awaited. The context races the awaited future
//! against its cancellation token and its deadline; whichever fires first wins
//! and the future is dropped.
//!
//! ```
//! use mergegate::context::ExecContext;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let root = ExecContext::new();
//! let child = root.child_with_timeout(Duration::from_secs(300));
//! assert!(child.deadline().is_some());
//!
//! let value = child.run(async { 42 }).await;
//! assert_eq!(value, Ok(42));
//! # }
//! ```

use crate::errors::ContextError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation token plus optional deadline.
///
/// Cloning shares the same token. Child contexts are cancelled when their
/// parent is, but cancelling a child leaves the parent untouched.
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl ExecContext {
    /// A root context with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// A root context that expires after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().child_with_timeout(timeout)
    }

    /// Derive a child whose deadline is the earlier of the parent's and
    /// `now + timeout`.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Derive a child that inherits the parent's deadline.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Drive `fut` to completion unless the context is cancelled or its
    /// deadline passes first. On interruption `fut` is dropped.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, ContextError>
    where
        F: Future,
    {
        if self.token.is_cancelled() {
            return Err(ContextError::Cancelled);
        }

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => Err(ContextError::Cancelled),
                    _ = tokio::time::sleep_until(deadline) => Err(ContextError::DeadlineExceeded),
                    out = fut => Ok(out),
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => Err(ContextError::Cancelled),
                    out = fut => Ok(out),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_returns_output_when_future_completes_first() {
        let ctx = ExecContext::new();
        assert_eq!(ctx.run(async { "done" }).await, Ok("done"));
    }

    #[tokio::test]
    async fn run_fails_fast_when_already_cancelled() {
        let ctx = ExecContext::new();
        ctx.cancel();
        let out = ctx.run(async { 1 }).await;
        assert_eq!(out, Err(ContextError::Cancelled));
    }

    #[tokio::test]
    async fn run_reports_cancellation_mid_flight() {
        let ctx = ExecContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let out = ctx.run(tokio::time::sleep(Duration::from_secs(30))).await;
        assert_eq!(out, Err(ContextError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn run_reports_deadline_exceeded() {
        let ctx = ExecContext::with_timeout(Duration::from_secs(5));
        let out = ctx.run(tokio::time::sleep(Duration::from_secs(60))).await;
        assert_eq!(out, Err(ContextError::DeadlineExceeded));
    }

    #[test]
    fn child_keeps_the_earlier_deadline() {
        let parent = ExecContext::with_timeout(Duration::from_secs(10));
        let child = parent.child_with_timeout(Duration::from_secs(300));
        assert_eq!(child.deadline(), parent.deadline());

        let tighter = parent.child_with_timeout(Duration::from_secs(1));
        assert!(tighter.deadline().unwrap() < parent.deadline().unwrap());
    }

    #[test]
    fn cancelling_parent_cancels_child_but_not_reverse() {
        let parent = ExecContext::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let child2 = parent.child();
        parent.cancel();
        assert!(child2.is_cancelled());
    }

    #[test]
    fn root_context_is_unbounded() {
        let ctx = ExecContext::new();
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());
    }
}
