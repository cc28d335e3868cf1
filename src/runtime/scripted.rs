//! In-process runtime with a canned reply.
//!
//! Used to inject a deterministic reviewer through
//! [`RuntimeRegistry::register`](super::RuntimeRegistry::register) when no
//! subprocess should be launched, and to observe how many times a caller
//! actually invoked the reviewer.

use super::Runtime;
use crate::context::ExecContext;
use crate::errors::RuntimeError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone)]
enum Reply {
    Output(String),
    Failure(String),
    /// Never answers; only returns once the context is interrupted.
    Hang,
}

/// A runtime that answers every prompt with the same scripted reply.
#[derive(Debug, Clone)]
pub struct ScriptedRuntime {
    name: String,
    available: bool,
    reply: Reply,
    calls: Arc<AtomicUsize>,
    last_prompt: Arc<Mutex<Option<String>>>,
}

impl ScriptedRuntime {
    fn build(name: &str, reply: Reply) -> Self {
        Self {
            name: name.to_string(),
            available: true,
            reply,
            calls: Arc::new(AtomicUsize::new(0)),
            last_prompt: Arc::new(Mutex::new(None)),
        }
    }

    /// Reply with `output` on standard output.
    pub fn responding(name: &str, output: impl Into<String>) -> Self {
        Self::build(name, Reply::Output(output.into()))
    }

    /// Fail as a process that exited non-zero with `stderr`.
    pub fn failing(name: &str, stderr: impl Into<String>) -> Self {
        Self::build(name, Reply::Failure(stderr.into()))
    }

    /// Block until cancelled or past the deadline.
    pub fn hanging(name: &str) -> Self {
        Self::build(name, Reply::Hang)
    }

    /// Report the runtime as not installed.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Number of `execute` calls so far, shared across clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent prompt received.
    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Runtime for ScriptedRuntime {
    fn name(&self) -> &str {
        &self.name
    }

    fn available(&self) -> bool {
        self.available
    }

    async fn execute(
        &self,
        ctx: &ExecContext,
        prompt: &str,
        _workdir: &Path,
    ) -> Result<String, RuntimeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_prompt
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(prompt.to_string());

        match &self.reply {
            Reply::Output(out) => Ok(out.clone()),
            Reply::Failure(stderr) => Err(RuntimeError::Failed {
                runtime: self.name.clone(),
                stderr: stderr.clone(),
            }),
            Reply::Hang => {
                let interrupted = ctx.run(std::future::pending::<()>()).await;
                match interrupted {
                    Ok(()) => unreachable!("pending future never completes"),
                    Err(err) => Err(RuntimeError::interrupted(&self.name, err)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_responding_records_calls_and_prompt() {
        let rt = ScriptedRuntime::responding("codex", "{}");
        let observer = rt.clone();

        let out = rt
            .execute(&ExecContext::new(), "check it", Path::new("."))
            .await
            .unwrap();

        assert_eq!(out, "{}");
        assert_eq!(observer.calls(), 1);
        assert_eq!(observer.last_prompt().as_deref(), Some("check it"));
    }

    #[tokio::test]
    async fn test_failing_returns_stderr() {
        let rt = ScriptedRuntime::failing("claude", "boom");
        let err = rt
            .execute(&ExecContext::new(), "p", Path::new("."))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_returns_on_deadline() {
        let rt = ScriptedRuntime::hanging("codex");
        let ctx = ExecContext::with_timeout(Duration::from_secs(1));
        let err = rt.execute(&ctx, "p", Path::new(".")).await.unwrap_err();
        assert!(matches!(err, RuntimeError::DeadlineExceeded { .. }));
    }

    #[test]
    fn test_unavailable_flag() {
        assert!(ScriptedRuntime::responding("x", "").available());
        assert!(!ScriptedRuntime::responding("x", "").unavailable().available());
    }
}
