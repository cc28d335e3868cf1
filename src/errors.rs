//! Typed error hierarchy for mergegate.
//!
//! The enums cover the layers of a verification call:
//! - `ContextError` - cancellation and deadline expiry
//! - `RuntimeError` - a reviewer process failed to produce an answer
//! - `ParseError` - a reviewer answered without a usable verdict object
//! - `TrackerError` - the external issue tracker lookup failed
//! - `AuditError` - failures the auditor propagates to its caller
//!
//! `GateError` pairs an `AuditError` with the needs-review info the gate
//! synthesized for it, so callers get both a decision and a root cause.

use crate::gate::VerificationInfo;
use thiserror::Error;

/// Why an [`ExecContext`](crate::context::ExecContext) stopped a future.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Errors from invoking a reviewer runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to spawn {runtime}: {source}")]
    Spawn {
        runtime: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{runtime} execution failed: {stderr}")]
    Failed { runtime: String, stderr: String },

    #[error("{runtime} execution failed: exit status {code}")]
    ExitStatus { runtime: String, code: i32 },

    #[error("{runtime} execution failed: {source}")]
    Wait {
        runtime: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{runtime} timed out before producing a verdict")]
    DeadlineExceeded { runtime: String },

    #[error("{runtime} was cancelled")]
    Cancelled { runtime: String },
}

impl RuntimeError {
    /// Map an interrupted context to the runtime-scoped variant.
    pub fn interrupted(runtime: &str, err: ContextError) -> Self {
        match err {
            ContextError::Cancelled => Self::Cancelled {
                runtime: runtime.to_string(),
            },
            ContextError::DeadlineExceeded => Self::DeadlineExceeded {
                runtime: runtime.to_string(),
            },
        }
    }
}

/// A reviewer response that did not contain a usable verdict object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no JSON object found in response")]
    NoJson,

    #[error("invalid verification JSON: {0}")]
    InvalidJson(String),
}

/// Errors from the external issue tracker.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("issue {0} not found")]
    NotFound(String),

    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("failed to parse tracker output: {0}")]
    Parse(#[source] serde_json::Error),

    #[error(transparent)]
    Interrupted(#[from] ContextError),
}

/// Errors the auditor propagates instead of recovering.
///
/// Execution and parse failures never appear here: they are folded into a
/// NEEDS_HUMAN [`VerificationResult`](crate::auditor::VerificationResult).
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("no verification runtime available")]
    NoRuntime,

    #[error("bead not found: {0}")]
    BeadNotFound(String),

    #[error("invalid bead for verification: {0}")]
    InvalidBead(String),

    #[error("fetching bead: {0}")]
    Tracker(#[source] TrackerError),
}

impl From<TrackerError> for AuditError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::NotFound(id) => Self::BeadNotFound(id),
            other => Self::Tracker(other),
        }
    }
}

/// A gate call that could not reach a verdict.
///
/// `info` is always a `needs_review` record whose issues carry the error text.
#[derive(Debug, Error)]
#[error("verification error: {source}")]
pub struct GateError {
    pub info: Box<VerificationInfo>,
    #[source]
    pub source: AuditError,
}
