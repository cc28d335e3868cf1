//! Independent review of finished work.
//!
//! The [`Auditor`] asks a reviewer runtime, preferably a different model
//! from the one that produced the work, to judge a tracked issue or a
//! merge request. It always comes back with a [`VerificationResult`] once
//! the subject is known: a reviewer that crashes, times out, or answers
//! with garbage yields `NEEDS_HUMAN` instead of an error.
//!
//! ## Usage
//!
//! ```no_run
//! use mergegate::auditor::Auditor;
//! use mergegate::context::ExecContext;
//! use mergegate::runtime::RuntimeRegistry;
//! use mergegate::tracker::BeadsTracker;
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let workdir = Path::new(".");
//! let registry = RuntimeRegistry::discover();
//! let auditor = Auditor::new(&registry, Arc::new(BeadsTracker::new(workdir)))?;
//!
//! let ctx = ExecContext::with_timeout(Duration::from_secs(300));
//! let result = auditor.verify(&ctx, "gt-abc123", workdir).await?;
//! println!("{} ({:.0}%)", result.verdict, result.confidence * 100.0);
//! # Ok(())
//! # }
//! ```

pub mod parse;
pub mod prompt;

pub use parse::{ParsedReview, clamp_confidence, extract_json, parse_response};
pub use prompt::{build_bead_prompt, build_mr_prompt};

use crate::context::ExecContext;
use crate::errors::{AuditError, ParseError, RuntimeError};
use crate::runtime::{self, AUDITOR_ROLE, Runtime, RuntimeRegistry};
use crate::tracker::Tracker;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Issue recorded when the reviewer could not be run to completion.
pub const EXECUTION_FAILED_PREFIX: &str = "Verification execution failed";

/// Issue recorded when the reviewer's answer had no usable verdict.
pub const PARSE_FAILED_ISSUE: &str = "Failed to parse verification response";

/// Raw reviewer verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// The work meets its requirements with no blocking issues.
    Pass,
    /// The work has blocking problems.
    Fail,
    /// The reviewer could not decide, or could not be consulted.
    NeedsHuman,
}

impl Verdict {
    /// Case-insensitive match of a reviewer's verdict token.
    ///
    /// ```
    /// use mergegate::auditor::Verdict;
    ///
    /// assert_eq!(Verdict::from_token("pass"), Some(Verdict::Pass));
    /// assert_eq!(Verdict::from_token("Needs_Human"), Some(Verdict::NeedsHuman));
    /// assert_eq!(Verdict::from_token("maybe"), None);
    /// ```
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_uppercase().as_str() {
            "PASS" => Some(Self::Pass),
            "FAIL" => Some(Self::Fail),
            "NEEDS_HUMAN" => Some(Self::NeedsHuman),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::NeedsHuman => "NEEDS_HUMAN",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Root cause behind a recovered `NEEDS_HUMAN` result.
#[derive(Debug, Clone)]
pub enum ReviewFailure {
    /// The reviewer process failed, timed out, or was cancelled.
    Execution(Arc<RuntimeError>),
    /// The reviewer answered but the answer had no usable verdict.
    Parse(ParseError),
}

impl PartialEq for ReviewFailure {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Execution(a), Self::Execution(b)) => {
                Arc::ptr_eq(a, b) || a.to_string() == b.to_string()
            }
            (Self::Parse(a), Self::Parse(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for ReviewFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Execution(err) => write!(f, "{}", err),
            Self::Parse(err) => write!(f, "{}", err),
        }
    }
}

/// Outcome of one review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Issue or merge request id that was reviewed.
    pub bead_id: String,
    pub verdict: Verdict,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    /// Name of the runtime that performed the review.
    pub reviewed_by: String,
    pub reviewed_at: DateTime<Utc>,
    pub duration: Duration,
    /// The reviewer is not the primary runtime.
    #[serde(default)]
    pub is_independent: bool,
    /// Set when the verdict was synthesized from a failure.
    #[serde(skip)]
    pub failure: Option<ReviewFailure>,
}

impl VerificationResult {
    fn from_review(bead_id: &str, review: ParsedReview) -> Self {
        Self {
            bead_id: bead_id.to_string(),
            verdict: review.verdict,
            confidence: review.confidence,
            issues: review.issues,
            suggestions: review.suggestions,
            reviewed_by: String::new(),
            reviewed_at: Utc::now(),
            duration: Duration::ZERO,
            is_independent: false,
            failure: None,
        }
    }

    fn recovered(bead_id: &str, issues: Vec<String>, failure: ReviewFailure) -> Self {
        Self {
            issues,
            failure: Some(failure),
            ..Self::from_review(
                bead_id,
                ParsedReview {
                    verdict: Verdict::NeedsHuman,
                    confidence: 0.0,
                    issues: Vec::new(),
                    suggestions: Vec::new(),
                },
            )
        }
    }

    pub fn is_pass(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    pub fn is_fail(&self) -> bool {
        self.verdict == Verdict::Fail
    }

    pub fn needs_human(&self) -> bool {
        self.verdict == Verdict::NeedsHuman
    }
}

/// Runs reviews with one runtime chosen at construction.
pub struct Auditor {
    runtime: Arc<dyn Runtime>,
    tracker: Arc<dyn Tracker>,
}

impl fmt::Debug for Auditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auditor")
            .field("runtime", &self.runtime.name())
            .finish_non_exhaustive()
    }
}

impl Auditor {
    /// Use the registry's auditor-role runtime.
    pub fn new(registry: &RuntimeRegistry, tracker: Arc<dyn Tracker>) -> Result<Self, AuditError> {
        let runtime = registry
            .get_for_role(AUDITOR_ROLE)
            .ok_or(AuditError::NoRuntime)?;
        info!(runtime = runtime.name(), "auditor runtime selected");
        Ok(Self::with_runtime(runtime, tracker))
    }

    /// Use a specific runtime.
    pub fn with_runtime(runtime: Arc<dyn Runtime>, tracker: Arc<dyn Tracker>) -> Self {
        Self { runtime, tracker }
    }

    pub fn runtime_name(&self) -> &str {
        self.runtime.name()
    }

    /// Reviews by this auditor come from a model other than the primary.
    pub fn is_independent(&self) -> bool {
        runtime::is_independent(self.runtime.name())
    }

    /// Review the work for tracked issue `bead_id` in `workdir`.
    ///
    /// Fails only when the issue cannot be looked up.
    pub async fn verify(
        &self,
        ctx: &ExecContext,
        bead_id: &str,
        workdir: &Path,
    ) -> Result<VerificationResult, AuditError> {
        if bead_id.trim().is_empty() {
            return Err(AuditError::InvalidBead("empty bead id".to_string()));
        }

        let started = Instant::now();
        let issue = self.tracker.show(ctx, bead_id).await?;
        let prompt = build_bead_prompt(&issue);

        Ok(self.review(ctx, bead_id, &prompt, workdir, started).await)
    }

    /// Review the diff of merge request `mr_id` from `branch` into
    /// `target_branch`. No tracker lookup is made.
    pub async fn verify_mr(
        &self,
        ctx: &ExecContext,
        mr_id: &str,
        branch: &str,
        target_branch: &str,
        workdir: &Path,
    ) -> Result<VerificationResult, AuditError> {
        if mr_id.trim().is_empty() {
            return Err(AuditError::InvalidBead("empty merge request id".to_string()));
        }

        let started = Instant::now();
        let prompt = build_mr_prompt(mr_id, branch, target_branch, workdir);

        Ok(self.review(ctx, mr_id, &prompt, workdir, started).await)
    }

    async fn review(
        &self,
        ctx: &ExecContext,
        subject: &str,
        prompt: &str,
        workdir: &Path,
        started: Instant,
    ) -> VerificationResult {
        let name = self.runtime.name();

        let mut result = match self.runtime.execute(ctx, prompt, workdir).await {
            Err(err) => {
                warn!(subject, runtime = name, error = %err, "reviewer execution failed");
                VerificationResult::recovered(
                    subject,
                    vec![format!("{EXECUTION_FAILED_PREFIX}: {err}")],
                    ReviewFailure::Execution(Arc::new(err)),
                )
            }
            Ok(response) => match parse_response(&response) {
                Ok(review) => VerificationResult::from_review(subject, review),
                Err(err) => {
                    warn!(
                        subject,
                        runtime = name,
                        error = %err,
                        response_len = response.len(),
                        "unparseable reviewer response"
                    );
                    VerificationResult::recovered(
                        subject,
                        vec![PARSE_FAILED_ISSUE.to_string(), err.to_string()],
                        ReviewFailure::Parse(err),
                    )
                }
            },
        };

        result.reviewed_by = name.to_string();
        result.reviewed_at = Utc::now();
        result.duration = started.elapsed();
        result.is_independent = self.is_independent();

        info!(
            subject,
            runtime = name,
            verdict = %result.verdict,
            confidence = result.confidence,
            duration_ms = result.duration.as_millis() as u64,
            "review finished"
        );

        result
    }
}
