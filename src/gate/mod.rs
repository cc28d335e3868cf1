//! Pre-merge verification gate.
//!
//! The gate turns a reviewer verdict into a merge decision. Callers read the
//! decision through three mutually exclusive predicates:
//!
//! | Status         | `can_proceed` | `should_sling_back` | `should_escalate` |
//! |----------------|---------------|---------------------|-------------------|
//! | `verified`     | yes           |                     |                   |
//! | `skipped`      | yes           |                     |                   |
//! | `rejected`     |               | yes                 |                   |
//! | `needs_review` |               |                     | yes               |
//! | `pending`      |               |                     | yes               |
//! | no info        |               |                     | yes               |
//!
//! ## Usage
//!
//! ```no_run
//! use mergegate::config::VerificationConfig;
//! use mergegate::context::ExecContext;
//! use mergegate::gate::{MergeRequest, VerificationGate, can_proceed, should_sling_back};
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let workdir = Path::new(".");
//! let gate = VerificationGate::for_workdir(workdir, VerificationConfig::default())?;
//!
//! let mr = MergeRequest::new("mr-42", "polecat/fix-login", "main");
//! let info = match gate.verify_mr(&ExecContext::new(), &mr, workdir).await {
//!     Ok(info) => info,
//!     Err(err) => *err.info,
//! };
//!
//! if can_proceed(Some(&info)) {
//!     println!("merge");
//! } else if should_sling_back(Some(&info)) {
//!     println!("send back: {:?}", info.issues);
//! }
//! # Ok(())
//! # }
//! ```

use crate::auditor::{Auditor, ReviewFailure, Verdict, VerificationResult};
use crate::config::VerificationConfig;
use crate::context::ExecContext;
use crate::errors::{AuditError, GateError};
use crate::runtime::RuntimeRegistry;
use crate::tracker::{BeadsTracker, Tracker};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Merge eligibility derived from a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Not reviewed yet. The gate itself never produces this.
    #[default]
    Pending,
    Verified,
    Rejected,
    NeedsReview,
    /// Verification is disabled.
    Skipped,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
            Self::NeedsReview => "needs_review",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Gate decision for one subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationInfo {
    pub status: VerificationStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reviewed_by: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_independent: bool,
    /// Execution or parse error behind a recovered `needs_review`.
    #[serde(skip)]
    pub failure: Option<ReviewFailure>,
}

impl VerificationInfo {
    pub fn skipped() -> Self {
        Self {
            status: VerificationStatus::Skipped,
            ..Default::default()
        }
    }

    pub fn pending() -> Self {
        Self::default()
    }

    /// A needs-review record for an audit that produced no result.
    pub fn from_error(err: &AuditError) -> Self {
        Self {
            status: VerificationStatus::NeedsReview,
            issues: vec![format!("Verification error: {err}")],
            ..Default::default()
        }
    }
}

/// A proposed change awaiting merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    pub id: String,
    /// Source branch.
    pub branch: String,
    pub target_branch: String,
}

impl MergeRequest {
    pub fn new(
        id: impl Into<String>,
        branch: impl Into<String>,
        target_branch: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            branch: branch.into(),
            target_branch: target_branch.into(),
        }
    }
}

/// A merge request plus its verification record, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiableMr {
    #[serde(flatten)]
    pub merge_request: MergeRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationInfo>,
}

impl VerifiableMr {
    pub fn new(merge_request: MergeRequest) -> Self {
        Self {
            merge_request,
            verification: None,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verification
            .as_ref()
            .is_some_and(|v| v.status == VerificationStatus::Verified)
    }

    pub fn needs_verification(&self) -> bool {
        self.verification
            .as_ref()
            .is_none_or(|v| v.status == VerificationStatus::Pending)
    }
}

/// Map a review result to a gate decision under `config`.
///
/// Pure: the same result and config always give the same status.
pub fn evaluate(result: &VerificationResult, config: &VerificationConfig) -> VerificationInfo {
    let mut issues = result.issues.clone();

    let status = match result.verdict {
        Verdict::Pass if result.confidence < config.required_confidence => {
            issues.push(format!(
                "Confidence {:.2} below threshold {:.2}",
                result.confidence, config.required_confidence
            ));
            VerificationStatus::NeedsReview
        }
        Verdict::Pass if config.require_independent && !result.is_independent => {
            issues.push(format!(
                "Independent verification required but reviewed by {}",
                result.reviewed_by
            ));
            VerificationStatus::NeedsReview
        }
        Verdict::Pass => VerificationStatus::Verified,
        Verdict::Fail => VerificationStatus::Rejected,
        Verdict::NeedsHuman => VerificationStatus::NeedsReview,
    };

    VerificationInfo {
        status,
        reviewed_by: result.reviewed_by.clone(),
        confidence: result.confidence,
        issues,
        suggestions: result.suggestions.clone(),
        verified_at: Some(result.reviewed_at),
        is_independent: result.is_independent,
        failure: result.failure.clone(),
    }
}

/// The change may merge.
pub fn can_proceed(info: Option<&VerificationInfo>) -> bool {
    info.is_some_and(|i| {
        matches!(
            i.status,
            VerificationStatus::Verified | VerificationStatus::Skipped
        )
    })
}

/// The change goes back to its author for fixes.
pub fn should_sling_back(info: Option<&VerificationInfo>) -> bool {
    info.is_some_and(|i| i.status == VerificationStatus::Rejected)
}

/// A human must decide. Missing info always escalates.
pub fn should_escalate(info: Option<&VerificationInfo>) -> bool {
    info.is_none_or(|i| {
        matches!(
            i.status,
            VerificationStatus::NeedsReview | VerificationStatus::Pending
        )
    })
}

/// Auditor plus policy.
#[derive(Debug)]
pub struct VerificationGate {
    auditor: Auditor,
    config: VerificationConfig,
}

impl VerificationGate {
    /// Build a gate over the registry's auditor runtime.
    ///
    /// Fails with [`AuditError::NoRuntime`] when no runtime can fill the
    /// auditor role, regardless of `config`.
    pub fn new(
        registry: &RuntimeRegistry,
        tracker: Arc<dyn Tracker>,
        config: VerificationConfig,
    ) -> Result<Self, AuditError> {
        let auditor = Auditor::new(registry, tracker)?;
        Ok(Self::with_auditor(auditor, config))
    }

    /// Discover runtimes on this system and read issues from `bd` in
    /// `workdir`.
    pub fn for_workdir(workdir: &Path, config: VerificationConfig) -> Result<Self, AuditError> {
        let registry = RuntimeRegistry::discover();
        Self::new(&registry, Arc::new(BeadsTracker::new(workdir)), config)
    }

    pub fn with_auditor(auditor: Auditor, config: VerificationConfig) -> Self {
        Self { auditor, config }
    }

    pub fn runtime_name(&self) -> &str {
        self.auditor.runtime_name()
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    fn scoped(&self, ctx: &ExecContext) -> ExecContext {
        match self.config.timeout() {
            Some(timeout) => ctx.child_with_timeout(timeout),
            None => ctx.child(),
        }
    }

    /// Review a merge request's diff and decide.
    pub async fn verify_mr(
        &self,
        ctx: &ExecContext,
        mr: &MergeRequest,
        workdir: &Path,
    ) -> Result<VerificationInfo, GateError> {
        if !self.config.enabled {
            info!(mr = %mr.id, "verification disabled, skipping");
            return Ok(VerificationInfo::skipped());
        }

        let ctx = self.scoped(ctx);
        let outcome = self
            .auditor
            .verify_mr(&ctx, &mr.id, &mr.branch, &mr.target_branch, workdir)
            .await;
        self.decide(&mr.id, outcome)
    }

    /// Review the work for a tracked issue and decide.
    pub async fn verify_bead(
        &self,
        ctx: &ExecContext,
        bead_id: &str,
        workdir: &Path,
    ) -> Result<VerificationInfo, GateError> {
        if !self.config.enabled {
            info!(bead = bead_id, "verification disabled, skipping");
            return Ok(VerificationInfo::skipped());
        }

        let ctx = self.scoped(ctx);
        let outcome = self.auditor.verify(&ctx, bead_id, workdir).await;
        self.decide(bead_id, outcome)
    }

    fn decide(
        &self,
        subject: &str,
        outcome: Result<VerificationResult, AuditError>,
    ) -> Result<VerificationInfo, GateError> {
        match outcome {
            Ok(result) => {
                let info = evaluate(&result, &self.config);
                info!(
                    subject,
                    verdict = %result.verdict,
                    status = %info.status,
                    reviewed_by = %info.reviewed_by,
                    "gate decision"
                );
                Ok(info)
            }
            Err(source) => {
                warn!(subject, error = %source, "verification error, escalating");
                Err(GateError {
                    info: Box::new(VerificationInfo::from_error(&source)),
                    source,
                })
            }
        }
    }
}
