//! Review commands - `mergegate run`, `mergegate mr`, `mergegate require`.

use super::report::{print_info, print_result, review_mode};
use super::{
    CliOverrides, EXIT_BLOCKED, EXIT_PROCEED, exit_for_info, exit_for_verdict,
    interruptible_context, load_settings,
};
use anyhow::{Context, Result};
use mergegate::auditor::Auditor;
use mergegate::config::GateToml;
use mergegate::context::ExecContext;
use mergegate::gate::{MergeRequest, VerificationGate, VerificationStatus};
use mergegate::runtime::RuntimeRegistry;
use mergegate::tracker::{BeadsTracker, Tracker};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

fn build_auditor(settings: &GateToml, project_dir: &Path) -> Result<Auditor> {
    let registry = RuntimeRegistry::discover_with(&settings.runtimes);
    Auditor::new(&registry, Arc::new(BeadsTracker::new(project_dir))).context(
        "creating auditor\n\nNo verification runtime is available.\nInstall one of: codex, opencode, or claude",
    )
}

fn review_context(settings: &GateToml) -> ExecContext {
    let root = interruptible_context();
    match settings.verification.timeout() {
        Some(timeout) => root.child_with_timeout(timeout),
        None => root,
    }
}

/// The bead carries a verified label. Lookup failures count as unverified.
async fn already_verified(tracker: &dyn Tracker, ctx: &ExecContext, bead_id: &str) -> bool {
    match tracker.show(ctx, bead_id).await {
        Ok(issue) => issue.is_verified(),
        Err(err) => {
            debug!(bead = bead_id, error = %err, "verified-label lookup failed");
            false
        }
    }
}

/// Review a bead and print the raw verdict. Exit code follows the verdict.
pub async fn cmd_run(
    project_dir: &Path,
    bead_id: &str,
    timeout_seconds: Option<u64>,
) -> Result<u8> {
    let settings = load_settings(
        project_dir,
        CliOverrides {
            timeout_seconds,
            ..Default::default()
        },
    )?;
    let auditor = build_auditor(&settings, project_dir)?;

    println!("Verifying bead {}...", bead_id);
    println!("Using runtime: {}", auditor.runtime_name());
    println!();

    let ctx = review_context(&settings);
    let result = auditor
        .verify(&ctx, bead_id, project_dir)
        .await
        .context("verification failed")?;

    print_result(&result);
    Ok(exit_for_verdict(result.verdict))
}

/// Review a merge request through the gate.
pub async fn cmd_mr(
    project_dir: &Path,
    mr: &MergeRequest,
    workdir: &Path,
    timeout_seconds: Option<u64>,
    strict: bool,
) -> Result<u8> {
    let settings = load_settings(project_dir, CliOverrides { timeout_seconds, strict })?;
    let registry = RuntimeRegistry::discover_with(&settings.runtimes);
    let gate = VerificationGate::new(
        &registry,
        Arc::new(BeadsTracker::new(workdir)),
        settings.verification.clone(),
    )
    .context("creating verification gate\n\nNo verification runtime is available")?;

    println!("Verifying MR {} ({} -> {})...", mr.id, mr.branch, mr.target_branch);
    println!("Using runtime: {}", gate.runtime_name());
    println!();

    let info = match gate.verify_mr(&interruptible_context(), mr, workdir).await {
        Ok(info) => info,
        Err(err) => {
            eprintln!("Warning: {}", err);
            *err.info
        }
    };

    print_info(&info);
    Ok(exit_for_info(Some(&info)))
}

/// Block until a bead has passed verification.
///
/// Beads already labelled as verified pass immediately unless `force`.
pub async fn cmd_require(
    project_dir: &Path,
    bead_id: &str,
    force: bool,
    timeout_seconds: Option<u64>,
) -> Result<u8> {
    let settings = load_settings(
        project_dir,
        CliOverrides {
            timeout_seconds,
            ..Default::default()
        },
    )?;
    let registry = RuntimeRegistry::discover_with(&settings.runtimes);
    let tracker = Arc::new(BeadsTracker::new(project_dir));

    let gate = match VerificationGate::new(
        &registry,
        tracker.clone(),
        settings.verification.clone(),
    ) {
        Ok(gate) => gate,
        Err(err) => {
            eprintln!("VERIFICATION REQUIRED BUT UNAVAILABLE");
            eprintln!("=====================================");
            eprintln!("Error: {}", err);
            eprintln!();
            eprintln!("Cannot merge without verification.");
            eprintln!("Install codex, opencode, or claude to proceed.");
            return Ok(EXIT_BLOCKED);
        }
    };

    let ctx = interruptible_context();

    if !force && already_verified(tracker.as_ref(), &review_context(&settings), bead_id).await {
        println!("{} is already verified.", bead_id);
        return Ok(EXIT_PROCEED);
    }

    println!("Running mandatory verification for {}...", bead_id);
    println!("Using runtime: {}", gate.runtime_name());
    println!(
        "Mode: {}",
        review_mode(mergegate::runtime::is_independent(gate.runtime_name()))
    );
    println!();

    let info = match gate.verify_bead(&ctx, bead_id, project_dir).await {
        Ok(info) => info,
        Err(err) => {
            eprintln!("Verification failed: {}", err.source);
            return Ok(EXIT_BLOCKED);
        }
    };

    print_info(&info);

    match info.status {
        VerificationStatus::Verified | VerificationStatus::Skipped => {
            println!("Verification PASSED - merge may proceed");
        }
        VerificationStatus::Rejected => {
            eprintln!();
            eprintln!("Verification FAILED - merge is BLOCKED");
            eprintln!("Address the issues above and re-run verification.");
        }
        VerificationStatus::NeedsReview | VerificationStatus::Pending => {
            eprintln!();
            eprintln!("Verification requires HUMAN REVIEW - merge is BLOCKED");
            eprintln!("A human must review and approve before merge can proceed.");
        }
    }

    Ok(exit_for_info(Some(&info)))
}
