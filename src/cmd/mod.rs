//! CLI command implementations.
//!
//! | Module    | Commands handled           |
//! |-----------|----------------------------|
//! | `status`  | `Status`                   |
//! | `config`  | `Config`                   |
//! | `check`   | `Check`, `Gate`            |
//! | `verify`  | `Run`, `Mr`, `Require`     |
//!
//! Every command returns the process exit code. 0 means the merge may
//! proceed, 1 means it is blocked (rejected, or no reviewer), 2 means a
//! human has to look.

pub mod check;
pub mod config;
pub mod report;
pub mod status;
pub mod verify;

pub use check::{cmd_check, cmd_gate};
pub use config::cmd_config;
pub use status::cmd_status;
pub use verify::{cmd_mr, cmd_require, cmd_run};

use anyhow::Result;
use mergegate::auditor::Verdict;
use mergegate::config::GateToml;
use mergegate::context::ExecContext;
use mergegate::gate::{VerificationInfo, should_escalate, should_sling_back};
use std::path::Path;
use tracing::{debug, warn};

pub const EXIT_PROCEED: u8 = 0;
pub const EXIT_BLOCKED: u8 = 1;
pub const EXIT_NEEDS_HUMAN: u8 = 2;

/// Exit code for a gate decision.
pub fn exit_for_info(info: Option<&VerificationInfo>) -> u8 {
    if should_sling_back(info) {
        EXIT_BLOCKED
    } else if should_escalate(info) {
        EXIT_NEEDS_HUMAN
    } else {
        EXIT_PROCEED
    }
}

/// Exit code for a raw verdict.
pub fn exit_for_verdict(verdict: Verdict) -> u8 {
    match verdict {
        Verdict::Pass => EXIT_PROCEED,
        Verdict::Fail => EXIT_BLOCKED,
        Verdict::NeedsHuman => EXIT_NEEDS_HUMAN,
    }
}

/// Overrides passed on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct CliOverrides {
    pub timeout_seconds: Option<u64>,
    pub strict: bool,
}

/// Load the project config, layer env then CLI overrides, and log any
/// validation warnings.
pub fn load_settings(project_dir: &Path, overrides: CliOverrides) -> Result<GateToml> {
    let mut settings = GateToml::resolve(project_dir)?;

    if let Some(secs) = overrides.timeout_seconds {
        settings.verification.timeout_seconds = secs;
    }
    if overrides.strict {
        settings.verification.require_independent = true;
    }

    for warning in settings.validate() {
        warn!("{}", warning);
    }
    debug!(?settings, "effective settings");

    Ok(settings)
}

/// Root context cancelled on Ctrl-C.
pub fn interruptible_context() -> ExecContext {
    let ctx = ExecContext::new();
    let on_signal = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling review");
            on_signal.cancel();
        }
    });
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;
    use mergegate::gate::VerificationStatus;
    use tempfile::TempDir;

    fn info(status: VerificationStatus) -> VerificationInfo {
        VerificationInfo {
            status,
            ..Default::default()
        }
    }

    #[test]
    fn test_exit_for_info() {
        assert_eq!(exit_for_info(Some(&info(VerificationStatus::Verified))), 0);
        assert_eq!(exit_for_info(Some(&info(VerificationStatus::Skipped))), 0);
        assert_eq!(exit_for_info(Some(&info(VerificationStatus::Rejected))), 1);
        assert_eq!(exit_for_info(Some(&info(VerificationStatus::NeedsReview))), 2);
        assert_eq!(exit_for_info(Some(&info(VerificationStatus::Pending))), 2);
        assert_eq!(exit_for_info(None), 2);
    }

    #[test]
    fn test_exit_for_verdict() {
        assert_eq!(exit_for_verdict(Verdict::Pass), EXIT_PROCEED);
        assert_eq!(exit_for_verdict(Verdict::Fail), EXIT_BLOCKED);
        assert_eq!(exit_for_verdict(Verdict::NeedsHuman), EXIT_NEEDS_HUMAN);
    }

    #[test]
    fn test_load_settings_applies_cli_overrides() {
        let dir = TempDir::new().unwrap();
        let settings = load_settings(
            dir.path(),
            CliOverrides {
                timeout_seconds: Some(12),
                strict: true,
            },
        )
        .unwrap();
        assert_eq!(settings.verification.timeout_seconds, 12);
        assert!(settings.verification.require_independent);
    }
}
