//! Hook-friendly readiness checks - `mergegate check` and `mergegate gate`.
//!
//! Both are silent on success so they can sit in front of other commands.

use super::{CliOverrides, EXIT_BLOCKED, EXIT_PROCEED, load_settings};
use anyhow::Result;
use mergegate::gate::VerificationGate;
use mergegate::runtime::RuntimeRegistry;
use mergegate::tracker::BeadsTracker;
use std::path::Path;
use std::sync::Arc;

fn print_install_help() {
    eprintln!("Install one of the following:");
    eprintln!("  - codex (OpenAI Codex CLI, preferred for independent verification)");
    eprintln!("  - opencode (open-source alternative)");
    eprintln!("  - claude (Anthropic Claude CLI, same-model fallback)");
}

/// Succeed when at least one reviewer exists, or with `strict`, when an
/// independent one does.
pub fn cmd_check(project_dir: &Path, strict: bool) -> Result<u8> {
    let settings = load_settings(project_dir, CliOverrides::default())?;
    let registry = RuntimeRegistry::discover_with(&settings.runtimes);

    if !registry.any_available() {
        eprintln!("ERROR: Verification is required but no runtime is available");
        eprintln!();
        print_install_help();
        eprintln!();
        eprintln!("Merges cannot proceed without a verification runtime.");
        return Ok(EXIT_BLOCKED);
    }

    if strict && !registry.is_independent_verification() {
        eprintln!("ERROR: Independent verification required but only claude is available");
        eprintln!();
        eprintln!("Strict mode requires a different model for verification. Install one of:");
        eprintln!("  - codex");
        eprintln!("  - opencode");
        eprintln!();
        eprintln!("Or drop --strict if same-model verification is acceptable.");
        return Ok(EXIT_BLOCKED);
    }

    Ok(EXIT_PROCEED)
}

/// Succeed when a verification gate can be built from the project's
/// configuration and the discovered runtimes.
pub fn cmd_gate(project_dir: &Path, strict: bool) -> Result<u8> {
    let settings = load_settings(
        project_dir,
        CliOverrides {
            strict,
            ..Default::default()
        },
    )?;
    let registry = RuntimeRegistry::discover_with(&settings.runtimes);

    let problem = match VerificationGate::new(
        &registry,
        Arc::new(BeadsTracker::new(project_dir)),
        settings.verification.clone(),
    ) {
        Err(err) => Some(err.to_string()),
        Ok(gate)
            if gate.config().require_independent && !registry.is_independent_verification() =>
        {
            Some(format!(
                "independent verification required but the auditor runtime is {}",
                gate.runtime_name()
            ))
        }
        Ok(_) => None,
    };

    let Some(problem) = problem else {
        return Ok(EXIT_PROCEED);
    };

    eprintln!("VERIFICATION GATE FAILED");
    eprintln!("========================");
    eprintln!();
    eprintln!("Error: {}", problem);
    eprintln!();
    eprintln!("Merge operations are BLOCKED until verification is available.");
    eprintln!();
    eprintln!("To fix:");
    eprintln!("  1. Install a verification runtime (codex, opencode, or claude)");
    eprintln!("  2. Ensure the runtime is on your PATH, or set CODEX_CMD / OPENCODE_CMD / CLAUDE_CMD");
    eprintln!("  3. Run 'mergegate config' to check the configuration");
    Ok(EXIT_BLOCKED)
}
