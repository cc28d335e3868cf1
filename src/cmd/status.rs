//! Verification overview - `mergegate status`.

use super::report::{availability_mark, review_mode};
use super::{CliOverrides, EXIT_PROCEED, load_settings};
use anyhow::Result;
use mergegate::context::ExecContext;
use mergegate::runtime::{AUDITOR_ROLE, RuntimeKind, RuntimeRegistry, is_independent};
use mergegate::tracker::{BeadsTracker, Tracker};
use std::path::Path;

pub async fn cmd_status(project_dir: &Path) -> Result<u8> {
    let settings = load_settings(project_dir, CliOverrides::default())?;
    let registry = RuntimeRegistry::discover_with(&settings.runtimes);

    println!();
    println!("Verification Status");
    println!("===================");
    println!();

    if !settings.verification.enabled {
        println!("Verification is DISABLED in mergegate.toml; every gate call is skipped.");
        println!();
    }

    match registry.get_for_role(AUDITOR_ROLE) {
        Some(rt) => {
            println!("Active runtime: {}", rt.name());
            println!("Mode: {}", review_mode(is_independent(rt.name())));
        }
        None => {
            println!("Active runtime: NONE - verification will fail!");
            println!("Install claude, codex, or opencode");
        }
    }
    println!();

    println!("Available runtimes:");
    for kind in RuntimeKind::all() {
        println!(
            "  {} {}",
            availability_mark(registry.has_runtime(kind.name())),
            kind
        );
    }
    println!();

    let tracker = BeadsTracker::new(project_dir);
    let open = match tracker.list_open(&ExecContext::new()).await {
        Ok(open) => open,
        Err(err) => {
            eprintln!("Warning: could not list beads: {}", err);
            return Ok(EXIT_PROCEED);
        }
    };

    let pending: Vec<_> = open.iter().filter(|i| i.awaits_verification()).collect();
    if pending.is_empty() {
        println!("No beads pending verification.");
    } else {
        println!("Pending verification:");
        for issue in &pending {
            println!("  {}: {}", issue.id, issue.title);
        }
        println!();
        println!("Pending verifications: {}", pending.len());
    }

    Ok(EXIT_PROCEED)
}
