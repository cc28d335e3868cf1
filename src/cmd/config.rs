//! Configuration view - `mergegate config`.

use super::report::availability_mark;
use super::{CliOverrides, EXIT_PROCEED, load_settings};
use anyhow::Result;
use mergegate::config::config_path;
use mergegate::runtime::{
    AUDITOR_FALLBACK, AUDITOR_ROLE, CliRuntime, Runtime, RuntimeKind, RuntimeRegistry,
};
use std::path::Path;

pub fn cmd_config(project_dir: &Path) -> Result<u8> {
    let path = config_path(project_dir);
    let settings = load_settings(project_dir, CliOverrides::default())?;
    let registry = RuntimeRegistry::discover_with(&settings.runtimes);

    println!();
    println!("Verification Configuration");
    println!("==========================");
    println!();

    if path.exists() {
        println!("Config file: {}", path.display());
    } else {
        println!("No mergegate.toml found at {}", path.display());
        println!("Using default configuration.");
    }
    println!();

    match registry.get_for_role(AUDITOR_ROLE) {
        Some(rt) => println!("Auditor runtime: {}", rt.name()),
        None => println!("Auditor runtime: none (no runtimes available)"),
    }
    println!();

    println!("Runtimes:");
    for &kind in RuntimeKind::all() {
        let runtime = CliRuntime::with_command(kind, settings.runtimes.command_for(kind));
        println!(
            "  {} {:<10} {:<20} {}",
            availability_mark(runtime.available()),
            kind.name(),
            runtime.command(),
            kind.description()
        );
    }
    println!();

    println!("Fallback order for the auditor role:");
    for (i, name) in AUDITOR_FALLBACK.iter().enumerate() {
        println!("  {}. {}", i + 1, name);
    }
    println!();

    println!("Effective settings (file, then environment):");
    println!();
    println!("{}", settings.to_toml_string()?.trim_end());
    println!();

    let warnings = settings.validate();
    if warnings.is_empty() {
        println!("Configuration is valid.");
    } else {
        println!("Warnings:");
        for warning in &warnings {
            println!("  - {}", warning);
        }
    }

    Ok(EXIT_PROCEED)
}
