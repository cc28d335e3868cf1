use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mergegate::gate::MergeRequest;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "mergegate")]
#[command(
    version,
    about = "Independent review gate for automated code changes",
    after_help = "Exit codes: 0 = may proceed, 1 = blocked or no reviewer, 2 = needs human review"
)]
pub struct Cli {
    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project directory holding .mergegate/ (defaults to the current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the active reviewer, available runtimes, and beads awaiting verification
    Status,
    /// Show runtime commands, fallback order, and verification settings
    Config,
    /// Exit 0 when a verification runtime is available (silent, for hooks)
    Check {
        /// Require an independent (non-claude) runtime
        #[arg(long)]
        strict: bool,
    },
    /// Exit 0 when a verification gate can be built (silent, for pre-merge hooks)
    Gate {
        /// Require an independent (non-claude) runtime
        #[arg(long)]
        strict: bool,
    },
    /// Review the work for a bead and print the verdict
    Run {
        bead_id: String,

        /// Reviewer deadline in seconds (0 disables)
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Review a merge request through the verification gate
    Mr {
        mr_id: String,

        /// Source branch
        #[arg(long)]
        branch: String,

        /// Target branch
        #[arg(long, default_value = "main")]
        target: String,

        /// Repository checkout to review in (defaults to the project directory)
        #[arg(long)]
        workdir: Option<PathBuf>,

        /// Reviewer deadline in seconds (0 disables)
        #[arg(long)]
        timeout: Option<u64>,

        /// Require an independent (non-claude) reviewer for a pass
        #[arg(long)]
        strict: bool,
    },
    /// Require a bead to pass verification before merge
    Require {
        bead_id: String,

        /// Re-run verification even if the bead is already labelled verified
        #[arg(long)]
        force: bool,

        /// Reviewer deadline in seconds (0 disables)
        #[arg(long)]
        timeout: Option<u64>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "mergegate=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let code = match &cli.command {
        Commands::Status => cmd::cmd_status(&project_dir).await?,
        Commands::Config => cmd::cmd_config(&project_dir)?,
        Commands::Check { strict } => cmd::cmd_check(&project_dir, *strict)?,
        Commands::Gate { strict } => cmd::cmd_gate(&project_dir, *strict)?,
        Commands::Run { bead_id, timeout } => cmd::cmd_run(&project_dir, bead_id, *timeout).await?,
        Commands::Mr {
            mr_id,
            branch,
            target,
            workdir,
            timeout,
            strict,
        } => {
            let mr = MergeRequest::new(mr_id, branch, target);
            let workdir = workdir.clone().unwrap_or_else(|| project_dir.clone());
            cmd::cmd_mr(&project_dir, &mr, &workdir, *timeout, *strict).await?
        }
        Commands::Require {
            bead_id,
            force,
            timeout,
        } => cmd::cmd_require(&project_dir, bead_id, *force, *timeout).await?,
    };

    Ok(ExitCode::from(code))
}
