//! Reviewer runtimes and their discovery registry.
//!
//! A runtime is an external CLI able to answer a review prompt. Three variants
//! ship with mergegate, differing only in binary name and prompt flag:
//!
//! | Kind       | Binary     | Invocation               | Role                         |
//! |------------|------------|--------------------------|------------------------------|
//! | `Claude`   | `claude`   | `claude -p <prompt>`     | primary (same-model) runtime |
//! | `Codex`    | `codex`    | `codex -q <prompt>`      | preferred independent auditor |
//! | `OpenCode` | `opencode` | `opencode -p <prompt>`   | open-source fallback auditor  |
//!
//! ## Example
//!
//! ```
//! use mergegate::runtime::{RuntimeKind, RuntimeRegistry, AUDITOR_ROLE};
//!
//! let registry = RuntimeRegistry::empty();
//! assert!(registry.get_for_role(AUDITOR_ROLE).is_none());
//! assert_eq!(RuntimeKind::Codex.prompt_flag(), "-q");
//! ```

pub mod cli;
pub mod registry;
pub mod scripted;

pub use cli::CliRuntime;
pub use registry::{AUDITOR_FALLBACK, AUDITOR_ROLE, RuntimeRegistry};
pub use scripted::ScriptedRuntime;

use crate::context::ExecContext;
use crate::errors::RuntimeError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Name of the primary runtime. Reviews by any other runtime count as
/// independent.
pub const PRIMARY_RUNTIME: &str = "claude";

/// A review-capable execution environment.
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Stable identifier, unique within a registry.
    fn name(&self) -> &str;

    /// Whether the runtime can be invoked on this system. Must be cheap and
    /// free of side effects.
    fn available(&self) -> bool;

    /// Run `prompt` with `workdir` as the working directory and return the
    /// runtime's standard output.
    ///
    /// Implementations must stop promptly when `ctx` is cancelled or its
    /// deadline passes, and must not leave a child process running.
    async fn execute(
        &self,
        ctx: &ExecContext,
        prompt: &str,
        workdir: &Path,
    ) -> Result<String, RuntimeError>;
}

/// True when a review by `runtime_name` is not a same-model review.
pub fn is_independent(runtime_name: &str) -> bool {
    !runtime_name.is_empty() && runtime_name != PRIMARY_RUNTIME
}

/// The closed set of built-in runtimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    Claude,
    Codex,
    OpenCode,
}

impl RuntimeKind {
    /// All built-in kinds in discovery order.
    pub fn all() -> &'static [RuntimeKind] {
        &[RuntimeKind::Claude, RuntimeKind::Codex, RuntimeKind::OpenCode]
    }

    pub fn name(&self) -> &'static str {
        match self {
            RuntimeKind::Claude => "claude",
            RuntimeKind::Codex => "codex",
            RuntimeKind::OpenCode => "opencode",
        }
    }

    /// Default executable looked up on `PATH`.
    pub fn default_command(&self) -> &'static str {
        self.name()
    }

    /// Flag that precedes the prompt argument.
    pub fn prompt_flag(&self) -> &'static str {
        match self {
            RuntimeKind::Claude => "-p",
            RuntimeKind::Codex => "-q",
            RuntimeKind::OpenCode => "-p",
        }
    }

    /// Environment variable that overrides the executable.
    pub fn command_env_var(&self) -> &'static str {
        match self {
            RuntimeKind::Claude => "CLAUDE_CMD",
            RuntimeKind::Codex => "CODEX_CMD",
            RuntimeKind::OpenCode => "OPENCODE_CMD",
        }
    }

    pub fn is_primary(&self) -> bool {
        self.name() == PRIMARY_RUNTIME
    }

    /// One-line description used by status output.
    pub fn description(&self) -> &'static str {
        match self {
            RuntimeKind::Claude => "Anthropic Claude CLI (same-model fallback)",
            RuntimeKind::Codex => "OpenAI Codex CLI (preferred for independent verification)",
            RuntimeKind::OpenCode => "OpenCode CLI (open-source alternative)",
        }
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for RuntimeKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claude" => Ok(RuntimeKind::Claude),
            "codex" => Ok(RuntimeKind::Codex),
            "opencode" => Ok(RuntimeKind::OpenCode),
            _ => anyhow::bail!(
                "Unknown runtime '{}'. Valid values: claude, codex, opencode",
                s
            ),
        }
    }
}
