//! Gate configuration.
//!
//! Settings are read from `.mergegate/mergegate.toml` in the project
//! directory, then overridden by environment variables, then by CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [verification]
//! enabled = true
//! required_confidence = 0.7
//! preferred_runtime = "codex"
//! timeout_seconds = 300
//! require_independent = false
//!
//! [runtimes]
//! claude_cmd = "claude"
//! codex_cmd = "codex"
//! opencode_cmd = "opencode"
//! ```
//!
//! Every key is optional. A missing file yields the defaults.

use crate::runtime::RuntimeKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Directory holding mergegate state inside a project.
pub const CONFIG_DIR: &str = ".mergegate";

/// Config file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "mergegate.toml";

pub const DEFAULT_REQUIRED_CONFIDENCE: f64 = 0.7;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 300;
pub const DEFAULT_PREFERRED_RUNTIME: &str = "codex";

/// Environment variable overriding `timeout_seconds`.
pub const TIMEOUT_ENV: &str = "MERGEGATE_TIMEOUT_SECONDS";

/// Environment variable overriding `required_confidence`.
pub const CONFIDENCE_ENV: &str = "MERGEGATE_REQUIRED_CONFIDENCE";

/// Policy knobs for the verification gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// When false the gate returns `skipped` without invoking a reviewer.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Minimum confidence for a PASS to count as verified.
    #[serde(default = "default_required_confidence")]
    pub required_confidence: f64,
    /// Runtime the operator would like to audit with. Informational: the
    /// auditor role always resolves through the registry's fallback order.
    #[serde(default = "default_preferred_runtime")]
    pub preferred_runtime: String,
    /// Reviewer deadline in seconds; 0 disables the deadline.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Demote same-model passes to needs_review.
    #[serde(default)]
    pub require_independent: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_required_confidence() -> f64 {
    DEFAULT_REQUIRED_CONFIDENCE
}

fn default_preferred_runtime() -> String {
    DEFAULT_PREFERRED_RUNTIME.to_string()
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            required_confidence: default_required_confidence(),
            preferred_runtime: default_preferred_runtime(),
            timeout_seconds: default_timeout_seconds(),
            require_independent: false,
        }
    }
}

impl VerificationConfig {
    /// Defaults with independent verification required.
    pub fn strict() -> Self {
        Self {
            require_independent: true,
            ..Self::default()
        }
    }

    /// Reviewer deadline, `None` when `timeout_seconds` is 0.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }

    /// Human-readable problems with the settings. Empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !(0.0..=1.0).contains(&self.required_confidence) {
            warnings.push(format!(
                "required_confidence {} is outside [0, 1]; reviewer confidence is always clamped to that range",
                self.required_confidence
            ));
        }

        if self.preferred_runtime.parse::<RuntimeKind>().is_err() {
            warnings.push(format!(
                "Unknown preferred_runtime '{}'. Valid values: claude, codex, opencode",
                self.preferred_runtime
            ));
        }

        if self.timeout_seconds == 0 {
            warnings.push("timeout_seconds = 0 disables the reviewer deadline".to_string());
        }

        warnings
    }
}

/// Command overrides for the built-in runtimes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimesSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claude_cmd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codex_cmd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opencode_cmd: Option<String>,
}

impl RuntimesSection {
    /// Command to launch `kind`, falling back to its default binary name.
    pub fn command_for(&self, kind: RuntimeKind) -> String {
        let configured = match kind {
            RuntimeKind::Claude => &self.claude_cmd,
            RuntimeKind::Codex => &self.codex_cmd,
            RuntimeKind::OpenCode => &self.opencode_cmd,
        };
        configured
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(kind.default_command())
            .to_string()
    }

    fn slot_mut(&mut self, kind: RuntimeKind) -> &mut Option<String> {
        match kind {
            RuntimeKind::Claude => &mut self.claude_cmd,
            RuntimeKind::Codex => &mut self.codex_cmd,
            RuntimeKind::OpenCode => &mut self.opencode_cmd,
        }
    }
}

/// Contents of `mergegate.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateToml {
    #[serde(default)]
    pub verification: VerificationConfig,
    #[serde(default)]
    pub runtimes: RuntimesSection,
}

impl GateToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse mergegate.toml")
    }

    /// Load `<project_dir>/.mergegate/mergegate.toml`, or the defaults when
    /// the file does not exist.
    pub fn load_or_default(project_dir: &Path) -> Result<Self> {
        let path = config_path(project_dir);
        if path.exists() {
            debug!(path = %path.display(), "loading config file");
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Unparseable numeric values are ignored with a debug log.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for &kind in RuntimeKind::all() {
            if let Some(cmd) = lookup(kind.command_env_var()).filter(|c| !c.trim().is_empty()) {
                *self.runtimes.slot_mut(kind) = Some(cmd);
            }
        }

        if let Some(raw) = lookup(TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.verification.timeout_seconds = secs,
                Err(_) => debug!(var = TIMEOUT_ENV, value = %raw, "ignoring unparseable override"),
            }
        }

        if let Some(raw) = lookup(CONFIDENCE_ENV) {
            match raw.trim().parse::<f64>() {
                Ok(c) if c.is_finite() => self.verification.required_confidence = c,
                _ => debug!(var = CONFIDENCE_ENV, value = %raw, "ignoring unparseable override"),
            }
        }
    }

    /// Load the file for `project_dir` and layer the environment on top.
    pub fn resolve(project_dir: &Path) -> Result<Self> {
        let mut config = Self::load_or_default(project_dir)?;
        config.apply_env();
        Ok(config)
    }

    /// Serialize back to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize mergegate.toml")
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        self.verification.validate()
    }
}

/// Location of the config file for `project_dir`.
pub fn config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(CONFIG_DIR).join(CONFIG_FILE)
}
