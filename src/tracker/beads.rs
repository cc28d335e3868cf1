//! Tracker that shells out to the `bd` (beads) CLI.
//!
//! beads is binary-only, so every call is a subprocess run in the project
//! directory with `--json` output.

use super::{Issue, Tracker};
use crate::context::ExecContext;
use crate::errors::TrackerError;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

/// Default beads executable.
pub const BD_BIN: &str = "bd";

/// `bd show --json` prints either a bare object or a one-element array,
/// depending on version.
#[derive(Deserialize)]
#[serde(untagged)]
enum ShowOutput {
    One(Issue),
    Many(Vec<Issue>),
}

/// Bridge to the `bd` CLI.
///
/// `bin` may carry leading arguments (`"npx bd"`); the first word is the
/// program.
#[derive(Debug, Clone)]
pub struct BeadsTracker {
    bin: String,
    workdir: PathBuf,
}

impl BeadsTracker {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self::with_bin(BD_BIN, workdir)
    }

    pub fn with_bin(bin: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn run(&self, ctx: &ExecContext, args: &[&str]) -> Result<Output, TrackerError> {
        let command = format!("{} {}", self.bin, args.join(" "));
        debug!(command = %command, workdir = %self.workdir.display(), "running tracker command");

        let mut words = self.bin.split_whitespace();
        let program = words.next().unwrap_or(BD_BIN);

        let child = Command::new(program)
            .args(words)
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TrackerError::Spawn {
                command: command.clone(),
                source,
            })?;

        ctx.run(child.wait_with_output())
            .await?
            .map_err(|source| TrackerError::Spawn { command, source })
    }
}

#[async_trait]
impl Tracker for BeadsTracker {
    async fn show(&self, ctx: &ExecContext, id: &str) -> Result<Issue, TrackerError> {
        let output = self.run(ctx, &["show", id, "--json"]).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if is_not_found(&stderr) {
                return Err(TrackerError::NotFound(id.to_string()));
            }
            return Err(TrackerError::Command {
                command: format!("{} show", self.bin),
                stderr,
            });
        }

        parse_show(id, &output.stdout)
    }

    async fn list_open(&self, ctx: &ExecContext) -> Result<Vec<Issue>, TrackerError> {
        let output = self.run(ctx, &["list", "--status=open", "--json"]).await?;

        if !output.status.success() {
            return Err(TrackerError::Command {
                command: format!("{} list", self.bin),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_list(&output.stdout)
    }
}

fn is_not_found(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("not found") || lower.contains("no issue")
}

/// Decode `bd show --json` output for `id`.
pub fn parse_show(id: &str, stdout: &[u8]) -> Result<Issue, TrackerError> {
    if stdout.iter().all(u8::is_ascii_whitespace) {
        return Err(TrackerError::NotFound(id.to_string()));
    }

    match serde_json::from_slice(stdout).map_err(TrackerError::Parse)? {
        ShowOutput::One(issue) => Ok(issue),
        ShowOutput::Many(issues) => issues
            .into_iter()
            .next()
            .ok_or_else(|| TrackerError::NotFound(id.to_string())),
    }
}

/// Decode `bd list --json` output. Empty output means no issues.
pub fn parse_list(stdout: &[u8]) -> Result<Vec<Issue>, TrackerError> {
    if stdout.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(stdout).map_err(TrackerError::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================
    // Output parsing
    // =========================================

    #[test]
    fn test_parse_show_object() {
        let json = br#"{"id":"gt-abc","title":"Fix login","description":"Users get 500","status":"open","labels":["auth"]}"#;
        let issue = parse_show("gt-abc", json).unwrap();
        assert_eq!(issue.id, "gt-abc");
        assert_eq!(issue.title, "Fix login");
        assert_eq!(issue.description, "Users get 500");
        assert_eq!(issue.labels, vec!["auth"]);
    }

    #[test]
    fn test_parse_show_single_element_array() {
        let json = br#"[{"id":"gt-abc","title":"Fix login","priority":1,"issue_type":"bug"}]"#;
        let issue = parse_show("gt-abc", json).unwrap();
        assert_eq!(issue.title, "Fix login");
        assert_eq!(issue.description, "");
    }

    #[test]
    fn test_parse_show_empty_array_is_not_found() {
        let err = parse_show("gt-zzz", b"[]").unwrap_err();
        assert!(matches!(err, TrackerError::NotFound(id) if id == "gt-zzz"));
    }

    #[test]
    fn test_parse_show_blank_output_is_not_found() {
        let err = parse_show("gt-zzz", b"\n  ").unwrap_err();
        assert!(matches!(err, TrackerError::NotFound(_)));
    }

    #[test]
    fn test_parse_show_garbage_is_parse_error() {
        let err = parse_show("gt-abc", b"Error: database locked").unwrap_err();
        assert!(matches!(err, TrackerError::Parse(_)));
    }

    #[test]
    fn test_parse_list() {
        let json = br#"[{"id":"a","title":"A","status":"open"},{"id":"b","title":"B","status":"open"}]"#;
        let issues = parse_list(json).unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[1].id, "b");
        assert!(parse_list(b"").unwrap().is_empty());
    }

    #[test]
    fn test_not_found_detection() {
        assert!(is_not_found("Error: issue gt-1 not found"));
        assert!(is_not_found("no issue with id gt-1"));
        assert!(!is_not_found("database is locked"));
    }

    // =========================================
    // Subprocess behaviour
    // =========================================

    #[cfg(unix)]
    mod subprocess {
        use super::*;
        use tempfile::TempDir;

        /// A fake `bd` run through `sh`, so `$1` is the subcommand.
        fn fake_bd(dir: &TempDir, body: &str) -> BeadsTracker {
            let path = dir.path().join("bd.sh");
            std::fs::write(&path, body).unwrap();
            BeadsTracker::with_bin(format!("/bin/sh {}", path.display()), dir.path())
        }

        #[tokio::test]
        async fn test_show_runs_in_workdir() {
            let dir = TempDir::new().unwrap();
            let bd = fake_bd(
                &dir,
                r#"printf '{"id":"%s","title":"from %s"}' "$2" "$(basename "$PWD")""#,
            );
            let issue = bd.show(&ExecContext::new(), "gt-1").await.unwrap();
            assert_eq!(issue.id, "gt-1");
            let dir_name = dir.path().file_name().unwrap().to_string_lossy();
            assert_eq!(issue.title, format!("from {dir_name}"));
        }

        #[tokio::test]
        async fn test_show_not_found_from_stderr() {
            let dir = TempDir::new().unwrap();
            let bd = fake_bd(&dir, "echo \"Error: issue $2 not found\" >&2\nexit 1");
            let err = bd.show(&ExecContext::new(), "gt-404").await.unwrap_err();
            assert!(matches!(err, TrackerError::NotFound(id) if id == "gt-404"));
        }

        #[tokio::test]
        async fn test_show_other_failure_is_command_error() {
            let dir = TempDir::new().unwrap();
            let bd = fake_bd(&dir, "echo 'database is locked' >&2\nexit 1");
            let err = bd.show(&ExecContext::new(), "gt-1").await.unwrap_err();
            match err {
                TrackerError::Command { stderr, .. } => assert_eq!(stderr, "database is locked"),
                other => panic!("Expected Command, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_list_open_passes_status_filter() {
            let dir = TempDir::new().unwrap();
            let bd = fake_bd(
                &dir,
                r#"[ "$2" = "--status=open" ] && echo '[{"id":"gt-1","title":"A","status":"open"}]'"#,
            );
            let issues = bd.list_open(&ExecContext::new()).await.unwrap();
            assert_eq!(issues.len(), 1);
        }

        #[tokio::test]
        async fn test_missing_binary_is_spawn_error() {
            let dir = TempDir::new().unwrap();
            let tracker = BeadsTracker::with_bin("/nonexistent/bd", dir.path());
            let err = tracker.show(&ExecContext::new(), "gt-1").await.unwrap_err();
            assert!(matches!(err, TrackerError::Spawn { .. }));
        }

        #[tokio::test]
        async fn test_cancelled_context_is_interrupted() {
            let dir = TempDir::new().unwrap();
            let bd = fake_bd(&dir, "exec sleep 30");
            let ctx = ExecContext::new();
            ctx.cancel();
            let err = bd.show(&ctx, "gt-1").await.unwrap_err();
            assert!(matches!(err, TrackerError::Interrupted(_)));
        }
    }
}
