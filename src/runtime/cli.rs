//! CLI-backed runtimes.
//!
//! Each built-in runtime is a thin wrapper around an external binary invoked as
//! `<command> <flag> <prompt>` in the target working directory. Standard output
//! is the answer; standard error is only read when the process fails.
//!
//! A command override may carry leading arguments (`CODEX_CMD="npx codex"`);
//! the first whitespace-separated word is the program.

use super::{Runtime, RuntimeKind};
use crate::context::ExecContext;
use crate::errors::RuntimeError;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// A runtime that shells out to one of the built-in CLIs.
#[derive(Debug, Clone)]
pub struct CliRuntime {
    kind: RuntimeKind,
    command: String,
}

impl CliRuntime {
    /// Use the kind's default executable name.
    pub fn new(kind: RuntimeKind) -> Self {
        Self::with_command(kind, kind.default_command())
    }

    /// Use a specific command: a path or a name resolved on `PATH`, optionally
    /// followed by leading arguments.
    pub fn with_command(kind: RuntimeKind, command: impl Into<String>) -> Self {
        Self {
            kind,
            command: command.into(),
        }
    }

    pub fn kind(&self) -> RuntimeKind {
        self.kind
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn program(&self) -> &str {
        self.command
            .split_whitespace()
            .next()
            .unwrap_or_else(|| self.kind.default_command())
    }
}

#[async_trait]
impl Runtime for CliRuntime {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn available(&self) -> bool {
        which::which(self.program()).is_ok()
    }

    async fn execute(
        &self,
        ctx: &ExecContext,
        prompt: &str,
        workdir: &Path,
    ) -> Result<String, RuntimeError> {
        let name = self.name();

        let mut cmd = Command::new(self.program());
        cmd.args(self.command.split_whitespace().skip(1))
            .arg(self.kind.prompt_flag())
            .arg(prompt)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            runtime = name,
            command = %self.command,
            workdir = %workdir.display(),
            prompt_len = prompt.len(),
            "spawning reviewer"
        );

        let child = cmd.spawn().map_err(|source| RuntimeError::Spawn {
            runtime: name.to_string(),
            source,
        })?;

        // Dropping the wait future drops the child, and kill_on_drop reaps it.
        let output = ctx
            .run(child.wait_with_output())
            .await
            .map_err(|err| {
                warn!(runtime = name, error = %err, "reviewer interrupted, killing process");
                RuntimeError::interrupted(name, err)
            })?
            .map_err(|source| RuntimeError::Wait {
                runtime: name.to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if !stderr.is_empty() {
                return Err(RuntimeError::Failed {
                    runtime: name.to_string(),
                    stderr,
                });
            }
            return Err(RuntimeError::ExitStatus {
                runtime: name.to_string(),
                code: output.status.code().unwrap_or(-1),
            });
        }

        debug!(runtime = name, stdout_len = output.stdout.len(), "reviewer finished");
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    /// Write an executable shell script into `dir` and return its path.
    fn fake_cli(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    /// Run scripts through `sh` so a freshly written file is never exec'd
    /// directly (avoids ETXTBSY under parallel tests).
    fn runtime(kind: RuntimeKind, path: &Path) -> CliRuntime {
        CliRuntime::with_command(kind, format!("/bin/sh {}", path.display()))
    }

    #[test]
    fn test_new_uses_default_command() {
        let rt = CliRuntime::new(RuntimeKind::OpenCode);
        assert_eq!(rt.command(), "opencode");
        assert_eq!(rt.name(), "opencode");
        assert_eq!(rt.kind(), RuntimeKind::OpenCode);
    }

    #[test]
    fn test_available_for_executable_path() {
        let dir = TempDir::new().unwrap();
        let path = fake_cli(&dir, "codex", "exit 0");
        let rt = CliRuntime::with_command(RuntimeKind::Codex, path.to_string_lossy().to_string());
        assert!(rt.available());
    }

    #[test]
    fn test_available_checks_program_not_leading_args() {
        let rt = CliRuntime::with_command(RuntimeKind::Codex, "/bin/sh /nonexistent/script");
        assert!(rt.available());
        assert_eq!(rt.program(), "/bin/sh");
    }

    #[test]
    fn test_unavailable_for_missing_command() {
        let rt = CliRuntime::with_command(RuntimeKind::Codex, "/nonexistent/mergegate-codex");
        assert!(!rt.available());
    }

    #[tokio::test]
    async fn test_execute_passes_flag_and_prompt() {
        let dir = TempDir::new().unwrap();
        let path = fake_cli(&dir, "codex", r#"printf '%s|%s' "$1" "$2""#);
        let rt = runtime(RuntimeKind::Codex, &path);

        let out = rt
            .execute(&ExecContext::new(), "review this", dir.path())
            .await
            .unwrap();
        assert_eq!(out, "-q|review this");
    }

    #[tokio::test]
    async fn test_execute_runs_in_workdir() {
        let dir = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let path = fake_cli(&dir, "claude", "pwd");
        let rt = runtime(RuntimeKind::Claude, &path);

        let out = rt
            .execute(&ExecContext::new(), "prompt", work.path())
            .await
            .unwrap();
        assert_eq!(
            PathBuf::from(out.trim()).canonicalize().unwrap(),
            work.path().canonicalize().unwrap()
        );
    }

    #[tokio::test]
    async fn test_execute_nonzero_with_stderr_carries_text() {
        let dir = TempDir::new().unwrap();
        let path = fake_cli(&dir, "codex", "echo 'rate limited' >&2\nexit 1");
        let rt = runtime(RuntimeKind::Codex, &path);

        let err = rt
            .execute(&ExecContext::new(), "prompt", dir.path())
            .await
            .unwrap_err();
        match &err {
            RuntimeError::Failed { runtime, stderr } => {
                assert_eq!(runtime, "codex");
                assert_eq!(stderr, "rate limited");
            }
            other => panic!("Expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_nonzero_without_stderr_is_generic() {
        let dir = TempDir::new().unwrap();
        let path = fake_cli(&dir, "opencode", "exit 3");
        let rt = runtime(RuntimeKind::OpenCode, &path);

        let err = rt
            .execute(&ExecContext::new(), "prompt", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::ExitStatus { code: 3, .. }));
    }

    #[tokio::test]
    async fn test_execute_spawn_failure() {
        let dir = TempDir::new().unwrap();
        let rt = CliRuntime::with_command(RuntimeKind::Claude, "/nonexistent/mergegate-claude");

        let err = rt
            .execute(&ExecContext::new(), "prompt", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_execute_stops_at_deadline() {
        let dir = TempDir::new().unwrap();
        let path = fake_cli(&dir, "codex", "exec sleep 30");
        let rt = runtime(RuntimeKind::Codex, &path);

        let ctx = ExecContext::with_timeout(Duration::from_millis(200));
        let started = Instant::now();
        let err = rt.execute(&ctx, "prompt", dir.path()).await.unwrap_err();

        assert!(matches!(err, RuntimeError::DeadlineExceeded { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_execute_stops_on_cancel() {
        let dir = TempDir::new().unwrap();
        let path = fake_cli(&dir, "codex", "exec sleep 30");
        let rt = runtime(RuntimeKind::Codex, &path);

        let ctx = ExecContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let err = rt.execute(&ctx, "prompt", dir.path()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    /// Script that records its pid, then becomes a long sleep under that pid.
    fn pid_recording_cli(dir: &TempDir) -> (PathBuf, PathBuf) {
        let pidfile = dir.path().join("reviewer.pid");
        let path = fake_cli(
            dir,
            "codex",
            &format!("echo $$ > {}\nexec sleep 30", pidfile.display()),
        );
        (path, pidfile)
    }

    fn process_alive(pid: &str) -> bool {
        std::process::Command::new("/bin/sh")
            .arg("-c")
            .arg(format!("kill -0 {pid} 2>/dev/null"))
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// The killed child may linger briefly as a zombie until tokio reaps it.
    async fn assert_process_gone(pidfile: &Path) {
        let pid = std::fs::read_to_string(pidfile).unwrap().trim().to_string();
        assert!(!pid.is_empty());

        let give_up = Instant::now() + Duration::from_secs(5);
        while process_alive(&pid) {
            assert!(Instant::now() < give_up, "reviewer process {pid} still running");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    #[tokio::test]
    async fn test_deadline_kills_reviewer_process() {
        let dir = TempDir::new().unwrap();
        let (path, pidfile) = pid_recording_cli(&dir);
        let rt = runtime(RuntimeKind::Codex, &path);

        let ctx = ExecContext::with_timeout(Duration::from_millis(300));
        let err = rt.execute(&ctx, "prompt", dir.path()).await.unwrap_err();

        assert!(matches!(err, RuntimeError::DeadlineExceeded { .. }));
        assert_process_gone(&pidfile).await;
    }

    #[tokio::test]
    async fn test_cancel_kills_reviewer_process() {
        let dir = TempDir::new().unwrap();
        let (path, pidfile) = pid_recording_cli(&dir);
        let rt = runtime(RuntimeKind::Codex, &path);

        let ctx = ExecContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            canceller.cancel();
        });

        let err = rt.execute(&ctx, "prompt", dir.path()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Cancelled { .. }));
        assert_process_gone(&pidfile).await;
    }
}
