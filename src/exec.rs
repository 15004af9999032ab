//! Process execution abstraction for external collaborators.
//!
//! The package-manager collaborator shells out through the [`Executor`]
//! trait so that unit tests can substitute a scripted fake instead of
//! spawning real processes.

use anyhow::{Context as _, Result};
use std::process::{Command, Output};

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Captured standard output, lossily decoded as UTF-8.
    pub stdout: String,
    /// Captured standard error, lossily decoded as UTF-8.
    pub stderr: String,
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Raw exit code, when the process exited normally.
    pub code: Option<i32>,
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Interface for running external commands.
pub trait Executor: Send + Sync {
    /// Run a command, allowing failure (returns the result without bailing).
    ///
    /// Non-zero exit is reported through [`ExecResult::success`] and
    /// [`ExecResult::code`], not as an `Err` — callers that care about exit
    /// codes (e.g. the package manager's reboot sentinel) inspect the result.
    ///
    /// # Errors
    ///
    /// Returns an error only if the command could not be spawned at all.
    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Check if a program is available on PATH.
    fn which(&self, program: &str) -> bool;
}

/// Production [`Executor`] that spawns real processes.
#[derive(Debug, Default)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let output = Command::new(program)
            .args(args)
            .output()
            .with_context(|| format!("failed to execute: {program}"))?;
        Ok(ExecResult::from(output))
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    /// Helper: run a simple echo command cross-platform.
    fn echo_result(msg: &str) -> Result<ExecResult> {
        let exec = SystemExecutor;
        #[cfg(windows)]
        {
            exec.run_unchecked("cmd", &["/C", "echo", msg])
        }
        #[cfg(not(windows))]
        {
            exec.run_unchecked("echo", &[msg])
        }
    }

    #[test]
    fn run_echo() {
        let result = echo_result("hello").unwrap();
        assert!(result.success, "echo command should succeed");
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[test]
    fn run_unchecked_failure_sets_code() {
        let exec = SystemExecutor;
        #[cfg(windows)]
        let result = exec.run_unchecked("cmd", &["/C", "exit", "1"]).unwrap();
        #[cfg(not(windows))]
        let result = exec.run_unchecked("false", &[]).unwrap();
        assert!(!result.success, "non-zero exit should set success=false");
        assert_eq!(result.code, Some(1));
    }

    #[test]
    fn run_unchecked_missing_program_is_error() {
        let exec = SystemExecutor;
        assert!(
            exec.run_unchecked("this-program-does-not-exist-12345", &[])
                .is_err(),
            "spawning a missing program should be an error"
        );
    }

    #[test]
    fn which_finds_known_program() {
        let exec = SystemExecutor;
        // `cmd` always exists on Windows; `sh` is a real binary on Unix.
        #[cfg(windows)]
        assert!(exec.which("cmd"), "cmd should be found on Windows");
        #[cfg(not(windows))]
        assert!(exec.which("sh"), "sh should be found on Unix");
    }

    #[test]
    fn which_missing_program() {
        let exec = SystemExecutor;
        assert!(
            !exec.which("this-program-does-not-exist-12345"),
            "non-existent program should not be found"
        );
    }
}
