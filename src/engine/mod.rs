//! Convergence engine: policy, collaborators, and outcome types.
//!
//! The engine brings machine state into agreement with declarations. This
//! module holds the shared vocabulary; the per-resource state machine lives
//! in [`converge`] and the batch driver in [`coordinator`].

pub mod converge;
pub mod coordinator;

use std::path::PathBuf;

use anyhow::Result;

use crate::error::FailureKind;

/// Run-wide behavior flags, set from the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct Policy {
    /// Preview only: report what would be done, mutate nothing.
    pub dry_run: bool,
    /// Skip interactive confirmation on conflicting resources.
    pub assume_yes: bool,
}

/// Capability for asking the operator a yes/no question.
///
/// Injected so tests supply a deterministic answer instead of blocking on
/// real input.
pub trait Confirmer: Send + Sync {
    /// Ask for confirmation; `false` on decline or when no answer could be
    /// collected (e.g. no interactive terminal).
    fn confirm(&self, prompt: &str) -> bool;
}

/// Interactive [`Confirmer`] backed by a terminal prompt.
#[derive(Debug, Default)]
pub struct ConsoleConfirmer;

impl Confirmer for ConsoleConfirmer {
    fn confirm(&self, prompt: &str) -> bool {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

/// [`Confirmer`] that answers yes to everything.
#[derive(Debug, Default)]
pub struct AutoConfirm;

impl Confirmer for AutoConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// [`Confirmer`] that answers no to everything.
#[derive(Debug, Default)]
pub struct AutoDecline;

impl Confirmer for AutoDecline {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

/// Process-environment collaborator.
///
/// The coordinator calls [`refresh`](Self::refresh) between the package and
/// link phases so tools installed during the run become visible without
/// relying on ambient global state.
pub trait Environment: Send + Sync {
    /// Re-read externally-changed environment (e.g. PATH) into this process.
    ///
    /// # Errors
    ///
    /// Returns an error when the refresh could not be performed; the
    /// coordinator logs a warning and continues.
    fn refresh(&self) -> Result<()>;
}

/// Production [`Environment`].
///
/// On Windows, re-reads the machine and user `PATH` from the registry via
/// PowerShell so packages installed mid-run are resolvable. On other
/// platforms the shell environment cannot be refreshed in-process and this
/// is a no-op.
pub struct SystemEnvironment<'a> {
    #[cfg_attr(not(windows), allow(dead_code))]
    executor: &'a dyn crate::exec::Executor,
}

impl std::fmt::Debug for SystemEnvironment<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemEnvironment").finish_non_exhaustive()
    }
}

impl<'a> SystemEnvironment<'a> {
    /// Create a system environment that shells out through `executor`.
    #[must_use]
    pub const fn new(executor: &'a dyn crate::exec::Executor) -> Self {
        Self { executor }
    }
}

impl Environment for SystemEnvironment<'_> {
    #[cfg(windows)]
    fn refresh(&self) -> Result<()> {
        let result = self.executor.run_unchecked(
            "powershell",
            &[
                "-NoProfile",
                "-Command",
                "[System.Environment]::GetEnvironmentVariable('Path','Machine') + ';' + \
                 [System.Environment]::GetEnvironmentVariable('Path','User')",
            ],
        )?;
        if !result.success {
            anyhow::bail!("reading machine PATH failed: {}", result.stderr.trim());
        }
        let path = result.stdout.trim().to_string();
        if !path.is_empty() {
            // SAFETY: the engine is single-threaded; no other thread reads
            // or writes the environment concurrently.
            #[allow(unsafe_code)]
            unsafe {
                std::env::set_var("PATH", &path);
            }
        }
        Ok(())
    }

    #[cfg(not(windows))]
    fn refresh(&self) -> Result<()> {
        Ok(())
    }
}

/// Result of attempting convergence for one declaration.
///
/// Produced exactly once per declaration per run and immutable once
/// recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceOutcome {
    /// No action was needed or taken.
    Skipped {
        /// Why the resource was skipped.
        reason: String,
    },
    /// The resource was brought into existence.
    Created {
        /// Package installs can succeed while requiring a reboot.
        reboot_required: bool,
    },
    /// A conflicting entry was replaced by the declared link.
    Replaced {
        /// Backup of the replaced file, when one was taken (`None` when the
        /// conflict was itself a symlink).
        backup: Option<PathBuf>,
    },
    /// Convergence failed; the run continues with the next declaration.
    Failed {
        /// What stage of convergence failed.
        kind: FailureKind,
        /// Diagnostic message.
        message: String,
    },
}

impl ResourceOutcome {
    /// Whether this outcome records a failure.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Whether this outcome carries the reboot-required flag.
    #[must_use]
    pub const fn reboot_required(&self) -> bool {
        matches!(
            self,
            Self::Created {
                reboot_required: true
            }
        )
    }
}

/// One declaration's recorded outcome, labeled for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedOutcome {
    /// Display label: package name or link path.
    pub resource: String,
    /// What happened.
    pub outcome: ResourceOutcome,
}

/// Record of a backup taken before a destructive removal.
///
/// Backups are never deleted by this system; retention is the operator's
/// responsibility.
#[derive(Debug, Clone)]
pub struct BackupRecord {
    /// Path of the file that was backed up.
    pub original_path: PathBuf,
    /// Where the copy was written.
    pub backup_path: PathBuf,
    /// When the backup was taken.
    pub timestamp: chrono::DateTime<chrono::Local>,
}

/// Aggregated result of one full run.
#[derive(Debug, Default)]
pub struct RunResult {
    /// Per-declaration outcomes, in processing order.
    pub outcomes: Vec<RecordedOutcome>,
    /// True when any package install succeeded but requires a reboot.
    pub reboot_required: bool,
}

impl RunResult {
    /// Count outcomes matching a predicate.
    fn count(&self, pred: impl Fn(&ResourceOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|r| pred(&r.outcome)).count()
    }

    /// Number of resources created this run.
    #[must_use]
    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, ResourceOutcome::Created { .. }))
    }

    /// Number of conflicting resources replaced this run.
    #[must_use]
    pub fn replaced(&self) -> usize {
        self.count(|o| matches!(o, ResourceOutcome::Replaced { .. }))
    }

    /// Number of resources skipped this run.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ResourceOutcome::Skipped { .. }))
    }

    /// Number of resources that failed this run.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(ResourceOutcome::is_failed)
    }
}
