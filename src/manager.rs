//! Package manager collaborator.
//!
//! The engine talks to the system package manager through the
//! [`PackageManager`] trait; [`Choco`] is the Chocolatey-backed production
//! implementation. Queries use exact name matching so `git` never matches
//! `git-lfs`.

use anyhow::Result;

use crate::exec::Executor;

/// Exit code Chocolatey uses to signal a successful install that requires a
/// reboot before the package is usable.
pub const REBOOT_REQUIRED_EXIT_CODE: i32 = 3010;

/// Result of a package installation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallStatus {
    /// The package was installed and is immediately usable.
    Success,
    /// The package was installed but a reboot is needed before use.
    SuccessRebootRequired,
    /// The install failed; carries the exit code when one was reported.
    Failure(Option<i32>),
}

/// Interface to the system package manager.
pub trait PackageManager: Send + Sync {
    /// Human-readable name of the manager, for prerequisite diagnostics.
    fn name(&self) -> &str;

    /// Check whether the manager binary is available on this machine.
    fn is_available(&self) -> bool;

    /// Check whether `package` is already installed (exact name match).
    ///
    /// # Errors
    ///
    /// Returns an error if the query command could not be run or reported
    /// a failure; the caller records this as a probe failure.
    fn is_installed(&self, package: &str) -> Result<bool>;

    /// Install `package`.
    ///
    /// Install failures are reported through [`InstallStatus::Failure`], not
    /// as an `Err`, so the caller can continue with remaining packages.
    ///
    /// # Errors
    ///
    /// Returns an error only if the install command could not be spawned.
    fn install(&self, package: &str) -> Result<InstallStatus>;
}

/// Chocolatey-backed [`PackageManager`].
pub struct Choco<'a> {
    executor: &'a dyn Executor,
}

impl std::fmt::Debug for Choco<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Choco").finish_non_exhaustive()
    }
}

impl<'a> Choco<'a> {
    /// Create a Chocolatey manager that shells out through `executor`.
    #[must_use]
    pub const fn new(executor: &'a dyn Executor) -> Self {
        Self { executor }
    }
}

impl PackageManager for Choco<'_> {
    fn name(&self) -> &str {
        "choco"
    }

    fn is_available(&self) -> bool {
        self.executor.which("choco")
    }

    fn is_installed(&self, package: &str) -> Result<bool> {
        let result = self
            .executor
            .run_unchecked("choco", &["list", "--exact", "--limit-output", package])?;
        if !result.success {
            anyhow::bail!(
                "choco list failed for '{}': {}",
                package,
                result.stderr.trim()
            );
        }
        // --limit-output prints one "name|version" line per installed match.
        Ok(result.stdout.lines().any(|line| {
            line.split('|')
                .next()
                .is_some_and(|name| name.trim().eq_ignore_ascii_case(package))
        }))
    }

    fn install(&self, package: &str) -> Result<InstallStatus> {
        let result = self
            .executor
            .run_unchecked("choco", &["install", package, "-y", "--no-progress"])?;
        if result.success {
            return Ok(InstallStatus::Success);
        }
        if result.code == Some(REBOOT_REQUIRED_EXIT_CODE) {
            return Ok(InstallStatus::SuccessRebootRequired);
        }
        Ok(InstallStatus::Failure(result.code))
    }
}
