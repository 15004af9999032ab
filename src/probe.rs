//! State prober.
//!
//! Determines current machine reality for a single declaration without side
//! effects. Probing is a pure read: it never creates, deletes, or modifies
//! anything, and its result is computed fresh for every declaration — never
//! cached across runs. Probing failures become [`ProbedState::ProbeFailed`]
//! rather than errors, so the convergence engine decides policy explicitly.

use std::path::PathBuf;

use crate::declarations::LinkDeclaration;
use crate::fsops::FileSystemOps;
use crate::manager::PackageManager;

/// Read-only snapshot of current reality for one declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbedState {
    /// Nothing exists at the target location / package not installed.
    Absent,
    /// Current state already matches the declaration exactly.
    Satisfies,
    /// Something exists but does not match the declaration.
    Conflicting {
        /// For links: the current symlink target when the conflicting entry
        /// is itself a symlink, `None` when it is a regular file or
        /// directory. The distinction decides whether a backup is taken.
        current: Option<PathBuf>,
    },
    /// Inspecting current state failed; the declaration is never attempted.
    ProbeFailed {
        /// Diagnostic for the outcome record.
        message: String,
    },
}

/// Probe installed status for a package declaration.
///
/// Uses the manager's exact-name query, so `git` is never considered
/// installed because `git-lfs` is.
pub fn probe_package(manager: &dyn PackageManager, name: &str) -> ProbedState {
    match manager.is_installed(name) {
        Ok(true) => ProbedState::Satisfies,
        Ok(false) => ProbedState::Absent,
        Err(e) => ProbedState::ProbeFailed {
            message: format!("{e:#}"),
        },
    }
}

/// Probe filesystem state for a link declaration.
pub fn probe_link(fs: &dyn FileSystemOps, decl: &LinkDeclaration) -> ProbedState {
    if !fs.exists(&decl.link_path) {
        return ProbedState::Absent;
    }
    match fs.link_target(&decl.link_path) {
        Ok(Some(target)) if target == decl.target_path => ProbedState::Satisfies,
        Ok(current) => ProbedState::Conflicting { current },
        Err(e) => ProbedState::ProbeFailed {
            message: format!("reading link {}: {e}", decl.link_path.display()),
        },
    }
}
