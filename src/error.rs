//! Domain-specific error types for the bootstrap engine.
//!
//! This module provides a structured error hierarchy using [`thiserror`].
//! The split mirrors the propagation policy of the engine: only
//! [`ProvisionError`] variants are allowed to abort a whole run, and they are
//! raised before any mutation has taken place. Per-resource failures are
//! *not* errors in this sense — they are recorded as
//! [`ResourceOutcome::Failed`](crate::engine::ResourceOutcome::Failed) with a
//! [`FailureKind`] and the run continues.
//!
//! Command handlers at the CLI boundary convert [`ProvisionError`] to
//! [`anyhow::Error`] via the standard `?` operator.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors that abort an entire provisioning run.
///
/// Raised before any mutation: configuration problems are detected while
/// loading and validating declarations, prerequisite problems while checking
/// for the external package manager.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// The declaration sources are missing or malformed, or reference
    /// link targets that do not exist.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A required external tool is not available on this machine.
    #[error("Missing prerequisite: {0}")]
    Prerequisite(String),
}

/// Errors that arise from loading and validating declaration sources.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// The declaration source directory does not exist.
    #[error("declaration source not found: {0}")]
    SourceMissing(PathBuf),

    /// One or more declaration files failed to parse.
    #[error("invalid declarations:\n{}", bulleted(.0))]
    Parse(Vec<ParseError>),

    /// One or more declared link targets do not exist on disk.
    ///
    /// Aggregated: every missing target is listed, so the operator can fix
    /// the whole configuration in one pass.
    #[error("missing link sources:\n{}", bulleted_paths(.0))]
    MissingLinkSources(Vec<PathBuf>),

    /// An I/O error occurred while reading a declaration file.
    #[error("reading {}: {source}", path.display())]
    Io {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// A single declaration-file parse failure.
///
/// The declaration store collects these instead of raising, so a load pass
/// reports every problem at once.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The file content could not be parsed at all (e.g. invalid TOML).
    #[error("{file}: {message}")]
    Malformed {
        /// Short name of the offending declaration file.
        file: String,
        /// Parser diagnostic.
        message: String,
    },

    /// A link or target path in a dotfile mapping is not absolute.
    #[error("{file}: path is not absolute: {path}")]
    RelativePath {
        /// Short name of the offending declaration file.
        file: String,
        /// The offending path as written in the source.
        path: String,
    },
}

/// Classifies a per-resource failure recorded in a
/// [`ResourceOutcome::Failed`](crate::engine::ResourceOutcome::Failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Inspecting current machine state failed (e.g. permission denied).
    Probe,
    /// The package manager reported an installation failure.
    Install,
    /// A link was created but the post-creation re-probe does not match
    /// the declaration.
    LinkValidation,
    /// A filesystem operation (backup, remove, create) failed.
    Io,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Probe => write!(f, "probe"),
            Self::Install => write!(f, "install"),
            Self::LinkValidation => write!(f, "link validation"),
            Self::Io => write!(f, "io"),
        }
    }
}

/// Render a list of parse errors as indented bullet lines.
fn bulleted(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a list of paths as indented bullet lines.
fn bulleted_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n")
}
