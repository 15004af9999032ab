//! Resource declaration store.
//!
//! Loads the declaration source directory into typed, deduplicated,
//! in-memory declarations. Parsing collects [`ParseError`]s instead of
//! raising, so a load pass reports every problem at once; only I/O-level
//! failures (missing source directory, unreadable files) become a
//! [`ConfigurationError`]. Loading never probes machine state.

mod groups;
mod links;
mod list;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{ConfigurationError, ParseError};

/// File name of the line-oriented package list.
const PACKAGES_FILE: &str = "packages.list";
/// File name of the structured group definitions.
const GROUPS_FILE: &str = "groups.toml";
/// File name of the dotfile mappings.
const LINKS_FILE: &str = "links.toml";

/// A requested end-state for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDeclaration {
    /// Package identifier, unique within a run.
    pub name: String,
    /// Group the package was declared under, if any.
    pub group: Option<String>,
    /// Human-readable description, if any.
    pub description: Option<String>,
}

/// A requested end-state for one symlink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDeclaration {
    /// Absolute path where the link must exist.
    pub link_path: PathBuf,
    /// Absolute path the link must point to.
    pub target_path: PathBuf,
    /// Human-readable description.
    pub description: String,
}

impl LinkDeclaration {
    /// Short display label for outcome records and logs.
    #[must_use]
    pub fn label(&self) -> String {
        self.link_path.display().to_string()
    }
}

/// All declarations loaded from one source directory, deduplicated and in
/// deterministic load order.
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    /// Package declarations, first-seen order.
    pub packages: Vec<PackageDeclaration>,
    /// Link declarations, first-seen order.
    pub links: Vec<LinkDeclaration>,
}

impl Declarations {
    /// Load declarations from `source_dir`.
    ///
    /// Missing declaration files are treated as empty; a missing source
    /// directory is a configuration error. Duplicate identities (package
    /// name, link path) are deduplicated first-wins across all sources in
    /// load order (`packages.list` before `groups.toml`), so a package
    /// declared in two places keeps its first-seen group tag.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::SourceMissing`] when `source_dir` does
    /// not exist, or [`ConfigurationError::Io`] when a declaration file
    /// exists but cannot be read. Parse failures are collected into the
    /// returned `Vec<ParseError>`, not raised.
    pub fn load(source_dir: &Path) -> Result<(Self, Vec<ParseError>), ConfigurationError> {
        if !source_dir.is_dir() {
            return Err(ConfigurationError::SourceMissing(source_dir.to_path_buf()));
        }

        let mut parse_errors = Vec::new();
        let mut packages = Vec::new();

        if let Some(content) = read_optional(&source_dir.join(PACKAGES_FILE))? {
            packages.extend(list::parse(&content).into_iter().map(|name| {
                PackageDeclaration {
                    name,
                    group: None,
                    description: None,
                }
            }));
        }

        if let Some(content) = read_optional(&source_dir.join(GROUPS_FILE))? {
            match groups::parse(&content) {
                Ok(declared) => packages.extend(declared),
                Err(e) => parse_errors.push(e),
            }
        }

        let mut links = Vec::new();
        if let Some(content) = read_optional(&source_dir.join(LINKS_FILE))? {
            match links::parse(&content) {
                Ok(declared) => links.extend(declared),
                Err(e) => parse_errors.push(e),
            }
        }

        let mut seen_packages = HashSet::new();
        packages.retain(|p| seen_packages.insert(p.name.clone()));

        let mut seen_links = HashSet::new();
        links.retain(|l| seen_links.insert(l.link_path.clone()));

        Ok((Self { packages, links }, parse_errors))
    }

    /// Total number of declarations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len() + self.links.len()
    }

    /// Whether no resources are declared at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.links.is_empty()
    }
}

/// Read a declaration file, treating a missing file as `None`.
fn read_optional(path: &Path) -> Result<Option<String>, ConfigurationError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ConfigurationError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
