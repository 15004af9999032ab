// Shared helpers for integration tests.
//
// Provides a temp-directory declaration-source builder plus recording fakes
// for the filesystem, package-manager, and environment collaborators, so
// each test can assert on mutation counts without repeating boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use bootstrap_cli::fsops::{FileSystemOps, SystemFileSystemOps};
use bootstrap_cli::manager::{InstallStatus, PackageManager};

/// Build a declaration source directory inside a temp dir.
pub struct SourceBuilder {
    dir: PathBuf,
}

impl SourceBuilder {
    pub fn new(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).unwrap();
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn packages(self, content: &str) -> Self {
        std::fs::write(self.dir.join("packages.list"), content).unwrap();
        self
    }

    pub fn groups(self, content: &str) -> Self {
        std::fs::write(self.dir.join("groups.toml"), content).unwrap();
        self
    }

    pub fn links(self, content: &str) -> Self {
        std::fs::write(self.dir.join("links.toml"), content).unwrap();
        self
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

/// Real filesystem ops wrapped with a mutating-call counter, so tests can
/// assert that a converged run performs zero mutations.
#[derive(Debug)]
pub struct RecordingFs {
    inner: SystemFileSystemOps,
    mutations: AtomicUsize,
}

impl RecordingFs {
    pub const fn new() -> Self {
        Self {
            inner: SystemFileSystemOps,
            mutations: AtomicUsize::new(0),
        }
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for RecordingFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystemOps for RecordingFs {
    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn exists_resolved(&self, path: &Path) -> bool {
        self.inner.exists_resolved(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path)
    }

    fn link_target(&self, path: &Path) -> std::io::Result<Option<PathBuf>> {
        self.inner.link_target(path)
    }

    fn create_link(&self, link: &Path, target: &Path) -> Result<()> {
        self.bump();
        self.inner.create_link(link, target)
    }

    fn copy(&self, src: &Path, dst: &Path) -> Result<()> {
        self.bump();
        self.inner.copy(src, dst)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.bump();
        self.inner.remove(path)
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        self.bump();
        self.inner.ensure_dir(path)
    }
}

/// In-memory package manager that tracks installed state across runs.
pub struct MemoryManager {
    installed: Mutex<Vec<String>>,
    failing: Vec<String>,
    install_calls: AtomicUsize,
}

impl MemoryManager {
    pub fn new(installed: &[&str]) -> Self {
        Self {
            installed: Mutex::new(installed.iter().map(ToString::to_string).collect()),
            failing: Vec::new(),
            install_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(mut self, packages: &[&str]) -> Self {
        self.failing = packages.iter().map(ToString::to_string).collect();
        self
    }

    pub fn install_call_count(&self) -> usize {
        self.install_calls.load(Ordering::SeqCst)
    }
}

impl PackageManager for MemoryManager {
    fn name(&self) -> &str {
        "memory"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn is_installed(&self, package: &str) -> Result<bool> {
        // Exact identity, mirroring the production manager's contract.
        Ok(self.installed.lock().unwrap().iter().any(|p| p == package))
    }

    fn install(&self, package: &str) -> Result<InstallStatus> {
        self.install_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.iter().any(|p| p == package) {
            return Ok(InstallStatus::Failure(Some(1)));
        }
        self.installed.lock().unwrap().push(package.to_string());
        Ok(InstallStatus::Success)
    }
}

/// Environment collaborator that only counts refresh calls.
#[derive(Debug, Default)]
pub struct CountingEnvironment {
    refreshes: AtomicUsize,
}

impl CountingEnvironment {
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

impl bootstrap_cli::engine::Environment for CountingEnvironment {
    fn refresh(&self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
