//! Filesystem operation abstractions for dependency injection.
//!
//! Provides the [`FileSystemOps`] trait so the prober and convergence engine
//! can be unit-tested without touching the real filesystem. Production code
//! uses [`SystemFileSystemOps`].

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

/// Abstraction over the filesystem operations the engine needs.
///
/// The prober only calls the read-only methods ([`exists`](Self::exists) and
/// [`link_target`](Self::link_target)); the convergence engine additionally
/// uses the mutating ones. Keeping both behind one trait lets tests count
/// mutating calls to verify idempotence.
pub trait FileSystemOps: Send + Sync + std::fmt::Debug {
    /// Returns `true` if anything exists at `path`, including a broken
    /// symlink (uses `symlink_metadata`, not `exists`, so dangling links
    /// are visible).
    fn exists(&self, path: &Path) -> bool;

    /// Returns `true` if `path` exists after following symlinks, so a
    /// dangling symlink does not count. Used to validate declared link
    /// targets.
    fn exists_resolved(&self, path: &Path) -> bool;

    /// Returns `true` if the entry at `path` is a directory (without
    /// following a symlink at `path` itself).
    fn is_dir(&self, path: &Path) -> bool;

    /// Read the target of the symbolic link at `path`.
    ///
    /// Returns `Ok(None)` when `path` does not exist or is not a symlink.
    ///
    /// # Errors
    ///
    /// Returns an error for any other failure (e.g. permission denied
    /// reading the parent directory), which the prober surfaces as a
    /// probe failure rather than a guess.
    fn link_target(&self, path: &Path) -> std::io::Result<Option<PathBuf>>;

    /// Create a symlink at `link` pointing to `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the link cannot be created.
    fn create_link(&self, link: &Path, target: &Path) -> Result<()>;

    /// Copy the regular file at `src` to `dst`.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails.
    fn copy(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Remove the file, symlink, or empty directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails.
    fn remove(&self, path: &Path) -> Result<()>;

    /// Create `path` and all missing parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created.
    fn ensure_dir(&self, path: &Path) -> Result<()>;
}

/// Production [`FileSystemOps`] implementation that delegates to [`std::fs`].
#[derive(Debug, Default)]
pub struct SystemFileSystemOps;

impl FileSystemOps for SystemFileSystemOps {
    fn exists(&self, path: &Path) -> bool {
        path.symlink_metadata().is_ok()
    }

    fn exists_resolved(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.symlink_metadata()
            .is_ok_and(|meta| is_dir_like(&meta))
    }

    fn link_target(&self, path: &Path) -> std::io::Result<Option<PathBuf>> {
        match std::fs::read_link(path) {
            Ok(target) => Ok(Some(target)),
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::InvalidInput
                ) =>
            {
                // Missing path or not a symlink: both are answerable states,
                // not probe failures.
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn create_link(&self, link: &Path, target: &Path) -> Result<()> {
        create_symlink(target, link).with_context(|| {
            format!(
                "creating symlink {} -> {}",
                link.display(),
                target.display()
            )
        })
    }

    fn copy(&self, src: &Path, dst: &Path) -> Result<()> {
        std::fs::copy(src, dst)
            .with_context(|| format!("copy {} to {}", src.display(), dst.display()))?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let meta = std::fs::symlink_metadata(path)
            .with_context(|| format!("reading metadata: {}", path.display()))?;
        if is_dir_like(&meta) {
            std::fs::remove_dir(path)
                .with_context(|| format!("removing directory: {}", path.display()))?;
        } else {
            std::fs::remove_file(path)
                .with_context(|| format!("removing file: {}", path.display()))?;
        }
        Ok(())
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("create directory: {}", path.display()))
    }
}

/// Create a symlink at `link` pointing to `target` (platform-specific).
fn create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)
    }

    #[cfg(windows)]
    {
        if target.is_dir() {
            std::os::windows::fs::symlink_dir(target, link)
        } else {
            std::os::windows::fs::symlink_file(target, link)
        }
    }
}

/// Check if metadata represents a directory-like entry.
/// On Windows, `symlink_metadata().is_dir()` returns `false` for directory
/// symlinks, so we check the raw `FILE_ATTRIBUTE_DIRECTORY` bit instead.
fn is_dir_like(meta: &std::fs::Metadata) -> bool {
    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        meta.file_attributes() & 0x10 != 0 // FILE_ATTRIBUTE_DIRECTORY
    }
    #[cfg(not(windows))]
    {
        meta.is_dir()
    }
}
