//! Per-resource convergence state machine.
//!
//! Given a declaration and its probed state, decides the action (skip /
//! create / replace-with-backup / fail) and executes it. Resource-level
//! failures never propagate as errors past this boundary — every call
//! returns a [`ResourceOutcome`].

use std::path::{Path, PathBuf};

use crate::declarations::{LinkDeclaration, PackageDeclaration};
use crate::engine::{BackupRecord, Confirmer, Policy, ResourceOutcome};
use crate::error::FailureKind;
use crate::fsops::FileSystemOps;
use crate::manager::{InstallStatus, PackageManager};
use crate::probe::{self, ProbedState};

/// Skip reason for an already-converged resource.
pub const REASON_SATISFIED: &str = "already satisfies declaration";
/// Skip reason in dry-run mode.
pub const REASON_DRY_RUN: &str = "dry-run";
/// Skip reason when the operator declines a replacement.
pub const REASON_DECLINED: &str = "user declined";

/// Converge one package declaration.
pub fn converge_package(
    decl: &PackageDeclaration,
    state: &ProbedState,
    policy: Policy,
    manager: &dyn PackageManager,
) -> ResourceOutcome {
    match state {
        ProbedState::Satisfies => ResourceOutcome::Skipped {
            reason: REASON_SATISFIED.to_string(),
        },
        ProbedState::ProbeFailed { message } => ResourceOutcome::Failed {
            kind: FailureKind::Probe,
            message: message.clone(),
        },
        // The package prober never reports a conflict; a manager that did
        // would be a probe bug, surfaced rather than acted on.
        ProbedState::Conflicting { .. } => ResourceOutcome::Failed {
            kind: FailureKind::Probe,
            message: format!("unexpected conflicting state for package '{}'", decl.name),
        },
        ProbedState::Absent => {
            if policy.dry_run {
                return ResourceOutcome::Skipped {
                    reason: REASON_DRY_RUN.to_string(),
                };
            }
            match manager.install(&decl.name) {
                Ok(InstallStatus::Success) => ResourceOutcome::Created {
                    reboot_required: false,
                },
                Ok(InstallStatus::SuccessRebootRequired) => ResourceOutcome::Created {
                    reboot_required: true,
                },
                Ok(InstallStatus::Failure(code)) => ResourceOutcome::Failed {
                    kind: FailureKind::Install,
                    message: code.map_or_else(
                        || "installer terminated without an exit code".to_string(),
                        |c| format!("installer exited with code {c}"),
                    ),
                },
                Err(e) => ResourceOutcome::Failed {
                    kind: FailureKind::Install,
                    message: format!("{e:#}"),
                },
            }
        }
    }
}

/// Converge one link declaration.
pub fn converge_link(
    decl: &LinkDeclaration,
    state: &ProbedState,
    policy: Policy,
    fs: &dyn FileSystemOps,
    confirmer: &dyn Confirmer,
) -> ResourceOutcome {
    match state {
        ProbedState::Satisfies => ResourceOutcome::Skipped {
            reason: REASON_SATISFIED.to_string(),
        },
        ProbedState::ProbeFailed { message } => ResourceOutcome::Failed {
            kind: FailureKind::Probe,
            message: message.clone(),
        },
        ProbedState::Absent => {
            if policy.dry_run {
                return ResourceOutcome::Skipped {
                    reason: REASON_DRY_RUN.to_string(),
                };
            }
            match create_and_validate(decl, fs) {
                Ok(()) => ResourceOutcome::Created {
                    reboot_required: false,
                },
                Err(outcome) => outcome,
            }
        }
        ProbedState::Conflicting { current } => {
            if policy.dry_run {
                return ResourceOutcome::Skipped {
                    reason: REASON_DRY_RUN.to_string(),
                };
            }
            if !policy.assume_yes {
                let prompt = format!(
                    "Replace existing entry at {} with a link to {}?",
                    decl.link_path.display(),
                    decl.target_path.display()
                );
                if !confirmer.confirm(&prompt) {
                    return ResourceOutcome::Skipped {
                        reason: REASON_DECLINED.to_string(),
                    };
                }
            }
            replace_conflicting(decl, current.is_some(), fs)
        }
    }
}

/// Replace a conflicting entry at the link path: back up (regular files
/// only), remove, create, re-probe.
///
/// Sequenced so a failure never leaves the target removed-but-unlinked:
/// backup happens before removal, and a creation failure after removal
/// restores the backup.
fn replace_conflicting(
    decl: &LinkDeclaration,
    conflict_is_link: bool,
    fs: &dyn FileSystemOps,
) -> ResourceOutcome {
    // Directories cannot be copied to a backup file, so a confirmed
    // directory conflict is refused with a message that says so instead of
    // surfacing a bare copy error.
    if !conflict_is_link && fs.is_dir(&decl.link_path) {
        return ResourceOutcome::Failed {
            kind: FailureKind::Io,
            message: format!(
                "conflicting entry at {} is a directory; directories are not \
                 backed up, move or remove it manually",
                decl.link_path.display()
            ),
        };
    }

    // A conflicting symlink carries no content worth preserving.
    let backup = if conflict_is_link {
        None
    } else {
        match take_backup(&decl.link_path, fs) {
            Ok(record) => Some(record),
            Err(e) => {
                return ResourceOutcome::Failed {
                    kind: FailureKind::Io,
                    message: format!("backup failed: {e:#}"),
                };
            }
        }
    };

    if let Err(e) = fs.remove(&decl.link_path) {
        // Backup (if any) exists; the conflicting entry is still in place.
        return ResourceOutcome::Failed {
            kind: FailureKind::Io,
            message: format!("removing conflicting entry: {e:#}"),
        };
    }

    match create_and_validate(decl, fs) {
        Ok(()) => ResourceOutcome::Replaced {
            backup: backup.map(|r| r.backup_path),
        },
        Err(outcome) => {
            // Put the original content back so the path is never left
            // removed-but-unlinked. If even that fails, the outcome must
            // name the backup so the operator can recover by hand.
            if let Some(ref record) = backup
                && let Err(restore_err) = fs.copy(&record.backup_path, &record.original_path)
            {
                return with_restore_failure(outcome, &restore_err, record);
            }
            outcome
        }
    }
}

/// Fold a failed restore into the original failure outcome, preserving the
/// backup location in the message.
fn with_restore_failure(
    outcome: ResourceOutcome,
    restore_err: &anyhow::Error,
    record: &BackupRecord,
) -> ResourceOutcome {
    match outcome {
        ResourceOutcome::Failed { kind, message } => ResourceOutcome::Failed {
            kind,
            message: format!(
                "{message}; restoring the original at {} also failed: {restore_err:#}; \
                 its content is preserved at {}",
                record.original_path.display(),
                record.backup_path.display()
            ),
        },
        other => other,
    }
}

/// Create the declared link and re-probe to confirm it matches.
fn create_and_validate(
    decl: &LinkDeclaration,
    fs: &dyn FileSystemOps,
) -> Result<(), ResourceOutcome> {
    if let Some(parent) = decl.link_path.parent()
        && let Err(e) = fs.ensure_dir(parent)
    {
        return Err(ResourceOutcome::Failed {
            kind: FailureKind::Io,
            message: format!("creating parent directory: {e:#}"),
        });
    }

    if let Err(e) = fs.create_link(&decl.link_path, &decl.target_path) {
        return Err(ResourceOutcome::Failed {
            kind: FailureKind::Io,
            message: format!("{e:#}"),
        });
    }

    match probe::probe_link(fs, decl) {
        ProbedState::Satisfies => Ok(()),
        other => Err(ResourceOutcome::Failed {
            kind: FailureKind::LinkValidation,
            message: format!(
                "link at {} does not match declaration after creation: {other:?}",
                decl.link_path.display()
            ),
        }),
    }
}

/// Copy `original` to a unique timestamped sibling path.
fn take_backup(original: &Path, fs: &dyn FileSystemOps) -> anyhow::Result<BackupRecord> {
    let timestamp = chrono::Local::now();
    let backup_path = backup_path_for(original, &timestamp, fs);
    fs.copy(original, &backup_path)?;
    Ok(BackupRecord {
        original_path: original.to_path_buf(),
        backup_path,
        timestamp,
    })
}

/// Pick a sibling backup path that does not exist yet.
fn backup_path_for(
    original: &Path,
    timestamp: &chrono::DateTime<chrono::Local>,
    fs: &dyn FileSystemOps,
) -> PathBuf {
    let base = format!(
        "{}.{}.bak",
        original.display(),
        timestamp.format("%Y%m%d-%H%M%S")
    );
    let mut candidate = PathBuf::from(&base);
    let mut counter = 1_u32;
    while fs.exists(&candidate) {
        candidate = PathBuf::from(format!("{base}.{counter}"));
        counter = counter.saturating_add(1);
    }
    candidate
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::engine::{AutoConfirm, AutoDecline};
    use crate::fsops::SystemFileSystemOps;
    use anyhow::Result;
    use std::sync::Mutex;

    struct FakeManager {
        install_results: Mutex<Vec<Result<InstallStatus>>>,
        install_calls: Mutex<Vec<String>>,
    }

    impl FakeManager {
        fn new(results: Vec<Result<InstallStatus>>) -> Self {
            Self {
                install_results: Mutex::new(results),
                install_calls: Mutex::new(Vec::new()),
            }
        }

        fn install_calls(&self) -> Vec<String> {
            self.install_calls.lock().unwrap().clone()
        }
    }

    impl PackageManager for FakeManager {
        fn name(&self) -> &str {
            "fake"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn is_installed(&self, _package: &str) -> Result<bool> {
            Ok(false)
        }

        fn install(&self, package: &str) -> Result<InstallStatus> {
            self.install_calls.lock().unwrap().push(package.to_string());
            let mut results = self.install_results.lock().unwrap();
            if results.is_empty() {
                anyhow::bail!("no scripted install result");
            }
            results.remove(0)
        }
    }

    /// Real filesystem, except link creation always fails; optionally the
    /// restore copy (backup file back to the original path) fails too.
    #[derive(Debug)]
    struct BrokenLinkFs {
        inner: SystemFileSystemOps,
        fail_restore: bool,
    }

    impl BrokenLinkFs {
        const fn new(fail_restore: bool) -> Self {
            Self {
                inner: SystemFileSystemOps,
                fail_restore,
            }
        }
    }

    impl FileSystemOps for BrokenLinkFs {
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

        fn create_link(&self, _link: &Path, _target: &Path) -> Result<()> {
            anyhow::bail!("simulated link failure")
        }

        fn copy(&self, src: &Path, dst: &Path) -> Result<()> {
            // Copies whose source is a backup file are restores.
            if self.fail_restore && src.display().to_string().contains(".bak") {
                anyhow::bail!("simulated restore failure")
            }
            self.inner.copy(src, dst)
        }

        fn remove(&self, path: &Path) -> Result<()> {
            self.inner.remove(path)
        }

        fn ensure_dir(&self, path: &Path) -> Result<()> {
            self.inner.ensure_dir(path)
        }
    }

    fn pkg(name: &str) -> PackageDeclaration {
        PackageDeclaration {
            name: name.to_string(),
            group: None,
            description: None,
        }
    }

    fn link_decl(link: &Path, target: &Path) -> LinkDeclaration {
        LinkDeclaration {
            link_path: link.to_path_buf(),
            target_path: target.to_path_buf(),
            description: String::new(),
        }
    }

    #[test]
    fn satisfied_package_skipped_without_install() {
        let mgr = FakeManager::new(vec![]);
        let outcome = converge_package(&pkg("git"), &ProbedState::Satisfies, Policy::default(), &mgr);
        assert_eq!(
            outcome,
            ResourceOutcome::Skipped {
                reason: REASON_SATISFIED.to_string()
            }
        );
        assert!(mgr.install_calls().is_empty());
    }

    #[test]
    fn dry_run_never_installs() {
        let mgr = FakeManager::new(vec![]);
        let policy = Policy {
            dry_run: true,
            assume_yes: false,
        };
        let outcome = converge_package(&pkg("git"), &ProbedState::Absent, policy, &mgr);
        assert_eq!(
            outcome,
            ResourceOutcome::Skipped {
                reason: REASON_DRY_RUN.to_string()
            }
        );
        assert!(mgr.install_calls().is_empty());
    }

    #[test]
    fn absent_package_installed() {
        let mgr = FakeManager::new(vec![Ok(InstallStatus::Success)]);
        let outcome = converge_package(&pkg("git"), &ProbedState::Absent, Policy::default(), &mgr);
        assert_eq!(
            outcome,
            ResourceOutcome::Created {
                reboot_required: false
            }
        );
        assert_eq!(mgr.install_calls(), vec!["git"]);
    }

    #[test]
    fn reboot_sentinel_surfaces_as_flag() {
        let mgr = FakeManager::new(vec![Ok(InstallStatus::SuccessRebootRequired)]);
        let outcome = converge_package(&pkg("dotnet"), &ProbedState::Absent, Policy::default(), &mgr);
        assert_eq!(
            outcome,
            ResourceOutcome::Created {
                reboot_required: true
            }
        );
    }

    #[test]
    fn install_failure_recorded_not_raised() {
        let mgr = FakeManager::new(vec![Ok(InstallStatus::Failure(Some(1)))]);
        let outcome = converge_package(&pkg("git"), &ProbedState::Absent, Policy::default(), &mgr);
        assert!(matches!(
            outcome,
            ResourceOutcome::Failed {
                kind: FailureKind::Install,
                ..
            }
        ));
    }

    #[test]
    fn probe_failure_never_attempted() {
        let mgr = FakeManager::new(vec![Ok(InstallStatus::Success)]);
        let state = ProbedState::ProbeFailed {
            message: "permission denied".to_string(),
        };
        let outcome = converge_package(&pkg("git"), &state, Policy::default(), &mgr);
        assert!(matches!(
            outcome,
            ResourceOutcome::Failed {
                kind: FailureKind::Probe,
                ..
            }
        ));
        assert!(mgr.install_calls().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn absent_link_created_and_validated() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = SystemFileSystemOps;
        let target = tmp.path().join("target");
        std::fs::write(&target, "x").unwrap();
        let decl = link_decl(&tmp.path().join("nested/dir/link"), &target);

        let outcome = converge_link(&decl, &ProbedState::Absent, Policy::default(), &fs, &AutoDecline);
        assert_eq!(
            outcome,
            ResourceOutcome::Created {
                reboot_required: false
            }
        );
        assert_eq!(std::fs::read_link(&decl.link_path).unwrap(), target);
    }

    #[cfg(unix)]
    #[test]
    fn declined_conflict_left_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = SystemFileSystemOps;
        let link = tmp.path().join("link");
        std::fs::write(&link, "precious").unwrap();
        let decl = link_decl(&link, &tmp.path().join("target"));

        let outcome = converge_link(
            &decl,
            &ProbedState::Conflicting { current: None },
            Policy::default(),
            &fs,
            &AutoDecline,
        );
        assert_eq!(
            outcome,
            ResourceOutcome::Skipped {
                reason: REASON_DECLINED.to_string()
            }
        );
        assert_eq!(std::fs::read_to_string(&link).unwrap(), "precious");
    }

    #[cfg(unix)]
    #[test]
    fn conflicting_file_backed_up_before_replacement() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = SystemFileSystemOps;
        let target = tmp.path().join("target");
        let link = tmp.path().join("link");
        std::fs::write(&target, "new").unwrap();
        std::fs::write(&link, "precious").unwrap();
        let decl = link_decl(&link, &target);

        let outcome = converge_link(
            &decl,
            &ProbedState::Conflicting { current: None },
            Policy::default(),
            &fs,
            &AutoConfirm,
        );
        let ResourceOutcome::Replaced {
            backup: Some(backup),
        } = outcome
        else {
            panic!("expected Replaced with backup, got {outcome:?}");
        };
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "precious");
        assert_eq!(std::fs::read_link(&link).unwrap(), target);
    }

    #[cfg(unix)]
    #[test]
    fn conflicting_symlink_replaced_without_backup() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = SystemFileSystemOps;
        let wanted = tmp.path().join("wanted");
        let other = tmp.path().join("other");
        let link = tmp.path().join("link");
        std::fs::write(&wanted, "x").unwrap();
        std::fs::write(&other, "y").unwrap();
        std::os::unix::fs::symlink(&other, &link).unwrap();
        let decl = link_decl(&link, &wanted);

        let outcome = converge_link(
            &decl,
            &ProbedState::Conflicting {
                current: Some(other),
            },
            Policy {
                dry_run: false,
                assume_yes: true,
            },
            &fs,
            &AutoDecline,
        );
        assert_eq!(outcome, ResourceOutcome::Replaced { backup: None });
        assert_eq!(std::fs::read_link(&link).unwrap(), wanted);
    }

    #[cfg(unix)]
    #[test]
    fn assume_yes_skips_confirmation() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = SystemFileSystemOps;
        let target = tmp.path().join("target");
        let link = tmp.path().join("link");
        std::fs::write(&target, "x").unwrap();
        std::fs::write(&link, "old").unwrap();
        let decl = link_decl(&link, &target);

        // AutoDecline would refuse, but assume_yes must bypass the prompt.
        let outcome = converge_link(
            &decl,
            &ProbedState::Conflicting { current: None },
            Policy {
                dry_run: false,
                assume_yes: true,
            },
            &fs,
            &AutoDecline,
        );
        assert!(matches!(outcome, ResourceOutcome::Replaced { .. }));
    }

    #[test]
    fn failed_creation_restores_original_from_backup() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = BrokenLinkFs::new(false);
        let target = tmp.path().join("target");
        let link = tmp.path().join("link");
        std::fs::write(&target, "new").unwrap();
        std::fs::write(&link, "precious").unwrap();
        let decl = link_decl(&link, &target);

        let outcome = converge_link(
            &decl,
            &ProbedState::Conflicting { current: None },
            Policy {
                dry_run: false,
                assume_yes: true,
            },
            &fs,
            &AutoDecline,
        );
        assert!(matches!(
            outcome,
            ResourceOutcome::Failed {
                kind: FailureKind::Io,
                ..
            }
        ));
        assert_eq!(
            std::fs::read_to_string(&link).unwrap(),
            "precious",
            "original content must be back at the link path"
        );
    }

    #[test]
    fn failed_restore_reports_backup_location() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = BrokenLinkFs::new(true);
        let target = tmp.path().join("target");
        let link = tmp.path().join("link");
        std::fs::write(&target, "new").unwrap();
        std::fs::write(&link, "precious").unwrap();
        let decl = link_decl(&link, &target);

        let outcome = converge_link(
            &decl,
            &ProbedState::Conflicting { current: None },
            Policy {
                dry_run: false,
                assume_yes: true,
            },
            &fs,
            &AutoDecline,
        );
        let ResourceOutcome::Failed { message, .. } = outcome else {
            panic!("expected Failed, got {outcome:?}");
        };
        assert!(
            message.contains("restoring the original"),
            "restore failure must be surfaced: {message}"
        );
        assert!(
            message.contains(".bak"),
            "backup location must be named so the operator can recover: {message}"
        );
        // The backup itself still holds the content named in the message.
        let backup = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.path())
            .find(|p| p.display().to_string().contains(".bak"))
            .expect("backup file exists");
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "precious");
    }

    #[test]
    fn conflicting_directory_refused_with_clear_message() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = SystemFileSystemOps;
        let target = tmp.path().join("target");
        let link = tmp.path().join("link");
        std::fs::write(&target, "new").unwrap();
        std::fs::create_dir(&link).unwrap();
        let decl = link_decl(&link, &target);

        let outcome = converge_link(
            &decl,
            &ProbedState::Conflicting { current: None },
            Policy {
                dry_run: false,
                assume_yes: true,
            },
            &fs,
            &AutoDecline,
        );
        let ResourceOutcome::Failed { kind, message } = outcome else {
            panic!("expected Failed, got {outcome:?}");
        };
        assert_eq!(kind, FailureKind::Io);
        assert!(
            message.contains("is a directory"),
            "message must say the conflict is a directory: {message}"
        );
        assert!(link.is_dir(), "the directory must be left untouched");
    }

    #[test]
    fn dry_run_conflict_skipped_before_prompting() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = SystemFileSystemOps;
        let link = tmp.path().join("link");
        std::fs::write(&link, "old").unwrap();
        let decl = link_decl(&link, &tmp.path().join("target"));

        let outcome = converge_link(
            &decl,
            &ProbedState::Conflicting { current: None },
            Policy {
                dry_run: true,
                assume_yes: false,
            },
            &fs,
            &AutoDecline,
        );
        assert_eq!(
            outcome,
            ResourceOutcome::Skipped {
                reason: REASON_DRY_RUN.to_string()
            }
        );
        assert!(link.exists(), "dry-run must not remove anything");
    }

    #[test]
    fn backup_path_is_timestamped_sibling() {
        let fs = SystemFileSystemOps;
        let ts = chrono::Local::now();
        let path = backup_path_for(Path::new("/home/u/.bashrc"), &ts, &fs);
        let rendered = path.display().to_string();
        assert!(rendered.starts_with("/home/u/.bashrc."));
        assert!(rendered.ends_with(".bak"));
    }

    #[cfg(unix)]
    #[test]
    fn backup_path_avoids_collision() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = SystemFileSystemOps;
        let original = tmp.path().join("file");
        std::fs::write(&original, "x").unwrap();
        let ts = chrono::Local::now();
        let first = backup_path_for(&original, &ts, &fs);
        std::fs::write(&first, "taken").unwrap();
        let second = backup_path_for(&original, &ts, &fs);
        assert_ne!(first, second);
    }
}
