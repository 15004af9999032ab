//! Run coordinator.
//!
//! Iterates all declared resources in deterministic order, applies the
//! convergence engine to each, continues past individual failures, and
//! aggregates results. Configuration and prerequisite problems abort the
//! run before any mutation; everything else becomes a recorded outcome.

use crate::declarations::Declarations;
use crate::engine::converge::{self, REASON_DRY_RUN};
use crate::engine::{Confirmer, Environment, Policy, RecordedOutcome, ResourceOutcome, RunResult};
use crate::error::{ConfigurationError, ProvisionError};
use crate::fsops::FileSystemOps;
use crate::logging::Logger;
use crate::manager::PackageManager;
use crate::probe;

/// Drives one full provisioning run over a declaration set.
pub struct Coordinator<'a> {
    manager: &'a dyn PackageManager,
    fs: &'a dyn FileSystemOps,
    environment: &'a dyn Environment,
    confirmer: &'a dyn Confirmer,
    log: &'a Logger,
}

impl std::fmt::Debug for Coordinator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator").finish_non_exhaustive()
    }
}

impl<'a> Coordinator<'a> {
    /// Wire a coordinator from its collaborators.
    #[must_use]
    pub const fn new(
        manager: &'a dyn PackageManager,
        fs: &'a dyn FileSystemOps,
        environment: &'a dyn Environment,
        confirmer: &'a dyn Confirmer,
        log: &'a Logger,
    ) -> Self {
        Self {
            manager,
            fs,
            environment,
            confirmer,
            log,
        }
    }

    /// Process every declaration and aggregate outcomes.
    ///
    /// Link sources are validated before anything else: a missing source is
    /// a configuration error, not a per-resource fault, so it aborts the
    /// whole run before any mutation. Packages are then processed with
    /// continue-on-failure semantics, the environment is refreshed, and
    /// links are deployed.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Configuration`] when any declared link
    /// target is missing, or [`ProvisionError::Prerequisite`] when packages
    /// are declared but the package manager is absent. Per-resource
    /// failures are recorded in the result, never raised.
    pub fn run(
        &self,
        declarations: &Declarations,
        policy: Policy,
    ) -> Result<RunResult, ProvisionError> {
        self.validate_link_sources(declarations)?;

        if !declarations.packages.is_empty() && !self.manager.is_available() {
            return Err(ProvisionError::Prerequisite(format!(
                "package manager '{}' not found on PATH",
                self.manager.name()
            )));
        }

        let mut result = RunResult::default();

        if !declarations.packages.is_empty() {
            self.log.stage("Packages");
            for decl in &declarations.packages {
                let state = probe::probe_package(self.manager, &decl.name);
                self.log.debug(&format!("probe {}: {state:?}", decl.name));
                let outcome = converge::converge_package(decl, &state, policy, self.manager);
                self.record(&mut result, decl.name.clone(), outcome);
            }

            if let Err(e) = self.environment.refresh() {
                self.log.warn(&format!("environment refresh failed: {e:#}"));
            }
        }

        if !declarations.links.is_empty() {
            self.log.stage("Links");
            for decl in &declarations.links {
                let state = probe::probe_link(self.fs, decl);
                self.log.debug(&format!("probe {}: {state:?}", decl.label()));
                let outcome = converge::converge_link(decl, &state, policy, self.fs, self.confirmer);
                self.record(&mut result, decl.label(), outcome);
            }
        }

        result.reboot_required = result
            .outcomes
            .iter()
            .any(|r| r.outcome.reboot_required());
        Ok(result)
    }

    /// Validate that every declared link target exists on disk.
    ///
    /// Follows symlinks, so a target that is itself a dangling link counts
    /// as missing. Aggregated so the operator sees every missing source at
    /// once.
    fn validate_link_sources(&self, declarations: &Declarations) -> Result<(), ProvisionError> {
        let missing: Vec<_> = declarations
            .links
            .iter()
            .map(|decl| decl.target_path.clone())
            .filter(|target| !self.fs.exists_resolved(target))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError::MissingLinkSources(missing).into())
        }
    }

    /// Log and record one outcome.
    fn record(&self, result: &mut RunResult, resource: String, outcome: ResourceOutcome) {
        match &outcome {
            ResourceOutcome::Skipped { reason } if reason == REASON_DRY_RUN => {
                self.log.dry_run(&format!("would converge {resource}"));
            }
            ResourceOutcome::Skipped { reason } => {
                self.log.debug(&format!("{resource}: skipped ({reason})"));
            }
            ResourceOutcome::Created { .. } => {
                self.log.info(&format!("{resource}: created"));
            }
            ResourceOutcome::Replaced { backup } => {
                let detail = backup.as_ref().map_or_else(String::new, |path| {
                    format!(" (backup at {})", path.display())
                });
                self.log.info(&format!("{resource}: replaced{detail}"));
            }
            ResourceOutcome::Failed { kind, message } => {
                self.log.warn(&format!("{resource}: {kind} failed: {message}"));
            }
        }
        result.outcomes.push(RecordedOutcome { resource, outcome });
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::declarations::{LinkDeclaration, PackageDeclaration};
    use crate::engine::AutoConfirm;
    use crate::fsops::SystemFileSystemOps;
    use crate::manager::InstallStatus;
    use anyhow::Result;
    use std::sync::Mutex;

    struct FakeManager {
        available: bool,
        installed: Mutex<Vec<String>>,
        fail_installs: Vec<String>,
        reboot_installs: Vec<String>,
        install_calls: Mutex<Vec<String>>,
    }

    impl FakeManager {
        fn new(installed: &[&str]) -> Self {
            Self {
                available: true,
                installed: Mutex::new(installed.iter().map(ToString::to_string).collect()),
                fail_installs: Vec::new(),
                reboot_installs: Vec::new(),
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
            self.available
        }

        fn is_installed(&self, package: &str) -> Result<bool> {
            Ok(self
                .installed
                .lock()
                .unwrap()
                .iter()
                .any(|p| p == package))
        }

        fn install(&self, package: &str) -> Result<InstallStatus> {
            self.install_calls.lock().unwrap().push(package.to_string());
            if self.fail_installs.iter().any(|p| p == package) {
                return Ok(InstallStatus::Failure(Some(1)));
            }
            self.installed.lock().unwrap().push(package.to_string());
            if self.reboot_installs.iter().any(|p| p == package) {
                return Ok(InstallStatus::SuccessRebootRequired);
            }
            Ok(InstallStatus::Success)
        }
    }

    struct NoopEnvironment;

    impl Environment for NoopEnvironment {
        fn refresh(&self) -> Result<()> {
            Ok(())
        }
    }

    fn pkg(name: &str) -> PackageDeclaration {
        PackageDeclaration {
            name: name.to_string(),
            group: None,
            description: None,
        }
    }

    fn run_with(
        manager: &FakeManager,
        declarations: &Declarations,
        policy: Policy,
    ) -> Result<RunResult, ProvisionError> {
        let fs = SystemFileSystemOps;
        let env = NoopEnvironment;
        let log = Logger::new(false, "test");
        let coordinator = Coordinator::new(manager, &fs, &env, &AutoConfirm, &log);
        coordinator.run(declarations, policy)
    }

    #[test]
    fn continues_past_package_failure() {
        let mut mgr = FakeManager::new(&[]);
        mgr.fail_installs = vec!["b".to_string()];
        let declarations = Declarations {
            packages: vec![pkg("a"), pkg("b"), pkg("c")],
            links: Vec::new(),
        };
        let result = run_with(&mgr, &declarations, Policy::default()).unwrap();
        assert_eq!(mgr.install_calls(), vec!["a", "b", "c"]);
        assert_eq!(result.created(), 2);
        assert_eq!(result.failed(), 1);
    }

    #[test]
    fn missing_manager_is_prerequisite_error() {
        let mut mgr = FakeManager::new(&[]);
        mgr.available = false;
        let declarations = Declarations {
            packages: vec![pkg("a")],
            links: Vec::new(),
        };
        let err = run_with(&mgr, &declarations, Policy::default()).unwrap_err();
        assert!(matches!(err, ProvisionError::Prerequisite(_)));
    }

    #[test]
    fn manager_not_required_without_packages() {
        let mut mgr = FakeManager::new(&[]);
        mgr.available = false;
        let declarations = Declarations::default();
        assert!(run_with(&mgr, &declarations, Policy::default()).is_ok());
    }

    #[test]
    fn missing_link_sources_abort_before_any_mutation() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = FakeManager::new(&[]);
        let declarations = Declarations {
            packages: vec![pkg("a")],
            links: vec![
                LinkDeclaration {
                    link_path: tmp.path().join("l1"),
                    target_path: tmp.path().join("missing1"),
                    description: String::new(),
                },
                LinkDeclaration {
                    link_path: tmp.path().join("l2"),
                    target_path: tmp.path().join("missing2"),
                    description: String::new(),
                },
            ],
        };
        let err = run_with(&mgr, &declarations, Policy::default()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("missing1"), "all missing sources listed: {msg}");
        assert!(msg.contains("missing2"), "all missing sources listed: {msg}");
        assert!(
            mgr.install_calls().is_empty(),
            "configuration errors must abort before any mutation"
        );
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_target_counts_as_missing_source() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("conf/bashrc");
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("gone"), &target).unwrap();
        let mgr = FakeManager::new(&[]);
        let declarations = Declarations {
            packages: Vec::new(),
            links: vec![LinkDeclaration {
                link_path: tmp.path().join("home/.bashrc"),
                target_path: target.clone(),
                description: String::new(),
            }],
        };
        let err = run_with(&mgr, &declarations, Policy::default()).unwrap_err();
        assert!(matches!(err, ProvisionError::Configuration(_)));
        assert!(err.to_string().contains("bashrc"));
    }

    #[test]
    fn reboot_flag_aggregates_across_packages() {
        let mut mgr = FakeManager::new(&[]);
        mgr.reboot_installs = vec!["dotnet".to_string()];
        let declarations = Declarations {
            packages: vec![pkg("git"), pkg("dotnet")],
            links: Vec::new(),
        };
        let result = run_with(&mgr, &declarations, Policy::default()).unwrap();
        assert!(result.reboot_required);
    }

    #[cfg(unix)]
    #[test]
    fn full_run_then_rerun_is_all_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("conf/bashrc");
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(&target, "x").unwrap();
        let mgr = FakeManager::new(&[]);
        let declarations = Declarations {
            packages: vec![pkg("git")],
            links: vec![LinkDeclaration {
                link_path: tmp.path().join("home/.bashrc"),
                target_path: target,
                description: String::new(),
            }],
        };

        let first = run_with(&mgr, &declarations, Policy::default()).unwrap();
        assert_eq!(first.created(), 2);

        let second = run_with(&mgr, &declarations, Policy::default()).unwrap();
        assert_eq!(second.skipped(), 2, "second run must be a no-op");
        assert_eq!(
            mgr.install_calls().len(),
            1,
            "no install on the second run"
        );
    }

    #[test]
    fn dry_run_records_skips_and_mutates_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("target");
        std::fs::write(&target, "x").unwrap();
        let mgr = FakeManager::new(&[]);
        let declarations = Declarations {
            packages: vec![pkg("git")],
            links: vec![LinkDeclaration {
                link_path: tmp.path().join(".bashrc"),
                target_path: target,
                description: String::new(),
            }],
        };
        let policy = Policy {
            dry_run: true,
            assume_yes: false,
        };
        let result = run_with(&mgr, &declarations, policy).unwrap();
        assert_eq!(result.skipped(), 2);
        assert!(mgr.install_calls().is_empty());
        assert!(!tmp.path().join(".bashrc").exists());
    }
}
