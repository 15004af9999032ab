//! The `apply` subcommand: load declarations and converge the machine.

use anyhow::Result;
use std::path::PathBuf;

use crate::cli::GlobalOpts;
use crate::declarations::Declarations;
use crate::engine::coordinator::Coordinator;
use crate::engine::{AutoConfirm, Confirmer, ConsoleConfirmer, Policy, SystemEnvironment};
use crate::error::ConfigurationError;
use crate::exec::SystemExecutor;
use crate::fsops::SystemFileSystemOps;
use crate::logging::Logger;
use crate::manager::Choco;
use crate::report;

/// Run the apply command.
///
/// Partial package failures are reported in the summary but do not fail the
/// process; only configuration and prerequisite errors exit non-zero.
///
/// # Errors
///
/// Returns an error when the declaration source is missing or malformed, a
/// declared link target does not exist, or the package manager is absent.
pub fn run(global: &GlobalOpts, log: &Logger) -> Result<()> {
    let version = option_env!("BOOTSTRAP_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
    log.info(&format!("bootstrap {version}"));

    let source = resolve_source(global);
    log.stage("Loading declarations");
    log.debug(&format!("source: {}", source.display()));

    let (declarations, parse_errors) = Declarations::load(&source)?;
    if !parse_errors.is_empty() {
        return Err(ConfigurationError::Parse(parse_errors).into());
    }
    log.info(&format!(
        "loaded {} packages, {} links",
        declarations.packages.len(),
        declarations.links.len()
    ));

    let policy = Policy {
        dry_run: global.dry_run,
        assume_yes: global.assume_yes,
    };

    let executor = SystemExecutor;
    let manager = Choco::new(&executor);
    let fs = SystemFileSystemOps;
    let environment = SystemEnvironment::new(&executor);
    let auto = AutoConfirm;
    let console = ConsoleConfirmer;
    let confirmer: &dyn Confirmer = if global.assume_yes { &auto } else { &console };

    let coordinator = Coordinator::new(&manager, &fs, &environment, confirmer, log);
    let result = coordinator.run(&declarations, policy)?;

    report::print_summary(log, &result);
    Ok(())
}

/// Resolve the declaration source directory: `--source`, then the
/// `BOOTSTRAP_SOURCE` environment variable, then `./conf`.
fn resolve_source(global: &GlobalOpts) -> PathBuf {
    if let Some(ref source) = global.source {
        return source.clone();
    }
    if let Ok(source) = std::env::var("BOOTSTRAP_SOURCE") {
        return PathBuf::from(source);
    }
    PathBuf::from("conf")
}
