//! Run summary rendering.
//!
//! Consumes the coordinator's [`RunResult`] and renders a human-readable
//! per-resource listing plus aggregate counts through the [`Logger`], so
//! the summary lands in the persistent log file as well as the console.

use crate::engine::{ResourceOutcome, RunResult};
use crate::logging::Logger;

/// Icon prefix for one outcome line.
const fn icon(outcome: &ResourceOutcome) -> &'static str {
    match outcome {
        ResourceOutcome::Skipped { .. } => "○",
        ResourceOutcome::Created { .. } | ResourceOutcome::Replaced { .. } => "✓",
        ResourceOutcome::Failed { .. } => "✗",
    }
}

/// Render one outcome as a summary line.
fn describe(outcome: &ResourceOutcome) -> String {
    match outcome {
        ResourceOutcome::Skipped { reason } => format!("skipped: {reason}"),
        ResourceOutcome::Created {
            reboot_required: true,
        } => "created (reboot required)".to_string(),
        ResourceOutcome::Created {
            reboot_required: false,
        } => "created".to_string(),
        ResourceOutcome::Replaced {
            backup: Some(backup),
        } => {
            format!("replaced, backup at {}", backup.display())
        }
        ResourceOutcome::Replaced { backup: None } => "replaced".to_string(),
        ResourceOutcome::Failed { kind, message } => format!("{kind} failed: {message}"),
    }
}

/// Print the final run summary.
pub fn print_summary(log: &Logger, result: &RunResult) {
    log.stage("Summary");
    for record in &result.outcomes {
        log.info(&format!(
            "{} {} — {}",
            icon(&record.outcome),
            record.resource,
            describe(&record.outcome)
        ));
    }
    log.info(&format!(
        "{} created, {} replaced, {} skipped, {} failed",
        result.created(),
        result.replaced(),
        result.skipped(),
        result.failed()
    ));
    if result.reboot_required {
        log.warn("A reboot is required to finish installing one or more packages.");
    }
}
