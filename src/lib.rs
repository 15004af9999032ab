//! Idempotent machine-bootstrap engine.
//!
//! Given a declarative list of packages and dotfile-link mappings, converges
//! a machine toward the declared state: already-satisfied resources are
//! skipped, absent ones are created, and conflicting files are replaced
//! after a backup. Individual failures are recorded and reported without
//! aborting the run.
//!
//! The crate is organised into four layers:
//!
//! - **[`declarations`]** — parse and validate declaration source files
//! - **[`probe`]** — read-only inspection of current machine state
//! - **[`engine`]** — per-resource convergence plus the batch coordinator
//! - **[`commands`]** — top-level subcommand orchestration (`apply`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod declarations;
pub mod engine;
pub mod error;
pub mod exec;
pub mod fsops;
pub mod logging;
pub mod manager;
pub mod probe;
pub mod report;
