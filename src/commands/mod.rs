//! Top-level subcommand orchestration.

pub mod apply;
