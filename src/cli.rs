//! Command-line interface definitions.

use clap::{Parser, Subcommand};

/// Top-level CLI entry point for the bootstrap engine.
#[derive(Parser, Debug)]
#[command(
    name = "bootstrap",
    about = "Idempotent machine bootstrap: packages and dotfile links",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared across subcommands.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Replace conflicting files without prompting
    #[arg(short = 'y', long = "yes", global = true)]
    pub assume_yes: bool,

    /// Override the declaration source directory
    #[arg(long, global = true)]
    pub source: Option<std::path::PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Converge the machine to the declared packages and links
    Apply,
    /// Print version information
    Version,
}
