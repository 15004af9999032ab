//! Binary entry point.
#![allow(clippy::print_stdout)]

use anyhow::Result;
use clap::Parser;

use bootstrap_cli::{cli, commands, logging};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();

    match args.command {
        cli::Command::Apply => {
            let log = logging::Logger::new(args.verbose, "apply");
            commands::apply::run(&args.global, &log)
        }
        cli::Command::Version => {
            let version = option_env!("BOOTSTRAP_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
            println!("bootstrap {version}");
            Ok(())
        }
    }
}
