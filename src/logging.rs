//! Structured console logger with a persistent log file.
//!
//! Console output is colored and gated by the verbose flag; every message is
//! also appended to `$XDG_CACHE_HOME/bootstrap/<command>.log` (default
//! `~/.cache/bootstrap/<command>.log`) with timestamps and ANSI codes
//! stripped, regardless of verbosity.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::fs;
use std::io::Write as _;
use std::path::PathBuf;

/// Return the log file path under `$XDG_CACHE_HOME/bootstrap/` (or
/// `~/.cache/bootstrap/`).
fn log_file_path(command: &str) -> Option<PathBuf> {
    let cache_dir = std::env::var("XDG_CACHE_HOME").map_or_else(
        |_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".cache")
        },
        PathBuf::from,
    );
    let dir = cache_dir.join("bootstrap");
    fs::create_dir_all(&dir).ok()?;
    Some(dir.join(format!("{command}.log")))
}

/// Strip ANSI escape sequences from a string.
fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // Skip until 'm' (end of SGR sequence)
            for inner in chars.by_ref() {
                if inner == 'm' {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Structured logger with dry-run awareness and a persistent log file.
#[derive(Debug)]
pub struct Logger {
    verbose: bool,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create a new logger for the given command name.
    ///
    /// Truncates the previous log file and writes a run header (new run =
    /// fresh log).
    #[must_use]
    pub fn new(verbose: bool, command: &str) -> Self {
        let log_file = log_file_path(command);

        if let Some(ref path) = log_file {
            let version = option_env!("BOOTSTRAP_VERSION")
                .unwrap_or(concat!("dev-", env!("CARGO_PKG_VERSION")));
            let header = format!(
                "==========================================\n\
                 Bootstrap {version} {}\n\
                 ==========================================\n",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            );
            let _ = fs::write(path, header);
        }

        Self { verbose, log_file }
    }

    /// Append a line to the persistent log file.
    fn write_to_file(&self, level: &str, msg: &str) {
        if let Some(ref path) = self.log_file
            && let Ok(mut f) = fs::OpenOptions::new().append(true).open(path)
        {
            let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
            let clean = strip_ansi(msg);
            let _ = writeln!(f, "{ts} {level} {clean}");
        }
    }

    /// Return the log file path, if available.
    #[cfg(test)]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        eprintln!("\x1b[31mERROR\x1b[0m {msg}");
        self.write_to_file("ERR", msg);
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        eprintln!("\x1b[33mWARN\x1b[0m  {msg}");
        self.write_to_file("WRN", msg);
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        println!("\x1b[1;34m==>\x1b[0m \x1b[1m{msg}\x1b[0m");
        self.write_to_file("STG", msg);
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        println!("  {msg}");
        self.write_to_file("INF", msg);
    }

    /// Log a debug message (console only when verbose; always written to the
    /// log file).
    pub fn debug(&self, msg: &str) {
        if self.verbose {
            println!("  \x1b[2m{msg}\x1b[0m");
        }
        self.write_to_file("DBG", msg);
    }

    /// Log a dry-run action message.
    pub fn dry_run(&self, msg: &str) {
        println!("  \x1b[33m[DRY RUN]\x1b[0m {msg}");
        self.write_to_file("DRY", msg);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn strip_ansi_removes_colors() {
        assert_eq!(strip_ansi("\x1b[31mERROR\x1b[0m hello"), "ERROR hello");
        assert_eq!(strip_ansi("no codes here"), "no codes here");
        assert_eq!(
            strip_ansi("\x1b[1;34m==>\x1b[0m \x1b[1mstage\x1b[0m"),
            "==> stage"
        );
    }

    #[test]
    fn log_file_is_created() {
        let log = Logger::new(false, "test-create");
        if let Some(path) = log.log_path() {
            assert!(path.exists(), "log file should be created on Logger::new");
        }
    }

    #[test]
    fn debug_always_written_to_file() {
        // Distinct command name: each test owns its log file, so parallel
        // tests cannot truncate it mid-assertion.
        let log = Logger::new(false, "test-debug"); // verbose=false
        log.debug("debug-marker");
        if let Some(path) = log.log_path() {
            let contents = fs::read_to_string(path).unwrap();
            assert!(
                contents.contains("debug-marker"),
                "debug messages should always appear in the log file"
            );
        }
    }

    #[test]
    fn dry_run_written_to_file() {
        let log = Logger::new(false, "test-dryrun");
        log.dry_run("dryrun-marker");
        if let Some(path) = log.log_path() {
            let contents = fs::read_to_string(path).unwrap();
            assert!(contents.contains("dryrun-marker"));
            assert!(contents.contains("DRY"));
        }
    }
}
