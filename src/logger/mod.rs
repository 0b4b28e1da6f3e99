//! Structured logging setup (tracing + tracing-subscriber).
//!
//! The dashboard owns the terminal, so its records go to an append-only log
//! file. The plain `print` command logs to stderr instead. If the log file
//! cannot be opened, logging degrades to a subscriber without output rather
//! than aborting the program.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Where log records are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    File(PathBuf),
    Stderr,
}

/// What [`init`] ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutcome {
    File(PathBuf),
    Stderr,
    /// The log file could not be opened; records are dropped.
    Disabled { reason: String },
    /// A global subscriber was already installed.
    AlreadyInitialized,
}

/// Build the filter from `RUST_LOG` (when set) or the verbosity flag.
#[must_use]
pub fn env_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    let directives = rust_log
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(if verbose { "debug" } else { "info" });
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Open (creating parents as needed) the append-only log file.
pub fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber.
pub fn init(target: &LogTarget, verbose: bool) -> LogOutcome {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = env_filter(verbose, rust_log.as_deref());

    let (installed, outcome) = match target {
        LogTarget::Stderr => {
            let layer = fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .compact();
            (
                tracing_subscriber::registry().with(filter).with(layer).try_init(),
                LogOutcome::Stderr,
            )
        }
        LogTarget::File(path) => match open_log_file(path) {
            Ok(file) => {
                let layer = fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_names(true);
                (
                    tracing_subscriber::registry().with(filter).with(layer).try_init(),
                    LogOutcome::File(path.clone()),
                )
            }
            Err(error) => (
                tracing_subscriber::registry().with(filter).try_init(),
                LogOutcome::Disabled {
                    reason: format!("{}: {error}", path.display()),
                },
            ),
        },
    };

    match installed {
        Ok(()) => outcome,
        Err(_) => LogOutcome::AlreadyInitialized,
    }
}
