//! Logging setup shared by the binaries.
//!
//! `HEARTGUARD_LOG_MODE` selects the destination (`auto`, `stdout` or
//! `file`); `HEARTGUARD_LOG_FILE` names the file. `auto` logs to stdout so
//! container log collectors see the output. `RUST_LOG` overrides the filter.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_LOG_FILE: &str = "logs/heartguard.log";

/// Where log lines are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    File(PathBuf),
}

impl LogTarget {
    /// Resolve the target from a mode string and an optional file path.
    ///
    /// Unknown modes behave like `auto`.
    #[must_use]
    pub fn from_mode(mode: &str, file: Option<String>) -> Self {
        match mode.trim() {
            "file" => Self::File(PathBuf::from(
                file.unwrap_or_else(|| DEFAULT_LOG_FILE.to_string()),
            )),
            _ => Self::Stdout,
        }
    }

    #[must_use]
    pub fn from_env() -> Self {
        let mode = std::env::var("HEARTGUARD_LOG_MODE").unwrap_or_else(|_| "auto".to_string());
        Self::from_mode(&mode, std::env::var("HEARTGUARD_LOG_FILE").ok())
    }
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the background writer.
///
/// # Errors
/// Returns error if the log file cannot be opened.
pub fn init_tracing(target: &LogTarget) -> std::io::Result<WorkerGuard> {
    let (writer, guard) = match target {
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                // Best-effort: a missing directory surfaces as an open error below.
                let _ = std::fs::create_dir_all(parent);
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_appender::non_blocking(file)
        }
        LogTarget::Stdout => tracing_appender::non_blocking(std::io::stdout()),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(writer))
        .init();

    Ok(guard)
}
