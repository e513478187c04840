//! Logging infrastructure for Sentinel.
//!
//! Structured logging via the `tracing` ecosystem: JSON lines to a daily
//! rolling file under the agent's log directory, plus a human-readable
//! console layer on stderr. The level comes from the agent configuration
//! and can be overridden with `RUST_LOG`.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::error::{Result, SentinelError};

/// Default directory for agent log files.
pub const DEFAULT_LOG_DIR: &str = "/var/log/sentinel";

/// Guard that must be held to ensure log flushing on shutdown.
///
/// Dropping the guard flushes pending entries; keep it alive for the
/// lifetime of the process.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the Sentinel logging system.
///
/// Sets up a JSON-lines daily file appender plus a compact stderr layer.
///
/// # Arguments
///
/// * `log_dir` - Optional custom log directory. Defaults to `/var/log/sentinel`.
/// * `level` - Base level when `RUST_LOG` is unset (e.g. `"INFO"`, `"DEBUG"`).
pub fn init_logging(log_dir: Option<PathBuf>, level: &str) -> Result<LogGuard> {
    let log_dir = log_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));

    std::fs::create_dir_all(&log_dir).map_err(|e| SentinelError::DirectoryCreation {
        path: log_dir.clone(),
        source: e,
    })?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "sentinel.log");
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let default_level = level.to_ascii_lowercase();
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sentinel={default_level}")));

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_current_span(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    tracing::debug!(log_dir = %log_dir.display(), level, "logging initialized");

    Ok(LogGuard {
        _file_guard: Some(file_guard),
    })
}

/// Initialize minimal console-only logging for testing.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_logging() {
        // Should not panic, even when called twice
        init_test_logging();
        init_test_logging();
    }

    #[test]
    fn test_default_log_dir() {
        assert_eq!(DEFAULT_LOG_DIR, "/var/log/sentinel");
    }
}
