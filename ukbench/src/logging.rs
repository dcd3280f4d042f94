//! Logging infrastructure.
//!
//! Structured logging with dual output:
//! - Writes to `<log_dir>/ukbench.log` via a non-blocking appender
//! - Also prints to stdout so progress lines can be tailed
//! - Configurable via the `RUST_LOG` environment variable (default `info`)

use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default log file name.
pub const LOG_FILE: &str = "ukbench.log";

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard flushes and closes the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initializes the global logging subscriber.
///
/// Creates `log_dir` if needed and sets up dual output to both file and
/// stdout. Progress lines are single-line and grep-friendly.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created.
pub fn init_logging(log_dir: impl AsRef<Path>) -> Result<LoggingGuard, io::Error> {
    let log_dir = log_dir.as_ref();
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .compact();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .compact();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_creates_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");

        // The global subscriber may already be installed by another test
        // binary; directory creation is the part under test here.
        let _ = init_logging(&log_dir);
        assert!(log_dir.is_dir());
    }
}
