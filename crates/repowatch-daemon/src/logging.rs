//! Logging infrastructure.
//!
//! Structured `tracing` output to stdout and to a rotating log file:
//! - Rotated daily under `log_dir`, keeping `log_max_files` files
//! - Non-blocking file writer, flushed when the guard drops
//! - `RUST_LOG` overrides the level chosen by the debug flag

use repowatch_core::Config;
use std::io;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initialize the global subscriber.
///
/// Creates the log directory if needed.
pub fn init_logging(config: &Config) -> anyhow::Result<LoggingGuard> {
    std::fs::create_dir_all(&config.log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(config.log_file.clone())
        .max_log_files(config.log_max_files.max(1))
        .build(&config.log_dir)?;
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config.debug)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(io::stdout))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false) // No ANSI colors in log files
                .with_writer(non_blocking_file),
        )
        .try_init()?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Level used when `RUST_LOG` is not set.
fn default_directive(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(true), "debug");
        assert_eq!(default_directive(false), "info");
    }
}
