//! Logging infrastructure for jsub.
//!
//! This module provides:
//! - Per-job loggers with file + callback output
//! - Progress filtering and a tail buffer for tool output
//! - Setup of the global `tracing` subscriber
//!
//! # Example
//!
//! ```no_run
//! use jsub_core::logging::{JobLogger, LogConfig};
//! use jsub_core::models::Stage;
//!
//! let logger = JobLogger::new("job-1_movie", ".logs", LogConfig::default(), None).unwrap();
//!
//! logger.stage(Stage::Extracting);
//! logger.output_line("size=    1024kB time=00:01:04.00");
//! logger.progress(50);
//! logger.success("Wrote movie.srt");
//! ```

mod job_logger;
mod types;

pub use job_logger::JobLogger;
pub use types::{LogCallback, LogConfig, LogLevel, MessagePrefix};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global tracing subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over `default_level`. Calling this twice is
/// a no-op.
pub fn init_tracing(default_level: LogLevel) {
    init_tracing_with_writer(default_level, std::io::stderr);
}

/// Initialize the global tracing subscriber with a custom writer.
///
/// Used by the CLI with a non-blocking appender so logging never stalls
/// the worker thread.
pub fn init_tracing_with_writer<W>(default_level: LogLevel, writer: W)
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter()));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_thread_ids(false),
        )
        .with(filter)
        .try_init();
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(LogLevel::from_verbosity(0), LogLevel::Info);
        assert_eq!(LogLevel::from_verbosity(1), LogLevel::Debug);
        assert_eq!(LogLevel::from_verbosity(5), LogLevel::Trace);
        assert_eq!(LogLevel::Debug.as_filter(), "debug");
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_test_tracing();
        init_tracing(LogLevel::Warn);
    }
}
