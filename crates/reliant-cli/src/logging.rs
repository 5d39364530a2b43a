//! Tracing subscriber setup.
//!
//! Logs go to stderr so stdout carries only results. `RUST_LOG` overrides
//! the filter derived from `-v`/`-q`, e.g. `RUST_LOG=reliant=debug`.

use crate::config::Verbosity;
use crate::error::{CliError, CliResult};
use serde::{Deserialize, Serialize};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Build the filter: `RUST_LOG` if set, otherwise from verbosity
#[must_use]
pub fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter()))
}

/// Install the global subscriber
pub fn init_logging(verbosity: Verbosity, format: LogFormat, ansi: bool) -> CliResult<()> {
    let filter = env_filter(verbosity);
    let installed = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_names(verbosity == Verbosity::Debug)
                    .with_ansi(ansi),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_current_span(true)
                    .flatten_event(true),
            )
            .try_init(),
    };
    installed.map_err(|e| CliError::logging(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_format_is_text() {
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }

    #[test]
    fn test_second_init_fails() {
        let _ = init_logging(Verbosity::Normal, LogFormat::Text, false);
        let err = init_logging(Verbosity::Normal, LogFormat::Json, false).unwrap_err();
        assert!(matches!(err, CliError::Logging { .. }));
    }
}
