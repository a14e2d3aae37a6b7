//! Logging setup.
//!
//! `run` logs to stdout and to a log file truncated at start. The other commands keep stdout
//! for their output and log to stderr.

use crate::config::{CliConfig, LogFormat, Verbosity};
use crate::error::{CliError, CliResult};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;

/// Filter from the verbosity flags, falling back to `RUST_LOG`, then `info`
#[must_use]
pub fn filter_for(verbosity: Verbosity) -> EnvFilter {
    if verbosity == Verbosity::Normal {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.filter()))
    } else {
        EnvFilter::new(verbosity.filter())
    }
}

/// Install the global subscriber
///
/// # Errors
///
/// Fails when the log file cannot be created or a subscriber is already installed.
pub fn init(config: &CliConfig, log_file: Option<&Path>) -> CliResult<()> {
    let (writer, ansi) = match log_file {
        Some(path) => {
            let file = File::create(path).map_err(|e| {
                CliError::config(format!("cannot create log file {}: {e}", path.display()))
            })?;
            (BoxMakeWriter::new(std::io::stdout.and(Mutex::new(file))), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), config.color.should_color()),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter_for(config.verbosity))
        .with_writer(writer)
        .with_target(config.verbosity.is_verbose());

    let installed = match config.log_format {
        LogFormat::Text => builder.with_ansi(ansi).try_init(),
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
    };
    installed.map_err(|e| CliError::config(format!("cannot install logger: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_verbosity_wins() {
        assert_eq!(filter_for(Verbosity::Quiet).to_string(), "error");
        assert_eq!(filter_for(Verbosity::Debug).to_string(), "trace");
    }

    #[test]
    fn test_unwritable_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("log.txt");
        let err = init(&CliConfig::new(), Some(&path)).unwrap_err();
        assert!(err.to_string().contains("log file"));
    }
}
