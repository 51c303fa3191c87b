//! Logging setup for the daemon

use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },
}

/// Installs a `fmt` subscriber on stderr filtered by `filter`
///
/// `RUST_LOG` wins over `filter` when set. Returns `Ok(false)` when a
/// global subscriber was already installed.
pub fn init_logging(filter: &str) -> Result<bool, LoggingError> {
    let env_filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(filter),
    }
    .map_err(|err| LoggingError::InvalidFilter {
        filter: filter.to_string(),
        message: err.to_string(),
    })?;

    Ok(tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_noop() {
        if std::env::var(EnvFilter::DEFAULT_ENV).is_ok() {
            return;
        }
        init_logging("warn").unwrap();
        assert!(!init_logging("debug").unwrap());
    }

    #[test]
    fn test_invalid_filter() {
        if std::env::var(EnvFilter::DEFAULT_ENV).is_ok() {
            return;
        }
        assert!(matches!(
            init_logging("trellisd=loud"),
            Err(LoggingError::InvalidFilter { .. })
        ));
    }
}
