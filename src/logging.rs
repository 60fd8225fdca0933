//! Structured logging setup.
//!
//! JSON or human-readable output on stdout, optionally mirrored to a file.

use std::fs::OpenOptions;
use std::sync::Arc;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{PlaneError, PlaneResult};

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`.
///
/// # Errors
/// `Internal` if the filter is invalid, the log file cannot be opened, or a
/// global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> PlaneResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| PlaneError::internal(format!("invalid log filter: {e}")))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    let file = match &config.file_path {
        Some(path) => Some(Arc::new(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| PlaneError::internal(format!("failed to open {}: {e}", path.display())))?,
        )),
        None => None,
    };

    let result = if config.json_format {
        let stdout_layer = fmt::layer().json().with_current_span(true).with_span_list(true);
        match file {
            Some(file) => {
                let file_layer = fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(file);
                registry.with(stdout_layer).with(file_layer).try_init()
            }
            None => registry.with(stdout_layer).try_init(),
        }
    } else {
        let stdout_layer = fmt::layer().with_target(true).with_thread_ids(true).with_level(true);
        match file {
            Some(file) => {
                let file_layer = fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .with_ansi(false)
                    .with_writer(file);
                registry.with(stdout_layer).with(file_layer).try_init()
            }
            None => registry.with(stdout_layer).try_init(),
        }
    };

    result.map_err(|e| PlaneError::internal(format!("failed to install subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_file_path_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            level: "info".to_string(),
            json_format: false,
            file_path: Some(dir.path().join("missing").join("plane.log")),
        };
        assert!(init_logging(&config).is_err());
    }

    #[test]
    fn second_install_fails_instead_of_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            level: "debug".to_string(),
            json_format: true,
            file_path: Some(dir.path().join("plane.log")),
        };
        // The first call may lose the race to another test; either way a
        // subscriber is installed afterwards.
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
