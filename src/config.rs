//! Control-plane configuration.
//!
//! Every section has defaults, so an empty JSON object is a valid
//! configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PlaneError, PlaneResult, ValidationError};

/// Dispatch worker and fan-out settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Max queued events before `submit` starts dropping.
    pub queue_capacity: usize,
    /// Max unread dispatch reports before new ones are dropped.
    pub report_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 4096,
            report_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub json_format: bool,
    /// Also append log lines to this file.
    pub file_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            file_path: None,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaneConfig {
    pub dispatch: DispatchConfig,
    pub pagination: PaginationConfig,
    pub logging: LoggingConfig,
}

impl PlaneConfig {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    /// `Validation` if the JSON is malformed or the values are out of range.
    pub fn from_json_str(raw: &str) -> PlaneResult<Self> {
        let config: Self = serde_json::from_str(raw).map_err(|e| ValidationError::InvalidSettings {
            reason: format!("invalid configuration JSON: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    ///
    /// # Errors
    /// `Internal` if the file cannot be read, otherwise as [`Self::from_json_str`].
    pub fn from_file(path: impl AsRef<Path>) -> PlaneResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| PlaneError::internal(format!("failed to read {}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    /// # Errors
    /// `ValidationError::InvalidSettings` naming the first offending value.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |reason: &str| {
            Err(ValidationError::InvalidSettings {
                reason: reason.to_string(),
            })
        };
        if self.dispatch.queue_capacity == 0 {
            return invalid("dispatch.queue_capacity must be positive");
        }
        if self.dispatch.report_capacity == 0 {
            return invalid("dispatch.report_capacity must be positive");
        }
        if self.pagination.max_page_size == 0 {
            return invalid("pagination.max_page_size must be positive");
        }
        if self.pagination.default_page_size == 0
            || self.pagination.default_page_size > self.pagination.max_page_size
        {
            return invalid("pagination.default_page_size must be within 1..=max_page_size");
        }
        if self.logging.level.trim().is_empty() {
            return invalid("logging.level must not be empty");
        }
        Ok(())
    }
}
