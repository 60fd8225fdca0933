//! Typed flavor configurations.
//!
//! Every flavor declares its configuration as a serde struct with
//! `deny_unknown_fields`. Deserializing a document into that struct rejects
//! unknown keys, missing required keys and wrong types, and fills defaults;
//! serializing it back yields the normalized document that gets stored.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::document::{type_name, Document};
use crate::error::ConfigurationError;

/// A flavor configuration type.
pub trait FlavorConfig: Serialize + DeserializeOwned {
    /// Checks that go beyond shape: value ranges, cross-field rules.
    ///
    /// # Errors
    /// `ConfigurationError` naming the offending field.
    fn check(&self) -> Result<(), ConfigurationError> {
        Ok(())
    }
}

/// Parses a document into a configuration type without running `check`.
///
/// # Errors
/// `InvalidDocument` with serde's description of the mismatch.
pub fn parse_config<T: DeserializeOwned>(config: &Document) -> Result<T, ConfigurationError> {
    serde_json::from_value(Value::Object(config.clone())).map_err(|e| ConfigurationError::InvalidDocument {
        reason: e.to_string(),
    })
}

/// Parses and checks a configuration and returns its normalized document.
///
/// # Errors
/// `InvalidDocument` for shape errors, otherwise whatever `check` reports.
pub fn normalize<T: FlavorConfig>(config: &Document) -> Result<Document, ConfigurationError> {
    let parsed: T = parse_config(config)?;
    parsed.check()?;
    match serde_json::to_value(&parsed) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ConfigurationError::InvalidDocument {
            reason: format!("configuration serialized to {}", type_name(&other)),
        }),
        Err(e) => Err(ConfigurationError::InvalidDocument { reason: e.to_string() }),
    }
}

pub(crate) fn non_empty(field: &str, value: &str) -> Result<(), ConfigurationError> {
    if value.trim().is_empty() {
        return Err(ConfigurationError::InvalidValue {
            field: field.to_string(),
            reason: "cannot be empty".to_string(),
        });
    }
    Ok(())
}
