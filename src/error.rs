//! Error types for triggerplane.
//!
//! All errors are strongly typed using thiserror so callers can match on the
//! specific condition. Expected outcomes (an event matching nothing, a trigger
//! being disabled) are not errors and never show up here.

use thiserror::Error;

use crate::ids::{ActionId, ComponentId, EventSourceId, TriggerExecutionId, TriggerId, WorkspaceId};
use crate::storage::StorageError;

/// Malformed or schema-mismatched plugin configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Unknown {plugin_type} flavor '{flavor}'")]
    UnknownFlavor { plugin_type: String, flavor: String },

    #[error("Flavor '{flavor}' does not provide subtype '{subtype}'")]
    SubtypeMismatch { flavor: String, subtype: String },

    #[error("Required field '{field}' is missing")]
    MissingField { field: String },

    /// The document does not fit the flavor's configuration type: a missing
    /// or unknown field, or a value of the wrong type.
    #[error("Invalid configuration: {reason}")]
    InvalidDocument { reason: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid filter: {reason}")]
    InvalidFilter { reason: String },
}

/// Failures reported by (or while reaching) an action executor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Action failed: {reason}")]
    Failed { reason: String },

    #[error("No executor for action {flavor}/{subtype}")]
    Unsupported { flavor: String, subtype: String },

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("Channel disconnected: {path}")]
    Disconnected { path: String },
}

impl ExecutionError {
    /// Convenience constructor for a generic executor failure.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// A referenced resource does not exist.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("Workspace not found: {0}")]
    Workspace(WorkspaceId),

    #[error("Event source not found: {0}")]
    EventSource(EventSourceId),

    #[error("Action not found: {0}")]
    Action(ActionId),

    #[error("Trigger not found: {0}")]
    Trigger(TriggerId),

    #[error("Trigger execution not found: {0}")]
    TriggerExecution(TriggerExecutionId),

    #[error("Stack component not found: {0}")]
    Component(ComponentId),
}

/// Input validation errors, rejected before anything reaches the core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("workspace_id must be set for workspace-scoped resource type '{resource_type}'")]
    WorkspaceRequired { resource_type: String },

    #[error("workspace_id must not be set for unscoped resource type '{resource_type}'")]
    WorkspaceForbidden { resource_type: String },

    #[error("Unknown resource type '{value}'")]
    UnknownResourceType { value: String },

    #[error("Unknown RBAC action '{value}'")]
    UnknownAction { value: String },

    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    FieldTooLong { field: String, max_length: usize },

    #[error("A {resource} named '{name}' already exists")]
    DuplicateName { resource: String, name: String },

    #[error("Invalid pagination: {reason}")]
    InvalidPagination { reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidSettings { reason: String },
}

/// Top-level error type.
#[derive(Debug, Error)]
pub enum PlaneError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Caller '{caller}' may not {action} {resource}")]
    Forbidden {
        caller: String,
        action: String,
        resource: String,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<StorageError> for PlaneError {
    /// Name conflicts detected by a store are validation failures.
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DuplicateName { table, name } => Self::Validation(ValidationError::DuplicateName {
                resource: table.to_string(),
                name,
            }),
            other => Self::Storage(other),
        }
    }
}

impl PlaneError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Also true for a row that vanished between lookup and write.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Storage(StorageError::RowNotFound { .. }))
    }

    #[must_use]
    pub const fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }

    /// HTTP status code the API layer should answer with: 400 for malformed
    /// requests, 403, 404, 409 for conflicts, 422 for plugin configuration
    /// the flavor rejects, 500 otherwise.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Validation(ValidationError::DuplicateName { .. }) | Self::Storage(StorageError::DuplicateKey(_)) => 409,
            Self::Validation(_) => 400,
            Self::Configuration(_) => 422,
            Self::NotFound(_) | Self::Storage(StorageError::RowNotFound { .. }) => 404,
            Self::Forbidden { .. } => 403,
            Self::Execution(_) | Self::Storage(_) | Self::Internal { .. } => 500,
        }
    }
}

/// Result type alias for triggerplane operations.
pub type PlaneResult<T> = Result<T, PlaneError>;
