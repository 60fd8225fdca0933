//! Request, update, filter and response models of the control plane.
//!
//! Models are plain serde structs. Responses split into an always-present
//! `body` and a `metadata` section that is only filled when the caller asks
//! for a hydrated response.

pub mod action;
pub mod component;
pub mod event_source;
pub mod execution;
pub mod page;
pub mod trigger;
pub mod workspace;

pub use action::{Action, ActionFilter, ActionRequest, ActionResponse, ActionUpdate};
pub use component::{ComponentFilter, ComponentRequest, ComponentResponse, StackComponent};
pub use event_source::{
    EventSource, EventSourceFilter, EventSourceRequest, EventSourceResponse, EventSourceUpdate,
};
pub use execution::{TriggerExecution, TriggerExecutionFilter, TriggerExecutionResponse};
pub use page::{Page, PageRequest};
pub use trigger::{
    ActionSnapshot, Trigger, TriggerActionSpec, TriggerFilter, TriggerRequest, TriggerResponse,
    TriggerUpdate,
};
pub use workspace::{Workspace, WorkspaceRequest, WorkspaceResponse, WorkspaceStatistics, WorkspaceUpdate};

use crate::error::ValidationError;

/// Maximum length of names, flavors and descriptions.
pub const STR_FIELD_MAX_LENGTH: usize = 255;

/// Checks a required string field: trimmed non-empty, bounded length.
pub(crate) fn validate_name(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField {
            field: field.to_string(),
        });
    }
    validate_length(field, value)
}

pub(crate) fn validate_length(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.chars().count() > STR_FIELD_MAX_LENGTH {
        return Err(ValidationError::FieldTooLong {
            field: field.to_string(),
            max_length: STR_FIELD_MAX_LENGTH,
        });
    }
    Ok(())
}

/// Case-sensitive substring match used by `name_contains` filters.
pub(crate) fn name_matches(filter: Option<&str>, name: &str) -> bool {
    filter.map_or(true, |needle| name.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_must_be_non_empty_and_bounded() {
        assert!(validate_name("name", "ok").is_ok());
        assert!(matches!(
            validate_name("name", "  "),
            Err(ValidationError::EmptyField { .. })
        ));
        let long = "x".repeat(STR_FIELD_MAX_LENGTH + 1);
        assert!(matches!(
            validate_name("name", &long),
            Err(ValidationError::FieldTooLong { .. })
        ));
    }
}
