//! Trigger models.
//!
//! A trigger binds one event source and a filter document to an action. The
//! action is stored as a snapshot (flavor, subtype, configuration) taken when
//! the trigger is created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::ValidationError;
use crate::ids::{ActionId, EventSourceId, TriggerId, WorkspaceId};

use super::action::Action;
use super::{name_matches, validate_length, validate_name};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: TriggerId,
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub event_source_id: EventSourceId,
    pub event_filter: Document,
    pub action_flavor: String,
    pub action_subtype: String,
    pub action: Document,
    pub is_active: bool,
    pub description: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Flavor, subtype and configuration of the action a trigger fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSnapshot {
    pub flavor: String,
    pub subtype: String,
    pub configuration: Document,
}

impl From<&Action> for ActionSnapshot {
    fn from(action: &Action) -> Self {
        Self {
            flavor: action.flavor.clone(),
            subtype: action.plugin_subtype.to_string(),
            configuration: action.configuration.clone(),
        }
    }
}

/// Where a new trigger takes its action from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerActionSpec {
    /// Flavor, subtype and configuration supplied directly.
    Inline {
        flavor: String,
        subtype: String,
        configuration: Document,
    },
    /// Copy an existing action.
    FromAction { action_id: ActionId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRequest {
    pub workspace_id: WorkspaceId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub event_source_id: EventSourceId,
    #[serde(default)]
    pub event_filter: Document,
    pub action: TriggerActionSpec,
}

impl TriggerRequest {
    /// # Errors
    /// `ValidationError` for empty or oversized string fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name("name", &self.name)?;
        validate_length("description", &self.description)?;
        if let TriggerActionSpec::Inline { flavor, subtype, .. } = &self.action {
            validate_name("action_flavor", flavor)?;
            validate_name("action_subtype", subtype)?;
        }
        Ok(())
    }
}

/// Partial update.
///
/// Only supplied fields change; `event_filter` and `action` replace the stored
/// documents as a whole and are never merged into them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_filter: Option<Document>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Document>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl TriggerUpdate {
    /// Applies the supplied fields. Documents must already be validated.
    ///
    /// # Errors
    /// `ValidationError` for empty or oversized string fields.
    pub fn apply(&self, trigger: &mut Trigger) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validate_name("name", name)?;
            trigger.name.clone_from(name);
        }
        if let Some(description) = &self.description {
            validate_length("description", description)?;
            trigger.description.clone_from(description);
        }
        if let Some(filter) = &self.event_filter {
            trigger.event_filter.clone_from(filter);
        }
        if let Some(action) = &self.action {
            trigger.action.clone_from(action);
        }
        if let Some(active) = self.is_active {
            trigger.is_active = active;
        }
        trigger.updated = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerFilter {
    #[serde(default)]
    pub workspace_id: Option<WorkspaceId>,
    #[serde(default)]
    pub event_source_id: Option<EventSourceId>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub action_flavor: Option<String>,
    #[serde(default)]
    pub action_subtype: Option<String>,
    #[serde(default)]
    pub name_contains: Option<String>,
}

impl TriggerFilter {
    #[must_use]
    pub fn matches(&self, trigger: &Trigger) -> bool {
        self.workspace_id.map_or(true, |ws| ws == trigger.workspace_id)
            && self.event_source_id.map_or(true, |es| es == trigger.event_source_id)
            && self.is_active.map_or(true, |a| a == trigger.is_active)
            && self.action_flavor.as_deref().map_or(true, |f| f == trigger.action_flavor)
            && self.action_subtype.as_deref().map_or(true, |s| s == trigger.action_subtype)
            && name_matches(self.name_contains.as_deref(), &trigger.name)
    }
}

impl Trigger {
    /// Builds a new, active trigger from a request and the resolved action
    /// snapshot. The filter and snapshot must already be validated.
    #[must_use]
    pub fn from_request(request: TriggerRequest, event_filter: Document, action: ActionSnapshot) -> Self {
        let now = Utc::now();
        Self {
            id: TriggerId::new(),
            workspace_id: request.workspace_id,
            name: request.name,
            event_source_id: request.event_source_id,
            event_filter,
            action_flavor: action.flavor,
            action_subtype: action.subtype,
            action: action.configuration,
            is_active: true,
            description: request.description,
            created: now,
            updated: now,
        }
    }

    #[must_use]
    pub fn to_response(&self, event_source_flavor: &str, hydrate: bool) -> TriggerResponse {
        TriggerResponse {
            id: self.id,
            name: self.name.clone(),
            body: TriggerResponseBody {
                created: self.created,
                updated: self.updated,
                action_flavor: self.action_flavor.clone(),
                action_subtype: self.action_subtype.clone(),
                event_source_flavor: event_source_flavor.to_string(),
                is_active: self.is_active,
            },
            metadata: hydrate.then(|| TriggerResponseMetadata {
                workspace_id: self.workspace_id,
                event_source_id: self.event_source_id,
                event_filter: self.event_filter.clone(),
                action: self.action.clone(),
                description: self.description.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerResponseBody {
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub action_flavor: String,
    pub action_subtype: String,
    pub event_source_flavor: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerResponseMetadata {
    pub workspace_id: WorkspaceId,
    pub event_source_id: EventSourceId,
    pub event_filter: Document,
    pub action: Document,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub id: TriggerId,
    pub name: String,
    pub body: TriggerResponseBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TriggerResponseMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::document;
    use serde_json::json;

    fn trigger(filter: serde_json::Value) -> Trigger {
        Trigger::from_request(
            TriggerRequest {
                workspace_id: WorkspaceId::new(),
                name: "on-push".to_string(),
                description: String::new(),
                event_source_id: EventSourceId::new(),
                event_filter: Document::new(),
                action: TriggerActionSpec::FromAction {
                    action_id: ActionId::new(),
                },
            },
            document(filter),
            ActionSnapshot {
                flavor: "builtin".to_string(),
                subtype: "pipeline_run".to_string(),
                configuration: document(json!({"template_id": "t"})),
            },
        )
    }

    #[test]
    fn created_triggers_are_active() {
        assert!(trigger(json!({})).is_active);
    }

    #[test]
    fn filter_update_replaces_instead_of_merging() {
        let mut t = trigger(json!({"a": 1}));
        TriggerUpdate {
            event_filter: Some(document(json!({"b": 2}))),
            ..TriggerUpdate::default()
        }
        .apply(&mut t)
        .unwrap();
        assert_eq!(t.event_filter, document(json!({"b": 2})));
        assert_eq!(t.name, "on-push");
    }

    #[test]
    fn filter_model_selects_by_fields() {
        let t = trigger(json!({}));
        assert!(TriggerFilter::default().matches(&t));
        assert!(TriggerFilter {
            action_flavor: Some("builtin".to_string()),
            name_contains: Some("push".to_string()),
            ..TriggerFilter::default()
        }
        .matches(&t));
        assert!(!TriggerFilter {
            is_active: Some(false),
            ..TriggerFilter::default()
        }
        .matches(&t));
    }

    #[test]
    fn action_spec_serializes_with_kind_tag() {
        let spec = TriggerActionSpec::FromAction {
            action_id: ActionId::new(),
        };
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["kind"], json!("from_action"));
    }
}
