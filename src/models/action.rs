//! Action models.
//!
//! Actions are reusable units of work. Triggers copy an action's flavor,
//! subtype and configuration when they are created, so editing an action
//! never changes the behavior of triggers that already exist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::ValidationError;
use crate::ids::{ActionId, WorkspaceId};
use crate::plugins::PluginSubType;

use super::{name_matches, validate_length, validate_name};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub flavor: String,
    pub plugin_subtype: PluginSubType,
    pub configuration: Document,
    pub description: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub flavor: String,
    pub plugin_subtype: PluginSubType,
    pub configuration: Document,
    #[serde(default)]
    pub description: String,
}

impl ActionRequest {
    /// # Errors
    /// `ValidationError` for empty or oversized string fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name("name", &self.name)?;
        validate_name("flavor", &self.flavor)?;
        validate_length("description", &self.description)
    }
}

/// Partial update; flavor and subtype are fixed at creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<Document>,
}

impl ActionUpdate {
    /// Applies the supplied fields. The configuration must already be validated.
    ///
    /// # Errors
    /// `ValidationError` for empty or oversized string fields.
    pub fn apply(&self, action: &mut Action) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validate_name("name", name)?;
            action.name.clone_from(name);
        }
        if let Some(description) = &self.description {
            validate_length("description", description)?;
            action.description.clone_from(description);
        }
        if let Some(configuration) = &self.configuration {
            action.configuration.clone_from(configuration);
        }
        action.updated = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionFilter {
    #[serde(default)]
    pub workspace_id: Option<WorkspaceId>,
    #[serde(default)]
    pub flavor: Option<String>,
    #[serde(default)]
    pub plugin_subtype: Option<PluginSubType>,
    #[serde(default)]
    pub name_contains: Option<String>,
}

impl ActionFilter {
    #[must_use]
    pub fn matches(&self, action: &Action) -> bool {
        self.workspace_id.map_or(true, |ws| ws == action.workspace_id)
            && self.flavor.as_deref().map_or(true, |f| f == action.flavor)
            && self.plugin_subtype.map_or(true, |s| s == action.plugin_subtype)
            && name_matches(self.name_contains.as_deref(), &action.name)
    }
}

impl Action {
    #[must_use]
    pub fn from_request(request: ActionRequest, configuration: Document) -> Self {
        let now = Utc::now();
        Self {
            id: ActionId::new(),
            workspace_id: request.workspace_id,
            name: request.name,
            flavor: request.flavor,
            plugin_subtype: request.plugin_subtype,
            configuration,
            description: request.description,
            created: now,
            updated: now,
        }
    }

    #[must_use]
    pub fn to_response(&self, hydrate: bool) -> ActionResponse {
        ActionResponse {
            id: self.id,
            name: self.name.clone(),
            body: ActionResponseBody {
                created: self.created,
                updated: self.updated,
                flavor: self.flavor.clone(),
                plugin_subtype: self.plugin_subtype,
            },
            metadata: hydrate.then(|| ActionResponseMetadata {
                workspace_id: self.workspace_id,
                description: self.description.clone(),
                configuration: self.configuration.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponseBody {
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub flavor: String,
    pub plugin_subtype: PluginSubType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponseMetadata {
    pub workspace_id: WorkspaceId,
    pub description: String,
    pub configuration: Document,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub id: ActionId,
    pub name: String,
    pub body: ActionResponseBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ActionResponseMetadata>,
}
