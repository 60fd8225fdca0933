//! Event source models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::ValidationError;
use crate::ids::{EventSourceId, WorkspaceId};
use crate::plugins::PluginSubType;

use super::{name_matches, validate_length, validate_name};

/// A configured instance of an event-source flavor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSource {
    pub id: EventSourceId,
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub flavor: String,
    pub plugin_subtype: PluginSubType,
    pub configuration: Document,
    pub description: String,
    pub is_active: bool,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSourceRequest {
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub flavor: String,
    pub plugin_subtype: PluginSubType,
    pub configuration: Document,
    #[serde(default)]
    pub description: String,
}

impl EventSourceRequest {
    /// # Errors
    /// `ValidationError` for empty or oversized string fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name("name", &self.name)?;
        validate_name("flavor", &self.flavor)?;
        validate_length("description", &self.description)
    }
}

/// Partial update. `configuration` is replaced as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSourceUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<Document>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl EventSourceUpdate {
    /// Applies the supplied fields. The configuration must already be validated.
    ///
    /// # Errors
    /// `ValidationError` for empty or oversized string fields.
    pub fn apply(&self, source: &mut EventSource) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validate_name("name", name)?;
            source.name.clone_from(name);
        }
        if let Some(description) = &self.description {
            validate_length("description", description)?;
            source.description.clone_from(description);
        }
        if let Some(configuration) = &self.configuration {
            source.configuration.clone_from(configuration);
        }
        if let Some(active) = self.is_active {
            source.is_active = active;
        }
        source.updated = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSourceFilter {
    #[serde(default)]
    pub workspace_id: Option<WorkspaceId>,
    #[serde(default)]
    pub flavor: Option<String>,
    #[serde(default)]
    pub plugin_subtype: Option<PluginSubType>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub name_contains: Option<String>,
}

impl EventSourceFilter {
    #[must_use]
    pub fn matches(&self, source: &EventSource) -> bool {
        self.workspace_id.map_or(true, |ws| ws == source.workspace_id)
            && self.flavor.as_deref().map_or(true, |f| f == source.flavor)
            && self.plugin_subtype.map_or(true, |s| s == source.plugin_subtype)
            && self.is_active.map_or(true, |a| a == source.is_active)
            && name_matches(self.name_contains.as_deref(), &source.name)
    }
}

impl EventSource {
    #[must_use]
    pub fn from_request(request: EventSourceRequest, configuration: Document) -> Self {
        let now = Utc::now();
        Self {
            id: EventSourceId::new(),
            workspace_id: request.workspace_id,
            name: request.name,
            flavor: request.flavor,
            plugin_subtype: request.plugin_subtype,
            configuration,
            description: request.description,
            is_active: true,
            created: now,
            updated: now,
        }
    }

    #[must_use]
    pub fn to_response(&self, hydrate: bool) -> EventSourceResponse {
        EventSourceResponse {
            id: self.id,
            name: self.name.clone(),
            body: EventSourceResponseBody {
                created: self.created,
                updated: self.updated,
                flavor: self.flavor.clone(),
                plugin_subtype: self.plugin_subtype,
                is_active: self.is_active,
            },
            metadata: hydrate.then(|| EventSourceResponseMetadata {
                workspace_id: self.workspace_id,
                description: self.description.clone(),
                configuration: self.configuration.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSourceResponseBody {
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub flavor: String,
    pub plugin_subtype: PluginSubType,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSourceResponseMetadata {
    pub workspace_id: WorkspaceId,
    pub description: String,
    pub configuration: Document,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSourceResponse {
    pub id: EventSourceId,
    pub name: String,
    pub body: EventSourceResponseBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EventSourceResponseMetadata>,
}
