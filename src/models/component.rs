//! Stack component models.
//!
//! Components are flexibly scoped: they may belong to a workspace or be
//! shared across all of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::ValidationError;
use crate::ids::{ComponentId, WorkspaceId};
use crate::plugins::PluginType;

use super::{name_matches, validate_name};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackComponent {
    pub id: ComponentId,
    pub workspace_id: Option<WorkspaceId>,
    pub name: String,
    pub component_type: PluginType,
    pub flavor: String,
    pub configuration: Document,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRequest {
    #[serde(default)]
    pub workspace_id: Option<WorkspaceId>,
    pub name: String,
    pub component_type: PluginType,
    pub flavor: String,
    pub configuration: Document,
}

impl ComponentRequest {
    /// # Errors
    /// `ValidationError` for empty or oversized string fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name("name", &self.name)?;
        validate_name("flavor", &self.flavor)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentFilter {
    #[serde(default)]
    pub workspace_id: Option<WorkspaceId>,
    #[serde(default)]
    pub component_type: Option<PluginType>,
    #[serde(default)]
    pub flavor: Option<String>,
    #[serde(default)]
    pub name_contains: Option<String>,
}

impl ComponentFilter {
    #[must_use]
    pub fn matches(&self, component: &StackComponent) -> bool {
        self.workspace_id.map_or(true, |ws| component.workspace_id == Some(ws))
            && self.component_type.map_or(true, |t| t == component.component_type)
            && self.flavor.as_deref().map_or(true, |f| f == component.flavor)
            && name_matches(self.name_contains.as_deref(), &component.name)
    }
}

impl StackComponent {
    #[must_use]
    pub fn from_request(request: ComponentRequest, configuration: Document) -> Self {
        let now = Utc::now();
        Self {
            id: ComponentId::new(),
            workspace_id: request.workspace_id,
            name: request.name,
            component_type: request.component_type,
            flavor: request.flavor,
            configuration,
            created: now,
            updated: now,
        }
    }

    #[must_use]
    pub fn to_response(&self, hydrate: bool) -> ComponentResponse {
        ComponentResponse {
            id: self.id,
            name: self.name.clone(),
            body: ComponentResponseBody {
                created: self.created,
                updated: self.updated,
                component_type: self.component_type,
                flavor: self.flavor.clone(),
            },
            metadata: hydrate.then(|| ComponentResponseMetadata {
                workspace_id: self.workspace_id,
                configuration: self.configuration.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentResponseBody {
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub component_type: PluginType,
    pub flavor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentResponseMetadata {
    pub workspace_id: Option<WorkspaceId>,
    pub configuration: Document,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentResponse {
    pub id: ComponentId,
    pub name: String,
    pub body: ComponentResponseBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ComponentResponseMetadata>,
}
