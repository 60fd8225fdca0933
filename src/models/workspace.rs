//! Workspace models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::ids::WorkspaceId;

use super::{validate_length, validate_name};

/// A tenant boundary. Every workspace-scoped resource belongs to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    pub description: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl WorkspaceRequest {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
        }
    }

    /// # Errors
    /// `ValidationError` for an empty or oversized name/description.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name("name", &self.name)?;
        validate_length("description", &self.description)
    }
}

/// Partial update; only supplied fields change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl WorkspaceUpdate {
    /// # Errors
    /// `ValidationError` for an empty or oversized name/description.
    pub fn apply(&self, workspace: &mut Workspace) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validate_name("name", name)?;
            workspace.name.clone_from(name);
        }
        if let Some(description) = &self.description {
            validate_length("description", description)?;
            workspace.description.clone_from(description);
        }
        workspace.updated = Utc::now();
        Ok(())
    }
}

impl Workspace {
    #[must_use]
    pub fn from_request(request: WorkspaceRequest) -> Self {
        let now = Utc::now();
        Self {
            id: WorkspaceId::new(),
            name: request.name,
            description: request.description,
            created: now,
            updated: now,
        }
    }

    #[must_use]
    pub fn to_response(&self, hydrate: bool) -> WorkspaceResponse {
        WorkspaceResponse {
            id: self.id,
            name: self.name.clone(),
            body: WorkspaceResponseBody {
                created: self.created,
                updated: self.updated,
            },
            metadata: hydrate.then(|| WorkspaceResponseMetadata {
                description: self.description.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceResponseBody {
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceResponseMetadata {
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceResponse {
    pub id: WorkspaceId,
    pub name: String,
    pub body: WorkspaceResponseBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<WorkspaceResponseMetadata>,
}

/// Resource counts of a workspace, limited to what the caller may read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceStatistics {
    pub event_sources: usize,
    pub actions: usize,
    pub triggers: usize,
    pub components: usize,
}
