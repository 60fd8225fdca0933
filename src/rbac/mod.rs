//! Role-based access control model.
//!
//! Every resource access is described as an [`Action`] on a [`Resource`]. A
//! resource's workspace scoping is checked when it is constructed, so an
//! invalid resource can never reach an [`Authorizer`].

mod authorizer;

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::ids::WorkspaceId;

pub use authorizer::{AllowAll, Authorizer, Caller, Grant, PermissionSet};

/// RBAC verbs.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    ReadSecretValue,
    Prune,
    /// Service connectors.
    Client,
    /// Models.
    Promote,
    /// Secrets.
    BackupRestore,
    Share,
}

impl Action {
    /// All verbs, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Create,
        Self::Read,
        Self::Update,
        Self::Delete,
        Self::ReadSecretValue,
        Self::Prune,
        Self::Client,
        Self::Promote,
        Self::BackupRestore,
        Self::Share,
    ];

    /// Wire name of the verb.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::ReadSecretValue => "read_secret_value",
            Self::Prune => "prune",
            Self::Client => "client",
            Self::Promote => "promote",
            Self::BackupRestore => "backup_restore",
            Self::Share => "share",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownAction {
                value: s.to_string(),
            })
    }
}

/// Resource types of the server API.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Action,
    Artifact,
    ArtifactVersion,
    CodeRepository,
    EventSource,
    Flavor,
    Model,
    ModelVersion,
    Pipeline,
    PipelineRun,
    PipelineDeployment,
    PipelineBuild,
    RunTemplate,
    Service,
    RunMetadata,
    Secret,
    ServiceAccount,
    ServiceConnector,
    Stack,
    StackComponent,
    Tag,
    Trigger,
    TriggerExecution,
}

impl ResourceType {
    /// All resource types, in declaration order.
    pub const ALL: [Self; 23] = [
        Self::Action,
        Self::Artifact,
        Self::ArtifactVersion,
        Self::CodeRepository,
        Self::EventSource,
        Self::Flavor,
        Self::Model,
        Self::ModelVersion,
        Self::Pipeline,
        Self::PipelineRun,
        Self::PipelineDeployment,
        Self::PipelineBuild,
        Self::RunTemplate,
        Self::Service,
        Self::RunMetadata,
        Self::Secret,
        Self::ServiceAccount,
        Self::ServiceConnector,
        Self::Stack,
        Self::StackComponent,
        Self::Tag,
        Self::Trigger,
        Self::TriggerExecution,
    ];

    /// Wire name of the resource type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Artifact => "artifact",
            Self::ArtifactVersion => "artifact_version",
            Self::CodeRepository => "code_repository",
            Self::EventSource => "event_source",
            Self::Flavor => "flavor",
            Self::Model => "model",
            Self::ModelVersion => "model_version",
            Self::Pipeline => "pipeline",
            Self::PipelineRun => "pipeline_run",
            Self::PipelineDeployment => "pipeline_deployment",
            Self::PipelineBuild => "pipeline_build",
            Self::RunTemplate => "run_template",
            Self::Service => "service",
            Self::RunMetadata => "run_metadata",
            Self::Secret => "secret",
            Self::ServiceAccount => "service_account",
            Self::ServiceConnector => "service_connector",
            Self::Stack => "stack",
            Self::StackComponent => "stack_component",
            Self::Tag => "tag",
            Self::Trigger => "trigger",
            Self::TriggerExecution => "trigger_execution",
        }
    }

    /// May be scoped to a workspace, or not.
    #[must_use]
    pub const fn is_flexible_scoped(self) -> bool {
        matches!(
            self,
            Self::Flavor | Self::Secret | Self::ServiceConnector | Self::Stack | Self::StackComponent
        )
    }

    /// Never scoped to a workspace.
    #[must_use]
    pub const fn is_unscoped(self) -> bool {
        matches!(self, Self::ServiceAccount)
    }

    /// Always scoped to a workspace.
    #[must_use]
    pub const fn is_workspace_scoped(self) -> bool {
        !self.is_flexible_scoped() && !self.is_unscoped()
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownResourceType {
                value: s.to_string(),
            })
    }
}

#[derive(Deserialize)]
struct RawResource {
    #[serde(rename = "type")]
    resource_type: ResourceType,
    #[serde(default)]
    id: Option<Uuid>,
    #[serde(default)]
    workspace_id: Option<WorkspaceId>,
}

/// An access-controlled entity.
///
/// Immutable once constructed; construction fails when the workspace scoping
/// does not fit the resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Resource {
    #[serde(rename = "type")]
    resource_type: ResourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    workspace_id: Option<WorkspaceId>,
}

impl<'de> Deserialize<'de> for Resource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawResource::deserialize(deserializer)?;
        Self::new(raw.resource_type, raw.id, raw.workspace_id).map_err(de::Error::custom)
    }
}

impl Resource {
    /// Builds a resource, validating its workspace scoping.
    ///
    /// # Errors
    /// - `WorkspaceRequired` for a workspace-scoped type without a workspace.
    /// - `WorkspaceForbidden` for an unscoped type with a workspace.
    pub fn new(
        resource_type: ResourceType,
        id: Option<Uuid>,
        workspace_id: Option<WorkspaceId>,
    ) -> Result<Self, ValidationError> {
        if resource_type.is_workspace_scoped() && workspace_id.is_none() {
            return Err(ValidationError::WorkspaceRequired {
                resource_type: resource_type.to_string(),
            });
        }
        if resource_type.is_unscoped() && workspace_id.is_some() {
            return Err(ValidationError::WorkspaceForbidden {
                resource_type: resource_type.to_string(),
            });
        }
        Ok(Self {
            resource_type,
            id,
            workspace_id,
        })
    }

    /// A resource type inside a workspace, without a specific id (list/create).
    ///
    /// # Errors
    /// See [`Resource::new`].
    pub fn in_workspace(
        resource_type: ResourceType,
        workspace_id: WorkspaceId,
    ) -> Result<Self, ValidationError> {
        Self::new(resource_type, None, Some(workspace_id))
    }

    #[must_use]
    pub const fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    #[must_use]
    pub const fn id(&self) -> Option<Uuid> {
        self.id
    }

    #[must_use]
    pub const fn workspace_id(&self) -> Option<WorkspaceId> {
        self.workspace_id
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ws) = self.workspace_id {
            write!(f, "{ws}:")?;
        }
        write!(f, "{}", self.resource_type)?;
        if let Some(id) = self.id {
            write!(f, "/{id}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoping_classification() {
        assert!(ResourceType::Trigger.is_workspace_scoped());
        assert!(ResourceType::StackComponent.is_flexible_scoped());
        assert!(!ResourceType::StackComponent.is_workspace_scoped());
        assert!(ResourceType::ServiceAccount.is_unscoped());
        assert!(!ResourceType::ServiceAccount.is_workspace_scoped());
    }

    #[test]
    fn workspace_scoped_resource_requires_workspace() {
        let err = Resource::new(ResourceType::Trigger, None, None).unwrap_err();
        assert!(matches!(err, ValidationError::WorkspaceRequired { .. }));
    }

    #[test]
    fn unscoped_resource_rejects_workspace() {
        let err = Resource::new(ResourceType::ServiceAccount, None, Some(WorkspaceId::new()))
            .unwrap_err();
        assert!(matches!(err, ValidationError::WorkspaceForbidden { .. }));
    }

    #[test]
    fn flexible_resource_accepts_both() {
        assert!(Resource::new(ResourceType::Stack, None, None).is_ok());
        assert!(Resource::new(ResourceType::Stack, None, Some(WorkspaceId::new())).is_ok());
    }

    #[test]
    fn display_includes_workspace_and_id() {
        let ws = WorkspaceId::new();
        let id = Uuid::new_v4();
        let r = Resource::new(ResourceType::Trigger, Some(id), Some(ws)).unwrap();
        assert_eq!(r.to_string(), format!("{ws}:trigger/{id}"));

        let r = Resource::new(ResourceType::ServiceAccount, None, None).unwrap();
        assert_eq!(r.to_string(), "service_account");
    }

    #[test]
    fn deserialization_validates_scoping() {
        let bad = serde_json::json!({"type": "trigger"});
        assert!(serde_json::from_value::<Resource>(bad).is_err());

        let ws = WorkspaceId::new();
        let good = serde_json::json!({"type": "trigger", "workspace_id": ws});
        let r: Resource = serde_json::from_value(good).unwrap();
        assert_eq!(r.workspace_id(), Some(ws));
    }

    #[test]
    fn wire_names_round_trip() {
        for t in ResourceType::ALL {
            assert_eq!(t.as_str().parse::<ResourceType>().unwrap(), t);
        }
        for a in Action::ALL {
            assert_eq!(a.as_str().parse::<Action>().unwrap(), a);
        }
        assert!("workspace".parse::<ResourceType>().is_err());
    }
}
