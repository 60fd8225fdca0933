//! Authorization gate consulted before any resource access.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{PlaneError, PlaneResult};
use crate::ids::WorkspaceId;

use super::{Action, Resource, ResourceType};

/// An already-authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Caller {
    /// Stable caller identifier (user or service account).
    pub id: String,
    /// Admins bypass grant checks.
    #[serde(default)]
    pub is_admin: bool,
}

impl Caller {
    #[must_use]
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_admin: false,
        }
    }

    #[must_use]
    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_admin: true,
        }
    }
}

/// Decides whether a caller may perform an action on a resource.
pub trait Authorizer: Send + Sync {
    /// Returns `Ok(())` when permitted.
    ///
    /// # Errors
    /// `PlaneError::Forbidden` when the caller lacks permission.
    fn verify(&self, caller: &Caller, action: Action, resource: &Resource) -> PlaneResult<()>;

    /// Boolean form of [`Authorizer::verify`], used to filter listings.
    fn allows(&self, caller: &Caller, action: Action, resource: &Resource) -> bool {
        self.verify(caller, action, resource).is_ok()
    }
}

/// Permits everything. Suitable for single-tenant deployments and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn verify(&self, _caller: &Caller, _action: Action, _resource: &Resource) -> PlaneResult<()> {
        Ok(())
    }
}

/// A single permission: an action on a resource type, optionally limited to
/// one workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grant {
    pub action: Action,
    pub resource_type: ResourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<WorkspaceId>,
}

impl Grant {
    fn covers(&self, action: Action, resource: &Resource) -> bool {
        if self.action != action || self.resource_type != resource.resource_type() {
            return false;
        }
        match self.workspace_id {
            None => true,
            Some(ws) => resource.workspace_id() == Some(ws),
        }
    }
}

/// Static per-caller grant table.
#[derive(Debug, Default, Clone)]
pub struct PermissionSet {
    grants: HashMap<String, Vec<Grant>>,
}

impl PermissionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a grant for a caller id.
    #[must_use]
    pub fn grant(mut self, caller_id: impl Into<String>, grant: Grant) -> Self {
        self.grants.entry(caller_id.into()).or_default().push(grant);
        self
    }

    /// Grants every action on a resource type inside a workspace.
    #[must_use]
    pub fn grant_all(
        mut self,
        caller_id: impl Into<String>,
        resource_type: ResourceType,
        workspace_id: Option<WorkspaceId>,
    ) -> Self {
        let entry = self.grants.entry(caller_id.into()).or_default();
        entry.extend(Action::ALL.into_iter().map(|action| Grant {
            action,
            resource_type,
            workspace_id,
        }));
        self
    }
}

impl Authorizer for PermissionSet {
    fn verify(&self, caller: &Caller, action: Action, resource: &Resource) -> PlaneResult<()> {
        if caller.is_admin {
            return Ok(());
        }
        let permitted = self
            .grants
            .get(&caller.id)
            .is_some_and(|grants| grants.iter().any(|g| g.covers(action, resource)));
        if permitted {
            Ok(())
        } else {
            tracing::debug!(caller = %caller.id, %action, %resource, "access denied");
            Err(PlaneError::Forbidden {
                caller: caller.id.clone(),
                action: action.to_string(),
                resource: resource.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_bypasses_grants() {
        let perms = PermissionSet::new();
        let r = Resource::in_workspace(ResourceType::Trigger, WorkspaceId::new()).unwrap();
        assert!(perms.allows(&Caller::admin("root"), Action::Delete, &r));
        assert!(!perms.allows(&Caller::user("alice"), Action::Delete, &r));
    }

    #[test]
    fn workspace_limited_grant() {
        let ws = WorkspaceId::new();
        let other = WorkspaceId::new();
        let perms = PermissionSet::new().grant(
            "alice",
            Grant {
                action: Action::Read,
                resource_type: ResourceType::Trigger,
                workspace_id: Some(ws),
            },
        );
        let alice = Caller::user("alice");

        let inside = Resource::in_workspace(ResourceType::Trigger, ws).unwrap();
        let outside = Resource::in_workspace(ResourceType::Trigger, other).unwrap();
        assert!(perms.allows(&alice, Action::Read, &inside));
        assert!(!perms.allows(&alice, Action::Update, &inside));

        let err = perms.verify(&alice, Action::Read, &outside).unwrap_err();
        assert!(err.is_forbidden());
        assert_eq!(err.http_status(), 403);
    }

    #[test]
    fn grant_all_covers_every_verb() {
        let perms = PermissionSet::new().grant_all("bob", ResourceType::Action, None);
        let r = Resource::in_workspace(ResourceType::Action, WorkspaceId::new()).unwrap();
        for action in Action::ALL {
            assert!(perms.allows(&Caller::user("bob"), action, &r));
        }
    }
}
