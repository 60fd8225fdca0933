//! Abstract storage traits.
//!
//! These traits define the contract a relational backend must implement.
//! The in-memory backend in this crate is the reference implementation and
//! the one used by tests.

use thiserror::Error;

use crate::ids::{ActionId, ComponentId, EventSourceId, TriggerExecutionId, TriggerId, WorkspaceId};
use crate::models::{
    Action, ActionFilter, ComponentFilter, EventSource, EventSourceFilter, StackComponent, Trigger,
    TriggerExecution, TriggerExecutionFilter, TriggerFilter, Workspace,
};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Row to update or delete does not exist.
    #[error("{table} row not found: {id}")]
    RowNotFound { table: &'static str, id: String },

    /// Key already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Another row in the same scope already carries this name.
    #[error("{table} named '{name}' already exists")]
    DuplicateName { table: &'static str, name: String },

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Workspaces.
///
/// Name uniqueness is enforced by the store itself: `insert` and `update`
/// check it atomically with the write and fail with `DuplicateName`. The
/// same holds for the per-workspace names of the other stores.
pub trait WorkspaceStore: Send + Sync {
    /// Insert a new workspace. Names are unique, case-insensitively.
    fn insert(&self, workspace: Workspace) -> Result<(), StorageError>;

    fn get(&self, id: WorkspaceId) -> Result<Option<Workspace>, StorageError>;

    fn find_by_name(&self, name: &str) -> Result<Option<Workspace>, StorageError>;

    /// Replace an existing workspace. Returns error if not found or renamed
    /// onto another workspace's name.
    fn update(&self, workspace: Workspace) -> Result<(), StorageError>;

    fn delete(&self, id: WorkspaceId) -> Result<(), StorageError>;

    /// All workspaces, oldest first.
    fn list(&self) -> Result<Vec<Workspace>, StorageError>;
}

/// Event sources. Names are unique per workspace.
pub trait EventSourceStore: Send + Sync {
    fn insert(&self, source: EventSource) -> Result<(), StorageError>;

    fn get(&self, id: EventSourceId) -> Result<Option<EventSource>, StorageError>;

    fn update(&self, source: EventSource) -> Result<(), StorageError>;

    fn delete(&self, id: EventSourceId) -> Result<(), StorageError>;

    /// Matching event sources, oldest first.
    fn find(&self, filter: &EventSourceFilter) -> Result<Vec<EventSource>, StorageError>;
}

/// Actions. Names are unique per workspace.
pub trait ActionStore: Send + Sync {
    fn insert(&self, action: Action) -> Result<(), StorageError>;

    fn get(&self, id: ActionId) -> Result<Option<Action>, StorageError>;

    fn update(&self, action: Action) -> Result<(), StorageError>;

    fn delete(&self, id: ActionId) -> Result<(), StorageError>;

    /// Matching actions, oldest first.
    fn find(&self, filter: &ActionFilter) -> Result<Vec<Action>, StorageError>;
}

/// Triggers. Names are unique per workspace.
///
/// Backends persist `event_filter` and `action` as opaque blobs; see
/// [`super::TriggerRecord`].
pub trait TriggerStore: Send + Sync {
    fn insert(&self, trigger: Trigger) -> Result<(), StorageError>;

    fn get(&self, id: TriggerId) -> Result<Option<Trigger>, StorageError>;

    fn update(&self, trigger: Trigger) -> Result<(), StorageError>;

    fn delete(&self, id: TriggerId) -> Result<(), StorageError>;

    /// Matching triggers, oldest first.
    fn find(&self, filter: &TriggerFilter) -> Result<Vec<Trigger>, StorageError>;
}

/// Trigger executions. Append-only apart from cascade deletion.
pub trait TriggerExecutionStore: Send + Sync {
    /// Records an execution. Fails with `RowNotFound` on the `trigger` table
    /// when its trigger no longer exists, so a trigger deleted mid-dispatch
    /// never leaves executions behind.
    fn insert(&self, execution: TriggerExecution) -> Result<(), StorageError>;

    fn get(&self, id: TriggerExecutionId) -> Result<Option<TriggerExecution>, StorageError>;

    /// Matching executions, oldest first.
    fn find(&self, filter: &TriggerExecutionFilter) -> Result<Vec<TriggerExecution>, StorageError>;

    /// Delete every execution of a trigger, returning how many were removed.
    fn delete_for_trigger(&self, trigger_id: TriggerId) -> Result<usize, StorageError>;
}

/// Stack components. Names are unique per workspace (or among shared
/// components) and component type.
pub trait ComponentStore: Send + Sync {
    fn insert(&self, component: StackComponent) -> Result<(), StorageError>;

    fn get(&self, id: ComponentId) -> Result<Option<StackComponent>, StorageError>;

    fn delete(&self, id: ComponentId) -> Result<(), StorageError>;

    /// Matching components, oldest first.
    fn find(&self, filter: &ComponentFilter) -> Result<Vec<StackComponent>, StorageError>;
}
