//! In-memory storage backend.
//!
//! This module provides thread-safe in-memory implementations of the storage traits.
//! It is intended for embedded usage, tests, and as a reference implementation.
//! Triggers and executions are kept in their encoded row form so that every
//! read goes through the same codec a relational backend would use.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::ids::{ActionId, ComponentId, EventSourceId, TriggerExecutionId, TriggerId, WorkspaceId};
use crate::models::{
    Action, ActionFilter, ComponentFilter, EventSource, EventSourceFilter, StackComponent, Trigger,
    TriggerExecution, TriggerExecutionFilter, TriggerFilter, Workspace,
};
use crate::storage::records::{TriggerExecutionRecord, TriggerRecord};
use crate::storage::traits::{
    ActionStore, ComponentStore, EventSourceStore, StorageError, TriggerExecutionStore,
    TriggerStore, WorkspaceStore,
};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

fn normalize_key(s: &str) -> String {
    s.trim().to_ascii_lowercase()
}

/// Single keyed table behind a lock.
#[derive(Debug)]
struct Table<K, V> {
    name: &'static str,
    rows: RwLock<HashMap<K, V>>,
}

impl<K, V> Table<K, V>
where
    K: Copy + Eq + Hash + Display,
    V: Clone,
{
    fn new(name: &'static str) -> Self {
        Self {
            name,
            rows: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts unless the key exists or another row `clashes` with the new
    /// one. The check and the write happen under one write guard.
    fn insert_unique(&self, key: K, value: V, name: &str, clashes: impl Fn(&V) -> bool) -> Result<(), StorageError> {
        let mut rows = self.rows.write().map_err(|_| lock_err("table.insert_unique"))?;
        if rows.contains_key(&key) {
            return Err(StorageError::DuplicateKey(key.to_string()));
        }
        if rows.values().any(clashes) {
            return Err(self.duplicate_name(name));
        }
        rows.insert(key, value);
        Ok(())
    }

    fn get(&self, key: K) -> Result<Option<V>, StorageError> {
        let rows = self.rows.read().map_err(|_| lock_err("table.get"))?;
        Ok(rows.get(&key).cloned())
    }

    fn contains(&self, key: K) -> Result<bool, StorageError> {
        let rows = self.rows.read().map_err(|_| lock_err("table.contains"))?;
        Ok(rows.contains_key(&key))
    }

    /// Replaces an existing row unless a different row `clashes` with it.
    fn replace_unique(&self, key: K, value: V, name: &str, clashes: impl Fn(&V) -> bool) -> Result<(), StorageError> {
        let mut rows = self.rows.write().map_err(|_| lock_err("table.replace_unique"))?;
        if !rows.contains_key(&key) {
            return Err(self.not_found(key));
        }
        if rows.iter().any(|(k, v)| *k != key && clashes(v)) {
            return Err(self.duplicate_name(name));
        }
        rows.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: K) -> Result<(), StorageError> {
        let mut rows = self.rows.write().map_err(|_| lock_err("table.remove"))?;
        rows.remove(&key).map(|_| ()).ok_or_else(|| self.not_found(key))
    }

    fn values(&self) -> Result<Vec<V>, StorageError> {
        let rows = self.rows.read().map_err(|_| lock_err("table.values"))?;
        Ok(rows.values().cloned().collect())
    }

    fn not_found(&self, key: K) -> StorageError {
        StorageError::RowNotFound {
            table: self.name,
            id: key.to_string(),
        }
    }

    fn duplicate_name(&self, name: &str) -> StorageError {
        StorageError::DuplicateName {
            table: self.name,
            name: name.to_string(),
        }
    }
}

/// Oldest first; ties broken by id so listings are stable.
fn sort_oldest_first<T, K: Ord>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, K)) {
    items.sort_by(|a, b| key(a).cmp(&key(b)));
}

/// Thread-safe in-memory workspace store. Names are unique, case-insensitively.
#[derive(Debug)]
pub struct InMemoryWorkspaceStore {
    table: Table<WorkspaceId, Workspace>,
}

impl Default for InMemoryWorkspaceStore {
    fn default() -> Self {
        Self {
            table: Table::new("workspace"),
        }
    }
}

impl InMemoryWorkspaceStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkspaceStore for InMemoryWorkspaceStore {
    fn insert(&self, workspace: Workspace) -> Result<(), StorageError> {
        let key = normalize_key(&workspace.name);
        let name = workspace.name.clone();
        self.table
            .insert_unique(workspace.id, workspace, &name, |w| normalize_key(&w.name) == key)
    }

    fn get(&self, id: WorkspaceId) -> Result<Option<Workspace>, StorageError> {
        self.table.get(id)
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Workspace>, StorageError> {
        let key = normalize_key(name);
        Ok(self
            .table
            .values()?
            .into_iter()
            .find(|w| normalize_key(&w.name) == key))
    }

    fn update(&self, workspace: Workspace) -> Result<(), StorageError> {
        let key = normalize_key(&workspace.name);
        let name = workspace.name.clone();
        self.table
            .replace_unique(workspace.id, workspace, &name, |w| normalize_key(&w.name) == key)
    }

    fn delete(&self, id: WorkspaceId) -> Result<(), StorageError> {
        self.table.remove(id)
    }

    fn list(&self) -> Result<Vec<Workspace>, StorageError> {
        let mut out = self.table.values()?;
        sort_oldest_first(&mut out, |w| (w.created, w.id));
        Ok(out)
    }
}

/// Thread-safe in-memory event source store.
#[derive(Debug)]
pub struct InMemoryEventSourceStore {
    table: Table<EventSourceId, EventSource>,
}

impl Default for InMemoryEventSourceStore {
    fn default() -> Self {
        Self {
            table: Table::new("event_source"),
        }
    }
}

impl InMemoryEventSourceStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSourceStore for InMemoryEventSourceStore {
    fn insert(&self, source: EventSource) -> Result<(), StorageError> {
        let (workspace_id, name) = (source.workspace_id, source.name.clone());
        self.table.insert_unique(source.id, source, &name, |s| {
            s.workspace_id == workspace_id && s.name == name
        })
    }

    fn get(&self, id: EventSourceId) -> Result<Option<EventSource>, StorageError> {
        self.table.get(id)
    }

    fn update(&self, source: EventSource) -> Result<(), StorageError> {
        let (workspace_id, name) = (source.workspace_id, source.name.clone());
        self.table.replace_unique(source.id, source, &name, |s| {
            s.workspace_id == workspace_id && s.name == name
        })
    }

    fn delete(&self, id: EventSourceId) -> Result<(), StorageError> {
        self.table.remove(id)
    }

    fn find(&self, filter: &EventSourceFilter) -> Result<Vec<EventSource>, StorageError> {
        let mut out: Vec<_> = self
            .table
            .values()?
            .into_iter()
            .filter(|s| filter.matches(s))
            .collect();
        sort_oldest_first(&mut out, |s| (s.created, s.id));
        Ok(out)
    }
}

/// Thread-safe in-memory action store.
#[derive(Debug)]
pub struct InMemoryActionStore {
    table: Table<ActionId, Action>,
}

impl Default for InMemoryActionStore {
    fn default() -> Self {
        Self {
            table: Table::new("action"),
        }
    }
}

impl InMemoryActionStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActionStore for InMemoryActionStore {
    fn insert(&self, action: Action) -> Result<(), StorageError> {
        let (workspace_id, name) = (action.workspace_id, action.name.clone());
        self.table.insert_unique(action.id, action, &name, |a| {
            a.workspace_id == workspace_id && a.name == name
        })
    }

    fn get(&self, id: ActionId) -> Result<Option<Action>, StorageError> {
        self.table.get(id)
    }

    fn update(&self, action: Action) -> Result<(), StorageError> {
        let (workspace_id, name) = (action.workspace_id, action.name.clone());
        self.table.replace_unique(action.id, action, &name, |a| {
            a.workspace_id == workspace_id && a.name == name
        })
    }

    fn delete(&self, id: ActionId) -> Result<(), StorageError> {
        self.table.remove(id)
    }

    fn find(&self, filter: &ActionFilter) -> Result<Vec<Action>, StorageError> {
        let mut out: Vec<_> = self
            .table
            .values()?
            .into_iter()
            .filter(|a| filter.matches(a))
            .collect();
        sort_oldest_first(&mut out, |a| (a.created, a.id));
        Ok(out)
    }
}

/// Thread-safe in-memory trigger store holding encoded rows.
#[derive(Debug)]
pub struct InMemoryTriggerStore {
    table: Table<TriggerId, TriggerRecord>,
}

impl Default for InMemoryTriggerStore {
    fn default() -> Self {
        Self {
            table: Table::new("trigger"),
        }
    }
}

impl InMemoryTriggerStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TriggerStore for InMemoryTriggerStore {
    fn insert(&self, trigger: Trigger) -> Result<(), StorageError> {
        let record = TriggerRecord::from_model(&trigger)?;
        self.table.insert_unique(trigger.id, record, &trigger.name, |r| {
            r.workspace_id == trigger.workspace_id && r.name == trigger.name
        })
    }

    fn get(&self, id: TriggerId) -> Result<Option<Trigger>, StorageError> {
        self.table.get(id)?.map(TriggerRecord::into_model).transpose()
    }

    fn update(&self, trigger: Trigger) -> Result<(), StorageError> {
        let record = TriggerRecord::from_model(&trigger)?;
        self.table.replace_unique(trigger.id, record, &trigger.name, |r| {
            r.workspace_id == trigger.workspace_id && r.name == trigger.name
        })
    }

    fn delete(&self, id: TriggerId) -> Result<(), StorageError> {
        self.table.remove(id)
    }

    fn find(&self, filter: &TriggerFilter) -> Result<Vec<Trigger>, StorageError> {
        let mut out = Vec::new();
        for record in self.table.values()? {
            let trigger = record.into_model()?;
            if filter.matches(&trigger) {
                out.push(trigger);
            }
        }
        sort_oldest_first(&mut out, |t| (t.created, t.id));
        Ok(out)
    }
}

/// Thread-safe in-memory trigger execution store holding encoded rows.
///
/// Holds the trigger store it references so inserts can check that the
/// trigger still exists.
#[derive(Debug)]
pub struct InMemoryTriggerExecutionStore {
    table: Table<TriggerExecutionId, TriggerExecutionRecord>,
    triggers: Arc<InMemoryTriggerStore>,
}

impl InMemoryTriggerExecutionStore {
    /// Create a new empty store referencing `triggers`.
    #[must_use]
    pub fn new(triggers: Arc<InMemoryTriggerStore>) -> Self {
        Self {
            table: Table::new("trigger_execution"),
            triggers,
        }
    }
}

impl TriggerExecutionStore for InMemoryTriggerExecutionStore {
    fn insert(&self, execution: TriggerExecution) -> Result<(), StorageError> {
        let record = TriggerExecutionRecord::from_model(&execution)?;
        // The execution write guard is held across the trigger check, so a
        // cascade that deleted the trigger row either rejects this insert or
        // removes the row afterwards in `delete_for_trigger`.
        let mut rows = self
            .table
            .rows
            .write()
            .map_err(|_| lock_err("trigger_execution.insert"))?;
        if !self.triggers.table.contains(execution.trigger_id)? {
            return Err(self.triggers.table.not_found(execution.trigger_id));
        }
        if rows.contains_key(&execution.id) {
            return Err(StorageError::DuplicateKey(execution.id.to_string()));
        }
        rows.insert(execution.id, record);
        Ok(())
    }

    fn get(&self, id: TriggerExecutionId) -> Result<Option<TriggerExecution>, StorageError> {
        self.table.get(id)?.map(TriggerExecutionRecord::into_model).transpose()
    }

    fn find(&self, filter: &TriggerExecutionFilter) -> Result<Vec<TriggerExecution>, StorageError> {
        let mut out = Vec::new();
        for record in self.table.values()? {
            if filter.trigger_id.is_some_and(|t| t != record.trigger_id) {
                continue;
            }
            let execution = record.into_model()?;
            if filter.matches(&execution) {
                out.push(execution);
            }
        }
        sort_oldest_first(&mut out, |e| (e.created, e.id));
        Ok(out)
    }

    fn delete_for_trigger(&self, trigger_id: TriggerId) -> Result<usize, StorageError> {
        let mut rows = self
            .table
            .rows
            .write()
            .map_err(|_| lock_err("trigger_execution.delete_for_trigger"))?;
        let before = rows.len();
        rows.retain(|_, r| r.trigger_id != trigger_id);
        Ok(before - rows.len())
    }
}

/// Thread-safe in-memory stack component store.
#[derive(Debug)]
pub struct InMemoryComponentStore {
    table: Table<ComponentId, StackComponent>,
}

impl Default for InMemoryComponentStore {
    fn default() -> Self {
        Self {
            table: Table::new("stack_component"),
        }
    }
}

impl InMemoryComponentStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ComponentStore for InMemoryComponentStore {
    fn insert(&self, component: StackComponent) -> Result<(), StorageError> {
        let (workspace_id, component_type, name) =
            (component.workspace_id, component.component_type, component.name.clone());
        self.table.insert_unique(component.id, component, &name, |c| {
            c.workspace_id == workspace_id && c.component_type == component_type && c.name == name
        })
    }

    fn get(&self, id: ComponentId) -> Result<Option<StackComponent>, StorageError> {
        self.table.get(id)
    }

    fn delete(&self, id: ComponentId) -> Result<(), StorageError> {
        self.table.remove(id)
    }

    fn find(&self, filter: &ComponentFilter) -> Result<Vec<StackComponent>, StorageError> {
        let mut out: Vec<_> = self
            .table
            .values()?
            .into_iter()
            .filter(|c| filter.matches(c))
            .collect();
        sort_oldest_first(&mut out, |c| (c.created, c.id));
        Ok(out)
    }
}

/// Bundle of storage backends used by the control plane.
#[derive(Clone)]
pub struct Stores {
    pub workspaces: Arc<dyn WorkspaceStore>,
    pub event_sources: Arc<dyn EventSourceStore>,
    pub actions: Arc<dyn ActionStore>,
    pub triggers: Arc<dyn TriggerStore>,
    pub executions: Arc<dyn TriggerExecutionStore>,
    pub components: Arc<dyn ComponentStore>,
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

impl Stores {
    /// Fresh, empty in-memory backends.
    #[must_use]
    pub fn in_memory() -> Self {
        let triggers = Arc::new(InMemoryTriggerStore::new());
        Self {
            workspaces: Arc::new(InMemoryWorkspaceStore::new()),
            event_sources: Arc::new(InMemoryEventSourceStore::new()),
            actions: Arc::new(InMemoryActionStore::new()),
            executions: Arc::new(InMemoryTriggerExecutionStore::new(Arc::clone(&triggers))),
            triggers,
            components: Arc::new(InMemoryComponentStore::new()),
        }
    }
}
