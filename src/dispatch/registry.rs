//! Live trigger registry.
//!
//! Readers take an immutable [`RegistrySnapshot`] by cloning an `Arc` under a
//! read guard. Writers are serialized by a mutex, build the next snapshot
//! without holding the read/write lock, and hold the write guard only for the
//! pointer swap. Triggers enter the registry with their filter already
//! compiled, so dispatch never parses a filter document.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;

use crate::error::{NotFoundError, PlaneError, PlaneResult};
use crate::ids::{EventSourceId, TriggerId};
use crate::models::Trigger;
use crate::plugins::EventFilter;

/// A live trigger and its compiled filter.
#[derive(Clone)]
pub struct LiveTrigger {
    /// The trigger as stored.
    pub trigger: Arc<Trigger>,
    /// Compiled from `trigger.event_filter` by the source's flavor.
    pub filter: Arc<dyn EventFilter>,
}

impl fmt::Debug for LiveTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveTrigger")
            .field("trigger_id", &self.trigger.id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
struct SourceEntry {
    is_active: bool,
    triggers: BTreeMap<TriggerId, LiveTrigger>,
}

/// Immutable view of the registry at one point in time.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    sources: HashMap<EventSourceId, SourceEntry>,
}

impl RegistrySnapshot {
    /// Active triggers of an active source, in trigger-id order.
    ///
    /// An inactive source yields no triggers.
    ///
    /// # Errors
    /// `NotFoundError::EventSource` if the source was never registered.
    pub fn triggers_for(&self, source_id: EventSourceId) -> Result<Vec<LiveTrigger>, NotFoundError> {
        let entry = self
            .sources
            .get(&source_id)
            .ok_or(NotFoundError::EventSource(source_id))?;
        if !entry.is_active {
            return Ok(Vec::new());
        }
        Ok(entry.triggers.values().cloned().collect())
    }

    /// Whether the trigger would still be handed out by [`Self::triggers_for`].
    #[must_use]
    pub fn is_live(&self, source_id: EventSourceId, trigger_id: TriggerId) -> bool {
        self.sources
            .get(&source_id)
            .is_some_and(|e| e.is_active && e.triggers.contains_key(&trigger_id))
    }

    /// Number of registered sources, active or not.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Number of live triggers across all active sources.
    #[must_use]
    pub fn live_trigger_count(&self) -> usize {
        self.sources
            .values()
            .filter(|e| e.is_active)
            .map(|e| e.triggers.len())
            .sum()
    }
}

fn lock_err(context: &'static str) -> PlaneError {
    PlaneError::internal(format!("poisoned lock: {context}"))
}

/// Registry of active triggers grouped by event source.
#[derive(Debug, Default)]
pub struct TriggerRegistry {
    current: RwLock<Arc<RegistrySnapshot>>,
    writer: Mutex<()>,
}

impl TriggerRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot. Later writes never alter it.
    ///
    /// # Errors
    /// `Internal` if the lock is poisoned.
    pub fn snapshot(&self) -> PlaneResult<Arc<RegistrySnapshot>> {
        let guard = self.current.read().map_err(|_| lock_err("registry.snapshot"))?;
        Ok(Arc::clone(&guard))
    }

    /// Convenience over [`RegistrySnapshot::triggers_for`] on a fresh snapshot.
    ///
    /// # Errors
    /// `NotFound` for an unregistered source.
    pub fn triggers_for(&self, source_id: EventSourceId) -> PlaneResult<Vec<LiveTrigger>> {
        Ok(self.snapshot()?.triggers_for(source_id)?)
    }

    /// Checks liveness against the latest snapshot. Lock failures read as not live.
    #[must_use]
    pub fn is_live(&self, source_id: EventSourceId, trigger_id: TriggerId) -> bool {
        self.snapshot()
            .map(|s| s.is_live(source_id, trigger_id))
            .unwrap_or(false)
    }

    /// Registers a source, or updates the activity of a known one while
    /// keeping its triggers.
    ///
    /// # Errors
    /// `Internal` if a lock is poisoned.
    pub fn register_source(&self, source_id: EventSourceId, is_active: bool) -> PlaneResult<()> {
        self.write(|next| {
            let entry = next.sources.entry(source_id).or_insert_with(|| SourceEntry {
                is_active,
                triggers: BTreeMap::new(),
            });
            entry.is_active = is_active;
            Ok(())
        })?;
        debug!(event_source_id = %source_id, is_active, "registered event source");
        Ok(())
    }

    /// Toggles a source. Triggers of an inactive source stay registered but
    /// are not live.
    ///
    /// # Errors
    /// `NotFound` for an unregistered source.
    pub fn set_source_active(&self, source_id: EventSourceId, is_active: bool) -> PlaneResult<()> {
        self.write(|next| {
            let entry = next
                .sources
                .get_mut(&source_id)
                .ok_or(NotFoundError::EventSource(source_id))?;
            entry.is_active = is_active;
            Ok(())
        })?;
        debug!(event_source_id = %source_id, is_active, "event source activity changed");
        Ok(())
    }

    /// Removes a source and all of its triggers. Returns whether it existed.
    ///
    /// # Errors
    /// `Internal` if a lock is poisoned.
    pub fn remove_source(&self, source_id: EventSourceId) -> PlaneResult<bool> {
        let mut removed = false;
        self.write(|next| {
            removed = next.sources.remove(&source_id).is_some();
            Ok(())
        })?;
        Ok(removed)
    }

    /// Inserts or replaces a trigger with its compiled filter. Inactive
    /// triggers leave the live set.
    ///
    /// # Errors
    /// `NotFound` if the trigger's source is not registered.
    pub fn upsert(&self, trigger: Trigger, filter: Box<dyn EventFilter>) -> PlaneResult<()> {
        let trigger_id = trigger.id;
        let source_id = trigger.event_source_id;
        let is_active = trigger.is_active;
        let live = LiveTrigger {
            trigger: Arc::new(trigger),
            filter: Arc::from(filter),
        };
        self.write(|next| {
            if !next.sources.contains_key(&source_id) {
                return Err(NotFoundError::EventSource(source_id).into());
            }
            for entry in next.sources.values_mut() {
                entry.triggers.remove(&trigger_id);
            }
            if is_active {
                if let Some(entry) = next.sources.get_mut(&source_id) {
                    entry.triggers.insert(trigger_id, live);
                }
            }
            Ok(())
        })?;
        debug!(trigger_id = %trigger_id, is_active, "trigger registered");
        Ok(())
    }

    /// Removes a trigger from the live set. Returns whether it was present.
    ///
    /// # Errors
    /// `Internal` if a lock is poisoned.
    pub fn remove(&self, trigger_id: TriggerId) -> PlaneResult<bool> {
        let mut removed = false;
        self.write(|next| {
            for entry in next.sources.values_mut() {
                removed |= entry.triggers.remove(&trigger_id).is_some();
            }
            Ok(())
        })?;
        Ok(removed)
    }

    fn write(&self, mutate: impl FnOnce(&mut RegistrySnapshot) -> PlaneResult<()>) -> PlaneResult<()> {
        let _writer = self.writer.lock().map_err(|_| lock_err("registry.writer"))?;
        let mut next = RegistrySnapshot::clone(&*self.snapshot()?);
        mutate(&mut next)?;
        let mut guard = self.current.write().map_err(|_| lock_err("registry.swap"))?;
        *guard = Arc::new(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::ids::{ActionId, WorkspaceId};
    use crate::models::{ActionSnapshot, TriggerActionSpec, TriggerRequest};
    use crate::plugins::MatchAll;

    fn trigger(source: EventSourceId) -> Trigger {
        Trigger::from_request(
            TriggerRequest {
                workspace_id: WorkspaceId::new(),
                name: "t".to_string(),
                description: String::new(),
                event_source_id: source,
                event_filter: Document::new(),
                action: TriggerActionSpec::FromAction {
                    action_id: ActionId::new(),
                },
            },
            Document::new(),
            ActionSnapshot {
                flavor: "builtin".to_string(),
                subtype: "pipeline_run".to_string(),
                configuration: Document::new(),
            },
        )
    }

    #[test]
    fn unknown_source_is_not_found() {
        let registry = TriggerRegistry::new();
        let err = registry.triggers_for(EventSourceId::new()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn inactive_triggers_are_not_live() {
        let registry = TriggerRegistry::new();
        let source = EventSourceId::new();
        registry.register_source(source, true).unwrap();

        let mut t = trigger(source);
        registry.upsert(t.clone(), Box::new(MatchAll)).unwrap();
        assert_eq!(registry.triggers_for(source).unwrap().len(), 1);

        t.is_active = false;
        registry.upsert(t.clone(), Box::new(MatchAll)).unwrap();
        assert!(registry.triggers_for(source).unwrap().is_empty());
        assert!(!registry.is_live(source, t.id));
    }

    #[test]
    fn source_deactivation_hides_and_restores_triggers() {
        let registry = TriggerRegistry::new();
        let source = EventSourceId::new();
        registry.register_source(source, true).unwrap();
        registry.upsert(trigger(source), Box::new(MatchAll)).unwrap();

        registry.set_source_active(source, false).unwrap();
        assert!(registry.triggers_for(source).unwrap().is_empty());
        registry.set_source_active(source, true).unwrap();
        assert_eq!(registry.triggers_for(source).unwrap().len(), 1);
    }

    #[test]
    fn snapshots_are_immutable() {
        let registry = TriggerRegistry::new();
        let source = EventSourceId::new();
        registry.register_source(source, true).unwrap();
        let t = trigger(source);
        registry.upsert(t.clone(), Box::new(MatchAll)).unwrap();

        let before = registry.snapshot().unwrap();
        assert!(registry.remove(t.id).unwrap());
        assert!(before.is_live(source, t.id));
        assert!(!registry.is_live(source, t.id));
    }

    #[test]
    fn upsert_requires_registered_source() {
        let registry = TriggerRegistry::new();
        assert!(registry.upsert(trigger(EventSourceId::new()), Box::new(MatchAll)).is_err());
    }

    #[test]
    fn removing_source_drops_its_triggers() {
        let registry = TriggerRegistry::new();
        let source = EventSourceId::new();
        registry.register_source(source, true).unwrap();
        registry.upsert(trigger(source), Box::new(MatchAll)).unwrap();
        assert!(registry.remove_source(source).unwrap());
        assert_eq!(registry.snapshot().unwrap().live_trigger_count(), 0);
        assert!(!registry.remove_source(source).unwrap());
    }
}
