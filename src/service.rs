//! Control-plane service.
//!
//! [`ControlPlane`] exposes the resource operations an API layer would call.
//! Every operation authorizes the caller first, validates plugin
//! configuration through the flavor registry, and keeps the live trigger
//! registry in step with the stores. Mutations run one at a time: each holds
//! the write lock from its first read until the registry reflects its store
//! write.
//!
//! Callers that may not read a resource are told it does not exist.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PlaneConfig;
use crate::dispatch::{ActionExecutor, DispatchWorker, Dispatcher, FilterEvaluator, TriggerRegistry};
use crate::error::{ConfigurationError, NotFoundError, PlaneError, PlaneResult};
use crate::ids::{ActionId, ComponentId, EventSourceId, TriggerExecutionId, TriggerId, WorkspaceId};
use crate::models::{
    Action, ActionFilter, ActionRequest, ActionResponse, ActionSnapshot, ActionUpdate, ComponentFilter,
    ComponentRequest, ComponentResponse, EventSource, EventSourceFilter, EventSourceRequest,
    EventSourceResponse, EventSourceUpdate, Page, PageRequest, StackComponent, Trigger, TriggerActionSpec,
    TriggerExecutionFilter, TriggerExecutionResponse, TriggerFilter, TriggerRequest, TriggerResponse,
    TriggerUpdate, Workspace, WorkspaceRequest, WorkspaceResponse, WorkspaceStatistics, WorkspaceUpdate,
};
use crate::plugins::{FlavorRegistry, PluginType};
use crate::rbac::{Action as Verb, Authorizer, Caller, Resource, ResourceType};
use crate::storage::Stores;

/// The control plane: stores, flavors, authorization and the live registry.
#[derive(Clone)]
pub struct ControlPlane {
    config: PlaneConfig,
    flavors: Arc<FlavorRegistry>,
    stores: Stores,
    authorizer: Arc<dyn Authorizer>,
    registry: Arc<TriggerRegistry>,
    evaluator: FilterEvaluator,
    writes: Arc<Mutex<()>>,
}

impl fmt::Debug for ControlPlane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlPlane")
            .field("config", &self.config)
            .field("flavors", &self.flavors)
            .finish_non_exhaustive()
    }
}

fn resource(resource_type: ResourceType, id: impl Into<Uuid>, workspace_id: Option<WorkspaceId>) -> PlaneResult<Resource> {
    Ok(Resource::new(resource_type, Some(id.into()), workspace_id)?)
}

fn workspace_resource(resource_type: ResourceType, workspace_id: WorkspaceId) -> PlaneResult<Resource> {
    Ok(Resource::in_workspace(resource_type, workspace_id)?)
}

impl ControlPlane {
    /// Builds a control plane over existing stores and loads every stored
    /// event source and trigger into the live registry.
    ///
    /// # Errors
    /// `Validation` for an invalid configuration, storage errors while loading.
    pub fn new(
        config: PlaneConfig,
        flavors: FlavorRegistry,
        stores: Stores,
        authorizer: Arc<dyn Authorizer>,
    ) -> PlaneResult<Self> {
        config.validate()?;
        let flavors = Arc::new(flavors);
        let plane = Self {
            config,
            evaluator: FilterEvaluator::new(Arc::clone(&flavors)),
            flavors,
            stores,
            authorizer,
            registry: Arc::new(TriggerRegistry::new()),
            writes: Arc::new(Mutex::new(())),
        };
        plane.load_registry()?;
        Ok(plane)
    }

    /// Built-in flavors, default configuration and empty in-memory stores.
    ///
    /// # Errors
    /// See [`ControlPlane::new`].
    pub fn in_memory(authorizer: Arc<dyn Authorizer>) -> PlaneResult<Self> {
        Self::new(PlaneConfig::default(), FlavorRegistry::builtin(), Stores::in_memory(), authorizer)
    }

    /// Triggers whose source is gone or whose filter no longer compiles are
    /// left out of the registry with a warning.
    fn load_registry(&self) -> PlaneResult<()> {
        let sources = self.stores.event_sources.find(&EventSourceFilter::default())?;
        let mut flavors = HashMap::with_capacity(sources.len());
        for source in &sources {
            self.registry.register_source(source.id, source.is_active)?;
            flavors.insert(source.id, source.flavor.as_str());
        }
        let mut skipped = 0_usize;
        for trigger in self.stores.triggers.find(&TriggerFilter::default())? {
            let Some(flavor) = flavors.get(&trigger.event_source_id) else {
                warn!(
                    trigger_id = %trigger.id,
                    event_source_id = %trigger.event_source_id,
                    "event source missing, trigger not loaded"
                );
                skipped += 1;
                continue;
            };
            match self.evaluator.compile(flavor, &trigger.event_filter) {
                Ok(filter) => self.registry.upsert(trigger, filter)?,
                Err(e) => {
                    warn!(trigger_id = %trigger.id, error = %e, "trigger filter does not compile, trigger not loaded");
                    skipped += 1;
                }
            }
        }
        let snapshot = self.registry.snapshot()?;
        info!(
            event_sources = snapshot.source_count(),
            live_triggers = snapshot.live_trigger_count(),
            skipped,
            "trigger registry loaded"
        );
        Ok(())
    }

    fn write_guard(&self) -> PlaneResult<MutexGuard<'_, ()>> {
        self.writes
            .lock()
            .map_err(|_| PlaneError::internal("poisoned lock: control_plane.writes"))
    }

    /// Authorizes `verb` on an existing resource. Callers that may not read
    /// it get `missing`, the same error as for an absent resource.
    fn authorize_existing(&self, caller: &Caller, verb: Verb, target: &Resource, missing: NotFoundError) -> PlaneResult<()> {
        if !self.authorizer.allows(caller, Verb::Read, target) {
            return Err(missing.into());
        }
        if verb != Verb::Read {
            self.authorizer.verify(caller, verb, target)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn config(&self) -> &PlaneConfig {
        &self.config
    }

    #[must_use]
    pub fn flavors(&self) -> &FlavorRegistry {
        &self.flavors
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<TriggerRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// First page at the configured default size.
    #[must_use]
    pub fn default_page(&self) -> PageRequest {
        PageRequest::new(1, self.config.pagination.default_page_size)
    }

    /// A dispatcher sharing this plane's registry and execution store.
    #[must_use]
    pub fn dispatcher(&self, executor: Arc<dyn ActionExecutor>) -> Dispatcher {
        Dispatcher::new(Arc::clone(&self.registry), executor, Arc::clone(&self.stores.executions))
    }

    /// Starts a background worker around [`Self::dispatcher`].
    ///
    /// # Errors
    /// `Internal` if the worker thread cannot be spawned.
    pub fn start_worker(&self, executor: Arc<dyn ActionExecutor>) -> PlaneResult<DispatchWorker> {
        DispatchWorker::start(self.dispatcher(executor), &self.config.dispatch)
    }

    fn paginate<T, R>(&self, items: Vec<T>, page: PageRequest, to_response: impl FnMut(T) -> R) -> PlaneResult<Page<R>> {
        let page = page.normalized(self.config.pagination.max_page_size)?;
        Ok(Page::paginate(items, page)?.map(to_response))
    }

    // ---------------------------------------------------------------------
    // Workspaces
    // ---------------------------------------------------------------------

    fn require_admin(caller: &Caller, action: Verb, target: &str) -> PlaneResult<()> {
        if caller.is_admin {
            Ok(())
        } else {
            Err(PlaneError::Forbidden {
                caller: caller.id.clone(),
                action: action.to_string(),
                resource: target.to_string(),
            })
        }
    }

    fn workspace(&self, id: WorkspaceId) -> PlaneResult<Workspace> {
        self.stores
            .workspaces
            .get(id)?
            .ok_or_else(|| NotFoundError::Workspace(id).into())
    }

    /// Creating workspaces is reserved for admins.
    ///
    /// # Errors
    /// `Forbidden`, `Validation` (including a duplicate name).
    pub fn create_workspace(&self, caller: &Caller, request: WorkspaceRequest) -> PlaneResult<WorkspaceResponse> {
        Self::require_admin(caller, Verb::Create, "workspace")?;
        request.validate()?;
        let _writes = self.write_guard()?;
        let workspace = Workspace::from_request(request);
        self.stores.workspaces.insert(workspace.clone())?;
        info!(workspace_id = %workspace.id, name = %workspace.name, "workspace created");
        Ok(workspace.to_response(true))
    }

    /// # Errors
    /// `NotFound`.
    pub fn get_workspace(&self, _caller: &Caller, id: WorkspaceId, hydrate: bool) -> PlaneResult<WorkspaceResponse> {
        Ok(self.workspace(id)?.to_response(hydrate))
    }

    /// # Errors
    /// `Validation` for invalid paging.
    pub fn list_workspaces(&self, _caller: &Caller, page: PageRequest, hydrate: bool) -> PlaneResult<Page<WorkspaceResponse>> {
        let workspaces = self.stores.workspaces.list()?;
        self.paginate(workspaces, page, |w| w.to_response(hydrate))
    }

    /// # Errors
    /// `Forbidden`, `NotFound`, `Validation`.
    pub fn update_workspace(&self, caller: &Caller, id: WorkspaceId, update: WorkspaceUpdate) -> PlaneResult<WorkspaceResponse> {
        Self::require_admin(caller, Verb::Update, &format!("workspace/{id}"))?;
        let _writes = self.write_guard()?;
        let mut workspace = self.workspace(id)?;
        update.apply(&mut workspace)?;
        self.stores.workspaces.update(workspace.clone())?;
        info!(workspace_id = %id, "workspace updated");
        Ok(workspace.to_response(true))
    }

    /// Deletes a workspace together with every resource scoped to it.
    ///
    /// # Errors
    /// `Forbidden`, `NotFound`.
    pub fn delete_workspace(&self, caller: &Caller, id: WorkspaceId) -> PlaneResult<()> {
        Self::require_admin(caller, Verb::Delete, &format!("workspace/{id}"))?;
        let _writes = self.write_guard()?;
        self.workspace(id)?;

        let sources = self.stores.event_sources.find(&EventSourceFilter {
            workspace_id: Some(id),
            ..EventSourceFilter::default()
        })?;
        for source in &sources {
            self.cascade_event_source(source.id)?;
        }
        let triggers = self.stores.triggers.find(&TriggerFilter {
            workspace_id: Some(id),
            ..TriggerFilter::default()
        })?;
        for trigger in &triggers {
            self.cascade_trigger(trigger.id)?;
        }
        let actions = self.stores.actions.find(&ActionFilter {
            workspace_id: Some(id),
            ..ActionFilter::default()
        })?;
        for action in &actions {
            self.stores.actions.delete(action.id)?;
        }
        let components = self.stores.components.find(&ComponentFilter {
            workspace_id: Some(id),
            ..ComponentFilter::default()
        })?;
        for component in &components {
            self.stores.components.delete(component.id)?;
        }
        self.stores.workspaces.delete(id)?;
        info!(
            workspace_id = %id,
            event_sources = sources.len(),
            actions = actions.len(),
            components = components.len(),
            "workspace deleted"
        );
        Ok(())
    }

    /// Counts of the workspace's resources the caller may read.
    ///
    /// # Errors
    /// `NotFound`.
    pub fn workspace_statistics(&self, caller: &Caller, id: WorkspaceId) -> PlaneResult<WorkspaceStatistics> {
        self.workspace(id)?;

        let event_sources = self
            .stores
            .event_sources
            .find(&EventSourceFilter {
                workspace_id: Some(id),
                ..EventSourceFilter::default()
            })?
            .iter()
            .filter(|s| self.can_read(caller, ResourceType::EventSource, s.id.into(), Some(id)))
            .count();
        let actions = self
            .stores
            .actions
            .find(&ActionFilter {
                workspace_id: Some(id),
                ..ActionFilter::default()
            })?
            .iter()
            .filter(|a| self.can_read(caller, ResourceType::Action, a.id.into(), Some(id)))
            .count();
        let triggers = self
            .stores
            .triggers
            .find(&TriggerFilter {
                workspace_id: Some(id),
                ..TriggerFilter::default()
            })?
            .iter()
            .filter(|t| self.can_read(caller, ResourceType::Trigger, t.id.into(), Some(id)))
            .count();
        let components = self
            .stores
            .components
            .find(&ComponentFilter {
                workspace_id: Some(id),
                ..ComponentFilter::default()
            })?
            .iter()
            .filter(|c| self.can_read(caller, ResourceType::StackComponent, c.id.into(), Some(id)))
            .count();

        Ok(WorkspaceStatistics {
            event_sources,
            actions,
            triggers,
            components,
        })
    }

    // ---------------------------------------------------------------------
    // Event sources
    // ---------------------------------------------------------------------

    fn event_source(&self, id: EventSourceId) -> PlaneResult<EventSource> {
        self.stores
            .event_sources
            .get(id)?
            .ok_or_else(|| NotFoundError::EventSource(id).into())
    }

    /// # Errors
    /// `Forbidden`, `NotFound` (workspace), `Configuration` (flavor or
    /// configuration), `Validation`.
    pub fn create_event_source(&self, caller: &Caller, request: EventSourceRequest) -> PlaneResult<EventSourceResponse> {
        request.validate()?;
        let _writes = self.write_guard()?;
        self.workspace(request.workspace_id)?;
        self.authorizer.verify(
            caller,
            Verb::Create,
            &workspace_resource(ResourceType::EventSource, request.workspace_id)?,
        )?;

        let flavor = self.flavors.event_source(&request.flavor)?;
        if flavor.subtype() != Some(request.plugin_subtype) {
            return Err(ConfigurationError::SubtypeMismatch {
                flavor: request.flavor.clone(),
                subtype: request.plugin_subtype.to_string(),
            }
            .into());
        }
        let configuration = flavor.validate(&request.configuration)?;

        let source = EventSource::from_request(request, configuration);
        self.stores.event_sources.insert(source.clone())?;
        self.registry.register_source(source.id, source.is_active)?;
        info!(event_source_id = %source.id, flavor = %source.flavor, "event source created");
        Ok(source.to_response(true))
    }

    /// # Errors
    /// `NotFound`, `Forbidden`.
    pub fn get_event_source(&self, caller: &Caller, id: EventSourceId, hydrate: bool) -> PlaneResult<EventSourceResponse> {
        let source = self.event_source(id)?;
        self.authorize_existing(
            caller,
            Verb::Read,
            &resource(ResourceType::EventSource, id, Some(source.workspace_id))?,
            NotFoundError::EventSource(id),
        )?;
        Ok(source.to_response(hydrate))
    }

    /// Lists the event sources the caller may read.
    ///
    /// # Errors
    /// `Validation` for invalid paging.
    pub fn list_event_sources(
        &self,
        caller: &Caller,
        filter: &EventSourceFilter,
        page: PageRequest,
        hydrate: bool,
    ) -> PlaneResult<Page<EventSourceResponse>> {
        let visible: Vec<_> = self
            .stores
            .event_sources
            .find(filter)?
            .into_iter()
            .filter(|s| self.can_read(caller, ResourceType::EventSource, s.id.into(), Some(s.workspace_id)))
            .collect();
        self.paginate(visible, page, |s| s.to_response(hydrate))
    }

    /// Partial update. A new configuration replaces the old one and is
    /// re-validated; toggling `is_active` toggles the source's triggers.
    ///
    /// # Errors
    /// `NotFound`, `Forbidden`, `Configuration`, `Validation`.
    pub fn update_event_source(
        &self,
        caller: &Caller,
        id: EventSourceId,
        mut update: EventSourceUpdate,
    ) -> PlaneResult<EventSourceResponse> {
        let _writes = self.write_guard()?;
        let mut source = self.event_source(id)?;
        self.authorize_existing(
            caller,
            Verb::Update,
            &resource(ResourceType::EventSource, id, Some(source.workspace_id))?,
            NotFoundError::EventSource(id),
        )?;

        if let Some(configuration) = &update.configuration {
            let flavor = self.flavors.event_source(&source.flavor)?;
            update.configuration = Some(flavor.validate(configuration)?);
        }
        let was_active = source.is_active;
        update.apply(&mut source)?;
        self.stores.event_sources.update(source.clone())?;
        if source.is_active != was_active {
            self.registry.set_source_active(id, source.is_active)?;
        }
        info!(event_source_id = %id, is_active = source.is_active, "event source updated");
        Ok(source.to_response(true))
    }

    /// Deletes an event source with its triggers and their executions.
    ///
    /// # Errors
    /// `NotFound`, `Forbidden`.
    pub fn delete_event_source(&self, caller: &Caller, id: EventSourceId) -> PlaneResult<()> {
        let _writes = self.write_guard()?;
        let source = self.event_source(id)?;
        self.authorize_existing(
            caller,
            Verb::Delete,
            &resource(ResourceType::EventSource, id, Some(source.workspace_id))?,
            NotFoundError::EventSource(id),
        )?;
        self.cascade_event_source(id)
    }

    fn cascade_event_source(&self, id: EventSourceId) -> PlaneResult<()> {
        self.registry.remove_source(id)?;
        let triggers = self.stores.triggers.find(&TriggerFilter {
            event_source_id: Some(id),
            ..TriggerFilter::default()
        })?;
        for trigger in &triggers {
            self.cascade_trigger(trigger.id)?;
        }
        self.stores.event_sources.delete(id)?;
        info!(event_source_id = %id, triggers = triggers.len(), "event source deleted");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Actions
    // ---------------------------------------------------------------------

    fn action(&self, id: ActionId) -> PlaneResult<Action> {
        self.stores
            .actions
            .get(id)?
            .ok_or_else(|| NotFoundError::Action(id).into())
    }

    /// # Errors
    /// `Forbidden`, `NotFound` (workspace), `Configuration`, `Validation`.
    pub fn create_action(&self, caller: &Caller, request: ActionRequest) -> PlaneResult<ActionResponse> {
        request.validate()?;
        let _writes = self.write_guard()?;
        self.workspace(request.workspace_id)?;
        self.authorizer.verify(
            caller,
            Verb::Create,
            &workspace_resource(ResourceType::Action, request.workspace_id)?,
        )?;

        let flavor = self.flavors.action(&request.flavor, request.plugin_subtype.as_str())?;
        let configuration = flavor.validate(&request.configuration)?;

        let action = Action::from_request(request, configuration);
        self.stores.actions.insert(action.clone())?;
        info!(action_id = %action.id, flavor = %action.flavor, "action created");
        Ok(action.to_response(true))
    }

    /// # Errors
    /// `NotFound`, `Forbidden`.
    pub fn get_action(&self, caller: &Caller, id: ActionId, hydrate: bool) -> PlaneResult<ActionResponse> {
        let action = self.action(id)?;
        self.authorize_existing(
            caller,
            Verb::Read,
            &resource(ResourceType::Action, id, Some(action.workspace_id))?,
            NotFoundError::Action(id),
        )?;
        Ok(action.to_response(hydrate))
    }

    /// # Errors
    /// `Validation` for invalid paging.
    pub fn list_actions(
        &self,
        caller: &Caller,
        filter: &ActionFilter,
        page: PageRequest,
        hydrate: bool,
    ) -> PlaneResult<Page<ActionResponse>> {
        let visible: Vec<_> = self
            .stores
            .actions
            .find(filter)?
            .into_iter()
            .filter(|a| self.can_read(caller, ResourceType::Action, a.id.into(), Some(a.workspace_id)))
            .collect();
        self.paginate(visible, page, |a| a.to_response(hydrate))
    }

    /// Partial update. Existing triggers keep the snapshot they were
    /// created with.
    ///
    /// # Errors
    /// `NotFound`, `Forbidden`, `Configuration`, `Validation`.
    pub fn update_action(&self, caller: &Caller, id: ActionId, mut update: ActionUpdate) -> PlaneResult<ActionResponse> {
        let _writes = self.write_guard()?;
        let mut action = self.action(id)?;
        self.authorize_existing(
            caller,
            Verb::Update,
            &resource(ResourceType::Action, id, Some(action.workspace_id))?,
            NotFoundError::Action(id),
        )?;
        if let Some(configuration) = &update.configuration {
            let flavor = self.flavors.action(&action.flavor, action.plugin_subtype.as_str())?;
            update.configuration = Some(flavor.validate(configuration)?);
        }
        update.apply(&mut action)?;
        self.stores.actions.update(action.clone())?;
        info!(action_id = %id, "action updated");
        Ok(action.to_response(true))
    }

    /// # Errors
    /// `NotFound`, `Forbidden`.
    pub fn delete_action(&self, caller: &Caller, id: ActionId) -> PlaneResult<()> {
        let _writes = self.write_guard()?;
        let action = self.action(id)?;
        self.authorize_existing(
            caller,
            Verb::Delete,
            &resource(ResourceType::Action, id, Some(action.workspace_id))?,
            NotFoundError::Action(id),
        )?;
        self.stores.actions.delete(id)?;
        info!(action_id = %id, "action deleted");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Triggers
    // ---------------------------------------------------------------------

    fn trigger(&self, id: TriggerId) -> PlaneResult<Trigger> {
        self.stores
            .triggers
            .get(id)?
            .ok_or_else(|| NotFoundError::Trigger(id).into())
    }

    fn resolve_action(&self, caller: &Caller, workspace_id: WorkspaceId, spec: &TriggerActionSpec) -> PlaneResult<ActionSnapshot> {
        match spec {
            TriggerActionSpec::Inline {
                flavor,
                subtype,
                configuration,
            } => {
                let plugin = self.flavors.action(flavor, subtype)?;
                Ok(ActionSnapshot {
                    flavor: flavor.clone(),
                    subtype: subtype.clone(),
                    configuration: plugin.validate(configuration)?,
                })
            }
            TriggerActionSpec::FromAction { action_id } => {
                let action = self.action(*action_id)?;
                if action.workspace_id != workspace_id {
                    return Err(NotFoundError::Action(*action_id).into());
                }
                self.authorize_existing(
                    caller,
                    Verb::Read,
                    &resource(ResourceType::Action, *action_id, Some(workspace_id))?,
                    NotFoundError::Action(*action_id),
                )?;
                Ok(ActionSnapshot::from(&action))
            }
        }
    }

    /// Creates an active trigger. The action is snapshotted now and the
    /// filter is compiled once for the live registry.
    ///
    /// # Errors
    /// `Forbidden`; `NotFound` for a missing workspace, or an event source or
    /// action the caller cannot read; `Configuration` for a filter the source
    /// flavor rejects or an invalid action configuration; `Validation`.
    pub fn create_trigger(&self, caller: &Caller, request: TriggerRequest) -> PlaneResult<TriggerResponse> {
        request.validate()?;
        let _writes = self.write_guard()?;
        self.workspace(request.workspace_id)?;
        self.authorizer.verify(
            caller,
            Verb::Create,
            &workspace_resource(ResourceType::Trigger, request.workspace_id)?,
        )?;

        let source = self.event_source(request.event_source_id)?;
        if source.workspace_id != request.workspace_id {
            return Err(NotFoundError::EventSource(request.event_source_id).into());
        }
        self.authorize_existing(
            caller,
            Verb::Read,
            &resource(ResourceType::EventSource, source.id, Some(source.workspace_id))?,
            NotFoundError::EventSource(source.id),
        )?;
        let compiled = self.evaluator.compile(&source.flavor, &request.event_filter)?;
        let snapshot = self.resolve_action(caller, request.workspace_id, &request.action)?;

        let filter = request.event_filter.clone();
        let trigger = Trigger::from_request(request, filter, snapshot);
        self.stores.triggers.insert(trigger.clone())?;
        self.registry.upsert(trigger.clone(), compiled)?;
        info!(
            trigger_id = %trigger.id,
            event_source_id = %trigger.event_source_id,
            action_flavor = %trigger.action_flavor,
            "trigger created"
        );
        Ok(trigger.to_response(&source.flavor, true))
    }

    /// # Errors
    /// `NotFound`, `Forbidden`.
    pub fn get_trigger(&self, caller: &Caller, id: TriggerId, hydrate: bool) -> PlaneResult<TriggerResponse> {
        let trigger = self.trigger(id)?;
        self.authorize_existing(
            caller,
            Verb::Read,
            &resource(ResourceType::Trigger, id, Some(trigger.workspace_id))?,
            NotFoundError::Trigger(id),
        )?;
        let flavor = self.event_source(trigger.event_source_id)?.flavor;
        Ok(trigger.to_response(&flavor, hydrate))
    }

    /// # Errors
    /// `Validation` for invalid paging.
    pub fn list_triggers(
        &self,
        caller: &Caller,
        filter: &TriggerFilter,
        page: PageRequest,
        hydrate: bool,
    ) -> PlaneResult<Page<TriggerResponse>> {
        let visible: Vec<_> = self
            .stores
            .triggers
            .find(filter)?
            .into_iter()
            .filter(|t| self.can_read(caller, ResourceType::Trigger, t.id.into(), Some(t.workspace_id)))
            .collect();

        let mut flavors: HashMap<EventSourceId, String> = HashMap::new();
        for trigger in &visible {
            if !flavors.contains_key(&trigger.event_source_id) {
                let flavor = self
                    .stores
                    .event_sources
                    .get(trigger.event_source_id)?
                    .map(|s| s.flavor)
                    .unwrap_or_default();
                flavors.insert(trigger.event_source_id, flavor);
            }
        }
        self.paginate(visible, page, |t| {
            let flavor = flavors.get(&t.event_source_id).map_or("", String::as_str);
            t.to_response(flavor, hydrate)
        })
    }

    /// Partial update. A supplied filter or action document replaces the
    /// stored one as a whole after validation; the registry gets the
    /// recompiled filter.
    ///
    /// # Errors
    /// `NotFound`, `Forbidden`, `Configuration`, `Validation`.
    pub fn update_trigger(&self, caller: &Caller, id: TriggerId, mut update: TriggerUpdate) -> PlaneResult<TriggerResponse> {
        let _writes = self.write_guard()?;
        let mut trigger = self.trigger(id)?;
        self.authorize_existing(
            caller,
            Verb::Update,
            &resource(ResourceType::Trigger, id, Some(trigger.workspace_id))?,
            NotFoundError::Trigger(id),
        )?;
        let source = self.event_source(trigger.event_source_id)?;

        if let Some(action) = &update.action {
            let plugin = self.flavors.action(&trigger.action_flavor, &trigger.action_subtype)?;
            update.action = Some(plugin.validate(action)?);
        }
        update.apply(&mut trigger)?;
        let compiled = self.evaluator.compile(&source.flavor, &trigger.event_filter)?;

        self.stores.triggers.update(trigger.clone())?;
        self.registry.upsert(trigger.clone(), compiled)?;
        info!(trigger_id = %id, is_active = trigger.is_active, "trigger updated");
        Ok(trigger.to_response(&source.flavor, true))
    }

    /// Deletes a trigger and its execution history.
    ///
    /// # Errors
    /// `NotFound`, `Forbidden`.
    pub fn delete_trigger(&self, caller: &Caller, id: TriggerId) -> PlaneResult<()> {
        let _writes = self.write_guard()?;
        let trigger = self.trigger(id)?;
        self.authorize_existing(
            caller,
            Verb::Delete,
            &resource(ResourceType::Trigger, id, Some(trigger.workspace_id))?,
            NotFoundError::Trigger(id),
        )?;
        self.cascade_trigger(id)
    }

    /// Removal order matters: once the trigger row is gone the execution
    /// store refuses new executions for it, so the final sweep leaves none.
    fn cascade_trigger(&self, id: TriggerId) -> PlaneResult<()> {
        self.registry.remove(id)?;
        self.stores.triggers.delete(id)?;
        let executions = self.stores.executions.delete_for_trigger(id)?;
        info!(trigger_id = %id, executions, "trigger deleted");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Trigger executions
    // ---------------------------------------------------------------------

    /// # Errors
    /// `NotFound`, `Forbidden`.
    pub fn get_trigger_execution(
        &self,
        caller: &Caller,
        id: TriggerExecutionId,
        hydrate: bool,
    ) -> PlaneResult<TriggerExecutionResponse> {
        let execution = self
            .stores
            .executions
            .get(id)?
            .ok_or(NotFoundError::TriggerExecution(id))?;
        let trigger = self
            .stores
            .triggers
            .get(execution.trigger_id)?
            .ok_or(NotFoundError::TriggerExecution(id))?;
        self.authorize_existing(
            caller,
            Verb::Read,
            &resource(ResourceType::TriggerExecution, id, Some(trigger.workspace_id))?,
            NotFoundError::TriggerExecution(id),
        )?;
        Ok(execution.to_response(hydrate))
    }

    /// Lists executions, oldest first, limited to those the caller may read.
    ///
    /// # Errors
    /// `Validation` for invalid paging.
    pub fn list_trigger_executions(
        &self,
        caller: &Caller,
        filter: &TriggerExecutionFilter,
        page: PageRequest,
        hydrate: bool,
    ) -> PlaneResult<Page<TriggerExecutionResponse>> {
        let mut workspaces: HashMap<TriggerId, Option<WorkspaceId>> = HashMap::new();
        let mut visible = Vec::new();
        for execution in self.stores.executions.find(filter)? {
            let workspace_id = match workspaces.get(&execution.trigger_id) {
                Some(ws) => *ws,
                None => {
                    let ws = self.stores.triggers.get(execution.trigger_id)?.map(|t| t.workspace_id);
                    workspaces.insert(execution.trigger_id, ws);
                    ws
                }
            };
            let Some(workspace_id) = workspace_id else {
                continue;
            };
            if self.can_read(caller, ResourceType::TriggerExecution, execution.id.into(), Some(workspace_id)) {
                visible.push(execution);
            }
        }
        self.paginate(visible, page, |e| e.to_response(hydrate))
    }

    // ---------------------------------------------------------------------
    // Stack components
    // ---------------------------------------------------------------------

    fn component(&self, id: ComponentId) -> PlaneResult<StackComponent> {
        self.stores
            .components
            .get(id)?
            .ok_or_else(|| NotFoundError::Component(id).into())
    }

    fn component_resource(component: &StackComponent) -> PlaneResult<Resource> {
        resource(ResourceType::StackComponent, component.id, component.workspace_id)
    }

    /// Registers a component. Components may be shared (no workspace).
    ///
    /// # Errors
    /// `Forbidden`, `NotFound` (workspace), `Configuration`, `Validation`.
    pub fn register_component(&self, caller: &Caller, request: ComponentRequest) -> PlaneResult<ComponentResponse> {
        request.validate()?;
        let _writes = self.write_guard()?;
        if request.component_type == PluginType::EventSource || request.component_type == PluginType::Action {
            return Err(ConfigurationError::UnknownFlavor {
                plugin_type: request.component_type.to_string(),
                flavor: request.flavor.clone(),
            }
            .into());
        }
        if let Some(ws) = request.workspace_id {
            self.workspace(ws)?;
        }
        self.authorizer.verify(
            caller,
            Verb::Create,
            &Resource::new(ResourceType::StackComponent, None, request.workspace_id)?,
        )?;

        let flavor = self.flavors.get(request.component_type, &request.flavor)?;
        let configuration = flavor.validate(&request.configuration)?;

        let component = StackComponent::from_request(request, configuration);
        self.stores.components.insert(component.clone())?;
        info!(
            component_id = %component.id,
            component_type = %component.component_type,
            flavor = %component.flavor,
            "stack component registered"
        );
        Ok(component.to_response(true))
    }

    /// # Errors
    /// `NotFound`, `Forbidden`.
    pub fn get_component(&self, caller: &Caller, id: ComponentId, hydrate: bool) -> PlaneResult<ComponentResponse> {
        let component = self.component(id)?;
        self.authorize_existing(
            caller,
            Verb::Read,
            &Self::component_resource(&component)?,
            NotFoundError::Component(id),
        )?;
        Ok(component.to_response(hydrate))
    }

    /// # Errors
    /// `Validation` for invalid paging.
    pub fn list_components(
        &self,
        caller: &Caller,
        filter: &ComponentFilter,
        page: PageRequest,
        hydrate: bool,
    ) -> PlaneResult<Page<ComponentResponse>> {
        let visible: Vec<_> = self
            .stores
            .components
            .find(filter)?
            .into_iter()
            .filter(|c| self.can_read(caller, ResourceType::StackComponent, c.id.into(), c.workspace_id))
            .collect();
        self.paginate(visible, page, |c| c.to_response(hydrate))
    }

    /// # Errors
    /// `NotFound`, `Forbidden`.
    pub fn delete_component(&self, caller: &Caller, id: ComponentId) -> PlaneResult<()> {
        let _writes = self.write_guard()?;
        let component = self.component(id)?;
        self.authorize_existing(
            caller,
            Verb::Delete,
            &Self::component_resource(&component)?,
            NotFoundError::Component(id),
        )?;
        self.stores.components.delete(id)?;
        info!(component_id = %id, "stack component deleted");
        Ok(())
    }

    fn can_read(&self, caller: &Caller, resource_type: ResourceType, id: Uuid, workspace_id: Option<WorkspaceId>) -> bool {
        Resource::new(resource_type, Some(id), workspace_id)
            .is_ok_and(|r| self.authorizer.allows(caller, Verb::Read, &r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{document, Document};
    use crate::plugins::PluginSubType;
    use crate::rbac::{AllowAll, PermissionSet};
    use serde_json::json;

    fn admin() -> Caller {
        Caller::admin("root")
    }

    fn plane() -> ControlPlane {
        ControlPlane::in_memory(Arc::new(AllowAll)).unwrap()
    }

    fn workspace(plane: &ControlPlane, name: &str) -> WorkspaceId {
        plane
            .create_workspace(&admin(), WorkspaceRequest::new(name))
            .unwrap()
            .id
    }

    fn webhook(plane: &ControlPlane, ws: WorkspaceId, name: &str) -> EventSourceId {
        plane
            .create_event_source(
                &admin(),
                EventSourceRequest {
                    workspace_id: ws,
                    name: name.to_string(),
                    flavor: "webhook".to_string(),
                    plugin_subtype: PluginSubType::Webhook,
                    configuration: document(json!({"path": "/hooks/github"})),
                    description: String::new(),
                },
            )
            .unwrap()
            .id
    }

    fn inline_action() -> TriggerActionSpec {
        TriggerActionSpec::Inline {
            flavor: "builtin".to_string(),
            subtype: "pipeline_run".to_string(),
            configuration: document(json!({"template_id": Uuid::new_v4().to_string()})),
        }
    }

    fn trigger_request(ws: WorkspaceId, source: EventSourceId, name: &str) -> TriggerRequest {
        TriggerRequest {
            workspace_id: ws,
            name: name.to_string(),
            description: String::new(),
            event_source_id: source,
            event_filter: document(json!({"ref": "main"})),
            action: inline_action(),
        }
    }

    #[test]
    fn workspace_names_are_unique() {
        let plane = plane();
        workspace(&plane, "default");
        let err = plane
            .create_workspace(&admin(), WorkspaceRequest::new("default"))
            .unwrap_err();
        assert_eq!(err.http_status(), 409);
    }

    #[test]
    fn workspace_mutations_require_admin() {
        let plane = plane();
        let err = plane
            .create_workspace(&Caller::user("alice"), WorkspaceRequest::new("mine"))
            .unwrap_err();
        assert!(err.is_forbidden());

        let ws = workspace(&plane, "shared");
        assert!(plane.get_workspace(&Caller::user("alice"), ws, false).is_ok());
        assert!(plane.delete_workspace(&Caller::user("alice"), ws).unwrap_err().is_forbidden());
    }

    #[test]
    fn event_source_subtype_must_match_flavor() {
        let plane = plane();
        let ws = workspace(&plane, "default");
        let err = plane
            .create_event_source(
                &admin(),
                EventSourceRequest {
                    workspace_id: ws,
                    name: "hook".to_string(),
                    flavor: "webhook".to_string(),
                    plugin_subtype: PluginSubType::Schedule,
                    configuration: Document::new(),
                    description: String::new(),
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            PlaneError::Configuration(ConfigurationError::SubtypeMismatch { .. })
        ));
    }

    #[test]
    fn created_event_source_is_registered() {
        let plane = plane();
        let ws = workspace(&plane, "default");
        let source = webhook(&plane, ws, "github");
        assert!(plane.registry().triggers_for(source).unwrap().is_empty());
    }

    #[test]
    fn trigger_rejects_filter_the_source_cannot_compile() {
        let plane = plane();
        let ws = workspace(&plane, "default");
        let source = webhook(&plane, ws, "github");
        let mut request = trigger_request(ws, source, "bad");
        request.event_filter = document(json!({"ref": {"like": "main"}}));
        let err = plane.create_trigger(&admin(), request).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn trigger_needs_an_existing_source() {
        let plane = plane();
        let ws = workspace(&plane, "default");
        let err = plane
            .create_trigger(&admin(), trigger_request(ws, EventSourceId::new(), "orphan"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn trigger_snapshots_referenced_action() {
        let plane = plane();
        let ws = workspace(&plane, "default");
        let source = webhook(&plane, ws, "github");
        let template = Uuid::new_v4().to_string();
        let action = plane
            .create_action(
                &admin(),
                ActionRequest {
                    workspace_id: ws,
                    name: "deploy".to_string(),
                    flavor: "builtin".to_string(),
                    plugin_subtype: PluginSubType::PipelineRun,
                    configuration: document(json!({"template_id": template})),
                    description: String::new(),
                },
            )
            .unwrap();

        let mut request = trigger_request(ws, source, "on-push");
        request.action = TriggerActionSpec::FromAction { action_id: action.id };
        let trigger = plane.create_trigger(&admin(), request).unwrap();

        plane
            .update_action(
                &admin(),
                action.id,
                ActionUpdate {
                    configuration: Some(document(json!({"template_id": Uuid::new_v4().to_string()}))),
                    ..ActionUpdate::default()
                },
            )
            .unwrap();

        let stored = plane.get_trigger(&admin(), trigger.id, true).unwrap();
        let metadata = stored.metadata.unwrap();
        assert_eq!(metadata.action["template_id"], json!(template));
        assert_eq!(stored.body.event_source_flavor, "webhook");
    }

    #[test]
    fn deactivated_trigger_leaves_the_registry() {
        let plane = plane();
        let ws = workspace(&plane, "default");
        let source = webhook(&plane, ws, "github");
        let trigger = plane
            .create_trigger(&admin(), trigger_request(ws, source, "on-push"))
            .unwrap();
        assert!(plane.registry().is_live(source, trigger.id));

        plane
            .update_trigger(
                &admin(),
                trigger.id,
                TriggerUpdate {
                    is_active: Some(false),
                    ..TriggerUpdate::default()
                },
            )
            .unwrap();
        assert!(!plane.registry().is_live(source, trigger.id));
    }

    #[test]
    fn deleting_source_cascades_to_triggers() {
        let plane = plane();
        let ws = workspace(&plane, "default");
        let source = webhook(&plane, ws, "github");
        let trigger = plane
            .create_trigger(&admin(), trigger_request(ws, source, "on-push"))
            .unwrap();

        plane.delete_event_source(&admin(), source).unwrap();
        assert!(plane.get_trigger(&admin(), trigger.id, false).unwrap_err().is_not_found());
        assert!(plane.registry().triggers_for(source).is_err());
    }

    #[test]
    fn registry_is_rebuilt_from_stores() {
        let plane = plane();
        let ws = workspace(&plane, "default");
        let source = webhook(&plane, ws, "github");
        let trigger = plane
            .create_trigger(&admin(), trigger_request(ws, source, "on-push"))
            .unwrap();

        let restarted = ControlPlane::new(
            PlaneConfig::default(),
            FlavorRegistry::builtin(),
            plane.stores().clone(),
            Arc::new(AllowAll),
        )
        .unwrap();
        assert!(restarted.registry().is_live(source, trigger.id));
    }

    #[test]
    fn registry_load_skips_uncompilable_filters() {
        let plane = plane();
        let ws = workspace(&plane, "default");
        let source = webhook(&plane, ws, "github");
        let good = plane
            .create_trigger(&admin(), trigger_request(ws, source, "on-push"))
            .unwrap();
        let stale = Trigger::from_request(
            trigger_request(ws, source, "stale"),
            document(json!({"ref": {"like": "main"}})),
            ActionSnapshot {
                flavor: "builtin".to_string(),
                subtype: "pipeline_run".to_string(),
                configuration: document(json!({"template_id": Uuid::new_v4().to_string()})),
            },
        );
        let stale_id = stale.id;
        plane.stores().triggers.insert(stale).unwrap();

        let restarted = ControlPlane::new(
            PlaneConfig::default(),
            FlavorRegistry::builtin(),
            plane.stores().clone(),
            Arc::new(AllowAll),
        )
        .unwrap();
        assert!(restarted.registry().is_live(source, good.id));
        assert!(!restarted.registry().is_live(source, stale_id));
    }

    #[test]
    fn unreadable_resources_look_missing() {
        let setup = plane();
        let ws = workspace(&setup, "default");
        let source = webhook(&setup, ws, "github");
        let trigger = setup
            .create_trigger(&admin(), trigger_request(ws, source, "on-push"))
            .unwrap();

        let grants = PermissionSet::new().grant_all("alice", ResourceType::Trigger, Some(ws));
        let restricted = ControlPlane::new(
            PlaneConfig::default(),
            FlavorRegistry::builtin(),
            setup.stores().clone(),
            Arc::new(grants),
        )
        .unwrap();
        let alice = Caller::user("alice");

        let hidden = restricted.get_event_source(&alice, source, false).unwrap_err();
        let absent = restricted.get_event_source(&alice, EventSourceId::new(), false).unwrap_err();
        assert!(hidden.is_not_found() && absent.is_not_found());
        assert!(restricted.delete_event_source(&alice, source).unwrap_err().is_not_found());

        assert!(restricted.get_trigger(&alice, trigger.id, false).is_ok());
        let err = restricted
            .create_trigger(&alice, trigger_request(ws, source, "sneaky"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn listings_hide_unreadable_resources() {
        let plane_admin = plane();
        let ws_a = workspace(&plane_admin, "a");
        let ws_b = workspace(&plane_admin, "b");
        webhook(&plane_admin, ws_a, "hook-a");
        webhook(&plane_admin, ws_b, "hook-b");

        let grants = PermissionSet::new().grant_all("alice", ResourceType::EventSource, Some(ws_a));
        let restricted = ControlPlane::new(
            PlaneConfig::default(),
            FlavorRegistry::builtin(),
            plane_admin.stores().clone(),
            Arc::new(grants),
        )
        .unwrap();

        let alice = Caller::user("alice");
        let page = restricted
            .list_event_sources(&alice, &EventSourceFilter::default(), restricted.default_page(), false)
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "hook-a");

        let stats = restricted.workspace_statistics(&alice, ws_b).unwrap();
        assert_eq!(stats.event_sources, 0);
    }

    #[test]
    fn components_are_unique_per_scope_and_type() {
        let plane = plane();
        let request = ComponentRequest {
            workspace_id: None,
            name: "alerts".to_string(),
            component_type: PluginType::Alerter,
            flavor: "smtp_email".to_string(),
            configuration: document(json!({
                "smtp_server": "smtp.example.com",
                "sender_email": "ci@example.com",
                "recipient_email": "team@example.com"
            })),
        };
        let created = plane.register_component(&admin(), request.clone()).unwrap();
        let defaults = created.metadata.unwrap().configuration;
        assert_eq!(defaults["smtp_port"], json!(587));

        let err = plane.register_component(&admin(), request).unwrap_err();
        assert_eq!(err.http_status(), 409);
    }
}
