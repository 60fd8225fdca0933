//! # triggerplane - Event-triggered actions for a pipeline control plane
//!
//! Event sources emit events; triggers bind an event source and a filter to
//! an action. When an event arrives, every live trigger of its source whose
//! filter matches hands its action to an executor, and each successful run is
//! recorded as a trigger execution.
//!
//! ## Core Concepts
//!
//! - **Flavor**: a registered plugin implementation (event source, action or
//!   stack component) that validates its configuration documents
//! - **Trigger**: event source + filter document + action snapshot
//! - **Dispatcher**: matches one event against a registry snapshot and fans
//!   the matching triggers out to the [`ActionExecutor`]
//! - **ControlPlane**: authorized CRUD over workspaces, event sources,
//!   actions, triggers, executions and stack components
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use triggerplane::{AllowAll, Caller, ControlPlane, Event, ExecutionError};
//!
//! let plane = ControlPlane::in_memory(Arc::new(AllowAll))?;
//! let dispatcher = plane.dispatcher(Arc::new(|_: &triggerplane::ActionInvocation| {
//!     Ok::<(), ExecutionError>(())
//! }));
//! let report = dispatcher.dispatch(&Event::new(source_id, payload))?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod ids;
pub mod logging;
pub mod models;
pub mod plugins;
pub mod rbac;
pub mod service;
pub mod storage;

pub use config::{DispatchConfig, LoggingConfig, PaginationConfig, PlaneConfig};
pub use dispatch::{
    ActionExecutor, ActionInvocation, DispatchReport, DispatchState, DispatchWorker, Dispatcher, Event,
    ExecutorRouter, FilterEvaluator, LiveTrigger, TriggerOutcome, TriggerRegistry, TriggerReport,
};
pub use document::{document, Document};
pub use error::{
    ConfigurationError, ExecutionError, NotFoundError, PlaneError, PlaneResult, ValidationError,
};
pub use ids::{ActionId, ComponentId, EventId, EventSourceId, TriggerExecutionId, TriggerId, WorkspaceId};
pub use logging::init_logging;
pub use plugins::{EventSourceFlavor, Flavor, FlavorRegistry, PluginSubType, PluginType};
pub use rbac::{AllowAll, Authorizer, Caller, PermissionSet, Resource, ResourceType};
pub use service::ControlPlane;
pub use storage::{StorageError, Stores};
