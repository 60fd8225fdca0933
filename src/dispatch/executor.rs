//! Action execution boundary.
//!
//! The executor is an external collaborator: the control plane only hands it
//! an [`ActionInvocation`] and records whether it succeeded.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::document::Document;
use crate::error::ExecutionError;
use crate::ids::TriggerId;
use crate::models::Trigger;

use super::Event;

/// Everything an executor needs to carry out one trigger firing.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionInvocation {
    pub trigger_id: TriggerId,
    pub flavor: String,
    pub subtype: String,
    pub config: Document,
    pub event_metadata: Document,
}

impl ActionInvocation {
    /// Builds the invocation from the trigger's action snapshot.
    #[must_use]
    pub fn new(trigger: &Trigger, event: &Event) -> Self {
        Self {
            trigger_id: trigger.id,
            flavor: trigger.action_flavor.clone(),
            subtype: trigger.action_subtype.clone(),
            config: trigger.action.clone(),
            event_metadata: event.metadata(),
        }
    }
}

/// Carries out actions.
///
/// Implementations must be safe to call from several dispatch threads at once.
pub trait ActionExecutor: Send + Sync {
    /// # Errors
    /// `ExecutionError` if the action could not be carried out.
    fn execute(&self, invocation: &ActionInvocation) -> Result<(), ExecutionError>;
}

impl<F> ActionExecutor for F
where
    F: Fn(&ActionInvocation) -> Result<(), ExecutionError> + Send + Sync,
{
    fn execute(&self, invocation: &ActionInvocation) -> Result<(), ExecutionError> {
        self(invocation)
    }
}

/// Routes invocations to executors by `(flavor, subtype)`.
#[derive(Default, Clone)]
pub struct ExecutorRouter {
    routes: HashMap<(String, String), Arc<dyn ActionExecutor>>,
}

impl fmt::Debug for ExecutorRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.routes.keys().collect();
        keys.sort();
        f.debug_struct("ExecutorRouter").field("routes", &keys).finish()
    }
}

impl ExecutorRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the executor for one flavor/subtype pair.
    #[must_use]
    pub fn route(mut self, flavor: &str, subtype: &str, executor: Arc<dyn ActionExecutor>) -> Self {
        self.routes
            .insert((flavor.to_string(), subtype.to_string()), executor);
        self
    }
}

impl ActionExecutor for ExecutorRouter {
    fn execute(&self, invocation: &ActionInvocation) -> Result<(), ExecutionError> {
        let key = (invocation.flavor.clone(), invocation.subtype.clone());
        let executor = self.routes.get(&key).ok_or_else(|| ExecutionError::Unsupported {
            flavor: invocation.flavor.clone(),
            subtype: invocation.subtype.clone(),
        })?;
        executor.execute(invocation)
    }
}
