//! Event dispatch.
//!
//! One event moves through `Received → Matching → {Dispatching, Skipped} →
//! {Executed, Failed}`. Candidate triggers come from a single registry
//! snapshot taken when dispatch starts and run on their own scoped threads,
//! so a slow or failing trigger never delays or affects its siblings.

use std::fmt;
use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::PlaneResult;
use crate::ids::{EventId, EventSourceId, TriggerExecutionId, TriggerId};
use crate::models::TriggerExecution;
use crate::storage::TriggerExecutionStore;

use super::executor::{ActionExecutor, ActionInvocation};
use super::registry::{LiveTrigger, TriggerRegistry};
use super::Event;

/// Lifecycle state of one event's dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Received,
    Matching,
    /// At least one trigger matched and was handed to the executor.
    Dispatching,
    /// No trigger matched.
    Skipped,
    /// Every dispatched trigger executed and was recorded.
    Executed,
    /// At least one dispatched trigger failed.
    Failed,
}

impl DispatchState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Skipped | Self::Executed | Self::Failed)
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::Matching => "matching",
            Self::Dispatching => "dispatching",
            Self::Skipped => "skipped",
            Self::Executed => "executed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What happened to one candidate trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum TriggerOutcome {
    NoMatch,
    /// The trigger or its source left the live set before dispatch.
    Abandoned,
    Executed(TriggerExecutionId),
    Failed(String),
}

impl TriggerOutcome {
    /// Whether the trigger reached the executor.
    #[must_use]
    pub const fn was_dispatched(&self) -> bool {
        matches!(self, Self::Executed(_) | Self::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerReport {
    pub trigger_id: TriggerId,
    pub outcome: TriggerOutcome,
}

/// Result of dispatching one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub event_id: EventId,
    pub event_source_id: EventSourceId,
    pub state: DispatchState,
    pub triggers: Vec<TriggerReport>,
}

impl DispatchReport {
    /// Ids of the executions recorded for this event.
    #[must_use]
    pub fn executions(&self) -> Vec<TriggerExecutionId> {
        self.triggers
            .iter()
            .filter_map(|t| match t.outcome {
                TriggerOutcome::Executed(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn outcome_of(&self, trigger_id: TriggerId) -> Option<&TriggerOutcome> {
        self.triggers
            .iter()
            .find(|t| t.trigger_id == trigger_id)
            .map(|t| &t.outcome)
    }

    fn summarize(outcomes: &[TriggerReport]) -> DispatchState {
        let dispatched: Vec<_> = outcomes.iter().filter(|t| t.outcome.was_dispatched()).collect();
        if dispatched.is_empty() {
            DispatchState::Skipped
        } else if dispatched
            .iter()
            .any(|t| matches!(t.outcome, TriggerOutcome::Failed(_)))
        {
            DispatchState::Failed
        } else {
            DispatchState::Executed
        }
    }
}

/// Matches events against live triggers and runs their actions.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<TriggerRegistry>,
    executor: Arc<dyn ActionExecutor>,
    executions: Arc<dyn TriggerExecutionStore>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        registry: Arc<TriggerRegistry>,
        executor: Arc<dyn ActionExecutor>,
        executions: Arc<dyn TriggerExecutionStore>,
    ) -> Self {
        Self {
            registry,
            executor,
            executions,
        }
    }

    /// Dispatches one event to every live trigger of its source.
    ///
    /// Per-trigger problems end up in the report; they never abort the event.
    ///
    /// # Errors
    /// `NotFound` if the event's source is not registered, `Internal` if the
    /// registry lock is poisoned.
    pub fn dispatch(&self, event: &Event) -> PlaneResult<DispatchReport> {
        debug!(event_id = %event.id, state = %DispatchState::Received, "event received");

        let snapshot = self.registry.snapshot()?;
        let candidates = snapshot.triggers_for(event.source_id)?;

        debug!(
            event_id = %event.id,
            state = %DispatchState::Matching,
            candidates = candidates.len(),
            "matching triggers"
        );

        let triggers = match candidates.as_slice() {
            [] => Vec::new(),
            [only] => vec![self.handle(event, only)],
            _ => self.fan_out(event, &candidates),
        };

        let state = DispatchReport::summarize(&triggers);
        let report = DispatchReport {
            event_id: event.id,
            event_source_id: event.source_id,
            state,
            triggers,
        };
        info!(
            event_id = %event.id,
            event_source_id = %event.source_id,
            state = %state,
            executions = report.executions().len(),
            "event dispatched"
        );
        Ok(report)
    }

    fn fan_out(&self, event: &Event, candidates: &[LiveTrigger]) -> Vec<TriggerReport> {
        thread::scope(|scope| {
            let handles: Vec<_> = candidates
                .iter()
                .map(|live| (live.trigger.id, scope.spawn(move || self.handle(event, live))))
                .collect();
            handles
                .into_iter()
                .map(|(trigger_id, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        error!(trigger_id = %trigger_id, "trigger worker panicked");
                        TriggerReport {
                            trigger_id,
                            outcome: TriggerOutcome::Failed("trigger worker panicked".to_string()),
                        }
                    })
                })
                .collect()
        })
    }

    fn handle(&self, event: &Event, live: &LiveTrigger) -> TriggerReport {
        TriggerReport {
            trigger_id: live.trigger.id,
            outcome: self.run_trigger(event, live),
        }
    }

    fn run_trigger(&self, event: &Event, live: &LiveTrigger) -> TriggerOutcome {
        let trigger = live.trigger.as_ref();
        if !live.filter.matches(event) {
            return TriggerOutcome::NoMatch;
        }

        if !self.registry.is_live(event.source_id, trigger.id) {
            debug!(trigger_id = %trigger.id, "trigger left the live set before dispatch");
            return TriggerOutcome::Abandoned;
        }

        debug!(trigger_id = %trigger.id, state = %DispatchState::Dispatching, "dispatching action");
        let invocation = ActionInvocation::new(trigger, event);
        if let Err(e) = self.executor.execute(&invocation) {
            warn!(
                trigger_id = %trigger.id,
                action_flavor = %trigger.action_flavor,
                error = %e,
                "action execution failed"
            );
            return TriggerOutcome::Failed(e.to_string());
        }

        let execution = TriggerExecution::new(trigger.id, invocation.event_metadata);
        let execution_id = execution.id;
        match self.executions.insert(execution) {
            Ok(()) => TriggerOutcome::Executed(execution_id),
            Err(e) => {
                // A trigger deleted while its action ran has no row to attach to.
                error!(trigger_id = %trigger.id, error = %e, "failed to record trigger execution");
                TriggerOutcome::Failed(format!("execution not recorded: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcomes: Vec<TriggerOutcome>) -> DispatchState {
        let triggers: Vec<_> = outcomes
            .into_iter()
            .map(|outcome| TriggerReport {
                trigger_id: TriggerId::new(),
                outcome,
            })
            .collect();
        DispatchReport::summarize(&triggers)
    }

    #[test]
    fn nothing_dispatched_is_skipped() {
        assert_eq!(report(vec![]), DispatchState::Skipped);
        assert_eq!(
            report(vec![TriggerOutcome::NoMatch, TriggerOutcome::Abandoned]),
            DispatchState::Skipped
        );
    }

    #[test]
    fn any_failure_marks_the_event_failed() {
        let ok = TriggerOutcome::Executed(TriggerExecutionId::new());
        assert_eq!(report(vec![ok.clone(), TriggerOutcome::NoMatch]), DispatchState::Executed);
        assert_eq!(
            report(vec![ok, TriggerOutcome::Failed("boom".to_string())]),
            DispatchState::Failed
        );
    }

    #[test]
    fn terminal_states() {
        assert!(DispatchState::Skipped.is_terminal());
        assert!(!DispatchState::Dispatching.is_terminal());
        assert_eq!(DispatchState::Matching.to_string(), "matching");
    }
}
