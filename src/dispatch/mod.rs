//! Trigger matching and action dispatch.
//!
//! Events from an event source are matched against the live triggers of that
//! source; every matching trigger's action goes to the [`ActionExecutor`] and
//! each success is recorded as a trigger execution.

/// Per-event dispatch and outcome reporting.
pub mod dispatcher;
/// Filter compilation for live triggers.
pub mod evaluator;
/// Event type.
pub mod event;
/// Action executor boundary.
pub mod executor;
/// Live trigger registry.
pub mod registry;
/// Background dispatch thread.
pub mod worker;

pub use dispatcher::{DispatchReport, DispatchState, Dispatcher, TriggerOutcome, TriggerReport};
pub use evaluator::FilterEvaluator;
pub use event::Event;
pub use executor::{ActionExecutor, ActionInvocation, ExecutorRouter};
pub use registry::{LiveTrigger, RegistrySnapshot, TriggerRegistry};
pub use worker::DispatchWorker;
