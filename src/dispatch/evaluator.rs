//! Filter evaluation.

use std::sync::Arc;

use crate::document::Document;
use crate::error::ConfigurationError;
use crate::plugins::{EventFilter, FlavorRegistry};

use super::Event;

/// Compiles trigger filter documents with the flavor of their event source.
///
/// Compilation happens when a trigger enters the live registry; dispatch only
/// runs the compiled [`EventFilter`].
#[derive(Debug, Clone)]
pub struct FilterEvaluator {
    flavors: Arc<FlavorRegistry>,
}

impl FilterEvaluator {
    #[must_use]
    pub fn new(flavors: Arc<FlavorRegistry>) -> Self {
        Self { flavors }
    }

    /// # Errors
    /// `ConfigurationError` if the flavor is unknown or cannot interpret the
    /// filter document.
    pub fn compile(&self, source_flavor: &str, filter: &Document) -> Result<Box<dyn EventFilter>, ConfigurationError> {
        self.flavors.event_source(source_flavor)?.compile_filter(filter)
    }

    /// One-off evaluation: compiles and runs the filter against `event`.
    ///
    /// # Errors
    /// See [`Self::compile`].
    pub fn matches(&self, event: &Event, source_flavor: &str, filter: &Document) -> Result<bool, ConfigurationError> {
        Ok(self.compile(source_flavor, filter)?.matches(event))
    }
}
