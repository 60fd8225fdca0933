//! Plugin flavors.
//!
//! A flavor is a named concrete implementation of a pluggable component:
//! an event source type, an action type or a stack component type. Flavors
//! are registered once at startup in a [`FlavorRegistry`]; nothing is looked
//! up by class name at runtime.

pub mod actions;
pub mod components;
pub mod config;
pub mod event_sources;
pub mod filter;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::ConfigurationError;

pub use actions::{PipelineRunActionFlavor, PipelineRunConfig};
pub use components::{AwsImageBuilderConfig, AwsImageBuilderFlavor, SmtpEmailAlerterConfig, SmtpEmailAlerterFlavor};
pub use config::{normalize, parse_config, FlavorConfig};
pub use event_sources::{
    ScheduleConfig, ScheduleEventSourceFlavor, ScheduleFilterConfig, WebhookConfig, WebhookEventSourceFlavor,
};
pub use filter::{EventFilter, FieldFilter, MatchAll};

/// Kind of pluggable component a flavor implements.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginType {
    EventSource,
    Action,
    ImageBuilder,
    Alerter,
}

impl PluginType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EventSource => "event_source",
            Self::Action => "action",
            Self::ImageBuilder => "image_builder",
            Self::Alerter => "alerter",
        }
    }
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subtype of event-source and action plugins.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginSubType {
    Webhook,
    Schedule,
    PipelineRun,
}

impl PluginSubType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Schedule => "schedule",
            Self::PipelineRun => "pipeline_run",
        }
    }
}

impl fmt::Display for PluginSubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service connector a flavor needs to reach its backing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorRequirements {
    pub connector_type: String,
    pub resource_type: String,
}

/// Common contract of every flavor.
pub trait Flavor: Send + Sync {
    /// Registry name of the flavor.
    fn name(&self) -> &'static str;

    fn plugin_type(&self) -> PluginType;

    /// Subtype, for event-source and action flavors.
    fn subtype(&self) -> Option<PluginSubType> {
        None
    }

    /// Validates a configuration and returns it normalized, usually by
    /// passing it through the flavor's [`FlavorConfig`] type.
    ///
    /// # Errors
    /// Any `ConfigurationError` raised while parsing or checking.
    fn validate(&self, config: &Document) -> Result<Document, ConfigurationError>;

    fn connector_requirements(&self) -> Option<ConnectorRequirements> {
        None
    }
}

/// Event-source flavors additionally own the filter language of their events.
pub trait EventSourceFlavor: Flavor {
    /// Compiles a trigger filter document.
    ///
    /// # Errors
    /// `ConfigurationError` when the filter cannot be interpreted.
    fn compile_filter(&self, filter: &Document) -> Result<Box<dyn EventFilter>, ConfigurationError>;
}

/// Startup-time mapping from flavor name to implementation.
#[derive(Default, Clone)]
pub struct FlavorRegistry {
    event_sources: BTreeMap<String, Arc<dyn EventSourceFlavor>>,
    flavors: BTreeMap<(PluginType, String), Arc<dyn Flavor>>,
}

impl fmt::Debug for FlavorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlavorRegistry")
            .field("event_sources", &self.event_sources.keys().collect::<Vec<_>>())
            .field("flavors", &self.flavors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FlavorRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in flavor.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register_event_source(Arc::new(ScheduleEventSourceFlavor));
        registry.register_event_source(Arc::new(WebhookEventSourceFlavor));
        registry.register(Arc::new(PipelineRunActionFlavor));
        registry.register(Arc::new(AwsImageBuilderFlavor));
        registry.register(Arc::new(SmtpEmailAlerterFlavor));
        registry
    }

    /// Registers an event-source flavor (replacing one with the same name).
    pub fn register_event_source(&mut self, flavor: Arc<dyn EventSourceFlavor>) {
        let name = flavor.name().to_string();
        self.event_sources.insert(name, flavor);
    }

    /// Registers a non-event-source flavor (replacing one with the same name).
    pub fn register(&mut self, flavor: Arc<dyn Flavor>) {
        let key = (flavor.plugin_type(), flavor.name().to_string());
        self.flavors.insert(key, flavor);
    }

    /// Looks up an event-source flavor.
    ///
    /// # Errors
    /// `UnknownFlavor` when nothing is registered under `name`.
    pub fn event_source(&self, name: &str) -> Result<Arc<dyn EventSourceFlavor>, ConfigurationError> {
        self.event_sources
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownFlavor {
                plugin_type: PluginType::EventSource.to_string(),
                flavor: name.to_string(),
            })
    }

    /// Looks up a flavor of any other plugin type.
    ///
    /// # Errors
    /// `UnknownFlavor` when nothing is registered under `(plugin_type, name)`.
    pub fn get(&self, plugin_type: PluginType, name: &str) -> Result<Arc<dyn Flavor>, ConfigurationError> {
        self.flavors
            .get(&(plugin_type, name.to_string()))
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownFlavor {
                plugin_type: plugin_type.to_string(),
                flavor: name.to_string(),
            })
    }

    /// Looks up an action flavor and checks it provides `subtype`.
    ///
    /// # Errors
    /// `UnknownFlavor` or `SubtypeMismatch`.
    pub fn action(&self, name: &str, subtype: &str) -> Result<Arc<dyn Flavor>, ConfigurationError> {
        let flavor = self.get(PluginType::Action, name)?;
        if flavor.subtype().map(PluginSubType::as_str) != Some(subtype) {
            return Err(ConfigurationError::SubtypeMismatch {
                flavor: name.to_string(),
                subtype: subtype.to_string(),
            });
        }
        Ok(flavor)
    }

    /// Names of the registered flavors of one plugin type.
    #[must_use]
    pub fn names(&self, plugin_type: PluginType) -> Vec<&str> {
        if plugin_type == PluginType::EventSource {
            return self.event_sources.keys().map(String::as_str).collect();
        }
        self.flavors
            .keys()
            .filter(|(t, _)| *t == plugin_type)
            .map(|(_, name)| name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_lists_flavors_per_type() {
        let registry = FlavorRegistry::builtin();
        assert_eq!(registry.names(PluginType::EventSource), vec!["schedule", "webhook"]);
        assert_eq!(registry.names(PluginType::Action), vec!["builtin"]);
        assert_eq!(registry.names(PluginType::ImageBuilder), vec!["aws"]);
        assert_eq!(registry.names(PluginType::Alerter), vec!["smtp_email"]);
    }

    #[test]
    fn unknown_flavor_is_a_configuration_error() {
        let registry = FlavorRegistry::builtin();
        let err = registry.event_source("kafka").err().unwrap();
        assert!(matches!(err, ConfigurationError::UnknownFlavor { .. }));
        assert!(registry.get(PluginType::Alerter, "slack").is_err());
    }

    #[test]
    fn action_lookup_checks_subtype() {
        let registry = FlavorRegistry::builtin();
        assert!(registry.action("builtin", "pipeline_run").is_ok());
        let err = registry.action("builtin", "webhook").err().unwrap();
        assert!(matches!(err, ConfigurationError::SubtypeMismatch { .. }));
    }
}
