//! Built-in event-source flavors.
//!
//! These flavors describe and validate event sources; they do not run
//! anything. A schedule source's ticks and a webhook's deliveries are
//! produced elsewhere and handed to the dispatcher as [`Event`]s.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::dispatch::Event;
use crate::document::Document;
use crate::error::ConfigurationError;

use super::config::{normalize, parse_config, FlavorConfig};
use super::filter::{EventFilter, FieldFilter, MatchAll};
use super::{EventSourceFlavor, Flavor, PluginSubType, PluginType};

/// Payload key schedule events carry their schedule name under.
pub const SCHEDULE_NAME_KEY: &str = "schedule_name";

/// Parses a cron expression.
///
/// Five-field expressions (minute first) get a leading seconds field of `0`;
/// six- and seven-field expressions are taken as they are.
///
/// # Errors
/// `InvalidValue` on `cron_expression` when the expression does not parse.
pub fn parse_cron(expr: &str) -> Result<cron::Schedule, ConfigurationError> {
    let expr = expr.trim();
    let full = if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    };
    cron::Schedule::from_str(&full).map_err(|e| ConfigurationError::InvalidValue {
        field: "cron_expression".to_string(),
        reason: format!("'{expr}': {e}"),
    })
}

/// Configuration of a schedule source. One of `cron_expression` and
/// `interval_seconds` is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<FixedOffset>>,
}

impl FlavorConfig for ScheduleConfig {
    fn check(&self) -> Result<(), ConfigurationError> {
        if self.cron_expression.is_none() && self.interval_seconds.is_none() {
            return Err(ConfigurationError::MissingField {
                field: "cron_expression".to_string(),
            });
        }
        if self.interval_seconds == Some(0) {
            return Err(ConfigurationError::InvalidValue {
                field: "interval_seconds".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if let Some(expr) = &self.cron_expression {
            parse_cron(expr)?;
        }
        Ok(())
    }
}

/// Filter of a schedule trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleFilterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_name: Option<String>,
}

/// Time-based event source.
///
/// Filters may narrow events to one `schedule_name`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScheduleEventSourceFlavor;

impl ScheduleEventSourceFlavor {
    /// Builds the payload of one schedule tick.
    #[must_use]
    pub fn tick_payload(schedule_name: &str, tick: chrono::DateTime<chrono::Utc>) -> Document {
        let mut doc = Document::new();
        doc.insert(SCHEDULE_NAME_KEY.to_string(), json!(schedule_name));
        doc.insert("tick".to_string(), json!(tick.to_rfc3339()));
        doc
    }
}

impl Flavor for ScheduleEventSourceFlavor {
    fn name(&self) -> &'static str {
        "schedule"
    }

    fn plugin_type(&self) -> PluginType {
        PluginType::EventSource
    }

    fn subtype(&self) -> Option<PluginSubType> {
        Some(PluginSubType::Schedule)
    }

    fn validate(&self, config: &Document) -> Result<Document, ConfigurationError> {
        normalize::<ScheduleConfig>(config)
    }
}

struct ScheduleNameFilter {
    schedule_name: String,
}

impl EventFilter for ScheduleNameFilter {
    fn matches(&self, event: &Event) -> bool {
        event.payload.get(SCHEDULE_NAME_KEY).and_then(Value::as_str) == Some(self.schedule_name.as_str())
    }
}

impl EventSourceFlavor for ScheduleEventSourceFlavor {
    fn compile_filter(&self, filter: &Document) -> Result<Box<dyn EventFilter>, ConfigurationError> {
        let filter: ScheduleFilterConfig = parse_config(filter).map_err(|e| ConfigurationError::InvalidFilter {
            reason: e.to_string(),
        })?;
        match filter.schedule_name {
            Some(schedule_name) => Ok(Box::new(ScheduleNameFilter { schedule_name })),
            None => Ok(Box::new(MatchAll)),
        }
    }
}

/// Configuration of a webhook source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl FlavorConfig for WebhookConfig {}

/// Inbound HTTP webhook event source.
///
/// Filters are [`FieldFilter`] documents over the delivered payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebhookEventSourceFlavor;

impl Flavor for WebhookEventSourceFlavor {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn plugin_type(&self) -> PluginType {
        PluginType::EventSource
    }

    fn subtype(&self) -> Option<PluginSubType> {
        Some(PluginSubType::Webhook)
    }

    fn validate(&self, config: &Document) -> Result<Document, ConfigurationError> {
        normalize::<WebhookConfig>(config)
    }
}

impl EventSourceFlavor for WebhookEventSourceFlavor {
    fn compile_filter(&self, filter: &Document) -> Result<Box<dyn EventFilter>, ConfigurationError> {
        Ok(Box::new(FieldFilter::compile(filter)?))
    }
}
