//! Built-in action flavors.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::Document;
use crate::error::ConfigurationError;

use super::config::{normalize, FlavorConfig};
use super::{Flavor, PluginSubType, PluginType};

/// Configuration of a pipeline-run action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineRunConfig {
    pub template_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_config: Option<Document>,
}

impl FlavorConfig for PipelineRunConfig {}

/// Runs a pipeline from a stored run template.
#[derive(Debug, Default, Clone, Copy)]
pub struct PipelineRunActionFlavor;

impl Flavor for PipelineRunActionFlavor {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn plugin_type(&self) -> PluginType {
        PluginType::Action
    }

    fn subtype(&self) -> Option<PluginSubType> {
        Some(PluginSubType::PipelineRun)
    }

    fn validate(&self, config: &Document) -> Result<Document, ConfigurationError> {
        normalize::<PipelineRunConfig>(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::document;
    use serde_json::json;

    #[test]
    fn template_id_must_be_a_uuid() {
        let flavor = PipelineRunActionFlavor;
        let template = Uuid::new_v4();
        let config = flavor
            .validate(&document(json!({"template_id": template.to_string()})))
            .unwrap();
        assert_eq!(config["template_id"], json!(template.to_string()));

        let err = flavor
            .validate(&document(json!({"template_id": "nightly"})))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidDocument { .. }));
        assert!(flavor.validate(&Document::new()).is_err());
    }

    #[test]
    fn run_config_must_be_an_object() {
        let flavor = PipelineRunActionFlavor;
        let template = Uuid::new_v4().to_string();
        assert!(flavor
            .validate(&document(json!({"template_id": template, "run_config": {"steps": {}}})))
            .is_ok());
        assert!(flavor
            .validate(&document(json!({"template_id": template, "run_config": [1]})))
            .is_err());
    }
}
