//! Stack component flavors shipped with integrations.

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::ConfigurationError;

use super::config::{non_empty, normalize, FlavorConfig};
use super::{ConnectorRequirements, Flavor, PluginType};

const fn enabled() -> bool {
    true
}

const fn default_smtp_port() -> u16 {
    587
}

/// Configuration of the AWS image builder.
///
/// `implicit_container_registry_auth` defaults to true; when disabled the
/// registry credentials are forwarded to the build as environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsImageBuilderConfig {
    pub code_build_project: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default = "enabled")]
    pub implicit_container_registry_auth: bool,
}

impl FlavorConfig for AwsImageBuilderConfig {
    fn check(&self) -> Result<(), ConfigurationError> {
        non_empty("code_build_project", &self.code_build_project)
    }
}

/// AWS CodeBuild image builder.
#[derive(Debug, Default, Clone, Copy)]
pub struct AwsImageBuilderFlavor;

impl Flavor for AwsImageBuilderFlavor {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn plugin_type(&self) -> PluginType {
        PluginType::ImageBuilder
    }

    fn validate(&self, config: &Document) -> Result<Document, ConfigurationError> {
        normalize::<AwsImageBuilderConfig>(config)
    }

    fn connector_requirements(&self) -> Option<ConnectorRequirements> {
        Some(ConnectorRequirements {
            connector_type: "aws".to_string(),
            resource_type: "aws-generic".to_string(),
        })
    }
}

/// Configuration of the SMTP email alerter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmtpEmailAlerterConfig {
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub sender_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub recipient_email: String,
    #[serde(default = "enabled")]
    pub use_tls: bool,
}

impl FlavorConfig for SmtpEmailAlerterConfig {
    fn check(&self) -> Result<(), ConfigurationError> {
        non_empty("smtp_server", &self.smtp_server)?;
        mailbox("sender_email", &self.sender_email)?;
        mailbox("recipient_email", &self.recipient_email)?;
        if self.smtp_port == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "smtp_port".to_string(),
                reason: "0 is not a valid port".to_string(),
            });
        }
        Ok(())
    }
}

/// Shape check of a bare `local@domain` address: one `@`, no whitespace, and
/// a dotted domain. Deliverability is the SMTP server's business.
fn mailbox(field: &str, addr: &str) -> Result<(), ConfigurationError> {
    let well_formed = match addr.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !addr.chars().any(char::is_whitespace)
                && domain.split('.').count() > 1
                && domain.split('.').all(|label| !label.is_empty())
        }
        None => false,
    };
    if !well_formed {
        return Err(ConfigurationError::InvalidValue {
            field: field.to_string(),
            reason: format!("'{addr}' is not an email address"),
        });
    }
    Ok(())
}

/// Alerter that posts messages through an SMTP server.
#[derive(Debug, Default, Clone, Copy)]
pub struct SmtpEmailAlerterFlavor;

impl Flavor for SmtpEmailAlerterFlavor {
    fn name(&self) -> &'static str {
        "smtp_email"
    }

    fn plugin_type(&self) -> PluginType {
        PluginType::Alerter
    }

    fn validate(&self, config: &Document) -> Result<Document, ConfigurationError> {
        normalize::<SmtpEmailAlerterConfig>(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::document;
    use serde_json::json;

    #[test]
    fn aws_image_builder_defaults_implicit_auth() {
        let config = AwsImageBuilderFlavor
            .validate(&document(json!({"code_build_project": "builds"})))
            .unwrap();
        assert_eq!(config["implicit_container_registry_auth"], json!(true));
        assert!(!config.contains_key("region"));
        assert!(AwsImageBuilderFlavor.connector_requirements().is_some());
        assert!(AwsImageBuilderFlavor
            .validate(&document(json!({"code_build_project": " "})))
            .is_err());
    }

    #[test]
    fn smtp_alerter_validates_addresses_and_port() {
        let base = json!({
            "smtp_server": "smtp.example.com",
            "sender_email": "ci@example.com",
            "recipient_email": "team@example.com"
        });
        let config = SmtpEmailAlerterFlavor.validate(&document(base.clone())).unwrap();
        assert_eq!(config["smtp_port"], json!(587));
        assert_eq!(config["use_tls"], json!(true));

        for (field, value) in [
            ("recipient_email", json!("team")),
            ("recipient_email", json!("@example.com")),
            ("sender_email", json!("ci@@example.com")),
            ("sender_email", json!("ci@localhost")),
            ("sender_email", json!("c i@example.com")),
            ("sender_email", json!("ci@example.")),
            ("smtp_port", json!(70000)),
            ("smtp_port", json!(0)),
            ("use_tls", json!("yes")),
        ] {
            let mut bad = document(base.clone());
            bad.insert(field.to_string(), value.clone());
            assert!(SmtpEmailAlerterFlavor.validate(&bad).is_err(), "{field} = {value}");
        }
    }
}
