use super::validate_api_version;
use crate::error::{KbError, Result};
use serde::{Deserialize, Serialize};

/// Webhook scaffolding options for a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Webhooks {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub conversion: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub defaulting: bool,
    /// Versions converted to and from this hub version.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spoke: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub validation: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub webhook_version: String,
}

impl Webhooks {
    pub fn validate(&self) -> Result<()> {
        validate_api_version(&self.webhook_version)
            .map_err(|reason| KbError::InvalidResource(format!("invalid webhook version: {reason}")))
    }

    pub fn is_empty(&self) -> bool {
        self.webhook_version.is_empty()
            && !self.defaulting
            && !self.validation
            && !self.conversion
            && self.spoke.is_empty()
    }

    pub fn update(&mut self, other: Option<&Webhooks>) -> Result<()> {
        let Some(other) = other else {
            return Ok(());
        };
        if !other.webhook_version.is_empty() {
            if self.webhook_version.is_empty() {
                self.webhook_version = other.webhook_version.clone();
            } else if self.webhook_version != other.webhook_version {
                return Err(KbError::InvalidResource(format!(
                    "webhook versions do not match: {} vs {}",
                    self.webhook_version, other.webhook_version
                )));
            }
        }
        self.defaulting = self.defaulting || other.defaulting;
        self.validation = self.validation || other.validation;
        self.conversion = self.conversion || other.conversion;
        for spoke in &other.spoke {
            if !self.spoke.contains(spoke) {
                self.spoke.push(spoke.clone());
            }
        }
        Ok(())
    }
}
