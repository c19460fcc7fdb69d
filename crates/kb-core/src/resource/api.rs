use super::validate_api_version;
use crate::error::{KbError, Result};
use serde::{Deserialize, Serialize};

/// CRD scaffolding options for a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Api {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub crd_version: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub namespaced: bool,
}

impl Api {
    pub fn validate(&self) -> Result<()> {
        validate_api_version(&self.crd_version)
            .map_err(|reason| KbError::InvalidResource(format!("invalid CRD version: {reason}")))
    }

    pub fn is_empty(&self) -> bool {
        self.crd_version.is_empty() && !self.namespaced
    }

    /// Merge `other` into `self`. The CRD version may be set once; `namespaced` only turns on.
    pub fn update(&mut self, other: Option<&Api>) -> Result<()> {
        let Some(other) = other else {
            return Ok(());
        };
        if !other.crd_version.is_empty() {
            if self.crd_version.is_empty() {
                self.crd_version = other.crd_version.clone();
            } else if self.crd_version != other.crd_version {
                return Err(KbError::InvalidResource(format!(
                    "CRD versions do not match: {} vs {}",
                    self.crd_version, other.crd_version
                )));
            }
        }
        self.namespaced = self.namespaced || other.namespaced;
        Ok(())
    }
}
