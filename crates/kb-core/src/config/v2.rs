//! Project file version 2: GVKs only, fixed plugin chain, no plugin blobs.

use super::{from_document, to_document, ProjectConfig, Versioned};
use crate::error::{KbError, Result};
use crate::resource::{Gvk, Resource};
use crate::version::ProjectVersion;
use serde::{Deserialize, Serialize};

pub const VERSION: ProjectVersion = ProjectVersion::stable(2);

const PLUGIN_CHAIN: &str = "go.kubebuilder.io/v2";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct V2Config {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    domain: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    multigroup: bool,
    #[serde(rename = "repo", default, skip_serializing_if = "String::is_empty")]
    repository: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    resources: Vec<Gvk>,
    version: ProjectVersion,
}

pub fn new() -> Box<dyn ProjectConfig> {
    Box::new(V2Config {
        domain: String::new(),
        multigroup: false,
        repository: String::new(),
        resources: Vec::new(),
        version: VERSION,
    })
}

impl Versioned for V2Config {
    fn schema_version(&self) -> ProjectVersion {
        self.version
    }
}

impl ProjectConfig for V2Config {
    fn version(&self) -> ProjectVersion {
        self.version
    }

    fn domain(&self) -> &str {
        &self.domain
    }

    fn set_domain(&mut self, domain: &str) -> Result<()> {
        self.domain = domain.to_string();
        Ok(())
    }

    fn repository(&self) -> &str {
        &self.repository
    }

    fn set_repository(&mut self, repository: &str) -> Result<()> {
        self.repository = repository.to_string();
        Ok(())
    }

    fn project_name(&self) -> &str {
        ""
    }

    fn set_project_name(&mut self, _name: &str) -> Result<()> {
        Err(KbError::unsupported(VERSION, "project name"))
    }

    fn cli_version(&self) -> &str {
        ""
    }

    fn set_cli_version(&mut self, _version: &str) -> Result<()> {
        Err(KbError::unsupported(VERSION, "cli version"))
    }

    fn plugin_chain(&self) -> Vec<String> {
        vec![PLUGIN_CHAIN.to_string()]
    }

    fn set_plugin_chain(&mut self, _chain: Vec<String>) -> Result<()> {
        Err(KbError::unsupported(VERSION, "plugin chain"))
    }

    fn is_multi_group(&self) -> bool {
        self.multigroup
    }

    fn set_multi_group(&mut self, multi_group: bool) -> Result<()> {
        self.multigroup = multi_group;
        Ok(())
    }

    fn resources_len(&self) -> usize {
        self.resources.len()
    }

    fn has_resource(&self, gvk: &Gvk) -> bool {
        let gvk = gvk.without_domain();
        self.resources.iter().any(|tracked| gvk.is_equal_to(tracked))
    }

    fn get_resource(&self, gvk: &Gvk) -> Result<Resource> {
        let gvk = gvk.without_domain();
        self.resources
            .iter()
            .find(|tracked| gvk.is_equal_to(tracked))
            .map(Resource::from_gvk)
            .ok_or(KbError::ResourceNotFound(gvk))
    }

    fn get_resources(&self) -> Vec<Resource> {
        self.resources.iter().map(Resource::from_gvk).collect()
    }

    fn add_resource(&mut self, res: Resource) -> Result<()> {
        let gvk = res.gvk().without_domain();
        if !self.has_resource(&gvk) {
            self.resources.push(gvk);
        }
        Ok(())
    }

    // Only the GVK is tracked, so there is nothing to merge.
    fn update_resource(&mut self, res: Resource) -> Result<()> {
        self.add_resource(res)
    }

    fn remove_resource(&mut self, gvk: &Gvk) -> Result<Resource> {
        let gvk = gvk.without_domain();
        let idx = self
            .resources
            .iter()
            .position(|tracked| gvk.is_equal_to(tracked))
            .ok_or_else(|| KbError::ResourceNotFound(gvk.clone()))?;
        Ok(Resource::from_gvk(&self.resources.remove(idx)))
    }

    fn has_group(&self, group: &str) -> bool {
        self.resources
            .iter()
            .any(|r| r.group.eq_ignore_ascii_case(group))
    }

    fn list_crd_versions(&self) -> Vec<String> {
        Vec::new()
    }

    fn list_webhook_versions(&self) -> Vec<String> {
        Vec::new()
    }

    fn plugin_config(&self, _key: &str) -> Result<&serde_json::Value> {
        Err(KbError::unsupported(VERSION, "plugins"))
    }

    fn set_plugin_config(&mut self, _key: &str, _value: serde_json::Value) -> Result<()> {
        Err(KbError::unsupported(VERSION, "plugins"))
    }

    fn remove_plugin_config(&mut self, _key: &str) -> Result<Option<serde_json::Value>> {
        Err(KbError::unsupported(VERSION, "plugins"))
    }

    fn plugin_keys(&self) -> Result<Vec<String>> {
        Err(KbError::unsupported(VERSION, "plugins"))
    }

    fn marshal(&self) -> Result<String> {
        to_document(self)
    }

    fn unmarshal(&mut self, data: &str) -> Result<()> {
        *self = from_document(data, VERSION)?;
        Ok(())
    }
}
