//! Project file version 3: full resources, plugin chain and per-plugin blobs.

use super::{dedup_sorted, from_document, to_document, ProjectConfig, Versioned};
use crate::error::{KbError, Result};
use crate::resource::{regular_plural, Gvk, Resource};
use crate::version::ProjectVersion;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub const VERSION: ProjectVersion = ProjectVersion::stable(3);

/// Fields are declared alphabetically; the document keeps that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct V3Config {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    cli_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    domain: String,
    #[serde(
        rename = "layout",
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "string_or_list"
    )]
    plugin_chain: Vec<String>,
    #[serde(rename = "multigroup", default, skip_serializing_if = "std::ops::Not::not")]
    multi_group: bool,
    /// Opaque blobs owned by individual plugins, keyed by resolved plugin key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    plugins: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    project_name: String,
    #[serde(rename = "repo", default, skip_serializing_if = "String::is_empty")]
    repository: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    resources: Vec<Resource>,
    version: ProjectVersion,
}

/// `layout` used to be a single string.
fn string_or_list<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

pub fn new() -> Box<dyn ProjectConfig> {
    Box::new(V3Config {
        cli_version: String::new(),
        domain: String::new(),
        plugin_chain: Vec::new(),
        multi_group: false,
        plugins: BTreeMap::new(),
        project_name: String::new(),
        repository: String::new(),
        resources: Vec::new(),
        version: VERSION,
    })
}

/// Plural is only stored when irregular.
fn normalize_for_storage(mut res: Resource) -> Resource {
    if res.is_regular_plural() {
        res.plural.clear();
    }
    res.prune_empty();
    res
}

fn with_plural(mut res: Resource) -> Resource {
    if res.plural.is_empty() {
        res.plural = regular_plural(&res.kind);
    }
    res
}

impl Versioned for V3Config {
    fn schema_version(&self) -> ProjectVersion {
        self.version
    }
}

impl ProjectConfig for V3Config {
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
        &self.project_name
    }

    fn set_project_name(&mut self, name: &str) -> Result<()> {
        self.project_name = name.to_string();
        Ok(())
    }

    fn cli_version(&self) -> &str {
        &self.cli_version
    }

    fn set_cli_version(&mut self, version: &str) -> Result<()> {
        self.cli_version = version.to_string();
        Ok(())
    }

    fn plugin_chain(&self) -> Vec<String> {
        self.plugin_chain.clone()
    }

    fn set_plugin_chain(&mut self, chain: Vec<String>) -> Result<()> {
        self.plugin_chain = chain;
        Ok(())
    }

    fn is_multi_group(&self) -> bool {
        self.multi_group
    }

    fn set_multi_group(&mut self, multi_group: bool) -> Result<()> {
        self.multi_group = multi_group;
        Ok(())
    }

    fn resources_len(&self) -> usize {
        self.resources.len()
    }

    fn has_resource(&self, gvk: &Gvk) -> bool {
        self.resources.iter().any(|r| gvk.is_equal_to(&r.gvk()))
    }

    fn get_resource(&self, gvk: &Gvk) -> Result<Resource> {
        self.resources
            .iter()
            .find(|r| gvk.is_equal_to(&r.gvk()))
            .cloned()
            .map(with_plural)
            .ok_or_else(|| KbError::ResourceNotFound(gvk.clone()))
    }

    fn get_resources(&self) -> Vec<Resource> {
        self.resources.iter().cloned().map(with_plural).collect()
    }

    fn add_resource(&mut self, res: Resource) -> Result<()> {
        let res = normalize_for_storage(res);
        if !self.has_resource(&res.gvk()) {
            self.resources.push(res);
        }
        Ok(())
    }

    fn update_resource(&mut self, res: Resource) -> Result<()> {
        let res = normalize_for_storage(res);
        let gvk = res.gvk();
        match self.resources.iter_mut().find(|r| gvk.is_equal_to(&r.gvk())) {
            Some(existing) => {
                existing.update(&res)?;
                existing.prune_empty();
            }
            None => self.resources.push(res),
        }
        Ok(())
    }

    fn remove_resource(&mut self, gvk: &Gvk) -> Result<Resource> {
        let idx = self
            .resources
            .iter()
            .position(|r| gvk.is_equal_to(&r.gvk()))
            .ok_or_else(|| KbError::ResourceNotFound(gvk.clone()))?;
        Ok(with_plural(self.resources.remove(idx)))
    }

    fn has_group(&self, group: &str) -> bool {
        self.resources
            .iter()
            .any(|r| r.group.eq_ignore_ascii_case(group))
    }

    fn list_crd_versions(&self) -> Vec<String> {
        dedup_sorted(
            self.resources
                .iter()
                .filter_map(|r| r.api.as_ref())
                .filter(|api| !api.crd_version.is_empty())
                .map(|api| api.crd_version.clone())
                .collect(),
        )
    }

    fn list_webhook_versions(&self) -> Vec<String> {
        dedup_sorted(
            self.resources
                .iter()
                .filter_map(|r| r.webhooks.as_ref())
                .filter(|w| !w.webhook_version.is_empty())
                .map(|w| w.webhook_version.clone())
                .collect(),
        )
    }

    fn plugin_config(&self, key: &str) -> Result<&serde_json::Value> {
        self.plugins
            .get(key)
            .ok_or_else(|| KbError::PluginKeyNotFound(key.to_string()))
    }

    fn set_plugin_config(&mut self, key: &str, value: serde_json::Value) -> Result<()> {
        self.plugins.insert(key.to_string(), value);
        Ok(())
    }

    fn remove_plugin_config(&mut self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.plugins.remove(key))
    }

    fn plugin_keys(&self) -> Result<Vec<String>> {
        Ok(self.plugins.keys().cloned().collect())
    }

    fn marshal(&self) -> Result<String> {
        let mut doc = self.clone();
        for res in &mut doc.resources {
            res.prune_empty();
        }
        to_document(&doc)
    }

    fn unmarshal(&mut self, data: &str) -> Result<()> {
        *self = from_document(data, VERSION)?;
        Ok(())
    }
}
