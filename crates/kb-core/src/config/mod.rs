//! The versioned project file.
//!
//! Each schema version has its own implementation of [`ProjectConfig`]. The
//! version is read first and the matching constructor is looked up in a
//! static table, so callers never branch on the version themselves.
//! Capabilities a schema lacks return [`KbError::UnsupportedField`].

pub mod v2;
pub mod v3;

use crate::error::{KbError, Result};
use crate::resource::{Gvk, Resource};
use crate::version::ProjectVersion;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

pub trait ProjectConfig: fmt::Debug + Send {
    fn version(&self) -> ProjectVersion;

    fn domain(&self) -> &str;
    fn set_domain(&mut self, domain: &str) -> Result<()>;

    fn repository(&self) -> &str;
    fn set_repository(&mut self, repository: &str) -> Result<()>;

    /// Empty when the schema does not record a project name.
    fn project_name(&self) -> &str;
    fn set_project_name(&mut self, name: &str) -> Result<()>;

    /// Generator release that last scaffolded the project; empty when unknown.
    fn cli_version(&self) -> &str;
    fn set_cli_version(&mut self, version: &str) -> Result<()>;

    fn plugin_chain(&self) -> Vec<String>;
    fn set_plugin_chain(&mut self, chain: Vec<String>) -> Result<()>;

    fn is_multi_group(&self) -> bool;
    fn set_multi_group(&mut self, multi_group: bool) -> Result<()>;

    // -- resources ----------------------------------------------------------

    fn resources_len(&self) -> usize;
    fn has_resource(&self, gvk: &Gvk) -> bool;
    fn get_resource(&self, gvk: &Gvk) -> Result<Resource>;
    fn get_resources(&self) -> Vec<Resource>;
    /// Track `res` unless its GVK is already tracked, in which case this is a no-op.
    fn add_resource(&mut self, res: Resource) -> Result<()>;
    /// Track `res`, merging its capabilities into an existing entry with the same GVK.
    fn update_resource(&mut self, res: Resource) -> Result<()>;
    fn remove_resource(&mut self, gvk: &Gvk) -> Result<Resource>;
    fn has_group(&self, group: &str) -> bool;
    fn list_crd_versions(&self) -> Vec<String>;
    fn list_webhook_versions(&self) -> Vec<String>;

    // -- per-plugin blobs ---------------------------------------------------

    fn plugin_config(&self, key: &str) -> Result<&serde_json::Value>;
    fn set_plugin_config(&mut self, key: &str, value: serde_json::Value) -> Result<()>;
    fn remove_plugin_config(&mut self, key: &str) -> Result<Option<serde_json::Value>>;
    fn plugin_keys(&self) -> Result<Vec<String>>;

    // -- codec --------------------------------------------------------------

    fn marshal(&self) -> Result<String>;
    /// Strictly decode `data`; unknown fields are errors.
    fn unmarshal(&mut self, data: &str) -> Result<()>;
}

/// Read a plugin's blob into its private type.
pub fn decode_plugin_config<T: DeserializeOwned>(cfg: &dyn ProjectConfig, key: &str) -> Result<T> {
    let value = cfg.plugin_config(key)?;
    serde_json::from_value(value.clone())
        .map_err(|e| KbError::Decode(format!("plugin config for '{key}': {e}")))
}

/// Store a plugin's private type as its blob, replacing any previous one.
pub fn encode_plugin_config<T: Serialize>(
    cfg: &mut dyn ProjectConfig,
    key: &str,
    value: &T,
) -> Result<()> {
    let value = serde_json::to_value(value)?;
    cfg.set_plugin_config(key, value)
}

// ---------------------------------------------------------------------------
// Schema registry
// ---------------------------------------------------------------------------

type Constructor = fn() -> Box<dyn ProjectConfig>;

const SCHEMAS: &[(ProjectVersion, Constructor)] = &[
    (v2::VERSION, v2::new),
    (v3::VERSION, v3::new),
];

/// Empty project file for `version`.
pub fn new_config(version: ProjectVersion) -> Result<Box<dyn ProjectConfig>> {
    SCHEMAS
        .iter()
        .find(|(v, _)| *v == version)
        .map(|(_, ctor)| ctor())
        .ok_or_else(|| KbError::UnknownVersion(version.to_string()))
}

pub fn registered_versions() -> Vec<ProjectVersion> {
    SCHEMAS.iter().map(|(v, _)| *v).collect()
}

pub const DEFAULT_VERSION: ProjectVersion = v3::VERSION;

#[derive(Deserialize)]
struct VersionHeader {
    version: Option<ProjectVersion>,
}

/// Decode a project document, choosing the schema from its `version` field.
pub fn decode(data: &str) -> Result<Box<dyn ProjectConfig>> {
    let header: VersionHeader = serde_yaml::from_str(data)
        .map_err(|e| KbError::Decode(format!("unable to determine config version: {e}")))?;
    let version = header
        .version
        .ok_or_else(|| KbError::Decode("missing 'version' field".to_string()))?;
    let mut cfg = new_config(version).map_err(|e| KbError::Decode(e.to_string()))?;
    cfg.unmarshal(data)?;
    Ok(cfg)
}

// ---------------------------------------------------------------------------
// Shared codec helpers
// ---------------------------------------------------------------------------

/// Serialize with the top-level `version` value double-quoted, the form the
/// project file has always been written in.
pub(crate) fn to_document<T: Serialize>(value: &T) -> Result<String> {
    let raw = serde_yaml::to_string(value)?;
    let mut out = String::with_capacity(raw.len());
    for line in raw.lines() {
        match line
            .strip_prefix("version: '")
            .and_then(|rest| rest.strip_suffix('\''))
        {
            Some(v) => {
                out.push_str("version: \"");
                out.push_str(v);
                out.push('"');
            }
            None => out.push_str(line),
        }
        out.push('\n');
    }
    Ok(out)
}

pub(crate) fn from_document<T: DeserializeOwned>(data: &str, expected: ProjectVersion) -> Result<T>
where
    T: Versioned,
{
    let decoded: T = serde_yaml::from_str(data).map_err(|e| KbError::Decode(e.to_string()))?;
    if decoded.schema_version() != expected {
        return Err(KbError::Decode(format!(
            "document version {} does not match schema version {expected}",
            decoded.schema_version()
        )));
    }
    Ok(decoded)
}

pub(crate) trait Versioned {
    fn schema_version(&self) -> ProjectVersion;
}

pub(crate) fn dedup_sorted(mut versions: Vec<String>) -> Vec<String> {
    versions.sort();
    versions.dedup();
    versions
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Toggles {
        image: String,
        #[serde(default)]
        replicas: u32,
    }

    #[test]
    fn registry_knows_both_schemas() {
        assert_eq!(
            registered_versions(),
            vec![ProjectVersion::stable(2), ProjectVersion::stable(3)]
        );
        assert!(new_config("4".parse().unwrap()).is_err());
    }

    #[test]
    fn decode_dispatches_on_version() {
        let cfg = decode("domain: my.domain\nrepo: myrepo\nversion: \"2\"\n").unwrap();
        assert_eq!(cfg.version(), ProjectVersion::stable(2));
        assert_eq!(cfg.domain(), "my.domain");

        let cfg = decode("layout:\n- go.kubebuilder.io/v4\nprojectName: demo\nversion: \"3\"\n").unwrap();
        assert_eq!(cfg.version(), ProjectVersion::stable(3));
        assert_eq!(cfg.project_name(), "demo");
    }

    #[test]
    fn decode_rejects_unknown_and_missing_versions() {
        for doc in [
            "version: \"7\"\n",
            "version: banana\n",
            "domain: my.domain\n",
            "::: not yaml",
            "",
        ] {
            let err = decode(doc).unwrap_err();
            assert!(err.is_decode(), "expected decode error for {doc:?}, got {err}");
        }
    }

    #[test]
    fn decode_is_strict() {
        let err = decode("domian: typo.io\nversion: \"3\"\n").unwrap_err();
        assert!(matches!(err, KbError::Decode(_)));
    }

    #[test]
    fn plugin_blob_roundtrip_through_helpers() {
        let mut cfg = new_config(DEFAULT_VERSION).unwrap();
        let toggles = Toggles {
            image: "busybox:1.36".into(),
            replicas: 2,
        };
        encode_plugin_config(cfg.as_mut(), "example.io/v1", &toggles).unwrap();
        let back: Toggles = decode_plugin_config(cfg.as_ref(), "example.io/v1").unwrap();
        assert_eq!(back, toggles);
    }

    #[test]
    fn plugin_blob_unsupported_on_v2() {
        let mut cfg = new_config(ProjectVersion::stable(2)).unwrap();
        let err = encode_plugin_config(
            cfg.as_mut(),
            "example.io/v1",
            &Toggles {
                image: "x".into(),
                replicas: 0,
            },
        )
        .unwrap_err();
        assert!(err.is_unsupported_field());
        let err = decode_plugin_config::<Toggles>(cfg.as_ref(), "example.io/v1").unwrap_err();
        assert!(err.is_unsupported_field());
    }
}
