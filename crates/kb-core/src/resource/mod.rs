//! Tracked API resources and the options used to build them.

mod api;
mod gvk;
mod options;
mod webhooks;

pub use api::Api;
pub use gvk::Gvk;
pub use options::{api_package_path, core_group_domain, ResourceOptions};
pub(crate) use options::is_dns1123_subdomain;
pub use webhooks::Webhooks;

use crate::error::{KbError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Resource
// ---------------------------------------------------------------------------

/// One API type tracked by the project file.
///
/// Fields are declared alphabetically; the serialized document keeps that order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Resource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<Api>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub controller: bool,
    /// Built-in Kubernetes type referenced by the project.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub core: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
    /// Type owned by another project.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub external: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub plural: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhooks: Option<Webhooks>,
}

impl Resource {
    pub fn from_gvk(gvk: &Gvk) -> Self {
        Self {
            group: gvk.group.clone(),
            domain: gvk.domain.clone(),
            version: gvk.version.clone(),
            kind: gvk.kind.clone(),
            ..Default::default()
        }
    }

    pub fn gvk(&self) -> Gvk {
        Gvk::new(&self.group, &self.domain, &self.version, &self.kind)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.group.is_empty() && !is_dns1123_subdomain(&self.group) {
            return Err(KbError::InvalidResource(format!(
                "group '{}' is not a valid DNS-1123 subdomain",
                self.group
            )));
        }
        validate_api_version(&self.version).map_err(KbError::InvalidResource)?;
        if self.kind.is_empty() {
            return Err(KbError::InvalidResource("kind cannot be empty".into()));
        }
        if let Some(api) = &self.api {
            api.validate()?;
        }
        if let Some(webhooks) = self.webhooks.as_ref().filter(|w| !w.is_empty()) {
            webhooks.validate()?;
        }
        Ok(())
    }

    pub fn has_api(&self) -> bool {
        self.api.as_ref().is_some_and(|a| !a.is_empty())
    }

    pub fn has_webhooks(&self) -> bool {
        self.webhooks.as_ref().is_some_and(|w| !w.is_empty())
    }

    pub fn has_defaulting_webhook(&self) -> bool {
        self.webhooks.as_ref().is_some_and(|w| w.defaulting)
    }

    pub fn has_validation_webhook(&self) -> bool {
        self.webhooks.as_ref().is_some_and(|w| w.validation)
    }

    pub fn has_conversion_webhook(&self) -> bool {
        self.webhooks.as_ref().is_some_and(|w| w.conversion)
    }

    pub fn is_regular_plural(&self) -> bool {
        self.plural == regular_plural(&self.kind)
    }

    /// Merge capability flags from `other`, which must describe the same GVK.
    pub fn update(&mut self, other: &Resource) -> Result<()> {
        if !self.gvk().is_equal_to(&other.gvk()) {
            return Err(KbError::InvalidResource(format!(
                "unable to update {} with another resource ({})",
                self.gvk(),
                other.gvk()
            )));
        }

        if self.path.is_empty() {
            self.path = other.path.clone();
        }

        if other.api.is_some() {
            self.api
                .get_or_insert_with(Api::default)
                .update(other.api.as_ref())?;
        }

        self.controller = self.controller || other.controller;

        if other.webhooks.is_some() {
            self.webhooks
                .get_or_insert_with(Webhooks::default)
                .update(other.webhooks.as_ref())?;
        }

        Ok(())
    }

    /// Drop empty sub-structs so they are not written as `{}`.
    pub(crate) fn prune_empty(&mut self) {
        if self.api.as_ref().is_some_and(Api::is_empty) {
            self.api = None;
        }
        if self.webhooks.as_ref().is_some_and(Webhooks::is_empty) {
            self.webhooks = None;
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

static API_VERSION_RE: OnceLock<Regex> = OnceLock::new();

fn api_version_re() -> &'static Regex {
    API_VERSION_RE.get_or_init(|| Regex::new(r"^v\d+(?:alpha\d+|beta\d+)?$").unwrap())
}

pub(crate) fn validate_api_version(version: &str) -> std::result::Result<(), String> {
    if version.is_empty() {
        return Err("version cannot be empty".to_string());
    }
    if !api_version_re().is_match(version) {
        return Err(format!(
            "version must match {} (was {version})",
            api_version_re().as_str()
        ));
    }
    Ok(())
}

/// Kinds whose plural no suffix rule produces.
const IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("tooth", "teeth"),
    ("foot", "feet"),
    ("ox", "oxen"),
    ("datum", "data"),
    ("index", "indices"),
    ("matrix", "matrices"),
    ("vertex", "vertices"),
    ("criterion", "criteria"),
    ("analysis", "analyses"),
    ("leaf", "leaves"),
    ("knife", "knives"),
    ("life", "lives"),
    ("wife", "wives"),
    ("half", "halves"),
    ("quiz", "quizzes"),
];

/// Kinds that are the same in singular and plural.
const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "information",
    "metadata",
    "news",
    "series",
    "species",
    "sheep",
    "fish",
    "endpoints",
];

/// Lower-cased English plural of a kind, e.g. `Policy` -> `policies`.
pub fn regular_plural(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if lower.is_empty() || UNCOUNTABLE.contains(&lower.as_str()) {
        return lower;
    }
    if let Some((_, plural)) = IRREGULAR_PLURALS.iter().find(|(s, _)| *s == lower) {
        return plural.to_string();
    }
    // Compounds such as `SalesPerson` pluralize their last word.
    for (singular, plural) in IRREGULAR_PLURALS.iter().filter(|(s, _)| s.len() > 3) {
        if let Some(stem) = lower.strip_suffix(singular) {
            if kind.get(stem.len()..).is_some_and(|rest| rest.starts_with(|c: char| c.is_uppercase())) {
                return format!("{stem}{plural}");
            }
        }
    }
    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        return format!("{lower}es");
    }
    if let Some(stem) = lower.strip_suffix('y') {
        let before = stem.chars().last();
        if before.is_some_and(|c| !"aeiou".contains(c)) {
            return format!("{stem}ies");
        }
    }
    format!("{lower}s")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn captain() -> Resource {
        Resource {
            group: "crew".into(),
            domain: "test.io".into(),
            version: "v1".into(),
            kind: "Captain".into(),
            ..Default::default()
        }
    }

    #[test]
    fn plurals() {
        assert_eq!(regular_plural("Captain"), "captains");
        assert_eq!(regular_plural("Policy"), "policies");
        assert_eq!(regular_plural("Gateway"), "gateways");
        assert_eq!(regular_plural("Ingress"), "ingresses");
        assert_eq!(regular_plural("Box"), "boxes");
        assert_eq!(regular_plural("Batch"), "batches");
    }

    #[test]
    fn irregular_plurals() {
        assert_eq!(regular_plural("Person"), "people");
        assert_eq!(regular_plural("Child"), "children");
        assert_eq!(regular_plural("Mouse"), "mice");
        assert_eq!(regular_plural("Index"), "indices");
        assert_eq!(regular_plural("SalesPerson"), "salespeople");
        assert_eq!(regular_plural("Series"), "series");
        assert_eq!(regular_plural("Fish"), "fish");
        // Only whole words are irregular.
        assert_eq!(regular_plural("Human"), "humans");
        assert_eq!(regular_plural("Shoebox"), "shoeboxes");
    }

    #[test]
    fn irregular_plural_counts_as_default() {
        let res = Resource {
            kind: "Person".into(),
            plural: "people".into(),
            ..captain()
        };
        assert!(res.is_regular_plural());
        let res = Resource {
            plural: "persons".into(),
            ..res
        };
        assert!(!res.is_regular_plural());
    }

    #[test]
    fn update_requires_same_gvk() {
        let mut res = captain();
        let mut other = captain();
        other.kind = "FirstMate".into();
        assert!(res.update(&other).is_err());
    }

    #[test]
    fn update_merges_capabilities() {
        let mut res = Resource {
            api: Some(Api {
                crd_version: "v1".into(),
                namespaced: true,
            }),
            path: "example.com/api/v1".into(),
            ..captain()
        };
        let other = Resource {
            controller: true,
            webhooks: Some(Webhooks {
                webhook_version: "v1".into(),
                defaulting: true,
                ..Default::default()
            }),
            ..captain()
        };
        res.update(&other).unwrap();
        assert!(res.controller);
        assert!(res.has_api());
        assert!(res.has_defaulting_webhook());
        assert!(!res.has_validation_webhook());
        assert_eq!(res.path, "example.com/api/v1");
    }

    #[test]
    fn update_propagates_api_conflict() {
        let mut res = Resource {
            api: Some(Api {
                crd_version: "v1".into(),
                namespaced: true,
            }),
            ..captain()
        };
        let other = Resource {
            api: Some(Api {
                crd_version: "v1beta1".into(),
                namespaced: true,
            }),
            ..captain()
        };
        assert!(res.update(&other).is_err());
    }

    #[test]
    fn prune_empty_drops_blank_sections() {
        let mut res = Resource {
            api: Some(Api::default()),
            webhooks: Some(Webhooks::default()),
            ..captain()
        };
        res.prune_empty();
        assert!(res.api.is_none());
        assert!(res.webhooks.is_none());
    }

    #[test]
    fn serialized_keys_are_alphabetical() {
        let res = Resource {
            api: Some(Api {
                crd_version: "v1".into(),
                namespaced: true,
            }),
            controller: true,
            path: "example.com/api/v1".into(),
            ..captain()
        };
        let yaml = serde_yaml::to_string(&res).unwrap();
        assert_eq!(
            yaml,
            "api:\n  crdVersion: v1\n  namespaced: true\ncontroller: true\ndomain: test.io\n\
             group: crew\nkind: Captain\npath: example.com/api/v1\nversion: v1\n"
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = serde_yaml::from_str::<Resource>("kind: Captain\nversion: v1\ncolour: red\n");
        assert!(err.is_err());
    }
}
