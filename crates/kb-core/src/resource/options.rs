use super::{regular_plural, validate_api_version, Api, Gvk, Resource};
use crate::config::ProjectConfig;
use crate::error::{KbError, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Groups served by Kubernetes itself, with the domain they live under.
const CORE_GROUPS: &[(&str, &str)] = &[
    ("admission", "k8s.io"),
    ("admissionregistration", "k8s.io"),
    ("apps", ""),
    ("auditregistration", "k8s.io"),
    ("apiextensions", "k8s.io"),
    ("authentication", "k8s.io"),
    ("authorization", "k8s.io"),
    ("autoscaling", ""),
    ("batch", ""),
    ("certificates", "k8s.io"),
    ("coordination", "k8s.io"),
    ("core", ""),
    ("events", "k8s.io"),
    ("extensions", ""),
    ("imagepolicy", "k8s.io"),
    ("networking", "k8s.io"),
    ("node", "k8s.io"),
    ("metrics", "k8s.io"),
    ("policy", ""),
    ("rbac.authorization", "k8s.io"),
    ("scheduling", "k8s.io"),
    ("setting", "k8s.io"),
    ("storage", "k8s.io"),
];

pub fn core_group_domain(group: &str) -> Option<&'static str> {
    CORE_GROUPS
        .iter()
        .find(|(g, _)| *g == group)
        .map(|(_, domain)| *domain)
}

/// Import path of the generated API package for a project type.
pub fn api_package_path(repo: &str, group: &str, version: &str, multi_group: bool) -> String {
    if multi_group && !group.is_empty() {
        format!("{repo}/api/{group}/{version}")
    } else {
        format!("{repo}/api/{version}")
    }
}

static DNS1123_SUBDOMAIN_RE: OnceLock<Regex> = OnceLock::new();
static DNS1035_LABEL_RE: OnceLock<Regex> = OnceLock::new();

pub(crate) fn is_dns1123_subdomain(s: &str) -> bool {
    let re = DNS1123_SUBDOMAIN_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").unwrap()
    });
    !s.is_empty() && s.len() <= 253 && re.is_match(s)
}

fn is_dns1035_label(s: &str) -> bool {
    let re = DNS1035_LABEL_RE.get_or_init(|| Regex::new(r"^[a-z]([-a-z0-9]*[a-z0-9])?$").unwrap());
    !s.is_empty() && s.len() <= 63 && re.is_match(s)
}

/// User-supplied input for a `create api` / `create webhook` run.
#[derive(Debug, Clone, Default)]
pub struct ResourceOptions {
    pub group: String,
    /// Overrides the project domain, e.g. for types owned by another project.
    pub domain: Option<String>,
    pub version: String,
    pub kind: String,
    pub plural: Option<String>,
    pub namespaced: bool,
    pub crd_version: String,
    pub external_path: Option<String>,
}

impl ResourceOptions {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(KbError::InvalidResource(msg));

        if self.group.starts_with('-') || self.group.is_empty() {
            return invalid("group cannot be empty".into());
        }
        if self.version.starts_with('-') || self.version.is_empty() {
            return invalid("version cannot be empty".into());
        }
        if self.kind.starts_with('-') || self.kind.is_empty() {
            return invalid("kind cannot be empty".into());
        }
        if !is_dns1123_subdomain(&self.group) {
            return invalid(format!(
                "group name '{}' is not a valid DNS-1123 subdomain",
                self.group
            ));
        }
        if let Err(reason) = validate_api_version(&self.version) {
            return invalid(reason);
        }
        if !self.kind.starts_with(|c: char| c.is_ascii_uppercase()) {
            return invalid(format!(
                "kind '{}' must start with an uppercase character",
                self.kind
            ));
        }
        if !is_dns1035_label(&self.kind.to_lowercase()) {
            return invalid(format!("kind '{}' is not a valid DNS-1035 label", self.kind));
        }
        if let Some(plural) = &self.plural {
            if !is_dns1123_subdomain(plural) {
                return invalid(format!("plural '{plural}' is not a valid DNS-1123 subdomain"));
            }
        }
        Ok(())
    }

    fn is_core(&self, cfg: &dyn ProjectConfig) -> Option<&'static str> {
        if self.domain.is_some() || self.external_path.is_some() {
            return None;
        }
        core_group_domain(&self.group).filter(|_| !cfg.has_resource(&self.gvk(cfg.domain())))
    }

    pub fn gvk(&self, project_domain: &str) -> Gvk {
        Gvk::new(
            &self.group,
            self.domain.as_deref().unwrap_or(project_domain),
            &self.version,
            &self.kind,
        )
    }

    /// Build the resource a `create api` run would track.
    ///
    /// `do_api` is false when only a controller is scaffolded; a well-known
    /// core group then resolves to the upstream `k8s.io/api` package.
    pub fn new_resource(&self, cfg: &dyn ProjectConfig, do_api: bool) -> Resource {
        let plural = self
            .plural
            .clone()
            .unwrap_or_else(|| regular_plural(&self.kind));

        let mut res = Resource::from_gvk(&self.gvk(cfg.domain()));
        res.plural = plural;

        if let Some(path) = &self.external_path {
            res.external = true;
            res.path = path.clone();
        } else if let (false, Some(core_domain)) = (do_api, self.is_core(cfg)) {
            res.core = true;
            res.domain = core_domain.to_string();
            res.path = format!("k8s.io/api/{}/{}", self.group, self.version);
        } else if do_api {
            res.path =
                api_package_path(cfg.repository(), &self.group, &self.version, cfg.is_multi_group());
        } else if let Ok(existing) = cfg.get_resource(&res.gvk()) {
            res.path = existing.path;
        }

        if do_api {
            res.api = Some(Api {
                crd_version: self.crd_version.clone(),
                namespaced: self.namespaced,
            });
        }
        res
    }
}
