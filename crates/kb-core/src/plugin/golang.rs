//! The base Go layout plugin, `go.kubebuilder.io`.

use super::{HookContext, InitOptions, Plugin};
use crate::error::{KbError, Result};
use crate::resource::{is_dns1123_subdomain, Resource};
use crate::version::{PluginVersion, ProjectVersion, Stage};
use tracing::info;

pub const NAME: &str = "go.kubebuilder.io";

#[derive(Debug, Clone)]
pub struct GoPlugin {
    version: PluginVersion,
    project_versions: Vec<ProjectVersion>,
    /// API version used for CRDs and webhook configurations when none is given.
    default_api_version: &'static str,
}

impl GoPlugin {
    /// Legacy layout for version 2 project files.
    pub fn v2() -> Self {
        Self {
            version: PluginVersion::new(2, Stage::Stable),
            project_versions: vec![ProjectVersion::stable(2)],
            default_api_version: "v1beta1",
        }
    }

    pub fn v4() -> Self {
        Self {
            version: PluginVersion::new(4, Stage::Stable),
            project_versions: vec![ProjectVersion::stable(3)],
            default_api_version: "v1",
        }
    }
}

impl Plugin for GoPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> PluginVersion {
        self.version
    }

    fn supported_project_versions(&self) -> Vec<ProjectVersion> {
        self.project_versions.clone()
    }

    fn inject_resource(&self, res: &mut Resource) -> Result<()> {
        if let Some(api) = res.api.as_mut() {
            if api.crd_version.is_empty() {
                api.crd_version = self.default_api_version.to_string();
            }
        }
        if let Some(webhooks) = res.webhooks.as_mut() {
            if webhooks.webhook_version.is_empty() {
                webhooks.webhook_version = self.default_api_version.to_string();
            }
        }
        Ok(())
    }

    fn init(&self, ctx: &mut HookContext<'_>, opts: &InitOptions) -> Result<()> {
        if !is_dns1123_subdomain(&opts.domain) {
            return Err(KbError::InvalidResource(format!(
                "domain '{}' is not a valid DNS-1123 subdomain",
                opts.domain
            )));
        }
        if opts.repository.is_empty() {
            return Err(KbError::InvalidResource(
                "repository is required, e.g. --repo github.com/example/project".into(),
            ));
        }

        let cfg = &mut *ctx.config;
        cfg.set_domain(&opts.domain)?;
        cfg.set_repository(&opts.repository)?;
        cfg.set_multi_group(opts.multi_group)?;
        if !opts.project_name.is_empty() {
            match cfg.set_project_name(&opts.project_name) {
                Err(e) if e.is_unsupported_field() => {}
                other => other?,
            }
        }
        info!(domain = %opts.domain, repo = %opts.repository, "initialized project");
        Ok(())
    }
}
