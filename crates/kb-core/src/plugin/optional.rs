//! Plugins applied with `edit --plugins=...` that only record a blob:
//! Helm chart generation, Grafana dashboards and the auto-update workflow.
//! `alpha generate` replays each one whose blob is present.

use super::{HookContext, Plugin, PluginArgs};
use crate::error::{KbError, Result};
use crate::version::{PluginVersion, ProjectVersion, Stage};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const HELM_NAME: &str = "helm.kubebuilder.io";
pub const GRAFANA_NAME: &str = "grafana.kubebuilder.io";
pub const AUTOUPDATE_NAME: &str = "autoupdate.kubebuilder.io";

pub const DEFAULT_MANIFESTS_FILE: &str = "dist/install.yaml";
pub const DEFAULT_OUTPUT_DIR: &str = "dist";

fn v3_only() -> Vec<ProjectVersion> {
    vec![ProjectVersion::stable(3)]
}

// ---------------------------------------------------------------------------
// helm.kubebuilder.io/v2-alpha
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HelmConfig {
    #[serde(default, rename = "manifests", skip_serializing_if = "String::is_empty")]
    pub manifests_file: String,
    #[serde(default, rename = "output", skip_serializing_if = "String::is_empty")]
    pub output_dir: String,
}

impl HelmConfig {
    /// Flags that reproduce this configuration on `edit`.
    pub fn to_args(&self) -> PluginArgs {
        [("manifests", &self.manifests_file), ("output-dir", &self.output_dir)]
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HelmPlugin;

impl Plugin for HelmPlugin {
    fn name(&self) -> &str {
        HELM_NAME
    }

    fn version(&self) -> PluginVersion {
        PluginVersion::new(2, Stage::Alpha)
    }

    fn supported_project_versions(&self) -> Vec<ProjectVersion> {
        v3_only()
    }

    /// Records where the chart is generated from and to; `delete` drops it.
    fn edit(&self, ctx: &mut HookContext<'_>) -> Result<()> {
        if ctx.flag("delete") {
            info!(key = %ctx.config_key, "removing Helm chart configuration");
            return ctx.remove_blob();
        }
        let Some(mut blob) = ctx.load_blob::<HelmConfig>()? else {
            return Ok(());
        };
        blob.manifests_file = ctx.arg("manifests").unwrap_or(DEFAULT_MANIFESTS_FILE).to_string();
        blob.output_dir = ctx.arg("output-dir").unwrap_or(DEFAULT_OUTPUT_DIR).to_string();
        ctx.store_blob(&blob)
    }
}

// ---------------------------------------------------------------------------
// grafana.kubebuilder.io/v1-alpha
// ---------------------------------------------------------------------------

/// Grafana keeps no settings; the blob only marks the plugin as in use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrafanaConfig {}

#[derive(Debug, Clone, Copy)]
pub struct GrafanaPlugin;

impl Plugin for GrafanaPlugin {
    fn name(&self) -> &str {
        GRAFANA_NAME
    }

    fn version(&self) -> PluginVersion {
        PluginVersion::new(1, Stage::Alpha)
    }

    fn supported_project_versions(&self) -> Vec<ProjectVersion> {
        v3_only()
    }

    fn edit(&self, ctx: &mut HookContext<'_>) -> Result<()> {
        match ctx.load_blob::<GrafanaConfig>()? {
            Some(blob) => ctx.store_blob(&blob),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// autoupdate.kubebuilder.io/v1-alpha
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoUpdateConfig {
    #[serde(default, rename = "useGHModels", skip_serializing_if = "std::ops::Not::not")]
    pub use_gh_models: bool,
}

impl AutoUpdateConfig {
    pub fn to_args(&self) -> PluginArgs {
        let mut args = PluginArgs::new();
        if self.use_gh_models {
            args.insert("use-gh-models".into(), "true".into());
        }
        args
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AutoUpdatePlugin;

impl Plugin for AutoUpdatePlugin {
    fn name(&self) -> &str {
        AUTOUPDATE_NAME
    }

    fn version(&self) -> PluginVersion {
        PluginVersion::new(1, Stage::Alpha)
    }

    fn supported_project_versions(&self) -> Vec<ProjectVersion> {
        v3_only()
    }

    /// The workflow runs `alpha update`, which needs the recorded generator version.
    fn edit(&self, ctx: &mut HookContext<'_>) -> Result<()> {
        if ctx.flag("delete") {
            return ctx.remove_blob();
        }
        if ctx.config.cli_version().is_empty() {
            return Err(KbError::InvalidResource(
                "the project file must record cliVersion before the auto-update workflow can be added".into(),
            ));
        }
        let Some(mut blob) = ctx.load_blob::<AutoUpdateConfig>()? else {
            return Ok(());
        };
        blob.use_gh_models = ctx.flag("use-gh-models");
        ctx.store_blob(&blob)
    }
}
