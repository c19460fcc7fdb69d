//! `deploy-image.go.kubebuilder.io/v1-alpha`: an API plus a controller that
//! deploys a container image. The image options for every resource it
//! scaffolded are kept in its blob so they can be replayed on regeneration.

use super::{HookContext, Plugin};
use crate::error::{KbError, Result};
use crate::resource::{Api, Gvk, Resource};
use crate::version::{PluginVersion, ProjectVersion, Stage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const NAME: &str = "deploy-image.go.kubebuilder.io";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeployImageConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceData {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,
    pub kind: String,
    #[serde(default)]
    pub options: ImageOptions,
    pub version: String,
}

impl ResourceData {
    pub fn gvk(&self) -> Gvk {
        Gvk::new(&self.group, &self.domain, &self.version, &self.kind)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageOptions {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub container_command: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub container_port: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub run_as_user: String,
}

impl ImageOptions {
    /// Read from the `image`, `image-container-command`,
    /// `image-container-port` and `run-as-user` flags.
    pub fn from_args(args: &super::PluginArgs) -> Result<Self> {
        let image = args
            .get("image")
            .filter(|s| !s.is_empty())
            .cloned()
            .ok_or_else(|| {
                KbError::InvalidResource("you must pass --image with the deploy-image plugin".into())
            })?;
        let get = |k: &str| args.get(k).cloned().unwrap_or_default();
        Ok(Self {
            container_command: get("image-container-command"),
            container_port: get("image-container-port"),
            image,
            run_as_user: get("run-as-user"),
        })
    }

    /// Inverse of [`ImageOptions::from_args`], for replaying a tracked resource.
    pub fn to_args(&self) -> super::PluginArgs {
        [
            ("image", &self.image),
            ("image-container-command", &self.container_command),
            ("image-container-port", &self.container_port),
            ("run-as-user", &self.run_as_user),
        ]
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeployImagePlugin;

/// CRD version used when the API is created by this plugin alone.
const DEFAULT_CRD_VERSION: &str = "v1";

impl Plugin for DeployImagePlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> PluginVersion {
        PluginVersion::new(1, Stage::Alpha)
    }

    fn supported_project_versions(&self) -> Vec<ProjectVersion> {
        vec![ProjectVersion::stable(3)]
    }

    /// Always scaffolds a namespaced API and a controller, even when the
    /// caller asked for neither.
    fn inject_resource(&self, res: &mut Resource) -> Result<()> {
        res.controller = true;
        let api = res.api.get_or_insert_with(Api::default);
        api.namespaced = true;
        if api.crd_version.is_empty() {
            api.crd_version = DEFAULT_CRD_VERSION.to_string();
        }
        Ok(())
    }

    fn create_api(&self, ctx: &mut HookContext<'_>, res: &Resource) -> Result<()> {
        let options = ImageOptions::from_args(ctx.args)?;
        let Some(mut blob) = ctx.load_blob::<DeployImageConfig>()? else {
            debug!("project file has no plugin blobs, not tracking image options");
            return Ok(());
        };

        let gvk = res.gvk();
        blob.resources.retain(|r| !r.gvk().is_equal_to(&gvk));
        blob.resources.push(ResourceData {
            domain: res.domain.clone(),
            group: res.group.clone(),
            kind: res.kind.clone(),
            options,
            version: res.version.clone(),
        });
        info!(resource = %gvk, key = %ctx.config_key, "tracking deploy-image resource");
        ctx.store_blob(&blob)
    }

    fn delete_api(&self, ctx: &mut HookContext<'_>, gvk: &Gvk) -> Result<()> {
        let Some(mut blob) = ctx.load_blob::<DeployImageConfig>()? else {
            return Ok(());
        };
        let before = blob.resources.len();
        blob.resources.retain(|r| !r.gvk().is_equal_to(gvk));
        if blob.resources.len() == before {
            return Ok(());
        }
        if blob.resources.is_empty() {
            ctx.remove_blob()
        } else {
            ctx.store_blob(&blob)
        }
    }
}
