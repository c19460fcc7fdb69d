//! Plugins, bundles and the chain that runs them.
//!
//! A plugin never touches another plugin's blob. It reads and writes its own
//! through [`HookContext`], whose `config_key` has already been resolved
//! against the project's plugin chain, so a bundle can re-host a plugin under
//! another domain without the plugin noticing.

pub mod deploy_image;
pub mod golang;
pub mod key;
pub mod optional;

pub use key::{base_name, key, matches_key, resolve_config_key, split_key, validate_key};

use crate::config::{decode_plugin_config, encode_plugin_config, ProjectConfig};
use crate::error::{KbError, Result};
use crate::registry;
use crate::resource::{Gvk, Resource};
use crate::version::{PluginVersion, ProjectVersion};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Plugin-specific flags, e.g. `image` for deploy-image.
pub type PluginArgs = BTreeMap<String, String>;

/// Values supplied to `init`.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub domain: String,
    pub repository: String,
    pub project_name: String,
    pub multi_group: bool,
}

pub struct HookContext<'a> {
    pub config: &'a mut dyn ProjectConfig,
    /// Key this plugin's blob lives under.
    pub config_key: String,
    pub args: &'a PluginArgs,
}

impl HookContext<'_> {
    /// This plugin's blob, the default when it has none yet, or `None` when
    /// the schema has no plugin blobs at all.
    pub fn load_blob<T: DeserializeOwned + Default>(&self) -> Result<Option<T>> {
        match decode_plugin_config(&*self.config, &self.config_key) {
            Ok(blob) => Ok(Some(blob)),
            Err(KbError::PluginKeyNotFound(_)) => Ok(Some(T::default())),
            Err(e) if e.is_unsupported_field() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn store_blob<T: Serialize>(&mut self, blob: &T) -> Result<()> {
        encode_plugin_config(&mut *self.config, &self.config_key, blob)
    }

    /// Drop this plugin's blob. Missing blobs and blob-less schemas are fine.
    pub fn remove_blob(&mut self) -> Result<()> {
        match self.config.remove_plugin_config(&self.config_key) {
            Err(e) if e.is_unsupported_field() => Ok(()),
            other => other.map(|_| ()),
        }
    }

    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// A boolean flag: present and not `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.args.get(name).is_some_and(|v| v != "false")
    }
}

pub trait Plugin: fmt::Debug + Send + Sync {
    /// Fully qualified name, e.g. `go.kubebuilder.io`.
    fn name(&self) -> &str;
    fn version(&self) -> PluginVersion;
    fn supported_project_versions(&self) -> Vec<ProjectVersion>;

    fn key(&self) -> String {
        key(self.name(), &self.version().to_string())
    }

    /// Fill in defaults before the resource is validated and tracked.
    fn inject_resource(&self, _res: &mut Resource) -> Result<()> {
        Ok(())
    }

    fn init(&self, _ctx: &mut HookContext<'_>, _opts: &InitOptions) -> Result<()> {
        Ok(())
    }

    fn create_api(&self, _ctx: &mut HookContext<'_>, _res: &Resource) -> Result<()> {
        Ok(())
    }

    fn create_webhook(&self, _ctx: &mut HookContext<'_>, _res: &Resource) -> Result<()> {
        Ok(())
    }

    fn delete_api(&self, _ctx: &mut HookContext<'_>, _gvk: &Gvk) -> Result<()> {
        Ok(())
    }

    /// `edit --plugins=<this>`: add or change project-wide features.
    fn edit(&self, _ctx: &mut HookContext<'_>) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// A named group of plugins recorded in the chain under a single key.
#[derive(Debug, Clone)]
pub struct Bundle {
    name: String,
    version: PluginVersion,
    plugins: Vec<Arc<dyn Plugin>>,
}

impl Bundle {
    pub fn new(name: &str, version: PluginVersion, plugins: Vec<Arc<dyn Plugin>>) -> Result<Self> {
        let bundle = Self {
            name: name.to_string(),
            version,
            plugins,
        };
        validate_key(&bundle.key())?;
        if bundle.plugins.is_empty() {
            return Err(KbError::InvalidPluginKey {
                key: bundle.key(),
                reason: "a bundle needs at least one plugin".to_string(),
            });
        }
        Ok(bundle)
    }

    pub fn key(&self) -> String {
        key(&self.name, &self.version.to_string())
    }

    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    /// Project versions every bundled plugin supports.
    pub fn supported_project_versions(&self) -> Vec<ProjectVersion> {
        let mut common = self.plugins[0].supported_project_versions();
        for p in &self.plugins[1..] {
            let theirs = p.supported_project_versions();
            common.retain(|v| theirs.contains(v));
        }
        common
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Plugins and bundles a chain can be resolved against.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    plugins: Vec<Arc<dyn Plugin>>,
    bundles: Vec<Bundle>,
}

impl Catalog {
    /// The plugins shipped with this binary.
    pub fn builtin() -> Self {
        let mut catalog = Self::default();
        catalog.register(Arc::new(golang::GoPlugin::v2()));
        catalog.register(Arc::new(golang::GoPlugin::v4()));
        catalog.register(Arc::new(deploy_image::DeployImagePlugin));
        catalog.register(Arc::new(optional::HelmPlugin));
        catalog.register(Arc::new(optional::GrafanaPlugin));
        catalog.register(Arc::new(optional::AutoUpdatePlugin));
        catalog
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub fn register_bundle(&mut self, bundle: Bundle) {
        self.bundles.push(bundle);
    }

    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    /// Expand `keys` into the plugins to run, checking each supports `version`.
    ///
    /// Bundles match on their exact key and expand in place. A plain plugin
    /// may be named without its version or domain if that is unambiguous.
    pub fn resolve(&self, keys: &[String], version: ProjectVersion) -> Result<PluginChain> {
        let mut plugins: Vec<Arc<dyn Plugin>> = Vec::new();
        for k in keys {
            validate_key(k)?;
            if let Some(bundle) = self.bundles.iter().find(|b| b.key() == *k) {
                if !bundle.supported_project_versions().contains(&version) {
                    return Err(KbError::UnsupportedProjectVersion {
                        plugin: k.clone(),
                        version: version.to_string(),
                    });
                }
                plugins.extend(bundle.plugins.iter().cloned());
                continue;
            }

            let matches: Vec<&Arc<dyn Plugin>> =
                self.plugins.iter().filter(|p| matches_key(k, &p.key())).collect();
            let plugin = match matches.as_slice() {
                [] => return Err(KbError::UnknownPlugin(k.clone())),
                [one] => *one,
                many => many
                    .iter()
                    .find(|p| p.supported_project_versions().contains(&version))
                    .copied()
                    .ok_or_else(|| KbError::UnknownPlugin(k.clone()))?,
            };
            if !plugin.supported_project_versions().contains(&version) {
                return Err(KbError::UnsupportedProjectVersion {
                    plugin: plugin.key(),
                    version: version.to_string(),
                });
            }
            plugins.push(Arc::clone(plugin));
        }
        debug!(chain = ?keys, resolved = plugins.len(), "resolved plugin chain");
        Ok(PluginChain { plugins })
    }
}

// ---------------------------------------------------------------------------
// PluginChain
// ---------------------------------------------------------------------------

/// Resolved plugins in execution order.
#[derive(Debug, Clone)]
pub struct PluginChain {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginChain {
    pub fn keys(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.key()).collect()
    }

    fn each(
        &self,
        cfg: &mut dyn ProjectConfig,
        args: &PluginArgs,
        mut hook: impl FnMut(&dyn Plugin, &mut HookContext<'_>) -> Result<()>,
    ) -> Result<()> {
        let chain = cfg.plugin_chain();
        for plugin in &self.plugins {
            let config_key = resolve_config_key(&plugin.key(), &chain);
            let mut ctx = HookContext {
                config: &mut *cfg,
                config_key,
                args,
            };
            hook(plugin.as_ref(), &mut ctx)?;
        }
        Ok(())
    }

    /// Run `init` hooks, then record `layout` as the project's chain.
    pub fn init(
        &self,
        cfg: &mut dyn ProjectConfig,
        layout: Vec<String>,
        opts: &InitOptions,
        args: &PluginArgs,
    ) -> Result<()> {
        match cfg.set_plugin_chain(layout) {
            Err(e) if e.is_unsupported_field() => {}
            other => other?,
        }
        self.each(cfg, args, |p, ctx| p.init(ctx, opts))
    }

    /// Track a new API and let every plugin react to it.
    pub fn create_api(
        &self,
        cfg: &mut dyn ProjectConfig,
        mut res: Resource,
        args: &PluginArgs,
    ) -> Result<Resource> {
        for p in &self.plugins {
            p.inject_resource(&mut res)?;
        }
        res.validate()?;
        registry::validate_new_api(cfg, &res)?;
        cfg.update_resource(res.clone())?;
        self.each(cfg, args, |p, ctx| p.create_api(ctx, &res))?;
        Ok(res)
    }

    pub fn create_webhook(
        &self,
        cfg: &mut dyn ProjectConfig,
        mut res: Resource,
        args: &PluginArgs,
    ) -> Result<Resource> {
        for p in &self.plugins {
            p.inject_resource(&mut res)?;
        }
        res.validate()?;
        registry::validate_new_webhook(cfg, &res)?;
        cfg.update_resource(res.clone())?;
        self.each(cfg, args, |p, ctx| p.create_webhook(ctx, &res))?;
        Ok(res)
    }

    /// Run `edit` hooks.
    pub fn edit(&self, cfg: &mut dyn ProjectConfig, args: &PluginArgs) -> Result<()> {
        self.each(cfg, args, |p, ctx| p.edit(ctx))
    }

    /// Untrack a resource, then let plugins drop anything referencing it.
    pub fn delete_api(&self, cfg: &mut dyn ProjectConfig, gvk: &Gvk, args: &PluginArgs) -> Result<Resource> {
        let removed = cfg.remove_resource(gvk)?;
        let gvk = removed.gvk();
        self.each(cfg, args, |p, ctx| p.delete_api(ctx, &gvk))?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{decode_plugin_config, encode_plugin_config, new_config};
    use crate::resource::Api;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Seen {
        kinds: Vec<String>,
    }

    /// Records each created kind in its own blob.
    #[derive(Debug)]
    struct Recorder;

    impl Plugin for Recorder {
        fn name(&self) -> &str {
            "recorder.example.io"
        }
        fn version(&self) -> PluginVersion {
            PluginVersion::new(1, crate::version::Stage::Alpha)
        }
        fn supported_project_versions(&self) -> Vec<ProjectVersion> {
            vec![ProjectVersion::stable(3)]
        }
        fn create_api(&self, ctx: &mut HookContext<'_>, res: &Resource) -> Result<()> {
            let mut seen: Seen = decode_plugin_config(&*ctx.config, &ctx.config_key).unwrap_or_default();
            seen.kinds.push(res.kind.clone());
            encode_plugin_config(&mut *ctx.config, &ctx.config_key, &seen)
        }
    }

    fn captain() -> Resource {
        Resource {
            api: Some(Api {
                crd_version: "v1".into(),
                namespaced: true,
            }),
            path: "github.com/example/project/api/v1".into(),
            ..Resource::from_gvk(&Gvk::new("crew", "test.io", "v1", "Captain"))
        }
    }

    fn project(chain: &[&str]) -> Box<dyn ProjectConfig> {
        let mut cfg = new_config(ProjectVersion::stable(3)).unwrap();
        cfg.set_domain("test.io").unwrap();
        cfg.set_plugin_chain(chain.iter().map(|s| s.to_string()).collect())
            .unwrap();
        cfg
    }

    #[test]
    fn bundled_plugin_writes_under_bundle_key() {
        let mut catalog = Catalog::builtin();
        catalog.register_bundle(
            Bundle::new(
                "recorder.custom-domain",
                PluginVersion::new(1, crate::version::Stage::Alpha),
                vec![Arc::new(Recorder)],
            )
            .unwrap(),
        );
        let layout = ["go.kubebuilder.io/v4", "recorder.custom-domain/v1-alpha"];
        let mut cfg = project(&layout);
        let keys: Vec<String> = layout.iter().map(|s| s.to_string()).collect();
        let chain = catalog.resolve(&keys, cfg.version()).unwrap();
        chain
            .create_api(cfg.as_mut(), captain(), &PluginArgs::new())
            .unwrap();

        assert_eq!(cfg.plugin_keys().unwrap(), vec!["recorder.custom-domain/v1-alpha".to_string()]);
        let seen: Seen = decode_plugin_config(cfg.as_ref(), "recorder.custom-domain/v1-alpha").unwrap();
        assert_eq!(seen.kinds, vec!["Captain".to_string()]);
    }

    #[test]
    fn standalone_plugin_uses_its_own_key() {
        let mut catalog = Catalog::builtin();
        catalog.register(Arc::new(Recorder));
        let mut cfg = project(&["go.kubebuilder.io/v4"]);
        let chain = catalog
            .resolve(
                &["go.kubebuilder.io/v4".into(), "recorder.example.io/v1-alpha".into()],
                cfg.version(),
            )
            .unwrap();
        chain
            .create_api(cfg.as_mut(), captain(), &PluginArgs::new())
            .unwrap();
        assert_eq!(cfg.plugin_keys().unwrap(), vec!["recorder.example.io/v1-alpha".to_string()]);
        assert!(cfg.has_resource(&captain().gvk()));
    }

    #[test]
    fn resolve_rejects_unknown_and_unsupported() {
        let catalog = Catalog::builtin();
        assert!(matches!(
            catalog.resolve(&["nope.example.io/v1".into()], ProjectVersion::stable(3)),
            Err(KbError::UnknownPlugin(_))
        ));
        assert!(matches!(
            catalog.resolve(&["go.kubebuilder.io/v2".into()], ProjectVersion::stable(3)),
            Err(KbError::UnsupportedProjectVersion { .. })
        ));
    }

    #[test]
    fn short_names_pick_the_supported_version() {
        let catalog = Catalog::builtin();
        let chain = catalog
            .resolve(&["go.kubebuilder.io".into()], ProjectVersion::stable(3))
            .unwrap();
        assert_eq!(chain.keys(), vec!["go.kubebuilder.io/v4".to_string()]);
        let chain = catalog
            .resolve(&["go".into()], ProjectVersion::stable(2))
            .unwrap();
        assert_eq!(chain.keys(), vec!["go.kubebuilder.io/v2".to_string()]);
    }

    #[test]
    fn bundle_requires_plugins() {
        assert!(Bundle::new("empty.example.io", PluginVersion::new(1, Default::default()), vec![]).is_err());
    }

    #[test]
    fn delete_api_untracks() {
        let catalog = Catalog::builtin();
        let mut cfg = project(&["go.kubebuilder.io/v4"]);
        let chain = catalog
            .resolve(&["go.kubebuilder.io/v4".into()], cfg.version())
            .unwrap();
        chain
            .create_api(cfg.as_mut(), captain(), &PluginArgs::new())
            .unwrap();
        chain
            .delete_api(cfg.as_mut(), &captain().gvk(), &PluginArgs::new())
            .unwrap();
        assert_eq!(cfg.resources_len(), 0);
        assert!(chain
            .delete_api(cfg.as_mut(), &captain().gvk(), &PluginArgs::new())
            .is_err());
    }
}
