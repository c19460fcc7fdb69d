use super::{set_if_supported, Ctx, CLI_VERSION};
use crate::output::print_json;
use anyhow::Context;
use clap::{Args, Subcommand};
use serde::de::DeserializeOwned;
use kb_core::config::{self, decode_plugin_config};
use kb_core::plugin::deploy_image::{DeployImageConfig, DeployImagePlugin, ResourceData};
use kb_core::plugin::optional::{
    AutoUpdateConfig, AutoUpdatePlugin, GrafanaConfig, GrafanaPlugin, HelmConfig, HelmPlugin,
};
use kb_core::plugin::{resolve_config_key, Catalog, InitOptions, Plugin, PluginArgs, PluginChain};
use kb_core::scaffold::{Operation, ScaffoldRequest};
use kb_core::update::options::{DEFAULT_FROM_BRANCH, DEFAULT_RELEASE_URL};
use kb_core::update::{HttpReleaseSource, Orchestrator, SystemRunner, UpdateOptions};
use kb_core::{KbError, ProjectConfig, Resource};
use tracing::info;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum AlphaSubcommand {
    /// Regenerate the project in place from its project file
    Generate,

    /// Upgrade the scaffold to this release with a three-way merge on
    /// temporary git branches
    Update(UpdateArgs),
}

#[derive(Args)]
pub struct UpdateArgs {
    /// Release the project was scaffolded with (default: cliVersion in the project file)
    #[arg(long)]
    pub from_version: Option<String>,

    /// Release to upgrade to (default: this binary)
    #[arg(long)]
    pub to_version: Option<String>,

    /// Branch holding your changes
    #[arg(long, default_value = DEFAULT_FROM_BRANCH)]
    pub from_branch: String,

    /// Branch receiving the result (default: kubebuilder-update-from-<from>-to-<to>)
    #[arg(long)]
    pub output_branch: Option<String>,

    /// Keep the full update history instead of one squashed commit
    #[arg(long, conflicts_with = "restore_path")]
    pub show_commits: bool,

    /// Path restored from the base branch after squashing, repeatable
    #[arg(long = "restore-path", value_name = "PATH")]
    pub restore_path: Vec<String>,

    /// Commit message for a clean merge
    #[arg(long)]
    pub commit_message: Option<String>,

    /// Commit message when conflict markers are committed with --force
    #[arg(long)]
    pub commit_message_conflict: Option<String>,

    /// Commit the merge result even when it contains conflict markers
    #[arg(long)]
    pub force: bool,

    /// Extra `git -c` setting, repeatable; `disable` drops the defaults
    #[arg(long = "git-config", value_name = "KEY=VALUE")]
    pub git_config: Vec<String>,

    /// Base URL releases are downloaded from
    #[arg(long, env = "KUBEBUILDER_RELEASE_URL", default_value = DEFAULT_RELEASE_URL)]
    pub release_url: String,
}

pub fn run(ctx: &Ctx, subcmd: AlphaSubcommand) -> anyhow::Result<()> {
    match subcmd {
        AlphaSubcommand::Generate => generate(ctx),
        AlphaSubcommand::Update(args) => update(ctx, args),
    }
}

// ---------------------------------------------------------------------------
// alpha generate
// ---------------------------------------------------------------------------

/// The blob `plugin` recorded in `cfg`, under its chain-resolved key or its
/// own. `None` when absent or when the schema has no blobs.
fn recorded_blob<T: DeserializeOwned>(
    cfg: &dyn ProjectConfig,
    plugin: &dyn Plugin,
) -> anyhow::Result<Option<T>> {
    let canonical = plugin.key();
    let resolved = resolve_config_key(&canonical, &cfg.plugin_chain());
    let mut keys = vec![resolved];
    if keys[0] != canonical {
        keys.push(canonical);
    }
    for key in &keys {
        match decode_plugin_config::<T>(cfg, key) {
            Ok(blob) => return Ok(Some(blob)),
            Err(KbError::PluginKeyNotFound(_)) => continue,
            Err(e) if e.is_unsupported_field() => return Ok(None),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(None)
}

/// Image options the deploy-image plugin recorded, if any.
fn tracked_images(cfg: &dyn ProjectConfig) -> anyhow::Result<Vec<ResourceData>> {
    Ok(recorded_blob::<DeployImageConfig>(cfg, &DeployImagePlugin)?
        .map(|blob| blob.resources)
        .unwrap_or_default())
}

/// `edit --plugins` runs to replay, one per optional plugin `old` records.
fn optional_edits(old: &dyn ProjectConfig) -> anyhow::Result<Vec<(String, PluginArgs)>> {
    let mut edits = Vec::new();
    if recorded_blob::<GrafanaConfig>(old, &GrafanaPlugin)?.is_some() {
        edits.push((GrafanaPlugin.key(), PluginArgs::new()));
    }
    if let Some(blob) = recorded_blob::<AutoUpdateConfig>(old, &AutoUpdatePlugin)? {
        edits.push((AutoUpdatePlugin.key(), blob.to_args()));
    }
    if let Some(blob) = recorded_blob::<HelmConfig>(old, &HelmPlugin)? {
        edits.push((HelmPlugin.key(), blob.to_args()));
    }
    Ok(edits)
}

/// Rebuild `old` from scratch by re-running every command that produced it.
fn replay(ctx: &Ctx, old: &dyn ProjectConfig) -> anyhow::Result<Box<dyn ProjectConfig>> {
    let version = old.version();
    let layout = old.plugin_chain();
    let catalog = Catalog::builtin();
    let chain = catalog
        .resolve(&layout, version)
        .with_context(|| format!("unable to resolve project layout {layout:?}"))?;

    let images = tracked_images(old)?;
    let image_chain: Option<PluginChain> = if images.is_empty() {
        None
    } else {
        let mut keys = chain.keys();
        keys.push(DeployImagePlugin.key());
        Some(catalog.resolve(&keys, version)?)
    };

    let mut fresh = config::new_config(version)?;
    set_if_supported(fresh.set_cli_version(CLI_VERSION))?;
    let opts = InitOptions {
        domain: old.domain().to_string(),
        repository: old.repository().to_string(),
        project_name: old.project_name().to_string(),
        multi_group: old.is_multi_group(),
    };
    chain.init(fresh.as_mut(), layout.clone(), &opts, &PluginArgs::new())?;
    ctx.scaffold(&ScaffoldRequest::new(
        Operation::Init,
        &ctx.root,
        chain.keys(),
        fresh.as_ref(),
    )?)?;

    for res in old.get_resources() {
        let gvk = res.gvk();
        info!(resource = %gvk, "replaying resource");

        if res.has_api() || res.controller {
            let image = images.iter().find(|d| d.gvk().is_equal_to(&gvk));
            let (api_chain, args) = match (image, &image_chain) {
                (Some(data), Some(with_image)) => (with_image, data.options.to_args()),
                _ => (&chain, PluginArgs::new()),
            };
            let api = Resource {
                webhooks: None,
                ..res.clone()
            };
            let created = api_chain
                .create_api(fresh.as_mut(), api, &args)
                .with_context(|| format!("unable to replay API {gvk}"))?;
            let req = ScaffoldRequest::new(Operation::CreateApi, &ctx.root, api_chain.keys(), fresh.as_ref())?
                .with_resource(created)
                .with_args(args);
            ctx.scaffold(&req)?;
        } else {
            fresh.add_resource(Resource {
                webhooks: None,
                ..res.clone()
            })?;
        }

        if res.has_webhooks() {
            let hooks = Resource {
                api: None,
                controller: false,
                ..res.clone()
            };
            let created = chain
                .create_webhook(fresh.as_mut(), hooks, &PluginArgs::new())
                .with_context(|| format!("unable to replay webhooks for {gvk}"))?;
            let req = ScaffoldRequest::new(Operation::CreateWebhook, &ctx.root, chain.keys(), fresh.as_ref())?
                .with_resource(created);
            ctx.scaffold(&req)?;
        }
    }

    for (key, args) in optional_edits(old)? {
        info!(plugin = %key, "replaying plugin");
        let edit_chain = catalog.resolve(&[key.clone()], version)?;
        edit_chain
            .edit(fresh.as_mut(), &args)
            .with_context(|| format!("unable to replay plugin {key}"))?;
        let req = ScaffoldRequest::new(Operation::Edit, &ctx.root, edit_chain.keys(), fresh.as_ref())?
            .with_args(args);
        ctx.scaffold(&req)?;
    }
    Ok(fresh)
}

fn generate(ctx: &Ctx) -> anyhow::Result<()> {
    let mut store = ctx.load_store()?;
    let old = store
        .config()
        .context("project file loaded without a configuration")?;
    let fresh = replay(ctx, old)?;
    let count = fresh.resources_len();

    store.replace(fresh);
    store.save().context("failed to write project file")?;

    if ctx.json {
        print_json(&serde_json::json!({ "root": ctx.root, "resources": count }))?;
    } else {
        println!(
            "Regenerated project in {} ({count} resource(s))",
            ctx.root.display()
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// alpha update
// ---------------------------------------------------------------------------

fn update(ctx: &Ctx, args: UpdateArgs) -> anyhow::Result<()> {
    let opts = UpdateOptions {
        from_version: args.from_version,
        to_version: args.to_version,
        from_branch: args.from_branch,
        output_branch: args.output_branch,
        show_commits: args.show_commits,
        restore_path: args.restore_path,
        commit_message: args.commit_message,
        commit_message_conflict: args.commit_message_conflict,
        force: args.force,
        git_config: args.git_config,
        release_url: args.release_url,
        ..Default::default()
    };
    let runner = SystemRunner;
    let release = HttpReleaseSource::new(&opts.release_url);
    let orchestrator = Orchestrator::new(&ctx.root, opts, &runner, &release);

    let mut report = orchestrator.new_report();
    let result = orchestrator.run(&mut report);

    if result.is_ok() || !report.completed.is_empty() {
        if ctx.json {
            print_json(&report)?;
        } else if result.is_ok() {
            print!("{report}");
        } else {
            eprint!("{report}");
        }
    }
    result.context("update failed")?;
    Ok(())
}
