use super::{describe, resolve_chain, Ctx};
use crate::output::print_json;
use anyhow::Context;
use clap::{Args, Subcommand};
use kb_core::plugin::{resolve_config_key, Catalog, PluginArgs};
use kb_core::scaffold::{Operation, ScaffoldRequest};
use kb_core::{Gvk, ProjectConfig};

#[derive(Subcommand)]
pub enum DeleteSubcommand {
    /// Stop tracking an API and drop plugin data that refers to it
    #[command(disable_version_flag = true)]
    Api(DeleteApiArgs),
}

#[derive(Args)]
pub struct DeleteApiArgs {
    #[arg(long)]
    pub group: String,

    #[arg(long)]
    pub version: String,

    #[arg(long)]
    pub kind: String,

    /// Domain of the resource (default: the project domain)
    #[arg(long)]
    pub domain: Option<String>,

    /// Plugin keys to run after the project layout, comma separated
    #[arg(long, value_delimiter = ',')]
    pub plugins: Vec<String>,
}

pub fn run(ctx: &Ctx, subcmd: DeleteSubcommand) -> anyhow::Result<()> {
    match subcmd {
        DeleteSubcommand::Api(args) => delete_api(ctx, args),
    }
}

/// Built-in plugins that keep a blob in this project, so they get to prune it.
fn plugins_with_blobs(cfg: &dyn ProjectConfig) -> Vec<String> {
    let Ok(blobs) = cfg.plugin_keys() else {
        return Vec::new();
    };
    let chain = cfg.plugin_chain();
    Catalog::builtin()
        .plugins()
        .iter()
        .map(|p| p.key())
        .filter(|k| blobs.contains(&resolve_config_key(k, &chain)))
        .collect()
}

fn delete_api(ctx: &Ctx, args: DeleteApiArgs) -> anyhow::Result<()> {
    let mut store = ctx.load_store()?;
    let cfg = store.config_mut()?;

    let domain = args.domain.unwrap_or_else(|| cfg.domain().to_string());
    let gvk = Gvk::new(args.group, domain, args.version, args.kind);

    let mut extra = args.plugins;
    extra.extend(plugins_with_blobs(cfg));
    let chain = resolve_chain(cfg, &extra)?;

    let removed = chain
        .delete_api(cfg, &gvk, &PluginArgs::new())
        .with_context(|| format!("unable to delete API {gvk}"))?;

    let req = ScaffoldRequest::new(Operation::DeleteApi, &ctx.root, chain.keys(), cfg)?
        .with_resource(removed.clone());
    store.save().context("failed to write project file")?;
    let scaffold = ctx.scaffold(&req)?;

    if ctx.json {
        print_json(&serde_json::json!({ "removed": removed, "scaffold": scaffold }))?;
    } else {
        println!("Deleted API {}", removed.gvk());
        if let Some(line) = describe(&scaffold) {
            println!("{line}");
        }
    }
    Ok(())
}
