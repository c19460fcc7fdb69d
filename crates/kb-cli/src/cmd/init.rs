use super::{describe, root_name, set_if_supported, Ctx, CLI_VERSION};
use crate::output::print_json;
use anyhow::{bail, Context};
use clap::Args;
use kb_core::plugin::golang::GoPlugin;
use kb_core::plugin::{Catalog, InitOptions, Plugin, PluginArgs};
use kb_core::scaffold::{Operation, ScaffoldRequest};
use kb_core::ProjectVersion;
use std::path::Path;

#[derive(Args)]
pub struct InitArgs {
    /// Domain for API groups
    #[arg(long, default_value = "my.domain")]
    pub domain: String,

    /// Go module path (default: read from go.mod)
    #[arg(long)]
    pub repo: Option<String>,

    /// Project name (default: name of the project directory)
    #[arg(long)]
    pub project_name: Option<String>,

    /// Project file version
    #[arg(long, default_value = "3")]
    pub project_version: String,

    /// Plugin keys to initialize with, comma separated
    #[arg(long, value_delimiter = ',')]
    pub plugins: Vec<String>,

    /// Allow APIs in more than one group
    #[arg(long)]
    pub multigroup: bool,
}

fn default_layout(version: ProjectVersion) -> Vec<String> {
    let plugin = if version.number == 2 {
        GoPlugin::v2()
    } else {
        GoPlugin::v4()
    };
    vec![plugin.key()]
}

/// The `module` line of `go.mod`, if there is one.
fn module_path(root: &Path) -> Option<String> {
    let gomod = std::fs::read_to_string(root.join("go.mod")).ok()?;
    gomod
        .lines()
        .find_map(|l| l.trim().strip_prefix("module "))
        .map(|m| m.trim().trim_matches('"').to_string())
}

pub fn run(ctx: &Ctx, args: InitArgs) -> anyhow::Result<()> {
    let version: ProjectVersion = args
        .project_version
        .parse()
        .with_context(|| format!("invalid --project-version '{}'", args.project_version))?;

    let layout = if args.plugins.is_empty() {
        default_layout(version)
    } else {
        args.plugins
    };
    let chain = Catalog::builtin()
        .resolve(&layout, version)
        .with_context(|| format!("unable to resolve plugins {layout:?}"))?;

    let Some(repository) = args.repo.or_else(|| module_path(&ctx.root)) else {
        bail!(
            "no go.mod in {}; pass the module path with --repo",
            ctx.root.display()
        );
    };
    let opts = InitOptions {
        domain: args.domain,
        repository,
        project_name: args.project_name.unwrap_or_else(|| root_name(&ctx.root)),
        multi_group: args.multigroup,
    };

    let mut store = ctx.store();
    let cfg = store.init(version)?;
    set_if_supported(cfg.set_cli_version(CLI_VERSION))?;
    chain
        .init(cfg, chain.keys(), &opts, &PluginArgs::new())
        .context("failed to initialize project")?;
    let req = ScaffoldRequest::new(Operation::Init, &ctx.root, chain.keys(), cfg)?;

    store.save().context("failed to write project file")?;
    let report = ctx.scaffold(&req)?;

    if ctx.json {
        print_json(&serde_json::json!({
            "root": ctx.root,
            "plugins": chain.keys(),
            "scaffold": report,
        }))?;
    } else {
        println!(
            "Initialized project in {} ({})",
            ctx.root.display(),
            chain.keys().join(", ")
        );
        if let Some(line) = describe(&report) {
            println!("{line}");
        }
    }
    Ok(())
}
