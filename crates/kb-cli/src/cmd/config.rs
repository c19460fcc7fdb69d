use super::Ctx;
use crate::output::{print_json, print_table, yes_no};
use anyhow::Context;
use clap::Subcommand;
use kb_core::ProjectConfig;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the project file as it would be saved
    Show {
        /// List tracked resources instead of the whole document
        #[arg(long)]
        resources: bool,
    },
}

pub fn run(ctx: &Ctx, subcmd: ConfigSubcommand) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show { resources } => show(ctx, resources),
    }
}

fn show(ctx: &Ctx, resources: bool) -> anyhow::Result<()> {
    let store = ctx.load_store()?;
    let cfg = store
        .config()
        .context("project file loaded without a configuration")?;

    if resources {
        return show_resources(ctx, cfg);
    }
    let doc = cfg.marshal()?;
    if ctx.json {
        let value: serde_json::Value = serde_yaml::from_str(&doc)?;
        print_json(&value)
    } else {
        print!("{doc}");
        Ok(())
    }
}

fn show_resources(ctx: &Ctx, cfg: &dyn ProjectConfig) -> anyhow::Result<()> {
    let resources = cfg.get_resources();
    if ctx.json {
        return print_json(&resources);
    }
    if resources.is_empty() {
        println!("No resources tracked.");
        return Ok(());
    }
    let rows = resources
        .iter()
        .map(|r| {
            vec![
                r.group.clone(),
                r.version.clone(),
                r.kind.clone(),
                r.domain.clone(),
                yes_no(r.has_api()),
                yes_no(r.controller),
                yes_no(r.has_webhooks()),
            ]
        })
        .collect();
    print_table(
        &["GROUP", "VERSION", "KIND", "DOMAIN", "API", "CONTROLLER", "WEBHOOKS"],
        rows,
    );
    Ok(())
}
