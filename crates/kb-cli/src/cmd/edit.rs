use super::{describe, resolve_chain, Ctx};
use crate::output::print_json;
use anyhow::Context;
use clap::Args;
use kb_core::plugin::PluginArgs;
use kb_core::scaffold::{Operation, ScaffoldRequest};

#[derive(Args)]
pub struct EditArgs {
    /// Enable or disable multigroup layout (`--multigroup=false` to disable)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub multigroup: Option<bool>,

    /// Optional plugins to apply, e.g. helm.kubebuilder.io/v2-alpha
    #[arg(long, value_delimiter = ',')]
    pub plugins: Vec<String>,

    /// Manifests the Helm chart is generated from
    #[arg(long)]
    pub manifests: Option<String>,

    /// Directory the Helm chart is written to
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Enable GitHub Models summaries in the auto-update workflow
    #[arg(long)]
    pub use_gh_models: bool,

    /// Remove what the given plugins added
    #[arg(long, requires = "plugins")]
    pub delete: bool,
}

impl EditArgs {
    fn plugin_args(&self) -> PluginArgs {
        let mut args = PluginArgs::new();
        if let Some(m) = &self.manifests {
            args.insert("manifests".into(), m.clone());
        }
        if let Some(o) = &self.output_dir {
            args.insert("output-dir".into(), o.clone());
        }
        if self.use_gh_models {
            args.insert("use-gh-models".into(), "true".into());
        }
        if self.delete {
            args.insert("delete".into(), "true".into());
        }
        args
    }
}

pub fn run(ctx: &Ctx, args: EditArgs) -> anyhow::Result<()> {
    let mut store = ctx.load_store()?;
    let cfg = store.config_mut()?;

    if let Some(multi_group) = args.multigroup {
        cfg.set_multi_group(multi_group)?;
    }
    let chain = resolve_chain(cfg, &args.plugins)?;
    let plugin_args = args.plugin_args();
    if !args.plugins.is_empty() {
        chain
            .edit(cfg, &plugin_args)
            .with_context(|| format!("unable to apply plugins {:?}", args.plugins))?;
    }
    let req = ScaffoldRequest::new(Operation::Edit, &ctx.root, chain.keys(), cfg)?.with_args(plugin_args);
    let multi_group = cfg.is_multi_group();

    store.save().context("failed to write project file")?;
    let report = ctx.scaffold(&req)?;

    if ctx.json {
        print_json(&serde_json::json!({ "multigroup": multi_group, "scaffold": report }))?;
    } else {
        println!("Updated project (multigroup: {multi_group})");
        if let Some(line) = describe(&report) {
            println!("{line}");
        }
    }
    Ok(())
}
