use super::{describe, resolve_chain, Ctx};
use crate::output::print_json;
use anyhow::Context;
use clap::{ArgAction, Args, Subcommand};
use kb_core::plugin::PluginArgs;
use kb_core::resource::{ResourceOptions, Webhooks};
use kb_core::scaffold::{Operation, ScaffoldReport, ScaffoldRequest};
use kb_core::Resource;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum CreateSubcommand {
    /// Scaffold a Kubernetes API and track it in the project file
    #[command(disable_version_flag = true)]
    Api(CreateApiArgs),

    /// Scaffold webhooks for a tracked, core or external API
    #[command(disable_version_flag = true)]
    Webhook(CreateWebhookArgs),
}

#[derive(Args)]
pub struct GvkArgs {
    /// Resource group
    #[arg(long)]
    pub group: String,

    /// Resource version, e.g. v1alpha1
    #[arg(long)]
    pub version: String,

    /// Resource kind, e.g. CronJob
    #[arg(long)]
    pub kind: String,

    /// Irregular plural of the kind
    #[arg(long)]
    pub plural: Option<String>,

    /// Import path of an API owned by another project
    #[arg(long)]
    pub external_api_path: Option<String>,

    /// Domain of the external API
    #[arg(long, requires = "external_api_path")]
    pub external_api_domain: Option<String>,

    /// Plugin keys to run after the project layout, comma separated
    #[arg(long, value_delimiter = ',')]
    pub plugins: Vec<String>,
}

impl GvkArgs {
    fn options(&self, namespaced: bool) -> ResourceOptions {
        ResourceOptions {
            group: self.group.clone(),
            domain: self.external_api_domain.clone(),
            version: self.version.clone(),
            kind: self.kind.clone(),
            plural: self.plural.clone(),
            namespaced,
            crd_version: String::new(),
            external_path: self.external_api_path.clone(),
        }
    }
}

#[derive(Args)]
pub struct CreateApiArgs {
    #[command(flatten)]
    pub gvk: GvkArgs,

    /// Scaffold the resource types
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub resource: bool,

    /// Scaffold a controller for the resource
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub controller: bool,

    /// Namespaced (true) or cluster-scoped (false) resource
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub namespaced: bool,

    /// Container image (deploy-image plugin)
    #[arg(long)]
    pub image: Option<String>,

    /// Container command (deploy-image plugin)
    #[arg(long)]
    pub image_container_command: Option<String>,

    /// Container port (deploy-image plugin)
    #[arg(long)]
    pub image_container_port: Option<String>,

    /// User ID the container runs as (deploy-image plugin)
    #[arg(long)]
    pub run_as_user: Option<String>,
}

impl CreateApiArgs {
    fn plugin_args(&self) -> PluginArgs {
        [
            ("image", &self.image),
            ("image-container-command", &self.image_container_command),
            ("image-container-port", &self.image_container_port),
            ("run-as-user", &self.run_as_user),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.clone().map(|v| (k.to_string(), v)))
        .collect()
    }
}

#[derive(Args)]
pub struct CreateWebhookArgs {
    #[command(flatten)]
    pub gvk: GvkArgs,

    /// Scaffold a mutating (defaulting) webhook
    #[arg(long)]
    pub defaulting: bool,

    /// Scaffold a validating webhook
    #[arg(long)]
    pub programmatic_validation: bool,

    /// Scaffold a conversion webhook
    #[arg(long)]
    pub conversion: bool,

    /// Spoke versions converted to and from this hub, comma separated
    #[arg(long, value_delimiter = ',', requires = "conversion")]
    pub spoke: Vec<String>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(ctx: &Ctx, subcmd: CreateSubcommand) -> anyhow::Result<()> {
    match subcmd {
        CreateSubcommand::Api(args) => create_api(ctx, args),
        CreateSubcommand::Webhook(args) => create_webhook(ctx, args),
    }
}

fn report(ctx: &Ctx, what: &str, res: &Resource, scaffold: &ScaffoldReport) -> anyhow::Result<()> {
    if ctx.json {
        return print_json(&serde_json::json!({ "resource": res, "scaffold": scaffold }));
    }
    println!("Created {what} for {}", res.gvk());
    if let Some(line) = describe(scaffold) {
        println!("{line}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// create api
// ---------------------------------------------------------------------------

fn create_api(ctx: &Ctx, args: CreateApiArgs) -> anyhow::Result<()> {
    let opts = args.gvk.options(args.namespaced);
    opts.validate()?;

    let mut store = ctx.load_store()?;
    let cfg = store.config_mut()?;
    let chain = resolve_chain(cfg, &args.gvk.plugins)?;

    let mut res = opts.new_resource(cfg, args.resource);
    res.controller = args.controller;
    let plugin_args = args.plugin_args();
    let res = chain
        .create_api(cfg, res, &plugin_args)
        .with_context(|| format!("unable to create API {}", opts.gvk(cfg.domain())))?;

    let req = ScaffoldRequest::new(Operation::CreateApi, &ctx.root, chain.keys(), cfg)?
        .with_resource(res.clone())
        .with_args(plugin_args);
    store.save().context("failed to write project file")?;
    let scaffold = ctx.scaffold(&req)?;
    report(ctx, "API", &res, &scaffold)
}

// ---------------------------------------------------------------------------
// create webhook
// ---------------------------------------------------------------------------

fn create_webhook(ctx: &Ctx, args: CreateWebhookArgs) -> anyhow::Result<()> {
    let opts = args.gvk.options(true);
    opts.validate()?;

    let mut store = ctx.load_store()?;
    let cfg = store.config_mut()?;
    let chain = resolve_chain(cfg, &args.gvk.plugins)?;

    let mut res = opts.new_resource(cfg, false);
    res.webhooks = Some(Webhooks {
        conversion: args.conversion,
        defaulting: args.defaulting,
        spoke: args.spoke,
        validation: args.programmatic_validation,
        webhook_version: String::new(),
    });
    let res = chain
        .create_webhook(cfg, res, &PluginArgs::new())
        .with_context(|| format!("unable to create webhook for {}", opts.gvk(cfg.domain())))?;

    let req = ScaffoldRequest::new(Operation::CreateWebhook, &ctx.root, chain.keys(), cfg)?
        .with_resource(res.clone());
    store.save().context("failed to write project file")?;
    let scaffold = ctx.scaffold(&req)?;
    report(ctx, "webhook", &res, &scaffold)
}
