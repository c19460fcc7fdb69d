mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    alpha::AlphaSubcommand, config::ConfigSubcommand, create::CreateSubcommand,
    delete::DeleteSubcommand, edit::EditArgs, init::InitArgs,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "kubebuilder",
    about = "Scaffold and upgrade Kubernetes operator projects",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from PROJECT or .git/)
    #[arg(long, global = true, env = "KUBEBUILDER_ROOT")]
    root: Option<PathBuf>,

    /// External command that generates project files
    #[arg(long, global = true, env = "KUBEBUILDER_SCAFFOLDER")]
    scaffolder: Option<String>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new project and write its PROJECT file
    Init(InitArgs),

    /// Change project-wide settings
    Edit(EditArgs),

    /// Scaffold APIs and webhooks
    Create {
        #[command(subcommand)]
        subcommand: CreateSubcommand,
    },

    /// Remove scaffolded APIs
    Delete {
        #[command(subcommand)]
        subcommand: DeleteSubcommand,
    },

    /// Inspect the project file
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Experimental commands
    Alpha {
        #[command(subcommand)]
        subcommand: AlphaSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Alpha { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = cmd::Ctx::new(root, cli.json, cli.scaffolder.as_deref()).and_then(|ctx| {
        match cli.command {
            Commands::Init(args) => cmd::init::run(&ctx, args),
            Commands::Edit(args) => cmd::edit::run(&ctx, args),
            Commands::Create { subcommand } => cmd::create::run(&ctx, subcommand),
            Commands::Delete { subcommand } => cmd::delete::run(&ctx, subcommand),
            Commands::Config { subcommand } => cmd::config::run(&ctx, subcommand),
            Commands::Alpha { subcommand } => cmd::alpha::run(&ctx, subcommand),
        }
    });

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
