mod cmd;
mod handlers;
mod output;
mod root;
mod tools;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, gate::GateSubcommand, queue::QueueSubcommand, run::RunArgs,
    sd::SdSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "leo",
    about = "LEO Protocol toolkit: strategic directives, handoffs, job queues and quality gates",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .leo/ or .git/)
    #[arg(long, global = true, env = "LEO_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Postgres connection string for the directive database
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .leo/config.yaml with defaults
    Init,

    /// Run a programmatic task: the model drives the LEO tools to a final answer
    Run(RunArgs),

    /// Inspect and advance strategic directives
    Sd {
        #[command(subcommand)]
        subcommand: SdSubcommand,
    },

    /// Add jobs to the pipeline queues and run workers
    Queue {
        #[command(subcommand)]
        subcommand: QueueSubcommand,
    },

    /// Run the configured quality gates and score them
    Gate {
        #[command(subcommand)]
        subcommand: GateSubcommand,
    },

    /// Show and validate .leo/config.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Queue {
            subcommand: QueueSubcommand::Work { .. },
        } => tracing::Level::INFO,
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
    let db = cli.database_url.as_deref();

    let result = match cli.command {
        Commands::Init => cmd::config::init(&root, cli.json),
        Commands::Run(args) => cmd::run::run(&root, db, args, cli.json),
        Commands::Sd { subcommand } => cmd::sd::run(db, subcommand, cli.json),
        Commands::Queue { subcommand } => cmd::queue::run(&root, subcommand, cli.json),
        Commands::Gate { subcommand } => cmd::gate::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
