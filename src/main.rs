use anyhow::Result;
use anvil::store::DEFAULT_LIST_LIMIT;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "anvil")]
#[command(version, about = "Polling CI orchestrator - watch branches, run commit jobs, report GitHub checks")]
pub struct Cli {
    /// Path to the config file (falls back to ANVIL_CONFIG, then config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll the configured repositories and run jobs for new commits
    Run {
        /// Resolve one cycle read-only: log what would run, change nothing, exit
        #[arg(long)]
        dry_run: bool,
    },
    /// Show recent run history
    Runs {
        /// Maximum number of runs to print
        #[arg(short, long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,
    },
    /// Show the resolved configuration: paths and watched targets
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { dry_run } => cmd::cmd_run(cli.config, dry_run).await,
        Commands::Runs { limit } => cmd::cmd_runs(limit),
        Commands::Config => cmd::cmd_config(cli.config),
    }
}
