mod commands;
mod migrations;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::*;

#[derive(Parser)]
#[command(name = "mongrate", version)]
#[command(about = "Migration runner for MongoDB")]
struct Cli {
    /// Configuration file (defaults to mongrate.toml in the working directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new migration file
    Create {
        /// Migration name, e.g. "add user indexes"
        name: Option<String>,
    },

    /// Apply all pending migrations, oldest first
    Up,

    /// Show applied/pending state of every migration
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mongrate=info,mongrate_core=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Create { name } => create::run(config, name.as_deref()).await,
        Commands::Up => up::run(config).await,
        Commands::Status { json } => status::run(config, json).await,
    };

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
