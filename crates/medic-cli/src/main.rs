//! medic command line tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "medic")]
#[command(about = "Cordova mobile build farm", long_about = None)]
struct Cli {
    /// Path to the system configuration
    #[arg(long, global = true, env = "MEDIC_CONFIG", default_value = "medic.kdl")]
    config: PathBuf,

    /// Platforms to build, e.g. "all" or "android,ios@3.1.0"
    #[arg(long, global = true, env = "MEDIC_PLATFORMS")]
    platforms: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the test app, then follow the commit feed and queue missing builds
    Run,
    /// Check recent commits of every tracked platform once and exit
    Backfill {
        /// Print the jobs that would be queued instead of building them
        #[arg(long)]
        dry_run: bool,
        /// Treat every result as missing instead of querying the result store
        #[arg(long, requires = "dry_run")]
        no_store: bool,
    },
    /// Validate the system configuration
    Validate {
        /// Path to the configuration file (defaults to --config)
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let platforms = cli.platforms.as_deref();

    match cli.command {
        Commands::Run => {
            commands::run::run(&cli.config, platforms).await?;
        }
        Commands::Backfill { dry_run, no_store } => {
            commands::backfill::backfill(&cli.config, platforms, dry_run, no_store).await?;
        }
        Commands::Validate { path } => {
            commands::validate(path.as_deref().unwrap_or(&cli.config), platforms)?;
        }
    }

    Ok(())
}
