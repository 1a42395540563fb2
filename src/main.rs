// ABOUTME: CLI entry point for velamg
// ABOUTME: Parses commands and routes to appropriate handlers

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use vela_migrator::commands;
use vela_migrator::config::{load_config, MigratorConfig};
use vela_migrator::model::default_registry;

#[derive(Parser)]
#[command(name = "velamg")]
#[command(about = "Migrate application platform records between datastores", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy records from the source datastore to the target
    Migrate {
        /// Path to the migrator config (.toml, .yaml, .yml or .json)
        config: PathBuf,
        /// Only migrate these tables (comma-separated), overriding the config
        #[arg(long, value_delimiter = ',')]
        tables: Option<Vec<String>>,
        /// What to do with rows that already exist on the target: skip, update or error
        #[arg(long)]
        on_duplicate: Option<String>,
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Check both datastores are reachable and count rows to migrate
    Validate {
        config: PathBuf,
    },
    /// Verify data integrity between source and target
    Verify {
        config: PathBuf,
    },
    /// List the tables that can be migrated
    Tables,
}

fn load(path: &Path) -> anyhow::Result<MigratorConfig> {
    load_config(path).with_context(|| format!("Failed to load config {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging - default to INFO level if RUST_LOG not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let registry = default_registry();

    match cli.command {
        Commands::Migrate {
            config,
            tables,
            on_duplicate,
            yes,
        } => {
            let mut config = load(&config)?;
            if let Some(tables) = tables {
                config.tables = tables;
            }
            if let Some(policy) = on_duplicate {
                config.action_on_dup = policy;
            }
            commands::migrate(&config, &registry, yes).await?;
            Ok(())
        }
        Commands::Validate { config } => {
            let config = load(&config)?;
            commands::validate(&config, &registry).await?;
            Ok(())
        }
        Commands::Verify { config } => {
            let config = load(&config)?;
            commands::verify(&config, &registry).await?;
            Ok(())
        }
        Commands::Tables => {
            commands::tables(&registry);
            Ok(())
        }
    }
}
