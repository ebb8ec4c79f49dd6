use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cairn::config::{Config, DEFAULT_CONFIG_FILE};
use cairn::MigrationVersion;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "cairn")]
#[command(about = "Cairn - versioned schema migrations with search index sync")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Schema store database (overrides [store].path)
    #[arg(long, global = true, env = "CAIRN_DB")]
    db: Option<PathBuf>,

    /// Migration files directory (overrides [migrations].dir)
    #[arg(long, global = true, env = "CAIRN_MIGRATIONS")]
    migrations: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    Up {
        /// Stop after this version (default: latest)
        #[arg(long)]
        to: Option<MigrationVersion>,
    },

    /// Revert applied migrations newer than a version
    Down {
        /// Version to revert to; 0 reverts everything
        #[arg(long)]
        to: MigrationVersion,
    },

    /// Show applied and pending migrations
    Status {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Push queued index attribute updates to the search index
    Sync,

    /// Print a stored collection definition as JSON
    Show {
        /// Collection name or id
        collection: String,
    },
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.observability.log_level.clone()),
    );
    let registry = tracing_subscriber::registry().with(filter);

    // stdout is reserved for command output
    if config.observability.log_format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_create(&cli.config)?;
    if let Some(db) = cli.db {
        config.store.path = db;
    }
    if let Some(dir) = cli.migrations {
        config.migrations.dir = dir;
    }

    init_tracing(&config);
    tracing::debug!(
        config = %cli.config.display(),
        db = %config.store.path.display(),
        migrations = %config.migrations.dir.display(),
        "Loaded configuration"
    );

    match cli.command {
        Commands::Up { to } => commands::run_up(&config, to).await?,
        Commands::Down { to } => commands::run_down(&config, to).await?,
        Commands::Status { json } => commands::run_status(&config, json)?,
        Commands::Sync => commands::run_sync(&config).await?,
        Commands::Show { collection } => commands::run_show(&config, &collection)?,
    }

    Ok(())
}
