use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catalogd::{config::Config, database::Database, ingestor::Supervisor};

#[derive(Parser)]
#[command(name = "catalogd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Media catalog aggregation and enrichment service")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("catalogd={}", cli.log_level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log_filter.into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting catalogd v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }
    info!("Using database: {}", config.database.url);

    let database = Database::new(&config.database).await?;
    database.migrate().await?;
    info!("Database connection established and migrations applied");

    let shutdown = CancellationToken::new();
    let supervisor = Supervisor::new(config, &database, shutdown.clone());
    let handles = supervisor.spawn_all();
    info!("All background loops started");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping loops");
    shutdown.cancel();

    for handle in handles {
        let _ = handle.await;
    }
    info!("Shutdown complete");

    Ok(())
}
