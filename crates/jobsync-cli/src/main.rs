use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use jobsync_storage::{OfferStore, PgOfferStore};
use jobsync_sync::{build_pipeline, start_scheduler, SyncConfig, SyncSession};
use jobsync_web::AppState;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "jobsync")]
#[command(about = "France Travail offer ingester")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Liveness listener plus the poll loop, until Ctrl-C.
    Serve,
    /// Run a single poll cycle.
    Sync,
    /// Delete offers older than the retention window.
    Sweep,
    /// Create the offer tables if missing.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve().await?,
        Commands::Sync => {
            let summary = jobsync_sync::run_sync_once_from_env().await?;
            println!(
                "sync complete: cycle={} fetched={} inserted={} duplicates={} failed={} filtered={} swept={}",
                summary.cycle,
                summary.fetched,
                summary.inserted,
                summary.duplicates,
                summary.failed,
                summary.filtered_out,
                summary.swept.unwrap_or(0)
            );
        }
        Commands::Sweep => {
            let deleted = jobsync_sync::sweep_once_from_env().await?;
            println!("sweep complete: deleted={deleted}");
        }
        Commands::Migrate => {
            jobsync_sync::migrate_from_env().await?;
            println!("schema ready");
        }
    }

    Ok(())
}

async fn serve() -> Result<()> {
    let config = SyncConfig::from_env();
    let store = PgOfferStore::connect_lazy(&config.database_url)?;
    if let Err(err) = store.ensure_schema().await {
        warn!("schema bootstrap failed; cycles will retry against the database: {err:#}");
    }
    let store: Arc<dyn OfferStore> = Arc::new(store);
    let pipeline = Arc::new(build_pipeline(&config, store)?);
    let session = Arc::new(SyncSession::new());

    let mut scheduler = start_scheduler(pipeline, session.clone(), config.poll_interval).await?;
    info!(port = config.port, "jobsync started");
    let served = jobsync_web::serve(config.port, AppState::new(session)).await;
    scheduler.shutdown().await?;
    served
}
