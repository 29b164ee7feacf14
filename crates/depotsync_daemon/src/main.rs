//! depotsync daemon
//!
//! Long-lived synchronizer keeping client package targets converged with
//! the store catalog.
//!
//! # Commands
//!
//! - `run` - Run the poll loop (default); `--once` runs a single cycle
//! - `init-db` - Create the SQLite schema and exit

mod config;
mod runner;

use clap::{Parser, Subcommand};
use config::DaemonConfig;
use depotsync_engine::{HttpStoreClient, SqliteRecordStore, SyncEngine};
use runner::ShutdownFlag;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Package distribution sync daemon.
#[derive(Parser)]
#[command(name = "depotsyncd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sync loop
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Create the sync state database schema
    InitDb,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = DaemonConfig::load(cli.config.as_deref())?;

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command.unwrap_or(Commands::Run { once: false }) {
        Commands::InitDb => {
            SqliteRecordStore::open(&config.database_path)?;
            println!("Initialized schema in {}", config.database_path.display());
            Ok(())
        }
        Commands::Run { once } => run(config, once).await,
    }
}

async fn run(config: DaemonConfig, once: bool) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        store = %config.store_base_url,
        database = %config.database_path.display(),
        poll_interval_secs = config.poll_interval_secs,
        "depotsyncd starting"
    );

    let flag = ShutdownFlag::new();
    let signal_flag = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing current cycle");
            signal_flag.request();
        }
    });

    // The engine is fully synchronous (blocking HTTP client, SQLite),
    // so it lives on a blocking task for its whole lifetime.
    let poll_interval = config.poll_interval();
    tokio::task::spawn_blocking(move || -> Result<(), depotsync_engine::SyncError> {
        let sync_config = config.sync_config();
        let store = HttpStoreClient::new(&sync_config)?;
        let records = SqliteRecordStore::open(&config.database_path)?;
        let engine = SyncEngine::new(sync_config, store, records);

        if once {
            let report = engine.run_cycle()?;
            info!(
                rows = report.rows,
                converged = report.converged,
                updated = report.updated,
                failed = report.failed,
                "single cycle complete"
            );
            return Ok(());
        }

        runner::run_loop(&engine, poll_interval, &flag);
        Ok(())
    })
    .await??;

    Ok(())
}
