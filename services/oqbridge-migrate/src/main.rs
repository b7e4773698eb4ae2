use clap::Parser;
use oqbridge_backend::{ColdStoreClient, HotStoreClient};
use oqbridge_core::Config;
use oqbridge_core::telemetry;
use oqbridge_migration::{HotCheckpointStore, HotMetricsStore, HotStoreLock, Migrator};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Scheduled migration of aged documents from the hot store to the cold
/// store.
#[derive(Parser)]
#[command(name = "oqbridge-migrate", version)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "oqbridge.toml")]
    config: String,

    /// Run one migration pass synchronously and exit (ignore the schedule).
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let cfg = match Config::load(&args.config) {
        Ok(cfg) => Arc::new(cfg),
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    telemetry::init(&cfg.logging);

    info!(
        hot_store = %cfg.hot_store.url,
        cold_store = %cfg.cold_store.url,
        migrate_after_days = cfg.migration.migrate_after_days,
        workers = cfg.migration.workers,
        batch_size = cfg.migration.batch_size,
        compress = cfg.migration.compress,
        indices = ?cfg.migration.indices,
        "oqbridge-migrate starting"
    );

    let migrator = match build_migrator(&cfg) {
        Ok(migrator) => migrator,
        Err(err) => {
            error!(error = %err, "failed to initialize migrator");
            std::process::exit(1);
        }
    };

    if args.once {
        if let Err(err) = migrator.migrate_all().await {
            error!(error = %err, "migration failed");
            std::process::exit(1);
        }
        info!("migration completed, exiting");
        return;
    }

    if !cfg.migration.enabled {
        info!("migration is disabled in configuration, exiting");
        return;
    }

    // Interval scheduler; the first pass starts one interval after boot.
    let period = Duration::from_secs(cfg.migration.interval_hours * 3600);
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;
    info!(interval_hours = cfg.migration.interval_hours, "migration scheduler started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                info!("scheduled migration starting");
                match migrator.migrate_all().await {
                    Ok(()) => info!("scheduled migration completed"),
                    Err(err) => error!(error = %err, "scheduled migration failed"),
                }
            }
            () = shutdown_signal() => {
                info!("shutting down...");
                break;
            }
        }
    }

    info!("oqbridge-migrate stopped");
}

fn build_migrator(cfg: &Arc<Config>) -> Result<Migrator, Box<dyn std::error::Error>> {
    let hot: Arc<HotStoreClient> = Arc::new(HotStoreClient::from_config(&cfg.hot_store)?);
    let mut cold = ColdStoreClient::from_config(&cfg.cold_store, cfg.migration.compress)?;
    if !cfg.migration.temp_dir.is_empty() {
        info!(temp_dir = %cfg.migration.temp_dir, "migration staging via disk");
        cold = cold.with_temp_dir(&cfg.migration.temp_dir);
    }

    let lock = Arc::new(HotStoreLock::new(hot.clone()));
    let checkpoints = Arc::new(HotCheckpointStore::new(hot.clone()));
    let metrics = Arc::new(HotMetricsStore::new(hot.clone()));

    Ok(
        Migrator::new(cfg.clone(), hot, Arc::new(cold), checkpoints)
            .with_lock(lock)
            .with_metrics(metrics),
    )
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
