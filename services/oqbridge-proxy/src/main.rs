use clap::Parser;
use oqbridge_backend::{build_client, ColdStoreClient, HotStoreClient};
use oqbridge_core::Config;
use oqbridge_core::telemetry;
use oqbridge_proxy::build_router;
use oqbridge_proxy::passthrough::Passthrough;
use oqbridge_proxy::state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Tiered search proxy in front of the hot and cold stores.
#[derive(Parser)]
#[command(name = "oqbridge", version)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "oqbridge.toml")]
    config: String,
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
        listen = %cfg.server.listen,
        hot_store = %cfg.hot_store.url,
        cold_store = %cfg.cold_store.url,
        hot_days = cfg.retention.hot_days,
        "oqbridge proxy starting"
    );

    if let Err(err) = run(cfg).await {
        error!(error = %err, "server terminated with error");
        std::process::exit(1);
    }

    info!("oqbridge stopped");
}

async fn run(cfg: Arc<Config>) -> Result<(), Box<dyn std::error::Error>> {
    let hot = Arc::new(HotStoreClient::from_config(&cfg.hot_store)?);
    let cold = Arc::new(ColdStoreClient::from_config(&cfg.cold_store, false)?);
    let passthrough = Arc::new(Passthrough::new(
        cfg.hot_store.url.clone(),
        build_client(&cfg.hot_store.tls)?,
    ));

    let state = AppState::new(cfg.clone(), hot, cold, passthrough);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&cfg.server.listen).await?;
    info!(addr = %cfg.server.listen, "proxy listening");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    info!("shutting down...");
    let _ = shutdown_tx.send(());

    // Drain in-flight requests within the grace period, then give up.
    match tokio::time::timeout(Duration::from_secs(30), server).await {
        Ok(joined) => joined??,
        Err(_) => warn!("graceful shutdown timed out"),
    }
    Ok(())
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
