mod analytics;
mod config;
mod db;
mod engine;
mod error;
mod grading;
mod metrics;
mod model;
mod routes;
mod server;
mod settings;
mod simulator;
mod state;

use clap::Parser;
use std::sync::Arc;
use tracing::info;

use config::{CliArgs, ServerConfig};
use db::EvalDb;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voiceval_server=info,tower_http=info".into()),
        )
        .init();

    let args = CliArgs::parse();
    info!("Starting voiceval-server v{}", env!("CARGO_PKG_VERSION"));
    info!("Data dir: {:?}", args.data_dir);

    let config = ServerConfig::from_args(args);
    let port = config.port;

    let db = EvalDb::new(&config.data_dir)?;
    let persisted = settings::load_settings(&config.settings_path());

    let state = Arc::new(AppState::new(config, db, persisted));

    let router = server::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await?;

    info!("Server shutting down");
    Ok(())
}

async fn shutdown_signal(state: Arc<AppState>) {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal");

    // Ask a running eval batch to stop between trials
    let mut eval = state.evaluation.write().await;
    if let Some(tx) = eval.stop_tx.take() {
        let _ = tx.send(true);
    }
    let _ = state.shutdown_tx.send(());
}
