use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use greenmind_predictor::{build_router, ModelLoader, PredictionService, ServiceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = ServiceConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        bind_addr = %cfg.bind_addr,
        model_path = ?cfg.model_path,
        log_predictions = cfg.log_predictions,
        "starting"
    );

    // One-shot load; a miss leaves the service up with health only.
    let state = ModelLoader::new().load(&cfg.model_candidates());
    tracing::info!(model = ?state, "model state");

    let svc = PredictionService::new(state).log_predictions(cfg.log_predictions);
    let app = build_router(Arc::new(svc));

    tracing::info!("listening on {}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(cfg.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind_addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
