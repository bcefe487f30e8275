use std::sync::Arc;

use delivery_timeline::api;
use delivery_timeline::config::{Config, LogFormat};
use delivery_timeline::error::AppError;
use delivery_timeline::state::{sweep_delivered, AppState};
use delivery_timeline::upstream::HttpOrderBackend;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    match config.log_format {
        LogFormat::Compact => subscriber.compact().init(),
        LogFormat::Json => subscriber.json().init(),
    }

    let backend = HttpOrderBackend::new(&config.upstream_url, config.upstream_timeout)
        .map_err(|err| AppError::Internal(format!("failed to build upstream client: {err}")))?;

    let shared_state = Arc::new(AppState::new(
        Arc::new(backend),
        config.tick_interval,
        config.event_buffer_size,
    ));

    let sweeper = tokio::spawn(sweep_delivered(shared_state.clone(), config.sweep_interval));

    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        upstream = %config.upstream_url,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    sweeper.abort();
    shared_state.shutdown();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
