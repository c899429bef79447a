use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use parcel_dispatch::adapters::http::HttpBackend;
use parcel_dispatch::adapters::simulated::SimulatedBackend;
use parcel_dispatch::adapters::storage::FileBlobStorage;
use parcel_dispatch::api;
use parcel_dispatch::config::Config;
use parcel_dispatch::engine::notifications::run_notification_worker;
use parcel_dispatch::error::AppError;
use parcel_dispatch::ports::NotificationSink;
use parcel_dispatch::state::{AppState, Collaborators};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let storage = Arc::new(FileBlobStorage::new(&config.storage_dir));
    let (collaborators, sink): (Collaborators, Arc<dyn NotificationSink>) = match &config.backend_url {
        Some(url) => {
            let backend = Arc::new(
                HttpBackend::new(url, Duration::from_millis(config.backend_timeout_ms))
                    .map_err(|err| AppError::Internal(err.to_string()))?,
            );
            tracing::info!(backend_url = %url, "using http backend");
            let sink: Arc<dyn NotificationSink> = backend.clone();
            (
                Collaborators {
                    package_api: backend.clone(),
                    directory_api: backend,
                    storage,
                },
                sink,
            )
        }
        None => {
            let backend = Arc::new(
                SimulatedBackend::new(Duration::from_millis(config.simulated_latency_ms))
                    .with_demo_couriers(),
            );
            tracing::warn!("BACKEND_URL not set; using simulated backend");
            let sink: Arc<dyn NotificationSink> = backend.clone();
            (
                Collaborators {
                    package_api: backend.clone(),
                    directory_api: backend,
                    storage,
                },
                sink,
            )
        }
    };

    let (app_state, notification_rx) = AppState::new(&config, collaborators);
    let shared_state = Arc::new(app_state);

    tokio::spawn(run_notification_worker(
        sink,
        shared_state.metrics.clone(),
        notification_rx,
    ));

    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        station_id = %config.station_id,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
