use std::io;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use log::{error, info};

use capture_vault::app_state::AppState;
use capture_vault::config::AppConfig;
use capture_vault::logging;
use capture_vault::service::{self, deletion_worker::DeletionWorker};

#[actix_web::main]
async fn main() -> io::Result<()> {
    let config = AppConfig::load().map_err(|e| io::Error::other(format!("Failed to load configuration: {}", e)))?;
    logging::init(&config.logging);
    info!("Loaded configuration: {:?}", config);

    let state = AppState::from_config(config.clone()).map_err(|e| {
        error!("Failed to initialize store: {}", e);
        e
    })?;

    let worker = config
        .deletion
        .enabled
        .then(|| DeletionWorker::new(state.store.clone(), &config.deletion).start_background());

    let data = web::Data::new(state.clone());
    let max_payload_size = config.server.max_payload_size;

    info!("Starting server on {}:{}", config.server.host, config.server.port);
    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(data.clone())
            .app_data(service::json_config(max_payload_size))
            .configure(service::configure)
    })
    .workers(config.server.workers.max(1))
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    info!("Server stopped, draining in-flight uploads");
    if let Some(handle) = worker {
        handle.abort();
    }
    let store = state.store.clone();
    let timeout = Duration::from_secs(config.server.shutdown_timeout);
    let max_attempts = config.deletion.max_attempts;
    let report = tokio::task::spawn_blocking(move || {
        store.shutdown(timeout);
        store.retry_pending_deletions(max_attempts)
    })
    .await
    .map_err(io::Error::other)?;
    if report.requeued > 0 {
        error!("{} orphaned photos could not be deleted before exit", report.requeued);
    }
    Ok(())
}
