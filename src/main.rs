use anyhow::Result;
use std::sync::Arc;

mod config;
mod error;
mod logging;
mod routes;
mod services;
pub mod models;

use services::backend::BackendClient;
use services::import::ImportSessions;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    logging::init_logging()?;

    // Load configuration
    let config = config::load_config()?;
    let addr = config.bind_addr;

    // Build our application state
    let state = Arc::new(AppState::new(config)?);

    let app = routes::router(state);

    // Run it
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// Application state
#[derive(Clone)]
pub struct AppState {
    config: config::Config,
    sessions: ImportSessions,
    backend: BackendClient,
}

impl AppState {
    fn new(config: config::Config) -> Result<Self, error::AppError> {
        let backend = BackendClient::new(&config.backend_url, config.backend_timeout)?;
        let sessions = ImportSessions::new(config.import_session_ttl, config.sheet_layout);
        Ok(Self { config, sessions, backend })
    }
}
