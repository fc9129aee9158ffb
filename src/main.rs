// SPDX-License-Identifier: MIT

//! Re-Circuit API Server

use recircuit::{
    config::{Config, StoreBackend},
    db::Db,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Re-Circuit API");

    let db = match config.store_backend {
        StoreBackend::Firestore => Db::firestore(&config.gcp_project_id).await?,
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data will not survive a restart");
            Db::in_memory()
        }
    };
    tracing::info!(backend = db.backend_name(), "Database ready");

    if config.gemini_api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY not set; AI features are disabled");
    }

    let state = Arc::new(AppState::new(config.clone(), db));
    let app = recircuit::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("recircuit=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
