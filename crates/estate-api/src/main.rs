//! Estate API Server

use anyhow::Context;
use estate_api::{
    create_router,
    integrations::{BrevoMailer, CloudinaryStore},
    state::{AppState, Backends},
};
use estate_core::{AppConfig, LoggingConfig};
use estate_store::SurrealStore;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    init_tracing(&config.logging);

    let store = SurrealStore::new(&config.database)
        .await
        .context("Failed to connect to SurrealDB")?;
    store
        .init_schema()
        .await
        .context("Failed to initialise the database schema")?;
    let store = Arc::new(store);

    let backends = Backends {
        users: store.clone(),
        catalog: store,
        images: Arc::new(CloudinaryStore::new(&config.storage)),
        mailer: Arc::new(BrevoMailer::new(&config.mail)),
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let environment = config.server.environment;

    let state = Arc::new(AppState::new(config, backends));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(?environment, "Estate API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
