/// Server setup and initialization
///
/// Wires together all components: database, session manager, and HTTP routes.
/// Provides the main application factory function for creating the Axum app.

use crate::{
    api::{create_case_routes, create_checkpoint_routes, create_stage_routes, AppState},
    config::Config,
    persistence::database,
    session::SessionManager,
};
use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Create the main Axum application with all routes
///
/// Opens the workflow database and builds the router around a fresh session
/// manager.
pub async fn create_app(config: Config) -> Result<Router> {
    tracing::info!("📁 Ensuring data directory exists: {}", config.database.data_dir);
    let pool = database::connect(&config.database.data_dir)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open workflow database: {}", e))?;

    tracing::info!("🏗️ Initializing session manager");
    let sessions = Arc::new(SessionManager::new(pool, config.workflow.clone()));

    let app = build_router(sessions);

    tracing::info!("✅ Application initialized successfully");

    Ok(app)
}

/// Assemble the HTTP router around a session manager
pub fn build_router(sessions: Arc<SessionManager>) -> Router {
    let app_state = AppState { sessions };

    tracing::info!("📡 Creating HTTP router with all endpoints");
    Router::new()
        // Health check endpoint
        .route("/healthz", get(health_check))
        // Case workflow API routes
        .merge(create_case_routes())
        .merge(create_checkpoint_routes())
        .merge(create_stage_routes())
        .with_state(app_state)
}

/// Start the HTTP server with the given configuration
///
/// Creates the application and starts the Axum server on the configured address and port.
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting docflow server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
