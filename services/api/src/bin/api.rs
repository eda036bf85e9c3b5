//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{HttpRemoteStore, PgLocalStore, TextExtractor},
    config::Config,
    error::ApiError,
    web::{router, rest::ApiDoc, state::AppState, sync_task::auto_sync},
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use reader_core::store::LibraryStore;
use reader_core::sync::SyncReconciler;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let local_store = Arc::new(PgLocalStore::new(db_pool));
    info!("Running database migrations...");
    local_store.run_migrations().await?;
    info!("Database migrations complete.");
    let store = LibraryStore::new(local_store);

    // --- 3. Initialize Service Adapters ---
    let extractor = Arc::new(TextExtractor::new(config.words_per_page));
    let sync = match &config.remote {
        Some(remote) => {
            info!(base_url = %remote.base_url, user = %remote.user_id, "Remote store configured.");
            let remote_store = Arc::new(HttpRemoteStore::new(
                reqwest::Client::new(),
                remote.clone(),
            ));
            Some(SyncReconciler::new(remote_store, store.clone()))
        }
        None => {
            info!("No remote store configured, sync is disabled.");
            None
        }
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::load(config.clone(), store, sync, extractor).await?);
    if app_state.sync.is_some() {
        tokio::spawn(auto_sync(
            app_state.clone(),
            app_state.shutdown.child_token(),
        ));
    }

    // --- 5. Create the Web Router ---
    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(router(app_state.clone()).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(app_state.shutdown.clone()))
        .await?;

    // --- 7. Close Open Books and Save Everything ---
    info!("Shutting down: closing open books and saving the library.");
    app_state.close_all().await;
    if let Err(e) = app_state.flush_all().await {
        error!("Failed to save the library on shutdown: {}", e);
        return Err(e.into());
    }
    info!("Shutdown complete.");
    Ok(())
}

/// Waits for Ctrl-C, then cancels every timer and WebSocket so the server can drain.
async fn shutdown_signal(shutdown: tokio_util::sync::CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for the shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    shutdown.cancel();
}
