//! services/gateway/src/bin/gateway.rs

use academy_core::memory::MemoryBackend;
use academy_core::AuthProvider;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use gateway_lib::{
    adapters::{Connector, RestBackend},
    config::{BackendMode, Config},
    error::ApiError,
    web::{build_router, state::AppState, ApiDoc},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
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
    info!("Configuration loaded. Starting gateway...");

    // --- 2. Initialize the Backend Adapter ---
    let (connector, auth): (Arc<dyn Connector>, Arc<dyn AuthProvider>) = match &config.backend {
        BackendMode::Remote { url, anon_key } => {
            info!("Using remote backend at {}", url);
            let http = reqwest::Client::builder()
                .build()
                .map_err(|e| ApiError::Internal(format!("HTTP client: {}", e)))?;
            let rest = Arc::new(RestBackend::new(http, url.clone(), anon_key.clone()));
            (rest.clone() as Arc<dyn Connector>, rest as Arc<dyn AuthProvider>)
        }
        BackendMode::Memory => {
            warn!("Using the in-memory backend; data is lost on restart");
            let memory = MemoryBackend::new();
            let seed = memory.seed_demo().await?;
            info!(user_id = %seed.student_id, "Demo student token: {}", seed.student_token);
            info!(user_id = %seed.admin_id, "Demo admin token: {}", seed.admin_token);
            let memory = Arc::new(memory);
            (memory.clone() as Arc<dyn Connector>, memory as Arc<dyn AuthProvider>)
        }
    };

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(connector, auth, config.clone()));

    let origin = config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS origin '{}': {}", config.cors_origin, e)))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 4. Create the Web Router ---
    let api_router = build_router(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
