use axum::{Extension, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

mod chat;
mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod providers;
mod services;

/// Shared state for request handlers. Per-request configuration comes from
/// the secret store, not from here, so the pool is all that's shared.
pub struct AppState {
    pub db_pool: sqlx::PgPool,
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_logging().expect("Failed to initialize logging");

    // Fail fast when the secret store is unreadable rather than on the first
    // chat request.
    match config::fetch_secret() {
        Ok(config) => {
            let models: usize = config.providers.iter().map(|p| p.models.len()).sum();
            tracing::info!(
                "Chat configuration loaded: {} providers, {} models, cost factor {}",
                config.providers.len(),
                models,
                config.cost_factor
            );
        }
        Err(e) => tracing::warn!("Chat configuration not readable at startup: {}", e),
    }

    let db_pool = db::create_pool()
        .await
        .expect("Failed to create database pool.");

    let shared_state = Arc::new(AppState { db_pool });

    let app = Router::new()
        .merge(handlers::chat::chat_routes())
        .route("/api/status", axum::routing::get(api_status))
        .layer(axum::middleware::from_fn(middleware::logging::request_logging_middleware))
        .layer(CorsLayer::permissive())
        .layer(Extension(shared_state.clone()));

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .expect("Failed to bind server port.");
    tracing::info!("listening on {}", listener.local_addr().unwrap());
    axum::serve(listener, app).await.unwrap();
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,polychat=trace,sqlx=info,reqwest=info,hyper=info".to_string()
        } else {
            "info,polychat=info,sqlx=warn,reqwest=warn,hyper=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    // JSON logging for production, human-readable for development
    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("polychat starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Build mode: {}",
        if cfg!(debug_assertions) { "development" } else { "production" }
    );

    Ok(())
}

// API Status endpoint
async fn api_status(Extension(state): Extension<Arc<AppState>>) -> axum::response::Json<serde_json::Value> {
    use serde_json::json;

    let db_status = match sqlx::query("SELECT 1").fetch_one(&state.db_pool).await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };
    let config_status = match config::fetch_secret() {
        Ok(_) => "configured",
        Err(_) => "not_configured",
    };

    axum::response::Json(json!({
        "status": "operational",
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "database": db_status,
            "chat_config": config_status,
        },
        "endpoints": {
            "status": "/api/status",
            "chat": "/api/chat/*",
        }
    }))
}
