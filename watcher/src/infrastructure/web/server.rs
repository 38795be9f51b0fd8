// Web server for the submission and admin surface

use axum::http::{header, Method};
use log::{error, info};
use std::net::SocketAddr;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;

use super::routes::{create_router, AppState};

/// Start the HTTP server; returns when the shutdown signal flips.
pub async fn start_server(config: &AppConfig, state: AppState, mut shutdown: watch::Receiver<bool>) {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_origin(Any);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api.port));
    info!("Starting web server on http://localhost:{}", config.api.port);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            return;
        }
    };

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await;

    if let Err(e) = result {
        error!("Web server error: {}", e);
    }
}
