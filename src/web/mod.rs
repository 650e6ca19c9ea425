//! Local JSON API re-exposing the upstream rates fetch.

pub mod routes;

use crate::core::config::ServerConfig;
use crate::core::rates::FundRatesSource;
use anyhow::{Context, Result};
use axum::Router;
use axum::http::{HeaderValue, Method};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn FundRatesSource>,
}

pub fn router(source: Arc<dyn FundRatesSource>, cors_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET]);

    routes::api_routes()
        .fallback(routes::not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { source })
}

pub async fn serve(source: Arc<dyn FundRatesSource>, config: &ServerConfig) -> Result<()> {
    let app = router(source, &config.cors_origins);
    let addr = format!("{}:{}", config.host, config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("API server listening on http://{addr}");
    println!("Serving fund API on http://{addr}/api/funds (Ctrl+C to stop)");

    axum::serve(listener, app)
        .await
        .context("API server stopped unexpectedly")?;
    Ok(())
}
