//! HTTP surface: router construction and server startup.

pub mod error;
pub mod handlers;
pub mod models;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::LembarError;
use crate::process::OcrPipeline;

/// Build the application router around an assembled pipeline.
///
/// Any origin may call the two endpoints with `GET`/`POST`/`OPTIONS` and a
/// `Content-Type` header; request bodies are capped at the configured upload
/// limit before the handler runs.
pub fn create_app(pipeline: Arc<OcrPipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/api/upload", post(handlers::upload))
        .layer(DefaultBodyLimit::max(pipeline.config().max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(pipeline)
}

/// Bind the configured port and serve until the process exits.
///
/// The upload directory is created here if missing, so a fresh deployment
/// needs no manual setup.
pub async fn start_server(pipeline: Arc<OcrPipeline>) -> Result<(), LembarError> {
    let config = pipeline.config().clone();

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("OCR backend listening on port {}", config.port);
    info!("API base URL: http://localhost:{}", config.port);
    info!("Inference endpoint: {}", config.inference_url);
    info!("Inference model: {}", config.inference_model);

    axum::serve(listener, create_app(pipeline)).await?;
    Ok(())
}
