pub mod health;
pub mod routes;

use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::export::ExportJob;
use crate::images::ImageFetcher;
use crate::models::AppConfig;
use crate::storage::BlobStore;
use crate::upstream::TableClient;

/// Shared application state for the Axum server.
pub struct AppState {
    pub store: Arc<dyn BlobStore>,
    pub tables: Arc<dyn TableClient>,
    pub images: Arc<dyn ImageFetcher>,
    pub export: Arc<ExportJob>,
    pub config: Arc<AppConfig>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<dyn BlobStore>,
        tables: Arc<dyn TableClient>,
        images: Arc<dyn ImageFetcher>,
        config: Arc<AppConfig>,
    ) -> Self {
        let export = Arc::new(ExportJob::new(
            store.clone(),
            tables.clone(),
            config.clone(),
        ));
        Self {
            store,
            tables,
            images,
            export,
            config,
            start_time: Instant::now(),
        }
    }
}

/// Create the Axum router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let document_path = format!("/{}", state.config.object_key);
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/regenerate", post(routes::regenerate))
        .route("/api/prewarm", post(routes::prewarm_images))
        .route(&document_path, get(routes::get_document))
        .route("/img/{record}/{index}", get(routes::image_proxy))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}
