//! qviz-api library: HTTP surface for the visualization service
//!
//! The binary wires settings, registry and service together; everything
//! else lives here so integration tests can drive the router directly.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowHeaders, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use qviz_common::config::CorsOrigins;

pub mod api;
pub mod cache;
pub mod registry;
pub mod service;
pub mod strategies;

pub use service::ChartService;

/// Uploads above this size are rejected before parsing
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ChartService>,
}

impl AppState {
    pub fn new(service: ChartService) -> Self {
        AppState {
            service: Arc::new(service),
        }
    }
}

/// CORS policy from settings: a wildcard origin never allows credentials,
/// an explicit origin list does
fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    match origins {
        CorsOrigins::Any => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsOrigins::List(list) => {
            let origins: Vec<HeaderValue> =
                list.iter().filter_map(|origin| origin.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(AllowHeaders::mirror_request())
                .allow_credentials(true)
        }
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.service.settings().cors_origins);

    Router::new()
        .route("/api/visualize/supported-keys", get(api::visualize::supported_keys))
        .route("/api/visualize/:chart_key", post(api::visualize::visualize))
        .merge(api::health::health_routes())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
