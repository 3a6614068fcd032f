//! qviz-api - HR/QVT survey visualization service
//!
//! Ingests an HR dataset and an optional employee-survey dataset, validates
//! and normalizes them, and routes them through a registered visualization
//! strategy to produce a declarative chart specification.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use qviz_api::{build_router, AppState, ChartService};
use qviz_common::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .init();

    info!("Starting QVIZ visualization API v{}", env!("CARGO_PKG_VERSION"));

    let registry = Arc::new(qviz_api::registry::default_registry());
    info!("Registered {} visualization strategies", registry.list_keys().len());

    let bind = settings.bind.clone();
    let service = ChartService::new(settings, registry);
    let state = AppState::new(service);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("qviz-api listening on http://{}", bind);

    axum::serve(listener, app).await?;

    Ok(())
}
