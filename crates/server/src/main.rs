use std::{net::SocketAddr, path::Path, sync::Arc};

use anyhow::anyhow;
use axum::{routing::get, Router};
use server_api::{create_record, ApiContext};
use shared::protocol::{HEALTH_ROUTE, RECORDS_ROUTE, RECORD_ROUTE};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;

use api::{
    healthz, http_create_record, http_delete_record, http_list_records, http_update_record,
};
use app_state::AppState;
use config::{load_seed_file, load_settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let api = ApiContext::default();
    if let Some(seed_file) = &settings.seed_file {
        let count = seed_records(&api, Path::new(seed_file)).await?;
        info!(%seed_file, count, "seeded record table");
    }

    let app = build_router(Arc::new(AppState { api }), settings.max_body_bytes);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "record server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn seed_records(api: &ApiContext, path: &Path) -> anyhow::Result<usize> {
    let seed = load_seed_file(path)?;
    let count = seed.len();
    for fields in seed {
        create_record(api, fields)
            .await
            .map_err(|err| anyhow!("invalid seed record: {}", err.message))?;
    }
    Ok(count)
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route(HEALTH_ROUTE, get(healthz))
        .route(
            RECORDS_ROUTE,
            get(http_list_records).post(http_create_record),
        )
        .route(
            RECORD_ROUTE,
            axum::routing::put(http_update_record)
                .patch(http_update_record)
                .delete(http_delete_record),
        )
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
