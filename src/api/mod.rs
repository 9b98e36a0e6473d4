//! HTTP layer exposing users, investigations, and cluster reports.

pub mod routes;
pub mod types;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{config::Settings, pipeline::Pipeline};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Cluster count used when a run request does not name one.
    pub default_clusters: usize,
}

impl AppState {
    pub fn new(pipeline: Pipeline, default_clusters: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            default_clusters,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/users", post(routes::create_user))
        .route("/users/:id", get(routes::get_user))
        .route("/users/:id/subscribe", post(routes::subscribe))
        .route("/investigations", post(routes::start_investigation))
        .route("/investigations/:id", get(routes::get_investigation))
        .route("/investigations/:id/run", post(routes::run_investigation))
        .route("/modeling/:id", get(routes::get_clusters))
        .route("/reports/:id", get(routes::get_report))
        .route("/reports/:id/attributes", get(routes::get_attribute_report))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(settings: Settings, host: String, port: u16) -> Result<()> {
    let state = AppState::new(Pipeline::from_settings(&settings)?, settings.default_clusters);
    let app = router(state);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!(%addr, "serving review-lens API");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(%err, "ctrl-c handler unavailable; serving until killed");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
