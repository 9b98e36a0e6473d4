//! HTTP route handlers for Axum.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use tracing::{error, warn};

use crate::{
    api::types::{CreatedDto, RunRequest, StartInvestigationRequest, SubscribeRequest},
    clusters::InsightReport,
    data::{
        investigations::{self, Investigation},
        store::Document,
        users::{self, Subscription},
        CLUSTERS, INVESTIGATIONS, USERS,
    },
    error::PipelineError,
    pipeline::{self, AttributeReport, ClusterSnapshot, PipelineOutcome},
};

use super::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

/// Client mistakes are echoed back; anything else is logged and hidden.
fn reject(err: PipelineError) -> (StatusCode, String) {
    if err.is_client_error() {
        warn!(%err, "rejected request");
        return (StatusCode::BAD_REQUEST, err.to_string());
    }
    match err {
        PipelineError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        other => {
            error!(err = %other, "request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
    }
}

pub async fn create_user(
    states: State<AppState>,
    Json(profile): Json<Value>,
) -> ApiResult<CreatedDto> {
    let store = states.pipeline.store().as_ref();
    let id = users::create_user(store, profile).await.map_err(reject)?;
    Ok(Json(CreatedDto { id }))
}

pub async fn get_user(Path(id): Path<String>, states: State<AppState>) -> ApiResult<Document> {
    let store = states.pipeline.store().as_ref();
    users::get_user(store, &id)
        .await
        .map_err(reject)?
        .map(Json)
        .ok_or_else(|| reject(PipelineError::not_found(USERS, &id)))
}

pub async fn subscribe(
    Path(id): Path<String>,
    states: State<AppState>,
    Json(body): Json<SubscribeRequest>,
) -> ApiResult<Subscription> {
    let store = states.pipeline.store().as_ref();
    let subscription = users::subscribe_user(store, &id, body.package)
        .await
        .map_err(reject)?;
    Ok(Json(subscription))
}

pub async fn start_investigation(
    states: State<AppState>,
    Json(body): Json<StartInvestigationRequest>,
) -> ApiResult<Investigation> {
    let user_id = body
        .user_id
        .ok_or_else(|| reject(PipelineError::MissingField("userId")))?;
    let asins = body
        .asin_list
        .ok_or_else(|| reject(PipelineError::MissingField("asinList")))?;
    let store = states.pipeline.store().as_ref();
    let investigation = investigations::start_investigation(store, &user_id, &asins)
        .await
        .map_err(reject)?;
    Ok(Json(investigation))
}

pub async fn get_investigation(
    Path(id): Path<String>,
    states: State<AppState>,
) -> ApiResult<Investigation> {
    let store = states.pipeline.store().as_ref();
    investigations::get_investigation(store, &id)
        .await
        .map_err(reject)?
        .map(Json)
        .ok_or_else(|| reject(PipelineError::not_found(INVESTIGATIONS, &id)))
}

pub async fn run_investigation(
    Path(id): Path<String>,
    states: State<AppState>,
    body: Option<Json<RunRequest>>,
) -> ApiResult<PipelineOutcome> {
    let k = body
        .and_then(|Json(req)| req.clusters)
        .unwrap_or(states.default_clusters);
    let outcome = states.pipeline.run(&id, k).await.map_err(reject)?;
    Ok(Json(outcome))
}

pub async fn get_clusters(
    Path(id): Path<String>,
    states: State<AppState>,
) -> ApiResult<ClusterSnapshot> {
    let store = states.pipeline.store().as_ref();
    pipeline::load_clusters(store, &id)
        .await
        .map_err(reject)?
        .map(Json)
        .ok_or_else(|| reject(PipelineError::not_found(CLUSTERS, &id)))
}

pub async fn get_report(
    Path(id): Path<String>,
    states: State<AppState>,
) -> ApiResult<InsightReport> {
    let store = states.pipeline.store().as_ref();
    let report = pipeline::load_report(store, &id).await.map_err(reject)?;
    Ok(Json(report))
}

pub async fn get_attribute_report(
    Path(id): Path<String>,
    states: State<AppState>,
) -> ApiResult<AttributeReport> {
    let store = states.pipeline.store().as_ref();
    let report = pipeline::load_attribute_report(store, &id)
        .await
        .map_err(reject)?;
    Ok(Json(report))
}
