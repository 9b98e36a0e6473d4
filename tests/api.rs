mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use common::{pipeline_with, seed_product, topic_reviews, FixedLabeler, TopicEmbedder, ASIN_A};
use review_lens::{
    api::{router, AppState},
    data::memory::MemoryStore,
};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn app() -> Router {
    let store = Arc::new(MemoryStore::default());
    seed_product(&store, ASIN_A, &topic_reviews()).await;
    let pipeline = pipeline_with(store, Arc::new(TopicEmbedder), Arc::new(FixedLabeler));
    router(AppState::new(pipeline, 3))
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn user_lifecycle() {
    let app = app().await;
    let (status, created) = call(&app, "POST", "/users", Some(json!({ "email": "a@b.c" }))).await;
    assert_eq!(status, StatusCode::OK);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _) = call(
        &app,
        "POST",
        &format!("/users/{id}/subscribe"),
        Some(json!({ "package": "pro" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, user) = call(&app, "GET", &format!("/users/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["remainingInvestigations"], 100);

    let (status, _) = call(
        &app,
        "POST",
        "/investigations",
        Some(json!({ "userId": id, "asinList": [ASIN_A] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, user) = call(&app, "GET", &format!("/users/{id}"), None).await;
    assert_eq!(user["remainingInvestigations"], 99);

    let (status, _) = call(&app, "GET", "/users/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn investigation_run_and_report() {
    let app = app().await;
    let (status, investigation) = call(
        &app,
        "POST",
        "/investigations",
        Some(json!({ "userId": "u1", "asinList": [ASIN_A] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(investigation["status"], "started");
    let id = investigation["id"].as_str().unwrap().to_string();

    let (status, outcome) = call(
        &app,
        "POST",
        &format!("/investigations/{id}/run"),
        Some(json!({ "clusters": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["clusters"], 3);

    let (status, snapshot) = call(&app, "GET", &format!("/modeling/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["clusters"].as_array().unwrap().len(), 3);

    let (status, report) = call(&app, "GET", &format!("/reports/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["clusteredReviews"], 12);
    assert_eq!(report["totalReviews"], 12);

    let (status, _) = call(&app, "GET", &format!("/reports/{id}/attributes"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, investigation) = call(&app, "GET", &format!("/investigations/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(investigation["status"], "completed");

    let (status, _) = call(&app, "POST", &format!("/investigations/{id}/run"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bad_investigation_requests_are_client_errors() {
    let app = app().await;
    let (status, _) = call(&app, "POST", "/investigations", Some(json!({ "userId": "u1" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        "POST",
        "/investigations",
        Some(json!({ "userId": "u1", "asinList": ["short"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, "GET", "/investigations/unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, "GET", "/reports/unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
