use super::*;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
};
use client_core::{HttpRecordService, ManagerError, RecordManager, RequestFailure};
use shared::{
    domain::{FieldPatch, Record, RecordFields, RecordId},
    error::{ApiError, ErrorCode},
};
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceExt;

fn test_app() -> (Router, ApiContext) {
    let api = ApiContext::default();
    let app = build_router(Arc::new(AppState { api: api.clone() }), 4 * 1024);
    (app, api)
}

async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

fn json_request(method: &str, uri: &str, value: serde_json::Value) -> Request<Body> {
    let payload = value.to_string();
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("content-length", payload.len())
        .body(Body::from(payload))
        .expect("request")
}

#[tokio::test]
async fn healthz_reports_ok() {
    let (app, _api) = test_app();
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn record_routes_round_trip() {
    let (app, api) = test_app();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/records",
            serde_json::json!({ "name": "Alice", "email": "alice@example.com" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Record = json_body(response).await;
    assert_eq!(created.fields.name, "Alice");

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/records/{}", created.id),
            serde_json::json!({ "name": "Alicia" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Record = json_body(response).await;
    assert_eq!(updated.fields.name, "Alicia");
    assert_eq!(updated.fields.email.as_deref(), Some("alice@example.com"));

    let response = app
        .clone()
        .oneshot(Request::get("/records").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let listed: Vec<Record> = json_body(response).await;
    assert_eq!(listed, vec![updated]);

    let response = app
        .clone()
        .oneshot(
            Request::delete(format!("/records/{}", created.id))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(api.records.is_empty().await);
}

#[tokio::test]
async fn invalid_and_missing_records_return_api_errors() {
    let (app, _api) = test_app();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/records",
            serde_json::json!({ "name": "   " }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let err: ApiError = json_body(response).await;
    assert_eq!(err.code, ErrorCode::Validation);

    let response = app
        .oneshot(json_request(
            "PATCH",
            "/records/nope",
            serde_json::json!({ "name": "Zed" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let err: ApiError = json_body(response).await;
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let (app, api) = test_app();
    let response = app
        .oneshot(json_request(
            "POST",
            "/records",
            serde_json::json!({ "name": "Big", "notes": "x".repeat(8 * 1024) }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(api.records.is_empty().await);
}

async fn spawn_server(api: ApiContext) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = build_router(Arc::new(AppState { api }), 64 * 1024);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn record_manager_converges_with_reference_server() {
    let api = ApiContext::default();
    create_record(&api, RecordFields::new("Alice"))
        .await
        .expect("seed");
    let base = spawn_server(api.clone()).await;
    let service = HttpRecordService::new(&base, Duration::from_secs(2)).expect("service");
    let manager = RecordManager::new(Arc::new(service));

    manager.mount().await.expect("mount");
    let alice = manager.records().await.remove(0);
    let updated = manager
        .update(&alice.id, FieldPatch::default().with_name("Alicia"))
        .await
        .expect("update");
    assert_eq!(updated.fields.name, "Alicia");

    let bob = manager
        .create(RecordFields::new("Bob").with_email("bob@example.com"))
        .await
        .expect("create");
    manager.remove(&alice.id).await.expect("remove");

    assert_eq!(manager.records().await, api.records.list().await);
    assert_eq!(manager.records().await, vec![bob]);

    let err = manager
        .update(&RecordId::from("9"), FieldPatch::default().with_name("x"))
        .await
        .expect_err("unknown id");
    assert_eq!(err, ManagerError::NotFound(RecordId::from("9")));
}

#[tokio::test]
async fn record_deleted_behind_the_managers_back_surfaces_service_error() {
    let api = ApiContext::default();
    let carol = create_record(&api, RecordFields::new("Carol"))
        .await
        .expect("seed");
    let base = spawn_server(api.clone()).await;
    let manager = RecordManager::new(Arc::new(
        HttpRecordService::new(&base, Duration::from_secs(2)).expect("service"),
    ));
    manager.mount().await.expect("mount");

    api.records.delete(&carol.id).await;
    let err = manager
        .update(&carol.id, FieldPatch::default().with_name("Caroline"))
        .await
        .expect_err("stale record");

    assert!(matches!(
        err,
        ManagerError::Request(RequestFailure::Service { status: 404, .. })
    ));
    assert_eq!(manager.get(&carol.id).await, Some(carol));

    manager.load().await.expect("reload");
    assert!(manager.records().await.is_empty());
}
