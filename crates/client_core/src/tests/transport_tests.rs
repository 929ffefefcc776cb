use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde_json::{json, Value};
use shared::error::ErrorCode;
use tokio::{net::TcpListener, sync::Mutex};

use super::*;

#[derive(Clone, Default)]
struct ServerState {
    seen_ids: Arc<Mutex<Vec<String>>>,
    created: Arc<Mutex<Vec<Value>>>,
}

async fn list_records() -> Json<Value> {
    Json(json!([
        { "_id": "65f0c1", "name": "Alice", "email": "alice@example.com", "__v": 0 },
        { "id": "2", "name": "Bob", "status": "inactive", "updated_at": "2024-05-01T12:00:00Z" }
    ]))
}

async fn create_record(State(state): State<ServerState>, Json(body): Json<Value>) -> Json<Value> {
    state.created.lock().await.push(body.clone());
    let mut record = body;
    record["id"] = json!("new-1");
    Json(record)
}

async fn patch_record(
    State(state): State<ServerState>,
    Path(record_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<ApiError>)> {
    state.seen_ids.lock().await.push(record_id.clone());
    if record_id == "missing" {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ApiError::new(ErrorCode::NotFound, "record missing not found")),
        ));
    }
    Ok(Json(json!({ "id": record_id, "name": body["name"] })))
}

async fn delete_record(Path(record_id): Path<String>) -> (StatusCode, &'static str) {
    if record_id == "locked" {
        (StatusCode::INTERNAL_SERVER_ERROR, "database offline")
    } else {
        (StatusCode::NO_CONTENT, "")
    }
}

async fn slow_records() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!([]))
}

async fn broken_records() -> &'static str {
    "not json"
}

async fn spawn_record_server() -> Result<(String, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route("/api/records", get(list_records).post(create_record))
        .route(
            "/api/records/:record_id",
            patch(patch_record).delete(delete_record),
        )
        .route("/slow/records", get(slow_records))
        .route("/broken/records", get(broken_records))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

fn service(url: &str) -> HttpRecordService {
    HttpRecordService::new(url, Duration::from_millis(500)).expect("service")
}

#[tokio::test]
async fn list_decodes_records_from_both_id_styles() {
    let (base, _state) = spawn_record_server().await.expect("server");
    let records = service(&format!("{base}/api"))
        .list()
        .await
        .expect("list");

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, RecordId::from("65f0c1"));
    assert_eq!(records[0].fields.extra.get("__v"), Some(&json!(0)));
    assert_eq!(records[1].id, RecordId::from("2"));
    assert_eq!(
        records[1].fields.status,
        Some(shared::domain::RecordStatus::Inactive)
    );
    assert!(records[1].updated_at.is_some());
}

#[tokio::test]
async fn create_posts_fields_and_returns_assigned_id() {
    let (base, state) = spawn_record_server().await.expect("server");
    let record = service(&format!("{base}/api/"))
        .create(&RecordFields::new("Carol").with_email("carol@example.com"))
        .await
        .expect("create");

    assert_eq!(record.id, RecordId::from("new-1"));
    assert_eq!(record.fields.name, "Carol");
    assert_eq!(
        state.created.lock().await.as_slice(),
        &[json!({ "name": "Carol", "email": "carol@example.com" })]
    );
}

#[tokio::test]
async fn update_escapes_id_in_path() {
    let (base, state) = spawn_record_server().await.expect("server");
    let record = service(&format!("{base}/api"))
        .update(
            &RecordId::from("a b/c"),
            &FieldPatch::default().with_name("Alicia"),
        )
        .await
        .expect("update");

    assert_eq!(record.id, RecordId::from("a b/c"));
    assert_eq!(record.fields.name, "Alicia");
    assert_eq!(state.seen_ids.lock().await.as_slice(), ["a b/c".to_string()]);
}

#[tokio::test]
async fn service_error_carries_status_and_api_message() {
    let (base, _state) = spawn_record_server().await.expect("server");
    let err = service(&format!("{base}/api"))
        .update(&RecordId::from("missing"), &FieldPatch::default().with_name("x"))
        .await
        .expect_err("404");

    assert_eq!(
        err,
        RequestFailure::Service {
            status: 404,
            message: "record missing not found".into(),
        }
    );
}

#[tokio::test]
async fn delete_accepts_no_content_and_reports_plain_text_errors() {
    let (base, _state) = spawn_record_server().await.expect("server");
    let service = service(&format!("{base}/api"));

    service
        .delete(&RecordId::from("1"))
        .await
        .expect("delete");
    let err = service
        .delete(&RecordId::from("locked"))
        .await
        .expect_err("500");

    assert_eq!(
        err,
        RequestFailure::Service {
            status: 500,
            message: "database offline".into(),
        }
    );
}

#[tokio::test]
async fn slow_server_maps_to_timeout() {
    let (base, _state) = spawn_record_server().await.expect("server");
    let service = HttpRecordService::new(&format!("{base}/slow"), Duration::from_millis(100))
        .expect("service");

    let err = service.list().await.expect_err("timeout");

    assert_eq!(err, RequestFailure::Timeout(Duration::from_millis(100)));
}

#[tokio::test]
async fn malformed_body_maps_to_decode_failure() {
    let (base, _state) = spawn_record_server().await.expect("server");
    let err = service(&format!("{base}/broken"))
        .list()
        .await
        .expect_err("decode");

    assert!(matches!(err, RequestFailure::Decode(_)));
}

#[tokio::test]
async fn unreachable_server_maps_to_transport_failure() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = service(&format!("http://{addr}"))
        .list()
        .await
        .expect_err("unreachable");

    assert!(matches!(err, RequestFailure::Transport(_)));
}

#[test]
fn rejects_urls_that_cannot_carry_a_path() {
    assert!(HttpRecordService::new("mailto:records@example.com", Duration::from_secs(1)).is_err());
    assert!(HttpRecordService::new("not a url", Duration::from_secs(1)).is_err());
}

#[test]
fn service_failure_falls_back_to_status_reason() {
    assert_eq!(
        service_failure(StatusCode::BAD_GATEWAY, "  "),
        RequestFailure::Service {
            status: 502,
            message: "Bad Gateway".into(),
        }
    );
}
