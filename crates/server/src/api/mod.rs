//! HTTP handlers for the record routes.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use server_api::{create_record, delete_record, list_records, update_record};
use shared::{
    domain::{FieldPatch, Record, RecordFields, RecordId},
    error::{ApiError, ErrorCode},
};
use tracing::warn;

use crate::app_state::AppState;

pub(crate) type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

pub(crate) fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = status_for(err.code);
    if status.is_server_error() {
        warn!(code = ?err.code, message = %err.message, "record request failed");
    }
    (status, Json(err))
}

pub(crate) async fn healthz() -> &'static str {
    "ok"
}

pub(crate) async fn http_list_records(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<Record>>> {
    list_records(&state.api).await.map(Json).map_err(reject)
}

pub(crate) async fn http_create_record(
    State(state): State<Arc<AppState>>,
    Json(fields): Json<RecordFields>,
) -> ApiResult<(StatusCode, Json<Record>)> {
    let record = create_record(&state.api, fields).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub(crate) async fn http_update_record(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<String>,
    Json(patch): Json<FieldPatch>,
) -> ApiResult<Json<Record>> {
    update_record(&state.api, &RecordId(record_id), patch)
        .await
        .map(Json)
        .map_err(reject)
}

pub(crate) async fn http_delete_record(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<String>,
) -> ApiResult<StatusCode> {
    delete_record(&state.api, &RecordId(record_id))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
