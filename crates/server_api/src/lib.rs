use shared::{
    domain::{FieldPatch, Record, RecordFields, RecordId},
    error::{ApiError, ErrorCode},
    validation::{normalize_fields, normalize_patch},
};
use tracing::info;

mod table;

pub use table::RecordTable;

#[derive(Clone, Default)]
pub struct ApiContext {
    pub records: RecordTable,
}

pub async fn list_records(ctx: &ApiContext) -> Result<Vec<Record>, ApiError> {
    Ok(ctx.records.list().await)
}

pub async fn create_record(ctx: &ApiContext, fields: RecordFields) -> Result<Record, ApiError> {
    let fields = normalize_fields(fields)?;
    let record = ctx.records.insert(fields).await;
    info!(record_id = %record.id, "record created");
    Ok(record)
}

pub async fn update_record(
    ctx: &ApiContext,
    id: &RecordId,
    patch: FieldPatch,
) -> Result<Record, ApiError> {
    let patch = normalize_patch(patch)?;
    let record = ctx
        .records
        .patch(id, &patch)
        .await
        .ok_or_else(|| not_found(id))?;
    info!(record_id = %id, "record updated");
    Ok(record)
}

pub async fn delete_record(ctx: &ApiContext, id: &RecordId) -> Result<(), ApiError> {
    if !ctx.records.delete(id).await {
        return Err(not_found(id));
    }
    info!(record_id = %id, "record deleted");
    Ok(())
}

fn not_found(id: &RecordId) -> ApiError {
    ApiError::new(ErrorCode::NotFound, format!("record {id} not found"))
}
