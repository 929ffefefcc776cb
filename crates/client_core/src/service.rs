use async_trait::async_trait;
use shared::domain::{FieldPatch, Record, RecordFields, RecordId};

use crate::error::RequestFailure;

/// Request/response access to the remote record store.
#[async_trait]
pub trait RecordService: Send + Sync {
    async fn list(&self) -> Result<Vec<Record>, RequestFailure>;
    async fn create(&self, fields: &RecordFields) -> Result<Record, RequestFailure>;
    async fn update(&self, id: &RecordId, patch: &FieldPatch) -> Result<Record, RequestFailure>;
    async fn delete(&self, id: &RecordId) -> Result<(), RequestFailure>;
}

pub struct MissingRecordService;

impl MissingRecordService {
    fn unavailable() -> RequestFailure {
        RequestFailure::Transport("record service is not configured".to_string())
    }
}

#[async_trait]
impl RecordService for MissingRecordService {
    async fn list(&self) -> Result<Vec<Record>, RequestFailure> {
        Err(Self::unavailable())
    }

    async fn create(&self, _fields: &RecordFields) -> Result<Record, RequestFailure> {
        Err(Self::unavailable())
    }

    async fn update(&self, _id: &RecordId, _patch: &FieldPatch) -> Result<Record, RequestFailure> {
        Err(Self::unavailable())
    }

    async fn delete(&self, _id: &RecordId) -> Result<(), RequestFailure> {
        Err(Self::unavailable())
    }
}
