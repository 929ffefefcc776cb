use std::sync::Arc;

use chrono::Utc;
use shared::domain::{FieldPatch, Record, RecordFields, RecordId};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Insertion-ordered in-memory record table.
#[derive(Clone, Default)]
pub struct RecordTable {
    rows: Arc<RwLock<Vec<Record>>>,
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn list(&self) -> Vec<Record> {
        self.rows.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    pub async fn get(&self, id: &RecordId) -> Option<Record> {
        self.rows
            .read()
            .await
            .iter()
            .find(|record| &record.id == id)
            .cloned()
    }

    pub async fn insert(&self, fields: RecordFields) -> Record {
        let now = Utc::now();
        let record = Record {
            id: RecordId(Uuid::new_v4().to_string()),
            fields,
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.rows.write().await.push(record.clone());
        record
    }

    pub async fn patch(&self, id: &RecordId, patch: &FieldPatch) -> Option<Record> {
        let mut rows = self.rows.write().await;
        let record = rows.iter_mut().find(|record| &record.id == id)?;
        patch.apply_to(&mut record.fields);
        record.updated_at = Some(Utc::now());
        Some(record.clone())
    }

    pub async fn delete(&self, id: &RecordId) -> bool {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|record| &record.id != id);
        rows.len() != before
    }
}
