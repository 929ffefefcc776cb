use std::{
    collections::{HashMap, HashSet},
    future::Future,
    sync::Arc,
    time::Duration,
};

use shared::{
    domain::{FieldPatch, Record, RecordFields, RecordId},
    validation::{normalize_fields, normalize_patch},
};
use tokio::sync::{broadcast, oneshot, Mutex};
use tracing::{debug, info, warn};

pub mod config;
pub mod error;
pub mod service;
pub mod transport;
pub mod types;

pub use error::{ManagerError, RequestFailure};
pub use service::{MissingRecordService, RecordService};
pub use transport::HttpRecordService;
pub use types::{
    LoadOutcome, ManagerEvent, ManagerSnapshot, Operation, RequestState, RequestStates,
};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteKind {
    Update,
    Remove,
}

/// In-flight writes for one record id, plus the updates queued behind them.
#[derive(Debug, Default)]
struct PendingWrite {
    updates: usize,
    removes: usize,
    queued: Vec<oneshot::Sender<()>>,
}

impl PendingWrite {
    fn is_idle(&self) -> bool {
        self.updates == 0 && self.removes == 0
    }
}

/// A write confirmed while a load was outstanding.
#[derive(Debug)]
enum Confirmed {
    Created(Record),
    Updated(Record),
    Removed(RecordId),
}

struct ManagerState {
    mounted: bool,
    records: Vec<Record>,
    states: RequestStates,
    load_in_flight: bool,
    // Writes confirmed while a load is outstanding. Replayed over the load
    // result so a stale read cannot undo them.
    load_overlay: Option<Vec<Confirmed>>,
    pending_writes: HashMap<RecordId, PendingWrite>,
}

impl ManagerState {
    fn new() -> Self {
        Self {
            mounted: true,
            records: Vec::new(),
            states: RequestStates::default(),
            load_in_flight: false,
            load_overlay: None,
            pending_writes: HashMap::new(),
        }
    }

    fn position(&self, id: &RecordId) -> Option<usize> {
        self.records.iter().position(|record| &record.id == id)
    }

    fn upsert(&mut self, record: Record) {
        match self.position(&record.id) {
            Some(index) => self.records[index] = record,
            None => self.records.push(record),
        }
    }

    fn remove_record(&mut self, id: &RecordId) -> Option<Record> {
        let index = self.position(id)?;
        Some(self.records.remove(index))
    }

    fn note_confirmed(&mut self, confirmed: Confirmed) {
        if let Some(overlay) = self.load_overlay.as_mut() {
            overlay.push(confirmed);
        }
    }

    fn replace_all(&mut self, loaded: Vec<Record>, overlay: Vec<Confirmed>) {
        let mut seen = HashSet::with_capacity(loaded.len());
        let mut records = Vec::with_capacity(loaded.len());
        for record in loaded {
            if seen.insert(record.id.clone()) {
                records.push(record);
            } else {
                warn!(record_id = %record.id, "store returned duplicate record id; keeping first");
            }
        }
        self.records = records;

        for confirmed in overlay {
            match confirmed {
                Confirmed::Created(record) => self.upsert(record),
                // The read is newer than the update when it no longer has
                // the record; only refresh rows the store still returned.
                Confirmed::Updated(record) => {
                    if let Some(index) = self.position(&record.id) {
                        self.records[index] = record;
                    }
                }
                Confirmed::Removed(id) => {
                    self.remove_record(&id);
                }
            }
        }
    }

    fn begin_write(&mut self, id: &RecordId, kind: WriteKind) {
        let pending = self.pending_writes.entry(id.clone()).or_default();
        match kind {
            WriteKind::Update => pending.updates += 1,
            WriteKind::Remove => pending.removes += 1,
        }
    }

    /// Registers an update behind the writes already in flight for `id`.
    /// Returns `None` when nothing is in flight and the update may go ahead.
    fn queue_behind_writes(&mut self, id: &RecordId) -> Option<oneshot::Receiver<()>> {
        let pending = self.pending_writes.get_mut(id)?;
        if pending.is_idle() {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        pending.queued.push(tx);
        Some(rx)
    }

    fn end_write(&mut self, id: &RecordId, kind: WriteKind) {
        let Some(pending) = self.pending_writes.get_mut(id) else {
            return;
        };
        match kind {
            WriteKind::Update => pending.updates = pending.updates.saturating_sub(1),
            WriteKind::Remove => pending.removes = pending.removes.saturating_sub(1),
        }
        if pending.is_idle() {
            if let Some(pending) = self.pending_writes.remove(id) {
                for waiter in pending.queued {
                    let _ = waiter.send(());
                }
            }
        }
    }
}

/// Owns the locally displayed record collection and is the only component
/// that talks to the record service.
///
/// # Concurrency
/// - The state lock is never held across a request; requests are the only
///   suspension points.
/// - Responses are applied whole (record replace or removal) in the order
///   they resolve.
/// - Updates to one id are serialized: an update waits until every write
///   already in flight for that id has resolved. Removals are not queued.
/// - A removed record is never brought back by a late update response or by
///   a read that was issued before the removal was confirmed.
/// - At most one load is outstanding; extra calls return
///   [`LoadOutcome::AlreadyInFlight`].
/// - After [`RecordManager::unmount`] responses are discarded.
pub struct RecordManager {
    service: Arc<dyn RecordService>,
    request_timeout: Duration,
    inner: Mutex<ManagerState>,
    events: broadcast::Sender<ManagerEvent>,
}

impl RecordManager {
    pub fn new(service: Arc<dyn RecordService>) -> Arc<Self> {
        Self::with_request_timeout(service, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_request_timeout(
        service: Arc<dyn RecordService>,
        request_timeout: Duration,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            service,
            request_timeout,
            inner: Mutex::new(ManagerState::new()),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.events.subscribe()
    }

    /// Initial load performed when the manager is shown.
    pub async fn mount(&self) -> Result<LoadOutcome, ManagerError> {
        info!("record manager mounted");
        self.load().await
    }

    pub async fn load(&self) -> Result<LoadOutcome, ManagerError> {
        {
            let mut guard = self.inner.lock().await;
            ensure_mounted(&guard)?;
            if guard.load_in_flight {
                debug!("load already in flight; ignoring");
                return Ok(LoadOutcome::AlreadyInFlight);
            }
            guard.load_in_flight = true;
            guard.load_overlay = Some(Vec::new());
            self.set_state(&mut guard, Operation::Load, RequestState::Loading);
        }

        let result = self.call(self.service.list()).await;

        let mut guard = self.inner.lock().await;
        discard_if_unmounted(&guard, Operation::Load)?;
        guard.load_in_flight = false;
        let overlay = guard.load_overlay.take().unwrap_or_default();

        match result {
            Ok(records) => {
                guard.replace_all(records, overlay);
                let count = guard.records.len();
                self.emit_collection_changed(&guard);
                self.set_state(&mut guard, Operation::Load, RequestState::Success);
                info!(count, "records loaded");
                Ok(LoadOutcome::Loaded { count })
            }
            Err(failure) => Err(self.fail(&mut guard, Operation::Load, failure.into())),
        }
    }

    pub async fn create(&self, fields: RecordFields) -> Result<Record, ManagerError> {
        let fields = {
            let mut guard = self.inner.lock().await;
            ensure_mounted(&guard)?;
            match normalize_fields(fields) {
                Ok(fields) => {
                    self.set_state(&mut guard, Operation::Create, RequestState::Loading);
                    fields
                }
                Err(err) => return Err(self.fail(&mut guard, Operation::Create, err.into())),
            }
        };

        let result = self
            .call(self.service.create(&fields))
            .await
            .and_then(|record| {
                if record.id.as_str().trim().is_empty() {
                    Err(RequestFailure::Decode(
                        "store returned a record without an identifier".to_string(),
                    ))
                } else {
                    Ok(record)
                }
            });

        let mut guard = self.inner.lock().await;
        discard_if_unmounted(&guard, Operation::Create)?;

        match result {
            Ok(record) => {
                guard.upsert(record.clone());
                guard.note_confirmed(Confirmed::Created(record.clone()));
                self.emit_collection_changed(&guard);
                self.set_state(&mut guard, Operation::Create, RequestState::Success);
                info!(record_id = %record.id, "record created");
                Ok(record)
            }
            Err(failure) => Err(self.fail(&mut guard, Operation::Create, failure.into())),
        }
    }

    pub async fn update(&self, id: &RecordId, patch: FieldPatch) -> Result<Record, ManagerError> {
        let patch = {
            let mut guard = self.inner.lock().await;
            ensure_mounted(&guard)?;
            if guard.position(id).is_none() {
                return Err(self.fail(
                    &mut guard,
                    Operation::Update,
                    ManagerError::NotFound(id.clone()),
                ));
            }
            match normalize_patch(patch) {
                Ok(patch) => patch,
                Err(err) => return Err(self.fail(&mut guard, Operation::Update, err.into())),
            }
        };

        loop {
            let mut guard = self.inner.lock().await;
            ensure_mounted(&guard)?;
            // The write this update waited on may have been a removal.
            if guard.position(id).is_none() {
                return Err(self.fail(
                    &mut guard,
                    Operation::Update,
                    ManagerError::NotFound(id.clone()),
                ));
            }
            match guard.queue_behind_writes(id) {
                Some(settled) => {
                    drop(guard);
                    debug!(record_id = %id, "update queued behind in-flight write");
                    // A dropped sender means the manager was unmounted; the
                    // next pass reports it.
                    let _ = settled.await;
                }
                None => {
                    guard.begin_write(id, WriteKind::Update);
                    self.set_state(&mut guard, Operation::Update, RequestState::Loading);
                    break;
                }
            }
        }

        let result = self
            .call(self.service.update(id, &patch))
            .await
            .and_then(|record| {
                if &record.id == id {
                    Ok(record)
                } else {
                    Err(RequestFailure::Decode(format!(
                        "store returned record {} for update of {id}",
                        record.id
                    )))
                }
            });

        let mut guard = self.inner.lock().await;
        discard_if_unmounted(&guard, Operation::Update)?;
        guard.end_write(id, WriteKind::Update);

        match result {
            Ok(record) => {
                let Some(index) = guard.position(id) else {
                    warn!(
                        record_id = %id,
                        "record removed while update was in flight; discarding response"
                    );
                    return Err(self.fail(
                        &mut guard,
                        Operation::Update,
                        ManagerError::NotFound(id.clone()),
                    ));
                };
                guard.records[index] = record.clone();
                guard.note_confirmed(Confirmed::Updated(record.clone()));
                self.emit_collection_changed(&guard);
                self.set_state(&mut guard, Operation::Update, RequestState::Success);
                info!(record_id = %id, "record updated");
                Ok(record)
            }
            Err(failure) => Err(self.fail(&mut guard, Operation::Update, failure.into())),
        }
    }

    pub async fn remove(&self, id: &RecordId) -> Result<(), ManagerError> {
        {
            let mut guard = self.inner.lock().await;
            ensure_mounted(&guard)?;
            if guard.position(id).is_none() {
                return Err(self.fail(
                    &mut guard,
                    Operation::Remove,
                    ManagerError::NotFound(id.clone()),
                ));
            }
            guard.begin_write(id, WriteKind::Remove);
            self.set_state(&mut guard, Operation::Remove, RequestState::Loading);
        }

        let result = self.call(self.service.delete(id)).await;

        let mut guard = self.inner.lock().await;
        discard_if_unmounted(&guard, Operation::Remove)?;
        guard.end_write(id, WriteKind::Remove);

        match result {
            Ok(()) => {
                if guard.remove_record(id).is_none() {
                    debug!(record_id = %id, "record already gone when removal resolved");
                }
                guard.note_confirmed(Confirmed::Removed(id.clone()));
                self.emit_collection_changed(&guard);
                self.set_state(&mut guard, Operation::Remove, RequestState::Success);
                info!(record_id = %id, "record removed");
                Ok(())
            }
            Err(failure) => Err(self.fail(&mut guard, Operation::Remove, failure.into())),
        }
    }

    /// Tears the manager down. The collection is dropped and any response
    /// still in flight is discarded when it arrives.
    pub async fn unmount(&self) {
        let mut guard = self.inner.lock().await;
        if !guard.mounted {
            return;
        }
        guard.mounted = false;
        guard.records.clear();
        guard.pending_writes.clear();
        guard.load_overlay = None;
        guard.load_in_flight = false;
        info!("record manager unmounted");
    }

    /// Resets an `Error` state back to `Idle`. Other states are left alone.
    pub async fn clear_error(&self, operation: Operation) {
        let mut guard = self.inner.lock().await;
        if guard.states.get(operation).error().is_some() {
            self.set_state(&mut guard, operation, RequestState::Idle);
        }
    }

    pub async fn snapshot(&self) -> ManagerSnapshot {
        let guard = self.inner.lock().await;
        let mut pending: Vec<RecordId> = guard.pending_writes.keys().cloned().collect();
        pending.sort();
        ManagerSnapshot {
            mounted: guard.mounted,
            records: guard.records.clone(),
            states: guard.states.clone(),
            pending,
        }
    }

    pub async fn records(&self) -> Vec<Record> {
        self.inner.lock().await.records.clone()
    }

    pub async fn get(&self, id: &RecordId) -> Option<Record> {
        let guard = self.inner.lock().await;
        guard.position(id).map(|index| guard.records[index].clone())
    }

    pub async fn request_state(&self, operation: Operation) -> RequestState {
        self.inner.lock().await.states.get(operation).clone()
    }

    pub async fn is_pending(&self, id: &RecordId) -> bool {
        self.inner.lock().await.pending_writes.contains_key(id)
    }

    async fn call<T>(
        &self,
        request: impl Future<Output = Result<T, RequestFailure>>,
    ) -> Result<T, RequestFailure> {
        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(RequestFailure::Timeout(self.request_timeout)),
        }
    }

    fn set_state(&self, state: &mut ManagerState, operation: Operation, next: RequestState) {
        state.states.set(operation, next.clone());
        let _ = self.events.send(ManagerEvent::RequestStateChanged {
            operation,
            state: next,
        });
    }

    fn emit_collection_changed(&self, state: &ManagerState) {
        let _ = self.events.send(ManagerEvent::CollectionChanged {
            len: state.records.len(),
        });
    }

    fn fail(
        &self,
        state: &mut ManagerState,
        operation: Operation,
        err: ManagerError,
    ) -> ManagerError {
        let message = err.to_string();
        warn!(operation = operation.as_str(), error = %message, "record operation failed");
        self.set_state(state, operation, RequestState::Error(message.clone()));
        let _ = self.events.send(ManagerEvent::Error { operation, message });
        err
    }
}

fn ensure_mounted(state: &ManagerState) -> Result<(), ManagerError> {
    if state.mounted {
        Ok(())
    } else {
        Err(RequestFailure::Cancelled.into())
    }
}

fn discard_if_unmounted(state: &ManagerState, operation: Operation) -> Result<(), ManagerError> {
    if !state.mounted {
        debug!(
            operation = operation.as_str(),
            "discarding response for unmounted record manager"
        );
    }
    ensure_mounted(state)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
