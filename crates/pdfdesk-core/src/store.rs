//! Authoritative in-memory record list with optimistic edits.

use crate::coalescer::{SyncStatus, WriteCoalescer};
use crate::error::CoreError;
use crate::events::emit;
use crate::filter;
use log::{debug, info, warn};
use parking_lot::RwLock;
use pdfdesk_protocol::{
    DeskEventPayload, EventSink, FilterState, Record, RecordEdit, RecordId, RecordService,
    UploadFile,
};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Owns the loaded record set and routes edits to the write coalescer.
///
/// Locks are only held for synchronous sections; no lock is held across a
/// remote call.
pub struct RecordStore {
    service: Arc<dyn RecordService>,
    coalescer: WriteCoalescer,
    records: RwLock<Vec<Record>>,
    filter: RwLock<FilterState>,
    /// Bumped on every load so a slow stale fetch cannot overwrite a newer one.
    load_epoch: AtomicU64,
    events: Option<Arc<dyn EventSink>>,
}

impl RecordStore {
    /// Create an empty store.
    pub fn new(
        service: Arc<dyn RecordService>,
        coalescer: WriteCoalescer,
        events: Option<Arc<dyn EventSink>>,
    ) -> Self {
        Self {
            service,
            coalescer,
            records: RwLock::new(Vec::new()),
            filter: RwLock::new(FilterState::All),
            load_epoch: AtomicU64::new(0),
            events,
        }
    }

    /// Fetch the server-filtered list and replace the local set.
    ///
    /// Records with an armed or in-flight write keep their local snapshot so a
    /// reload never reverts an edit the service has not confirmed yet. On
    /// failure the local set is unchanged.
    pub async fn load(&self, filter: FilterState) -> Result<Vec<Record>, CoreError> {
        let epoch = self.load_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("loading records (filter={}, epoch={})", filter, epoch);
        let fetched = self.service.list(filter).await.map_err(|err| {
            warn!("load failed (filter={}, error={})", filter, err);
            CoreError::Fetch(err)
        })?;

        let mut records = self.records.write();
        if self.load_epoch.load(Ordering::SeqCst) != epoch {
            debug!("discarding stale load (filter={}, epoch={})", filter, epoch);
            return Ok(fetched);
        }
        *records = fetched
            .into_iter()
            .map(|record| {
                self.coalescer
                    .unconfirmed_snapshot(&record.id)
                    .unwrap_or(record)
            })
            .collect();
        *self.filter.write() = filter;
        let loaded = records.clone();
        drop(records);

        info!("records loaded (filter={}, count={})", filter, loaded.len());
        emit(
            &self.events,
            DeskEventPayload::RecordsLoaded {
                filter,
                count: loaded.len(),
            },
        );
        Ok(loaded)
    }

    /// Reload with the current filter.
    pub async fn reload(&self) -> Result<Vec<Record>, CoreError> {
        self.load(self.filter()).await
    }

    /// Store the filter and fetch its set from the server.
    ///
    /// The filter stays current even when the fetch fails, so a later
    /// [`RecordStore::reload`] retries it.
    pub async fn set_filter(&self, filter: FilterState) -> Result<Vec<Record>, CoreError> {
        *self.filter.write() = filter;
        self.load(filter).await
    }

    /// Apply one field change locally and schedule the full record for writing.
    pub fn apply_local_edit(&self, id: &RecordId, edit: RecordEdit) -> Result<Record, CoreError> {
        let updated = {
            let mut records = self.records.write();
            let slot = records
                .iter_mut()
                .find(|record| record.id == *id)
                .ok_or_else(|| CoreError::NotFound(id.clone()))?;
            let updated = edit.apply(slot);
            *slot = updated.clone();
            // Scheduling under the list lock keeps snapshot order equal to edit order.
            self.coalescer.schedule(updated.clone());
            updated
        };
        debug!(
            "record edited (record_id={}, field={})",
            id,
            edit.field_name()
        );
        emit(
            &self.events,
            DeskEventPayload::RecordEdited {
                record_id: id.clone(),
                field: edit.field_name().to_string(),
            },
        );
        Ok(updated)
    }

    /// Dynamic-form variant of [`RecordStore::apply_local_edit`].
    pub fn apply_field(&self, id: &RecordId, field: &str, value: Value) -> Result<Record, CoreError> {
        let edit = RecordEdit::from_field(field, value)?;
        self.apply_local_edit(id, edit)
    }

    /// Append a record, replacing any resident record with the same id.
    pub fn insert(&self, record: Record) {
        let id = record.id.clone();
        {
            let mut records = self.records.write();
            match records.iter_mut().find(|existing| existing.id == id) {
                Some(existing) => *existing = record,
                None => records.push(record),
            }
        }
        debug!("record inserted (record_id={})", id);
        emit(
            &self.events,
            DeskEventPayload::RecordInserted { record_id: id },
        );
    }

    /// Upload a document and insert the created record.
    pub async fn upload(&self, file: UploadFile) -> Result<Record, CoreError> {
        if file.file_name.trim().is_empty() {
            return Err(CoreError::InvalidUpload("file name is empty".to_string()));
        }
        if file.bytes.is_empty() {
            return Err(CoreError::InvalidUpload(format!(
                "{} has no contents",
                file.file_name
            )));
        }
        let file_name = file.file_name.clone();
        let record = self.service.upload(file).await.map_err(|err| {
            warn!("upload failed (file_name={}, error={})", file_name, err);
            CoreError::Upload(err)
        })?;
        info!(
            "uploaded document (file_name={}, record_id={})",
            file_name, record.id
        );
        self.insert(record.clone());
        Ok(record)
    }

    /// Delete remotely, then remove locally. On failure the record stays.
    ///
    /// An armed write is cancelled and any in-flight write awaited before the
    /// delete is sent, so no update can land after it. A failed delete re-arms
    /// the cancelled write.
    pub async fn remove(&self, id: &RecordId) -> Result<(), CoreError> {
        if self.get(id).is_none() {
            return Err(CoreError::NotFound(id.clone()));
        }
        let cancelled = self.coalescer.cancel(id);
        self.coalescer.wait_in_flight(id).await;
        if let Err(source) = self.service.delete(id).await {
            warn!("delete failed (record_id={}, error={})", id, source);
            if cancelled && let Err(err) = self.resync(id) {
                warn!("could not re-arm write (record_id={}, error={})", id, err);
            }
            return Err(CoreError::Delete {
                record_id: id.clone(),
                source,
            });
        }
        {
            let mut records = self.records.write();
            if let Some(position) = records.iter().position(|record| record.id == *id) {
                records.remove(position);
            }
        }
        self.coalescer.forget(id);
        info!("record removed (record_id={})", id);
        emit(
            &self.events,
            DeskEventPayload::RecordRemoved {
                record_id: id.clone(),
            },
        );
        Ok(())
    }

    /// Re-schedule the current local snapshot, e.g. after a failed write.
    pub fn resync(&self, id: &RecordId) -> Result<(), CoreError> {
        let records = self.records.read();
        let record = records
            .iter()
            .find(|record| record.id == *id)
            .ok_or_else(|| CoreError::NotFound(id.clone()))?;
        self.coalescer.schedule(record.clone());
        Ok(())
    }

    /// Snapshot of every resident record.
    pub fn records(&self) -> Vec<Record> {
        self.records.read().clone()
    }

    /// Resident record by id.
    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.records.read().iter().find(|record| record.id == *id).cloned()
    }

    /// Resident record whose id renders as `raw`.
    pub fn find_by_display_id(&self, raw: &str) -> Option<Record> {
        self.records
            .read()
            .iter()
            .find(|record| record.id.to_string() == raw)
            .cloned()
    }

    /// Currently requested filter.
    pub fn filter(&self) -> FilterState {
        *self.filter.read()
    }

    /// Records to display under the current filter.
    pub fn view(&self) -> Vec<Record> {
        filter::view(&self.records.read(), self.filter())
    }

    /// Sync status of a record's writes.
    pub fn sync_status(&self, id: &RecordId) -> Option<SyncStatus> {
        self.coalescer.status(id)
    }

    /// Write coalescer backing this store.
    pub fn coalescer(&self) -> &WriteCoalescer {
        &self.coalescer
    }
}
