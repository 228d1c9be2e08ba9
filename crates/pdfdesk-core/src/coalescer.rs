//! Debounced per-record write scheduling.
//!
//! Each record id owns at most one armed timer. Re-arming aborts the unfired
//! timer and replaces its payload with the newer full snapshot, so a burst of
//! edits collapses into one `PUT` carrying the latest state. Writes that have
//! fired for the same record go through a per-record lane and are issued one at
//! a time in fire order; writes for different records are independent.

use crate::events::emit;
use futures_util::future::join_all;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use pdfdesk_protocol::{DeskEventPayload, EventSink, Record, RecordId, RecordService, ServiceError};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Synchronization state of a locally edited record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// A write is armed and waiting for the debounce window to elapse.
    Pending,
    /// A write request has been issued.
    InFlight,
    /// The last issued write succeeded.
    Synced,
    /// The last issued write failed; the local value was not persisted.
    Failed { error: ServiceError },
}

/// A write that failed while flushing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub record_id: RecordId,
    pub error: ServiceError,
}

/// Armed write for one record.
#[derive(Debug)]
struct PendingWrite {
    record: Record,
    scheduled_at: Instant,
    generation: u64,
    timer: JoinHandle<()>,
}

struct CoalescerInner {
    service: Arc<dyn RecordService>,
    delay: Duration,
    events: Option<Arc<dyn EventSink>>,
    pending: Mutex<HashMap<RecordId, PendingWrite>>,
    lanes: Mutex<HashMap<RecordId, Arc<tokio::sync::Mutex<()>>>>,
    /// Latest fired snapshot per record, keyed by its write sequence.
    in_flight: Mutex<HashMap<RecordId, (u64, Record)>>,
    status: RwLock<HashMap<RecordId, SyncStatus>>,
    /// Armed plus fired-but-unfinished writes.
    outstanding: watch::Sender<usize>,
    generation: AtomicU64,
}

/// Per-record debounced writer. Cloning shares the same schedule.
#[derive(Clone)]
pub struct WriteCoalescer {
    inner: Arc<CoalescerInner>,
}

impl WriteCoalescer {
    /// Create a coalescer that waits `delay` after the last edit of a record.
    pub fn new(
        service: Arc<dyn RecordService>,
        delay: Duration,
        events: Option<Arc<dyn EventSink>>,
    ) -> Self {
        let (outstanding, _) = watch::channel(0);
        Self {
            inner: Arc::new(CoalescerInner {
                service,
                delay,
                events,
                pending: Mutex::new(HashMap::new()),
                lanes: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                status: RwLock::new(HashMap::new()),
                outstanding,
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Debounce window.
    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Arm or re-arm the write for `record.id` with this full snapshot.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, record: Record) {
        let id = record.id.clone();
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        {
            let mut pending = self.inner.pending.lock();
            match pending.remove(&id) {
                Some(previous) => {
                    previous.timer.abort();
                    debug!(
                        "re-armed write (record_id={}, waited_ms={})",
                        id,
                        previous.scheduled_at.elapsed().as_millis()
                    );
                }
                None => {
                    self.inner.outstanding.send_modify(|count| *count += 1);
                    debug!("armed write (record_id={})", id);
                }
            }
            let inner = self.inner.clone();
            let timer_id = id.clone();
            let timer = tokio::spawn(async move {
                tokio::time::sleep(inner.delay).await;
                inner.fire(timer_id, generation).await;
            });
            pending.insert(
                id.clone(),
                PendingWrite {
                    record,
                    scheduled_at: Instant::now(),
                    generation,
                    timer,
                },
            );
        }
        self.inner.status.write().insert(id.clone(), SyncStatus::Pending);
        emit(
            &self.inner.events,
            DeskEventPayload::WriteScheduled { record_id: id },
        );
    }

    /// Drop an unfired write. Returns whether one was armed.
    pub fn cancel(&self, id: &RecordId) -> bool {
        let Some(write) = self.inner.pending.lock().remove(id) else {
            return false;
        };
        write.timer.abort();
        self.inner.forget_status_if_pending(id);
        self.inner.outstanding.send_modify(|count| *count -= 1);
        debug!("cancelled write (record_id={})", id);
        emit(
            &self.inner.events,
            DeskEventPayload::WriteCancelled {
                record_id: id.clone(),
            },
        );
        true
    }

    /// Drop every unfired write and return how many were dropped.
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<RecordId> = self.inner.pending.lock().keys().cloned().collect();
        ids.iter().filter(|id| self.cancel(id)).count()
    }

    /// Issue every armed write now and wait for all writes, including ones
    /// already in flight, to finish. Returns failures of the writes issued here.
    pub async fn flush(&self) -> Vec<WriteFailure> {
        let drained: Vec<PendingWrite> = {
            let mut pending = self.inner.pending.lock();
            pending.drain().map(|(_, write)| write).collect()
        };
        if !drained.is_empty() {
            info!("flushing pending writes (count={})", drained.len());
        }
        let writes = drained.into_iter().map(|write| {
            write.timer.abort();
            let inner = self.inner.clone();
            async move {
                let record_id = write.record.id.clone();
                inner
                    .write(write.record)
                    .await
                    .err()
                    .map(|error| WriteFailure { record_id, error })
            }
        });
        let failures: Vec<WriteFailure> = join_all(writes).await.into_iter().flatten().collect();
        self.settled().await;
        failures
    }

    /// Wait until no write is armed or in flight.
    pub async fn settled(&self) {
        let mut outstanding = self.inner.outstanding.subscribe();
        let _ = outstanding.wait_for(|count| *count == 0).await;
    }

    /// Number of armed writes.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Snapshot an armed write would send, if any.
    pub fn pending_snapshot(&self, id: &RecordId) -> Option<Record> {
        self.inner
            .pending
            .lock()
            .get(id)
            .map(|write| write.record.clone())
    }

    /// Latest local snapshot not yet confirmed by the service: the armed
    /// write if any, else the most recently fired write still in flight.
    pub fn unconfirmed_snapshot(&self, id: &RecordId) -> Option<Record> {
        self.pending_snapshot(id).or_else(|| {
            self.inner
                .in_flight
                .lock()
                .get(id)
                .map(|(_, record)| record.clone())
        })
    }

    /// Wait until every write already fired for `id` has finished.
    pub async fn wait_in_flight(&self, id: &RecordId) {
        let lane = self.inner.lanes.lock().get(id).cloned();
        if let Some(lane) = lane {
            debug!("waiting for in-flight write (record_id={})", id);
            drop(lane.lock().await);
        }
    }

    /// Sync status for a record; `None` if it was never scheduled.
    pub fn status(&self, id: &RecordId) -> Option<SyncStatus> {
        self.inner.status.read().get(id).cloned()
    }

    /// Records whose last write failed.
    pub fn failed(&self) -> Vec<(RecordId, ServiceError)> {
        self.inner
            .status
            .read()
            .iter()
            .filter_map(|(id, status)| match status {
                SyncStatus::Failed { error } => Some((id.clone(), error.clone())),
                _ => None,
            })
            .collect()
    }

    /// Forget tracking for a record that no longer exists.
    pub fn forget(&self, id: &RecordId) {
        self.cancel(id);
        self.inner.status.write().remove(id);
        let mut lanes = self.inner.lanes.lock();
        if lanes
            .get(id)
            .is_some_and(|lane| Arc::strong_count(lane) == 1)
        {
            lanes.remove(id);
        }
    }
}

impl CoalescerInner {
    /// Timer callback: take the slot if it still belongs to this generation.
    async fn fire(&self, id: RecordId, generation: u64) {
        let record = {
            let mut pending = self.pending.lock();
            match pending.get(&id) {
                Some(write) if write.generation == generation => {
                    pending.remove(&id).map(|write| write.record)
                }
                _ => None,
            }
        };
        if let Some(record) = record {
            let _ = self.write(record).await;
        }
    }

    /// Issue one write through the record's lane and settle its bookkeeping.
    async fn write(&self, record: Record) -> Result<(), ServiceError> {
        let id = record.id.clone();
        let sequence = self.generation.fetch_add(1, Ordering::Relaxed);
        self.in_flight
            .lock()
            .insert(id.clone(), (sequence, record.clone()));
        let lane = self
            .lanes
            .lock()
            .entry(id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let guard = lane.lock().await;

        self.status.write().insert(id.clone(), SyncStatus::InFlight);
        emit(
            &self.events,
            DeskEventPayload::WriteIssued {
                record_id: id.clone(),
            },
        );
        debug!("write issued (record_id={})", id);
        let result = self.service.update(&record).await;
        {
            let mut in_flight = self.in_flight.lock();
            if in_flight
                .get(&id)
                .is_some_and(|(current, _)| *current == sequence)
            {
                in_flight.remove(&id);
            }
        }

        let rearmed = self.pending.lock().contains_key(&id);
        match &result {
            Ok(()) => {
                debug!("write completed (record_id={})", id);
                if !rearmed {
                    self.status.write().insert(id.clone(), SyncStatus::Synced);
                }
                emit(
                    &self.events,
                    DeskEventPayload::WriteCompleted {
                        record_id: id.clone(),
                    },
                );
            }
            Err(error) => {
                warn!("write failed (record_id={}, error={})", id, error);
                if !rearmed {
                    self.status.write().insert(
                        id.clone(),
                        SyncStatus::Failed {
                            error: error.clone(),
                        },
                    );
                }
                emit(
                    &self.events,
                    DeskEventPayload::WriteFailed {
                        record_id: id.clone(),
                        error: error.to_string(),
                    },
                );
            }
        }

        drop(guard);
        {
            let mut lanes = self.lanes.lock();
            if lanes
                .get(&id)
                .is_some_and(|entry| Arc::ptr_eq(entry, &lane) && Arc::strong_count(&lane) == 2)
            {
                lanes.remove(&id);
            }
        }
        self.outstanding.send_modify(|count| *count -= 1);
        result
    }

    fn forget_status_if_pending(&self, id: &RecordId) {
        let mut status = self.status.write();
        if matches!(status.get(id), Some(SyncStatus::Pending)) {
            status.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SyncStatus, WriteCoalescer};
    use pdfdesk_protocol::{Record, RecordId, ServiceError};
    use pdfdesk_test_utils::{Endpoint, MockRecordService};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    const WINDOW: Duration = Duration::from_millis(500);

    fn record(id: i64, name: &str, selected: bool) -> Record {
        Record::new(id, name, format!("/files/{id}.pdf"), selected)
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_edits_issues_one_write_with_last_snapshot() {
        let service = Arc::new(MockRecordService::new());
        let coalescer = WriteCoalescer::new(service.clone(), WINDOW, None);

        coalescer.schedule(record(1, "a", false));
        tokio::time::sleep(Duration::from_millis(200)).await;
        coalescer.schedule(record(1, "ab", false));
        tokio::time::sleep(Duration::from_millis(200)).await;
        coalescer.schedule(record(1, "ab", true));
        assert_eq!(coalescer.status(&RecordId::Int(1)), Some(SyncStatus::Pending));

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert_eq!(service.updates(), Vec::<Record>::new());

        coalescer.settled().await;
        assert_eq!(service.updates(), vec![record(1, "ab", true)]);
        assert_eq!(coalescer.status(&RecordId::Int(1)), Some(SyncStatus::Synced));
        assert_eq!(coalescer.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_records_get_independent_writes() {
        let service = Arc::new(MockRecordService::new());
        let coalescer = WriteCoalescer::new(service.clone(), WINDOW, None);

        for id in 1..=3 {
            coalescer.schedule(record(id, "first", false));
            coalescer.schedule(record(id, "second", false));
        }
        coalescer.settled().await;

        let mut written: Vec<RecordId> = service.updates().into_iter().map(|r| r.id).collect();
        written.sort_by_key(|id| id.to_string());
        assert_eq!(
            written,
            vec![RecordId::Int(1), RecordId::Int(2), RecordId::Int(3)]
        );
        assert!(service.updates().iter().all(|r| r.name == "second"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_is_surfaced_per_record() {
        let service = Arc::new(MockRecordService::new());
        service.fail_next(
            Endpoint::Update,
            ServiceError::Status {
                status: 500,
                body: "boom".to_string(),
            },
        );
        let coalescer = WriteCoalescer::new(service.clone(), WINDOW, None);

        coalescer.schedule(record(9, "x", false));
        coalescer.settled().await;

        let status = coalescer.status(&RecordId::Int(9)).expect("status");
        assert!(matches!(
            status,
            SyncStatus::Failed {
                error: ServiceError::Status { status: 500, .. }
            }
        ));
        assert_eq!(coalescer.failed().len(), 1);
        assert_eq!(service.updates(), Vec::<Record>::new());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_writes_armed_records_immediately() {
        let service = Arc::new(MockRecordService::new());
        let coalescer = WriteCoalescer::new(service.clone(), Duration::from_secs(60), None);

        coalescer.schedule(record(1, "one", false));
        coalescer.schedule(record(2, "two", true));
        let started = tokio::time::Instant::now();
        let failures = coalescer.flush().await;

        assert!(failures.is_empty());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(service.updates().len(), 2);
        assert_eq!(coalescer.pending_count(), 0);

        // The aborted timers must not write a second time.
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(service.updates().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_reports_failures() {
        let service = Arc::new(MockRecordService::new());
        service.fail_next(
            Endpoint::Update,
            ServiceError::Transport("connection refused".to_string()),
        );
        let coalescer = WriteCoalescer::new(service.clone(), WINDOW, None);
        coalescer.schedule(record(5, "x", false));

        let failures = coalescer.flush().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].record_id, RecordId::Int(5));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_unfired_write() {
        let service = Arc::new(MockRecordService::new());
        let coalescer = WriteCoalescer::new(service.clone(), WINDOW, None);

        coalescer.schedule(record(1, "x", false));
        assert!(coalescer.cancel(&RecordId::Int(1)));
        assert!(!coalescer.cancel(&RecordId::Int(1)));
        coalescer.settled().await;
        tokio::time::sleep(WINDOW * 2).await;

        assert_eq!(service.updates(), Vec::<Record>::new());
        assert_eq!(coalescer.status(&RecordId::Int(1)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn writes_for_one_record_are_issued_in_fire_order() {
        let service = Arc::new(MockRecordService::new());
        service.set_latency(Endpoint::Update, Duration::from_millis(800));
        let coalescer = WriteCoalescer::new(service.clone(), WINDOW, None);

        coalescer.schedule(record(1, "older", false));
        // Let the first write fire and sit in flight.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(coalescer.status(&RecordId::Int(1)), Some(SyncStatus::InFlight));
        coalescer.schedule(record(1, "newer", false));
        coalescer.settled().await;

        let names: Vec<String> = service.updates().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["older".to_string(), "newer".to_string()]);
        assert_eq!(service.record(&RecordId::Int(1)).map(|r| r.name), Some("newer".to_string()));
        assert_eq!(coalescer.status(&RecordId::Int(1)), Some(SyncStatus::Synced));
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_snapshot_is_visible_until_confirmed() {
        let service = Arc::new(MockRecordService::new());
        service.set_latency(Endpoint::Update, Duration::from_millis(800));
        let coalescer = WriteCoalescer::new(service.clone(), WINDOW, None);
        let id = RecordId::Int(4);

        coalescer.schedule(record(4, "draft", false));
        assert_eq!(coalescer.unconfirmed_snapshot(&id), Some(record(4, "draft", false)));
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(coalescer.pending_snapshot(&id), None);
        assert_eq!(coalescer.unconfirmed_snapshot(&id), Some(record(4, "draft", false)));

        coalescer.wait_in_flight(&id).await;
        assert_eq!(coalescer.unconfirmed_snapshot(&id), None);
        assert_eq!(service.updates(), vec![record(4, "draft", false)]);
    }
}
