//! Top-level handle wiring the store, coalescer, chat, and event bus.

use crate::chat::ChatSessionManager;
use crate::coalescer::WriteCoalescer;
use crate::error::CoreError;
use crate::events::EventBus;
use crate::remote::HttpRecordService;
use crate::store::RecordStore;
use log::{info, warn};
use pdfdesk_config::PdfdeskConfig;
use pdfdesk_protocol::{DeskEvent, EventSink, RecordService};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Document desk bound to one record service.
pub struct Desk {
    config: PdfdeskConfig,
    events: EventBus,
    store: RecordStore,
    chat: ChatSessionManager,
}

impl Desk {
    /// Build a desk talking HTTP to `config.remote.base_url`.
    pub fn from_config(config: PdfdeskConfig) -> Result<Self, CoreError> {
        let service = Arc::new(HttpRecordService::new(&config.remote)?);
        Ok(Self::with_service(config, service))
    }

    /// Build a desk over any record service implementation.
    pub fn with_service(config: PdfdeskConfig, service: Arc<dyn RecordService>) -> Self {
        let events = EventBus::new(config.events.buffer);
        let sink: Arc<dyn EventSink> = Arc::new(events.clone());
        let coalescer =
            WriteCoalescer::new(service.clone(), config.sync.debounce(), Some(sink.clone()));
        let store = RecordStore::new(service.clone(), coalescer, Some(sink.clone()));
        let chat = ChatSessionManager::new(service, config.chat.clone(), Some(sink));
        info!(
            "desk ready (base_url={}, debounce_ms={})",
            config.remote.base_url, config.sync.debounce_ms
        );
        Self {
            config,
            events,
            store,
            chat,
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn chat(&self) -> &ChatSessionManager {
        &self.chat
    }

    pub fn config(&self) -> &PdfdeskConfig {
        &self.config
    }

    /// Subscribe to desk events.
    pub fn subscribe(&self) -> broadcast::Receiver<DeskEvent> {
        self.events.subscribe()
    }

    /// Flush or cancel armed writes according to `sync.flush_on_shutdown`.
    pub async fn shutdown(&self) -> Result<(), CoreError> {
        self.chat.close();
        let coalescer = self.store.coalescer();
        if !self.config.sync.flush_on_shutdown {
            let dropped = coalescer.cancel_all();
            if dropped > 0 {
                warn!("discarding unsent edits on shutdown (count={})", dropped);
            }
            return Ok(());
        }
        let failures = coalescer.flush().await;
        if failures.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Write(failures))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Desk;
    use crate::error::CoreError;
    use pdfdesk_config::PdfdeskConfig;
    use pdfdesk_protocol::{
        DeskEventPayload, FilterState, Record, RecordEdit, RecordId, ServiceError,
    };
    use pdfdesk_test_utils::{Endpoint, MockRecordService};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn records() -> Vec<Record> {
        vec![
            Record::new(1, "one.pdf", "/files/one.pdf", false),
            Record::new(2, "two.pdf", "/files/two.pdf", true),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_flushes_armed_writes() {
        let service = Arc::new(MockRecordService::with_records(records()));
        let desk = Desk::with_service(PdfdeskConfig::default(), service.clone());
        desk.store().load(FilterState::All).await.expect("load");
        desk.store()
            .apply_local_edit(&RecordId::Int(1), RecordEdit::Selected(true))
            .expect("edit");

        desk.shutdown().await.expect("shutdown");
        assert_eq!(
            service.updates(),
            vec![Record::new(1, "one.pdf", "/files/one.pdf", true)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_without_flush_discards_writes() {
        let service = Arc::new(MockRecordService::with_records(records()));
        let config = PdfdeskConfig::builder().flush_on_shutdown(false).build();
        let desk = Desk::with_service(config, service.clone());
        desk.store().load(FilterState::All).await.expect("load");
        desk.store()
            .apply_local_edit(&RecordId::Int(2), RecordEdit::Name("x".to_string()))
            .expect("edit");

        desk.shutdown().await.expect("shutdown");
        desk.store().coalescer().settled().await;
        assert_eq!(service.updates(), Vec::<Record>::new());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_reports_failed_flush() {
        let service = Arc::new(MockRecordService::with_records(records()));
        service.fail_next(
            Endpoint::Update,
            ServiceError::Status {
                status: 502,
                body: String::new(),
            },
        );
        let desk = Desk::with_service(PdfdeskConfig::default(), service);
        desk.store().load(FilterState::All).await.expect("load");
        desk.store()
            .apply_local_edit(&RecordId::Int(1), RecordEdit::Selected(true))
            .expect("edit");

        let err = desk.shutdown().await.expect_err("failed");
        match err {
            CoreError::Write(failures) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].record_id, RecordId::Int(1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn edits_are_observable_as_events() {
        let service = Arc::new(MockRecordService::with_records(records()));
        let desk = Desk::with_service(PdfdeskConfig::default(), service);
        let mut events = desk.subscribe();
        desk.store().load(FilterState::All).await.expect("load");
        desk.store()
            .apply_local_edit(&RecordId::Int(2), RecordEdit::Selected(false))
            .expect("edit");
        desk.store().coalescer().settled().await;

        let payloads: Vec<DeskEventPayload> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|event| event.payload)
            .collect();
        assert!(matches!(
            payloads.first(),
            Some(DeskEventPayload::RecordsLoaded { count: 2, .. })
        ));
        assert!(payloads.iter().any(|payload| matches!(
            payload,
            DeskEventPayload::WriteCompleted { record_id } if *record_id == RecordId::Int(2)
        )));
    }
}
