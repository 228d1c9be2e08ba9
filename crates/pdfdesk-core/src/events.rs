//! Broadcast event bus for front ends observing the desk.

use log::debug;
use pdfdesk_protocol::{DeskEvent, DeskEventPayload, EventSink};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Broadcast-backed event bus.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<DeskEvent>,
}

impl EventBus {
    /// Create a new event bus with the given channel buffer size.
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        debug!("event bus initialized (buffer={})", buffer);
        Self { sender }
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<DeskEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for EventBus {
    /// Emit an event into the broadcast channel; dropped when nobody listens.
    fn emit(&self, event: DeskEvent) {
        let _ = self.sender.send(event);
    }
}

/// Emit a payload when a sink is configured.
pub(crate) fn emit(sink: &Option<Arc<dyn EventSink>>, payload: DeskEventPayload) {
    if let Some(sink) = sink {
        sink.emit(DeskEvent::new(payload));
    }
}
