//! Wire types for pdfdesk records, chat, the remote service contract, and events.

mod chat;
mod record;
mod service;

pub use chat::{ChatMessage, ChatOutcome, render_answer};
pub use record::{EditError, FilterState, Record, RecordEdit, RecordId, UploadFile};
pub use service::{RecordService, ServiceError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a chat session.
pub type SessionId = Uuid;

/// Wrapper for events emitted by the store, write coalescer, and chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeskEvent {
    /// Unique id for the event.
    pub id: Uuid,
    /// Timestamp when the event was created.
    pub created_at: DateTime<Utc>,
    /// Event payload content.
    pub payload: DeskEventPayload,
}

impl DeskEvent {
    /// Stamp a payload with a fresh id and the current time.
    pub fn new(payload: DeskEventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            payload,
        }
    }
}

/// All state transitions observable by a front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "payload")]
pub enum DeskEventPayload {
    /// The local set was replaced by a fetch.
    RecordsLoaded { filter: FilterState, count: usize },
    /// A field was changed locally.
    RecordEdited {
        record_id: RecordId,
        field: String,
    },
    /// A debounced write was armed or re-armed.
    WriteScheduled { record_id: RecordId },
    /// An armed write was dropped before it fired.
    WriteCancelled { record_id: RecordId },
    /// A write request was sent.
    WriteIssued { record_id: RecordId },
    /// A write request succeeded.
    WriteCompleted { record_id: RecordId },
    /// A write request failed; the record keeps its local value.
    WriteFailed { record_id: RecordId, error: String },
    /// A record was added or replaced locally.
    RecordInserted { record_id: RecordId },
    /// A record was removed after remote deletion.
    RecordRemoved { record_id: RecordId },
    /// A chat session was opened.
    ChatOpened {
        session_id: SessionId,
        record_id: RecordId,
    },
    /// A message was appended to a chat session.
    ChatAppended {
        session_id: SessionId,
        message: ChatMessage,
    },
    /// A chat request failed; the sentinel message was appended.
    ChatFailed {
        session_id: SessionId,
        record_id: RecordId,
        error: String,
    },
    /// A chat session was closed and its log discarded.
    ChatClosed { session_id: SessionId },
}

/// Sink interface for desk events.
pub trait EventSink: Send + Sync {
    /// Emit an event to downstream listeners.
    fn emit(&self, event: DeskEvent);
}
