//! Core state management for the document desk.
//!
//! This crate owns the authoritative record list, the debounced write
//! coalescer that syncs local edits to the record service, the chat session
//! manager, and the HTTP client used against the remote service.

pub mod chat;
pub mod coalescer;
pub mod desk;
pub mod error;
pub mod events;
pub mod filter;
pub mod remote;
pub mod store;

pub use chat::{ChatSession, ChatSessionManager, SendOutcome};
pub use coalescer::{SyncStatus, WriteCoalescer, WriteFailure};
pub use desk::Desk;
pub use error::CoreError;
pub use events::EventBus;
pub use remote::HttpRecordService;
pub use store::RecordStore;

/// Shared protocol types.
pub use pdfdesk_protocol::{EventSink, RecordService};
