//! Error types for the core crate.

use crate::coalescer::WriteFailure;
use pdfdesk_protocol::{EditError, RecordId, ServiceError};
use thiserror::Error;

/// Errors returned by store, chat, and client construction.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Loading the record list failed; the local set is unchanged.
    #[error("fetch failed: {0}")]
    Fetch(#[source] ServiceError),
    /// Debounced writes failed while flushing.
    #[error("{} pending write(s) failed", .0.len())]
    Write(Vec<WriteFailure>),
    /// Remote deletion failed; the record stays resident.
    #[error("delete of {record_id} failed: {source}")]
    Delete {
        record_id: RecordId,
        #[source]
        source: ServiceError,
    },
    /// Upload failed; no record was created.
    #[error("upload failed: {0}")]
    Upload(#[source] ServiceError),
    /// Upload payload is missing a name or contents.
    #[error("upload rejected: {0}")]
    InvalidUpload(String),
    /// Record id is not present locally.
    #[error("record not found: {0}")]
    NotFound(RecordId),
    /// Field edit could not be interpreted.
    #[error("invalid edit: {0}")]
    InvalidEdit(#[from] EditError),
    /// Chat operation requires an open session.
    #[error("no chat session is open")]
    NoSession,
    /// Remote base URL cannot be used for requests.
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
    /// HTTP client could not be constructed.
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}
