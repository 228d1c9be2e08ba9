//! Remote record service contract.

use crate::record::{FilterState, Record, RecordId, UploadFile};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors returned by a remote record service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
    /// The service answered with a non-2xx status.
    #[error("remote returned status {status}")]
    Status { status: u16, body: String },
    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ServiceError {
    /// HTTP status when the service answered, `None` for local failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[async_trait]
/// CRUD, upload and question-answer endpoints of the record backend.
///
/// Writes are last-write-wins per record and carry no version; callers must not
/// assume a retried request is safe.
pub trait RecordService: Send + Sync {
    /// Fetch records, filtered server-side.
    async fn list(&self, filter: FilterState) -> Result<Vec<Record>, ServiceError>;

    /// Replace a record with the given full snapshot.
    async fn update(&self, record: &Record) -> Result<(), ServiceError>;

    /// Delete a record.
    async fn delete(&self, id: &RecordId) -> Result<(), ServiceError>;

    /// Upload a document and return the created record.
    async fn upload(&self, file: UploadFile) -> Result<Record, ServiceError>;

    /// Ask a question about a record; the answer is opaque JSON.
    async fn ask(&self, id: &RecordId, question: &str) -> Result<Value, ServiceError>;
}
