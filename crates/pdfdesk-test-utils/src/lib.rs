//! Test helpers shared across pdfdesk crates.

pub mod service;

pub use service::{Endpoint, MockRecordService, RemoteCall};
