//! Configuration model and layered config loading for pdfdesk.
//!
//! Owns the config schema, validation, and layer merging used by the core
//! crate and the command-line front end.

mod error;
mod loader;
mod model;

/// Public error type returned by config loading and validation APIs.
pub use error::ConfigError;
/// Layered config types and loader options.
pub use loader::{ConfigLayer, ConfigLayerSource, LayeredConfig, LayeredConfigOptions};
/// Configuration schema models.
pub use model::*;
