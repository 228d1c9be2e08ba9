//! Configuration schema for pdfdesk.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable that overrides `remote.base_url`.
pub const API_URL_ENV: &str = "PDFDESK_API_URL";

/// Root config for a pdfdesk client.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PdfdeskConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

impl PdfdeskConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> PdfdeskConfigBuilder {
        PdfdeskConfigBuilder::default()
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV)
            && !url.trim().is_empty()
        {
            log::debug!("remote base url overridden from {API_URL_ENV}");
            self.remote.base_url = url.trim().to_string();
        }
    }
}

/// Builder for assembling a `PdfdeskConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct PdfdeskConfigBuilder {
    config: PdfdeskConfig,
}

impl PdfdeskConfigBuilder {
    /// Set the remote service base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.remote.base_url = base_url.into();
        self
    }

    /// Set the debounce window in milliseconds.
    pub fn debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.config.sync.debounce_ms = debounce_ms;
        self
    }

    /// Choose whether pending writes are flushed on shutdown.
    pub fn flush_on_shutdown(mut self, flush: bool) -> Self {
        self.config.sync.flush_on_shutdown = flush;
        self
    }

    /// Replace the chat configuration.
    pub fn chat(mut self, chat: ChatConfig) -> Self {
        self.config.chat = chat;
        self
    }

    /// Finalize and return the built config.
    pub fn build(self) -> PdfdeskConfig {
        self.config
    }
}

/// Remote record service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl RemoteConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

/// Debounced write settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
    /// Quiet period after the last edit before a record is written.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Write pending edits immediately on shutdown instead of dropping them.
    #[serde(default = "default_flush_on_shutdown")]
    pub flush_on_shutdown: bool,
}

impl SyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            flush_on_shutdown: default_flush_on_shutdown(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_flush_on_shutdown() -> bool {
    true
}

/// Chat transcript settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatConfig {
    /// Answer recorded when the service rejects a question.
    #[serde(default = "default_answer_error_text")]
    pub answer_error_text: String,
    /// Answer recorded when a question could not be delivered.
    #[serde(default = "default_send_error_text")]
    pub send_error_text: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            answer_error_text: default_answer_error_text(),
            send_error_text: default_send_error_text(),
        }
    }
}

fn default_answer_error_text() -> String {
    "Error getting the answer.".to_string()
}

fn default_send_error_text() -> String {
    "Error sending the message.".to_string()
}

/// Event broadcast settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventsConfig {
    #[serde(default = "default_event_buffer")]
    pub buffer: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            buffer: default_event_buffer(),
        }
    }
}

fn default_event_buffer() -> usize {
    256
}
