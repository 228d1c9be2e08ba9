//! Schema checks for pdfdesk JSON5 configuration.

use crate::ConfigError;
use serde_json::{Map, Value};

/// Validate a single config layer (or the merged result) against the schema.
pub(super) fn validate_layer_schema(value: &Value, layer: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    ensure_allowed_keys(map, &["$schema", "remote", "sync", "chat", "events"], layer, "")?;

    if let Some(value) = map.get("$schema") {
        expect_string(value, layer, "$schema")?;
    }
    if let Some(value) = map.get("remote") {
        let map = expect_object(value, layer, "remote")?;
        ensure_allowed_keys(map, &["base_url", "request_timeout_ms"], layer, "remote")?;
        if let Some(value) = map.get("base_url") {
            expect_string(value, layer, "remote.base_url")?;
        }
        if let Some(value) = map.get("request_timeout_ms") {
            expect_u64(value, layer, "remote.request_timeout_ms")?;
        }
    }
    if let Some(value) = map.get("sync") {
        let map = expect_object(value, layer, "sync")?;
        ensure_allowed_keys(map, &["debounce_ms", "flush_on_shutdown"], layer, "sync")?;
        if let Some(value) = map.get("debounce_ms") {
            expect_u64(value, layer, "sync.debounce_ms")?;
        }
        if let Some(value) = map.get("flush_on_shutdown") {
            expect_bool(value, layer, "sync.flush_on_shutdown")?;
        }
    }
    if let Some(value) = map.get("chat") {
        let map = expect_object(value, layer, "chat")?;
        ensure_allowed_keys(map, &["answer_error_text", "send_error_text"], layer, "chat")?;
        for key in ["answer_error_text", "send_error_text"] {
            if let Some(value) = map.get(key) {
                expect_string(value, layer, &join_path("chat", key))?;
            }
        }
    }
    if let Some(value) = map.get("events") {
        let map = expect_object(value, layer, "events")?;
        ensure_allowed_keys(map, &["buffer"], layer, "events")?;
        if let Some(value) = map.get("buffer") {
            expect_u64(value, layer, "events.buffer")?;
        }
    }

    Ok(())
}

fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    value
        .as_object()
        .ok_or_else(|| invalid_field(layer, path, "expected object"))
}

fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_string() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string"))
    }
}

fn expect_bool(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_boolean() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected boolean"))
    }
}

fn expect_u64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_u64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected non-negative integer"))
    }
}

fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    for key in map.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(invalid_field(layer, &join_path(path, key), "unknown key"));
        }
    }
    Ok(())
}

/// Join nested paths for error messages.
fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{layer}:{path}"),
        message: message.to_string(),
    }
}
