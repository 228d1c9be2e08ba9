//! Layered configuration loader with requirement constraints.
//!
//! Discovers configuration layers (system/user/project/cwd/runtime), validates
//! each against the schema, merges them under optional locked requirements,
//! applies environment overrides, and produces a final `PdfdeskConfig`.

mod layer_io;
mod merge;
mod schema;
mod utils;


use crate::{ConfigError, PdfdeskConfig};
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Default config filename in local layers.
const DEFAULT_CONFIG_FILE: &str = "pdfdesk.json5";
/// Default config directory under the user home.
const DEFAULT_CONFIG_DIR: &str = ".pdfdesk";
/// Marker files/dirs that identify a project root.
const DEFAULT_PROJECT_ROOT_MARKERS: &[&str] = &[".git"];

#[cfg(unix)]
/// Default system config path on Unix.
const SYSTEM_CONFIG_PATH: &str = "/etc/pdfdesk/pdfdesk.json5";
#[cfg(unix)]
/// Default requirements path on Unix.
const SYSTEM_REQUIREMENTS_PATH: &str = "/etc/pdfdesk/requirements.json5";

/// Effective config plus metadata about which layers were loaded.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// The merged, validated config.
    pub config: PdfdeskConfig,
    /// Metadata for each layer that contributed.
    pub layers: Vec<ConfigLayer>,
    /// Values pinned by the requirements layer.
    locked: Option<Value>,
}

/// JSON pointer of the remote base URL.
const BASE_URL_POINTER: &str = "/remote/base_url";

impl LayeredConfig {
    /// Whether the requirements layer pins the value at `pointer`
    /// (e.g. `/remote/base_url`).
    pub fn is_locked(&self, pointer: &str) -> bool {
        is_locked(self.locked.as_ref(), pointer)
    }

    /// Replace `remote.base_url` unless the requirements layer locks it.
    ///
    /// Returns `Ok(false)` when the override was ignored.
    pub fn override_base_url(&mut self, base_url: &str) -> Result<bool, ConfigError> {
        if self.is_locked(BASE_URL_POINTER) {
            warn!("remote.base_url locked by requirements; ignoring override");
            return Ok(false);
        }
        let mut config = self.config.clone();
        config.remote.base_url = base_url.trim().to_string();
        config.validate()?;
        self.config = config;
        Ok(true)
    }
}

fn is_locked(locked: Option<&Value>, pointer: &str) -> bool {
    locked.and_then(|value| value.pointer(pointer)).is_some()
}

/// Origin for a single config layer in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// Locked values that later layers cannot override.
    Requirements,
    /// System-wide configuration.
    System,
    /// User-specific configuration.
    User,
    /// Project root configuration.
    Project,
    /// Current working directory configuration.
    Cwd,
    /// Explicit override files (highest precedence).
    Runtime,
}

impl ConfigLayerSource {
    fn label(self) -> &'static str {
        match self {
            ConfigLayerSource::Requirements => "requirements",
            ConfigLayerSource::System => "system",
            ConfigLayerSource::User => "user",
            ConfigLayerSource::Project => "project",
            ConfigLayerSource::Cwd => "cwd",
            ConfigLayerSource::Runtime => "runtime",
        }
    }
}

/// Metadata about a loaded config layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayer {
    pub source: ConfigLayerSource,
    pub path: PathBuf,
}

/// Options controlling layered config discovery and overrides.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    /// Working directory used to find project and cwd layers.
    pub cwd: PathBuf,
    /// Optional system config path (defaults to `/etc/pdfdesk/pdfdesk.json5` on Unix).
    pub system_config_path: Option<PathBuf>,
    /// Optional user config path (defaults to `~/.pdfdesk/pdfdesk.json5`).
    pub user_config_path: Option<PathBuf>,
    /// Optional requirements path for locked settings.
    pub requirements_path: Option<PathBuf>,
    /// Override config paths applied last; each must exist.
    pub runtime_paths: Vec<PathBuf>,
    /// Marker files/dirs used to detect the project root.
    pub project_root_markers: Vec<String>,
    /// Read `PDFDESK_API_URL` after merging.
    pub read_env: bool,
}

impl LayeredConfigOptions {
    /// Create options with default layer locations for the provided cwd.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            system_config_path: layer_io::default_system_config_path(),
            user_config_path: layer_io::default_user_config_path(),
            requirements_path: layer_io::default_requirements_path(),
            runtime_paths: Vec::new(),
            project_root_markers: DEFAULT_PROJECT_ROOT_MARKERS
                .iter()
                .map(|marker| marker.to_string())
                .collect(),
            read_env: true,
        }
    }

    /// Add an override config path that is applied last.
    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }
}

impl PdfdeskConfig {
    /// Load a single config from a path (no layering, no environment).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        info!("loading config from path: {}", path.as_ref().display());
        let contents = fs::read_to_string(path)?;
        Self::load_from_str(&contents)
    }

    /// Load a single config from JSON5 contents (no layering, no environment).
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let value: Value = json5::from_str(contents)?;
        config_from_value(value, "config")
    }

    /// Load a layered config stack using the default layer locations.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    /// Load a layered config stack using explicit layer locations.
    ///
    /// Precedence (low -> high): system, user, project, cwd, runtime. Keys
    /// present in the requirements layer are locked to its values.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let cwd = utils::normalize_path(&options.cwd)?;
        let mut layers = Vec::new();
        let mut values = Vec::new();
        let mut seen = HashSet::new();

        let requirements = match options.requirements_path.as_deref() {
            Some(path) => layer_io::load_optional_layer(ConfigLayerSource::Requirements, path)?,
            None => None,
        };
        if let Some((meta, _)) = &requirements {
            layers.push(meta.clone());
        }

        let mut candidates: Vec<(ConfigLayerSource, PathBuf)> = Vec::new();
        if let Some(path) = &options.system_config_path {
            candidates.push((ConfigLayerSource::System, path.clone()));
        }
        if let Some(path) = &options.user_config_path {
            candidates.push((ConfigLayerSource::User, path.clone()));
        }
        match utils::find_project_root(&cwd, &options.project_root_markers) {
            Some(root) => {
                debug!("resolved project root: {}", root.display());
                candidates.push((ConfigLayerSource::Project, root.join(DEFAULT_CONFIG_FILE)));
            }
            None => debug!("project root not found; skipping project layer"),
        }
        candidates.push((ConfigLayerSource::Cwd, cwd.join(DEFAULT_CONFIG_FILE)));

        for (source, path) in candidates {
            if !seen.insert(utils::unique_path(&path)) {
                debug!(
                    "skipping duplicate layer (source={:?}, path={})",
                    source,
                    path.display()
                );
                continue;
            }
            if let Some((meta, value)) = layer_io::load_optional_layer(source, &path)? {
                layers.push(meta);
                values.push(value);
            }
        }

        for path in &options.runtime_paths {
            let (meta, value) = layer_io::load_required_layer(ConfigLayerSource::Runtime, path)?;
            layers.push(meta);
            values.push(value);
        }

        let locked = requirements.map(|(_, value)| value);
        let mut merged = Value::Object(serde_json::Map::new());
        for value in &values {
            merge::merge_json_values(&mut merged, value);
        }
        if let Some(locked) = &locked {
            merge::merge_json_values(&mut merged, locked);
        }

        let mut config: PdfdeskConfig = {
            schema::validate_layer_schema(&merged, "effective")?;
            serde_json::from_value(merged)?
        };
        if options.read_env {
            if is_locked(locked.as_ref(), BASE_URL_POINTER) {
                debug!("remote.base_url locked by requirements; ignoring environment");
            } else {
                config.apply_env_overrides();
            }
        }
        config.validate()?;
        info!("layered config loaded (layers={})", layers.len());
        Ok(LayeredConfig {
            config,
            layers,
            locked,
        })
    }

    /// Validate invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.remote.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidField {
                path: "remote.base_url".to_string(),
                message: "must be an http(s) URL".to_string(),
            });
        }
        if self.remote.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidField {
                path: "remote.request_timeout_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.sync.debounce_ms == 0 {
            return Err(ConfigError::InvalidField {
                path: "sync.debounce_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.events.buffer == 0 {
            return Err(ConfigError::InvalidField {
                path: "events.buffer".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn config_from_value(value: Value, label: &str) -> Result<PdfdeskConfig, ConfigError> {
    schema::validate_layer_schema(&value, label)?;
    let config: PdfdeskConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}
