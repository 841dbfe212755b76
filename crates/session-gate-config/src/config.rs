// crates/session-gate-config/src/config.rs
// ============================================================================
// Module: Session Gate Configuration
// Description: Configuration loading and validation for the session gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: session-gate-core, session-gate-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits
//! and validated before use. A validated configuration can construct the
//! durable storage backend and audit sink it describes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use session_gate_core::DEFAULT_SESSION_TIMEOUT_SECS;
use session_gate_core::DEFAULT_USER_ENV_KEY;
use session_gate_core::FileAuditSink;
use session_gate_core::FileDurableStorage;
use session_gate_core::GateAuditSink;
use session_gate_core::InMemoryDurableStorage;
use session_gate_core::NoopAuditSink;
use session_gate_core::ProjectSettings;
use session_gate_core::SharedDurableStorage;
use session_gate_core::StderrAuditSink;
use session_gate_core::runtime::store::validate_storage_key;
use session_gate_store_sqlite::SqliteDurableStorage;
use session_gate_store_sqlite::SqliteStoreConfig;
use session_gate_store_sqlite::SqliteStoreMode;
use session_gate_store_sqlite::SqliteSyncMode;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "session-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "SESSION_GATE_CONFIG";
/// Default directory for the file storage backend.
pub const DEFAULT_FILE_STORAGE_DIR: &str = ".session-gate";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of required environment keys.
pub(crate) const MAX_REQUIRED_ENV_KEYS: usize = 128;
/// Maximum length of a required environment key.
pub(crate) const MAX_ENV_KEY_LENGTH: usize = 256;
/// Default busy timeout for `SQLite` storage in milliseconds.
const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum busy timeout for `SQLite` storage in milliseconds.
const MAX_STORE_BUSY_TIMEOUT_MS: u64 = 60_000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Session gate configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionGateConfig {
    /// Durable storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Audit sink configuration.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Offline project settings.
    #[serde(default)]
    pub project: ProjectConfig,
}

impl SessionGateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path is taken from `path`, then [`CONFIG_ENV_VAR`], then
    /// [`DEFAULT_CONFIG_NAME`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        Self::load_from(&resolved)
    }

    /// Loads configuration like [`SessionGateConfig::load`], falling back to
    /// defaults when no path was requested and the default file is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an existing or explicitly requested file
    /// cannot be loaded or fails validation.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = path.is_some() || env::var_os(CONFIG_ENV_VAR).is_some();
        let resolved = resolve_path(path)?;
        if !explicit && !resolved.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        Self::load_from(&resolved)
    }

    /// Loads and validates the file at `resolved`.
    fn load_from(resolved: &Path) -> Result<Self, ConfigError> {
        validate_path(resolved)?;
        let bytes = read_config_bytes(resolved)?;
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()?;
        self.audit.validate()?;
        self.project.validate()?;
        Ok(())
    }

    /// Opens the configured durable storage backend.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the backend cannot be opened.
    pub fn open_storage(&self) -> Result<SharedDurableStorage, ConfigError> {
        self.storage.open()
    }

    /// Opens the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the audit log cannot be opened.
    pub fn open_audit_sink(&self) -> Result<Arc<dyn GateAuditSink>, ConfigError> {
        self.audit.open()
    }
}

// ============================================================================
// SECTION: Storage
// ============================================================================

/// Durable storage backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Process-local storage; nothing survives a restart.
    Memory,
    /// One JSON file per key in a directory.
    #[default]
    File,
    /// `SQLite` database.
    Sqlite,
}

/// Durable storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Backend type.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Directory (file backend) or database path (sqlite backend).
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Durable key holding the user environment.
    #[serde(default = "default_storage_key")]
    pub key: String,
    /// Busy timeout in milliseconds (sqlite backend).
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: None,
            key: default_storage_key(),
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StorageConfig {
    /// Validates storage configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_storage_key(&self.key)
            .map_err(|err| ConfigError::Invalid(format!("storage key: {err}")))?;
        match self.backend {
            StorageBackend::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "memory storage must not set path".to_string(),
                    ));
                }
            }
            StorageBackend::File => {
                if let Some(path) = &self.path {
                    validate_path_field("storage.path", path)?;
                }
            }
            StorageBackend::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite storage requires path".to_string())
                })?;
                validate_path_field("storage.path", path)?;
                if self.busy_timeout_ms == 0 || self.busy_timeout_ms > MAX_STORE_BUSY_TIMEOUT_MS {
                    return Err(ConfigError::Invalid(format!(
                        "storage busy_timeout_ms must be between 1 and {MAX_STORE_BUSY_TIMEOUT_MS}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Opens the configured backend.
    fn open(&self) -> Result<SharedDurableStorage, ConfigError> {
        match self.backend {
            StorageBackend::Memory => {
                Ok(SharedDurableStorage::from_storage(InMemoryDurableStorage::new()))
            }
            StorageBackend::File => {
                let root = self
                    .path
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE_STORAGE_DIR));
                let storage =
                    FileDurableStorage::new(root).map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(SharedDurableStorage::from_storage(storage))
            }
            StorageBackend::Sqlite => {
                let path = self.path.clone().ok_or_else(|| {
                    ConfigError::Invalid("sqlite storage requires path".to_string())
                })?;
                let config = SqliteStoreConfig {
                    path,
                    busy_timeout_ms: self.busy_timeout_ms,
                    journal_mode: self.journal_mode,
                    sync_mode: self.sync_mode,
                };
                let storage = SqliteDurableStorage::new(&config)
                    .map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(SharedDurableStorage::from_storage(storage))
            }
        }
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard events.
    #[default]
    None,
}

/// Audit sink configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink type.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Log file path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.sink {
            AuditSinkKind::File => {
                let path = self
                    .path
                    .as_ref()
                    .ok_or_else(|| ConfigError::Invalid("file audit sink requires path".to_string()))?;
                validate_path_field("audit.path", path)
            }
            AuditSinkKind::Stderr | AuditSinkKind::None => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "audit path is only valid for the file sink".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Opens the configured sink.
    fn open(&self) -> Result<Arc<dyn GateAuditSink>, ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, Some(path)) => {
                let sink = FileAuditSink::new(path).map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires path".to_string()))
            }
            (AuditSinkKind::Stderr, _) => Ok(Arc::new(StderrAuditSink)),
            (AuditSinkKind::None, _) => Ok(Arc::new(NoopAuditSink)),
        }
    }
}

// ============================================================================
// SECTION: Project
// ============================================================================

/// Offline project settings used when no configuration service is reachable.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Environment keys every user must supply.
    #[serde(default)]
    pub required_env_keys: Vec<String>,
    /// Welcome markdown.
    #[serde(default)]
    pub markdown: Option<String>,
    /// Whether conversation history is persisted server-side.
    #[serde(default)]
    pub data_persistence: bool,
    /// Seconds a disconnected session is kept alive.
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            required_env_keys: Vec::new(),
            markdown: None,
            data_persistence: false,
            session_timeout_secs: default_session_timeout_secs(),
        }
    }
}

impl ProjectConfig {
    /// Validates project configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.required_env_keys.len() > MAX_REQUIRED_ENV_KEYS {
            return Err(ConfigError::Invalid(format!(
                "project.required_env_keys exceeds {MAX_REQUIRED_ENV_KEYS} entries"
            )));
        }
        for (index, key) in self.required_env_keys.iter().enumerate() {
            if key.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "project.required_env_keys entries must be non-empty".to_string(),
                ));
            }
            if key.len() > MAX_ENV_KEY_LENGTH {
                return Err(ConfigError::Invalid(format!(
                    "project.required_env_keys entry exceeds {MAX_ENV_KEY_LENGTH} bytes"
                )));
            }
            if self.required_env_keys[..index].contains(key) {
                return Err(ConfigError::Invalid(format!(
                    "project.required_env_keys contains duplicate {key}"
                )));
            }
        }
        if self.session_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "project.session_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Converts the offline settings into gate project settings.
    #[must_use]
    pub fn to_settings(&self) -> ProjectSettings {
        ProjectSettings {
            required_env_keys: self.required_env_keys.clone(),
            markdown: self.markdown.clone(),
            data_persistence: self.data_persistence,
            session_timeout_secs: self.session_timeout_secs,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration or opening a backend.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the default durable key for the user environment.
fn default_storage_key() -> String {
    DEFAULT_USER_ENV_KEY.to_string()
}

/// Returns the default `SQLite` busy timeout.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

/// Returns the default session timeout.
const fn default_session_timeout_secs() -> u64 {
    DEFAULT_SESSION_TIMEOUT_SECS
}

/// Reads a config file, refusing to buffer more than [`MAX_CONFIG_FILE_SIZE`].
fn read_config_bytes(path: &Path) -> Result<Vec<u8>, ConfigError> {
    let file = File::open(path).map_err(|err| ConfigError::Io(err.to_string()))?;
    let size = file.metadata().map_err(|err| ConfigError::Io(err.to_string()))?.len();
    let limit = u64::try_from(MAX_CONFIG_FILE_SIZE).unwrap_or(u64::MAX);
    if size > limit {
        return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|err| ConfigError::Io(err.to_string()))?;
    if bytes.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
    }
    Ok(bytes)
}

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured path field against length constraints.
fn validate_path_field(field: &str, path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}
