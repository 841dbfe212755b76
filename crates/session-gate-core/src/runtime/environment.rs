// crates/session-gate-core/src/runtime/environment.rs
// ============================================================================
// Module: User Environment Store
// Description: Persisted user environment with write-through semantics.
// Purpose: Keep user-supplied values across restarts and report divergence.
// Dependencies: crate::{core, interfaces, runtime::store}, thiserror
// ============================================================================

//! ## Overview
//! [`UserEnvironmentStore`] loads the user environment once at startup and
//! writes the full mapping back to durable storage on every mutation. Loads
//! fail soft: unreadable or malformed data yields an empty mapping and the
//! reason is kept for auditing. Writes fail loud: a failed write returns
//! [`EnvironmentError::Unpersisted`] and leaves the in-memory mapping updated
//! but marked unpersisted until a later write succeeds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::EnvironmentParseError;
use crate::core::MAX_USER_ENV_BYTES;
use crate::core::UserEnvironment;
use crate::interfaces::DurableStorage;
use crate::interfaces::StorageError;
use crate::runtime::store::SharedDurableStorage;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Reasons the persisted environment could not be loaded.
///
/// These are recovered locally and never shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageReadError {
    /// Durable storage could not be read.
    #[error("user environment unreadable: {0}")]
    Unavailable(StorageError),
    /// Stored data failed schema validation.
    #[error("user environment rejected: {0}")]
    Malformed(EnvironmentParseError),
}

/// User environment mutation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvironmentError {
    /// Key was empty after trimming.
    #[error("user environment key must be non-empty")]
    EmptyKey,
    /// Mapping could not be serialized.
    #[error("user environment serialization failed: {0}")]
    Serialize(String),
    /// Mutation would grow the serialized mapping past the load limit.
    #[error(
        "user environment too large after setting {key}: {actual_bytes} bytes (max {max_bytes})"
    )]
    TooLarge {
        /// Key whose mutation was refused.
        key: String,
        /// Maximum serialized size in bytes.
        max_bytes: usize,
        /// Serialized size the mutation would produce.
        actual_bytes: usize,
    },
    /// In-memory change applied but durable write failed.
    #[error("user environment not persisted for key {key}: {source}")]
    Unpersisted {
        /// Key whose mutation triggered the write.
        key: String,
        /// Storage failure.
        source: StorageError,
    },
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Owner of the user environment and its durable copy.
#[derive(Clone)]
pub struct UserEnvironmentStore {
    /// In-memory mapping.
    environment: UserEnvironment,
    /// Durable backing store.
    storage: SharedDurableStorage,
    /// Durable storage key.
    storage_key: String,
    /// Whether the durable copy matches the in-memory mapping.
    persisted: bool,
    /// Reason the last load fell back to an empty mapping.
    load_fallback: Option<StorageReadError>,
}

impl UserEnvironmentStore {
    /// Loads the environment stored under `storage_key`.
    ///
    /// Absent data yields an empty mapping. Unreadable or malformed data
    /// also yields an empty mapping and is reported by
    /// [`UserEnvironmentStore::load_fallback`].
    #[must_use]
    pub fn load(storage: SharedDurableStorage, storage_key: impl Into<String>) -> Self {
        let storage_key = storage_key.into();
        let (environment, load_fallback) = match storage.read(&storage_key) {
            Ok(None) => (UserEnvironment::new(), None),
            Ok(Some(bytes)) => match UserEnvironment::from_json_bytes(&bytes) {
                Ok(environment) => (environment, None),
                Err(err) => (UserEnvironment::new(), Some(StorageReadError::Malformed(err))),
            },
            Err(err) => (UserEnvironment::new(), Some(StorageReadError::Unavailable(err))),
        };
        Self {
            environment,
            storage,
            storage_key,
            persisted: load_fallback.is_none(),
            load_fallback,
        }
    }

    /// Returns the value stored for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.environment.get(key)
    }

    /// Upserts a value and persists the full mapping.
    ///
    /// # Errors
    ///
    /// Returns [`EnvironmentError::EmptyKey`] without mutating when the key
    /// is blank, [`EnvironmentError::TooLarge`] without mutating when the
    /// serialized mapping would exceed [`MAX_USER_ENV_BYTES`], and
    /// [`EnvironmentError::Unpersisted`] when the durable write fails; the
    /// in-memory value is kept in that case.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), EnvironmentError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(EnvironmentError::EmptyKey);
        }
        let previous = self.environment.insert(key.clone(), value);
        let payload = match self.encode(&key) {
            Ok(payload) => payload,
            Err(err) => {
                match previous {
                    Some(previous) => {
                        self.environment.insert(key, previous);
                    }
                    None => {
                        self.environment.remove(&key);
                    }
                }
                return Err(err);
            }
        };
        self.write_payload(&key, &payload)
    }

    /// Removes a key and persists the full mapping.
    ///
    /// # Errors
    ///
    /// Returns [`EnvironmentError::Unpersisted`] when the durable write fails.
    pub fn remove(&mut self, key: &str) -> Result<Option<String>, EnvironmentError> {
        let removed = self.environment.remove(key);
        if removed.is_none() && self.persisted {
            return Ok(None);
        }
        self.persist(key)?;
        Ok(removed)
    }

    /// Retries the durable write of the current mapping.
    ///
    /// # Errors
    ///
    /// Returns [`EnvironmentError::Unpersisted`] when the durable write fails.
    pub fn flush(&mut self) -> Result<(), EnvironmentError> {
        let key = self.storage_key.clone();
        self.persist(&key)
    }

    /// Returns true iff every key maps to a non-empty value.
    #[must_use]
    pub fn has_all<K: AsRef<str>>(&self, keys: &[K]) -> bool {
        self.environment.has_all(keys)
    }

    /// Returns the keys lacking a non-empty value, in request order.
    #[must_use]
    pub fn missing_keys<K: AsRef<str>>(&self, keys: &[K]) -> Vec<String> {
        self.environment.missing_keys(keys)
    }

    /// Returns the in-memory mapping.
    #[must_use]
    pub const fn environment(&self) -> &UserEnvironment {
        &self.environment
    }

    /// Returns false while the durable copy lags the in-memory mapping.
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Returns why the last load fell back to an empty mapping.
    #[must_use]
    pub const fn load_fallback(&self) -> Option<&StorageReadError> {
        self.load_fallback.as_ref()
    }

    /// Returns the durable storage key.
    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Serializes the mapping for the outbound `user-env` connection header.
    ///
    /// # Errors
    ///
    /// Returns [`EnvironmentError::Serialize`] if serialization fails.
    pub fn to_header_value(&self) -> Result<String, EnvironmentError> {
        self.environment.to_json_string().map_err(|err| EnvironmentError::Serialize(err.to_string()))
    }

    /// Serializes the mapping, refusing payloads a later load would reject.
    fn encode(&self, key: &str) -> Result<String, EnvironmentError> {
        let payload = self.to_header_value()?;
        if payload.len() > MAX_USER_ENV_BYTES {
            return Err(EnvironmentError::TooLarge {
                key: key.to_string(),
                max_bytes: MAX_USER_ENV_BYTES,
                actual_bytes: payload.len(),
            });
        }
        Ok(payload)
    }

    /// Writes the full mapping and updates the persisted flag.
    fn persist(&mut self, key: &str) -> Result<(), EnvironmentError> {
        let payload = self.encode(key)?;
        self.write_payload(key, &payload)
    }

    /// Writes an encoded payload and updates the persisted flag.
    fn write_payload(&mut self, key: &str, payload: &str) -> Result<(), EnvironmentError> {
        match self.storage.write(&self.storage_key, payload.as_bytes()) {
            Ok(()) => {
                self.persisted = true;
                Ok(())
            }
            Err(source) => {
                self.persisted = false;
                Err(EnvironmentError::Unpersisted {
                    key: key.to_string(),
                    source,
                })
            }
        }
    }
}
