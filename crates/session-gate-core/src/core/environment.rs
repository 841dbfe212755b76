// crates/session-gate-core/src/core/environment.rs
// ============================================================================
// Module: Session Gate User Environment
// Description: Flat string-to-string mapping of user-supplied values.
// Purpose: Model the persisted user environment with strict schema checks.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! The user environment is one flat JSON object whose keys and values are
//! strings. Parsing is a schema check: arrays, nested objects, numbers, and
//! other shapes are rejected as a whole rather than coerced. Callers decide
//! how to recover; the runtime store downgrades any rejection to an empty
//! mapping.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Well-known durable storage key for the user environment.
pub const DEFAULT_USER_ENV_KEY: &str = "userEnv";
/// Maximum accepted size of a serialized user environment.
pub const MAX_USER_ENV_BYTES: usize = 256 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Reasons a persisted user environment blob is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvironmentParseError {
    /// Blob exceeds the size limit.
    #[error("user environment exceeds size limit: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
    /// Blob is not a flat object of strings.
    #[error("user environment is malformed: {0}")]
    Malformed(String),
}

// ============================================================================
// SECTION: User Environment
// ============================================================================

/// User-supplied key/value pairs required by the project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserEnvironment(BTreeMap<String, String>);

impl UserEnvironment {
    /// Creates an empty environment.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Parses a persisted environment blob.
    ///
    /// # Errors
    ///
    /// Returns [`EnvironmentParseError`] when the blob is oversized or is not
    /// a flat JSON object of string values.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, EnvironmentParseError> {
        if bytes.len() > MAX_USER_ENV_BYTES {
            return Err(EnvironmentParseError::TooLarge {
                max_bytes: MAX_USER_ENV_BYTES,
                actual_bytes: bytes.len(),
            });
        }
        let entries: BTreeMap<String, String> = serde_json::from_slice(bytes)
            .map_err(|err| EnvironmentParseError::Malformed(err.to_string()))?;
        Ok(Self(entries))
    }

    /// Serializes the environment as one flat JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if serialization fails.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }

    /// Returns the value stored for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Inserts or replaces a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Returns true iff every key maps to a non-empty value.
    #[must_use]
    pub fn has_all<K: AsRef<str>>(&self, keys: &[K]) -> bool {
        keys.iter().all(|key| self.get(key.as_ref()).is_some_and(|value| !value.is_empty()))
    }

    /// Returns the keys lacking a non-empty value, in request order.
    #[must_use]
    pub fn missing_keys<K: AsRef<str>>(&self, keys: &[K]) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();
        for key in keys {
            let key = key.as_ref();
            let present = self.get(key).is_some_and(|value| !value.is_empty());
            if !present && !missing.iter().any(|seen| seen == key) {
                missing.push(key.to_string());
            }
        }
        missing
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl From<BTreeMap<String, String>> for UserEnvironment {
    fn from(entries: BTreeMap<String, String>) -> Self {
        Self(entries)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for UserEnvironment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(key, value)| (key.into(), value.into())).collect())
    }
}
