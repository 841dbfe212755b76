// crates/session-gate-core/src/core/settings.rs
// ============================================================================
// Module: Session Gate Project Settings
// Description: Project settings supplied by the configuration service.
// Purpose: Carry required environment keys and welcome content to the gate.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Project settings arrive wholesale from the project configuration service
//! and are read-only from the gate's perspective. The serialized shape
//! matches the service payload (`userEnv`, `markdown`, `dataPersistence`);
//! unrelated presentational fields are ignored.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default session timeout advertised by the project (seconds).
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 3_600;

// ============================================================================
// SECTION: Project Settings
// ============================================================================

/// Project-wide settings relevant to access gating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    /// Environment keys every user must supply, in display order.
    #[serde(rename = "userEnv", default, deserialize_with = "null_as_empty")]
    pub required_env_keys: Vec<String>,
    /// Welcome markdown shown before the first message.
    #[serde(default)]
    pub markdown: Option<String>,
    /// Whether conversation history is persisted server-side.
    #[serde(default)]
    pub data_persistence: bool,
    /// Seconds a disconnected session is kept alive server-side.
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            required_env_keys: Vec::new(),
            markdown: None,
            data_persistence: false,
            session_timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS,
        }
    }
}

impl ProjectSettings {
    /// Creates settings requiring the given environment keys.
    #[must_use]
    pub fn with_required_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            required_env_keys: keys.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Parses settings from the configuration service JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] when the payload does not match the
    /// settings shape.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Returns the required keys for possibly-unresolved settings.
    ///
    /// Unresolved settings require nothing, so the gate never blocks on
    /// configuration it has not seen yet.
    #[must_use]
    pub fn required_keys(settings: Option<&Self>) -> &[String] {
        settings.map_or(&[], |settings| settings.required_env_keys.as_slice())
    }
}

/// Returns the default session timeout for serde.
const fn default_session_timeout_secs() -> u64 {
    DEFAULT_SESSION_TIMEOUT_SECS
}

/// Treats an explicit `null` key list as empty.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
