// crates/session-gate-core/src/core/identifiers.rs
// ============================================================================
// Module: Session Gate Identifiers
// Description: Session identifiers, access tokens, and roles.
// Purpose: Provide strongly typed, serializable identity values.
// Dependencies: rand, serde, thiserror, uuid
// ============================================================================

//! ## Overview
//! This module defines the identity values the gate works with. A
//! [`SessionId`] is always a syntactically valid, non-nil UUID; generated
//! identifiers are random version-4 UUIDs drawn from the operating system RNG.
//! [`AccessToken`] is opaque and never printed. [`Role`] is a closed set
//! mirroring the roles issued by the authentication provider.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use uuid::Builder;
use uuid::Uuid;

// ============================================================================
// SECTION: Session Identifier
// ============================================================================

/// Errors raised when an explicit session identifier is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionIdError {
    /// Value was empty after trimming.
    #[error("session id must be non-empty")]
    Empty,
    /// Value is not a UUID.
    #[error("session id is not a valid uuid: {0}")]
    Malformed(String),
    /// Value is the nil UUID.
    #[error("session id must not be the nil uuid")]
    Nil,
}

/// Opaque per-client session identifier used to correlate requests.
///
/// # Invariants
/// - The wrapped string always parses as a non-nil UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh random session identifier.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        Self(Builder::from_random_bytes(bytes).into_uuid().hyphenated().to_string())
    }

    /// Parses an explicit session identifier.
    ///
    /// Any textual form [`Uuid::try_parse`] accepts (hyphenated, simple,
    /// braced, or `urn:uuid:`) is normalized to lowercase hyphenated text.
    ///
    /// # Errors
    ///
    /// Returns [`SessionIdError`] when the value is empty, malformed, or nil.
    pub fn parse(value: impl Into<String>) -> Result<Self, SessionIdError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(SessionIdError::Empty);
        }
        let parsed =
            Uuid::try_parse(trimmed).map_err(|err| SessionIdError::Malformed(err.to_string()))?;
        if parsed.is_nil() {
            return Err(SessionIdError::Nil);
        }
        Ok(Self(parsed.hyphenated().to_string()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for SessionId {
    type Error = SessionIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<SessionId> for String {
    fn from(value: SessionId) -> Self {
        value.0
    }
}

impl FromStr for SessionId {
    type Err = SessionIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

// ============================================================================
// SECTION: Access Token
// ============================================================================

/// Opaque bearer token issued by the authentication provider.
///
/// The token is never validated here and is redacted from debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps a raw token value.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the token carries no characters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

impl From<&str> for AccessToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AccessToken {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Role
// ============================================================================

/// Role attached to an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// No role has been assigned.
    #[default]
    Unset,
    /// Regular user.
    User,
    /// Project administrator.
    Admin,
    /// Project owner.
    Owner,
    /// Anonymous visitor.
    Anonymous,
}

/// Error returned for unknown role labels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct RoleParseError(pub String);

impl Role {
    /// Returns the stable wire label for the role.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unset => "UNSET",
            Self::User => "USER",
            Self::Admin => "ADMIN",
            Self::Owner => "OWNER",
            Self::Anonymous => "ANONYMOUS",
        }
    }

    /// Parses a role label case-insensitively. Blank input maps to [`Role::Unset`].
    ///
    /// # Errors
    ///
    /// Returns [`RoleParseError`] when the label is not a declared role.
    pub fn parse(label: &str) -> Result<Self, RoleParseError> {
        let trimmed = label.trim();
        if trimmed.is_empty() {
            return Ok(Self::Unset);
        }
        match trimmed.to_ascii_uppercase().as_str() {
            "UNSET" => Ok(Self::Unset),
            "USER" => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            "OWNER" => Ok(Self::Owner),
            "ANONYMOUS" => Ok(Self::Anonymous),
            _ => Err(RoleParseError(trimmed.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}
