// crates/session-gate-core/src/runtime/session.rs
// ============================================================================
// Module: Session Identity
// Description: Lazily generated session identifier with reset semantics.
// Purpose: Own the client session identifier for its whole lifetime.
// Dependencies: crate::core, url
// ============================================================================

//! ## Overview
//! [`SessionIdentity`] generates its identifier on first read and keeps it
//! until an explicit [`SessionIdentity::reset`] or [`SessionIdentity::set`].
//! A reset always yields a value different from the one it discards; an
//! explicit set stores exactly the value given and never regenerates.

// ============================================================================
// SECTION: Imports
// ============================================================================

use url::form_urlencoded;

use crate::core::SessionId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Query parameter carrying a session identifier to resume.
pub const SESSION_QUERY_PARAM: &str = "id";

// ============================================================================
// SECTION: Session Identity
// ============================================================================

/// Owner of the client session identifier.
#[derive(Debug, Clone, Default)]
pub struct SessionIdentity {
    /// Current identifier, generated on first read.
    current: Option<SessionId>,
}

impl SessionIdentity {
    /// Creates an identity with no identifier generated yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: None,
        }
    }

    /// Creates an identity resumed from a known identifier.
    #[must_use]
    pub const fn with_id(id: SessionId) -> Self {
        Self {
            current: Some(id),
        }
    }

    /// Returns the current identifier, generating one on first use.
    pub fn get(&mut self) -> SessionId {
        self.current.get_or_insert_with(SessionId::generate).clone()
    }

    /// Returns the current identifier without generating one.
    #[must_use]
    pub const fn peek(&self) -> Option<&SessionId> {
        self.current.as_ref()
    }

    /// Discards the current identifier and replaces it with a fresh one.
    pub fn reset(&mut self) {
        let previous = self.current.take();
        let mut next = SessionId::generate();
        while previous.as_ref() == Some(&next) {
            next = SessionId::generate();
        }
        self.current = Some(next);
    }

    /// Overwrites the identifier with an explicit value.
    pub fn set(&mut self, id: SessionId) {
        self.current = Some(id);
    }

    /// Resumes the session named by an `id` query parameter.
    ///
    /// Accepts a raw query string with or without the leading `?`. Returns
    /// the resumed identifier, or `None` when the parameter is absent or does
    /// not hold a valid identifier; in that case the identity is unchanged.
    pub fn resume_from_query(&mut self, query: &str) -> Option<SessionId> {
        let query = query.strip_prefix('?').unwrap_or(query);
        let id = form_urlencoded::parse(query.as_bytes())
            .find(|(name, _)| name == SESSION_QUERY_PARAM)
            .and_then(|(_, value)| SessionId::parse(value.into_owned()).ok())?;
        self.set(id.clone());
        Some(id)
    }
}
