// crates/session-gate-core/src/runtime/access.rs
// ============================================================================
// Module: Access State
// Description: Access token and role held as a coupled pair.
// Purpose: Derive the authentication flag the gate checks first.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Access state mirrors what the authentication provider last reported. The
//! token is not validated here; presence of a non-empty token is the whole
//! definition of "authenticated".

use crate::core::AccessToken;
use crate::core::Role;

/// Credentials reported by the authentication provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessState {
    /// Bearer token, absent when logged out.
    token: Option<AccessToken>,
    /// Role issued with the token.
    role: Role,
}

impl AccessState {
    /// Creates an unauthenticated access state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            token: None,
            role: Role::Unset,
        }
    }

    /// Replaces the token and role together.
    pub fn set_credentials(&mut self, token: AccessToken, role: Role) {
        self.token = Some(token);
        self.role = role;
    }

    /// Clears the token and role.
    pub fn clear(&mut self) {
        self.token = None;
        self.role = Role::Unset;
    }

    /// Returns true when a non-empty token is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.as_ref().is_some_and(|token| !token.is_empty())
    }

    /// Returns the current token.
    #[must_use]
    pub const fn token(&self) -> Option<&AccessToken> {
        self.token.as_ref()
    }

    /// Returns the current role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }
}
