// crates/session-gate-core/src/core/decision.rs
// ============================================================================
// Module: Session Gate Decisions
// Description: Gate decisions and the navigation actions they imply.
// Purpose: Give the view router a single authoritative render outcome.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`GateDecision`] is the only output of the access gate. Two of the three
//! decisions redirect the client through a [`NavigationAction`]; the
//! authorized decision renders protected content in place.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Gate Decision
// ============================================================================

/// Render decision computed by the access gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    /// No usable access token; the client must log in.
    Unauthenticated,
    /// Authenticated, but required environment values are missing.
    MissingEnvironment,
    /// Protected content may render.
    Authorized,
}

impl GateDecision {
    /// Returns the navigation action this decision requires, if any.
    #[must_use]
    pub const fn navigation(self) -> Option<NavigationAction> {
        match self {
            Self::Unauthenticated => Some(NavigationAction::ToLogin),
            Self::MissingEnvironment => Some(NavigationAction::ToEnvironmentCollection),
            Self::Authorized => None,
        }
    }

    /// Returns true when protected content may render.
    #[must_use]
    pub const fn is_authorized(self) -> bool {
        matches!(self, Self::Authorized)
    }

    /// Returns a stable label for logs and CLI output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::MissingEnvironment => "missing_environment",
            Self::Authorized => "authorized",
        }
    }
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// SECTION: Navigation Action
// ============================================================================

/// Redirect issued to the view router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationAction {
    /// Navigate to the login view.
    ToLogin,
    /// Navigate to the environment-collection view.
    ToEnvironmentCollection,
}

impl NavigationAction {
    /// Returns a stable label for logs and CLI output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ToLogin => "to_login",
            Self::ToEnvironmentCollection => "to_environment_collection",
        }
    }
}

impl fmt::Display for NavigationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
