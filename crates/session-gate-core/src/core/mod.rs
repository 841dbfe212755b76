// crates/session-gate-core/src/core/mod.rs
// ============================================================================
// Module: Session Gate Core Types
// Description: Identifiers, settings, environment, and decision models.
// Purpose: Provide the plain data types shared by runtime and collaborators.
// Dependencies: serde, thiserror, uuid
// ============================================================================

//! ## Overview
//! Core types are plain data. They carry their own validation but no side
//! effects; state containers and the gate live in [`crate::runtime`].

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod decision;
pub mod environment;
pub mod identifiers;
pub mod settings;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use decision::GateDecision;
pub use decision::NavigationAction;
pub use environment::DEFAULT_USER_ENV_KEY;
pub use environment::EnvironmentParseError;
pub use environment::MAX_USER_ENV_BYTES;
pub use environment::UserEnvironment;
pub use identifiers::AccessToken;
pub use identifiers::Role;
pub use identifiers::RoleParseError;
pub use identifiers::SessionId;
pub use identifiers::SessionIdError;
pub use settings::DEFAULT_SESSION_TIMEOUT_SECS;
pub use settings::ProjectSettings;
