// crates/session-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Session Gate Interfaces
// Description: Collaborator interfaces for durable storage and view routing.
// Purpose: Define the contract surfaces used by the Session Gate runtime.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how Session Gate integrates with the client platform
//! without embedding platform details. Durable storage is a byte-oriented
//! key/value store; the view router receives navigation actions and renders
//! protected content when the gate authorizes it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Durable Storage
// ============================================================================

/// Durable storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Storage I/O error.
    #[error("durable storage io error: {0}")]
    Io(String),
    /// Stored data failed integrity checks.
    #[error("durable storage corruption: {0}")]
    Corrupt(String),
    /// Request or stored data is invalid.
    #[error("durable storage invalid data: {0}")]
    Invalid(String),
    /// Storage is unavailable or full.
    #[error("durable storage unavailable: {0}")]
    Unavailable(String),
}

/// Client-local key/value store that survives process restarts.
pub trait DurableStorage {
    /// Reads the bytes stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the store cannot be read.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replaces the bytes stored under `key`.
    ///
    /// A successful return means the write is durable and visible to
    /// subsequent reads.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the write does not complete.
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;
}

// ============================================================================
// SECTION: View Router
// ============================================================================

/// Routing surface driven by gate decisions.
pub trait ViewRouter {
    /// Navigates to the login view.
    fn to_login(&mut self);

    /// Navigates to the environment-collection view.
    fn to_environment_collection(&mut self);

    /// Renders the protected view after the gate authorizes access.
    fn render_protected(&mut self) {}
}
