// crates/session-gate-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Durable Storage
// Description: DurableStorage backend using SQLite WAL.
// Purpose: Persist client-local key/value data across restarts.
// Dependencies: session-gate-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`DurableStorage`] implementation.
//! Each key holds one value blob together with its SHA-256 digest; reads
//! verify the digest and fail closed on corruption.
//!
//! [`DurableStorage`]: session_gate_core::DurableStorage

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteDurableStorage;
pub use store::SqliteStorageError;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
