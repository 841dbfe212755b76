// crates/session-gate-config/src/lib.rs
// ============================================================================
// Module: Session Gate Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for session-gate.toml semantics.
// Dependencies: session-gate-core, session-gate-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `session-gate-config` defines the configuration model for the session
//! gate: which durable storage backend holds the user environment, where
//! audit events go, and the offline project settings used by the CLI.
//! Validation is strict and fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
