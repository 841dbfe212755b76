// crates/session-gate-core/src/lib.rs
// ============================================================================
// Module: Session Gate Core Library
// Description: Public API surface for the Session Gate core.
// Purpose: Expose identity, environment, access, and gate decision types.
// Dependencies: crate::{audit, core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Session Gate core decides which logical view a chat client may render. It
//! owns the client session identifier, the persisted user environment, and
//! the access credentials, and composes them with externally supplied project
//! settings into a single gate decision. The core performs no network I/O and
//! does not validate credentials; collaborators are reached through explicit
//! interfaces.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use audit::FileAuditSink;
pub use audit::GateAuditEvent;
pub use audit::GateAuditSink;
pub use audit::MemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use interfaces::DurableStorage;
pub use interfaces::StorageError;
pub use interfaces::ViewRouter;
pub use runtime::AccessGate;
pub use runtime::AccessState;
pub use runtime::EnvironmentError;
pub use runtime::FileDurableStorage;
pub use runtime::GateHandle;
pub use runtime::GateHost;
pub use runtime::GateInput;
pub use runtime::GateOutcome;
pub use runtime::GateRunner;
pub use runtime::GateSnapshot;
pub use runtime::HostError;
pub use runtime::InMemoryDurableStorage;
pub use runtime::SessionIdentity;
pub use runtime::SharedDurableStorage;
pub use runtime::StorageReadError;
pub use runtime::UserEnvironmentStore;
pub use runtime::evaluate_gate;
