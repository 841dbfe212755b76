// crates/session-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Session Gate Runtime
// Description: State containers, the access gate, storage backends, and host.
// Purpose: Own session state and compute gate decisions on every change.
// Dependencies: crate::{core, interfaces, audit}, tokio
// ============================================================================

//! ## Overview
//! Runtime modules hold the mutable state of a client session and evaluate
//! the access gate. Every container is owned by a single [`GateHost`]; other
//! tasks reach it only through a [`GateHandle`], so readers observe fully
//! committed states.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod access;
pub mod environment;
pub mod gate;
pub mod host;
pub mod session;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use access::AccessState;
pub use environment::EnvironmentError;
pub use environment::StorageReadError;
pub use environment::UserEnvironmentStore;
pub use gate::AccessGate;
pub use gate::GateOutcome;
pub use gate::evaluate_gate;
pub use host::GateHandle;
pub use host::GateHost;
pub use host::GateInput;
pub use host::GateRunner;
pub use host::GateSnapshot;
pub use host::HostError;
pub use session::SessionIdentity;
pub use store::FileDurableStorage;
pub use store::InMemoryDurableStorage;
pub use store::SharedDurableStorage;
