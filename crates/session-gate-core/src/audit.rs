// crates/session-gate-core/src/audit.rs
// ============================================================================
// Module: Session Gate Audit Logging
// Description: Structured audit events for gate decisions and storage.
// Purpose: Emit redacted JSON-line logs without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! This module defines audit event payloads and sinks for the gate host.
//! Events are serialized as one JSON object per line so deployments can route
//! them to their preferred logging pipeline. Access tokens and environment
//! values are never recorded; environment events carry the storage key only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::core::GateDecision;
use crate::core::NavigationAction;
use crate::core::SessionId;
use crate::interfaces::StorageError;
use crate::runtime::GateOutcome;
use crate::runtime::StorageReadError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Gate audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Gate decision after evaluation.
    pub decision: Option<GateDecision>,
    /// Gate decision before evaluation.
    pub previous: Option<GateDecision>,
    /// Navigation issued to the router.
    pub navigation: Option<NavigationAction>,
    /// Session identifier affected by a session event.
    pub session_id: Option<String>,
    /// Durable storage key affected by an environment event.
    pub storage_key: Option<String>,
    /// Short outcome label.
    pub outcome: Option<&'static str>,
    /// Diagnostic message (never contains secrets).
    pub message: Option<String>,
}

impl GateAuditEvent {
    /// Creates an empty event with a consistent timestamp.
    fn base(event: &'static str) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event,
            timestamp_ms,
            decision: None,
            previous: None,
            navigation: None,
            session_id: None,
            storage_key: None,
            outcome: None,
            message: None,
        }
    }

    /// Records a gate recomputation.
    #[must_use]
    pub fn decision(outcome: &GateOutcome) -> Self {
        Self {
            decision: Some(outcome.decision),
            previous: outcome.previous,
            navigation: outcome.navigation,
            outcome: Some(if outcome.changed() { "changed" } else { "unchanged" }),
            ..Self::base("gate_decision")
        }
    }

    /// Records a user environment load that fell back to an empty mapping.
    #[must_use]
    pub fn environment_load_fallback(key: &str, fallback: &StorageReadError) -> Self {
        Self {
            storage_key: Some(key.to_string()),
            outcome: Some("fallback_empty"),
            message: Some(fallback.to_string()),
            ..Self::base("env_load")
        }
    }

    /// Records the outcome of a user environment write.
    #[must_use]
    pub fn environment_write(key: &str, result: Result<(), &StorageError>) -> Self {
        let (outcome, message) = match result {
            Ok(()) => ("persisted", None),
            Err(err) => ("unpersisted", Some(err.to_string())),
        };
        Self {
            storage_key: Some(key.to_string()),
            outcome: Some(outcome),
            message,
            ..Self::base("env_write")
        }
    }

    /// Records a session identity change.
    #[must_use]
    pub fn session(action: &'static str, session_id: &SessionId) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            outcome: Some(action),
            ..Self::base("session")
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for gate events.
pub trait GateAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &GateAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl GateAuditSink for StderrAuditSink {
    fn record(&self, event: &GateAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl GateAuditSink for FileAuditSink {
    fn record(&self, event: &GateAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl GateAuditSink for NoopAuditSink {
    fn record(&self, _event: &GateAuditEvent) {}
}

/// Audit sink that keeps events in memory for inspection.
#[derive(Default)]
pub struct MemoryAuditSink {
    /// Recorded events in arrival order.
    events: Mutex<Vec<GateAuditEvent>>,
}

impl MemoryAuditSink {
    /// Creates an empty in-memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<GateAuditEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl GateAuditSink for MemoryAuditSink {
    fn record(&self, event: &GateAuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
