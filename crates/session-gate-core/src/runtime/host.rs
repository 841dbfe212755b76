// crates/session-gate-core/src/runtime/host.rs
// ============================================================================
// Module: Gate Host
// Description: Single-actor owner of session state and the access gate.
// Purpose: Apply input batches and recompute the gate once per batch.
// Dependencies: crate::{audit, core, interfaces, runtime}, tokio
// ============================================================================

//! ## Overview
//! [`GateHost`] owns the session identity, user environment, access state,
//! latest project settings, and the access gate. Inputs arrive as
//! [`GateInput`] messages. Each scheduling tick the runner waits for one
//! message, drains everything already queued, applies the whole batch, and
//! recomputes the gate exactly once, so mutations arriving together cannot
//! produce transient navigation.
//!
//! Environment writes are fire-and-confirm: the caller awaits a completion
//! carrying either success or the persistence failure. The runner applies
//! each batch on the blocking pool, so durable writes never stall the async
//! workers. Readers observe committed state through a [`GateSnapshot`] watch
//! channel.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::watch;

use crate::audit::GateAuditEvent;
use crate::audit::GateAuditSink;
use crate::core::AccessToken;
use crate::core::GateDecision;
use crate::core::ProjectSettings;
use crate::core::Role;
use crate::core::SessionId;
use crate::interfaces::ViewRouter;
use crate::runtime::access::AccessState;
use crate::runtime::environment::EnvironmentError;
use crate::runtime::environment::UserEnvironmentStore;
use crate::runtime::gate::AccessGate;
use crate::runtime::gate::GateOutcome;
use crate::runtime::session::SessionIdentity;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Completion channel for environment mutations.
pub type EnvironmentReply = oneshot::Sender<Result<(), EnvironmentError>>;

/// Pending completion delivered once a batch commits.
type Completion = (EnvironmentReply, Result<(), EnvironmentError>);

/// Input delivered to the gate host.
#[derive(Debug)]
pub enum GateInput {
    /// Authentication provider reported credentials.
    Credentials {
        /// Bearer token.
        token: AccessToken,
        /// Role issued with the token.
        role: Role,
    },
    /// Authentication provider reported a logout.
    Logout,
    /// Project configuration service resolved the settings.
    SettingsResolved(ProjectSettings),
    /// User supplied an environment value.
    SetEnv {
        /// Environment key.
        key: String,
        /// Environment value.
        value: String,
        /// Completion notification for the durable write.
        reply: Option<EnvironmentReply>,
    },
    /// User removed an environment value.
    RemoveEnv {
        /// Environment key.
        key: String,
        /// Completion notification for the durable write.
        reply: Option<EnvironmentReply>,
    },
    /// Discard the session identifier and start a new one.
    ResetSession,
    /// Resume a known session identifier.
    ResumeSession(SessionId),
    /// Stop the runner after this batch.
    Shutdown,
}

/// Committed view of the host state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateSnapshot {
    /// Decision in force.
    pub decision: GateDecision,
    /// Current session identifier.
    pub session_id: SessionId,
    /// Role of the authenticated user.
    pub role: Role,
    /// Required environment keys still missing.
    pub missing_keys: Vec<String>,
    /// Whether the environment's durable copy is current.
    pub environment_persisted: bool,
    /// Number of gate recomputations so far.
    pub recomputations: u64,
}

/// Errors surfaced through a [`GateHandle`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The host has stopped.
    #[error("gate host is closed")]
    Closed,
    /// The environment mutation failed.
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
    /// A batch did not run to completion on the blocking pool.
    #[error("gate host worker failed: {0}")]
    Worker(String),
}

// ============================================================================
// SECTION: Gate Host
// ============================================================================

/// Owner of all session state for one client.
pub struct GateHost<R> {
    /// Session identifier owner.
    session: SessionIdentity,
    /// Persisted user environment.
    environment: UserEnvironmentStore,
    /// Credentials from the authentication provider.
    access: AccessState,
    /// Latest project settings, absent until resolved.
    settings: Option<ProjectSettings>,
    /// Gate driving the router.
    gate: AccessGate<R>,
    /// Audit sink for decisions and storage events.
    audit: Arc<dyn GateAuditSink>,
    /// Number of gate recomputations.
    recomputations: u64,
    /// Publisher of committed snapshots.
    snapshot: watch::Sender<GateSnapshot>,
    /// Set once a shutdown input is applied.
    stopped: bool,
}

impl<R: ViewRouter> GateHost<R> {
    /// Composes the inputs and performs the initial gate evaluation.
    #[must_use]
    pub fn new(
        mut session: SessionIdentity,
        environment: UserEnvironmentStore,
        router: R,
        audit: Arc<dyn GateAuditSink>,
    ) -> Self {
        if let Some(fallback) = environment.load_fallback() {
            audit.record(&GateAuditEvent::environment_load_fallback(
                environment.storage_key(),
                fallback,
            ));
        }
        let fresh = session.peek().is_none();
        let session_id = session.get();
        if fresh {
            audit.record(&GateAuditEvent::session("generated", &session_id));
        }
        let access = AccessState::new();
        let mut gate = AccessGate::new(router);
        let outcome = gate.evaluate(None, environment.environment(), &access);
        audit.record(&GateAuditEvent::decision(&outcome));
        let (snapshot, _) = watch::channel(GateSnapshot {
            decision: outcome.decision,
            session_id,
            role: access.role(),
            missing_keys: Vec::new(),
            environment_persisted: environment.is_persisted(),
            recomputations: 1,
        });
        Self {
            session,
            environment,
            access,
            settings: None,
            gate,
            audit,
            recomputations: 1,
            snapshot,
            stopped: false,
        }
    }

    /// Applies a batch of inputs and recomputes the gate at most once.
    ///
    /// Returns the outcome when any input in the batch could affect the
    /// decision, or `None` when only session inputs were applied.
    pub fn apply_batch<I>(&mut self, inputs: I) -> Option<GateOutcome>
    where
        I: IntoIterator<Item = GateInput>,
    {
        let mut affects_gate = false;
        let mut completions = Vec::new();
        for input in inputs {
            affects_gate |= self.apply(input, &mut completions);
        }
        let outcome = if affects_gate { Some(self.recompute()) } else { None };
        self.publish();
        for (reply, result) in completions {
            let _ = reply.send(result);
        }
        outcome
    }

    /// Applies a single input, returning whether it can affect the decision.
    ///
    /// Write completions are queued and delivered after the batch commits.
    fn apply(&mut self, input: GateInput, completions: &mut Vec<Completion>) -> bool {
        match input {
            GateInput::Credentials {
                token,
                role,
            } => {
                self.access.set_credentials(token, role);
                true
            }
            GateInput::Logout => {
                self.access.clear();
                true
            }
            GateInput::SettingsResolved(settings) => {
                self.settings = Some(settings);
                true
            }
            GateInput::SetEnv {
                key,
                value,
                reply,
            } => {
                let result = self.environment.set(key.clone(), value);
                self.audit_environment_write(&key, &result);
                if let Some(reply) = reply {
                    completions.push((reply, result));
                }
                true
            }
            GateInput::RemoveEnv {
                key,
                reply,
            } => {
                let result = self.environment.remove(&key).map(|_| ());
                self.audit_environment_write(&key, &result);
                if let Some(reply) = reply {
                    completions.push((reply, result));
                }
                true
            }
            GateInput::ResetSession => {
                self.session.reset();
                let session_id = self.session.get();
                self.audit.record(&GateAuditEvent::session("reset", &session_id));
                false
            }
            GateInput::ResumeSession(session_id) => {
                self.audit.record(&GateAuditEvent::session("resumed", &session_id));
                self.session.set(session_id);
                false
            }
            GateInput::Shutdown => {
                self.stopped = true;
                false
            }
        }
    }

    /// Audits the durable outcome of an environment write.
    fn audit_environment_write(&self, key: &str, result: &Result<(), EnvironmentError>) {
        match result {
            Ok(()) => self.audit.record(&GateAuditEvent::environment_write(key, Ok(()))),
            Err(EnvironmentError::Unpersisted {
                source, ..
            }) => self.audit.record(&GateAuditEvent::environment_write(key, Err(source))),
            Err(_) => {}
        }
    }

    /// Re-evaluates the gate against the current inputs.
    fn recompute(&mut self) -> GateOutcome {
        self.recomputations = self.recomputations.saturating_add(1);
        let outcome = self.gate.evaluate(
            self.settings.as_ref(),
            self.environment.environment(),
            &self.access,
        );
        self.audit.record(&GateAuditEvent::decision(&outcome));
        outcome
    }

    /// Publishes the committed state to snapshot readers.
    fn publish(&mut self) {
        let snapshot = self.snapshot_now();
        self.snapshot.send_replace(snapshot);
    }

    /// Builds a snapshot of the current state.
    fn snapshot_now(&mut self) -> GateSnapshot {
        let required = ProjectSettings::required_keys(self.settings.as_ref());
        GateSnapshot {
            decision: self.gate.current().unwrap_or(GateDecision::Unauthenticated),
            session_id: self.session.get(),
            role: self.access.role(),
            missing_keys: self.environment.missing_keys(required),
            environment_persisted: self.environment.is_persisted(),
            recomputations: self.recomputations,
        }
    }

    /// Returns the latest committed snapshot.
    #[must_use]
    pub fn snapshot(&self) -> GateSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Returns the decision in force.
    #[must_use]
    pub fn decision(&self) -> Option<GateDecision> {
        self.gate.current()
    }

    /// Returns the user environment store.
    #[must_use]
    pub const fn environment(&self) -> &UserEnvironmentStore {
        &self.environment
    }

    /// Returns the access state.
    #[must_use]
    pub const fn access(&self) -> &AccessState {
        &self.access
    }

    /// Returns the resolved project settings.
    #[must_use]
    pub const fn settings(&self) -> Option<&ProjectSettings> {
        self.settings.as_ref()
    }

    /// Returns the router.
    #[must_use]
    pub const fn router(&self) -> &R {
        self.gate.router()
    }

    /// Returns the number of gate recomputations so far.
    #[must_use]
    pub const fn recomputations(&self) -> u64 {
        self.recomputations
    }

    /// Returns true once a shutdown input has been applied.
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Moves the host behind a channel, returning a handle and its runner.
    #[must_use]
    pub fn start(self, capacity: usize) -> (GateHandle, GateRunner<R>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = GateHandle {
            tx,
            snapshot: self.snapshot.subscribe(),
        };
        let runner = GateRunner {
            host: self,
            rx,
        };
        (handle, runner)
    }
}

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Event loop that feeds queued inputs to a [`GateHost`].
pub struct GateRunner<R> {
    /// Host owning all state.
    host: GateHost<R>,
    /// Input queue.
    rx: mpsc::Receiver<GateInput>,
}

impl<R: ViewRouter + Send + 'static> GateRunner<R> {
    /// Runs until shutdown or until every handle is dropped, then returns
    /// the host.
    ///
    /// Each batch is applied inside [`tokio::task::spawn_blocking`] because
    /// environment writes hit durable storage synchronously.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Worker`] when a batch fails to complete on the
    /// blocking pool; the host is lost in that case.
    pub async fn run(self) -> Result<GateHost<R>, HostError> {
        let Self {
            mut host,
            mut rx,
        } = self;
        while let Some(first) = rx.recv().await {
            let mut batch = vec![first];
            while let Ok(next) = rx.try_recv() {
                batch.push(next);
            }
            host = tokio::task::spawn_blocking(move || {
                let mut host = host;
                host.apply_batch(batch);
                host
            })
            .await
            .map_err(|err| HostError::Worker(format!("gate batch join failed: {err}")))?;
            if host.is_stopped() {
                break;
            }
        }
        Ok(host)
    }
}

// ============================================================================
// SECTION: Handle
// ============================================================================

/// Cloneable entry point for other tasks.
#[derive(Clone)]
pub struct GateHandle {
    /// Input queue sender.
    tx: mpsc::Sender<GateInput>,
    /// Snapshot receiver.
    snapshot: watch::Receiver<GateSnapshot>,
}

impl GateHandle {
    /// Sends a raw input.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Closed`] when the host has stopped.
    pub async fn send(&self, input: GateInput) -> Result<(), HostError> {
        self.tx.send(input).await.map_err(|_| HostError::Closed)
    }

    /// Reports credentials from the authentication provider.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Closed`] when the host has stopped.
    pub async fn login(&self, token: AccessToken, role: Role) -> Result<(), HostError> {
        self.send(GateInput::Credentials {
            token,
            role,
        })
        .await
    }

    /// Reports a logout.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Closed`] when the host has stopped.
    pub async fn logout(&self) -> Result<(), HostError> {
        self.send(GateInput::Logout).await
    }

    /// Delivers resolved project settings.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Closed`] when the host has stopped.
    pub async fn resolve_settings(&self, settings: ProjectSettings) -> Result<(), HostError> {
        self.send(GateInput::SettingsResolved(settings)).await
    }

    /// Sets an environment value and waits for the durable write to finish.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Environment`] when the value was rejected or not
    /// persisted, and [`HostError::Closed`] when the host has stopped.
    pub async fn set_env(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), HostError> {
        let (reply, done) = oneshot::channel();
        self.send(GateInput::SetEnv {
            key: key.into(),
            value: value.into(),
            reply: Some(reply),
        })
        .await?;
        done.await.map_err(|_| HostError::Closed)?.map_err(HostError::from)
    }

    /// Removes an environment value and waits for the durable write.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Environment`] when the removal was not persisted,
    /// and [`HostError::Closed`] when the host has stopped.
    pub async fn remove_env(&self, key: impl Into<String>) -> Result<(), HostError> {
        let (reply, done) = oneshot::channel();
        self.send(GateInput::RemoveEnv {
            key: key.into(),
            reply: Some(reply),
        })
        .await?;
        done.await.map_err(|_| HostError::Closed)?.map_err(HostError::from)
    }

    /// Replaces the session identifier with a fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Closed`] when the host has stopped.
    pub async fn reset_session(&self) -> Result<(), HostError> {
        self.send(GateInput::ResetSession).await
    }

    /// Resumes a known session identifier.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Closed`] when the host has stopped.
    pub async fn resume_session(&self, session_id: SessionId) -> Result<(), HostError> {
        self.send(GateInput::ResumeSession(session_id)).await
    }

    /// Asks the runner to stop after its current batch.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Closed`] when the host has already stopped.
    pub async fn shutdown(&self) -> Result<(), HostError> {
        self.send(GateInput::Shutdown).await
    }

    /// Returns the latest committed snapshot.
    #[must_use]
    pub fn snapshot(&self) -> GateSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Returns a receiver notified on every committed batch.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<GateSnapshot> {
        self.snapshot.clone()
    }

    /// Waits until a committed snapshot satisfies `predicate`.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Closed`] when the host stops first.
    pub async fn wait_for<F>(&self, predicate: F) -> Result<GateSnapshot, HostError>
    where
        F: FnMut(&GateSnapshot) -> bool,
    {
        let mut receiver = self.snapshot.clone();
        let snapshot = receiver.wait_for(predicate).await.map_err(|_| HostError::Closed)?;
        Ok(snapshot.clone())
    }
}
