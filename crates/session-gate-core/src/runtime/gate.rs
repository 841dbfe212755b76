// crates/session-gate-core/src/runtime/gate.rs
// ============================================================================
// Module: Access Gate
// Description: Gate decision function and idempotent navigation latch.
// Purpose: Decide which logical view is active and redirect on change.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! [`evaluate_gate`] is a pure function of project settings, the user
//! environment, and access state. Precedence is total: missing credentials
//! dominate, then missing environment values, then authorization.
//! [`AccessGate`] wraps it with a router and only issues navigation when the
//! decision changes, so repeated evaluations of an unchanged state have no
//! observable side effects.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::GateDecision;
use crate::core::NavigationAction;
use crate::core::ProjectSettings;
use crate::core::UserEnvironment;
use crate::interfaces::ViewRouter;
use crate::runtime::access::AccessState;

// ============================================================================
// SECTION: Decision Function
// ============================================================================

/// Computes the gate decision for the given inputs.
///
/// Unresolved settings (`None`) require no environment keys.
#[must_use]
pub fn evaluate_gate(
    settings: Option<&ProjectSettings>,
    environment: &UserEnvironment,
    access: &AccessState,
) -> GateDecision {
    if !access.is_authenticated() {
        return GateDecision::Unauthenticated;
    }
    let required = ProjectSettings::required_keys(settings);
    if !required.is_empty() && !environment.has_all(required) {
        return GateDecision::MissingEnvironment;
    }
    GateDecision::Authorized
}

// ============================================================================
// SECTION: Gate Outcome
// ============================================================================

/// Result of applying a decision to the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateOutcome {
    /// Decision now in force.
    pub decision: GateDecision,
    /// Decision in force before this evaluation.
    pub previous: Option<GateDecision>,
    /// Navigation issued by this evaluation, if any.
    pub navigation: Option<NavigationAction>,
}

impl GateOutcome {
    /// Returns true when the decision differs from the previous one.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.previous != Some(self.decision)
    }
}

// ============================================================================
// SECTION: Access Gate
// ============================================================================

/// Gate that drives a router from successive decisions.
pub struct AccessGate<R> {
    /// Router receiving navigation actions.
    router: R,
    /// Decision most recently applied.
    current: Option<GateDecision>,
}

impl<R: ViewRouter> AccessGate<R> {
    /// Creates a gate that has not decided anything yet.
    #[must_use]
    pub const fn new(router: R) -> Self {
        Self {
            router,
            current: None,
        }
    }

    /// Evaluates the inputs and applies the resulting decision.
    pub fn evaluate(
        &mut self,
        settings: Option<&ProjectSettings>,
        environment: &UserEnvironment,
        access: &AccessState,
    ) -> GateOutcome {
        self.apply(evaluate_gate(settings, environment, access))
    }

    /// Applies a decision, navigating only when it changed.
    pub fn apply(&mut self, decision: GateDecision) -> GateOutcome {
        let previous = self.current.replace(decision);
        if previous == Some(decision) {
            return GateOutcome {
                decision,
                previous,
                navigation: None,
            };
        }
        let navigation = decision.navigation();
        match navigation {
            Some(NavigationAction::ToLogin) => self.router.to_login(),
            Some(NavigationAction::ToEnvironmentCollection) => {
                self.router.to_environment_collection();
            }
            None => self.router.render_protected(),
        }
        GateOutcome {
            decision,
            previous,
            navigation,
        }
    }

    /// Returns the decision currently in force.
    #[must_use]
    pub const fn current(&self) -> Option<GateDecision> {
        self.current
    }

    /// Returns the router.
    #[must_use]
    pub const fn router(&self) -> &R {
        &self.router
    }

    /// Returns the router mutably.
    pub const fn router_mut(&mut self) -> &mut R {
        &mut self.router
    }
}
