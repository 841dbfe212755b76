// crates/session-gate-core/tests/access_gate.rs
// ============================================================================
// Module: Access Gate Tests
// Description: Tests for the gate decision function and navigation latch.
// Purpose: Validate decision precedence and idempotent navigation.
// Dependencies: session-gate-core, proptest
// ============================================================================
//! ## Overview
//! Covers every precedence case of the gate decision, the behavior with
//! unresolved settings, and that navigation is issued only on change.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use proptest::prelude::*;
use session_gate_core::AccessGate;
use session_gate_core::AccessState;
use session_gate_core::AccessToken;
use session_gate_core::GateDecision;
use session_gate_core::NavigationAction;
use session_gate_core::ProjectSettings;
use session_gate_core::Role;
use session_gate_core::UserEnvironment;
use session_gate_core::ViewRouter;
use session_gate_core::evaluate_gate;

/// Router that records every call it receives.
#[derive(Debug, Default)]
struct RecordingRouter {
    calls: Vec<&'static str>,
}

impl ViewRouter for RecordingRouter {
    fn to_login(&mut self) {
        self.calls.push("login");
    }

    fn to_environment_collection(&mut self) {
        self.calls.push("env");
    }

    fn render_protected(&mut self) {
        self.calls.push("protected");
    }
}

fn logged_in() -> AccessState {
    let mut access = AccessState::new();
    access.set_credentials(AccessToken::new("t"), Role::User);
    access
}

#[test]
fn unauthenticated_dominates_missing_environment() {
    let settings = ProjectSettings::with_required_keys(["K"]);
    let decision = evaluate_gate(Some(&settings), &UserEnvironment::new(), &AccessState::new());
    assert_eq!(decision, GateDecision::Unauthenticated);
    assert_eq!(decision.navigation(), Some(NavigationAction::ToLogin));
}

#[test]
fn empty_token_is_not_authenticated() {
    let mut access = AccessState::new();
    access.set_credentials(AccessToken::new(""), Role::Admin);
    let decision = evaluate_gate(None, &UserEnvironment::new(), &access);
    assert_eq!(decision, GateDecision::Unauthenticated);
}

#[test]
fn missing_required_key_redirects_to_environment_collection() {
    let settings = ProjectSettings::with_required_keys(["K"]);
    let decision = evaluate_gate(Some(&settings), &UserEnvironment::new(), &logged_in());
    assert_eq!(decision, GateDecision::MissingEnvironment);
    assert_eq!(decision.navigation(), Some(NavigationAction::ToEnvironmentCollection));
}

#[test]
fn empty_value_counts_as_missing() {
    let settings = ProjectSettings::with_required_keys(["K"]);
    let environment: UserEnvironment = [("K", "")].into_iter().collect();
    let decision = evaluate_gate(Some(&settings), &environment, &logged_in());
    assert_eq!(decision, GateDecision::MissingEnvironment);
}

#[test]
fn satisfied_environment_is_authorized() {
    let settings = ProjectSettings::with_required_keys(["K"]);
    let environment: UserEnvironment = [("K", "v")].into_iter().collect();
    let decision = evaluate_gate(Some(&settings), &environment, &logged_in());
    assert_eq!(decision, GateDecision::Authorized);
    assert!(decision.navigation().is_none());
}

#[test]
fn empty_or_unresolved_requirements_never_block() {
    let settings = ProjectSettings::default();
    let environment = UserEnvironment::new();
    assert_eq!(evaluate_gate(Some(&settings), &environment, &logged_in()), GateDecision::Authorized);
    assert_eq!(evaluate_gate(None, &environment, &logged_in()), GateDecision::Authorized);
}

#[test]
fn navigation_is_issued_only_on_change() {
    let settings = ProjectSettings::with_required_keys(["K"]);
    let mut environment = UserEnvironment::new();
    let mut access = AccessState::new();
    let mut gate = AccessGate::new(RecordingRouter::default());

    let first = gate.evaluate(Some(&settings), &environment, &access);
    assert_eq!(first.navigation, Some(NavigationAction::ToLogin));
    let repeat = gate.evaluate(Some(&settings), &environment, &access);
    assert!(!repeat.changed());
    assert!(repeat.navigation.is_none());

    access.set_credentials(AccessToken::new("t"), Role::User);
    gate.evaluate(Some(&settings), &environment, &access);
    gate.evaluate(Some(&settings), &environment, &access);

    environment.insert("K", "v");
    gate.evaluate(Some(&settings), &environment, &access);
    gate.evaluate(Some(&settings), &environment, &access);

    assert_eq!(gate.router().calls, vec!["login", "env", "protected"]);
    assert_eq!(gate.current(), Some(GateDecision::Authorized));
}

#[test]
fn settings_arriving_after_authorization_redirect_once() {
    let mut gate = AccessGate::new(RecordingRouter::default());
    let environment = UserEnvironment::new();
    let access = logged_in();

    let outcome = gate.evaluate(None, &environment, &access);
    assert_eq!(outcome.decision, GateDecision::Authorized);

    let settings = ProjectSettings::with_required_keys(["K"]);
    let outcome = gate.evaluate(Some(&settings), &environment, &access);
    assert_eq!(outcome.previous, Some(GateDecision::Authorized));
    assert_eq!(outcome.navigation, Some(NavigationAction::ToEnvironmentCollection));
    assert_eq!(gate.router().calls, vec!["protected", "env"]);
}

#[test]
fn logout_from_authorized_redirects_to_login() {
    let mut gate = AccessGate::new(RecordingRouter::default());
    let environment = UserEnvironment::new();
    let mut access = logged_in();
    gate.evaluate(None, &environment, &access);
    access.clear();
    assert_eq!(access.role(), Role::Unset);
    let outcome = gate.evaluate(None, &environment, &access);
    assert_eq!(outcome.navigation, Some(NavigationAction::ToLogin));
}

#[test]
fn settings_parse_from_configuration_payload() {
    let payload = br#"{"ui": {"name": "demo"}, "userEnv": ["OPENAI_API_KEY"], "dataPersistence": true, "markdown": "hi"}"#;
    let settings = ProjectSettings::from_json_slice(payload).unwrap();
    assert_eq!(settings.required_env_keys, vec!["OPENAI_API_KEY"]);
    assert!(settings.data_persistence);
    assert_eq!(settings.markdown.as_deref(), Some("hi"));

    let settings = ProjectSettings::from_json_slice(br#"{"userEnv": null}"#).unwrap();
    assert!(settings.required_env_keys.is_empty());
}

proptest! {
    #[test]
    fn decision_matches_precedence(
        authenticated in any::<bool>(),
        required in proptest::collection::vec("[A-C]", 0..4),
        present in proptest::collection::btree_map("[A-C]", "[a-z]{0,2}", 0..4),
    ) {
        let settings = ProjectSettings::with_required_keys(required.clone());
        let environment: UserEnvironment = present.clone().into_iter().collect();
        let access = if authenticated { logged_in() } else { AccessState::new() };
        let decision = evaluate_gate(Some(&settings), &environment, &access);

        let satisfied = required
            .iter()
            .all(|key| present.get(key).is_some_and(|value| !value.is_empty()));
        let expected = if !authenticated {
            GateDecision::Unauthenticated
        } else if satisfied {
            GateDecision::Authorized
        } else {
            GateDecision::MissingEnvironment
        };
        prop_assert_eq!(decision, expected);
    }
}
