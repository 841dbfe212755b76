// crates/session-gate-core/tests/user_environment.rs
// ============================================================================
// Module: User Environment Tests
// Description: Tests for environment parsing and the persisted store.
// Purpose: Validate fail-soft loads and fail-loud writes.
// Dependencies: session-gate-core, proptest, tempfile
// ============================================================================
//! ## Overview
//! Exercises the user environment against in-memory and file-backed storage,
//! including malformed payloads and write failures.

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

use std::collections::BTreeMap;

use proptest::prelude::*;
use session_gate_core::DEFAULT_USER_ENV_KEY;
use session_gate_core::DurableStorage;
use session_gate_core::EnvironmentError;
use session_gate_core::EnvironmentParseError;
use session_gate_core::FileDurableStorage;
use session_gate_core::InMemoryDurableStorage;
use session_gate_core::MAX_USER_ENV_BYTES;
use session_gate_core::SharedDurableStorage;
use session_gate_core::StorageError;
use session_gate_core::StorageReadError;
use session_gate_core::UserEnvironment;
use session_gate_core::UserEnvironmentStore;

fn shared(storage: &InMemoryDurableStorage) -> SharedDurableStorage {
    SharedDurableStorage::from_storage(storage.clone())
}

#[test]
fn absent_entry_loads_empty_and_persisted() {
    let storage = InMemoryDurableStorage::new();
    let store = UserEnvironmentStore::load(shared(&storage), DEFAULT_USER_ENV_KEY);
    assert!(store.environment().is_empty());
    assert!(store.is_persisted());
    assert!(store.load_fallback().is_none());
}

#[test]
fn set_then_reload_round_trips() {
    let storage = InMemoryDurableStorage::new();
    let mut store = UserEnvironmentStore::load(shared(&storage), DEFAULT_USER_ENV_KEY);
    store.set("OPENAI_API_KEY", "sk-1").unwrap();
    store.set("REGION", "eu").unwrap();

    let reloaded = UserEnvironmentStore::load(shared(&storage), DEFAULT_USER_ENV_KEY);
    assert_eq!(reloaded.get("OPENAI_API_KEY"), Some("sk-1"));
    assert_eq!(reloaded.get("REGION"), Some("eu"));
    assert_eq!(reloaded.environment(), store.environment());
}

#[test]
fn stored_blob_is_flat_json_object() {
    let storage = InMemoryDurableStorage::new();
    let mut store = UserEnvironmentStore::load(shared(&storage), DEFAULT_USER_ENV_KEY);
    store.set("A", "1").unwrap();
    let bytes = storage.read(DEFAULT_USER_ENV_KEY).unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value, serde_json::json!({ "A": "1" }));
    assert_eq!(store.to_header_value().unwrap(), "{\"A\":\"1\"}");
}

#[test]
fn malformed_blob_loads_empty_and_reports_fallback() {
    let payloads = ["not json", "[1,2,3]", "{\"A\": 5}", "{\"A\": {\"nested\": \"x\"}}"];
    for payload in payloads {
        let storage = InMemoryDurableStorage::with_entry(DEFAULT_USER_ENV_KEY, payload.as_bytes());
        let store = UserEnvironmentStore::load(shared(&storage), DEFAULT_USER_ENV_KEY);
        assert!(store.environment().is_empty());
        assert!(!store.is_persisted());
        assert!(matches!(store.load_fallback(), Some(StorageReadError::Malformed(_))));
    }
}

#[test]
fn oversized_blob_is_rejected() {
    let payload = vec![b' '; MAX_USER_ENV_BYTES + 1];
    let err = UserEnvironment::from_json_bytes(&payload).unwrap_err();
    assert!(matches!(err, EnvironmentParseError::TooLarge { .. }));
}

#[test]
fn oversized_set_is_refused_and_rolled_back() {
    let storage = InMemoryDurableStorage::new();
    let mut store = UserEnvironmentStore::load(shared(&storage), DEFAULT_USER_ENV_KEY);
    store.set("API_KEY", "small").unwrap();

    let big = "x".repeat(300 * 1024);
    match store.set("API_KEY", big.as_str()).unwrap_err() {
        EnvironmentError::TooLarge {
            key,
            max_bytes,
            actual_bytes,
        } => {
            assert_eq!(key, "API_KEY");
            assert_eq!(max_bytes, MAX_USER_ENV_BYTES);
            assert!(actual_bytes > MAX_USER_ENV_BYTES);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(store.set("OTHER", big.as_str()), Err(EnvironmentError::TooLarge { .. })));
    assert_eq!(store.get("API_KEY"), Some("small"));
    assert_eq!(store.get("OTHER"), None);
    assert!(store.is_persisted());

    let reloaded = UserEnvironmentStore::load(shared(&storage), DEFAULT_USER_ENV_KEY);
    assert!(reloaded.load_fallback().is_none());
    assert_eq!(reloaded.environment(), store.environment());
}

#[test]
fn payload_at_size_limit_reloads() {
    let storage = InMemoryDurableStorage::new();
    let mut store = UserEnvironmentStore::load(shared(&storage), DEFAULT_USER_ENV_KEY);
    // Serialized as {"K":"<value>"}: eight bytes of framing.
    let value = "v".repeat(MAX_USER_ENV_BYTES - 8);
    store.set("K", value.as_str()).unwrap();
    assert_eq!(store.to_header_value().unwrap().len(), MAX_USER_ENV_BYTES);

    let reloaded = UserEnvironmentStore::load(shared(&storage), DEFAULT_USER_ENV_KEY);
    assert!(reloaded.load_fallback().is_none());
    assert_eq!(reloaded.get("K"), Some(value.as_str()));
}

#[test]
fn has_all_requires_present_non_empty_values() {
    let environment: UserEnvironment = [("A", "1"), ("B", "")].into_iter().collect();
    assert!(environment.has_all(&["A"]));
    assert!(!environment.has_all(&["A", "B"]));
    assert!(!environment.has_all(&["C"]));
    assert!(environment.has_all::<&str>(&[]));
    assert_eq!(environment.missing_keys(&["C", "B", "A", "C"]), vec!["C", "B"]);
}

#[test]
fn failed_write_keeps_value_and_marks_unpersisted() {
    let storage = InMemoryDurableStorage::new();
    let mut store = UserEnvironmentStore::load(shared(&storage), DEFAULT_USER_ENV_KEY);
    storage.set_fail_writes(true);

    let err = store.set("K", "v").unwrap_err();
    match err {
        EnvironmentError::Unpersisted {
            key,
            source,
        } => {
            assert_eq!(key, "K");
            assert!(matches!(source, StorageError::Unavailable(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.get("K"), Some("v"));
    assert!(store.has_all(&["K"]));
    assert!(!store.is_persisted());
    assert!(storage.read(DEFAULT_USER_ENV_KEY).unwrap().is_none());

    storage.set_fail_writes(false);
    store.flush().unwrap();
    assert!(store.is_persisted());
    let reloaded = UserEnvironmentStore::load(shared(&storage), DEFAULT_USER_ENV_KEY);
    assert_eq!(reloaded.get("K"), Some("v"));
}

#[test]
fn blank_key_is_rejected_without_mutation() {
    let storage = InMemoryDurableStorage::new();
    let mut store = UserEnvironmentStore::load(shared(&storage), DEFAULT_USER_ENV_KEY);
    assert_eq!(store.set("  ", "v"), Err(EnvironmentError::EmptyKey));
    assert!(store.environment().is_empty());
}

#[test]
fn remove_persists_and_reports_previous_value() {
    let storage = InMemoryDurableStorage::new();
    let mut store = UserEnvironmentStore::load(shared(&storage), DEFAULT_USER_ENV_KEY);
    store.set("A", "1").unwrap();
    assert_eq!(store.remove("A").unwrap(), Some("1".to_string()));
    assert_eq!(store.remove("A").unwrap(), None);
    let reloaded = UserEnvironmentStore::load(shared(&storage), DEFAULT_USER_ENV_KEY);
    assert!(reloaded.environment().is_empty());
}

#[test]
fn file_storage_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let storage = FileDurableStorage::new(dir.path()).unwrap();
        let mut store =
            UserEnvironmentStore::load(SharedDurableStorage::from_storage(storage), "userEnv");
        store.set("TOKEN", "abc").unwrap();
    }
    let storage = FileDurableStorage::new(dir.path()).unwrap();
    let store = UserEnvironmentStore::load(SharedDurableStorage::from_storage(storage), "userEnv");
    assert_eq!(store.get("TOKEN"), Some("abc"));
    assert!(dir.path().join("userEnv.json").is_file());
}

#[test]
fn file_storage_rejects_unsafe_keys() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileDurableStorage::new(dir.path()).unwrap();
    for key in ["", "../escape", ".hidden", "a/b"] {
        assert!(matches!(storage.write(key, b"{}"), Err(StorageError::Invalid(_))));
    }
}

#[test]
fn file_storage_rejects_file_root() {
    let file = tempfile::NamedTempFile::new().unwrap();
    assert!(matches!(FileDurableStorage::new(file.path()), Err(StorageError::Invalid(_))));
}

/// Applies `entries` through `set`, then checks a fresh load reproduces them.
fn check_round_trip(
    storage: SharedDurableStorage,
    reopened: SharedDurableStorage,
    entries: &[(String, String)],
) -> Result<(), TestCaseError> {
    let mut store = UserEnvironmentStore::load(storage, DEFAULT_USER_ENV_KEY);
    let mut expected = BTreeMap::new();
    for (key, value) in entries {
        match store.set(key.as_str(), value.as_str()) {
            Ok(()) => {
                expected.insert(key.clone(), value.clone());
            }
            Err(EnvironmentError::TooLarge {
                ..
            }) => {}
            Err(other) => return Err(TestCaseError::fail(other.to_string())),
        }
        prop_assert!(store.is_persisted());
    }
    let expected = UserEnvironment::from(expected);
    prop_assert_eq!(store.environment(), &expected);

    let reloaded = UserEnvironmentStore::load(reopened, DEFAULT_USER_ENV_KEY);
    prop_assert!(reloaded.load_fallback().is_none());
    prop_assert_eq!(reloaded.environment(), &expected);
    Ok(())
}

fn env_entries() -> impl Strategy<Value = Vec<(String, String)>> {
    let key = "[A-Za-z_][\\PC]{0,12}";
    let value = prop_oneof![
        4 => "[\\PC\"\\\\]{0,32}".boxed(),
        1 => Just(String::new()).boxed(),
        1 => (1usize..120_000).prop_map(|len| "\u{e9}".repeat(len)).boxed(),
    ];
    proptest::collection::vec((key, value), 0..8)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn in_memory_set_then_load_reproduces_mapping(entries in env_entries()) {
        let storage = InMemoryDurableStorage::new();
        check_round_trip(shared(&storage), shared(&storage), &entries)?;
    }

    #[test]
    fn file_set_then_reopen_reproduces_mapping(entries in env_entries()) {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileDurableStorage::new(dir.path()).unwrap();
        let reopened = FileDurableStorage::new(dir.path()).unwrap();
        check_round_trip(
            SharedDurableStorage::from_storage(storage),
            SharedDurableStorage::from_storage(reopened),
            &entries,
        )?;
    }
}
