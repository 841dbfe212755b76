// crates/session-gate-config/tests/config_validation.rs
// =============================================================================
// Module: Config Validation Tests
// Description: Validate loading, defaults, and fail-closed checks.
// Purpose: Ensure storage, audit, and project config stay well-formed.
// =============================================================================
//! ## Overview
//! Loads TOML files from temporary directories and checks both the accepted
//! shapes and the rejection messages.

use std::io::Write;
use std::path::PathBuf;

use session_gate_config::AuditSinkKind;
use session_gate_config::ConfigError;
use session_gate_config::SessionGateConfig;
use session_gate_config::StorageBackend;
use session_gate_core::DurableStorage;
use session_gate_core::GateAuditEvent;
use session_gate_core::SessionId;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}

fn write_config(dir: &tempfile::TempDir, contents: &str) -> Result<PathBuf, String> {
    let path = dir.path().join("session-gate.toml");
    let mut file = std::fs::File::create(&path).map_err(|err| err.to_string())?;
    file.write_all(contents.as_bytes()).map_err(|err| err.to_string())?;
    Ok(path)
}

#[test]
fn defaults_are_valid() -> TestResult {
    let config = SessionGateConfig::default();
    config.validate().map_err(|err| err.to_string())?;
    if config.storage.backend != StorageBackend::File || config.storage.key != "userEnv" {
        return Err("unexpected storage defaults".to_string());
    }
    if config.audit.sink != AuditSinkKind::None {
        return Err("unexpected audit default".to_string());
    }
    if config.project.session_timeout_secs != 3600 {
        return Err("unexpected session timeout default".to_string());
    }
    Ok(())
}

#[test]
fn full_file_loads_and_converts_settings() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let db = dir.path().join("env.db");
    let audit = dir.path().join("audit.log");
    let contents = format!(
        "[storage]\nbackend = \"sqlite\"\npath = \"{}\"\nkey = \"userEnv\"\njournal_mode = \
         \"delete\"\nsync_mode = \"normal\"\n\n[audit]\nsink = \"file\"\npath = \"{}\"\n\n\
         [project]\nrequired_env_keys = [\"OPENAI_API_KEY\"]\ndata_persistence = true\n",
        db.display(),
        audit.display()
    );
    let path = write_config(&dir, &contents)?;
    let config = SessionGateConfig::load(Some(&path)).map_err(|err| err.to_string())?;

    let settings = config.project.to_settings();
    if settings.required_env_keys != vec!["OPENAI_API_KEY".to_string()] || !settings.data_persistence
    {
        return Err("project settings not converted".to_string());
    }

    let storage = config.open_storage().map_err(|err| err.to_string())?;
    storage.write("userEnv", b"{}").map_err(|err| err.to_string())?;
    if storage.read("userEnv").map_err(|err| err.to_string())? != Some(b"{}".to_vec()) {
        return Err("sqlite storage did not round trip".to_string());
    }

    let sink = config.open_audit_sink().map_err(|err| err.to_string())?;
    sink.record(&GateAuditEvent::session("generated", &SessionId::generate()));
    let logged = std::fs::read_to_string(&audit).map_err(|err| err.to_string())?;
    if !logged.contains("\"event\":\"session\"") {
        return Err("audit event not written".to_string());
    }
    Ok(())
}

#[test]
fn unknown_fields_fail_to_parse() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = write_config(&dir, "[storage]\nbackend = \"file\"\ncolour = \"blue\"\n")?;
    match SessionGateConfig::load(Some(&path)) {
        Err(ConfigError::Parse(_)) => Ok(()),
        other => Err(format!("expected parse error, got ok={}", other.is_ok())),
    }
}

#[test]
fn missing_explicit_file_is_io_error() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("absent.toml");
    match SessionGateConfig::load_or_default(Some(&path)) {
        Err(ConfigError::Io(_)) => Ok(()),
        other => Err(format!("expected io error, got ok={}", other.is_ok())),
    }
}

#[test]
fn memory_storage_rejects_path() -> TestResult {
    let mut config = SessionGateConfig::default();
    config.storage.backend = StorageBackend::Memory;
    config.storage.path = Some(PathBuf::from("env"));
    assert_invalid(config.validate(), "memory storage must not set path")
}

#[test]
fn sqlite_storage_requires_path() -> TestResult {
    let mut config = SessionGateConfig::default();
    config.storage.backend = StorageBackend::Sqlite;
    assert_invalid(config.validate(), "sqlite storage requires path")
}

#[test]
fn sqlite_storage_rejects_zero_busy_timeout() -> TestResult {
    let mut config = SessionGateConfig::default();
    config.storage.backend = StorageBackend::Sqlite;
    config.storage.path = Some(PathBuf::from("env.db"));
    config.storage.busy_timeout_ms = 0;
    assert_invalid(config.validate(), "busy_timeout_ms")
}

#[test]
fn empty_and_unsafe_storage_keys_are_rejected() -> TestResult {
    let mut config = SessionGateConfig::default();
    config.storage.key = String::new();
    assert_invalid(config.validate(), "storage key")?;
    config.storage.key = "../userEnv".to_string();
    assert_invalid(config.validate(), "storage key")?;
    Ok(())
}

#[test]
fn overlong_path_component_is_rejected() -> TestResult {
    let mut config = SessionGateConfig::default();
    config.storage.path = Some(PathBuf::from("a".repeat(300)));
    assert_invalid(config.validate(), "storage.path path component too long")
}

#[test]
fn file_audit_sink_requires_path() -> TestResult {
    let mut config = SessionGateConfig::default();
    config.audit.sink = AuditSinkKind::File;
    assert_invalid(config.validate(), "file audit sink requires path")?;
    config.audit.sink = AuditSinkKind::Stderr;
    config.audit.path = Some(PathBuf::from("audit.log"));
    assert_invalid(config.validate(), "only valid for the file sink")
}

#[test]
fn project_keys_must_be_unique_and_non_empty() -> TestResult {
    let mut config = SessionGateConfig::default();
    config.project.required_env_keys = vec!["A".to_string(), " ".to_string()];
    assert_invalid(config.validate(), "must be non-empty")?;
    config.project.required_env_keys = vec!["A".to_string(), "A".to_string()];
    assert_invalid(config.validate(), "duplicate A")?;
    config.project.required_env_keys = vec!["A".to_string()];
    config.project.session_timeout_secs = 0;
    assert_invalid(config.validate(), "session_timeout_secs")
}

#[test]
fn oversized_config_file_is_rejected() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let padding = format!("# {}\n", "x".repeat(1024 * 1024));
    let path = write_config(&dir, &padding)?;
    match SessionGateConfig::load(Some(&path)) {
        Err(ConfigError::Invalid(message)) if message.contains("size limit") => Ok(()),
        other => Err(format!("expected size limit error, got ok={}", other.is_ok())),
    }
}

#[test]
fn huge_config_file_is_rejected_before_reading() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("session-gate.toml");
    let file = std::fs::File::create(&path).map_err(|err| err.to_string())?;
    file.set_len(1024 * 1024 * 1024).map_err(|err| err.to_string())?;
    drop(file);
    match SessionGateConfig::load(Some(&path)) {
        Err(ConfigError::Invalid(message)) if message.contains("size limit") => Ok(()),
        other => Err(format!("expected size limit error, got ok={}", other.is_ok())),
    }
}

#[test]
fn config_file_at_size_limit_loads() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let header = "[storage]\nbackend = \"memory\"\n# ";
    let padding = "x".repeat(1024 * 1024 - header.len() - 1);
    let path = write_config(&dir, &format!("{header}{padding}\n"))?;
    let config = SessionGateConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    if config.storage.backend != StorageBackend::Memory {
        return Err("config at size limit was not parsed".to_string());
    }
    Ok(())
}
