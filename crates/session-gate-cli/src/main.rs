// crates/session-gate-cli/src/main.rs
// ============================================================================
// Module: Session Gate CLI Entry Point
// Description: Command dispatcher for user environment and gate workflows.
// Purpose: Inspect and edit persisted state and evaluate the gate offline.
// Dependencies: clap, session-gate-config, session-gate-core, thiserror
// ============================================================================

//! ## Overview
//! The `session-gate` CLI operates on the same durable storage a client
//! uses. It lists and edits the persisted user environment, evaluates the
//! access gate for a given token and project settings, and issues or
//! resumes session identifiers. Output goes through `writeln!` so each
//! command can be driven against any writer.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use session_gate_config::ConfigError;
use session_gate_config::SessionGateConfig;
use session_gate_core::AccessToken;
use session_gate_core::EnvironmentError;
use session_gate_core::GateAuditEvent;
use session_gate_core::GateAuditSink;
use session_gate_core::GateDecision;
use session_gate_core::GateHost;
use session_gate_core::GateInput;
use session_gate_core::NavigationAction;
use session_gate_core::ProjectSettings;
use session_gate_core::Role;
use session_gate_core::SessionIdentity;
use session_gate_core::UserEnvironmentStore;
use session_gate_core::ViewRouter;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a project settings JSON input.
const MAX_SETTINGS_BYTES: usize = 1024 * 1024;
/// Exit code reported when the gate does not authorize.
const EXIT_NOT_AUTHORIZED: u8 = 2;
/// Exit code reported when a requested key is not set.
const EXIT_NOT_FOUND: u8 = 3;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "session-gate", version, disable_help_subcommand = true)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Selected command.
    #[command(subcommand)]
    command: Commands,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect and edit the persisted user environment.
    Env {
        /// Selected environment subcommand.
        #[command(subcommand)]
        command: EnvCommand,
    },
    /// Evaluate the access gate.
    Gate {
        /// Selected gate subcommand.
        #[command(subcommand)]
        command: GateCommand,
    },
    /// Issue or resume session identifiers.
    Session {
        /// Selected session subcommand.
        #[command(subcommand)]
        command: SessionCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// User environment subcommands.
#[derive(Subcommand, Debug)]
enum EnvCommand {
    /// List stored keys.
    List {
        /// Print values next to keys.
        #[arg(long)]
        show_values: bool,
    },
    /// Print the value stored for a key.
    Get {
        /// Environment key.
        key: String,
    },
    /// Store a value for a key.
    Set {
        /// Environment key.
        key: String,
        /// Environment value.
        value: String,
    },
    /// Remove a key.
    Remove {
        /// Environment key.
        key: String,
    },
    /// Print the environment as the JSON header payload sent to the server.
    Export,
}

/// Gate subcommands.
#[derive(Subcommand, Debug)]
enum GateCommand {
    /// Evaluate the gate against the persisted environment.
    Check(GateCheckCommand),
}

/// Arguments for `gate check`.
#[derive(Args, Debug)]
struct GateCheckCommand {
    /// Access token; omitted means unauthenticated.
    #[arg(long)]
    token: Option<String>,
    /// Role issued with the token.
    #[arg(long, default_value = "USER")]
    role: String,
    /// Project settings JSON file; defaults to the `[project]` config section.
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,
}

/// Session subcommands.
#[derive(Subcommand, Debug)]
enum SessionCommand {
    /// Print a fresh session identifier.
    New,
    /// Extract the session identifier from a URL query string.
    Resume {
        /// Query string, with or without the leading `?`.
        query: String,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate the configuration file.
    Validate,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(error: ConfigError) -> Self {
        Self::new(error.to_string())
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut stdout = std::io::stdout();
    match run(cli, &mut stdout) {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run(cli: Cli, out: &mut impl Write) -> CliResult<ExitCode> {
    let config = SessionGateConfig::load_or_default(cli.config.as_deref())?;
    match cli.command {
        Commands::Env {
            command,
        } => command_env(&config, command, out),
        Commands::Gate {
            command: GateCommand::Check(command),
        } => command_gate_check(&config, &command, out),
        Commands::Session {
            command,
        } => command_session(command, out),
        Commands::Config {
            command: ConfigCommand::Validate,
        } => {
            write_line(out, "config ok")?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ============================================================================
// SECTION: Env Commands
// ============================================================================

/// Dispatches user environment commands.
fn command_env(
    config: &SessionGateConfig,
    command: EnvCommand,
    out: &mut impl Write,
) -> CliResult<ExitCode> {
    let audit = config.open_audit_sink()?;
    let mut store = open_environment(config, audit.as_ref())?;
    match command {
        EnvCommand::List {
            show_values,
        } => {
            for (key, value) in store.environment().iter() {
                if show_values {
                    write_line(out, &format!("{key}={value}"))?;
                } else {
                    write_line(out, key)?;
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        EnvCommand::Get {
            key,
        } => match store.get(&key) {
            Some(value) => {
                write_line(out, value)?;
                Ok(ExitCode::SUCCESS)
            }
            None => Ok(ExitCode::from(EXIT_NOT_FOUND)),
        },
        EnvCommand::Set {
            key,
            value,
        } => {
            let result = store.set(key.clone(), value);
            audit_write(audit.as_ref(), store.storage_key(), &result);
            result.map_err(|err| CliError::new(err.to_string()))?;
            Ok(ExitCode::SUCCESS)
        }
        EnvCommand::Remove {
            key,
        } => {
            let result = store.remove(&key);
            let removed = match result {
                Ok(removed) => {
                    audit_write(audit.as_ref(), store.storage_key(), &Ok(()));
                    removed
                }
                Err(err) => {
                    audit_write(audit.as_ref(), store.storage_key(), &Err(err.clone()));
                    return Err(CliError::new(err.to_string()));
                }
            };
            if removed.is_none() {
                return Ok(ExitCode::from(EXIT_NOT_FOUND));
            }
            Ok(ExitCode::SUCCESS)
        }
        EnvCommand::Export => {
            let payload = store.to_header_value().map_err(|err| CliError::new(err.to_string()))?;
            write_line(out, &payload)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Loads the user environment, auditing a fallback to empty.
fn open_environment(
    config: &SessionGateConfig,
    audit: &dyn GateAuditSink,
) -> CliResult<UserEnvironmentStore> {
    let storage = config.open_storage()?;
    let store = UserEnvironmentStore::load(storage, config.storage.key.clone());
    if let Some(fallback) = store.load_fallback() {
        audit.record(&GateAuditEvent::environment_load_fallback(store.storage_key(), fallback));
    }
    Ok(store)
}

/// Records the durable outcome of an environment write.
fn audit_write(
    audit: &dyn GateAuditSink,
    key: &str,
    result: &Result<(), EnvironmentError>,
) {
    match result {
        Ok(()) => audit.record(&GateAuditEvent::environment_write(key, Ok(()))),
        Err(EnvironmentError::Unpersisted {
            source, ..
        }) => audit.record(&GateAuditEvent::environment_write(key, Err(source))),
        Err(_) => {}
    }
}

// ============================================================================
// SECTION: Gate Commands
// ============================================================================

/// Router that records navigations issued by the gate.
#[derive(Debug, Default)]
struct NavigationLog {
    /// Navigations in issue order.
    navigations: Vec<NavigationAction>,
}

impl ViewRouter for NavigationLog {
    fn to_login(&mut self) {
        self.navigations.push(NavigationAction::ToLogin);
    }

    fn to_environment_collection(&mut self) {
        self.navigations.push(NavigationAction::ToEnvironmentCollection);
    }
}

/// Evaluates the gate for the supplied credentials and settings.
fn command_gate_check(
    config: &SessionGateConfig,
    command: &GateCheckCommand,
    out: &mut impl Write,
) -> CliResult<ExitCode> {
    let role = Role::parse(&command.role).map_err(|err| CliError::new(err.to_string()))?;
    let settings = match &command.settings {
        Some(path) => read_settings(path)?,
        None => config.project.to_settings(),
    };
    let audit: Arc<dyn GateAuditSink> = config.open_audit_sink()?;
    let environment = open_environment(config, audit.as_ref())?;
    let mut host =
        GateHost::new(SessionIdentity::new(), environment, NavigationLog::default(), audit);

    let mut inputs = vec![GateInput::SettingsResolved(settings)];
    if let Some(token) = &command.token {
        inputs.push(GateInput::Credentials {
            token: AccessToken::new(token.as_str()),
            role,
        });
    }
    host.apply_batch(inputs);

    let snapshot = host.snapshot();
    write_line(out, &format!("decision: {}", snapshot.decision))?;
    if !snapshot.decision.is_authorized()
        && let Some(navigation) = host.router().navigations.last()
    {
        write_line(out, &format!("navigation: {navigation}"))?;
    }
    if !snapshot.missing_keys.is_empty() {
        write_line(out, &format!("missing: {}", snapshot.missing_keys.join(", ")))?;
    }
    write_line(out, &format!("role: {}", snapshot.role))?;
    write_line(out, &format!("session: {}", snapshot.session_id))?;
    if snapshot.decision == GateDecision::Authorized {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_NOT_AUTHORIZED))
    }
}

/// Reads project settings JSON from disk.
fn read_settings(path: &Path) -> CliResult<ProjectSettings> {
    let bytes = read_bytes_with_limit(path, MAX_SETTINGS_BYTES).map_err(|err| match err {
        ReadLimitError::Io(error) => {
            CliError::new(format!("failed to read {}: {error}", path.display()))
        }
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(format!(
            "{} exceeds size limit ({size} > {limit} bytes)",
            path.display()
        )),
    })?;
    ProjectSettings::from_json_slice(&bytes)
        .map_err(|err| CliError::new(format!("invalid project settings: {err}")))
}

// ============================================================================
// SECTION: Session Commands
// ============================================================================

/// Dispatches session identifier commands.
fn command_session(command: SessionCommand, out: &mut impl Write) -> CliResult<ExitCode> {
    match command {
        SessionCommand::New => {
            let mut identity = SessionIdentity::new();
            write_line(out, identity.get().as_str())?;
            Ok(ExitCode::SUCCESS)
        }
        SessionCommand::Resume {
            query,
        } => {
            let mut identity = SessionIdentity::new();
            match identity.resume_from_query(&query) {
                Some(session_id) => {
                    write_line(out, session_id.as_str())?;
                    Ok(ExitCode::SUCCESS)
                }
                None => Err(CliError::new(format!(
                    "query does not carry a valid session id: {}",
                    redact_query(&query)
                ))),
            }
        }
    }
}

/// Shortens long query strings for error messages.
fn redact_query(query: &str) -> String {
    const MAX_ECHO: usize = 64;
    if query.len() <= MAX_ECHO {
        return query.to_string();
    }
    let mut end = MAX_ECHO;
    while !query.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &query[..end])
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Errors raised by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Writes a single line to `out`.
fn write_line(out: &mut impl Write, message: &str) -> CliResult<()> {
    writeln!(out, "{message}").map_err(|err| CliError::new(format!("failed to write output: {err}")))
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let mut stderr = std::io::stderr();
    let _ = writeln!(&mut stderr, "{message}");
    ExitCode::FAILURE
}
