#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )
)]
// crates/arbiter-cli/src/main.rs
// ============================================================================
// Module: Arbiter CLI Entry Point
// Description: Command dispatcher for the Arbiter server and offline tasks.
// Purpose: Provide a safe, localized CLI for serving and chain maintenance.
// Dependencies: arbiter-config, arbiter-core, arbiter-server, clap, tokio
// ============================================================================

//! ## Overview
//! The Arbiter CLI starts the HTTP server and runs offline maintenance:
//! config generation and validation, chain verification, and the destructive
//! reset. Offline commands open the store directly; they never require a
//! running server.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use arbiter_config::ArbiterConfig;
use arbiter_config::DEFAULT_CONFIG_NAME;
use arbiter_config::PersistenceKind;
use arbiter_config::config_toml_example;
use arbiter_core::SharedPersistence;
use arbiter_core::runtime::ChainManager;
use arbiter_core::runtime::EventBus;
use arbiter_core::runtime::MemoryPersistence;
use arbiter_server::ArbiterServer;
use arbiter_store_sqlite::SqlitePersistence;
use arbiter_store_sqlite::SqliteStoreConfig;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "arbiter", version, arg_required_else_help = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Arbiter HTTP server.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Chain maintenance utilities.
    Chain {
        /// Selected chain subcommand.
        #[command(subcommand)]
        command: ChainCommand,
    },
    /// Destroy all persisted state. Requires the confirmation token.
    Reset(ResetCommand),
}

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Config file path; defaults to `arbiter.toml` when present.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write the canonical example configuration.
    Generate(ConfigGenerateCommand),
    /// Validate a configuration file.
    Validate(ConfigValidateCommand),
}

/// Arguments for config generation.
#[derive(Args, Debug)]
struct ConfigGenerateCommand {
    /// Output path; stdout when omitted.
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,
}

/// Arguments for config validation.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Config file to validate.
    #[arg(long, value_name = "PATH")]
    config: PathBuf,
}

/// Chain subcommands.
#[derive(Subcommand, Debug)]
enum ChainCommand {
    /// Verify chain integrity offline.
    Verify(ChainVerifyCommand),
}

/// Arguments for offline chain verification.
#[derive(Args, Debug)]
struct ChainVerifyCommand {
    /// Config file path; defaults to `arbiter.toml` when present.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Slot to start verification from.
    #[arg(long, value_name = "SLOT")]
    from_slot: Option<u64>,
}

/// Arguments for the destructive reset.
#[derive(Args, Debug)]
struct ResetCommand {
    /// Config file path; defaults to `arbiter.toml` when present.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Exact confirmation token.
    #[arg(long, value_name = "TOKEN")]
    token: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI errors.
#[derive(Debug, Error)]
enum CliError {
    /// Configuration failed to load or validate.
    #[error("config error: {0}")]
    Config(String),
    /// Runtime or store initialization failed.
    #[error("init error: {0}")]
    Init(String),
    /// Server transport failed.
    #[error("server error: {0}")]
    Server(String),
    /// Chain verification found faults.
    #[error("chain integrity check failed: {0} fault(s)")]
    IntegrityFailed(usize),
    /// Output could not be written.
    #[error("io error: {0}")]
    Io(String),
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let _ = writeln!(std::io::stderr(), "arbiter: {error}");
            ExitCode::FAILURE
        }
    }
}

/// Dispatches the parsed command on a fresh runtime.
fn run(cli: Cli) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::Init(err.to_string()))?;
    runtime.block_on(async {
        match cli.command {
            Commands::Serve(command) => serve(command).await,
            Commands::Config {
                command,
            } => config_command(&command),
            Commands::Chain {
                command,
            } => match command {
                ChainCommand::Verify(command) => chain_verify(&command),
            },
            Commands::Reset(command) => reset(&command),
        }
    })
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Runs the HTTP server until it exits.
async fn serve(command: ServeCommand) -> Result<(), CliError> {
    let config = load_config(command.config.as_deref())?;
    let server =
        ArbiterServer::from_config(config).map_err(|err| CliError::Init(err.to_string()))?;
    server.serve().await.map_err(|err| CliError::Server(err.to_string()))
}

/// Handles `config generate` and `config validate`.
fn config_command(command: &ConfigCommand) -> Result<(), CliError> {
    match command {
        ConfigCommand::Generate(generate) => {
            let example = config_toml_example();
            match &generate.out {
                Some(path) => {
                    fs::write(path, example).map_err(|err| CliError::Io(err.to_string()))?;
                }
                None => {
                    let _ = write!(std::io::stdout(), "{example}");
                }
            }
            Ok(())
        }
        ConfigCommand::Validate(validate) => {
            ArbiterConfig::load(&validate.config)
                .map_err(|err| CliError::Config(err.to_string()))?;
            let _ = writeln!(std::io::stdout(), "config ok: {}", validate.config.display());
            Ok(())
        }
    }
}

/// Verifies chain integrity against the configured store.
fn chain_verify(command: &ChainVerifyCommand) -> Result<(), CliError> {
    let config = load_config(command.config.as_deref())?;
    let persistence = open_persistence(&config)?;
    let chain = ChainManager::new(persistence, EventBus::default(), {
        config.chain.to_chain_config(&config.batch)
    })
    .map_err(|err| CliError::Init(err.to_string()))?;
    let report = chain
        .verify_integrity(command.from_slot)
        .map_err(|err| CliError::Init(err.to_string()))?;
    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|err| CliError::Io(err.to_string()))?;
    let _ = writeln!(std::io::stdout(), "{rendered}");
    if report.valid {
        Ok(())
    } else {
        Err(CliError::IntegrityFailed(report.errors.len()))
    }
}

/// Destroys all persisted state after token verification.
fn reset(command: &ResetCommand) -> Result<(), CliError> {
    let config = load_config(command.config.as_deref())?;
    let persistence = open_persistence(&config)?;
    persistence
        .reset_all(&command.token)
        .map_err(|err| CliError::Init(err.to_string()))?;
    let _ = writeln!(std::io::stdout(), "store reset");
    Ok(())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads configuration from the given path, the default file, or defaults.
fn load_config(path: Option<&Path>) -> Result<ArbiterConfig, CliError> {
    match path {
        Some(path) => ArbiterConfig::load(path).map_err(|err| CliError::Config(err.to_string())),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_NAME);
            if default_path.exists() {
                ArbiterConfig::load(default_path)
                    .map_err(|err| CliError::Config(err.to_string()))
            } else {
                Ok(ArbiterConfig::default())
            }
        }
    }
}

/// Opens the configured persistence backend directly.
fn open_persistence(config: &ArbiterConfig) -> Result<SharedPersistence, CliError> {
    match config.persistence.kind {
        PersistenceKind::Memory => Ok(Arc::new(MemoryPersistence::new())),
        PersistenceKind::Sqlite => {
            let path = config
                .persistence
                .path
                .clone()
                .ok_or_else(|| CliError::Config("sqlite persistence requires path".to_string()))?;
            let store = SqlitePersistence::open(&SqliteStoreConfig {
                path,
                busy_timeout_ms: config.persistence.busy_timeout_ms,
            })
            .map_err(|err| CliError::Init(err.to_string()))?;
            Ok(Arc::new(store))
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
