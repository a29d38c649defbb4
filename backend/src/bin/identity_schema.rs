//! Plan, apply, revert, and list identity-column migrations on the host's user table.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use chat_backend::config::{IdentitySchemaSettings, load_optional_field_overrides};
use chat_backend::domain::migration_error::{EXIT_CONFIGURATION, EXIT_EXECUTION, EXIT_SUCCESS};
use chat_backend::domain::ports::{ApprovalChannel, PreApprovedChannel};
use chat_backend::domain::{IdentitySchemaService, MigrationError, MigrationId};
use chat_backend::inbound::cli::{ConsoleApprovalChannel, Operation, run_operation};
use chat_backend::outbound::persistence::PostgresSchemaStore;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// `identity-schema` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "identity-schema",
    about = "Adapt the host user table to the chat identity fields, with provenance-backed revert",
    version
)]
struct CliArgs {
    /// Emit logs as JSON lines on stderr.
    #[arg(long = "log-json", global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Probe the table and print the plan without changing anything.
    Plan,
    /// Apply the plan after approval.
    Apply {
        /// Version for the migration id; defaults to the current UTC milliseconds.
        #[arg(long, value_name = "n")]
        version: Option<u64>,
        /// Approve every prompt without asking.
        #[arg(long = "assume-yes")]
        assume_yes: bool,
    },
    /// Revert a recorded migration, or the latest active one.
    Revert {
        /// Migration to revert, as `family@version`.
        #[arg(long = "migration-id", value_name = "family@version")]
        migration_id: Option<MigrationId>,
        /// Keep reverting older migrations while the operator agrees.
        #[arg(long, conflicts_with = "migration_id")]
        chain: bool,
        /// Approve every prompt without asking.
        #[arg(long = "assume-yes")]
        assume_yes: bool,
    },
    /// List provenance records, newest first.
    History,
}

impl Command {
    fn into_operation(self) -> (Operation, bool) {
        match self {
            Self::Plan => (Operation::Plan, false),
            Self::Apply {
                version,
                assume_yes,
            } => (Operation::Apply { version }, assume_yes),
            Self::Revert {
                migration_id,
                chain,
                assume_yes,
            } => {
                let operation = if chain {
                    Operation::RevertChain
                } else {
                    Operation::Revert { migration_id }
                };
                (operation, assume_yes)
            }
            Self::History => (Operation::History, false),
        }
    }
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let args = CliArgs::parse();
    init_tracing(args.log_json);

    let settings = match IdentitySchemaSettings::load_from_iter([OsString::from("identity-schema")])
    {
        Ok(settings) => settings,
        Err(load_error) => {
            error!(error = %load_error, "failed to load settings");
            return Ok(ExitCode::from(EXIT_CONFIGURATION));
        }
    };

    let (operation, assume_yes) = args.command.into_operation();
    let service = match build_service(&settings) {
        Ok(service) => service,
        Err(failure) => return Ok(report_failure(&failure)),
    };

    let Some(database_url) = settings.database_url() else {
        error!("no database URL configured; set CHAT_SCHEMA_DATABASE_URL or DATABASE_URL");
        return Ok(ExitCode::from(EXIT_CONFIGURATION));
    };
    let mut store = match PostgresSchemaStore::connect(&database_url) {
        Ok(store) => store,
        Err(connect_error) => {
            error!(error = %connect_error, "failed to connect to the database");
            return Ok(ExitCode::from(EXIT_EXECUTION));
        }
    };

    let channel: Box<dyn ApprovalChannel> = if assume_yes {
        Box::new(PreApprovedChannel)
    } else {
        Box::new(ConsoleApprovalChannel)
    };

    match run_operation(&service, &mut store, channel.as_ref(), &operation) {
        Ok(lines) => {
            print_lines(&lines).wrap_err("write command output")?;
            Ok(ExitCode::from(EXIT_SUCCESS))
        }
        Err(failure) => Ok(report_failure(&failure)),
    }
}

fn build_service(settings: &IdentitySchemaSettings) -> Result<IdentitySchemaService, MigrationError> {
    let overrides = load_optional_field_overrides(settings.mapping_path.as_deref())?;
    IdentitySchemaService::new(
        &overrides,
        settings.engine_options(),
        Arc::new(DefaultClock),
    )
}

fn report_failure(failure: &MigrationError) -> ExitCode {
    if failure.is_declined() {
        info!(reason = %failure, "stopped without changes");
    } else {
        error!(error = %failure, code = failure.exit_code(), "identity schema command failed");
    }
    ExitCode::from(failure.exit_code())
}

fn print_lines(lines: &[String]) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    for line in lines {
        writeln!(stdout, "{line}")?;
    }
    stdout.flush()
}

fn init_tracing(log_json: bool) {
    let builder = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr);
    let installed = if log_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(init_error) = installed {
        warn!(error = %init_error, "tracing initialization failed");
    }
}
