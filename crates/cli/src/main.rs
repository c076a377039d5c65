// dsync - reconcile a district roster with the donor CRM

mod exit_codes;
mod sync;

use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;

use donorsync_recon::SyncError;
use exit_codes::{sync_exit_code, EXIT_SUCCESS, EXIT_USAGE};
use sync::{cmd_sync, SyncCommands};

#[derive(Parser)]
#[command(name = "dsync")]
#[command(about = "Reconcile a district student roster with the donor CRM and write import files")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Only log warnings and errors (RUST_LOG overrides)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: SyncCommands,
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  donorsync-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  donorsync-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    match cmd_sync(cli.command) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<SyncError> for CliError {
    fn from(err: SyncError) -> Self {
        let code = sync_exit_code(&err);
        let hint = match &err {
            SyncError::HeaderMismatch { .. } => {
                Some("columns must match the report/roster layout exactly (order does not matter)".to_string())
            }
            SyncError::MissingNoMailRows { .. } => {
                Some("re-run the report with \"include no mail names\" checked".to_string())
            }
            SyncError::UnknownSchool { .. } => {
                Some("add the school to [schools.mapping] in the config".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }
}
