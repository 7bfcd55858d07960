//! `snapsync` command line entry point.
//!
//! Mirrors a key-value table into a CSV snapshot once or on an interval, and exposes the
//! maintenance commands around it: bulk deletion, backups, dataset statistics and the
//! status of the latest cycle.

use std::process::ExitCode;

use clap::{Args as ClapArgs, Parser, Subcommand};
use snapsync::delete::DeleteConfirmation;
use snapsync_config::shared::SnapsyncConfig;
use snapsync_telemetry::tracing::init_tracing;
use tracing::error;

use crate::commands::sync::Schedule;
use crate::config::load_snapsync_config;
use crate::error::{CliError, CliResult};

mod commands;
mod config;
mod error;
mod sentry;

/// The name of the environment variable which contains version information for this binary.
const APP_VERSION_ENV_NAME: &str = "APP_VERSION";

#[derive(Parser, Debug)]
#[command(name = "snapsync", version, about = "Key-value table to CSV snapshot sync")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synchronize the snapshot with the source table
    Sync(SyncArgs),
    /// Delete every item of the source table in batches
    Delete(DeleteArgs),
    /// Summarize the published snapshot
    Stats {
        /// Summarize the live table instead of the published snapshot
        #[arg(long)]
        live: bool,
    },
    /// Show the status of the latest sync cycle
    Status,
    /// Write a JSON backup of the source table
    Backup,
}

#[derive(ClapArgs, Debug)]
struct SyncArgs {
    /// Run a cycle every given number of minutes until interrupted
    #[arg(long, value_name = "MINUTES", conflicts_with = "scheduled")]
    interval: Option<u64>,
    /// Run on the interval from the configuration until interrupted
    #[arg(long)]
    scheduled: bool,
}

#[derive(ClapArgs, Debug)]
struct DeleteArgs {
    /// Name of the table, confirming that its items are to be deleted
    #[arg(
        long,
        value_name = "TABLE",
        required_unless_present = "dry_run",
        conflicts_with = "dry_run"
    )]
    confirm: Option<String>,
    /// Count the items that would be deleted without deleting them
    #[arg(long)]
    dry_run: bool,
    /// Back the table up before deleting
    #[arg(long)]
    backup: bool,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Sync(_) => "sync",
            Command::Delete(_) => "delete",
            Command::Stats { .. } => "stats",
            Command::Status => "status",
            Command::Backup => "backup",
        }
    }
}

impl SyncArgs {
    fn schedule(&self, config: &SnapsyncConfig) -> Schedule {
        match (self.interval, self.scheduled) {
            (Some(minutes), _) => Schedule::Every(minutes),
            (None, true) => Schedule::Every(config.sync.interval_mins),
            (None, false) => Schedule::Once,
        }
    }
}

impl DeleteArgs {
    fn confirmation(&self) -> DeleteConfirmation {
        match &self.confirm {
            Some(table) if !self.dry_run => DeleteConfirmation::Confirmed(table.clone()),
            _ => DeleteConfirmation::DryRun,
        }
    }
}

/// Entry point of the `snapsync` binary.
///
/// Loads configuration, initializes tracing and Sentry, then runs the selected command on
/// a multi-threaded runtime. Failures are reported to stderr and mapped to an exit code.
fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render_report());
            err.exit_code()
        }
    }
}

fn run(args: Args) -> CliResult<()> {
    let config = load_snapsync_config()?;

    let _log_flusher =
        init_tracing(env!("CARGO_BIN_NAME"), &config.log).map_err(CliError::config)?;

    // Initialize Sentry before the async runtime starts
    let _sentry_guard = sentry::init(config.sentry.as_ref(), args.command.name())?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(config, args.command))
}

async fn async_main(config: SnapsyncConfig, command: Command) -> CliResult<()> {
    let result = match command {
        Command::Sync(sync_args) => {
            let schedule = sync_args.schedule(&config);
            commands::sync::run(config, schedule).await
        }
        Command::Delete(delete_args) => {
            commands::delete::run(config, delete_args.confirmation(), delete_args.backup).await
        }
        Command::Stats { live } => commands::stats::run(config, live).await,
        Command::Status => commands::status::run(config).await,
        Command::Backup => commands::backup::run(config).await,
    };

    if let Err(err) = &result {
        sentry::capture_error(err);
        error!("{err}");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;

        Args::command().debug_assert();
    }

    #[test]
    fn delete_requires_a_mode() {
        assert!(Args::try_parse_from(["snapsync", "delete"]).is_err());
        assert!(
            Args::try_parse_from(["snapsync", "delete", "--confirm", "t", "--dry-run"]).is_err()
        );
    }

    #[test]
    fn delete_confirmation_comes_from_the_flags() {
        let args = Args::try_parse_from(["snapsync", "delete", "--confirm", "ofertas_trabajo"])
            .unwrap();
        let Command::Delete(delete) = args.command else {
            panic!("expected delete");
        };
        assert_eq!(
            delete.confirmation(),
            DeleteConfirmation::Confirmed("ofertas_trabajo".to_string())
        );

        let args = Args::try_parse_from(["snapsync", "delete", "--dry-run", "--backup"]).unwrap();
        let Command::Delete(delete) = args.command else {
            panic!("expected delete");
        };
        assert_eq!(delete.confirmation(), DeleteConfirmation::DryRun);
        assert!(delete.backup);
    }

    #[test]
    fn sync_runs_once_unless_scheduled() {
        let args = Args::try_parse_from(["snapsync", "sync", "--interval", "5"]).unwrap();
        let Command::Sync(sync) = args.command else {
            panic!("expected sync");
        };
        assert_eq!(sync.interval, Some(5));
        assert!(!sync.scheduled);

        assert!(
            Args::try_parse_from(["snapsync", "sync", "--interval", "5", "--scheduled"]).is_err()
        );
    }
}
