use snapsync::error::{ErrorKind, SyncError};
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;
use std::process::ExitCode;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Result type for command line operations.
pub type CliResult<T> = Result<T, CliError>;

/// Captured backtrace wrapper to avoid thiserror's unstable feature detection.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type of the `snapsync` binary.
///
/// Wraps [`SyncError`] for sync and deletion failures and adds variants for
/// process setup errors.
#[derive(Debug)]
pub enum CliError {
    /// Sync, store or deletion error.
    Sync(SyncError),
    /// Configuration or telemetry setup error.
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    /// I/O error.
    Io(std::io::Error, CapturedBacktrace),
    /// A deletion run finished with keys left in the table.
    IncompleteDeletion { residual: usize },
}

impl CliError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            CliError::Sync(_) => "sync error",
            CliError::Config(_, _) => "configuration error",
            CliError::Io(_, _) => "i/o error",
            CliError::IncompleteDeletion { .. } => "incomplete deletion",
        }
    }

    /// Returns the process exit code for this error.
    ///
    /// `2` is reserved for invalid invocations, matching argument parsing errors.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Config(_, _) => ExitCode::from(2),
            CliError::Sync(err) if err.kind() == ErrorKind::ConfirmationMismatch => {
                ExitCode::from(2)
            }
            _ => ExitCode::FAILURE,
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            CliError::Sync(err) => match err.errors() {
                Some(errors) => errors.iter().find_map(SyncError::backtrace),
                None => err.backtrace(),
            },
            CliError::Config(_, cb) => Some(&cb.0),
            CliError::Io(_, cb) => Some(&cb.0),
            CliError::IncompleteDeletion { .. } => None,
        }
    }

    /// Creates a configuration error from any error source.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        CliError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns a user-oriented report for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("snapsync failed\n");
        out.push_str(&format!("category: {}\n", self.category()));

        match self {
            CliError::Sync(err) => out.push_str(&format!("error: {}\n", err.summary())),
            _ => out.push_str(&format!("error: {self}\n")),
        }

        if !matches!(self, CliError::Sync(err) if err.errors().is_some()) {
            let mut source = Error::source(self);
            let mut idx = 1usize;
            while let Some(err) = source {
                out.push_str(&format!("cause {idx}: {err}\n"));
                source = err.source();
                idx += 1;
            }
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Sync(err) => write!(f, "{}", err.summary()),
            CliError::Config(source, _) => write!(f, "configuration error: {source}"),
            CliError::Io(source, _) => write!(f, "i/o error: {source}"),
            CliError::IncompleteDeletion { residual } => {
                write!(f, "{residual} items could not be deleted")
            }
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CliError::Sync(err) => err.source(),
            CliError::Config(source, _) => Some(source.as_ref()),
            CliError::Io(source, _) => Some(source),
            CliError::IncompleteDeletion { .. } => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<SyncError> for CliError {
    fn from(err: SyncError) -> Self {
        CliError::Sync(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapsync::sync_error;

    #[test]
    fn aggregated_sync_errors_render_every_summary() {
        let err = CliError::from(SyncError::from(vec![
            sync_error!(ErrorKind::ScanFailure, "Table scan failed", "page 3"),
            sync_error!(ErrorKind::StoreWriteFailure, "Failed to write status"),
        ]));

        let report = err.render_report();

        assert!(report.starts_with("snapsync failed\ncategory: sync error\n"));
        assert!(report.contains("error: Table scan failed: page 3; Failed to write status\n"));
        assert_eq!(err.exit_code(), ExitCode::FAILURE);
    }

    #[test]
    fn confirmation_mismatch_is_an_invalid_invocation() {
        let err = CliError::from(sync_error!(
            ErrorKind::ConfirmationMismatch,
            "Deletion was not confirmed for this table"
        ));

        assert_eq!(err.exit_code(), ExitCode::from(2));
    }

    #[test]
    fn incomplete_deletion_reports_residual_items() {
        let err = CliError::IncompleteDeletion { residual: 7 };

        assert_eq!(err.to_string(), "7 items could not be deleted");
        assert_eq!(err.category(), "incomplete deletion");
    }
}
