use secrecy::ExposeSecret;
use sentry::protocol::{Event, Exception, Stacktrace};
use sentry::types::Uuid;
use snapsync::error::SyncError;
use snapsync_config::Environment;
use snapsync_config::shared::SentryConfig;
use std::backtrace::BacktraceStatus;
use std::sync::Arc;
use tracing::info;

use crate::APP_VERSION_ENV_NAME;
use crate::error::{CliError, CliResult};

/// Initializes Sentry error tracking.
///
/// Sets up panic integration and tags all events with `service=snapsync`, the
/// invoked command and, when available, the app version from the environment.
/// Returns [`None`] when no Sentry section is configured.
pub fn init(
    config: Option<&SentryConfig>,
    command: &'static str,
) -> CliResult<Option<sentry::ClientInitGuard>> {
    let Some(sentry_config) = config else {
        info!("sentry not configured, skipping initialization");
        return Ok(None);
    };

    info!("initializing sentry with supplied dsn");

    let environment = Environment::load().map_err(CliError::config)?;
    let dsn = sentry_config
        .dsn
        .expose_secret()
        .parse()
        .map_err(CliError::config)?;

    let guard = sentry::init(sentry::ClientOptions {
        dsn: Some(dsn),
        environment: Some(environment.to_string().into()),
        integrations: vec![Arc::new(
            sentry::integrations::panic::PanicIntegration::new(),
        )],
        attach_stacktrace: true,
        ..Default::default()
    });

    let version = std::env::var(APP_VERSION_ENV_NAME);

    sentry::configure_scope(|scope| {
        scope.set_tag("service", "snapsync");
        scope.set_tag("command", command);
        if let Ok(version) = version {
            scope.set_tag("version", version);
        }
    });

    Ok(Some(guard))
}

/// Captures a [`CliError`] to Sentry and returns the event id.
pub fn capture_error(err: &CliError) -> Uuid {
    sentry::capture_event(event_from_cli_error(err))
}

/// Converts a [`CliError`] into a Sentry [`Event`].
///
/// Aggregated sync errors are expanded into one exception each, typed by their
/// [`snapsync::error::ErrorKind`]. Other errors walk their source chain, root cause first.
fn event_from_cli_error(err: &CliError) -> Event<'static> {
    let mut exceptions = Vec::new();

    match err {
        CliError::Sync(sync_err) => collect_sync_exceptions(sync_err, &mut exceptions),
        _ => {
            let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
            while let Some(e) = current {
                exceptions.push(Exception {
                    ty: type_name_from_debug(e),
                    value: Some(e.to_string()),
                    ..Default::default()
                });
                current = e.source();
            }
            exceptions.reverse();
        }
    }

    if let Some(stacktrace) = find_first_captured_backtrace(err)
        && let Some(exception) = exceptions.first_mut()
    {
        exception.stacktrace = Some(stacktrace);
    }

    Event {
        exception: exceptions.into(),
        level: sentry::Level::Error,
        ..Default::default()
    }
}

fn collect_sync_exceptions(error: &SyncError, exceptions: &mut Vec<Exception>) {
    match error.errors() {
        Some(errors) => {
            for error in errors {
                collect_sync_exceptions(error, exceptions);
            }
        }
        None => exceptions.push(Exception {
            ty: format!("{:?}", error.kind()),
            value: Some(error.summary()),
            ..Default::default()
        }),
    }
}

fn find_first_captured_backtrace(error: &CliError) -> Option<Stacktrace> {
    let backtrace = error.backtrace()?;
    if backtrace.status() != BacktraceStatus::Captured {
        return None;
    }

    sentry::integrations::backtrace::parse_stacktrace(&backtrace.to_string())
}

/// Extracts the type name from an error's Debug representation.
fn type_name_from_debug(err: &dyn std::error::Error) -> String {
    let debug = format!("{err:?}");
    debug
        .split(['{', '(', ' '])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("Error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapsync::error::ErrorKind;
    use snapsync::sync_error;

    #[test]
    fn aggregated_errors_become_separate_exceptions() {
        let err = CliError::from(SyncError::from(vec![
            sync_error!(ErrorKind::ScanFailure, "Table scan failed"),
            sync_error!(ErrorKind::StoreWriteFailure, "Failed to write status", "disk full"),
        ]));

        let event = event_from_cli_error(&err);

        let types: Vec<_> = event.exception.values.iter().map(|e| e.ty.clone()).collect();
        assert_eq!(types, vec!["ScanFailure", "StoreWriteFailure"]);
        assert_eq!(
            event.exception.values[1].value.as_deref(),
            Some("Failed to write status: disk full")
        );
    }

    #[test]
    fn other_errors_walk_the_source_chain() {
        let err = CliError::from(std::io::Error::other("denied"));

        let event = event_from_cli_error(&err);

        assert_eq!(event.exception.values.len(), 2);
        assert_eq!(event.exception.values[1].ty, "Io");
    }
}
