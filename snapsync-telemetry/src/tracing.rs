//! Subscriber setup for binaries and tests.

use std::sync::Once;

use snapsync_config::shared::{LogConfig, LogLevel};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to redirect `log` records to tracing: {0}")]
    LogTracer(#[from] tracing_log::log::SetLoggerError),

    #[error("failed to install the global subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

/// Flushes buffered log lines when dropped. Keep it alive until the process exits.
#[must_use = "logs are lost when the flusher is dropped early"]
pub struct LogFlusher {
    _guard: WorkerGuard,
}

fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Trace => LevelFilter::TRACE,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Error => LevelFilter::ERROR,
    }
}

/// Installs the global subscriber of a binary.
///
/// `RUST_LOG` overrides the configured level. Logs go to stdout, or to files rotated daily
/// and named after `app_name` when a log directory is configured.
pub fn init_tracing(app_name: &str, config: &LogConfig) -> Result<LogFlusher, TracingError> {
    LogTracer::init()?;

    let filter = EnvFilter::builder()
        .with_default_directive(level_filter(config.level).into())
        .from_env_lossy();

    let (writer, guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, format!("{app_name}.log"));
            tracing_appender::non_blocking(appender)
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    let json_layer = config
        .json
        .then(|| fmt::layer().json().with_writer(writer.clone()));
    let text_layer = (!config.json).then(|| {
        fmt::layer()
            .with_ansi(config.directory.is_none())
            .with_writer(writer)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()?;

    ::tracing::debug!(app = app_name, level = %config.level, "tracing initialized");

    Ok(LogFlusher { _guard: guard })
}

static INIT_TEST_TRACING: Once = Once::new();

/// Installs a subscriber printing to the test output when `ENABLE_TRACING` is set.
///
/// Safe to call from every test; only the first call has an effect.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var("ENABLE_TRACING").is_err() {
            return;
        }

        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
