use std::fmt;
use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Minimum level of emitted log events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Logging output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LogConfig {
    /// Default level, overridable with `RUST_LOG`.
    #[serde(default)]
    pub level: LogLevel,
    /// When set, logs are written to daily-rotated files in this directory instead of stdout.
    pub directory: Option<PathBuf>,
    /// Emit logs as JSON lines.
    #[serde(default)]
    pub json: bool,
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MetricsConfig {
    /// Port of the `/metrics` HTTP listener.
    pub port: u16,
}

/// Sentry error reporting settings.
///
/// This intentionally does not implement [`Serialize`] to avoid leaking the DSN.
#[derive(Debug, Clone, Deserialize)]
pub struct SentryConfig {
    pub dsn: SecretString,
}
