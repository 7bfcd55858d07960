//! Error type shared by every snapsync component.
//!
//! A [`SyncError`] carries an [`ErrorKind`] used by callers to decide what to do (treat a
//! missing snapshot as "changed", isolate a failed batch, mark a cycle as failed), a static
//! description, optional dynamic detail and source, and the location where it was raised.
//! Several errors can be aggregated into one, which happens when a cycle fails and recording
//! the failure fails as well.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;
use std::sync::Arc;

/// Result type used across snapsync.
pub type SyncResult<T> = Result<T, SyncError>;

/// Payload of a single [`SyncError`].
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Error raised by scanning, storing, comparing or deleting.
#[derive(Debug, Clone)]
pub struct SyncError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    Many {
        errors: Vec<SyncError>,
        location: &'static Location<'static>,
    },
}

/// Classification of a [`SyncError`].
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Source table
    SourceConnectionFailed,
    SourceQueryFailed,
    SourceReadOnly,
    AuthenticationError,
    /// A page read failed; the scan was aborted.
    ScanFailure,
    /// The source table returned no records and empty snapshots are not allowed.
    EmptySource,

    // Snapshot store
    /// No snapshot has been published yet.
    SnapshotNotFound,
    /// The stored snapshot or its metadata could not be parsed.
    SnapshotCorrupted,
    /// Persisting the snapshot body or metadata failed.
    StoreWriteFailure,

    // Deletion
    /// A deletion batch was rejected as a whole.
    BatchDeleteFailure,
    /// A destructive run was attempted without a matching confirmation.
    ConfirmationMismatch,

    // Data
    ConversionError,
    InvalidData,
    SerializationError,
    DeserializationError,

    // Infrastructure
    IoError,
    ConfigError,
    InvalidState,

    Unknown,
}

impl SyncError {
    /// Returns the [`ErrorKind`] of this error, or of the first aggregated error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns every [`ErrorKind`] contained in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => {
                errors.iter().flat_map(|err| err.kinds()).collect()
            }
        }
    }

    /// Returns the static description of this error, or of the first aggregated error.
    pub fn description(&self) -> &str {
        match self.repr {
            ErrorRepr::Single(ref payload) => &payload.description,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.description())
                .unwrap_or("multiple errors"),
        }
    }

    /// Returns the dynamic detail, if any.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns a single-line summary suitable for the status artifact.
    ///
    /// Unlike [`fmt::Display`], this omits locations and backtraces.
    pub fn summary(&self) -> String {
        match &self.repr {
            ErrorRepr::Single(payload) => match payload.detail.as_deref() {
                Some(detail) if !detail.trim().is_empty() => {
                    format!("{}: {}", payload.description, detail.trim())
                }
                _ => payload.description.to_string(),
            },
            ErrorRepr::Many { errors, .. } => errors
                .iter()
                .map(|err| err.summary())
                .collect::<Vec<_>>()
                .join("; "),
        }
    }

    /// Returns the aggregated errors, or [`None`] for a single error.
    pub fn errors(&self) -> Option<&[SyncError]> {
        match self.repr {
            ErrorRepr::Single(_) => None,
            ErrorRepr::Many { ref errors, .. } => Some(errors),
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches an originating error, exposed through [`error::Error::source`].
    ///
    /// Has no effect on aggregated errors.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        SyncError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }

    /// Builds an error wrapping `source`, using its rendering as detail.
    #[track_caller]
    fn wrap<E>(kind: ErrorKind, description: &'static str, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        let detail = source.to_string();
        SyncError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(source)),
        )
    }
}

impl PartialEq for SyncError {
    fn eq(&self, other: &SyncError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(a, b)| a == b)
            }
            _ => false,
        }
    }
}

impl Hash for SyncError {
    /// Hashes the kind and static description only, so repeated occurrences of the same
    /// failure group together regardless of detail or location.
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(&self.repr).hash(state);
        match &self.repr {
            ErrorRepr::Single(payload) => {
                payload.kind.hash(state);
                payload.description.hash(state);
            }
            ErrorRepr::Many { errors, .. } => {
                errors.len().hash(state);
                for error in errors {
                    error.hash(state);
                }
            }
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if let Some(detail) = payload.detail.as_deref() {
                    write_block("Detail", detail, f)?;
                }

                let backtrace = payload.backtrace.to_string();
                if !backtrace.trim().is_empty() {
                    write_block("Backtrace", &backtrace, f)?;
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    write!(f, "\n  {}. {}", index + 1, lines.next().unwrap_or_default())?;
                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

/// Writes an indented, titled block of lines.
fn write_block(title: &str, content: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if content.trim().is_empty() {
        return write!(f, "\n  {title}: <empty>");
    }

    write!(f, "\n  {title}:")?;
    for line in content.lines() {
        if line.trim().is_empty() {
            write!(f, "\n    ")?;
        } else {
            write!(f, "\n    {line}")?;
        }
    }

    Ok(())
}

impl error::Error for SyncError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

impl From<(ErrorKind, &'static str)> for SyncError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for SyncError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates errors; a single error is returned unwrapped.
impl<E> From<Vec<E>> for SyncError
where
    E: Into<SyncError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> SyncError {
        let location = Location::caller();

        let mut errors: Vec<SyncError> = errors.into_iter().map(Into::into).collect();
        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        SyncError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for SyncError {
    #[track_caller]
    fn from(err: std::io::Error) -> SyncError {
        SyncError::wrap(ErrorKind::IoError, "I/O operation failed", err)
    }
}

impl From<serde_json::Error> for SyncError {
    #[track_caller]
    fn from(err: serde_json::Error) -> SyncError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        SyncError::wrap(kind, description, err)
    }
}

impl From<csv::Error> for SyncError {
    #[track_caller]
    fn from(err: csv::Error) -> SyncError {
        let (kind, description) = match err.kind() {
            csv::ErrorKind::Io(_) => (ErrorKind::IoError, "CSV I/O operation failed"),
            csv::ErrorKind::Serialize(_) => {
                (ErrorKind::SerializationError, "CSV serialization failed")
            }
            _ => (ErrorKind::DeserializationError, "CSV parsing failed"),
        };

        SyncError::wrap(kind, description, err)
    }
}

impl From<chrono::ParseError> for SyncError {
    #[track_caller]
    fn from(err: chrono::ParseError) -> SyncError {
        SyncError::wrap(ErrorKind::ConversionError, "Datetime parsing failed", err)
    }
}

impl From<bigdecimal::ParseBigDecimalError> for SyncError {
    #[track_caller]
    fn from(err: bigdecimal::ParseBigDecimalError) -> SyncError {
        SyncError::wrap(ErrorKind::ConversionError, "Decimal parsing failed", err)
    }
}

impl From<tokio::task::JoinError> for SyncError {
    #[track_caller]
    fn from(err: tokio::task::JoinError) -> SyncError {
        SyncError::wrap(ErrorKind::InvalidState, "Blocking task failed", err)
    }
}

/// Classifies AWS SDK failures by where the request failed.
#[cfg(feature = "dynamodb")]
impl<E, R> From<aws_sdk_dynamodb::error::SdkError<E, R>> for SyncError
where
    E: error::Error + Send + Sync + 'static,
    R: fmt::Debug + Send + Sync + 'static,
{
    #[track_caller]
    fn from(err: aws_sdk_dynamodb::error::SdkError<E, R>) -> SyncError {
        use aws_sdk_dynamodb::error::SdkError;

        let (kind, description) = match &err {
            SdkError::ConstructionFailure(_) => {
                (ErrorKind::ConfigError, "DynamoDB request could not be built")
            }
            SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => (
                ErrorKind::SourceConnectionFailed,
                "DynamoDB request could not be sent",
            ),
            SdkError::ResponseError(_) => (
                ErrorKind::SourceQueryFailed,
                "DynamoDB response could not be parsed",
            ),
            SdkError::ServiceError(_) => (ErrorKind::SourceQueryFailed, "DynamoDB request failed"),
            _ => (ErrorKind::SourceQueryFailed, "DynamoDB request failed"),
        };

        let detail = aws_sdk_dynamodb::error::DisplayErrorContext(&err).to_string();
        SyncError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

#[cfg(feature = "dynamodb")]
impl From<aws_sdk_dynamodb::error::BuildError> for SyncError {
    #[track_caller]
    fn from(err: aws_sdk_dynamodb::error::BuildError) -> SyncError {
        SyncError::wrap(ErrorKind::InvalidData, "DynamoDB request could not be built", err)
    }
}
