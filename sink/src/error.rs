//! Error types and result definitions for sink operations.
//!
//! Every failure raised inside the sink is a [`SinkError`] carrying an [`ErrorKind`], a static
//! description, optional dynamic detail and the callsite where it was created. The kind decides
//! how the upsert coordinator reacts: storage kinds become per-record outcomes while every other
//! kind is propagated to the caller.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;
use std::sync::Arc;

use sink_mysql::schema::SchemaError;

/// Convenient result type for sink operations using [`SinkError`] as the error type.
pub type SinkResult<T> = Result<T, SinkError>;

/// Payload stored for every [`SinkError`].
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for sink operations.
///
/// Cloning is cheap since the source and backtrace are shared.
#[derive(Debug, Clone)]
pub struct SinkError {
    payload: ErrorPayload,
}

/// Categories of errors that can occur while applying records.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Connection Errors
    DestinationConnectionFailed,

    // Query & Execution Errors
    DestinationQueryFailed,
    ConstraintViolation,

    // Schema Errors
    SchemaUnavailable,

    // Data & Transformation Errors
    ConversionError,
    InvalidData,

    // Configuration & Secret Errors
    ConfigError,
    SecretUnavailable,

    // IO & Serialization Errors
    IoError,
    DestinationIoError,
    SerializationError,
    DeserializationError,

    // State Errors
    InvalidState,

    // Unknown / Uncategorized
    Unknown,
}

impl ErrorKind {
    /// Returns `true` for failures raised by the store while executing a unit of work.
    ///
    /// These are reported as a per-record outcome instead of aborting the batch.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            ErrorKind::DestinationConnectionFailed
                | ErrorKind::DestinationQueryFailed
                | ErrorKind::ConstraintViolation
                | ErrorKind::DestinationIoError
                | ErrorKind::SchemaUnavailable
        )
    }
}

impl SinkError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.payload.kind
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        &self.payload.description
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        self.payload.detail.as_deref()
    }

    /// Returns the detail if present, otherwise the description.
    ///
    /// Used wherever a single line summary of the failure is needed.
    pub fn reason(&self) -> &str {
        self.detail().unwrap_or_else(|| self.description())
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> &Backtrace {
        self.payload.backtrace.as_ref()
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.payload.location
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.payload.source = Some(Arc::new(source));
        self
    }

    /// Creates a [`SinkError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        SinkError {
            payload: ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            },
        }
    }
}

impl PartialEq for SinkError {
    fn eq(&self, other: &SinkError) -> bool {
        self.payload.kind == other.payload.kind
    }
}

impl Hash for SinkError {
    /// Hashes only the kind and static description so that occurrences of the same failure
    /// group together regardless of their detail or location.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.payload.kind.hash(state);
        self.payload.description.hash(state);
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let location = self.payload.location;
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            self.payload.kind,
            self.payload.description,
            location.file(),
            location.line(),
            location.column()
        )?;

        write_detail(self.payload.detail.as_deref(), f, 1)?;
        write_backtrace(self.payload.backtrace.as_ref(), f, 1)?;

        Ok(())
    }
}

impl error::Error for SinkError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.payload
            .source
            .as_ref()
            .map(|source| source as &(dyn error::Error + 'static))
    }
}

/// Writes the captured backtrace with indentation, if one was captured.
fn write_backtrace(
    backtrace: &Backtrace,
    f: &mut fmt::Formatter<'_>,
    indent: usize,
) -> fmt::Result {
    if backtrace.status() != BacktraceStatus::Captured {
        return Ok(());
    }

    let indent_str = "  ".repeat(indent);
    write!(f, "\n{indent_str}Backtrace:")?;
    for line in format!("{backtrace}").lines() {
        if line.trim().is_empty() {
            write!(f, "\n{indent_str}  ")?;
        } else {
            write!(f, "\n{indent_str}  {line}")?;
        }
    }

    Ok(())
}

/// Writes the detail block with indentation.
fn write_detail(detail: Option<&str>, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    if let Some(detail) = detail {
        let indent_str = "  ".repeat(indent);
        if detail.trim().is_empty() {
            write!(f, "\n{indent_str}Detail: <empty>")?;
        } else {
            write!(f, "\n{indent_str}Detail:")?;
            for line in detail.lines() {
                if line.trim().is_empty() {
                    write!(f, "\n{indent_str}  ")?;
                } else {
                    write!(f, "\n{indent_str}  {line}")?;
                }
            }
        }
    }

    Ok(())
}

/// Creates a [`SinkError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for SinkError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> SinkError {
        SinkError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`SinkError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for SinkError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> SinkError {
        SinkError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Converts [`std::io::Error`] to [`SinkError`] with [`ErrorKind::IoError`].
impl From<std::io::Error> for SinkError {
    #[track_caller]
    fn from(err: std::io::Error) -> SinkError {
        let detail = err.to_string();
        SinkError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`serde_json::Error`] to [`SinkError`] with the appropriate error kind.
impl From<serde_json::Error> for SinkError {
    #[track_caller]
    fn from(err: serde_json::Error) -> SinkError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        let detail = err.to_string();
        SinkError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`sqlx::Error`] to [`SinkError`] with the appropriate error kind.
///
/// Server errors are split between constraint violations and other query failures using the
/// driver's classification. Transport and pool errors map to
/// [`ErrorKind::DestinationConnectionFailed`], decoding errors to [`ErrorKind::ConversionError`].
impl From<sqlx::Error> for SinkError {
    #[track_caller]
    fn from(err: sqlx::Error) -> SinkError {
        let (kind, description) = match &err {
            sqlx::Error::Database(db_err) => match db_err.kind() {
                sqlx::error::ErrorKind::UniqueViolation
                | sqlx::error::ErrorKind::ForeignKeyViolation
                | sqlx::error::ErrorKind::NotNullViolation
                | sqlx::error::ErrorKind::CheckViolation => (
                    ErrorKind::ConstraintViolation,
                    "MySQL constraint violation",
                ),
                _ => (ErrorKind::DestinationQueryFailed, "MySQL query failed"),
            },
            sqlx::Error::Io(_) => (ErrorKind::DestinationIoError, "MySQL I/O error"),
            sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => (
                ErrorKind::DestinationConnectionFailed,
                "MySQL connection failed",
            ),
            sqlx::Error::Configuration(_) => {
                (ErrorKind::ConfigError, "MySQL connection misconfigured")
            }
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::TypeNotFound { .. } => (
                ErrorKind::ConversionError,
                "MySQL value conversion failed",
            ),
            _ => (ErrorKind::DestinationQueryFailed, "MySQL operation failed"),
        };

        let detail = err.to_string();
        SinkError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`SchemaError`] to [`SinkError`].
///
/// Every inspection failure maps to [`ErrorKind::SchemaUnavailable`] so it is reported for
/// the record instead of aborting the batch. Database errors are kept as the source.
impl From<SchemaError> for SinkError {
    #[track_caller]
    fn from(err: SchemaError) -> SinkError {
        match err {
            SchemaError::Database(err) => {
                let detail = err.to_string();
                SinkError::from_components(
                    ErrorKind::SchemaUnavailable,
                    Cow::Borrowed("Table schema inspection failed"),
                    Some(Cow::Owned(detail)),
                    Some(Arc::new(err)),
                )
            }
            SchemaError::TableNotFound(table) => SinkError::from_components(
                ErrorKind::SchemaUnavailable,
                Cow::Borrowed("Table not found"),
                Some(Cow::Owned(format!("table {table} does not exist"))),
                None,
            ),
            SchemaError::MissingPrimaryKey(table) => SinkError::from_components(
                ErrorKind::SchemaUnavailable,
                Cow::Borrowed("Table has no primary key"),
                Some(Cow::Owned(format!("table {table} has no primary key"))),
                None,
            ),
        }
    }
}
