//! Error types and result definitions for load operations.
//!
//! Provides a classified error with captured diagnostic metadata. Every error that escapes a load
//! step carries the name of the entity whose loader failed.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for load operations using [`LoadError`] as the error type.
pub type LoadResult<T> = Result<T, LoadError>;

/// Main error type for load operations.
#[derive(Debug, Clone)]
pub struct LoadError {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    entity: Option<&'static str>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Specific categories of errors that can occur during a run.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Run Invariants
    WatermarkMissing,
    RoundNotFound,
    RowCountMismatch,
    InvalidPlan,

    // Connection Errors
    SourceConnectionFailed,
    TargetConnectionFailed,

    // Query & Execution Errors
    SourceQueryFailed,
    TargetQueryFailed,
    KeyConflict,
    CacheError,

    // Data & Transformation Errors
    ConversionError,
    InvalidData,

    // Configuration & IO Errors
    ConfigError,
    IoError,

    // Unknown / Uncategorized
    Unknown,
}

/// Identifies which store a database error came from.
///
/// The same driver error maps to different kinds depending on the side that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

impl LoadError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns the entity whose loader produced this error, if known.
    pub fn entity(&self) -> Option<&'static str> {
        self.entity
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> &Backtrace {
        self.backtrace.as_ref()
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Tags the error with the entity whose loader failed.
    ///
    /// An existing tag is kept so that the innermost loader wins.
    pub fn with_entity(mut self, entity: &'static str) -> Self {
        self.entity.get_or_insert(entity);
        self
    }

    /// Classifies a [`sqlx::Error`] raised by the given side.
    #[track_caller]
    pub fn from_sqlx(side: Side, err: sqlx::Error) -> LoadError {
        let (kind, description) = classify_sqlx_error(side, &err);
        let detail = err.to_string();
        LoadError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        LoadError {
            kind,
            description,
            detail,
            entity: None,
            source,
            location: Location::caller(),
            backtrace: Arc::new(Backtrace::capture()),
        }
    }
}

/// SQLSTATE raised by Postgres for a unique constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

fn classify_sqlx_error(side: Side, err: &sqlx::Error) -> (ErrorKind, &'static str) {
    let connection_failed = match side {
        Side::Source => (ErrorKind::SourceConnectionFailed, "Source database connection failed"),
        Side::Target => (ErrorKind::TargetConnectionFailed, "Target database connection failed"),
    };
    let query_failed = match side {
        Side::Source => (ErrorKind::SourceQueryFailed, "Source database query failed"),
        Side::Target => (ErrorKind::TargetQueryFailed, "Target database statement failed"),
    };

    match err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            (ErrorKind::KeyConflict, "Row with the same key already exists")
        }
        sqlx::Error::Database(_) => query_failed,
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => connection_failed,
        sqlx::Error::Configuration(_) => (ErrorKind::ConfigError, "Database configuration invalid"),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            (ErrorKind::ConversionError, "Database value could not be decoded")
        }
        sqlx::Error::ColumnNotFound(_) | sqlx::Error::ColumnIndexOutOfBounds { .. } => {
            (ErrorKind::InvalidData, "Database row has an unexpected shape")
        }
        _ => query_failed,
    }
}

impl PartialEq for LoadError {
    fn eq(&self, other: &LoadError) -> bool {
        self.kind == other.kind
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "[{:?}] {}", self.kind, self.description)?;
        if let Some(entity) = self.entity {
            write!(f, " (entity: {entity})")?;
        }
        write!(
            f,
            " @ {}:{}:{}",
            self.location.file(),
            self.location.line(),
            self.location.column()
        )?;

        write_detail(self.detail.as_deref(), f, 1)?;
        write_backtrace(self.backtrace.as_ref(), f, 1)?;

        Ok(())
    }
}

impl error::Error for LoadError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source as &(dyn error::Error + 'static))
    }
}

fn write_backtrace(
    backtrace: &Backtrace,
    f: &mut fmt::Formatter<'_>,
    indent: usize,
) -> fmt::Result {
    let indent_str = "  ".repeat(indent);

    let rendered_backtrace = format!("{backtrace}");
    if !rendered_backtrace.trim().is_empty() {
        write!(f, "\n{indent_str}Backtrace:")?;
        for line in rendered_backtrace.lines() {
            write!(f, "\n{indent_str}  {line}")?;
        }
    }

    Ok(())
}

fn write_detail(detail: Option<&str>, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    if let Some(detail) = detail {
        let indent_str = "  ".repeat(indent);
        write!(f, "\n{indent_str}Detail:")?;
        for line in detail.lines() {
            write!(f, "\n{indent_str}  {line}")?;
        }
    }

    Ok(())
}

/// Creates a [`LoadError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for LoadError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> LoadError {
        LoadError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`LoadError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for LoadError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> LoadError {
        LoadError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

impl From<std::io::Error> for LoadError {
    #[track_caller]
    fn from(err: std::io::Error) -> LoadError {
        let detail = err.to_string();
        LoadError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<fred::error::Error> for LoadError {
    #[track_caller]
    fn from(err: fred::error::Error) -> LoadError {
        let (kind, description) = match err.kind() {
            fred::error::ErrorKind::Config => (ErrorKind::ConfigError, "Cache configuration invalid"),
            _ => (ErrorKind::CacheError, "Cache command failed"),
        };

        let detail = err.to_string();
        LoadError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
