//! Library Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Failures of the catalog, the calibredb adapter and the
//! metadata reader are kept as children of the library-level kind.

use crate::add::Stage;
use derive_more::{Display, Error};
use std::path::PathBuf;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// ### Configuration Errors
/// - [`ErrorKind::LibraryNotFound`]
/// - [`ErrorKind::AlreadyExists`]
/// - [`ErrorKind::InvalidPath`]
/// - [`ErrorKind::UnsupportedBackend`]
///
/// ### Dependency Errors
/// - [`ErrorKind::Catalog`]
/// - [`ErrorKind::CalibreDb`]
/// - [`ErrorKind::Io`]
///
/// ### Consistency Errors
/// - [`ErrorKind::MissingFormat`]
/// - [`ErrorKind::AddFailed`]
///
/// ### Unsupported Requests
/// - [`ErrorKind::UnsupportedField`]
/// - [`ErrorKind::UnsupportedFilter`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The folder does not exist or holds no catalog.
    #[display("library not found: {}", _0.display())]
    LibraryNotFound(#[error(not(source))] PathBuf),
    /// A new library (or clone) would overwrite existing data.
    #[display("destination already contains data: {}", _0.display())]
    AlreadyExists(#[error(not(source))] PathBuf),
    /// A generated path escapes the library root or is empty.
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    #[display("unsupported backend: {_0}")]
    UnsupportedBackend(#[error(not(source))] String),
    /// A direct catalog operation failed.
    #[display("catalog operation failed")]
    Catalog,
    /// A calibredb invocation failed.
    #[display("calibredb operation failed")]
    CalibreDb,
    /// A filesystem operation on the library folder failed.
    #[display("filesystem operation failed: {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// The path template could not be compiled or rendered.
    #[display("issue with path generation from template")]
    Template,
    /// The catalog lists a format file that is not on disk.
    #[display("book {book} lists a format file that does not exist: {}", path.display())]
    MissingFormat { book: i64, path: PathBuf },
    /// A listed record could not be turned into a book record.
    #[display("could not decode {_0}")]
    Decode(#[error(not(source))] &'static str),
    /// Adding a file stopped part-way; earlier stages are not rolled back.
    #[display(
        "adding {} failed at the {stage} stage{}",
        file.display(),
        book.map(|id| format!(" (book {id})")).unwrap_or_default()
    )]
    AddFailed { stage: Stage, book: Option<i64>, file: PathBuf },
    #[display("unsupported field: {_0}")]
    UnsupportedField(#[error(not(source))] String),
    #[display("unsupported filter: {_0}")]
    UnsupportedFilter(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Nothing here is transient: retries are the caller's call.
        false
    }
}
