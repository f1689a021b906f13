//! Catalog Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    /// The catalog file does not exist (or is not a file).
    #[display("catalog not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Refusing to overwrite an existing catalog with the empty template.
    #[display("catalog already exists: {}", _0.display())]
    AlreadyExists(#[error(not(source))] PathBuf),
    #[display("could not materialize catalog template")]
    Template,
    /// The column is not part of the table (or view) being queried.
    #[display("unknown column `{column}` for table `{table}`")]
    UnknownColumn { table: &'static str, column: String },
    /// The query references a table that cannot be joined to the one queried.
    #[display("cannot join `{to}` onto `{from}`")]
    UnsupportedJoin { from: &'static str, to: &'static str },
    /// Writes against the `meta` view.
    #[display("`{_0}` is read-only")]
    ReadOnly(#[error(not(source))] &'static str),
    /// A predicate was used against a table it cannot apply to.
    #[display("unsupported predicate for table `{_0}`")]
    UnsupportedPredicate(#[error(not(source))] &'static str),
    #[display("{columns} columns were given {values} values")]
    LengthMismatch { columns: usize, values: usize },
    /// Serialization/deserialization error.
    #[display("invalid catalog data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
