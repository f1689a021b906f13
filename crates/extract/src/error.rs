//! Extraction Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The file could not be opened or read.
    #[display("could not read e-book file: {}", _0.display())]
    Unreadable(#[error(not(source))] PathBuf),
    /// The file is not a valid ZIP container.
    #[display("invalid EPUB archive")]
    InvalidArchive,
    /// A file referenced by the container is not present in the archive.
    #[display("missing archive entry: {_0}")]
    MissingEntry(#[error(not(source))] String),
    /// One of the XML documents inside the archive could not be parsed.
    #[display("malformed XML in {_0}")]
    MalformedXml(#[error(not(source))] &'static str),
    /// A required element or attribute could not be found.
    #[display("missing required field: {_0}")]
    MissingField(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // The file is either a readable EPUB or it is not.
        false
    }
}
