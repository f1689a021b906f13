//! Adapter Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An adapter error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No `calibredb` executable could be located.
    #[display("calibredb not detected on your system")]
    ExecutableNotFound,
    /// The library folder handed to the tool does not exist.
    #[display("library folder not found: {}", _0.display())]
    LibraryNotFound(#[error(not(source))] PathBuf),
    /// The process could not be started at all.
    #[display("could not start {}", _0.display())]
    Spawn(#[error(not(source))] PathBuf),
    /// The tool ran and exited unsuccessfully.
    #[display(
        "{command} exited with status {}.\n\nSTDOUT:\n{stdout}\n\nSTDERR:\n{stderr}",
        code.map_or_else(|| "<signal>".to_string(), |code| code.to_string())
    )]
    Failed {
        /// The full command line.
        command: String,
        /// Exit code, absent when the process was killed by a signal.
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    /// The tool succeeded but its output could not be understood.
    #[display("could not decode calibredb output")]
    Decode,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // The tool is deterministic for a given library state.
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_message_carries_output() {
        let err = ErrorKind::Failed {
            command: "calibredb --with-library /lib remove 9".into(),
            code: Some(1),
            stdout: String::new(),
            stderr: "No book with id 9".into(),
        };
        let message = err.to_string();
        assert!(message.starts_with("calibredb --with-library /lib remove 9 exited with status 1."));
        assert!(message.ends_with("STDERR:\nNo book with id 9"));
    }
}
