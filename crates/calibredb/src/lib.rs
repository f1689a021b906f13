//! Adapter for the `calibredb` command-line tool.
//!
//! Every operation is one blocking child process
//! (`calibredb --with-library <library> <subcommand> ...`), serialized per
//! [`CalibreDb`] instance. Machine-readable listings are decoded into
//! [`ListedBook`] values; anything else the tool prints is only logged.

mod calibredb;
mod discover;
pub mod error;
mod list;
#[cfg(all(test, unix))]
mod testing;

pub use crate::calibredb::CalibreDb;
pub use crate::list::{ListOptions, ListedBook};
