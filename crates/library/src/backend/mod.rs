//! Backend strategy: where library operations are carried out.
//!
//! [`BackendKind`] is always chosen explicitly by the caller; nothing is
//! inferred from the library folder.

mod calibre;
mod catalog;

pub(crate) use crate::backend::calibre::CalibreBackend;
pub(crate) use crate::backend::catalog::CatalogBackend;

use crate::error::{Error, ErrorKind, Result};
use crate::filter::BookQuery;
use crate::record::BookRecord;
use bindery_catalog::Catalog;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Which access path a [`Library`](crate::Library) uses.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Direct reads and writes of `metadata.db`.
    #[default]
    #[display("catalog")]
    Catalog,
    /// One `calibredb` process per operation.
    #[display("calibredb")]
    CalibreDb,
}
impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "catalog" | "sqlite" => Ok(Self::Catalog),
            "calibredb" | "calibre" => Ok(Self::CalibreDb),
            other => exn::bail!(ErrorKind::UnsupportedBackend(other.to_string())),
        }
    }
}

/// Operations both access paths implement with the same observable result.
pub(crate) trait Backend: Send {
    fn kind(&self) -> BackendKind;

    /// Books matching the query, ordered by id.
    fn list_books(&self, query: &BookQuery) -> Result<Vec<BookRecord>>;

    /// Adds files in order and returns the new ids. Stops at the first
    /// failure; books added before it stay.
    fn add_books(&self, paths: &[PathBuf]) -> Result<Vec<i64>>;

    /// Removes books with their files. Unknown ids are ignored.
    fn remove_by_ids(&self, ids: &[i64]) -> Result<()>;

    /// Distinct author names of the listed books, in first-seen order.
    fn list_authors(&self) -> Result<Vec<String>>;

    /// The open catalog connection, if the backend holds one.
    fn catalog(&self) -> Option<&Catalog> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("catalog", BackendKind::Catalog)]
    #[case("SQLite", BackendKind::Catalog)]
    #[case("calibredb", BackendKind::CalibreDb)]
    #[case(" Calibre ", BackendKind::CalibreDb)]
    fn test_parse_kind(#[case] input: &str, #[case] expected: BackendKind) {
        assert_eq!(input.parse::<BackendKind>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_kind() {
        let err = "postgres".parse::<BackendKind>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedBackend(name) if name == "postgres"));
    }

    #[test]
    fn test_kind_round_trips_through_display() {
        for kind in [BackendKind::Catalog, BackendKind::CalibreDb] {
            assert_eq!(kind.to_string().parse::<BackendKind>().unwrap(), kind);
        }
    }
}
