//! The closed set of tables (and the `meta` view) the catalog knows about.
//!
//! Identifiers are never taken from callers verbatim: every column name is
//! checked against [`Table::columns`] before it is spliced into SQL, and every
//! value is bound as a parameter.

use crate::error::{ErrorKind, Result};
use derive_more::Display;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    #[display("authors")]
    Authors,
    #[display("series")]
    Series,
    #[display("books")]
    Books,
    #[display("books_authors_link")]
    BooksAuthorsLink,
    #[display("books_series_link")]
    BooksSeriesLink,
    #[display("data")]
    Data,
    /// External identifiers keyed by `(book, type)`.
    #[display("identifiers")]
    Identifiers,
    /// Read-only view with one pre-joined row per book.
    #[display("meta")]
    Meta,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Self::Authors => "authors",
            Self::Series => "series",
            Self::Books => "books",
            Self::BooksAuthorsLink => "books_authors_link",
            Self::BooksSeriesLink => "books_series_link",
            Self::Data => "data",
            Self::Identifiers => "identifiers",
            Self::Meta => "meta",
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Authors | Self::Series => &["id", "name", "sort", "link"],
            Self::Books => &[
                "id",
                "title",
                "sort",
                "timestamp",
                "pubdate",
                "series_index",
                "author_sort",
                "lccn",
                "path",
                "flags",
                "uuid",
                "has_cover",
                "last_modified",
            ],
            Self::BooksAuthorsLink => &["id", "book", "author"],
            Self::BooksSeriesLink => &["id", "book", "series"],
            Self::Data => &["id", "book", "format", "uncompressed_size", "name"],
            Self::Identifiers => &["id", "book", "type", "val"],
            Self::Meta => &[
                "id",
                "title",
                "authors",
                "timestamp",
                "size",
                "series",
                "series_index",
                "sort",
                "author_sort",
                "formats",
                "isbn",
                "path",
                "lccn",
                "pubdate",
                "flags",
                "uuid",
                "has_cover",
            ],
        }
    }

    /// Columns of the table's `UNIQUE` constraint, used to find the existing
    /// row when an `INSERT OR IGNORE` was ignored.
    ///
    /// Tables without one always receive a fresh row.
    pub fn unique_key(self) -> &'static [&'static str] {
        match self {
            Self::Authors | Self::Series => &["name"],
            Self::BooksAuthorsLink => &["book", "author"],
            // A book belongs to at most one series.
            Self::BooksSeriesLink => &["book"],
            Self::Data => &["book", "format"],
            Self::Identifiers => &["book", "type"],
            Self::Books | Self::Meta => &[],
        }
    }

    /// Whether rows of this table describe a single book by their `id`.
    pub(crate) fn is_book_keyed(self) -> bool {
        matches!(self, Self::Books | Self::Meta)
    }

    pub fn is_writable(self) -> bool {
        !matches!(self, Self::Meta)
    }

    /// Join condition used when a query on `self` references columns of `other`.
    pub(crate) fn join_on(self, other: Self) -> Option<&'static str> {
        match (self, other) {
            (Self::Meta, Self::Books) => Some("books.id = meta.id"),
            _ => None,
        }
    }

    pub(crate) fn check(self, column: &str) -> Result<&'static str> {
        match self.columns().iter().find(|c| **c == column) {
            Some(c) => Ok(*c),
            None => exn::bail!(ErrorKind::UnknownColumn { table: self.name(), column: column.to_string() }),
        }
    }
}

/// A column qualified by the table it comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Column {
    pub table: Table,
    pub name: &'static str,
}
impl Column {
    /// Builds a column, failing if the table does not have it.
    pub fn new(table: Table, name: &str) -> Result<Self> {
        Ok(Self { table, name: table.check(name)? })
    }

    pub(crate) fn qualified(&self) -> String {
        format!("{}.{}", self.table.name(), self.name)
    }
}
