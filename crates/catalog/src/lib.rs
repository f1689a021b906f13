//! Direct access to an e-book catalog file (`metadata.db`).
//!
//! This crate reads and writes the same SQLite file the external catalog tool
//! manages, without going through the tool. That means re-creating the pieces
//! of the tool's runtime the schema relies on: the `concat` and `sortconcat`
//! aggregates used by the `meta` view, and the `title_sort` and `uuid4`
//! functions called by the `books` triggers.
//!
//! # Architecture
//! - [`Catalog`] owns one connection and exposes generic, equality-only row
//!   operations keyed by the closed [`Table`] enum, so column names are never
//!   spliced into SQL unchecked.
//! - [`models`] holds the typed rows ([`BookRow`], [`AuthorRow`], ...) and the
//!   partial [`MetaRow`] returned by projections of the `meta` view.
//! - [`Template`] is the bundled empty library the schema is created from.

mod db;
pub mod error;
pub mod functions;
pub mod models;
mod query;
mod repo;
mod table;
mod template;

pub use crate::db::Catalog;
pub use crate::models::{
    AuthorLinkRow, AuthorRow, BookRow, DataRow, IdentifierRow, MetaRow, NewBook, Record, SeriesLinkRow, SeriesRow,
};
pub use crate::query::Predicate;
pub use crate::table::{Column, Table};
pub use crate::template::{CATALOG_FILE, SCHEMA_VERSION, Template};
pub use rusqlite::types::Value;
