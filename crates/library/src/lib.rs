//! E-book library lifecycle over two interchangeable backends.
//!
//! A [`Library`] is a folder holding `metadata.db` plus one folder per book.
//! It is operated either through the `calibredb` tool or by reading and
//! writing the catalog directly ([`BackendKind`]); both return the same
//! [`BookRecord`]s for the same library state.
//!
//! # Architecture
//! - [`fields`] and [`filter`] turn caller-facing [`Field`]s and [`Filter`]s
//!   into catalog columns/predicates and into `calibredb` arguments.
//! - `aggregate` re-derives the columns the external tool computes (author
//!   lists, series, cover and format paths).
//! - `add` is the staged add pipeline of the catalog backend and `recover`
//!   finds and cleans up adds that stopped part-way.

mod add;
mod aggregate;
mod backend;
pub mod error;
pub mod fields;
pub mod filter;
mod fs;
mod library;
mod path;
mod record;
mod recover;
mod template;

pub use crate::add::Stage;
pub use crate::aggregate::AggregatedBook;
pub use crate::backend::BackendKind;
pub use crate::fields::{Field, Projection};
pub use crate::filter::{BookQuery, Filter, FilterValue};
pub use crate::library::{LayoutTemplates, Library, LibraryOptions};
pub use crate::record::BookRecord;
pub use crate::recover::IncompleteBook;
pub use crate::template::{DEFAULT_FILE_TEMPLATE, DEFAULT_FOLDER_TEMPLATE, Layout, PathGenerator, PathParams};
