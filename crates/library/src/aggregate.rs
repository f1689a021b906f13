//! Aggregation over the catalog: the computed columns the external tool
//! derives internally (author lists, series names, cover and format paths).
//!
//! Two paths produce the same records:
//!
//! - [`list_books`] reads the pre-joined `meta` view in one `SELECT`, plus
//!   one query for the `data` rows when format paths are requested.
//! - [`list_books_structured`] walks the explicit rows (links, authors,
//!   series, data) book by book.
//!
//! Both resolve files the same way: a flagged cover that is missing on disk
//! is dropped with a warning, a listed format that is missing is an error.

use crate::error::{ErrorKind, Result};
use crate::fields::Field;
use crate::filter::BookQuery;
use crate::fs::COVER_FILE;
use crate::record::BookRecord;
use bindery_catalog::{AuthorRow, BookRow, Catalog, DataRow, SeriesRow};
use exn::ResultExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{instrument, warn};

/// A book with every related row resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedBook {
    pub book: BookRow,
    /// In link order.
    pub authors: Vec<AuthorRow>,
    /// The first linked series.
    pub series: Option<SeriesRow>,
    /// Absolute paths, sorted.
    pub formats: Vec<PathBuf>,
    pub cover: Option<PathBuf>,
    /// Size of the largest format, in bytes.
    pub size: Option<i64>,
    /// From the `isbn` identifier.
    pub isbn: Option<String>,
}
impl AggregatedBook {
    /// The record [`list_books`] returns for the same book with every field
    /// projected.
    pub fn to_record(&self) -> BookRecord {
        let authors = self.authors.iter().map(|a| a.name.as_str()).collect::<Vec<_>>();
        BookRecord {
            id: self.book.id,
            title: self.book.title.clone(),
            authors: (!authors.is_empty()).then(|| authors.join(" & ")),
            author_sort: self.book.author_sort.clone(),
            cover: self.cover.clone(),
            formats: Some(self.formats.clone()),
            series: self.series.as_ref().map(|s| s.name.clone()),
            series_index: Some(self.book.series_index),
            timestamp: self.book.timestamp,
            pubdate: self.book.pubdate,
            last_modified: self.book.last_modified,
            isbn: self.isbn.clone(),
            size: self.size,
        }
        .normalized()
    }
}

/// Lists books from the `meta` view, ordered by id.
#[instrument(level = "debug", skip(catalog, query), fields(root = %root.display()))]
pub(crate) fn list_books(catalog: &Catalog, root: &Path, query: &BookQuery) -> Result<Vec<BookRecord>> {
    let projection = &query.projection;
    let predicates = query.filters.iter().map(|f| f.predicate()).collect::<Result<Vec<_>>>()?;
    let rows = catalog.meta(&projection.columns()?, &predicates, query.limit).or_raise(|| ErrorKind::Catalog)?;

    let mut data: HashMap<i64, Vec<DataRow>> = HashMap::new();
    if projection.contains(Field::Formats) && !rows.is_empty() {
        let ids = rows.iter().map(|r| r.id).collect::<Vec<_>>();
        for row in catalog.data(Some(&ids)).or_raise(|| ErrorKind::Catalog)? {
            data.entry(row.book).or_default().push(row);
        }
    }

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let folder = row.path.as_deref().unwrap_or_default();
        let want = |field| projection.contains(field);
        let formats = match want(Field::Formats) {
            true => {
                let codes = row.format_codes();
                let rows = data.get(&row.id).map(Vec::as_slice).unwrap_or_default();
                let paths = rows
                    .iter()
                    .filter(|d| codes.iter().any(|c| c.eq_ignore_ascii_case(&d.format)))
                    .map(|d| format_path(root, folder, d))
                    .collect::<Result<Vec<_>>>()?;
                Some(paths)
            },
            false => None,
        };
        let cover = match want(Field::Cover) {
            true => cover_path(root, row.id, folder, row.has_cover.unwrap_or_default()),
            false => None,
        };
        records.push(
            BookRecord {
                id: row.id,
                title: row.title,
                authors: row.authors.filter(|_| want(Field::Authors)),
                author_sort: row.author_sort.filter(|_| want(Field::AuthorSort)),
                cover,
                formats,
                series: row.series.filter(|_| want(Field::Series)),
                series_index: row.series_index.filter(|_| want(Field::SeriesIndex)),
                timestamp: row.timestamp.filter(|_| want(Field::Timestamp)),
                pubdate: row.pubdate.filter(|_| want(Field::Pubdate)),
                last_modified: row.last_modified.filter(|_| want(Field::LastModified)),
                isbn: row.isbn.filter(|_| want(Field::Isbn)),
                size: row.size.filter(|_| want(Field::Size)),
            }
            .normalized(),
        );
    }
    Ok(records)
}

/// Lists every book bottom-up from the explicit tables, ordered by id.
#[instrument(level = "debug", skip(catalog), fields(root = %root.display()))]
pub(crate) fn list_books_structured(catalog: &Catalog, root: &Path) -> Result<Vec<AggregatedBook>> {
    let books = catalog.books().or_raise(|| ErrorKind::Catalog)?;
    let mut aggregated = Vec::with_capacity(books.len());
    for book in books {
        let mut authors = Vec::new();
        for link in catalog.author_links(book.id).or_raise(|| ErrorKind::Catalog)? {
            match catalog.get::<AuthorRow>(link.author).or_raise(|| ErrorKind::Catalog)? {
                Some(author) => authors.push(author),
                None => warn!(book = book.id, author = link.author, "Author link points at a missing author"),
            }
        }
        let series = match catalog.series_links(book.id).or_raise(|| ErrorKind::Catalog)?.first() {
            Some(link) => catalog.get::<SeriesRow>(link.series).or_raise(|| ErrorKind::Catalog)?,
            None => None,
        };
        let data = catalog.data(Some(&[book.id])).or_raise(|| ErrorKind::Catalog)?;
        let mut formats = data.iter().map(|d| format_path(root, &book.path, d)).collect::<Result<Vec<_>>>()?;
        formats.sort();
        let size = data.iter().map(|d| d.uncompressed_size).max();
        let cover = cover_path(root, book.id, &book.path, book.has_cover);
        let isbn = catalog.isbn(book.id).or_raise(|| ErrorKind::Catalog)?;
        aggregated.push(AggregatedBook { book, authors, series, formats, cover, size, isbn });
    }
    Ok(aggregated)
}

/// `<root>/<folder>/cover.jpg` when the book is flagged and the file exists.
fn cover_path(root: &Path, book: i64, folder: &str, has_cover: bool) -> Option<PathBuf> {
    if !has_cover {
        return None;
    }
    let path = root.join(folder).join(COVER_FILE);
    match path.is_file() {
        true => Some(path),
        false => {
            warn!(book, path = %path.display(), "Cover is flagged but missing on disk");
            None
        },
    }
}

/// `<root>/<folder>/<name>.<format>`, which must exist.
fn format_path(root: &Path, folder: &str, data: &DataRow) -> Result<PathBuf> {
    let path = root.join(folder).join(data.file_name());
    if !path.is_file() {
        exn::bail!(ErrorKind::MissingFormat { book: data.book, path });
    }
    Ok(path)
}
