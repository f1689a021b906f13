//! Typed helpers over the generic row operations.
//!
//! Authors, series and their links are deduplicated by the tables' unique
//! keys, so adding the same author twice (in any letter case) yields the same
//! id both times. Removing books never touches authors or series: orphaned
//! rows stay, just as they do when the external tool removes a book.

use crate::db::Catalog;
use crate::error::{ErrorKind, Result};
use crate::models::{
    AuthorLinkRow, AuthorRow, BookRow, DataRow, IdentifierRow, MetaRow, NewBook, SeriesLinkRow, SeriesRow,
    datetime,
};
use crate::query::Predicate;
use crate::table::{Column, Table};
use exn::ResultExt;
use rusqlite::types::Value;
use time::OffsetDateTime;
use tracing::instrument;

const ISBN: &str = "isbn";

fn text(s: impl Into<String>) -> Value {
    Value::Text(s.into())
}

impl Catalog {
    // =========================================================================
    // Authors
    // =========================================================================

    pub fn authors(&self) -> Result<Vec<AuthorRow>> {
        self.list(&[])
    }

    /// Adds an author (sort key defaults to the name) and returns its id, or
    /// the id of the existing author with that name.
    pub fn add_author(&self, name: &str, sort: Option<&str>) -> Result<i64> {
        self.insert_row(Table::Authors, &["name", "sort"], &[text(name), text(sort.unwrap_or(name))])
    }

    pub fn author_id(&self, name: &str) -> Result<Option<i64>> {
        self.lookup_id(Table::Authors, "name", text(name))
    }

    pub fn update_author(&self, id: i64, name: &str, sort: &str) -> Result<()> {
        self.update_row(Table::Authors, id, &["name", "sort"], &[text(name), text(sort)])
    }

    // =========================================================================
    // Series
    // =========================================================================

    pub fn series(&self) -> Result<Vec<SeriesRow>> {
        self.list(&[])
    }

    pub fn add_series(&self, name: &str, sort: Option<&str>) -> Result<i64> {
        self.insert_row(Table::Series, &["name", "sort"], &[text(name), text(sort.unwrap_or(name))])
    }

    pub fn series_id(&self, name: &str) -> Result<Option<i64>> {
        self.lookup_id(Table::Series, "name", text(name))
    }

    // =========================================================================
    // Books
    // =========================================================================

    pub fn books(&self) -> Result<Vec<BookRow>> {
        self.list(&[])
    }

    /// Inserts a bare `books` row plus its ISBN identifier. The triggers fill
    /// in `sort` and `uuid`.
    pub fn add_book(&self, book: &NewBook) -> Result<i64> {
        let pubdate = book.pubdate.unwrap_or_else(datetime::undefined);
        let id = self.insert_row(
            Table::Books,
            &["title", "author_sort", "series_index", "timestamp", "pubdate", "last_modified"],
            &[
                text(&book.title),
                book.author_sort.clone().into(),
                Value::Real(book.series_index),
                text(datetime::format(book.timestamp)),
                text(datetime::format(pubdate)),
                text(datetime::format(book.timestamp)),
            ],
        )?;
        self.set_isbn(id, book.isbn.as_deref())?;
        Ok(id)
    }

    /// Inserts a book with its authors and links in one transaction.
    ///
    /// Authors are `(name, sort)` pairs; the book's `author_sort` becomes the
    /// sort keys joined with `" & "` unless one was given.
    #[instrument(level = "debug", skip_all, fields(title = %book.title))]
    pub fn insert_book(&self, book: &NewBook, authors: &[(&str, Option<&str>)]) -> Result<i64> {
        let mut book = book.clone();
        if book.author_sort.is_none() && !authors.is_empty() {
            let sorts = authors.iter().map(|(name, sort)| sort.unwrap_or(*name)).collect::<Vec<_>>();
            book.author_sort = Some(sorts.join(" & "));
        }
        self.transaction(|c| {
            let id = c.add_book(&book)?;
            for (name, sort) in authors {
                let author = c.add_author(name, *sort)?;
                c.add_author_link(id, author)?;
            }
            Ok(id)
        })
    }

    /// Overwrites the scalar metadata of a book, ISBN included. The update
    /// trigger recomputes `sort`.
    pub fn update_book(&self, id: i64, book: &NewBook) -> Result<()> {
        let pubdate = book.pubdate.unwrap_or_else(datetime::undefined);
        self.update_row(
            Table::Books,
            id,
            &["title", "author_sort", "series_index", "timestamp", "pubdate"],
            &[
                text(&book.title),
                book.author_sort.clone().into(),
                Value::Real(book.series_index),
                text(datetime::format(book.timestamp)),
                text(datetime::format(pubdate)),
            ],
        )?;
        self.set_isbn(id, book.isbn.as_deref())
    }

    /// Attaches files to a book: sets its folder, cover flag and modification time.
    pub fn set_book_files(&self, id: i64, path: &str, has_cover: bool, modified: OffsetDateTime) -> Result<()> {
        self.update_row(
            Table::Books,
            id,
            &["path", "has_cover", "last_modified"],
            &[text(path), Value::Integer(i64::from(has_cover)), text(datetime::format(modified))],
        )
    }

    /// Books whose insert went through but whose files were never attached:
    /// empty `path` while author links exist.
    pub fn incomplete_books(&self) -> Result<Vec<BookRow>> {
        let mut stmt = self
            .connection()
            .prepare(include_str!("../queries/incomplete_books.sql"))
            .or_raise(|| ErrorKind::Database)?;
        let rows = stmt.query_map([], <BookRow as crate::models::Record>::decode).or_raise(|| ErrorKind::Database)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().or_raise(|| ErrorKind::InvalidData("books"))
    }

    /// Deletes books with their links, identifiers and `data` rows, in one
    /// transaction. Unknown ids are skipped.
    ///
    /// Returns the deleted `books` rows so callers can clean up the folders.
    #[instrument(level = "debug", skip(self))]
    pub fn remove_books(&self, ids: &[i64]) -> Result<Vec<BookRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let values = ids.iter().copied().map(Value::Integer).collect::<Vec<_>>();
        self.transaction(|c| {
            let books = c.list::<BookRow>(&[Predicate::AnyOf(Column::new(Table::Books, "id")?, values.clone())])?;
            for (table, column) in [
                (Table::BooksAuthorsLink, "book"),
                (Table::BooksSeriesLink, "book"),
                (Table::Data, "book"),
                (Table::Identifiers, "book"),
            ] {
                c.delete_rows(table, &[Predicate::AnyOf(Column::new(table, column)?, values.clone())])?;
            }
            c.delete_rows(Table::Books, &[Predicate::AnyOf(Column::new(Table::Books, "id")?, values.clone())])?;
            Ok(books)
        })
    }

    // =========================================================================
    // Links
    // =========================================================================

    /// Author links of a book, in insertion (link id) order.
    pub fn author_links(&self, book: i64) -> Result<Vec<AuthorLinkRow>> {
        self.list(&[Predicate::eq(Table::BooksAuthorsLink, "book", book)?])
    }

    pub fn add_author_link(&self, book: i64, author: i64) -> Result<i64> {
        self.insert_row(Table::BooksAuthorsLink, &["book", "author"], &[book.into(), author.into()])
    }

    /// Series links of a book, in insertion (link id) order.
    pub fn series_links(&self, book: i64) -> Result<Vec<SeriesLinkRow>> {
        self.list(&[Predicate::eq(Table::BooksSeriesLink, "book", book)?])
    }

    pub fn add_series_link(&self, book: i64, series: i64) -> Result<i64> {
        self.insert_row(Table::BooksSeriesLink, &["book", "series"], &[book.into(), series.into()])
    }

    // =========================================================================
    // Identifiers
    // =========================================================================

    /// Identifiers of a book, in insertion order.
    pub fn identifiers(&self, book: i64) -> Result<Vec<IdentifierRow>> {
        self.list(&[Predicate::eq(Table::Identifiers, "book", book)?])
    }

    /// Sets the identifier of the given kind, replacing any previous value.
    /// Kinds are stored lowercase.
    pub fn set_identifier(&self, book: i64, kind: &str, value: &str) -> Result<i64> {
        let kind = kind.trim().to_lowercase();
        let id = self.insert_row(Table::Identifiers, &["book", "type", "val"], &[book.into(), text(&kind), text(value)])?;
        self.update_row(Table::Identifiers, id, &["val"], &[text(value)])?;
        Ok(id)
    }

    pub fn remove_identifier(&self, book: i64, kind: &str) -> Result<usize> {
        self.delete_rows(
            Table::Identifiers,
            &[
                Predicate::eq(Table::Identifiers, "book", book)?,
                Predicate::EqNoCase(Column::new(Table::Identifiers, "type")?, text(kind.trim())),
            ],
        )
    }

    /// The book's ISBN, read from `identifiers` the way the external tool
    /// reports it.
    pub fn isbn(&self, book: i64) -> Result<Option<String>> {
        let rows = self.list::<IdentifierRow>(&[
            Predicate::eq(Table::Identifiers, "book", book)?,
            Predicate::eq(Table::Identifiers, "type", text(ISBN))?,
        ])?;
        Ok(rows.into_iter().next().map(|row| row.value))
    }

    /// A blank or missing ISBN removes the identifier.
    fn set_isbn(&self, book: i64, isbn: Option<&str>) -> Result<()> {
        match isbn.map(str::trim).filter(|isbn| !isbn.is_empty()) {
            Some(isbn) => self.set_identifier(book, ISBN, isbn).map(drop),
            None => self.remove_identifier(book, ISBN).map(drop),
        }
    }

    // =========================================================================
    // Data
    // =========================================================================

    /// Format records of the given books (all books if `books` is `None`).
    pub fn data(&self, books: Option<&[i64]>) -> Result<Vec<DataRow>> {
        match books {
            None => self.list(&[]),
            Some(ids) => {
                let ids = ids.iter().copied().map(Value::Integer).collect();
                self.list(&[Predicate::AnyOf(Column::new(Table::Data, "book")?, ids)])
            },
        }
    }

    pub fn add_data(&self, book: i64, format: &str, size: u64, name: &str) -> Result<i64> {
        let size = i64::try_from(size).or_raise(|| ErrorKind::InvalidData("uncompressed size"))?;
        self.insert_row(
            Table::Data,
            &["book", "format", "uncompressed_size", "name"],
            &[book.into(), text(format.to_uppercase()), size.into(), text(name)],
        )
    }

    // =========================================================================
    // Meta
    // =========================================================================

    /// Reads the `meta` view.
    ///
    /// `id` and `title` are always selected, in front of `columns`.
    pub fn meta(&self, columns: &[Column], predicates: &[Predicate], limit: Option<usize>) -> Result<Vec<MetaRow>> {
        let mut selected = vec![Column::new(Table::Meta, "id")?, Column::new(Table::Meta, "title")?];
        for column in columns {
            if !selected.iter().any(|c| c.name == column.name) {
                selected.push(*column);
            }
        }
        self.list_rows(Table::Meta, &selected, predicates, limit, MetaRow::decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn catalog() -> Catalog {
        Catalog::open_in_memory().unwrap()
    }

    fn meta_columns(names: &[&str]) -> Vec<Column> {
        names.iter().map(|n| Column::new(Table::Meta, n).unwrap()).collect()
    }

    #[rstest]
    fn test_author_dedup_is_case_insensitive(catalog: Catalog) {
        let id = catalog.add_author("David Bowie", None).unwrap();
        assert_eq!(catalog.add_author("david bowie", None).unwrap(), id);
        assert_eq!(catalog.author_id("DAVID BOWIE").unwrap(), Some(id));
        let authors = catalog.authors().unwrap();
        assert_eq!(authors, vec![AuthorRow { id, name: "David Bowie".into(), sort: Some("David Bowie".into()) }]);
    }

    #[rstest]
    fn test_update_author(catalog: Catalog) {
        let id = catalog.add_author("Bowie", None).unwrap();
        catalog.update_author(id, "David Bowie", "Bowie, David").unwrap();
        let author = catalog.get::<AuthorRow>(id).unwrap().unwrap();
        assert_eq!(author.sort.as_deref(), Some("Bowie, David"));
    }

    #[rstest]
    fn test_update_book_recomputes_sort(catalog: Catalog) {
        let id = catalog.add_book(&NewBook::new("Stand")).unwrap();
        let update = NewBook { series_index: 2.0, ..NewBook::new("The Stand") };
        catalog.update_book(id, &update).unwrap();
        let book = catalog.get::<BookRow>(id).unwrap().unwrap();
        assert_eq!(book.title, "The Stand");
        assert_eq!(book.sort.as_deref(), Some("Stand, The"));
        assert_eq!(book.series_index, 2.0);
    }

    #[rstest]
    fn test_series_dedup(catalog: Catalog) {
        let id = catalog.add_series("Silo", None).unwrap();
        assert_eq!(catalog.add_series("SILO", Some("x")).unwrap(), id);
        assert_eq!(catalog.series_id("silo").unwrap(), Some(id));
        assert_eq!(catalog.series().unwrap().len(), 1);
    }

    #[rstest]
    fn test_links_are_deduplicated(catalog: Catalog) {
        let book = catalog.add_book(&NewBook::new("Wool")).unwrap();
        let author = catalog.add_author("Hugh Howey", None).unwrap();
        let link = catalog.add_author_link(book, author).unwrap();
        assert_eq!(catalog.add_author_link(book, author).unwrap(), link);
        assert_eq!(catalog.author_links(book).unwrap().len(), 1);
        let series = catalog.add_series("Silo", None).unwrap();
        let link = catalog.add_series_link(book, series).unwrap();
        assert_eq!(catalog.add_series_link(book, series).unwrap(), link);
        assert_eq!(catalog.series_links(book).unwrap(), vec![SeriesLinkRow { id: link, book, series }]);
    }

    #[rstest]
    fn test_insert_book_with_authors(catalog: Catalog) {
        let id = catalog
            .insert_book(&NewBook::new("Good Omens"), &[("Terry Pratchett", Some("Pratchett, Terry")), ("Neil Gaiman", None)])
            .unwrap();
        let book = catalog.get::<BookRow>(id).unwrap().unwrap();
        assert_eq!(book.author_sort.as_deref(), Some("Pratchett, Terry & Neil Gaiman"));
        assert_eq!(book.path, "");
        assert_eq!(book.series_index, 1.0);
        let meta = catalog.meta(&meta_columns(&["authors", "series", "series_index"]), &[], None).unwrap();
        assert_eq!(meta.len(), 1);
        assert_eq!(meta[0].authors.as_deref(), Some("Terry Pratchett & Neil Gaiman"));
        assert_eq!(meta[0].series, None);
        assert_eq!(meta[0].series_index, Some(1.0));
    }

    #[rstest]
    fn test_book_has_one_series(catalog: Catalog) {
        let book = catalog.add_book(&NewBook::new("Shift")).unwrap();
        let first = catalog.add_series("Silo", None).unwrap();
        let second = catalog.add_series("Anthology", None).unwrap();
        let link = catalog.add_series_link(book, first).unwrap();
        assert_eq!(catalog.add_series_link(book, second).unwrap(), link);
        let meta = catalog.meta(&meta_columns(&["series"]), &[], None).unwrap();
        assert_eq!(meta[0].series.as_deref(), Some("Silo"));
    }

    #[rstest]
    fn test_isbn_lives_in_identifiers(catalog: Catalog) {
        let book = NewBook { isbn: Some("9781476733951".into()), ..NewBook::new("Wool") };
        let id = catalog.add_book(&book).unwrap();
        assert_eq!(catalog.isbn(id).unwrap().as_deref(), Some("9781476733951"));
        let identifiers = catalog.identifiers(id).unwrap();
        assert_eq!(identifiers.len(), 1);
        assert_eq!(identifiers[0].kind, "isbn");
        let meta = catalog.meta(&meta_columns(&["isbn"]), &[], None).unwrap();
        assert_eq!(meta[0].isbn.as_deref(), Some("9781476733951"));
        let legacy: String =
            catalog.connection().query_row("SELECT isbn FROM books WHERE id = ?", [id], |r| r.get(0)).unwrap();
        assert_eq!(legacy, "");
    }

    #[rstest]
    fn test_set_identifier_replaces_value(catalog: Catalog) {
        let id = catalog.add_book(&NewBook::new("Dust")).unwrap();
        let first = catalog.set_identifier(id, "ASIN", "B00A").unwrap();
        assert_eq!(catalog.set_identifier(id, "asin", "B00B").unwrap(), first);
        let identifiers = catalog.identifiers(id).unwrap();
        assert_eq!(identifiers, vec![IdentifierRow { id: first, book: id, kind: "asin".into(), value: "B00B".into() }]);
        assert_eq!(catalog.isbn(id).unwrap(), None);
    }

    #[rstest]
    fn test_update_book_clears_blank_isbn(catalog: Catalog) {
        let id = catalog.add_book(&NewBook { isbn: Some("9780000000001".into()), ..NewBook::new("Dust") }).unwrap();
        catalog.update_book(id, &NewBook { isbn: Some("  ".into()), ..NewBook::new("Dust") }).unwrap();
        assert_eq!(catalog.isbn(id).unwrap(), None);
        assert!(catalog.identifiers(id).unwrap().is_empty());
    }

    #[rstest]
    fn test_meta_formats_and_size(catalog: Catalog) {
        let book = catalog.add_book(&NewBook::new("Dust")).unwrap();
        catalog.add_data(book, "epub", 100, "Dust - Hugh Howey").unwrap();
        catalog.add_data(book, "PDF", 300, "Dust - Hugh Howey").unwrap();
        let meta = catalog.meta(&meta_columns(&["formats", "size"]), &[], None).unwrap();
        assert_eq!(meta[0].format_codes(), vec!["EPUB", "PDF"]);
        assert_eq!(meta[0].size, Some(300));
        // Format is part of the unique key.
        assert_eq!(catalog.data(Some(&[book])).unwrap().len(), 2);
        catalog.add_data(book, "EPUB", 100, "Dust - Hugh Howey").unwrap();
        assert_eq!(catalog.data(None).unwrap().len(), 2);
    }

    #[rstest]
    fn test_meta_without_links_is_null(catalog: Catalog) {
        catalog.add_book(&NewBook::new("Orphan")).unwrap();
        let meta = catalog.meta(&meta_columns(&["authors", "formats", "size"]), &[], None).unwrap();
        assert_eq!(meta[0].authors, None);
        assert_eq!(meta[0].formats, None);
        assert_eq!(meta[0].size, None);
    }

    #[rstest]
    fn test_meta_filters(catalog: Catalog) {
        let first = catalog.insert_book(&NewBook::new("Wool"), &[("Hugh Howey", None)]).unwrap();
        let second = catalog.insert_book(&NewBook::new("Dune"), &[("Frank Herbert", None)]).unwrap();
        let by_id = catalog.meta(&[], &[Predicate::eq(Table::Meta, "id", second).unwrap()], None).unwrap();
        assert_eq!(by_id.iter().map(|m| m.id).collect::<Vec<_>>(), vec![second]);
        let by_author = catalog.meta(&[], &[Predicate::HasAuthor("hugh howey".into())], None).unwrap();
        assert_eq!(by_author.iter().map(|m| m.id).collect::<Vec<_>>(), vec![first]);
        let limited = catalog.meta(&[], &[], Some(1)).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, first);
    }

    #[rstest]
    fn test_meta_joins_books_columns(catalog: Catalog) {
        let id = catalog.add_book(&NewBook::new("Wool")).unwrap();
        catalog.set_book_files(id, "Hugh Howey/Wool (1)", true, datetime::undefined()).unwrap();
        let columns = [Column::new(Table::Books, "has_cover").unwrap(), Column::new(Table::Books, "last_modified").unwrap()];
        let meta = catalog.meta(&columns, &[], None).unwrap();
        assert_eq!(meta[0].has_cover, Some(true));
        assert_eq!(meta[0].last_modified, Some(datetime::undefined()));
    }

    #[rstest]
    fn test_remove_books_keeps_orphans(catalog: Catalog) {
        let wool = NewBook { isbn: Some("9781476733951".into()), ..NewBook::new("Wool") };
        let book = catalog.insert_book(&wool, &[("Hugh Howey", None)]).unwrap();
        let series = catalog.add_series("Silo", None).unwrap();
        catalog.add_series_link(book, series).unwrap();
        catalog.add_data(book, "EPUB", 1, "Wool - Hugh Howey").unwrap();
        let removed = catalog.remove_books(&[book, 999]).unwrap();
        assert!(catalog.identifiers(book).unwrap().is_empty());
        assert_eq!(removed.len(), 1);
        assert!(catalog.books().unwrap().is_empty());
        assert!(catalog.author_links(book).unwrap().is_empty());
        assert!(catalog.series_links(book).unwrap().is_empty());
        assert!(catalog.data(None).unwrap().is_empty());
        assert_eq!(catalog.authors().unwrap().len(), 1);
        assert_eq!(catalog.series().unwrap().len(), 1);
    }

    #[rstest]
    fn test_incomplete_books(catalog: Catalog) {
        let pending = catalog.insert_book(&NewBook::new("Wool"), &[("Hugh Howey", None)]).unwrap();
        let done = catalog.insert_book(&NewBook::new("Dune"), &[("Frank Herbert", None)]).unwrap();
        catalog.set_book_files(done, "Frank Herbert/Dune (2)", false, OffsetDateTime::now_utc()).unwrap();
        // No authors: never went through an add, so it is not reported.
        catalog.add_book(&NewBook::new("Bare")).unwrap();
        let incomplete = catalog.incomplete_books().unwrap();
        assert_eq!(incomplete.iter().map(|b| b.id).collect::<Vec<_>>(), vec![pending]);
    }

    #[rstest]
    fn test_timestamps_round_trip(catalog: Catalog) {
        let mut book = NewBook::new("Wool");
        book.timestamp = time::macros::datetime!(2024-01-15 10:20:30.123456 UTC);
        let id = catalog.add_book(&book).unwrap();
        let row = catalog.get::<BookRow>(id).unwrap().unwrap();
        assert_eq!(row.timestamp, Some(book.timestamp));
        assert_eq!(row.pubdate, Some(datetime::undefined()));
    }
}
