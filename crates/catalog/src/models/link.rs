use super::Record;
use crate::table::Table;
use rusqlite::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorLinkRow {
    pub id: i64,
    pub book: i64,
    pub author: i64,
}
impl Record for AuthorLinkRow {
    const TABLE: Table = Table::BooksAuthorsLink;

    fn decode(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self { id: row.get("id")?, book: row.get("book")?, author: row.get("author")? })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesLinkRow {
    pub id: i64,
    pub book: i64,
    pub series: i64,
}
impl Record for SeriesLinkRow {
    const TABLE: Table = Table::BooksSeriesLink;

    fn decode(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self { id: row.get("id")?, book: row.get("book")?, series: row.get("series")? })
    }
}
