use super::{Record, timestamp};
use crate::table::Table;
use rusqlite::Row;
use time::OffsetDateTime;

/// A row of the `books` table.
#[derive(Debug, Clone, PartialEq)]
pub struct BookRow {
    pub id: i64,
    pub title: String,
    /// Maintained by the `books` triggers from the title.
    pub sort: Option<String>,
    pub author_sort: Option<String>,
    pub series_index: f64,
    /// Book folder relative to the library root; empty until files are attached.
    pub path: String,
    pub has_cover: bool,
    pub timestamp: Option<OffsetDateTime>,
    pub pubdate: Option<OffsetDateTime>,
    pub last_modified: Option<OffsetDateTime>,
    pub lccn: Option<String>,
    pub uuid: Option<String>,
}
impl Record for BookRow {
    const TABLE: Table = Table::Books;

    fn decode(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            sort: row.get("sort")?,
            author_sort: row.get("author_sort")?,
            series_index: row.get::<_, Option<f64>>("series_index")?.unwrap_or(1.0),
            path: row.get::<_, Option<String>>("path")?.unwrap_or_default(),
            has_cover: row.get::<_, Option<bool>>("has_cover")?.unwrap_or(false),
            timestamp: timestamp(row, "timestamp")?,
            pubdate: timestamp(row, "pubdate")?,
            last_modified: timestamp(row, "last_modified")?,
            lccn: row.get("lccn")?,
            uuid: row.get("uuid")?,
        })
    }
}

/// Values for a fresh `books` row.
///
/// `path` starts empty and `has_cover` false; both are filled in once the
/// book's files have been written. `isbn` goes to the `identifiers` table,
/// never to the legacy `books.isbn` column.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub title: String,
    pub author_sort: Option<String>,
    pub series_index: f64,
    pub timestamp: OffsetDateTime,
    pub pubdate: Option<OffsetDateTime>,
    pub isbn: Option<String>,
}
impl NewBook {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author_sort: None,
            series_index: 1.0,
            timestamp: OffsetDateTime::now_utc(),
            pubdate: None,
            isbn: None,
        }
    }
}
