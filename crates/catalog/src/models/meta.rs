use super::{optional, timestamp};
use rusqlite::Row;
use time::OffsetDateTime;

/// A (possibly partial) row of the `meta` view.
///
/// Only `id` and `title` are always selected; every other field is `None`
/// when its column was not part of the projection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaRow {
    pub id: i64,
    pub title: String,
    /// Author names joined with `" & "`, in link order.
    pub authors: Option<String>,
    pub author_sort: Option<String>,
    /// Comma-separated upper-case format codes.
    pub formats: Option<String>,
    /// Name of the first linked series.
    pub series: Option<String>,
    pub series_index: Option<f64>,
    pub path: Option<String>,
    pub has_cover: Option<bool>,
    pub timestamp: Option<OffsetDateTime>,
    pub pubdate: Option<OffsetDateTime>,
    pub last_modified: Option<OffsetDateTime>,
    pub isbn: Option<String>,
    /// Size of the largest stored format, in bytes.
    pub size: Option<i64>,
}
impl MetaRow {
    pub fn decode(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            authors: optional(row, "authors")?,
            author_sort: optional(row, "author_sort")?,
            formats: optional(row, "formats")?,
            series: optional(row, "series")?,
            series_index: optional(row, "series_index")?,
            path: optional(row, "path")?,
            has_cover: optional(row, "has_cover")?,
            timestamp: timestamp(row, "timestamp")?,
            pubdate: timestamp(row, "pubdate")?,
            last_modified: timestamp(row, "last_modified")?,
            isbn: optional(row, "isbn")?,
            size: optional(row, "size")?,
        })
    }

    /// Upper-case format codes, in the order the catalog returned them.
    pub fn format_codes(&self) -> Vec<&str> {
        self.formats.as_deref().map(|f| f.split(',').filter(|c| !c.is_empty()).collect()).unwrap_or_default()
    }
}
