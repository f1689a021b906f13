use bindery_catalog::models::datetime;
use serde::Serialize;
use std::path::PathBuf;
use time::OffsetDateTime;

/// A book as returned by either backend.
///
/// Fields outside the requested [`Projection`](crate::Projection) are `None`.
/// Timestamps carry whole seconds only and an empty ISBN is `None`, so
/// records from both backends compare equal for the same library state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BookRecord {
    pub id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_sort: Option<String>,
    /// Absolute path of `cover.jpg`, present only when the file exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<PathBuf>,
    /// Absolute paths of every format file, sorted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formats: Option<Vec<PathBuf>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_index: Option<f64>,
    #[serde(with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub pubdate: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}
impl BookRecord {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self { id, title: title.into(), ..Self::default() }
    }

    /// Applies the representation rules shared by both backends.
    pub(crate) fn normalized(mut self) -> Self {
        for ts in [&mut self.timestamp, &mut self.pubdate, &mut self.last_modified] {
            *ts = ts.map(datetime::truncate);
        }
        self.isbn = self.isbn.filter(|isbn| !isbn.trim().is_empty());
        if let Some(formats) = self.formats.as_mut() {
            formats.sort();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_normalized() {
        let record = BookRecord {
            timestamp: Some(datetime!(2024-01-30 10:11:12.345678 UTC)),
            isbn: Some(String::new()),
            formats: Some(vec![PathBuf::from("/b.pdf"), PathBuf::from("/a.epub")]),
            ..BookRecord::new(1, "Wool")
        }
        .normalized();
        assert_eq!(record.timestamp, Some(datetime!(2024-01-30 10:11:12 UTC)));
        assert_eq!(record.isbn, None);
        assert_eq!(record.formats, Some(vec![PathBuf::from("/a.epub"), PathBuf::from("/b.pdf")]));
    }

    #[test]
    fn test_serialize_skips_unrequested_fields() {
        let record = BookRecord { authors: Some("Hugh Howey".into()), ..BookRecord::new(1, "Wool") };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({"id": 1, "title": "Wool", "authors": "Hugh Howey"}));
    }
}
