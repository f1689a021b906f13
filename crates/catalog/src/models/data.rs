use super::Record;
use crate::table::Table;
use rusqlite::Row;

/// A row of the `data` table: one stored file format of a book.
///
/// The file lives at `<book path>/<name>.<format lowercased>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRow {
    pub id: i64,
    pub book: i64,
    /// Upper-case format code, e.g. `EPUB`.
    pub format: String,
    pub uncompressed_size: i64,
    /// File name without extension.
    pub name: String,
}
impl DataRow {
    /// File name (with extension) relative to the book folder.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.format.to_lowercase())
    }
}
impl Record for DataRow {
    const TABLE: Table = Table::Data;

    fn decode(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            book: row.get("book")?,
            format: row.get("format")?,
            uncompressed_size: row.get("uncompressed_size")?,
            name: row.get("name")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_lowercases_format() {
        let row = DataRow {
            id: 1,
            book: 1,
            format: "EPUB".to_string(),
            uncompressed_size: 10,
            name: "Silo - Hugh Howey".to_string(),
        };
        assert_eq!(row.file_name(), "Silo - Hugh Howey.epub");
    }
}
