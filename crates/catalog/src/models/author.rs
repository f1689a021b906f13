use super::Record;
use crate::table::Table;
use rusqlite::Row;

/// A row of the `authors` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorRow {
    pub id: i64,
    pub name: String,
    /// Sort key; rows inserted through this crate default it to the name.
    pub sort: Option<String>,
}
impl Record for AuthorRow {
    const TABLE: Table = Table::Authors;

    fn decode(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self { id: row.get("id")?, name: row.get("name")?, sort: row.get("sort")? })
    }
}

/// A row of the `series` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRow {
    pub id: i64,
    pub name: String,
    pub sort: Option<String>,
}
impl Record for SeriesRow {
    const TABLE: Table = Table::Series;

    fn decode(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self { id: row.get("id")?, name: row.get("name")?, sort: row.get("sort")? })
    }
}
