use super::Record;
use crate::table::Table;
use rusqlite::Row;

/// An external identifier of a book (`isbn`, `asin`, ...). One per kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierRow {
    pub id: i64,
    pub book: i64,
    /// Lowercase identifier kind, stored in the `type` column.
    pub kind: String,
    pub value: String,
}
impl Record for IdentifierRow {
    const TABLE: Table = Table::Identifiers;

    fn decode(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self { id: row.get("id")?, book: row.get("book")?, kind: row.get("type")?, value: row.get("val")? })
    }
}
