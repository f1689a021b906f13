pub mod datetime;
mod author;
mod book;
mod data;
mod identifier;
mod link;
mod meta;

pub use self::author::{AuthorRow, SeriesRow};
pub use self::book::{BookRow, NewBook};
pub use self::data::DataRow;
pub use self::identifier::IdentifierRow;
pub use self::link::{AuthorLinkRow, SeriesLinkRow};
pub use self::meta::MetaRow;

use crate::table::Table;
use rusqlite::Row;
use time::OffsetDateTime;

/// A typed row of one catalog table, decoded from a `SELECT` of all of the
/// table's columns (see [`Table::columns`]).
pub trait Record: Sized {
    const TABLE: Table;

    fn decode(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Reads an optional column, treating a column absent from the result set
/// the same as `NULL`.
pub(crate) fn optional<T: rusqlite::types::FromSql>(row: &Row<'_>, name: &str) -> rusqlite::Result<Option<T>> {
    match row.as_ref().column_index(name) {
        Ok(idx) => row.get(idx),
        Err(_) => Ok(None),
    }
}

/// Reads a timestamp column stored as text.
///
/// Unparseable text is a decoding error rather than a silent `None`.
pub(crate) fn timestamp(row: &Row<'_>, name: &str) -> rusqlite::Result<Option<OffsetDateTime>> {
    let Some(text) = optional::<String>(row, name)? else {
        return Ok(None);
    };
    match datetime::parse(&text) {
        Some(dt) => Ok(Some(dt)),
        None if text.trim().is_empty() => Ok(None),
        None => {
            let idx = row.as_ref().column_index(name)?;
            Err(rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                format!("invalid timestamp: {text}").into(),
            ))
        },
    }
}
