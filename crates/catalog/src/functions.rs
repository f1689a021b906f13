//! Custom SQL functions the catalog schema depends on.
//!
//! The `meta` view calls `concat` and `sortconcat`, and the `books` triggers
//! call `title_sort` and `uuid4`. They must be registered on every connection
//! before the schema is touched, otherwise SQLite refuses to prepare any
//! statement that reaches the view or fires a trigger.
//!
//! Aggregate state lives in the accumulator SQLite hands to each group (see
//! [`Aggregate::init`]), so two groups evaluated by the same statement, or two
//! statements running at the same time, never share a buffer.

use rusqlite::functions::{Aggregate, Context, FunctionFlags};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, Error as SqlError, Result as SqlResult};
use std::collections::BTreeMap;

/// Separator used by `concat`.
pub const CONCAT_SEPARATOR: &str = ",";
/// Separator used by `sortconcat` (and therefore by the `authors` column of `meta`).
pub const SORTCONCAT_SEPARATOR: &str = " & ";

/// Leading articles moved to the end of a title by `title_sort`.
const ARTICLES: [&str; 3] = ["A", "An", "The"];

/// Registers all catalog functions on the given connection.
pub(crate) fn register(conn: &Connection) -> SqlResult<()> {
    let deterministic = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;
    conn.create_aggregate_function("concat", 1, deterministic, Concatenate)?;
    conn.create_aggregate_function("sortconcat", 2, deterministic, SortedConcatenate)?;
    conn.create_scalar_function("title_sort", 1, deterministic, |ctx| {
        Ok(ctx.get::<Option<String>>(0)?.map(|title| title_sort(&title)))
    })?;
    conn.create_scalar_function("uuid4", 0, FunctionFlags::SQLITE_UTF8, |_| Ok(uuid::Uuid::new_v4().to_string()))?;
    Ok(())
}

/// Reads an argument as text, skipping NULLs.
///
/// Numbers are rendered the way SQLite would cast them; blobs are rejected.
fn text_arg(ctx: &Context<'_>, idx: usize) -> SqlResult<Option<String>> {
    match ctx.get_raw(idx) {
        ValueRef::Null => Ok(None),
        ValueRef::Integer(i) => Ok(Some(i.to_string())),
        ValueRef::Real(f) => Ok(Some(f.to_string())),
        ValueRef::Text(bytes) => Ok(Some(String::from_utf8_lossy(bytes).into_owned())),
        ValueRef::Blob(_) => Err(SqlError::UserFunctionError("cannot concatenate a blob".into())),
    }
}

// =============================================================================
// concat(value)
// =============================================================================

/// `concat(value)`: joins every non-null value of the group with `,`, in the
/// order SQLite visits the rows. An empty group yields `NULL`.
pub struct Concatenate;
impl Aggregate<Vec<String>, Option<String>> for Concatenate {
    fn init(&self, _: &mut Context<'_>) -> SqlResult<Vec<String>> {
        Ok(Vec::new())
    }

    fn step(&self, ctx: &mut Context<'_>, acc: &mut Vec<String>) -> SqlResult<()> {
        if let Some(value) = text_arg(ctx, 0)? {
            acc.push(value);
        }
        Ok(())
    }

    fn finalize(&self, _: &mut Context<'_>, acc: Option<Vec<String>>) -> SqlResult<Option<String>> {
        Ok(acc.filter(|values| !values.is_empty()).map(|values| values.join(CONCAT_SEPARATOR)))
    }
}

// =============================================================================
// sortconcat(index, value)
// =============================================================================

/// `sortconcat(index, value)`: collects `index → value`, then joins the
/// values ordered by index with `" & "`. NULL values are ignored, and a
/// repeated index keeps the last non-null value seen. An empty group yields
/// `NULL`.
pub struct SortedConcatenate;
impl Aggregate<BTreeMap<i64, String>, Option<String>> for SortedConcatenate {
    fn init(&self, _: &mut Context<'_>) -> SqlResult<BTreeMap<i64, String>> {
        Ok(BTreeMap::new())
    }

    fn step(&self, ctx: &mut Context<'_>, acc: &mut BTreeMap<i64, String>) -> SqlResult<()> {
        let Some(index) = ctx.get::<Option<i64>>(0)? else {
            return Ok(());
        };
        let Some(value) = text_arg(ctx, 1)? else {
            return Ok(());
        };
        acc.insert(index, value);
        Ok(())
    }

    fn finalize(&self, _: &mut Context<'_>, acc: Option<BTreeMap<i64, String>>) -> SqlResult<Option<String>> {
        Ok(acc
            .filter(|values| !values.is_empty())
            .map(|values| values.into_values().collect::<Vec<_>>().join(SORTCONCAT_SEPARATOR)))
    }
}

// =============================================================================
// title_sort(title)
// =============================================================================

/// Moves a leading English article to the end of the title, so that
/// `"The Stand"` sorts as `"Stand, The"`.
pub fn title_sort(title: &str) -> String {
    let title = title.trim();
    for article in ARTICLES {
        if let Some(rest) = title.strip_prefix(article)
            && rest.starts_with(char::is_whitespace)
        {
            let rest = rest.trim_start();
            if !rest.is_empty() {
                return format!("{rest}, {article}");
            }
        }
    }
    title.to_string()
}
