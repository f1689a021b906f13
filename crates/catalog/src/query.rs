//! Equality-only `SELECT` building.

use crate::error::{ErrorKind, Result};
use crate::table::{Column, Table};
use rusqlite::types::Value;

/// A `WHERE` clause term. Terms are combined with `AND`.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column = ?`, compared with the column's declared collation.
    Eq(Column, Value),
    /// `column = ? COLLATE NOCASE`.
    EqNoCase(Column, Value),
    /// `column IN (?, ...)`. An empty list matches nothing.
    AnyOf(Column, Vec<Value>),
    /// The book has a linked author with this name (case-insensitive).
    ///
    /// Only valid on book-keyed tables (`books`, `meta`).
    HasAuthor(String),
}
impl Predicate {
    /// Shorthand for `Eq` on a column of `table`.
    pub fn eq(table: Table, column: &str, value: impl Into<Value>) -> Result<Self> {
        Ok(Self::Eq(Column::new(table, column)?, value.into()))
    }

    fn columns(&self) -> Option<&Column> {
        match self {
            Self::Eq(c, _) | Self::EqNoCase(c, _) | Self::AnyOf(c, _) => Some(c),
            Self::HasAuthor(_) => None,
        }
    }

    fn render(&self, table: Table, params: &mut Vec<Value>) -> Result<String> {
        Ok(match self {
            Self::Eq(column, value) => {
                params.push(value.clone());
                format!("{} = ?", column.qualified())
            },
            Self::EqNoCase(column, value) => {
                params.push(value.clone());
                format!("{} = ? COLLATE NOCASE", column.qualified())
            },
            Self::AnyOf(_, values) if values.is_empty() => "0".to_string(),
            Self::AnyOf(column, values) => {
                params.extend(values.iter().cloned());
                format!("{} IN ({})", column.qualified(), placeholders(values.len()))
            },
            Self::HasAuthor(name) => {
                if !table.is_book_keyed() {
                    exn::bail!(ErrorKind::UnsupportedPredicate(table.name()));
                }
                params.push(Value::Text(name.clone()));
                format!(
                    "EXISTS (SELECT 1 FROM books_authors_link AS bal JOIN authors ON (bal.author = authors.id) \
                     WHERE bal.book = {}.id AND authors.name = ? COLLATE NOCASE)",
                    table.name()
                )
            },
        })
    }
}

pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// SQL text plus the parameters to bind, in order.
#[derive(Debug)]
pub(crate) struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Builds `SELECT <columns> FROM <table> [JOIN ...] [WHERE ...] ORDER BY <table>.id [LIMIT ?]`.
///
/// An empty column list selects every column of `table`.
pub(crate) fn select(
    table: Table,
    columns: &[Column],
    predicates: &[Predicate],
    limit: Option<usize>,
) -> Result<Statement> {
    let columns = match columns.is_empty() {
        true => table.columns().iter().map(|name| Column { table, name: *name }).collect(),
        false => columns.to_vec(),
    };
    let mut joins: Vec<Table> = Vec::new();
    for other in columns.iter().chain(predicates.iter().filter_map(Predicate::columns)).map(|c| c.table) {
        if other != table && !joins.contains(&other) {
            joins.push(other);
        }
    }
    let mut sql = format!(
        "SELECT {} FROM {}",
        columns.iter().map(Column::qualified).collect::<Vec<_>>().join(", "),
        table.name()
    );
    for other in joins {
        let Some(on) = table.join_on(other) else {
            exn::bail!(ErrorKind::UnsupportedJoin { from: table.name(), to: other.name() });
        };
        sql.push_str(&format!(" JOIN {} ON ({on})", other.name()));
    }
    let mut params = Vec::new();
    if !predicates.is_empty() {
        let terms = predicates.iter().map(|p| p.render(table, &mut params)).collect::<Result<Vec<_>>>()?;
        sql.push_str(" WHERE ");
        sql.push_str(&terms.join(" AND "));
    }
    sql.push_str(&format!(" ORDER BY {}.id", table.name()));
    if let Some(limit) = limit {
        sql.push_str(" LIMIT ?");
        params.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
    }
    Ok(Statement { sql, params })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(table: Table, name: &str) -> Column {
        Column::new(table, name).unwrap()
    }

    #[test]
    fn test_select_all_columns() {
        let stmt = select(Table::Authors, &[], &[], None).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT authors.id, authors.name, authors.sort, authors.link FROM authors ORDER BY authors.id"
        );
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_select_with_filter_and_limit() {
        let stmt = select(
            Table::Meta,
            &[col(Table::Meta, "id"), col(Table::Meta, "title")],
            &[Predicate::Eq(col(Table::Meta, "id"), Value::Integer(2))],
            Some(5),
        )
        .unwrap();
        assert_eq!(stmt.sql, "SELECT meta.id, meta.title FROM meta WHERE meta.id = ? ORDER BY meta.id LIMIT ?");
        assert_eq!(stmt.params, vec![Value::Integer(2), Value::Integer(5)]);
    }

    #[test]
    fn test_meta_joins_books_when_needed() {
        let stmt = select(Table::Meta, &[col(Table::Meta, "id"), col(Table::Books, "last_modified")], &[], None)
            .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT meta.id, books.last_modified FROM meta JOIN books ON (books.id = meta.id) ORDER BY meta.id"
        );
    }

    #[test]
    fn test_unsupported_join() {
        let err = select(Table::Authors, &[col(Table::Books, "id")], &[], None).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedJoin { .. }));
    }

    #[test]
    fn test_has_author_requires_book_table() {
        let err = select(Table::Series, &[], &[Predicate::HasAuthor("x".into())], None).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedPredicate("series")));
    }

    #[test]
    fn test_empty_any_of_matches_nothing() {
        let stmt = select(Table::Data, &[], &[Predicate::AnyOf(col(Table::Data, "book"), vec![])], None).unwrap();
        assert!(stmt.sql.contains("WHERE 0 ORDER BY"));
    }
}
