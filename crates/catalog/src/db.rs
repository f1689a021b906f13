//! Catalog connection and generic row operations.

use crate::error::{ErrorKind, Result};
use crate::functions;
use crate::models::Record;
use crate::query::{self, Predicate, placeholders};
use crate::table::{Column, Table};
use crate::template::Template;
use exn::{OptionExt, ResultExt};
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, Row, params_from_iter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;

// The external tool may hold the file briefly while it writes; wait for it
// rather than failing immediately with SQLITE_BUSY.
const BUSY_TIMEOUT: Duration = Duration::from_millis(1500);

/// A single connection to a catalog file (`metadata.db`).
///
/// There is no internal locking: the connection is owned by one instance and
/// every call runs synchronously on it.
#[derive(Debug)]
pub struct Catalog {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Catalog {
    fn new(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        // Functions first: the view and the triggers refer to them.
        functions::register(&conn).or_raise(|| ErrorKind::Database)?;
        conn.busy_timeout(BUSY_TIMEOUT).or_raise(|| ErrorKind::Database)?;
        Ok(Self { conn, path })
    }

    /// Opens an existing catalog file.
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags).or_raise(|| ErrorKind::Database)?;
        Self::new(conn, Some(path.to_path_buf()))
    }

    /// Creates a new, empty catalog file from the bundled template.
    ///
    /// Fails if anything already exists at `path`.
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            exn::bail!(ErrorKind::AlreadyExists(path.to_path_buf()));
        }
        let catalog = Self::new(Connection::open(path).or_raise(|| ErrorKind::Database)?, Some(path.to_path_buf()))?;
        catalog.apply_schema()?;
        tracing::info!(path = %path.display(), "Created empty catalog");
        Ok(catalog)
    }

    /// Opens an in-memory catalog with the template schema.
    ///
    /// Note: do NOT apply `#[cfg(test)]` so that other crates can also use
    /// this in their tests.
    pub fn open_in_memory() -> Result<Self> {
        let catalog = Self::new(Connection::open_in_memory().or_raise(|| ErrorKind::Database)?, None)?;
        catalog.apply_schema()?;
        Ok(catalog)
    }

    fn apply_schema(&self) -> Result<()> {
        let schema = Template::schema()?;
        self.conn.execute_batch(&schema).or_raise(|| ErrorKind::Template)
    }

    /// Location of the catalog file, `None` for in-memory catalogs.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The underlying connection, for queries this crate does not model.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Runs `f` inside a transaction, committing if it succeeds.
    ///
    /// Row operations called from `f` join the transaction; they do not open
    /// one of their own.
    pub fn transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction().or_raise(|| ErrorKind::Database)?;
        let value = f(self)?;
        tx.commit().or_raise(|| ErrorKind::Database)?;
        Ok(value)
    }

    // =========================================================================
    // Select
    // =========================================================================

    /// Lists rows of `table`, ordered by `id`.
    ///
    /// `columns` selects (in order) what `decode` will see; an empty slice
    /// selects every column of the table. Columns of other tables are only
    /// allowed where the catalog knows how to join them (`books` onto `meta`).
    #[instrument(level = "debug", skip(self, columns, predicates, decode))]
    pub fn list_rows<T>(
        &self,
        table: Table,
        columns: &[Column],
        predicates: &[Predicate],
        limit: Option<usize>,
        decode: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        let stmt = query::select(table, columns, predicates, limit)?;
        tracing::trace!(sql = %stmt.sql, "Executing catalog query");
        let mut prepared = self.conn.prepare(&stmt.sql).or_raise(|| ErrorKind::Database)?;
        let rows = prepared.query_map(params_from_iter(stmt.params.iter()), decode).or_raise(|| ErrorKind::Database)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().or_raise(|| ErrorKind::InvalidData(table.name()))
    }

    /// Lists typed records of `R::TABLE`, ordered by `id`.
    pub fn list<R: Record>(&self, predicates: &[Predicate]) -> Result<Vec<R>> {
        self.list_rows(R::TABLE, &[], predicates, None, R::decode)
    }

    /// Fetches a typed record by `id`.
    pub fn get<R: Record>(&self, id: i64) -> Result<Option<R>> {
        let predicate = Predicate::eq(R::TABLE, "id", id)?;
        Ok(self.list::<R>(&[predicate])?.into_iter().next())
    }

    /// Finds the id of the first row whose `field` equals `value`.
    ///
    /// Comparison follows the column's declared collation, so names (declared
    /// `COLLATE NOCASE`) match regardless of case.
    pub fn lookup_id(&self, table: Table, field: &str, value: impl Into<Value>) -> Result<Option<i64>> {
        self.lookup_id_by(table, &[(field, value.into())])
    }

    /// Multi-column form of [`lookup_id`](Self::lookup_id); all pairs must match.
    pub fn lookup_id_by(&self, table: Table, pairs: &[(&str, Value)]) -> Result<Option<i64>> {
        let predicates = pairs
            .iter()
            .map(|(field, value)| Predicate::eq(table, field, value.clone()))
            .collect::<Result<Vec<_>>>()?;
        let id = Column::new(table, "id")?;
        let ids = self.list_rows(table, &[id], &predicates, Some(1), |row| row.get::<_, i64>(0))?;
        Ok(ids.into_iter().next())
    }

    // =========================================================================
    // Insert / Update / Delete
    // =========================================================================

    /// Inserts a row, or resolves the existing one if it would violate the
    /// table's unique key. Either way the row's id is returned.
    #[instrument(level = "debug", skip(self, values))]
    pub fn insert_row(&self, table: Table, columns: &[&str], values: &[Value]) -> Result<i64> {
        if !table.is_writable() {
            exn::bail!(ErrorKind::ReadOnly(table.name()));
        }
        if columns.len() != values.len() {
            exn::bail!(ErrorKind::LengthMismatch { columns: columns.len(), values: values.len() });
        }
        let names = columns.iter().map(|c| table.check(c)).collect::<Result<Vec<_>>>()?;
        let sql = match names.is_empty() {
            true => format!("INSERT OR IGNORE INTO {table} DEFAULT VALUES"),
            false => format!(
                "INSERT OR IGNORE INTO {table} ({}) VALUES ({})",
                names.join(", "),
                placeholders(names.len())
            ),
        };
        let inserted = self.conn.execute(&sql, params_from_iter(values.iter())).or_raise(|| ErrorKind::Database)?;
        if inserted > 0 {
            return Ok(self.conn.last_insert_rowid());
        }
        // Ignored: find the row that owns the unique key instead.
        let key = table
            .unique_key()
            .iter()
            .map(|k| {
                names
                    .iter()
                    .position(|n| n == k)
                    .map(|idx| (*k, values[idx].clone()))
                    .ok_or_raise(|| ErrorKind::InvalidData("unique key"))
            })
            .collect::<Result<Vec<_>>>()?;
        if key.is_empty() {
            exn::bail!(ErrorKind::InvalidData("row rejected"));
        }
        self.lookup_id_by(table, &key)?.ok_or_raise(|| ErrorKind::InvalidData("row rejected"))
    }

    /// Sets `columns` to `values` on the row with the given id.
    ///
    /// Empty `columns` and `values` is a no-op.
    #[instrument(level = "debug", skip(self, values))]
    pub fn update_row(&self, table: Table, id: i64, columns: &[&str], values: &[Value]) -> Result<()> {
        if columns.len() != values.len() {
            exn::bail!(ErrorKind::LengthMismatch { columns: columns.len(), values: values.len() });
        }
        if columns.is_empty() {
            return Ok(());
        }
        if !table.is_writable() {
            exn::bail!(ErrorKind::ReadOnly(table.name()));
        }
        let assignments = columns
            .iter()
            .map(|c| table.check(c).map(|name| format!("{name} = ?")))
            .collect::<Result<Vec<_>>>()?;
        let sql = format!("UPDATE {table} SET {} WHERE id = ?", assignments.join(", "));
        let params = values.iter().cloned().chain([Value::Integer(id)]);
        self.conn.execute(&sql, params_from_iter(params)).or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Deletes every row matching all predicates and returns how many went.
    ///
    /// At least one predicate is required.
    #[instrument(level = "debug", skip(self, predicates))]
    pub fn delete_rows(&self, table: Table, predicates: &[Predicate]) -> Result<usize> {
        if !table.is_writable() {
            exn::bail!(ErrorKind::ReadOnly(table.name()));
        }
        if predicates.is_empty() {
            exn::bail!(ErrorKind::UnsupportedPredicate(table.name()));
        }
        // Reuse the SELECT builder for the WHERE clause: the id subquery keeps
        // joins and `HasAuthor` working for deletes too.
        let id = Column::new(table, "id")?;
        let select = query::select(table, &[id], predicates, None)?;
        let sql = format!("DELETE FROM {table} WHERE id IN ({})", select.sql);
        self.conn.execute(&sql, params_from_iter(select.params.iter())).or_raise(|| ErrorKind::Database)
    }
}
