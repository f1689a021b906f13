//! The bundled empty library.
//!
//! The template folder is embedded into the binary with [`rust-embed`](rust_embed).
//! It holds the full catalog schema of an empty calibre library as SQL
//! (instead of a binary `metadata.db`) plus the other files a fresh library
//! folder starts with. Every table the external tool reads on open
//! (`preferences`, `custom_columns`, `identifiers`, ...) is created, and the
//! schema version is stamped so the tool finds nothing to upgrade.

use crate::db::Catalog;
use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use rust_embed::Embed;
use std::borrow::Cow;
use std::fs;
use std::path::Path;
use tracing::instrument;

/// File name of the catalog inside a library folder.
pub const CATALOG_FILE: &str = "metadata.db";
/// Template entry holding the catalog schema.
const SCHEMA_FILE: &str = "metadata_sqlite.sql";
/// `PRAGMA user_version` stamped by the bundled schema.
pub const SCHEMA_VERSION: i64 = 26;

#[derive(Embed)]
#[folder = "template/"]
pub struct Template;
impl Template {
    /// The catalog schema (tables, indexes, triggers and the `meta` view).
    pub fn schema() -> Result<Cow<'static, str>> {
        let file = Self::get(SCHEMA_FILE).ok_or_raise(|| ErrorKind::Template)?;
        match file.data {
            Cow::Borrowed(bytes) => std::str::from_utf8(bytes).map(Cow::Borrowed).or_raise(|| ErrorKind::Template),
            Cow::Owned(bytes) => String::from_utf8(bytes).map(Cow::Owned).or_raise(|| ErrorKind::Template),
        }
    }

    /// Writes an empty library into `dir`, which must not contain a catalog yet.
    ///
    /// The schema becomes `metadata.db`; every other bundled file is copied
    /// verbatim. Returns the open catalog.
    #[instrument(level = "debug", skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn materialize(dir: impl AsRef<Path>) -> Result<Catalog> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).or_raise(|| ErrorKind::Template)?;
        let catalog = Catalog::create(dir.join(CATALOG_FILE))?;
        for name in Self::iter().filter(|name| name != SCHEMA_FILE) {
            let file = Self::get(&name).ok_or_raise(|| ErrorKind::Template)?;
            fs::write(dir.join(name.as_ref()), file.data).or_raise(|| ErrorKind::Template)?;
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_schema_defines_meta_view() {
        let schema = Template::schema().unwrap();
        assert!(schema.contains("CREATE VIEW meta"));
    }

    #[test]
    fn test_materialize_writes_library_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("Library");
        let catalog = Template::materialize(&root).unwrap();
        assert_eq!(catalog.path(), Some(root.join(CATALOG_FILE).as_path()));
        assert!(root.join("metadata_db_prefs_backup.json").is_file());
        assert!(!root.join(SCHEMA_FILE).exists());
    }

    #[test]
    fn test_materialized_catalog_is_a_complete_library() {
        let dir = TempDir::new().unwrap();
        let catalog = Template::materialize(dir.path()).unwrap();
        let conn = catalog.connection();
        let version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0)).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'").unwrap();
        let tables: Vec<String> = stmt.query_map([], |r| r.get(0)).unwrap().collect::<rusqlite::Result<_>>().unwrap();
        for table in [
            "preferences",
            "tags",
            "publishers",
            "identifiers",
            "comments",
            "ratings",
            "languages",
            "custom_columns",
            "library_id",
            "books_plugin_data",
            "conversion_options",
            "annotations",
        ] {
            assert!(tables.iter().any(|t| t == table), "missing table {table}");
        }
    }

    #[test]
    fn test_materialize_refuses_existing_catalog() {
        let dir = TempDir::new().unwrap();
        Template::materialize(dir.path()).unwrap();
        assert!(Template::materialize(dir.path()).is_err());
    }
}
