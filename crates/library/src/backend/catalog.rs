use super::{Backend, BackendKind};
use crate::error::{ErrorKind, Result};
use crate::filter::BookQuery;
use crate::fs::remove_book_folder;
use crate::record::BookRecord;
use crate::template::Layout;
use crate::{add, aggregate};
use bindery_catalog::{CATALOG_FILE, Catalog, Column, Table, Template};
use exn::ResultExt;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Reads and writes `metadata.db` directly.
pub(crate) struct CatalogBackend {
    root: PathBuf,
    catalog: Catalog,
    layout: Layout,
}
impl CatalogBackend {
    pub(crate) fn open(root: &Path, layout: Layout) -> Result<Self> {
        let catalog = Catalog::open(root.join(CATALOG_FILE)).or_raise(|| ErrorKind::Catalog)?;
        Ok(Self { root: root.to_path_buf(), catalog, layout })
    }

    /// Materializes the empty template into `root`.
    pub(crate) fn create(root: &Path) -> Result<()> {
        Template::materialize(root).or_raise(|| ErrorKind::Catalog)?;
        Ok(())
    }
}

impl Backend for CatalogBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Catalog
    }

    fn list_books(&self, query: &BookQuery) -> Result<Vec<BookRecord>> {
        aggregate::list_books(&self.catalog, &self.root, query)
    }

    fn add_books(&self, paths: &[PathBuf]) -> Result<Vec<i64>> {
        paths.iter().map(|path| add::add_book(&self.catalog, &self.root, &self.layout, path)).collect()
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    fn remove_by_ids(&self, ids: &[i64]) -> Result<()> {
        let removed = self.catalog.remove_books(ids).or_raise(|| ErrorKind::Catalog)?;
        for book in removed.iter().filter(|b| !b.path.is_empty()) {
            remove_book_folder(&self.root, &book.path)?;
        }
        info!(removed = removed.len(), "Removed books");
        Ok(())
    }

    fn list_authors(&self) -> Result<Vec<String>> {
        let column = Column::new(Table::Meta, "authors").or_raise(|| ErrorKind::Catalog)?;
        let rows = self.catalog.meta(&[column], &[], None).or_raise(|| ErrorKind::Catalog)?;
        let mut authors: Vec<String> = Vec::new();
        for name in rows.iter().filter_map(|r| r.authors.as_deref()).flat_map(|a| a.split(" & ")) {
            if !authors.iter().any(|a| a == name) {
                authors.push(name.to_string());
            }
        }
        Ok(authors)
    }

    fn catalog(&self) -> Option<&Catalog> {
        Some(&self.catalog)
    }
}
