//! The library folder and its lifecycle.

use crate::aggregate::{self, AggregatedBook};
use crate::backend::{Backend, BackendKind, CalibreBackend, CatalogBackend};
use crate::error::{ErrorKind, Result};
use crate::filter::BookQuery;
use crate::fs::{copy_dir, is_vacant};
use crate::record::BookRecord;
use crate::recover::{self, IncompleteBook};
use crate::template::{DEFAULT_FILE_TEMPLATE, DEFAULT_FOLDER_TEMPLATE, Layout};
use bindery_catalog::{CATALOG_FILE, Catalog, Template};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Folder and file name templates for newly added books.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutTemplates {
    pub folder: String,
    pub file: String,
}
impl Default for LayoutTemplates {
    fn default() -> Self {
        Self { folder: DEFAULT_FOLDER_TEMPLATE.to_string(), file: DEFAULT_FILE_TEMPLATE.to_string() }
    }
}
impl LayoutTemplates {
    pub fn compile(&self) -> Result<Layout> {
        Layout::new(&self.folder, &self.file)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryOptions {
    /// Path of the `calibredb` executable; discovered when `None`.
    pub calibredb: Option<PathBuf>,
    pub layout: LayoutTemplates,
}

/// A library folder (`metadata.db` plus book folders) and the backend used
/// to operate on it.
///
/// One writer per instance: the type is [`Send`] but not [`Sync`].
pub struct Library {
    root: PathBuf,
    options: LibraryOptions,
    backend: Box<dyn Backend>,
}

impl Debug for Library {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Library").field("root", &self.root).field("kind", &self.kind()).finish()
    }
}

impl Library {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Opens an existing library with default options.
    pub fn open(path: impl AsRef<Path>, kind: BackendKind) -> Result<Self> {
        Self::open_with(path, kind, LibraryOptions::default())
    }

    /// Opens an existing library. The folder must contain `metadata.db`.
    ///
    /// Books left behind by an interrupted add are reported as warnings;
    /// see [`Library::repair`].
    #[instrument(skip(path, options), fields(path = %path.as_ref().display()))]
    pub fn open_with(path: impl AsRef<Path>, kind: BackendKind, options: LibraryOptions) -> Result<Self> {
        let path = path.as_ref();
        if !path.join(CATALOG_FILE).is_file() {
            exn::bail!(ErrorKind::LibraryNotFound(path.to_path_buf()));
        }
        let root = path.canonicalize().or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
        let backend: Box<dyn Backend> = match kind {
            BackendKind::Catalog => Box::new(CatalogBackend::open(&root, options.layout.compile()?)?),
            BackendKind::CalibreDb => Box::new(CalibreBackend::open(&root, options.calibredb.clone())?),
        };
        let library = Self { root, options, backend };
        let incomplete = library.incomplete_books()?;
        if !incomplete.is_empty() {
            let ids = incomplete.iter().map(|b| b.id).collect::<Vec<_>>();
            warn!(?ids, "Library has books whose add was interrupted");
        }
        Ok(library)
    }

    /// Creates an empty library at `path` with default options.
    pub fn new_empty(path: impl AsRef<Path>, kind: BackendKind) -> Result<Self> {
        Self::new_empty_with(path, kind, LibraryOptions::default())
    }

    /// Creates an empty library at `path`, which must be missing or empty.
    ///
    /// The catalog backend writes the bundled template directly; the
    /// calibredb backend writes it to a temporary folder and lets
    /// `calibredb clone` create the library from there.
    #[instrument(skip(path, options), fields(path = %path.as_ref().display()))]
    pub fn new_empty_with(path: impl AsRef<Path>, kind: BackendKind, options: LibraryOptions) -> Result<Self> {
        let path = path.as_ref();
        if !is_vacant(path)? {
            exn::bail!(ErrorKind::AlreadyExists(path.to_path_buf()));
        }
        match kind {
            BackendKind::Catalog => CatalogBackend::create(path)?,
            BackendKind::CalibreDb => {
                let staging = tempfile::tempdir().or_raise(|| ErrorKind::Io(std::env::temp_dir()))?;
                let template = staging.path().join("template");
                Template::materialize(&template).or_raise(|| ErrorKind::Catalog)?;
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).or_raise(|| ErrorKind::Io(parent.to_path_buf()))?;
                }
                CalibreBackend::create(&template, path, options.calibredb.clone())?;
            },
        }
        info!(path = %path.display(), %kind, "Created empty library");
        Self::open_with(path, kind, options)
    }

    /// Copies the whole library folder to `path` and opens the copy with the
    /// same backend. The two libraries are independent afterwards.
    #[instrument(skip(self, path), fields(root = %self.root.display(), path = %path.as_ref().display()))]
    pub fn clone_to(&self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !is_vacant(path)? {
            exn::bail!(ErrorKind::AlreadyExists(path.to_path_buf()));
        }
        let files = copy_dir(&self.root, path)?;
        info!(files, "Cloned library");
        Self::open_with(path, self.kind(), self.options.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    // =========================================================================
    // Books
    // =========================================================================

    /// Adds e-book files and returns the new ids, in order.
    #[instrument(skip_all, fields(root = %self.root.display(), files = paths.len()))]
    pub fn add_books(&self, paths: &[PathBuf]) -> Result<Vec<i64>> {
        self.backend.add_books(paths)
    }

    /// Removes books, their files and their folders. Authors and series are
    /// kept even when no book refers to them any more.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn remove_by_ids(&self, ids: &[i64]) -> Result<()> {
        self.backend.remove_by_ids(ids)
    }

    pub fn remove_books(&self, books: &[BookRecord]) -> Result<()> {
        self.remove_by_ids(&books.iter().map(|b| b.id).collect::<Vec<_>>())
    }

    /// Books matching the query, ordered by id.
    #[instrument(skip_all, fields(root = %self.root.display(), kind = %self.kind()))]
    pub fn list_books(&self, query: &BookQuery) -> Result<Vec<BookRecord>> {
        self.backend.list_books(query)
    }

    /// Every book, aggregated from the explicit catalog rows.
    ///
    /// Always reads `metadata.db` directly, whatever the backend.
    pub fn list_books_structured(&self) -> Result<Vec<AggregatedBook>> {
        self.with_catalog(|catalog| aggregate::list_books_structured(catalog, &self.root))
    }

    /// Distinct author names of the library's books, in first-seen order.
    pub fn list_authors(&self) -> Result<Vec<String>> {
        self.backend.list_authors()
    }

    // =========================================================================
    // Recovery
    // =========================================================================

    /// Books whose add stopped after the insert stage.
    pub fn incomplete_books(&self) -> Result<Vec<IncompleteBook>> {
        self.with_catalog(recover::incomplete_books)
    }

    /// Removes incomplete books and their partially written folders,
    /// returning the removed ids.
    pub fn repair(&self) -> Result<Vec<i64>> {
        let layout = self.options.layout.compile()?;
        self.with_catalog(|catalog| recover::repair(catalog, &self.root, &layout))
    }

    fn with_catalog<T>(&self, f: impl FnOnce(&Catalog) -> Result<T>) -> Result<T> {
        match self.backend.catalog() {
            Some(catalog) => f(catalog),
            None => f(&Catalog::open(self.root.join(CATALOG_FILE)).or_raise(|| ErrorKind::Catalog)?),
        }
    }
}
