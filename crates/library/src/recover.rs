//! Recovery from interrupted adds.
//!
//! The add pipeline commits the book row before any file is written and
//! attaches the files in a second transaction. A book stuck in between has
//! author links but an empty `path`.

use crate::error::{ErrorKind, Result};
use crate::fs::remove_book_folder;
use crate::template::{Layout, PathParams};
use bindery_catalog::{AuthorRow, BookRow, Catalog};
use exn::ResultExt;
use serde::Serialize;
use std::path::Path;
use tracing::{instrument, warn};

/// A book whose add stopped after the insert stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncompleteBook {
    pub id: i64,
    pub title: String,
}

#[instrument(level = "debug", skip_all)]
pub(crate) fn incomplete_books(catalog: &Catalog) -> Result<Vec<IncompleteBook>> {
    let books = catalog.incomplete_books().or_raise(|| ErrorKind::Catalog)?;
    Ok(books.into_iter().map(|b| IncompleteBook { id: b.id, title: b.title }).collect())
}

/// Removes incomplete books and whatever the pipeline already wrote for
/// them, returning the removed ids.
#[instrument(skip(catalog, layout), fields(root = %root.display()))]
pub(crate) fn repair(catalog: &Catalog, root: &Path, layout: &Layout) -> Result<Vec<i64>> {
    let books = catalog.incomplete_books().or_raise(|| ErrorKind::Catalog)?;
    let mut folders = Vec::new();
    for book in &books {
        warn!(id = book.id, title = %book.title, "Removing incomplete book");
        match partial_folder(catalog, root, layout, book) {
            Ok(folder) => folders.extend(folder),
            Err(err) => warn!(id = book.id, error = ?err, "Could not derive the folder of an incomplete book"),
        }
    }
    let ids = books.iter().map(|b| b.id).collect::<Vec<_>>();
    catalog.remove_books(&ids).or_raise(|| ErrorKind::Catalog)?;
    for folder in folders {
        remove_book_folder(root, &folder)?;
    }
    Ok(ids)
}

/// The folder the pipeline renders for the book, if it was created.
fn partial_folder(catalog: &Catalog, root: &Path, layout: &Layout, book: &BookRow) -> Result<Option<String>> {
    let links = catalog.author_links(book.id).or_raise(|| ErrorKind::Catalog)?;
    let Some(link) = links.first() else {
        return Ok(None);
    };
    let Some(author) = catalog.get::<AuthorRow>(link.author).or_raise(|| ErrorKind::Catalog)? else {
        return Ok(None);
    };
    let params = PathParams {
        id: book.id,
        title: &book.title,
        author: &author.name,
        author_sort: author.sort.as_deref().unwrap_or(&author.name),
    };
    let folder = layout.folder(&params)?;
    Ok(root.join(&folder).is_dir().then_some(folder))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{DEFAULT_FILE_TEMPLATE, DEFAULT_FOLDER_TEMPLATE};
    use bindery_catalog::{NewBook, Template};
    use std::fs;
    use tempfile::TempDir;

    fn layout() -> Layout {
        Layout::new(DEFAULT_FOLDER_TEMPLATE, DEFAULT_FILE_TEMPLATE).unwrap()
    }

    #[test]
    fn test_scan_and_repair() {
        let dir = TempDir::new().unwrap();
        let catalog = Template::materialize(dir.path()).unwrap();
        let complete = catalog.insert_book(&NewBook::new("Wool"), &[("Hugh Howey", None)]).unwrap();
        catalog.set_book_files(complete, "Hugh Howey/Wool (1)", false, time::OffsetDateTime::now_utc()).unwrap();
        let stuck = catalog.insert_book(&NewBook::new("Shift"), &[("Hugh Howey", None)]).unwrap();
        let partial = dir.path().join(format!("Hugh Howey/Shift ({stuck})"));
        fs::create_dir_all(&partial).unwrap();
        fs::write(partial.join("Shift - Hugh Howey.epub"), "half").unwrap();

        assert_eq!(incomplete_books(&catalog).unwrap(), vec![IncompleteBook { id: stuck, title: "Shift".into() }]);
        assert_eq!(repair(&catalog, dir.path(), &layout()).unwrap(), vec![stuck]);
        assert!(!partial.exists());
        assert!(incomplete_books(&catalog).unwrap().is_empty());
        assert_eq!(catalog.books().unwrap().len(), 1);
        // The author is kept, like any other removal.
        assert_eq!(catalog.authors().unwrap().len(), 1);
    }

    #[test]
    fn test_repair_without_partial_folder() {
        let dir = TempDir::new().unwrap();
        let catalog = Template::materialize(dir.path()).unwrap();
        let stuck = catalog.insert_book(&NewBook::new("Dust"), &[("Hugh Howey", None)]).unwrap();
        assert_eq!(repair(&catalog, dir.path(), &layout()).unwrap(), vec![stuck]);
        assert!(catalog.books().unwrap().is_empty());
    }
}
