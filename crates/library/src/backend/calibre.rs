use super::{Backend, BackendKind};
use crate::error::{ErrorKind, Result};
use crate::fields::{Field, Projection};
use crate::filter::{BookQuery, search_expression};
use crate::record::BookRecord;
use bindery_calibredb::{CalibreDb, ListOptions, ListedBook};
use exn::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Delegates every operation to a `calibredb` process.
pub(crate) struct CalibreBackend {
    db: CalibreDb,
}
impl CalibreBackend {
    pub(crate) fn open(root: &Path, executable: Option<PathBuf>) -> Result<Self> {
        let db = CalibreDb::with_executable(executable, root).or_raise(|| ErrorKind::CalibreDb)?;
        Ok(Self { db })
    }

    /// Clones the empty library `template` into `root` with `calibredb clone`.
    pub(crate) fn create(template: &Path, root: &Path, executable: Option<PathBuf>) -> Result<()> {
        CalibreDb::with_executable(executable, template)
            .and_then(|db| db.clone_to(root))
            .or_raise(|| ErrorKind::CalibreDb)?;
        Ok(())
    }
}

impl Backend for CalibreBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::CalibreDb
    }

    fn list_books(&self, query: &BookQuery) -> Result<Vec<BookRecord>> {
        let options = ListOptions {
            fields: query.projection.calibredb_fields(),
            limit: query.limit,
            sort_by: Some(Field::Id.name().to_string()),
            ascending: true,
            search: search_expression(&query.filters),
        };
        let listed = self.db.list(&options).or_raise(|| ErrorKind::CalibreDb)?;
        listed.into_iter().map(|book| from_listed(book, &query.projection)).collect()
    }

    fn add_books(&self, paths: &[PathBuf]) -> Result<Vec<i64>> {
        self.db.add(paths).or_raise(|| ErrorKind::CalibreDb)
    }

    fn remove_by_ids(&self, ids: &[i64]) -> Result<()> {
        self.db.remove(ids).or_raise(|| ErrorKind::CalibreDb)
    }

    fn list_authors(&self) -> Result<Vec<String>> {
        self.db.list_authors().or_raise(|| ErrorKind::CalibreDb)
    }
}

/// Applies the same projection and file policy as the catalog path.
fn from_listed(book: ListedBook, projection: &Projection) -> Result<BookRecord> {
    let want = |field| projection.contains(field);
    let title = book.title.ok_or_raise(|| ErrorKind::Decode("title"))?;
    let cover = match book.cover.filter(|_| want(Field::Cover)) {
        Some(path) if path.is_file() => Some(path),
        Some(path) => {
            warn!(book = book.id, path = %path.display(), "Cover is listed but missing on disk");
            None
        },
        None => None,
    };
    let formats = match want(Field::Formats) {
        true => {
            let formats = book.formats.unwrap_or_default();
            if let Some(path) = formats.iter().find(|path| !path.is_file()) {
                exn::bail!(ErrorKind::MissingFormat { book: book.id, path: path.clone() });
            }
            Some(formats)
        },
        false => None,
    };
    let size = match book.size.filter(|_| want(Field::Size)) {
        Some(size) => Some(i64::try_from(size).or_raise(|| ErrorKind::Decode("size"))?),
        None => None,
    };
    Ok(BookRecord {
        id: book.id,
        title,
        authors: book.authors.filter(|_| want(Field::Authors)),
        author_sort: book.author_sort.filter(|_| want(Field::AuthorSort)),
        cover,
        formats,
        series: book.series.filter(|_| want(Field::Series)),
        series_index: book.series_index.filter(|_| want(Field::SeriesIndex)),
        timestamp: book.timestamp.filter(|_| want(Field::Timestamp)),
        pubdate: book.pubdate.filter(|_| want(Field::Pubdate)),
        last_modified: book.last_modified.filter(|_| want(Field::LastModified)),
        isbn: book.isbn.filter(|_| want(Field::Isbn)),
        size,
    }
    .normalized())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use time::macros::datetime;

    fn listed(dir: &Path) -> ListedBook {
        ListedBook {
            id: 3,
            title: Some("Wool".into()),
            authors: Some("Hugh Howey".into()),
            cover: Some(dir.join("cover.jpg")),
            formats: Some(vec![dir.join("Wool.pdf"), dir.join("Wool.epub")]),
            timestamp: Some(datetime!(2024-01-30 10:11:12.75 UTC)),
            isbn: Some(String::new()),
            size: Some(42),
            ..ListedBook::default()
        }
    }

    #[test]
    fn test_from_listed_projects_and_normalizes() {
        let dir = TempDir::new().unwrap();
        for name in ["Wool.pdf", "Wool.epub"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let projection = Projection::new([Field::Formats, Field::Cover, Field::Timestamp, Field::Isbn, Field::Size]);
        let record = from_listed(listed(dir.path()), &projection).unwrap();
        assert_eq!(
            record,
            BookRecord {
                formats: Some(vec![dir.path().join("Wool.epub"), dir.path().join("Wool.pdf")]),
                timestamp: Some(datetime!(2024-01-30 10:11:12 UTC)),
                size: Some(42),
                ..BookRecord::new(3, "Wool")
            }
        );
    }

    #[test]
    fn test_from_listed_missing_format_is_hard() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Wool.epub"), "").unwrap();
        let err = from_listed(listed(dir.path()), &Projection::new([Field::Formats])).unwrap_err();
        assert!(matches!(&*err, ErrorKind::MissingFormat { book: 3, path } if *path == dir.path().join("Wool.pdf")));
    }

    #[test]
    fn test_from_listed_requires_title() {
        let book = ListedBook { id: 1, ..ListedBook::default() };
        let err = from_listed(book, &Projection::default()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Decode("title")));
    }
}
