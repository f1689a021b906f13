//! Top-level metadata extraction for e-book files.
//!
//! EPUB files are opened as ZIP archives: the container document points at
//! the OPF package, whose `<metadata>` block provides title, creators, date,
//! identifiers and the cover image reference. Any other format is catalogued
//! from its file name alone.

mod epub;
pub mod error;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod models;
mod opf;

use std::path::Path;
use tracing::instrument;

use crate::error::Result;
pub use crate::models::{Cover, Creator, Metadata};

/// Lowercase file extension, used as the format name.
pub fn format_of(path: impl AsRef<Path>) -> Option<String> {
    let ext = path.as_ref().extension()?.to_str()?;
    (!ext.is_empty()).then(|| ext.to_ascii_lowercase())
}

/// Easy, top-level entrypoint for reading [`Metadata`] from an e-book file.
///
/// The title falls back to the file stem when the document does not carry
/// one, and files in unsupported formats get nothing but that fallback.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn read(path: impl AsRef<Path>) -> Result<Metadata> {
    let path = path.as_ref();
    match format_of(path).as_deref() {
        Some("epub") => Ok(epub::read(path)?.with_file_name_fallback(path)),
        _ => Ok(Metadata::from_file_name(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::EpubBuilder;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("/a/Book.EPUB", Some("epub"))]
    #[case("/a/book.azw3", Some("azw3"))]
    #[case("/a/book", None)]
    fn test_format_of(#[case] path: &str, #[case] expected: Option<&str>) {
        assert_eq!(format_of(path).as_deref(), expected);
    }

    #[test]
    fn test_read_unsupported_format_uses_file_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Shift.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        let metadata = read(&path).unwrap();
        assert_eq!(metadata.title, "Shift");
        assert!(metadata.authors.is_empty());
    }

    #[test]
    fn test_read_epub_without_title_uses_file_name() {
        let dir = TempDir::new().unwrap();
        let path = EpubBuilder::new("").write_to(dir.path().join("Untitled Draft.epub")).unwrap();
        let metadata = read(&path).unwrap();
        assert_eq!(metadata.title, "Untitled Draft");
    }
}
