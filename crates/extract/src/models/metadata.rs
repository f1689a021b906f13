use super::{Cover, Creator};
use std::path::Path;
use time::Date;

/// Top-level metadata of a single e-book file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Metadata {
    /// Book title (falls back to the file stem)
    pub title: String,
    /// Credited authors, in document order (may be empty)
    pub authors: Vec<Creator>,
    /// Publication date (`dc:date`)
    pub published: Option<Date>,
    /// ISBN without any `urn:isbn:` prefix or separators
    pub isbn: Option<String>,
    /// Language code (`dc:language`)
    pub language: Option<String>,
    pub cover: Option<Cover>,
}
impl Metadata {
    /// Metadata derived from nothing but the file name.
    pub fn from_file_name(path: impl AsRef<Path>) -> Self {
        Self {
            title: file_stem(path.as_ref()).unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Fill gaps left by the document from the file name.
    pub(crate) fn with_file_name_fallback(mut self, path: &Path) -> Self {
        if self.title.is_empty() {
            self.title = file_stem(path).unwrap_or_default();
        }
        self
    }
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().and_then(|stem| super::non_empty(stem.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_file_name_uses_stem() {
        let metadata = Metadata::from_file_name("/books/Wool Omnibus.pdf");
        assert_eq!(metadata.title, "Wool Omnibus");
        assert!(metadata.authors.is_empty());
        assert_eq!(metadata.cover, None);
    }

    #[test]
    fn test_fallback_keeps_document_title() {
        let metadata = Metadata { title: "Shift".into(), ..Metadata::default() };
        let metadata = metadata.with_file_name_fallback(Path::new("/books/other.epub"));
        assert_eq!(metadata.title, "Shift");
    }
}
