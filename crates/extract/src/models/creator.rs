use std::fmt::{Display, Formatter, Result as FmtResult};
use std::{convert::Infallible, str::FromStr};

/// A person credited as an author of the book.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Creator {
    /// Display name, e.g. "Hugh Howey"
    pub name: String,
    /// Sort form, e.g. "Howey, Hugh" (`opf:file-as` or an EPUB 3 refinement)
    pub file_as: Option<String>,
}
impl Creator {
    pub fn new<F: AsRef<str>>(name: impl AsRef<str>, file_as: Option<F>) -> Self {
        Self {
            name: name.as_ref().trim().to_string(),
            file_as: file_as.and_then(super::non_empty),
        }
    }

    /// The name to sort by, falling back to the display name.
    pub fn sort_name(&self) -> &str {
        self.file_as.as_deref().unwrap_or(&self.name)
    }
}

impl FromStr for Creator {
    type Err = Infallible;
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(name, None::<&str>))
    }
}
impl From<&str> for Creator {
    fn from(name: &str) -> Self {
        Self::new(name, None::<&str>)
    }
}
impl<N: AsRef<str>, F: AsRef<str>> From<(N, Option<F>)> for Creator {
    fn from((name, file_as): (N, Option<F>)) -> Self {
        Self::new(name, file_as)
    }
}

impl Display for Creator {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.name)
    }
}
