//! Path templating for the library folder layout.
//!
//! Converts book metadata into deterministic relative paths using [upon]
//! templates. The syntax follows upon's Mustache-like conventions
//! (`{{ variable }}`, `{{ value|function }}`), extended with:
//!
//! - **`ascii`**: transliterates to ASCII and replaces characters that are
//!   unsafe in file names, the way the external catalog tool names folders.
//! - **`truncate`**: shortens a name to at most `n` bytes without splitting a
//!   character and drops the trailing spaces and dots left behind, as
//!   `{{ value|truncate: n }}`.
//!
//! # Template Variables
//!
//! | Variable      | Type     | Description                                 |
//! |---------------|----------|---------------------------------------------|
//! | `id`          | `i64`    | Catalog book id                             |
//! | `title`       | `String` | Book title                                  |
//! | `author`      | `String` | First author's display name                 |
//! | `author_sort` | `String` | First author's sort name                    |
//!
//! # Example
//!
//! ```
//! use bindery_library::{PathGenerator, PathParams};
//!
//! let generator: PathGenerator = "{{ author|ascii }}/{{ title|ascii }} ({{ id }})".parse().unwrap();
//! let params = PathParams { id: 7, title: "Über/Alles", author: "Émile Zola", author_sort: "Zola, Émile" };
//! assert_eq!(generator.generate(&params).unwrap(), "Emile Zola/Uber_Alles (7)");
//! ```

use crate::error::{Error, ErrorKind, Result};
use crate::path::validate;
use exn::{OptionExt, ResultExt};
use std::str::FromStr;
use tracing::instrument;
use upon::{Engine, Template};

/// Default book folder, relative to the library root.
pub const DEFAULT_FOLDER_TEMPLATE: &str = "{{ author|ascii|truncate: 100 }}/{{ title|ascii|truncate: 100 }} ({{ id }})";
/// Default file name of a stored format, without extension.
pub const DEFAULT_FILE_TEMPLATE: &str = "{{ title|ascii|truncate: 100 }} - {{ author|ascii|truncate: 100 }}";

/// Values exposed to a layout template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathParams<'a> {
    pub id: i64,
    pub title: &'a str,
    pub author: &'a str,
    pub author_sort: &'a str,
}

/// Generates deterministic relative paths from a user-defined template.
///
/// Constructed via [`FromStr`], which compiles the template eagerly so that
/// syntax errors surface at creation time rather than at render time.
pub struct PathGenerator {
    engine: Engine<'static>,
    template: Template<'static>,
}
impl FromStr for PathGenerator {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut engine = Engine::new();
        addons::configure(&mut engine);
        let template = engine.compile(s.to_string()).or_raise(|| ErrorKind::Template)?;
        Ok(Self { engine, template })
    }
}
impl PathGenerator {
    /// Renders the template, returning a normalized relative path that is
    /// guaranteed to stay inside the library root.
    #[instrument(level = "debug", skip_all, fields(id = params.id))]
    pub fn generate(&self, params: &PathParams<'_>) -> Result<String> {
        let path = self
            .template
            .render(
                &self.engine,
                upon::value! {
                    id: params.id,
                    title: params.title,
                    author: params.author,
                    author_sort: params.author_sort,
                },
            )
            .to_string()
            .or_raise(|| ErrorKind::Template)?;
        Self::normalize(path)
    }

    /// Trims each path segment, joins them with `/`, then validates.
    fn normalize(s: impl Into<String>) -> Result<String> {
        let path = s.into().trim().split('/').map(str::trim).collect::<Vec<_>>().join("/");
        let path = validate(&path)?;
        path.to_str().map(|p| p.to_string()).ok_or_raise(|| ErrorKind::Template)
    }
}

/// The pair of templates placing a newly added book in the library.
pub struct Layout {
    folder: PathGenerator,
    file: PathGenerator,
}
impl Layout {
    pub fn new(folder: &str, file: &str) -> Result<Self> {
        Ok(Self { folder: folder.parse()?, file: file.parse()? })
    }

    /// The book folder, relative to the library root.
    pub fn folder(&self, params: &PathParams<'_>) -> Result<String> {
        self.folder.generate(params)
    }

    /// The file name (without extension) of every format of the book.
    pub fn file_stem(&self, params: &PathParams<'_>) -> Result<String> {
        let stem = self.file.generate(params)?;
        if stem.contains('/') {
            exn::bail!(ErrorKind::InvalidPath(stem.into()));
        }
        Ok(stem)
    }
}

/// Custom [`upon`] extensions for path-safe string manipulation.
mod addons {
    use deunicode::deunicode;
    use upon::Engine;

    /// Characters the external catalog tool never puts in file names.
    const UNSAFE: &[char] = &['/', '\\', '?', '<', '>', ':', '*', '|', '"'];

    /// Transliterates to ASCII and replaces unsafe characters with `_`.
    ///
    /// Leading dots are replaced too so that no hidden files are produced;
    /// an empty result becomes `Unknown`.
    pub(super) fn ascii(s: &str) -> String {
        let ascii: String = deunicode(s)
            .chars()
            .map(|c| if UNSAFE.contains(&c) || c.is_ascii_control() { '_' } else { c })
            .collect();
        let ascii = ascii.trim();
        let dots = ascii.len() - ascii.trim_start_matches('.').len();
        let ascii = format!("{}{}", "_".repeat(dots), &ascii[dots..]);
        match ascii.is_empty() {
            true => "Unknown".to_string(),
            false => ascii,
        }
    }

    /// Shortens a name to at most `max` bytes without splitting a character.
    ///
    /// Trailing spaces and dots are dropped afterwards: a cut can expose
    /// them, and some filesystems reject names ending in either.
    pub(super) fn truncate(name: &str, max: usize) -> String {
        let end = name
            .char_indices()
            .map(|(start, c)| start + c.len_utf8())
            .take_while(|end| *end <= max)
            .last()
            .unwrap_or(0);
        name[..end].trim_end_matches([' ', '.']).to_string()
    }

    pub(crate) fn configure(engine: &mut Engine<'_>) {
        engine.add_function("ascii", ascii);
        engine.add_function("truncate", truncate);
    }
}
