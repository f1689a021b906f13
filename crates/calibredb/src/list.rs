use crate::CalibreDb;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::OffsetDateTime;
use tracing::instrument;

/// Arguments of `calibredb list`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// calibredb field names (`--fields`); the tool always adds `id`.
    pub fields: Vec<String>,
    pub limit: Option<usize>,
    pub sort_by: Option<String>,
    pub ascending: bool,
    /// A calibre search expression (`--search`).
    pub search: Option<String>,
}
impl ListOptions {
    pub fn new<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self { fields: fields.into_iter().map(Into::into).collect(), ..Self::default() }
    }

    pub(crate) fn args(&self) -> Vec<String> {
        let mut args = vec!["list".to_string(), "--for-machine".to_string()];
        if !self.fields.is_empty() {
            args.push("--fields".to_string());
            args.push(self.fields.join(","));
        }
        if let Some(limit) = self.limit {
            args.push("--limit".to_string());
            args.push(limit.to_string());
        }
        if let Some(sort_by) = &self.sort_by {
            args.push("--sort-by".to_string());
            args.push(sort_by.clone());
        }
        if self.ascending {
            args.push("--ascending".to_string());
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            args.push("--search".to_string());
            args.push(search.to_string());
        }
        args
    }
}

/// One object of the `calibredb list --for-machine` output.
///
/// Keys that were not requested (or have no value) are absent. `id` is
/// always printed, so an object without one is malformed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListedBook {
    pub id: i64,
    pub title: Option<String>,
    /// Author names joined by `" & "`
    pub authors: Option<String>,
    pub author_sort: Option<String>,
    pub cover: Option<PathBuf>,
    pub formats: Option<Vec<PathBuf>>,
    pub series: Option<String>,
    pub series_index: Option<f64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub pubdate: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_modified: Option<OffsetDateTime>,
    pub isbn: Option<String>,
    pub size: Option<u64>,
}

impl CalibreDb {
    /// Lists books (`calibredb list --for-machine`).
    #[instrument(skip(self), fields(library = %self.library().display()))]
    pub fn list(&self, options: &ListOptions) -> Result<Vec<ListedBook>> {
        let stdout = self.run(options.args())?;
        decode(&stdout)
    }

    /// Distinct author names across the library, in first-seen order.
    #[instrument(skip(self), fields(library = %self.library().display()))]
    pub fn list_authors(&self) -> Result<Vec<String>> {
        let books = self.list(&ListOptions::new(["authors"]))?;
        let mut authors: Vec<String> = Vec::new();
        for name in books.iter().filter_map(|b| b.authors.as_deref()).flat_map(|a| a.split(" & ")) {
            let name = name.trim();
            if !name.is_empty() && !authors.iter().any(|a| a == name) {
                authors.push(name.to_string());
            }
        }
        Ok(authors)
    }
}

fn decode(stdout: &str) -> Result<Vec<ListedBook>> {
    let stdout = stdout.trim();
    if stdout.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(stdout).or_raise(|| ErrorKind::Decode)
}
