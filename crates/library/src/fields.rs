//! Logical book fields and their storage mappings.
//!
//! Every [`Field`] maps exhaustively to (a) the catalog columns it is read
//! from and (b) the field name `calibredb list --fields` understands, so both
//! backends agree on what a projection means.

use crate::error::{Error, ErrorKind, Result};
use bindery_catalog::{Column, Table};
use derive_more::Display;
use exn::ResultExt;
use std::str::FromStr;

/// A caller-facing book attribute.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    #[display("id")]
    Id,
    #[display("title")]
    Title,
    #[display("authors")]
    Authors,
    #[display("author_sort")]
    AuthorSort,
    #[display("cover")]
    Cover,
    #[display("formats")]
    Formats,
    #[display("series")]
    Series,
    #[display("series_index")]
    SeriesIndex,
    #[display("timestamp")]
    Timestamp,
    #[display("pubdate")]
    Pubdate,
    #[display("last_modified")]
    LastModified,
    #[display("isbn")]
    Isbn,
    #[display("size")]
    Size,
}

impl Field {
    pub const ALL: [Field; 13] = [
        Self::Id,
        Self::Title,
        Self::Authors,
        Self::AuthorSort,
        Self::Cover,
        Self::Formats,
        Self::Series,
        Self::SeriesIndex,
        Self::Timestamp,
        Self::Pubdate,
        Self::LastModified,
        Self::Isbn,
        Self::Size,
    ];

    /// The name used by `calibredb list --fields` (and by [`FromStr`]).
    pub fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Title => "title",
            Self::Authors => "authors",
            Self::AuthorSort => "author_sort",
            Self::Cover => "cover",
            Self::Formats => "formats",
            Self::Series => "series",
            Self::SeriesIndex => "series_index",
            Self::Timestamp => "timestamp",
            Self::Pubdate => "pubdate",
            Self::LastModified => "last_modified",
            Self::Isbn => "isbn",
            Self::Size => "size",
        }
    }

    /// Catalog columns the field is computed from.
    ///
    /// Everything comes from the `meta` view except the cover flag and the
    /// modification time, which are joined in from `books`.
    pub(crate) fn storage(self) -> &'static [(Table, &'static str)] {
        match self {
            Self::Id => &[(Table::Meta, "id")],
            Self::Title => &[(Table::Meta, "title")],
            Self::Authors => &[(Table::Meta, "authors")],
            Self::AuthorSort => &[(Table::Meta, "author_sort")],
            Self::Cover => &[(Table::Meta, "path"), (Table::Books, "has_cover")],
            Self::Formats => &[(Table::Meta, "path"), (Table::Meta, "formats")],
            Self::Series => &[(Table::Meta, "series")],
            Self::SeriesIndex => &[(Table::Meta, "series_index")],
            Self::Timestamp => &[(Table::Meta, "timestamp")],
            Self::Pubdate => &[(Table::Meta, "pubdate")],
            Self::LastModified => &[(Table::Books, "last_modified")],
            Self::Isbn => &[(Table::Meta, "isbn")],
            Self::Size => &[(Table::Meta, "size")],
        }
    }

    /// Whether an equality [`Filter`](crate::Filter) can be built on the field.
    pub fn is_filterable(self) -> bool {
        match self {
            Self::Id | Self::Title | Self::Authors | Self::AuthorSort | Self::Series | Self::SeriesIndex | Self::Isbn => {
                true
            },
            Self::Cover | Self::Formats | Self::Timestamp | Self::Pubdate | Self::LastModified | Self::Size => false,
        }
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        match Self::ALL.into_iter().find(|field| field.name() == name) {
            Some(field) => Ok(field),
            None => exn::bail!(ErrorKind::UnsupportedField(s.trim().to_string())),
        }
    }
}

/// A deduplicated set of requested fields.
///
/// `id` and `title` are part of every record regardless of the projection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    fields: Vec<Field>,
}
impl Projection {
    pub fn new(fields: impl IntoIterator<Item = Field>) -> Self {
        let mut projection = Self::default();
        for field in fields {
            if !projection.fields.contains(&field) {
                projection.fields.push(field);
            }
        }
        projection
    }

    /// Every field.
    pub fn all() -> Self {
        Self::new(Field::ALL)
    }

    /// Parses a comma-separated list of field names.
    pub fn parse(list: &str) -> Result<Self> {
        let fields = list
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(Field::from_str)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(fields))
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn contains(&self, field: Field) -> bool {
        matches!(field, Field::Id | Field::Title) || self.fields.contains(&field)
    }

    /// Deduplicated catalog columns backing the projection.
    pub(crate) fn columns(&self) -> Result<Vec<Column>> {
        let mut columns: Vec<Column> = Vec::new();
        for (table, name) in [Field::Id, Field::Title].iter().chain(&self.fields).flat_map(|f| f.storage()) {
            let column = Column::new(*table, name).or_raise(|| ErrorKind::Catalog)?;
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
        Ok(columns)
    }

    /// Field names for `calibredb list --fields`.
    ///
    /// The tool always reports `id`; `title` is requested explicitly so both
    /// backends return it.
    pub(crate) fn calibredb_fields(&self) -> Vec<String> {
        let mut names = vec![Field::Title.name().to_string()];
        for field in &self.fields {
            if !matches!(field, Field::Id | Field::Title) {
                names.push(field.name().to_string());
            }
        }
        names
    }
}
impl FromIterator<Field> for Projection {
    fn from_iter<T: IntoIterator<Item = Field>>(iter: T) -> Self {
        Self::new(iter)
    }
}
