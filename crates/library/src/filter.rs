//! Equality filters and list queries.
//!
//! A [`Filter`] renders both as a catalog [`Predicate`] and as a calibre
//! search term, so the two backends select the same books.

use crate::error::{Error, ErrorKind, Result};
use crate::fields::{Field, Projection};
use bindery_catalog::{Column, Predicate, Table, Value};
use derive_more::Display;
use exn::ResultExt;
use std::str::FromStr;

/// Right-hand side of an equality filter.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum FilterValue {
    Integer(i64),
    Real(f64),
    Text(String),
}
impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}
impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}
impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}
impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// `field = value`, on a filterable [`Field`].
///
/// Text comparisons are exact but case-insensitive, like calibre's `=`
/// searches; `authors` matches when any linked author has the name.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    field: Field,
    value: FilterValue,
}
impl Filter {
    pub fn new(field: Field, value: impl Into<FilterValue>) -> Result<Self> {
        let value = value.into();
        if !field.is_filterable() {
            exn::bail!(ErrorKind::UnsupportedFilter(field.name().to_string()));
        }
        let value = match (field, value) {
            (Field::Id, value @ FilterValue::Integer(_)) => value,
            (Field::SeriesIndex, FilterValue::Integer(i)) => FilterValue::Real(i as f64),
            (Field::SeriesIndex, value @ FilterValue::Real(_)) => value,
            (Field::Id | Field::SeriesIndex, value) => {
                exn::bail!(ErrorKind::UnsupportedFilter(format!("{field}={value}")))
            },
            (_, FilterValue::Text(text)) => FilterValue::Text(text),
            (_, value) => exn::bail!(ErrorKind::UnsupportedFilter(format!("{field}={value}"))),
        };
        Ok(Self { field, value })
    }

    /// The most common filter: a single book by id.
    pub fn id(id: i64) -> Self {
        Self { field: Field::Id, value: FilterValue::Integer(id) }
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn value(&self) -> &FilterValue {
        &self.value
    }

    /// The predicate selecting matching rows of the `meta` view.
    pub(crate) fn predicate(&self) -> Result<Predicate> {
        let column = |name: &str| Column::new(Table::Meta, name).or_raise(|| ErrorKind::Catalog);
        Ok(match (&self.field, &self.value) {
            (Field::Authors, FilterValue::Text(name)) => Predicate::HasAuthor(name.clone()),
            (field, FilterValue::Text(text)) => Predicate::EqNoCase(column(field.name())?, Value::Text(text.clone())),
            (field, FilterValue::Integer(i)) => Predicate::Eq(column(field.name())?, Value::Integer(*i)),
            (field, FilterValue::Real(r)) => Predicate::Eq(column(field.name())?, Value::Real(*r)),
        })
    }

    /// The equivalent calibre search term, e.g. `id:2` or `title:"=Wool"`.
    pub fn search_term(&self) -> String {
        match &self.value {
            FilterValue::Integer(i) => format!("{}:{i}", self.field),
            FilterValue::Real(r) => format!("{}:{r}", self.field),
            FilterValue::Text(text) => format!("{}:\"={}\"", self.field, escape(text)),
        }
    }
}

impl FromStr for Filter {
    type Err = Error;

    /// Parses `field=value`; numeric fields need a numeric value.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let Some((field, value)) = s.split_once('=') else {
            exn::bail!(ErrorKind::UnsupportedFilter(s.to_string()));
        };
        let field: Field = field.parse().or_raise(|| ErrorKind::UnsupportedFilter(s.to_string()))?;
        let value = value.trim();
        let value = match field {
            Field::Id => FilterValue::Integer(value.parse().or_raise(|| ErrorKind::UnsupportedFilter(s.to_string()))?),
            Field::SeriesIndex => {
                FilterValue::Real(value.parse().or_raise(|| ErrorKind::UnsupportedFilter(s.to_string()))?)
            },
            _ => FilterValue::Text(value.to_string()),
        };
        Self::new(field, value)
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Filters combined for `calibredb list --search`.
pub(crate) fn search_expression(filters: &[Filter]) -> Option<String> {
    (!filters.is_empty()).then(|| filters.iter().map(Filter::search_term).collect::<Vec<_>>().join(" and "))
}

/// What to list: a projection, `AND`-ed filters and an optional limit.
///
/// Results are always ordered by book id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookQuery {
    pub projection: Projection,
    pub filters: Vec<Filter>,
    pub limit: Option<usize>,
}
impl BookQuery {
    pub fn new(projection: Projection) -> Self {
        Self { projection, ..Self::default() }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn limit(mut self, limit: impl Into<Option<usize>>) -> Self {
        self.limit = limit.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("id=2", "id:2")]
    #[case("title=Wool", "title:\"=Wool\"")]
    #[case("authors=Hugh Howey", "authors:\"=Hugh Howey\"")]
    #[case("series_index=1.5", "series_index:1.5")]
    #[case(r#"title=The "Best" \ Book"#, r#"title:"=The \"Best\" \\ Book""#)]
    fn test_search_term(#[case] expr: &str, #[case] expected: &str) {
        assert_eq!(expr.parse::<Filter>().unwrap().search_term(), expected);
    }

    #[rstest]
    #[case("cover=x", "cover")]
    #[case("formats=EPUB", "formats")]
    #[case("timestamp=2024-01-01", "timestamp")]
    fn test_unfilterable_fields(#[case] expr: &str, #[case] name: &str) {
        let err = expr.parse::<Filter>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFilter(n) if n == name));
    }

    #[rstest]
    #[case("id=two")]
    #[case("series_index=first")]
    #[case("languages=en")]
    #[case("no equals sign")]
    fn test_malformed_filters(#[case] expr: &str) {
        let err = expr.parse::<Filter>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFilter(_)));
    }

    #[test]
    fn test_value_types_are_checked() {
        assert!(Filter::new(Field::Id, "2").is_err());
        assert!(Filter::new(Field::Title, 2_i64).is_err());
        assert_eq!(Filter::new(Field::SeriesIndex, 2_i64).unwrap().value(), &FilterValue::Real(2.0));
    }

    #[test]
    fn test_predicates() {
        assert_eq!(Filter::id(2).predicate().unwrap(), Predicate::eq(Table::Meta, "id", 2_i64).unwrap());
        assert_eq!(
            Filter::new(Field::Authors, "Hugh Howey").unwrap().predicate().unwrap(),
            Predicate::HasAuthor("Hugh Howey".into())
        );
        assert_eq!(
            Filter::new(Field::Series, "Silo").unwrap().predicate().unwrap(),
            Predicate::EqNoCase(Column::new(Table::Meta, "series").unwrap(), Value::Text("Silo".into()))
        );
    }

    #[test]
    fn test_search_expression() {
        assert_eq!(search_expression(&[]), None);
        let filters = vec![Filter::id(2), Filter::new(Field::Title, "Wool").unwrap()];
        assert_eq!(search_expression(&filters).as_deref(), Some("id:2 and title:\"=Wool\""));
    }
}
