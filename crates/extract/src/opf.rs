//! EPUB container and OPF package documents.
//!
//! Only the parts needed to catalog a book are read: the package path from
//! `META-INF/container.xml`, then the `<metadata>` block and the manifest
//! items of the package document. Both EPUB 2 (`opf:file-as`, `opf:scheme`,
//! `<meta name="cover">`) and EPUB 3 (`refines`, `cover-image`) conventions
//! are understood.

use crate::error::{ErrorKind, Result};
use crate::models::Creator;
use exn::ResultExt;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;
use time::Date;
use time::macros::format_description;

pub(crate) const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Returns the archive path of the package document.
pub(crate) fn rootfile(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    loop {
        match reader.read_event().or_raise(|| ErrorKind::MalformedXml("container"))? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"rootfile" => {
                if let Some(path) = attribute(&e, b"full-path", "container")? {
                    return Ok(path);
                }
            },
            Event::Eof => break,
            _ => {},
        }
    }
    exn::bail!(ErrorKind::MissingField("rootfile"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: Vec<String>,
}

/// The interesting subset of an OPF package document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Package {
    pub title: Option<String>,
    pub creators: Vec<Creator>,
    pub date: Option<Date>,
    pub isbn: Option<String>,
    pub language: Option<String>,
    pub manifest: Vec<ManifestItem>,
    cover_id: Option<String>,
}
impl Package {
    /// The manifest item holding the cover image, if one is declared.
    pub fn cover(&self) -> Option<&ManifestItem> {
        self.manifest
            .iter()
            .find(|item| item.properties.iter().any(|p| p == "cover-image"))
            .or_else(|| {
                let id = self.cover_id.as_deref()?;
                self.manifest.iter().find(|item| item.id == id)
            })
    }
}

// ============================================================================
// Parsing
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    Title,
    Creator,
    Date,
    Identifier,
    Language,
    Refinement,
}

#[derive(Debug, Default)]
struct Pending {
    id: Option<String>,
    file_as: Option<String>,
    role: Option<String>,
    scheme: Option<String>,
    refines: Option<String>,
    property: Option<String>,
    text: String,
}

#[derive(Debug)]
struct RawCreator {
    id: Option<String>,
    name: String,
    file_as: Option<String>,
    role: Option<String>,
}

/// Parses the `<metadata>` and `<manifest>` sections of a package document.
pub(crate) fn package(xml: &str) -> Result<Package> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut package = Package::default();
    let mut creators: Vec<RawCreator> = Vec::new();
    let mut identifiers: Vec<(Option<String>, String)> = Vec::new();
    // Refinements keyed by (element id, property).
    let mut refinements: HashMap<(String, String), String> = HashMap::new();
    let mut current: Option<(Element, Pending)> = None;
    let mut in_metadata = false;

    loop {
        let event = reader.read_event().or_raise(|| ErrorKind::MalformedXml("package"))?;
        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"metadata" => in_metadata = true,
                b"item" => package.manifest.extend(manifest_item(&e)?),
                name if in_metadata => {
                    if name == b"meta" && attribute(&e, b"name", "package")?.as_deref() == Some("cover") {
                        package.cover_id = attribute(&e, b"content", "package")?;
                    }
                    if let Some(element) = element(name) {
                        current = Some((element, pending(&e)?));
                    }
                },
                _ => {},
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"item" => package.manifest.extend(manifest_item(&e)?),
                b"meta" if in_metadata => {
                    if attribute(&e, b"name", "package")?.as_deref() == Some("cover") {
                        package.cover_id = attribute(&e, b"content", "package")?;
                    }
                },
                _ => {},
            },
            Event::Text(t) => {
                if let Some((_, pending)) = current.as_mut() {
                    pending.text.push_str(&t.unescape().or_raise(|| ErrorKind::MalformedXml("package"))?);
                }
            },
            Event::CData(t) => {
                if let Some((_, pending)) = current.as_mut() {
                    pending.text.push_str(&String::from_utf8_lossy(&t));
                }
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"metadata" => in_metadata = false,
                name if current.as_ref().is_some_and(|(element, _)| Some(*element) == self::element(name)) => {
                    let Some((element, pending)) = current.take() else { continue };
                    let text = pending.text.trim().to_string();
                    if text.is_empty() {
                        continue;
                    }
                    match element {
                        Element::Title => {
                            package.title.get_or_insert(text);
                        },
                        Element::Creator => creators.push(RawCreator {
                            id: pending.id,
                            name: text,
                            file_as: pending.file_as,
                            role: pending.role,
                        }),
                        Element::Date => {
                            if package.date.is_none() {
                                package.date = parse_date(&text);
                            }
                        },
                        Element::Identifier => identifiers.push((pending.scheme, text)),
                        Element::Language => {
                            package.language.get_or_insert(text);
                        },
                        Element::Refinement => {
                            if let (Some(refines), Some(property)) = (pending.refines, pending.property) {
                                let id = refines.trim_start_matches('#').to_string();
                                refinements.entry((id, property)).or_insert(text);
                            }
                        },
                    }
                },
                _ => {},
            },
            Event::Eof => break,
            _ => {},
        }
    }

    package.creators = creators
        .into_iter()
        .filter_map(|raw| {
            let refined = |property: &str| {
                let id = raw.id.clone()?;
                refinements.get(&(id, property.to_string())).cloned()
            };
            let role = raw.role.clone().or_else(|| refined("role"));
            if role.is_some_and(|role| !role.eq_ignore_ascii_case("aut")) {
                return None;
            }
            let file_as = raw.file_as.clone().or_else(|| refined("file-as"));
            Some(Creator::new(&raw.name, file_as))
        })
        .collect();
    package.isbn = identifiers.iter().find_map(|(scheme, value)| isbn(scheme.as_deref(), value));
    Ok(package)
}

fn element(local_name: &[u8]) -> Option<Element> {
    Some(match local_name {
        b"title" => Element::Title,
        b"creator" => Element::Creator,
        b"date" => Element::Date,
        b"identifier" => Element::Identifier,
        b"language" => Element::Language,
        b"meta" => Element::Refinement,
        _ => return None,
    })
}

fn pending(e: &BytesStart) -> Result<Pending> {
    let mut pending = Pending::default();
    for attr in e.attributes() {
        let attr = attr.or_raise(|| ErrorKind::MalformedXml("package"))?;
        let value = attr.unescape_value().or_raise(|| ErrorKind::MalformedXml("package"))?.into_owned();
        match attr.key.local_name().as_ref() {
            b"id" => pending.id = Some(value),
            b"file-as" => pending.file_as = Some(value),
            b"role" => pending.role = Some(value),
            b"scheme" => pending.scheme = Some(value),
            b"refines" => pending.refines = Some(value),
            b"property" => pending.property = Some(value),
            _ => {},
        }
    }
    Ok(pending)
}

fn manifest_item(e: &BytesStart) -> Result<Option<ManifestItem>> {
    let (Some(id), Some(href)) = (attribute(e, b"id", "package")?, attribute(e, b"href", "package")?) else {
        return Ok(None);
    };
    Ok(Some(ManifestItem {
        id,
        href,
        media_type: attribute(e, b"media-type", "package")?.unwrap_or_default(),
        properties: attribute(e, b"properties", "package")?
            .map(|p| p.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
    }))
}

fn attribute(e: &BytesStart, local_name: &[u8], document: &'static str) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.or_raise(|| ErrorKind::MalformedXml(document))?;
        if attr.key.local_name().as_ref() == local_name {
            let value = attr.unescape_value().or_raise(|| ErrorKind::MalformedXml(document))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Accepts `YYYY`, `YYYY-MM`, `YYYY-MM-DD` and full timestamps (only the date
/// part is kept).
fn parse_date(text: &str) -> Option<Date> {
    let date = text.get(..10).unwrap_or(text);
    let full = format_description!("[year]-[month]-[day]");
    if let Ok(date) = Date::parse(date, full) {
        return Some(date);
    }
    let mut parts = date.splitn(3, '-');
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = match parts.next() {
        Some(month) => month.parse::<u8>().ok()?,
        None => 1,
    };
    Date::from_calendar_date(year, time::Month::try_from(month).ok()?, 1).ok()
}

fn isbn(scheme: Option<&str>, value: &str) -> Option<String> {
    let lowered = value.to_ascii_lowercase();
    let stripped = if let Some(rest) = lowered.strip_prefix("urn:isbn:") {
        rest
    } else if let Some(rest) = lowered.strip_prefix("isbn:") {
        rest
    } else if scheme.is_some_and(|s| s.eq_ignore_ascii_case("isbn")) {
        lowered.as_str()
    } else {
        return None;
    };
    let isbn: String = stripped.chars().filter(|c| !matches!(c, '-' | ' ')).collect::<String>().to_uppercase();
    let valid = matches!(isbn.len(), 10 | 13) && isbn.chars().all(|c| c.is_ascii_digit() || c == 'X');
    valid.then_some(isbn)
}

/// Resolves a manifest `href` against the directory of the package document.
pub(crate) fn resolve_href(package_path: &str, href: &str) -> String {
    let mut parts: Vec<&str> = match package_path.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').filter(|p| !p.is_empty()).collect(),
        None => Vec::new(),
    };
    let href = href.split(['#', '?']).next().unwrap_or(href);
    for part in href.split('/') {
        match part {
            "" | "." => {},
            ".." => {
                parts.pop();
            },
            part => parts.push(part),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::macros::date;

    const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    const EPUB2: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://www.idpf.org/2007/opf" xmlns:opf="http://www.idpf.org/2007/opf" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Wool &amp; Shift</dc:title>
    <dc:creator opf:role="aut" opf:file-as="Howey, Hugh">Hugh Howey</dc:creator>
    <dc:creator opf:role="ill">Some Illustrator</dc:creator>
    <dc:date>2012-01-25T00:00:00+00:00</dc:date>
    <dc:identifier opf:scheme="uuid">a1b2c3</dc:identifier>
    <dc:identifier opf:scheme="ISBN">978-1-4767-3395-1</dc:identifier>
    <dc:language>en</dc:language>
    <meta name="cover" content="cover-img"/>
  </metadata>
  <manifest>
    <item id="cover-img" href="images/cover.jpg" media-type="image/jpeg"/>
    <item id="ch1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
</package>"#;

    const EPUB3: &str = r##"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Dust</dc:title>
    <dc:creator id="c1">Hugh Howey</dc:creator>
    <meta refines="#c1" property="file-as">Howey, Hugh</meta>
    <meta refines="#c1" property="role" scheme="marc:relators">aut</meta>
    <dc:creator id="c2">Jane Doe</dc:creator>
    <dc:identifier>urn:isbn:9781476733968</dc:identifier>
    <dc:date>2013</dc:date>
  </metadata>
  <manifest>
    <item id="c" href="../cover.jpeg" media-type="image/jpeg" properties="cover-image"/>
  </manifest>
</package>"##;

    #[test]
    fn test_rootfile() {
        assert_eq!(rootfile(CONTAINER).unwrap(), "OEBPS/content.opf");
    }

    #[test]
    fn test_rootfile_missing() {
        let err = rootfile("<container><rootfiles/></container>").unwrap_err();
        assert!(matches!(&*err, ErrorKind::MissingField("rootfile")));
    }

    #[test]
    fn test_epub2_package() {
        let package = package(EPUB2).unwrap();
        assert_eq!(package.title.as_deref(), Some("Wool & Shift"));
        assert_eq!(package.creators, vec![Creator::new("Hugh Howey", Some("Howey, Hugh"))]);
        assert_eq!(package.date, Some(date!(2012 - 01 - 25)));
        assert_eq!(package.isbn.as_deref(), Some("9781476733951"));
        assert_eq!(package.language.as_deref(), Some("en"));
        assert_eq!(package.cover().map(|item| item.href.as_str()), Some("images/cover.jpg"));
    }

    #[test]
    fn test_epub3_package() {
        let package = package(EPUB3).unwrap();
        assert_eq!(package.title.as_deref(), Some("Dust"));
        assert_eq!(
            package.creators,
            vec![Creator::new("Hugh Howey", Some("Howey, Hugh")), Creator::new("Jane Doe", None::<&str>)]
        );
        assert_eq!(package.date, Some(date!(2013 - 01 - 01)));
        assert_eq!(package.isbn.as_deref(), Some("9781476733968"));
        assert_eq!(package.cover().map(|item| item.id.as_str()), Some("c"));
    }

    #[test]
    fn test_malformed_package() {
        let err = package("<package><metadata><dc:title>x</dc:creator></metadata></package>").unwrap_err();
        assert!(matches!(&*err, ErrorKind::MalformedXml("package")));
    }

    #[rstest]
    #[case("OEBPS/content.opf", "images/cover.jpg", "OEBPS/images/cover.jpg")]
    #[case("OEBPS/content.opf", "../cover.jpeg", "cover.jpeg")]
    #[case("content.opf", "./cover.jpg", "cover.jpg")]
    #[case("a/b/content.opf", "../c/d.jpg#frag", "a/c/d.jpg")]
    fn test_resolve_href(#[case] package_path: &str, #[case] href: &str, #[case] expected: &str) {
        assert_eq!(resolve_href(package_path, href), expected);
    }

    #[rstest]
    #[case(Some("ISBN"), "0-306-40615-2", Some("0306406152"))]
    #[case(None, "urn:isbn:978-0-306-40615-7", Some("9780306406157"))]
    #[case(None, "isbn:030640615x", Some("030640615X"))]
    #[case(Some("uuid"), "9780306406157", None)]
    #[case(Some("ISBN"), "not-an-isbn", None)]
    fn test_isbn(#[case] scheme: Option<&str>, #[case] value: &str, #[case] expected: Option<&str>) {
        assert_eq!(isbn(scheme, value).as_deref(), expected);
    }

    #[rstest]
    #[case("2012-01-25", Some(date!(2012 - 01 - 25)))]
    #[case("2012-03", Some(date!(2012 - 03 - 01)))]
    #[case("1999", Some(date!(1999 - 01 - 01)))]
    #[case("unknown", None)]
    fn test_parse_date(#[case] text: &str, #[case] expected: Option<Date>) {
        assert_eq!(parse_date(text), expected);
    }
}
