//! The staged add pipeline of the catalog backend.
//!
//! Each file goes through [`Stage::Parse`], [`Stage::Insert`],
//! [`Stage::Layout`], [`Stage::Copy`], [`Stage::Cover`], [`Stage::Sidecar`]
//! and [`Stage::Commit`]. Only `Insert` and `Commit` are transactional; a
//! failure in between leaves a book row with an empty `path`, which
//! [`Library::incomplete_books`](crate::Library::incomplete_books) reports.

use crate::error::{ErrorKind, Result};
use crate::fs::{COVER_FILE, SIDECAR_FILE};
use crate::template::{Layout, PathParams};
use bindery_catalog::{BookRow, Catalog, NewBook};
use bindery_extract::{Creator, Metadata};
use derive_more::Display;
use exn::{OptionExt, ResultExt};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, instrument};

/// Author recorded for files without any.
pub(crate) const UNKNOWN: &str = "Unknown";

/// A step of the add pipeline, reported by [`ErrorKind::AddFailed`].
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading metadata from the file.
    #[display("parse")]
    Parse,
    /// Inserting the book, its authors and links.
    #[display("insert")]
    Insert,
    /// Rendering the folder and file name templates.
    #[display("layout")]
    Layout,
    #[display("copy")]
    Copy,
    #[display("cover")]
    Cover,
    #[display("sidecar")]
    Sidecar,
    /// Attaching the files to the book row.
    #[display("commit")]
    Commit,
}

/// Adds one file to the catalog and the library folder, returning the new
/// book id.
#[instrument(skip(catalog, layout), fields(root = %root.display()))]
pub(crate) fn add_book(catalog: &Catalog, root: &Path, layout: &Layout, file: &Path) -> Result<i64> {
    let failed = |stage, book| ErrorKind::AddFailed { stage, book, file: file.to_path_buf() };

    // Parse
    if !file.is_file() {
        exn::bail!(failed(Stage::Parse, None));
    }
    let format = bindery_extract::format_of(file).ok_or_raise(|| failed(Stage::Parse, None))?;
    let metadata = bindery_extract::read(file).or_raise(|| failed(Stage::Parse, None))?;
    let authors = match metadata.authors.is_empty() {
        true => vec![Creator::from(UNKNOWN)],
        false => metadata.authors.clone(),
    };

    // Insert
    let now = OffsetDateTime::now_utc();
    let names = authors.iter().map(|a| (a.name.as_str(), a.file_as.as_deref())).collect::<Vec<_>>();
    let id = catalog.insert_book(&new_book(&metadata, now), &names).or_raise(|| failed(Stage::Insert, None))?;
    debug!(id, "Inserted book row");

    // Layout
    let book = catalog
        .get::<BookRow>(id)
        .or_raise(|| failed(Stage::Layout, Some(id)))?
        .ok_or_raise(|| failed(Stage::Layout, Some(id)))?;
    let params = PathParams {
        id,
        title: &book.title,
        author: &authors[0].name,
        author_sort: authors[0].sort_name(),
    };
    let folder = layout.folder(&params).or_raise(|| failed(Stage::Layout, Some(id)))?;
    let stem = layout.file_stem(&params).or_raise(|| failed(Stage::Layout, Some(id)))?;

    // Copy
    let dir = root.join(&folder);
    let size = fs::create_dir_all(&dir)
        .and_then(|()| fs::copy(file, dir.join(format!("{stem}.{format}"))))
        .or_raise(|| failed(Stage::Copy, Some(id)))?;

    // Cover
    let has_cover = match metadata.cover.as_ref().filter(|c| c.is_jpeg()) {
        Some(cover) => {
            fs::write(dir.join(COVER_FILE), &cover.data).or_raise(|| failed(Stage::Cover, Some(id)))?;
            true
        },
        None => false,
    };

    // Sidecar
    let opf = sidecar(&book, &authors, &metadata, has_cover).or_raise(|| failed(Stage::Sidecar, Some(id)))?;
    fs::write(dir.join(SIDECAR_FILE), opf).or_raise(|| failed(Stage::Sidecar, Some(id)))?;

    // Commit
    catalog
        .transaction(|c| {
            c.set_book_files(id, &folder, has_cover, OffsetDateTime::now_utc())?;
            c.add_data(id, &format, size, &stem)
        })
        .or_raise(|| failed(Stage::Commit, Some(id)))?;

    info!(id, title = %book.title, folder, "Added book");
    Ok(id)
}

fn new_book(metadata: &Metadata, now: OffsetDateTime) -> NewBook {
    let title = match metadata.title.trim() {
        "" => UNKNOWN,
        title => title,
    };
    NewBook {
        timestamp: now,
        pubdate: metadata.published.map(|date| date.midnight().assume_utc()),
        isbn: metadata.isbn.clone(),
        ..NewBook::new(title)
    }
}

/// Renders the OPF written next to the book files.
fn sidecar(book: &BookRow, authors: &[Creator], metadata: &Metadata, has_cover: bool) -> Result<Vec<u8>> {
    let xml = || ErrorKind::Io(PathBuf::from(SIDECAR_FILE));
    let date = |ts: OffsetDateTime| ts.format(&Rfc3339).or_raise(xml);
    let id = book.id.to_string();
    let published = book.pubdate.filter(|_| metadata.published.is_some()).map(date).transpose()?;
    let timestamp = date(book.timestamp.unwrap_or_else(OffsetDateTime::now_utc))?;
    let title_sort = book.sort.as_deref().unwrap_or(&book.title);

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    let mut events = vec![
        Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)),
        Event::Start(BytesStart::new("package").with_attributes([
            ("xmlns", "http://www.idpf.org/2007/opf"),
            ("unique-identifier", "uuid_id"),
            ("version", "2.0"),
        ])),
        Event::Start(BytesStart::new("metadata").with_attributes([
            ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
            ("xmlns:opf", "http://www.idpf.org/2007/opf"),
        ])),
    ];
    element(&mut events, "dc:identifier", &[("opf:scheme", "calibre"), ("id", "calibre_id")], &id);
    if let Some(uuid) = &book.uuid {
        element(&mut events, "dc:identifier", &[("opf:scheme", "uuid"), ("id", "uuid_id")], uuid);
    }
    element(&mut events, "dc:title", &[], &book.title);
    for author in authors {
        element(&mut events, "dc:creator", &[("opf:file-as", author.sort_name()), ("opf:role", "aut")], &author.name);
    }
    if let Some(published) = &published {
        element(&mut events, "dc:date", &[], published);
    }
    if let Some(language) = &metadata.language {
        element(&mut events, "dc:language", &[], language);
    }
    if let Some(isbn) = metadata.isbn.as_deref().map(str::trim).filter(|isbn| !isbn.is_empty()) {
        element(&mut events, "dc:identifier", &[("opf:scheme", "ISBN")], isbn);
    }
    events.push(meta("calibre:timestamp", &timestamp));
    events.push(meta("calibre:title_sort", title_sort));
    events.push(Event::End(BytesEnd::new("metadata")));
    if has_cover {
        events.push(Event::Start(BytesStart::new("guide")));
        events.push(Event::Empty(BytesStart::new("reference").with_attributes([
            ("type", "cover"),
            ("title", "Cover"),
            ("href", COVER_FILE),
        ])));
        events.push(Event::End(BytesEnd::new("guide")));
    }
    events.push(Event::End(BytesEnd::new("package")));

    for event in events {
        writer.write_event(event).or_raise(xml)?;
    }
    let mut opf = writer.into_inner();
    opf.push(b'\n');
    Ok(opf)
}

fn element<'a>(events: &mut Vec<Event<'a>>, name: &'a str, attributes: &[(&'a str, &'a str)], text: &'a str) {
    events.push(Event::Start(BytesStart::new(name).with_attributes(attributes.iter().copied())));
    events.push(Event::Text(BytesText::new(text)));
    events.push(Event::End(BytesEnd::new(name)));
}

fn meta<'a>(name: &'a str, content: &'a str) -> Event<'a> {
    Event::Empty(BytesStart::new("meta").with_attributes([("name", name), ("content", content)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{DEFAULT_FILE_TEMPLATE, DEFAULT_FOLDER_TEMPLATE};
    use bindery_catalog::DataRow;
    use bindery_extract::fixtures::{EpubBuilder, JPEG_COVER};
    use tempfile::TempDir;
    use time::macros::date;

    struct Fixture {
        dir: TempDir,
        root: PathBuf,
        catalog: Catalog,
        layout: Layout,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("library");
        fs::create_dir_all(&root).unwrap();
        Fixture {
            dir,
            root,
            catalog: Catalog::open_in_memory().unwrap(),
            layout: Layout::new(DEFAULT_FOLDER_TEMPLATE, DEFAULT_FILE_TEMPLATE).unwrap(),
        }
    }

    #[test]
    fn test_add_epub_runs_every_stage() {
        let f = fixture();
        let file = EpubBuilder::new("Wool & Shift")
            .author("Hugh Howey", Some("Howey, Hugh"))
            .published(date!(2011 - 07 - 30))
            .isbn("9781476733951")
            .cover(JPEG_COVER)
            .write_to(f.dir.path().join("wool.epub"))
            .unwrap();

        let id = add_book(&f.catalog, &f.root, &f.layout, &file).unwrap();
        let book = f.catalog.get::<BookRow>(id).unwrap().unwrap();
        assert_eq!(book.path, format!("Hugh Howey/Wool & Shift ({id})"));
        assert!(book.has_cover);
        assert_eq!(book.author_sort.as_deref(), Some("Howey, Hugh"));
        assert_eq!(f.catalog.isbn(id).unwrap().as_deref(), Some("9781476733951"));

        let folder = f.root.join(&book.path);
        assert_eq!(fs::read(folder.join(COVER_FILE)).unwrap(), JPEG_COVER);
        assert_eq!(fs::read(folder.join("Wool & Shift - Hugh Howey.epub")).unwrap(), fs::read(&file).unwrap());

        let opf = fs::read_to_string(folder.join(SIDECAR_FILE)).unwrap();
        assert!(opf.contains("<dc:title>Wool &amp; Shift</dc:title>"));
        assert!(opf.contains(r#"<dc:creator opf:file-as="Howey, Hugh" opf:role="aut">Hugh Howey</dc:creator>"#));
        assert!(opf.contains(r#"<dc:identifier opf:scheme="ISBN">9781476733951</dc:identifier>"#));
        assert!(opf.contains(r#"href="cover.jpg""#));

        let data = f.catalog.data(Some(&[id])).unwrap();
        assert_eq!(
            data,
            vec![DataRow {
                id: data[0].id,
                book: id,
                format: "EPUB".into(),
                uncompressed_size: fs::metadata(&file).unwrap().len() as i64,
                name: "Wool & Shift - Hugh Howey".into(),
            }]
        );
    }

    #[test]
    fn test_add_without_authors_uses_unknown() {
        let f = fixture();
        let file = EpubBuilder::new("Anonymous Work").write_to(f.dir.path().join("anon.epub")).unwrap();
        let id = add_book(&f.catalog, &f.root, &f.layout, &file).unwrap();
        let book = f.catalog.get::<BookRow>(id).unwrap().unwrap();
        assert_eq!(book.path, format!("Unknown/Anonymous Work ({id})"));
        assert!(!book.has_cover);
        assert!(!f.root.join(&book.path).join(COVER_FILE).exists());
        assert_eq!(f.catalog.authors().unwrap()[0].name, UNKNOWN);
    }

    #[test]
    fn test_non_epub_uses_file_name() {
        let f = fixture();
        let file = f.dir.path().join("Field Notes.pdf");
        fs::write(&file, b"%PDF-1.4").unwrap();
        let id = add_book(&f.catalog, &f.root, &f.layout, &file).unwrap();
        let book = f.catalog.get::<BookRow>(id).unwrap().unwrap();
        assert_eq!(book.title, "Field Notes");
        assert!(f.root.join(&book.path).join("Field Notes - Unknown.pdf").is_file());
    }

    #[test]
    fn test_missing_file_fails_before_insert() {
        let f = fixture();
        let err = add_book(&f.catalog, &f.root, &f.layout, &f.dir.path().join("nope.epub")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::AddFailed { stage: Stage::Parse, book: None, .. }));
        assert!(f.catalog.books().unwrap().is_empty());
    }

    #[test]
    fn test_failure_after_insert_names_the_book() {
        let f = fixture();
        let file = EpubBuilder::new("Wool").author("Hugh Howey", None).write_to(f.dir.path().join("w.epub")).unwrap();
        // A file where the author folder should go.
        fs::write(f.root.join("Hugh Howey"), "").unwrap();
        let err = add_book(&f.catalog, &f.root, &f.layout, &file).unwrap_err();
        assert!(matches!(&*err, ErrorKind::AddFailed { stage: Stage::Copy, book: Some(1), .. }));
        assert_eq!(f.catalog.incomplete_books().unwrap().len(), 1);
    }
}
