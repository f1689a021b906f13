//! Synthetic EPUB files for tests.
//!
//! Enabled with the `fixtures` feature so that other crates can build real
//! archives in their own tests without shipping binary files.

use quick_xml::escape::escape;
use std::fs;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use time::Date;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Smallest byte sequence recognised as a JPEG image.
pub const JPEG_COVER: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00,
    0x00, 0xFF, 0xD9,
];

/// Builds a minimal, valid EPUB archive.
#[derive(Debug, Clone)]
pub struct EpubBuilder {
    title: String,
    authors: Vec<(String, Option<String>)>,
    published: Option<Date>,
    isbn: Option<String>,
    cover: Option<Vec<u8>>,
    epub3: bool,
}
impl EpubBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), authors: Vec::new(), published: None, isbn: None, cover: None, epub3: false }
    }

    pub fn author(mut self, name: impl Into<String>, file_as: Option<&str>) -> Self {
        self.authors.push((name.into(), file_as.map(str::to_string)));
        self
    }

    pub fn published(mut self, date: Date) -> Self {
        self.published = Some(date);
        self
    }

    pub fn isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = Some(isbn.into());
        self
    }

    pub fn cover(mut self, jpeg: &[u8]) -> Self {
        self.cover = Some(jpeg.to_vec());
        self
    }

    /// Use EPUB 3 refinements instead of `opf:` attributes.
    pub fn epub3(mut self) -> Self {
        self.epub3 = true;
        self
    }

    pub fn build(&self) -> io::Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("mimetype", stored)?;
        zip.write_all(b"application/epub+zip")?;
        zip.start_file("META-INF/container.xml", deflated)?;
        zip.write_all(CONTAINER.as_bytes())?;
        zip.start_file("OEBPS/content.opf", deflated)?;
        zip.write_all(self.package().as_bytes())?;
        zip.start_file("OEBPS/text/chapter.xhtml", deflated)?;
        zip.write_all(format!(r#"<html xmlns="http://www.w3.org/1999/xhtml"><body><h1>{}</h1></body></html>"#, escape(&self.title)).as_bytes())?;
        if let Some(cover) = &self.cover {
            zip.start_file("OEBPS/images/cover.jpg", stored)?;
            zip.write_all(cover)?;
        }
        Ok(zip.finish()?.into_inner())
    }

    /// Writes the archive to `path` and returns the path.
    pub fn write_to(&self, path: impl AsRef<Path>) -> io::Result<PathBuf> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.build()?)?;
        Ok(path.to_path_buf())
    }

    fn package(&self) -> String {
        let mut metadata = format!("    <dc:title>{}</dc:title>\n", escape(&self.title));
        for (n, (name, file_as)) in self.authors.iter().enumerate() {
            let name = escape(name);
            match (self.epub3, file_as) {
                (false, Some(file_as)) => metadata.push_str(&format!(
                    "    <dc:creator opf:role=\"aut\" opf:file-as=\"{}\">{name}</dc:creator>\n",
                    escape(file_as)
                )),
                (false, None) => metadata.push_str(&format!("    <dc:creator opf:role=\"aut\">{name}</dc:creator>\n")),
                (true, file_as) => {
                    metadata.push_str(&format!("    <dc:creator id=\"creator{n}\">{name}</dc:creator>\n"));
                    if let Some(file_as) = file_as {
                        metadata.push_str(&format!(
                            "    <meta refines=\"#creator{n}\" property=\"file-as\">{}</meta>\n",
                            escape(file_as)
                        ));
                    }
                },
            }
        }
        if let Some(date) = self.published {
            metadata.push_str(&format!("    <dc:date>{date}</dc:date>\n"));
        }
        if let Some(isbn) = &self.isbn {
            metadata.push_str(&format!("    <dc:identifier opf:scheme=\"ISBN\">{}</dc:identifier>\n", escape(isbn)));
        }
        metadata.push_str("    <dc:language>en</dc:language>\n");

        let mut manifest =
            String::from("    <item id=\"chapter\" href=\"text/chapter.xhtml\" media-type=\"application/xhtml+xml\"/>\n");
        if self.cover.is_some() {
            if self.epub3 {
                manifest.push_str(
                    "    <item id=\"cover\" href=\"images/cover.jpg\" media-type=\"image/jpeg\" properties=\"cover-image\"/>\n",
                );
            } else {
                metadata.push_str("    <meta name=\"cover\" content=\"cover\"/>\n");
                manifest.push_str("    <item id=\"cover\" href=\"images/cover.jpg\" media-type=\"image/jpeg\"/>\n");
            }
        }

        let version = if self.epub3 { "3.0" } else { "2.0" };
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://www.idpf.org/2007/opf" xmlns:opf="http://www.idpf.org/2007/opf" version="{version}">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
{metadata}  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine>
    <itemref idref="chapter"/>
  </spine>
</package>
"#
        )
    }
}

const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;
