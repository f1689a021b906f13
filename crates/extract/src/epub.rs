use crate::error::{ErrorKind, Result};
use crate::models::{Cover, Metadata};
use crate::opf::{self, CONTAINER_PATH};
use exn::ResultExt;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use tracing::{debug, instrument, warn};
use zip::ZipArchive;

/// Reads the package metadata and cover image of an EPUB file.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub(crate) fn read(path: &Path) -> Result<Metadata> {
    let file = File::open(path).or_raise(|| ErrorKind::Unreadable(path.to_path_buf()))?;
    let mut archive = ZipArchive::new(BufReader::new(file)).or_raise(|| ErrorKind::InvalidArchive)?;

    let package_path = opf::rootfile(&read_text(&mut archive, CONTAINER_PATH)?)?;
    debug!(package = %package_path, "found package document");
    let package = opf::package(&read_text(&mut archive, &package_path)?)?;

    // A broken cover reference should not prevent cataloguing the book.
    let cover = match package.cover() {
        Some(item) => {
            let href = opf::resolve_href(&package_path, &item.href);
            match read_entry(&mut archive, &href) {
                Ok(data) => Some(Cover { media_type: item.media_type.clone(), data }),
                Err(err) => {
                    warn!(cover = %href, error = %err, "cover image declared but unreadable");
                    None
                },
            }
        },
        None => None,
    };

    Ok(Metadata {
        title: package.title.unwrap_or_default(),
        authors: package.creators,
        published: package.date,
        isbn: package.isbn,
        language: package.language,
        cover,
    })
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut entry = archive.by_name(name).or_raise(|| ErrorKind::MissingEntry(name.to_string()))?;
    let mut data = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or_default());
    entry.read_to_end(&mut data).or_raise(|| ErrorKind::InvalidArchive)?;
    Ok(data)
}

fn read_text<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String> {
    let data = read_entry(archive, name)?;
    Ok(String::from_utf8_lossy(&data).trim_start_matches('\u{feff}').to_string())
}
