//! Filesystem helpers for library folders.

use crate::error::{ErrorKind, Result};
use crate::path::validate;
use exn::ResultExt;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;
use tracing::{debug, warn};

/// File name of the cover image inside a book folder.
pub(crate) const COVER_FILE: &str = "cover.jpg";
/// File name of the OPF sidecar inside a book folder.
pub(crate) const SIDECAR_FILE: &str = "metadata.opf";

/// Whether `path` is absent or an empty directory.
pub(crate) fn is_vacant(path: &Path) -> Result<bool> {
    match fs::read_dir(path) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(err) if err.kind() == IoErrorKind::NotFound => Ok(true),
        Err(_) if path.exists() => Ok(false),
        Err(err) => Err(err).or_raise(|| ErrorKind::Io(path.to_path_buf())),
    }
}

/// Recursively copies the directory `src` to `dst`, creating `dst`, and
/// returns the number of files and links copied.
///
/// Symbolic links are copied as links, never followed, so a link loop
/// inside the library cannot recurse. Not atomic: a failure leaves a
/// partial copy.
pub(crate) fn copy_dir(src: &Path, dst: &Path) -> Result<u64> {
    fs::create_dir_all(dst).or_raise(|| ErrorKind::Io(dst.to_path_buf()))?;
    let mut copied = 0;
    for entry in fs::read_dir(src).or_raise(|| ErrorKind::Io(src.to_path_buf()))? {
        let entry = entry.or_raise(|| ErrorKind::Io(src.to_path_buf()))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let file_type = entry.file_type().or_raise(|| ErrorKind::Io(from.clone()))?;
        if file_type.is_symlink() {
            copied += copy_link(&from, &to)?;
        } else if file_type.is_dir() {
            copied += copy_dir(&from, &to)?;
        } else {
            fs::copy(&from, &to).or_raise(|| ErrorKind::Io(from.clone()))?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(unix)]
fn copy_link(from: &Path, to: &Path) -> Result<u64> {
    let target = fs::read_link(from).or_raise(|| ErrorKind::Io(from.to_path_buf()))?;
    std::os::unix::fs::symlink(&target, to).or_raise(|| ErrorKind::Io(to.to_path_buf()))?;
    Ok(1)
}

#[cfg(not(unix))]
fn copy_link(from: &Path, _: &Path) -> Result<u64> {
    warn!(link = %from.display(), "Skipping symbolic link");
    Ok(0)
}

/// Deletes a book folder (relative to `root`) and its parent author folder
/// if that is left empty.
pub(crate) fn remove_book_folder(root: &Path, relative: &str) -> Result<()> {
    let relative = validate(relative)?;
    let folder = root.join(&relative);
    match fs::remove_dir_all(&folder) {
        Ok(()) => debug!(folder = %folder.display(), "Removed book folder"),
        Err(err) if err.kind() == IoErrorKind::NotFound => {
            warn!(folder = %folder.display(), "Book folder already missing");
        },
        Err(err) => return Err(err).or_raise(|| ErrorKind::Io(folder)),
    }
    if let Some(parent) = relative.parent().filter(|p| !p.as_os_str().is_empty()) {
        // Fails while other books of the author remain, which is fine.
        let _ = fs::remove_dir(root.join(parent));
    }
    Ok(())
}
