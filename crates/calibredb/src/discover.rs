use crate::error::{ErrorKind, Result};
use std::path::{Path, PathBuf};

const EXECUTABLE: &str = "calibredb";
/// Where the official macOS bundle installs the tool; it is not on `PATH`.
const MACOS_BUNDLE: &str = "/Applications/calibre.app/Contents/MacOS/calibredb";

/// Locates the `calibredb` executable.
///
/// An explicit path wins (and must exist), then `PATH`, then the macOS
/// application bundle.
pub(crate) fn executable(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        tracing::info!(path = %path.display(), "Configured calibredb executable does not exist; searching PATH");
    }
    if let Ok(path) = which::which(EXECUTABLE) {
        return Ok(path);
    }
    tracing::info!("calibredb executable not found in PATH");
    let bundle = Path::new(MACOS_BUNDLE);
    if bundle.is_file() {
        tracing::trace!(path = %bundle.display(), "Discovered calibredb inside the calibre application bundle");
        return Ok(bundle.to_path_buf());
    }
    exn::bail!(ErrorKind::ExecutableNotFound);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_path_wins() {
        let dir = TempDir::new().unwrap();
        let exe = dir.path().join("my-calibredb");
        std::fs::write(&exe, "").unwrap();
        assert_eq!(executable(Some(&exe)).unwrap(), exe);
    }
}
