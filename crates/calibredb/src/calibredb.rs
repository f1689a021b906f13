use crate::discover;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, instrument, warn};

/// A handle on one library, driven through the `calibredb` tool.
///
/// The tool refuses concurrent access to a library, so every invocation
/// holds the instance lock for the whole lifetime of the child process.
/// No timeout is applied: a hung process blocks later calls on the same
/// instance.
#[derive(Debug)]
pub struct CalibreDb {
    executable: PathBuf,
    library: PathBuf,
    lock: Mutex<()>,
}
impl CalibreDb {
    /// Opens `library` with a discovered `calibredb` executable.
    pub fn new(library: impl Into<PathBuf>) -> Result<Self> {
        Self::with_executable(discover::executable(None)?, library)
    }

    /// Opens `library` with an explicit (or discovered, if `None`) executable.
    pub fn with_executable(executable: impl Into<Option<PathBuf>>, library: impl Into<PathBuf>) -> Result<Self> {
        let executable = discover::executable(executable.into().as_deref())?;
        let library = library.into();
        if !library.is_dir() {
            exn::bail!(ErrorKind::LibraryNotFound(library));
        }
        Ok(Self { executable, library, lock: Mutex::new(()) })
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn library(&self) -> &Path {
        &self.library
    }

    /// Clones the library settings into a new, empty library at `dest`
    /// (`calibredb clone`). Books are not copied.
    #[instrument(skip(self), fields(library = %self.library.display()))]
    pub fn clone_to(&self, dest: impl AsRef<Path> + std::fmt::Debug) -> Result<CalibreDb> {
        let dest = dest.as_ref();
        self.run([OsStr::new("clone"), dest.as_os_str()])?;
        Self::with_executable(self.executable.clone(), dest)
    }

    /// Creates a new empty library at `dest` from the library folder
    /// `template` with a `calibredb clone`.
    pub fn clone_template(&self, template: &Path, dest: &Path) -> Result<CalibreDb> {
        Self::with_executable(self.executable.clone(), template)?.clone_to(dest)
    }

    /// Adds e-book files to the library and returns the new book ids.
    #[instrument(skip_all, fields(library = %self.library.display(), files = paths.len()))]
    pub fn add(&self, paths: &[PathBuf]) -> Result<Vec<i64>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let mut args = vec![OsStr::new("add")];
        args.extend(paths.iter().map(|p| p.as_os_str()));
        let stdout = self.run(args)?;
        added_ids(&stdout)
    }

    /// Removes books by id. Unknown ids are left to the tool to report.
    #[instrument(skip(self), fields(library = %self.library.display()))]
    pub fn remove(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
        self.run(["remove", ids.as_str()])?;
        Ok(())
    }

    /// Runs `calibredb --with-library <library> <args...>` and returns stdout.
    pub(crate) fn run<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.executable);
        command.arg("--with-library").arg(&self.library).args(args);
        let line = command_line(&command);
        debug!(command = %line, "Running calibredb");

        let output = {
            // The guard protects no data, so a poisoned lock is still usable.
            let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
            command.output().or_raise(|| ErrorKind::Spawn(self.executable.clone()))?
        };
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            exn::bail!(ErrorKind::Failed { command: line, code: output.status.code(), stdout, stderr });
        }
        if !stderr.trim().is_empty() {
            warn!(command = %line, stderr = %stderr.trim(), "calibredb succeeded with warnings");
        }
        Ok(stdout)
    }
}

fn command_line(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses the `Added book ids: 1, 2` line printed by `calibredb add`.
///
/// No such line means nothing was added; an id that is not a number is a
/// decode error.
fn added_ids(stdout: &str) -> Result<Vec<i64>> {
    let Some(ids) = stdout.lines().find_map(|line| line.trim().strip_prefix("Added book ids:")) else {
        return Ok(Vec::new());
    };
    ids.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| id.parse::<i64>().or_raise(|| ErrorKind::Decode))
        .collect()
}
