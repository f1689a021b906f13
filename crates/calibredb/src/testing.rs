//! A stand-in `calibredb` shell script that records its arguments.

use crate::CalibreDb;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub(crate) struct FakeCalibreDb {
    dir: TempDir,
    library: PathBuf,
    script: PathBuf,
}
impl FakeCalibreDb {
    /// A fake that prints `stdout` and exits with `code`; failures also
    /// print a fixed message on stderr.
    pub(crate) fn new(stdout: &str, code: i32) -> Self {
        Self::with_stderr(stdout, if code == 0 { "" } else { "something went wrong" }, code)
    }

    pub(crate) fn with_stderr(stdout: &str, stderr: &str, code: i32) -> Self {
        Self::with_body(|dir| {
            format!(
                "printf '%s\\n' \"$@\" > '{}'\ncat <<'__STDOUT__'\n{stdout}\n__STDOUT__\nprintf '%s' '{stderr}' >&2\nexit {code}\n",
                dir.join("args").display()
            )
        })
    }

    /// A fake that appends `start`, sleeps, then appends `end` to a log file,
    /// so overlapping invocations show up as interleaved lines.
    pub(crate) fn logging_invocations() -> Self {
        Self::with_body(|dir| {
            let log = dir.join("log");
            format!("echo start >> '{0}'\nsleep 0.1\necho end >> '{0}'\n", log.display())
        })
    }

    fn with_body(body: impl FnOnce(&Path) -> String) -> Self {
        let dir = TempDir::new().unwrap();
        let library = dir.path().join("Library");
        fs::create_dir(&library).unwrap();
        let script = dir.path().join("calibredb");
        fs::write(&script, format!("#!/bin/sh\n{}", body(dir.path()))).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        Self { dir, library, script }
    }

    pub(crate) fn root(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn executable(&self) -> PathBuf {
        self.script.clone()
    }

    pub(crate) fn library_str(&self) -> &str {
        self.library.to_str().unwrap()
    }

    pub(crate) fn calibredb(&self) -> CalibreDb {
        CalibreDb::with_executable(self.executable(), &self.library).unwrap()
    }

    /// Lines written by [`FakeCalibreDb::logging_invocations`], in order.
    pub(crate) fn invocation_log(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("log"))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Arguments of the last invocation, empty if the script never ran.
    pub(crate) fn recorded_args(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("args"))
            .map(|args| args.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
