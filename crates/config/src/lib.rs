//! Layered configuration.
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults;
//! 2. `config.toml`, `config.yaml` and `config.json` in the user's
//!    configuration directory (e.g. `~/.config/bindery` on Linux);
//! 3. an explicit file (`--config`);
//! 4. `BINDERY_*` environment variables, with `__` separating nested keys
//!    (`BINDERY_LAYOUT__FOLDER`).

pub mod error;

use crate::error::{ErrorKind, Result};
use bindery_library::{BackendKind, LayoutTemplates, LibraryOptions};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Prefix of the environment variables read.
pub const ENV_PREFIX: &str = "BINDERY_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Library folder used when none is given on the command line.
    pub library: Option<PathBuf>,
    pub backend: BackendKind,
    /// Path of the `calibredb` executable; discovered on `PATH` when unset.
    pub calibredb: Option<PathBuf>,
    pub layout: LayoutTemplates,
}
impl Config {
    pub fn library_options(&self) -> LibraryOptions {
        LibraryOptions { calibredb: self.calibredb.clone(), layout: self.layout.clone() }
    }
}

/// Builds the layered [`Figment`] and extracts a [`Config`] from it.
#[derive(Debug, Clone)]
pub struct Loader {
    config_dir: Option<PathBuf>,
    file: Option<PathBuf>,
}
impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}
impl Loader {
    pub fn new() -> Self {
        let config_dir = ProjectDirs::from("", "", "bindery").map(|dirs| dirs.config_dir().to_path_buf());
        Self { config_dir, file: None }
    }

    /// Overrides the per-user configuration directory.
    pub fn config_dir(mut self, dir: impl Into<Option<PathBuf>>) -> Self {
        self.config_dir = dir.into();
        self
    }

    /// An explicit configuration file, which must exist.
    pub fn file(mut self, path: impl Into<Option<PathBuf>>) -> Self {
        self.file = path.into();
        self
    }

    pub fn figment(&self) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(dir) = &self.config_dir {
            debug!(dir = %dir.display(), "Reading user configuration");
            figment = figment
                .merge(Toml::file(dir.join("config.toml")))
                .merge(Yaml::file(dir.join("config.yaml")))
                .merge(Json::file(dir.join("config.json")));
        }
        if let Some(file) = &self.file {
            figment = figment.merge(explicit(file)?);
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn load(&self) -> Result<Config> {
        self.figment()?.extract().or_raise(|| ErrorKind::Invalid)
    }
}

/// Loads the configuration from the default locations plus `file`.
pub fn load(file: Option<&Path>) -> Result<Config> {
    Loader::new().file(file.map(Path::to_path_buf)).load()
}

fn explicit(path: &Path) -> Result<Figment> {
    if !path.is_file() {
        exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
    }
    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    Ok(match extension.as_deref() {
        Some("toml") => Figment::from(Toml::file(path)),
        Some("yaml" | "yml") => Figment::from(Yaml::file(path)),
        Some("json") => Figment::from(Json::file(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
    })
}
