//! The configuration files pass.
//!
//! The files are taken from a search list, in its order. Files that don't exist are silently
//! skipped, so the list can name all the places where a configuration *might* be. The ones that
//! exist are parsed according to their extension:
//!
//! * `.yaml` and `.yml` as YAML (with the `yaml` feature).
//! * `.json` as JSON (with the `json` feature).
//!
//! Anything else is an error ([`UnknownFileType`]), as is a file that doesn't hold a map at the
//! top level ([`NotAMap`]). Errors from the parsers are passed through unchanged.
//!
//! The files are merged only at the top level. If two files both set `server`, the whole `server`
//! of the later one wins, nothing of the earlier one is kept.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use fallible_iterator::FallibleIterator;
use log::{trace, warn};

use crate::error::{AnyError, NotAMap, UnknownFileType};
use crate::value::{Map, Value};

/// A format of configuration files.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Format {
    #[cfg(feature = "yaml")]
    Yaml,
    #[cfg(feature = "json")]
    Json,
}

impl Format {
    /// Picks the format by the (case insensitive) extension of the path.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            #[cfg(feature = "yaml")]
            "yaml" | "yml" => Some(Format::Yaml),
            #[cfg(feature = "json")]
            "json" => Some(Format::Json),
            _ => None,
        }
    }

    fn parse(self, contents: &str) -> Result<Value, AnyError> {
        match self {
            #[cfg(feature = "yaml")]
            Format::Yaml => Ok(serde_yaml::from_str(contents)?),
            #[cfg(feature = "json")]
            Format::Json => Ok(serde_json::from_str(contents)?),
        }
    }
}

/// The search list used unless the application sets its own.
///
/// In the current directory:
///
/// * `config.yaml`
/// * `config.json`
/// * `config/config.yaml`
/// * `config/config.json`
pub fn default_paths() -> Vec<PathBuf> {
    let cwd = env::current_dir().unwrap_or_else(|e| {
        warn!(
            "Config files are searched for in relative paths. Couldn't read current dir: {}",
            e,
        );
        PathBuf::new()
    });
    [
        "config.yaml",
        "config.json",
        "config/config.yaml",
        "config/config.json",
    ]
    .iter()
    .map(|name| cwd.join(name))
    .collect()
}

fn read_file(path: &Path) -> Result<Option<Map>, AnyError> {
    if !path.exists() {
        trace!("Skipping missing config file {:?}", path);
        return Ok(None);
    }
    let format = Format::from_path(path).ok_or_else(|| UnknownFileType(path.to_owned()))?;
    trace!("Loading config file {:?} as {:?}", path, format);
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Some(Map::new()));
    }
    match format.parse(&contents)? {
        Value::Map(map) => Ok(Some(map)),
        Value::Null => Ok(Some(Map::new())),
        _ => Err(NotAMap(path.to_owned()).into()),
    }
}

/// Reads all the existing files and merges them, later ones winning at the top level.
pub(crate) fn load(files: &[PathBuf]) -> Result<Map, AnyError> {
    fallible_iterator::convert(files.iter().map(Ok::<_, AnyError>))
        .filter_map(|path| read_file(path))
        .fold(Map::new(), |mut merged, map| {
            merged.extend(map);
            Ok(merged)
        })
}
