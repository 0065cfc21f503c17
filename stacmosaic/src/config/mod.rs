//! Configuration loading.
//!
//! Two sources feed a run:
//!
//! - [`ConfigFile`]: user settings in INI format (`config.ini`), covering the
//!   catalog endpoint, timeouts, output and logging directories.
//! - [`CollectionRegistry`]: per-collection knowledge in JSON
//!   (`collections.json`), such as how to derive orbit identifiers from item
//!   ids and which bands form the RGB composite at each resolution.
//!
//! Both live under the platform configuration directory, e.g.
//! `~/.config/stacmosaic/` on Linux.

mod collection;
mod file;

use std::path::PathBuf;

use thiserror::Error;

pub use collection::{CollectionConfig, CollectionRegistry, Composite};
pub use file::{
    CatalogSettings, ConfigFile, LoggingSettings, OutputSettings, SearchSettings,
    DEFAULT_CATALOG_URL, DEFAULT_PAGE_LIMIT, DEFAULT_TIMEOUT_SECS,
};

/// Name of the directory holding all configuration files.
pub const CONFIG_DIR_NAME: &str = "stacmosaic";

/// Errors that can occur while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid value '{value}' for {section}.{key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Returns the configuration directory (`<config dir>/stacmosaic`).
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Returns the path of the INI settings file.
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.ini")
}

/// Returns the default path of the collections registry.
pub fn collections_file_path() -> PathBuf {
    config_dir().join("collections.json")
}
