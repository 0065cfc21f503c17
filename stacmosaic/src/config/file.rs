//! INI settings file.
//!
//! ```ini
//! [catalog]
//! url = https://data.inpe.br/bdc/stac/v1
//! timeout = 10
//! page_limit = 10
//! retries = 1
//! verify_ssl = true
//! collections_file = /home/user/.config/stacmosaic/collections.json
//!
//! [output]
//! directory = /home/user/mosaics
//!
//! [logging]
//! directory = /home/user/.cache/stacmosaic/logs
//! filter = stacmosaic=info
//!
//! [search]
//! reuse_last_search = true
//! ```
//!
//! Missing sections or keys keep their defaults; present but malformed values
//! are reported as [`ConfigError::InvalidValue`].

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};

use super::{collections_file_path, config_file_path, ConfigError, CONFIG_DIR_NAME};
use crate::catalog::CatalogConfig;

/// Default STAC endpoint (Brazil Data Cube).
pub const DEFAULT_CATALOG_URL: &str = "https://data.inpe.br/bdc/stac/v1";

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default number of items requested per page.
pub const DEFAULT_PAGE_LIMIT: usize = 10;

/// Default number of retries after a page request times out.
pub const DEFAULT_RETRIES: u32 = 1;

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "stacmosaic=info";

/// `[catalog]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSettings {
    pub url: String,
    pub timeout: Duration,
    pub page_limit: usize,
    pub retries: u32,
    pub verify_ssl: bool,
    pub collections_file: PathBuf,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_CATALOG_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            page_limit: DEFAULT_PAGE_LIMIT,
            retries: DEFAULT_RETRIES,
            verify_ssl: true,
            collections_file: collections_file_path(),
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSettings {
    /// Root directory for virtual rasters and footprint layers.
    pub directory: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(CONFIG_DIR_NAME)
                .join("mosaics"),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(CONFIG_DIR_NAME)
                .join("logs"),
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// `[search]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSettings {
    /// Skip the catalog when the previous run searched the same area and dates.
    pub reuse_last_search: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            reuse_last_search: true,
        }
    }
}

/// All user settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub catalog: CatalogSettings,
    pub output: OutputSettings,
    pub logging: LoggingSettings,
    pub search: SearchSettings,
}

impl ConfigFile {
    /// Loads settings from the default path.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Loads settings from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&text).map_err(|e| match e {
            ConfigError::Parse { reason, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parses settings from INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;

        let mut config = Self::default();

        if let Some(section) = ini.section(Some("catalog")) {
            let catalog = &mut config.catalog;
            if let Some(url) = section.get("url") {
                catalog.url = url.trim_end_matches('/').to_string();
            }
            if let Some(secs) = parse_key::<u64>(section, "catalog", "timeout")? {
                if secs == 0 {
                    return Err(invalid("catalog", "timeout", "0", "must be positive"));
                }
                catalog.timeout = Duration::from_secs(secs);
            }
            if let Some(limit) = parse_key::<usize>(section, "catalog", "page_limit")? {
                if limit == 0 {
                    return Err(invalid("catalog", "page_limit", "0", "must be positive"));
                }
                catalog.page_limit = limit;
            }
            if let Some(retries) = parse_key::<u32>(section, "catalog", "retries")? {
                catalog.retries = retries;
            }
            if let Some(verify) = parse_bool(section, "catalog", "verify_ssl")? {
                catalog.verify_ssl = verify;
            }
            if let Some(path) = section.get("collections_file") {
                catalog.collections_file = PathBuf::from(path);
            }
        }

        if let Some(section) = ini.section(Some("output")) {
            if let Some(dir) = section.get("directory") {
                config.output.directory = PathBuf::from(dir);
            }
        }

        if let Some(section) = ini.section(Some("logging")) {
            if let Some(dir) = section.get("directory") {
                config.logging.directory = PathBuf::from(dir);
            }
            if let Some(filter) = section.get("filter") {
                config.logging.filter = filter.to_string();
            }
        }

        if let Some(section) = ini.section(Some("search")) {
            if let Some(reuse) = parse_bool(section, "search", "reuse_last_search")? {
                config.search.reuse_last_search = reuse;
            }
        }

        Ok(config)
    }

    /// Renders the settings as INI.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        ini.with_section(Some("catalog"))
            .set("url", self.catalog.url.as_str())
            .set("timeout", self.catalog.timeout.as_secs().to_string())
            .set("page_limit", self.catalog.page_limit.to_string())
            .set("retries", self.catalog.retries.to_string())
            .set("verify_ssl", self.catalog.verify_ssl.to_string())
            .set(
                "collections_file",
                self.catalog.collections_file.to_string_lossy(),
            );
        ini.with_section(Some("output"))
            .set("directory", self.output.directory.to_string_lossy());
        ini.with_section(Some("logging"))
            .set("directory", self.logging.directory.to_string_lossy())
            .set("filter", self.logging.filter.as_str());
        ini.with_section(Some("search")).set(
            "reuse_last_search",
            self.search.reuse_last_search.to_string(),
        );
        ini
    }

    /// Writes the settings to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        self.to_ini().write_to_file(path).map_err(io_err)
    }

    /// Flattened `section.key = value` pairs, in file order.
    pub fn entries(&self) -> Vec<(String, String)> {
        let ini = self.to_ini();
        let mut entries = Vec::new();
        for (section, props) in ini.iter() {
            let section = section.unwrap_or_default();
            for (key, value) in props.iter() {
                entries.push((format!("{}.{}", section, key), value.to_string()));
            }
        }
        entries
    }

    /// Catalog client settings derived from the `[catalog]` section.
    pub fn catalog_config(&self) -> CatalogConfig {
        CatalogConfig::new(&self.catalog.url)
            .with_timeout(self.catalog.timeout)
            .with_page_limit(self.catalog.page_limit)
            .with_retries(self.catalog.retries)
            .with_verify_ssl(self.catalog.verify_ssl)
    }
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_key<T>(props: &Properties, section: &str, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    props
        .get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| invalid(section, key, raw, &e.to_string()))
        })
        .transpose()
}

fn parse_bool(props: &Properties, section: &str, key: &str) -> Result<Option<bool>, ConfigError> {
    props
        .get(key)
        .map(|raw| match raw.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(invalid(section, key, raw, "expected true or false")),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConfigFile::default();
        assert_eq!(config.catalog.url, DEFAULT_CATALOG_URL);
        assert_eq!(config.catalog.timeout, Duration::from_secs(10));
        assert_eq!(config.catalog.page_limit, 10);
        assert_eq!(config.catalog.retries, 1);
        assert!(config.search.reuse_last_search);
    }

    #[test]
    fn test_parse_overrides() {
        let text = "\
[catalog]
url = https://example.com/stac/
timeout = 30
page_limit = 50
verify_ssl = no

[output]
directory = /tmp/mosaics

[search]
reuse_last_search = false
";
        let config = ConfigFile::parse(text).unwrap();
        assert_eq!(config.catalog.url, "https://example.com/stac");
        assert_eq!(config.catalog.timeout, Duration::from_secs(30));
        assert_eq!(config.catalog.page_limit, 50);
        assert!(!config.catalog.verify_ssl);
        assert_eq!(config.output.directory, PathBuf::from("/tmp/mosaics"));
        assert!(!config.search.reuse_last_search);
        // Untouched keys keep defaults
        assert_eq!(config.catalog.retries, DEFAULT_RETRIES);
    }

    #[test]
    fn test_parse_rejects_bad_number() {
        let err = ConfigFile::parse("[catalog]\ntimeout = soon\n").unwrap_err();
        match err {
            ConfigError::InvalidValue { section, key, .. } => {
                assert_eq!(section, "catalog");
                assert_eq!(key, "timeout");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_rejects_zero_page_limit() {
        assert!(ConfigFile::parse("[catalog]\npage_limit = 0\n").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_bool() {
        assert!(ConfigFile::parse("[search]\nreuse_last_search = maybe\n").is_err());
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.catalog.page_limit = 25;
        config.output.directory = PathBuf::from("/data/out");
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded.catalog.page_limit, 25);
        assert_eq!(loaded.output.directory, PathBuf::from("/data/out"));
    }

    #[test]
    fn test_entries_are_qualified() {
        let entries = ConfigFile::default().entries();
        assert!(entries.iter().any(|(k, _)| k == "catalog.url"));
        assert!(entries.iter().any(|(k, _)| k == "search.reuse_last_search"));
    }

    #[test]
    fn test_catalog_config_from_file() {
        let config = ConfigFile::parse("[catalog]\ntimeout = 5\npage_limit = 20\n").unwrap();
        let catalog = config.catalog_config();
        assert_eq!(catalog.timeout, Duration::from_secs(5));
        assert_eq!(catalog.page_limit, 20);
    }
}
