//! Per-collection settings registry.
//!
//! ```json
//! {
//!   "CBERS-4 WFI 16 days": {
//!     "id": "CB4-16D-2",
//!     "orbit_token": 3,
//!     "nodata": 0,
//!     "exists_geom": true,
//!     "composites": [
//!       { "resolution": 64.0, "bands": ["BAND15", "BAND14", "BAND13"] }
//!     ]
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Tolerance when matching a resolution hint against configured values.
const RESOLUTION_EPSILON: f64 = 1e-6;

/// Band order for the RGB composite at one spatial resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composite {
    /// Resolution in the units of the asset CRS (usually metres).
    pub resolution: f64,
    /// Band asset keys, placed first in this order.
    pub bands: Vec<String>,
}

/// Settings for one catalog collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Catalog collection identifier.
    pub id: String,

    /// Index of the `_`-separated item id token holding the orbit/path.
    #[serde(default)]
    pub orbit_token: Option<usize>,

    /// Keep only this many leading characters of the orbit token.
    #[serde(default)]
    pub orbit_len: Option<usize>,

    /// Source nodata value passed to the raster virtualizer.
    #[serde(default)]
    pub nodata: Option<f64>,

    #[serde(default)]
    pub composites: Vec<Composite>,

    /// Item geometries describe the data footprint. When false, footprints
    /// are read from the rasters.
    #[serde(default = "default_true")]
    pub exists_geom: bool,
}

fn default_true() -> bool {
    true
}

impl CollectionConfig {
    /// Creates settings for a collection with no special handling.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            orbit_token: None,
            orbit_len: None,
            nodata: None,
            composites: Vec::new(),
            exists_geom: true,
        }
    }

    pub fn with_orbit_token(mut self, index: usize, len: Option<usize>) -> Self {
        self.orbit_token = Some(index);
        self.orbit_len = len;
        self
    }

    pub fn with_exists_geom(mut self, exists_geom: bool) -> Self {
        self.exists_geom = exists_geom;
        self
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    pub fn with_composite(mut self, resolution: f64, bands: &[&str]) -> Self {
        self.composites.push(Composite {
            resolution,
            bands: bands.iter().map(|b| b.to_string()).collect(),
        });
        self
    }

    /// Composite band order for `resolution`, if one is configured.
    pub fn composite_for(&self, resolution: Option<f64>) -> Option<&[String]> {
        let resolution = resolution?;
        self.composites
            .iter()
            .find(|c| (c.resolution - resolution).abs() < RESOLUTION_EPSILON)
            .map(|c| c.bands.as_slice())
    }

    /// Extracts the orbit/path identifier from an item id.
    pub fn orbit_from_id(&self, item_id: &str) -> Option<String> {
        let index = self.orbit_token?;
        let token = item_id.split('_').nth(index)?;
        let token = match self.orbit_len {
            Some(len) => token.chars().take(len).collect(),
            None => token.to_string(),
        };
        Some(token)
    }
}

/// Named collection settings loaded from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionRegistry {
    collections: BTreeMap<String, CollectionConfig>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the registry from `path`. A missing file yields an empty registry.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn insert(&mut self, name: impl Into<String>, config: CollectionConfig) {
        self.collections.insert(name.into(), config);
    }

    /// Looks up a collection by registry name or by catalog id.
    pub fn get(&self, name: &str) -> Option<&CollectionConfig> {
        self.collections
            .get(name)
            .or_else(|| self.collections.values().find(|c| c.id == name))
    }

    /// Settings for `name`, falling back to a plain collection with that id.
    pub fn resolve(&self, name: &str) -> CollectionConfig {
        self.get(name)
            .cloned()
            .unwrap_or_else(|| CollectionConfig::new(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CollectionConfig)> {
        self.collections.iter()
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = r#"{
        "CBERS-4 WFI": {
            "id": "CB4-16D-2",
            "orbit_token": 3,
            "orbit_len": 3,
            "nodata": 0,
            "composites": [
                { "resolution": 64.0, "bands": ["BAND15", "BAND14", "BAND13"] }
            ]
        },
        "Sentinel-2": { "id": "S2-16D-2", "exists_geom": false }
    }"#;

    #[test]
    fn test_parse_registry() {
        let registry: CollectionRegistry = serde_json::from_str(REGISTRY).unwrap();
        assert_eq!(registry.len(), 2);

        let cb4 = registry.get("CBERS-4 WFI").unwrap();
        assert_eq!(cb4.id, "CB4-16D-2");
        assert_eq!(cb4.nodata, Some(0.0));
        assert!(cb4.exists_geom);

        let s2 = registry.get("Sentinel-2").unwrap();
        assert!(s2.composites.is_empty());
        assert_eq!(s2.orbit_token, None);
        assert!(!s2.exists_geom);
    }

    #[test]
    fn test_get_by_catalog_id() {
        let registry: CollectionRegistry = serde_json::from_str(REGISTRY).unwrap();
        assert_eq!(registry.get("CB4-16D-2").unwrap().orbit_token, Some(3));
    }

    #[test]
    fn test_resolve_unknown_falls_back() {
        let registry = CollectionRegistry::new();
        let config = registry.resolve("LANDSAT-8");
        assert_eq!(config, CollectionConfig::new("LANDSAT-8"));
    }

    #[test]
    fn test_composite_lookup() {
        let config = CollectionConfig::new("CB4").with_composite(64.0, &["B15", "B14", "B13"]);
        assert_eq!(
            config.composite_for(Some(64.0)).unwrap(),
            &["B15".to_string(), "B14".to_string(), "B13".to_string()]
        );
        assert!(config.composite_for(Some(10.0)).is_none());
        assert!(config.composite_for(None).is_none());
    }

    #[test]
    fn test_orbit_from_id() {
        let config = CollectionConfig::new("CB4").with_orbit_token(3, Some(3));
        assert_eq!(
            config.orbit_from_id("CBERS4_WFI_20200711_157123_L4").as_deref(),
            Some("157")
        );
        assert_eq!(config.orbit_from_id("too_short"), None);
        assert_eq!(CollectionConfig::new("X").orbit_from_id("a_b_c_d"), None);
    }

    #[test]
    fn test_load_missing_registry_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = CollectionRegistry::load_from(&dir.path().join("none.json")).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_load_invalid_registry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collections.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            CollectionRegistry::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
