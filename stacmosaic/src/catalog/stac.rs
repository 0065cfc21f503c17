//! STAC API wire types.
//!
//! Only the fields the pipeline reads are modelled; everything else in the
//! documents is ignored.

use serde::Deserialize;
use serde_json::{Map, Value};

/// A page of search results (`FeatureCollection`).
#[derive(Debug, Clone, Deserialize)]
pub struct ItemCollection {
    #[serde(default)]
    pub features: Vec<Item>,

    #[serde(default)]
    pub links: Vec<Link>,

    /// STAC API context extension.
    #[serde(default)]
    pub context: Option<SearchContext>,

    #[serde(default, rename = "numberMatched")]
    pub number_matched: Option<u64>,

    #[serde(default, rename = "numberReturned")]
    pub number_returned: Option<u64>,
}

impl ItemCollection {
    /// Total number of items matching the search, if the server reports it.
    pub fn matched(&self) -> Option<u64> {
        self.context
            .as_ref()
            .and_then(|c| c.matched)
            .or(self.number_matched)
    }

    /// Href of the `rel="next"` link.
    pub fn next_href(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.rel == "next")
            .map(|l| l.href.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchContext {
    #[serde(default)]
    pub matched: Option<u64>,
    #[serde(default)]
    pub returned: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(default)]
    pub method: Option<String>,
}

/// A STAC item (`Feature`).
#[derive(Debug, Clone, Deserialize)]
pub struct Item {
    pub id: String,

    #[serde(default)]
    pub geometry: Option<Value>,

    #[serde(default)]
    pub bbox: Option<Vec<f64>>,

    #[serde(default)]
    pub properties: Map<String, Value>,

    /// Assets in document order.
    #[serde(default)]
    pub assets: Map<String, Value>,
}

/// The asset fields used to select raster bands.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemAsset {
    pub href: String,

    #[serde(default, rename = "type")]
    pub media_type: Option<String>,

    #[serde(default)]
    pub roles: Vec<String>,

    #[serde(default)]
    pub gsd: Option<f64>,

    #[serde(default, rename = "proj:epsg")]
    pub epsg: Option<i64>,

    #[serde(default, rename = "proj:code")]
    pub proj_code: Option<String>,
}

impl ItemAsset {
    /// Returns true for GeoTIFF assets that can be read remotely.
    pub fn is_raster(&self) -> bool {
        let media = self.media_type.as_deref().unwrap_or_default();
        let tiff = media.contains("profile=cloud-optimized") || media.starts_with("image/tiff");
        let auxiliary = self
            .roles
            .iter()
            .any(|r| r == "thumbnail" || r == "overview" || r == "metadata");
        tiff && !auxiliary
    }
}

/// Collection document, read for its band metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionDocument {
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub summaries: Map<String, Value>,
}

/// One `eo:bands` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct BandInfo {
    pub name: String,
    #[serde(default)]
    pub common_name: Option<String>,
    #[serde(default)]
    pub resolution_x: Option<f64>,
}

impl CollectionDocument {
    /// Band descriptions from `properties` or `summaries`.
    pub fn bands(&self) -> Vec<BandInfo> {
        self.properties
            .get("eo:bands")
            .or_else(|| self.summaries.get("eo:bands"))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }
}
