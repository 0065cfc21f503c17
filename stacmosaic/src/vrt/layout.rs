//! Where virtual rasters are written.
//!
//! ```text
//! <root>/
//!   footprint.<search tag>.geojson
//!   <search tag>/
//!     <mosaic name>.vrt
//!     <mosaic name>/
//!       <scene id>_<res>.vrt
//! ```

use std::path::{Path, PathBuf};

use crate::catalog::{Scene, SearchRequest};
use crate::mosaic::MosaicKey;

/// Output paths for one search.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputLayout {
    root: PathBuf,
    search_tag: String,
    collection: String,
    resolution_tag: String,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>, request: &SearchRequest, collection_id: &str) -> Self {
        let resolution_tag = match request.resolution() {
            Some(r) if r.fract() == 0.0 => format!("{:.0}", r),
            Some(r) => r.to_string(),
            None => "native".to_string(),
        };
        Self {
            root: root.into(),
            search_tag: path_safe(&request.search_tag()),
            collection: path_safe(collection_id),
            resolution_tag,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every raster of the search.
    pub fn search_dir(&self) -> PathBuf {
        self.root.join(&self.search_tag)
    }

    pub fn footprint_path(&self) -> PathBuf {
        self.root
            .join(format!("footprint.{}.geojson", self.search_tag))
    }

    /// `<collection>.<date>_<orbit>_<crs>_<res>`
    pub fn mosaic_name(&self, key: &MosaicKey) -> String {
        format!(
            "{}.{}_{}",
            self.collection,
            path_safe(&key.tag()),
            self.resolution_tag
        )
    }

    pub fn mosaic_path(&self, mosaic_name: &str) -> PathBuf {
        self.search_dir().join(format!("{}.vrt", mosaic_name))
    }

    /// Directory holding the scene rasters of one mosaic.
    pub fn mosaic_dir(&self, mosaic_name: &str) -> PathBuf {
        self.search_dir().join(mosaic_name)
    }

    pub fn scene_path(&self, mosaic_name: &str, scene: &Scene) -> PathBuf {
        self.mosaic_dir(mosaic_name).join(format!(
            "{}_{}.vrt",
            path_safe(&scene.id),
            self.resolution_tag
        ))
    }
}

/// Replaces characters that are awkward in file names.
fn path_safe(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}
