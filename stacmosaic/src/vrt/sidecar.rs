//! Metadata files written next to the rasters.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::catalog::SceneSet;

/// Extension tag marking files written by this crate.
pub const SIDECAR_TAG: &str = "stacmosaic";

/// What a virtual raster references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    /// Remote catalog assets.
    #[serde(rename = "URL")]
    Url,
    /// Other virtual rasters on disk.
    #[serde(rename = "VRT")]
    Vrt,
}

/// Contents of `<raster>.stacmosaic.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sidecar {
    pub collection_id: String,
    pub source_type: SourceType,
}

pub fn sidecar_path(raster: &Path) -> PathBuf {
    let mut name = raster.as_os_str().to_owned();
    name.push(format!(".{}.json", SIDECAR_TAG));
    PathBuf::from(name)
}

/// Writes the sidecar for `raster` and returns its path.
pub fn write_sidecar(raster: &Path, sidecar: &Sidecar) -> io::Result<PathBuf> {
    let path = sidecar_path(raster);
    let text = serde_json::to_string_pretty(sidecar).map_err(io::Error::other)?;
    fs::write(&path, text)?;
    Ok(path)
}

/// Writes the footprints of `scenes` as a GeoJSON `FeatureCollection`.
pub fn write_footprints(path: &Path, collection_id: &str, scenes: &SceneSet) -> io::Result<()> {
    let features: Vec<_> = scenes
        .iter()
        .map(|scene| {
            json!({
                "type": "Feature",
                "id": scene.id,
                "geometry": scene.footprint.to_geojson(),
                "properties": {
                    "id": scene.id,
                    "collection": collection_id,
                    "date": scene.date.to_string(),
                    "orbit": scene.orbit,
                    "crs": scene.crs,
                    "resolution": scene.resolution,
                    "bands": scene.assets.iter().map(|a| a.key.as_str()).collect::<Vec<_>>(),
                }
            })
        })
        .collect();

    let collection = json!({
        "type": "FeatureCollection",
        "features": features,
    });
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string(&collection).map_err(io::Error::other)?;
    fs::write(path, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_scene as scene;

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("/out/m.vrt")),
            PathBuf::from("/out/m.vrt.stacmosaic.json")
        );
    }

    #[test]
    fn test_write_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let raster = dir.path().join("m.vrt");
        let path = write_sidecar(
            &raster,
            &Sidecar {
                collection_id: "CB4".to_string(),
                source_type: SourceType::Vrt,
            },
        )
        .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["collection_id"], "CB4");
        assert_eq!(value["source_type"], "VRT");
    }

    #[test]
    fn test_write_footprints() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("footprint.x.geojson");
        let scenes: SceneSet = vec![
            scene("a", "2024-01-02", "1", 0.0, 0.0),
            scene("b", "2024-01-02", "1", 1.0, 0.0),
        ]
        .into_iter()
        .collect();

        write_footprints(&path, "CB4", &scenes).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"].as_array().unwrap().len(), 2);
        assert_eq!(value["features"][0]["geometry"]["type"], "Polygon");
        assert_eq!(value["features"][1]["properties"]["bands"][1], "B2");
    }
}
