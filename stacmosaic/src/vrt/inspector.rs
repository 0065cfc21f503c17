//! Reading georeferencing from a raster itself.
//!
//! Used when catalog items lack `proj:*` metadata or a trustworthy footprint.

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::virtualizer::gdal_path;
use crate::geo::Geometry;

/// Georeferencing read from a raster.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RasterInfo {
    /// `AUTHORITY:CODE`, e.g. `EPSG:32723`.
    pub crs: Option<String>,
    /// Pixel width in CRS units.
    pub resolution: Option<f64>,
    /// Extent in WGS84.
    pub footprint: Option<Geometry>,
}

impl RasterInfo {
    /// Extracts georeferencing from `gdalinfo -json` output.
    pub fn from_gdalinfo(info: &Value) -> Self {
        let crs = info
            .pointer("/stac/proj:epsg")
            .and_then(Value::as_i64)
            .map(|code| format!("EPSG:{}", code))
            .or_else(|| {
                info.pointer("/coordinateSystem/wkt")
                    .and_then(Value::as_str)
                    .and_then(epsg_from_wkt)
            });

        let resolution = info
            .get("geoTransform")
            .and_then(Value::as_array)
            .and_then(|t| t.get(1))
            .and_then(Value::as_f64)
            .map(f64::abs)
            .filter(|r| *r > 0.0);

        let footprint = info
            .get("wgs84Extent")
            .and_then(|extent| Geometry::from_geojson(extent).ok());

        Self {
            crs,
            resolution,
            footprint,
        }
    }
}

/// The last `ID["EPSG",n]` of a WKT2 string identifies the whole CRS.
fn epsg_from_wkt(wkt: &str) -> Option<String> {
    let start = wkt.rfind("ID[\"EPSG\",")? + "ID[\"EPSG\",".len();
    let code: String = wkt[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    (!code.is_empty()).then(|| format!("EPSG:{}", code))
}

/// Errors raised by a [`RasterInspector`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InspectError {
    #[error("Failed to run {program}: {reason}")]
    Launch { program: String, reason: String },

    #[error("{program} exited with status {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Unreadable output for {source_href}: {reason}")]
    Parse { source_href: String, reason: String },
}

/// Reads georeferencing from a raster by href.
pub trait RasterInspector: Send + Sync {
    fn inspect(&self, href: &str) -> Result<RasterInfo, InspectError>;
}

impl<T: RasterInspector + ?Sized> RasterInspector for Arc<T> {
    fn inspect(&self, href: &str) -> Result<RasterInfo, InspectError> {
        (**self).inspect(href)
    }
}

/// Runs GDAL's `gdalinfo -json`.
#[derive(Debug, Clone)]
pub struct GdalInfo {
    program: PathBuf,
}

impl Default for GdalInfo {
    fn default() -> Self {
        Self {
            program: PathBuf::from("gdalinfo"),
        }
    }
}

impl GdalInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl RasterInspector for GdalInfo {
    fn inspect(&self, href: &str) -> Result<RasterInfo, InspectError> {
        let program = self.program.display().to_string();
        debug!(program = %program, href, "Inspecting raster");

        let result = Command::new(&self.program)
            .arg("-json")
            .arg(gdal_path(href))
            .output()
            .map_err(|e| InspectError::Launch {
                program: program.clone(),
                reason: e.to_string(),
            })?;

        if !result.status.success() {
            return Err(InspectError::Failed {
                program,
                code: result.status.code(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        let info: Value =
            serde_json::from_slice(&result.stdout).map_err(|e| InspectError::Parse {
                source_href: href.to_string(),
                reason: e.to_string(),
            })?;
        Ok(RasterInfo::from_gdalinfo(&info))
    }
}
