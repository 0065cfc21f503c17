//! Virtual raster assembly.
//!
//! Each scene becomes a small VRT stacking its band assets, read remotely
//! through GDAL's curl filesystem; each mosaic is a VRT over its scenes'
//! VRTs. Nothing is downloaded: the files only reference the catalog assets.
//!
//! The raster tool itself sits behind [`RasterVirtualizer`]; [`GdalBuildVrt`]
//! shells out to `gdalbuildvrt`. Rasters are read back through
//! [`RasterInspector`] when catalog metadata is missing.

mod builder;
mod inspector;
mod layout;
mod sidecar;
mod virtualizer;

use std::path::{Path, PathBuf};

pub use builder::{BuildReport, VirtualRasterBuilder};
pub use inspector::{GdalInfo, InspectError, RasterInfo, RasterInspector};
pub use layout::OutputLayout;
pub use sidecar::{
    sidecar_path, write_footprints, write_sidecar, Sidecar, SourceType, SIDECAR_TAG,
};
pub use virtualizer::{GdalBuildVrt, RasterVirtualizer, VirtualizerError, VrtOptions, VSICURL_PREFIX};

/// Outcome of building one scene or mosaic raster.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildResult {
    /// Scene id or mosaic name.
    pub target: String,
    /// Output path, or why the build failed.
    pub output: Result<PathBuf, String>,
}

impl BuildResult {
    pub fn built(target: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            output: Ok(path.into()),
        }
    }

    pub fn failed(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            output: Err(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.output.is_ok()
    }

    pub fn path(&self) -> Option<&Path> {
        self.output.as_ref().ok().map(PathBuf::as_path)
    }

    pub fn reason(&self) -> Option<&str> {
        self.output.as_ref().err().map(String::as_str)
    }
}
