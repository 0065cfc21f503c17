//! The external raster virtualization tool.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

/// Prefix GDAL uses to stream a remote file over HTTP range requests.
pub const VSICURL_PREFIX: &str = "/vsicurl/";

/// Options for one virtual raster.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VrtOptions {
    /// Stack each input as its own band instead of mosaicking them.
    pub separate: bool,
    /// Band taken from each input.
    pub band: Option<u32>,
    /// Input value treated as nodata.
    pub src_nodata: Option<f64>,
    /// Output band descriptions, in band order.
    pub band_names: Vec<String>,
}

impl VrtOptions {
    /// Per-scene raster: one band per asset, stacked.
    pub fn scene(src_nodata: Option<f64>) -> Self {
        Self {
            separate: true,
            band: Some(1),
            src_nodata,
            band_names: Vec::new(),
        }
    }

    /// Mosaic of scene rasters.
    pub fn mosaic(src_nodata: Option<f64>) -> Self {
        Self {
            separate: false,
            band: None,
            src_nodata,
            band_names: Vec::new(),
        }
    }

    pub fn with_band_names(mut self, names: Vec<String>) -> Self {
        self.band_names = names;
        self
    }
}

/// Errors raised by a [`RasterVirtualizer`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum VirtualizerError {
    #[error("No input rasters for {output}")]
    NoSources { output: PathBuf },

    #[error("Failed to run {program}: {reason}")]
    Launch { program: String, reason: String },

    #[error("{program} exited with status {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to name the bands of {output}: {reason}")]
    Describe { output: PathBuf, reason: String },
}

/// Writes a virtual raster referencing `sources`.
pub trait RasterVirtualizer: Send + Sync {
    fn build(
        &self,
        sources: &[String],
        output: &Path,
        options: &VrtOptions,
    ) -> Result<(), VirtualizerError>;
}

impl<T: RasterVirtualizer + ?Sized> RasterVirtualizer for Arc<T> {
    fn build(
        &self,
        sources: &[String],
        output: &Path,
        options: &VrtOptions,
    ) -> Result<(), VirtualizerError> {
        (**self).build(sources, output, options)
    }
}

/// Runs GDAL's `gdalbuildvrt` command-line tool.
#[derive(Debug, Clone)]
pub struct GdalBuildVrt {
    program: PathBuf,
}

impl Default for GdalBuildVrt {
    fn default() -> Self {
        Self {
            program: PathBuf::from("gdalbuildvrt"),
        }
    }
}

impl GdalBuildVrt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a specific executable instead of the one on `PATH`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Command-line arguments for one invocation.
    pub fn arguments(
        &self,
        sources: &[String],
        output: &Path,
        options: &VrtOptions,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-q".into(), "-overwrite".into()];
        if options.separate {
            args.push("-separate".into());
        }
        if let Some(band) = options.band {
            args.push("-b".into());
            args.push(band.to_string().into());
        }
        if let Some(nodata) = options.src_nodata {
            args.push("-srcnodata".into());
            args.push(nodata.to_string().into());
        }
        args.push(output.as_os_str().to_owned());
        args.extend(sources.iter().map(|s| gdal_path(s).into()));
        args
    }
}

/// Remote sources are read through GDAL's curl virtual filesystem.
pub(crate) fn gdal_path(source: &str) -> String {
    if source.starts_with("http://") || source.starts_with("https://") {
        format!("{}{}", VSICURL_PREFIX, source)
    } else {
        source.to_string()
    }
}

impl RasterVirtualizer for GdalBuildVrt {
    fn build(
        &self,
        sources: &[String],
        output: &Path,
        options: &VrtOptions,
    ) -> Result<(), VirtualizerError> {
        if sources.is_empty() {
            return Err(VirtualizerError::NoSources {
                output: output.to_path_buf(),
            });
        }

        let program = self.program.display().to_string();
        debug!(program = %program, output = %output.display(), sources = sources.len(), "Building virtual raster");

        let result = Command::new(&self.program)
            .args(self.arguments(sources, output, options))
            .output()
            .map_err(|e| VirtualizerError::Launch {
                program: program.clone(),
                reason: e.to_string(),
            })?;

        if !result.status.success() {
            return Err(VirtualizerError::Failed {
                program,
                code: result.status.code(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        if !options.band_names.is_empty() {
            name_bands(output, &options.band_names)?;
        }
        Ok(())
    }
}

/// Rewrites a VRT file so each band carries its description.
fn name_bands(output: &Path, names: &[String]) -> Result<(), VirtualizerError> {
    let describe = |e: std::io::Error| VirtualizerError::Describe {
        output: output.to_path_buf(),
        reason: e.to_string(),
    };
    let xml = fs::read_to_string(output).map_err(describe)?;
    fs::write(output, describe_bands(&xml, names)).map_err(describe)
}

const BAND_OPEN: &str = "<VRTRasterBand";
const BAND_CLOSE: &str = "</VRTRasterBand>";
const DESCRIPTION_OPEN: &str = "<Description>";
const DESCRIPTION_CLOSE: &str = "</Description>";

/// Sets the `<Description>` of the first `names.len()` raster bands of a VRT
/// document, replacing any existing one.
pub(crate) fn describe_bands(xml: &str, names: &[String]) -> String {
    let mut out = String::with_capacity(xml.len() + names.len() * 48);
    let mut rest = xml;

    for name in names {
        let Some(start) = rest.find(BAND_OPEN) else {
            break;
        };
        let Some(tag_end) = rest[start..].find('>').map(|i| start + i + 1) else {
            break;
        };
        out.push_str(&rest[..tag_end]);
        rest = &rest[tag_end..];
        if out.ends_with("/>") {
            continue;
        }

        let body_end = rest.find(BAND_CLOSE).unwrap_or(rest.len());
        let body = &rest[..body_end];
        let description = format!("{}{}{}", DESCRIPTION_OPEN, xml_escape(name), DESCRIPTION_CLOSE);
        match (body.find(DESCRIPTION_OPEN), body.find(DESCRIPTION_CLOSE)) {
            (Some(open), Some(close)) if open < close => {
                out.push_str(&body[..open]);
                out.push_str(&description);
                out.push_str(&body[close + DESCRIPTION_CLOSE.len()..]);
            }
            _ => {
                out.push_str("\n    ");
                out.push_str(&description);
                out.push_str(body);
            }
        }
        rest = &rest[body_end..];
    }

    out.push_str(rest);
    out
}

fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}
