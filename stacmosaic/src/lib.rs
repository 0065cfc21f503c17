//! stacmosaic - STAC catalog search to virtual-raster mosaics
//!
//! Searches a STAC API for the scenes of one collection that cover an area of
//! interest within a date range, keeps the scenes whose footprint actually
//! intersects the area, groups them into mosaics by acquisition date, orbit
//! and CRS, and writes GDAL virtual rasters for every scene and mosaic.
//!
//! # Modules
//!
//! - [`geo`]: footprint and area-of-interest geometry
//! - [`catalog`]: paged STAC search
//! - [`filter`]: footprint intersection filter
//! - [`mosaic`]: grouping into mosaics
//! - [`vrt`]: virtual raster output
//! - [`executor`]: background runs with progress and cancellation
//! - [`config`]: settings and collection registry
//! - [`logging`]: tracing setup

pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod filter;
pub mod geo;
pub mod logging;
pub mod mosaic;
pub mod vrt;

pub use error::PipelineError;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
