//! Geometry primitives for footprints and areas of interest.
//!
//! All coordinates are WGS84 longitude/latitude degrees. The module only
//! answers the questions the pipeline asks: does a scene footprint touch the
//! area of interest, and what bounding box should the catalog be queried with.
//!
//! # Example
//!
//! ```
//! use stacmosaic::geo::{BoundingBox, Geometry};
//!
//! let aoi = BoundingBox::new(-48.0, -16.0, -47.0, -15.0).unwrap();
//! let footprint = BoundingBox::new(-47.0, -15.5, -46.0, -14.5).unwrap();
//!
//! // Sharing an edge counts as intersecting
//! let aoi = Geometry::from(aoi.to_polygon());
//! assert!(aoi.intersects(&Geometry::from(footprint.to_polygon())));
//! ```

mod geojson;
mod intersect;

use thiserror::Error;

pub use geojson::RawGeometry;

/// Minimum valid longitude in degrees.
pub const MIN_LON: f64 = -180.0;

/// Maximum valid longitude in degrees.
pub const MAX_LON: f64 = 180.0;

/// Minimum valid latitude in degrees.
pub const MIN_LAT: f64 = -90.0;

/// Maximum valid latitude in degrees.
pub const MAX_LAT: f64 = 90.0;

/// Errors raised while building or decoding geometries.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeoError {
    #[error("Invalid longitude: {0} (must be between -180 and 180)")]
    InvalidLongitude(f64),

    #[error("Invalid latitude: {0} (must be between -90 and 90)")]
    InvalidLatitude(f64),

    #[error("Invalid bounding box: min ({min_x}, {min_y}) exceeds max ({max_x}, {max_y})")]
    InvertedBounds {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    },

    /// A ring needs at least three distinct positions.
    #[error("Degenerate ring with {0} distinct positions")]
    DegenerateRing(usize),

    #[error("Position has {0} ordinates, expected at least 2")]
    ShortPosition(usize),

    #[error("Unsupported geometry type (expected Polygon or MultiPolygon)")]
    UnsupportedGeometry,

    #[error("Invalid GeoJSON: {0}")]
    Json(String),
}

/// A longitude/latitude position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Creates a validated bounding box.
    ///
    /// # Errors
    ///
    /// Returns an error when a coordinate is outside WGS84 ranges or when the
    /// minimum corner exceeds the maximum corner.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self, GeoError> {
        for x in [min_x, max_x] {
            if !(MIN_LON..=MAX_LON).contains(&x) {
                return Err(GeoError::InvalidLongitude(x));
            }
        }
        for y in [min_y, max_y] {
            if !(MIN_LAT..=MAX_LAT).contains(&y) {
                return Err(GeoError::InvalidLatitude(y));
            }
        }
        if min_x > max_x || min_y > max_y {
            return Err(GeoError::InvertedBounds {
                min_x,
                min_y,
                max_x,
                max_y,
            });
        }

        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    /// Bounding box of a set of points. Returns `None` for an empty set.
    pub(crate) fn enclosing<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let init = Self {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        Some(iter.fold(init, |b, p| Self {
            min_x: b.min_x.min(p.x),
            min_y: b.min_y.min(p.y),
            max_x: b.max_x.max(p.x),
            max_y: b.max_y.max(p.y),
        }))
    }

    /// Returns true if the boxes overlap or touch.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Converts the box to a closed rectangular polygon.
    pub fn to_polygon(&self) -> Polygon {
        let exterior = vec![
            Point::new(self.min_x, self.min_y),
            Point::new(self.max_x, self.min_y),
            Point::new(self.max_x, self.max_y),
            Point::new(self.min_x, self.max_y),
            Point::new(self.min_x, self.min_y),
        ];
        Polygon {
            exterior,
            holes: Vec::new(),
            bbox: *self,
        }
    }

    /// Comma separated `min_x,min_y,max_x,max_y` as expected by STAC `bbox`.
    pub fn to_query(&self) -> String {
        format!("{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)
    }

    /// Filesystem-friendly tag with four decimals per ordinate.
    pub fn tag(&self) -> String {
        format!(
            "{:.4}_{:.4}_{:.4}_{:.4}",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

/// A polygon with an exterior ring and optional holes.
///
/// Rings are stored closed (first position repeated at the end).
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    exterior: Vec<Point>,
    holes: Vec<Vec<Point>>,
    bbox: BoundingBox,
}

impl Polygon {
    /// Creates a polygon from its exterior ring.
    ///
    /// The ring is closed automatically when the last position differs from
    /// the first.
    pub fn new(exterior: Vec<Point>) -> Result<Self, GeoError> {
        Self::with_holes(exterior, Vec::new())
    }

    /// Creates a polygon with interior rings.
    pub fn with_holes(exterior: Vec<Point>, holes: Vec<Vec<Point>>) -> Result<Self, GeoError> {
        let exterior = close_ring(exterior)?;
        let holes = holes
            .into_iter()
            .map(close_ring)
            .collect::<Result<Vec<_>, _>>()?;
        let bbox = BoundingBox::enclosing(&exterior).ok_or(GeoError::DegenerateRing(0))?;

        Ok(Self {
            exterior,
            holes,
            bbox,
        })
    }

    pub fn exterior(&self) -> &[Point] {
        &self.exterior
    }

    pub fn holes(&self) -> &[Vec<Point>] {
        &self.holes
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    /// All rings, exterior first.
    pub(crate) fn rings(&self) -> impl Iterator<Item = &[Point]> {
        std::iter::once(self.exterior.as_slice()).chain(self.holes.iter().map(Vec::as_slice))
    }
}

fn close_ring(mut ring: Vec<Point>) -> Result<Vec<Point>, GeoError> {
    let mut distinct: Vec<Point> = Vec::with_capacity(ring.len());
    for p in &ring {
        if !distinct.contains(p) {
            distinct.push(*p);
        }
    }
    if distinct.len() < 3 {
        return Err(GeoError::DegenerateRing(distinct.len()));
    }
    if ring.first() != ring.last() {
        ring.push(ring[0]);
    }
    Ok(ring)
}

/// A footprint or area of interest.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Polygon(Polygon),
    MultiPolygon(Vec<Polygon>),
}

impl Geometry {
    /// Iterates over the member polygons.
    pub fn polygons(&self) -> impl Iterator<Item = &Polygon> {
        match self {
            Geometry::Polygon(p) => std::slice::from_ref(p).iter(),
            Geometry::MultiPolygon(ps) => ps.iter(),
        }
    }

    /// Bounding box of the whole geometry.
    pub fn bbox(&self) -> BoundingBox {
        let mut polygons = self.polygons();
        // Construction guarantees at least one polygon
        let first = polygons
            .next()
            .map(Polygon::bbox)
            .unwrap_or(BoundingBox {
                min_x: 0.0,
                min_y: 0.0,
                max_x: 0.0,
                max_y: 0.0,
            });
        polygons.fold(first, |acc, p| acc.union(&p.bbox()))
    }

    /// Returns true if the geometries share at least one point.
    ///
    /// Boundary contact counts as intersecting.
    pub fn intersects(&self, other: &Geometry) -> bool {
        if !self.bbox().intersects(&other.bbox()) {
            return false;
        }
        self.polygons()
            .any(|a| other.polygons().any(|b| intersect::polygons_intersect(a, b)))
    }
}

impl From<Polygon> for Geometry {
    fn from(polygon: Polygon) -> Self {
        Geometry::Polygon(polygon)
    }
}

impl From<BoundingBox> for Geometry {
    fn from(bbox: BoundingBox) -> Self {
        Geometry::Polygon(bbox.to_polygon())
    }
}
