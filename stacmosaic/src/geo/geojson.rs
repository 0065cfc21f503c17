//! GeoJSON encoding for polygonal geometries.

use serde::{Deserialize, Serialize};

use super::{GeoError, Geometry, Point, Polygon, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

/// Wire form of a GeoJSON geometry object.
///
/// Positions may carry a third ordinate; only longitude and latitude are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RawGeometry {
    Polygon {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Vec<f64>>>>,
    },
    #[serde(other)]
    Unsupported,
}

fn to_ring(positions: Vec<Vec<f64>>) -> Result<Vec<Point>, GeoError> {
    positions
        .into_iter()
        .map(|pos| match pos.as_slice() {
            [x, _, ..] if !(MIN_LON..=MAX_LON).contains(x) => Err(GeoError::InvalidLongitude(*x)),
            [_, y, ..] if !(MIN_LAT..=MAX_LAT).contains(y) => Err(GeoError::InvalidLatitude(*y)),
            [x, y, ..] => Ok(Point::new(*x, *y)),
            _ => Err(GeoError::ShortPosition(pos.len())),
        })
        .collect()
}

fn to_polygon(rings: Vec<Vec<Vec<f64>>>) -> Result<Polygon, GeoError> {
    let mut rings = rings.into_iter();
    let exterior = to_ring(rings.next().ok_or(GeoError::DegenerateRing(0))?)?;
    let holes = rings.map(to_ring).collect::<Result<Vec<_>, _>>()?;
    Polygon::with_holes(exterior, holes)
}

fn from_ring(ring: &[Point]) -> Vec<Vec<f64>> {
    ring.iter().map(|p| vec![p.x, p.y]).collect()
}

fn from_polygon(polygon: &Polygon) -> Vec<Vec<Vec<f64>>> {
    polygon.rings().map(from_ring).collect()
}

impl TryFrom<RawGeometry> for Geometry {
    type Error = GeoError;

    fn try_from(raw: RawGeometry) -> Result<Self, Self::Error> {
        match raw {
            RawGeometry::Polygon { coordinates } => Ok(Geometry::Polygon(to_polygon(coordinates)?)),
            RawGeometry::MultiPolygon { coordinates } => {
                let polygons = coordinates
                    .into_iter()
                    .map(to_polygon)
                    .collect::<Result<Vec<_>, _>>()?;
                if polygons.is_empty() {
                    return Err(GeoError::DegenerateRing(0));
                }
                Ok(Geometry::MultiPolygon(polygons))
            }
            RawGeometry::Unsupported => Err(GeoError::UnsupportedGeometry),
        }
    }
}

impl From<&Geometry> for RawGeometry {
    fn from(geometry: &Geometry) -> Self {
        match geometry {
            Geometry::Polygon(p) => RawGeometry::Polygon {
                coordinates: from_polygon(p),
            },
            Geometry::MultiPolygon(ps) => RawGeometry::MultiPolygon {
                coordinates: ps.iter().map(from_polygon).collect(),
            },
        }
    }
}

impl Geometry {
    /// Decodes a GeoJSON geometry value.
    pub fn from_geojson(value: &serde_json::Value) -> Result<Self, GeoError> {
        let raw: RawGeometry =
            serde_json::from_value(value.clone()).map_err(|e| GeoError::Json(e.to_string()))?;
        Geometry::try_from(raw)
    }

    /// Decodes a GeoJSON geometry from text.
    pub fn from_geojson_str(text: &str) -> Result<Self, GeoError> {
        let raw: RawGeometry =
            serde_json::from_str(text).map_err(|e| GeoError::Json(e.to_string()))?;
        Geometry::try_from(raw)
    }

    /// Encodes the geometry as a GeoJSON value.
    pub fn to_geojson(&self) -> serde_json::Value {
        // RawGeometry only holds numbers and strings
        serde_json::to_value(RawGeometry::from(self)).unwrap_or(serde_json::Value::Null)
    }
}
