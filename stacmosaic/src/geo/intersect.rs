//! Polygon intersection predicates.

use super::{Point, Polygon};

/// Tolerance for collinearity when comparing orientations.
const EPSILON: f64 = 1e-12;

/// Returns true if the polygons share at least one point.
///
/// Two cases: the boundaries touch or cross somewhere, or one polygon lies
/// entirely within the other (outside its holes).
pub(super) fn polygons_intersect(a: &Polygon, b: &Polygon) -> bool {
    if !a.bbox().intersects(&b.bbox()) {
        return false;
    }

    for ring_a in a.rings() {
        for ring_b in b.rings() {
            if rings_cross(ring_a, ring_b) {
                return true;
            }
        }
    }

    // No boundary contact: either nested or disjoint
    contains_point(b, a.exterior()[0]) || contains_point(a, b.exterior()[0])
}

fn rings_cross(a: &[Point], b: &[Point]) -> bool {
    a.windows(2).any(|ea| {
        b.windows(2)
            .any(|eb| segments_intersect(ea[0], ea[1], eb[0], eb[1]))
    })
}

fn orientation(p: Point, q: Point, r: Point) -> i8 {
    let value = (q.y - p.y) * (r.x - q.x) - (q.x - p.x) * (r.y - q.y);
    if value.abs() <= EPSILON {
        0
    } else if value > 0.0 {
        1
    } else {
        -1
    }
}

/// True if `q` lies on segment `p`-`r`, given the three are collinear.
fn on_segment(p: Point, q: Point, r: Point) -> bool {
    q.x <= p.x.max(r.x) && q.x >= p.x.min(r.x) && q.y <= p.y.max(r.y) && q.y >= p.y.min(r.y)
}

fn segments_intersect(p1: Point, q1: Point, p2: Point, q2: Point) -> bool {
    let o1 = orientation(p1, q1, p2);
    let o2 = orientation(p1, q1, q2);
    let o3 = orientation(p2, q2, p1);
    let o4 = orientation(p2, q2, q1);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    (o1 == 0 && on_segment(p1, p2, q1))
        || (o2 == 0 && on_segment(p1, q2, q1))
        || (o3 == 0 && on_segment(p2, p1, q2))
        || (o4 == 0 && on_segment(p2, q1, q2))
}

fn point_on_ring(ring: &[Point], p: Point) -> bool {
    ring.windows(2)
        .any(|e| orientation(e[0], e[1], p) == 0 && on_segment(e[0], p, e[1]))
}

/// Even-odd ray casting. Points on the ring boundary count as inside.
fn point_in_ring(ring: &[Point], p: Point) -> bool {
    if point_on_ring(ring, p) {
        return true;
    }

    let mut inside = false;
    for e in ring.windows(2) {
        let (a, b) = (e[0], e[1]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

/// Point-in-polygon honoring holes; hole boundaries belong to the polygon.
fn contains_point(polygon: &Polygon, p: Point) -> bool {
    if !point_in_ring(polygon.exterior(), p) {
        return false;
    }
    !polygon
        .holes()
        .iter()
        .any(|hole| point_in_ring(hole, p) && !point_on_ring(hole, p))
}
