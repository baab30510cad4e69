//! Planar geometry primitives for spatial maps.
//!
//! Coordinates are expressed in map units. Polygons are ordered vertex lists
//! closed implicitly between the last and the first vertex; an empty polygon
//! is the canonical "no coverage" value.
//!
//! Intersection is a vertex-containment approximation: two polygons are
//! considered intersecting when a vertex of one lies inside the other. Edges
//! that cross without either polygon containing a vertex of the other are not
//! detected, which is acceptable for coarse field-of-view wedges but not for
//! tight or concave shapes.

use serde::{Deserialize, Deserializer, Serialize};

/// A point on a spatial map.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl Point {
    /// Create a new point
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Point) -> f64 {
        distance(self, other)
    }
}

/// Euclidean distance between two points.
pub fn distance(p1: &Point, p2: &Point) -> f64 {
    let dx = p2.x - p1.x;
    let dy = p2.y - p1.y;
    (dx * dx + dy * dy).sqrt()
}

/// An ordered sequence of points forming a closed shape.
///
/// Serializes as a plain JSON array. A JSON `null` deserializes to the empty
/// polygon so that clients omitting coverage data round-trip cleanly.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Polygon(Vec<Point>);

impl<'de> Deserialize<'de> for Polygon {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<Vec<Point>>::deserialize(deserializer).map(|pts| Polygon(pts.unwrap_or_default()))
    }
}

impl From<Vec<Point>> for Polygon {
    fn from(points: Vec<Point>) -> Self {
        Self(points)
    }
}

impl FromIterator<Point> for Polygon {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Polygon {
    /// Create a polygon from vertices
    pub fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Empty polygon (no coverage)
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Vertices in order
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Number of vertices
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the polygon has no vertices
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume into the vertex list
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// Ray-casting parity test.
    ///
    /// Polygons with fewer than three vertices contain nothing. Points lying
    /// exactly on an edge are classified by the half-open comparison below:
    /// consistent for a given polygon, but not tied to a winding rule.
    pub fn contains(&self, point: &Point) -> bool {
        let vertices = &self.0;
        if vertices.len() < 3 {
            return false;
        }

        let (x, y) = (point.x, point.y);
        let mut inside = false;
        let n = vertices.len();
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = (vertices[i].x, vertices[i].y);
            let (xj, yj) = (vertices[j].x, vertices[j].y);
            if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// True iff any vertex of `self` lies inside `other` or vice versa.
    pub fn intersects(&self, other: &Polygon) -> bool {
        self.0.iter().any(|p| other.contains(p)) || other.0.iter().any(|p| self.contains(p))
    }

    /// Vertices of each polygon that fall inside the other.
    ///
    /// A vertex-subset approximation of the overlap region, not a clip.
    pub fn overlap_zone(&self, other: &Polygon) -> Polygon {
        self.0
            .iter()
            .filter(|p| other.contains(p))
            .chain(other.0.iter().filter(|p| self.contains(p)))
            .copied()
            .collect()
    }

    /// Minimum vertex-to-vertex distance, `None` if either polygon is empty.
    pub fn min_vertex_distance(&self, other: &Polygon) -> Option<f64> {
        self.0
            .iter()
            .flat_map(|a| other.0.iter().map(move |b| distance(a, b)))
            .fold(None, |min, d| match min {
                Some(m) if m <= d => Some(m),
                _ => Some(d),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn square(x0: f64, y0: f64, side: f64) -> Polygon {
        Polygon::new(vec![
            Point::new(x0, y0),
            Point::new(x0 + side, y0),
            Point::new(x0 + side, y0 + side),
            Point::new(x0, y0 + side),
        ])
    }

    #[test]
    fn test_distance() {
        assert_eq!(distance(&Point::new(0.0, 0.0), &Point::new(3.0, 4.0)), 5.0);
        let p = Point::new(12.5, -7.0);
        assert_eq!(p.distance_to(&p), 0.0);
    }

    #[test]
    fn test_contains_square() {
        let sq = square(0.0, 0.0, 10.0);
        assert!(sq.contains(&Point::new(5.0, 5.0)));
        assert!(!sq.contains(&Point::new(15.0, 5.0)));
        assert!(!sq.contains(&Point::new(-0.1, 5.0)));
    }

    #[test]
    fn test_boundary_is_consistent() {
        let sq = square(0.0, 0.0, 10.0);
        let edge = Point::new(0.0, 5.0);
        let first = sq.contains(&edge);
        for _ in 0..10 {
            assert_eq!(sq.contains(&edge), first);
        }
    }

    #[test]
    fn test_intersects() {
        let a = square(0.0, 0.0, 10.0);
        let b = square(5.0, 5.0, 10.0);
        let far = square(100.0, 100.0, 10.0);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&far));
        assert!(!a.intersects(&Polygon::empty()));
    }

    #[test]
    fn test_overlap_zone_vertex_subset() {
        let a = square(0.0, 0.0, 10.0);
        let b = square(5.0, 5.0, 10.0);
        let zone = a.overlap_zone(&b);
        assert_eq!(zone.points(), &[Point::new(10.0, 10.0), Point::new(5.0, 5.0)]);
    }

    #[test]
    fn test_min_vertex_distance() {
        let a = square(0.0, 0.0, 10.0);
        let b = square(13.0, 14.0, 5.0);
        assert_eq!(a.min_vertex_distance(&b), Some(5.0));
        assert_eq!(a.min_vertex_distance(&Polygon::empty()), None);
    }

    #[test]
    fn test_null_deserializes_to_empty() {
        let p: Polygon = serde_json::from_str("null").unwrap();
        assert!(p.is_empty());
        assert_eq!(serde_json::to_string(&Polygon::empty()).unwrap(), "[]");
    }

    proptest! {
        #[test]
        fn degenerate_polygons_contain_nothing(
            pts in prop::collection::vec((-1e3f64..1e3, -1e3f64..1e3), 0..3),
            x in -1e3f64..1e3,
            y in -1e3f64..1e3,
        ) {
            let poly: Polygon = pts.into_iter().map(|(x, y)| Point::new(x, y)).collect();
            prop_assert!(!poly.contains(&Point::new(x, y)));
        }

        #[test]
        fn overlapping_squares_intersect(
            x0 in -100f64..100.0,
            y0 in -100f64..100.0,
            side in 1f64..50.0,
            fx in 0.1f64..0.9,
            fy in 0.1f64..0.9,
        ) {
            let a = square(x0, y0, side);
            let b = square(x0 + side * fx, y0 + side * fy, side);
            prop_assert!(a.intersects(&b));
        }

        #[test]
        fn distant_squares_do_not_intersect(
            x0 in -100f64..100.0,
            y0 in -100f64..100.0,
            side in 1f64..50.0,
            gap in 1f64..500.0,
        ) {
            let a = square(x0, y0, side);
            let b = square(x0 + side + gap, y0, side);
            prop_assert!(!a.intersects(&b));
        }

        #[test]
        fn distance_is_symmetric(ax in -1e3f64..1e3, ay in -1e3f64..1e3, bx in -1e3f64..1e3, by in -1e3f64..1e3) {
            let a = Point::new(ax, ay);
            let b = Point::new(bx, by);
            prop_assert!((distance(&a, &b) - distance(&b, &a)).abs() < 1e-9);
            prop_assert!(distance(&a, &b) >= 0.0);
        }
    }
}
