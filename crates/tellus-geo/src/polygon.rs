//! Convex geographic polygons in projected (lon, lat) space.

use glam::DVec2;

use crate::bounds::GeoBounds;
use crate::plane::segment_intersection_2d;

/// A convex polygon of projected points, counter-clockwise.
///
/// Triangle footprints are stored this way; a triangle with a vertex on a
/// pole expands that vertex into two corners, so polygons have 3 or 4 points
/// in practice but any convex ring is accepted.
#[derive(Clone, Debug, PartialEq)]
pub struct GeoPolygon {
    points: Vec<DVec2>,
}

impl GeoPolygon {
    /// Build from counter-clockwise points.
    ///
    /// Convexity and winding are the caller's responsibility; both are
    /// checked in debug builds.
    #[must_use]
    pub fn new(points: Vec<DVec2>) -> Self {
        debug_assert!(points.len() >= 3, "polygon needs at least 3 points");
        debug_assert!(
            Self::is_convex_ccw(&points),
            "polygon must be convex and counter-clockwise: {points:?}"
        );
        Self { points }
    }

    /// The polygon's points.
    #[must_use]
    pub fn points(&self) -> &[DVec2] {
        &self.points
    }

    fn is_convex_ccw(points: &[DVec2]) -> bool {
        let n = points.len();
        for i in 0..n {
            let a = points[i];
            let b = points[(i + 1) % n];
            let c = points[(i + 2) % n];
            if (b - a).perp_dot(c - b) < -1e-9 {
                return false;
            }
        }
        true
    }

    /// Zero-tolerance containment: the point must be on or inside every edge.
    #[must_use]
    pub fn contains(&self, p: DVec2) -> bool {
        self.contains_eps(p, 0.0)
    }

    /// Containment with a signed tolerance band around the edges.
    ///
    /// Positive `eps` admits points slightly outside; negative demands them
    /// strictly inside. The tolerance is scaled by the edge length so it
    /// behaves like a distance.
    #[must_use]
    pub fn contains_eps(&self, p: DVec2, eps: f64) -> bool {
        let n = self.points.len();
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            let edge = b - a;
            if edge.perp_dot(p - a) < -eps * edge.length() {
                return false;
            }
        }
        true
    }

    /// Whether every point of `other` lies inside this polygon.
    #[must_use]
    pub fn contains_polygon(&self, other: &GeoPolygon) -> bool {
        other.points.iter().all(|&p| self.contains(p))
    }

    /// Convex overlap test by separating axes, with a positive tolerance so
    /// polygons that merely touch along an edge still count as overlapping.
    #[must_use]
    pub fn overlaps(&self, other: &GeoPolygon, eps: f64) -> bool {
        !Self::separated(&self.points, &other.points, eps)
            && !Self::separated(&other.points, &self.points, eps)
    }

    fn separated(axes_of: &[DVec2], other: &[DVec2], eps: f64) -> bool {
        let n = axes_of.len();
        for i in 0..n {
            let a = axes_of[i];
            let b = axes_of[(i + 1) % n];
            let axis = (b - a).perp().normalize_or_zero();
            if axis == DVec2::ZERO {
                continue;
            }
            let (min_a, max_a) = Self::project(axes_of, axis);
            let (min_b, max_b) = Self::project(other, axis);
            if max_a < min_b - eps || max_b < min_a - eps {
                return true;
            }
        }
        false
    }

    fn project(points: &[DVec2], axis: DVec2) -> (f64, f64) {
        let mut min = f64::MAX;
        let mut max = f64::MIN;
        for p in points {
            let d = p.dot(axis);
            min = min.min(d);
            max = max.max(d);
        }
        (min, max)
    }

    /// Arithmetic centroid of the points.
    #[must_use]
    pub fn centroid(&self) -> DVec2 {
        self.points.iter().copied().sum::<DVec2>() / self.points.len() as f64
    }

    /// Lat/lon box around the polygon.
    #[must_use]
    pub fn bounds(&self) -> GeoBounds {
        GeoBounds::from_points(self.points.iter().copied())
    }

    /// Circle centered at the centroid covering all points.
    #[must_use]
    pub fn bounding_circle(&self) -> (DVec2, f64) {
        let c = self.centroid();
        let r = self
            .points
            .iter()
            .map(|p| (*p - c).length())
            .fold(0.0_f64, f64::max);
        (c, r)
    }

    /// All intersections of the segment `[a, b]` with the polygon's edges.
    #[must_use]
    pub fn segment_intersections(&self, a: DVec2, b: DVec2) -> Vec<DVec2> {
        let n = self.points.len();
        let mut out = Vec::new();
        for i in 0..n {
            let p = self.points[i];
            let q = self.points[(i + 1) % n];
            if let Some(hit) = segment_intersection_2d(a, b, p, q) {
                out.push(hit);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> GeoPolygon {
        GeoPolygon::new(vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 0.0),
            DVec2::new(1.0, 1.0),
            DVec2::new(0.0, 1.0),
        ])
    }

    #[test]
    fn test_contains_zero_tolerance() {
        let sq = unit_square();
        assert!(sq.contains(DVec2::new(0.5, 0.5)));
        assert!(sq.contains(DVec2::new(0.0, 0.5)), "boundary point");
        assert!(!sq.contains(DVec2::new(-1e-9, 0.5)));
    }

    #[test]
    fn test_contains_eps_band() {
        let sq = unit_square();
        assert!(sq.contains_eps(DVec2::new(-0.01, 0.5), 0.02));
        assert!(!sq.contains_eps(DVec2::new(0.005, 0.5), -0.01));
    }

    #[test]
    fn test_overlap_touching_edges_counts() {
        let sq = unit_square();
        let right = GeoPolygon::new(vec![
            DVec2::new(1.0, 0.0),
            DVec2::new(2.0, 0.0),
            DVec2::new(2.0, 1.0),
            DVec2::new(1.0, 1.0),
        ]);
        assert!(sq.overlaps(&right, 1e-6));
        let far = GeoPolygon::new(vec![
            DVec2::new(3.0, 0.0),
            DVec2::new(4.0, 0.0),
            DVec2::new(4.0, 1.0),
        ]);
        assert!(!sq.overlaps(&far, 1e-6));
    }

    #[test]
    fn test_contains_polygon() {
        let sq = unit_square();
        let inner = GeoPolygon::new(vec![
            DVec2::new(0.25, 0.25),
            DVec2::new(0.75, 0.25),
            DVec2::new(0.5, 0.75),
        ]);
        assert!(sq.contains_polygon(&inner));
        assert!(!inner.contains_polygon(&sq));
    }

    #[test]
    fn test_segment_intersections() {
        let sq = unit_square();
        let hits = sq.segment_intersections(DVec2::new(-1.0, 0.5), DVec2::new(2.0, 0.5));
        assert_eq!(hits.len(), 2);
    }
}
