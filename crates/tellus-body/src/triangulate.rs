//! The constrained-triangulation boundary.
//!
//! Partial-triangle tessellation against arbitrary polygons goes through
//! this trait; the real application plugs a constrained-triangulation
//! library in here. [`FanTriangulator`] is the reference implementation and
//! handles convex rings only, declining anything else.

use glam::DVec2;

/// Triangulates a polygon ring (projected points, counter-clockwise) into
/// triangle triplets.
pub trait PolygonTriangulator: Send + Sync {
    /// Returns the tesserae, or `None` when the polygon is degenerate,
    /// self-overlapping, or otherwise outside what the implementation can
    /// triangulate. `None` is a per-request degradation, not a failure of
    /// the surrounding pass.
    fn triangulate(&self, ring: &[DVec2]) -> Option<Vec<[DVec2; 3]>>;
}

/// Fan triangulation for convex rings.
#[derive(Clone, Copy, Debug, Default)]
pub struct FanTriangulator;

impl FanTriangulator {
    fn is_convex_ccw(ring: &[DVec2]) -> bool {
        let n = ring.len();
        for i in 0..n {
            let a = ring[i];
            let b = ring[(i + 1) % n];
            let c = ring[(i + 2) % n];
            if (b - a).perp_dot(c - b) < -1e-12 {
                return false;
            }
        }
        true
    }

    fn area(ring: &[DVec2]) -> f64 {
        let n = ring.len();
        let mut sum = 0.0;
        for i in 0..n {
            sum += ring[i].perp_dot(ring[(i + 1) % n]);
        }
        sum * 0.5
    }
}

impl PolygonTriangulator for FanTriangulator {
    fn triangulate(&self, ring: &[DVec2]) -> Option<Vec<[DVec2; 3]>> {
        if ring.len() < 3 || Self::area(ring) <= 1e-15 || !Self::is_convex_ccw(ring) {
            return None;
        }
        let mut out = Vec::with_capacity(ring.len() - 2);
        for i in 1..ring.len() - 1 {
            out.push([ring[0], ring[i], ring[i + 1]]);
        }
        Some(out)
    }
}
