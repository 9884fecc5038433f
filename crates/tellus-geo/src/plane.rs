//! Planes, rays, and segment intersection in model and projected space.

use glam::{DVec2, DVec3};

/// An oriented plane `normal . p + d = 0` in model space.
#[derive(Clone, Copy, Debug)]
pub struct Plane {
    /// Unit normal.
    pub normal: DVec3,
    /// Signed offset from the origin.
    pub d: f64,
}

impl Plane {
    /// Plane through three points, normal along `(b - a) x (c - a)`.
    ///
    /// Degenerate (collinear) points yield a zero normal; callers that can
    /// see degenerate triangles must check [`Plane::is_degenerate`].
    #[must_use]
    pub fn from_points(a: DVec3, b: DVec3, c: DVec3) -> Self {
        let n = (b - a).cross(c - a);
        let len = n.length();
        if len < 1e-12 {
            return Self {
                normal: DVec3::ZERO,
                d: 0.0,
            };
        }
        let normal = n / len;
        Self {
            normal,
            d: -normal.dot(a),
        }
    }

    /// Whether this plane came from collinear points.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.normal == DVec3::ZERO
    }

    /// Signed distance from the point to the plane.
    #[must_use]
    pub fn signed_distance(&self, p: DVec3) -> f64 {
        self.normal.dot(p) + self.d
    }

    /// Intersection of the segment `[p, q]` with the plane, if any.
    #[must_use]
    pub fn intersect_segment(&self, p: DVec3, q: DVec3) -> Option<DVec3> {
        let dp = self.signed_distance(p);
        let dq = self.signed_distance(q);
        if (dp > 0.0 && dq > 0.0) || (dp < 0.0 && dq < 0.0) {
            return None;
        }
        let denom = dp - dq;
        if denom.abs() < 1e-15 {
            // Segment lies in the plane; report its start.
            return Some(p);
        }
        let t = dp / denom;
        Some(p + (q - p) * t)
    }

    /// Ray parameter of the intersection with the plane, if the ray hits it
    /// travelling forward.
    #[must_use]
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f64> {
        let denom = self.normal.dot(ray.dir);
        if denom.abs() < 1e-15 {
            return None;
        }
        let t = -(self.normal.dot(ray.origin) + self.d) / denom;
        (t >= 0.0).then_some(t)
    }
}

/// A ray in model space.
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    /// Origin in meters.
    pub origin: DVec3,
    /// Direction; need not be normalized.
    pub dir: DVec3,
}

impl Ray {
    #[must_use]
    pub fn new(origin: DVec3, dir: DVec3) -> Self {
        Self { origin, dir }
    }

    /// Point at parameter `t`.
    #[must_use]
    pub fn at(&self, t: f64) -> DVec3 {
        self.origin + self.dir * t
    }
}

/// Intersection of two 2D segments `[a, b]` and `[c, d]`, if any.
///
/// Touching endpoints count as an intersection.
#[must_use]
pub fn segment_intersection_2d(a: DVec2, b: DVec2, c: DVec2, d: DVec2) -> Option<DVec2> {
    let r = b - a;
    let s = d - c;
    let denom = r.perp_dot(s);
    if denom.abs() < 1e-15 {
        return None;
    }
    let t = (c - a).perp_dot(s) / denom;
    let u = (c - a).perp_dot(r) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(a + r * t)
    } else {
        None
    }
}
