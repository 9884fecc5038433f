//! The celestial body projection contract and a spherical reference body.

use glam::{DVec2, DVec3};
use tellus_geo::{gc_distance_rad, gc_interpolate, geo_of_unit, unit_vector, GeoPos, Ray};

/// Projection and geodesy for the body the terrain mesh is draped over.
///
/// Model space is meters, origin at the body center, +Z through the north
/// pole, +X through (0°N, 0°E). Projected 2D points are (lon, lat) degrees.
pub trait CelestialBody: Send + Sync {
    /// Mean radius in meters.
    fn radius_m(&self) -> f64;

    /// Model position for a latitude/longitude at an altitude above the
    /// ellipsoid, meters.
    fn model_position(&self, lat_deg: f64, lon_deg: f64, alt_m: f64) -> DVec3;

    /// Geographic position (ellipsoid-referenced altitude) of a model point.
    fn geo_position(&self, model: DVec3) -> GeoPos;

    /// Local "up" unit vector: the reference axis rotated first by longitude,
    /// then by latitude.
    fn up_vector(&self, lat_deg: f64, lon_deg: f64) -> DVec3;

    /// Geodesic interpolation between two projected points.
    fn geodesic_interpolate(&self, a: DVec2, b: DVec2, t: f64) -> DVec2;

    /// Geodesic distance between two projected points, meters.
    fn geodesic_distance_m(&self, a: DVec2, b: DVec2) -> f64;

    /// Nearest forward intersection of a model-space ray with the surface at
    /// the given altitude above the ellipsoid.
    fn intersect_surface(&self, ray: &Ray, alt_m: f64) -> Option<DVec3>;
}

/// A spherical body: the reference implementation used by tests and by
/// deployments without a dedicated ellipsoid library.
#[derive(Clone, Copy, Debug)]
pub struct SphericalBody {
    radius_m: f64,
}

impl SphericalBody {
    /// Earth mean radius, meters.
    pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

    #[must_use]
    pub fn new(radius_m: f64) -> Self {
        Self { radius_m }
    }

    /// An Earth-sized sphere.
    #[must_use]
    pub fn earth() -> Self {
        Self::new(Self::EARTH_RADIUS_M)
    }
}

impl CelestialBody for SphericalBody {
    fn radius_m(&self) -> f64 {
        self.radius_m
    }

    fn model_position(&self, lat_deg: f64, lon_deg: f64, alt_m: f64) -> DVec3 {
        unit_vector(lat_deg, lon_deg) * (self.radius_m + alt_m)
    }

    fn geo_position(&self, model: DVec3) -> GeoPos {
        let r = model.length();
        if r < 1e-9 {
            return GeoPos::on_ellipsoid(0.0, 0.0);
        }
        let p = geo_of_unit(model / r);
        GeoPos::new(p.y, p.x, r - self.radius_m, tellus_geo::AltitudeRef::Ellipsoid)
    }

    fn up_vector(&self, lat_deg: f64, lon_deg: f64) -> DVec3 {
        // Rotating +X by longitude about Z, then by latitude toward Z, is the
        // radial direction on a sphere.
        unit_vector(lat_deg, lon_deg)
    }

    fn geodesic_interpolate(&self, a: DVec2, b: DVec2, t: f64) -> DVec2 {
        gc_interpolate(a, b, t)
    }

    fn geodesic_distance_m(&self, a: DVec2, b: DVec2) -> f64 {
        gc_distance_rad(a, b) * self.radius_m
    }

    fn intersect_surface(&self, ray: &Ray, alt_m: f64) -> Option<DVec3> {
        let r = self.radius_m + alt_m;
        let d = ray.dir;
        let o = ray.origin;
        let a = d.dot(d);
        if a < 1e-30 {
            return None;
        }
        let b = 2.0 * o.dot(d);
        let c = o.dot(o) - r * r;
        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            return None;
        }
        let sqrt_disc = disc.sqrt();
        let t0 = (-b - sqrt_disc) / (2.0 * a);
        let t1 = (-b + sqrt_disc) / (2.0 * a);
        let t = if t0 >= 0.0 {
            t0
        } else if t1 >= 0.0 {
            t1
        } else {
            return None;
        };
        Some(ray.at(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_geo_round_trip() {
        let body = SphericalBody::earth();
        let model = body.model_position(35.0, -100.0, 1234.0);
        let geo = body.geo_position(model);
        assert!((geo.lat_deg - 35.0).abs() < 1e-9);
        assert!((geo.lon_deg + 100.0).abs() < 1e-9);
        assert!((geo.alt_m - 1234.0).abs() < 1e-6);
    }

    #[test]
    fn test_surface_intersection_from_space() {
        let body = SphericalBody::earth();
        let ray = Ray::new(
            DVec3::new(2.0 * SphericalBody::EARTH_RADIUS_M, 0.0, 0.0),
            DVec3::new(-1.0, 0.0, 0.0),
        );
        let hit = body.intersect_surface(&ray, 0.0).unwrap();
        assert!((hit.length() - SphericalBody::EARTH_RADIUS_M).abs() < 1e-6);
        assert!(hit.x > 0.0, "should hit the near side");
    }

    #[test]
    fn test_ray_missing_the_body() {
        let body = SphericalBody::earth();
        let ray = Ray::new(
            DVec3::new(2.0 * SphericalBody::EARTH_RADIUS_M, 0.0, 0.0),
            DVec3::new(0.0, 0.0, 1.0),
        );
        assert!(body.intersect_surface(&ray, 0.0).is_none());
    }

    #[test]
    fn test_geodesic_distance_equator_degree() {
        let body = SphericalBody::earth();
        let d = body.geodesic_distance_m(DVec2::new(0.0, 0.0), DVec2::new(1.0, 0.0));
        let expected = SphericalBody::EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
        assert!((d - expected).abs() < 1.0);
    }
}
