//! Great-circle math on the unit sphere.
//!
//! These helpers operate on projected 2D points (`x` = longitude, `y` =
//! latitude, degrees) and unit vectors in model orientation: +Z through the
//! north pole, +X through (0°N, 0°E).

use glam::{DVec2, DVec3};

/// Degrees per radian.
pub const DEG_PER_RAD: f64 = 180.0 / std::f64::consts::PI;
/// Radians per degree.
pub const RAD_PER_DEG: f64 = std::f64::consts::PI / 180.0;

/// Unit vector for a latitude/longitude in degrees.
#[must_use]
pub fn unit_vector(lat_deg: f64, lon_deg: f64) -> DVec3 {
    let lat = lat_deg * RAD_PER_DEG;
    let lon = lon_deg * RAD_PER_DEG;
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();
    DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat)
}

/// Latitude/longitude (degrees) of a unit vector, as a projected 2D point.
///
/// Longitude is in `(-180, 180]`; at the poles the longitude is 0.
#[must_use]
pub fn geo_of_unit(v: DVec3) -> DVec2 {
    let lat = v.z.clamp(-1.0, 1.0).asin() * DEG_PER_RAD;
    if v.x == 0.0 && v.y == 0.0 {
        return DVec2::new(0.0, lat);
    }
    let lon = v.y.atan2(v.x) * DEG_PER_RAD;
    DVec2::new(lon, lat)
}

/// Great-circle distance between two projected points, in radians.
#[must_use]
pub fn gc_distance_rad(a: DVec2, b: DVec2) -> f64 {
    let va = unit_vector(a.y, a.x);
    let vb = unit_vector(b.y, b.x);
    // atan2 form is stable for both small and near-antipodal separations.
    va.cross(vb).length().atan2(va.dot(vb))
}

/// Interpolate along the great circle from `a` to `b` by fraction `t`.
///
/// Falls back to linear interpolation of the projected coordinates when the
/// points are nearly coincident or antipodal (where the great circle is
/// ill-defined).
#[must_use]
pub fn gc_interpolate(a: DVec2, b: DVec2, t: f64) -> DVec2 {
    let va = unit_vector(a.y, a.x);
    let vb = unit_vector(b.y, b.x);
    let omega = va.cross(vb).length().atan2(va.dot(vb));
    if omega < 1e-12 || (std::f64::consts::PI - omega) < 1e-9 {
        return a + (b - a) * t;
    }
    let sin_omega = omega.sin();
    let v = va * ((1.0 - t) * omega).sin() / sin_omega + vb * (t * omega).sin() / sin_omega;
    geo_of_unit(v.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_vector_cardinal_points() {
        assert!((unit_vector(0.0, 0.0) - DVec3::X).length() < 1e-12);
        assert!((unit_vector(90.0, 0.0) - DVec3::Z).length() < 1e-12);
        assert!((unit_vector(0.0, 90.0) - DVec3::Y).length() < 1e-12);
    }

    #[test]
    fn test_geo_of_unit_round_trip() {
        for &(lat, lon) in &[(0.0, 0.0), (45.0, -120.0), (-67.5, 13.25), (89.0, 179.0)] {
            let p = geo_of_unit(unit_vector(lat, lon));
            assert!((p.y - lat).abs() < 1e-9, "lat {lat} -> {}", p.y);
            assert!((p.x - lon).abs() < 1e-9, "lon {lon} -> {}", p.x);
        }
    }

    #[test]
    fn test_distance_quarter_circle() {
        let d = gc_distance_rad(DVec2::new(0.0, 0.0), DVec2::new(90.0, 0.0));
        assert!((d - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_interpolate_midpoint_on_equator() {
        let m = gc_interpolate(DVec2::new(-60.0, 0.0), DVec2::new(20.0, 0.0), 0.5);
        assert!(m.y.abs() < 1e-9);
        assert!((m.x + 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_interpolate_endpoints() {
        let a = DVec2::new(10.0, 20.0);
        let b = DVec2::new(40.0, 50.0);
        assert!((gc_interpolate(a, b, 0.0) - a).length() < 1e-9);
        assert!((gc_interpolate(a, b, 1.0) - b).length() < 1e-9);
    }

    #[test]
    fn test_interpolate_crosses_antimeridian_short_way() {
        let m = gc_interpolate(DVec2::new(170.0, 0.0), DVec2::new(-170.0, 0.0), 0.25);
        // Short path runs east through 180; a quarter of 20 degrees is 5.
        assert!((m.x - 175.0).abs() < 1e-9, "got lon {}", m.x);
    }
}
