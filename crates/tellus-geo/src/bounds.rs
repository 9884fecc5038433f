//! Geographic bounding boxes and model-space bounding spheres.

use glam::{DVec2, DVec3};

use crate::arc::gc_distance_rad;

/// An axis-aligned latitude/longitude box, degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoBounds {
    /// Southern edge.
    pub min_lat: f64,
    /// Northern edge.
    pub max_lat: f64,
    /// Western edge.
    pub min_lon: f64,
    /// Eastern edge.
    pub max_lon: f64,
}

impl GeoBounds {
    /// The whole globe.
    pub const FULL: GeoBounds = GeoBounds {
        min_lat: -90.0,
        max_lat: 90.0,
        min_lon: -180.0,
        max_lon: 180.0,
    };

    #[must_use]
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// Smallest box containing all the given projected points.
    ///
    /// Returns an inverted (empty) box for an empty iterator.
    #[must_use]
    pub fn from_points<I: IntoIterator<Item = DVec2>>(points: I) -> Self {
        let mut b = Self::new(f64::MAX, f64::MIN, f64::MAX, f64::MIN);
        for p in points {
            b.min_lat = b.min_lat.min(p.y);
            b.max_lat = b.max_lat.max(p.y);
            b.min_lon = b.min_lon.min(p.x);
            b.max_lon = b.max_lon.max(p.x);
        }
        b
    }

    /// Whether the projected point lies inside or on the boundary.
    #[must_use]
    pub fn contains(&self, p: DVec2) -> bool {
        p.y >= self.min_lat && p.y <= self.max_lat && p.x >= self.min_lon && p.x <= self.max_lon
    }

    /// Whether `other` lies fully inside this box.
    #[must_use]
    pub fn contains_bounds(&self, other: &GeoBounds) -> bool {
        other.min_lat >= self.min_lat
            && other.max_lat <= self.max_lat
            && other.min_lon >= self.min_lon
            && other.max_lon <= self.max_lon
    }

    /// Whether the two boxes overlap (shared edges count).
    #[must_use]
    pub fn intersects(&self, other: &GeoBounds) -> bool {
        self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
            && self.min_lon <= other.max_lon
            && self.max_lon >= other.min_lon
    }

    /// Smallest box containing both.
    #[must_use]
    pub fn union(&self, other: &GeoBounds) -> Self {
        Self {
            min_lat: self.min_lat.min(other.min_lat),
            max_lat: self.max_lat.max(other.max_lat),
            min_lon: self.min_lon.min(other.min_lon),
            max_lon: self.max_lon.max(other.max_lon),
        }
    }

    /// Center of the box as a projected point.
    #[must_use]
    pub fn center(&self) -> DVec2 {
        DVec2::new(
            (self.min_lon + self.max_lon) * 0.5,
            (self.min_lat + self.max_lat) * 0.5,
        )
    }

    /// The four quadrants obtained by halving both axes.
    #[must_use]
    pub fn quarters(&self) -> [GeoBounds; 4] {
        let c = self.center();
        [
            Self::new(self.min_lat, c.y, self.min_lon, c.x),
            Self::new(self.min_lat, c.y, c.x, self.max_lon),
            Self::new(c.y, self.max_lat, self.min_lon, c.x),
            Self::new(c.y, self.max_lat, c.x, self.max_lon),
        ]
    }

    /// Great-circle length of the corner-to-corner diagonal, in meters, for a
    /// body of the given radius.
    #[must_use]
    pub fn diagonal_m(&self, radius_m: f64) -> f64 {
        let a = DVec2::new(self.min_lon, self.min_lat);
        let b = DVec2::new(self.max_lon, self.max_lat);
        gc_distance_rad(a, b) * radius_m
    }
}

/// A bounding sphere in model space, meters.
#[derive(Clone, Copy, Debug)]
pub struct BoundingSphere {
    /// Center, relative to the body center.
    pub center: DVec3,
    /// Radius in meters.
    pub radius: f64,
}

impl BoundingSphere {
    /// Smallest sphere centered at the centroid of the given points.
    ///
    /// Not the minimal enclosing sphere, but tight enough for culling and
    /// containment prefilters.
    #[must_use]
    pub fn from_points(points: &[DVec3]) -> Self {
        if points.is_empty() {
            return Self {
                center: DVec3::ZERO,
                radius: 0.0,
            };
        }
        let center = points.iter().copied().sum::<DVec3>() / points.len() as f64;
        let radius = points
            .iter()
            .map(|p| (*p - center).length())
            .fold(0.0_f64, f64::max);
        Self { center, radius }
    }

    /// Whether the model-space point is inside the sphere.
    #[must_use]
    pub fn contains(&self, p: DVec3) -> bool {
        (p - self.center).length_squared() <= self.radius * self.radius
    }
}
