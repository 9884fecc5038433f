//! Geographic positions with an explicit altitude reference.

use glam::DVec2;

/// What a position's altitude is measured against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AltitudeRef {
    /// Measured from the model origin (body center).
    Origin,
    /// Measured above the reference ellipsoid.
    Ellipsoid,
    /// Measured above the terrain surface.
    Terrain,
}

/// A geographic position: latitude/longitude in degrees plus an altitude in
/// meters against an explicit [`AltitudeRef`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPos {
    /// Latitude in degrees, positive north.
    pub lat_deg: f64,
    /// Longitude in degrees, positive east, in `[-180, 180]`.
    pub lon_deg: f64,
    /// Altitude in meters against `alt_ref`.
    pub alt_m: f64,
    /// What the altitude is measured against.
    pub alt_ref: AltitudeRef,
}

impl GeoPos {
    /// Create a position with an explicit altitude and reference.
    #[must_use]
    pub fn new(lat_deg: f64, lon_deg: f64, alt_m: f64, alt_ref: AltitudeRef) -> Self {
        Self {
            lat_deg,
            lon_deg,
            alt_m,
            alt_ref,
        }
    }

    /// Create a position on the ellipsoid surface (altitude 0).
    #[must_use]
    pub fn on_ellipsoid(lat_deg: f64, lon_deg: f64) -> Self {
        Self::new(lat_deg, lon_deg, 0.0, AltitudeRef::Ellipsoid)
    }

    /// The projected 2D form: `x` = longitude, `y` = latitude, degrees.
    #[must_use]
    pub fn as_2d(&self) -> DVec2 {
        DVec2::new(self.lon_deg, self.lat_deg)
    }

    /// Same position with a different altitude, keeping the reference.
    #[must_use]
    pub fn with_altitude(&self, alt_m: f64) -> Self {
        Self { alt_m, ..*self }
    }
}
