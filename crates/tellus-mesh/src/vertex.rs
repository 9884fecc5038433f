//! Mesh vertices: a geographic position plus its cached model position.

use glam::{DVec2, DVec3};
use tellus_geo::GeoPos;

use crate::context::MeshContext;

/// A terrain vertex shared between triangles.
#[derive(Clone, Copy, Debug)]
pub struct Vertex {
    /// Geographic position; altitude is the sampled terrain elevation above
    /// the ellipsoid.
    pub geo: GeoPos,
    /// Cached model-space position, meters.
    pub model: DVec3,
    /// Cleared when an elevation change invalidates the sampled altitude.
    pub elevation_current: bool,
}

impl Vertex {
    /// A vertex on the terrain surface: elevation sampled from the dominant
    /// provider, model position projected through the body.
    #[must_use]
    pub fn on_terrain(ctx: &MeshContext, lat_deg: f64, lon_deg: f64) -> Self {
        let allow_approx = !ctx.config.high_accuracy_blocks;
        let alt = ctx
            .elevation
            .elevation_at(DVec2::new(lon_deg, lat_deg), allow_approx);
        Self::at_altitude(ctx, lat_deg, lon_deg, alt)
    }

    /// A vertex at an explicit ellipsoid-referenced altitude.
    ///
    /// Used for the far side of an antimeridian midpoint pair, where both
    /// vertices must land on the identical model position even though their
    /// longitudes differ in sign.
    #[must_use]
    pub fn at_altitude(ctx: &MeshContext, lat_deg: f64, lon_deg: f64, alt_m: f64) -> Self {
        Self {
            geo: GeoPos::on_ellipsoid(lat_deg, lon_deg).with_altitude(alt_m),
            model: ctx.body.model_position(lat_deg, lon_deg, alt_m),
            elevation_current: true,
        }
    }

    /// Projected 2D position: `x` = longitude, `y` = latitude, degrees.
    #[must_use]
    pub fn as_2d(&self) -> DVec2 {
        self.geo.as_2d()
    }
}
