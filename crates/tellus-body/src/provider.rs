//! The elevation provider contract.

use tellus_geo::{GeoBounds, GeoPolygon, GeoPos};

/// Stable handle for a registered elevation provider.
///
/// Handles stay valid across priority changes and other providers'
/// registration or removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(pub u32);

/// A source of terrain elevation over some geographic area.
pub trait ElevationProvider: Send + Sync {
    /// Elevation above the ellipsoid at a position, meters. With
    /// `allow_approx` the provider may answer from a coarser level rather
    /// than blocking on its best data.
    fn elevation_m(&self, pos: &GeoPos, allow_approx: bool) -> f64;

    /// The triangle edge length, meters, below which further subdivision
    /// gains no detail from this provider.
    fn resolution_hint_m(&self) -> f64;

    /// Normalized surface-variance threshold below which a split is not
    /// worth its render cost.
    fn min_variance(&self) -> f64;

    /// Whether terrain covered by this provider freezes permanently once
    /// subdivided to the provider's resolution.
    fn petrifies_terrain(&self) -> bool;

    /// The provider's coverage, as convex geographic polygons.
    fn regions(&self) -> Vec<GeoPolygon>;

    /// Bounding box of all coverage regions.
    fn bounding_box(&self) -> GeoBounds;
}
