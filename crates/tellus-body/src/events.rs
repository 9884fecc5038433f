//! Elevation-change events delivered to the terrain engine.

use tellus_geo::GeoBounds;

use crate::provider::ProviderId;

/// What changed in the elevation stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElevationChangeKind {
    /// A provider was registered.
    ProviderAdded,
    /// A provider was removed.
    ProviderRemoved,
    /// A provider's priority rank changed.
    ProviderPriorityChanged,
    /// A single provider's terrain data changed in place.
    TerrainModified,
}

/// An elevation-change notification.
///
/// `provider` and `regions` are only meaningful for
/// [`ElevationChangeKind::TerrainModified`]; without explicit regions the
/// provider's whole coverage is assumed changed.
#[derive(Clone, Debug)]
pub struct ElevationChange {
    pub kind: ElevationChangeKind,
    pub provider: Option<ProviderId>,
    pub regions: Option<Vec<GeoBounds>>,
}

impl ElevationChange {
    /// A structural change (add/remove/priority) with no region detail.
    #[must_use]
    pub fn structural(kind: ElevationChangeKind) -> Self {
        Self {
            kind,
            provider: None,
            regions: None,
        }
    }

    /// A terrain modification for one provider, optionally restricted to
    /// explicit regions.
    #[must_use]
    pub fn terrain_modified(provider: ProviderId, regions: Option<Vec<GeoBounds>>) -> Self {
        Self {
            kind: ElevationChangeKind::TerrainModified,
            provider: Some(provider),
            regions,
        }
    }
}
