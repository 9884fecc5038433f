//! Shared context threaded through mesh mutations.

use tellus_body::{CelestialBody, ElevationModel, Viewer};
use tellus_config::TerrainConfig;

/// Everything a structural mesh operation needs besides the mesh itself.
///
/// The viewer is optional: construction and data-driven passes run without
/// one, and new nodes then start outside the view until the next view
/// refresh.
#[derive(Clone, Copy)]
pub struct MeshContext<'a> {
    pub body: &'a dyn CelestialBody,
    pub elevation: &'a ElevationModel,
    pub config: &'a TerrainConfig,
    pub viewer: Option<&'a dyn Viewer>,
}

impl<'a> MeshContext<'a> {
    #[must_use]
    pub fn new(
        body: &'a dyn CelestialBody,
        elevation: &'a ElevationModel,
        config: &'a TerrainConfig,
    ) -> Self {
        Self {
            body,
            elevation,
            config,
            viewer: None,
        }
    }

    /// Same context with a viewer attached.
    #[must_use]
    pub fn with_viewer(mut self, viewer: &'a dyn Viewer) -> Self {
        self.viewer = Some(viewer);
        self
    }
}
