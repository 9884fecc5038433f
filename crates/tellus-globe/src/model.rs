//! The mutable globe model: base construction, view updates, elevation
//! change handling, and petrified-block regeneration.

use std::sync::Arc;

use glam::DVec3;
use hashbrown::HashMap;
use tellus_body::{
    CelestialBody, ElevationChange, ElevationChangeKind, ElevationModel, PolygonTriangulator,
    ProviderId, Viewer,
};
use tellus_config::TerrainConfig;
use tellus_geo::{GeoBounds, GeoPolygon};
use tellus_mesh::tessera::{tesserae_in_bounds, tesserae_in_ring, TesseraBlock};
use tellus_mesh::{leaves_in_bounds, MeshContext, TriStore, TriangleMesh};
use tracing::{debug, info};

use crate::error::TerrainError;

/// Pre-tessellated geometry for one petrified provider region.
#[derive(Clone, Debug)]
pub struct PetrifiedBlock {
    /// The provider region the block covers.
    pub region: GeoPolygon,
    /// Model-space origin the block's vertices are relative to. The global
    /// origin unless high-accuracy blocks are enabled.
    pub origin: DVec3,
    pub tesserae: Vec<TesseraBlock>,
}

/// The mutable side of the globe: the triangle mesh plus everything needed
/// to rebuild it. All mutation happens here, under the facade's writer lock;
/// readers only ever see published snapshots.
pub struct GlobeModel {
    body: Arc<dyn CelestialBody>,
    elevation: ElevationModel,
    config: TerrainConfig,
    triangulator: Arc<dyn PolygonTriangulator>,
    mesh: TriangleMesh,
    petrified_blocks: HashMap<ProviderId, Vec<PetrifiedBlock>>,
}

impl GlobeModel {
    /// Build the base topology and drive it to the minimum generation.
    #[must_use]
    pub fn new(
        body: Arc<dyn CelestialBody>,
        config: TerrainConfig,
        triangulator: Arc<dyn PolygonTriangulator>,
    ) -> Self {
        let elevation = ElevationModel::new();
        let mesh = {
            let ctx = MeshContext::new(body.as_ref(), &elevation, &config);
            let mut mesh = TriangleMesh::build_base(&ctx);
            while mesh.split_pass(&ctx, None) > 0 {}
            mesh
        };
        info!(
            tris = mesh.tri_slot_count(),
            verts = mesh.vert_slot_count(),
            "built globe mesh"
        );
        Self {
            body,
            elevation,
            config,
            triangulator,
            mesh,
            petrified_blocks: HashMap::new(),
        }
    }

    pub fn mesh(&self) -> &TriangleMesh {
        &self.mesh
    }

    pub fn body(&self) -> &Arc<dyn CelestialBody> {
        &self.body
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn elevation(&self) -> &ElevationModel {
        &self.elevation
    }

    pub(crate) fn elevation_mut(&mut self) -> &mut ElevationModel {
        &mut self.elevation
    }

    /// Blocks generated for petrifying providers, by provider.
    pub fn petrified_blocks(&self) -> &HashMap<ProviderId, Vec<PetrifiedBlock>> {
        &self.petrified_blocks
    }

    /// Throw the mesh away and rebuild it from the base topology: minimum
    /// generation everywhere, provider-driven refinement, then petrification
    /// for providers that request it.
    pub fn rebuild(&mut self) {
        let ctx = MeshContext::new(self.body.as_ref(), &self.elevation, &self.config);
        self.mesh = TriangleMesh::build_base(&ctx);
        while self.mesh.split_pass(&ctx, None) > 0 {}
        info!(
            tris = self.mesh.tri_slot_count(),
            verts = self.mesh.vert_slot_count(),
            "rebuilt globe mesh"
        );

        let petrifying: Vec<(ProviderId, GeoBounds, f64)> = self
            .elevation
            .providers()
            .filter(|(_, p)| p.petrifies_terrain())
            .map(|(id, p)| (id, p.bounding_box(), p.resolution_hint_m()))
            .collect();
        for (id, bbox, resolution) in petrifying {
            self.petrify_quartered(id, &bbox, resolution);
        }
    }

    /// Recursively quarter a petrifying provider's bounding box until each
    /// quadrant's diagonal-to-resolution ratio is tame, then refine that
    /// quadrant to convergence and freeze the matching subtrees.
    fn petrify_quartered(&mut self, provider: ProviderId, region: &GeoBounds, resolution: f64) {
        if region.diagonal_m(self.body.radius_m()) / resolution.max(1e-9)
            >= self.config.petrify_quarter_factor
        {
            for quarter in region.quarters() {
                self.petrify_quartered(provider, &quarter, resolution);
            }
            return;
        }
        let ctx = MeshContext::new(self.body.as_ref(), &self.elevation, &self.config);
        while self.mesh.split_pass(&ctx, Some(region)) > 0 {}
        self.mesh.check_petrify(provider, region);
    }

    /// One view-driven update: refresh apparent sizes, then merge, split,
    /// and merge-for-variance, optionally bounded to a region. Returns the
    /// number of structural changes.
    pub fn update_for_view(&mut self, viewer: &dyn Viewer, region: Option<&GeoBounds>) -> usize {
        self.mesh.refresh_view(viewer);
        let ctx = MeshContext::new(self.body.as_ref(), &self.elevation, &self.config)
            .with_viewer(viewer);
        let mut changes = self.mesh.merge_pass(&self.config, region);
        loop {
            let splits = self.mesh.split_pass(&ctx, region);
            changes += splits;
            if splits == 0 {
                break;
            }
        }
        changes += self.mesh.variance_merge_pass(&self.config, region);
        debug!(changes, "view update pass");
        changes
    }

    /// React to an elevation-stack notification.
    ///
    /// Structural changes rebuild the globe wholesale; a terrain
    /// modification restricted to regions re-samples only the touched
    /// vertices and re-converges the affected subtrees.
    pub fn handle_elevation_change(
        &mut self,
        change: &ElevationChange,
    ) -> Result<(), TerrainError> {
        match change.kind {
            ElevationChangeKind::ProviderAdded
            | ElevationChangeKind::ProviderRemoved
            | ElevationChangeKind::ProviderPriorityChanged => {
                debug!(kind = ?change.kind, "structural elevation change, rebuilding");
                self.rebuild();
                self.create_petrified_blocks();
                Ok(())
            }
            ElevationChangeKind::TerrainModified => {
                let provider = change
                    .provider
                    .ok_or(TerrainError::MissingInput("provider"))?;
                let regions = match &change.regions {
                    Some(regions) => regions.clone(),
                    None => {
                        let p = self
                            .elevation
                            .provider(provider)
                            .ok_or(TerrainError::MissingInput("registered provider"))?;
                        vec![p.bounding_box()]
                    }
                };
                for region in &regions {
                    let ctx =
                        MeshContext::new(self.body.as_ref(), &self.elevation, &self.config);
                    self.mesh.resample_elevation(&ctx, region);
                    while self.mesh.split_pass(&ctx, Some(region)) > 0 {}
                    self.mesh.variance_merge_pass(&self.config, Some(region));
                }
                self.create_blocks_for(provider);
                Ok(())
            }
        }
    }

    /// Regenerate the pre-tessellated blocks for every petrifying provider.
    pub fn create_petrified_blocks(&mut self) {
        self.petrified_blocks.clear();
        let ids: Vec<ProviderId> = self
            .elevation
            .providers()
            .filter(|(_, p)| p.petrifies_terrain())
            .map(|(id, _)| id)
            .collect();
        for id in ids {
            self.create_blocks_for(id);
        }
    }

    fn create_blocks_for(&mut self, id: ProviderId) {
        let Some(provider) = self.elevation.provider(id) else {
            self.petrified_blocks.remove(&id);
            return;
        };
        if !provider.petrifies_terrain() {
            return;
        }
        let regions = provider.regions();
        let mut blocks = Vec::with_capacity(regions.len());
        for region in regions {
            let mut tesserae = tesserae_in_ring(
                &self.mesh,
                self.body.as_ref(),
                region.points(),
                self.triangulator.as_ref(),
            );
            let origin = if self.config.high_accuracy_blocks {
                let c = region.centroid();
                let origin = self.body.model_position(c.y, c.x, 0.0);
                for block in &mut tesserae {
                    for v in &mut block.vertices {
                        v.model -= origin;
                    }
                }
                origin
            } else {
                DVec3::ZERO
            };
            blocks.push(PetrifiedBlock {
                region,
                origin,
                tesserae,
            });
        }
        debug!(provider = id.0, blocks = blocks.len(), "petrified blocks rebuilt");
        self.petrified_blocks.insert(id, blocks);
    }

    /// Tesserae served directly from the mutable model.
    ///
    /// Only petrified terrain may be read this way; the mutable tree is
    /// reserved for the writer, so a region touching live leaves is a
    /// contract violation rather than a degraded result.
    pub fn petrified_tesserae(
        &self,
        region: &GeoBounds,
    ) -> Result<Vec<TesseraBlock>, TerrainError> {
        let all_petrified = leaves_in_bounds(&self.mesh, region)
            .into_iter()
            .all(|id| self.mesh.is_petrified(id));
        if !all_petrified {
            return Err(TerrainError::Unsupported(
                "non-petrified tesserae must be read from a snapshot",
            ));
        }
        Ok(tesserae_in_bounds(&self.mesh, region))
    }
}
