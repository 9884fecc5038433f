//! The globe facade: one writer lock around the mutable model, an
//! atomically swapped snapshot for readers.

use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use glam::DVec3;
use tellus_body::{
    CelestialBody, ElevationChange, ElevationChangeKind, ElevationProvider, FanTriangulator,
    PolygonTriangulator, ProviderId, Viewer,
};
use tellus_config::TerrainConfig;
use tellus_geo::{GeoBounds, GeoPos, Ray};
use tellus_mesh::line::{conform_line, LineRequest};
use tellus_mesh::tessera::TesseraBlock;
use tellus_mesh::{model_coordinates, Vertex};
use tracing::debug;

use crate::diff::snapshot_diff;
use crate::error::TerrainError;
use crate::model::GlobeModel;
use crate::snapshot::GlobeSnapshot;

/// The public face of the terrain engine.
///
/// All structural mutation runs synchronously under the writer lock and ends
/// by publishing a fresh snapshot; reads never touch the lock, they grab the
/// current snapshot handle and query that. Mutation methods return the
/// coalesced bounding boxes where the published geometry changed, which is
/// what drives incremental redraw.
pub struct GlobeTerrain {
    body: Arc<dyn CelestialBody>,
    model: RwLock<GlobeModel>,
    snapshot: RwLock<Arc<GlobeSnapshot>>,
}

impl GlobeTerrain {
    /// A globe over `body` with the fan triangulator for partial tesserae.
    #[must_use]
    pub fn new(body: Arc<dyn CelestialBody>, config: TerrainConfig) -> Self {
        Self::with_triangulator(body, config, Arc::new(FanTriangulator))
    }

    #[must_use]
    pub fn with_triangulator(
        body: Arc<dyn CelestialBody>,
        config: TerrainConfig,
        triangulator: Arc<dyn PolygonTriangulator>,
    ) -> Self {
        let model = GlobeModel::new(Arc::clone(&body), config, triangulator);
        let snapshot = Arc::new(GlobeSnapshot::capture(model.mesh()));
        Self {
            body,
            model: RwLock::new(model),
            snapshot: RwLock::new(snapshot),
        }
    }

    /// The currently published snapshot. Holders keep a consistent view for
    /// as long as they hold the `Arc`, regardless of later mutation.
    #[must_use]
    pub fn snapshot(&self) -> Arc<GlobeSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write_model(&self) -> RwLockWriteGuard<'_, GlobeModel> {
        self.model.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Build a snapshot from the model, swap it in, and report where it
    /// differs from the previous one.
    fn publish(&self, model: &GlobeModel) -> Vec<GeoBounds> {
        let fresh = Arc::new(GlobeSnapshot::capture(model.mesh()));
        let mut slot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        let changed = snapshot_diff(&slot, &fresh);
        *slot = fresh;
        debug!(changed = changed.len(), "published snapshot");
        changed
    }

    /// Adapt the mesh to a viewer and publish the result.
    pub fn update_for_view(
        &self,
        viewer: &dyn Viewer,
        region: Option<&GeoBounds>,
    ) -> Vec<GeoBounds> {
        let mut model = self.write_model();
        let changes = model.update_for_view(viewer, region);
        if changes == 0 {
            return Vec::new();
        }
        self.publish(&model)
    }

    /// Register a provider and react to the structural change.
    pub fn add_provider(
        &self,
        provider: Arc<dyn ElevationProvider>,
    ) -> Result<(ProviderId, Vec<GeoBounds>), TerrainError> {
        let mut model = self.write_model();
        let id = model.elevation_mut().add_provider(provider);
        model.handle_elevation_change(&ElevationChange::structural(
            ElevationChangeKind::ProviderAdded,
        ))?;
        Ok((id, self.publish(&model)))
    }

    /// Remove a provider and react to the structural change. Petrified
    /// terrain that depended on the provider is rebuilt live.
    pub fn remove_provider(&self, id: ProviderId) -> Result<Vec<GeoBounds>, TerrainError> {
        let mut model = self.write_model();
        model.elevation_mut().remove_provider(id);
        model.handle_elevation_change(&ElevationChange::structural(
            ElevationChangeKind::ProviderRemoved,
        ))?;
        Ok(self.publish(&model))
    }

    /// Re-rank a provider and react to the structural change.
    pub fn set_provider_priority(
        &self,
        id: ProviderId,
        rank: usize,
    ) -> Result<Vec<GeoBounds>, TerrainError> {
        let mut model = self.write_model();
        model.elevation_mut().set_priority(id, rank);
        model.handle_elevation_change(&ElevationChange::structural(
            ElevationChangeKind::ProviderPriorityChanged,
        ))?;
        Ok(self.publish(&model))
    }

    /// Deliver an elevation-change notification directly.
    pub fn handle_elevation_change(
        &self,
        change: &ElevationChange,
    ) -> Result<Vec<GeoBounds>, TerrainError> {
        let mut model = self.write_model();
        model.handle_elevation_change(change)?;
        Ok(self.publish(&model))
    }

    /// Model-space position of a geographic point on the current snapshot.
    pub fn model_position(&self, pos: &GeoPos) -> Result<DVec3, TerrainError> {
        if !(-90.0..=90.0).contains(&pos.lat_deg) {
            return Err(TerrainError::LatitudeOutOfRange(pos.lat_deg));
        }
        let snapshot = self.snapshot();
        let leaf = snapshot.containing_leaf(pos.as_2d(), false);
        Ok(model_coordinates(
            snapshot.as_ref(),
            self.body.as_ref(),
            leaf,
            pos,
        ))
    }

    /// Nearest terrain hit of a model-space ray, from the current snapshot.
    #[must_use]
    pub fn intersect_ray(&self, ray: &Ray) -> Option<DVec3> {
        self.snapshot().intersect_ray(ray)
    }

    /// Render blocks for a region, from the current snapshot.
    #[must_use]
    pub fn tesserae_in_bounds(&self, region: &GeoBounds) -> Vec<TesseraBlock> {
        self.snapshot().tesserae_in_bounds(region)
    }

    /// Drape a line over the current snapshot.
    pub fn conform_line(&self, req: &LineRequest) -> Result<Vec<Vertex>, TerrainError> {
        let snapshot = self.snapshot();
        Ok(conform_line(snapshot.as_ref(), self.body.as_ref(), req)?)
    }

    /// Tesserae straight from the mutable model; rejected unless the whole
    /// region is petrified.
    pub fn petrified_tesserae(
        &self,
        region: &GeoBounds,
    ) -> Result<Vec<TesseraBlock>, TerrainError> {
        let model = self.model.read().unwrap_or_else(PoisonError::into_inner);
        model.petrified_tesserae(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tellus_body::{SnapshotViewer, SphericalBody};
    use tellus_geo::{AltitudeRef, GeoPolygon};
    use tellus_mesh::{leaves_in_bounds, TriStore};

    struct PlateauProvider {
        bounds: GeoBounds,
        petrify: bool,
    }

    impl ElevationProvider for PlateauProvider {
        fn elevation_m(&self, _pos: &GeoPos, _allow_approx: bool) -> f64 {
            50.0
        }
        fn resolution_hint_m(&self) -> f64 {
            f64::MAX
        }
        fn min_variance(&self) -> f64 {
            0.002
        }
        fn petrifies_terrain(&self) -> bool {
            self.petrify
        }
        fn regions(&self) -> Vec<GeoPolygon> {
            let b = &self.bounds;
            vec![GeoPolygon::new(vec![
                glam::DVec2::new(b.min_lon, b.min_lat),
                glam::DVec2::new(b.max_lon, b.min_lat),
                glam::DVec2::new(b.max_lon, b.max_lat),
                glam::DVec2::new(b.min_lon, b.max_lat),
            ])]
        }
        fn bounding_box(&self) -> GeoBounds {
            self.bounds
        }
    }

    struct AdjustableProvider {
        bounds: GeoBounds,
        level: std::sync::Mutex<f64>,
    }

    impl ElevationProvider for AdjustableProvider {
        fn elevation_m(&self, _pos: &GeoPos, _allow_approx: bool) -> f64 {
            *self.level.lock().unwrap()
        }
        fn resolution_hint_m(&self) -> f64 {
            f64::MAX
        }
        fn min_variance(&self) -> f64 {
            0.002
        }
        fn petrifies_terrain(&self) -> bool {
            false
        }
        fn regions(&self) -> Vec<GeoPolygon> {
            let b = &self.bounds;
            vec![GeoPolygon::new(vec![
                glam::DVec2::new(b.min_lon, b.min_lat),
                glam::DVec2::new(b.max_lon, b.min_lat),
                glam::DVec2::new(b.max_lon, b.max_lat),
                glam::DVec2::new(b.min_lon, b.max_lat),
            ])]
        }
        fn bounding_box(&self) -> GeoBounds {
            self.bounds
        }
    }

    fn globe(min_generations: u32) -> GlobeTerrain {
        let mut config = TerrainConfig::default();
        config.min_generations = min_generations;
        GlobeTerrain::new(Arc::new(SphericalBody::earth()), config)
    }

    fn petrified_leaves_in(snapshot: &GlobeSnapshot, region: &GeoBounds) -> (usize, usize) {
        let leaves = leaves_in_bounds(snapshot, region);
        let frozen = leaves
            .iter()
            .filter(|&&id| snapshot.is_petrified(id))
            .count();
        (frozen, leaves.len())
    }

    #[test]
    fn test_model_position_rejects_bad_latitude() {
        let globe = globe(2);
        let pos = GeoPos::new(91.0, 0.0, 0.0, AltitudeRef::Ellipsoid);
        assert!(matches!(
            globe.model_position(&pos),
            Err(TerrainError::LatitudeOutOfRange(_))
        ));
    }

    #[test]
    fn test_model_position_on_equator() {
        let globe = globe(4);
        let pos = GeoPos::on_ellipsoid(0.0, 0.0);
        let p = globe.model_position(&pos).unwrap();
        assert!(
            (p.length() - SphericalBody::EARTH_RADIUS_M).abs() < 1.0,
            "surface point should sit on the sphere, got {}",
            p.length()
        );
    }

    #[test]
    fn test_view_update_is_idempotent_at_fixed_viewer() {
        let globe = globe(3);
        let viewer = SnapshotViewer::looking_at_origin(
            glam::DVec3::new(2.0 * SphericalBody::EARTH_RADIUS_M, 0.0, 0.0),
            1024,
        );
        let first = globe.update_for_view(&viewer, None);
        assert!(!first.is_empty(), "first pass should refine toward the eye");
        let second = globe.update_for_view(&viewer, None);
        assert!(second.is_empty(), "stable viewer must not keep mutating");
    }

    #[test]
    fn test_snapshot_isolation_across_mutation() {
        let globe = globe(3);
        let before = globe.snapshot();
        let region = GeoBounds::new(-90.0, 90.0, -180.0, 180.0);
        let leaves_before = leaves_in_bounds(before.as_ref(), &region).len();

        let viewer = SnapshotViewer::looking_at_origin(
            glam::DVec3::new(1.2 * SphericalBody::EARTH_RADIUS_M, 0.0, 0.0),
            2048,
        );
        globe.update_for_view(&viewer, None);

        assert_eq!(
            leaves_in_bounds(before.as_ref(), &region).len(),
            leaves_before,
            "a taken snapshot must not observe later mutation"
        );
        assert_ne!(
            leaves_in_bounds(globe.snapshot().as_ref(), &region).len(),
            leaves_before,
            "the new snapshot should see the refinement"
        );
    }

    #[test]
    fn test_petrifying_provider_freezes_and_thaws() {
        let globe = globe(6);
        let bbox = GeoBounds::new(0.0, 60.0, 0.0, 60.0);
        let (id, _) = globe
            .add_provider(Arc::new(PlateauProvider {
                bounds: bbox,
                petrify: true,
            }))
            .unwrap();

        let snapshot = globe.snapshot();
        let (frozen, total) = petrified_leaves_in(&snapshot, &bbox);
        assert!(frozen > 0, "no leaves petrified in {total} candidates");
        for &leaf in &leaves_in_bounds(snapshot.as_ref(), &bbox) {
            let n = snapshot.tri(leaf);
            if bbox.contains_bounds(&n.bounds) && !n.pole {
                assert!(snapshot.is_petrified(leaf), "leaf fully inside must freeze");
            }
        }

        globe.remove_provider(id).unwrap();
        let (frozen_after, _) = petrified_leaves_in(&globe.snapshot(), &bbox);
        assert_eq!(frozen_after, 0, "removal must thaw the region");
    }

    #[test]
    fn test_petrified_tesserae_reject_live_regions() {
        let globe = globe(6);
        let bbox = GeoBounds::new(0.0, 60.0, 0.0, 60.0);
        globe
            .add_provider(Arc::new(PlateauProvider {
                bounds: bbox,
                petrify: true,
            }))
            .unwrap();

        let live = GeoBounds::new(-60.0, -10.0, -120.0, -80.0);
        assert!(matches!(
            globe.petrified_tesserae(&live),
            Err(TerrainError::Unsupported(_))
        ));

        // Ask for the footprint of an interior petrified leaf, one whose
        // overlapping neighbors are all petrified too.
        let snapshot = globe.snapshot();
        let inner = leaves_in_bounds(snapshot.as_ref(), &bbox)
            .into_iter()
            .filter(|&id| snapshot.is_petrified(id))
            .map(|id| snapshot.tri(id).bounds)
            .find(|b| {
                leaves_in_bounds(snapshot.as_ref(), b)
                    .iter()
                    .all(|&id| snapshot.is_petrified(id))
            })
            .expect("an interior petrified leaf exists");
        match globe.petrified_tesserae(&inner) {
            Ok(blocks) => assert!(!blocks.is_empty()),
            Err(e) => panic!("petrified region should serve tesserae: {e}"),
        }
    }

    #[test]
    fn test_terrain_modified_without_provider_is_rejected() {
        let globe = globe(3);
        let change = ElevationChange {
            kind: ElevationChangeKind::TerrainModified,
            provider: None,
            regions: None,
        };
        assert!(matches!(
            globe.handle_elevation_change(&change),
            Err(TerrainError::MissingInput(_))
        ));
    }

    #[test]
    fn test_terrain_modified_moves_vertices_and_reports_bounds() {
        let globe = globe(5);
        let bbox = GeoBounds::new(10.0, 40.0, 10.0, 40.0);
        let provider = Arc::new(AdjustableProvider {
            bounds: bbox,
            level: std::sync::Mutex::new(50.0),
        });
        let (id, _) = globe.add_provider(provider.clone()).unwrap();

        let sample = GeoPos::new(25.0, 25.0, 0.0, AltitudeRef::Terrain);
        let before = globe.model_position(&sample).unwrap();

        // The provider's data changes in place; only the event tells the
        // globe to re-sample the region.
        *provider.level.lock().unwrap() = 5_000.0;
        let changed = globe
            .handle_elevation_change(&ElevationChange::terrain_modified(id, Some(vec![bbox])))
            .unwrap();
        assert!(!changed.is_empty());
        assert!(changed.iter().any(|b| b.intersects(&bbox)));

        let after = globe.model_position(&sample).unwrap();
        assert!(
            after.length() > before.length() + 1_000.0,
            "surface should rise: {} -> {}",
            before.length(),
            after.length()
        );
    }
}
