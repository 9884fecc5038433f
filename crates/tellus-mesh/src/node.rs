//! Triangle nodes and their derived geometry.
//!
//! A node's vertices are ordered so that `c` is the apex: the AB edge is the
//! hypotenuse that bisection splits, and each adjacency slot names the
//! neighbor across the edge *opposite* that vertex (`adj_c` is the neighbor
//! sharing AB).

use glam::{DVec2, DVec3};
use tellus_body::{CelestialBody, ProviderId, Viewer};
use tellus_geo::{AltitudeRef, BoundingSphere, GeoBounds, GeoPolygon, GeoPos, Plane};

use crate::arena::{TriId, TriStore, TriangleMesh, VertId};
use crate::context::MeshContext;

/// Latitude beyond which a vertex counts as sitting on a pole and the
/// footprint polygon expands it into two corners.
const POLE_EXPAND_LAT: f64 = 90.0 - 1e-6;

/// Latitude band in which triangles with two or more vertices count as
/// degenerate (slivers collapsing toward a pole).
pub const DEGENERATE_LAT: f64 = 89.9;

/// Per-node LOD bookkeeping; dropped when a node petrifies.
#[derive(Clone, Copy, Debug)]
pub struct LodState {
    /// Longest edge, meters along the surface.
    pub arc_size_m: f64,
    /// Whether the node's bounding sphere intersects the view volume.
    pub in_view: bool,
    /// Apparent size of the longest edge, pixels, as of the last view pass.
    pub pixel_size: f64,
    /// Edge length below which subdivision gains no elevation detail here.
    pub resolution_hint_m: f64,
    /// Normalized variance below which a split is not worth keeping.
    pub min_variance: f64,
}

impl LodState {
    /// Recompute the view-dependent fields against a viewer.
    pub fn refresh_view(&mut self, sphere: &BoundingSphere, viewer: &dyn Viewer) {
        self.in_view = viewer.in_view(sphere);
        let width = viewer.view_width_m_at(sphere.center).max(1e-6);
        self.pixel_size = self.arc_size_m / width * f64::from(viewer.viewport_width_px());
    }
}

/// One triangle of the bisection tree.
#[derive(Clone, Debug)]
pub struct TriNode {
    pub a: VertId,
    pub b: VertId,
    pub c: VertId,
    pub parent: Option<TriId>,
    /// Both children or neither; a lone child is unrepresentable.
    pub children: Option<(TriId, TriId)>,
    /// Neighbor across BC.
    pub adj_a: Option<TriId>,
    /// Neighbor across CA.
    pub adj_b: Option<TriId>,
    /// Neighbor across AB.
    pub adj_c: Option<TriId>,
    /// Bisection depth; roots are generation 0.
    pub generation: u32,
    /// Pole-spanning root: containment delegates to the children.
    pub pole: bool,
    /// Dominant elevation provider at the footprint center.
    pub provider: Option<ProviderId>,
    /// Footprint in projected space, pole vertices expanded.
    pub polygon: GeoPolygon,
    /// Centroid of the footprint.
    pub geo_center: DVec2,
    /// Lat/lon box around the footprint.
    pub bounds: GeoBounds,
    /// Plane through the three model positions.
    pub plane: Plane,
    /// Bounding sphere of the model positions.
    pub bsphere: BoundingSphere,
    pub lod: Option<LodState>,
}

/// Footprint ring with pole vertices expanded into two corners, so the 2D
/// polygon covers the full longitude span the triangle wraps at the pole.
fn expanded_ring(pts: &[DVec2; 3]) -> Vec<DVec2> {
    let mut ring = Vec::with_capacity(4);
    for i in 0..3 {
        let p = pts[i];
        if p.y.abs() >= POLE_EXPAND_LAT {
            let pred = pts[(i + 2) % 3];
            let succ = pts[(i + 1) % 3];
            ring.push(DVec2::new(pred.x, p.y));
            ring.push(DVec2::new(succ.x, p.y));
        } else {
            ring.push(p);
        }
    }
    ring.dedup();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    // Model-space CCW triangles can project clockwise in lat/lon (southern
    // hemisphere, bisected high-latitude edges); containment needs the
    // projected ring counter-clockwise.
    let doubled_area: f64 = (0..ring.len())
        .map(|i| ring[i].perp_dot(ring[(i + 1) % ring.len()]))
        .sum();
    if doubled_area < 0.0 {
        ring.reverse();
    }
    ring
}

impl TriangleMesh {
    /// Build a fully derived node. Adjacency starts empty; the split logic
    /// wires it afterwards.
    pub(crate) fn make_node(
        &self,
        a: VertId,
        b: VertId,
        c: VertId,
        parent: Option<TriId>,
        generation: u32,
        pole: bool,
        ctx: &MeshContext,
    ) -> TriNode {
        let va = *self.vert(a);
        let vb = *self.vert(b);
        let vc = *self.vert(c);

        let ring = expanded_ring(&[va.as_2d(), vb.as_2d(), vc.as_2d()]);
        let polygon = GeoPolygon::new(ring);
        let geo_center = polygon.centroid();
        let bounds = polygon.bounds();
        let plane = Plane::from_points(va.model, vb.model, vc.model);
        let bsphere = BoundingSphere::from_points(&[va.model, vb.model, vc.model]);

        // A provider tag means the triangle is wholly that provider's: the
        // same provider must dominate at all three corners. Triangles
        // straddling a provider boundary carry none and take the
        // polygon-level hints instead.
        let provider = match (
            ctx.elevation.dominant_provider(va.as_2d()),
            ctx.elevation.dominant_provider(vb.as_2d()),
            ctx.elevation.dominant_provider(vc.as_2d()),
        ) {
            (Some(x), Some(y), Some(z)) if x == y && y == z => Some(x),
            _ => None,
        };
        let arc_size_m = [(va, vb), (vb, vc), (vc, va)]
            .iter()
            .map(|(p, q)| ctx.body.geodesic_distance_m(p.as_2d(), q.as_2d()))
            .fold(0.0_f64, f64::max);

        let (resolution_hint_m, min_variance) = match provider.and_then(|id| ctx.elevation.provider(id)) {
            Some(p) => (p.resolution_hint_m(), p.min_variance()),
            None => {
                let hints = ctx.elevation.hints_for_polygon(&polygon);
                (
                    hints
                        .resolution_hint_m
                        .unwrap_or(ctx.config.default_resolution_hint_m),
                    hints.min_variance.unwrap_or(ctx.config.default_min_variance),
                )
            }
        };

        let mut lod = LodState {
            arc_size_m,
            in_view: false,
            pixel_size: 0.0,
            resolution_hint_m,
            min_variance,
        };
        if let Some(viewer) = ctx.viewer {
            lod.refresh_view(&bsphere, viewer);
        }

        TriNode {
            a,
            b,
            c,
            parent,
            children: None,
            adj_a: None,
            adj_b: None,
            adj_c: None,
            generation,
            pole,
            provider,
            polygon,
            geo_center,
            bounds,
            plane,
            bsphere,
            lod: Some(lod),
        }
    }

    /// Recompute a node's derived geometry from its current vertices.
    ///
    /// Used after elevation re-sampling moved the vertices; structure and
    /// view-dependent LOD fields are preserved.
    pub(crate) fn refresh_geometry(&mut self, id: TriId, ctx: &MeshContext) {
        if self.is_petrified(id) {
            return;
        }
        let (a, b, c, parent, generation, pole, prev) = {
            let n = self.tri(id);
            (
                n.a,
                n.b,
                n.c,
                n.parent,
                n.generation,
                n.pole,
                n.lod.map(|l| (l.in_view, l.pixel_size)),
            )
        };
        let fresh = self.make_node(a, b, c, parent, generation, pole, ctx);
        let node = self.tri_mut(id);
        node.polygon = fresh.polygon;
        node.geo_center = fresh.geo_center;
        node.bounds = fresh.bounds;
        node.plane = fresh.plane;
        node.bsphere = fresh.bsphere;
        node.provider = fresh.provider;
        let mut lod = fresh.lod;
        if ctx.viewer.is_none() {
            if let (Some(l), Some((in_view, pixel_size))) = (lod.as_mut(), prev) {
                l.in_view = in_view;
                l.pixel_size = pixel_size;
            }
        }
        node.lod = lod;
    }

    /// Re-sample elevation for every live vertex inside the region and
    /// rebuild the derived geometry of the triangles over them.
    ///
    /// Frozen vertices are left alone; petrified terrain never moves.
    pub fn resample_elevation(&mut self, ctx: &MeshContext, region: &GeoBounds) {
        let mut touched = 0usize;
        for i in 0..self.vert_slot_count() {
            let id = VertId(i as u32);
            let Some(v) = self.vert_mut(id) else { continue };
            let p = v.as_2d();
            if !region.contains(p) {
                continue;
            }
            *v = crate::vertex::Vertex::on_terrain(ctx, p.y, p.x);
            touched += 1;
        }
        if touched == 0 {
            return;
        }
        for i in 0..self.tri_slot_count() {
            let id = TriId(i as u32);
            if !matches!(self.tri_slot(id), crate::arena::TriSlot::Live(_)) {
                continue;
            }
            if self.tri(id).bounds.intersects(region) {
                self.refresh_geometry(id, ctx);
            }
        }
        tracing::debug!(vertices = touched, "resampled elevation");
    }

    /// Refresh view-dependent LOD state for every live node.
    pub fn refresh_view(&mut self, viewer: &dyn Viewer) {
        for i in 0..self.tri_slot_count() {
            let id = TriId(i as u32);
            if self.is_petrified(id) {
                continue;
            }
            let Some(sphere) = self.try_bsphere(id) else {
                continue;
            };
            if let Some(lod) = self.tri_mut_lod(id) {
                lod.refresh_view(&sphere, viewer);
            }
        }
    }

    fn try_bsphere(&self, id: TriId) -> Option<BoundingSphere> {
        match self.tri_slot(id) {
            crate::arena::TriSlot::Live(n) => Some(n.bsphere),
            _ => None,
        }
    }

    fn tri_mut_lod(&mut self, id: TriId) -> Option<&mut LodState> {
        self.tri_mut(id).lod.as_mut()
    }
}

/// Whether the node's footprint contains the projected point.
///
/// Pole-spanning roots have no meaningful footprint of their own and
/// delegate to their children.
pub fn node_contains<S: TriStore + ?Sized>(store: &S, id: TriId, p: DVec2) -> bool {
    let n = store.tri(id);
    if n.pole {
        match n.children {
            Some((l, r)) => node_contains(store, l, p) || node_contains(store, r, p),
            None => false,
        }
    } else {
        n.polygon.contains(p)
    }
}

/// Whether two or more vertices sit in the polar degeneracy band.
pub fn is_degenerate<S: TriStore + ?Sized>(store: &S, id: TriId) -> bool {
    let n = store.tri(id);
    [n.a, n.b, n.c]
        .iter()
        .filter(|v| store.vert(**v).geo.lat_deg.abs() >= DEGENERATE_LAT)
        .count()
        >= 2
}

/// Model position for a geographic position inside this triangle.
///
/// Terrain-referenced altitudes interpolate the surface affinely over the
/// triangle (apex `c` as the local origin) and offset along the local up
/// vector; the other references do not depend on the terrain.
pub fn model_coordinates<S: TriStore + ?Sized>(
    store: &S,
    body: &dyn CelestialBody,
    id: TriId,
    pos: &GeoPos,
) -> DVec3 {
    match pos.alt_ref {
        AltitudeRef::Origin => body.up_vector(pos.lat_deg, pos.lon_deg) * pos.alt_m,
        AltitudeRef::Ellipsoid => body.model_position(pos.lat_deg, pos.lon_deg, pos.alt_m),
        AltitudeRef::Terrain => {
            let n = store.tri(id);
            let (va, vb, vc) = (store.vert(n.a), store.vert(n.b), store.vert(n.c));
            let ea = va.as_2d() - vc.as_2d();
            let eb = vb.as_2d() - vc.as_2d();
            let det = ea.perp_dot(eb);
            let surface = if det.abs() < 1e-12 {
                vc.model
            } else {
                let d = pos.as_2d() - vc.as_2d();
                let s = d.perp_dot(eb) / det;
                let t = ea.perp_dot(d) / det;
                vc.model + (va.model - vc.model) * s + (vb.model - vc.model) * t
            };
            surface + body.up_vector(pos.lat_deg, pos.lon_deg) * pos.alt_m
        }
    }
}

/// Whether a model-space point lies on this triangle.
///
/// Vertex coincidence is accepted within a coarse epsilon before the edge
/// half-space tests run, so queries built from a vertex of a *neighboring*
/// triangle still land somewhere.
pub fn contains_model_position<S: TriStore + ?Sized>(store: &S, id: TriId, p: DVec3) -> bool {
    const VERTEX_EPS_M: f64 = 1e-3;
    let n = store.tri(id);
    let (a, b, c) = (
        store.vert(n.a).model,
        store.vert(n.b).model,
        store.vert(n.c).model,
    );
    for v in [a, b, c] {
        if (p - v).length_squared() < VERTEX_EPS_M * VERTEX_EPS_M {
            return true;
        }
    }
    if n.plane.is_degenerate() {
        return false;
    }
    let normal = n.plane.normal;
    for (s, e) in [(a, b), (b, c), (c, a)] {
        let edge = e - s;
        let tol = -1e-9 * edge.length_squared();
        if edge.cross(p - s).dot(normal) < tol {
            return false;
        }
    }
    true
}
