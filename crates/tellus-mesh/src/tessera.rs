//! Render-block emission: triangles, and pinwheel quads around the poles.

use glam::DVec2;
use hashbrown::HashSet;
use smallvec::SmallVec;
use tellus_body::{CelestialBody, PolygonTriangulator};
use tellus_geo::{GeoBounds, GeoPos};
use tracing::warn;

use crate::arena::{TriId, TriStore};
use crate::node::{is_degenerate, model_coordinates};
use crate::query::{leaves_in_bounds, overlap_ring};
use crate::vertex::Vertex;

/// How a block's vertices are to be assembled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TesseraKind {
    /// Vertices in groups of three.
    Triangles,
    /// Vertices in groups of four, from pole pinwheels.
    QuadFan,
}

/// A batch of render-ready vertices.
#[derive(Clone, Debug)]
pub struct TesseraBlock {
    pub kind: TesseraKind,
    pub vertices: Vec<Vertex>,
}

/// Strip boundaries for pole quads: successive halving toward the pole, not
/// an even subdivision, which is where polar texture distortion concentrates.
const POLE_STRIP_TS: [f64; 5] = [0.0, 0.5, 0.75, 0.875, 1.0];

/// Emit tesserae for every leaf intersecting the region.
///
/// Degenerate polar slivers pair with their hypotenuse partner into a quad,
/// subdivided into latitude strips; everything else lands in one triangle
/// block.
#[must_use]
pub fn tesserae_in_bounds<S: TriStore + ?Sized>(store: &S, region: &GeoBounds) -> Vec<TesseraBlock> {
    let leaves = leaves_in_bounds(store, region);
    emit_leaves(store, &leaves)
}

fn emit_leaves<S: TriStore + ?Sized>(store: &S, leaves: &[TriId]) -> Vec<TesseraBlock> {
    let mut blocks = Vec::new();
    let mut triangles = Vec::new();
    let mut paired: HashSet<TriId> = HashSet::new();

    for &id in leaves {
        if paired.contains(&id) {
            continue;
        }
        let n = store.tri(id);
        if is_degenerate(store, id) {
            let partner = n
                .adj_c
                .filter(|&p| store.tri(p).children.is_none() && !paired.contains(&p));
            if let Some(p) = partner {
                paired.insert(id);
                paired.insert(p);
                blocks.push(pinwheel_quads(store, id, p));
                continue;
            }
        }
        for v in [n.a, n.b, n.c] {
            triangles.push(*store.vert(v));
        }
    }
    if !triangles.is_empty() {
        blocks.push(TesseraBlock {
            kind: TesseraKind::Triangles,
            vertices: triangles,
        });
    }
    blocks
}

fn lerp_vertex(a: &Vertex, b: &Vertex, t: f64) -> Vertex {
    let geo = GeoPos::new(
        a.geo.lat_deg + (b.geo.lat_deg - a.geo.lat_deg) * t,
        a.geo.lon_deg + (b.geo.lon_deg - a.geo.lon_deg) * t,
        a.geo.alt_m + (b.geo.alt_m - a.geo.alt_m) * t,
        a.geo.alt_ref,
    );
    Vertex {
        geo,
        model: a.model.lerp(b.model, t),
        elevation_current: a.elevation_current && b.elevation_current,
    }
}

/// A degenerate sliver and its hypotenuse partner form one quad; slice it
/// into strips that halve toward the pole.
fn pinwheel_quads<S: TriStore + ?Sized>(store: &S, id: TriId, partner: TriId) -> TesseraBlock {
    let t = store.tri(id);
    let p = store.tri(partner);
    // Around the shared hypotenuse: C, A, partner C, B.
    let ring: SmallVec<[Vertex; 4]> = SmallVec::from_iter([
        *store.vert(t.c),
        *store.vert(t.a),
        *store.vert(p.c),
        *store.vert(t.b),
    ]);
    // The quad edge nearest the pole anchors the strips.
    let pole_edge = (0..4)
        .max_by(|&i, &j| {
            let si = ring[i].geo.lat_deg.abs() + ring[(i + 1) % 4].geo.lat_deg.abs();
            let sj = ring[j].geo.lat_deg.abs() + ring[(j + 1) % 4].geo.lat_deg.abs();
            si.total_cmp(&sj)
        })
        .unwrap_or(0);
    let p0 = ring[pole_edge];
    let p1 = ring[(pole_edge + 1) % 4];
    let f1 = ring[(pole_edge + 2) % 4];
    let f0 = ring[(pole_edge + 3) % 4];

    let mut vertices = Vec::with_capacity((POLE_STRIP_TS.len() - 1) * 4);
    for w in POLE_STRIP_TS.windows(2) {
        let (t0, t1) = (w[0], w[1]);
        vertices.push(lerp_vertex(&f0, &p0, t0));
        vertices.push(lerp_vertex(&f1, &p1, t0));
        vertices.push(lerp_vertex(&f1, &p1, t1));
        vertices.push(lerp_vertex(&f0, &p0, t1));
    }
    TesseraBlock {
        kind: TesseraKind::QuadFan,
        vertices,
    }
}

/// Emit tesserae for the part of the mesh covered by an arbitrary simple
/// ring. Fully covered leaves come out whole; boundary leaves are clipped
/// and handed to the triangulator. A leaf whose clip the triangulator
/// declines is logged and skipped rather than failing the request.
#[must_use]
pub fn tesserae_in_ring<S: TriStore + ?Sized>(
    store: &S,
    body: &dyn CelestialBody,
    ring: &[DVec2],
    triangulator: &dyn PolygonTriangulator,
) -> Vec<TesseraBlock> {
    let overlap = overlap_ring(store, ring);
    let mut blocks = emit_leaves(store, &overlap.full);
    let mut clipped_vertices = Vec::new();
    for &id in &overlap.partial {
        let clip = clip_ring_to_leaf(store, id, ring);
        if clip.len() < 3 {
            continue;
        }
        match triangulator.triangulate(&clip) {
            Some(tris) => {
                for tri in tris {
                    for p in tri {
                        clipped_vertices.push(surface_vertex(store, body, id, p));
                    }
                }
            }
            None => {
                warn!(leaf = id.0, corners = clip.len(), "triangulation declined, skipping clipped leaf");
            }
        }
    }
    if !clipped_vertices.is_empty() {
        blocks.push(TesseraBlock {
            kind: TesseraKind::Triangles,
            vertices: clipped_vertices,
        });
    }
    blocks
}

fn surface_vertex<S: TriStore + ?Sized>(
    store: &S,
    body: &dyn CelestialBody,
    id: TriId,
    p: DVec2,
) -> Vertex {
    let geo = GeoPos::new(p.y, p.x, 0.0, tellus_geo::AltitudeRef::Terrain);
    Vertex {
        model: model_coordinates(store, body, id, &geo),
        geo,
        elevation_current: true,
    }
}

/// Sutherland-Hodgman clip of an arbitrary subject ring against the convex
/// footprint of a leaf.
fn clip_ring_to_leaf<S: TriStore + ?Sized>(store: &S, id: TriId, subject: &[DVec2]) -> Vec<DVec2> {
    let clip = store.tri(id).polygon.points();
    let mut out = subject.to_vec();
    let n = clip.len();
    for i in 0..n {
        let a = clip[i];
        let b = clip[(i + 1) % n];
        let input = std::mem::take(&mut out);
        if input.is_empty() {
            break;
        }
        let inside = |p: DVec2| (b - a).perp_dot(p - a) >= -1e-12;
        for j in 0..input.len() {
            let cur = input[j];
            let prev = input[(j + input.len() - 1) % input.len()];
            match (inside(prev), inside(cur)) {
                (true, true) => out.push(cur),
                (false, true) => {
                    out.push(edge_line_intersection(prev, cur, a, b));
                    out.push(cur);
                }
                (true, false) => out.push(edge_line_intersection(prev, cur, a, b)),
                (false, false) => {}
            }
        }
    }
    out.dedup();
    if out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}

fn edge_line_intersection(p: DVec2, q: DVec2, a: DVec2, b: DVec2) -> DVec2 {
    let d1 = (b - a).perp_dot(p - a);
    let d2 = (b - a).perp_dot(q - a);
    let t = d1 / (d1 - d2);
    p + (q - p) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::TriangleMesh;
    use crate::context::MeshContext;
    use tellus_body::{ElevationModel, FanTriangulator, SphericalBody};
    use tellus_config::TerrainConfig;

    struct Fixture {
        body: SphericalBody,
        elevation: ElevationModel,
        config: TerrainConfig,
    }

    impl Fixture {
        fn new(min_generations: u32) -> Self {
            let mut config = TerrainConfig::default();
            config.min_generations = min_generations;
            Self {
                body: SphericalBody::earth(),
                elevation: ElevationModel::new(),
                config,
            }
        }

        fn mesh(&self) -> TriangleMesh {
            let ctx = MeshContext::new(&self.body, &self.elevation, &self.config);
            let mut mesh = TriangleMesh::build_base(&ctx);
            while mesh.split_pass(&ctx, None) > 0 {}
            mesh
        }
    }

    #[test]
    fn test_bounds_tesserae_are_triangle_triplets() {
        let f = Fixture::new(4);
        let mesh = f.mesh();
        let blocks = tesserae_in_bounds(&mesh, &GeoBounds::new(-20.0, 20.0, -20.0, 20.0));
        assert!(!blocks.is_empty());
        for block in &blocks {
            if block.kind == TesseraKind::Triangles {
                assert_eq!(block.vertices.len() % 3, 0);
            }
        }
    }

    #[test]
    fn test_quad_strips_come_in_fours_and_halve() {
        let f = Fixture::new(1);
        let ctx = MeshContext::new(&f.body, &f.elevation, &f.config);
        let mut mesh = TriangleMesh::build_base(&ctx);
        // Drive one path toward the pole until a sliver pair exists.
        let p = DVec2::new(-90.0, 89.95);
        for _ in 0..60 {
            let id = crate::query::containing_leaf(&mesh, p, true);
            if is_degenerate(&mesh, id) {
                break;
            }
            assert!(mesh.split(id, &ctx));
        }
        let blocks = tesserae_in_bounds(&mesh, &GeoBounds::new(89.9, 90.0, -180.0, 180.0));
        let quads: Vec<_> = blocks
            .iter()
            .filter(|b| b.kind == TesseraKind::QuadFan)
            .collect();
        assert!(!quads.is_empty(), "polar slivers must emit quad strips");
        for block in quads {
            assert_eq!(block.vertices.len() % 4, 0);
            assert_eq!(block.vertices.len() / 4, POLE_STRIP_TS.len() - 1);
        }
    }

    #[test]
    fn test_ring_tesserae_clip_boundary_leaves() {
        let f = Fixture::new(5);
        let mesh = f.mesh();
        let ring = [
            DVec2::new(-30.0, -20.0),
            DVec2::new(30.0, -20.0),
            DVec2::new(30.0, 20.0),
            DVec2::new(-30.0, 20.0),
        ];
        let blocks = tesserae_in_ring(&mesh, &f.body, &ring, &FanTriangulator);
        assert!(!blocks.is_empty());
        let bounds = GeoBounds::new(-20.0, 20.0, -30.0, 30.0);
        for block in &blocks {
            for v in &block.vertices {
                assert!(
                    bounds.min_lat - 1e-6 <= v.geo.lat_deg
                        && v.geo.lat_deg <= bounds.max_lat + 1e-6
                );
            }
        }
    }

    #[test]
    fn test_clip_keeps_interior_of_both() {
        let f = Fixture::new(4);
        let mesh = f.mesh();
        let leaf = crate::query::containing_leaf(&mesh, DVec2::new(10.0, 10.0), true);
        let giant = [
            DVec2::new(-179.0, -89.0),
            DVec2::new(179.0, -89.0),
            DVec2::new(179.0, 89.0),
            DVec2::new(-179.0, 89.0),
        ];
        let clip = clip_ring_to_leaf(&mesh, leaf, &giant);
        // A ring covering nearly everything clips down to the leaf itself.
        assert_eq!(clip.len(), mesh.tri(leaf).polygon.points().len());
    }
}
