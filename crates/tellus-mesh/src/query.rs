//! Spatial queries over a triangle store.
//!
//! Everything here is generic over [`TriStore`], so the same code serves the
//! mutable mesh and published snapshots.

use glam::{DVec2, DVec3};
use tellus_geo::{segment_intersection_2d, GeoBounds, GeoPolygon, Ray};

use crate::arena::{TriId, TriStore};
use crate::node::{contains_model_position, is_degenerate, node_contains};

/// Normalize a longitude into `(-180, 180]`.
#[must_use]
pub fn wrap_lon(lon: f64) -> f64 {
    let mut l = (lon + 180.0).rem_euclid(360.0);
    if l == 0.0 {
        l = 360.0;
    }
    l - 180.0
}

/// The leaf containing a projected point.
///
/// Descends from the containing root by 2D containment, falling back to the
/// nearer child center in the numeric gaps between curved edges. Without
/// `allow_degenerate`, a degenerate (near-pole sliver) result is traded for
/// its hypotenuse neighbor, or its BC neighbor if that one is degenerate
/// too.
#[must_use]
pub fn containing_leaf<S: TriStore + ?Sized>(store: &S, p: DVec2, allow_degenerate: bool) -> TriId {
    let p = DVec2::new(wrap_lon(p.x), p.y.clamp(-90.0, 90.0));
    let roots = store.roots();
    let mut id = roots
        .into_iter()
        .find(|&r| node_contains(store, r, p))
        .unwrap_or(if p.y >= 0.0 { roots[0] } else { roots[1] });
    while let Some((l, r)) = store.tri(id).children {
        id = if node_contains(store, l, p) {
            l
        } else if node_contains(store, r, p) {
            r
        } else {
            let dl = (store.tri(l).geo_center - p).length_squared();
            let dr = (store.tri(r).geo_center - p).length_squared();
            if dl <= dr { l } else { r }
        };
    }
    if !allow_degenerate && is_degenerate(store, id) {
        let n = store.tri(id);
        // Hypotenuse neighbor first; the pinwheel partner of a sliver can be
        // a sliver itself, so fall through the legs.
        for adj in [n.adj_c, n.adj_a, n.adj_b] {
            if let Some(t) = adj {
                if !is_degenerate(store, t) {
                    return t;
                }
            }
        }
    }
    id
}

/// All leaves whose bounds intersect the region.
#[must_use]
pub fn leaves_in_bounds<S: TriStore + ?Sized>(store: &S, region: &GeoBounds) -> Vec<TriId> {
    let mut out = Vec::new();
    for root in store.roots() {
        collect_in_bounds(store, root, region, &mut out);
    }
    out
}

fn collect_in_bounds<S: TriStore + ?Sized>(
    store: &S,
    id: TriId,
    region: &GeoBounds,
    out: &mut Vec<TriId>,
) {
    let n = store.tri(id);
    if !n.bounds.intersects(region) {
        return;
    }
    match n.children {
        Some((l, r)) => {
            collect_in_bounds(store, l, region, out);
            collect_in_bounds(store, r, region, out);
        }
        None => out.push(id),
    }
}

/// Leaves overlapping a polygon, split into fully and partially contained.
#[derive(Debug, Default)]
pub struct PolygonOverlap {
    /// Leaves lying entirely inside the polygon.
    pub full: Vec<TriId>,
    /// Leaves crossing the polygon boundary.
    pub partial: Vec<TriId>,
}

/// Overlap search against a convex polygon, with a bounding-circle prefilter
/// ahead of the exact separating-axis test.
#[must_use]
pub fn overlap_convex_polygon<S: TriStore + ?Sized>(
    store: &S,
    poly: &GeoPolygon,
    eps: f64,
) -> PolygonOverlap {
    let circle = poly.bounding_circle();
    let mut out = PolygonOverlap::default();
    for root in store.roots() {
        overlap_convex_rec(store, root, poly, circle, eps, &mut out);
    }
    out
}

fn overlap_convex_rec<S: TriStore + ?Sized>(
    store: &S,
    id: TriId,
    poly: &GeoPolygon,
    circle: (DVec2, f64),
    eps: f64,
    out: &mut PolygonOverlap,
) {
    let n = store.tri(id);
    let (center, radius) = n.polygon.bounding_circle();
    if (center - circle.0).length() > radius + circle.1 + eps {
        return;
    }
    if !n.polygon.overlaps(poly, eps) {
        return;
    }
    match n.children {
        Some((l, r)) => {
            overlap_convex_rec(store, l, poly, circle, eps, out);
            overlap_convex_rec(store, r, poly, circle, eps, out);
        }
        None => {
            if poly.contains_polygon(&n.polygon) {
                out.full.push(id);
            } else {
                out.partial.push(id);
            }
        }
    }
}

/// Even-odd containment test for an arbitrary (possibly non-convex) ring.
#[must_use]
pub fn ring_contains(ring: &[DVec2], p: DVec2) -> bool {
    let mut inside = false;
    let n = ring.len();
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    inside
}

/// Overlap search against an arbitrary simple ring.
///
/// A leaf is `full` when all its corners lie inside the ring and no edges
/// cross; it is `partial` when the boundaries interact in any other way.
#[must_use]
pub fn overlap_ring<S: TriStore + ?Sized>(store: &S, ring: &[DVec2]) -> PolygonOverlap {
    let ring_bounds = GeoBounds::from_points(ring.iter().copied());
    let mut out = PolygonOverlap::default();
    for root in store.roots() {
        overlap_ring_rec(store, root, ring, &ring_bounds, &mut out);
    }
    out
}

fn overlap_ring_rec<S: TriStore + ?Sized>(
    store: &S,
    id: TriId,
    ring: &[DVec2],
    ring_bounds: &GeoBounds,
    out: &mut PolygonOverlap,
) {
    let n = store.tri(id);
    if !n.bounds.intersects(ring_bounds) {
        return;
    }
    if let Some((l, r)) = n.children {
        overlap_ring_rec(store, l, ring, ring_bounds, out);
        overlap_ring_rec(store, r, ring, ring_bounds, out);
        return;
    }
    let corners = n.polygon.points();
    let inside = corners.iter().filter(|&&c| ring_contains(ring, c)).count();
    let crossings = ring_edge_crossings(ring, corners);
    if inside == corners.len() && !crossings {
        out.full.push(id);
    } else if inside > 0 || crossings || ring.iter().any(|&p| n.polygon.contains(p)) {
        out.partial.push(id);
    }
}

fn ring_edge_crossings(ring: &[DVec2], corners: &[DVec2]) -> bool {
    let rn = ring.len();
    let cn = corners.len();
    for i in 0..rn {
        let (a, b) = (ring[i], ring[(i + 1) % rn]);
        for j in 0..cn {
            let (c, d) = (corners[j], corners[(j + 1) % cn]);
            if segment_intersection_2d(a, b, c, d).is_some() {
                return true;
            }
        }
    }
    false
}

/// Nearest forward intersection of a model-space ray with the mesh surface.
#[must_use]
pub fn intersect_ray<S: TriStore + ?Sized>(store: &S, ray: &Ray) -> Option<DVec3> {
    let len = ray.dir.length();
    if len < 1e-30 {
        return None;
    }
    intersect_dir(store, ray.origin, ray.dir / len, f64::MAX)
}

/// Nearest intersection of the model-space segment `[p, q]` with the mesh
/// surface, measured from `p`.
#[must_use]
pub fn intersect_segment<S: TriStore + ?Sized>(store: &S, p: DVec3, q: DVec3) -> Option<DVec3> {
    let dir = q - p;
    let len = dir.length();
    if len < 1e-30 {
        return None;
    }
    intersect_dir(store, p, dir / len, len)
}

fn intersect_dir<S: TriStore + ?Sized>(
    store: &S,
    origin: DVec3,
    dir: DVec3,
    max_t: f64,
) -> Option<DVec3> {
    let mut best: Option<(f64, DVec3)> = None;
    for root in store.roots() {
        intersect_rec(store, root, origin, dir, max_t, &mut best);
    }
    best.map(|(_, p)| p)
}

fn intersect_rec<S: TriStore + ?Sized>(
    store: &S,
    id: TriId,
    origin: DVec3,
    dir: DVec3,
    max_t: f64,
    best: &mut Option<(f64, DVec3)>,
) {
    let n = store.tri(id);
    let to_center = n.bsphere.center - origin;
    let along = to_center.dot(dir);
    if along < -n.bsphere.radius || along > max_t + n.bsphere.radius {
        return;
    }
    if (to_center - dir * along).length() > n.bsphere.radius {
        return;
    }
    if let Some(t) = best.map(|(t, _)| t) {
        if along - n.bsphere.radius > t {
            return;
        }
    }
    if let Some((l, r)) = n.children {
        intersect_rec(store, l, origin, dir, max_t, best);
        intersect_rec(store, r, origin, dir, max_t, best);
        return;
    }
    if n.plane.is_degenerate() {
        return;
    }
    let ray = Ray::new(origin, dir);
    let Some(t) = n.plane.intersect_ray(&ray) else {
        return;
    };
    if t > max_t {
        return;
    }
    let p = ray.at(t);
    if contains_model_position(store, id, p) && best.map_or(true, |(bt, _)| t < bt) {
        *best = Some((t, p));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::TriangleMesh;
    use crate::context::MeshContext;
    use tellus_body::{CelestialBody, ElevationModel, SphericalBody};
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

        fn ctx(&self) -> MeshContext<'_> {
            MeshContext::new(&self.body, &self.elevation, &self.config)
        }

        fn mesh(&self) -> TriangleMesh {
            let ctx = self.ctx();
            let mut mesh = TriangleMesh::build_base(&ctx);
            while mesh.split_pass(&ctx, None) > 0 {}
            mesh
        }
    }

    #[test]
    fn test_wrap_lon() {
        assert_eq!(wrap_lon(0.0), 0.0);
        assert_eq!(wrap_lon(180.0), 180.0);
        assert_eq!(wrap_lon(-180.0), 180.0);
        assert_eq!(wrap_lon(190.0), -170.0);
        assert_eq!(wrap_lon(-541.0), 179.0);
    }

    #[test]
    fn test_containing_leaf_is_a_containing_leaf() {
        let f = Fixture::new(3);
        let mesh = f.mesh();
        for &(lon, lat) in &[(0.0, 0.0), (-90.0, 45.0), (170.0, -80.0), (180.0, 10.0)] {
            let p = DVec2::new(lon, lat);
            let id = containing_leaf(&mesh, p, true);
            assert!(mesh.tri(id).children.is_none());
            assert!(
                mesh.tri(id).polygon.contains_eps(p, 1e-6),
                "({lon}, {lat}) not in leaf footprint"
            );
        }
    }

    #[test]
    fn test_degenerate_leaf_redirects_to_neighbor() {
        let f = Fixture::new(1);
        let ctx = f.ctx();
        let mut mesh = TriangleMesh::build_base(&ctx);
        let p = DVec2::new(-90.0, 89.95);
        let mut found = None;
        for _ in 0..60 {
            let id = containing_leaf(&mesh, p, true);
            if is_degenerate(&mesh, id) {
                found = Some(id);
                break;
            }
            assert!(mesh.split(id, &ctx), "split toward the pole stalled");
        }
        let degenerate = found.expect("no degenerate sliver reached near the pole");
        let redirected = containing_leaf(&mesh, p, false);
        assert_ne!(redirected, degenerate);
        assert!(!is_degenerate(&mesh, redirected));
    }

    #[test]
    fn test_leaves_in_bounds_prefilters() {
        let f = Fixture::new(3);
        let mesh = f.mesh();
        let region = GeoBounds::new(-5.0, 5.0, -5.0, 5.0);
        let hits = leaves_in_bounds(&mesh, &region);
        assert!(!hits.is_empty());
        for id in &hits {
            assert!(mesh.tri(*id).bounds.intersects(&region));
        }
        let all = leaves_in_bounds(&mesh, &GeoBounds::FULL);
        assert!(hits.len() < all.len());
    }

    #[test]
    fn test_convex_overlap_classifies_full_and_partial() {
        let f = Fixture::new(6);
        let mesh = f.mesh();
        let poly = GeoPolygon::new(vec![
            DVec2::new(-60.0, -45.0),
            DVec2::new(60.0, -45.0),
            DVec2::new(60.0, 45.0),
            DVec2::new(-60.0, 45.0),
        ]);
        let overlap = overlap_convex_polygon(&mesh, &poly, 1e-9);
        assert!(!overlap.full.is_empty());
        assert!(!overlap.partial.is_empty());
        for id in &overlap.full {
            assert!(poly.contains_polygon(&mesh.tri(*id).polygon));
        }
        for id in &overlap.partial {
            assert!(!poly.contains_polygon(&mesh.tri(*id).polygon));
        }
    }

    #[test]
    fn test_ring_contains_nonconvex() {
        // L-shape around the origin.
        let ring = [
            DVec2::new(0.0, 0.0),
            DVec2::new(30.0, 0.0),
            DVec2::new(30.0, 10.0),
            DVec2::new(10.0, 10.0),
            DVec2::new(10.0, 30.0),
            DVec2::new(0.0, 30.0),
        ];
        assert!(ring_contains(&ring, DVec2::new(5.0, 5.0)));
        assert!(ring_contains(&ring, DVec2::new(25.0, 5.0)));
        assert!(!ring_contains(&ring, DVec2::new(25.0, 25.0)));
    }

    #[test]
    fn test_ring_overlap_finds_leaves_in_both_arms() {
        let f = Fixture::new(6);
        let mesh = f.mesh();
        let ring = [
            DVec2::new(0.0, 0.0),
            DVec2::new(60.0, 0.0),
            DVec2::new(60.0, 20.0),
            DVec2::new(20.0, 20.0),
            DVec2::new(20.0, 60.0),
            DVec2::new(0.0, 60.0),
        ];
        let overlap = overlap_ring(&mesh, &ring);
        assert!(!overlap.partial.is_empty());
        for id in overlap.full.iter().chain(&overlap.partial) {
            let b = mesh.tri(*id).bounds;
            assert!(b.intersects(&GeoBounds::new(0.0, 60.0, 0.0, 60.0)));
        }
    }

    #[test]
    fn test_ray_from_space_hits_near_side() {
        let f = Fixture::new(4);
        let mesh = f.mesh();
        let r = f.body.radius_m();
        let ray = Ray::new(DVec3::new(2.0 * r, 0.0, 0.0), DVec3::new(-1.0, 0.0, 0.0));
        let hit = intersect_ray(&mesh, &ray).expect("ray through the globe must hit");
        assert!(hit.x > 0.0, "must hit the near side");
        assert!(hit.length() > 0.9 * r && hit.length() <= 1.001 * r);
    }

    #[test]
    fn test_ray_missing_the_globe() {
        let f = Fixture::new(3);
        let mesh = f.mesh();
        let r = f.body.radius_m();
        let ray = Ray::new(DVec3::new(2.0 * r, 0.0, 0.0), DVec3::new(0.0, 0.0, 1.0));
        assert!(intersect_ray(&mesh, &ray).is_none());
    }

    #[test]
    fn test_segment_respects_its_extent() {
        let f = Fixture::new(4);
        let mesh = f.mesh();
        let r = f.body.radius_m();
        let above = DVec3::new(1.5 * r, 0.0, 0.0);
        let outside = DVec3::new(1.2 * r, 0.0, 0.0);
        assert!(intersect_segment(&mesh, above, outside).is_none());
        let through = DVec3::new(0.5 * r, 0.0, 0.0);
        assert!(intersect_segment(&mesh, above, through).is_some());
    }
}
