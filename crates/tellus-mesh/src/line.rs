//! Conforming polylines to the triangulated surface.
//!
//! A line between two geographic positions is draped over the mesh: the
//! result visits every leaf edge the line crosses, so the polyline follows
//! the actual triangulated terrain instead of cutting through it.

use glam::{DVec2, DVec3};
use smallvec::SmallVec;
use tellus_body::CelestialBody;
use tellus_geo::{gc_distance_rad, unit_vector, GeoBounds, GeoPos, DEG_PER_RAD};
use tracing::trace;

use crate::arena::TriStore;
use crate::error::MeshError;
use crate::node::model_coordinates;
use crate::query::containing_leaf;
use crate::query::leaves_in_bounds;
use crate::vertex::Vertex;

/// How the path between the endpoints is traced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    /// Shortest path on the sphere.
    GreatCircle,
    /// Straight in projected lat/lon space (a rhumb-like screen line).
    Linear,
}

/// A line to conform to the mesh.
#[derive(Clone, Copy, Debug)]
pub struct LineRequest {
    pub start: GeoPos,
    pub end: GeoPos,
    pub kind: LineKind,
    /// Interpolate the endpoint altitudes along the path; when off, every
    /// vertex keeps the start altitude.
    pub interpolate_altitude: bool,
}

/// Segments longer than this are bisected before edge collection, so each
/// piece stays small against the projection's distortion.
const MAX_SEGMENT_DEG: f64 = 22.5;
const MAX_SEGMENT_ARC_DEG: f64 = 90.0;
const MAX_DEPTH: u32 = 48;

/// Drape a line over the current leaves.
///
/// The returned vertices run from `start` to `end` and include a vertex at
/// every leaf-edge crossing. A crossing of the antimeridian yields two
/// consecutive vertices, one at longitude 180 and one at -180, at the same
/// model position.
pub fn conform_line<S: TriStore + ?Sized>(
    store: &S,
    body: &dyn CelestialBody,
    req: &LineRequest,
) -> Result<Vec<Vertex>, MeshError> {
    if req.start.alt_ref != req.end.alt_ref {
        return Err(MeshError::MixedAltitudeRef {
            start: req.start.alt_ref,
            end: req.end.alt_ref,
        });
    }
    let a2 = req.start.as_2d();
    let b2 = req.end.as_2d();
    let total_m = body.geodesic_distance_m(a2, b2).max(1e-9);
    let mut out = Vec::new();
    conform_segment(store, body, req, a2, b2, total_m, 0, &mut out);
    // Adjacent segments share their junction vertex.
    out.dedup_by(|a, b| (a.geo.as_2d() - b.geo.as_2d()).length() < 1e-9);
    trace!(
        vertices = out.len(),
        kind = ?req.kind,
        "conformed line"
    );
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn conform_segment<S: TriStore + ?Sized>(
    store: &S,
    body: &dyn CelestialBody,
    req: &LineRequest,
    a2: DVec2,
    b2: DVec2,
    total_m: f64,
    depth: u32,
    out: &mut Vec<Vertex>,
) {
    if depth < MAX_DEPTH {
        if (a2.x - b2.x).abs() > 180.0 {
            // The short way runs across the antimeridian; cut the segment
            // there and continue on the far side with the opposite longitude.
            let lat = antimeridian_crossing_lat(a2, b2, req.kind);
            let (near_lon, far_lon) = if a2.x > 0.0 { (180.0, -180.0) } else { (-180.0, 180.0) };
            if (a2.x.abs() - 180.0).abs() < 1e-9 {
                // Already sitting on the seam: flip to the far side and go on.
                let flipped = DVec2::new(-a2.x, a2.y);
                conform_segment(store, body, req, flipped, b2, total_m, depth + 1, out);
                return;
            }
            conform_segment(
                store,
                body,
                req,
                a2,
                DVec2::new(near_lon, lat),
                total_m,
                depth + 1,
                out,
            );
            conform_segment(
                store,
                body,
                req,
                DVec2::new(far_lon, lat),
                b2,
                total_m,
                depth + 1,
                out,
            );
            return;
        }
        let arc_deg = gc_distance_rad(a2, b2) * DEG_PER_RAD;
        if arc_deg > MAX_SEGMENT_ARC_DEG
            || (a2.y - b2.y).abs() > MAX_SEGMENT_DEG
            || (a2.x - b2.x).abs() > MAX_SEGMENT_DEG
        {
            let mid = match req.kind {
                LineKind::GreatCircle => body.geodesic_interpolate(a2, b2, 0.5),
                LineKind::Linear => (a2 + b2) * 0.5,
            };
            conform_segment(store, body, req, a2, mid, total_m, depth + 1, out);
            conform_segment(store, body, req, mid, b2, total_m, depth + 1, out);
            return;
        }
    }
    accumulate_segment(store, body, req, a2, b2, total_m, out);
}

/// Latitude at which the path from `a2` to `b2` crosses longitude 180.
fn antimeridian_crossing_lat(a2: DVec2, b2: DVec2, kind: LineKind) -> f64 {
    if kind == LineKind::GreatCircle {
        let ua = unit_vector(a2.y, a2.x);
        let ub = unit_vector(b2.y, b2.x);
        let n = ua.cross(ub);
        if n.length() > 1e-12 {
            // The antimeridian half-plane lies in y = 0 with x < 0; the
            // great circle meets it along the line n x Y.
            let mut dir = n.cross(DVec3::Y);
            if dir.x > 0.0 {
                dir = -dir;
            }
            if dir.length() > 1e-12 && dir.x < 0.0 {
                return (dir.z / dir.length()).clamp(-1.0, 1.0).asin() * DEG_PER_RAD;
            }
        }
    }
    // Linear path, or a degenerate great circle: interpolate by the
    // longitude run on each side of the seam.
    let (to_seam, from_seam) = if a2.x > 0.0 {
        (180.0 - a2.x, b2.x + 180.0)
    } else {
        (a2.x + 180.0, 180.0 - b2.x)
    };
    let run = to_seam + from_seam;
    if run < 1e-12 {
        return (a2.y + b2.y) * 0.5;
    }
    a2.y + (b2.y - a2.y) * (to_seam / run)
}

/// Collects edge-crossing vertices along one short segment, ordered by
/// model-space distance from the segment's start.
struct LineAccumulator {
    a2: DVec2,
    b2: DVec2,
    span: f64,
    base_model: DVec3,
    hits: Vec<(f64, Vertex)>,
}

impl LineAccumulator {
    fn new(base: Vertex, b2: DVec2) -> Self {
        let a2 = base.geo.as_2d();
        Self {
            a2,
            b2,
            span: (b2 - a2).length() + 1e-9,
            base_model: base.model,
            hits: vec![(0.0, base)],
        }
    }

    /// Admit a candidate lying between the segment endpoints; anything a
    /// numerically sloppy intersection put outside the span is dropped.
    fn push(&mut self, v: Vertex) {
        let p = v.geo.as_2d();
        if (p - self.a2).length() > self.span || (p - self.b2).length() > self.span {
            return;
        }
        self.hits.push(((v.model - self.base_model).length(), v));
    }

    fn finish(mut self) -> Vec<Vertex> {
        self.hits.sort_by(|x, y| x.0.total_cmp(&y.0));
        self.hits
            .dedup_by(|x, y| (x.1.geo.as_2d() - y.1.geo.as_2d()).length() < 1e-9);
        self.hits.into_iter().map(|(_, v)| v).collect()
    }
}

fn accumulate_segment<S: TriStore + ?Sized>(
    store: &S,
    body: &dyn CelestialBody,
    req: &LineRequest,
    a2: DVec2,
    b2: DVec2,
    total_m: f64,
    out: &mut Vec<Vertex>,
) {
    let base = line_vertex(store, body, req, a2, total_m);
    let end = line_vertex(store, body, req, b2, total_m);
    let mut acc = LineAccumulator::new(base, b2);

    let pad = 1e-7;
    let bbox = GeoBounds::new(
        a2.y.min(b2.y) - pad,
        a2.y.max(b2.y) + pad,
        a2.x.min(b2.x) - pad,
        a2.x.max(b2.x) + pad,
    );
    for leaf in leaves_in_bounds(store, &bbox) {
        let hits: SmallVec<[DVec2; 4]> =
            SmallVec::from_vec(store.tri(leaf).polygon.segment_intersections(a2, b2));
        for hit in hits {
            acc.push(line_vertex(store, body, req, hit, total_m));
        }
    }
    acc.push(end);
    out.extend(acc.finish());
}

fn line_vertex<S: TriStore + ?Sized>(
    store: &S,
    body: &dyn CelestialBody,
    req: &LineRequest,
    p2: DVec2,
    total_m: f64,
) -> Vertex {
    let alt_m = if req.interpolate_altitude {
        let f = (body.geodesic_distance_m(req.start.as_2d(), p2) / total_m).clamp(0.0, 1.0);
        req.start.alt_m + (req.end.alt_m - req.start.alt_m) * f
    } else {
        req.start.alt_m
    };
    let geo = GeoPos::new(p2.y, p2.x, alt_m, req.start.alt_ref);
    let leaf = containing_leaf(store, p2, true);
    Vertex {
        model: model_coordinates(store, body, leaf, &geo),
        geo,
        elevation_current: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::TriangleMesh;
    use crate::context::MeshContext;
    use tellus_body::{ElevationModel, SphericalBody};
    use tellus_config::TerrainConfig;
    use tellus_geo::AltitudeRef;

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

    fn request(start: GeoPos, end: GeoPos, kind: LineKind) -> LineRequest {
        LineRequest {
            start,
            end,
            kind,
            interpolate_altitude: false,
        }
    }

    fn assert_monotonic(line: &[Vertex]) {
        let base = line[0].model;
        let mut last = -1.0;
        for v in line {
            let d = (v.model - base).length();
            assert!(d >= last - 1e-6, "distances must not regress: {d} < {last}");
            last = d;
        }
    }

    #[test]
    fn test_mixed_altitude_refs_rejected() {
        let f = Fixture::new(4);
        let mesh = f.mesh();
        let req = request(
            GeoPos::new(0.0, 0.0, 0.0, AltitudeRef::Terrain),
            GeoPos::new(1.0, 1.0, 0.0, AltitudeRef::Ellipsoid),
            LineKind::GreatCircle,
        );
        assert!(matches!(
            conform_line(&mesh, &f.body, &req),
            Err(MeshError::MixedAltitudeRef { .. })
        ));
    }

    #[test]
    fn test_short_line_runs_start_to_end() {
        let f = Fixture::new(4);
        let mesh = f.mesh();
        let req = request(
            GeoPos::on_ellipsoid(0.0, -10.0),
            GeoPos::on_ellipsoid(0.0, 10.0),
            LineKind::GreatCircle,
        );
        let line = conform_line(&mesh, &f.body, &req).unwrap();
        assert!(line.len() >= 2);
        assert!((line[0].geo.as_2d() - DVec2::new(-10.0, 0.0)).length() < 1e-9);
        assert!((line.last().unwrap().geo.as_2d() - DVec2::new(10.0, 0.0)).length() < 1e-9);
        assert_monotonic(&line);
    }

    #[test]
    fn test_thirty_degree_line_is_bisected() {
        let f = Fixture::new(4);
        let mesh = f.mesh();
        let req = request(
            GeoPos::on_ellipsoid(0.0, 0.0),
            GeoPos::on_ellipsoid(0.0, 30.0),
            LineKind::GreatCircle,
        );
        let line = conform_line(&mesh, &f.body, &req).unwrap();
        // 30 degrees exceeds one segment, so the bisection midpoint shows up.
        assert!(
            line.iter()
                .any(|v| (v.geo.lon_deg - 15.0).abs() < 1e-6 && v.geo.lat_deg.abs() < 1e-6),
            "midpoint vertex missing from {:?}",
            line.iter().map(|v| v.geo.as_2d()).collect::<Vec<_>>()
        );
        assert_monotonic(&line);
    }

    #[test]
    fn test_antimeridian_crossing_emits_seam_pair() {
        let f = Fixture::new(4);
        let mesh = f.mesh();
        let req = request(
            GeoPos::on_ellipsoid(10.0, 170.0),
            GeoPos::on_ellipsoid(10.0, -170.0),
            LineKind::GreatCircle,
        );
        let line = conform_line(&mesh, &f.body, &req).unwrap();
        let seam = line
            .windows(2)
            .find(|w| w[0].geo.lon_deg == 180.0 && w[1].geo.lon_deg == -180.0)
            .expect("seam pair missing");
        assert!((seam[0].geo.lat_deg - seam[1].geo.lat_deg).abs() < 1e-9);
        assert!((seam[0].model - seam[1].model).length() < 1e-3);
        for w in line.windows(2) {
            assert!((w[0].geo.lon_deg - w[1].geo.lon_deg).abs() <= 180.0);
        }
    }

    #[test]
    fn test_linear_kind_stays_on_parallel() {
        let f = Fixture::new(4);
        let mesh = f.mesh();
        let req = request(
            GeoPos::on_ellipsoid(45.0, -30.0),
            GeoPos::on_ellipsoid(45.0, 30.0),
            LineKind::Linear,
        );
        let line = conform_line(&mesh, &f.body, &req).unwrap();
        // Bisection midpoints of a linear path keep the latitude; a great
        // circle would bow poleward here.
        assert!(
            line.iter()
                .any(|v| v.geo.lon_deg.abs() < 1e-6 && (v.geo.lat_deg - 45.0).abs() < 1e-6)
        );
    }

    #[test]
    fn test_altitude_interpolation_by_distance() {
        let f = Fixture::new(4);
        let mesh = f.mesh();
        let req = LineRequest {
            start: GeoPos::new(0.0, 0.0, 0.0, AltitudeRef::Ellipsoid),
            end: GeoPos::new(0.0, 30.0, 1000.0, AltitudeRef::Ellipsoid),
            kind: LineKind::GreatCircle,
            interpolate_altitude: true,
        };
        let line = conform_line(&mesh, &f.body, &req).unwrap();
        let mid = line
            .iter()
            .find(|v| (v.geo.lon_deg - 15.0).abs() < 1e-6)
            .expect("midpoint vertex");
        assert!((mid.geo.alt_m - 500.0).abs() < 1.0);
        assert_eq!(line.last().unwrap().geo.alt_m, 1000.0);
    }
}
