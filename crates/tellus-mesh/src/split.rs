//! Bisection mechanics: base globe construction, split and merge cascades.
//!
//! Splitting bisects a triangle's hypotenuse (the AB edge) at its geodesic
//! midpoint. Because a hypotenuse is always shared with the neighbor across
//! it, splits come in pairs: a mutual `adj_c` pair splits together around a
//! shared midpoint, and a coarser neighbor is forced down one level first so
//! the pair exists. This is what keeps the mesh crack-free.

use glam::DVec2;
use tellus_body::ProviderId;
use tellus_geo::GeoBounds;
use tracing::{debug, trace};

use crate::arena::{TriId, TriStore, TriangleMesh, VertId};
use crate::context::MeshContext;
use crate::vertex::Vertex;

/// Longitude of the antimeridian edge the two projected endpoints lie on, if
/// they do. Pole endpoints carry longitude 0 and are skipped; endpoints on
/// *opposite* antimeridian signs describe the degenerate full-equator edge of
/// a root, which is not an antimeridian edge.
fn antimeridian_lon(a2: DVec2, b2: DVec2) -> Option<f64> {
    let mut side = 0.0_f64;
    for p in [a2, b2] {
        if p.y.abs() >= 90.0 - 1e-9 {
            continue;
        }
        if p.x >= 180.0 - 1e-9 {
            if side < 0.0 {
                return None;
            }
            side = 1.0;
        } else if p.x <= -(180.0 - 1e-9) {
            if side > 0.0 {
                return None;
            }
            side = -1.0;
        } else {
            return None;
        }
    }
    (side != 0.0).then(|| side * 180.0)
}

impl TriangleMesh {
    /// Build the base globe: two pole-spanning roots sharing the equator,
    /// split once into the four generation-1 hemisphere halves.
    ///
    /// Each root's two seam edges (the ±180° meridian) close the hemisphere
    /// onto itself, expressed as self-adjacency; the first split folds the
    /// seam onto the two children, which end up mutually adjacent across the
    /// antimeridian.
    #[must_use]
    pub fn build_base(ctx: &MeshContext) -> Self {
        let mut mesh = Self::empty();
        let w = mesh.alloc_vert(Vertex::on_terrain(ctx, 0.0, -180.0));
        let e = mesh.alloc_vert(Vertex::on_terrain(ctx, 0.0, 180.0));
        let np = mesh.alloc_vert(Vertex::on_terrain(ctx, 90.0, 0.0));
        let sp = mesh.alloc_vert(Vertex::on_terrain(ctx, -90.0, 0.0));

        let north = mesh.make_node(w, e, np, None, 0, true, ctx);
        let south = mesh.make_node(e, w, sp, None, 0, true, ctx);
        let n_id = mesh.alloc_tri(north);
        let s_id = mesh.alloc_tri(south);
        mesh.roots = [n_id, s_id];
        {
            let n = mesh.tri_mut(n_id);
            n.adj_a = Some(n_id);
            n.adj_b = Some(n_id);
            n.adj_c = Some(s_id);
        }
        {
            let s = mesh.tri_mut(s_id);
            s.adj_a = Some(s_id);
            s.adj_b = Some(s_id);
            s.adj_c = Some(n_id);
        }
        mesh.split(n_id, ctx);
        mesh
    }

    /// Split a leaf, co-splitting across the hypotenuse as needed. Returns
    /// `false` when the node is not a splittable leaf or a petrified
    /// neighbor freezes it in place.
    pub fn split(&mut self, id: TriId, ctx: &MeshContext) -> bool {
        if self.is_petrified(id) || self.tri(id).children.is_some() {
            return false;
        }
        match self.tri(id).adj_c {
            None => {
                let (a2, b2) = self.hyp_2d(id);
                let m2 = ctx.body.geodesic_interpolate(a2, b2, 0.5);
                let m = self.alloc_vert(Vertex::on_terrain(ctx, m2.y, m2.x));
                self.split_half(id, m, ctx);
                true
            }
            Some(t) => {
                if self.is_petrified(t) {
                    return false;
                }
                if self.tri(t).adj_c == Some(id) {
                    self.split_mutual(id, t, ctx);
                    true
                } else {
                    // Coarser neighbor: force it down one level; its child
                    // then shares our hypotenuse and the pair splits.
                    trace!(node = id.0, neighbor = t.0, "forcing neighbor split");
                    if !self.split(t, ctx) {
                        return false;
                    }
                    let Some(t2) = self.tri(id).adj_c else {
                        return false;
                    };
                    if t2 == t || self.is_petrified(t2) || self.tri(t2).adj_c != Some(id) {
                        return false;
                    }
                    self.split_mutual(id, t2, ctx);
                    true
                }
            }
        }
    }

    fn hyp_2d(&self, id: TriId) -> (DVec2, DVec2) {
        let n = self.tri(id);
        (self.vert(n.a).as_2d(), self.vert(n.b).as_2d())
    }

    fn split_mutual(&mut self, id: TriId, partner: TriId, ctx: &MeshContext) {
        let (a2, b2) = self.hyp_2d(id);
        let m2 = ctx.body.geodesic_interpolate(a2, b2, 0.5);
        let allow_approx = !ctx.config.high_accuracy_blocks;
        let (m_here, m_there) = match antimeridian_lon(a2, b2) {
            Some(lon) => {
                let (pa2, pb2) = self.hyp_2d(partner);
                let far_lon = antimeridian_lon(pa2, pb2).unwrap_or(-lon);
                let lat = m2.y;
                let alt = ctx
                    .elevation
                    .elevation_at(DVec2::new(lon, lat), allow_approx);
                let here = Vertex::at_altitude(ctx, lat, lon, alt);
                let mut there = Vertex::at_altitude(ctx, lat, far_lon, alt);
                // Nearly-shared pair: two longitudes, one model position.
                there.model = here.model;
                (self.alloc_vert(here), self.alloc_vert(there))
            }
            None => {
                let v = self.alloc_vert(Vertex::on_terrain(ctx, m2.y, m2.x));
                (v, v)
            }
        };
        let (l, r) = self.split_half(id, m_here, ctx);
        let (l2, r2) = self.split_half(partner, m_there, ctx);
        // Each half of one hypotenuse faces the opposite half of the other.
        self.tri_mut(l).adj_a = Some(r2);
        self.tri_mut(r2).adj_b = Some(l);
        self.tri_mut(r).adj_b = Some(l2);
        self.tri_mut(l2).adj_a = Some(r);
        trace!(node = id.0, partner = partner.0, "mutual split");
    }

    /// Create the two children of `id` around midpoint `m` and take over the
    /// parent's leg adjacency. The cross-hypotenuse slots (left `adj_a`,
    /// right `adj_b`) are the caller's to wire.
    fn split_half(&mut self, id: TriId, m: VertId, ctx: &MeshContext) -> (TriId, TriId) {
        let (a, b, c, adj_a, adj_b, generation) = {
            let n = self.tri(id);
            (n.a, n.b, n.c, n.adj_a, n.adj_b, n.generation)
        };
        let left = self.make_node(c, a, m, Some(id), generation + 1, false, ctx);
        let right = self.make_node(b, c, m, Some(id), generation + 1, false, ctx);
        let l = self.alloc_tri(left);
        let r = self.alloc_tri(right);
        self.tri_mut(l).adj_b = Some(r);
        self.tri_mut(r).adj_a = Some(l);
        self.tri_mut(id).children = Some((l, r));
        if adj_a == Some(id) || adj_b == Some(id) {
            // Pole-root seam: the two leg edges are one physical meridian,
            // so the children face each other across it.
            self.tri_mut(l).adj_c = Some(r);
            self.tri_mut(r).adj_c = Some(l);
        } else {
            self.wire_leg(l, adj_b, id);
            self.wire_leg(r, adj_a, id);
        }
        // Once internal, a node keeps only its hypotenuse pair link; the leg
        // edges belong to the children now.
        {
            let node = self.tri_mut(id);
            node.adj_a = None;
            node.adj_b = None;
        }
        (l, r)
    }

    /// Hand one of the parent's leg edges down to the child whose hypotenuse
    /// it becomes.
    fn wire_leg(&mut self, child: TriId, inherited: Option<TriId>, parent: TriId) {
        let Some(t) = inherited else {
            return;
        };
        if self.is_petrified(t) {
            // A frozen neighbor cannot be rewired; keep the one-way link.
            self.tri_mut(child).adj_c = Some(t);
            return;
        }
        match self.tri(t).children {
            None => {
                self.tri_mut(child).adj_c = Some(t);
                self.replace_adjacency(t, parent, child);
            }
            Some((tl, tr)) => {
                // The neighbor refined first (both halves of a mutual pair
                // share a leg at generation 1); link leaf to leaf.
                let partner = [tl, tr]
                    .into_iter()
                    .find(|&p| !self.is_petrified(p) && self.tri(p).adj_c == Some(parent));
                match partner {
                    Some(p) => {
                        self.tri_mut(child).adj_c = Some(p);
                        self.tri_mut(p).adj_c = Some(child);
                    }
                    None => {
                        self.tri_mut(child).adj_c = Some(t);
                    }
                }
            }
        }
    }

    /// Merge a node's children away, co-merging the mutual pair across the
    /// hypotenuse. Returns `false` unless both halves hold leaf children.
    pub fn merge(&mut self, id: TriId) -> bool {
        if self.is_petrified(id) {
            return false;
        }
        let Some((l, r)) = self.tri(id).children else {
            return false;
        };
        if self.tri(l).children.is_some() || self.tri(r).children.is_some() {
            return false;
        }
        let partner = self
            .tri(id)
            .adj_c
            .filter(|&t| !self.is_petrified(t) && self.tri(t).adj_c == Some(id));
        if let Some(p) = partner {
            let Some((pl, pr)) = self.tri(p).children else {
                return false;
            };
            if self.tri(pl).children.is_some() || self.tri(pr).children.is_some() {
                return false;
            }
        }
        self.merge_half(id);
        if let Some(p) = partner {
            self.merge_half(p);
        }
        trace!(node = id.0, "merged");
        true
    }

    fn merge_half(&mut self, id: TriId) {
        let Some((l, r)) = self.tri(id).children else {
            return;
        };
        let l_out = self.tri(l).adj_c;
        let r_out = self.tri(r).adj_c;
        let seam = l_out == Some(r) || r_out == Some(l);
        {
            let node = self.tri_mut(id);
            if seam {
                // Children faced each other across a pole-root seam; the
                // parent is self-adjacent there again.
                node.adj_a = Some(id);
                node.adj_b = Some(id);
            } else {
                node.adj_b = l_out;
                node.adj_a = r_out;
            }
            node.children = None;
        }
        if !seam {
            if let Some(n) = l_out {
                self.replace_adjacency(n, l, id);
            }
            if let Some(n) = r_out {
                self.replace_adjacency(n, r, id);
            }
        }
        self.free_tri(l);
        self.free_tri(r);
    }

    /// Petrify every descendant of nodes covered by the provider inside the
    /// region. A node freezes when the region fully contains its bounds and
    /// the provider dominates it; the walk recurses past partial overlaps.
    pub fn check_petrify(&mut self, provider: ProviderId, region: &GeoBounds) {
        for root in self.roots() {
            self.check_petrify_rec(root, provider, region);
        }
    }

    fn check_petrify_rec(&mut self, id: TriId, provider: ProviderId, region: &GeoBounds) {
        if self.is_petrified(id) {
            return;
        }
        let (bounds, node_provider, children, pole) = {
            let n = self.tri(id);
            (n.bounds, n.provider, n.children, n.pole)
        };
        if !bounds.intersects(region) {
            return;
        }
        if !pole && node_provider == Some(provider) && region.contains_bounds(&bounds) {
            debug!(node = id.0, "petrifying subtree");
            self.petrify(id);
            return;
        }
        if let Some((l, r)) = children {
            self.check_petrify_rec(l, provider, region);
            self.check_petrify_rec(r, provider, region);
        }
    }
}
