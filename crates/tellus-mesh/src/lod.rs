//! The level-of-detail policy: when leaves split and parents merge.
//!
//! Splitting is eager below the minimum generation, blocked at the maximum
//! generation, beyond the polar limit, and against petrified hypotenuse
//! neighbors; otherwise a leaf splits when it looks too big on screen or its
//! elevation provider still has finer data. Merging mirrors the view test
//! with a hysteresis factor so the mesh does not flap at the threshold, and
//! both halves of a hypotenuse pair must agree.

use tellus_config::TerrainConfig;
use tellus_geo::GeoBounds;
use tracing::debug;

use crate::arena::{TriId, TriSlot, TriStore, TriangleMesh};
use crate::context::MeshContext;

/// Whether a leaf wants to split.
#[must_use]
pub fn should_split(mesh: &TriangleMesh, id: TriId, config: &TerrainConfig) -> bool {
    if mesh.is_petrified(id) {
        return false;
    }
    let n = mesh.tri(id);
    if n.children.is_some() {
        return false;
    }
    if let Some(t) = n.adj_c {
        if mesh.is_petrified(t) {
            return false;
        }
    }
    if n.generation < config.min_generations {
        return true;
    }
    if n.generation >= config.max_generations {
        return false;
    }
    if n.geo_center.y.abs() > config.polar_split_limit_deg {
        return false;
    }
    let Some(lod) = n.lod else {
        return false;
    };
    if lod.in_view && lod.pixel_size > config.split_pixel_threshold {
        return true;
    }
    // The hint is the node's own provider's where one covers the whole
    // triangle, the finest intersecting provider's where the triangle
    // straddles a boundary, and unbounded where no data touches it.
    lod.arc_size_m > lod.resolution_hint_m
}

/// Whether a parent may merge its leaf children away for view reasons.
///
/// Both halves of the hypotenuse pair must qualify; a petrified or
/// non-mutual partner vetoes the merge.
#[must_use]
pub fn may_merge(mesh: &TriangleMesh, id: TriId, config: &TerrainConfig) -> bool {
    if !merge_shape_ok(mesh, id) || !merge_side_quiet(mesh, id, config) {
        return false;
    }
    match hyp_partner(mesh, id) {
        Partner::None => true,
        Partner::Mutual(p) => merge_shape_ok(mesh, p) && merge_side_quiet(mesh, p, config),
        Partner::Blocked => false,
    }
}

/// Whether a parent may merge because the surface under it is nearly flat:
/// the midpoint's perpendicular distance from the parent plane, normalized
/// by arc size, falls below the minimum-variance threshold on both halves.
#[must_use]
pub fn may_merge_for_variance(mesh: &TriangleMesh, id: TriId, config: &TerrainConfig) -> bool {
    if !merge_shape_ok(mesh, id) || !variance_low(mesh, id, config) {
        return false;
    }
    match hyp_partner(mesh, id) {
        Partner::None => true,
        Partner::Mutual(p) => merge_shape_ok(mesh, p) && variance_low(mesh, p, config),
        Partner::Blocked => false,
    }
}

enum Partner {
    None,
    Mutual(TriId),
    Blocked,
}

fn hyp_partner(mesh: &TriangleMesh, id: TriId) -> Partner {
    match mesh.tri(id).adj_c {
        None => Partner::None,
        Some(t) => {
            if !mesh.is_petrified(t) && mesh.tri(t).adj_c == Some(id) {
                Partner::Mutual(t)
            } else {
                Partner::Blocked
            }
        }
    }
}

fn merge_shape_ok(mesh: &TriangleMesh, id: TriId) -> bool {
    if mesh.is_petrified(id) {
        return false;
    }
    let Some((l, r)) = mesh.tri(id).children else {
        return false;
    };
    mesh.tri(l).children.is_none() && mesh.tri(r).children.is_none()
}

/// The parent would not immediately split again: it is at or above the
/// minimum generation, its apparent size sits below the threshold with the
/// hysteresis margin applied, and no provider still wants detail here.
fn merge_side_quiet(mesh: &TriangleMesh, id: TriId, config: &TerrainConfig) -> bool {
    let n = mesh.tri(id);
    if n.generation < config.min_generations {
        return false;
    }
    let Some(lod) = n.lod else {
        return false;
    };
    if lod.in_view && lod.pixel_size * config.merge_hysteresis > config.split_pixel_threshold {
        return false;
    }
    lod.arc_size_m <= lod.resolution_hint_m
}

fn variance_low(mesh: &TriangleMesh, id: TriId, config: &TerrainConfig) -> bool {
    let n = mesh.tri(id);
    if n.generation < config.min_generations {
        return false;
    }
    let Some(lod) = n.lod else {
        return false;
    };
    let Some((l, _)) = n.children else {
        return false;
    };
    // A node the view still wants split keeps its children even over flat
    // terrain; variance merging only overrides the provider-hint condition.
    if lod.in_view && lod.pixel_size * config.merge_hysteresis > config.split_pixel_threshold {
        return false;
    }
    if n.plane.is_degenerate() || lod.arc_size_m <= 0.0 {
        return false;
    }
    let mid = mesh.vert(mesh.tri(l).c).model;
    n.plane.signed_distance(mid).abs() / lod.arc_size_m < lod.min_variance
}

impl TriangleMesh {
    /// Split every eligible leaf once, including leaves created during the
    /// pass. Returns the number of splits performed.
    pub fn split_pass(&mut self, ctx: &MeshContext, region: Option<&GeoBounds>) -> usize {
        let mut count = 0;
        let mut i = 0;
        while i < self.tri_slot_count() {
            let id = TriId(i as u32);
            i += 1;
            if !matches!(self.tri_slot(id), TriSlot::Live(_)) {
                continue;
            }
            if let Some(r) = region {
                // The minimum generation is a global guarantee; a bounded
                // pass only skips out-of-region nodes already at it.
                let n = self.tri(id);
                if n.generation >= ctx.config.min_generations && !n.bounds.intersects(r) {
                    continue;
                }
            }
            if should_split(self, id, ctx.config) && self.split(id, ctx) {
                count += 1;
            }
        }
        if count > 0 {
            debug!(splits = count, "split pass");
        }
        count
    }

    /// Merge every eligible parent, deepest first so merges cascade upward
    /// within one pass. Returns the number of merges performed.
    pub fn merge_pass(&mut self, config: &TerrainConfig, region: Option<&GeoBounds>) -> usize {
        self.merge_walk(config, region, false)
    }

    /// Like [`TriangleMesh::merge_pass`], but merging for low surface
    /// variance instead of view quiescence.
    pub fn variance_merge_pass(
        &mut self,
        config: &TerrainConfig,
        region: Option<&GeoBounds>,
    ) -> usize {
        self.merge_walk(config, region, true)
    }

    fn merge_walk(
        &mut self,
        config: &TerrainConfig,
        region: Option<&GeoBounds>,
        variance: bool,
    ) -> usize {
        let mut count = 0;
        for root in self.roots() {
            self.merge_rec(root, config, region, variance, &mut count);
        }
        if count > 0 {
            debug!(merges = count, variance, "merge pass");
        }
        count
    }

    fn merge_rec(
        &mut self,
        id: TriId,
        config: &TerrainConfig,
        region: Option<&GeoBounds>,
        variance: bool,
        count: &mut usize,
    ) {
        if self.is_petrified(id) {
            return;
        }
        if let Some(r) = region {
            if !self.tri(id).bounds.intersects(r) {
                return;
            }
        }
        let Some((l, r)) = self.tri(id).children else {
            return;
        };
        self.merge_rec(l, config, region, variance, count);
        self.merge_rec(r, config, region, variance, count);
        let eligible = if variance {
            may_merge_for_variance(self, id, config)
        } else {
            may_merge(self, id, config)
        };
        if eligible && self.merge(id) {
            *count += 1;
        }
    }
}
