//! Frozen, concurrently-readable copies of the mesh.
//!
//! A snapshot is a parallel arena with the same slot indices as the mesh it
//! was captured from: live slots are value-copied, petrified slots share the
//! mesh's `Arc` directly. Handles therefore mean the same thing in the mesh
//! and in every snapshot taken from it, and the per-snapshot cost shrinks as
//! more of the globe petrifies.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use glam::{DVec2, DVec3};
use tellus_geo::{GeoBounds, Ray};
use tellus_mesh::tessera::{tesserae_in_bounds, TesseraBlock};
use tellus_mesh::{
    containing_leaf, intersect_ray, node_contains, TriId, TriNode, TriSlot, TriStore,
    TriangleMesh, VertId, VertSlot, Vertex,
};

enum SnapTri {
    Vacant,
    Owned(TriNode),
    Shared(Arc<TriNode>),
}

enum SnapVert {
    Vacant,
    Owned(Vertex),
    Shared(Arc<Vertex>),
}

/// An immutable copy of the mesh at one instant.
///
/// There are no mutating methods; supersession, not mutation, is how
/// snapshots change. All mesh queries work through [`TriStore`].
pub struct GlobeSnapshot {
    tris: Vec<SnapTri>,
    verts: Vec<SnapVert>,
    roots: [TriId; 2],
    /// Locality hint for containment lookups; purely an optimization, every
    /// hit is re-validated by a containment test.
    last_hit: AtomicU32,
}

impl GlobeSnapshot {
    /// Capture the current state of a mesh.
    ///
    /// Owned vertex copies are marked elevation-current: a snapshot can
    /// never be re-sampled, so staleness tracking is meaningless here.
    #[must_use]
    pub fn capture(mesh: &TriangleMesh) -> Self {
        let tris = mesh
            .tri_slots()
            .map(|(_, slot)| match slot {
                TriSlot::Vacant { .. } => SnapTri::Vacant,
                TriSlot::Live(n) => SnapTri::Owned(n.clone()),
                TriSlot::Frozen(n) => SnapTri::Shared(Arc::clone(n)),
            })
            .collect();
        let verts = mesh
            .vert_slots()
            .map(|(_, slot)| match slot {
                VertSlot::Vacant { .. } => SnapVert::Vacant,
                VertSlot::Live { vertex, .. } => {
                    let mut v = *vertex;
                    v.elevation_current = true;
                    SnapVert::Owned(v)
                }
                VertSlot::Frozen(v) => SnapVert::Shared(Arc::clone(v)),
            })
            .collect();
        Self {
            tris,
            verts,
            roots: mesh.roots(),
            last_hit: AtomicU32::new(u32::MAX),
        }
    }

    /// The shared node behind a petrified slot, if any. Used by the diff to
    /// skip identical subtrees by pointer identity.
    pub(crate) fn shared(&self, id: TriId) -> Option<&Arc<TriNode>> {
        match &self.tris[id.index()] {
            SnapTri::Shared(n) => Some(n),
            _ => None,
        }
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.tris.len()
    }

    pub(crate) fn occupied(&self, id: TriId) -> bool {
        !matches!(self.tris[id.index()], SnapTri::Vacant)
    }

    /// The leaf containing a projected point, seeded by the last hit.
    #[must_use]
    pub fn containing_leaf(&self, p: DVec2, allow_degenerate: bool) -> TriId {
        let cached = self.last_hit.load(Ordering::Relaxed);
        if cached != u32::MAX {
            let id = TriId(cached);
            if (id.index()) < self.tris.len()
                && self.occupied(id)
                && self.tri(id).children.is_none()
                && node_contains(self, id, p)
            {
                return id;
            }
        }
        let id = containing_leaf(self, p, allow_degenerate);
        self.last_hit.store(id.0, Ordering::Relaxed);
        id
    }

    /// Nearest surface hit of a model-space ray.
    #[must_use]
    pub fn intersect_ray(&self, ray: &Ray) -> Option<DVec3> {
        intersect_ray(self, ray)
    }

    /// Render blocks for every leaf intersecting the region.
    #[must_use]
    pub fn tesserae_in_bounds(&self, region: &GeoBounds) -> Vec<TesseraBlock> {
        tesserae_in_bounds(self, region)
    }
}

impl TriStore for GlobeSnapshot {
    fn tri(&self, id: TriId) -> &TriNode {
        match &self.tris[id.index()] {
            SnapTri::Owned(n) => n,
            SnapTri::Shared(n) => n,
            SnapTri::Vacant => panic!("triangle {} is vacant", id.0),
        }
    }

    fn vert(&self, id: VertId) -> &Vertex {
        match &self.verts[id.index()] {
            SnapVert::Owned(v) => v,
            SnapVert::Shared(v) => v,
            SnapVert::Vacant => panic!("vertex {} is vacant", id.0),
        }
    }

    fn roots(&self) -> [TriId; 2] {
        self.roots
    }

    fn is_petrified(&self, id: TriId) -> bool {
        matches!(self.tris[id.index()], SnapTri::Shared(_))
    }
}
