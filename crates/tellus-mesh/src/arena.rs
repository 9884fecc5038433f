//! Slot arena for triangle nodes and their shared vertices.
//!
//! Handles are indices into slot vectors and stay stable for the life of the
//! mesh; freed slots go on an intrusive free list and are reused. Petrified
//! nodes move into [`TriSlot::Frozen`] behind an `Arc`, which is what makes
//! snapshotting cheap: a snapshot clones live nodes and shares frozen ones by
//! reference.

use std::sync::Arc;

use crate::node::TriNode;
use crate::vertex::Vertex;

/// Stable handle for a triangle node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriId(pub u32);

impl TriId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable handle for a vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertId(pub u32);

impl VertId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A triangle slot.
#[derive(Clone, Debug)]
pub enum TriSlot {
    /// Free; links to the next free slot.
    Vacant { next_free: Option<u32> },
    /// A mutable node.
    Live(TriNode),
    /// A petrified node, shared with snapshots.
    Frozen(Arc<TriNode>),
}

/// A vertex slot. Live vertices are reference-counted by the triangles that
/// name them; frozen vertices are never freed.
#[derive(Clone, Debug)]
pub enum VertSlot {
    Vacant { next_free: Option<u32> },
    Live { vertex: Vertex, refs: u32 },
    Frozen(Arc<Vertex>),
}

/// Read access to a triangle tree: implemented by the mutable mesh and by
/// published snapshots, so queries run identically against both.
pub trait TriStore {
    /// The node for a handle. Panics on a vacant slot; handles held by
    /// callers always name occupied slots.
    fn tri(&self, id: TriId) -> &TriNode;

    /// The vertex for a handle. Panics on a vacant slot.
    fn vert(&self, id: VertId) -> &Vertex;

    /// The two pole-spanning roots, northern first.
    fn roots(&self) -> [TriId; 2];

    /// Whether the node is petrified.
    fn is_petrified(&self, id: TriId) -> bool;
}

/// The mutable triangle mesh: slot storage plus the two roots.
pub struct TriangleMesh {
    tris: Vec<TriSlot>,
    verts: Vec<VertSlot>,
    tri_free_head: Option<u32>,
    vert_free_head: Option<u32>,
    pub(crate) roots: [TriId; 2],
}

impl TriangleMesh {
    pub(crate) fn empty() -> Self {
        Self {
            tris: Vec::new(),
            verts: Vec::new(),
            tri_free_head: None,
            vert_free_head: None,
            roots: [TriId(0), TriId(0)],
        }
    }

    /// Number of triangle slots (live, frozen, and vacant).
    #[must_use]
    pub fn tri_slot_count(&self) -> usize {
        self.tris.len()
    }

    /// Number of vertex slots.
    #[must_use]
    pub fn vert_slot_count(&self) -> usize {
        self.verts.len()
    }

    /// Raw slot access, for snapshot construction.
    #[must_use]
    pub fn tri_slot(&self, id: TriId) -> &TriSlot {
        &self.tris[id.index()]
    }

    /// Raw vertex slot access, for snapshot construction.
    #[must_use]
    pub fn vert_slot(&self, id: VertId) -> &VertSlot {
        &self.verts[id.index()]
    }

    /// All triangle slots with their handles.
    pub fn tri_slots(&self) -> impl Iterator<Item = (TriId, &TriSlot)> {
        self.tris
            .iter()
            .enumerate()
            .map(|(i, s)| (TriId(i as u32), s))
    }

    /// All vertex slots with their handles.
    pub fn vert_slots(&self) -> impl Iterator<Item = (VertId, &VertSlot)> {
        self.verts
            .iter()
            .enumerate()
            .map(|(i, s)| (VertId(i as u32), s))
    }

    /// Mutable access to a live node. Panics if the slot is vacant or
    /// frozen; mutation paths check for petrification first.
    pub(crate) fn tri_mut(&mut self, id: TriId) -> &mut TriNode {
        match &mut self.tris[id.index()] {
            TriSlot::Live(n) => n,
            _ => panic!("triangle {} is not live", id.0),
        }
    }

    /// Allocate a vertex; the reference count starts at zero and is owned by
    /// the triangles allocated against it.
    pub(crate) fn alloc_vert(&mut self, vertex: Vertex) -> VertId {
        match self.vert_free_head {
            Some(i) => {
                let next = match self.verts[i as usize] {
                    VertSlot::Vacant { next_free } => next_free,
                    _ => panic!("vertex free list points at an occupied slot"),
                };
                self.vert_free_head = next;
                self.verts[i as usize] = VertSlot::Live { vertex, refs: 0 };
                VertId(i)
            }
            None => {
                self.verts.push(VertSlot::Live { vertex, refs: 0 });
                VertId((self.verts.len() - 1) as u32)
            }
        }
    }

    fn retain_vert(&mut self, id: VertId) {
        if let VertSlot::Live { refs, .. } = &mut self.verts[id.index()] {
            *refs += 1;
        }
    }

    fn release_vert(&mut self, id: VertId) {
        let free = match &mut self.verts[id.index()] {
            VertSlot::Live { refs, .. } => {
                *refs -= 1;
                *refs == 0
            }
            // Frozen vertices outlive every live reference.
            _ => false,
        };
        if free {
            self.verts[id.index()] = VertSlot::Vacant {
                next_free: self.vert_free_head,
            };
            self.vert_free_head = Some(id.0 as u32);
        }
    }

    /// Mutable access to a live vertex, if the slot holds one.
    pub(crate) fn vert_mut(&mut self, id: VertId) -> Option<&mut Vertex> {
        match &mut self.verts[id.index()] {
            VertSlot::Live { vertex, .. } => Some(vertex),
            _ => None,
        }
    }

    /// Allocate a node, retaining its three vertices.
    pub(crate) fn alloc_tri(&mut self, node: TriNode) -> TriId {
        for v in [node.a, node.b, node.c] {
            self.retain_vert(v);
        }
        match self.tri_free_head {
            Some(i) => {
                let next = match self.tris[i as usize] {
                    TriSlot::Vacant { next_free } => next_free,
                    _ => panic!("triangle free list points at an occupied slot"),
                };
                self.tri_free_head = next;
                self.tris[i as usize] = TriSlot::Live(node);
                TriId(i)
            }
            None => {
                self.tris.push(TriSlot::Live(node));
                TriId((self.tris.len() - 1) as u32)
            }
        }
    }

    /// Free a live node and release its vertices. Frozen nodes are never
    /// freed.
    pub(crate) fn free_tri(&mut self, id: TriId) {
        let node = match std::mem::replace(
            &mut self.tris[id.index()],
            TriSlot::Vacant {
                next_free: self.tri_free_head,
            },
        ) {
            TriSlot::Live(n) => n,
            other => {
                // Put the slot back untouched.
                self.tris[id.index()] = other;
                return;
            }
        };
        self.tri_free_head = Some(id.0 as u32);
        for v in [node.a, node.b, node.c] {
            self.release_vert(v);
        }
    }

    /// Move a subtree into frozen slots. Frozen nodes lose their LOD state,
    /// keep their handles, and are shared with snapshots by reference.
    pub fn petrify(&mut self, id: TriId) {
        let mut node = match std::mem::replace(
            &mut self.tris[id.index()],
            TriSlot::Vacant { next_free: None },
        ) {
            TriSlot::Live(n) => n,
            other => {
                // Already frozen (or vacant); put the slot back untouched.
                self.tris[id.index()] = other;
                return;
            }
        };
        node.lod = None;
        let (a, b, c) = (node.a, node.b, node.c);
        let children = node.children;
        self.tris[id.index()] = TriSlot::Frozen(Arc::new(node));
        for v in [a, b, c] {
            self.freeze_vert(v);
        }
        if let Some((l, r)) = children {
            self.petrify(l);
            self.petrify(r);
        }
    }

    fn freeze_vert(&mut self, id: VertId) {
        let vertex = match std::mem::replace(
            &mut self.verts[id.index()],
            VertSlot::Vacant { next_free: None },
        ) {
            VertSlot::Live { vertex, .. } => vertex,
            other => {
                // Shared with an already-petrified neighbor; keep it frozen.
                self.verts[id.index()] = other;
                return;
            }
        };
        self.verts[id.index()] = VertSlot::Frozen(Arc::new(vertex));
    }

    /// Retarget one adjacency slot of `n` from `from` to `to`. Returns
    /// whether a slot matched; frozen and vacant slots are left alone.
    pub(crate) fn replace_adjacency(&mut self, n: TriId, from: TriId, to: TriId) -> bool {
        let TriSlot::Live(node) = &mut self.tris[n.index()] else {
            return false;
        };
        for slot in [&mut node.adj_a, &mut node.adj_b, &mut node.adj_c] {
            if *slot == Some(from) {
                *slot = Some(to);
                return true;
            }
        }
        false
    }
}

impl TriStore for TriangleMesh {
    fn tri(&self, id: TriId) -> &TriNode {
        match &self.tris[id.index()] {
            TriSlot::Live(n) => n,
            TriSlot::Frozen(n) => n,
            TriSlot::Vacant { .. } => panic!("triangle {} is vacant", id.0),
        }
    }

    fn vert(&self, id: VertId) -> &Vertex {
        match &self.verts[id.index()] {
            VertSlot::Live { vertex, .. } => vertex,
            VertSlot::Frozen(v) => v,
            VertSlot::Vacant { .. } => panic!("vertex {} is vacant", id.0),
        }
    }

    fn roots(&self) -> [TriId; 2] {
        self.roots
    }

    fn is_petrified(&self, id: TriId) -> bool {
        matches!(self.tris[id.index()], TriSlot::Frozen(_))
    }
}
