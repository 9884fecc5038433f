//! Adaptive triangulated mesh over a celestial body.
//!
//! The mesh starts from two pole-spanning triangles and refines by binary
//! bisection: splitting a triangle at the midpoint of its hypotenuse, with
//! neighboring triangles forced along so the surface never cracks. Nodes
//! live in an index arena ([`TriangleMesh`]); regions finished loading can
//! be petrified into shared immutable storage, which is what makes whole
//! mesh snapshots cheap.
//!
//! Spatial queries, render-block emission ([`tessera`]) and line conforming
//! ([`line`]) are written against the [`TriStore`] trait, so they serve both
//! the live mesh and frozen snapshots of it.

mod arena;
mod context;
mod error;
pub mod line;
mod lod;
mod node;
mod query;
mod split;
pub mod tessera;
mod vertex;

pub use arena::{TriId, TriSlot, TriStore, TriangleMesh, VertId, VertSlot};
pub use context::MeshContext;
pub use error::MeshError;
pub use lod::{may_merge, may_merge_for_variance, should_split};
pub use node::{
    contains_model_position, is_degenerate, model_coordinates, node_contains, LodState, TriNode,
    DEGENERATE_LAT,
};
pub use query::{
    containing_leaf, intersect_ray, intersect_segment, leaves_in_bounds, overlap_convex_polygon,
    overlap_ring, ring_contains, wrap_lon, PolygonOverlap,
};
pub use vertex::Vertex;
