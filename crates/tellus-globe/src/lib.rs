//! The globe terrain engine facade.
//!
//! [`GlobeTerrain`] owns the mutable mesh behind a single writer lock and
//! publishes immutable [`GlobeSnapshot`]s for concurrent readers. Mutation
//! methods return the coalesced bounding boxes that changed, which drives
//! incremental redraw.

mod diff;
mod error;
mod model;
mod snapshot;
mod terrain;

pub use diff::{coalesce_bounds, snapshot_diff};
pub use error::TerrainError;
pub use model::{GlobeModel, PetrifiedBlock};
pub use snapshot::GlobeSnapshot;
pub use terrain::GlobeTerrain;
