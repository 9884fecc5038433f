//! Mesh-level errors.

use tellus_geo::AltitudeRef;
use thiserror::Error;

/// Errors surfaced by mesh queries.
///
/// Per-triangle degradations (a declined triangulation, a degenerate plane)
/// are handled in place and logged; only whole-request failures become
/// errors.
#[derive(Debug, Error)]
pub enum MeshError {
    /// A line's endpoints measure altitude against different references.
    #[error("line endpoints use different altitude references ({start:?} vs {end:?})")]
    MixedAltitudeRef {
        start: AltitudeRef,
        end: AltitudeRef,
    },
}
