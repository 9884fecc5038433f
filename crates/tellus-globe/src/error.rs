//! Globe-level errors.

use tellus_mesh::MeshError;
use thiserror::Error;

/// Errors surfaced by the globe facade.
///
/// These mark misuse of the API contract; degraded-but-valid situations (a
/// declined tessellation, an empty overlap) return empty results with a log
/// line instead.
#[derive(Debug, Error)]
pub enum TerrainError {
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// A latitude outside the representable range.
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    /// A request missing a parameter its kind requires.
    #[error("missing required input: {0}")]
    MissingInput(&'static str),

    /// An operation the target type rejects by contract.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}
