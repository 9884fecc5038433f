//! External-collaborator boundary for the globe terrain mesh: the celestial
//! body projection, elevation providers, the viewer, and the polygon
//! triangulator. The mesh engine only ever sees these traits; the concrete
//! implementations here (spherical body, snapshot viewer, fan triangulator)
//! exist so the engine runs end to end without the full application stack.

mod body;
mod events;
mod model;
mod provider;
mod triangulate;
mod viewer;

pub use body::{CelestialBody, SphericalBody};
pub use events::{ElevationChange, ElevationChangeKind};
pub use model::{ElevationModel, PolygonHints};
pub use provider::{ElevationProvider, ProviderId};
pub use triangulate::{FanTriangulator, PolygonTriangulator};
pub use viewer::{SnapshotViewer, Viewer};
