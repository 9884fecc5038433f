//! Geographic and model-space geometry primitives for the globe terrain mesh.
//!
//! Latitude/longitude values are degrees, altitudes and model coordinates are
//! meters. Projected 2D points ([`glam::DVec2`]) store longitude in `x` and
//! latitude in `y`.

mod arc;
mod bounds;
mod plane;
mod polygon;
mod pos;

pub use arc::{
    gc_distance_rad, gc_interpolate, geo_of_unit, unit_vector, DEG_PER_RAD, RAD_PER_DEG,
};
pub use bounds::{BoundingSphere, GeoBounds};
pub use plane::{segment_intersection_2d, Plane, Ray};
pub use polygon::GeoPolygon;
pub use pos::{AltitudeRef, GeoPos};
