//! The viewer contract: what the LOD controller needs from a camera.

use glam::DVec3;
use tellus_geo::BoundingSphere;

/// Camera state consumed by the split/merge policy.
pub trait Viewer {
    /// Eye position in model space, meters.
    fn eye_position(&self) -> DVec3;

    /// Width of the view volume, meters, at the given model point.
    fn view_width_m_at(&self, point: DVec3) -> f64;

    /// Viewport width in pixels.
    fn viewport_width_px(&self) -> u32;

    /// Whether the bounding sphere intersects the view volume.
    fn in_view(&self, sphere: &BoundingSphere) -> bool;
}

/// A frozen, self-contained viewer: eye, look direction, and a symmetric
/// field of view. Used by tests and by callers without a camera stack.
#[derive(Clone, Copy, Debug)]
pub struct SnapshotViewer {
    /// Eye position, meters.
    pub eye: DVec3,
    /// Unit look direction.
    pub look: DVec3,
    /// Full horizontal field of view, radians.
    pub fov_rad: f64,
    /// Viewport width, pixels.
    pub viewport_px: u32,
}

impl SnapshotViewer {
    #[must_use]
    pub fn new(eye: DVec3, look: DVec3, fov_rad: f64, viewport_px: u32) -> Self {
        Self {
            eye,
            look: look.normalize(),
            fov_rad,
            viewport_px,
        }
    }

    /// A viewer at `eye` looking at the body center with a 60 degree field
    /// of view and a 1024 pixel viewport.
    #[must_use]
    pub fn looking_at_origin(eye: DVec3, viewport_px: u32) -> Self {
        Self::new(eye, -eye.normalize(), 60.0_f64.to_radians(), viewport_px)
    }
}

impl Viewer for SnapshotViewer {
    fn eye_position(&self) -> DVec3 {
        self.eye
    }

    fn view_width_m_at(&self, point: DVec3) -> f64 {
        let dist = (point - self.eye).length().max(1.0);
        2.0 * dist * (self.fov_rad * 0.5).tan()
    }

    fn viewport_width_px(&self) -> u32 {
        self.viewport_px
    }

    fn in_view(&self, sphere: &BoundingSphere) -> bool {
        let to_center = sphere.center - self.eye;
        let dist = to_center.length();
        if dist <= sphere.radius {
            return true;
        }
        let angular_radius = (sphere.radius / dist).min(1.0).asin();
        let angle = self.look.angle_between(to_center / dist);
        angle <= self.fov_rad * 0.5 + angular_radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_behind_eye_not_in_view() {
        let v = SnapshotViewer::new(
            DVec3::new(10.0, 0.0, 0.0),
            DVec3::new(-1.0, 0.0, 0.0),
            1.0,
            1000,
        );
        let ahead = BoundingSphere {
            center: DVec3::ZERO,
            radius: 1.0,
        };
        let behind = BoundingSphere {
            center: DVec3::new(30.0, 0.0, 0.0),
            radius: 1.0,
        };
        assert!(v.in_view(&ahead));
        assert!(!v.in_view(&behind));
    }

    #[test]
    fn test_view_width_grows_with_distance() {
        let v = SnapshotViewer::looking_at_origin(DVec3::new(100.0, 0.0, 0.0), 1024);
        let near = v.view_width_m_at(DVec3::new(50.0, 0.0, 0.0));
        let far = v.view_width_m_at(DVec3::new(-100.0, 0.0, 0.0));
        assert!(far > near);
    }

    #[test]
    fn test_eye_inside_sphere_counts_as_in_view() {
        let v = SnapshotViewer::looking_at_origin(DVec3::new(1.0, 0.0, 0.0), 1024);
        let s = BoundingSphere {
            center: DVec3::ZERO,
            radius: 5.0,
        };
        assert!(v.in_view(&s));
    }
}
