//! # Camera Component
//!
//! A camera is attached to a scene object and takes its position and
//! orientation from that object's world transform. It caches four matrices,
//! each guarded by its own dirty bit:
//!
//! | Matrix | Depends on | Invalidated by |
//! |---|---|---|
//! | view | owner's world axes and position | moving the owner or an ancestor |
//! | projection | projection parameters, screen aspect | `set_*_projection`, resolution change |
//! | view-projection | view, projection | either of the above |
//! | inverse view-projection | view-projection | either of the above |
//!
//! The scene's getters resolve a stale matrix on read, pulling in its
//! dependencies first, so callers never sequence updates by hand.
//!
//! ## Coordinate System
//! Left-handed, Y-up: +X right, +Y up, +Z forward (into the screen).

use bitflags::bitflags;

use crate::foundation::math::{orthographic_lh, perspective_lh, Mat4, Vec3};

bitflags! {
    /// Stale camera matrices
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CameraDirty: u8 {
        /// View matrix
        const VIEW = 1 << 0;
        /// Projection matrix
        const PROJECTION = 1 << 1;
        /// View-projection matrix
        const VIEW_PROJECTION = 1 << 2;
        /// Inverse view-projection matrix
        const INVERSE = 1 << 3;
    }
}

impl CameraDirty {
    /// Bits invalidated when the owning object moves
    pub const MOVED: Self = Self::VIEW.union(Self::VIEW_PROJECTION).union(Self::INVERSE);

    /// Bits invalidated when projection parameters or the screen change
    pub const REPROJECTED: Self = Self::PROJECTION.union(Self::VIEW_PROJECTION).union(Self::INVERSE);
}

/// Projection mode and parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Orthographic box
    Orthographic {
        /// Half-height of the box; the half-width is `size * aspect`
        size: f32,
        /// Near plane
        near: f32,
        /// Far plane
        far: f32,
    },
    /// Perspective frustum
    Perspective {
        /// Vertical field of view in radians
        fov: f32,
        /// Near plane (signed distance along +Z)
        near: f32,
        /// Far plane (signed distance along +Z)
        far: f32,
    },
}

impl Projection {
    /// Projection matrix for a screen of the given aspect ratio (width / height)
    pub fn matrix(&self, aspect: f32) -> Mat4 {
        match *self {
            Self::Orthographic { size, near, far } => {
                let half_width = aspect * size;
                orthographic_lh(-half_width, half_width, -size, size, near, far)
            }
            Self::Perspective { fov, near, far } => perspective_lh(fov, aspect, near, far),
        }
    }
}

/// Camera attached to a scene object
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    projection: Projection,
    pub(crate) dirty: CameraDirty,
    pub(crate) view_matrix: Mat4,
    pub(crate) projection_matrix: Mat4,
    pub(crate) view_projection: Mat4,
    pub(crate) inverse_view_projection: Mat4,
    pub(crate) registry_index: Option<usize>,
}

impl Camera {
    /// Create a perspective camera
    ///
    /// # Arguments
    /// * `fov` - Vertical field of view in radians
    /// * `near` - Near plane distance
    /// * `far` - Far plane distance
    pub fn perspective(fov: f32, near: f32, far: f32) -> Self {
        Self::with_projection(Projection::Perspective { fov, near, far })
    }

    /// Create an orthographic camera
    ///
    /// # Arguments
    /// * `size` - Half-height of the visible box in world units
    /// * `near` - Near plane distance
    /// * `far` - Far plane distance
    pub fn orthographic(size: f32, near: f32, far: f32) -> Self {
        Self::with_projection(Projection::Orthographic { size, near, far })
    }

    fn with_projection(projection: Projection) -> Self {
        Self {
            projection,
            dirty: CameraDirty::all(),
            view_matrix: Mat4::identity(),
            projection_matrix: Mat4::identity(),
            view_projection: Mat4::identity(),
            inverse_view_projection: Mat4::identity(),
            registry_index: None,
        }
    }

    /// Active projection mode and parameters
    #[inline]
    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Switch to an orthographic projection
    pub fn set_orthographic_projection(&mut self, size: f32, near: f32, far: f32) {
        self.projection = Projection::Orthographic { size, near, far };
        self.dirty |= CameraDirty::REPROJECTED;
    }

    /// Switch to a perspective projection
    pub fn set_perspective_projection(&mut self, fov: f32, near: f32, far: f32) {
        self.projection = Projection::Perspective { fov, near, far };
        self.dirty |= CameraDirty::REPROJECTED;
    }

    /// Stale matrices
    #[inline]
    pub fn dirty(&self) -> CameraDirty {
        self.dirty
    }

    /// Slot in the scene's camera registry, `None` while unregistered
    #[inline]
    pub fn registry_index(&self) -> Option<usize> {
        self.registry_index
    }

    pub(crate) fn invalidate(&mut self, bits: CameraDirty) {
        self.dirty |= bits;
    }
}

/// Look-from matrix: rows are the camera axes, translation is `-dot(axis, position)`
pub fn view_matrix(right: &Vec3, up: &Vec3, forward: &Vec3, position: &Vec3) -> Mat4 {
    Mat4::new(
        right.x, right.y, right.z, -right.dot(position),
        up.x, up.y, up.z, -up.dot(position),
        forward.x, forward.y, forward.z, -forward.dot(position),
        0.0, 0.0, 0.0, 1.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_camera_is_fully_dirty() {
        let camera = Camera::perspective(1.0, 0.1, 100.0);
        assert_eq!(camera.dirty(), CameraDirty::all());
        assert!(camera.registry_index().is_none());
    }

    #[test]
    fn test_projection_change_keeps_view_clean() {
        let mut camera = Camera::perspective(1.0, 0.1, 100.0);
        camera.dirty = CameraDirty::empty();

        camera.set_orthographic_projection(5.0, -10.0, 10.0);

        assert_eq!(camera.dirty(), CameraDirty::REPROJECTED);
        assert!(!camera.dirty().contains(CameraDirty::VIEW));
        assert!(matches!(camera.projection(), Projection::Orthographic { .. }));
    }

    #[test]
    fn test_orthographic_width_follows_aspect() {
        let projection = Projection::Orthographic { size: 5.0, near: -1.0, far: 1.0 };
        let m = projection.matrix(2.0);

        let edge = m * Vec4::new(10.0, 5.0, 0.0, 1.0);
        assert_relative_eq!(edge.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(edge.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_view_matrix_moves_eye_to_origin() {
        let position = Vec3::new(3.0, -2.0, 7.0);
        let view = view_matrix(&Vec3::x(), &Vec3::y(), &Vec3::z(), &position);

        let eye = view * Vec4::new(position.x, position.y, position.z, 1.0);
        assert_relative_eq!(eye, Vec4::new(0.0, 0.0, 0.0, 1.0), epsilon = 1e-6);

        let ahead = view * Vec4::new(3.0, -2.0, 9.0, 1.0);
        assert_relative_eq!(ahead.z, 2.0, epsilon = 1e-6);
    }
}
