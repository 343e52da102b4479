//! Math utilities and types
//!
//! Provides the fundamental math types used by the scene graph and the render
//! views, plus the handful of helpers the engine's left-handed, Y-up
//! conventions need (+X right, +Y up, +Z forward).

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Local position, rotation and scale of a scene object
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position relative to the parent
    pub position: Vec3,

    /// Rotation relative to the parent
    pub rotation: Quat,

    /// Per-axis scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Convert to a transformation matrix (translation * rotation * scale)
    ///
    /// Equivalent to expanding the quaternion into a rotation matrix, scaling
    /// each column by the matching scale component and writing the position
    /// into the last column.
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }
}

/// Returns column `index` (0..=3) of `matrix` without its `w` component
#[inline]
pub fn column3(matrix: &Mat4, index: usize) -> Vec3 {
    Vec3::new(matrix[(0, index)], matrix[(1, index)], matrix[(2, index)])
}

/// Build a rotation from three orthonormal basis columns
///
/// Uses the trace formulation of the matrix-to-quaternion conversion where
/// every component is derived from its own diagonal combination. Each square
/// root argument is clamped at zero so slightly non-orthonormal input (for
/// example accumulated float error in a derived world basis) never produces
/// NaN; the signs of the vector part come from the off-diagonal differences.
pub fn quat_from_axes(right: &Vec3, up: &Vec3, forward: &Vec3) -> Quat {
    let (m00, m10, m20) = (right.x, right.y, right.z);
    let (m01, m11, m21) = (up.x, up.y, up.z);
    let (m02, m12, m22) = (forward.x, forward.y, forward.z);

    let w = (1.0 + m00 + m11 + m22).max(0.0).sqrt() * 0.5;
    let x = ((1.0 + m00 - m11 - m22).max(0.0).sqrt() * 0.5).copysign(m21 - m12);
    let y = ((1.0 - m00 + m11 - m22).max(0.0).sqrt() * 0.5).copysign(m02 - m20);
    let z = ((1.0 - m00 - m11 + m22).max(0.0).sqrt() * 0.5).copysign(m10 - m01);

    Quat::new_normalize(Quaternion::new(w, x, y, z))
}

/// Left-handed perspective projection
///
/// `f = 1 / tan(fov / 2)` on Y, `f / aspect` on X, depth mapped to [-1, 1]
/// with `w = z`. `near` and `far` are signed distances along +Z and are not
/// required to be positive.
pub fn perspective_lh(fov: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let f = 1.0 / (fov * 0.5).tan();
    let depth = far - near;

    Mat4::new(
        f / aspect, 0.0, 0.0, 0.0,
        0.0, f, 0.0, 0.0,
        0.0, 0.0, (far + near) / depth, -2.0 * far * near / depth,
        0.0, 0.0, 1.0, 0.0,
    )
}

/// Left-handed orthographic projection mapping the given box to [-1, 1]
pub fn orthographic_lh(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let width = right - left;
    let height = top - bottom;
    let depth = far - near;

    Mat4::new(
        2.0 / width, 0.0, 0.0, -(right + left) / width,
        0.0, 2.0 / height, 0.0, -(top + bottom) / height,
        0.0, 0.0, 2.0 / depth, -(far + near) / depth,
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Common math utilities
pub mod utils {
    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees.to_radians()
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians.to_degrees()
    }
}
