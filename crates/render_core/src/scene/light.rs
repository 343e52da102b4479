//! Light component
//!
//! Lights carry colour and intensity; their direction is the world forward
//! axis of the object they are attached to, cached until the object moves.

use crate::foundation::math::Vec3;

/// Light type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    /// Infinitely distant light shining along the object's forward axis
    Directional,
    /// Omnidirectional light at the object's position
    Point {
        /// Distance at which the light fades out
        range: f32,
    },
    /// Cone light along the object's forward axis
    Spot {
        /// Distance at which the light fades out
        range: f32,
        /// Half-angle of the cone in radians
        angle: f32,
    },
}

/// Light attached to a scene object
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    /// Light type
    pub kind: LightKind,
    /// Linear RGB colour
    pub color: Vec3,
    /// Intensity multiplier
    pub intensity: f32,

    pub(crate) direction: Vec3,
    pub(crate) direction_dirty: bool,
}

impl Light {
    /// Create a white light of unit intensity
    pub fn new(kind: LightKind) -> Self {
        Self {
            kind,
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: 1.0,
            direction: Vec3::z(),
            direction_dirty: true,
        }
    }

    /// Builder: set the colour
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    /// Builder: set the intensity
    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }

    /// Whether the cached direction is out of date
    #[inline]
    pub fn is_direction_dirty(&self) -> bool {
        self.direction_dirty
    }

    pub(crate) fn invalidate(&mut self) {
        self.direction_dirty = true;
    }
}
