//! Optional per-object components
//!
//! Cameras and lights live in their own modules. The rest is here: the
//! particle emitter, which the render system draws, and opaque ids for the
//! components owned by subsystems outside the render core.

use crate::render::mesh::Mesh;

/// Particle emitter drawing one particle mesh
#[derive(Debug)]
pub struct Emitter {
    mesh: Mesh,
    emitting: bool,
}

impl Emitter {
    /// Create an emitter around its particle mesh
    pub fn new(mesh: Mesh) -> Self {
        Self { mesh, emitting: true }
    }

    /// Particle geometry
    #[inline]
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Particle geometry, for the particle simulation to rewrite
    #[inline]
    pub fn mesh_mut(&mut self) -> &mut Mesh {
        &mut self.mesh
    }

    /// Whether the emitter is drawn
    #[inline]
    pub fn is_emitting(&self) -> bool {
        self.emitting
    }

    /// Start or stop drawing
    pub fn set_emitting(&mut self, emitting: bool) {
        self.emitting = emitting;
    }
}

/// Animation controller id (owned by the animation system)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnimatorId(pub u32);

/// AI agent id (owned by the behavior system)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgentId(pub u32);

/// Audio source id (owned by the audio system)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioSourceId(pub u32);
