//! # Scene Graph
//!
//! Hierarchical scene objects with lazily evaluated world transforms, plus the
//! camera and light components the render system enumerates every frame.
//!
//! ## Architecture
//!
//! A [`Scene`] owns its objects in an index arena. Objects are referenced by
//! [`ObjectId`], a generation-checked handle that also names the scene it
//! belongs to. Using an id after its object was destroyed, or with a different
//! scene, never touches the wrong object: getters return `None` and mutators
//! do nothing.
//!
//! ## Dirty tracking
//!
//! Local changes only flip dirty bits on the object and its descendants. World
//! transform, world rotation, camera matrices and light directions are
//! recomputed the next time somebody reads them.

pub mod camera;
pub mod components;
pub mod light;
pub mod object;
#[allow(clippy::module_inception)]
pub mod scene;

pub use camera::{Camera, CameraDirty, Projection};
pub use components::{AgentId, AnimatorId, AudioSourceId, Emitter};
pub use light::{Light, LightKind};
pub use object::{SceneObject, TransformDirty};
pub use scene::Scene;

/// Generation-checked reference to a scene object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId {
    pub(crate) scene: u32,
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl ObjectId {
    /// Identifier of the owning scene
    #[inline]
    pub fn scene(&self) -> u32 {
        self.scene
    }

    /// Slot index inside the owning scene
    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }
}
