//! Scene object (transform node)
//!
//! A [`SceneObject`] holds its local transform, the world-space values derived
//! from it, and one optional slot per component kind. The derived values are
//! only valid while the matching [`TransformDirty`] bit is clear; the
//! [`Scene`](crate::scene::Scene) getters take care of refreshing them.

use std::rc::Rc;

use bitflags::bitflags;

use crate::foundation::math::{Mat4, Quat, Transform, Vec3};
use crate::render::resources::{Model, Sprite};
use crate::scene::camera::Camera;
use crate::scene::components::{AgentId, AnimatorId, AudioSourceId, Emitter};
use crate::scene::light::Light;
use crate::scene::ObjectId;

bitflags! {
    /// Stale cached values of a scene object
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TransformDirty: u8 {
        /// World matrix, position, scale and axes
        const TRANSFORM = 1 << 0;
        /// Local matrix
        const LOCAL = 1 << 1;
        /// World rotation
        const ROTATION = 1 << 2;
    }
}

/// One node of the scene hierarchy
#[derive(Debug)]
pub struct SceneObject {
    pub(crate) id: ObjectId,
    pub(crate) parent: Option<ObjectId>,
    pub(crate) children: Vec<ObjectId>,

    pub(crate) local: Transform,
    pub(crate) dirty: TransformDirty,
    pub(crate) local_matrix: Mat4,
    pub(crate) world_matrix: Mat4,
    pub(crate) world_position: Vec3,
    pub(crate) world_scale: Vec3,
    pub(crate) right: Vec3,
    pub(crate) up: Vec3,
    pub(crate) forward: Vec3,
    pub(crate) world_rotation: Quat,

    visible: bool,

    pub(crate) camera: Option<Camera>,
    pub(crate) light: Option<Light>,
    emitter: Option<Emitter>,
    model: Option<Rc<Model>>,
    sprite: Option<Rc<Sprite>>,
    animator: Option<AnimatorId>,
    agent: Option<AgentId>,
    audio_source: Option<AudioSourceId>,
}

impl SceneObject {
    pub(crate) fn new(id: ObjectId) -> Self {
        Self {
            id,
            parent: None,
            children: Vec::new(),
            local: Transform::identity(),
            dirty: TransformDirty::all(),
            local_matrix: Mat4::identity(),
            world_matrix: Mat4::identity(),
            world_position: Vec3::zeros(),
            world_scale: Vec3::new(1.0, 1.0, 1.0),
            right: Vec3::x(),
            up: Vec3::y(),
            forward: Vec3::z(),
            world_rotation: Quat::identity(),
            visible: true,
            camera: None,
            light: None,
            emitter: None,
            model: None,
            sprite: None,
            animator: None,
            agent: None,
            audio_source: None,
        }
    }

    /// This object's id
    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Parent object, `None` for roots
    #[inline]
    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    /// Direct children in attachment order
    #[inline]
    pub fn children(&self) -> &[ObjectId] {
        &self.children
    }

    /// Local position, rotation and scale
    #[inline]
    pub fn local(&self) -> &Transform {
        &self.local
    }

    /// Stale cached values
    #[inline]
    pub fn dirty(&self) -> TransformDirty {
        self.dirty
    }

    /// Whether the object (and its subtree) is drawn
    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Show or hide the object and its subtree
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Attached camera
    #[inline]
    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    /// Attached light
    #[inline]
    pub fn light(&self) -> Option<&Light> {
        self.light.as_ref()
    }

    /// Attached light, for changing colour or intensity
    #[inline]
    pub fn light_mut(&mut self) -> Option<&mut Light> {
        self.light.as_mut()
    }

    /// Attached particle emitter
    #[inline]
    pub fn emitter(&self) -> Option<&Emitter> {
        self.emitter.as_ref()
    }

    /// Attached particle emitter, for the particle simulation
    #[inline]
    pub fn emitter_mut(&mut self) -> Option<&mut Emitter> {
        self.emitter.as_mut()
    }

    /// Attach or remove a particle emitter
    pub fn set_emitter(&mut self, emitter: Option<Emitter>) -> Option<Emitter> {
        std::mem::replace(&mut self.emitter, emitter)
    }

    /// Drawn model
    #[inline]
    pub fn model(&self) -> Option<&Rc<Model>> {
        self.model.as_ref()
    }

    /// Attach or remove a model
    pub fn set_model(&mut self, model: Option<Rc<Model>>) {
        self.model = model;
    }

    /// Drawn sprite
    #[inline]
    pub fn sprite(&self) -> Option<&Rc<Sprite>> {
        self.sprite.as_ref()
    }

    /// Attach or remove a sprite
    pub fn set_sprite(&mut self, sprite: Option<Rc<Sprite>>) {
        self.sprite = sprite;
    }

    /// Whether the render system has anything to draw for this object
    pub fn is_renderable(&self) -> bool {
        self.model.is_some() || self.sprite.is_some() || self.emitter.is_some()
    }

    /// Animation controller
    #[inline]
    pub fn animator(&self) -> Option<AnimatorId> {
        self.animator
    }

    /// Attach or remove an animation controller
    pub fn set_animator(&mut self, animator: Option<AnimatorId>) {
        self.animator = animator;
    }

    /// AI agent
    #[inline]
    pub fn agent(&self) -> Option<AgentId> {
        self.agent
    }

    /// Attach or remove an AI agent
    pub fn set_agent(&mut self, agent: Option<AgentId>) {
        self.agent = agent;
    }

    /// Audio source
    #[inline]
    pub fn audio_source(&self) -> Option<AudioSourceId> {
        self.audio_source
    }

    /// Attach or remove an audio source
    pub fn set_audio_source(&mut self, audio_source: Option<AudioSourceId>) {
        self.audio_source = audio_source;
    }

    /// Flag every cached value stale, including attached camera and light caches
    pub(crate) fn invalidate(&mut self) {
        self.dirty = TransformDirty::all();
        if let Some(camera) = self.camera.as_mut() {
            camera.invalidate(crate::scene::camera::CameraDirty::MOVED);
        }
        if let Some(light) = self.light.as_mut() {
            light.invalidate();
        }
    }
}
