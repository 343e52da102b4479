//! Scene: object arena, hierarchy and component registries
//!
//! Objects live in slots. Creating an object takes the first empty slot (or
//! appends one), destroying it empties the slot and bumps the slot's
//! generation so that outstanding [`ObjectId`]s stop resolving.
//!
//! Cameras and lights that should be drawn with are additionally listed in
//! compact registries, so the render system can enumerate them without
//! walking every object.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::foundation::math::{column3, quat_from_axes, Mat4, Quat, Transform, Vec3, Vec4};
use crate::scene::camera::{self, Camera, CameraDirty};
use crate::scene::light::Light;
use crate::scene::object::{SceneObject, TransformDirty};
use crate::scene::ObjectId;

static NEXT_SCENE_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    object: Option<SceneObject>,
}

/// Owner of a hierarchy of scene objects
#[derive(Debug)]
pub struct Scene {
    id: u32,
    slots: Vec<Slot>,
    cameras: Vec<Option<ObjectId>>,
    lights: Vec<Option<ObjectId>>,
    ambient: Vec3,
    screen_resolution: (u32, u32),
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Create an empty scene
    pub fn new() -> Self {
        Self {
            id: NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed),
            slots: Vec::new(),
            cameras: Vec::new(),
            lights: Vec::new(),
            ambient: Vec3::new(0.1, 0.1, 0.1),
            screen_resolution: (1280, 720),
        }
    }

    /// Process-unique scene identifier
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    // ------------------------------------------------------------------
    // Objects
    // ------------------------------------------------------------------

    /// Create an object, optionally attached to `parent`
    ///
    /// An invalid parent leaves the new object at the root.
    pub fn create_object(&mut self, parent: Option<ObjectId>) -> ObjectId {
        let index = self
            .slots
            .iter()
            .position(|slot| slot.object.is_none())
            .unwrap_or_else(|| {
                self.slots.push(Slot::default());
                self.slots.len() - 1
            });

        let slot = &mut self.slots[index];
        let id = ObjectId {
            scene: self.id,
            index: index as u32,
            generation: slot.generation,
        };
        slot.object = Some(SceneObject::new(id));

        if parent.is_some() {
            self.set_parent(id, parent);
        }
        id
    }

    /// Whether `id` names a live object of this scene
    pub fn contains(&self, id: ObjectId) -> bool {
        self.object(id).is_some()
    }

    /// Look an object up
    pub fn object(&self, id: ObjectId) -> Option<&SceneObject> {
        if id.scene != self.id {
            return None;
        }
        let slot = self.slots.get(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.object.as_ref()
    }

    /// Look an object up for changing its non-transform state
    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        if id.scene != self.id {
            return None;
        }
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.object.as_mut()
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.object.is_some()).count()
    }

    /// Whether the scene holds no object
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|slot| slot.object.is_none())
    }

    /// Objects without a parent, in slot order
    pub fn roots(&self) -> Vec<ObjectId> {
        self.slots
            .iter()
            .filter_map(|slot| slot.object.as_ref())
            .filter(|object| object.parent.is_none())
            .map(|object| object.id)
            .collect()
    }

    /// Direct children of `id`
    pub fn children(&self, id: ObjectId) -> &[ObjectId] {
        match self.object(id) {
            Some(object) => object.children(),
            None => &[],
        }
    }

    /// Show or hide an object and its subtree
    pub fn set_visible(&mut self, id: ObjectId, visible: bool) {
        if let Some(object) = self.object_mut(id) {
            object.set_visible(visible);
        }
    }

    /// Move `id` under `parent` (or to the root with `None`)
    ///
    /// Parenting across scenes, or under the object's own subtree, is logged
    /// and ignored.
    pub fn set_parent(&mut self, id: ObjectId, parent: Option<ObjectId>) {
        let Some(old_parent) = self.object(id).map(SceneObject::parent) else {
            return;
        };

        if let Some(parent) = parent {
            if parent.scene != self.id {
                log::warn!("Scene {}: cannot parent {:?} to object of scene {}", self.id, id, parent.scene);
                return;
            }
            if !self.contains(parent) {
                return;
            }
            if parent == id || self.is_ancestor(id, parent) {
                log::warn!("Scene {}: parenting {:?} under {:?} would create a cycle", self.id, id, parent);
                return;
            }
        }

        if let Some(old) = old_parent.and_then(|old| self.object_mut(old)) {
            old.children.retain(|child| *child != id);
        }
        if let Some(new) = parent.and_then(|parent| self.object_mut(parent)) {
            new.children.push(id);
        }
        if let Some(object) = self.object_mut(id) {
            object.parent = parent;
        }
        self.mark_dirty(id);
    }

    /// Whether `ancestor` appears on the parent chain of `id`
    pub fn is_ancestor(&self, ancestor: ObjectId, id: ObjectId) -> bool {
        let mut current = self.object(id).and_then(SceneObject::parent);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.object(parent).and_then(SceneObject::parent);
        }
        false
    }

    /// Destroy an object together with its subtree, deepest objects first
    pub fn destroy_object(&mut self, id: ObjectId) {
        let Some(parent) = self.object(id).map(SceneObject::parent) else {
            return;
        };
        if let Some(parent) = parent.and_then(|parent| self.object_mut(parent)) {
            parent.children.retain(|child| *child != id);
        }

        let mut subtree = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(object) = self.object(current) {
                subtree.push(current);
                stack.extend_from_slice(&object.children);
            }
        }

        for object in subtree.into_iter().rev() {
            self.remove_references_to_object(object);
        }
    }

    /// Take an object out of the scene and out of the camera/light registries
    ///
    /// The object's id (and every copy of it) stops resolving. Children keep
    /// their parent id, which no longer resolves either; use
    /// [`Scene::destroy_object`] to remove whole subtrees.
    pub fn remove_references_to_object(&mut self, id: ObjectId) -> Option<SceneObject> {
        if !self.contains(id) {
            return None;
        }
        let slot = self.slots.get_mut(id.index())?;
        let mut object = slot.object.take()?;
        slot.generation = slot.generation.wrapping_add(1);

        if let Some(camera) = object.camera.as_mut() {
            if let Some(entry) = camera.registry_index.take().and_then(|index| self.cameras.get_mut(index)) {
                *entry = None;
            }
        }
        if object.light.is_some() {
            for entry in self.lights.iter_mut().filter(|entry| **entry == Some(id)) {
                *entry = None;
            }
        }

        Some(object)
    }

    /// Destroy every object in reverse slot order
    pub fn clear(&mut self) {
        let mut destroyed = 0;
        for index in (0..self.slots.len()).rev() {
            let id = self.slots[index].object.as_ref().map(SceneObject::id);
            if let Some(id) = id {
                self.remove_references_to_object(id);
                destroyed += 1;
            }
        }
        self.cameras.clear();
        self.lights.clear();
        log::debug!("Scene {}: destroyed {} objects", self.id, destroyed);
    }

    /// Destroy every object, then the scene itself
    pub fn destroy(mut self) {
        self.clear();
    }

    fn mark_dirty(&mut self, id: ObjectId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(object) = self.object_mut(current) {
                object.invalidate();
                stack.extend_from_slice(&object.children);
            }
        }
    }

    // ------------------------------------------------------------------
    // Transforms
    // ------------------------------------------------------------------

    /// Set the position relative to the parent
    pub fn set_local_position(&mut self, id: ObjectId, position: Vec3) {
        if let Some(object) = self.object_mut(id) {
            object.local.position = position;
            self.mark_dirty(id);
        }
    }

    /// Set the rotation relative to the parent
    pub fn set_local_rotation(&mut self, id: ObjectId, rotation: Quat) {
        if let Some(object) = self.object_mut(id) {
            object.local.rotation = rotation;
            self.mark_dirty(id);
        }
    }

    /// Set the per-axis scale
    pub fn set_local_scale(&mut self, id: ObjectId, scale: Vec3) {
        if let Some(object) = self.object_mut(id) {
            object.local.scale = scale;
            self.mark_dirty(id);
        }
    }

    /// Replace position, rotation and scale at once
    pub fn set_local(&mut self, id: ObjectId, local: Transform) {
        if let Some(object) = self.object_mut(id) {
            object.local = local;
            self.mark_dirty(id);
        }
    }

    /// Local matrix (translation × rotation × scale)
    pub fn local_transform(&mut self, id: ObjectId) -> Option<Mat4> {
        let object = self.object_mut(id)?;
        if object.dirty.contains(TransformDirty::LOCAL) {
            object.local_matrix = object.local.to_matrix();
            object.dirty.remove(TransformDirty::LOCAL);
        }
        Some(object.local_matrix)
    }

    /// World matrix (parent world × local)
    ///
    /// Refreshes the cached world position, scale and axes as a side effect.
    /// Only the dirty part of the ancestor chain is recomputed, top-down.
    pub fn transform(&mut self, id: ObjectId) -> Option<Mat4> {
        self.object(id)?;

        let mut chain = Vec::new();
        let mut parent_world = Mat4::identity();
        let mut current = Some(id);
        while let Some(next) = current {
            let Some(object) = self.object(next) else {
                break;
            };
            if !object.dirty.contains(TransformDirty::TRANSFORM) {
                parent_world = object.world_matrix;
                break;
            }
            chain.push(next);
            current = object.parent;
        }

        for next in chain.into_iter().rev() {
            let world = parent_world * self.local_transform(next)?;
            self.store_world(next, world)?;
            parent_world = world;
        }
        Some(parent_world)
    }

    fn store_world(&mut self, id: ObjectId, world: Mat4) -> Option<()> {
        let x = column3(&world, 0);
        let y = column3(&world, 1);
        let z = column3(&world, 2);

        let object = self.object_mut(id)?;
        object.world_matrix = world;
        object.world_position = column3(&world, 3);
        object.world_scale = Vec3::new(x.norm(), y.norm(), z.norm());
        object.right = x.try_normalize(0.0).unwrap_or_else(Vec3::zeros);
        object.up = y.try_normalize(0.0).unwrap_or_else(Vec3::zeros);
        object.forward = z.try_normalize(0.0).unwrap_or_else(Vec3::zeros);
        object.dirty.remove(TransformDirty::TRANSFORM);
        Some(())
    }

    /// World rotation
    ///
    /// Roots report their local rotation; other objects rebuild it from their
    /// world axes.
    pub fn rotation(&mut self, id: ObjectId) -> Option<Quat> {
        let object = self.object(id)?;
        if !object.dirty.contains(TransformDirty::ROTATION) {
            return Some(object.world_rotation);
        }

        let rotation = if object.parent.is_some() {
            self.transform(id)?;
            let object = self.object(id)?;
            quat_from_axes(&object.right, &object.up, &object.forward)
        } else {
            object.local.rotation
        };

        let object = self.object_mut(id)?;
        object.world_rotation = rotation;
        object.dirty.remove(TransformDirty::ROTATION);
        Some(rotation)
    }

    fn world_value(&mut self, id: ObjectId, value: impl Fn(&SceneObject) -> Vec3) -> Option<Vec3> {
        self.transform(id)?;
        self.object(id).map(value)
    }

    /// World position
    pub fn position(&mut self, id: ObjectId) -> Option<Vec3> {
        self.world_value(id, |object| object.world_position)
    }

    /// World scale (lengths of the world axes)
    pub fn scale(&mut self, id: ObjectId) -> Option<Vec3> {
        self.world_value(id, |object| object.world_scale)
    }

    /// World +X axis
    pub fn right(&mut self, id: ObjectId) -> Option<Vec3> {
        self.world_value(id, |object| object.right)
    }

    /// World +Y axis
    pub fn up(&mut self, id: ObjectId) -> Option<Vec3> {
        self.world_value(id, |object| object.up)
    }

    /// World +Z axis
    pub fn forward(&mut self, id: ObjectId) -> Option<Vec3> {
        self.world_value(id, |object| object.forward)
    }

    /// Turn the object so its forward axis points at `target`
    ///
    /// `up` is orthonormalized against the new forward axis. A target at the
    /// object's own position, or an `up` parallel to the view direction,
    /// leaves the rotation unchanged.
    pub fn look_at(&mut self, id: ObjectId, target: Vec3, up: Vec3) {
        let Some(position) = self.position(id) else {
            return;
        };
        let Some(forward) = (target - position).try_normalize(0.0) else {
            return;
        };
        let Some(up) = (up - forward * forward.dot(&up)).try_normalize(0.0) else {
            return;
        };
        let right = forward.cross(&up);

        // cross() is right-handed; negate to get +X in this left-handed frame
        self.set_local_rotation(id, quat_from_axes(&-right, &up, &forward));
    }

    // ------------------------------------------------------------------
    // Cameras
    // ------------------------------------------------------------------

    /// Attach a camera to an object, replacing (and unregistering) any previous one
    pub fn attach_camera(&mut self, id: ObjectId, camera: Camera) {
        self.detach_camera(id);
        if let Some(object) = self.object_mut(id) {
            object.camera = Some(camera);
        }
    }

    /// Remove and return an object's camera
    pub fn detach_camera(&mut self, id: ObjectId) -> Option<Camera> {
        let mut camera = self.object_mut(id)?.camera.take()?;
        if let Some(entry) = camera.registry_index.take().and_then(|index| self.cameras.get_mut(index)) {
            *entry = None;
        }
        Some(camera)
    }

    /// Camera attached to an object
    pub fn camera(&self, id: ObjectId) -> Option<&Camera> {
        self.object(id)?.camera.as_ref()
    }

    /// Camera attached to an object, for changing its projection
    pub fn camera_mut(&mut self, id: ObjectId) -> Option<&mut Camera> {
        self.object_mut(id)?.camera.as_mut()
    }

    /// List an object's camera for rendering
    ///
    /// The object must belong to this scene, carry a camera and not be
    /// registered yet; anything else is logged and ignored.
    pub fn register_camera(&mut self, id: ObjectId) {
        if id.scene != self.id {
            log::warn!("Scene {}: cannot register camera of scene {}", self.id, id.scene);
            return;
        }
        let Some(object) = self.object(id) else {
            return;
        };
        let Some(camera) = object.camera.as_ref() else {
            log::warn!("Scene {}: {:?} has no camera to register", self.id, id);
            return;
        };
        if camera.registry_index.is_some() {
            log::warn!("Scene {}: camera {:?} is already registered", self.id, id);
            return;
        }

        let index = claim_slot(&mut self.cameras);
        self.cameras[index] = Some(id);
        if let Some(camera) = self.camera_mut(id) {
            camera.registry_index = Some(index);
        }
    }

    /// Registered cameras in registry order
    pub fn cameras(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.cameras.iter().flatten().copied()
    }

    /// Screen resolution used for aspect ratios and screen conversions
    #[inline]
    pub fn screen_resolution(&self) -> (u32, u32) {
        self.screen_resolution
    }

    /// Update the screen resolution; a change invalidates every projection
    pub fn set_screen_resolution(&mut self, width: u32, height: u32) {
        if self.screen_resolution == (width, height) {
            return;
        }
        self.screen_resolution = (width, height);
        for camera in self.slots.iter_mut().filter_map(|slot| slot.object.as_mut()?.camera.as_mut()) {
            camera.invalidate(CameraDirty::REPROJECTED);
        }
        log::debug!("Scene {}: screen resolution now {}x{}", self.id, width, height);
    }

    fn aspect(&self) -> f32 {
        let (width, height) = self.screen_resolution;
        if height == 0 {
            1.0
        } else {
            width as f32 / height as f32
        }
    }

    /// View matrix of the camera on `id`
    pub fn camera_view(&mut self, id: ObjectId) -> Option<Mat4> {
        if self.camera(id)?.dirty.contains(CameraDirty::VIEW) {
            self.transform(id)?;
            let object = self.object_mut(id)?;
            let view = camera::view_matrix(&object.right, &object.up, &object.forward, &object.world_position);
            let camera = object.camera.as_mut()?;
            camera.view_matrix = view;
            camera.dirty.remove(CameraDirty::VIEW);
        }
        Some(self.camera(id)?.view_matrix)
    }

    /// Projection matrix of the camera on `id`
    pub fn camera_projection(&mut self, id: ObjectId) -> Option<Mat4> {
        let aspect = self.aspect();
        let camera = self.camera_mut(id)?;
        if camera.dirty.contains(CameraDirty::PROJECTION) {
            camera.projection_matrix = camera.projection().matrix(aspect);
            camera.dirty.remove(CameraDirty::PROJECTION);
        }
        Some(camera.projection_matrix)
    }

    /// Projection × view of the camera on `id`
    pub fn camera_view_projection(&mut self, id: ObjectId) -> Option<Mat4> {
        if self.camera(id)?.dirty.contains(CameraDirty::VIEW_PROJECTION) {
            let view_projection = self.camera_projection(id)? * self.camera_view(id)?;
            let camera = self.camera_mut(id)?;
            camera.view_projection = view_projection;
            camera.dirty.remove(CameraDirty::VIEW_PROJECTION);
        }
        Some(self.camera(id)?.view_projection)
    }

    /// Inverse of the view-projection of the camera on `id`
    ///
    /// A singular view-projection yields identity.
    pub fn camera_inverse_view_projection(&mut self, id: ObjectId) -> Option<Mat4> {
        if self.camera(id)?.dirty.contains(CameraDirty::INVERSE) {
            let inverse = self.camera_view_projection(id)?.try_inverse().unwrap_or_else(Mat4::identity);
            let camera = self.camera_mut(id)?;
            camera.inverse_view_projection = inverse;
            camera.dirty.remove(CameraDirty::INVERSE);
        }
        Some(self.camera(id)?.inverse_view_projection)
    }

    /// Project a world position to the screen
    ///
    /// Returns pixel x, pixel y (origin bottom-left) and the view-space depth.
    pub fn world_to_screen(&mut self, id: ObjectId, position: Vec3) -> Option<Vec3> {
        let view_projection = self.camera_view_projection(id)?;
        let view = self.camera_view(id)?;
        let point = position.push(1.0);

        let ndc = perspective_divide(view_projection * point);
        let (width, height) = self.screen_resolution;
        Some(Vec3::new(
            (ndc.x + 1.0) * 0.5 * width as f32,
            (ndc.y + 1.0) * 0.5 * height as f32,
            (view * point).z,
        ))
    }

    /// Unproject a screen position at a view-space depth
    ///
    /// `screen.z` is the distance along the camera's forward axis; the depth
    /// of the point that far ahead is used for the unprojection.
    pub fn screen_to_world(&mut self, id: ObjectId, screen: Vec3) -> Option<Vec3> {
        let view_projection = self.camera_view_projection(id)?;
        let inverse = self.camera_inverse_view_projection(id)?;
        let object = self.object(id)?;
        let ahead = object.world_position + object.forward * screen.z;

        let depth = perspective_divide(view_projection * ahead.push(1.0)).z;
        let (width, height) = self.screen_resolution;
        let ndc = Vec4::new(
            2.0 * screen.x / width.max(1) as f32 - 1.0,
            2.0 * screen.y / height.max(1) as f32 - 1.0,
            depth,
            1.0,
        );
        Some(perspective_divide(inverse * ndc))
    }

    // ------------------------------------------------------------------
    // Lights
    // ------------------------------------------------------------------

    /// Attach a light to an object, replacing (and unregistering) any previous one
    pub fn attach_light(&mut self, id: ObjectId, light: Light) {
        self.detach_light(id);
        if let Some(object) = self.object_mut(id) {
            object.light = Some(light);
        }
    }

    /// Remove and return an object's light
    pub fn detach_light(&mut self, id: ObjectId) -> Option<Light> {
        let light = self.object_mut(id)?.light.take()?;
        for entry in self.lights.iter_mut().filter(|entry| **entry == Some(id)) {
            *entry = None;
        }
        Some(light)
    }

    /// Light attached to an object
    pub fn light(&self, id: ObjectId) -> Option<&Light> {
        self.object(id)?.light.as_ref()
    }

    /// List an object's light for rendering
    ///
    /// The object must belong to this scene, carry a light and not be
    /// registered yet; anything else is logged and ignored.
    pub fn register_light(&mut self, id: ObjectId) {
        if id.scene != self.id {
            log::warn!("Scene {}: cannot register light of scene {}", self.id, id.scene);
            return;
        }
        let Some(object) = self.object(id) else {
            return;
        };
        if object.light.is_none() {
            log::warn!("Scene {}: {:?} has no light to register", self.id, id);
            return;
        }
        if self.lights.contains(&Some(id)) {
            log::warn!("Scene {}: light {:?} is already registered", self.id, id);
            return;
        }

        let index = claim_slot(&mut self.lights);
        self.lights[index] = Some(id);
    }

    /// Registered lights in registry order
    pub fn lights(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.lights.iter().flatten().copied()
    }

    /// World direction of the light on `id` (its object's forward axis)
    pub fn light_direction(&mut self, id: ObjectId) -> Option<Vec3> {
        if self.light(id)?.direction_dirty {
            let forward = self.forward(id)?;
            let light = self.object_mut(id)?.light.as_mut()?;
            light.direction = forward;
            light.direction_dirty = false;
        }
        Some(self.light(id)?.direction)
    }

    /// Ambient light colour
    #[inline]
    pub fn ambient(&self) -> Vec3 {
        self.ambient
    }

    /// Set the ambient light colour
    pub fn set_ambient(&mut self, ambient: Vec3) {
        self.ambient = ambient;
    }
}

/// First empty registry slot, appending one if none is free
fn claim_slot(registry: &mut Vec<Option<ObjectId>>) -> usize {
    registry.iter().position(Option::is_none).unwrap_or_else(|| {
        registry.push(None);
        registry.len() - 1
    })
}

fn perspective_divide(clip: Vec4) -> Vec3 {
    if clip.w.abs() > f32::EPSILON {
        clip.xyz() / clip.w
    } else {
        clip.xyz()
    }
}
