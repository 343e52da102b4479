//! Shared render resources
//!
//! Shaders, textures, models and sprites are produced by the resource loader
//! (outside this crate) and shared through `Rc`. A resource lives as long as
//! the longest holder: the loader's registry, a mesh, or a scene object.

use std::collections::HashMap;
use std::rc::Rc;

use crate::render::mesh::Mesh;
use crate::render::render_queue::RenderQueue;

/// Compiled shader program and the queue it draws in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shader {
    name: String,
    queue: RenderQueue,
    program: u32,
}

impl Shader {
    /// Describe a linked program
    pub fn new(name: impl Into<String>, queue: RenderQueue, program: u32) -> Self {
        Self {
            name: name.into(),
            queue,
            program,
        }
    }

    /// Lookup name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue every mesh using this shader is drawn in
    pub fn queue(&self) -> RenderQueue {
        self.queue
    }

    /// Backend program name
    pub fn program(&self) -> u32 {
        self.program
    }
}

/// GPU texture reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    /// Lookup name
    pub name: String,
    /// Backend texture name
    pub gpu: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// A set of meshes drawn with one object transform
#[derive(Debug)]
pub struct Model {
    /// Lookup name
    pub name: String,
    /// Meshes, drawn in order
    pub meshes: Vec<Mesh>,
}

impl Model {
    /// Create a model
    pub fn new(name: impl Into<String>, meshes: Vec<Mesh>) -> Self {
        Self {
            name: name.into(),
            meshes,
        }
    }
}

/// A single textured quad mesh
#[derive(Debug)]
pub struct Sprite {
    /// Lookup name
    pub name: String,
    /// Quad geometry
    pub mesh: Mesh,
}

impl Sprite {
    /// Create a sprite
    pub fn new(name: impl Into<String>, mesh: Mesh) -> Self {
        Self {
            name: name.into(),
            mesh,
        }
    }
}

/// Name-indexed shader registry filled by the resource loader
#[derive(Debug, Default)]
pub struct ShaderLibrary {
    shaders: HashMap<String, Rc<Shader>>,
}

impl ShaderLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a shader under its own name
    pub fn insert(&mut self, shader: Shader) -> Rc<Shader> {
        let shader = Rc::new(shader);
        if self.shaders.insert(shader.name().to_string(), Rc::clone(&shader)).is_some() {
            log::debug!("Shader '{}' replaced", shader.name());
        }
        shader
    }

    /// Look a shader up by name
    pub fn get(&self, name: &str) -> Option<Rc<Shader>> {
        self.shaders.get(name).cloned()
    }

    /// Drop a shader from the registry; meshes holding it keep it alive
    pub fn remove(&mut self, name: &str) -> Option<Rc<Shader>> {
        self.shaders.remove(name)
    }

    /// Number of registered shaders
    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    /// Whether no shader is registered
    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }
}
