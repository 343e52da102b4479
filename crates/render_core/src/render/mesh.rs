//! Mesh representation consumed by the render core
//!
//! A [`Mesh`] owns CPU-side vertex and index arrays plus the bookkeeping the
//! render system needs to keep a GPU copy in sync: vertex and index dirty flags, optional
//! buffer-cache handles and optional whole-buffer cache keys.
//!
//! The bookkeeping lives in [`Cell`]s. Meshes are shared (models and sprites
//! are referenced through `Rc` by any number of scene objects) but the render
//! system still has to record where their GPU copy lives, so the cached GPU
//! references are updated through a shared borrow.
//!
//! # Vertex layouts
//!
//! | Layout | Struct | Stride |
//! |---|---|---|
//! | Mesh | [`MeshVertex`] | 32 bytes |
//! | UI | [`UiVertex`] | 20 bytes |
//! | Debug | [`DebugVertex`] | 16 bytes |
//! | Particle | [`ParticleVertex`] | 28 bytes |

use std::cell::Cell;
use std::mem::size_of;
use std::rc::Rc;

use bytemuck::{Pod, Zeroable};

use crate::render::buffer::{BufferClass, BufferHandle};
use crate::render::resources::{Shader, Texture};
use crate::render::vertex_buffer_cache::LegacyBufferKey;

/// Standard lit mesh vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Object-space normal
    pub normal: [f32; 3],
    /// Texture coordinate
    pub uv: [f32; 2],
}

/// Screen-space UI vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct UiVertex {
    /// Position in pixels
    pub position: [f32; 2],
    /// Texture coordinate
    pub uv: [f32; 2],
    /// RGBA8 colour
    pub color: [u8; 4],
}

/// Debug primitive vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DebugVertex {
    /// World-space position
    pub position: [f32; 3],
    /// RGBA8 colour
    pub color: [u8; 4],
}

/// Particle quad corner
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ParticleVertex {
    /// World-space particle centre
    pub position: [f32; 3],
    /// RGBA8 colour
    pub color: [u8; 4],
    /// Corner texture coordinate
    pub uv: [f32; 2],
    /// Particle size in world units
    pub size: f32,
}

/// Vertex layout tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexType {
    /// [`MeshVertex`]
    Mesh,
    /// [`UiVertex`]
    Ui,
    /// [`DebugVertex`]
    Debug,
    /// [`ParticleVertex`]
    Particle,
}

impl VertexType {
    /// Byte stride of one vertex of this layout
    pub const fn stride(self) -> usize {
        match self {
            Self::Mesh => size_of::<MeshVertex>(),
            Self::Ui => size_of::<UiVertex>(),
            Self::Debug => size_of::<DebugVertex>(),
            Self::Particle => size_of::<ParticleVertex>(),
        }
    }
}

/// Plain-data vertex with a known layout tag
pub trait Vertex: Pod {
    /// Layout of this vertex type
    const TYPE: VertexType;
}

impl Vertex for MeshVertex {
    const TYPE: VertexType = VertexType::Mesh;
}

impl Vertex for UiVertex {
    const TYPE: VertexType = VertexType::Ui;
}

impl Vertex for DebugVertex {
    const TYPE: VertexType = VertexType::Debug;
}

impl Vertex for ParticleVertex {
    const TYPE: VertexType = VertexType::Particle;
}

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Primitive {
    /// Triangle list
    #[default]
    Triangles,
    /// Line list
    Lines,
}

/// Geometry with CPU data and cached GPU references
#[derive(Debug)]
pub struct Mesh {
    vertices: Vec<u8>,
    vertex_type: VertexType,
    indices: Vec<u32>,
    primitive: Primitive,
    shader: Option<Rc<Shader>>,
    texture: Option<Rc<Texture>>,
    is_static: bool,

    vertex_data_dirty: Cell<bool>,
    index_data_dirty: Cell<bool>,
    draw_count: Cell<Option<usize>>,
    handle_vertices: Cell<Option<BufferHandle>>,
    handle_indices: Cell<Option<BufferHandle>>,
    legacy_vertices: Cell<Option<LegacyBufferKey>>,
    legacy_indices: Cell<Option<LegacyBufferKey>>,
}

impl Mesh {
    /// Create a mesh from typed vertices and indices
    ///
    /// New meshes are static triangle lists without GPU data.
    pub fn new<V: Vertex>(vertices: &[V], indices: Vec<u32>) -> Self {
        Self {
            vertices: bytemuck::cast_slice(vertices).to_vec(),
            vertex_type: V::TYPE,
            indices,
            primitive: Primitive::Triangles,
            shader: None,
            texture: None,
            is_static: true,
            vertex_data_dirty: Cell::new(false),
            index_data_dirty: Cell::new(false),
            draw_count: Cell::new(None),
            handle_vertices: Cell::new(None),
            handle_indices: Cell::new(None),
            legacy_vertices: Cell::new(None),
            legacy_indices: Cell::new(None),
        }
    }

    /// Builder: set the shader
    pub fn with_shader(mut self, shader: Rc<Shader>) -> Self {
        self.shader = Some(shader);
        self
    }

    /// Builder: set the texture
    pub fn with_texture(mut self, texture: Rc<Texture>) -> Self {
        self.texture = Some(texture);
        self
    }

    /// Builder: set the primitive topology
    pub fn with_primitive(mut self, primitive: Primitive) -> Self {
        self.primitive = primitive;
        self
    }

    /// Builder: mark the mesh as frequently rewritten
    pub fn dynamic(mut self) -> Self {
        self.is_static = false;
        self
    }

    /// Replace the vertex data and flag it for re-upload
    ///
    /// The layout must stay the same; a mismatching layout is logged and
    /// ignored.
    pub fn set_vertices<V: Vertex>(&mut self, vertices: &[V]) {
        if V::TYPE != self.vertex_type {
            log::warn!("Mesh: cannot replace {:?} vertices with {:?} vertices", self.vertex_type, V::TYPE);
            return;
        }
        self.vertices.clear();
        self.vertices.extend_from_slice(bytemuck::cast_slice(vertices));
        self.vertex_data_dirty.set(true);
    }

    /// Overwrite the vertex bytes in place and flag them for re-upload
    pub fn vertices_mut(&mut self) -> &mut [u8] {
        self.vertex_data_dirty.set(true);
        &mut self.vertices
    }

    /// Replace the index data and flag it for re-upload
    pub fn set_indices(&mut self, indices: Vec<u32>) {
        self.indices = indices;
        self.index_data_dirty.set(true);
    }

    /// Set the shader
    pub fn set_shader(&mut self, shader: Option<Rc<Shader>>) {
        self.shader = shader;
    }

    /// Set the texture
    pub fn set_texture(&mut self, texture: Option<Rc<Texture>>) {
        self.texture = texture;
    }

    /// Raw vertex bytes
    #[inline]
    pub fn vertex_bytes(&self) -> &[u8] {
        &self.vertices
    }

    /// Vertex layout
    #[inline]
    pub fn vertex_type(&self) -> VertexType {
        self.vertex_type
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / self.vertex_type.stride()
    }

    /// Index data
    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Primitive topology
    #[inline]
    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    /// Shader, if one was assigned
    #[inline]
    pub fn shader(&self) -> Option<&Rc<Shader>> {
        self.shader.as_ref()
    }

    /// Texture, if one was assigned
    #[inline]
    pub fn texture(&self) -> Option<&Rc<Texture>> {
        self.texture.as_ref()
    }

    /// Static usage hint for whole-buffer uploads
    #[inline]
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Whether the vertex data changed since the last upload
    #[inline]
    pub fn is_vertex_data_dirty(&self) -> bool {
        self.vertex_data_dirty.get()
    }

    /// Flag or clear pending vertex changes
    pub fn set_vertex_data_dirty(&self, dirty: bool) {
        self.vertex_data_dirty.set(dirty);
    }

    /// Whether the index data changed since the last upload
    #[inline]
    pub fn is_index_data_dirty(&self) -> bool {
        self.index_data_dirty.get()
    }

    /// Flag or clear pending index changes
    pub fn set_index_data_dirty(&self, dirty: bool) {
        self.index_data_dirty.set(dirty);
    }

    /// Number of vertices to draw, `None` for all of them
    ///
    /// Debug line meshes preallocate their storage and only use a prefix of
    /// it each frame.
    #[inline]
    pub fn draw_count(&self) -> Option<usize> {
        self.draw_count.get()
    }

    /// Limit drawing (and prefix re-uploads) to the first `count` vertices
    pub fn set_draw_count(&self, count: Option<usize>) {
        self.draw_count.set(count);
    }

    /// Vertices that will actually be drawn
    pub fn drawn_vertex_count(&self) -> usize {
        self.draw_count.get().map_or(self.vertex_count(), |count| count.min(self.vertex_count()))
    }

    /// Buffer-cache handles (vertices, indices)
    pub fn buffer_handles(&self) -> Option<(BufferHandle, Option<BufferHandle>)> {
        self.handle_vertices.get().map(|vertices| (vertices, self.handle_indices.get()))
    }

    /// Record buffer-cache handles obtained from a [`BufferCache`](crate::render::BufferCache)
    pub fn set_buffer_handles(&self, vertices: Option<BufferHandle>, indices: Option<BufferHandle>) {
        self.handle_vertices.set(vertices);
        self.handle_indices.set(indices);
    }

    /// Buffer class of the vertex handle, if any
    pub fn buffer_class(&self) -> Option<BufferClass> {
        self.handle_vertices.get().map(BufferHandle::class)
    }

    /// Owner slot for the whole-buffer vertex copy
    #[inline]
    pub fn legacy_vertex_slot(&self) -> &Cell<Option<LegacyBufferKey>> {
        &self.legacy_vertices
    }

    /// Owner slot for the whole-buffer index copy
    #[inline]
    pub fn legacy_index_slot(&self) -> &Cell<Option<LegacyBufferKey>> {
        &self.legacy_indices
    }
}
