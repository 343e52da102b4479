//! # Rendering Core
//!
//! Everything between the scene graph and the graphics backend.
//!
//! ## Architecture
//!
//! - **Buffers**: [`BufferCache`] sub-allocates fixed per-class GPU buffers
//!   for geometry rebuilt often (UI, debug shapes, particles);
//!   [`VertexBufferCache`] hands out whole GPU buffers for everything else and
//!   recycles them once they go unused.
//! - **Views**: [`RenderView`]s are built fresh every frame, one per camera
//!   plus an optional UI view, with their meshes bucketed by [`RenderQueue`].
//! - **Orchestration**: [`RenderSystem`] owns the caches, builds the views
//!   and hands them to a [`GraphicsBackend`].
//!
//! The backend is the only place that talks to a graphics API. This crate
//! ships [`HeadlessBackend`], which records instead of drawing.

pub mod backend;
pub mod buffer;
pub mod buffer_cache;
pub mod error;
pub mod mesh;
pub mod render_queue;
pub mod resources;
pub mod system;
pub mod vertex_buffer_cache;
pub mod view;

#[cfg(test)]
mod tests;

pub use backend::{BufferCall, DrawnView, FixedPlatform, GpuBuffer, GraphicsBackend, HeadlessBackend, Platform};
pub use buffer::{Buffer, BufferClass, BufferHandle, BufferKind};
pub use buffer_cache::{BufferCache, BufferUsage};
pub use error::{RenderError, RenderResult};
pub use mesh::{DebugVertex, Mesh, MeshVertex, ParticleVertex, Primitive, UiVertex, Vertex, VertexType};
pub use render_queue::{RenderQueue, RenderQueues};
pub use resources::{Model, Shader, ShaderLibrary, Sprite, Texture};
pub use system::{FrameState, FrameStats, RenderSystem};
pub use vertex_buffer_cache::{LegacyBufferKey, VertexBufferCache};
pub use view::{BufferRange, MeshGeometry, RenderMesh, RenderObject, RenderView};
