//! # Render Core
//!
//! The rendering core of a small real-time 3D/2D engine: a scene graph with
//! lazily evaluated transforms, per-frame render-view construction, and the
//! GPU buffer caches that feed a graphics backend.
//!
//! ## Features
//!
//! - **Scene Graph**: generation-checked object ids, dirty-tracked world
//!   transforms, camera and light registries
//! - **Render Views**: one view per camera plus a UI view, meshes routed to
//!   render queues by shader
//! - **Buffer Caches**: bump-allocated class buffers addressed by packed
//!   handles, and a whole-buffer pool with frame-delayed recycling
//! - **Backend Agnostic**: graphics API and window access go through two
//!   small traits
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use render_core::prelude::*;
//!
//! fn main() -> Result<(), RenderError> {
//!     let mut renderer = RenderSystem::new(HeadlessBackend::new(), FixedPlatform::default(), RenderConfig::default())?;
//!
//!     let mut scene = Scene::new();
//!     let eye = scene.create_object(None);
//!     scene.attach_camera(eye, Camera::perspective(1.0, 0.1, 100.0));
//!     scene.register_camera(eye);
//!
//!     renderer.begin_frame();
//!     renderer.render_scene(&mut scene);
//!     renderer.end_frame();
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]

pub mod config;
pub mod foundation;
pub mod render;
pub mod scene;

/// Common imports for render core users
pub mod prelude {
    pub use crate::{
        config::{BufferCacheConfig, BufferClassConfig, Config, ConfigError, RenderConfig, VertexBufferCacheConfig},
        foundation::math::{Mat4, Quat, Transform, Vec2, Vec3, Vec4},
        render::{
            BufferClass, BufferHandle, DebugVertex, FixedPlatform, GraphicsBackend, HeadlessBackend, Mesh,
            MeshVertex, Model, ParticleVertex, Platform, Primitive, RenderError, RenderQueue, RenderSystem,
            Shader, Sprite, Texture, UiVertex,
        },
        scene::{Camera, Emitter, Light, LightKind, ObjectId, Scene},
    };
}
