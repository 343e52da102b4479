//! # Render System
//!
//! Per-frame orchestration: turns scenes and loose meshes into render views,
//! keeps GPU copies of mesh data in sync, and hands the views to the backend.
//!
//! ## Frame Lifecycle
//!
//! ```text
//! new() ──► Idle ──begin_frame()──► InProgress ──end_frame()──► Idle ──► …
//!                                      │  render_scene()
//!                                      │  render_mesh()
//!           shutdown() from any state ──► Shutdown
//! ```
//!
//! `end_frame` draws every collected view, drops all frame-transient data,
//! reclaims legacy buffers that went unused, and advances the frame counter.
//! Calls made in the wrong state are logged and ignored.
//!
//! ## Mesh Upload Paths
//!
//! - Meshes holding [`BufferCache`] handles are drawn from their class
//!   buffers. Dirty vertex or index data is re-uploaded in place when it
//!   still fits its range and moved to a fresh range of the same class when
//!   it grew; debug-line meshes only upload the prefix they draw. A mesh
//!   whose data cannot be uploaded stays dirty and is skipped.
//! - Every other mesh gets whole GPU buffers from the [`VertexBufferCache`],
//!   refreshed each frame the mesh is drawn.

use std::cell::Cell;
use std::rc::Rc;

use crate::config::RenderConfig;
use crate::foundation::math::Mat4;
use crate::render::backend::{GpuBuffer, GraphicsBackend, Platform};
use crate::render::buffer::{BufferClass, BufferHandle, INDEX_STRIDE};
use crate::render::buffer_cache::BufferCache;
use crate::render::error::RenderResult;
use crate::render::mesh::Mesh;
use crate::render::render_queue::RenderQueue;
use crate::render::resources::{Shader, ShaderLibrary};
use crate::render::vertex_buffer_cache::{LegacyBufferKey, VertexBufferCache};
use crate::render::view::{BufferRange, MeshGeometry, RenderMesh, RenderView};
use crate::scene::{ObjectId, Scene};

/// Render system state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Between frames
    Idle,
    /// Between `begin_frame` and `end_frame`
    InProgress,
    /// Every GPU resource has been released
    Shutdown,
}

/// Size of the frame data collected so far
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Render views
    pub views: usize,
    /// Render objects across all views
    pub objects: usize,
    /// Render meshes across all views and queues
    pub meshes: usize,
}

/// Frame orchestrator owning the backend, the platform and both buffer caches
pub struct RenderSystem<B: GraphicsBackend, P: Platform> {
    backend: B,
    platform: P,
    config: RenderConfig,
    shaders: ShaderLibrary,
    default_shader: Option<Rc<Shader>>,
    default_is_placeholder: bool,
    buffer_cache: BufferCache,
    vertex_buffers: VertexBufferCache,
    views: Vec<RenderView>,
    ui_view: Option<usize>,
    last_stats: FrameStats,
    frame: u64,
    state: FrameState,
}

impl<B: GraphicsBackend, P: Platform> RenderSystem<B, P> {
    /// Validate `config` and reserve the buffer-cache storage
    pub fn new(mut backend: B, platform: P, config: RenderConfig) -> RenderResult<Self> {
        config.validate()?;
        let buffer_cache = BufferCache::new(&mut backend, &config.buffers)?;
        let vertex_buffers = VertexBufferCache::new(&config.vertex_buffers);

        log::info!(
            "Render system initialized (default shader '{}', legacy buffer lifetime {} frames)",
            config.default_shader,
            config.vertex_buffers.lifetime_frames
        );

        Ok(Self {
            backend,
            platform,
            config,
            shaders: ShaderLibrary::new(),
            default_shader: None,
            default_is_placeholder: true,
            buffer_cache,
            vertex_buffers,
            views: Vec::new(),
            ui_view: None,
            last_stats: FrameStats::default(),
            frame: 0,
            state: FrameState::Idle,
        })
    }

    /// Start a frame
    ///
    /// Resolves the default shader by name until the library provides it.
    /// Until then a built-in placeholder drawing in the geometry queue is
    /// used.
    pub fn begin_frame(&mut self) {
        if self.state != FrameState::Idle {
            log::warn!("begin_frame called in state {:?}", self.state);
            return;
        }

        self.vertex_buffers.set_frame(self.frame);
        if self.default_is_placeholder {
            self.resolve_default_shader();
        }

        self.state = FrameState::InProgress;
        log::trace!("Begin frame {}", self.frame);
    }

    /// Finish the frame: draw, free frame data, reclaim idle legacy buffers
    pub fn end_frame(&mut self) {
        if self.state != FrameState::InProgress {
            log::warn!("end_frame called in state {:?}", self.state);
            return;
        }

        self.backend.draw_views(&self.views);
        self.last_stats = self.frame_stats();
        self.free_frame_data();

        let reclaimed = self.vertex_buffers.free_inactive_buffers();
        log::trace!(
            "End frame {}: {} views, {} meshes, {} legacy buffers reclaimed",
            self.frame,
            self.last_stats.views,
            self.last_stats.meshes,
            reclaimed
        );

        self.frame += 1;
        self.state = FrameState::Idle;
    }

    /// Build one view per registered camera and fill it with the scene's renderables
    ///
    /// Objects are visited depth-first from the roots. Hidden objects are
    /// skipped together with their subtree.
    pub fn render_scene(&mut self, scene: &mut Scene) {
        if !self.in_frame("render_scene") {
            return;
        }

        let (width, height) = self.platform.screen_resolution();
        scene.set_screen_resolution(width, height);

        let first_view = self.views.len();
        let cameras: Vec<ObjectId> = scene.cameras().collect();
        for camera in cameras {
            let (Some(view), Some(projection), Some(view_projection)) = (
                scene.camera_view(camera),
                scene.camera_projection(camera),
                scene.camera_view_projection(camera),
            ) else {
                continue;
            };
            self.views.push(RenderView::for_camera(camera, view, projection, view_projection));
        }
        if self.views.len() == first_view {
            log::trace!("Scene {} has no registered camera", scene.id());
            return;
        }

        let mut stack = scene.roots();
        stack.reverse();
        while let Some(id) = stack.pop() {
            let Some(object) = scene.object(id) else {
                continue;
            };
            if !object.is_visible() {
                continue;
            }
            stack.extend(object.children().iter().rev().copied());
            if !object.is_renderable() {
                continue;
            }

            let Some(world) = scene.transform(id) else {
                continue;
            };
            let Some(object) = scene.object(id) else {
                continue;
            };

            let mut meshes: Vec<&Mesh> = Vec::new();
            if let Some(model) = object.model() {
                meshes.extend(model.meshes.iter());
            }
            if let Some(sprite) = object.sprite() {
                meshes.push(&sprite.mesh);
            }
            if let Some(emitter) = object.emitter().filter(|emitter| emitter.is_emitting()) {
                meshes.push(emitter.mesh());
            }

            let prepared: Vec<RenderMesh> = meshes.into_iter().filter_map(|mesh| self.prepare_mesh(mesh)).collect();
            for view in &mut self.views[first_view..] {
                let index = view.push_object(Some(id), world);
                for mesh in &prepared {
                    view.push_mesh(RenderMesh { object: index, ..mesh.clone() });
                }
            }
        }
    }

    /// Draw a mesh that is not part of a scene
    ///
    /// UI meshes go to the virtual UI view, which maps pixel coordinates onto
    /// the screen. Other meshes are added with an identity transform to every
    /// camera view created so far this frame.
    pub fn render_mesh(&mut self, mesh: &Mesh, is_ui: bool) {
        if !self.in_frame("render_mesh") {
            return;
        }
        let Some(prepared) = self.prepare_mesh(mesh) else {
            return;
        };

        if is_ui {
            let ui = self.ui_view_index();
            self.views[ui].push_mesh(prepared);
            return;
        }

        for view in self.views.iter_mut().filter(|view| !view.is_ui()) {
            let index = view.push_object(None, Mat4::identity());
            view.push_mesh(RenderMesh { object: index, ..prepared.clone() });
        }
    }

    fn ui_view_index(&mut self) -> usize {
        if let Some(index) = self.ui_view {
            return index;
        }
        let (width, height) = self.platform.screen_resolution();
        let mut view = RenderView::for_ui(width, height);
        view.push_object(None, Mat4::identity());
        self.views.push(view);
        let index = self.views.len() - 1;
        self.ui_view = Some(index);
        index
    }

    fn resolve_default_shader(&mut self) {
        let name = &self.config.default_shader;
        if let Some(shader) = self.shaders.get(name) {
            log::debug!("Default shader '{}' resolved", name);
            self.default_shader = Some(shader);
            self.default_is_placeholder = false;
        } else if self.default_shader.is_none() {
            log::warn!("Default shader '{}' not found, using placeholder", name);
            self.default_shader = Some(Rc::new(Shader::new(name.clone(), RenderQueue::Geometry, 0)));
        }
    }

    fn in_frame(&self, operation: &str) -> bool {
        if self.state == FrameState::InProgress {
            true
        } else {
            log::warn!("{} called outside a frame (state {:?})", operation, self.state);
            false
        }
    }

    fn resolve_shader(&self, mesh: &Mesh) -> Rc<Shader> {
        if let Some(shader) = mesh.shader() {
            return Rc::clone(shader);
        }
        match &self.default_shader {
            Some(shader) => Rc::clone(shader),
            None => Rc::new(Shader::new(self.config.default_shader.clone(), RenderQueue::Geometry, 0)),
        }
    }

    /// Sync the GPU copy of `mesh` and describe it as a render mesh for object 0
    fn prepare_mesh(&mut self, mesh: &Mesh) -> Option<RenderMesh> {
        let geometry = match mesh.buffer_handles() {
            Some((vertices, indices)) => self.cached_geometry(mesh, vertices, indices)?,
            None => self.legacy_geometry(mesh)?,
        };

        Some(RenderMesh {
            object: 0,
            vertex_type: mesh.vertex_type(),
            primitive: mesh.primitive(),
            geometry,
            vertex_count: mesh.drawn_vertex_count(),
            index_count: mesh.indices().len(),
            shader: self.resolve_shader(mesh),
            texture: mesh.texture().cloned(),
        })
    }

    fn cached_geometry(&mut self, mesh: &Mesh, mut vertices: BufferHandle, mut indices: Option<BufferHandle>) -> Option<MeshGeometry> {
        if mesh.is_vertex_data_dirty() {
            let len = if vertices.class() == BufferClass::DebugLines {
                mesh.drawn_vertex_count() * mesh.vertex_type().stride()
            } else {
                mesh.vertex_bytes().len()
            };
            vertices = self.sync_vertex_range(mesh, vertices, len)?;
            mesh.set_buffer_handles(Some(vertices), indices);
            mesh.set_vertex_data_dirty(false);
        }
        if mesh.is_index_data_dirty() {
            indices = self.sync_index_range(mesh, vertices.class(), indices)?;
            mesh.set_buffer_handles(Some(vertices), indices);
            mesh.set_index_data_dirty(false);
        }

        let range = |handle: BufferHandle| {
            self.buffer_cache
                .gpu_buffer(handle.class(), handle.kind())
                .map(|buffer| BufferRange { buffer, handle })
        };
        Some(MeshGeometry::Cached {
            vertices: range(vertices)?,
            indices: indices.and_then(range),
        })
    }

    /// Write the first `len` vertex bytes into `handle`, or into a new range
    /// of the same class when they no longer fit
    ///
    /// The outgrown range stays allocated until its class is cleared.
    fn sync_vertex_range(&mut self, mesh: &Mesh, handle: BufferHandle, len: usize) -> Option<BufferHandle> {
        if len <= handle.size() as usize {
            return self
                .buffer_cache
                .update_prefix(&mut self.backend, handle, mesh.vertex_bytes(), len)
                .then_some(handle);
        }

        let class = handle.class();
        let stride = mesh.vertex_type().stride();
        let moved = self.buffer_cache.alloc_vertices(&mut self.backend, class, mesh.vertex_bytes(), stride, mesh.vertex_count());
        if moved.is_none() {
            log::warn!("Mesh vertices outgrew their {:?} range ({} > {} bytes); skipping mesh", class, len, handle.size());
        }
        moved
    }

    /// Index counterpart of [`Self::sync_vertex_range`]
    ///
    /// The inner `None` means the mesh no longer has indices; the outer one
    /// means the upload failed.
    fn sync_index_range(&mut self, mesh: &Mesh, class: BufferClass, handle: Option<BufferHandle>) -> Option<Option<BufferHandle>> {
        if mesh.indices().is_empty() {
            return Some(None);
        }

        let bytes: &[u8] = bytemuck::cast_slice(mesh.indices());
        if let Some(handle) = handle.filter(|handle| bytes.len() <= handle.size() as usize) {
            return self
                .buffer_cache
                .update_prefix(&mut self.backend, handle, bytes, bytes.len())
                .then_some(Some(handle));
        }

        let moved = self.buffer_cache.alloc_indices(&mut self.backend, class, mesh.indices());
        if moved.is_none() {
            log::warn!("Mesh indices do not fit into {:?} ({} bytes); skipping mesh", class, bytes.len());
        }
        moved.map(Some)
    }

    fn legacy_geometry(&mut self, mesh: &Mesh) -> Option<MeshGeometry> {
        if mesh.vertex_count() == 0 {
            return None;
        }

        let dirty = mesh.is_vertex_data_dirty();
        let vertices = self.legacy_buffer(mesh.legacy_vertex_slot(), mesh.vertex_bytes(), false, mesh.is_static(), dirty);
        mesh.set_vertex_data_dirty(false);

        let indices = if mesh.indices().is_empty() {
            None
        } else {
            let bytes: &[u8] = bytemuck::cast_slice(mesh.indices());
            debug_assert_eq!(bytes.len(), mesh.indices().len() * INDEX_STRIDE);
            let dirty = mesh.is_index_data_dirty();
            Some(self.legacy_buffer(mesh.legacy_index_slot(), bytes, true, mesh.is_static(), dirty))
        };
        mesh.set_index_data_dirty(false);

        Some(MeshGeometry::Legacy { vertices, indices })
    }

    fn legacy_buffer(
        &mut self,
        owner: &Cell<Option<LegacyBufferKey>>,
        data: &[u8],
        is_index: bool,
        is_static: bool,
        dirty: bool,
    ) -> GpuBuffer {
        if let Some(key) = owner.get() {
            if self.vertex_buffers.refresh_buffer(key) {
                if dirty {
                    self.vertex_buffers.update_buffer(&mut self.backend, key, data, is_static);
                }
                if let Some(gpu) = self.vertex_buffers.gpu_buffer(key) {
                    return gpu;
                }
            }
        }
        self.vertex_buffers.alloc_buffer(&mut self.backend, data, owner, is_index, is_static)
    }

    /// Drop every view, render object and render mesh, and reset the UI class
    ///
    /// Handles into the UI class issued before this call are invalid
    /// afterwards; UI geometry is expected to be rebuilt every frame.
    pub fn free_frame_data(&mut self) {
        self.views.clear();
        self.ui_view = None;
        self.buffer_cache.clear_vertices(BufferClass::Ui);
        self.buffer_cache.clear_indices(BufferClass::Ui);
    }

    /// Upload a mesh into a buffer class and record the handles on the mesh
    ///
    /// Returns `false` (leaving the mesh untouched) when the class is out of
    /// space.
    pub fn upload_to_class(&mut self, mesh: &Mesh, class: BufferClass) -> bool {
        if self.state == FrameState::Shutdown {
            return false;
        }
        let stride = mesh.vertex_type().stride();
        let vertices = self.buffer_cache.alloc_vertices(&mut self.backend, class, mesh.vertex_bytes(), stride, mesh.vertex_count());
        let Some(vertices) = vertices else {
            return false;
        };

        let indices = if mesh.indices().is_empty() {
            None
        } else {
            match self.buffer_cache.alloc_indices(&mut self.backend, class, mesh.indices()) {
                Some(handle) => Some(handle),
                None => return false,
            }
        };

        mesh.set_buffer_handles(Some(vertices), indices);
        mesh.set_vertex_data_dirty(false);
        mesh.set_index_data_dirty(false);
        true
    }

    /// Release every GPU buffer owned by the caches
    pub fn shutdown(&mut self) {
        if self.state == FrameState::Shutdown {
            return;
        }
        if self.state == FrameState::InProgress {
            log::warn!("Shutting down in the middle of frame {}", self.frame);
            self.free_frame_data();
        }

        self.vertex_buffers.shutdown(&mut self.backend);
        self.buffer_cache.shutdown(&mut self.backend);
        self.state = FrameState::Shutdown;
        log::info!("Render system shut down after {} frames", self.frame);
    }

    /// Collected frame data so far (all zero between frames)
    pub fn frame_stats(&self) -> FrameStats {
        FrameStats {
            views: self.views.len(),
            objects: self.views.iter().map(|view| view.objects().len()).sum(),
            meshes: self.views.iter().map(RenderView::mesh_count).sum(),
        }
    }

    /// Frame data handed to the backend by the last `end_frame`
    #[inline]
    pub fn last_frame_stats(&self) -> FrameStats {
        self.last_stats
    }

    /// Views collected so far this frame
    #[inline]
    pub fn views(&self) -> &[RenderView] {
        &self.views
    }

    /// Number of completed frames
    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    /// Current state
    #[inline]
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Active configuration
    #[inline]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Shader registry
    #[inline]
    pub fn shaders(&self) -> &ShaderLibrary {
        &self.shaders
    }

    /// Shader registry, for the resource loader to fill
    #[inline]
    pub fn shaders_mut(&mut self) -> &mut ShaderLibrary {
        &mut self.shaders
    }

    /// Sub-allocated class buffers
    #[inline]
    pub fn buffer_cache(&self) -> &BufferCache {
        &self.buffer_cache
    }

    /// Whole-buffer legacy cache
    #[inline]
    pub fn vertex_buffers(&self) -> &VertexBufferCache {
        &self.vertex_buffers
    }

    /// Graphics backend
    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Graphics backend, mutably
    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Platform services
    #[inline]
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Platform services, mutably
    #[inline]
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }
}

impl<B: GraphicsBackend, P: Platform> Drop for RenderSystem<B, P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
