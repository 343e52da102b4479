//! Backend abstraction traits for the rendering system
//!
//! The render core never talks to a graphics API directly. Everything it needs
//! from the device (buffer names, uploads, the final per-queue draw walk) goes
//! through [`GraphicsBackend`], and the only thing it needs from the window
//! layer is the screen resolution, provided by [`Platform`].
//!
//! [`HeadlessBackend`] and [`FixedPlatform`] are complete in-memory
//! implementations. They keep a byte-exact copy of every buffer and a summary
//! of every drawn view, which makes them useful for tests and for running the
//! frame loop without a window.

use std::collections::HashMap;

use crate::render::render_queue::RenderQueue;
use crate::render::view::RenderView;
use crate::scene::ObjectId;

/// Opaque GPU buffer name issued by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuBuffer(pub u32);

/// Main rendering backend trait
///
/// Implementations issue the actual graphics API calls. All methods are called
/// from the single render thread inside or around a frame bracket.
pub trait GraphicsBackend {
    /// Create a new, empty GPU buffer object
    fn generate_buffer(&mut self) -> GpuBuffer;

    /// Destroy a GPU buffer object
    fn destroy_buffer(&mut self, buffer: GpuBuffer);

    /// (Re)allocate the storage of `buffer` with `size` bytes
    ///
    /// With `data == None` the storage is only reserved. `is_static` is a
    /// usage hint: static buffers are rarely rewritten.
    fn upload_buffer_data(&mut self, buffer: GpuBuffer, data: Option<&[u8]>, size: usize, is_index: bool, is_static: bool);

    /// Overwrite `data.len()` bytes of `buffer` starting at `offset`
    fn update_buffer_subdata(&mut self, buffer: GpuBuffer, data: &[u8], offset: usize, is_index: bool);

    /// Issue draw calls for every view, queue by queue in enumeration order
    fn draw_views(&mut self, views: &[RenderView]);
}

/// Window/platform services consumed by the render core
pub trait Platform {
    /// Current drawable size in pixels (width, height)
    fn screen_resolution(&self) -> (u32, u32);
}

/// Platform with a fixed, externally controlled resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPlatform {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl FixedPlatform {
    /// Create a platform reporting `width` x `height`
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for FixedPlatform {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl Platform for FixedPlatform {
    fn screen_resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// One buffer-related backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferCall {
    /// `generate_buffer`
    Generate(GpuBuffer),
    /// `destroy_buffer`
    Destroy(GpuBuffer),
    /// `upload_buffer_data`
    Upload {
        /// Target buffer
        buffer: GpuBuffer,
        /// Reserved size in bytes
        size: usize,
        /// Whether real data was supplied
        with_data: bool,
        /// Index usage
        is_index: bool,
        /// Static usage hint
        is_static: bool,
    },
    /// `update_buffer_subdata`
    Update {
        /// Target buffer
        buffer: GpuBuffer,
        /// Byte offset
        offset: usize,
        /// Byte count
        size: usize,
        /// Index usage
        is_index: bool,
    },
}

/// Summary of one drawn view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawnView {
    /// Camera object the view was built from, `None` for the UI view
    pub camera: Option<ObjectId>,
    /// Number of render objects in the view
    pub objects: usize,
    /// Shader names of the render meshes, per queue, in submission order
    pub queues: [Vec<String>; RenderQueue::COUNT],
}

impl DrawnView {
    /// Shader names drawn in `queue`
    pub fn queue(&self, queue: RenderQueue) -> &[String] {
        &self.queues[queue.index()]
    }

    /// Total render meshes in the view
    pub fn mesh_count(&self) -> usize {
        self.queues.iter().map(Vec::len).sum()
    }
}

/// In-memory backend that mirrors buffer contents and records draws
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_name: u32,
    buffers: HashMap<GpuBuffer, Vec<u8>>,
    calls: Vec<BufferCall>,
    frames: Vec<Vec<DrawnView>>,
}

impl HeadlessBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of a live buffer
    pub fn buffer_data(&self, buffer: GpuBuffer) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    /// Number of buffers generated and not yet destroyed
    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Every buffer call in issue order
    pub fn calls(&self) -> &[BufferCall] {
        &self.calls
    }

    /// Forget recorded calls (buffer contents are kept)
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Views drawn by each `draw_views` call
    pub fn frames(&self) -> &[Vec<DrawnView>] {
        &self.frames
    }

    /// Views drawn by the most recent `draw_views` call
    pub fn last_frame(&self) -> Option<&[DrawnView]> {
        self.frames.last().map(Vec::as_slice)
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn generate_buffer(&mut self) -> GpuBuffer {
        self.next_name += 1;
        let buffer = GpuBuffer(self.next_name);
        self.buffers.insert(buffer, Vec::new());
        self.calls.push(BufferCall::Generate(buffer));
        buffer
    }

    fn destroy_buffer(&mut self, buffer: GpuBuffer) {
        if self.buffers.remove(&buffer).is_none() {
            log::warn!("Headless backend: destroying unknown buffer {:?}", buffer);
        }
        self.calls.push(BufferCall::Destroy(buffer));
    }

    fn upload_buffer_data(&mut self, buffer: GpuBuffer, data: Option<&[u8]>, size: usize, is_index: bool, is_static: bool) {
        self.calls.push(BufferCall::Upload { buffer, size, with_data: data.is_some(), is_index, is_static });

        let Some(storage) = self.buffers.get_mut(&buffer) else {
            log::warn!("Headless backend: upload into unknown buffer {:?}", buffer);
            return;
        };
        storage.clear();
        storage.resize(size, 0);
        if let Some(data) = data {
            let len = data.len().min(size);
            storage[..len].copy_from_slice(&data[..len]);
        }
    }

    fn update_buffer_subdata(&mut self, buffer: GpuBuffer, data: &[u8], offset: usize, is_index: bool) {
        self.calls.push(BufferCall::Update { buffer, offset, size: data.len(), is_index });

        let Some(storage) = self.buffers.get_mut(&buffer) else {
            log::warn!("Headless backend: update of unknown buffer {:?}", buffer);
            return;
        };
        let end = offset + data.len();
        if end > storage.len() {
            log::error!(
                "Headless backend: update {}..{} overruns buffer {:?} of {} bytes",
                offset, end, buffer, storage.len()
            );
            return;
        }
        storage[offset..end].copy_from_slice(data);
    }

    fn draw_views(&mut self, views: &[RenderView]) {
        let drawn = views
            .iter()
            .map(|view| DrawnView {
                camera: view.camera(),
                objects: view.objects().len(),
                queues: RenderQueue::ALL.map(|queue| {
                    view.queue(queue)
                        .iter()
                        .map(|mesh| mesh.shader.name().to_string())
                        .collect()
                }),
            })
            .collect();
        self.frames.push(drawn);
    }
}
