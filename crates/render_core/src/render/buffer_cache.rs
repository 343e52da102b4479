//! # Buffer Cache
//!
//! Sub-allocation of GPU vertex/index storage out of one fixed buffer pair per
//! [`BufferClass`].
//!
//! ## Lifecycle
//!
//! 1. [`BufferCache::new`] reserves every class buffer with an empty upload.
//! 2. `alloc_*` bump-allocates a range, uploads it right away and returns a
//!    packed [`BufferHandle`].
//! 3. [`BufferCache::update`] rewrites the exact range a handle names.
//! 4. `clear_*` resets a class's cursor. Handles issued before the clear
//!    must not be used again.
//! 5. [`BufferCache::shutdown`] destroys every class buffer.
//!
//! Running out of space is not fatal: the allocation is logged and refused,
//! and nothing is written.

use crate::config::BufferCacheConfig;
use crate::render::backend::{GpuBuffer, GraphicsBackend};
use crate::render::buffer::{Buffer, BufferClass, BufferHandle, BufferKind, INDEX_STRIDE, MAX_FIELD_VALUE};
use crate::render::error::{RenderError, RenderResult};
use crate::render::mesh::Vertex;

#[derive(Debug)]
struct ClassBuffers {
    vertices: Buffer,
    indices: Buffer,
}

impl ClassBuffers {
    fn get(&self, kind: BufferKind) -> &Buffer {
        match kind {
            BufferKind::Vertex => &self.vertices,
            BufferKind::Index => &self.indices,
        }
    }

    fn get_mut(&mut self, kind: BufferKind) -> &mut Buffer {
        match kind {
            BufferKind::Vertex => &mut self.vertices,
            BufferKind::Index => &mut self.indices,
        }
    }
}

/// Byte usage of one buffer class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferUsage {
    /// Vertex bytes handed out since the last clear
    pub vertex_used: u32,
    /// Vertex buffer capacity in bytes
    pub vertex_capacity: u32,
    /// Index bytes handed out since the last clear
    pub index_used: u32,
    /// Index buffer capacity in bytes
    pub index_capacity: u32,
}

/// One vertex and one index [`Buffer`] per buffer class
#[derive(Debug)]
pub struct BufferCache {
    classes: Vec<ClassBuffers>,
}

impl BufferCache {
    /// Reserve the GPU storage of every class
    ///
    /// Fails when a class is too large for the 24-bit offset/size fields of a
    /// handle. Nothing is generated in that case.
    pub fn new<B: GraphicsBackend>(backend: &mut B, config: &BufferCacheConfig) -> RenderResult<Self> {
        let limit = u64::from(MAX_FIELD_VALUE);
        for class in BufferClass::ALL {
            let capacity = config.get(class);
            for (kind, bytes) in [
                (BufferKind::Vertex, capacity.vertex_bytes(class)),
                (BufferKind::Index, capacity.index_bytes()),
            ] {
                if bytes > limit {
                    return Err(RenderError::CapacityOutOfRange { class, kind, bytes, limit: MAX_FIELD_VALUE });
                }
            }
        }

        let classes = BufferClass::ALL
            .iter()
            .map(|&class| {
                let capacity = config.get(class);
                // Both sizes were checked against MAX_FIELD_VALUE above
                let vertex_bytes = capacity.vertex_bytes(class) as u32;
                let index_bytes = capacity.index_bytes() as u32;
                ClassBuffers {
                    vertices: reserve(backend, BufferKind::Vertex, vertex_bytes),
                    indices: reserve(backend, BufferKind::Index, index_bytes),
                }
            })
            .collect();

        log::debug!("Buffer cache initialized with {} classes", BufferClass::COUNT);
        Ok(Self { classes })
    }

    /// Allocate `count` vertices of `stride` bytes from `class` and upload them
    ///
    /// `data` must hold at least `stride * count` bytes. Returns `None` (and
    /// logs) when the class has no room left; nothing is written then.
    pub fn alloc_vertices<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        class: BufferClass,
        data: &[u8],
        stride: usize,
        count: usize,
    ) -> Option<BufferHandle> {
        if stride != class.vertex_stride() {
            log::warn!(
                "Buffer cache: {:?} expects {}-byte vertices, got stride {}",
                class,
                class.vertex_stride(),
                stride
            );
        }
        self.allocate(backend, class, BufferKind::Vertex, data, stride.saturating_mul(count))
    }

    /// Allocate and upload typed vertices
    pub fn alloc_vertex_slice<B: GraphicsBackend, V: Vertex>(
        &mut self,
        backend: &mut B,
        class: BufferClass,
        vertices: &[V],
    ) -> Option<BufferHandle> {
        self.alloc_vertices(backend, class, bytemuck::cast_slice(vertices), V::TYPE.stride(), vertices.len())
    }

    /// Allocate and upload indices from `class`
    pub fn alloc_indices<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        class: BufferClass,
        indices: &[u32],
    ) -> Option<BufferHandle> {
        let bytes: &[u8] = bytemuck::cast_slice(indices);
        self.allocate(backend, class, BufferKind::Index, bytes, indices.len() * INDEX_STRIDE)
    }

    fn allocate<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        class: BufferClass,
        kind: BufferKind,
        data: &[u8],
        size: usize,
    ) -> Option<BufferHandle> {
        let Some(buffers) = self.classes.get_mut(class.index()) else {
            log::warn!("Buffer cache: allocation from {:?} after shutdown", class);
            return None;
        };
        if size == 0 {
            log::warn!("Buffer cache: ignoring empty {:?} {:?} allocation", class, kind);
            return None;
        }
        if data.len() < size {
            log::error!(
                "Buffer cache: {:?} {:?} allocation of {} bytes given only {} bytes of data",
                class, kind, size, data.len()
            );
            return None;
        }

        let buffer = buffers.get_mut(kind);
        let Some(size) = u32::try_from(size).ok().filter(|&size| size <= MAX_FIELD_VALUE) else {
            log::error!("Buffer cache: {:?} {:?} allocation of {} bytes exceeds handle range", class, kind, size);
            return None;
        };
        let Some(offset) = buffer.allocate(size) else {
            log::error!(
                "Buffer cache: {:?} {:?} buffer full ({} bytes requested, {} of {} remaining)",
                class,
                kind,
                size,
                buffer.remaining(),
                buffer.capacity()
            );
            return None;
        };

        backend.update_buffer_subdata(buffer.gpu(), &data[..size as usize], offset as usize, kind.is_index());
        BufferHandle::pack(offset, size, class, kind)
    }

    /// Re-upload the whole range named by `handle`
    ///
    /// Exactly `handle.size()` bytes are written; `data` must be at least that
    /// long, extra bytes are ignored. Returns `false` (and writes nothing)
    /// when `data` is too short or the cache was shut down.
    pub fn update<B: GraphicsBackend>(&mut self, backend: &mut B, handle: BufferHandle, data: &[u8]) -> bool {
        self.write(backend, handle, data, handle.size() as usize)
    }

    /// Re-upload only the first `len` bytes of the range named by `handle`
    ///
    /// Used for preallocated meshes that only draw part of their storage, and
    /// for data that shrank below its range. `len` is clamped to the range.
    pub fn update_prefix<B: GraphicsBackend>(&mut self, backend: &mut B, handle: BufferHandle, data: &[u8], len: usize) -> bool {
        self.write(backend, handle, data, len.min(handle.size() as usize))
    }

    fn write<B: GraphicsBackend>(&mut self, backend: &mut B, handle: BufferHandle, data: &[u8], len: usize) -> bool {
        let Some(buffers) = self.classes.get(handle.class().index()) else {
            log::warn!("Buffer cache: update of {:?} after shutdown", handle);
            return false;
        };
        if data.len() < len {
            log::error!(
                "Buffer cache: update of {:?} needs {} bytes, got {}",
                handle, len, data.len()
            );
            return false;
        }
        if len == 0 {
            return true;
        }

        let buffer = buffers.get(handle.kind());
        backend.update_buffer_subdata(buffer.gpu(), &data[..len], handle.offset() as usize, handle.kind().is_index());
        true
    }

    /// Reset the vertex cursor of `class`
    pub fn clear_vertices(&mut self, class: BufferClass) {
        if let Some(buffers) = self.classes.get_mut(class.index()) {
            buffers.vertices.clear();
        }
    }

    /// Reset the index cursor of `class`
    pub fn clear_indices(&mut self, class: BufferClass) {
        if let Some(buffers) = self.classes.get_mut(class.index()) {
            buffers.indices.clear();
        }
    }

    /// GPU buffer of one class/kind pair
    pub fn gpu_buffer(&self, class: BufferClass, kind: BufferKind) -> Option<GpuBuffer> {
        self.classes.get(class.index()).map(|buffers| buffers.get(kind).gpu())
    }

    /// Byte usage of `class`
    pub fn usage(&self, class: BufferClass) -> BufferUsage {
        self.classes
            .get(class.index())
            .map(|buffers| BufferUsage {
                vertex_used: buffers.vertices.used(),
                vertex_capacity: buffers.vertices.capacity(),
                index_used: buffers.indices.used(),
                index_capacity: buffers.indices.capacity(),
            })
            .unwrap_or_default()
    }

    /// Destroy every class buffer
    ///
    /// Later allocations are refused.
    pub fn shutdown<B: GraphicsBackend>(&mut self, backend: &mut B) {
        for buffers in self.classes.drain(..) {
            backend.destroy_buffer(buffers.vertices.gpu());
            backend.destroy_buffer(buffers.indices.gpu());
        }
        log::debug!("Buffer cache shut down");
    }
}

fn reserve<B: GraphicsBackend>(backend: &mut B, kind: BufferKind, bytes: u32) -> Buffer {
    let gpu = backend.generate_buffer();
    backend.upload_buffer_data(gpu, None, bytes as usize, kind.is_index(), false);
    Buffer::new(gpu, kind, bytes)
}
