//! Whole-buffer vertex cache with frame-delayed recycling
//!
//! Static per-mesh geometry that is not sub-allocated from the
//! [`BufferCache`](crate::render::BufferCache) gets a GPU buffer of its own
//! from this pool. Buffers are handed out from a free list that grows in
//! batches, and are taken back automatically once their owner stops drawing
//! them for longer than the configured lifetime.
//!
//! # Ownership
//!
//! Active entries live in a [`SlotMap`]. The owner of an entry (usually a
//! [`Mesh`](crate::render::Mesh)) keeps the entry's [`LegacyBufferKey`] in a
//! `Cell`. Reclaiming an entry removes it from the map, which makes every copy
//! of its key stale; [`VertexBufferCache::resolve`] then clears the owner's
//! slot so the owner knows to allocate again.
//!
//! # Timing
//!
//! An entry refreshed (or allocated) at frame `F` expires at `F + lifetime`
//! and is reclaimed by the first [`VertexBufferCache::free_inactive_buffers`]
//! call made in a frame strictly after that.

use std::cell::Cell;

use slotmap::{new_key_type, SlotMap};

use crate::config::VertexBufferCacheConfig;
use crate::render::backend::{GpuBuffer, GraphicsBackend};

new_key_type! {
    /// Generation-checked reference to an active legacy buffer
    pub struct LegacyBufferKey;
}

#[derive(Debug)]
struct LegacyBuffer {
    gpu: GpuBuffer,
    size: usize,
    is_index: bool,
    invalidates_at: u64,
}

/// Pool of whole GPU buffers
#[derive(Debug)]
pub struct VertexBufferCache {
    active: SlotMap<LegacyBufferKey, LegacyBuffer>,
    free: Vec<GpuBuffer>,
    frame: u64,
    lifetime: u64,
    grow_batch: usize,
}

impl VertexBufferCache {
    /// Create an empty pool; no GPU buffer is generated until the first allocation
    pub fn new(config: &VertexBufferCacheConfig) -> Self {
        Self {
            active: SlotMap::with_key(),
            free: Vec::new(),
            frame: 0,
            lifetime: config.lifetime_frames,
            grow_batch: config.grow_batch.max(1),
        }
    }

    /// Set the frame number used for refreshes and reclamation
    pub fn set_frame(&mut self, frame: u64) {
        self.frame = frame;
    }

    /// Current frame number
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Upload `data` into a pooled buffer owned by `owner`
    ///
    /// A live entry already held by `owner` is released first. The new key is
    /// written into `owner` and the entry counts as refreshed this frame.
    pub fn alloc_buffer<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        data: &[u8],
        owner: &Cell<Option<LegacyBufferKey>>,
        is_index: bool,
        is_static: bool,
    ) -> GpuBuffer {
        if let Some(previous) = owner.take() {
            if let Some(entry) = self.active.remove(previous) {
                self.free.push(entry.gpu);
            }
        }

        let gpu = match self.free.pop() {
            Some(gpu) => gpu,
            None => self.grow(backend),
        };

        backend.upload_buffer_data(gpu, Some(data), data.len(), is_index, is_static);

        let key = self.active.insert(LegacyBuffer {
            gpu,
            size: data.len(),
            is_index,
            invalidates_at: self.frame + self.lifetime,
        });
        owner.set(Some(key));

        log::trace!("Legacy buffer {:?} allocated ({} bytes, index: {})", gpu, data.len(), is_index);
        gpu
    }

    fn grow<B: GraphicsBackend>(&mut self, backend: &mut B) -> GpuBuffer {
        log::debug!("Vertex buffer cache: growing free pool by {}", self.grow_batch);
        self.free.extend((0..self.grow_batch).map(|_| backend.generate_buffer()));
        // grow_batch >= 1, so the pool cannot be empty here
        self.free.pop().unwrap_or_else(|| backend.generate_buffer())
    }

    /// Keep an entry alive for another lifetime
    ///
    /// Returns `false` for a stale key.
    pub fn refresh_buffer(&mut self, key: LegacyBufferKey) -> bool {
        match self.active.get_mut(key) {
            Some(entry) => {
                entry.invalidates_at = self.frame + self.lifetime;
                true
            }
            None => false,
        }
    }

    /// GPU buffer of a live entry
    pub fn gpu_buffer(&self, key: LegacyBufferKey) -> Option<GpuBuffer> {
        self.active.get(key).map(|entry| entry.gpu)
    }

    /// GPU buffer referenced by an owner slot
    ///
    /// A slot holding a reclaimed key is cleared.
    pub fn resolve(&self, owner: &Cell<Option<LegacyBufferKey>>) -> Option<GpuBuffer> {
        let key = owner.get()?;
        let gpu = self.gpu_buffer(key);
        if gpu.is_none() {
            owner.set(None);
        }
        gpu
    }

    /// Re-upload the whole contents of a live entry
    ///
    /// The buffer storage is respecified, so `data` may differ in size from
    /// the original upload.
    pub fn update_buffer<B: GraphicsBackend>(&mut self, backend: &mut B, key: LegacyBufferKey, data: &[u8], is_static: bool) -> bool {
        let Some(entry) = self.active.get_mut(key) else {
            return false;
        };
        backend.upload_buffer_data(entry.gpu, Some(data), data.len(), entry.is_index, is_static);
        entry.size = data.len();
        true
    }

    /// Byte size of a live entry
    pub fn buffer_size(&self, key: LegacyBufferKey) -> Option<usize> {
        self.active.get(key).map(|entry| entry.size)
    }

    /// Move every expired entry back to the free pool, returning how many were reclaimed
    pub fn free_inactive_buffers(&mut self) -> usize {
        let frame = self.frame;
        let free = &mut self.free;
        let before = self.active.len();

        self.active.retain(|_, entry| {
            if entry.invalidates_at < frame {
                free.push(entry.gpu);
                false
            } else {
                true
            }
        });

        let reclaimed = before - self.active.len();
        if reclaimed > 0 {
            log::trace!("Vertex buffer cache: reclaimed {} buffers at frame {}", reclaimed, frame);
        }
        reclaimed
    }

    /// Entries currently owned
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// GPU buffers waiting in the free pool
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Reclaim expired entries, then destroy every GPU buffer in both pools
    pub fn shutdown<B: GraphicsBackend>(&mut self, backend: &mut B) {
        self.free_inactive_buffers();

        let active = self.active.len();
        for (_, entry) in self.active.drain() {
            backend.destroy_buffer(entry.gpu);
        }
        let free = self.free.len();
        for gpu in self.free.drain(..) {
            backend.destroy_buffer(gpu);
        }

        log::debug!("Vertex buffer cache shut down ({} active, {} free buffers destroyed)", active, free);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::{BufferCall, HeadlessBackend};

    fn cache() -> VertexBufferCache {
        VertexBufferCache::new(&VertexBufferCacheConfig { lifetime_frames: 2, grow_batch: 4 })
    }

    #[test]
    fn test_first_allocation_grows_pool_by_batch() {
        let mut backend = HeadlessBackend::new();
        let mut cache = cache();
        let owner = Cell::new(None);

        let gpu = cache.alloc_buffer(&mut backend, &[1, 2, 3, 4], &owner, false, true);

        assert_eq!(backend.live_buffer_count(), 4);
        assert_eq!(cache.free_count(), 3);
        assert_eq!(cache.active_count(), 1);
        assert_eq!(cache.resolve(&owner), Some(gpu));
        assert_eq!(backend.buffer_data(gpu), Some(&[1u8, 2, 3, 4][..]));
    }

    #[test]
    fn test_entry_survives_two_frames_and_expires_on_third() {
        let mut backend = HeadlessBackend::new();
        let mut cache = cache();
        let owner = Cell::new(None);

        cache.set_frame(10);
        cache.alloc_buffer(&mut backend, &[0; 8], &owner, false, true);

        cache.set_frame(11);
        assert_eq!(cache.free_inactive_buffers(), 0);
        cache.set_frame(12);
        assert_eq!(cache.free_inactive_buffers(), 0);
        assert!(cache.resolve(&owner).is_some());

        cache.set_frame(13);
        assert_eq!(cache.free_inactive_buffers(), 1);
        assert_eq!(cache.resolve(&owner), None);
        assert_eq!(owner.get(), None);
        assert_eq!(cache.active_count(), 0);
    }

    #[test]
    fn test_refresh_postpones_reclamation() {
        let mut backend = HeadlessBackend::new();
        let mut cache = cache();
        let owner = Cell::new(None);

        cache.set_frame(1);
        cache.alloc_buffer(&mut backend, &[0; 8], &owner, false, true);

        for frame in 2..10 {
            cache.set_frame(frame);
            let key = owner.get().expect("still owned");
            assert!(cache.refresh_buffer(key));
            assert_eq!(cache.free_inactive_buffers(), 0);
        }
    }

    #[test]
    fn test_reclaim_keeps_unexpired_neighbours() {
        let mut backend = HeadlessBackend::new();
        let mut cache = cache();
        let owners: Vec<Cell<Option<LegacyBufferKey>>> = (0..4).map(|_| Cell::new(None)).collect();

        cache.set_frame(0);
        for owner in &owners {
            cache.alloc_buffer(&mut backend, &[0; 4], owner, false, true);
        }

        // Keep the second and fourth entry alive
        cache.set_frame(3);
        for owner in [&owners[1], &owners[3]] {
            cache.refresh_buffer(owner.get().expect("owned"));
        }
        assert_eq!(cache.free_inactive_buffers(), 2);

        assert!(cache.resolve(&owners[0]).is_none());
        assert!(cache.resolve(&owners[1]).is_some());
        assert!(cache.resolve(&owners[2]).is_none());
        assert!(cache.resolve(&owners[3]).is_some());
    }

    #[test]
    fn test_reclaimed_buffer_is_reused_before_growing() {
        let mut backend = HeadlessBackend::new();
        let mut cache = VertexBufferCache::new(&VertexBufferCacheConfig { lifetime_frames: 2, grow_batch: 1 });
        let first = Cell::new(None);
        let second = Cell::new(None);

        let gpu = cache.alloc_buffer(&mut backend, &[0; 4], &first, false, true);
        cache.set_frame(3);
        cache.free_inactive_buffers();

        let reused = cache.alloc_buffer(&mut backend, &[0; 4], &second, false, true);
        assert_eq!(reused, gpu);
        assert_eq!(backend.live_buffer_count(), 1);
    }

    #[test]
    fn test_update_respecifies_storage() {
        let mut backend = HeadlessBackend::new();
        let mut cache = cache();
        let owner = Cell::new(None);

        let gpu = cache.alloc_buffer(&mut backend, &[1; 4], &owner, true, false);
        let key = owner.get().expect("owned");
        assert!(cache.update_buffer(&mut backend, key, &[7; 6], false));

        assert_eq!(backend.buffer_data(gpu), Some(&[7u8; 6][..]));
        assert_eq!(cache.buffer_size(key), Some(6));
        assert!(matches!(
            backend.calls().last(),
            Some(BufferCall::Upload { size: 6, is_index: true, .. })
        ));
    }

    #[test]
    fn test_shutdown_destroys_both_pools() {
        let mut backend = HeadlessBackend::new();
        let mut cache = cache();
        let owner = Cell::new(None);

        cache.alloc_buffer(&mut backend, &[0; 4], &owner, false, true);
        cache.shutdown(&mut backend);

        assert_eq!(backend.live_buffer_count(), 0);
        assert_eq!(cache.active_count(), 0);
        assert_eq!(cache.free_count(), 0);
    }
}
