//! Per-frame render views
//!
//! A [`RenderView`] is the result of culling the scene for one camera (or the
//! virtual UI camera). It holds matrix snapshots for every visible object and
//! the render meshes that reference them, bucketed by [`RenderQueue`].
//!
//! Views are ephemeral: the render system builds them between `begin_frame`
//! and `end_frame`, hands them to the backend once and drops them. Nothing in
//! a view refers back into the scene, so the scene may change freely while
//! the backend walks the views.

use std::rc::Rc;

use crate::foundation::math::{orthographic_lh, Mat4};
use crate::render::backend::GpuBuffer;
use crate::render::buffer::BufferHandle;
use crate::render::mesh::{Primitive, VertexType};
use crate::render::render_queue::{RenderQueue, RenderQueues};
use crate::render::resources::{Shader, Texture};
use crate::scene::ObjectId;

/// Matrix snapshot of one drawn object in one view
#[derive(Debug, Clone, PartialEq)]
pub struct RenderObject {
    /// Scene object the snapshot was taken from, `None` for utility meshes
    pub source: Option<ObjectId>,
    /// Object-to-world transform
    pub world: Mat4,
    /// View-projection composed with `world`
    pub mvp: Mat4,
}

/// Sub-range of a buffer-cache class buffer, with the GPU buffer it lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferRange {
    /// Class buffer
    pub buffer: GpuBuffer,
    /// Packed offset/size of the range
    pub handle: BufferHandle,
}

/// Where the GPU copy of a render mesh lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshGeometry {
    /// Sub-ranges of the buffer cache
    Cached {
        /// Vertex sub-range
        vertices: BufferRange,
        /// Index sub-range, `None` for non-indexed draws
        indices: Option<BufferRange>,
    },
    /// Whole GPU buffers owned by the vertex-buffer cache
    Legacy {
        /// Vertex buffer
        vertices: GpuBuffer,
        /// Index buffer, `None` for non-indexed draws
        indices: Option<GpuBuffer>,
    },
}

/// Shallow per-frame copy of a mesh ready to draw
#[derive(Debug, Clone)]
pub struct RenderMesh {
    /// Index of the owning [`RenderObject`] in the view
    pub object: usize,
    /// Vertex layout
    pub vertex_type: VertexType,
    /// Primitive topology
    pub primitive: Primitive,
    /// GPU geometry
    pub geometry: MeshGeometry,
    /// Vertices to draw
    pub vertex_count: usize,
    /// Indices to draw (0 for non-indexed draws)
    pub index_count: usize,
    /// Resolved shader (never missing; falls back to the default shader)
    pub shader: Rc<Shader>,
    /// Optional texture
    pub texture: Option<Rc<Texture>>,
}

/// Everything one camera sees this frame
#[derive(Debug)]
pub struct RenderView {
    camera: Option<ObjectId>,
    view: Mat4,
    projection: Mat4,
    view_projection: Mat4,
    objects: Vec<RenderObject>,
    queues: RenderQueues,
}

impl RenderView {
    /// Create a view for a scene camera
    pub fn for_camera(camera: ObjectId, view: Mat4, projection: Mat4, view_projection: Mat4) -> Self {
        Self {
            camera: Some(camera),
            view,
            projection,
            view_projection,
            objects: Vec::new(),
            queues: RenderQueues::new(),
        }
    }

    /// Create the virtual UI view
    ///
    /// The view transform is identity and the projection maps pixel
    /// coordinates (origin bottom-left) onto the whole screen.
    pub fn for_ui(width: u32, height: u32) -> Self {
        let projection = orthographic_lh(0.0, width.max(1) as f32, 0.0, height.max(1) as f32, -1.0, 1.0);
        Self {
            camera: None,
            view: Mat4::identity(),
            projection,
            view_projection: projection,
            objects: Vec::new(),
            queues: RenderQueues::new(),
        }
    }

    /// Camera object, `None` for the UI view
    #[inline]
    pub fn camera(&self) -> Option<ObjectId> {
        self.camera
    }

    /// Whether this is the virtual UI view
    #[inline]
    pub fn is_ui(&self) -> bool {
        self.camera.is_none()
    }

    /// View matrix snapshot
    #[inline]
    pub fn view(&self) -> &Mat4 {
        &self.view
    }

    /// Projection matrix snapshot
    #[inline]
    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    /// View-projection matrix snapshot
    #[inline]
    pub fn view_projection(&self) -> &Mat4 {
        &self.view_projection
    }

    /// Add an object snapshot for `world`, returning its index
    pub fn push_object(&mut self, source: Option<ObjectId>, world: Mat4) -> usize {
        let mvp = self.view_projection * world;
        self.objects.push(RenderObject { source, world, mvp });
        self.objects.len() - 1
    }

    /// Queue a render mesh
    pub fn push_mesh(&mut self, mesh: RenderMesh) {
        debug_assert!(mesh.object < self.objects.len(), "render mesh references a missing object");
        self.queues.push(mesh);
    }

    /// Object snapshots
    #[inline]
    pub fn objects(&self) -> &[RenderObject] {
        &self.objects
    }

    /// Meshes of one queue in submission order
    pub fn queue(&self, queue: RenderQueue) -> &[RenderMesh] {
        self.queues.queue(queue)
    }

    /// All queues
    #[inline]
    pub fn queues(&self) -> &RenderQueues {
        &self.queues
    }

    /// Total render meshes across every queue
    pub fn mesh_count(&self) -> usize {
        self.queues.total_count()
    }
}
