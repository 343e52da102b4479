//! Render queues for ordered drawing
//!
//! Every render mesh of a view is placed in exactly one queue, chosen by the
//! queue its shader declares. Backends draw queues in enumeration order
//! (background first, overlay last). Within a queue meshes keep their
//! submission order; any further sorting is up to the backend.

use crate::render::view::RenderMesh;

/// Draw-order bucket declared by a shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum RenderQueue {
    /// Skyboxes and other full-screen backdrops
    Background = 0,
    /// Opaque geometry
    #[default]
    Geometry = 1,
    /// Alpha-blended geometry
    Transparent = 2,
    /// UI and other overlays drawn without depth testing
    Overlay = 3,
}

impl RenderQueue {
    /// Number of queues
    pub const COUNT: usize = 4;

    /// Every queue in draw order
    pub const ALL: [Self; Self::COUNT] = [Self::Background, Self::Geometry, Self::Transparent, Self::Overlay];

    /// Position in draw order
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// One render-mesh list per queue
#[derive(Debug, Default)]
pub struct RenderQueues {
    lists: [Vec<RenderMesh>; RenderQueue::COUNT],
}

impl RenderQueues {
    /// Create empty queues
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mesh to the queue its shader declares
    pub fn push(&mut self, mesh: RenderMesh) {
        let queue = mesh.shader.queue();
        self.lists[queue.index()].push(mesh);
    }

    /// Meshes of one queue in submission order
    pub fn queue(&self, queue: RenderQueue) -> &[RenderMesh] {
        &self.lists[queue.index()]
    }

    /// All meshes, queue by queue in draw order
    pub fn iter(&self) -> impl Iterator<Item = (RenderQueue, &RenderMesh)> {
        RenderQueue::ALL
            .into_iter()
            .flat_map(move |queue| self.lists[queue.index()].iter().map(move |mesh| (queue, mesh)))
    }

    /// Total number of meshes across every queue
    pub fn total_count(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    /// Drop every mesh
    pub fn clear(&mut self) {
        for list in &mut self.lists {
            list.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::render::resources::Shader;
    use crate::render::backend::GpuBuffer;
    use crate::render::mesh::{Primitive, VertexType};
    use crate::render::view::MeshGeometry;

    fn mesh_with(shader: &Rc<Shader>, object: usize) -> RenderMesh {
        RenderMesh {
            object,
            vertex_type: VertexType::Mesh,
            primitive: Primitive::Triangles,
            geometry: MeshGeometry::Legacy { vertices: GpuBuffer(1), indices: None },
            vertex_count: 3,
            index_count: 0,
            shader: Rc::clone(shader),
            texture: None,
        }
    }

    #[test]
    fn test_meshes_route_by_shader_queue() {
        let opaque = Rc::new(Shader::new("lit", RenderQueue::Geometry, 1));
        let glass = Rc::new(Shader::new("glass", RenderQueue::Transparent, 2));
        let sky = Rc::new(Shader::new("sky", RenderQueue::Background, 3));

        let mut queues = RenderQueues::new();
        queues.push(mesh_with(&glass, 0));
        queues.push(mesh_with(&opaque, 1));
        queues.push(mesh_with(&sky, 2));
        queues.push(mesh_with(&opaque, 3));

        assert_eq!(queues.queue(RenderQueue::Geometry).len(), 2);
        assert_eq!(queues.queue(RenderQueue::Transparent).len(), 1);
        assert_eq!(queues.queue(RenderQueue::Background).len(), 1);
        assert!(queues.queue(RenderQueue::Overlay).is_empty());
        assert_eq!(queues.total_count(), 4);
    }

    #[test]
    fn test_same_shader_keeps_submission_order() {
        let opaque = Rc::new(Shader::new("lit", RenderQueue::Geometry, 1));

        let mut queues = RenderQueues::new();
        for object in 0..5 {
            queues.push(mesh_with(&opaque, object));
        }

        let objects: Vec<usize> = queues.queue(RenderQueue::Geometry).iter().map(|mesh| mesh.object).collect();
        assert_eq!(objects, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_iteration_follows_draw_order() {
        let overlay = Rc::new(Shader::new("hud", RenderQueue::Overlay, 1));
        let sky = Rc::new(Shader::new("sky", RenderQueue::Background, 2));

        let mut queues = RenderQueues::new();
        queues.push(mesh_with(&overlay, 0));
        queues.push(mesh_with(&sky, 1));

        let order: Vec<RenderQueue> = queues.iter().map(|(queue, _)| queue).collect();
        assert_eq!(order, vec![RenderQueue::Background, RenderQueue::Overlay]);

        queues.clear();
        assert_eq!(queues.total_count(), 0);
    }
}
