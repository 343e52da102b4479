//! Frame-level tests driving the render system through the headless backend

use std::rc::Rc;

use crate::config::{BufferClassConfig, RenderConfig};
use crate::foundation::math::Vec3;
use crate::render::backend::{BufferCall, DrawnView, FixedPlatform, HeadlessBackend};
use crate::render::buffer::{BufferClass, BufferKind};
use crate::render::mesh::{DebugVertex, Mesh, MeshVertex, ParticleVertex, Primitive, UiVertex};
use crate::render::render_queue::RenderQueue;
use crate::render::resources::{Model, Shader, Sprite};
use crate::render::system::{FrameState, FrameStats, RenderSystem};
use crate::scene::{Camera, Emitter, ObjectId, Scene};

type TestSystem = RenderSystem<HeadlessBackend, FixedPlatform>;

fn system() -> TestSystem {
    RenderSystem::new(HeadlessBackend::new(), FixedPlatform::new(800, 600), RenderConfig::default())
        .expect("default config is valid")
}

fn triangle() -> Vec<MeshVertex> {
    [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
        .into_iter()
        .map(|position| MeshVertex { position, normal: [0.0, 0.0, -1.0], uv: [0.0, 0.0] })
        .collect()
}

fn ui_quad() -> Vec<UiVertex> {
    [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]]
        .into_iter()
        .map(|position| UiVertex { position, uv: [0.0, 0.0], color: [255; 4] })
        .collect()
}

fn add_camera(scene: &mut Scene) -> ObjectId {
    let eye = scene.create_object(None);
    scene.attach_camera(eye, Camera::perspective(1.0, 0.1, 100.0));
    scene.register_camera(eye);
    eye
}

fn add_model(scene: &mut Scene, parent: Option<ObjectId>, model: &Rc<Model>) -> ObjectId {
    let id = scene.create_object(parent);
    scene.object_mut(id).expect("live object").set_model(Some(Rc::clone(model)));
    id
}

fn uploads_with_data(backend: &HeadlessBackend) -> usize {
    backend
        .calls()
        .iter()
        .filter(|call| matches!(call, BufferCall::Upload { with_data: true, .. }))
        .count()
}

#[test]
fn test_end_frame_leaves_no_frame_data() {
    let mut renderer = system();
    let mut scene = Scene::new();
    add_camera(&mut scene);
    add_camera(&mut scene);
    let model = Rc::new(Model::new("tri", vec![Mesh::new(&triangle(), vec![0, 1, 2])]));
    for _ in 0..3 {
        add_model(&mut scene, None, &model);
    }

    renderer.begin_frame();
    renderer.render_scene(&mut scene);
    assert_eq!(renderer.frame_stats(), FrameStats { views: 2, objects: 6, meshes: 6 });
    renderer.end_frame();

    assert_eq!(renderer.frame_stats(), FrameStats::default());
    assert_eq!(renderer.last_frame_stats(), FrameStats { views: 2, objects: 6, meshes: 6 });
    assert!(renderer.views().is_empty());
    assert_eq!(renderer.frame_index(), 1);
    assert_eq!(renderer.state(), FrameState::Idle);

    let drawn = renderer.backend().last_frame().expect("one frame drawn");
    assert_eq!(drawn.len(), 2);
    assert!(drawn.iter().all(|view| view.camera.is_some() && view.objects == 3));
}

#[test]
fn test_meshes_are_routed_by_shader_queue() {
    let mut renderer = system();
    let lit = renderer.shaders_mut().insert(Shader::new("lit", RenderQueue::Geometry, 1));
    let glass = renderer.shaders_mut().insert(Shader::new("glass", RenderQueue::Transparent, 2));
    let sky = renderer.shaders_mut().insert(Shader::new("sky", RenderQueue::Background, 3));

    let mut scene = Scene::new();
    add_camera(&mut scene);
    let model = Rc::new(Model::new(
        "mixed",
        vec![
            Mesh::new(&triangle(), Vec::new()).with_shader(Rc::clone(&glass)),
            Mesh::new(&triangle(), Vec::new()).with_shader(Rc::clone(&lit)),
            Mesh::new(&triangle(), Vec::new()).with_shader(Rc::clone(&sky)),
            Mesh::new(&triangle(), Vec::new()).with_shader(Rc::clone(&lit)),
        ],
    ));
    add_model(&mut scene, None, &model);

    renderer.begin_frame();
    renderer.render_scene(&mut scene);
    renderer.end_frame();

    let view = &renderer.backend().last_frame().expect("drawn")[0];
    assert_eq!(view.queue(RenderQueue::Background), ["sky"]);
    assert_eq!(view.queue(RenderQueue::Geometry), ["lit", "lit"]);
    assert_eq!(view.queue(RenderQueue::Transparent), ["glass"]);
    assert!(view.queue(RenderQueue::Overlay).is_empty());
}

#[test]
fn test_mesh_without_shader_uses_registered_default() {
    let mut renderer = system();
    renderer.shaders_mut().insert(Shader::new("default", RenderQueue::Overlay, 7));

    renderer.begin_frame();
    renderer.render_mesh(&Mesh::new(&ui_quad(), vec![0, 1, 2, 2, 3, 0]), true);
    renderer.end_frame();

    let view = &renderer.backend().last_frame().expect("drawn")[0];
    assert_eq!(view.queue(RenderQueue::Overlay), ["default"]);
}

#[test]
fn test_missing_default_shader_falls_back_to_geometry_queue() {
    let mut renderer = system();

    renderer.begin_frame();
    renderer.render_mesh(&Mesh::new(&ui_quad(), Vec::new()), true);
    renderer.end_frame();

    let view = &renderer.backend().last_frame().expect("drawn")[0];
    assert_eq!(view.queue(RenderQueue::Geometry), ["default"]);
}

#[test]
fn test_hidden_subtree_is_not_drawn() {
    let mut renderer = system();
    let mut scene = Scene::new();
    add_camera(&mut scene);
    let model = Rc::new(Model::new("tri", vec![Mesh::new(&triangle(), Vec::new())]));
    let shown = add_model(&mut scene, None, &model);
    let hidden = add_model(&mut scene, None, &model);
    let hidden_child = add_model(&mut scene, Some(hidden), &model);
    add_model(&mut scene, Some(shown), &model);
    scene.set_visible(hidden, false);

    renderer.begin_frame();
    renderer.render_scene(&mut scene);
    let sources: Vec<_> = renderer.views()[0].objects().iter().filter_map(|object| object.source).collect();
    renderer.end_frame();

    assert_eq!(sources.len(), 2);
    assert!(!sources.contains(&hidden));
    assert!(!sources.contains(&hidden_child));
}

#[test]
fn test_sprites_and_emitting_emitters_are_drawn() {
    let mut renderer = system();
    let particles = renderer.shaders_mut().insert(Shader::new("particles", RenderQueue::Transparent, 4));
    let mut scene = Scene::new();
    add_camera(&mut scene);

    let sprite = Rc::new(Sprite::new("marker", Mesh::new(&ui_quad(), vec![0, 1, 2, 2, 3, 0])));
    let marker = scene.create_object(None);
    scene.object_mut(marker).expect("live").set_sprite(Some(sprite));

    let quad = [ParticleVertex { position: [0.0; 3], color: [255; 4], uv: [0.0, 0.0], size: 1.0 }; 4];
    let smoke = scene.create_object(None);
    scene
        .object_mut(smoke)
        .expect("live")
        .set_emitter(Some(Emitter::new(Mesh::new(&quad, Vec::new()).with_shader(particles))));

    renderer.begin_frame();
    renderer.render_scene(&mut scene);
    renderer.end_frame();
    let view = &renderer.backend().last_frame().expect("drawn")[0];
    assert_eq!(view.objects, 2);
    assert_eq!(view.queue(RenderQueue::Transparent), ["particles"]);
    assert_eq!(view.mesh_count(), 2);

    scene.object_mut(smoke).and_then(|object| object.emitter_mut()).expect("emitter").set_emitting(false);
    renderer.begin_frame();
    renderer.render_scene(&mut scene);
    renderer.end_frame();
    let view = &renderer.backend().last_frame().expect("drawn")[0];
    assert!(view.queue(RenderQueue::Transparent).is_empty());
    assert_eq!(view.mesh_count(), 1);
}

#[test]
fn test_render_objects_snapshot_world_and_mvp() {
    let mut renderer = system();
    let mut scene = Scene::new();
    let eye = add_camera(&mut scene);
    let model = Rc::new(Model::new("tri", vec![Mesh::new(&triangle(), Vec::new())]));
    let parent = scene.create_object(None);
    let child = add_model(&mut scene, Some(parent), &model);
    scene.set_local_position(parent, Vec3::new(0.0, 0.0, 5.0));
    scene.set_local_position(child, Vec3::new(1.0, 0.0, 0.0));

    renderer.begin_frame();
    renderer.render_scene(&mut scene);

    let view = &renderer.views()[0];
    let object = &view.objects()[0];
    let world = scene.transform(child).expect("live");
    let view_projection = scene.camera_view_projection(eye).expect("camera");
    assert_eq!(object.source, Some(child));
    assert_eq!(object.world, world);
    approx::assert_relative_eq!(object.mvp, view_projection * world, epsilon = 1e-5);
    assert_eq!(view.queue(RenderQueue::Geometry)[0].object, 0);
    renderer.end_frame();
}

#[test]
fn test_utility_mesh_joins_every_camera_view() {
    let mut renderer = system();
    let mut scene = Scene::new();
    add_camera(&mut scene);
    add_camera(&mut scene);
    let line = Mesh::new(&[DebugVertex { position: [0.0; 3], color: [255; 4] }; 2], Vec::new())
        .with_primitive(Primitive::Lines);

    renderer.begin_frame();
    renderer.render_scene(&mut scene);
    renderer.render_mesh(&line, false);
    renderer.end_frame();

    let drawn = renderer.backend().last_frame().expect("drawn");
    assert_eq!(drawn.len(), 2);
    assert!(drawn.iter().all(|view| view.mesh_count() == 1 && view.objects == 1));
}

#[test]
fn test_ui_meshes_share_one_virtual_view() {
    let mut renderer = system();
    let mut scene = Scene::new();
    add_camera(&mut scene);

    renderer.begin_frame();
    renderer.render_scene(&mut scene);
    renderer.render_mesh(&Mesh::new(&ui_quad(), Vec::new()), true);
    renderer.render_mesh(&Mesh::new(&ui_quad(), Vec::new()), true);
    renderer.end_frame();

    let drawn = renderer.backend().last_frame().expect("drawn");
    assert_eq!(drawn.len(), 2);
    let ui = drawn.iter().find(|view| view.camera.is_none()).expect("ui view");
    assert_eq!(ui.objects, 1);
    assert_eq!(ui.mesh_count(), 2);
    assert_eq!(drawn.iter().filter(|view| view.camera.is_some()).map(DrawnView::mesh_count).sum::<usize>(), 0);
}

#[test]
fn test_shared_mesh_is_uploaded_once() {
    let mut renderer = system();
    let mut scene = Scene::new();
    add_camera(&mut scene);
    let model = Rc::new(Model::new("tri", vec![Mesh::new(&triangle(), vec![0, 1, 2])]));
    add_model(&mut scene, None, &model);
    add_model(&mut scene, None, &model);

    for _ in 0..3 {
        renderer.begin_frame();
        renderer.render_scene(&mut scene);
        renderer.end_frame();
    }

    // One vertex buffer and one index buffer, uploaded in the first frame only
    assert_eq!(uploads_with_data(renderer.backend()), 2);
    assert_eq!(renderer.vertex_buffers().active_count(), 2);
}

#[test]
fn test_idle_legacy_buffers_are_reclaimed_after_lifetime() {
    let mut renderer = system();
    let mesh = Mesh::new(&ui_quad(), Vec::new());

    renderer.begin_frame();
    renderer.render_mesh(&mesh, true);
    renderer.end_frame();
    assert!(renderer.vertex_buffers().resolve(mesh.legacy_vertex_slot()).is_some());

    // Frames 1 and 2 do not draw the mesh; its buffer is kept
    for _ in 0..2 {
        renderer.begin_frame();
        renderer.end_frame();
    }
    assert!(renderer.vertex_buffers().resolve(mesh.legacy_vertex_slot()).is_some());

    renderer.begin_frame();
    renderer.end_frame();
    assert!(renderer.vertex_buffers().resolve(mesh.legacy_vertex_slot()).is_none());
    assert!(mesh.legacy_vertex_slot().get().is_none());
    assert_eq!(renderer.vertex_buffers().active_count(), 0);

    // Drawing again allocates from the free pool
    let generated_before = renderer.backend().live_buffer_count();
    renderer.begin_frame();
    renderer.render_mesh(&mesh, true);
    renderer.end_frame();
    assert!(mesh.legacy_vertex_slot().get().is_some());
    assert_eq!(renderer.backend().live_buffer_count(), generated_before);
}

#[test]
fn test_dirty_legacy_mesh_is_reuploaded() {
    let mut renderer = system();
    let mut mesh = Mesh::new(&ui_quad(), Vec::new());

    renderer.begin_frame();
    renderer.render_mesh(&mesh, true);
    renderer.end_frame();

    let mut moved = ui_quad();
    moved[0].position = [5.0, 5.0];
    mesh.set_vertices(&moved);
    renderer.backend_mut().clear_calls();

    renderer.begin_frame();
    renderer.render_mesh(&mesh, true);
    renderer.end_frame();

    assert!(!mesh.is_vertex_data_dirty());
    assert_eq!(uploads_with_data(renderer.backend()), 1);
    let gpu = renderer.vertex_buffers().resolve(mesh.legacy_vertex_slot()).expect("owned");
    assert_eq!(renderer.backend().buffer_data(gpu), Some(bytemuck::cast_slice::<UiVertex, u8>(&moved)));
}

#[test]
fn test_debug_lines_upload_only_drawn_prefix() {
    let mut renderer = system();
    let mut lines = Mesh::new(&[DebugVertex { position: [0.0; 3], color: [0; 4] }; 64], Vec::new())
        .with_primitive(Primitive::Lines)
        .dynamic();
    assert!(renderer.upload_to_class(&lines, BufferClass::DebugLines));
    let mut scene = Scene::new();
    add_camera(&mut scene);

    lines.vertices_mut()[0] = 1;
    lines.set_draw_count(Some(4));
    renderer.backend_mut().clear_calls();

    renderer.begin_frame();
    renderer.render_scene(&mut scene);
    renderer.render_mesh(&lines, false);
    renderer.end_frame();

    assert!(matches!(renderer.backend().calls(), [BufferCall::Update { size: 64, is_index: false, .. }]));
    assert!(!lines.is_vertex_data_dirty());
}

#[test]
fn test_dirty_cached_mesh_rewrites_its_range() {
    let mut renderer = system();
    let mut quad = Mesh::new(&triangle(), vec![0, 1, 2]).dynamic();
    assert!(renderer.upload_to_class(&quad, BufferClass::DynamicGeometry));
    let (vertices, indices) = quad.buffer_handles().expect("uploaded");
    assert!(indices.is_some());

    quad.vertices_mut()[0] = 9;
    renderer.backend_mut().clear_calls();
    renderer.begin_frame();
    renderer.render_mesh(&quad, true);
    renderer.end_frame();

    assert!(matches!(
        renderer.backend().calls(),
        [BufferCall::Update { offset, size, .. }] if *offset == vertices.offset() as usize && *size == vertices.size() as usize
    ));
}

#[test]
fn test_replaced_indices_reach_the_legacy_buffer() {
    let mut renderer = system();
    let mut mesh = Mesh::new(&triangle(), vec![0, 1, 2]);

    renderer.begin_frame();
    renderer.render_mesh(&mesh, true);
    renderer.end_frame();

    let indices = vec![0, 1, 2, 2, 1, 0];
    mesh.set_indices(indices.clone());
    renderer.begin_frame();
    renderer.render_mesh(&mesh, true);
    assert_eq!(renderer.views()[0].queue(RenderQueue::Geometry)[0].index_count, 6);
    renderer.end_frame();

    assert!(!mesh.is_index_data_dirty());
    let gpu = renderer.vertex_buffers().resolve(mesh.legacy_index_slot()).expect("owned");
    assert_eq!(renderer.backend().buffer_data(gpu), Some(bytemuck::cast_slice::<u32, u8>(&indices)));
}

#[test]
fn test_grown_indices_move_to_a_new_cached_range() {
    let mut renderer = system();
    let mut mesh = Mesh::new(&triangle(), vec![0, 1, 2]).dynamic();
    assert!(renderer.upload_to_class(&mesh, BufferClass::DynamicGeometry));
    let (vertices, old_indices) = mesh.buffer_handles().expect("uploaded");
    assert_eq!(old_indices.map(|handle| handle.size()), Some(12));

    let grown = vec![0, 1, 2, 2, 1, 0];
    mesh.set_indices(grown.clone());
    renderer.begin_frame();
    renderer.render_mesh(&mesh, true);
    renderer.end_frame();

    let (same_vertices, indices) = mesh.buffer_handles().expect("uploaded");
    let indices = indices.expect("indexed");
    assert_eq!(same_vertices, vertices);
    assert_eq!((indices.offset(), indices.size()), (12, 24));
    assert!(!mesh.is_index_data_dirty());

    let gpu = renderer.buffer_cache().gpu_buffer(BufferClass::DynamicGeometry, BufferKind::Index).expect("live");
    let stored = renderer.backend().buffer_data(gpu).expect("live buffer");
    assert_eq!(&stored[12..36], bytemuck::cast_slice::<u32, u8>(&grown));

    // Shrinking again rewrites the current range in place
    mesh.set_indices(vec![2, 1, 0]);
    renderer.backend_mut().clear_calls();
    renderer.begin_frame();
    renderer.render_mesh(&mesh, true);
    renderer.end_frame();
    assert!(matches!(
        renderer.backend().calls(),
        [BufferCall::Update { offset: 12, size: 12, is_index: true, .. }]
    ));
}

#[test]
fn test_shrunk_cached_vertices_rewrite_a_prefix() {
    let mut renderer = system();
    let mut mesh = Mesh::new(&triangle(), Vec::new()).dynamic();
    assert!(renderer.upload_to_class(&mesh, BufferClass::DynamicGeometry));
    let (vertices, _) = mesh.buffer_handles().expect("uploaded");

    mesh.set_vertices(&triangle()[..2]);
    renderer.backend_mut().clear_calls();
    renderer.begin_frame();
    renderer.render_mesh(&mesh, true);
    assert_eq!(renderer.views()[0].queue(RenderQueue::Geometry)[0].vertex_count, 2);
    renderer.end_frame();

    assert!(!mesh.is_vertex_data_dirty());
    assert_eq!(mesh.buffer_handles().map(|(handle, _)| handle), Some(vertices));
    assert!(matches!(
        renderer.backend().calls(),
        [BufferCall::Update { offset: 0, size: 64, is_index: false, .. }]
    ));
}

#[test]
fn test_vertices_outgrowing_a_full_class_stay_dirty() {
    let config = RenderConfig::default().with_buffer_class(BufferClass::DynamicGeometry, BufferClassConfig::new(4, 16));
    let mut renderer = RenderSystem::new(HeadlessBackend::new(), FixedPlatform::new(800, 600), config)
        .expect("valid config");
    let mut mesh = Mesh::new(&triangle(), Vec::new()).dynamic();
    assert!(renderer.upload_to_class(&mesh, BufferClass::DynamicGeometry));

    let mut grown = triangle();
    grown.push(grown[0]);
    mesh.set_vertices(&grown);
    renderer.backend_mut().clear_calls();
    renderer.begin_frame();
    renderer.render_mesh(&mesh, true);
    assert_eq!(renderer.frame_stats().meshes, 0);
    renderer.end_frame();

    assert!(mesh.is_vertex_data_dirty());
    assert!(renderer.backend().calls().is_empty());
    assert_eq!(mesh.buffer_handles().map(|(handle, _)| handle.size()), Some(96));
}

#[test]
fn test_default_shader_registered_after_first_frame_is_used() {
    let mut renderer = system();
    let mesh = Mesh::new(&ui_quad(), Vec::new());

    renderer.begin_frame();
    renderer.render_mesh(&mesh, true);
    renderer.end_frame();
    let view = &renderer.backend().last_frame().expect("drawn")[0];
    assert_eq!(view.queue(RenderQueue::Geometry), ["default"]);

    renderer.shaders_mut().insert(Shader::new("default", RenderQueue::Overlay, 7));
    renderer.begin_frame();
    renderer.render_mesh(&mesh, true);
    renderer.end_frame();
    let view = &renderer.backend().last_frame().expect("drawn")[0];
    assert!(view.queue(RenderQueue::Geometry).is_empty());
    assert_eq!(view.queue(RenderQueue::Overlay), ["default"]);
}

#[test]
fn test_ui_class_is_reset_every_frame() {
    let mut renderer = system();
    let quad = Mesh::new(&ui_quad(), vec![0, 1, 2, 2, 3, 0]);

    renderer.begin_frame();
    assert!(renderer.upload_to_class(&quad, BufferClass::Ui));
    renderer.render_mesh(&quad, true);
    let usage = renderer.buffer_cache().usage(BufferClass::Ui);
    assert_eq!(usage.vertex_used, 80);
    assert_eq!(usage.index_used, 24);
    renderer.end_frame();

    let usage = renderer.buffer_cache().usage(BufferClass::Ui);
    assert_eq!((usage.vertex_used, usage.index_used), (0, 0));
}

#[test]
fn test_calls_outside_a_frame_are_ignored() {
    let mut renderer = system();
    let mut scene = Scene::new();
    add_camera(&mut scene);

    renderer.render_scene(&mut scene);
    renderer.render_mesh(&Mesh::new(&ui_quad(), Vec::new()), true);
    renderer.end_frame();
    assert!(renderer.backend().frames().is_empty());
    assert_eq!(renderer.frame_stats(), FrameStats::default());

    renderer.begin_frame();
    renderer.begin_frame();
    assert_eq!(renderer.state(), FrameState::InProgress);
    renderer.end_frame();
    assert_eq!(renderer.frame_index(), 1);
}

#[test]
fn test_stale_scene_objects_are_skipped() {
    let mut renderer = system();
    let mut scene = Scene::new();
    add_camera(&mut scene);
    let model = Rc::new(Model::new("tri", vec![Mesh::new(&triangle(), Vec::new())]));
    let doomed = add_model(&mut scene, None, &model);
    add_model(&mut scene, Some(doomed), &model);
    scene.destroy_object(doomed);

    renderer.begin_frame();
    renderer.render_scene(&mut scene);
    assert_eq!(renderer.frame_stats().objects, 0);
    renderer.end_frame();
}

#[test]
fn test_shutdown_releases_every_buffer() {
    let mut renderer = system();
    let mesh = Mesh::new(&triangle(), vec![0, 1, 2]);
    renderer.begin_frame();
    renderer.render_mesh(&mesh, true);
    renderer.end_frame();
    assert!(renderer.backend().live_buffer_count() > 0);

    renderer.shutdown();

    assert_eq!(renderer.state(), FrameState::Shutdown);
    assert_eq!(renderer.backend().live_buffer_count(), 0);
    renderer.begin_frame();
    assert_eq!(renderer.state(), FrameState::Shutdown);
}
