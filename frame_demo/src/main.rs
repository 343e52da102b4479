//! Headless frame loop demo
//!
//! Builds a small scene (camera, spinning model, light, UI overlay) and runs
//! a handful of frames through the render system without a window. Pass a
//! `.toml` or `.ron` render config path as the first argument to override the
//! defaults.

use std::rc::Rc;

use render_core::foundation::logging;
use render_core::foundation::math::{utils, Quat, Vec3};
use render_core::prelude::*;

const FRAMES: u32 = 8;

fn cube() -> Mesh {
    let corners = [
        [-0.5, -0.5, -0.5],
        [0.5, -0.5, -0.5],
        [0.5, 0.5, -0.5],
        [-0.5, 0.5, -0.5],
        [-0.5, -0.5, 0.5],
        [0.5, -0.5, 0.5],
        [0.5, 0.5, 0.5],
        [-0.5, 0.5, 0.5],
    ];
    let vertices: Vec<MeshVertex> = corners
        .iter()
        .map(|&position| MeshVertex { position, normal: position, uv: [0.0, 0.0] })
        .collect();
    let indices = vec![
        0, 2, 1, 0, 3, 2, // back
        4, 5, 6, 4, 6, 7, // front
        0, 1, 5, 0, 5, 4, // bottom
        3, 7, 6, 3, 6, 2, // top
        0, 4, 7, 0, 7, 3, // left
        1, 2, 6, 1, 6, 5, // right
    ];
    Mesh::new(&vertices, indices)
}

fn panel(width: f32, height: f32) -> Mesh {
    let vertices: Vec<UiVertex> = [[0.0, 0.0], [width, 0.0], [width, height], [0.0, height]]
        .into_iter()
        .map(|position| UiVertex { position, uv: [0.0, 0.0], color: [32, 32, 48, 200] })
        .collect();
    Mesh::new(&vertices, vec![0, 1, 2, 2, 3, 0])
}

fn load_config() -> Result<RenderConfig, ConfigError> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading render config from {}", path);
            RenderConfig::load_from_file(&path)
        }
        None => Ok(RenderConfig::default()),
    }
}

fn main() -> Result<(), RenderError> {
    logging::init();
    log::info!("Starting headless frame demo...");

    let config = load_config()?;
    let mut renderer = RenderSystem::new(HeadlessBackend::new(), FixedPlatform::new(800, 600), config)?;
    let lit = renderer.shaders_mut().insert(Shader::new("lit", RenderQueue::Geometry, 1));
    renderer.shaders_mut().insert(Shader::new("default", RenderQueue::Overlay, 2));

    let mut scene = Scene::new();
    let eye = scene.create_object(None);
    scene.attach_camera(eye, Camera::perspective(utils::deg_to_rad(60.0), 0.1, 100.0));
    scene.register_camera(eye);
    scene.set_local_position(eye, Vec3::new(0.0, 2.0, -6.0));
    scene.look_at(eye, Vec3::zeros(), Vec3::y());

    let sun = scene.create_object(None);
    scene.attach_light(sun, Light::new(LightKind::Directional).with_intensity(2.0));
    scene.register_light(sun);
    scene.look_at(sun, Vec3::new(0.0, -1.0, 1.0), Vec3::y());

    let model = Rc::new(Model::new("cube", vec![cube().with_shader(Rc::clone(&lit))]));
    let pivot = scene.create_object(None);
    let spinner = scene.create_object(Some(pivot));
    scene.set_local_position(spinner, Vec3::new(1.5, 0.0, 0.0));
    if let Some(object) = scene.object_mut(spinner) {
        object.set_model(Some(Rc::clone(&model)));
    }

    let hud = panel(200.0, 48.0);

    for frame in 0..FRAMES {
        let angle = utils::deg_to_rad(15.0 * frame as f32);
        scene.set_local_rotation(pivot, Quat::from_axis_angle(&Vec3::y_axis(), angle));

        renderer.begin_frame();
        renderer.render_scene(&mut scene);
        renderer.render_mesh(&hud, true);
        renderer.end_frame();

        let stats = renderer.last_frame_stats();
        log::info!(
            "Frame {}: {} views, {} objects, {} meshes",
            frame,
            stats.views,
            stats.objects,
            stats.meshes
        );
        if let Some(screen) = scene.position(spinner).and_then(|position| scene.world_to_screen(eye, position)) {
            log::debug!("Spinner on screen at ({:.1}, {:.1}), depth {:.2}", screen.x, screen.y, screen.z);
        }
    }

    if let Some(direction) = scene.light_direction(sun) {
        log::info!("Sun direction: {:?}", direction);
    }
    log::info!(
        "Legacy buffers: {} active, {} free; {} GPU buffers live",
        renderer.vertex_buffers().active_count(),
        renderer.vertex_buffers().free_count(),
        renderer.backend().live_buffer_count()
    );

    renderer.shutdown();
    log::info!("Frame demo finished");
    Ok(())
}
