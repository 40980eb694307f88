use strata_engine::demo;
use strata_engine::gpu::{
    Command, ConstantBuffer, DrawKind, GBufferTarget, LutKind, PipelineKind, ResourceState, ViewKey,
};
use glam::Vec3;
use strata_engine::renderer::{FrameTime, SceneAssets};
use strata_engine::scene::{
    shapes, Light, LightSet, Material, MaterialLibrary, MeshData, RenderItem, RenderItemRegistry, TextureData,
};
use strata_engine::{Camera, EngineConfig, FrameContext, FrameOutcome, FrameScheduler, RecordingBackend, Tunables};

fn setup(config: &EngineConfig) -> (RecordingBackend, FrameScheduler, FrameContext) {
    let mut backend = RecordingBackend::new(640, 480);
    let (assets, ctx): (SceneAssets, FrameContext) = demo::build_scene(config, 640, 480).unwrap();
    let scheduler = FrameScheduler::new(&mut backend, &assets, &ctx, config.shadows.map_size).unwrap();
    (backend, scheduler, ctx)
}

fn pipeline_order(commands: &[Command]) -> Vec<PipelineKind> {
    let mut order: Vec<PipelineKind> = Vec::new();
    for command in commands {
        if let Command::SetPipeline(kind) = command {
            if order.last() != Some(kind) {
                order.push(*kind);
            }
        }
    }
    order
}

/// One shadow-casting sun over two boxes, no terrain
fn sun_and_two_boxes(config: &EngineConfig) -> (SceneAssets, FrameContext) {
    let mut assets = SceneAssets::default();
    let texture = assets
        .textures
        .add(TextureData::checker("checker", 64, 8, [255, 255, 255, 255], [0, 0, 0, 255]))
        .unwrap();
    let mesh = assets.meshes.add(MeshData::from_parts(
        "box",
        vec![("box".to_string(), shapes::cube(1.0, 1.0, 1.0))],
    ));
    let submesh = assets.meshes.submesh(mesh, "box").unwrap();

    let mut materials = MaterialLibrary::new();
    let stone = materials.add(Material::new("stone", texture), &assets.textures);
    let mut items = RenderItemRegistry::new();
    for (name, x) in [("left", -2.0), ("right", 2.0)] {
        items.add(RenderItem::new(name, mesh, submesh, stone).with_transform(
            Vec3::new(x, 0.5, 0.0),
            Vec3::ZERO,
            Vec3::ONE,
        ));
    }
    let lights = LightSet::new(vec![Light::directional(
        "sun",
        Vec3::new(0.0, 100.0, -100.0),
        Vec3::new(0.0, -1.0, 1.0),
        Vec3::ONE,
    )]);

    let ctx = FrameContext {
        camera: Camera::new(&config.camera, 640, 480),
        tunables: Tunables::default(),
        items,
        lights,
        materials,
        terrain: None,
        time: FrameTime::default(),
    };
    (assets, ctx)
}

#[test]
fn test_single_caster_frame_end_to_end() {
    let config = EngineConfig::default();
    let (assets, mut ctx) = sun_and_two_boxes(&config);
    let mut backend = RecordingBackend::new(640, 480);
    let mut scheduler = FrameScheduler::new(&mut backend, &assets, &ctx, 1024).unwrap();
    scheduler.render_frame(&mut ctx, &mut backend).unwrap();

    let sun = &ctx.lights.lights()[0];
    let shadow_map = scheduler.targets().shadow_maps[0];
    let list = backend.last_submission().unwrap().to_list();

    let shadow = list.draws_with(PipelineKind::Shadow);
    assert_eq!(shadow.len(), 2);
    for draw in &shadow {
        assert_eq!(draw.constant(ConstantBuffer::ShadowTransform), Some(sun.cb_index));
        assert!(draw.color_targets.is_empty());
        assert_eq!(draw.depth_target, Some(shadow_map));
    }

    let geometry = list.draws_with(PipelineKind::Geometry);
    assert_eq!(geometry.len(), 2);
    for draw in &geometry {
        assert_eq!(draw.color_targets, scheduler.targets().gbuffer.to_vec());
        assert_eq!(draw.depth_target, Some(scheduler.targets().depth));
    }
    let objects: Vec<_> = geometry.iter().map(|d| d.constant(ConstantBuffer::Object)).collect();
    assert_eq!(objects, vec![Some(0), Some(1)]);

    let lighting = list.draws_with(PipelineKind::Lighting);
    assert_eq!(lighting.len(), 1);
    assert!(lighting[0].reads_view(ViewKey::ShadowMap(0)));
    assert_eq!(lighting[0].color_targets, vec![scheduler.targets().scene_color]);

    assert_eq!(
        scheduler.pool().state(shadow_map).unwrap(),
        ResourceState::PixelShaderRead
    );
    assert_eq!(backend.presents(), 1);
}

#[test]
fn test_passes_run_in_frame_graph_order() {
    let config = EngineConfig::default();
    let (mut backend, mut scheduler, mut ctx) = setup(&config);

    let outcome = scheduler.render_frame(&mut ctx, &mut backend).unwrap();
    assert_eq!(outcome, FrameOutcome::Rendered { slot: 0, fence: 1 });

    let submission = backend.last_submission().unwrap();
    let order = pipeline_order(&submission.commands);
    assert_eq!(
        order,
        vec![
            PipelineKind::Shadow,
            PipelineKind::Geometry,
            PipelineKind::TerrainGeometry,
            PipelineKind::Lighting,
            PipelineKind::Taa,
            PipelineKind::Post,
        ]
    );

    let ui_at = submission
        .commands
        .iter()
        .position(|c| *c == Command::DrawUi)
        .expect("frame should composite the overlay");
    let last_fullscreen = submission
        .commands
        .iter()
        .rposition(|c| *c == Command::DrawFullscreen)
        .unwrap();
    assert!(ui_at > last_fullscreen);
}

#[test]
fn test_draw_counts_follow_scene() {
    let config = EngineConfig::default();
    let (mut backend, mut scheduler, mut ctx) = setup(&config);
    scheduler.render_frame(&mut ctx, &mut backend).unwrap();

    let list = backend.last_submission().unwrap().to_list();
    let casters = ctx.lights.shadow_casters().count();
    assert_eq!(casters, 2);
    assert_eq!(list.draws_with(PipelineKind::Shadow).len(), casters * ctx.items.len());
    assert_eq!(list.draws_with(PipelineKind::Geometry).len(), ctx.items.len());

    let tiles = ctx.terrain.as_ref().unwrap().terrain.visible_tiles().len();
    assert!(tiles > 0, "default camera should see some terrain");
    assert_eq!(list.draws_with(PipelineKind::TerrainGeometry).len(), tiles);

    let lighting = list.draws_with(PipelineKind::Lighting);
    assert_eq!(lighting.len(), ctx.lights.len());
    assert!(lighting.iter().all(|d| d.kind == DrawKind::Fullscreen));
}

#[test]
fn test_terrain_tiles_use_objects_after_items() {
    let config = EngineConfig::default();
    let (mut backend, mut scheduler, mut ctx) = setup(&config);
    scheduler.render_frame(&mut ctx, &mut backend).unwrap();

    let list = backend.last_submission().unwrap().to_list();
    let base = ctx.items.len() as u32;
    for (i, draw) in list.draws_with(PipelineKind::TerrainGeometry).iter().enumerate() {
        assert_eq!(draw.constant(ConstantBuffer::Object), Some(base + i as u32));
        assert!(draw.views.values().flatten().any(|v| matches!(v, ViewKey::Heightmap(_))));
    }
}

#[test]
fn test_lighting_reads_shadow_maps_of_casters_only() {
    let config = EngineConfig::default();
    let (mut backend, mut scheduler, mut ctx) = setup(&config);
    scheduler.render_frame(&mut ctx, &mut backend).unwrap();

    let list = backend.last_submission().unwrap().to_list();
    let lighting = list.draws_with(PipelineKind::Lighting);
    for (light, draw) in ctx.lights.lights().iter().zip(&lighting) {
        assert!(draw.reads_view(ViewKey::GBuffer(GBufferTarget::Albedo)));
        match light.shadow() {
            Some(slot) if light.casts_shadows => assert!(draw.reads_view(ViewKey::ShadowMap(slot.0))),
            _ => assert!(draw.reads_view(ViewKey::NullShadow)),
        }
    }
}

#[test]
fn test_back_buffer_ends_in_present() {
    let config = EngineConfig::default();
    let (mut backend, mut scheduler, mut ctx) = setup(&config);
    for _ in 0..3 {
        scheduler.render_frame(&mut ctx, &mut backend).unwrap();
    }

    let back_buffer = scheduler.targets().back_buffer;
    assert_eq!(scheduler.pool().state(back_buffer).unwrap(), ResourceState::Present);

    let last_barrier = backend
        .last_submission()
        .unwrap()
        .commands
        .iter()
        .rev()
        .find_map(|c| match c {
            Command::Barrier { resource, after, .. } => Some((*resource, *after)),
            _ => None,
        });
    assert_eq!(last_barrier, Some((back_buffer, ResourceState::Present)));
    assert_eq!(backend.presents(), 3);
}

#[test]
fn test_every_barrier_matches_tracked_state() {
    let config = EngineConfig::default();
    let (mut backend, mut scheduler, mut ctx) = setup(&config);
    for _ in 0..2 {
        scheduler.render_frame(&mut ctx, &mut backend).unwrap();
    }

    for submission in backend.submissions() {
        for command in &submission.commands {
            if let Command::Barrier { before, after, .. } = command {
                assert_ne!(before, after, "no-op barrier recorded");
            }
        }
    }
}

#[test]
fn test_post_reads_resolved_history_when_taa_enabled() {
    let config = EngineConfig::default();
    let (mut backend, mut scheduler, mut ctx) = setup(&config);
    scheduler.render_frame(&mut ctx, &mut backend).unwrap();

    assert!(scheduler.targets().history_valid());
    let read = scheduler.targets().history_read() as u8;
    let list = backend.last_submission().unwrap().to_list();
    let post = list.draws_with(PipelineKind::Post);
    assert!(post[0].reads_view(ViewKey::TaaHistory(read)));
    assert!(post[0].reads_view(ViewKey::Lut(LutKind::Effect)));

    scheduler.render_frame(&mut ctx, &mut backend).unwrap();
    assert_ne!(scheduler.targets().history_read() as u8, read, "history should ping-pong");
}

#[test]
fn test_post_reads_scene_color_without_taa() {
    let mut config = EngineConfig::default();
    config.tunables.taa_enabled = false;
    config.tunables.color_correction = false;
    let (mut backend, mut scheduler, mut ctx) = setup(&config);
    scheduler.render_frame(&mut ctx, &mut backend).unwrap();

    assert!(!scheduler.targets().history_valid());
    let list = backend.last_submission().unwrap().to_list();
    assert!(list.draws_with(PipelineKind::Taa).is_empty());
    let post = list.draws_with(PipelineKind::Post);
    assert!(post[0].reads_view(ViewKey::SceneColor));
    assert!(post[0].reads_view(ViewKey::Lut(LutKind::Neutral)));
}

#[test]
fn test_disabling_taa_mid_run_invalidates_history() {
    let config = EngineConfig::default();
    let (mut backend, mut scheduler, mut ctx) = setup(&config);
    scheduler.render_frame(&mut ctx, &mut backend).unwrap();
    assert!(scheduler.targets().history_valid());

    ctx.tunables.taa_enabled = false;
    scheduler.render_frame(&mut ctx, &mut backend).unwrap();
    assert!(!scheduler.targets().history_valid());
    let list = backend.last_submission().unwrap().to_list();
    assert!(list.draws_with(PipelineKind::Post)[0].reads_view(ViewKey::SceneColor));
}

#[test]
fn test_scene_without_terrain_skips_terrain_pipeline() {
    let mut config = EngineConfig::default();
    config.terrain.enabled = false;
    let (mut backend, mut scheduler, mut ctx) = setup(&config);
    scheduler.render_frame(&mut ctx, &mut backend).unwrap();

    let order = pipeline_order(&backend.last_submission().unwrap().commands);
    assert!(!order.contains(&PipelineKind::TerrainGeometry));
}

#[test]
fn test_resize_rebuilds_views_and_resets_temporal_state() {
    let config = EngineConfig::default();
    let (mut backend, mut scheduler, mut ctx) = setup(&config);
    for _ in 0..3 {
        scheduler.render_frame(&mut ctx, &mut backend).unwrap();
    }
    assert_eq!(scheduler.jitter_index(), 3);
    let generation = backend.table_generation();

    scheduler.resize(&mut ctx, &mut backend, 1024, 768).unwrap();
    assert!(backend.table_generation() > generation);
    assert_eq!(scheduler.jitter_index(), 0);
    assert!(!scheduler.targets().history_valid());
    assert_eq!(scheduler.targets().size(), (1024, 768));
    let scene_color = backend.resource(scheduler.targets().scene_color).unwrap();
    assert_eq!((scene_color.width, scene_color.height), (1024, 768));

    scheduler.render_frame(&mut ctx, &mut backend).unwrap();
    assert_eq!(scheduler.jitter_index(), 1);
}

#[test]
fn test_zero_sized_resize_is_ignored() {
    let config = EngineConfig::default();
    let (mut backend, mut scheduler, mut ctx) = setup(&config);
    let generation = backend.table_generation();
    scheduler.resize(&mut ctx, &mut backend, 0, 480).unwrap();
    assert_eq!(backend.table_generation(), generation);
    assert_eq!(scheduler.targets().size(), (640, 480));
}

#[test]
fn test_missing_back_buffer_skips_frame() {
    let config = EngineConfig::default();
    let (mut backend, mut scheduler, mut ctx) = setup(&config);
    backend.skip_next_frames(1);

    let outcome = scheduler.render_frame(&mut ctx, &mut backend).unwrap();
    assert_eq!(outcome, FrameOutcome::Skipped);
    assert_eq!(scheduler.frames_skipped(), 1);
    assert!(backend.submissions().is_empty());
    assert_eq!(scheduler.fence(), 0);
    assert_eq!(scheduler.ring().frame_counter(), 0);
    assert_eq!(scheduler.jitter_index(), 0);

    let outcome = scheduler.render_frame(&mut ctx, &mut backend).unwrap();
    assert_eq!(outcome, FrameOutcome::Rendered { slot: 0, fence: 1 });
}

#[test]
fn test_device_loss_is_reported_once_and_rendering_continues() {
    let config = EngineConfig::default();
    let (mut backend, mut scheduler, mut ctx) = setup(&config);
    scheduler.render_frame(&mut ctx, &mut backend).unwrap();
    assert!(!scheduler.device_loss_reported());

    backend.simulate_device_loss("driver reset");
    scheduler.render_frame(&mut ctx, &mut backend).unwrap();
    assert!(scheduler.device_loss_reported());

    let outcome = scheduler.render_frame(&mut ctx, &mut backend).unwrap();
    assert!(matches!(outcome, FrameOutcome::Rendered { fence: 3, .. }));
}
