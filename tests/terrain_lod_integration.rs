use glam::Vec3;
use strata_engine::demo;
use strata_engine::gpu::PipelineKind;
use strata_engine::terrain::{Terrain, TerrainSettings, TerrainTile};
use strata_engine::{Camera, CameraSettings, EngineConfig, FrameScheduler, RecordingBackend};

fn covers(parent: &TerrainTile, child: &TerrainTile) -> bool {
    if child.lod <= parent.lod {
        return false;
    }
    let shift = child.lod - parent.lod;
    child.tile_x >> shift == parent.tile_x && child.tile_z >> shift == parent.tile_z
}

fn view_proj(camera: &Camera) -> glam::Mat4 {
    camera.projection_matrix() * camera.view_matrix()
}

#[test]
fn test_selection_never_overlaps_along_a_flight_path() {
    let settings = CameraSettings::default();
    let mut terrain = Terrain::build_quadtree(TerrainSettings::default());
    let mut camera = Camera::new(&settings, 800, 600);

    for step in 0..40 {
        camera.position = Vec3::new(-80.0 + step as f32 * 4.0, 35.0, -80.0 + step as f32 * 4.0);
        camera.yaw = std::f32::consts::FRAC_PI_4;
        camera.pitch = -0.4;
        let tiles = terrain.update(view_proj(&camera), camera.position).to_vec();

        assert!(tiles.len() <= strata_engine::terrain::MAX_VISIBLE_TILES);
        for a in &tiles {
            for b in &tiles {
                assert!(!covers(a, b), "tile {:?} drawn together with its descendant {:?}", a, b);
            }
        }
    }
}

#[test]
fn test_camera_looking_away_selects_nothing() {
    let settings = CameraSettings::default();
    let mut terrain = Terrain::build_quadtree(TerrainSettings::default());
    let mut camera = Camera::new(&settings, 800, 600);
    camera.position = Vec3::new(0.0, 500.0, 0.0);
    camera.pitch = 1.2;

    let tiles = terrain.update(view_proj(&camera), camera.position);
    assert!(tiles.is_empty());
}

#[test]
fn test_geometry_pass_draws_no_tiles_when_terrain_is_culled() {
    let config = EngineConfig::default();
    let mut backend = RecordingBackend::new(640, 480);
    let (assets, mut ctx) = demo::build_scene(&config, 640, 480).unwrap();
    let mut scheduler = FrameScheduler::new(&mut backend, &assets, &ctx, 1024).unwrap();

    ctx.camera.position = Vec3::new(0.0, 500.0, 0.0);
    ctx.camera.pitch = 1.2;
    scheduler.render_frame(&mut ctx, &mut backend).unwrap();

    let list = backend.last_submission().unwrap().to_list();
    assert!(list.draws_with(PipelineKind::TerrainGeometry).is_empty());
    assert_eq!(list.draws_with(PipelineKind::Geometry).len(), ctx.items.len());
}

#[test]
fn test_moving_closer_refines_the_selection() {
    let settings = CameraSettings::default();
    let mut terrain = Terrain::build_quadtree(TerrainSettings::default());
    let mut camera = Camera::new(&settings, 800, 600);
    camera.yaw = std::f32::consts::FRAC_PI_2;
    camera.pitch = -0.6;

    camera.position = Vec3::new(0.0, 150.0, -250.0);
    let far: Vec<u32> = terrain
        .update(view_proj(&camera), camera.position)
        .iter()
        .map(|t| t.lod)
        .collect();
    assert_eq!(far, vec![0]);

    camera.position = Vec3::new(0.0, 30.0, -25.0);
    let near_max_lod = terrain
        .update(view_proj(&camera), camera.position)
        .iter()
        .map(|t| t.lod)
        .max();
    assert_eq!(near_max_lod, Some(2));
}
