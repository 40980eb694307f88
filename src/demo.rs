//! Procedural demo scene: lit boxes and spheres over a noise terrain

use crate::camera::Camera;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::renderer::{FrameContext, FrameTime, SceneAssets, TerrainLayer};
use crate::scene::{
    shapes, Light, LightSet, Material, MaterialLibrary, MeshData, RenderItem, RenderItemRegistry, TextureData,
};
use crate::terrain::{HeightmapGenerator, Terrain};
use glam::{Mat4, Vec3, Vec4};

const TERRAIN_SEED: u32 = 7;
const ANIMATED_LIGHT: &str = "red_point";

/// Build the assets and the frame context for the demo
pub fn build_scene(config: &EngineConfig, width: u32, height: u32) -> EngineResult<(SceneAssets, FrameContext)> {
    let mut assets = SceneAssets::default();

    let checker = assets.textures.add(TextureData::checker(
        "checker",
        256,
        8,
        [230, 230, 230, 255],
        [90, 90, 100, 255],
    ))?;
    let grass = assets.textures.add(TextureData::checker(
        "grass",
        128,
        16,
        [86, 125, 70, 255],
        [74, 110, 60, 255],
    ))?;

    let shapes_mesh = assets.meshes.add(MeshData::from_parts(
        "shapes",
        vec![
            ("box".to_string(), shapes::cube(1.0, 1.0, 1.0)),
            ("sphere".to_string(), shapes::sphere(0.5, 24, 16)),
        ],
    ));
    let box_submesh = assets.meshes.submesh(shapes_mesh, "box")?;
    let sphere_submesh = assets.meshes.submesh(shapes_mesh, "sphere")?;

    let mut materials = MaterialLibrary::new();
    let stone = materials.add(
        Material::new("stone", checker).with_surface(Vec3::splat(0.02), 0.8),
        &assets.textures,
    );
    let tile = materials.add(
        Material::new("tile", checker)
            .with_albedo(Vec4::new(0.9, 0.6, 0.4, 1.0))
            .with_surface(Vec3::splat(0.05), 0.3),
        &assets.textures,
    );
    let chrome = materials.add(
        Material::new("chrome", checker)
            .with_albedo(Vec4::new(0.8, 0.85, 0.9, 1.0))
            .with_surface(Vec3::splat(0.6), 0.1),
        &assets.textures,
    );
    let ground = materials.add(
        Material::new("terrain", grass).with_surface(Vec3::splat(0.01), 0.95),
        &assets.textures,
    );

    let generator = HeightmapGenerator::new(TERRAIN_SEED);
    let settings = config.terrain.clone();
    let surface_y = |x: f32, z: f32| {
        if settings.enabled {
            settings.origin_y + generator.height(x as f64, z as f64) * settings.height_scale
        } else {
            0.0
        }
    };

    let mut items = RenderItemRegistry::new();
    for i in 0..5 {
        let x = -12.0 + i as f32 * 6.0;
        let z = 4.0;
        let size = 1.5 + (i % 3) as f32;
        items.add(
            RenderItem::new(format!("box_{}", i), shapes_mesh, box_submesh, if i % 2 == 0 { stone } else { tile })
                .with_transform(
                    Vec3::new(x, surface_y(x, z) + size * 0.5, z),
                    Vec3::new(0.0, i as f32 * 0.4, 0.0),
                    Vec3::splat(size),
                )
                .with_tex_transform(Mat4::from_scale(Vec3::new(size, size, 1.0))),
        );
    }
    for i in 0..4 {
        let x = -9.0 + i as f32 * 6.0;
        let z = -4.0;
        let radius = 1.0 + i as f32 * 0.5;
        items.add(
            RenderItem::new(format!("sphere_{}", i), shapes_mesh, sphere_submesh, chrome).with_transform(
                Vec3::new(x, surface_y(x, z) + radius, z),
                Vec3::ZERO,
                Vec3::splat(radius * 2.0),
            ),
        );
    }

    let lights = LightSet::new(vec![
        Light::directional("sun", Vec3::new(0.0, 200.0, -200.0), Vec3::new(0.3, -1.0, 0.5), Vec3::new(1.0, 0.95, 0.85)),
        Light::ambient("ambient", Vec3::splat(0.3)),
        Light::point(ANIMATED_LIGHT, Vec3::new(-3.0, 3.0, 0.0), Vec3::new(1.0, 0.1, 0.1), 1.0, 15.0),
        Light::point("blue_point", Vec3::new(3.0, 3.0, 0.0), Vec3::new(0.1, 0.2, 1.0), 1.0, 15.0),
        Light::spot("spot", Vec3::new(0.0, 25.0, 0.0), Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 0.8), 80.0),
    ]);

    let terrain = if settings.enabled {
        assets.heightmaps = generator.generate_all(&settings);
        let grid_mesh = assets.meshes.add(MeshData::from_parts(
            "terrain_grid",
            vec![("grid".to_string(), shapes::grid(settings.tile_grid_cells))],
        ));
        let grid = assets.meshes.submesh(grid_mesh, "grid")?;
        let mut terrain = Terrain::build_quadtree(settings.clone());
        let lod1: Vec<u32> = (1..5).collect();
        let lod2: Vec<u32> = (5..21).collect();
        terrain.assign_height_indices(&[0], &lod1, &lod2);
        Some(TerrainLayer {
            terrain,
            mesh: grid_mesh,
            grid,
            material: ground,
        })
    } else {
        log::info!("[demo::build_scene] Terrain disabled");
        None
    };

    log::info!(
        "[demo::build_scene] {} items, {} lights, {} materials, {} textures",
        items.len(),
        lights.len(),
        materials.len(),
        assets.textures.len()
    );

    let ctx = FrameContext {
        camera: Camera::new(&config.camera, width, height),
        tunables: config.tunables.clone(),
        items,
        lights,
        materials,
        terrain,
        time: FrameTime::default(),
    };
    Ok((assets, ctx))
}

/// Per-frame scene animation
pub fn animate(ctx: &mut FrameContext) {
    let t = ctx.time.total;
    if let Some(light) = ctx.lights.lights_mut().iter_mut().find(|l| l.name == ANIMATED_LIGHT) {
        light.position.z = (3.0 * t).sin() * 6.0;
    }
}
