//! Render targets, shadow maps and lookup tables owned by the renderer

use crate::error::EngineResult;
use crate::gpu::{
    GBufferTarget, GpuBackend, LutKind, ResourceDesc, ResourceId, ResourceKind, ResourcePool,
    ResourceState, TextureFormat, ViewKey,
};

/// Edge length of the color grading volumes
pub const LUT_SIZE: u32 = 16;

pub struct RenderTargets {
    pub gbuffer: [ResourceId; 4],
    pub depth: ResourceId,
    pub scene_color: ResourceId,
    pub history: [ResourceId; 2],
    pub depth_history: [ResourceId; 2],
    pub shadow_maps: Vec<ResourceId>,
    /// Bound in place of a shadow map for lights that do not cast shadows
    pub null_shadow: ResourceId,
    pub luts: [ResourceId; 2],
    pub back_buffer: ResourceId,
    history_read: usize,
    history_valid: bool,
    width: u32,
    height: u32,
}

fn gbuffer_format(target: GBufferTarget) -> TextureFormat {
    match target {
        GBufferTarget::Albedo => TextureFormat::Rgba8Unorm,
        // xyz normal, w roughness
        GBufferTarget::Normal => TextureFormat::Rgba16Float,
        GBufferTarget::Position => TextureFormat::Rgba32Float,
        GBufferTarget::Velocity => TextureFormat::Rg16Float,
    }
}

fn create(
    pool: &mut ResourcePool,
    backend: &mut dyn GpuBackend,
    desc: ResourceDesc,
    state: ResourceState,
) -> EngineResult<ResourceId> {
    let id = pool.create(desc, state);
    backend.create_resource(id, pool.desc(id)?)?;
    Ok(id)
}

impl RenderTargets {
    pub fn new(
        pool: &mut ResourcePool,
        backend: &mut dyn GpuBackend,
        width: u32,
        height: u32,
        shadow_slots: u32,
        shadow_map_size: u32,
    ) -> EngineResult<Self> {
        let (width, height) = (width.max(1), height.max(1));
        log::info!(
            "[RenderTargets::new] {}x{} with {} shadow maps of {}x{}",
            width,
            height,
            shadow_slots,
            shadow_map_size,
            shadow_map_size
        );

        let color = |label: &str, format| {
            ResourceDesc::texture_2d(label, ResourceKind::ColorTarget, format, width, height)
        };
        let depth_desc = |label: &str, size: (u32, u32)| {
            ResourceDesc::texture_2d(label, ResourceKind::DepthTarget, TextureFormat::Depth32Float, size.0, size.1)
        };

        let mut gbuffer = [ResourceId(0); 4];
        for (slot, target) in gbuffer.iter_mut().zip(GBufferTarget::ALL) {
            let label = format!("gbuffer_{:?}", target).to_lowercase();
            *slot = create(pool, backend, color(&label, gbuffer_format(target)), ResourceState::PixelShaderRead)?;
        }
        let depth = create(pool, backend, depth_desc("depth", (width, height)), ResourceState::DepthWrite)?;
        let scene_color = create(
            pool,
            backend,
            color("scene_color", TextureFormat::Rgba16Float),
            ResourceState::PixelShaderRead,
        )?;
        let history = [
            create(pool, backend, color("taa_history_0", TextureFormat::Rgba16Float), ResourceState::PixelShaderRead)?,
            create(pool, backend, color("taa_history_1", TextureFormat::Rgba16Float), ResourceState::PixelShaderRead)?,
        ];
        let depth_history = [
            create(pool, backend, depth_desc("depth_history_0", (width, height)), ResourceState::PixelShaderRead)?,
            create(pool, backend, depth_desc("depth_history_1", (width, height)), ResourceState::PixelShaderRead)?,
        ];

        let mut shadow_maps = Vec::with_capacity(shadow_slots as usize);
        for slot in 0..shadow_slots {
            shadow_maps.push(create(
                pool,
                backend,
                depth_desc(&format!("shadow_map_{}", slot), (shadow_map_size, shadow_map_size)),
                ResourceState::PixelShaderRead,
            )?);
        }
        let null_shadow = create(pool, backend, depth_desc("null_shadow", (1, 1)), ResourceState::PixelShaderRead)?;

        let effect_desc = ResourceDesc::texture_3d("lut_effect", TextureFormat::Rgba8Unorm, LUT_SIZE);
        let neutral_desc = ResourceDesc::texture_3d("lut_neutral", TextureFormat::Rgba8Unorm, LUT_SIZE);
        let effect = create(pool, backend, effect_desc.clone(), ResourceState::PixelShaderRead)?;
        let neutral = create(pool, backend, neutral_desc.clone(), ResourceState::PixelShaderRead)?;
        backend.upload_texture(effect, &effect_desc, &effect_lut(LUT_SIZE))?;
        backend.upload_texture(neutral, &neutral_desc, &neutral_lut(LUT_SIZE))?;

        let back_buffer = create(
            pool,
            backend,
            ResourceDesc::texture_2d("back_buffer", ResourceKind::BackBuffer, TextureFormat::Bgra8UnormSrgb, width, height),
            ResourceState::Present,
        )?;

        Ok(Self {
            gbuffer,
            depth,
            scene_color,
            history,
            depth_history,
            shadow_maps,
            null_shadow,
            luts: [effect, neutral],
            back_buffer,
            history_read: 0,
            history_valid: false,
            width,
            height,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn gbuffer(&self, target: GBufferTarget) -> ResourceId {
        self.gbuffer[target as usize]
    }

    pub fn lut(&self, kind: LutKind) -> ResourceId {
        match kind {
            LutKind::Effect => self.luts[0],
            LutKind::Neutral => self.luts[1],
        }
    }

    pub fn shadow_map(&self, slot: u32) -> Option<ResourceId> {
        self.shadow_maps.get(slot as usize).copied()
    }

    pub fn history_read(&self) -> usize {
        self.history_read
    }

    pub fn history_write(&self) -> usize {
        1 - self.history_read
    }

    pub fn history_valid(&self) -> bool {
        self.history_valid
    }

    /// The history just written becomes next frame's input
    pub fn swap_history(&mut self) {
        self.history_read = self.history_write();
        self.history_valid = true;
    }

    pub fn invalidate_history(&mut self) {
        self.history_valid = false;
    }

    fn screen_sized(&self) -> Vec<ResourceId> {
        let mut ids = self.gbuffer.to_vec();
        ids.extend([self.depth, self.scene_color, self.back_buffer]);
        ids.extend(self.history);
        ids.extend(self.depth_history);
        ids
    }

    /// Recreate every screen-sized target. Callers must have flushed the GPU.
    pub fn resize(&mut self, pool: &mut ResourcePool, backend: &mut dyn GpuBackend, width: u32, height: u32) -> EngineResult<()> {
        let (width, height) = (width.max(1), height.max(1));
        for id in self.screen_sized() {
            let desc = pool.resize(id, width, height)?.clone();
            backend.create_resource(id, &desc)?;
        }
        self.width = width;
        self.height = height;
        self.invalidate_history();
        log::info!("[RenderTargets::resize] Targets now {}x{}", width, height);
        Ok(())
    }

    /// Views the passes may bind, keyed by what they are
    pub fn view_entries(&self) -> Vec<(ViewKey, ResourceId)> {
        let mut entries: Vec<(ViewKey, ResourceId)> = GBufferTarget::ALL
            .iter()
            .map(|&t| (ViewKey::GBuffer(t), self.gbuffer(t)))
            .collect();
        entries.push((ViewKey::SceneColor, self.scene_color));
        entries.push((ViewKey::Depth, self.depth));
        for i in 0..2 {
            entries.push((ViewKey::TaaHistory(i as u8), self.history[i]));
            entries.push((ViewKey::DepthHistory(i as u8), self.depth_history[i]));
        }
        for (slot, &id) in self.shadow_maps.iter().enumerate() {
            entries.push((ViewKey::ShadowMap(slot as u32), id));
        }
        entries.push((ViewKey::NullShadow, self.null_shadow));
        entries.push((ViewKey::Lut(LutKind::Effect), self.luts[0]));
        entries.push((ViewKey::Lut(LutKind::Neutral), self.luts[1]));
        entries
    }
}

/// Identity color volume, red along x, green along y, blue along z
pub fn neutral_lut(size: u32) -> Vec<u8> {
    build_lut(size, |rgb| rgb)
}

/// Warm, slightly contrasty grade used when color correction is on
pub fn effect_lut(size: u32) -> Vec<u8> {
    build_lut(size, |[r, g, b]| {
        let contrast = |c: f32| ((c - 0.5) * 1.15 + 0.5).clamp(0.0, 1.0);
        let luma = 0.2126 * r + 0.7152 * g + 0.0722 * b;
        let saturate = |c: f32| luma + (c - luma) * 1.1;
        [
            contrast(saturate(r) * 1.06),
            contrast(saturate(g) * 1.01),
            contrast(saturate(b) * 0.92),
        ]
    })
}

fn build_lut(size: u32, grade: impl Fn([f32; 3]) -> [f32; 3]) -> Vec<u8> {
    let size = size.max(2);
    let scale = 1.0 / (size - 1) as f32;
    let mut data = Vec::with_capacity((size * size * size * 4) as usize);
    for b in 0..size {
        for g in 0..size {
            for r in 0..size {
                let out = grade([r as f32 * scale, g as f32 * scale, b as f32 * scale]);
                for c in out {
                    data.push((c.clamp(0.0, 1.0) * 255.0).round() as u8);
                }
                data.push(255);
            }
        }
    }
    data
}
