//! Per-frame orchestration: ring slot, constants, recording, submission

use crate::camera::JitterState;
use crate::error::EngineResult;
use crate::frame::{
    FrameCapacity, FrameResource, FrameRing, ObjectConstants, PassConstants, PostConstants,
    TaaConstants, FRAME_RESOURCE_COUNT,
};
use crate::gpu::{DescriptorTable, DeviceHealthMonitor, GpuBackend, ResourcePool};
use crate::renderer::assets::{GpuAssets, SceneAssets};
use crate::renderer::context::FrameContext;
use crate::renderer::passes::{self, PassRecorder};
use crate::renderer::targets::RenderTargets;
use glam::{Mat4, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Rendered { slot: usize, fence: u64 },
    /// The backend had no back buffer to draw into
    Skipped,
}

/// Camera history carried between frames for reprojection
#[derive(Debug, Default)]
struct TemporalState {
    jitter: JitterState,
    prev_view_proj: Mat4,
    prev_view_proj_no_jitter: Mat4,
    has_previous: bool,
}

impl TemporalState {
    fn reset(&mut self) {
        self.jitter.reset();
        self.has_previous = false;
    }
}

struct RenderState {
    pool: ResourcePool,
    targets: RenderTargets,
    temporal: TemporalState,
    shadow_map_size: u32,
}

impl RenderState {
    /// Fill the slot's constants and record every pass into its list
    fn encode(&mut self, frame: &mut FrameResource, ctx: &mut FrameContext) -> EngineResult<()> {
        ctx.items.update_object_constants(&mut frame.objects)?;
        ctx.materials.update_material_constants(&mut frame.materials)?;
        ctx.lights
            .update_light_constants(&mut frame.lights, &mut frame.shadows, self.shadow_map_size)?;

        let (width, height) = self.targets.size();
        let size = Vec2::new(width as f32, height as f32);
        let temporal = &mut self.temporal;
        let jitter = temporal.jitter.advance(width, height);

        let view = ctx.camera.view_matrix();
        let base_proj = ctx.camera.projection_matrix();
        let proj = jitter.apply(base_proj);
        let view_proj = proj * view;
        let view_proj_no_jitter = base_proj * view;
        if !temporal.has_previous {
            temporal.prev_view_proj = view_proj;
            temporal.prev_view_proj_no_jitter = view_proj_no_jitter;
        }

        let pass = PassConstants {
            view: view.to_cols_array_2d(),
            inv_view: view.inverse().to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
            inv_proj: proj.inverse().to_cols_array_2d(),
            view_proj: view_proj.to_cols_array_2d(),
            inv_view_proj: view_proj.inverse().to_cols_array_2d(),
            eye_position: ctx.camera.position.to_array(),
            _padding0: 0.0,
            render_target_size: size.to_array(),
            inv_render_target_size: size.recip().to_array(),
            near_z: ctx.camera.near,
            far_z: ctx.camera.far,
            total_time: ctx.time.total,
            delta_time: ctx.time.delta,
            view_proj_no_jitter: view_proj_no_jitter.to_cols_array_2d(),
            prev_view_proj_no_jitter: temporal.prev_view_proj_no_jitter.to_cols_array_2d(),
            prev_view_proj: temporal.prev_view_proj.to_cols_array_2d(),
            curr_jitter_uv: jitter.uv.to_array(),
            prev_jitter_uv: temporal.jitter.previous_uv().to_array(),
        };
        frame.pass.copy_data(0, &pass)?;

        let tile_object_base = ctx.items.len() as u32;
        if let Some(layer) = ctx.terrain.as_mut() {
            let tiles = layer.terrain.update(view_proj_no_jitter, ctx.camera.position);
            for (i, tile) in tiles.iter().enumerate() {
                let constants = ObjectConstants::new(tile.world, tile.world, Mat4::IDENTITY);
                frame.objects.copy_data(tile_object_base as usize + i, &constants)?;
            }
        }

        let tunables = &ctx.tunables;
        frame.taa.copy_data(
            0,
            &TaaConstants {
                inv_view_proj: view_proj_no_jitter.inverse().to_cols_array_2d(),
                prev_view_proj: temporal.prev_view_proj_no_jitter.to_cols_array_2d(),
                alpha: tunables.taa_alpha,
                clamp_expand: tunables.taa_clamp_expand,
                inv_render_target_size: size.recip().to_array(),
                strength: tunables.taa_strength,
                _padding: [0.0; 3],
            },
        )?;
        frame.post.copy_data(
            0,
            &PostConstants {
                inv_render_target_size: size.recip().to_array(),
                chromatic_aberration_offset: tunables.chromatic_aberration_offset,
                color_correction: tunables.color_correction as u32,
            },
        )?;

        temporal.prev_view_proj = view_proj;
        temporal.prev_view_proj_no_jitter = view_proj_no_jitter;
        temporal.has_previous = true;
        temporal.jitter.finish_frame(&jitter);

        frame.commands.reset();
        let mut recorder = PassRecorder::new(&mut frame.commands, &mut self.pool, &mut self.targets);
        passes::record_frame(&mut recorder, ctx, tile_object_base)
    }
}

fn encode_and_submit(
    state: &mut RenderState,
    frame: &mut FrameResource,
    ctx: &mut FrameContext,
    backend: &mut dyn GpuBackend,
    fence: u64,
) -> EngineResult<()> {
    state.encode(frame, ctx)?;
    let uploaded = frame.upload(backend)?;
    backend.submit(&frame.commands, fence)?;
    log::trace!(
        "[FrameScheduler] Slot {} submitted with fence {} ({} constant bytes)",
        frame.slot(),
        fence,
        uploaded
    );
    Ok(())
}

pub struct FrameScheduler {
    state: RenderState,
    assets: GpuAssets,
    table: DescriptorTable,
    ring: FrameRing<FrameResource, FRAME_RESOURCE_COUNT>,
    fence: u64,
    health: DeviceHealthMonitor,
    frames_rendered: u64,
    frames_skipped: u64,
}

impl FrameScheduler {
    /// Create every GPU-side resource the frame graph needs
    pub fn new(
        backend: &mut dyn GpuBackend,
        assets: &SceneAssets,
        ctx: &FrameContext,
        shadow_map_size: u32,
    ) -> EngineResult<Self> {
        let (width, height) = backend.surface_size();
        log::info!(
            "[FrameScheduler::new] Building frame graph on '{}' backend at {}x{}",
            backend.name(),
            width,
            height
        );

        let mut pool = ResourcePool::new();
        let targets = RenderTargets::new(
            &mut pool,
            backend,
            width,
            height,
            ctx.lights.shadow_slot_count(),
            shadow_map_size,
        )?;
        let gpu_assets = GpuAssets::upload(assets, &mut pool, backend)?;

        if let Some(layer) = &ctx.terrain {
            let mut missing = 0;
            layer.terrain.root().visit(&mut |node| {
                if node.height_index.map_or(true, |h| h as usize >= gpu_assets.heightmap_count()) {
                    missing += 1;
                }
            });
            if missing > 0 {
                log::warn!(
                    "[FrameScheduler::new] {} terrain nodes have no heightmap and will not be drawn",
                    missing
                );
            }
        }

        let capacity = FrameCapacity {
            objects: ctx.object_capacity(),
            materials: ctx.materials.len(),
            lights: ctx.lights.len(),
        };
        let ring: FrameRing<FrameResource, FRAME_RESOURCE_COUNT> =
            FrameRing::new(|slot| FrameResource::new(slot, capacity));
        for frame in ring.slots() {
            backend.create_constant_buffers(frame.slot(), &frame.layouts())?;
        }

        let mut scheduler = Self {
            state: RenderState {
                pool,
                targets,
                temporal: TemporalState::default(),
                shadow_map_size,
            },
            assets: gpu_assets,
            table: DescriptorTable::new(),
            ring,
            fence: 0,
            health: DeviceHealthMonitor::new(),
            frames_rendered: 0,
            frames_skipped: 0,
        };
        scheduler.rebuild_descriptors(backend)?;
        log::info!(
            "[FrameScheduler::new] Ready: {} resources, {} views, {} frame slots",
            scheduler.state.pool.len(),
            scheduler.table.len(),
            FRAME_RESOURCE_COUNT
        );
        Ok(scheduler)
    }

    fn rebuild_descriptors(&mut self, backend: &mut dyn GpuBackend) -> EngineResult<()> {
        let entries = self
            .state
            .targets
            .view_entries()
            .into_iter()
            .chain(self.assets.view_entries());
        self.table.rebuild(entries);
        backend.rebuild_descriptor_table(&self.table)
    }

    pub fn render_frame(&mut self, ctx: &mut FrameContext, backend: &mut dyn GpuBackend) -> EngineResult<FrameOutcome> {
        let (slot, frame) = self.ring.acquire(backend.timeline())?;

        // Nothing is recorded before the back buffer exists, so a skipped
        // frame leaves tracked resource states untouched
        let began = match backend.begin_frame() {
            Ok(began) => began,
            Err(err) => {
                self.ring.abandon();
                return Err(err);
            }
        };
        if !began {
            self.ring.abandon();
            self.frames_skipped += 1;
            log::debug!("[FrameScheduler::render_frame] No back buffer, frame skipped");
            return Ok(FrameOutcome::Skipped);
        }

        let fence = self.fence + 1;
        if let Err(err) = encode_and_submit(&mut self.state, frame, ctx, backend, fence) {
            self.ring.abandon();
            return Err(err);
        }
        self.fence = fence;

        let presented = backend.present();
        self.ring.release(fence)?;
        presented?;

        ctx.items.end_frame();
        self.frames_rendered += 1;
        self.health.observe(&backend.check_device_health());
        Ok(FrameOutcome::Rendered { slot, fence })
    }

    /// Wait for the GPU, then rebuild everything sized to the surface
    pub fn resize(
        &mut self,
        ctx: &mut FrameContext,
        backend: &mut dyn GpuBackend,
        width: u32,
        height: u32,
    ) -> EngineResult<()> {
        if width == 0 || height == 0 {
            log::debug!("[FrameScheduler::resize] Ignoring zero-sized surface");
            return Ok(());
        }
        log::info!("[FrameScheduler::resize] Resizing to {}x{}", width, height);
        backend.flush(self.fence)?;
        backend.resize(width, height)?;
        self.state
            .targets
            .resize(&mut self.state.pool, backend, width, height)?;
        self.rebuild_descriptors(backend)?;
        self.state.temporal.reset();
        ctx.camera.resize(width, height);
        Ok(())
    }

    pub fn shutdown(&mut self, backend: &mut dyn GpuBackend) -> EngineResult<()> {
        log::info!(
            "[FrameScheduler::shutdown] Flushing up to fence {} ({} frames rendered, {} skipped)",
            self.fence,
            self.frames_rendered,
            self.frames_skipped
        );
        backend.flush(self.fence)
    }

    pub fn fence(&self) -> u64 {
        self.fence
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }

    pub fn pool(&self) -> &ResourcePool {
        &self.state.pool
    }

    pub fn targets(&self) -> &RenderTargets {
        &self.state.targets
    }

    pub fn descriptor_table(&self) -> &DescriptorTable {
        &self.table
    }

    pub fn jitter_index(&self) -> usize {
        self.state.temporal.jitter.index()
    }

    pub fn ring(&self) -> &FrameRing<FrameResource, FRAME_RESOURCE_COUNT> {
        &self.ring
    }

    pub fn device_loss_reported(&self) -> bool {
        self.health.has_reported_loss()
    }
}
