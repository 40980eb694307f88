//! The frame graph: shadow, geometry, lighting, TAA, post and UI
//!
//! Each pass appends to the frame's command list and moves resources into
//! the states it needs through `gpu::transition`.

pub mod geometry;
pub mod lighting;
pub mod post;
pub mod shadow;
pub mod taa;
pub mod ui;

use crate::error::EngineResult;
use crate::gpu::{
    transition, Command, CommandList, ConstantBuffer, PipelineKind, ResourceId, ResourcePool,
    ResourceState, ViewKey,
};
use crate::renderer::context::FrameContext;
use crate::renderer::targets::RenderTargets;

/// Mutable state shared by every pass while one frame is recorded
pub struct PassRecorder<'a> {
    pub list: &'a mut CommandList,
    pub pool: &'a mut ResourcePool,
    pub targets: &'a mut RenderTargets,
}

impl<'a> PassRecorder<'a> {
    pub fn new(list: &'a mut CommandList, pool: &'a mut ResourcePool, targets: &'a mut RenderTargets) -> Self {
        Self { list, pool, targets }
    }

    pub fn transition(&mut self, id: ResourceId, state: ResourceState) -> EngineResult<bool> {
        transition(self.list, self.pool, id, state)
    }

    pub fn record(&mut self, command: Command) {
        self.list.record(command);
    }

    pub fn set_targets(&mut self, colors: Vec<ResourceId>, depth: Option<ResourceId>) {
        self.list.record(Command::SetRenderTargets { colors, depth });
    }

    pub fn set_pipeline(&mut self, pipeline: PipelineKind) {
        self.list.record(Command::SetPipeline(pipeline));
    }

    pub fn bind_constants(&mut self, slot: u32, buffer: ConstantBuffer, element: u32) {
        self.list.record(Command::BindConstants { slot, buffer, element });
    }

    pub fn bind_views(&mut self, slot: u32, views: Vec<ViewKey>) {
        self.list.record(Command::BindViews { slot, views });
    }
}

/// Record the whole frame. Terrain tiles use object elements starting at
/// `tile_object_base`.
pub fn record_frame(recorder: &mut PassRecorder<'_>, ctx: &FrameContext, tile_object_base: u32) -> EngineResult<()> {
    shadow::record(recorder, &ctx.lights, &ctx.items)?;
    geometry::record(recorder, &ctx.items, &ctx.materials, ctx.terrain.as_ref(), tile_object_base)?;
    lighting::record(recorder, &ctx.lights)?;
    if ctx.tunables.taa_enabled {
        taa::record(recorder)?;
    } else {
        recorder.targets.invalidate_history();
    }
    post::record(recorder, &ctx.tunables)?;
    ui::record(recorder)?;
    log::trace!("[record_frame] {} commands", recorder.list.len());
    Ok(())
}
