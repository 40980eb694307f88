//! Replays a recorded `CommandList` on a wgpu command encoder
//!
//! wgpu has no free-standing clears or barriers: clears become the load op
//! of the next pass that targets the resource, and barriers are tracked by
//! wgpu itself. The list is first cut into segments so every render pass can
//! borrow the backend immutably while it is open.

use super::WgpuBackend;
use crate::error::{gpu_operation_error, EngineError, EngineResult};
use crate::gpu::{Command, PipelineKind, ResourceId, ViewKey};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    Depth(f32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// A clear no later pass consumed
    Clear { target: ResourceId, value: ClearValue },
    Pass {
        colors: Vec<ResourceId>,
        depth: Option<ResourceId>,
        clears: Vec<(ResourceId, ClearValue)>,
        commands: Range<usize>,
    },
    Copy { src: ResourceId, dst: ResourceId },
}

fn flush_clears(
    pending: &mut Vec<(ResourceId, ClearValue)>,
    segments: &mut Vec<Segment>,
    filter: impl Fn(ResourceId) -> bool,
) {
    pending.retain(|&(target, value)| {
        if filter(target) {
            segments.push(Segment::Clear { target, value });
            false
        } else {
            true
        }
    });
}

/// Cut a command list into passes, copies and leftover clears
pub fn plan_segments(commands: &[Command]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut pending: Vec<(ResourceId, ClearValue)> = Vec::new();
    let mut open: Option<usize> = None;

    for (i, command) in commands.iter().enumerate() {
        match command {
            Command::ClearColor { target, color } => {
                open = None;
                pending.retain(|(t, _)| t != target);
                pending.push((*target, ClearValue::Color(*color)));
            }
            Command::ClearDepth { target, depth } => {
                open = None;
                pending.retain(|(t, _)| t != target);
                pending.push((*target, ClearValue::Depth(*depth)));
            }
            Command::SetRenderTargets { colors, depth } => {
                let attached = |id: ResourceId| colors.contains(&id) || *depth == Some(id);
                let clears = pending.iter().copied().filter(|(t, _)| attached(*t)).collect();
                pending.retain(|(t, _)| !attached(*t));
                segments.push(Segment::Pass {
                    colors: colors.clone(),
                    depth: *depth,
                    clears,
                    commands: i + 1..i + 1,
                });
                open = Some(segments.len() - 1);
            }
            Command::CopyTexture { src, dst } => {
                open = None;
                flush_clears(&mut pending, &mut segments, |t| t == *src || t == *dst);
                segments.push(Segment::Copy { src: *src, dst: *dst });
            }
            other => match open.and_then(|index| segments.get_mut(index)) {
                Some(Segment::Pass { commands, .. }) => commands.end = i + 1,
                _ => {
                    if !matches!(other, Command::Barrier { .. }) {
                        log::warn!("[plan_segments] {:?} recorded outside a pass, dropped", other);
                    }
                }
            },
        }
    }

    flush_clears(&mut pending, &mut segments, |_| true);
    segments
}

/// View sets each pipeline binds in this list, for bind group creation
pub fn view_bindings(commands: &[Command]) -> Vec<(PipelineKind, Vec<ViewKey>)> {
    let mut pipeline = None;
    let mut bindings = Vec::new();
    for command in commands {
        match command {
            Command::SetRenderTargets { .. } => pipeline = None,
            Command::SetPipeline(kind) => pipeline = Some(*kind),
            Command::BindViews { views, .. } => {
                if let Some(kind) = pipeline {
                    let binding = (kind, views.clone());
                    if !bindings.contains(&binding) {
                        bindings.push(binding);
                    }
                }
            }
            _ => {}
        }
    }
    bindings
}

/// egui output already uploaded for this submission
pub struct PreparedUi {
    pub jobs: Vec<egui::ClippedPrimitive>,
    pub screen: egui_wgpu::ScreenDescriptor,
}

fn missing(what: &str, detail: impl std::fmt::Debug) -> EngineError {
    gpu_operation_error("execute command list", format!("{} {:?} does not exist", what, detail))
}

impl WgpuBackend {
    pub(super) fn encode_segments(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        frame_slot: usize,
        commands: &[Command],
        segments: &[Segment],
        ui: Option<&PreparedUi>,
    ) -> EngineResult<()> {
        for segment in segments {
            match segment {
                Segment::Clear { target, value } => {
                    let view = self.view_of(*target).ok_or_else(|| missing("clear target", target))?;
                    match value {
                        ClearValue::Color(color) => {
                            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                                label: Some("clear_color"),
                                color_attachments: &[Some(color_attachment(view, Some(*color)))],
                                depth_stencil_attachment: None,
                                timestamp_writes: None,
                                occlusion_query_set: None,
                            });
                        }
                        ClearValue::Depth(depth) => {
                            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                                label: Some("clear_depth"),
                                color_attachments: &[],
                                depth_stencil_attachment: Some(depth_attachment(view, Some(*depth))),
                                timestamp_writes: None,
                                occlusion_query_set: None,
                            });
                        }
                    }
                }
                Segment::Copy { src, dst } => {
                    let source = self.textures.get(src).ok_or_else(|| missing("copy source", src))?;
                    let target = self.textures.get(dst).ok_or_else(|| missing("copy target", dst))?;
                    if source.texture.size() != target.texture.size() {
                        return Err(gpu_operation_error(
                            "copy texture",
                            format!("'{}' and '{}' differ in size", source.desc.label, target.desc.label),
                        ));
                    }
                    encoder.copy_texture_to_texture(
                        source.texture.as_image_copy(),
                        target.texture.as_image_copy(),
                        source.texture.size(),
                    );
                }
                Segment::Pass {
                    colors,
                    depth,
                    clears,
                    commands: range,
                } => {
                    let clear_of = |id: ResourceId| clears.iter().find(|(t, _)| *t == id).map(|(_, v)| *v);
                    let mut color_attachments = Vec::with_capacity(colors.len());
                    for id in colors {
                        let view = self.view_of(*id).ok_or_else(|| missing("render target", id))?;
                        let clear = match clear_of(*id) {
                            Some(ClearValue::Color(color)) => Some(color),
                            _ => None,
                        };
                        color_attachments.push(Some(color_attachment(view, clear)));
                    }
                    let depth_stencil_attachment = match depth {
                        Some(id) => {
                            let view = self.view_of(*id).ok_or_else(|| missing("depth target", id))?;
                            let clear = match clear_of(*id) {
                                Some(ClearValue::Depth(depth)) => Some(depth),
                                _ => None,
                            };
                            Some(depth_attachment(view, clear))
                        }
                        None => None,
                    };

                    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: None,
                        color_attachments: &color_attachments,
                        depth_stencil_attachment,
                        timestamp_writes: None,
                        occlusion_query_set: None,
                    });
                    self.encode_pass(&mut pass, frame_slot, &commands[range.clone()], ui)?;
                }
            }
        }
        Ok(())
    }

    fn encode_pass<'p>(
        &'p self,
        pass: &mut wgpu::RenderPass<'p>,
        frame_slot: usize,
        commands: &[Command],
        ui: Option<&'p PreparedUi>,
    ) -> EngineResult<()> {
        let mut pipeline = None;
        for command in commands {
            match command {
                Command::SetPipeline(kind) => {
                    let compiled = self.pipelines.get(*kind).ok_or_else(|| missing("pipeline", kind))?;
                    pass.set_pipeline(compiled);
                    pipeline = Some(*kind);
                }
                Command::BindConstants { slot, buffer, element } => {
                    let constants = self
                        .constants
                        .get(&(frame_slot, *buffer))
                        .ok_or_else(|| missing("constant buffer", (frame_slot, buffer)))?;
                    if *element as usize >= constants.capacity {
                        return Err(EngineError::ConstantIndexOutOfRange {
                            buffer: buffer.label(),
                            index: *element as usize,
                            capacity: constants.capacity,
                        });
                    }
                    let offset = (*element as u64 * constants.stride) as wgpu::DynamicOffset;
                    pass.set_bind_group(*slot, &constants.bind_group, &[offset]);
                }
                Command::BindViews { slot, views } => {
                    let kind = pipeline.ok_or_else(|| {
                        gpu_operation_error("bind views", "no pipeline set before binding views")
                    })?;
                    let group = self
                        .view_groups
                        .get(&(kind, views.clone()))
                        .ok_or_else(|| missing("view bind group", views))?;
                    pass.set_bind_group(*slot, group, &[]);
                }
                Command::DrawIndexed {
                    mesh,
                    index_count,
                    first_index,
                    base_vertex,
                } => {
                    let buffers = self.meshes.get(mesh).ok_or_else(|| missing("mesh", mesh))?;
                    pass.set_vertex_buffer(0, buffers.vertices.slice(..));
                    pass.set_index_buffer(buffers.indices.slice(..), wgpu::IndexFormat::Uint32);
                    pass.draw_indexed(*first_index..*first_index + *index_count, *base_vertex, 0..1);
                }
                Command::DrawFullscreen => pass.draw(0..3, 0..1),
                Command::DrawUi => {
                    if let Some(ui) = ui {
                        self.ui_renderer.render(pass, &ui.jobs, &ui.screen);
                    }
                }
                Command::Barrier { .. } => {}
                Command::ClearColor { .. }
                | Command::ClearDepth { .. }
                | Command::SetRenderTargets { .. }
                | Command::CopyTexture { .. } => {
                    return Err(gpu_operation_error("execute command list", format!("{:?} inside a pass", command)));
                }
            }
        }
        Ok(())
    }
}

fn color_attachment(view: &wgpu::TextureView, clear: Option<[f32; 4]>) -> wgpu::RenderPassColorAttachment<'_> {
    let load = match clear {
        Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: a as f64,
        }),
        None => wgpu::LoadOp::Load,
    };
    wgpu::RenderPassColorAttachment {
        view,
        resolve_target: None,
        ops: wgpu::Operations {
            load,
            store: wgpu::StoreOp::Store,
        },
    }
}

fn depth_attachment(view: &wgpu::TextureView, clear: Option<f32>) -> wgpu::RenderPassDepthStencilAttachment<'_> {
    wgpu::RenderPassDepthStencilAttachment {
        view,
        depth_ops: Some(wgpu::Operations {
            load: clear.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
            store: wgpu::StoreOp::Store,
        }),
        stencil_ops: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{ConstantBuffer, ResourceState};

    const A: ResourceId = ResourceId(1);
    const B: ResourceId = ResourceId(2);
    const DEPTH: ResourceId = ResourceId(3);

    #[test]
    fn test_clears_become_load_ops_of_next_pass() {
        let commands = vec![
            Command::ClearColor { target: A, color: [0.0; 4] },
            Command::ClearDepth { target: DEPTH, depth: 1.0 },
            Command::SetRenderTargets { colors: vec![A], depth: Some(DEPTH) },
            Command::SetPipeline(PipelineKind::Geometry),
            Command::DrawFullscreen,
        ];
        let segments = plan_segments(&commands);
        assert_eq!(
            segments,
            vec![Segment::Pass {
                colors: vec![A],
                depth: Some(DEPTH),
                clears: vec![(A, ClearValue::Color([0.0; 4])), (DEPTH, ClearValue::Depth(1.0))],
                commands: 3..5,
            }]
        );
    }

    #[test]
    fn test_unconsumed_clear_is_flushed() {
        let commands = vec![
            Command::ClearColor { target: B, color: [1.0; 4] },
            Command::SetRenderTargets { colors: vec![A], depth: None },
            Command::DrawFullscreen,
        ];
        let segments = plan_segments(&commands);
        assert_eq!(segments.len(), 2);
        assert!(matches!(segments[0], Segment::Pass { clears: ref c, .. } if c.is_empty()));
        assert_eq!(
            segments[1],
            Segment::Clear {
                target: B,
                value: ClearValue::Color([1.0; 4])
            }
        );
    }

    #[test]
    fn test_copy_closes_pass_and_flushes_its_clears() {
        let commands = vec![
            Command::SetRenderTargets { colors: vec![A], depth: None },
            Command::DrawFullscreen,
            Command::ClearDepth { target: DEPTH, depth: 1.0 },
            Command::Barrier {
                resource: DEPTH,
                before: ResourceState::DepthWrite,
                after: ResourceState::CopySource,
            },
            Command::CopyTexture { src: DEPTH, dst: B },
            Command::BindConstants {
                slot: 0,
                buffer: ConstantBuffer::Pass,
                element: 0,
            },
        ];
        let segments = plan_segments(&commands);
        assert_eq!(segments.len(), 3);
        assert!(matches!(segments[0], Segment::Pass { ref commands, .. } if *commands == (1..2)));
        assert!(matches!(segments[1], Segment::Clear { target: DEPTH, .. }));
        assert_eq!(segments[2], Segment::Copy { src: DEPTH, dst: B });
    }

    #[test]
    fn test_view_bindings_follow_pipeline() {
        let commands = vec![
            Command::SetRenderTargets { colors: vec![A], depth: None },
            Command::SetPipeline(PipelineKind::Post),
            Command::BindViews {
                slot: 1,
                views: vec![ViewKey::SceneColor],
            },
            Command::DrawFullscreen,
            Command::BindViews {
                slot: 1,
                views: vec![ViewKey::SceneColor],
            },
        ];
        assert_eq!(
            view_bindings(&commands),
            vec![(PipelineKind::Post, vec![ViewKey::SceneColor])]
        );
    }
}
