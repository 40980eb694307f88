//! Backend-neutral command recording
//!
//! Passes append `Command`s to the frame's `CommandList` in submission order.
//! A backend later replays the list; nothing here touches the GPU.

use crate::gpu::descriptors::ViewKey;
use crate::gpu::resource::{ResourceId, ResourceState};
use crate::scene::MeshId;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PipelineKind {
    Shadow,
    Geometry,
    TerrainGeometry,
    Lighting,
    Taa,
    Post,
}

impl PipelineKind {
    pub const ALL: [PipelineKind; 6] = [
        PipelineKind::Shadow,
        PipelineKind::Geometry,
        PipelineKind::TerrainGeometry,
        PipelineKind::Lighting,
        PipelineKind::Taa,
        PipelineKind::Post,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PipelineKind::Shadow => "shadow",
            PipelineKind::Geometry => "geometry",
            PipelineKind::TerrainGeometry => "terrain_geometry",
            PipelineKind::Lighting => "lighting",
            PipelineKind::Taa => "taa",
            PipelineKind::Post => "post",
        }
    }
}

/// Per-frame constant buffers owned by each frame resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstantBuffer {
    Pass,
    Object,
    Material,
    Light,
    ShadowTransform,
    Taa,
    Post,
}

impl ConstantBuffer {
    pub const ALL: [ConstantBuffer; 7] = [
        ConstantBuffer::Pass,
        ConstantBuffer::Object,
        ConstantBuffer::Material,
        ConstantBuffer::Light,
        ConstantBuffer::ShadowTransform,
        ConstantBuffer::Taa,
        ConstantBuffer::Post,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ConstantBuffer::Pass => "pass",
            ConstantBuffer::Object => "object",
            ConstantBuffer::Material => "material",
            ConstantBuffer::Light => "light",
            ConstantBuffer::ShadowTransform => "shadow_transform",
            ConstantBuffer::Taa => "taa",
            ConstantBuffer::Post => "post",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Barrier {
        resource: ResourceId,
        before: ResourceState,
        after: ResourceState,
    },
    ClearColor {
        target: ResourceId,
        color: [f32; 4],
    },
    ClearDepth {
        target: ResourceId,
        depth: f32,
    },
    /// Starts a new pass; pipeline and bindings must be set again afterwards
    SetRenderTargets {
        colors: Vec<ResourceId>,
        depth: Option<ResourceId>,
    },
    SetPipeline(PipelineKind),
    BindConstants {
        slot: u32,
        buffer: ConstantBuffer,
        element: u32,
    },
    BindViews {
        slot: u32,
        views: Vec<ViewKey>,
    },
    DrawIndexed {
        mesh: MeshId,
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
    },
    /// One full-screen triangle
    DrawFullscreen,
    CopyTexture {
        src: ResourceId,
        dst: ResourceId,
    },
    /// Composite the UI overlay onto the current back buffer
    DrawUi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawKind {
    Indexed { mesh: MeshId, index_count: u32 },
    Fullscreen,
    Ui,
}

/// A draw together with the state that was bound when it was recorded
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub kind: DrawKind,
    pub pipeline: Option<PipelineKind>,
    pub color_targets: Vec<ResourceId>,
    pub depth_target: Option<ResourceId>,
    pub constants: BTreeMap<u32, (ConstantBuffer, u32)>,
    pub views: BTreeMap<u32, Vec<ViewKey>>,
}

impl DrawRecord {
    pub fn constant(&self, buffer: ConstantBuffer) -> Option<u32> {
        self.constants
            .values()
            .find(|(b, _)| *b == buffer)
            .map(|(_, element)| *element)
    }

    pub fn reads_view(&self, key: ViewKey) -> bool {
        self.views.values().any(|set| set.contains(&key))
    }
}

/// Command allocator for one frame slot; reset and refilled every use
#[derive(Debug)]
pub struct CommandList {
    frame_slot: usize,
    commands: Vec<Command>,
}

impl CommandList {
    pub fn new(frame_slot: usize) -> Self {
        Self {
            frame_slot,
            commands: Vec::with_capacity(256),
        }
    }

    pub fn frame_slot(&self) -> usize {
        self.frame_slot
    }

    /// Drop recorded commands but keep the allocation
    pub fn reset(&mut self) {
        self.commands.clear();
    }

    pub fn record(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn barrier_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Barrier { .. }))
            .count()
    }

    /// Replay the list and describe every draw with its bound state
    pub fn draw_records(&self) -> Vec<DrawRecord> {
        let mut records = Vec::new();
        let mut pipeline = None;
        let mut colors: Vec<ResourceId> = Vec::new();
        let mut depth = None;
        let mut constants = BTreeMap::new();
        let mut views = BTreeMap::new();

        for command in &self.commands {
            match command {
                Command::SetRenderTargets {
                    colors: c,
                    depth: d,
                } => {
                    colors = c.clone();
                    depth = *d;
                    pipeline = None;
                    constants.clear();
                    views.clear();
                }
                Command::SetPipeline(kind) => pipeline = Some(*kind),
                Command::BindConstants {
                    slot,
                    buffer,
                    element,
                } => {
                    constants.insert(*slot, (*buffer, *element));
                }
                Command::BindViews { slot, views: v } => {
                    views.insert(*slot, v.clone());
                }
                Command::DrawIndexed {
                    mesh, index_count, ..
                } => records.push(DrawRecord {
                    kind: DrawKind::Indexed {
                        mesh: *mesh,
                        index_count: *index_count,
                    },
                    pipeline,
                    color_targets: colors.clone(),
                    depth_target: depth,
                    constants: constants.clone(),
                    views: views.clone(),
                }),
                Command::DrawFullscreen => records.push(DrawRecord {
                    kind: DrawKind::Fullscreen,
                    pipeline,
                    color_targets: colors.clone(),
                    depth_target: depth,
                    constants: constants.clone(),
                    views: views.clone(),
                }),
                Command::DrawUi => records.push(DrawRecord {
                    kind: DrawKind::Ui,
                    pipeline: None,
                    color_targets: colors.clone(),
                    depth_target: None,
                    constants: BTreeMap::new(),
                    views: BTreeMap::new(),
                }),
                Command::Barrier { .. }
                | Command::ClearColor { .. }
                | Command::ClearDepth { .. }
                | Command::CopyTexture { .. } => {}
            }
        }
        records
    }

    pub fn draws_with(&self, kind: PipelineKind) -> Vec<DrawRecord> {
        self.draw_records()
            .into_iter()
            .filter(|r| r.pipeline == Some(kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_keeps_capacity() {
        let mut list = CommandList::new(2);
        for _ in 0..300 {
            list.record(Command::DrawFullscreen);
        }
        let capacity = list.commands.capacity();
        list.reset();
        assert!(list.is_empty());
        assert_eq!(list.commands.capacity(), capacity);
        assert_eq!(list.frame_slot(), 2);
    }

    #[test]
    fn test_new_targets_clear_bindings() {
        let mut list = CommandList::new(0);
        list.record(Command::SetRenderTargets {
            colors: vec![ResourceId(1)],
            depth: None,
        });
        list.record(Command::SetPipeline(PipelineKind::Lighting));
        list.record(Command::BindConstants {
            slot: 1,
            buffer: ConstantBuffer::Light,
            element: 3,
        });
        list.record(Command::DrawFullscreen);
        list.record(Command::SetRenderTargets {
            colors: vec![ResourceId(2)],
            depth: None,
        });
        list.record(Command::DrawFullscreen);

        let records = list.draw_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].pipeline, Some(PipelineKind::Lighting));
        assert_eq!(records[0].constant(ConstantBuffer::Light), Some(3));
        assert_eq!(records[1].pipeline, None);
        assert!(records[1].constants.is_empty());
        assert_eq!(records[1].color_targets, vec![ResourceId(2)]);
    }
}
