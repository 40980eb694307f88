//! Headless backend that records submissions against a simulated GPU
//!
//! The simulated timeline either completes work as soon as it is submitted
//! or stalls until another thread signals it, which lets tests observe the
//! frame ring's back-pressure.

use crate::error::{EngineError, EngineResult};
use crate::gpu::backend::{ConstantLayout, FenceTimeline, GpuBackend};
use crate::gpu::command::{Command, CommandList, ConstantBuffer};
use crate::gpu::descriptors::DescriptorTable;
use crate::gpu::health::DeviceHealth;
use crate::gpu::resource::{ResourceDesc, ResourceId};
use crate::scene::{MeshId, Vertex};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct SimulatedTimeline {
    completed: Mutex<u64>,
    signaled: Condvar,
    stalled: AtomicBool,
}

impl SimulatedTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// A timeline that only advances through `signal`
    pub fn stalled() -> Self {
        let timeline = Self::default();
        timeline.stalled.store(true, Ordering::SeqCst);
        timeline
    }

    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::SeqCst)
    }

    /// Mark everything up to `value` as finished and wake waiters
    pub fn signal(&self, value: u64) {
        let mut completed = self.completed.lock();
        if value > *completed {
            *completed = value;
        }
        self.signaled.notify_all();
    }
}

impl FenceTimeline for SimulatedTimeline {
    fn completed_value(&self) -> u64 {
        *self.completed.lock()
    }

    fn wait_for(&self, value: u64) {
        let mut completed = self.completed.lock();
        while *completed < value {
            self.signaled.wait(&mut completed);
        }
    }
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub fence: u64,
    pub frame_slot: usize,
    pub commands: Vec<Command>,
}

impl Submission {
    /// Rebuild a list for the query helpers on `CommandList`
    pub fn to_list(&self) -> CommandList {
        let mut list = CommandList::new(self.frame_slot);
        for command in &self.commands {
            list.record(command.clone());
        }
        list
    }
}

pub struct RecordingBackend {
    timeline: Arc<SimulatedTimeline>,
    size: (u32, u32),
    resources: HashMap<ResourceId, ResourceDesc>,
    meshes: HashMap<MeshId, (usize, usize)>,
    constants: HashMap<(usize, ConstantBuffer), Vec<u8>>,
    table_generation: u64,
    submissions: Vec<Submission>,
    frames_begun: u64,
    presents: u64,
    skip_frames: u32,
    lost: Option<String>,
}

impl RecordingBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_timeline(width, height, Arc::new(SimulatedTimeline::new()))
    }

    pub fn with_timeline(width: u32, height: u32, timeline: Arc<SimulatedTimeline>) -> Self {
        log::info!("[RecordingBackend::new] Headless backend {}x{}", width, height);
        Self {
            timeline,
            size: (width, height),
            resources: HashMap::new(),
            meshes: HashMap::new(),
            constants: HashMap::new(),
            table_generation: 0,
            submissions: Vec::new(),
            frames_begun: 0,
            presents: 0,
            skip_frames: 0,
            lost: None,
        }
    }

    pub fn shared_timeline(&self) -> Arc<SimulatedTimeline> {
        Arc::clone(&self.timeline)
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    pub fn last_submission(&self) -> Option<&Submission> {
        self.submissions.last()
    }

    pub fn presents(&self) -> u64 {
        self.presents
    }

    pub fn frames_begun(&self) -> u64 {
        self.frames_begun
    }

    pub fn resource(&self, id: ResourceId) -> Option<&ResourceDesc> {
        self.resources.get(&id)
    }

    pub fn mesh_sizes(&self, mesh: MeshId) -> Option<(usize, usize)> {
        self.meshes.get(&mesh).copied()
    }

    pub fn table_generation(&self) -> u64 {
        self.table_generation
    }

    pub fn constant_bytes(&self, frame_slot: usize, buffer: ConstantBuffer) -> Option<&[u8]> {
        self.constants.get(&(frame_slot, buffer)).map(Vec::as_slice)
    }

    /// Report no back buffer for the next `count` frames
    pub fn skip_next_frames(&mut self, count: u32) {
        self.skip_frames = count;
    }

    /// Pretend the device was removed; only affects health queries
    pub fn simulate_device_loss(&mut self, reason: &str) {
        self.lost = Some(reason.to_string());
    }
}

impl GpuBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    fn timeline(&self) -> &dyn FenceTimeline {
        self.timeline.as_ref()
    }

    fn surface_size(&self) -> (u32, u32) {
        self.size
    }

    fn create_resource(&mut self, id: ResourceId, desc: &ResourceDesc) -> EngineResult<()> {
        self.resources.insert(id, desc.clone());
        Ok(())
    }

    fn destroy_resource(&mut self, id: ResourceId) {
        self.resources.remove(&id);
    }

    fn upload_texture(&mut self, id: ResourceId, desc: &ResourceDesc, bytes: &[u8]) -> EngineResult<()> {
        if !self.resources.contains_key(&id) {
            return Err(EngineError::Internal {
                component: "recording_backend".to_string(),
                message: format!("upload to unknown texture {:?}", id),
            });
        }
        if bytes.len() != desc.byte_size() {
            return Err(EngineError::Internal {
                component: "recording_backend".to_string(),
                message: format!(
                    "texture '{}' expects {} bytes, got {}",
                    desc.label,
                    desc.byte_size(),
                    bytes.len()
                ),
            });
        }
        Ok(())
    }

    fn create_mesh(&mut self, mesh: MeshId, vertices: &[Vertex], indices: &[u32]) -> EngineResult<()> {
        self.meshes.insert(mesh, (vertices.len(), indices.len()));
        Ok(())
    }

    fn create_constant_buffers(&mut self, frame_slot: usize, layouts: &[ConstantLayout]) -> EngineResult<()> {
        for layout in layouts {
            self.constants
                .insert((frame_slot, layout.buffer), vec![0; layout.byte_len()]);
        }
        Ok(())
    }

    fn write_constants(
        &mut self,
        frame_slot: usize,
        buffer: ConstantBuffer,
        offset: u64,
        bytes: &[u8],
    ) -> EngineResult<()> {
        let target = self
            .constants
            .get_mut(&(frame_slot, buffer))
            .ok_or_else(|| EngineError::Internal {
                component: "recording_backend".to_string(),
                message: format!("no {} buffer for frame slot {}", buffer.label(), frame_slot),
            })?;
        let start = offset as usize;
        let end = start + bytes.len();
        if end > target.len() {
            return Err(EngineError::CapacityExceeded {
                what: buffer.label(),
                requested: end,
                capacity: target.len(),
            });
        }
        target[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn rebuild_descriptor_table(&mut self, table: &DescriptorTable) -> EngineResult<()> {
        self.table_generation = table.generation();
        Ok(())
    }

    fn begin_frame(&mut self) -> EngineResult<bool> {
        self.frames_begun += 1;
        if self.skip_frames > 0 {
            self.skip_frames -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    fn submit(&mut self, list: &CommandList, fence: u64) -> EngineResult<()> {
        log::trace!(
            "[RecordingBackend::submit] fence {} slot {} ({} commands)",
            fence,
            list.frame_slot(),
            list.len()
        );
        self.submissions.push(Submission {
            fence,
            frame_slot: list.frame_slot(),
            commands: list.commands().to_vec(),
        });
        if !self.timeline.is_stalled() {
            self.timeline.signal(fence);
        }
        Ok(())
    }

    fn present(&mut self) -> EngineResult<()> {
        self.presents += 1;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> EngineResult<()> {
        self.size = (width, height);
        Ok(())
    }

    fn check_device_health(&self) -> DeviceHealth {
        match &self.lost {
            Some(reason) => DeviceHealth::Lost {
                reason: reason.clone(),
            },
            None => DeviceHealth::Healthy,
        }
    }
}
