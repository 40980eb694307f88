use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use parking_lot::Mutex;
use strata_engine::demo;
use strata_engine::gpu::{
    CommandList, ConstantBuffer, ConstantLayout, DescriptorTable, DeviceHealth, FenceTimeline, GpuBackend,
    ResourceDesc, ResourceId, SimulatedTimeline,
};
use strata_engine::scene::{MeshId, Vertex};
use strata_engine::{
    EngineConfig, EngineResult, FrameOutcome, FrameScheduler, RecordingBackend, FRAME_RESOURCE_COUNT,
};

type CallLog = Arc<Mutex<Vec<String>>>;

/// Timeline that notes every completed CPU wait
struct LoggedTimeline {
    inner: Arc<SimulatedTimeline>,
    calls: CallLog,
}

impl FenceTimeline for LoggedTimeline {
    fn completed_value(&self) -> u64 {
        self.inner.completed_value()
    }

    fn wait_for(&self, value: u64) {
        self.inner.wait_for(value);
        self.calls.lock().push(format!("waited({})", value));
    }
}

/// Recording backend that logs frame calls and catches constant writes
/// into a slot the GPU may still be reading
struct LoggedBackend {
    inner: RecordingBackend,
    timeline: LoggedTimeline,
    calls: CallLog,
    slot_fences: [u64; FRAME_RESOURCE_COUNT],
    early_writes: Vec<(usize, ConstantBuffer)>,
}

impl LoggedBackend {
    fn new(width: u32, height: u32, timeline: Arc<SimulatedTimeline>) -> Self {
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
        Self {
            inner: RecordingBackend::with_timeline(width, height, Arc::clone(&timeline)),
            timeline: LoggedTimeline {
                inner: timeline,
                calls: Arc::clone(&calls),
            },
            calls,
            slot_fences: [0; FRAME_RESOURCE_COUNT],
            early_writes: Vec::new(),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl GpuBackend for LoggedBackend {
    fn name(&self) -> &str {
        "logged"
    }

    fn timeline(&self) -> &dyn FenceTimeline {
        &self.timeline
    }

    fn surface_size(&self) -> (u32, u32) {
        self.inner.surface_size()
    }

    fn create_resource(&mut self, id: ResourceId, desc: &ResourceDesc) -> EngineResult<()> {
        self.inner.create_resource(id, desc)
    }

    fn destroy_resource(&mut self, id: ResourceId) {
        self.inner.destroy_resource(id)
    }

    fn upload_texture(&mut self, id: ResourceId, desc: &ResourceDesc, bytes: &[u8]) -> EngineResult<()> {
        self.inner.upload_texture(id, desc, bytes)
    }

    fn create_mesh(&mut self, mesh: MeshId, vertices: &[Vertex], indices: &[u32]) -> EngineResult<()> {
        self.inner.create_mesh(mesh, vertices, indices)
    }

    fn create_constant_buffers(&mut self, frame_slot: usize, layouts: &[ConstantLayout]) -> EngineResult<()> {
        self.inner.create_constant_buffers(frame_slot, layouts)
    }

    fn write_constants(
        &mut self,
        frame_slot: usize,
        buffer: ConstantBuffer,
        offset: u64,
        bytes: &[u8],
    ) -> EngineResult<()> {
        if self.timeline.completed_value() < self.slot_fences[frame_slot] {
            self.early_writes.push((frame_slot, buffer));
        }
        self.inner.write_constants(frame_slot, buffer, offset, bytes)
    }

    fn rebuild_descriptor_table(&mut self, table: &DescriptorTable) -> EngineResult<()> {
        self.inner.rebuild_descriptor_table(table)
    }

    fn begin_frame(&mut self) -> EngineResult<bool> {
        self.calls.lock().push("begin_frame".to_string());
        self.inner.begin_frame()
    }

    fn submit(&mut self, list: &CommandList, fence: u64) -> EngineResult<()> {
        self.slot_fences[list.frame_slot()] = fence;
        self.calls.lock().push(format!("submit({})", fence));
        self.inner.submit(list, fence)
    }

    fn present(&mut self) -> EngineResult<()> {
        self.inner.present()
    }

    fn resize(&mut self, width: u32, height: u32) -> EngineResult<()> {
        self.inner.resize(width, height)
    }

    fn check_device_health(&self) -> DeviceHealth {
        self.inner.check_device_health()
    }
}

#[test]
fn test_slots_and_fences_advance_together() {
    let config = EngineConfig::default();
    let mut backend = RecordingBackend::new(320, 240);
    let (assets, mut ctx) = demo::build_scene(&config, 320, 240).unwrap();
    let mut scheduler = FrameScheduler::new(&mut backend, &assets, &ctx, 512).unwrap();

    for frame in 0..7u64 {
        let outcome = scheduler.render_frame(&mut ctx, &mut backend).unwrap();
        assert_eq!(
            outcome,
            FrameOutcome::Rendered {
                slot: frame as usize % FRAME_RESOURCE_COUNT,
                fence: frame + 1,
            }
        );
    }
    assert_eq!(scheduler.frames_rendered(), 7);
    assert_eq!(scheduler.ring().last_fence(), 7);

    let slots: Vec<usize> = backend.submissions().iter().map(|s| s.frame_slot).collect();
    assert_eq!(slots, vec![0, 1, 2, 0, 1, 2, 0]);
}

#[test]
fn test_cpu_stays_at_most_three_frames_ahead() {
    let config = EngineConfig::default();
    let timeline = Arc::new(SimulatedTimeline::stalled());
    let mut backend = RecordingBackend::with_timeline(320, 240, Arc::clone(&timeline));
    let (assets, mut ctx) = demo::build_scene(&config, 320, 240).unwrap();
    let mut scheduler = FrameScheduler::new(&mut backend, &assets, &ctx, 512).unwrap();

    // The first three frames fill the ring without waiting
    for _ in 0..FRAME_RESOURCE_COUNT {
        scheduler.render_frame(&mut ctx, &mut backend).unwrap();
    }
    assert_eq!(timeline.completed_value(), 0);

    let signaled = Arc::new(AtomicBool::new(false));
    let gpu = Arc::clone(&timeline);
    let flag = Arc::clone(&signaled);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        flag.store(true, Ordering::SeqCst);
        gpu.signal(1);
    });

    let outcome = scheduler.render_frame(&mut ctx, &mut backend).unwrap();
    assert!(signaled.load(Ordering::SeqCst), "fourth frame must wait for fence 1");
    assert_eq!(outcome, FrameOutcome::Rendered { slot: 0, fence: 4 });
    handle.join().unwrap();

    // Slot 1 still holds fence 2, which has not completed
    assert!(timeline.completed_value() < scheduler.ring().fence(1));
    timeline.set_stalled(false);
    timeline.signal(scheduler.fence());
    scheduler.shutdown(&mut backend).unwrap();
}

#[test]
fn test_shutdown_waits_for_last_fence() {
    let config = EngineConfig::default();
    let timeline = Arc::new(SimulatedTimeline::stalled());
    let mut backend = RecordingBackend::with_timeline(320, 240, Arc::clone(&timeline));
    let (assets, mut ctx) = demo::build_scene(&config, 320, 240).unwrap();
    let mut scheduler = FrameScheduler::new(&mut backend, &assets, &ctx, 512).unwrap();

    scheduler.render_frame(&mut ctx, &mut backend).unwrap();
    scheduler.render_frame(&mut ctx, &mut backend).unwrap();

    let gpu = Arc::clone(&timeline);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        gpu.signal(2);
    });
    scheduler.shutdown(&mut backend).unwrap();
    assert!(timeline.completed_value() >= 2);
    handle.join().unwrap();
}

#[test]
fn test_each_slot_has_its_own_constants() {
    let config = EngineConfig::default();
    let mut backend = RecordingBackend::new(320, 240);
    let (assets, mut ctx) = demo::build_scene(&config, 320, 240).unwrap();
    let mut scheduler = FrameScheduler::new(&mut backend, &assets, &ctx, 512).unwrap();

    ctx.time.advance(0.25);
    scheduler.render_frame(&mut ctx, &mut backend).unwrap();
    ctx.time.advance(0.25);
    scheduler.render_frame(&mut ctx, &mut backend).unwrap();

    let first = backend.constant_bytes(0, ConstantBuffer::Pass).unwrap().to_vec();
    let second = backend.constant_bytes(1, ConstantBuffer::Pass).unwrap().to_vec();
    assert_ne!(first, second, "pass constants carry per-frame time and jitter");
}

#[test]
fn test_fence_wait_comes_before_back_buffer_and_slot_writes() {
    let config = EngineConfig::default();
    let timeline = Arc::new(SimulatedTimeline::stalled());
    let mut backend = LoggedBackend::new(320, 240, Arc::clone(&timeline));
    let (assets, mut ctx) = demo::build_scene(&config, 320, 240).unwrap();
    let mut scheduler = FrameScheduler::new(&mut backend, &assets, &ctx, 512).unwrap();

    for _ in 0..FRAME_RESOURCE_COUNT {
        ctx.time.advance(0.1);
        scheduler.render_frame(&mut ctx, &mut backend).unwrap();
    }
    let pass_before = backend.inner.constant_bytes(0, ConstantBuffer::Pass).unwrap().to_vec();

    let gpu = Arc::clone(&timeline);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        gpu.signal(1);
    });
    ctx.time.advance(0.1);
    scheduler.render_frame(&mut ctx, &mut backend).unwrap();
    handle.join().unwrap();

    let calls = backend.calls();
    let waited = calls.iter().position(|c| c == "waited(1)").expect("slot 0 reuse must wait");
    let last_begin = calls.iter().rposition(|c| c == "begin_frame").unwrap();
    let submitted = calls.iter().position(|c| c == "submit(4)").unwrap();
    assert!(waited < last_begin, "back buffer acquired before the fence wait: {:?}", calls);
    assert!(last_begin < submitted);

    // Slot 0 was rewritten for frame 4, but only once fence 1 had completed
    assert!(backend.early_writes.is_empty(), "{:?}", backend.early_writes);
    let pass_after = backend.inner.constant_bytes(0, ConstantBuffer::Pass).unwrap().to_vec();
    assert_ne!(pass_before, pass_after);

    timeline.set_stalled(false);
    timeline.signal(scheduler.fence());
}

#[test]
fn test_skipped_frame_waits_then_returns_its_slot() {
    let config = EngineConfig::default();
    let timeline = Arc::new(SimulatedTimeline::new());
    let mut backend = LoggedBackend::new(320, 240, timeline);
    let (assets, mut ctx) = demo::build_scene(&config, 320, 240).unwrap();
    let mut scheduler = FrameScheduler::new(&mut backend, &assets, &ctx, 512).unwrap();

    scheduler.render_frame(&mut ctx, &mut backend).unwrap();
    backend.inner.skip_next_frames(1);
    assert_eq!(scheduler.render_frame(&mut ctx, &mut backend).unwrap(), FrameOutcome::Skipped);
    assert_eq!(scheduler.ring().frame_counter(), 1);

    let outcome = scheduler.render_frame(&mut ctx, &mut backend).unwrap();
    assert_eq!(outcome, FrameOutcome::Rendered { slot: 1, fence: 2 });
    assert_eq!(
        backend.calls(),
        vec!["begin_frame", "submit(1)", "begin_frame", "begin_frame", "submit(2)"]
    );
}

