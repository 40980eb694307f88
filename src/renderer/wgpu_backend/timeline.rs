use crate::gpu::FenceTimeline;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Fence values mapped onto wgpu submission indices
pub struct WgpuTimeline {
    device: Arc<wgpu::Device>,
    completed: Arc<AtomicU64>,
    pending: Mutex<VecDeque<(u64, wgpu::SubmissionIndex)>>,
}

impl WgpuTimeline {
    pub fn new(device: Arc<wgpu::Device>) -> Self {
        Self {
            device,
            completed: Arc::new(AtomicU64::new(0)),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Remember `index` as the submission that signals `fence`
    pub fn track(&self, queue: &wgpu::Queue, fence: u64, index: wgpu::SubmissionIndex) {
        self.pending.lock().push_back((fence, index));
        let completed = Arc::clone(&self.completed);
        queue.on_submitted_work_done(move || {
            completed.fetch_max(fence, Ordering::AcqRel);
        });
    }

    fn retire(&self) {
        let completed = self.completed.load(Ordering::Acquire);
        let mut pending = self.pending.lock();
        while pending.front().map_or(false, |(fence, _)| *fence <= completed) {
            pending.pop_front();
        }
    }
}

impl FenceTimeline for WgpuTimeline {
    fn completed_value(&self) -> u64 {
        self.device.poll(wgpu::Maintain::Poll);
        self.retire();
        self.completed.load(Ordering::Acquire)
    }

    fn wait_for(&self, value: u64) {
        if self.completed.load(Ordering::Acquire) >= value {
            return;
        }
        let target = self
            .pending
            .lock()
            .iter()
            .find(|(fence, _)| *fence >= value)
            .map(|(fence, index)| (*fence, index.clone()));
        match target {
            Some((fence, index)) => {
                self.device.poll(wgpu::Maintain::WaitForSubmissionIndex(index));
                self.completed.fetch_max(fence, Ordering::AcqRel);
            }
            None => {
                log::debug!("[WgpuTimeline::wait_for] Fence {} was never submitted, waiting for idle", value);
                self.device.poll(wgpu::Maintain::Wait);
                self.completed.fetch_max(value, Ordering::AcqRel);
            }
        }
        self.retire();
    }
}
