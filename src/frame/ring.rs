//! Fixed-size ring of per-frame resources guarded by GPU fences
//!
//! `acquire` is the only place the CPU waits on the GPU: a slot is handed
//! out again only once the fence stored by its previous `release` has been
//! reached.

use crate::error::{EngineError, EngineResult};
use crate::gpu::FenceTimeline;

pub struct FrameRing<T, const N: usize> {
    slots: [T; N],
    fences: [u64; N],
    frame_counter: u64,
    acquired: Option<usize>,
}

impl<T, const N: usize> FrameRing<T, N> {
    const HAS_SLOTS: () = assert!(N > 0, "frame ring needs at least one slot");

    pub fn new(mut make: impl FnMut(usize) -> T) -> Self {
        let () = Self::HAS_SLOTS;
        Self {
            slots: std::array::from_fn(|slot| make(slot)),
            fences: [0; N],
            frame_counter: 0,
            acquired: None,
        }
    }

    fn next_slot(&self) -> usize {
        (self.frame_counter % N as u64) as usize
    }

    fn check_not_acquired(&self) -> EngineResult<()> {
        match self.acquired {
            Some(slot) => Err(EngineError::Internal {
                component: "frame_ring".to_string(),
                message: format!("slot {} acquired twice without release", slot),
            }),
            None => Ok(()),
        }
    }

    /// Hand out the next slot, blocking until the GPU is done with it
    pub fn acquire(&mut self, timeline: &dyn FenceTimeline) -> EngineResult<(usize, &mut T)> {
        self.check_not_acquired()?;
        let slot = self.next_slot();
        let fence = self.fences[slot];
        if fence != 0 && timeline.completed_value() < fence {
            log::debug!(
                "[FrameRing::acquire] Slot {} still in flight (fence {}, completed {}), waiting",
                slot,
                fence,
                timeline.completed_value()
            );
            timeline.wait_for(fence);
        }
        self.acquired = Some(slot);
        Ok((slot, &mut self.slots[slot]))
    }

    /// Non-blocking variant of `acquire`; `None` while the slot is in flight
    pub fn try_acquire(&mut self, timeline: &dyn FenceTimeline) -> EngineResult<Option<(usize, &mut T)>> {
        self.check_not_acquired()?;
        let slot = self.next_slot();
        let fence = self.fences[slot];
        if fence != 0 && timeline.completed_value() < fence {
            return Ok(None);
        }
        self.acquired = Some(slot);
        Ok(Some((slot, &mut self.slots[slot])))
    }

    /// Store the fence that marks the end of this slot's GPU work and move on
    pub fn release(&mut self, fence: u64) -> EngineResult<()> {
        let slot = self.acquired.take().ok_or_else(|| EngineError::Internal {
            component: "frame_ring".to_string(),
            message: "release without acquire".to_string(),
        })?;
        self.fences[slot] = fence;
        self.frame_counter += 1;
        Ok(())
    }

    /// Give the slot back without submitting anything; its old fence stays
    pub fn abandon(&mut self) {
        if let Some(slot) = self.acquired.take() {
            log::debug!("[FrameRing::abandon] Slot {} returned unused", slot);
        }
    }

    pub fn fence(&self, slot: usize) -> u64 {
        self.fences[slot]
    }

    /// Highest fence handed to any slot
    pub fn last_fence(&self) -> u64 {
        self.fences.iter().copied().max().unwrap_or(0)
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn slot_count(&self) -> usize {
        N
    }

    pub fn slots(&self) -> &[T; N] {
        &self.slots
    }

    /// Mutable access to every slot; only valid once the GPU is idle
    pub fn slots_mut(&mut self, timeline: &dyn FenceTimeline) -> &mut [T; N] {
        timeline.wait_for(self.last_fence());
        &mut self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::SimulatedTimeline;

    #[test]
    fn test_slots_rotate() {
        let timeline = SimulatedTimeline::new();
        let mut ring: FrameRing<usize, 3> = FrameRing::new(|slot| slot);
        let mut seen = Vec::new();
        for fence in 1..=6 {
            let (slot, value) = ring.acquire(&timeline).unwrap();
            assert_eq!(*value, slot);
            seen.push(slot);
            ring.release(fence).unwrap();
            timeline.signal(fence);
        }
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(ring.frame_counter(), 6);
        assert_eq!(ring.last_fence(), 6);
    }

    #[test]
    fn test_try_acquire_refuses_in_flight_slot() {
        let timeline = SimulatedTimeline::stalled();
        let mut ring: FrameRing<u32, 2> = FrameRing::new(|_| 0);
        for fence in 1..=2 {
            ring.acquire(&timeline).unwrap();
            ring.release(fence).unwrap();
        }
        assert!(ring.try_acquire(&timeline).unwrap().is_none());
        timeline.signal(1);
        let (slot, _) = ring.try_acquire(&timeline).unwrap().unwrap();
        assert_eq!(slot, 0);
    }

    #[test]
    fn test_double_acquire_is_rejected() {
        let timeline = SimulatedTimeline::new();
        let mut ring: FrameRing<u32, 3> = FrameRing::new(|_| 0);
        ring.acquire(&timeline).unwrap();
        assert!(ring.acquire(&timeline).is_err());
    }

    #[test]
    fn test_abandon_reuses_slot() {
        let timeline = SimulatedTimeline::new();
        let mut ring: FrameRing<u32, 3> = FrameRing::new(|_| 0);
        let (first, _) = ring.acquire(&timeline).unwrap();
        ring.abandon();
        let (again, _) = ring.acquire(&timeline).unwrap();
        assert_eq!(first, again);
        assert_eq!(ring.frame_counter(), 0);
    }

    #[test]
    fn test_release_without_acquire_is_rejected() {
        let mut ring: FrameRing<u32, 3> = FrameRing::new(|_| 0);
        assert!(ring.release(1).is_err());
    }

    #[test]
    fn test_single_slot_ring_serializes_frames() {
        let timeline = SimulatedTimeline::stalled();
        let mut ring: FrameRing<u32, 1> = FrameRing::new(|_| 0);
        ring.acquire(&timeline).unwrap();
        ring.release(1).unwrap();
        assert!(ring.try_acquire(&timeline).unwrap().is_none());
        timeline.signal(1);
        let (slot, _) = ring.try_acquire(&timeline).unwrap().unwrap();
        assert_eq!(slot, 0);
    }
}
