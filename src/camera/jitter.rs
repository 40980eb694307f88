//! Sub-pixel projection jitter for temporal antialiasing.

use glam::{Mat4, Vec2, Vec3};

/// First eight points of the Halton(2, 3) sequence
pub const HALTON_2_3: [[f32; 2]; 8] = [
    [0.5, 1.0 / 3.0],
    [0.25, 2.0 / 3.0],
    [0.75, 1.0 / 9.0],
    [0.125, 4.0 / 9.0],
    [0.625, 7.0 / 9.0],
    [0.375, 2.0 / 9.0],
    [0.875, 5.0 / 9.0],
    [0.0625, 8.0 / 9.0],
];

/// One frame's jitter in both clip and texture space
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Jitter {
    /// Translation applied after the projection, in NDC units
    pub ndc: Vec2,
    /// The same offset expressed in UV space (y down)
    pub uv: Vec2,
}

impl Jitter {
    pub fn from_sample(sample: [f32; 2], width: u32, height: u32) -> Self {
        let ndc = Vec2::new(
            (sample[0] - 0.5) * (2.0 / width.max(1) as f32),
            (sample[1] - 0.5) * (2.0 / height.max(1) as f32),
        );
        Self {
            ndc,
            uv: Vec2::new(ndc.x * 0.5, -ndc.y * 0.5),
        }
    }

    pub fn apply(&self, projection: Mat4) -> Mat4 {
        Mat4::from_translation(Vec3::new(self.ndc.x, self.ndc.y, 0.0)) * projection
    }
}

/// Walks the jitter table independently of the frame ring
#[derive(Debug, Clone, Default)]
pub struct JitterState {
    index: usize,
    previous_uv: Vec2,
}

impl JitterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn previous_uv(&self) -> Vec2 {
        self.previous_uv
    }

    /// Jitter for the current frame, then step to the next table entry
    pub fn advance(&mut self, width: u32, height: u32) -> Jitter {
        let jitter = Jitter::from_sample(HALTON_2_3[self.index], width, height);
        self.index = (self.index + 1) % HALTON_2_3.len();
        jitter
    }

    /// Remember the UV jitter that was used so next frame can undo it
    pub fn finish_frame(&mut self, jitter: &Jitter) {
        self.previous_uv = jitter.uv;
    }

    pub fn reset(&mut self) {
        self.index = 0;
        self.previous_uv = Vec2::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_wraps_after_table() {
        let mut state = JitterState::new();
        for _ in 0..HALTON_2_3.len() {
            state.advance(1280, 720);
        }
        assert_eq!(state.index(), 0);
    }

    #[test]
    fn test_jitter_stays_within_one_pixel() {
        let mut state = JitterState::new();
        for _ in 0..16 {
            let jitter = state.advance(640, 480);
            assert!(jitter.ndc.x.abs() <= 1.0 / 640.0);
            assert!(jitter.ndc.y.abs() <= 1.0 / 480.0);
            assert_eq!(jitter.uv.x, jitter.ndc.x * 0.5);
            assert_eq!(jitter.uv.y, -jitter.ndc.y * 0.5);
        }
    }

    #[test]
    fn test_first_sample_has_no_horizontal_offset() {
        let jitter = Jitter::from_sample(HALTON_2_3[0], 100, 100);
        assert_eq!(jitter.ndc.x, 0.0);
    }

    #[test]
    fn test_apply_shifts_clip_position() {
        let jitter = Jitter::from_sample([1.0, 1.0], 2, 2);
        let clip = jitter.apply(Mat4::IDENTITY) * glam::Vec4::new(0.0, 0.0, 0.5, 1.0);
        assert_eq!(clip.x, 0.5);
        assert_eq!(clip.y, 0.5);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut state = JitterState::new();
        let first = state.advance(800, 600);
        state.advance(800, 600);
        state.reset();
        assert_eq!(state.advance(800, 600), first);
    }
}
