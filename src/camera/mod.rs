/// Camera Module
///
/// A fly camera with yaw/pitch orientation plus the sub-pixel jitter
/// sequence used by temporal antialiasing.

pub mod jitter;

pub use jitter::{Jitter, JitterState, HALTON_2_3};

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    /// Yaw and pitch in radians
    pub yaw: f32,
    pub pitch: f32,
    /// Units per second
    pub move_speed: f32,
    /// Radians per pixel of mouse motion
    pub look_sensitivity: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov_y: 0.4 * std::f32::consts::PI,
            near: 1.0,
            far: 1000.0,
            position: [0.0, 30.0, -60.0],
            yaw: std::f32::consts::FRAC_PI_2,
            pitch: -0.35,
            move_speed: 20.0,
            look_sensitivity: 0.004,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    aspect: f32,
}

impl Camera {
    pub fn new(settings: &CameraSettings, width: u32, height: u32) -> Self {
        Self {
            position: Vec3::from(settings.position),
            yaw: settings.yaw,
            pitch: settings.pitch,
            fov_y: settings.fov_y,
            near: settings.near,
            far: settings.far,
            aspect: width.max(1) as f32 / height.max(1) as f32,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn forward(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Vec3::new(cos_pitch * cos_yaw, sin_pitch, cos_pitch * sin_yaw)
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize_or_zero()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward(), Vec3::Y)
    }

    /// Un-jittered projection with a 0..1 depth range
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn move_forward(&mut self, amount: f32) {
        self.position += self.forward() * amount;
    }

    pub fn move_right(&mut self, amount: f32) {
        self.position += self.right() * amount;
    }

    pub fn move_up(&mut self, amount: f32) {
        self.position.y += amount;
    }

    pub fn rotate(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw += delta_yaw;
        // Clamp pitch to prevent camera flipping
        self.pitch = (self.pitch + delta_pitch).clamp(-1.55, 1.55);
    }
}
