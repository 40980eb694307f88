//! Keyboard and mouse state for the fly camera

use crate::camera::{Camera, CameraSettings};
use std::collections::HashSet;
use winit::event::{ElementState, MouseButton};
pub use winit::keyboard::KeyCode;

#[derive(Debug, Default)]
pub struct InputState {
    keys_pressed: HashSet<KeyCode>,
    mouse_buttons_pressed: HashSet<MouseButton>,
    mouse_delta: (f32, f32),
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_key(&mut self, key: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                self.keys_pressed.insert(key);
            }
            ElementState::Released => {
                self.keys_pressed.remove(&key);
            }
        }
    }

    pub fn process_mouse_button(&mut self, button: MouseButton, state: ElementState) {
        match state {
            ElementState::Pressed => {
                self.mouse_buttons_pressed.insert(button);
            }
            ElementState::Released => {
                self.mouse_buttons_pressed.remove(&button);
                if button == MouseButton::Right {
                    self.mouse_delta = (0.0, 0.0);
                }
            }
        }
    }

    /// Raw device motion; only accumulated while looking around
    pub fn process_mouse_motion(&mut self, delta: (f64, f64)) {
        if self.is_looking() {
            self.mouse_delta.0 += delta.0 as f32;
            self.mouse_delta.1 += delta.1 as f32;
        }
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    pub fn is_looking(&self) -> bool {
        self.mouse_buttons_pressed.contains(&MouseButton::Right)
    }

    pub fn mouse_delta(&self) -> (f32, f32) {
        self.mouse_delta
    }

    /// Drop all held keys, e.g. when the window loses focus
    pub fn release_all(&mut self) {
        self.keys_pressed.clear();
        self.mouse_buttons_pressed.clear();
        self.mouse_delta = (0.0, 0.0);
    }

    fn axis(&self, positive: KeyCode, negative: KeyCode) -> f32 {
        let mut value = 0.0;
        if self.is_key_pressed(positive) {
            value += 1.0;
        }
        if self.is_key_pressed(negative) {
            value -= 1.0;
        }
        value
    }

    /// WASD moves, Q/E sinks and rises, right-drag looks. Consumes the mouse delta.
    pub fn apply_fly_camera(&mut self, camera: &mut Camera, settings: &CameraSettings, delta_time: f32) {
        let step = settings.move_speed * delta_time;
        let boost = if self.is_key_pressed(KeyCode::ShiftLeft) { 4.0 } else { 1.0 };
        camera.move_forward(self.axis(KeyCode::KeyW, KeyCode::KeyS) * step * boost);
        camera.move_right(self.axis(KeyCode::KeyD, KeyCode::KeyA) * step * boost);
        camera.move_up(self.axis(KeyCode::KeyE, KeyCode::KeyQ) * step * boost);

        let (dx, dy) = self.mouse_delta;
        if dx != 0.0 || dy != 0.0 {
            camera.rotate(dx * settings.look_sensitivity, -dy * settings.look_sensitivity);
        }
        self.mouse_delta = (0.0, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_key_moves_along_view() {
        let settings = CameraSettings::default();
        let mut camera = Camera::new(&settings, 800, 600);
        let start = camera.position;
        let mut input = InputState::new();
        input.process_key(KeyCode::KeyW, ElementState::Pressed);
        input.apply_fly_camera(&mut camera, &settings, 0.5);
        let moved = camera.position - start;
        assert!((moved.length() - settings.move_speed * 0.5).abs() < 1e-3);
        assert!(moved.normalize().dot(camera.forward()) > 0.999);
    }

    #[test]
    fn test_mouse_motion_needs_right_button() {
        let settings = CameraSettings::default();
        let mut camera = Camera::new(&settings, 800, 600);
        let mut input = InputState::new();
        input.process_mouse_motion((10.0, 0.0));
        assert_eq!(input.mouse_delta(), (0.0, 0.0));

        input.process_mouse_button(MouseButton::Right, ElementState::Pressed);
        input.process_mouse_motion((10.0, 0.0));
        let yaw = camera.yaw;
        input.apply_fly_camera(&mut camera, &settings, 0.0);
        assert!((camera.yaw - yaw - 10.0 * settings.look_sensitivity).abs() < 1e-6);
        assert_eq!(input.mouse_delta(), (0.0, 0.0));
    }
}
