//! Constant buffer layouts shared with the WGSL shaders
//!
//! Field order and padding follow WGSL uniform layout rules; every struct
//! here has a matching declaration in `renderer/shaders`.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ObjectConstants {
    pub world: [[f32; 4]; 4],
    pub inv_world_transpose: [[f32; 4]; 4],
    pub tex_transform: [[f32; 4]; 4],
    pub prev_world: [[f32; 4]; 4],
}

impl ObjectConstants {
    pub fn new(world: Mat4, prev_world: Mat4, tex_transform: Mat4) -> Self {
        Self {
            world: world.to_cols_array_2d(),
            inv_world_transpose: world.inverse().transpose().to_cols_array_2d(),
            tex_transform: tex_transform.to_cols_array_2d(),
            prev_world: prev_world.to_cols_array_2d(),
        }
    }

    pub fn world(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.world)
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct MaterialConstants {
    pub diffuse_albedo: [f32; 4],
    pub fresnel_r0: [f32; 3],
    pub roughness: f32,
    pub mat_transform: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct LightConstants {
    pub position: [f32; 3],
    pub kind: u32,
    pub direction: [f32; 3],
    pub falloff_start: f32,
    pub color: [f32; 3],
    pub falloff_end: f32,
    pub strength: f32,
    pub spot_power: f32,
    pub casts_shadows: u32,
    pub pcf_enabled: u32,
    pub pcf_level: u32,
    pub shadow_map_size: f32,
    pub _padding: [f32; 2],
    pub light_view_proj: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ShadowConstants {
    pub light_view_proj: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct PassConstants {
    pub view: [[f32; 4]; 4],
    pub inv_view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub inv_proj: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
    pub inv_view_proj: [[f32; 4]; 4],
    pub eye_position: [f32; 3],
    pub _padding0: f32,
    pub render_target_size: [f32; 2],
    pub inv_render_target_size: [f32; 2],
    pub near_z: f32,
    pub far_z: f32,
    pub total_time: f32,
    pub delta_time: f32,
    /// Un-jittered matrices drive motion vectors
    pub view_proj_no_jitter: [[f32; 4]; 4],
    pub prev_view_proj_no_jitter: [[f32; 4]; 4],
    pub prev_view_proj: [[f32; 4]; 4],
    pub curr_jitter_uv: [f32; 2],
    pub prev_jitter_uv: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct TaaConstants {
    pub inv_view_proj: [[f32; 4]; 4],
    pub prev_view_proj: [[f32; 4]; 4],
    pub alpha: f32,
    pub clamp_expand: f32,
    pub inv_render_target_size: [f32; 2],
    pub strength: f32,
    pub _padding: [f32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct PostConstants {
    pub inv_render_target_size: [f32; 2],
    pub chromatic_aberration_offset: f32,
    pub color_correction: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn test_sizes_match_shader_layouts() {
        assert_eq!(size_of::<ObjectConstants>(), 256);
        assert_eq!(size_of::<MaterialConstants>(), 96);
        assert_eq!(size_of::<LightConstants>(), 144);
        assert_eq!(size_of::<ShadowConstants>(), 64);
        assert_eq!(size_of::<PassConstants>(), 640);
        assert_eq!(size_of::<TaaConstants>(), 160);
        assert_eq!(size_of::<PostConstants>(), 16);
    }

    #[test]
    fn test_inverse_transpose_of_scale() {
        let world = Mat4::from_scale(glam::Vec3::new(2.0, 4.0, 8.0));
        let constants = ObjectConstants::new(world, world, Mat4::IDENTITY);
        assert_eq!(constants.inv_world_transpose[0][0], 0.5);
        assert_eq!(constants.inv_world_transpose[2][2], 0.125);
        assert_eq!(constants.world(), world);
    }
}
