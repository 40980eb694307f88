//! Scene lights and their shadow-map assignment

use crate::error::EngineResult;
use crate::frame::{LightConstants, ShadowConstants};
use crate::gpu::UploadBuffer;
use glam::{EulerRot, Mat3, Mat4, Vec3};

const SHADOW_NEAR: f32 = 1.0;
const SHADOW_FAR: f32 = 1000.0;
const DIRECTIONAL_SHADOW_EXTENT: f32 = 300.0;
const SPOT_SHADOW_FOV: f32 = 0.5 * std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum LightKind {
    Ambient = 0,
    Point = 1,
    Directional = 2,
    Spot = 3,
}

impl LightKind {
    pub fn label(self) -> &'static str {
        match self {
            LightKind::Ambient => "ambient",
            LightKind::Point => "point",
            LightKind::Directional => "directional",
            LightKind::Spot => "spot",
        }
    }

    pub fn uses_shadow_map(self) -> bool {
        matches!(self, LightKind::Directional | LightKind::Spot)
    }
}

/// Index of a depth target reserved for one light
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShadowSlot(pub u32);

#[derive(Debug, Clone)]
pub struct Light {
    pub name: String,
    kind: LightKind,
    pub position: Vec3,
    pub direction: Vec3,
    /// Spot orientation in degrees; `direction` is derived from it
    pub rotation: Vec3,
    pub color: Vec3,
    pub strength: f32,
    pub falloff_start: f32,
    pub falloff_end: f32,
    pub spot_power: f32,
    pub casts_shadows: bool,
    pub pcf_enabled: bool,
    pub pcf_level: u32,
    pub light_view_proj: Mat4,
    pub cb_index: u32,
    /// Written only by `LightSet` when the set is built
    shadow: Option<ShadowSlot>,
}

impl Light {
    fn base(name: impl Into<String>, kind: LightKind, color: Vec3) -> Self {
        Self {
            name: name.into(),
            kind,
            position: Vec3::ZERO,
            direction: Vec3::NEG_Y,
            rotation: Vec3::ZERO,
            color,
            strength: 1.0,
            falloff_start: 1.0,
            falloff_end: 10.0,
            spot_power: 64.0,
            casts_shadows: false,
            pcf_enabled: true,
            pcf_level: 1,
            light_view_proj: Mat4::IDENTITY,
            cb_index: 0,
            shadow: None,
        }
    }

    pub fn ambient(name: impl Into<String>, color: Vec3) -> Self {
        Self::base(name, LightKind::Ambient, color)
    }

    pub fn point(name: impl Into<String>, position: Vec3, color: Vec3, falloff_start: f32, falloff_end: f32) -> Self {
        Self {
            position,
            falloff_start,
            falloff_end,
            ..Self::base(name, LightKind::Point, color)
        }
    }

    pub fn directional(name: impl Into<String>, position: Vec3, direction: Vec3, color: Vec3) -> Self {
        Self {
            position,
            direction: direction.normalize_or_zero(),
            casts_shadows: true,
            ..Self::base(name, LightKind::Directional, color)
        }
    }

    /// `rotation` is in degrees and turns the default straight-down beam
    pub fn spot(name: impl Into<String>, position: Vec3, rotation: Vec3, color: Vec3, falloff_end: f32) -> Self {
        let mut light = Self {
            position,
            rotation,
            falloff_end,
            casts_shadows: true,
            ..Self::base(name, LightKind::Spot, color)
        };
        light.direction = light.spot_direction();
        light
    }

    fn spot_rotation(&self) -> Mat3 {
        Mat3::from_euler(
            EulerRot::YXZ,
            self.rotation.y.to_radians(),
            self.rotation.x.to_radians(),
            self.rotation.z.to_radians(),
        )
    }

    pub fn kind(&self) -> LightKind {
        self.kind
    }

    /// The depth target reserved for this light, fixed for its lifetime
    pub fn shadow(&self) -> Option<ShadowSlot> {
        self.shadow
    }

    pub fn spot_direction(&self) -> Vec3 {
        self.spot_rotation() * Vec3::NEG_Y
    }

    /// Recompute the cached light-space matrix from the current parameters
    pub fn update_view_projection(&mut self) {
        self.light_view_proj = match self.kind {
            LightKind::Directional => {
                let direction = self.direction.normalize_or_zero();
                let up = if direction.cross(Vec3::Y).length_squared() < 1e-6 {
                    Vec3::Z
                } else {
                    Vec3::Y
                };
                let half = DIRECTIONAL_SHADOW_EXTENT * 0.5;
                let proj = Mat4::orthographic_rh(-half, half, -half, half, SHADOW_NEAR, SHADOW_FAR);
                proj * Mat4::look_to_rh(self.position, direction, up)
            }
            LightKind::Spot => {
                self.direction = self.spot_direction();
                let up = self.spot_rotation() * Vec3::NEG_X;
                let proj = Mat4::perspective_rh(SPOT_SHADOW_FOV, 1.0, SHADOW_NEAR, SHADOW_FAR);
                proj * Mat4::look_to_rh(self.position, self.direction, up)
            }
            LightKind::Ambient | LightKind::Point => Mat4::IDENTITY,
        };
    }

    pub fn constants(&self, shadow_map_size: u32) -> LightConstants {
        LightConstants {
            position: self.position.to_array(),
            kind: self.kind as u32,
            direction: self.direction.to_array(),
            falloff_start: self.falloff_start,
            color: self.color.to_array(),
            falloff_end: self.falloff_end,
            strength: self.strength,
            spot_power: self.spot_power,
            casts_shadows: (self.casts_shadows && self.shadow.is_some()) as u32,
            pcf_enabled: self.pcf_enabled as u32,
            pcf_level: self.pcf_level,
            shadow_map_size: shadow_map_size as f32,
            _padding: [0.0; 2],
            light_view_proj: self.light_view_proj.to_cols_array_2d(),
        }
    }
}

#[derive(Debug, Default)]
pub struct LightSet {
    lights: Vec<Light>,
    shadow_slots: u32,
}

impl LightSet {
    pub fn new(lights: Vec<Light>) -> Self {
        let mut set = Self {
            lights,
            shadow_slots: 0,
        };
        for (i, light) in set.lights.iter_mut().enumerate() {
            light.cb_index = i as u32;
        }
        set.assign_shadow_maps();
        set
    }

    /// Directional and spot lights each own a shadow map for their lifetime
    fn assign_shadow_maps(&mut self) {
        let mut next = 0;
        for light in self.lights.iter_mut() {
            light.shadow = if light.kind.uses_shadow_map() {
                let slot = ShadowSlot(next);
                next += 1;
                Some(slot)
            } else {
                None
            };
        }
        self.shadow_slots = next;
        log::info!(
            "[LightSet::assign_shadow_maps] {} lights, {} shadow maps",
            self.lights.len(),
            self.shadow_slots
        );
    }

    pub fn shadow_slot_count(&self) -> u32 {
        self.shadow_slots
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> &mut [Light] {
        &mut self.lights
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Lights the shadow pass renders this frame
    pub fn shadow_casters(&self) -> impl Iterator<Item = (&Light, ShadowSlot)> {
        self.lights
            .iter()
            .filter(|l| l.casts_shadows)
            .filter_map(|l| l.shadow.map(|slot| (l, slot)))
    }

    pub fn update_light_constants(
        &mut self,
        lights: &mut UploadBuffer<LightConstants>,
        shadows: &mut UploadBuffer<ShadowConstants>,
        shadow_map_size: u32,
    ) -> EngineResult<()> {
        for light in self.lights.iter_mut() {
            light.update_view_projection();
            let index = light.cb_index as usize;
            lights.copy_data(index, &light.constants(shadow_map_size))?;
            shadows.copy_data(
                index,
                &ShadowConstants {
                    light_view_proj: light.light_view_proj.to_cols_array_2d(),
                },
            )?;
        }
        Ok(())
    }
}
