//! GPU resource pool and access-state tracking
//!
//! The pool holds the single authoritative access state of every resource.
//! `transition` is the only code path allowed to change it, and it records
//! the matching barrier into the command list in call order.

use crate::error::{EngineError, EngineResult};
use crate::gpu::command::{Command, CommandList};

/// Access state of a resource as last recorded for the GPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    RenderTarget,
    PixelShaderRead,
    DepthWrite,
    CopySource,
    CopyDest,
    Present,
    GenericRead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ColorTarget,
    DepthTarget,
    Texture,
    BackBuffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgba16Float,
    Rgba32Float,
    Rg16Float,
    R32Float,
    Depth32Float,
    Bgra8UnormSrgb,
}

impl TextureFormat {
    pub fn bytes_per_texel(self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::R32Float
            | TextureFormat::Depth32Float
            | TextureFormat::Rg16Float => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDesc {
    pub label: String,
    pub kind: ResourceKind,
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    /// Greater than one only for volume textures such as color LUTs
    pub depth: u32,
}

impl ResourceDesc {
    pub fn texture_2d(
        label: impl Into<String>,
        kind: ResourceKind,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            label: label.into(),
            kind,
            format,
            width,
            height,
            depth: 1,
        }
    }

    pub fn texture_3d(label: impl Into<String>, format: TextureFormat, size: u32) -> Self {
        Self {
            label: label.into(),
            kind: ResourceKind::Texture,
            format,
            width: size,
            height: size,
            depth: size,
        }
    }

    pub fn byte_size(&self) -> usize {
        (self.width * self.height * self.depth * self.format.bytes_per_texel()) as usize
    }
}

#[derive(Debug, Clone)]
pub struct Resource {
    pub desc: ResourceDesc,
    state: ResourceState,
}

impl Resource {
    pub fn state(&self) -> ResourceState {
        self.state
    }
}

/// Owns every resource description and its tracked state
#[derive(Debug, Default)]
pub struct ResourcePool {
    resources: Vec<Resource>,
}

impl ResourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, desc: ResourceDesc, initial_state: ResourceState) -> ResourceId {
        let id = ResourceId(self.resources.len() as u32);
        log::debug!(
            "[ResourcePool::create] {:?} '{}' {}x{}x{} {:?} in {:?}",
            id,
            desc.label,
            desc.width,
            desc.height,
            desc.depth,
            desc.format,
            initial_state
        );
        self.resources.push(Resource {
            desc,
            state: initial_state,
        });
        id
    }

    pub fn get(&self, id: ResourceId) -> EngineResult<&Resource> {
        self.resources
            .get(id.0 as usize)
            .ok_or_else(|| EngineError::Internal {
                component: "resource_pool".to_string(),
                message: format!("unknown resource {:?}", id),
            })
    }

    pub fn desc(&self, id: ResourceId) -> EngineResult<&ResourceDesc> {
        Ok(&self.get(id)?.desc)
    }

    pub fn state(&self, id: ResourceId) -> EngineResult<ResourceState> {
        Ok(self.get(id)?.state)
    }

    /// Change the extent of a screen-sized resource. The tracked state is kept
    /// since the backend recreates the texture in the same state.
    pub fn resize(&mut self, id: ResourceId, width: u32, height: u32) -> EngineResult<&ResourceDesc> {
        let resource = self
            .resources
            .get_mut(id.0 as usize)
            .ok_or_else(|| EngineError::Internal {
                component: "resource_pool".to_string(),
                message: format!("cannot resize unknown resource {:?}", id),
            })?;
        resource.desc.width = width;
        resource.desc.height = height;
        Ok(&resource.desc)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &Resource)> {
        self.resources
            .iter()
            .enumerate()
            .map(|(i, r)| (ResourceId(i as u32), r))
    }
}

/// Move `id` into `desired`, recording one barrier if the state changes.
///
/// Returns whether a barrier was recorded.
pub fn transition(
    list: &mut CommandList,
    pool: &mut ResourcePool,
    id: ResourceId,
    desired: ResourceState,
) -> EngineResult<bool> {
    let resource = pool
        .resources
        .get_mut(id.0 as usize)
        .ok_or_else(|| EngineError::Internal {
            component: "resource_pool".to_string(),
            message: format!("transition of unknown resource {:?}", id),
        })?;

    if resource.state == desired {
        return Ok(false);
    }

    log::trace!(
        "[transition] {:?} '{}' {:?} -> {:?}",
        id,
        resource.desc.label,
        resource.state,
        desired
    );
    list.record(Command::Barrier {
        resource: id,
        before: resource.state,
        after: desired,
    });
    resource.state = desired;
    Ok(true)
}
