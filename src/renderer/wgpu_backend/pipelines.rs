//! Render pipelines and bind group layouts for every pass
//!
//! Bind group indices match the slots the passes record: constant slots use
//! one shared dynamic-offset uniform layout, view slots a per-pipeline layout
//! with the pipeline's sampler appended after the textures.

use crate::error::{pipeline_creation_error, EngineResult};
use crate::gpu::{PipelineKind, TextureFormat};
use crate::scene::Vertex;
use std::collections::HashMap;

const COMMON_WGSL: &str = include_str!("../shaders/common.wgsl");

/// Formats of the geometry pass color targets, in G-buffer order
const GBUFFER_FORMATS: [wgpu::TextureFormat; 4] = [
    wgpu::TextureFormat::Rgba8Unorm,
    wgpu::TextureFormat::Rgba16Float,
    wgpu::TextureFormat::Rgba32Float,
    wgpu::TextureFormat::Rg16Float,
];
const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

pub fn texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        TextureFormat::Rg16Float => wgpu::TextureFormat::Rg16Float,
        TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
        TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
        TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupSlot {
    Constants,
    Views,
}

fn group_slots(kind: PipelineKind) -> &'static [GroupSlot] {
    use GroupSlot::{Constants as C, Views as V};
    match kind {
        PipelineKind::Shadow => &[C, C],
        PipelineKind::Geometry | PipelineKind::TerrainGeometry => &[C, C, C, V],
        PipelineKind::Lighting => &[C, C, V],
        PipelineKind::Taa | PipelineKind::Post => &[C, V],
    }
}

fn shader_source(kind: PipelineKind) -> Option<&'static str> {
    match kind {
        PipelineKind::Shadow => Some(include_str!("../shaders/shadow.wgsl")),
        PipelineKind::Geometry => Some(include_str!("../shaders/gbuffer.wgsl")),
        PipelineKind::TerrainGeometry => Some(include_str!("../shaders/terrain.wgsl")),
        PipelineKind::Lighting => Some(include_str!("../shaders/lighting.wgsl")),
        PipelineKind::Taa => Some(include_str!("../shaders/taa.wgsl")),
        PipelineKind::Post => Some(include_str!("../shaders/post.wgsl")),
    }
}

/// Which sampler a pipeline's view group ends with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerKind {
    LinearRepeat,
    LinearClamp,
    ShadowComparison,
}

pub fn view_sampler(kind: PipelineKind) -> Option<SamplerKind> {
    match kind {
        PipelineKind::Shadow => None,
        PipelineKind::Geometry | PipelineKind::TerrainGeometry => Some(SamplerKind::LinearRepeat),
        PipelineKind::Lighting => Some(SamplerKind::ShadowComparison),
        PipelineKind::Taa | PipelineKind::Post => Some(SamplerKind::LinearClamp),
    }
}

fn texture_entry(
    binding: u32,
    sample_type: wgpu::TextureSampleType,
    view_dimension: wgpu::TextureViewDimension,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type,
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

fn view_layout_entries(kind: PipelineKind) -> Vec<wgpu::BindGroupLayoutEntry> {
    use wgpu::{ShaderStages as S, TextureSampleType as T, TextureViewDimension as D};
    let filterable = T::Float { filterable: true };
    let unfilterable = T::Float { filterable: false };
    let textures: Vec<(wgpu::TextureSampleType, D, S)> = match kind {
        PipelineKind::Shadow => Vec::new(),
        PipelineKind::Geometry => vec![(filterable, D::D2, S::FRAGMENT)],
        PipelineKind::TerrainGeometry => vec![
            (unfilterable, D::D2, S::VERTEX),
            (filterable, D::D2, S::FRAGMENT),
        ],
        PipelineKind::Lighting => vec![
            (unfilterable, D::D2, S::FRAGMENT),
            (unfilterable, D::D2, S::FRAGMENT),
            (unfilterable, D::D2, S::FRAGMENT),
            (T::Depth, D::D2, S::FRAGMENT),
        ],
        PipelineKind::Taa => vec![
            (unfilterable, D::D2, S::FRAGMENT),
            (filterable, D::D2, S::FRAGMENT),
            (T::Depth, D::D2, S::FRAGMENT),
            (T::Depth, D::D2, S::FRAGMENT),
            (unfilterable, D::D2, S::FRAGMENT),
        ],
        PipelineKind::Post => vec![(filterable, D::D2, S::FRAGMENT), (filterable, D::D3, S::FRAGMENT)],
    };

    let mut entries: Vec<wgpu::BindGroupLayoutEntry> = textures
        .into_iter()
        .enumerate()
        .map(|(i, (sample_type, dimension, visibility))| texture_entry(i as u32, sample_type, dimension, visibility))
        .collect();
    if let Some(sampler) = view_sampler(kind) {
        let ty = match sampler {
            SamplerKind::ShadowComparison => wgpu::SamplerBindingType::Comparison,
            SamplerKind::LinearRepeat | SamplerKind::LinearClamp => wgpu::SamplerBindingType::Filtering,
        };
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: entries.len() as u32,
            visibility: S::FRAGMENT,
            ty: wgpu::BindingType::Sampler(ty),
            count: None,
        });
    }
    entries
}

/// Number of textures a view group of `kind` expects
pub fn view_count(kind: PipelineKind) -> usize {
    view_layout_entries(kind).len() - usize::from(view_sampler(kind).is_some())
}

pub struct Pipelines {
    constant_layout: wgpu::BindGroupLayout,
    view_layouts: HashMap<PipelineKind, wgpu::BindGroupLayout>,
    pipelines: HashMap<PipelineKind, wgpu::RenderPipeline>,
}

impl Pipelines {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> EngineResult<Self> {
        let constant_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("constant_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let mut view_layouts = HashMap::new();
        for kind in PipelineKind::ALL {
            if group_slots(kind).contains(&GroupSlot::Views) {
                let label = format!("{}_view_layout", kind.label());
                let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&label),
                    entries: &view_layout_entries(kind),
                });
                view_layouts.insert(kind, layout);
            }
        }

        let mut pipelines = Self {
            constant_layout,
            view_layouts,
            pipelines: HashMap::new(),
        };
        for kind in PipelineKind::ALL {
            let pipeline = pipelines.create_pipeline(device, kind, surface_format)?;
            pipelines.pipelines.insert(kind, pipeline);
        }
        log::info!(
            "[Pipelines::new] Created {} pipelines for surface format {:?}",
            pipelines.pipelines.len(),
            surface_format
        );
        Ok(pipelines)
    }

    pub fn get(&self, kind: PipelineKind) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(&kind)
    }

    pub fn constant_layout(&self) -> &wgpu::BindGroupLayout {
        &self.constant_layout
    }

    pub fn view_layout(&self, kind: PipelineKind) -> Option<&wgpu::BindGroupLayout> {
        self.view_layouts.get(&kind)
    }

    fn create_pipeline(
        &self,
        device: &wgpu::Device,
        kind: PipelineKind,
        surface_format: wgpu::TextureFormat,
    ) -> EngineResult<wgpu::RenderPipeline> {
        let label = kind.label();
        let body = shader_source(kind).ok_or_else(|| pipeline_creation_error(label, "no shader source"))?;
        let source = format!("{}\n{}", COMMON_WGSL, body);

        // Validation errors surface through the scope instead of the uncaptured handler
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let group_layouts: Vec<&wgpu::BindGroupLayout> = group_slots(kind)
            .iter()
            .map(|slot| match slot {
                GroupSlot::Constants => &self.constant_layout,
                GroupSlot::Views => &self.view_layouts[&kind],
            })
            .collect();
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &group_layouts,
            push_constant_ranges: &[],
        });

        let vertex_buffers = [Vertex::desc()];
        let (buffers, cull_mode): (&[wgpu::VertexBufferLayout], _) = match kind {
            PipelineKind::Shadow | PipelineKind::Geometry | PipelineKind::TerrainGeometry => {
                (&vertex_buffers, Some(wgpu::Face::Back))
            }
            _ => (&[], None),
        };

        let depth_stencil = match kind {
            PipelineKind::Shadow => Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState {
                    constant: 2,
                    slope_scale: 2.0,
                    clamp: 0.0,
                },
            }),
            PipelineKind::Geometry | PipelineKind::TerrainGeometry => Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            _ => None,
        };

        let additive = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Max,
            },
        };
        let target = |format, blend| {
            Some(wgpu::ColorTargetState {
                format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })
        };
        let targets: Vec<Option<wgpu::ColorTargetState>> = match kind {
            PipelineKind::Shadow => Vec::new(),
            PipelineKind::Geometry | PipelineKind::TerrainGeometry => {
                GBUFFER_FORMATS.iter().map(|&f| target(f, None)).collect()
            }
            PipelineKind::Lighting => vec![target(HDR_FORMAT, Some(additive))],
            PipelineKind::Taa => vec![target(HDR_FORMAT, None)],
            PipelineKind::Post => vec![target(surface_format, None)],
        };
        let fragment = (kind != PipelineKind::Shadow).then(|| wgpu::FragmentState {
            module: &module,
            entry_point: "fs_main",
            targets: &targets,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: "vs_main",
                buffers,
            },
            fragment,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            log::error!("[Pipelines::create_pipeline] '{}' failed validation: {}", label, error);
            return Err(pipeline_creation_error(label, error));
        }
        log::debug!("[Pipelines::create_pipeline] '{}' ready", label);
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_counts_match_recorded_view_sets() {
        assert_eq!(view_count(PipelineKind::Geometry), 1);
        assert_eq!(view_count(PipelineKind::TerrainGeometry), 2);
        assert_eq!(view_count(PipelineKind::Lighting), 4);
        assert_eq!(view_count(PipelineKind::Taa), 5);
        assert_eq!(view_count(PipelineKind::Post), 2);
    }

    #[test]
    fn test_constant_slots_precede_views() {
        for kind in PipelineKind::ALL {
            let slots = group_slots(kind);
            let first_view = slots.iter().position(|s| *s == GroupSlot::Views).unwrap_or(slots.len());
            assert!(slots[first_view..].iter().all(|s| *s == GroupSlot::Views));
        }
    }

    #[test]
    fn test_every_shader_declares_entry_points() {
        for kind in PipelineKind::ALL {
            let source = shader_source(kind).unwrap();
            assert!(source.contains("fn vs_main"), "{} has no vertex stage", kind.label());
            assert_eq!(source.contains("fn fs_main"), kind != PipelineKind::Shadow);
        }
    }
}
