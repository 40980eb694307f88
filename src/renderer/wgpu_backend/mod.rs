//! wgpu implementation of `GpuBackend`

mod executor;
mod pipelines;
mod timeline;

pub use executor::{plan_segments, ClearValue, Segment};
pub use pipelines::texture_format;
pub use timeline::WgpuTimeline;

use crate::error::{gpu_operation_error, EngineError, EngineResult};
use crate::gpu::{
    Command, CommandList, ConstantBuffer, ConstantLayout, DescriptorTable, DeviceHealth, FenceTimeline,
    GpuBackend, PipelineKind, ResourceDesc, ResourceId, ResourceKind, ViewKey,
};
use crate::renderer::ui_overlay::UiFrame;
use crate::scene::{MeshId, Vertex};
use executor::PreparedUi;
use parking_lot::Mutex;
use pipelines::{Pipelines, SamplerKind};
use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::window::Window;

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    desc: ResourceDesc,
}

struct MeshBuffers {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
}

struct ConstantBinding {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    stride: u64,
    capacity: usize,
}

pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: Arc<wgpu::Device>,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    adapter_name: String,
    timeline: WgpuTimeline,
    pipelines: Pipelines,
    samplers: HashMap<SamplerKind, wgpu::Sampler>,
    textures: HashMap<ResourceId, GpuTexture>,
    back_buffer: Option<ResourceId>,
    meshes: HashMap<MeshId, MeshBuffers>,
    constants: HashMap<(usize, ConstantBuffer), ConstantBinding>,
    table: DescriptorTable,
    view_groups: HashMap<(PipelineKind, Vec<ViewKey>), wgpu::BindGroup>,
    frame: Option<(wgpu::SurfaceTexture, wgpu::TextureView)>,
    ui_renderer: egui_wgpu::Renderer,
    ui_frame: Option<UiFrame>,
    lost: Arc<Mutex<Option<String>>>,
}

async fn request_adapter(instance: &wgpu::Instance, surface: &wgpu::Surface<'static>) -> EngineResult<wgpu::Adapter> {
    let mut options = wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: Some(surface),
        force_fallback_adapter: false,
    };

    log::info!("[WgpuBackend::new] Trying high-performance adapter...");
    if let Some(adapter) = instance.request_adapter(&options).await {
        return Ok(adapter);
    }
    log::warn!("[WgpuBackend::new] No high-performance adapter found, trying low power...");
    options.power_preference = wgpu::PowerPreference::LowPower;
    if let Some(adapter) = instance.request_adapter(&options).await {
        return Ok(adapter);
    }
    log::warn!("[WgpuBackend::new] No low-power adapter found, trying fallback...");
    options.force_fallback_adapter = true;
    if let Some(adapter) = instance.request_adapter(&options).await {
        log::warn!("[WgpuBackend::new] Using fallback adapter");
        return Ok(adapter);
    }

    log::error!("[WgpuBackend::new] No suitable GPU adapter found!");
    log::error!("[WgpuBackend::new] Tried: high-performance, low-power, and fallback adapters");
    Err(EngineError::GpuInit {
        message: "no compatible adapter".to_string(),
    })
}

fn choose_present_mode(caps: &wgpu::SurfaceCapabilities, vsync: bool) -> wgpu::PresentMode {
    if !vsync && caps.present_modes.contains(&wgpu::PresentMode::Immediate) {
        return wgpu::PresentMode::Immediate;
    }
    if caps.present_modes.contains(&wgpu::PresentMode::Fifo) {
        wgpu::PresentMode::Fifo
    } else {
        log::warn!(
            "[WgpuBackend::new] Fifo not available, using first present mode: {:?}",
            caps.present_modes[0]
        );
        caps.present_modes[0]
    }
}

fn create_samplers(device: &wgpu::Device) -> HashMap<SamplerKind, wgpu::Sampler> {
    let linear = |label, address_mode| wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    };
    let mut samplers = HashMap::new();
    samplers.insert(
        SamplerKind::LinearRepeat,
        device.create_sampler(&linear("linear_repeat", wgpu::AddressMode::Repeat)),
    );
    samplers.insert(
        SamplerKind::LinearClamp,
        device.create_sampler(&linear("linear_clamp", wgpu::AddressMode::ClampToEdge)),
    );
    samplers.insert(
        SamplerKind::ShadowComparison,
        device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow_comparison"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        }),
    );
    samplers
}

impl WgpuBackend {
    pub async fn new(window: Arc<Window>, vsync: bool) -> EngineResult<Self> {
        log::info!("[WgpuBackend::new] Starting GPU initialization");
        let init_start = std::time::Instant::now();
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        log::info!("[WgpuBackend::new] Creating surface...");
        let surface = instance.create_surface(Arc::clone(&window)).map_err(|e| {
            log::error!("[WgpuBackend::new] Failed to create surface: {}", e);
            EngineError::SurfaceCreation { message: e.to_string() }
        })?;

        let adapter = request_adapter(&instance, &surface).await?;
        let info = adapter.get_info();
        log::info!("[WgpuBackend::new] Adapter: {} ({:?})", info.name, info.device_type);
        log::info!("[WgpuBackend::new] Backend: {:?}", info.backend);

        let limits = wgpu::Limits::default().using_resolution(adapter.limits());
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Strata Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits,
                },
                None,
            )
            .await
            .map_err(|e| {
                log::error!("[WgpuBackend::new] Failed to create GPU device: {}", e);
                EngineError::DeviceCreation { message: e.to_string() }
            })?;

        let lost = Arc::new(Mutex::new(None));
        let lost_flag = Arc::clone(&lost);
        device.on_uncaptured_error(Box::new(move |error| {
            log::error!("[GPU] Uncaptured device error: {:?}", error);
            match error {
                wgpu::Error::OutOfMemory { .. } => {
                    log::error!("[GPU] Out of GPU memory!");
                    lost_flag.lock().get_or_insert_with(|| "out of GPU memory".to_string());
                }
                wgpu::Error::Validation { description, .. } => {
                    log::error!("[GPU] Validation error: {}", description);
                }
                #[allow(unreachable_patterns)]
                _ => {}
            }
        }));
        let device = Arc::new(device);

        let caps = surface.get_capabilities(&adapter);
        if caps.formats.is_empty() {
            log::error!("[WgpuBackend::new] No surface formats available!");
            return Err(EngineError::SurfaceCreation {
                message: "surface reports no formats".to_string(),
            });
        }
        let format = caps.formats.iter().copied().find(|f| f.is_srgb()).unwrap_or_else(|| {
            log::warn!("[WgpuBackend::new] No sRGB format found, using {:?}", caps.formats[0]);
            caps.formats[0]
        });
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: choose_present_mode(&caps, vsync),
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        log::info!(
            "[WgpuBackend::new] Configuring {:?} surface {}x{} ({:?})",
            config.format,
            config.width,
            config.height,
            config.present_mode
        );
        surface.configure(&device, &config);

        let pipelines = Pipelines::new(&device, format)?;
        let samplers = create_samplers(&device);
        let ui_renderer = egui_wgpu::Renderer::new(&device, format, None, 1);

        log::info!("[WgpuBackend::new] GPU ready in {:?}", init_start.elapsed());
        Ok(Self {
            surface,
            timeline: WgpuTimeline::new(Arc::clone(&device)),
            device,
            queue,
            config,
            adapter_name: info.name,
            pipelines,
            samplers,
            textures: HashMap::new(),
            back_buffer: None,
            meshes: HashMap::new(),
            constants: HashMap::new(),
            table: DescriptorTable::new(),
            view_groups: HashMap::new(),
            frame: None,
            ui_renderer,
            ui_frame: None,
            lost,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Overlay to composite at the next `DrawUi`
    pub fn set_ui_frame(&mut self, frame: UiFrame) {
        self.ui_frame = Some(frame);
    }

    fn view_of(&self, id: ResourceId) -> Option<&wgpu::TextureView> {
        if self.back_buffer == Some(id) {
            return self.frame.as_ref().map(|(_, view)| view);
        }
        self.textures.get(&id).map(|t| &t.view)
    }

    fn clear_depth_texture(&self, view: &wgpu::TextureView) {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("initial_depth_clear"),
        });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("initial_depth_clear"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn create_view_group(&self, kind: PipelineKind, views: &[ViewKey]) -> EngineResult<wgpu::BindGroup> {
        let layout = self.pipelines.view_layout(kind).ok_or_else(|| {
            gpu_operation_error("bind views", format!("pipeline '{}' takes no views", kind.label()))
        })?;
        let expected = pipelines::view_count(kind);
        if views.len() != expected {
            return Err(gpu_operation_error(
                "bind views",
                format!("'{}' expects {} views, got {}", kind.label(), expected, views.len()),
            ));
        }

        let mut texture_views = Vec::with_capacity(views.len());
        for key in views {
            let id = self.table.resolve(*key)?;
            let view = self
                .view_of(id)
                .ok_or_else(|| gpu_operation_error("bind views", format!("{:?} has no texture", key)))?;
            texture_views.push(view);
        }
        let mut entries: Vec<wgpu::BindGroupEntry> = texture_views
            .iter()
            .enumerate()
            .map(|(i, view)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();
        if let Some(sampler) = pipelines::view_sampler(kind).and_then(|s| self.samplers.get(&s)) {
            entries.push(wgpu::BindGroupEntry {
                binding: entries.len() as u32,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }

        Ok(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kind.label()),
            layout,
            entries: &entries,
        }))
    }

    /// Create missing view bind groups and upload egui data for `commands`
    fn prepare(
        &mut self,
        commands: &[Command],
        encoder: &mut wgpu::CommandEncoder,
    ) -> EngineResult<(Option<PreparedUi>, Vec<wgpu::CommandBuffer>)> {
        for (kind, views) in executor::view_bindings(commands) {
            if !self.view_groups.contains_key(&(kind, views.clone())) {
                let group = self.create_view_group(kind, &views)?;
                self.view_groups.insert((kind, views), group);
            }
        }

        let draws_ui = commands.iter().any(|c| matches!(c, Command::DrawUi));
        let Some(frame) = self.ui_frame.take().filter(|_| draws_ui) else {
            return Ok((None, Vec::new()));
        };
        for (id, delta) in &frame.textures_delta.set {
            self.ui_renderer.update_texture(&self.device, &self.queue, *id, delta);
        }
        let screen = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: frame.pixels_per_point,
        };
        let buffers = self
            .ui_renderer
            .update_buffers(&self.device, &self.queue, encoder, &frame.primitives, &screen);
        for id in &frame.textures_delta.free {
            self.ui_renderer.free_texture(id);
        }
        Ok((
            Some(PreparedUi {
                jobs: frame.primitives,
                screen,
            }),
            buffers,
        ))
    }
}

impl GpuBackend for WgpuBackend {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn timeline(&self) -> &dyn FenceTimeline {
        &self.timeline
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn create_resource(&mut self, id: ResourceId, desc: &ResourceDesc) -> EngineResult<()> {
        self.view_groups.clear();
        if desc.kind == ResourceKind::BackBuffer {
            self.back_buffer = Some(id);
            return Ok(());
        }

        let usage = match desc.kind {
            ResourceKind::ColorTarget => {
                wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC
            }
            ResourceKind::DepthTarget => {
                wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC
                    | wgpu::TextureUsages::COPY_DST
            }
            ResourceKind::Texture | ResourceKind::BackBuffer => {
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST
            }
        };
        let dimension = if desc.depth > 1 {
            wgpu::TextureDimension::D3
        } else {
            wgpu::TextureDimension::D2
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.label),
            size: wgpu::Extent3d {
                width: desc.width.max(1),
                height: desc.height.max(1),
                depth_or_array_layers: desc.depth.max(1),
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension,
            format: texture_format(desc.format),
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        if desc.kind == ResourceKind::DepthTarget {
            self.clear_depth_texture(&view);
        }

        if let Some(old) = self.textures.insert(
            id,
            GpuTexture {
                texture,
                view,
                desc: desc.clone(),
            },
        ) {
            log::debug!("[WgpuBackend::create_resource] Replaced '{}'", old.desc.label);
            old.texture.destroy();
        }
        Ok(())
    }

    fn destroy_resource(&mut self, id: ResourceId) {
        self.view_groups.clear();
        if let Some(old) = self.textures.remove(&id) {
            old.texture.destroy();
        }
    }

    fn upload_texture(&mut self, id: ResourceId, desc: &ResourceDesc, bytes: &[u8]) -> EngineResult<()> {
        if bytes.len() != desc.byte_size() {
            return Err(gpu_operation_error(
                "upload texture",
                format!("'{}' expects {} bytes, got {}", desc.label, desc.byte_size(), bytes.len()),
            ));
        }
        if !self.textures.contains_key(&id) {
            self.create_resource(id, desc)?;
        }
        let target = self
            .textures
            .get(&id)
            .ok_or_else(|| gpu_operation_error("upload texture", format!("{:?} missing", id)))?;
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytes,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(desc.width * desc.format.bytes_per_texel()),
                rows_per_image: Some(desc.height),
            },
            target.texture.size(),
        );
        Ok(())
    }

    fn create_mesh(&mut self, mesh: MeshId, vertices: &[Vertex], indices: &[u32]) -> EngineResult<()> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(gpu_operation_error("create mesh", format!("{:?} has no geometry", mesh)));
        }
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_vertices"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_indices"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        self.meshes.insert(
            mesh,
            MeshBuffers {
                vertices: vertex_buffer,
                indices: index_buffer,
            },
        );
        log::debug!(
            "[WgpuBackend::create_mesh] {:?}: {} vertices, {} indices",
            mesh,
            vertices.len(),
            indices.len()
        );
        Ok(())
    }

    fn create_constant_buffers(&mut self, frame_slot: usize, layouts: &[ConstantLayout]) -> EngineResult<()> {
        for layout in layouts {
            let label = format!("{}_constants_{}", layout.buffer.label(), frame_slot);
            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&label),
                size: layout.byte_len().max(layout.stride) as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&label),
                layout: self.pipelines.constant_layout(),
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &buffer,
                        offset: 0,
                        size: NonZeroU64::new(layout.element_size as u64),
                    }),
                }],
            });
            self.constants.insert(
                (frame_slot, layout.buffer),
                ConstantBinding {
                    buffer,
                    bind_group,
                    stride: layout.stride as u64,
                    capacity: layout.capacity,
                },
            );
        }
        Ok(())
    }

    fn write_constants(
        &mut self,
        frame_slot: usize,
        buffer: ConstantBuffer,
        offset: u64,
        bytes: &[u8],
    ) -> EngineResult<()> {
        let binding = self.constants.get(&(frame_slot, buffer)).ok_or_else(|| {
            gpu_operation_error(
                "write constants",
                format!("no '{}' buffer for frame slot {}", buffer.label(), frame_slot),
            )
        })?;
        if offset + bytes.len() as u64 > binding.buffer.size() {
            return Err(gpu_operation_error(
                "write constants",
                format!("'{}' write of {} bytes at {} overflows", buffer.label(), bytes.len(), offset),
            ));
        }
        self.queue.write_buffer(&binding.buffer, offset, bytes);
        Ok(())
    }

    fn rebuild_descriptor_table(&mut self, table: &DescriptorTable) -> EngineResult<()> {
        self.table = table.clone();
        self.view_groups.clear();
        log::debug!(
            "[WgpuBackend::rebuild_descriptor_table] {} views, generation {}",
            self.table.len(),
            self.table.generation()
        );
        Ok(())
    }

    fn begin_frame(&mut self) -> EngineResult<bool> {
        self.frame = None;
        match self.surface.get_current_texture() {
            Ok(texture) => {
                let view = texture.texture.create_view(&wgpu::TextureViewDescriptor::default());
                self.frame = Some((texture, view));
                Ok(true)
            }
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                log::warn!("[WgpuBackend::begin_frame] Surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                Ok(false)
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("[WgpuBackend::begin_frame] Surface acquire timed out");
                Ok(false)
            }
            Err(e @ wgpu::SurfaceError::OutOfMemory) => {
                self.lost.lock().get_or_insert_with(|| e.to_string());
                Err(gpu_operation_error("acquire back buffer", e))
            }
        }
    }

    fn submit(&mut self, list: &CommandList, fence: u64) -> EngineResult<()> {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame_encoder"),
        });
        let commands = list.commands();
        let (ui, ui_buffers) = self.prepare(commands, &mut encoder)?;
        let segments = plan_segments(commands);
        self.encode_segments(&mut encoder, list.frame_slot(), commands, &segments, ui.as_ref())?;

        let index = self
            .queue
            .submit(ui_buffers.into_iter().chain(std::iter::once(encoder.finish())));
        self.timeline.track(&self.queue, fence, index);
        log::trace!(
            "[WgpuBackend::submit] {} commands in {} segments, fence {}",
            commands.len(),
            segments.len(),
            fence
        );
        Ok(())
    }

    fn present(&mut self) -> EngineResult<()> {
        let (texture, _view) = self
            .frame
            .take()
            .ok_or_else(|| gpu_operation_error("present", "no back buffer acquired"))?;
        texture.present();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> EngineResult<()> {
        self.frame = None;
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(&self.device, &self.config);
        self.view_groups.clear();
        log::info!("[WgpuBackend::resize] Surface reconfigured to {}x{}", width, height);
        Ok(())
    }

    fn check_device_health(&self) -> DeviceHealth {
        match self.lost.lock().as_ref() {
            Some(reason) => DeviceHealth::Lost {
                reason: reason.clone(),
            },
            None => DeviceHealth::Healthy,
        }
    }
}
