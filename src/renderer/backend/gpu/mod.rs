//! wgpu Backend
//!
//! [`WgpuDevice`] implements [`RenderDevice`] on top of a `wgpu::Device`.
//!
//! - Frame buffers are 2D textures usable as render attachment, sampled
//!   texture and copy source/destination.
//! - Raw copies between buffers of identical size and format use
//!   `copy_texture_to_texture`; anything else goes through a built-in
//!   resampling blit pipeline.
//! - Program passes run full-screen pipelines compiled lazily per
//!   `(program, pass, target format)` and cached for the device lifetime.
//!
//! Each blit is encoded and submitted on its own. Post-processing chains are
//! short, and submission order is execution order.

mod program;

pub use program::{GpuPassDesc, GpuProgramDesc, UniformField, UniformKind, pack_uniforms};

use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use smallvec::SmallVec;
use wgpu::util::DeviceExt;

use crate::errors::{PostFxError, Result};
use crate::renderer::device::{
    Blit, BufferHandle, DeviceCapabilities, LoadOp, PassSelector, ProgramId, ProgramPass,
    RenderDevice,
};
use crate::resources::frame_buffer::{FilterMode, FrameBufferDesc, PixelFormat};
use crate::resources::params::ParamSet;

use self::program::GpuProgram;

pub(crate) const FULLSCREEN_WGSL: &str = include_str!("fullscreen.wgsl");
const BLIT_WGSL: &str = include_str!("blit.wgsl");

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

struct GpuBuffer {
    desc: FrameBufferDesc,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum PipelineKey {
    Blit {
        format: wgpu::TextureFormat,
    },
    Pass {
        program: ProgramId,
        pass: u32,
        format: wgpu::TextureFormat,
    },
}

/// GPU render device.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    capabilities: DeviceCapabilities,

    buffers: SlotMap<BufferHandle, GpuBuffer>,
    programs: Vec<GpuProgram>,
    pipelines: FxHashMap<PipelineKey, wgpu::RenderPipeline>,

    blit_module: wgpu::ShaderModule,
    blit_layout: wgpu::BindGroupLayout,
    blit_pipeline_layout: wgpu::PipelineLayout,

    linear_sampler: wgpu::Sampler,
    nearest_sampler: wgpu::Sampler,
    /// Bound in place of declared textures that are not set.
    _fallback_texture: wgpu::Texture,
    fallback_view: wgpu::TextureView,
}

impl WgpuDevice {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let blit_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("PostFx Blit Shader"),
            source: wgpu::ShaderSource::Wgsl(format!("{FULLSCREEN_WGSL}\n{BLIT_WGSL}").into()),
        });

        let blit_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("PostFx Blit Layout"),
            entries: &[
                texture_entry(0),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let blit_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("PostFx Blit Pipeline Layout"),
            bind_group_layouts: &[Some(&blit_layout)],
            immediate_size: 0,
        });

        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("PostFx Linear Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let nearest_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("PostFx Nearest Sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let fallback_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("PostFx Fallback Texture"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let fallback_view = fallback_texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            device,
            queue,
            capabilities: DeviceCapabilities::FULL,
            buffers: SlotMap::with_key(),
            programs: Vec::new(),
            pipelines: FxHashMap::default(),
            blit_module,
            blit_layout,
            blit_pipeline_layout,
            linear_sampler,
            nearest_sampler,
            _fallback_texture: fallback_texture,
            fallback_view,
        }
    }

    /// Creates a device on the default adapter without any surface.
    pub fn new_headless() -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| PostFxError::AdapterRequestFailed(e.to_string()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("PostFx Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        }))?;

        Ok(Self::new(device, queue))
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn set_capabilities(&mut self, capabilities: DeviceCapabilities) {
        self.capabilities = capabilities;
    }

    /// Compiles a program and returns its id.
    pub fn register_program(&mut self, desc: GpuProgramDesc) -> ProgramId {
        let id = ProgramId::from_index(self.programs.len());
        log::debug!("Registering program '{}' ({} passes)", desc.name, desc.passes.len());
        self.programs.push(GpuProgram::new(&self.device, desc));
        id
    }

    pub fn set_program_supported(&mut self, program: ProgramId, supported: bool) {
        if let Some(entry) = self.programs.get_mut(program.index()) {
            entry.supported = supported;
        }
    }

    /// Wraps a host-owned texture (e.g. the camera's color target) as a
    /// frame buffer. The texture must use one of the [`PixelFormat`]s.
    pub fn import_texture(
        &mut self,
        texture: wgpu::Texture,
        label: &'static str,
    ) -> Result<BufferHandle> {
        let format = PixelFormat::from_wgpu(texture.format()).ok_or_else(|| {
            PostFxError::ParamLayout {
                name: label.to_string(),
                reason: format!("unsupported texture format {:?}", texture.format()),
            }
        })?;
        let desc =
            FrameBufferDesc::new(texture.width(), texture.height(), format).with_label(label);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(self.buffers.insert(GpuBuffer {
            desc,
            texture,
            view,
        }))
    }

    #[must_use]
    pub fn texture(&self, handle: BufferHandle) -> Option<&wgpu::Texture> {
        self.buffers.get(handle).map(|b| &b.texture)
    }

    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn sampler(&self, filter: FilterMode) -> &wgpu::Sampler {
        match filter {
            FilterMode::Nearest => &self.nearest_sampler,
            FilterMode::Bilinear => &self.linear_sampler,
        }
    }

    fn buffer(&self, handle: BufferHandle) -> Result<&GpuBuffer> {
        self.buffers
            .get(handle)
            .ok_or(PostFxError::InvalidBuffer(handle))
    }

    fn program(&self, id: ProgramId) -> Result<&GpuProgram> {
        self.programs
            .get(id.index())
            .ok_or_else(|| PostFxError::ProgramUnsupported(format!("#{}", id.index())))
    }

    fn selected_passes(&self, selection: ProgramPass) -> Result<SmallVec<[u32; 4]>> {
        let program = self.program(selection.program)?;
        if !program.supported {
            return Err(PostFxError::ProgramUnsupported(program.desc.name.clone()));
        }
        let count = program.desc.passes.len() as u32;
        match selection.pass {
            PassSelector::All => Ok((0..count).collect()),
            PassSelector::Index(index) if index < count => Ok(smallvec::smallvec![index]),
            PassSelector::Index(index) => Err(PostFxError::PassOutOfRange {
                program: program.desc.name.clone(),
                index,
                pass_count: count,
            }),
        }
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) -> Result<()> {
        if self.pipelines.contains_key(&key) {
            return Ok(());
        }

        let (module, layout, entry_point, blend, format, label) = match key {
            PipelineKey::Blit { format } => (
                &self.blit_module,
                &self.blit_pipeline_layout,
                "fs_blit",
                Some(wgpu::BlendState::REPLACE),
                format,
                "PostFx Blit".to_string(),
            ),
            PipelineKey::Pass {
                program,
                pass,
                format,
            } => {
                let entry = self.program(program)?;
                let pass_desc =
                    entry
                        .desc
                        .passes
                        .get(pass as usize)
                        .ok_or_else(|| PostFxError::PassOutOfRange {
                            program: entry.desc.name.clone(),
                            index: pass,
                            pass_count: entry.desc.passes.len() as u32,
                        })?;
                (
                    &entry.module,
                    &entry.pipeline_layout,
                    pass_desc.entry_point.as_str(),
                    pass_desc.blend,
                    format,
                    format!("{} / pass {pass}", entry.desc.name),
                )
            }
        };

        log::debug!("Compiling pipeline '{label}' for {format:?}");
        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label.as_str()),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some(entry_point),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        self.pipelines.insert(key, pipeline);
        Ok(())
    }

    fn copy_texture(&self, source: &GpuBuffer, target: &GpuBuffer) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("PostFx Copy"),
            });
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &source.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: source.desc.width,
                height: source.desc.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn draw_copy(&mut self, blit: &Blit<'_>) -> Result<()> {
        let format = self.buffer(blit.target)?.desc.format.to_wgpu();
        let key = PipelineKey::Blit { format };
        self.ensure_pipeline(key)?;

        let source = self.buffer(blit.source)?;
        let target = self.buffer(blit.target)?;
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("PostFx Blit BindGroup"),
            layout: &self.blit_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&source.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(self.sampler(source.desc.filter)),
                },
            ],
        });

        let pipeline = self.pipelines.get(&key).ok_or_else(|| {
            PostFxError::BlitFailed("blit pipeline missing after compilation".to_string())
        })?;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("PostFx Blit"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("PostFx Blit Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: load_op(blit.load),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                ..Default::default()
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn draw_program(&mut self, blit: &Blit<'_>, selection: ProgramPass) -> Result<()> {
        let passes = self.selected_passes(selection)?;
        let format = self.buffer(blit.target)?.desc.format.to_wgpu();
        for &pass in &passes {
            self.ensure_pipeline(PipelineKey::Pass {
                program: selection.program,
                pass,
                format,
            })?;
        }

        let empty = ParamSet::new();
        let params = blit.params.unwrap_or(&empty);
        let program = self.program(selection.program)?;
        let bytes = pack_uniforms(&program.desc.uniforms, params)?;
        let uniforms = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("PostFx Params"),
                contents: &bytes,
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let source = self.buffer(blit.source)?;
        let target = self.buffer(blit.target)?;

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(self.sampler(source.desc.filter)),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&source.view),
            },
        ];
        for (i, name) in program.desc.textures.iter().enumerate() {
            let view = match params.get_texture(name) {
                Some(handle) if handle == blit.target => {
                    return Err(PostFxError::InPlaceBlit(handle));
                }
                Some(handle) => &self.buffer(handle)?.view,
                None => &self.fallback_view,
            };
            entries.push(wgpu::BindGroupEntry {
                binding: 3 + i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(program.desc.name.as_str()),
            layout: &program.layout,
            entries: &entries,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(program.desc.name.as_str()),
            });
        for (n, &pass) in passes.iter().enumerate() {
            let key = PipelineKey::Pass {
                program: selection.program,
                pass,
                format,
            };
            let pipeline = self.pipelines.get(&key).ok_or_else(|| {
                PostFxError::BlitFailed(format!("pipeline for pass {pass} missing"))
            })?;
            // Later passes of a PassSelector::All draw over the earlier ones.
            let load = if n == 0 {
                load_op(blit.load)
            } else {
                wgpu::LoadOp::Load
            };

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(program.desc.name.as_str()),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                ..Default::default()
            });
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

fn load_op(load: LoadOp) -> wgpu::LoadOp<wgpu::Color> {
    match load {
        LoadOp::Clear => wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
        LoadOp::Load => wgpu::LoadOp::Load,
    }
}

impl RenderDevice for WgpuDevice {
    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn create_buffer(&mut self, desc: &FrameBufferDesc) -> Result<BufferHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(PostFxError::InvalidSize {
                width: desc.width,
                height: desc.height,
            });
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format.to_wgpu(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(self.buffers.insert(GpuBuffer {
            desc: desc.clone(),
            texture,
            view,
        }))
    }

    fn destroy_buffer(&mut self, handle: BufferHandle) -> Result<()> {
        let buffer = self
            .buffers
            .remove(handle)
            .ok_or(PostFxError::InvalidBuffer(handle))?;
        buffer.texture.destroy();
        Ok(())
    }

    fn buffer_desc(&self, handle: BufferHandle) -> Option<&FrameBufferDesc> {
        self.buffers.get(handle).map(|b| &b.desc)
    }

    fn set_filter_mode(&mut self, handle: BufferHandle, filter: FilterMode) -> Result<()> {
        let buffer = self
            .buffers
            .get_mut(handle)
            .ok_or(PostFxError::InvalidBuffer(handle))?;
        buffer.desc.filter = filter;
        Ok(())
    }

    fn program_name(&self, program: ProgramId) -> Option<&str> {
        self.programs
            .get(program.index())
            .map(|p| p.desc.name.as_str())
    }

    fn is_program_supported(&self, program: ProgramId) -> bool {
        self.programs
            .get(program.index())
            .is_some_and(|p| p.supported)
    }

    fn pass_count(&self, program: ProgramId) -> u32 {
        self.programs
            .get(program.index())
            .map_or(0, |p| p.desc.passes.len() as u32)
    }

    fn blit(&mut self, blit: &Blit<'_>) -> Result<()> {
        if blit.source == blit.target {
            return Err(PostFxError::InPlaceBlit(blit.target));
        }
        let same_layout = {
            let source = &self.buffer(blit.source)?.desc;
            let target = &self.buffer(blit.target)?.desc;
            source.size() == target.size() && source.format == target.format
        };

        match blit.program {
            None if same_layout => {
                self.copy_texture(self.buffer(blit.source)?, self.buffer(blit.target)?);
                Ok(())
            }
            None => self.draw_copy(blit),
            Some(selection) => self.draw_program(blit, selection),
        }
    }

    fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }
}
