//! GPU Programs
//!
//! A [`GpuProgramDesc`] describes a multi-pass post-processing program in
//! WGSL. The fragment source is appended to the shared full-screen vertex
//! stage (`vs_main`, `FullscreenOutput`), and every pass names its fragment
//! entry point.
//!
//! # Binding Layout (group 0)
//!
//! | Binding | Resource                                     |
//! |---------|----------------------------------------------|
//! | 0       | `params` uniform block (declared uniforms)   |
//! | 1       | sampler (filter mode of the source buffer)   |
//! | 2       | `_MainTex`, the blit source                  |
//! | 3..     | declared textures, in declaration order      |
//!
//! # Uniform Packing
//!
//! Each declared uniform occupies whole 16-byte slots so the block lines up
//! with a WGSL struct of `vec4<f32>` / `mat4x4<f32>` members: floats are
//! written to `.x` of a `vec4<f32>`, colors and vectors fill a `vec4<f32>`,
//! matrices take four column slots.

use std::borrow::Cow;

use crate::errors::{PostFxError, Result};
use crate::resources::params::{ParamSet, ParamValue};

/// Type of a declared uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Vector,
    Color,
    Matrix,
}

impl UniformKind {
    fn slots(self) -> usize {
        match self {
            Self::Matrix => 4,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UniformField {
    pub name: &'static str,
    pub kind: UniformKind,
}

/// One pass of a program.
#[derive(Debug, Clone)]
pub struct GpuPassDesc {
    pub entry_point: String,
    pub blend: Option<wgpu::BlendState>,
}

/// WGSL program description.
#[derive(Debug, Clone)]
pub struct GpuProgramDesc {
    pub name: String,
    pub source: String,
    pub passes: Vec<GpuPassDesc>,
    pub uniforms: Vec<UniformField>,
    pub textures: Vec<&'static str>,
}

impl GpuProgramDesc {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            passes: Vec::new(),
            uniforms: Vec::new(),
            textures: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_pass(
        mut self,
        entry_point: impl Into<String>,
        blend: Option<wgpu::BlendState>,
    ) -> Self {
        self.passes.push(GpuPassDesc {
            entry_point: entry_point.into(),
            blend,
        });
        self
    }

    #[must_use]
    pub fn with_uniform(mut self, name: &'static str, kind: UniformKind) -> Self {
        self.uniforms.push(UniformField { name, kind });
        self
    }

    #[must_use]
    pub fn with_texture(mut self, name: &'static str) -> Self {
        self.textures.push(name);
        self
    }

    /// Size of the packed uniform block in bytes (never zero).
    #[must_use]
    pub fn uniform_size(&self) -> usize {
        let slots: usize = self.uniforms.iter().map(|u| u.kind.slots()).sum();
        slots.max(1) * 16
    }
}

/// Packs `params` following the program's declared uniform layout.
///
/// Unset parameters pack as zero. A parameter of the wrong kind is an error.
pub fn pack_uniforms(fields: &[UniformField], params: &ParamSet) -> Result<Vec<u8>> {
    let mut floats: Vec<f32> = Vec::with_capacity(fields.len() * 4);

    for field in fields {
        match (field.kind, params.get(field.name)) {
            (kind, None) => floats.extend(std::iter::repeat_n(0.0, kind.slots() * 4)),
            (UniformKind::Float, Some(ParamValue::Float(v))) => {
                floats.extend_from_slice(&[*v, 0.0, 0.0, 0.0]);
            }
            (
                UniformKind::Vector | UniformKind::Color,
                Some(ParamValue::Vector(v) | ParamValue::Color(v)),
            ) => floats.extend_from_slice(&v.to_array()),
            (UniformKind::Matrix, Some(ParamValue::Matrix(m))) => {
                floats.extend_from_slice(&m.to_cols_array());
            }
            (kind, Some(value)) => {
                return Err(PostFxError::ParamLayout {
                    name: field.name.to_string(),
                    reason: format!("declared as {kind:?}, set as {}", value.kind()),
                });
            }
        }
    }

    if floats.is_empty() {
        floats.resize(4, 0.0);
    }
    Ok(bytemuck::cast_slice(&floats).to_vec())
}

/// A program compiled on a device.
pub(super) struct GpuProgram {
    pub desc: GpuProgramDesc,
    pub module: wgpu::ShaderModule,
    pub layout: wgpu::BindGroupLayout,
    pub pipeline_layout: wgpu::PipelineLayout,
    pub supported: bool,
}

impl GpuProgram {
    pub fn new(device: &wgpu::Device, desc: GpuProgramDesc) -> Self {
        let source = format!("{}\n{}", super::FULLSCREEN_WGSL, desc.source);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.name.as_str()),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(source)),
        });

        let mut entries = vec![
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ];
        // _MainTex followed by the declared textures
        for binding in 2..3 + desc.textures.len() as u32 {
            entries.push(super::texture_entry(binding));
        }

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(desc.name.as_str()),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(desc.name.as_str()),
            bind_group_layouts: &[Some(&layout)],
            immediate_size: 0,
        });

        let supported = !desc.passes.is_empty();
        if !supported {
            log::warn!("Program '{}' declares no passes", desc.name);
        }

        Self {
            desc,
            module,
            layout,
            pipeline_layout,
            supported,
        }
    }
}
