//! Render Device Backends
//!
//! - [`CpuDevice`]: software reference implementation
//! - [`WgpuDevice`]: GPU implementation on wgpu

pub mod cpu;
pub mod gpu;

pub use cpu::{
    BlendMode, BlitRecord, CpuDevice, CpuImage, CpuProgram, FnProgram, IdentityProgram,
    ShadeContext,
};
pub use gpu::{GpuProgramDesc, UniformKind, WgpuDevice};
