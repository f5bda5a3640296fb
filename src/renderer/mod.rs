//! Rendering Layer
//!
//! - `device`: the [`RenderDevice`] seam and blit vocabulary
//! - `backend`: CPU reference and wgpu implementations of the seam
//! - `program`: program → material binding
//! - `graph`: pass chains, transient pool, cross-frame state
//! - `camera`: per-frame camera snapshot

pub mod backend;
pub mod camera;
pub mod device;
pub mod graph;
pub mod program;

pub use backend::{CpuDevice, CpuProgram, WgpuDevice};
pub use camera::{CameraState, DepthTextureMode};
pub use device::{
    Blit, BufferHandle, DeviceCapabilities, LoadOp, PassSelector, ProgramId, ProgramPass,
    RenderDevice,
};
pub use program::{Material, ProgramBinding};
