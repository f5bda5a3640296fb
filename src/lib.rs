#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Screen-space post-processing effects built on a multi-pass render-target
//! ping-pong protocol.
//!
//! - [`renderer`]: device seam, backends, pass chains, transient pool and
//!   cross-frame state
//! - [`effects`]: bloom, blur, edge detection, fog and motion blur plugged in
//!   through the [`PostEffect`] lifecycle
//! - [`resources`]: frame buffer descriptors, parameter sets and settings

pub mod effects;
pub mod errors;
pub mod renderer;
pub mod resources;

pub use effects::{
    Bloom, DepthFog, DepthMotionBlur, EdgeDetection, EdgeNormalsDepth, EffectStack, FrameContext,
    FrameOutcome, GaussianBlur, InjectionPoint, MotionBlur, PostEffect,
};
pub use errors::{PostFxError, Result};
pub use renderer::graph::{PassChain, PassChainExecutor, TransientBufferPool};
pub use renderer::{BufferHandle, CameraState, CpuDevice, RenderDevice, WgpuDevice};
pub use resources::{FrameBufferDesc, PixelFormat, PostFxSettings};
