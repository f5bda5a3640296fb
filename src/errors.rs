//! Error Types
//!
//! This module defines the error types used throughout the post-processing
//! pipeline.
//!
//! # Overview
//!
//! The main error type [`PostFxError`] covers every failure mode of the
//! orchestration layer:
//! - Program resolution failures (unsupported platform / program)
//! - Buffer handle misuse (stale handles, double release)
//! - Malformed pass chains (read-before-write, in-place passes)
//! - Backend failures (GPU device creation, parameter packing)
//! - Settings (de)serialization errors
//!
//! None of these ever escape a frame: [`PostEffect::on_frame`] downgrades
//! them to a pass-through copy. They are surfaced by the lower-level APIs so
//! hosts and tests can observe exactly what went wrong.
//!
//! [`PostEffect::on_frame`]: crate::effects::PostEffect::on_frame

use thiserror::Error;

use crate::renderer::device::BufferHandle;

/// The main error type for the post-processing pipeline.
#[derive(Error, Debug)]
pub enum PostFxError {
    // ========================================================================
    // Program & Platform Errors
    // ========================================================================
    /// The device does not support image effects or render targets.
    #[error("Platform does not support image effects or render textures")]
    PlatformUnsupported,

    /// The program handle is unknown to the device or not supported by it.
    #[error("Shader program '{0}' is not supported on this device")]
    ProgramUnsupported(String),

    /// A pass index outside the program's pass list was requested.
    #[error("Pass index {index} out of range for program '{program}' ({pass_count} passes)")]
    PassOutOfRange {
        /// Program name
        program: String,
        /// Requested pass
        index: u32,
        /// Passes exposed by the program
        pass_count: u32,
    },

    /// A chain step requires a material but none was supplied.
    #[error("Pass step {0} requires a material but the program is unavailable")]
    MissingMaterial(usize),

    // ========================================================================
    // Buffer Errors
    // ========================================================================
    /// The handle does not refer to a live buffer (destroyed or never created).
    #[error("Invalid or stale frame buffer handle: {0:?}")]
    InvalidBuffer(BufferHandle),

    /// A buffer was released to the transient pool without being acquired.
    #[error("Frame buffer {0:?} released but not currently acquired from the pool")]
    NotAcquired(BufferHandle),

    /// A buffer was created with a zero dimension.
    #[error("Invalid frame buffer size {width}x{height}")]
    InvalidSize {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// A blit named the same buffer as its source and target.
    #[error("Frame buffer {0:?} cannot be read and written by the same blit")]
    InPlaceBlit(BufferHandle),

    // ========================================================================
    // Pass Chain Errors
    // ========================================================================
    /// The pass chain is malformed.
    #[error("Invalid pass chain at step {step}: {reason}")]
    InvalidChain {
        /// Offending step index
        step: usize,
        /// Human-readable description
        reason: String,
    },

    // ========================================================================
    // Backend Errors
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// The backend failed to execute a blit.
    #[error("Blit failed: {0}")]
    BlitFailed(String),

    /// A parameter does not match the program's declared uniform layout.
    #[error("Parameter '{name}' does not match the program layout: {reason}")]
    ParamLayout {
        /// Parameter name
        name: String,
        /// Description of the mismatch
        reason: String,
    },

    // ========================================================================
    // Settings Errors
    // ========================================================================
    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Alias for `Result<T, PostFxError>`.
pub type Result<T> = std::result::Result<T, PostFxError>;
