//! Pass Chain Orchestration
//!
//! Provides:
//! - PassChain / PassStep: declarative multi-pass ping-pong descriptions
//! - PassChainExecutor: runs a chain with per-slot acquire/release
//! - TransientBufferPool: scratch buffers for one invocation
//! - AccumulationBuffer / PreviousViewProjection: cross-frame state

pub mod chain;
pub mod executor;
pub mod persistent;
pub mod transient_pool;

pub use chain::{
    BLOOM_TEXTURE_PARAM, BLUR_SIZE_PARAM, BlurPasses, BlurSchedule, BufferRef, PassChain,
    PassStep, SlotLifetime, StepOp, TransientDesc, TransientSlot,
};
pub use executor::{ChainReport, PassChainExecutor};
pub use persistent::{AccumulationBuffer, PreviousViewProjection};
pub use transient_pool::{PoolFrameStats, TransientBufferPool};
