pub mod bloom;
pub mod blur;
pub mod edge_detection;
pub mod fog;
pub mod frame_buffer;
pub mod motion_blur;
pub mod params;
pub mod settings;

pub use bloom::BloomSettings;
pub use blur::{BlurSettings, GaussianBlurSettings};
pub use edge_detection::{EdgeDetectionSettings, EdgeNormalsDepthSettings};
pub use fog::FogSettings;
pub use frame_buffer::{FilterMode, FrameBufferDesc, PixelFormat};
pub use motion_blur::{DepthMotionBlurSettings, MotionBlurSettings};
pub use params::{ParamSet, ParamValue};
pub use settings::PostFxSettings;
