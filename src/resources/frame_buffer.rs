//! Frame Buffer Descriptors
//!
//! Pure data describing a 2D pixel surface. The actual storage lives in a
//! [`RenderDevice`](crate::renderer::device::RenderDevice) and is addressed by a
//! [`BufferHandle`](crate::renderer::device::BufferHandle).

use serde::{Deserialize, Serialize};

/// Texel format of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit normalized RGBA (LDR).
    #[default]
    Rgba8Unorm,
    /// 16-bit float RGBA (HDR).
    Rgba16Float,
    /// 32-bit float RGBA.
    Rgba32Float,
}

impl PixelFormat {
    /// Maps to the matching wgpu texture format.
    #[inline]
    #[must_use]
    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            Self::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            Self::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            Self::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        }
    }

    /// Inverse of [`to_wgpu`](Self::to_wgpu) for the supported formats.
    #[must_use]
    pub fn from_wgpu(format: wgpu::TextureFormat) -> Option<Self> {
        match format {
            wgpu::TextureFormat::Rgba8Unorm => Some(Self::Rgba8Unorm),
            wgpu::TextureFormat::Rgba16Float => Some(Self::Rgba16Float),
            wgpu::TextureFormat::Rgba32Float => Some(Self::Rgba32Float),
            _ => None,
        }
    }

    /// Returns `true` if values outside `[0, 1]` survive a write.
    #[inline]
    #[must_use]
    pub fn is_hdr(self) -> bool {
        !matches!(self, Self::Rgba8Unorm)
    }
}

/// Sampling filter used when a buffer is read by a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilterMode {
    /// Point sampling.
    Nearest,
    /// Bilinear sampling.
    #[default]
    Bilinear,
}

impl FilterMode {
    #[inline]
    #[must_use]
    pub fn to_wgpu(self) -> wgpu::FilterMode {
        match self {
            Self::Nearest => wgpu::FilterMode::Nearest,
            Self::Bilinear => wgpu::FilterMode::Linear,
        }
    }
}

/// Descriptor for a frame buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameBufferDesc {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub filter: FilterMode,
    /// Contents must survive a render pass that writes into the buffer
    /// without clearing it first. Devices honour this by loading the
    /// previous contents instead of clearing.
    pub restore_expected: bool,
    pub label: &'static str,
}

impl FrameBufferDesc {
    #[must_use]
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            filter: FilterMode::Bilinear,
            restore_expected: false,
            label: "Frame Buffer",
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    #[must_use]
    pub fn with_restore_expected(mut self, restore_expected: bool) -> Self {
        self.restore_expected = restore_expected;
        self
    }

    /// Returns a descriptor of the same format scaled down by `factor`.
    ///
    /// Integer division matches the host's `width / downSample` sizing;
    /// each dimension is kept at least one pixel wide.
    #[must_use]
    pub fn downsampled(&self, factor: u32) -> Self {
        let factor = factor.max(1);
        Self {
            width: (self.width / factor).max(1),
            height: (self.height / factor).max(1),
            ..self.clone()
        }
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    #[must_use]
    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downsample_uses_integer_division() {
        let desc = FrameBufferDesc::new(801, 601, PixelFormat::Rgba8Unorm);
        let half = desc.downsampled(2);
        assert_eq!(half.size(), (400, 300));
        assert_eq!(half.format, PixelFormat::Rgba8Unorm);
    }

    #[test]
    fn downsample_never_reaches_zero() {
        let desc = FrameBufferDesc::new(5, 3, PixelFormat::Rgba16Float);
        assert_eq!(desc.downsampled(8).size(), (1, 1));
        assert_eq!(desc.downsampled(0).size(), (5, 3));
    }
}
