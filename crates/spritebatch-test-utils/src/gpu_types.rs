//! Opaque resource handles returned by a [`RenderContext`](crate::RenderContext).
//!
//! A handle is either a live `wgpu` object or, with the `mock` feature, an id
//! into the mock backend's tables. The sprite batch only ever stores and passes
//! handles around; the backend that created a handle is the one that unwraps it.

use crate::descriptors::BufferUsage;

/// Live `wgpu` object or mock table id.
#[derive(Clone, Debug)]
enum Handle<T> {
    Live(T),
    #[cfg(feature = "mock")]
    Mock(usize),
}

impl<T> Handle<T> {
    /// Unwrap the live object. Mock handles never reach the wgpu backend, so
    /// hitting one here is a programming error.
    #[cfg_attr(not(feature = "mock"), allow(unused_variables))]
    fn live(&self, what: &'static str) -> &T {
        match self {
            Handle::Live(inner) => inner,
            #[cfg(feature = "mock")]
            Handle::Mock(id) => panic!("mock {what} #{id} passed to the wgpu backend"),
        }
    }

    #[cfg(feature = "mock")]
    fn mock_id(&self) -> Option<usize> {
        match self {
            Handle::Mock(id) => Some(*id),
            Handle::Live(_) => None,
        }
    }
}

/// A GPU buffer. Cloning shares the underlying allocation.
#[derive(Clone, Debug)]
pub struct GpuBuffer {
    handle: Handle<wgpu::Buffer>,
    size: u64,
    usage: BufferUsage,
}

impl GpuBuffer {
    pub fn from_wgpu(buffer: wgpu::Buffer, usage: BufferUsage) -> Self {
        Self {
            size: buffer.size(),
            handle: Handle::Live(buffer),
            usage,
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock(id: usize, size: u64, usage: BufferUsage) -> Self {
        Self {
            handle: Handle::Mock(id),
            size,
            usage,
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// # Panics
    /// Panics on a mock buffer.
    pub fn as_wgpu(&self) -> &wgpu::Buffer {
        self.handle.live("buffer")
    }

    #[cfg(feature = "mock")]
    pub fn mock_id(&self) -> Option<usize> {
        self.handle.mock_id()
    }
}

/// A 2D texture together with its default view.
#[derive(Clone, Debug)]
pub struct GpuTexture {
    handle: Handle<(wgpu::Texture, wgpu::TextureView)>,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
}

impl GpuTexture {
    pub fn from_wgpu(texture: wgpu::Texture) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            width: texture.width(),
            height: texture.height(),
            format: texture.format(),
            handle: Handle::Live((texture, view)),
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock(id: usize, width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            handle: Handle::Mock(id),
            width,
            height,
            format,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// # Panics
    /// Panics on a mock texture.
    pub fn as_wgpu(&self) -> &wgpu::Texture {
        &self.handle.live("texture").0
    }

    /// Default full-texture view.
    ///
    /// # Panics
    /// Panics on a mock texture.
    pub fn view(&self) -> &wgpu::TextureView {
        &self.handle.live("texture").1
    }

    #[cfg(feature = "mock")]
    pub fn mock_id(&self) -> Option<usize> {
        self.handle.mock_id()
    }
}

#[derive(Clone, Debug)]
pub struct GpuSampler {
    handle: Handle<wgpu::Sampler>,
}

impl GpuSampler {
    pub fn from_wgpu(sampler: wgpu::Sampler) -> Self {
        Self {
            handle: Handle::Live(sampler),
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock(id: usize) -> Self {
        Self {
            handle: Handle::Mock(id),
        }
    }

    pub fn as_wgpu(&self) -> &wgpu::Sampler {
        self.handle.live("sampler")
    }

    #[cfg(feature = "mock")]
    pub fn mock_id(&self) -> Option<usize> {
        self.handle.mock_id()
    }
}

/// A render pipeline plus the label it was created with. The mock backend
/// keys its behavior on the label.
#[derive(Clone, Debug)]
pub struct GpuRenderPipeline {
    handle: Handle<wgpu::RenderPipeline>,
    label: String,
}

impl GpuRenderPipeline {
    pub fn from_wgpu(pipeline: wgpu::RenderPipeline, label: impl Into<String>) -> Self {
        Self {
            handle: Handle::Live(pipeline),
            label: label.into(),
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock(id: usize, label: impl Into<String>) -> Self {
        Self {
            handle: Handle::Mock(id),
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn as_wgpu(&self) -> &wgpu::RenderPipeline {
        self.handle.live("render pipeline")
    }

    #[cfg(feature = "mock")]
    pub fn mock_id(&self) -> Option<usize> {
        self.handle.mock_id()
    }
}

/// A compute pipeline plus its label. Mock kernels are registered per label.
#[derive(Clone, Debug)]
pub struct GpuComputePipeline {
    handle: Handle<wgpu::ComputePipeline>,
    label: String,
}

impl GpuComputePipeline {
    pub fn from_wgpu(pipeline: wgpu::ComputePipeline, label: impl Into<String>) -> Self {
        Self {
            handle: Handle::Live(pipeline),
            label: label.into(),
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock(id: usize, label: impl Into<String>) -> Self {
        Self {
            handle: Handle::Mock(id),
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn as_wgpu(&self) -> &wgpu::ComputePipeline {
        self.handle.live("compute pipeline")
    }

    #[cfg(feature = "mock")]
    pub fn mock_id(&self) -> Option<usize> {
        self.handle.mock_id()
    }
}
