//! Backend-neutral resource descriptors.
//!
//! These mirror the shape of the `wgpu` descriptors but only carry what the sprite
//! batch needs, so the mock backend can consume them without real GPU objects.

use bitflags::bitflags;

use crate::gpu_types::GpuTexture;

bitflags! {
    /// How a buffer is used by the pipeline.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Bound as a vertex input.
        const VERTEX = 1 << 0;
        /// Bound as an index input.
        const INDEX = 1 << 1;
        /// Bound as a uniform buffer.
        const UNIFORM = 1 << 2;
        /// Bound as a read-only storage buffer.
        const STORAGE_READ = 1 << 3;
        /// Bound as a read-write storage buffer.
        const STORAGE_READ_WRITE = 1 << 4;
        /// Source of a buffer-to-buffer copy.
        const COPY_SRC = 1 << 5;
        /// Destination of a buffer-to-buffer copy.
        const COPY_DST = 1 << 6;
        /// Host-writable staging memory.
        const STAGING = 1 << 7;
    }
}

impl BufferUsage {
    /// Convert to `wgpu` usages.
    ///
    /// Every buffer gets `COPY_DST` so it can be filled through `Queue::write_buffer`.
    /// Staging regions become `COPY_SRC | COPY_DST` buffers written through the queue.
    pub fn to_wgpu(self) -> wgpu::BufferUsages {
        let mut usages = wgpu::BufferUsages::COPY_DST;
        if self.contains(Self::VERTEX) {
            usages |= wgpu::BufferUsages::VERTEX;
        }
        if self.contains(Self::INDEX) {
            usages |= wgpu::BufferUsages::INDEX;
        }
        if self.contains(Self::UNIFORM) {
            usages |= wgpu::BufferUsages::UNIFORM;
        }
        if self.intersects(Self::STORAGE_READ | Self::STORAGE_READ_WRITE) {
            usages |= wgpu::BufferUsages::STORAGE;
        }
        if self.intersects(Self::COPY_SRC | Self::STAGING) {
            usages |= wgpu::BufferUsages::COPY_SRC;
        }
        usages
    }
}

/// Descriptor for [`RenderContext::create_buffer`](crate::RenderContext::create_buffer).
#[derive(Debug, Clone)]
pub struct BufferDesc<'a> {
    pub label: Option<&'a str>,
    /// Size in bytes
    pub size: u64,
    pub usage: BufferUsage,
}

bitflags! {
    /// How a texture is used by the pipeline.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const SAMPLED = 1 << 0;
        const RENDER_TARGET = 1 << 1;
        const COPY_SRC = 1 << 2;
        const COPY_DST = 1 << 3;
    }
}

impl TextureUsage {
    pub fn to_wgpu(self) -> wgpu::TextureUsages {
        let mut usages = wgpu::TextureUsages::empty();
        if self.contains(Self::SAMPLED) {
            usages |= wgpu::TextureUsages::TEXTURE_BINDING;
        }
        if self.contains(Self::RENDER_TARGET) {
            usages |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        if self.contains(Self::COPY_SRC) {
            usages |= wgpu::TextureUsages::COPY_SRC;
        }
        if self.contains(Self::COPY_DST) {
            usages |= wgpu::TextureUsages::COPY_DST;
        }
        usages
    }
}

/// Descriptor for a 2D texture.
#[derive(Debug, Clone)]
pub struct TextureDesc<'a> {
    pub label: Option<&'a str>,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub usage: TextureUsage,
}

/// Descriptor for a sampler.
#[derive(Debug, Clone)]
pub struct SamplerDesc<'a> {
    pub label: Option<&'a str>,
    pub filter: wgpu::FilterMode,
}

/// Layout of one vertex buffer slot.
#[derive(Debug, Clone)]
pub struct VertexLayout<'a> {
    /// Stride in bytes
    pub stride: u64,
    pub attributes: &'a [wgpu::VertexAttribute],
}

/// Descriptor for a render pipeline built from a single WGSL module.
///
/// Bind group layouts are derived from the shader; everything lives in group 0.
#[derive(Debug, Clone)]
pub struct RenderPipelineDesc<'a> {
    pub label: &'a str,
    pub shader_source: &'a str,
    pub vertex_entry: &'a str,
    pub fragment_entry: &'a str,
    pub vertex_buffers: &'a [VertexLayout<'a>],
    pub color_format: wgpu::TextureFormat,
    pub blend: Option<wgpu::BlendState>,
}

/// Descriptor for a compute pipeline built from a single WGSL module.
#[derive(Debug, Clone)]
pub struct ComputePipelineDesc<'a> {
    pub label: &'a str,
    pub shader_source: &'a str,
    pub entry_point: &'a str,
}

/// Color target of a render scope.
#[derive(Debug, Clone)]
pub struct RenderTargetDesc<'a> {
    pub label: Option<&'a str>,
    pub target: &'a GpuTexture,
    /// Clear to this color on load, or keep existing contents when `None`.
    pub clear_color: Option<[f64; 4]>,
}

/// Pipeline stage access used to describe a buffer barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferAccess {
    CopySrc,
    CopyDst,
    StorageRead,
    StorageWrite,
    UniformRead,
    VertexRead,
    IndexRead,
}
