//! Expansion of sprite instances into drawable quads.
//!
//! Three interchangeable strategies produce the same triangles:
//!
//! - [`HostExpansion`] expands on the CPU and uploads vertices
//! - [`ComputeExpansion`] uploads instances and expands with a compute kernel
//! - [`PullExpansion`] uploads instances and builds vertices in the vertex shader
//!
//! Every frame a strategy first [`prepare`](ExpansionStrategy::prepare)s, which
//! records the uploads and any compute work outside the render scope, then
//! [`draw`](ExpansionStrategy::draw)s inside it.

mod compute;
mod host;
mod pull;
pub mod reference;

pub use compute::ComputeExpansion;
pub use host::HostExpansion;
pub use pull::PullExpansion;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use spritebatch_test_utils::{
    BufferDesc, BufferUsage, CommandStream, GpuBuffer, GpuRenderPipeline, GpuSampler, GpuTexture,
    RenderContext, RenderPipelineDesc, SamplerDesc, VertexLayout,
};
use static_assertions::const_assert_eq;

use crate::config::{ExpansionKind, SpriteBatchConfig};
use crate::error::BatchError;
use crate::instance::SpriteInstance;
use crate::staging::StagingRing;
use crate::vertex::quad_indices;

/// Label of the expansion compute pipeline.
pub const EXPAND_KERNEL_LABEL: &str = "expand_sprites";
/// Label of the render pipeline fed by expanded vertices.
pub const VERTEX_PIPELINE_LABEL: &str = "sprite_vertex";
/// Label of the vertex-pulling render pipeline.
pub const PULL_PIPELINE_LABEL: &str = "sprite_pull";

pub(crate) const SPRITE_VERTEX_SHADER: &str = include_str!("../shaders/sprite_vertex.wgsl");
pub(crate) const SPRITE_PULL_SHADER: &str = include_str!("../shaders/sprite_pull.wgsl");
pub(crate) const EXPAND_SPRITES_SHADER: &str = include_str!("../shaders/expand_sprites.wgsl");

/// Bindings of group 0, shared by every sprite shader.
pub mod bindings {
    pub const FRAME_UNIFORMS: u32 = 0;
    pub const INSTANCES: u32 = 1;
    pub const VERTICES: u32 = 2;
    pub const TEXTURE: u32 = 3;
    pub const SAMPLER: u32 = 4;
}

/// Per-frame uniforms, matching `struct FrameUniforms` in the shaders.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    /// Live sprites this frame.
    pub sprite_count: u32,
    pub _pad: [u32; 3],
}

const_assert_eq!(std::mem::size_of::<FrameUniforms>(), 80);

impl FrameUniforms {
    pub fn new(view_proj: Mat4, sprite_count: u32) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            sprite_count,
            _pad: [0; 3],
        }
    }
}

/// What a strategy recorded in `prepare`, consumed by its `draw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawParams {
    /// Sprites to draw.
    pub live: u32,
    pub bytes_uploaded: u64,
    pub dispatches: u32,
}

impl DrawParams {
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

/// Resources every strategy binds: frame uniforms, texture and sampler.
pub struct SharedResources {
    uniforms: StagingRing<FrameUniforms>,
    uniform_buffer: GpuBuffer,
    texture: GpuTexture,
    sampler: GpuSampler,
}

impl SharedResources {
    pub fn new(
        ctx: &dyn RenderContext,
        config: &SpriteBatchConfig,
        texture: GpuTexture,
    ) -> Result<Self, BatchError> {
        let label = format!("{}_uniforms", config.label);
        let uniforms = StagingRing::new(ctx, &label, 1, config.ring_depth)?;
        let uniform_buffer = ctx.create_buffer(&BufferDesc {
            label: Some(&label),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        });
        let sampler = ctx.create_sampler(&SamplerDesc {
            label: Some(&format!("{}_sampler", config.label)),
            filter: wgpu::FilterMode::Linear,
        });

        Ok(Self {
            uniforms,
            uniform_buffer,
            texture,
            sampler,
        })
    }

    pub fn uniform_buffer(&self) -> &GpuBuffer {
        &self.uniform_buffer
    }

    pub fn texture(&self) -> &GpuTexture {
        &self.texture
    }

    pub fn set_texture(&mut self, texture: GpuTexture, sampler: Option<GpuSampler>) {
        self.texture = texture;
        if let Some(sampler) = sampler {
            self.sampler = sampler;
        }
    }

    /// Stage `frame`'s uniforms.
    pub fn write_uniforms(
        &mut self,
        ctx: &dyn RenderContext,
        frame: u64,
        uniforms: FrameUniforms,
    ) -> Result<(), BatchError> {
        let mut writer = self.uniforms.begin_write(ctx, frame)?;
        writer.push(uniforms)?;
        writer.finish();
        Ok(())
    }

    /// Record the uniform copy. Must be inside a copy scope.
    pub fn upload_uniforms(&self, stream: &mut dyn CommandStream) -> Result<u64, BatchError> {
        self.uniforms.upload_to(stream, &self.uniform_buffer)
    }

    /// Bind uniforms, texture and sampler for the bound render pipeline.
    pub fn bind_material(&self, stream: &mut dyn CommandStream) -> Result<(), BatchError> {
        stream.bind_uniform_buffer(bindings::FRAME_UNIFORMS, &self.uniform_buffer)?;
        stream.bind_texture(bindings::TEXTURE, &self.texture)?;
        stream.bind_sampler(bindings::SAMPLER, &self.sampler)?;
        Ok(())
    }

    pub fn notify_frame_completed(&mut self, frame: u64) {
        self.uniforms.notify_frame_completed(frame);
    }
}

/// One way of turning sprite instances into triangles.
pub trait ExpansionStrategy: Send {
    fn kind(&self) -> ExpansionKind;

    /// Stage `frame`'s data and record uploads and expansion work.
    ///
    /// Called with no scope open; uniforms must already be staged in `shared`.
    fn prepare(
        &mut self,
        ctx: &dyn RenderContext,
        stream: &mut dyn CommandStream,
        frame: u64,
        instances: &[SpriteInstance],
        shared: &SharedResources,
    ) -> Result<DrawParams, BatchError>;

    /// Record the draw inside an open render scope, returning the draw calls recorded.
    fn draw(
        &self,
        stream: &mut dyn CommandStream,
        params: &DrawParams,
        shared: &SharedResources,
    ) -> Result<u32, BatchError>;

    /// Forward GPU completion to the strategy's staging rings.
    fn notify_frame_completed(&mut self, frame: u64);
}

/// Build the strategy for a resolved expansion kind.
pub fn create_strategy(
    ctx: &dyn RenderContext,
    config: &SpriteBatchConfig,
    kind: ExpansionKind,
) -> Result<Box<dyn ExpansionStrategy>, BatchError> {
    Ok(match kind {
        ExpansionKind::Host => Box::new(HostExpansion::new(ctx, config)?),
        ExpansionKind::Compute => Box::new(ComputeExpansion::new(ctx, config)?),
        ExpansionKind::Pull => Box::new(PullExpansion::new(ctx, config)?),
        ExpansionKind::Auto => {
            return create_strategy(ctx, config, config.resolve_expansion(ctx.supports_compute()));
        }
    })
}

/// Shared index buffer for `max_sprites` quads, uploaded once.
pub(crate) fn create_index_buffer(ctx: &dyn RenderContext, config: &SpriteBatchConfig) -> GpuBuffer {
    let indices = quad_indices(config.max_sprites.max(1));
    let buffer = ctx.create_buffer(&BufferDesc {
        label: Some(&format!("{}_indices", config.label)),
        size: std::mem::size_of_val(indices.as_slice()) as u64,
        usage: BufferUsage::INDEX | BufferUsage::COPY_DST,
    });
    ctx.write_buffer(&buffer, 0, bytemuck::cast_slice(&indices));
    ctx.wait_idle();
    buffer
}

pub(crate) fn create_sprite_pipeline(
    ctx: &dyn RenderContext,
    config: &SpriteBatchConfig,
    label: &str,
    shader_source: &str,
    vertex_buffers: &[VertexLayout<'_>],
) -> GpuRenderPipeline {
    ctx.create_render_pipeline(&RenderPipelineDesc {
        label,
        shader_source,
        vertex_entry: "vs_main",
        fragment_entry: "fs_main",
        vertex_buffers,
        color_format: config.color_format,
        blend: config.blend,
    })
}
