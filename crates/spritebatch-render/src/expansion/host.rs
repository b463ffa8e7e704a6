use spritebatch_core::profiling::{profile_function, profile_scope};
use spritebatch_test_utils::{
    BufferDesc, BufferUsage, CommandStream, GpuBuffer, GpuRenderPipeline, RenderContext,
};

use super::reference::expand_instance;
use super::{
    DrawParams, ExpansionStrategy, SharedResources, SPRITE_VERTEX_SHADER, VERTEX_PIPELINE_LABEL,
    create_index_buffer, create_sprite_pipeline,
};
use crate::config::{ExpansionKind, SpriteBatchConfig};
use crate::error::BatchError;
use crate::instance::SpriteInstance;
use crate::staging::StagingRing;
use crate::vertex::{INDICES_PER_SPRITE, QuadVertex, VERTICES_PER_SPRITE};

/// Expands sprites on the CPU into a vertex staging ring.
///
/// Works on any device. Upload size is four vertices (192 bytes) per sprite.
pub struct HostExpansion {
    vertices: StagingRing<QuadVertex>,
    vertex_buffer: GpuBuffer,
    index_buffer: GpuBuffer,
    pipeline: GpuRenderPipeline,
}

impl HostExpansion {
    pub fn new(ctx: &dyn RenderContext, config: &SpriteBatchConfig) -> Result<Self, BatchError> {
        let vertex_capacity = config.max_sprites * VERTICES_PER_SPRITE;
        let label = format!("{}_vertices", config.label);
        let vertices = StagingRing::new(ctx, &label, vertex_capacity, config.ring_depth)?;
        let vertex_buffer = ctx.create_buffer(&BufferDesc {
            label: Some(&label),
            size: vertex_capacity.max(1) as u64 * QuadVertex::SIZE,
            usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
        });
        let index_buffer = create_index_buffer(ctx, config);
        let pipeline = create_sprite_pipeline(
            ctx,
            config,
            VERTEX_PIPELINE_LABEL,
            SPRITE_VERTEX_SHADER,
            &[QuadVertex::layout()],
        );

        Ok(Self {
            vertices,
            vertex_buffer,
            index_buffer,
            pipeline,
        })
    }
}

impl ExpansionStrategy for HostExpansion {
    fn kind(&self) -> ExpansionKind {
        ExpansionKind::Host
    }

    fn prepare(
        &mut self,
        ctx: &dyn RenderContext,
        stream: &mut dyn CommandStream,
        frame: u64,
        instances: &[SpriteInstance],
        shared: &SharedResources,
    ) -> Result<DrawParams, BatchError> {
        profile_function!();

        {
            profile_scope!("expand_on_host");
            let mut writer = self.vertices.begin_write(ctx, frame)?;
            for instance in instances {
                writer.extend_from_slice(&expand_instance(&instance.to_gpu()))?;
            }
            writer.finish();
        }

        stream.begin_copy_scope()?;
        let mut bytes_uploaded = shared.upload_uniforms(stream)?;
        bytes_uploaded += self.vertices.upload_to(stream, &self.vertex_buffer)?;
        stream.end_copy_scope()?;

        Ok(DrawParams {
            live: instances.len() as u32,
            bytes_uploaded,
            dispatches: 0,
        })
    }

    fn draw(
        &self,
        stream: &mut dyn CommandStream,
        params: &DrawParams,
        shared: &SharedResources,
    ) -> Result<u32, BatchError> {
        if params.is_empty() {
            return Ok(0);
        }

        stream.bind_render_pipeline(&self.pipeline)?;
        shared.bind_material(stream)?;
        stream.bind_vertex_buffer(0, &self.vertex_buffer)?;
        stream.bind_index_buffer(&self.index_buffer, wgpu::IndexFormat::Uint32)?;
        stream.draw_indexed(0..params.live * INDICES_PER_SPRITE as u32, 0, 0..1)?;
        Ok(1)
    }

    fn notify_frame_completed(&mut self, frame: u64) {
        self.vertices.notify_frame_completed(frame);
    }
}
