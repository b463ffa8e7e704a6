use spritebatch_core::profiling::profile_function;
use spritebatch_test_utils::{
    BufferDesc, BufferUsage, CommandStream, GpuBuffer, GpuRenderPipeline, RenderContext,
};

use super::{
    DrawParams, ExpansionStrategy, PULL_PIPELINE_LABEL, SPRITE_PULL_SHADER, SharedResources,
    bindings, create_sprite_pipeline,
};
use crate::config::{ExpansionKind, SpriteBatchConfig};
use crate::error::BatchError;
use crate::instance::{GpuSpriteInstance, SpriteInstance};
use crate::staging::StagingRing;
use crate::vertex::INDICES_PER_SPRITE;

/// Uploads instances and lets the vertex shader read them by `vertex_index`.
///
/// No vertex or index buffer and no compute pass; requires storage buffers in
/// the vertex stage.
pub struct PullExpansion {
    instances: StagingRing<GpuSpriteInstance>,
    instance_buffer: GpuBuffer,
    pipeline: GpuRenderPipeline,
}

impl PullExpansion {
    pub fn new(ctx: &dyn RenderContext, config: &SpriteBatchConfig) -> Result<Self, BatchError> {
        if !ctx.supports_compute() {
            return Err(BatchError::Unsupported(
                "vertex pulling requires storage buffers in the vertex stage",
            ));
        }

        let label = format!("{}_instances", config.label);
        let instances = StagingRing::new(ctx, &label, config.max_sprites, config.ring_depth)?;
        let instance_buffer = ctx.create_buffer(&BufferDesc {
            label: Some(&label),
            size: config.max_sprites.max(1) as u64 * GpuSpriteInstance::SIZE,
            usage: BufferUsage::STORAGE_READ | BufferUsage::COPY_DST,
        });
        let pipeline =
            create_sprite_pipeline(ctx, config, PULL_PIPELINE_LABEL, SPRITE_PULL_SHADER, &[]);

        Ok(Self {
            instances,
            instance_buffer,
            pipeline,
        })
    }
}

impl ExpansionStrategy for PullExpansion {
    fn kind(&self) -> ExpansionKind {
        ExpansionKind::Pull
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

        let mut writer = self.instances.begin_write(ctx, frame)?;
        for instance in instances {
            writer.push(instance.to_gpu())?;
        }
        writer.finish();

        stream.begin_copy_scope()?;
        let mut bytes_uploaded = shared.upload_uniforms(stream)?;
        bytes_uploaded += self.instances.upload_to(stream, &self.instance_buffer)?;
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
        stream.bind_storage_buffer(bindings::INSTANCES, &self.instance_buffer, true)?;
        stream.draw(0..params.live * INDICES_PER_SPRITE as u32, 0..1)?;
        Ok(1)
    }

    fn notify_frame_completed(&mut self, frame: u64) {
        self.instances.notify_frame_completed(frame);
    }
}
