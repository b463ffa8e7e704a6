use spritebatch_core::profiling::{profile_function, profile_scope};
use spritebatch_test_utils::{
    BufferAccess, BufferDesc, BufferUsage, CommandStream, ComputePipelineDesc, GpuBuffer,
    GpuComputePipeline, GpuRenderPipeline, RenderContext,
};

use super::{
    DrawParams, EXPAND_KERNEL_LABEL, EXPAND_SPRITES_SHADER, ExpansionStrategy, SharedResources,
    SPRITE_VERTEX_SHADER, VERTEX_PIPELINE_LABEL, bindings, create_index_buffer,
    create_sprite_pipeline,
};
use crate::config::{EXPANSION_WORKGROUP_SIZE, ExpansionKind, SpriteBatchConfig};
use crate::error::BatchError;
use crate::instance::{GpuSpriteInstance, SpriteInstance};
use crate::staging::StagingRing;
use crate::vertex::{INDICES_PER_SPRITE, QuadVertex, VERTICES_PER_SPRITE};

/// Uploads instances and expands them on the GPU with the `expand_sprites` kernel.
///
/// Uploads 64 bytes per sprite. The kernel writes a device vertex buffer that the
/// render pass then reads through the shared index buffer.
pub struct ComputeExpansion {
    instances: StagingRing<GpuSpriteInstance>,
    instance_buffer: GpuBuffer,
    vertex_buffer: GpuBuffer,
    index_buffer: GpuBuffer,
    expand: GpuComputePipeline,
    pipeline: GpuRenderPipeline,
}

impl ComputeExpansion {
    pub fn new(ctx: &dyn RenderContext, config: &SpriteBatchConfig) -> Result<Self, BatchError> {
        if !ctx.supports_compute() {
            return Err(BatchError::Unsupported(
                "compute expansion requires compute shader support",
            ));
        }

        let capacity = config.max_sprites.max(1) as u64;
        let instance_label = format!("{}_instances", config.label);
        let instances =
            StagingRing::new(ctx, &instance_label, config.max_sprites, config.ring_depth)?;
        let instance_buffer = ctx.create_buffer(&BufferDesc {
            label: Some(&instance_label),
            size: capacity * GpuSpriteInstance::SIZE,
            usage: BufferUsage::STORAGE_READ | BufferUsage::COPY_DST,
        });
        let vertex_buffer = ctx.create_buffer(&BufferDesc {
            label: Some(&format!("{}_vertices", config.label)),
            size: capacity * VERTICES_PER_SPRITE as u64 * QuadVertex::SIZE,
            usage: BufferUsage::STORAGE_READ_WRITE | BufferUsage::VERTEX,
        });
        let index_buffer = create_index_buffer(ctx, config);

        let expand = ctx.create_compute_pipeline(&ComputePipelineDesc {
            label: EXPAND_KERNEL_LABEL,
            shader_source: EXPAND_SPRITES_SHADER,
            entry_point: "expand_sprites",
        });
        let pipeline = create_sprite_pipeline(
            ctx,
            config,
            VERTEX_PIPELINE_LABEL,
            SPRITE_VERTEX_SHADER,
            &[QuadVertex::layout()],
        );

        Ok(Self {
            instances,
            instance_buffer,
            vertex_buffer,
            index_buffer,
            expand,
            pipeline,
        })
    }

    /// Workgroups needed to cover `live` sprites.
    pub fn workgroup_count(live: u32) -> u32 {
        live.div_ceil(EXPANSION_WORKGROUP_SIZE)
    }
}

impl ExpansionStrategy for ComputeExpansion {
    fn kind(&self) -> ExpansionKind {
        ExpansionKind::Compute
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
            profile_scope!("stage_instances");
            let mut writer = self.instances.begin_write(ctx, frame)?;
            for instance in instances {
                writer.push(instance.to_gpu())?;
            }
            writer.finish();
        }

        stream.begin_copy_scope()?;
        let mut bytes_uploaded = shared.upload_uniforms(stream)?;
        bytes_uploaded += self.instances.upload_to(stream, &self.instance_buffer)?;
        stream.end_copy_scope()?;

        let live = instances.len() as u32;
        if live == 0 {
            return Ok(DrawParams {
                live,
                bytes_uploaded,
                dispatches: 0,
            });
        }

        stream.begin_compute_scope(EXPAND_KERNEL_LABEL)?;
        stream.bind_compute_pipeline(&self.expand)?;
        stream.bind_uniform_buffer(bindings::FRAME_UNIFORMS, shared.uniform_buffer())?;
        stream.bind_storage_buffer(bindings::INSTANCES, &self.instance_buffer, true)?;
        stream.bind_storage_buffer(bindings::VERTICES, &self.vertex_buffer, false)?;
        stream.dispatch(Self::workgroup_count(live), 1, 1)?;
        stream.end_compute_scope()?;

        // Kernel writes must land before the vertex fetch
        stream.buffer_barrier(
            &self.vertex_buffer,
            BufferAccess::StorageWrite,
            BufferAccess::VertexRead,
        )?;

        Ok(DrawParams {
            live,
            bytes_uploaded,
            dispatches: 1,
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
        self.instances.notify_frame_completed(frame);
    }
}
