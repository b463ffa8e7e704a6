//! [`RenderContext`] and [`CommandStream`] on top of wgpu.
//!
//! Scopes map onto wgpu passes: a copy scope records straight into the command
//! encoder, compute and render scopes open a compute or render pass. Bindings are
//! collected per scope and turned into a group 0 bind group (using the layout
//! wgpu derives from the shader) right before the next dispatch or draw.

use std::any::Any;
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::atomic::Ordering;

use spritebatch_test_utils::{
    BufferAccess, BufferDesc, CommandStream, ComputePipelineDesc, GpuBuffer, GpuComputePipeline,
    GpuRenderPipeline, GpuSampler, GpuTexture, RenderContext, RenderPipelineDesc,
    RenderTargetDesc, SamplerDesc, Scope, ScopeError, ScopeTracker, TextureDesc,
    check_copy_range,
};

use crate::context::GraphicsContext;

impl RenderContext for GraphicsContext {
    fn create_buffer(&self, desc: &BufferDesc<'_>) -> GpuBuffer {
        tracing::debug!(
            "Creating buffer {:?}: {} bytes, {:?}",
            desc.label,
            desc.size,
            desc.usage
        );
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label,
            size: desc.size,
            usage: desc.usage.to_wgpu(),
            mapped_at_creation: false,
        });
        GpuBuffer::from_wgpu(buffer, desc.usage)
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) {
        self.queue.write_buffer(buffer.as_wgpu(), offset, data);
    }

    fn create_texture(&self, desc: &TextureDesc<'_>) -> GpuTexture {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label,
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: desc.usage.to_wgpu(),
            view_formats: &[],
        });
        GpuTexture::from_wgpu(texture)
    }

    fn write_texture(&self, texture: &GpuTexture, data: &[u8]) {
        let bytes_per_pixel = texture.format().block_copy_size(None).unwrap_or(4);
        let size = wgpu::Extent3d {
            width: texture.width(),
            height: texture.height(),
            depth_or_array_layers: 1,
        };
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: texture.as_wgpu(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(texture.width() * bytes_per_pixel),
                rows_per_image: Some(texture.height()),
            },
            size,
        );
    }

    fn create_sampler(&self, desc: &SamplerDesc<'_>) -> GpuSampler {
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: desc.label,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: desc.filter,
            min_filter: desc.filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        GpuSampler::from_wgpu(sampler)
    }

    fn create_render_pipeline(&self, desc: &RenderPipelineDesc<'_>) -> GpuRenderPipeline {
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(desc.label),
                source: wgpu::ShaderSource::Wgsl(desc.shader_source.into()),
            });

        let buffers: Vec<wgpu::VertexBufferLayout<'_>> = desc
            .vertex_buffers
            .iter()
            .map(|layout| wgpu::VertexBufferLayout {
                array_stride: layout.stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: layout.attributes,
            })
            .collect();

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.label),
                layout: None,
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some(desc.vertex_entry),
                    buffers: &buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some(desc.fragment_entry),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: desc.color_format,
                        blend: desc.blend,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        GpuRenderPipeline::from_wgpu(pipeline, desc.label)
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc<'_>) -> GpuComputePipeline {
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(desc.label),
                source: wgpu::ShaderSource::Wgsl(desc.shader_source.into()),
            });

        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(desc.label),
                layout: None,
                module: &module,
                entry_point: Some(desc.entry_point),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });

        GpuComputePipeline::from_wgpu(pipeline, desc.label)
    }

    fn supports_compute(&self) -> bool {
        Self::adapter_supports_compute(&self.adapter)
    }

    fn acquire_command_stream(&self, label: &str) -> Box<dyn CommandStream> {
        Box::new(WgpuCommandStream::new(self.device.clone(), label))
    }

    fn submit(&self, stream: Box<dyn CommandStream>) -> Result<u64, ScopeError> {
        let stream = stream
            .into_any()
            .downcast::<WgpuCommandStream>()
            .map_err(|_| ScopeError::ForeignStream)?;
        let label = stream.label.clone();
        let commands = stream.finish()?;

        self.queue.submit(std::iter::once(commands));
        let index = self.next_submission.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("Submitted '{}' as submission {}", label, index);
        Ok(index)
    }

    fn wait_idle(&self) {
        let result = self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        });
        report_poll(result, "wait_idle");
    }
}

/// Log a failed device poll. Returns whether the poll succeeded.
pub(crate) fn report_poll(result: Result<wgpu::PollStatus, wgpu::PollError>, what: &str) -> bool {
    match result {
        Ok(status) => {
            tracing::trace!("Device poll for {} finished: {:?}", what, status);
            true
        }
        Err(err) => {
            tracing::warn!("Device poll for {} failed: {}", what, err);
            false
        }
    }
}

enum ActivePass {
    None,
    Compute(wgpu::ComputePass<'static>),
    Render(wgpu::RenderPass<'static>),
}

#[derive(Clone)]
enum BoundResource {
    Buffer(wgpu::Buffer),
    Texture(wgpu::TextureView),
    Sampler(wgpu::Sampler),
}

/// Command stream recording into a wgpu command encoder.
pub struct WgpuCommandStream {
    label: String,
    device: wgpu::Device,
    encoder: wgpu::CommandEncoder,
    scopes: ScopeTracker,
    pass: ActivePass,
    render_pipeline: Option<wgpu::RenderPipeline>,
    compute_pipeline: Option<wgpu::ComputePipeline>,
    bindings: BTreeMap<u32, BoundResource>,
    bindings_dirty: bool,
}

const ANY_PIPELINE_SCOPE: &[Scope] = &[Scope::Compute, Scope::Render];

impl WgpuCommandStream {
    fn new(device: wgpu::Device, label: &str) -> Self {
        let encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(label),
        });
        Self {
            label: label.to_string(),
            device,
            encoder,
            scopes: ScopeTracker::new(),
            pass: ActivePass::None,
            render_pipeline: None,
            compute_pipeline: None,
            bindings: BTreeMap::new(),
            bindings_dirty: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn finish(self) -> Result<wgpu::CommandBuffer, ScopeError> {
        let Self {
            encoder,
            scopes,
            pass,
            ..
        } = self;
        scopes.finish()?;
        drop(pass);
        Ok(encoder.finish())
    }

    fn reset_bindings(&mut self) {
        self.render_pipeline = None;
        self.compute_pipeline = None;
        self.bindings.clear();
        self.bindings_dirty = false;
    }

    fn bind(&mut self, binding: u32, resource: BoundResource) {
        self.bindings.insert(binding, resource);
        self.bindings_dirty = true;
    }

    /// Build and set the group 0 bind group if bindings changed since the last one.
    fn flush_bindings(&mut self) {
        if !self.bindings_dirty || self.bindings.is_empty() {
            return;
        }

        let layout = match &self.pass {
            ActivePass::Compute(_) => self
                .compute_pipeline
                .as_ref()
                .map(|pipeline| pipeline.get_bind_group_layout(0)),
            ActivePass::Render(_) => self
                .render_pipeline
                .as_ref()
                .map(|pipeline| pipeline.get_bind_group_layout(0)),
            ActivePass::None => None,
        };
        let Some(layout) = layout else {
            return;
        };

        let entries: Vec<wgpu::BindGroupEntry<'_>> = self
            .bindings
            .iter()
            .map(|(binding, resource)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: match resource {
                    BoundResource::Buffer(buffer) => buffer.as_entire_binding(),
                    BoundResource::Texture(view) => wgpu::BindingResource::TextureView(view),
                    BoundResource::Sampler(sampler) => wgpu::BindingResource::Sampler(sampler),
                },
            })
            .collect();

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&self.label),
            layout: &layout,
            entries: &entries,
        });

        match &mut self.pass {
            ActivePass::Compute(pass) => pass.set_bind_group(0, &bind_group, &[]),
            ActivePass::Render(pass) => pass.set_bind_group(0, &bind_group, &[]),
            ActivePass::None => {}
        }
        self.bindings_dirty = false;
    }

    fn render_pass(&mut self) -> Option<&mut wgpu::RenderPass<'static>> {
        match &mut self.pass {
            ActivePass::Render(pass) => Some(pass),
            _ => None,
        }
    }

    fn compute_pass(&mut self) -> Option<&mut wgpu::ComputePass<'static>> {
        match &mut self.pass {
            ActivePass::Compute(pass) => Some(pass),
            _ => None,
        }
    }
}

impl CommandStream for WgpuCommandStream {
    fn begin_copy_scope(&mut self) -> Result<(), ScopeError> {
        self.scopes.begin(Scope::Copy)
    }

    fn end_copy_scope(&mut self) -> Result<(), ScopeError> {
        self.scopes.end(Scope::Copy)
    }

    fn copy_buffer_to_buffer(
        &mut self,
        src: &GpuBuffer,
        src_offset: u64,
        dst: &GpuBuffer,
        dst_offset: u64,
        size: u64,
    ) -> Result<(), ScopeError> {
        self.scopes.require("copy_buffer_to_buffer", &[Scope::Copy])?;
        check_copy_range("source", src, src_offset, size)?;
        check_copy_range("destination", dst, dst_offset, size)?;
        self.encoder.copy_buffer_to_buffer(
            src.as_wgpu(),
            src_offset,
            dst.as_wgpu(),
            dst_offset,
            size,
        );
        Ok(())
    }

    fn begin_compute_scope(&mut self, label: &str) -> Result<(), ScopeError> {
        self.scopes.begin(Scope::Compute)?;
        let pass = self
            .encoder
            .begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            })
            .forget_lifetime();
        self.pass = ActivePass::Compute(pass);
        self.reset_bindings();
        Ok(())
    }

    fn end_compute_scope(&mut self) -> Result<(), ScopeError> {
        self.scopes.end(Scope::Compute)?;
        self.pass = ActivePass::None;
        self.reset_bindings();
        Ok(())
    }

    fn bind_compute_pipeline(&mut self, pipeline: &GpuComputePipeline) -> Result<(), ScopeError> {
        self.scopes.require("bind_compute_pipeline", &[Scope::Compute])?;
        let wgpu_pipeline = pipeline.as_wgpu().clone();
        if let Some(pass) = self.compute_pass() {
            pass.set_pipeline(&wgpu_pipeline);
        }
        self.compute_pipeline = Some(wgpu_pipeline);
        self.bindings_dirty = true;
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<(), ScopeError> {
        self.scopes.require("dispatch", &[Scope::Compute])?;
        if self.compute_pipeline.is_none() {
            return Err(ScopeError::NoPipeline {
                operation: "dispatch",
            });
        }
        self.flush_bindings();
        if let Some(pass) = self.compute_pass() {
            pass.dispatch_workgroups(x, y, z);
        }
        Ok(())
    }

    fn begin_render_scope(&mut self, target: &RenderTargetDesc<'_>) -> Result<(), ScopeError> {
        self.scopes.begin(Scope::Render)?;
        let load = match target.clear_color {
            Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
            None => wgpu::LoadOp::Load,
        };
        let pass = self
            .encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: target.label,
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.target.view(),
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            })
            .forget_lifetime();
        self.pass = ActivePass::Render(pass);
        self.reset_bindings();
        Ok(())
    }

    fn end_render_scope(&mut self) -> Result<(), ScopeError> {
        self.scopes.end(Scope::Render)?;
        self.pass = ActivePass::None;
        self.reset_bindings();
        Ok(())
    }

    fn bind_render_pipeline(&mut self, pipeline: &GpuRenderPipeline) -> Result<(), ScopeError> {
        self.scopes.require("bind_render_pipeline", &[Scope::Render])?;
        let wgpu_pipeline = pipeline.as_wgpu().clone();
        if let Some(pass) = self.render_pass() {
            pass.set_pipeline(&wgpu_pipeline);
        }
        self.render_pipeline = Some(wgpu_pipeline);
        self.bindings_dirty = true;
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, slot: u32, buffer: &GpuBuffer) -> Result<(), ScopeError> {
        self.scopes.require("bind_vertex_buffer", &[Scope::Render])?;
        if let Some(pass) = self.render_pass() {
            pass.set_vertex_buffer(slot, buffer.as_wgpu().slice(..));
        }
        Ok(())
    }

    fn bind_index_buffer(
        &mut self,
        buffer: &GpuBuffer,
        format: wgpu::IndexFormat,
    ) -> Result<(), ScopeError> {
        self.scopes.require("bind_index_buffer", &[Scope::Render])?;
        if let Some(pass) = self.render_pass() {
            pass.set_index_buffer(buffer.as_wgpu().slice(..), format);
        }
        Ok(())
    }

    fn bind_uniform_buffer(&mut self, binding: u32, buffer: &GpuBuffer) -> Result<(), ScopeError> {
        self.scopes.require("bind_uniform_buffer", ANY_PIPELINE_SCOPE)?;
        self.bind(binding, BoundResource::Buffer(buffer.as_wgpu().clone()));
        Ok(())
    }

    fn bind_storage_buffer(
        &mut self,
        binding: u32,
        buffer: &GpuBuffer,
        _read_only: bool,
    ) -> Result<(), ScopeError> {
        self.scopes.require("bind_storage_buffer", ANY_PIPELINE_SCOPE)?;
        self.bind(binding, BoundResource::Buffer(buffer.as_wgpu().clone()));
        Ok(())
    }

    fn bind_texture(&mut self, binding: u32, texture: &GpuTexture) -> Result<(), ScopeError> {
        self.scopes.require("bind_texture", ANY_PIPELINE_SCOPE)?;
        self.bind(binding, BoundResource::Texture(texture.view().clone()));
        Ok(())
    }

    fn bind_sampler(&mut self, binding: u32, sampler: &GpuSampler) -> Result<(), ScopeError> {
        self.scopes.require("bind_sampler", ANY_PIPELINE_SCOPE)?;
        self.bind(binding, BoundResource::Sampler(sampler.as_wgpu().clone()));
        Ok(())
    }

    fn buffer_barrier(
        &mut self,
        _buffer: &GpuBuffer,
        from: BufferAccess,
        to: BufferAccess,
    ) -> Result<(), ScopeError> {
        // wgpu tracks usage transitions between passes itself
        self.scopes.require_none("buffer_barrier")?;
        tracing::trace!("Buffer barrier {:?} -> {:?} in '{}'", from, to, self.label);
        Ok(())
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) -> Result<(), ScopeError> {
        self.scopes.require("draw", &[Scope::Render])?;
        if self.render_pipeline.is_none() {
            return Err(ScopeError::NoPipeline { operation: "draw" });
        }
        self.flush_bindings();
        if let Some(pass) = self.render_pass() {
            pass.draw(vertices, instances);
        }
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    ) -> Result<(), ScopeError> {
        self.scopes.require("draw_indexed", &[Scope::Render])?;
        if self.render_pipeline.is_none() {
            return Err(ScopeError::NoPipeline {
                operation: "draw_indexed",
            });
        }
        self.flush_bindings();
        if let Some(pass) = self.render_pass() {
            pass.draw_indexed(indices, base_vertex, instances);
        }
        Ok(())
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}
