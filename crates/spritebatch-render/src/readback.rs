//! Reading rendered textures back to the host.
//!
//! Used by headless rendering and GPU tests to inspect what the batch drew.

use spritebatch_test_utils::{GpuTexture, RenderContext, TextureDesc, TextureUsage};

use crate::context::GraphicsContext;
use crate::error::GraphicsError;

/// Create a texture the batch can draw into and that can be read back.
pub fn create_render_target(
    ctx: &dyn RenderContext,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
) -> GpuTexture {
    ctx.create_texture(&TextureDesc {
        label: Some(label),
        width,
        height,
        format,
        usage: TextureUsage::RENDER_TARGET | TextureUsage::COPY_SRC,
    })
}

/// Row pitch of a texture copy, padded to `COPY_BYTES_PER_ROW_ALIGNMENT`.
pub fn padded_bytes_per_row(width: u32, bytes_per_pixel: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (width * bytes_per_pixel).div_ceil(align) * align
}

fn bytes_per_pixel(format: wgpu::TextureFormat) -> Result<u32, GraphicsError> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm
        | wgpu::TextureFormat::Rgba8UnormSrgb
        | wgpu::TextureFormat::Bgra8Unorm
        | wgpu::TextureFormat::Bgra8UnormSrgb => Ok(4),
        other => Err(GraphicsError::UnsupportedFormat(other)),
    }
}

/// Copy a texture to the host, blocking until the copy completes.
///
/// Returns tightly packed rows in the texture's own channel order.
pub fn read_texture_rgba8(
    ctx: &GraphicsContext,
    texture: &GpuTexture,
) -> Result<Vec<u8>, GraphicsError> {
    let bytes_per_pixel = bytes_per_pixel(texture.format())?;
    let (width, height) = (texture.width(), texture.height());
    let bytes_per_row = padded_bytes_per_row(width, bytes_per_pixel);

    let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback_buffer"),
        size: bytes_per_row as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback_encoder"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: texture.as_wgpu(),
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    ctx.queue.submit(Some(encoder.finish()));

    let slice = buffer.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    let polled = ctx.device.poll(wgpu::PollType::Wait {
        submission_index: None,
        timeout: None,
    });
    crate::context_impl::report_poll(polled, "readback");
    receiver
        .recv()
        .map_err(|_| GraphicsError::MapFailed(wgpu::BufferAsyncError))??;

    let data = slice.get_mapped_range();
    let row_len = (width * bytes_per_pixel) as usize;
    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in data.chunks(bytes_per_row as usize).take(height as usize) {
        pixels.extend_from_slice(&row[..row_len]);
    }
    drop(data);
    buffer.unmap();

    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_padding() {
        assert_eq!(padded_bytes_per_row(1, 4), 256);
        assert_eq!(padded_bytes_per_row(64, 4), 256);
        assert_eq!(padded_bytes_per_row(65, 4), 512);
        assert_eq!(padded_bytes_per_row(100, 4), 512);
    }

    #[test]
    fn test_unsupported_format() {
        assert!(matches!(
            bytes_per_pixel(wgpu::TextureFormat::R32Float),
            Err(GraphicsError::UnsupportedFormat(wgpu::TextureFormat::R32Float))
        ));
        assert_eq!(bytes_per_pixel(wgpu::TextureFormat::Bgra8UnormSrgb).unwrap(), 4);
    }
}
