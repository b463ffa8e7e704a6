//! Quad vertex format and the shared index pattern.

use bytemuck::{Pod, Zeroable};
use spritebatch_core::math::{Vec2, Vec4};
use spritebatch_test_utils::VertexLayout;
use static_assertions::const_assert_eq;

pub const VERTICES_PER_SPRITE: usize = 4;
pub const INDICES_PER_SPRITE: usize = 6;

/// Unit-square corners in vertex order.
pub const QUAD_CORNERS: [Vec2; VERTICES_PER_SPRITE] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(0.0, 1.0),
    Vec2::new(1.0, 1.0),
];

/// Corner of each of the six vertices of a quad: triangles (0,1,2) and (2,1,3).
pub const QUAD_TRIANGLES: [u32; INDICES_PER_SPRITE] = [0, 1, 2, 2, 1, 3];

/// Expanded vertex, matching `struct QuadVertex` in the WGSL shaders (48 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    /// xyz plus w = 1.
    pub position: [f32; 4],
    pub tex_coord: [f32; 2],
    pub _pad: [f32; 2],
    pub color: [f32; 4],
}

const_assert_eq!(std::mem::size_of::<QuadVertex>(), 48);

static QUAD_VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] = [
    // location 0: position (vec4)
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x4,
        offset: 0,
        shader_location: 0,
    },
    // location 1: tex_coord (vec2), followed by 8 bytes of padding
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x2,
        offset: 16,
        shader_location: 1,
    },
    // location 2: color (vec4)
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x4,
        offset: 32,
        shader_location: 2,
    },
];

impl QuadVertex {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn position(&self) -> Vec4 {
        Vec4::from_array(self.position)
    }

    pub fn tex_coord(&self) -> Vec2 {
        Vec2::from_array(self.tex_coord)
    }

    pub fn color(&self) -> Vec4 {
        Vec4::from_array(self.color)
    }

    /// Vertex buffer layout for the sprite render pipeline.
    pub fn layout() -> VertexLayout<'static> {
        VertexLayout {
            stride: Self::SIZE,
            attributes: &QUAD_VERTEX_ATTRIBUTES,
        }
    }
}

/// Index buffer contents for `max_sprites` quads: `QUAD_TRIANGLES + 4k` per sprite.
pub fn quad_indices(max_sprites: usize) -> Vec<u32> {
    (0..max_sprites as u32)
        .flat_map(|sprite| {
            QUAD_TRIANGLES.map(|corner| sprite * VERTICES_PER_SPRITE as u32 + corner)
        })
        .collect()
}
