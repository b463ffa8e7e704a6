//! CPU implementations of the expansion math.
//!
//! The host variant expands with these directly. They also mirror the WGSL
//! `expand_sprites` kernel and the pull vertex stage so the mock backend can
//! execute the other variants.

use spritebatch_core::math::{Vec2, scale_rotate_translate};

use crate::instance::GpuSpriteInstance;
use crate::vertex::{QUAD_CORNERS, QUAD_TRIANGLES, QuadVertex, VERTICES_PER_SPRITE};

/// The vertex at `corner` (0..4) of the sprite's quad.
#[inline]
pub fn corner_vertex(instance: &GpuSpriteInstance, corner: usize) -> QuadVertex {
    let unit = QUAD_CORNERS[corner];
    let [x, y, z] = instance.position;
    let transform = scale_rotate_translate(
        Vec2::new(x, y),
        instance.rotation,
        Vec2::from_array(instance.size),
    );
    let xy = transform.transform_point2(unit);
    let uv = Vec2::from_array(instance.uv_origin) + unit * Vec2::from_array(instance.uv_extent);

    QuadVertex {
        position: [xy.x, xy.y, z, 1.0],
        tex_coord: uv.to_array(),
        _pad: [0.0; 2],
        color: instance.color,
    }
}

/// The four corner vertices of a sprite, in corner order.
#[inline]
pub fn expand_instance(instance: &GpuSpriteInstance) -> [QuadVertex; VERTICES_PER_SPRITE] {
    [
        corner_vertex(instance, 0),
        corner_vertex(instance, 1),
        corner_vertex(instance, 2),
        corner_vertex(instance, 3),
    ]
}

/// Expand the first `live` instances into `vertices`, four per instance.
///
/// Invocations past `live` or past either buffer do nothing, like the bounds check
/// in the compute kernel.
pub fn expand_sprites(instances: &[GpuSpriteInstance], live: usize, vertices: &mut [QuadVertex]) {
    for (index, instance) in instances.iter().enumerate().take(live) {
        let start = index * VERTICES_PER_SPRITE;
        let Some(out) = vertices.get_mut(start..start + VERTICES_PER_SPRITE) else {
            break;
        };
        out.copy_from_slice(&expand_instance(instance));
    }
}

/// The vertex produced for `vertex_index` of a non-indexed pull draw.
pub fn pull_vertex(instances: &[GpuSpriteInstance], vertex_index: u32) -> Option<QuadVertex> {
    let instance = instances.get((vertex_index / 6) as usize)?;
    let corner = QUAD_TRIANGLES[(vertex_index % 6) as usize] as usize;
    Some(corner_vertex(instance, corner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::SpriteInstance;
    use spritebatch_core::math::{Vec3, Vec4, signed_area_2d};
    use std::f32::consts::FRAC_PI_2;

    fn vertex_xy(vertex: &QuadVertex) -> Vec2 {
        Vec2::new(vertex.position[0], vertex.position[1])
    }

    #[test]
    fn test_axis_aligned_corners() {
        let instance = SpriteInstance::new(Vec3::new(100.0, 100.0, 0.0), Vec2::splat(32.0)).to_gpu();
        let quad = expand_instance(&instance);
        let xy: Vec<Vec2> = quad.iter().map(vertex_xy).collect();
        assert_eq!(
            xy,
            vec![
                Vec2::new(100.0, 100.0),
                Vec2::new(132.0, 100.0),
                Vec2::new(100.0, 132.0),
                Vec2::new(132.0, 132.0),
            ]
        );
        assert!(quad.iter().all(|v| v.position[3] == 1.0));
    }

    #[test]
    fn test_unit_sprite_is_unit_quad() {
        let instance = SpriteInstance::new(Vec3::ZERO, Vec2::ONE).to_gpu();
        let quad = expand_instance(&instance);
        let corners = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
        ];
        for (vertex, corner) in quad.iter().zip(corners) {
            assert_eq!(vertex_xy(vertex), corner);
            assert_eq!(vertex.tex_coord, corner.to_array());
        }

        assert_eq!(QUAD_TRIANGLES, [0, 1, 2, 2, 1, 3]);
        let [a, b, c] = [0, 1, 2].map(|i| corners[i]);
        let [d, e, f] = [2, 1, 3].map(|i| corners[i]);
        assert!(signed_area_2d(a, b, c) > 0.0);
        assert!(signed_area_2d(d, e, f) > 0.0);
    }

    #[test]
    fn test_rotation_about_local_origin() {
        let instance = SpriteInstance::new(Vec3::new(300.0, 100.0, 0.5), Vec2::splat(16.0))
            .with_rotation(FRAC_PI_2)
            .to_gpu();
        let quad = expand_instance(&instance);
        assert!(vertex_xy(&quad[0]).abs_diff_eq(Vec2::new(300.0, 100.0), 1e-4));
        assert!(vertex_xy(&quad[1]).abs_diff_eq(Vec2::new(300.0, 116.0), 1e-4));
        assert!(vertex_xy(&quad[2]).abs_diff_eq(Vec2::new(284.0, 100.0), 1e-4));
        assert!(quad.iter().all(|v| v.position[2] == 0.5));
    }

    #[test]
    fn test_uv_and_color_carried() {
        let instance = SpriteInstance::new(Vec3::ZERO, Vec2::ONE)
            .with_uv(Vec2::new(0.5, 0.25), Vec2::new(0.5, 0.25))
            .with_color(Vec4::new(1.0, 0.0, 0.0, 1.0))
            .to_gpu();
        let quad = expand_instance(&instance);
        assert_eq!(quad[0].tex_coord, [0.5, 0.25]);
        assert_eq!(quad[3].tex_coord, [1.0, 0.5]);
        assert!(quad.iter().all(|v| v.color == [1.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_triangles_are_counter_clockwise() {
        let instance = SpriteInstance::new(Vec3::new(5.0, -3.0, 0.0), Vec2::new(4.0, 9.0))
            .with_rotation(1.0)
            .to_gpu();
        let quad = expand_instance(&instance);
        for triangle in QUAD_TRIANGLES.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| vertex_xy(&quad[triangle[i] as usize]));
            assert!(signed_area_2d(a, b, c) > 0.0);
        }
    }

    #[test]
    fn test_pull_matches_indexed_expansion() {
        let instances: Vec<GpuSpriteInstance> = (0..3)
            .map(|i| {
                SpriteInstance::new(Vec3::new(i as f32 * 10.0, 0.0, 0.0), Vec2::splat(4.0))
                    .with_rotation(i as f32 * 0.3)
                    .to_gpu()
            })
            .collect();
        let mut vertices = vec![QuadVertex::default(); instances.len() * VERTICES_PER_SPRITE];
        expand_sprites(&instances, instances.len(), &mut vertices);

        for vid in 0..(instances.len() as u32 * 6) {
            let sprite = vid / 6;
            let corner = QUAD_TRIANGLES[(vid % 6) as usize];
            let indexed = vertices[(sprite * 4 + corner) as usize];
            assert_eq!(pull_vertex(&instances, vid), Some(indexed));
        }
        assert_eq!(pull_vertex(&instances, 18), None);
    }

    #[test]
    fn test_expand_respects_live_count() {
        let instance = SpriteInstance::new(Vec3::ONE, Vec2::ONE).to_gpu();
        let mut vertices = vec![QuadVertex::default(); 8];
        expand_sprites(&[instance, instance], 1, &mut vertices);
        assert_ne!(vertices[0], QuadVertex::default());
        assert_eq!(vertices[4], QuadVertex::default());
    }
}
