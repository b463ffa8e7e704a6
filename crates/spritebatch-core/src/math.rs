//! Math types and small 2D helpers.
//!
//! Re-exports the SIMD-accelerated [`glam`] types used across the workspace and
//! adds the handful of planar helpers the sprite transform needs.
//!
//! ```
//! use spritebatch_core::math::{Vec2, rotate_2d};
//!
//! let v = rotate_2d(Vec2::X, std::f32::consts::FRAC_PI_2);
//! assert!((v - Vec2::Y).length() < 1e-6);
//! ```

pub use glam::*;

/// Rotate `v` counter-clockwise by `angle` radians about the origin (y-up).
#[inline]
pub fn rotate_2d(v: Vec2, angle: f32) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Build the affine transform `translate(position) * rotate(rotation) * scale(size)`.
#[inline]
pub fn scale_rotate_translate(position: Vec2, rotation: f32, size: Vec2) -> Affine2 {
    Affine2::from_scale_angle_translation(size, rotation, position)
}

/// Twice the signed area of triangle `abc`. Positive when counter-clockwise in a y-up frame.
#[inline]
pub fn signed_area_2d(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (b - a).perp_dot(c - a)
}

/// Component-wise comparison with an absolute tolerance.
#[inline]
pub fn approx_eq_vec4(a: Vec4, b: Vec4, epsilon: f32) -> bool {
    (a - b).abs().max_element() <= epsilon
}
