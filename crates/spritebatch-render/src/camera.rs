//! Orthographic camera for sprite scenes.
//!
//! # Example
//!
//! ```
//! use spritebatch_render::OrthographicCamera;
//! use glam::Vec3;
//!
//! // Pixel coordinates with the origin at the top left
//! let camera = OrthographicCamera::screen(800.0, 600.0);
//! let ndc = camera.project(Vec3::new(400.0, 300.0, 0.0));
//! assert!(ndc.x.abs() < 1e-6 && ndc.y.abs() < 1e-6);
//! ```

use glam::{Mat4, Vec2, Vec3};

/// Orthographic projection over a world rectangle, with pan and zoom.
///
/// Depth maps `near..far` (world z `-near..-far`) to the `0..1` clip range used by wgpu.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthographicCamera {
    left: f32,
    right: f32,
    bottom: f32,
    top: f32,
    near: f32,
    far: f32,
    /// World-space offset of the view
    position: Vec2,
    zoom: f32,
}

impl OrthographicCamera {
    /// Camera showing `left..right` by `bottom..top`, z from 1 (front) to -1 (back).
    pub fn new(left: f32, right: f32, bottom: f32, top: f32) -> Self {
        Self {
            left,
            right,
            bottom,
            top,
            near: -1.0,
            far: 1.0,
            position: Vec2::ZERO,
            zoom: 1.0,
        }
    }

    /// Pixel space of a `width` x `height` target, y pointing down.
    pub fn screen(width: f32, height: f32) -> Self {
        Self::new(0.0, width, height, 0.0)
    }

    /// World units centered on the origin, y pointing up.
    pub fn centered(width: f32, height: f32) -> Self {
        let half = Vec2::new(width, height) * 0.5;
        Self::new(-half.x, half.x, -half.y, half.y)
    }

    pub fn with_depth_range(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Values above 1 magnify. Non-positive values are ignored.
    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom > 0.0 {
            self.zoom = zoom;
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        let center = Vec2::new(self.left + self.right, self.bottom + self.top) * 0.5;
        let half = Vec2::new(self.right - self.left, self.top - self.bottom) * (0.5 / self.zoom);
        let projection = Mat4::orthographic_rh(
            center.x - half.x,
            center.x + half.x,
            center.y - half.y,
            center.y + half.y,
            self.near,
            self.far,
        );
        projection * Mat4::from_translation(-self.position.extend(0.0))
    }

    /// World point to normalized device coordinates.
    pub fn project(&self, point: Vec3) -> Vec3 {
        self.view_projection().project_point3(point)
    }
}
