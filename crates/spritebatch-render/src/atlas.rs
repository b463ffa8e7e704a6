//! Texture atlas regions and uniform sprite sheets.
//!
//! A sprite samples the rectangle `uv_origin .. uv_origin + uv_extent` of the
//! bound texture. These helpers produce that rectangle for a pixel region or for
//! a cell of a sheet laid out as a grid of equally sized sprites.

use spritebatch_core::math::Vec2;
use spritebatch_test_utils::{GpuTexture, RenderContext, TextureDesc, TextureUsage};

/// Normalized texture rectangle sampled by a sprite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteUv {
    pub origin: Vec2,
    /// Negative components flip the sprite along that axis.
    pub extent: Vec2,
}

impl Default for SpriteUv {
    fn default() -> Self {
        Self::FULL
    }
}

impl SpriteUv {
    /// The whole texture.
    pub const FULL: Self = Self {
        origin: Vec2::ZERO,
        extent: Vec2::ONE,
    };

    pub fn new(origin: Vec2, extent: Vec2) -> Self {
        Self { origin, extent }
    }

    pub fn from_min_max(min: Vec2, max: Vec2) -> Self {
        Self {
            origin: min,
            extent: max - min,
        }
    }

    /// Corner opposite `origin`.
    pub fn max(&self) -> Vec2 {
        self.origin + self.extent
    }

    pub fn flip_horizontal(&self) -> Self {
        Self {
            origin: Vec2::new(self.origin.x + self.extent.x, self.origin.y),
            extent: Vec2::new(-self.extent.x, self.extent.y),
        }
    }

    pub fn flip_vertical(&self) -> Self {
        Self {
            origin: Vec2::new(self.origin.x, self.origin.y + self.extent.y),
            extent: Vec2::new(self.extent.x, -self.extent.y),
        }
    }
}

/// Rectangle of an atlas in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl AtlasRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Normalize against a texture of `texture_width` x `texture_height` pixels.
    pub fn to_uv(&self, texture_width: u32, texture_height: u32) -> SpriteUv {
        let texture = Vec2::new(texture_width as f32, texture_height as f32);
        SpriteUv {
            origin: Vec2::new(self.x as f32, self.y as f32) / texture,
            extent: Vec2::new(self.width as f32, self.height as f32) / texture,
        }
    }
}

/// Grid of uniformly sized sprites within a texture.
///
/// # Example
///
/// ```
/// use spritebatch_render::SpriteSheetLayout;
///
/// let sheet = SpriteSheetLayout {
///     texture_width: 128,
///     texture_height: 64,
///     cell_width: 32,
///     cell_height: 32,
///     columns: 4,
///     rows: 2,
///     ..Default::default()
/// };
/// let uv = sheet.cell_uv(5).unwrap();
/// assert_eq!(uv.origin.x, 0.25);
/// assert_eq!(uv.origin.y, 0.5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteSheetLayout {
    pub texture_width: u32,
    pub texture_height: u32,
    /// Width of each sprite in pixels
    pub cell_width: u32,
    /// Height of each sprite in pixels
    pub cell_height: u32,
    pub columns: u32,
    pub rows: u32,
    /// Pixels between neighbouring cells
    pub padding: u32,
    /// Pixels around the whole grid
    pub margin: u32,
}

impl Default for SpriteSheetLayout {
    fn default() -> Self {
        Self {
            texture_width: 32,
            texture_height: 32,
            cell_width: 32,
            cell_height: 32,
            columns: 1,
            rows: 1,
            padding: 0,
            margin: 0,
        }
    }
}

impl SpriteSheetLayout {
    pub fn cell_count(&self) -> u32 {
        self.columns * self.rows
    }

    /// Pixel rectangle of the cell at `row`, `col`.
    pub fn region_at(&self, row: u32, col: u32) -> Option<AtlasRegion> {
        if row >= self.rows || col >= self.columns {
            return None;
        }
        Some(AtlasRegion {
            x: self.margin + col * (self.cell_width + self.padding),
            y: self.margin + row * (self.cell_height + self.padding),
            width: self.cell_width,
            height: self.cell_height,
        })
    }

    /// Cells are numbered left to right, top to bottom.
    pub fn region(&self, index: u32) -> Option<AtlasRegion> {
        if self.columns == 0 {
            return None;
        }
        self.region_at(index / self.columns, index % self.columns)
    }

    pub fn cell_uv_at(&self, row: u32, col: u32) -> Option<SpriteUv> {
        self.region_at(row, col)
            .map(|region| region.to_uv(self.texture_width, self.texture_height))
    }

    pub fn cell_uv(&self, index: u32) -> Option<SpriteUv> {
        self.region(index)
            .map(|region| region.to_uv(self.texture_width, self.texture_height))
    }
}

/// Create a sampled RGBA8 (sRGB) texture from tightly packed pixels.
pub fn create_rgba8_texture(
    ctx: &dyn RenderContext,
    label: &str,
    width: u32,
    height: u32,
    pixels: &[u8],
) -> GpuTexture {
    let texture = ctx.create_texture(&TextureDesc {
        label: Some(label),
        width,
        height,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: TextureUsage::SAMPLED | TextureUsage::COPY_DST,
    });
    ctx.write_texture(&texture, pixels);
    texture
}
