//! Overlay elements and their geometry.
//!
//! Geometry is expressed in output pixel coordinates. Anchors may be
//! negative and extents may run past the frame; the compositor clips.

use serde::{Deserialize, Serialize};

use crate::frame::{Raster, Rgba};

/// Placement of an overlay element on the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    /// Left edge (may be negative).
    pub x: i32,
    /// Top edge (may be negative).
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Half-open pixel rectangle `[x0, x1) x [y0, y1)` inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelRect {
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge. Widened so extreme anchors cannot overflow.
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Intersection with a `frame_width x frame_height` frame.
    ///
    /// Returns `None` when nothing of the element lands on the frame.
    pub fn clip_to(&self, frame_width: u32, frame_height: u32) -> Option<PixelRect> {
        if self.is_empty() {
            return None;
        }
        let x0 = (self.x as i64).max(0);
        let y0 = (self.y as i64).max(0);
        let x1 = self.right().min(frame_width as i64);
        let y1 = self.bottom().min(frame_height as i64);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some(PixelRect {
            x0: x0 as u32,
            y0: y0 as u32,
            x1: x1 as u32,
            y1: y1 as u32,
        })
    }
}

/// What an overlay element draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverlayContent {
    /// Raster carried with the element itself.
    Inline(Raster),
    /// Raster held by the asset cache under `key`.
    Asset { key: String },
    /// Filled rectangle.
    Solid(Rgba),
}

/// One piece of content drawn over the base frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayElement {
    /// Unique identifier within a registry.
    pub id: String,

    pub geometry: Geometry,

    pub content: OverlayContent,

    /// Element-wide opacity in `[0.0, 1.0]`.
    #[serde(default = "default_opacity")]
    pub opacity: f32,

    /// Draw order; higher values paint over lower ones.
    #[serde(default)]
    pub z_order: i32,

    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_opacity() -> f32 {
    1.0
}

fn default_visible() -> bool {
    true
}

impl OverlayElement {
    /// Create a visible, fully opaque element at z-order 0.
    pub fn new(id: impl Into<String>, geometry: Geometry, content: OverlayContent) -> Self {
        Self {
            id: id.into(),
            geometry,
            content,
            opacity: 1.0,
            z_order: 0,
            visible: true,
        }
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_z_order(mut self, z_order: i32) -> Self {
        self.z_order = z_order;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Asset key referenced by this element, if any.
    pub fn asset_key(&self) -> Option<&str> {
        match &self.content {
            OverlayContent::Asset { key } => Some(key),
            _ => None,
        }
    }

    /// Whether the element can contribute anything to a frame.
    pub fn is_drawable(&self) -> bool {
        self.visible && self.opacity > 0.0 && !self.geometry.is_empty()
    }

    /// Opacity forced into `[0.0, 1.0]`; NaN counts as fully transparent.
    pub fn clamped_opacity(&self) -> f32 {
        if self.opacity.is_nan() {
            0.0
        } else {
            self.opacity.clamp(0.0, 1.0)
        }
    }
}
