//! Per-pixel blending.
//!
//! Sources are straight-alpha RGBA8. For every destination channel:
//!
//! ```text
//! w   = srcAlpha * opacity
//! out = src * w + dst * (1 - w)
//! ```
//!
//! evaluated in `f32` on `[0, 255]` values and rounded on the final write.
//! A destination alpha channel is combined with the same weight against a
//! fully opaque source, which is Porter-Duff "over".

use overlay_frame_model::frame::PixelFormat;

/// Blend weight for a source alpha byte at the given element opacity.
#[inline]
pub fn weight(src_alpha: u8, opacity: f32) -> f32 {
    (src_alpha as f32 / 255.0) * opacity
}

/// Blend one channel and quantize with rounding.
#[inline]
pub fn blend_channel(src: u8, dst: u8, weight: f32) -> u8 {
    let out = src as f32 * weight + dst as f32 * (1.0 - weight);
    out.round().clamp(0.0, 255.0) as u8
}

/// Rec.601 luma of an RGB triple, rounded.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32 + 500) / 1000) as u8
}

/// How source pixels land in one destination pixel format.
#[derive(Debug, Clone, Copy)]
pub struct PixelBlender {
    bpp: usize,
    color: Option<[usize; 3]>,
    alpha: Option<usize>,
}

impl PixelBlender {
    pub fn new(format: PixelFormat) -> Self {
        Self {
            bpp: format.bytes_per_pixel(),
            color: format.color_offsets(),
            alpha: format.alpha_offset(),
        }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.bpp
    }

    /// Blend `src` over the pixel stored in `dst` (exactly `bpp` bytes).
    #[inline]
    pub fn blend(&self, dst: &mut [u8], src: [u8; 4], opacity: f32) {
        if src[3] == 0 {
            return;
        }
        let w = weight(src[3], opacity);
        if w <= 0.0 {
            return;
        }

        match self.color {
            Some([r, g, b]) => {
                dst[r] = blend_channel(src[0], dst[r], w);
                dst[g] = blend_channel(src[1], dst[g], w);
                dst[b] = blend_channel(src[2], dst[b], w);
            }
            None => {
                dst[0] = blend_channel(luma(src[0], src[1], src[2]), dst[0], w);
            }
        }

        if let Some(a) = self.alpha {
            dst[a] = blend_channel(255, dst[a], w);
        }
    }

    /// Blend `src` over every pixel of a packed row segment.
    pub fn blend_span(&self, row: &mut [u8], src: [u8; 4], opacity: f32) {
        for dst in row.chunks_exact_mut(self.bpp) {
            self.blend(dst, src, opacity);
        }
    }
}
