//! Frames, pixel formats, and overlay rasters.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use overlay_common::error::{OverlayError, OverlayResult};
use serde::{Deserialize, Serialize};

/// Raw pixel layout of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Rgb8,
    Bgr8,
    Rgba8,
    Bgra8,
    Mono8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown pixel format: {0}")]
pub struct ParsePixelFormatError(pub String);

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb8 | Self::Bgr8 => 3,
            Self::Rgba8 | Self::Bgra8 => 4,
            Self::Mono8 => 1,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, Self::Rgba8 | Self::Bgra8)
    }

    /// Byte offsets of the red, green and blue channels within a pixel.
    ///
    /// `None` for single-channel formats.
    pub fn color_offsets(self) -> Option<[usize; 3]> {
        match self {
            Self::Rgb8 | Self::Rgba8 => Some([0, 1, 2]),
            Self::Bgr8 | Self::Bgra8 => Some([2, 1, 0]),
            Self::Mono8 => None,
        }
    }

    /// Byte offset of the alpha channel, if any.
    pub fn alpha_offset(self) -> Option<usize> {
        if self.has_alpha() {
            Some(3)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rgb8 => "rgb8",
            Self::Bgr8 => "bgr8",
            Self::Rgba8 => "rgba8",
            Self::Bgra8 => "bgra8",
            Self::Mono8 => "mono8",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PixelFormat {
    type Err = ParsePixelFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rgb8" => Ok(Self::Rgb8),
            "bgr8" => Ok(Self::Bgr8),
            "rgba8" => Ok(Self::Rgba8),
            "bgra8" => Ok(Self::Bgra8),
            "mono8" | "gray8" => Ok(Self::Mono8),
            other => Err(ParsePixelFormatError(other.to_string())),
        }
    }
}

/// Declared geometry and format of a stream's frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSpec {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl FrameSpec {
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }

    /// Number of bytes a frame with this spec occupies, or `None` if that
    /// does not fit in `usize`.
    pub fn byte_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.format.bytes_per_pixel())
    }
}

impl fmt::Display for FrameSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.format)
    }
}

/// A single image of the stream.
///
/// The pixel buffer always holds exactly `width * height * bpp` bytes,
/// tightly packed row by row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    spec: FrameSpec,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap a pixel buffer, checking its length against the declared format.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> OverlayResult<Self> {
        let spec = FrameSpec::new(width, height, format);
        let expected = spec
            .byte_len()
            .ok_or_else(|| OverlayError::invalid_frame(format!("{spec} frame is too large")))?;
        if data.len() != expected {
            return Err(OverlayError::invalid_frame(format!(
                "{spec} frame needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self { spec, data })
    }

    /// A frame with every pixel set to `pixel`.
    pub fn filled(width: u32, height: u32, format: PixelFormat, pixel: &[u8]) -> OverlayResult<Self> {
        if pixel.len() != format.bytes_per_pixel() {
            return Err(OverlayError::invalid_frame(format!(
                "{format} pixel needs {} bytes, got {}",
                format.bytes_per_pixel(),
                pixel.len()
            )));
        }
        let spec = FrameSpec::new(width, height, format);
        if spec.byte_len().is_none() {
            return Err(OverlayError::invalid_frame(format!("{spec} frame is too large")));
        }
        let data = pixel.repeat(width as usize * height as usize);
        Self::new(width, height, format, data)
    }

    pub fn spec(&self) -> FrameSpec {
        self.spec
    }

    pub fn width(&self) -> u32 {
        self.spec.width
    }

    pub fn height(&self) -> u32 {
        self.spec.height
    }

    pub fn format(&self) -> PixelFormat {
        self.spec.format
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.spec.width as usize * self.spec.format.bytes_per_pixel()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Bytes of the pixel at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        let offset = self.offset(x, y)?;
        Some(&self.data[offset..offset + self.spec.format.bytes_per_pixel()])
    }

    pub fn pixel_mut(&mut self, x: u32, y: u32) -> Option<&mut [u8]> {
        let offset = self.offset(x, y)?;
        let bpp = self.spec.format.bytes_per_pixel();
        Some(&mut self.data[offset..offset + bpp])
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.spec.width || y >= self.spec.height {
            return None;
        }
        Some(y as usize * self.stride() + x as usize * self.spec.format.bytes_per_pixel())
    }
}

/// A straight-alpha RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(default = "opaque")]
    pub a: u8,
}

fn opaque() -> u8 {
    255
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);
    /// Colour used to flag overlays whose asset could not be loaded.
    pub const ERROR_MARKER: Rgba = Rgba::new(255, 0, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Decoded overlay image: straight-alpha RGBA8, tightly packed.
///
/// Pixel data is shared, so cloning a raster is cheap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RasterRepr", into = "RasterRepr")]
pub struct Raster {
    width: u32,
    height: u32,
    data: Arc<[u8]>,
}

#[derive(Serialize, Deserialize)]
struct RasterRepr {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl TryFrom<RasterRepr> for Raster {
    type Error = OverlayError;

    fn try_from(repr: RasterRepr) -> Result<Self, Self::Error> {
        Raster::new(repr.width, repr.height, repr.data)
    }
}

impl From<Raster> for RasterRepr {
    fn from(raster: Raster) -> Self {
        RasterRepr {
            width: raster.width,
            height: raster.height,
            data: raster.data.to_vec(),
        }
    }
}

impl Raster {
    pub const BYTES_PER_PIXEL: usize = 4;

    pub fn new(width: u32, height: u32, data: Vec<u8>) -> OverlayResult<Self> {
        let expected = Self::byte_len(width, height)?;
        if data.len() != expected {
            return Err(OverlayError::invalid_frame(format!(
                "{width}x{height} RGBA raster needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data: data.into(),
        })
    }

    pub fn filled(width: u32, height: u32, color: Rgba) -> OverlayResult<Self> {
        Self::byte_len(width, height)?;
        Ok(Self {
            width,
            height,
            data: color.to_array().repeat(width as usize * height as usize).into(),
        })
    }

    fn byte_len(width: u32, height: u32) -> OverlayResult<usize> {
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(Self::BYTES_PER_PIXEL))
            .ok_or_else(|| {
                OverlayError::invalid_frame(format!("{width}x{height} RGBA raster is too large"))
            })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// RGBA bytes of the pixel at `(x, y)`.
    ///
    /// Callers must stay within bounds.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * Self::BYTES_PER_PIXEL;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }
}
