//! Asset decoding backends.
//!
//! Decoders are selected by content type. The cache ships with an
//! `image`-crate backend for common file formats and a raw RGBA8 backend.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use anyhow::{bail, Context};
use overlay_frame_model::asset::RAW_RGBA8_CONTENT_TYPE;
use overlay_frame_model::frame::Raster;

/// Turns encoded bytes into a straight-alpha RGBA8 raster.
pub trait AssetDecoder: Send + Sync {
    /// Content types this decoder handles.
    fn content_types(&self) -> &[&'static str];

    /// Decode `data` into a raster.
    fn decode(&self, data: &[u8]) -> anyhow::Result<Raster>;

    /// Decoder name for logging.
    fn name(&self) -> &str;
}

/// PNG, JPEG, BMP and GIF (first frame) via the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageFileDecoder;

impl AssetDecoder for ImageFileDecoder {
    fn content_types(&self) -> &[&'static str] {
        &["image/png", "image/jpeg", "image/bmp", "image/gif"]
    }

    fn decode(&self, data: &[u8]) -> anyhow::Result<Raster> {
        let reader = image::ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .context("Failed to sniff image format")?;
        let decoded = reader.decode().context("Failed to decode image")?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Raster::new(width, height, rgba.into_raw())?)
    }

    fn name(&self) -> &str {
        "image"
    }
}

/// Uncompressed RGBA8 with an 8-byte little-endian `width, height` header.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawRgbaDecoder;

impl RawRgbaDecoder {
    const HEADER_LEN: usize = 8;

    /// Encode a raster in the layout this decoder reads.
    pub fn encode(raster: &Raster) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::HEADER_LEN + raster.data().len());
        out.extend_from_slice(&raster.width().to_le_bytes());
        out.extend_from_slice(&raster.height().to_le_bytes());
        out.extend_from_slice(raster.data());
        out
    }
}

impl AssetDecoder for RawRgbaDecoder {
    fn content_types(&self) -> &[&'static str] {
        &[RAW_RGBA8_CONTENT_TYPE]
    }

    fn decode(&self, data: &[u8]) -> anyhow::Result<Raster> {
        if data.len() < Self::HEADER_LEN {
            bail!("raw RGBA8 asset shorter than its {}-byte header", Self::HEADER_LEN);
        }
        let (header, pixels) = data.split_at(Self::HEADER_LEN);
        let width = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let height = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        Ok(Raster::new(width, height, pixels.to_vec())?)
    }

    fn name(&self) -> &str {
        "raw-rgba8"
    }
}

/// Decoder lookup by content type.
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    by_type: HashMap<String, Arc<dyn AssetDecoder>>,
}

impl DecoderRegistry {
    /// An empty registry; every resolution fails until decoders are added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in image and raw decoders.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ImageFileDecoder));
        registry.register(Arc::new(RawRgbaDecoder));
        registry
    }

    /// Add a decoder for all of its content types, replacing earlier ones.
    pub fn register(&mut self, decoder: Arc<dyn AssetDecoder>) {
        for content_type in decoder.content_types() {
            self.by_type
                .insert(content_type.to_string(), Arc::clone(&decoder));
        }
    }

    pub fn for_content_type(&self, content_type: &str) -> Option<&Arc<dyn AssetDecoder>> {
        self.by_type.get(&content_type.to_ascii_lowercase())
    }

    /// Registered content types, sorted.
    pub fn content_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.by_type.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("content_types", &self.content_types())
            .finish()
    }
}
