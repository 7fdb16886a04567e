//! Descriptions of where overlay asset data comes from.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Content type of raw RGBA8 assets: little-endian `u32` width, `u32`
/// height, then `width * height * 4` bytes.
pub const RAW_RGBA8_CONTENT_TYPE: &str = "application/x-raw-rgba8";

/// Source of an asset's encoded bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssetSource {
    /// Bytes supplied directly.
    Bytes { content_type: String, data: Vec<u8> },
    /// A file read on first resolution.
    File {
        path: PathBuf,
        /// Overrides the type inferred from the file extension.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
    },
}

impl AssetSource {
    pub fn bytes(content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self::Bytes {
            content_type: content_type.into(),
            data,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
            content_type: None,
        }
    }

    /// Declared or inferred content type.
    pub fn content_type(&self) -> Option<String> {
        match self {
            Self::Bytes { content_type, .. } => Some(content_type.clone()),
            Self::File {
                content_type: Some(content_type),
                ..
            } => Some(content_type.clone()),
            Self::File { path, .. } => content_type_for_path(path).map(str::to_string),
        }
    }
}

/// Infer a content type from a file extension.
pub fn content_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "bmp" => Some("image/bmp"),
        "gif" => Some("image/gif"),
        "rgba" | "raw" => Some(RAW_RGBA8_CONTENT_TYPE),
        _ => None,
    }
}
