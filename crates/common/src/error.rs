//! Error types shared across the overlay engine crates.

use std::path::PathBuf;

/// Top-level error type for overlay engine operations.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("Asset not found: {key}")]
    AssetNotFound { key: String },

    #[error("Failed to decode asset {key}: {message}")]
    AssetDecodeFailed { key: String, message: String },

    #[error("No decoder registered for content type {content_type}")]
    UnsupportedContentType { content_type: String },

    #[error("Frame format mismatch: expected {expected}, got {actual}")]
    FormatMismatch { expected: String, actual: String },

    #[error("Invalid frame: {message}")]
    InvalidFrame { message: String },

    #[error("Invalid overlay element: {message}")]
    InvalidElement { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Pipeline error: {message}")]
    Pipeline { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using OverlayError.
pub type OverlayResult<T> = Result<T, OverlayError>;

impl OverlayError {
    pub fn asset_not_found(key: impl Into<String>) -> Self {
        Self::AssetNotFound { key: key.into() }
    }

    pub fn asset_decode(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::AssetDecodeFailed {
            key: key.into(),
            message: msg.into(),
        }
    }

    pub fn format_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::FormatMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_frame(msg: impl Into<String>) -> Self {
        Self::InvalidFrame {
            message: msg.into(),
        }
    }

    pub fn invalid_element(msg: impl Into<String>) -> Self {
        Self::InvalidElement {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::Pipeline {
            message: msg.into(),
        }
    }

    /// Whether this error concerns a single overlay asset.
    ///
    /// Asset errors are contained per element and never fail a frame.
    pub fn is_asset_error(&self) -> bool {
        matches!(
            self,
            Self::AssetNotFound { .. }
                | Self::AssetDecodeFailed { .. }
                | Self::UnsupportedContentType { .. }
        )
    }
}
