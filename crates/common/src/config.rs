//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{OverlayError, OverlayResult};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Base stream geometry, fixed for the lifetime of a pipeline.
    pub stream: StreamSettings,

    /// Frame pipeline timing and queueing.
    pub pipeline: PipelineSettings,

    /// Overlay asset handling.
    pub assets: AssetSettings,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Base stream geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Pixel format name (e.g. "rgb8", "bgra8", "mono8").
    pub format: String,
}

/// Frame pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Advisory per-frame compositing budget in milliseconds.
    pub frame_budget_ms: f64,

    /// Capacity of the base frame channel.
    pub frame_queue_depth: usize,

    /// Capacity of the overlay update channel.
    pub update_queue_depth: usize,
}

/// What the update path does when an overlay's asset cannot be resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingAssetPolicy {
    /// Do not add the element to the registry.
    Drop,
    /// Replace the element's content with a solid error marker.
    #[default]
    Marker,
    /// Keep the element as-is; the compositor will draw nothing for it.
    Keep,
}

/// Overlay asset settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    /// Policy applied when a referenced asset fails to resolve.
    pub missing_asset_policy: MissingAssetPolicy,

    /// Directory that relative asset file paths are resolved against.
    pub base_dir: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "overlay_pipeline=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            format: "rgb8".to_string(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            // One frame at 30 Hz.
            frame_budget_ms: 33.3,
            frame_queue_depth: 1,
            update_queue_depth: 64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl OverlayConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load and validate config from an explicit path.
    pub fn load_from(path: &Path) -> OverlayResult<Self> {
        if !path.exists() {
            return Err(OverlayError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Reject configurations the pipeline cannot start with.
    pub fn validate(&self) -> OverlayResult<()> {
        if self.stream.width == 0 || self.stream.height == 0 {
            return Err(OverlayError::config(format!(
                "Frame dimensions must be non-zero, got {}x{}",
                self.stream.width, self.stream.height
            )));
        }
        if !self.pipeline.frame_budget_ms.is_finite() || self.pipeline.frame_budget_ms <= 0.0 {
            return Err(OverlayError::config(format!(
                "Frame budget must be a positive number of milliseconds, got {}",
                self.pipeline.frame_budget_ms
            )));
        }
        if self.pipeline.frame_queue_depth == 0 || self.pipeline.update_queue_depth == 0 {
            return Err(OverlayError::config("Queue depths must be at least 1"));
        }
        Ok(())
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("image-overlay").join("config.json")
}
