//! Construction-time pipeline configuration.

use std::path::PathBuf;

use overlay_common::clock::FrameBudget;
use overlay_common::config::{MissingAssetPolicy, OverlayConfig, PipelineSettings};
use overlay_common::error::{OverlayError, OverlayResult};
use overlay_frame_model::frame::{FrameSpec, PixelFormat};

/// Fixed parameters of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Geometry and format every base frame must have.
    pub spec: FrameSpec,

    /// Advisory compositing budget per frame.
    pub frame_budget: FrameBudget,

    /// Capacity of the base frame channel.
    pub frame_queue_depth: usize,

    /// Capacity of the overlay update channel.
    pub update_queue_depth: usize,

    /// What the update path does with overlays whose asset fails to load.
    pub missing_asset_policy: MissingAssetPolicy,

    /// Directory relative asset paths are resolved against.
    pub asset_base_dir: Option<PathBuf>,
}

impl PipelineConfig {
    /// Configuration for `spec` with default timing and queueing.
    pub fn new(spec: FrameSpec) -> Self {
        let defaults = PipelineSettings::default();
        Self {
            spec,
            frame_budget: FrameBudget::from_millis_f64(defaults.frame_budget_ms),
            frame_queue_depth: defaults.frame_queue_depth,
            update_queue_depth: defaults.update_queue_depth,
            missing_asset_policy: MissingAssetPolicy::default(),
            asset_base_dir: None,
        }
    }

    pub fn with_frame_budget(mut self, budget: FrameBudget) -> Self {
        self.frame_budget = budget;
        self
    }

    pub fn with_missing_asset_policy(mut self, policy: MissingAssetPolicy) -> Self {
        self.missing_asset_policy = policy;
        self
    }

    /// Build from the engine configuration file.
    pub fn from_overlay_config(config: &OverlayConfig) -> OverlayResult<Self> {
        config.validate()?;
        let format: PixelFormat = config
            .stream
            .format
            .parse()
            .map_err(|e| OverlayError::config(format!("{e}")))?;

        Ok(Self {
            spec: FrameSpec::new(config.stream.width, config.stream.height, format),
            frame_budget: FrameBudget::from_millis_f64(config.pipeline.frame_budget_ms),
            frame_queue_depth: config.pipeline.frame_queue_depth,
            update_queue_depth: config.pipeline.update_queue_depth,
            missing_asset_policy: config.assets.missing_asset_policy,
            asset_base_dir: config.assets.base_dir.clone(),
        })
    }

    /// Reject configurations a pipeline cannot start with.
    pub fn validate(&self) -> OverlayResult<()> {
        if self.spec.width == 0 || self.spec.height == 0 {
            return Err(OverlayError::config(format!(
                "Frame dimensions must be non-zero, got {}",
                self.spec
            )));
        }
        if self.frame_queue_depth == 0 || self.update_queue_depth == 0 {
            return Err(OverlayError::config("Queue depths must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn from_overlay_config_parses_format() {
        let mut config = OverlayConfig::default();
        config.stream.format = "bgra8".to_string();
        config.pipeline.frame_budget_ms = 16.0;

        let pipeline = PipelineConfig::from_overlay_config(&config).unwrap();
        assert_eq!(pipeline.spec, FrameSpec::new(640, 480, PixelFormat::Bgra8));
        assert_eq!(pipeline.frame_budget.duration(), Duration::from_millis(16));
    }

    #[test]
    fn unknown_format_is_a_config_error() {
        let mut config = OverlayConfig::default();
        config.stream.format = "nv12".to_string();
        assert!(matches!(
            PipelineConfig::from_overlay_config(&config),
            Err(OverlayError::Config { .. })
        ));
    }

    #[test]
    fn zero_sized_spec_is_rejected() {
        let config = PipelineConfig::new(FrameSpec::new(0, 480, PixelFormat::Rgb8));
        assert!(config.validate().is_err());
        assert!(PipelineConfig::new(FrameSpec::new(1, 1, PixelFormat::Mono8))
            .validate()
            .is_ok());
    }
}
