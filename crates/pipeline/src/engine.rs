//! Engine session: owns the shared registry and asset cache and runs the
//! frame loop and the update loop as tokio tasks.

use std::sync::Arc;

use overlay_asset_cache::{AssetCache, DecoderRegistry};
use overlay_common::config::OverlayConfig;
use overlay_common::error::{OverlayError, OverlayResult};
use overlay_frame_model::frame::Frame;
use overlay_frame_model::update::OverlayUpdate;
use overlay_registry::OverlayRegistry;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::PipelineConfig;
use crate::driver::{FramePipeline, FrameSink, PipelineStats};
use crate::stop::StopSignal;
use crate::updates::{OverlayUpdater, UpdateStats};

/// Lifecycle state of an [`OverlayEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Created but not started.
    Idle,
    /// Frame and update loops are running.
    Running,
    /// Stopped; cannot be restarted.
    Stopped,
}

/// Producer-side ends of a running engine.
#[derive(Debug, Clone)]
pub struct EngineInputs {
    /// Base frames, in arrival order.
    pub frames: mpsc::Sender<Frame>,
    /// Overlay descriptor updates.
    pub updates: mpsc::Sender<OverlayUpdate>,
}

/// Final statistics of a stopped engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineReport {
    pub pipeline: PipelineStats,
    pub updates: UpdateStats,
}

/// A compositing engine session.
pub struct OverlayEngine {
    config: PipelineConfig,
    registry: Arc<OverlayRegistry>,
    assets: Arc<AssetCache>,
    pipeline: FramePipeline,
    state: EngineState,
    stop: StopSignal,
    frame_task: Option<JoinHandle<OverlayResult<PipelineStats>>>,
    update_task: Option<JoinHandle<OverlayResult<UpdateStats>>>,
}

impl OverlayEngine {
    /// Create an engine with the given decoder backends.
    pub fn new(config: PipelineConfig, decoders: DecoderRegistry) -> OverlayResult<Self> {
        let mut cache = AssetCache::new(decoders);
        if let Some(dir) = &config.asset_base_dir {
            cache = cache.with_base_dir(dir.clone());
        }
        let registry = Arc::new(OverlayRegistry::new());
        let assets = Arc::new(cache);
        let pipeline = FramePipeline::new(config.clone(), Arc::clone(&registry), Arc::clone(&assets))?;

        Ok(Self {
            config,
            registry,
            assets,
            pipeline,
            state: EngineState::Idle,
            stop: StopSignal::new(),
            frame_task: None,
            update_task: None,
        })
    }

    /// Create an engine from the configuration file with the default decoders.
    pub fn from_config(config: &OverlayConfig) -> OverlayResult<Self> {
        Self::new(
            PipelineConfig::from_overlay_config(config)?,
            DecoderRegistry::with_defaults(),
        )
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The registry shared with producers.
    pub fn registry(&self) -> &Arc<OverlayRegistry> {
        &self.registry
    }

    pub fn assets(&self) -> &Arc<AssetCache> {
        &self.assets
    }

    pub fn pipeline(&self) -> &FramePipeline {
        &self.pipeline
    }

    /// An updater writing to this engine's registry and cache.
    pub fn updater(&self) -> OverlayUpdater {
        OverlayUpdater::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.assets),
            self.config.missing_asset_policy,
        )
    }

    /// A handle that stops both loops when signalled.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Spawn the frame and update loops. Must be called inside a tokio
    /// runtime.
    pub fn start<S>(&mut self, sink: S) -> OverlayResult<EngineInputs>
    where
        S: FrameSink + 'static,
    {
        if self.state != EngineState::Idle {
            return Err(OverlayError::pipeline("Engine already started"));
        }

        let (frame_tx, frame_rx) = mpsc::channel(self.config.frame_queue_depth);
        let (update_tx, update_rx) = mpsc::channel(self.config.update_queue_depth);

        let pipeline = self.pipeline.clone();
        let stop = self.stop.clone();
        self.frame_task = Some(tokio::spawn(async move {
            pipeline.run(frame_rx, sink, &stop).await
        }));

        let updater = self.updater();
        let stop = self.stop.clone();
        self.update_task = Some(tokio::spawn(async move {
            updater.run_updates(update_rx, &stop).await
        }));

        self.state = EngineState::Running;
        tracing::info!(
            spec = %self.config.spec,
            frame_queue = self.config.frame_queue_depth,
            update_queue = self.config.update_queue_depth,
            policy = ?self.config.missing_asset_policy,
            "Overlay engine started"
        );

        Ok(EngineInputs {
            frames: frame_tx,
            updates: update_tx,
        })
    }

    /// Signal both loops to stop and wait for them.
    ///
    /// A frame being composited when the stop arrives is still emitted.
    /// Returns the frame loop's error if its sink failed.
    pub async fn stop(&mut self) -> OverlayResult<EngineReport> {
        if self.state != EngineState::Running {
            return Err(OverlayError::pipeline("Engine not running"));
        }

        tracing::info!("Stopping overlay engine");
        self.stop.stop();
        self.state = EngineState::Stopped;

        let mut report = EngineReport::default();

        if let Some(handle) = self.update_task.take() {
            match handle.await {
                Ok(Ok(stats)) => report.updates = stats,
                Ok(Err(e)) => tracing::warn!(error = %e, "Update loop exited with error"),
                Err(e) => tracing::warn!(error = %e, "Update loop join failed"),
            }
        }

        if let Some(handle) = self.frame_task.take() {
            report.pipeline = handle
                .await
                .map_err(|e| OverlayError::pipeline(format!("Frame loop join failed: {e}")))??;
        }

        tracing::info!(
            frames = report.pipeline.frames_emitted,
            updates = report.updates.applied,
            "Overlay engine stopped"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for OverlayEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayEngine")
            .field("spec", &self.config.spec)
            .field("state", &self.state)
            .field("overlays", &self.registry.len())
            .field("assets", &self.assets.len())
            .finish()
    }
}
