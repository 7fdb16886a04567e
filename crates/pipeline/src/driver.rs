//! Frame pipeline driver.
//!
//! One base frame in, one composited frame out, strictly in arrival order.
//! Each tick takes its own registry snapshot and runs the compositor on the
//! blocking pool; the next frame is not accepted until the sink has the
//! previous one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use overlay_asset_cache::AssetCache;
use overlay_common::clock::StreamClock;
use overlay_common::error::{OverlayError, OverlayResult};
use overlay_compositor::{CompositeReport, Compositor};
use overlay_frame_model::frame::Frame;
use overlay_registry::OverlayRegistry;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::config::PipelineConfig;
use crate::stop::StopSignal;

/// Consumer of composited frames.
pub trait FrameSink: Send {
    /// Accept one composited frame. An error ends the pipeline run.
    fn emit(&mut self, frame: Frame, report: FrameReport) -> OverlayResult<()>;

    /// A base frame was dropped instead of composited.
    fn frame_skipped(&mut self, sequence: u64, error: OverlayError) {
        let _ = (sequence, error);
    }
}

/// Per-frame metadata handed to the sink alongside the output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Arrival index of the base frame, starting at 0.
    pub sequence: u64,
    /// Registry version of the snapshot that was composited.
    pub snapshot_version: u64,
    /// Per-element outcome.
    pub elements: CompositeReport,
    /// Time spent snapshotting and compositing.
    pub elapsed: Duration,
    /// Whether `elapsed` exceeded the frame budget.
    pub overrun: bool,
}

/// A composited frame and its report.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedFrame {
    pub frame: Frame,
    pub report: FrameReport,
}

/// Runtime statistics from a frame pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    /// Base frames accepted from the source.
    pub frames_received: u64,

    /// Frames composited successfully.
    pub frames_composited: u64,

    /// Frames handed to the sink.
    pub frames_emitted: u64,

    /// Frames dropped because they did not match the configured format.
    pub frames_skipped: u64,

    /// Frames that exceeded the compositing budget.
    pub overruns: u64,

    /// Compositing time of the most recent frame in milliseconds.
    pub last_composite_ms: f64,

    /// Longest compositing time seen in milliseconds.
    pub max_composite_ms: f64,
}

impl PipelineStats {
    /// Skip rate as a percentage.
    pub fn skip_rate(&self) -> f64 {
        if self.frames_received == 0 {
            return 0.0;
        }
        self.frames_skipped as f64 / self.frames_received as f64 * 100.0
    }
}

/// Drives base frames through the compositor.
///
/// Cloning is cheap and clones share registry, assets, statistics and the
/// frame sequence counter.
#[derive(Debug, Clone)]
pub struct FramePipeline {
    config: PipelineConfig,
    registry: Arc<OverlayRegistry>,
    compositor: Compositor,
    stats: Arc<Mutex<PipelineStats>>,
    next_sequence: Arc<AtomicU64>,
}

impl FramePipeline {
    /// Create a pipeline. Fails on configurations it cannot run with.
    pub fn new(
        config: PipelineConfig,
        registry: Arc<OverlayRegistry>,
        assets: Arc<AssetCache>,
    ) -> OverlayResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry,
            compositor: Compositor::new(assets),
            stats: Arc::new(Mutex::new(PipelineStats::default())),
            next_sequence: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<OverlayRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats.lock().clone()
    }

    /// Composite one base frame against a fresh registry snapshot.
    ///
    /// Frames that do not match the configured spec are rejected with
    /// `FormatMismatch` and counted as skipped.
    pub fn process_frame(&self, frame: Frame) -> OverlayResult<ProcessedFrame> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        self.process_sequenced(frame, sequence)
    }

    fn process_sequenced(&self, mut frame: Frame, sequence: u64) -> OverlayResult<ProcessedFrame> {
        self.stats.lock().frames_received += 1;

        if frame.spec() != self.config.spec {
            self.stats.lock().frames_skipped += 1;
            return Err(OverlayError::format_mismatch(
                self.config.spec.to_string(),
                frame.spec().to_string(),
            ));
        }

        let started = Instant::now();
        let snapshot = self.registry.snapshot();
        let elements = self.compositor.composite_into(&mut frame, &snapshot);
        let check = self.config.frame_budget.check(started);

        {
            let mut stats = self.stats.lock();
            stats.frames_composited += 1;
            stats.last_composite_ms = check.elapsed_ms();
            stats.max_composite_ms = stats.max_composite_ms.max(check.elapsed_ms());
            if check.is_overrun() {
                stats.overruns += 1;
            }
        }

        if check.is_overrun() {
            tracing::warn!(
                sequence,
                elapsed_ms = check.elapsed_ms(),
                budget_ms = StreamClock::duration_ms(check.budget),
                over_ms = StreamClock::duration_ms(check.overrun_by()),
                elements = snapshot.len(),
                "Compositing overran frame budget"
            );
        }

        Ok(ProcessedFrame {
            frame,
            report: FrameReport {
                sequence,
                snapshot_version: snapshot.version(),
                elements,
                elapsed: check.elapsed,
                overrun: check.is_overrun(),
            },
        })
    }

    /// Process one frame and deliver the outcome to `sink`.
    fn tick<S: FrameSink>(&self, frame: Frame, sink: &mut S) -> OverlayResult<()> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        match self.process_sequenced(frame, sequence) {
            Ok(processed) => {
                sink.emit(processed.frame, processed.report)?;
                self.stats.lock().frames_emitted += 1;
            }
            Err(e) => {
                tracing::warn!(sequence, error = %e, "Dropping base frame");
                sink.frame_skipped(sequence, e);
            }
        }
        Ok(())
    }

    /// Run until the source closes, `stop` is signalled, or the sink fails.
    ///
    /// Stop requests are honoured between frames; a frame already being
    /// composited is finished and emitted.
    pub async fn run<S>(
        &self,
        mut source: mpsc::Receiver<Frame>,
        sink: S,
        stop: &StopSignal,
    ) -> OverlayResult<PipelineStats>
    where
        S: FrameSink + 'static,
    {
        let clock = StreamClock::start();
        let mut listener = stop.subscribe();
        let mut sink = sink;

        tracing::info!(
            spec = %self.config.spec,
            budget_ms = StreamClock::duration_ms(self.config.frame_budget.duration()),
            started = clock.epoch_wall(),
            "Frame pipeline started"
        );

        loop {
            if listener.is_stopped() {
                tracing::debug!("Stop requested");
                break;
            }

            let frame = tokio::select! {
                biased;
                _ = listener.stopped() => {
                    tracing::debug!("Stop requested while waiting for a frame");
                    break;
                }
                frame = source.recv() => match frame {
                    Some(frame) => frame,
                    None => {
                        tracing::debug!("Frame source closed");
                        break;
                    }
                },
            };

            let pipeline = self.clone();
            let (returned, result) = tokio::task::spawn_blocking(move || {
                let result = pipeline.tick(frame, &mut sink);
                (sink, result)
            })
            .await
            .map_err(|e| OverlayError::pipeline(format!("Compositing task failed: {e}")))?;
            sink = returned;

            if let Err(e) = result {
                tracing::error!(error = %e, "Frame sink failed; stopping pipeline");
                return Err(e);
            }
        }

        let stats = self.stats();
        tracing::info!(
            received = stats.frames_received,
            emitted = stats.frames_emitted,
            skipped = stats.frames_skipped,
            overruns = stats.overruns,
            uptime_secs = clock.elapsed_secs(),
            "Frame pipeline stopped"
        );
        Ok(stats)
    }
}

/// Sink that forwards frames into a bounded channel.
///
/// Emitting blocks while the channel is full, which pushes back on the
/// pipeline instead of buffering without bound.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<PipelineOutput>,
}

/// Item delivered by a [`ChannelSink`].
#[derive(Debug)]
pub enum PipelineOutput {
    Frame(ProcessedFrame),
    Skipped { sequence: u64, error: OverlayError },
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<PipelineOutput>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving end of a channel with `capacity` slots.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<PipelineOutput>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

impl FrameSink for ChannelSink {
    fn emit(&mut self, frame: Frame, report: FrameReport) -> OverlayResult<()> {
        self.tx
            .blocking_send(PipelineOutput::Frame(ProcessedFrame { frame, report }))
            .map_err(|_| OverlayError::pipeline("Output channel closed"))
    }

    fn frame_skipped(&mut self, sequence: u64, error: OverlayError) {
        if self
            .tx
            .blocking_send(PipelineOutput::Skipped { sequence, error })
            .is_err()
        {
            tracing::debug!(sequence, "Output channel closed; skip notice dropped");
        }
    }
}
