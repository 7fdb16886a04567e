//! Overlay Pipeline
//!
//! Runs the compositing engine against a live stream:
//!
//! ```text
//! frames ──► FramePipeline ──(snapshot, composite)──► FrameSink
//!                 ▲
//!           OverlayRegistry ◄── OverlayUpdater ◄── updates
//!                                     │
//!                                AssetCache
//! ```
//!
//! The frame loop handles one frame at a time and never waits on asset
//! decoding; the update loop resolves assets before elements that use them
//! become visible to the next snapshot.

pub mod config;
pub mod driver;
pub mod engine;
pub mod stop;
pub mod updates;

pub use config::PipelineConfig;
pub use driver::{
    ChannelSink, FramePipeline, FrameReport, FrameSink, PipelineOutput, PipelineStats,
    ProcessedFrame,
};
pub use engine::{EngineInputs, EngineReport, EngineState, OverlayEngine};
pub use stop::{StopListener, StopSignal};
pub use updates::{load_updates_file, OverlayUpdater, UpdateOutcome, UpdateStats};
