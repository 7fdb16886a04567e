use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use overlay_asset_cache::{AssetCache, DecoderRegistry};
use overlay_common::config::MissingAssetPolicy;
use overlay_common::error::{OverlayError, OverlayResult};
use overlay_frame_model::asset::{AssetSource, RAW_RGBA8_CONTENT_TYPE};
use overlay_frame_model::element::{Geometry, OverlayContent, OverlayElement};
use overlay_frame_model::frame::{Frame, FrameSpec, PixelFormat, Rgba};
use overlay_frame_model::update::OverlayUpdate;
use overlay_pipeline::{
    ChannelSink, FramePipeline, FrameReport, FrameSink, OverlayEngine, PipelineConfig,
    PipelineOutput, StopSignal,
};
use overlay_registry::OverlayRegistry;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn spec() -> FrameSpec {
    FrameSpec::new(8, 6, PixelFormat::Rgb8)
}

fn base(shade: u8) -> Frame {
    Frame::filled(8, 6, PixelFormat::Rgb8, &[shade, shade, shade]).unwrap()
}

fn pipeline() -> FramePipeline {
    FramePipeline::new(
        PipelineConfig::new(spec()),
        Arc::new(OverlayRegistry::new()),
        Arc::new(AssetCache::default()),
    )
    .unwrap()
}

fn png_bytes(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(pixel));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("overlay-pipeline-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

async fn next_output(rx: &mut mpsc::Receiver<PipelineOutput>) -> PipelineOutput {
    timeout(WAIT, rx.recv()).await.unwrap().unwrap()
}

#[tokio::test]
async fn frames_come_out_in_arrival_order() {
    let pipeline = pipeline();
    pipeline
        .registry()
        .upsert(OverlayElement::new(
            "corner",
            Geometry::new(0, 0, 2, 2),
            OverlayContent::Solid(Rgba::rgb(255, 0, 0)),
        ))
        .unwrap();

    let (frame_tx, frame_rx) = mpsc::channel(4);
    let (sink, mut out_rx) = ChannelSink::channel(16);
    let stop = StopSignal::new();

    let runner = {
        let pipeline = pipeline.clone();
        let stop = stop.clone();
        tokio::spawn(async move { pipeline.run(frame_rx, sink, &stop).await })
    };

    for shade in [10u8, 20, 30, 40] {
        frame_tx.send(base(shade)).await.unwrap();
    }
    drop(frame_tx);

    for (expected_seq, shade) in [10u8, 20, 30, 40].into_iter().enumerate() {
        match next_output(&mut out_rx).await {
            PipelineOutput::Frame(processed) => {
                assert_eq!(processed.report.sequence, expected_seq as u64);
                assert_eq!(processed.frame.pixel(0, 0).unwrap(), &[255, 0, 0]);
                assert_eq!(processed.frame.pixel(7, 5).unwrap(), &[shade, shade, shade]);
            }
            other => panic!("unexpected output {other:?}"),
        }
    }

    let stats = timeout(WAIT, runner).await.unwrap().unwrap().unwrap();
    assert_eq!(stats.frames_received, 4);
    assert_eq!(stats.frames_emitted, 4);
    assert_eq!(stats.frames_skipped, 0);
}

#[tokio::test]
async fn mismatched_frames_are_reported_and_pipeline_continues() {
    let pipeline = pipeline();
    let (frame_tx, frame_rx) = mpsc::channel(4);
    let (sink, mut out_rx) = ChannelSink::channel(16);
    let stop = StopSignal::new();

    let runner = {
        let pipeline = pipeline.clone();
        let stop = stop.clone();
        tokio::spawn(async move { pipeline.run(frame_rx, sink, &stop).await })
    };

    frame_tx
        .send(Frame::filled(4, 4, PixelFormat::Rgb8, &[0, 0, 0]).unwrap())
        .await
        .unwrap();
    frame_tx.send(base(5)).await.unwrap();
    drop(frame_tx);

    match next_output(&mut out_rx).await {
        PipelineOutput::Skipped {
            sequence,
            error: OverlayError::FormatMismatch { expected, actual },
        } => {
            assert_eq!(sequence, 0);
            assert_eq!(expected, "8x6 rgb8");
            assert_eq!(actual, "4x4 rgb8");
        }
        other => panic!("expected a skip notice, got {other:?}"),
    }
    match next_output(&mut out_rx).await {
        PipelineOutput::Frame(processed) => {
            assert_eq!(processed.report.sequence, 1);
            assert_eq!(processed.frame, base(5));
        }
        other => panic!("unexpected output {other:?}"),
    }

    let stats = timeout(WAIT, runner).await.unwrap().unwrap().unwrap();
    assert_eq!(stats.frames_skipped, 1);
    assert_eq!(stats.frames_emitted, 1);
}

#[tokio::test]
async fn stop_ends_an_idle_pipeline() {
    let pipeline = pipeline();
    let (_frame_tx, frame_rx) = mpsc::channel::<Frame>(1);
    let (sink, _out_rx) = ChannelSink::channel(1);
    let stop = StopSignal::new();

    let runner = {
        let pipeline = pipeline.clone();
        let stop = stop.clone();
        tokio::spawn(async move { pipeline.run(frame_rx, sink, &stop).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    stop.stop();
    let stats = timeout(WAIT, runner).await.unwrap().unwrap().unwrap();
    assert_eq!(stats.frames_received, 0);
}

struct FailingSink {
    accepted: usize,
}

impl FrameSink for FailingSink {
    fn emit(&mut self, _frame: Frame, _report: FrameReport) -> OverlayResult<()> {
        if self.accepted == 1 {
            return Err(OverlayError::pipeline("downstream gone"));
        }
        self.accepted += 1;
        Ok(())
    }
}

#[tokio::test]
async fn sink_failure_ends_the_run() {
    let pipeline = pipeline();
    let (frame_tx, frame_rx) = mpsc::channel(4);
    for shade in [1u8, 2, 3] {
        frame_tx.send(base(shade)).await.unwrap();
    }

    let stop = StopSignal::new();
    let result = timeout(
        WAIT,
        pipeline.run(frame_rx, FailingSink { accepted: 0 }, &stop),
    )
    .await
    .unwrap();

    assert!(matches!(result, Err(OverlayError::Pipeline { .. })));
    assert_eq!(pipeline.stats().frames_emitted, 1);
}

#[tokio::test]
async fn engine_composites_png_asset_end_to_end() {
    let dir = scratch_dir("engine");
    std::fs::write(dir.join("badge.png"), png_bytes(2, 2, [0, 255, 0, 255])).unwrap();

    let mut config = PipelineConfig::new(spec());
    config.asset_base_dir = Some(dir.clone());
    let mut engine = OverlayEngine::new(config, DecoderRegistry::with_defaults()).unwrap();

    let (sink, mut out_rx) = ChannelSink::channel(4);
    let inputs = engine.start(sink).unwrap();

    inputs
        .updates
        .send(OverlayUpdate::RegisterAsset {
            key: "badge".into(),
            source: AssetSource::file("badge.png"),
        })
        .await
        .unwrap();
    inputs
        .updates
        .send(OverlayUpdate::upsert(
            OverlayElement::new(
                "badge",
                Geometry::new(6, 4, 4, 4),
                OverlayContent::Asset {
                    key: "badge".into(),
                },
            )
            .with_z_order(3),
        ))
        .await
        .unwrap();

    timeout(WAIT, async {
        while !engine.registry().contains("badge") {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    inputs.frames.send(base(0)).await.unwrap();
    match next_output(&mut out_rx).await {
        PipelineOutput::Frame(processed) => {
            assert_eq!(processed.report.elements.drawn, 1);
            assert_eq!(processed.frame.pixel(7, 5).unwrap(), &[0, 255, 0]);
            assert_eq!(processed.frame.pixel(5, 5).unwrap(), &[0, 0, 0]);
        }
        other => panic!("unexpected output {other:?}"),
    }

    let report = timeout(WAIT, engine.stop()).await.unwrap().unwrap();
    assert_eq!(report.pipeline.frames_emitted, 1);
    assert_eq!(report.updates.applied, 2);
    assert_eq!(engine.assets().decode_count(), 1);

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn engine_marks_unresolvable_overlays() {
    let mut config = PipelineConfig::new(spec()).with_missing_asset_policy(MissingAssetPolicy::Marker);
    config.frame_queue_depth = 2;
    let mut engine = OverlayEngine::new(config, DecoderRegistry::with_defaults()).unwrap();
    let (sink, mut out_rx) = ChannelSink::channel(4);
    let inputs = engine.start(sink).unwrap();

    inputs
        .updates
        .send(OverlayUpdate::upsert(OverlayElement::new(
            "broken",
            Geometry::new(0, 0, 1, 1),
            OverlayContent::Asset {
                key: "missing".into(),
            },
        )))
        .await
        .unwrap();

    timeout(WAIT, async {
        while !engine.registry().contains("broken") {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    inputs.frames.send(base(0)).await.unwrap();
    match next_output(&mut out_rx).await {
        PipelineOutput::Frame(processed) => {
            assert_eq!(processed.frame.pixel(0, 0).unwrap(), &[255, 0, 255]);
        }
        other => panic!("unexpected output {other:?}"),
    }

    let report = timeout(WAIT, engine.stop()).await.unwrap().unwrap();
    assert_eq!(report.updates.missing_assets, 1);
}

#[tokio::test]
async fn corrupt_asset_header_does_not_stall_frames() {
    let config = PipelineConfig::new(spec()).with_missing_asset_policy(MissingAssetPolicy::Marker);
    let mut engine = OverlayEngine::new(config, DecoderRegistry::with_defaults()).unwrap();
    let (sink, mut out_rx) = ChannelSink::channel(4);
    let inputs = engine.start(sink).unwrap();

    // 2^31 x 2^31 pixels with no pixel data.
    let header = vec![0, 0, 0, 128, 0, 0, 0, 128];
    inputs
        .updates
        .send(OverlayUpdate::RegisterAsset {
            key: "corrupt".into(),
            source: AssetSource::bytes(RAW_RGBA8_CONTENT_TYPE, header),
        })
        .await
        .unwrap();
    inputs
        .updates
        .send(OverlayUpdate::upsert(OverlayElement::new(
            "corrupt",
            Geometry::new(0, 0, 1, 1),
            OverlayContent::Asset {
                key: "corrupt".into(),
            },
        )))
        .await
        .unwrap();

    timeout(WAIT, async {
        while !engine.registry().contains("corrupt") {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    for shade in [0u8, 9] {
        inputs.frames.send(base(shade)).await.unwrap();
        match next_output(&mut out_rx).await {
            PipelineOutput::Frame(processed) => {
                assert_eq!(processed.frame.pixel(0, 0).unwrap(), &[255, 0, 255]);
                assert_eq!(processed.frame.pixel(7, 5).unwrap(), &[shade, shade, shade]);
            }
            other => panic!("unexpected output {other:?}"),
        }
    }

    let report = timeout(WAIT, engine.stop()).await.unwrap().unwrap();
    assert_eq!(report.pipeline.frames_emitted, 2);
    assert_eq!(report.updates.missing_assets, 1);
    assert!(!engine.assets().is_resolved("corrupt"));
}

#[test]
fn update_script_is_applied_in_order() {
    let dir = scratch_dir("script");
    let script = dir.join("overlays.jsonl");
    std::fs::write(
        &script,
        r#"# status overlays
{"op":"upsert","element":{"id":"rec","geometry":{"x":0,"y":0,"width":2,"height":2},"content":{"kind":"solid","r":255,"g":0,"b":0}}}
{"op":"upsert","element":{"id":"hud","geometry":{"x":2,"y":0,"width":2,"height":2},"content":{"kind":"solid","r":0,"g":0,"b":255},"z_order":1}}
{"op":"set_visible","id":"rec","visible":false}
{"op":"remove","id":"unknown"}
"#,
    )
    .unwrap();

    let registry = Arc::new(OverlayRegistry::new());
    let updater = overlay_pipeline::OverlayUpdater::new(
        Arc::clone(&registry),
        Arc::new(AssetCache::default()),
        MissingAssetPolicy::Drop,
    );
    let outcomes = updater.apply_file(&script).unwrap();

    assert_eq!(outcomes.len(), 4);
    assert_eq!(outcomes[3], overlay_pipeline::UpdateOutcome::Ignored);
    assert_eq!(registry.ids(), vec!["rec".to_string(), "hud".to_string()]);
    assert!(!registry.get("rec").unwrap().visible);

    let _ = std::fs::remove_dir_all(dir);
}
