//! Frame compositor: paints an overlay snapshot over a base frame.

use std::collections::HashMap;
use std::sync::Arc;

use overlay_asset_cache::{AssetCache, AssetHandle, DecoderRegistry};
use overlay_frame_model::element::{OverlayContent, OverlayElement, PixelRect};
use overlay_frame_model::frame::{Frame, Raster, Rgba};
use overlay_frame_model::snapshot::OverlaySnapshot;

use crate::blend::PixelBlender;

/// What happened to each element of a snapshot during one composite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompositeReport {
    /// Elements that painted at least one pixel.
    pub drawn: usize,
    /// Invisible or fully transparent elements.
    pub skipped_hidden: usize,
    /// Elements whose asset was not available.
    pub skipped_missing: usize,
    /// Elements that covered no pixel of the frame.
    pub no_coverage: usize,
}

/// Content resolved for painting.
enum Source<'a> {
    Raster(&'a Raster),
    Solid(Rgba),
}

/// Blends overlay snapshots onto frames.
///
/// Compositing never fails: elements whose content cannot be read are
/// skipped and the rest of the frame is still produced.
#[derive(Debug, Clone)]
pub struct Compositor {
    assets: Arc<AssetCache>,
}

impl Compositor {
    pub fn new(assets: Arc<AssetCache>) -> Self {
        Self { assets }
    }

    /// Compositor with an empty asset cache; asset elements are always skipped.
    pub fn without_assets() -> Self {
        Self::new(Arc::new(AssetCache::new(DecoderRegistry::new())))
    }

    /// Produce a new frame: `base` with every element of `snapshot` painted
    /// over it in draw order.
    pub fn composite(&self, base: &Frame, snapshot: &OverlaySnapshot) -> Frame {
        self.composite_with_report(base, snapshot).0
    }

    pub fn composite_with_report(
        &self,
        base: &Frame,
        snapshot: &OverlaySnapshot,
    ) -> (Frame, CompositeReport) {
        let mut output = base.clone();
        let report = self.composite_into(&mut output, snapshot);
        (output, report)
    }

    /// Paint `snapshot` over `frame` in place.
    pub fn composite_into(&self, frame: &mut Frame, snapshot: &OverlaySnapshot) -> CompositeReport {
        let mut report = CompositeReport::default();
        if snapshot.is_empty() {
            return report;
        }

        // Check out every referenced asset up front; invalidations that land
        // while we paint do not affect this frame.
        let handles: HashMap<&str, AssetHandle> = snapshot
            .asset_keys()
            .into_iter()
            .filter_map(|key| self.assets.get(key).map(|handle| (key, handle)))
            .collect();

        let blender = PixelBlender::new(frame.format());

        for element in snapshot {
            if !element.is_drawable() {
                report.skipped_hidden += 1;
                continue;
            }
            let opacity = element.clamped_opacity();

            let source = match &element.content {
                OverlayContent::Inline(raster) => Source::Raster(raster),
                OverlayContent::Solid(color) => Source::Solid(*color),
                OverlayContent::Asset { key } => match handles.get(key.as_str()) {
                    Some(handle) => Source::Raster(handle.as_ref()),
                    None => {
                        tracing::trace!(element = %element.id, key = %key, "Asset unavailable; skipping element");
                        report.skipped_missing += 1;
                        continue;
                    }
                },
            };

            let Some(rect) = element.geometry.clip_to(frame.width(), frame.height()) else {
                report.no_coverage += 1;
                continue;
            };

            let painted = match source {
                Source::Solid(color) => {
                    paint_solid(frame, &blender, rect, color, opacity);
                    true
                }
                Source::Raster(raster) => {
                    paint_raster(frame, &blender, element, rect, raster, opacity)
                }
            };

            if painted {
                report.drawn += 1;
            } else {
                report.no_coverage += 1;
            }
        }

        report
    }
}

fn paint_solid(frame: &mut Frame, blender: &PixelBlender, rect: PixelRect, color: Rgba, opacity: f32) {
    if color.a == 0 {
        return;
    }
    let stride = frame.stride();
    let bpp = blender.bytes_per_pixel();
    let data = frame.data_mut();
    for y in rect.y0..rect.y1 {
        let row_start = y as usize * stride;
        let span = &mut data[row_start + rect.x0 as usize * bpp..row_start + rect.x1 as usize * bpp];
        blender.blend_span(span, color.to_array(), opacity);
    }
}

/// Paint a raster stretched (nearest neighbour) to the element geometry,
/// restricted to the clipped rectangle. Returns `false` for empty rasters.
fn paint_raster(
    frame: &mut Frame,
    blender: &PixelBlender,
    element: &OverlayElement,
    rect: PixelRect,
    raster: &Raster,
    opacity: f32,
) -> bool {
    if raster.is_empty() {
        return false;
    }
    let geometry = element.geometry;

    let columns: Vec<u32> = (rect.x0..rect.x1)
        .map(|x| source_index(x, geometry.x, geometry.width, raster.width()))
        .collect();

    let stride = frame.stride();
    let bpp = blender.bytes_per_pixel();
    let data = frame.data_mut();
    for y in rect.y0..rect.y1 {
        let sy = source_index(y, geometry.y, geometry.height, raster.height());
        let row_start = y as usize * stride + rect.x0 as usize * bpp;
        let row = &mut data[row_start..row_start + columns.len() * bpp];
        for (dst, &sx) in row.chunks_exact_mut(bpp).zip(&columns) {
            blender.blend(dst, raster.pixel(sx, sy), opacity);
        }
    }
    true
}

/// Map a destination coordinate inside `[origin, origin + extent)` to a
/// source coordinate in `[0, source_extent)`.
#[inline]
fn source_index(dst: u32, origin: i32, extent: u32, source_extent: u32) -> u32 {
    let offset = (dst as i64 - origin as i64) as u64;
    let index = offset * source_extent as u64 / extent as u64;
    index.min(source_extent as u64 - 1) as u32
}
