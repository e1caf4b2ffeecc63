use image::{GrayImage, Luma};
use rayon::prelude::*;

use crate::canvas::{Point, Viewport};
use crate::components::tools::BrushSettings;
use crate::io::{EncodedImage, ImageDataError};
use crate::session::EditorSession;

// ============================================================================
// MASK RASTERIZER - brush strokes into a single-channel selection mask
// ============================================================================

/// Closest two dabs of one stroke may be, in mask pixels.
pub const MIN_DAB_SPACING: f32 = 0.5;

/// Selection mask sized to the edited image. 0 = unselected, 255 = fully
/// selected. Painting only ever raises a pixel's value.
#[derive(Clone, Debug, PartialEq)]
pub struct MaskRasterizer {
    mask: GrayImage,
}

impl MaskRasterizer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            mask: GrayImage::new(width, height),
        }
    }

    /// Decode a mask produced elsewhere; selection is read from luminance.
    pub fn from_encoded(encoded: &EncodedImage) -> Result<Self, ImageDataError> {
        let bytes = encoded.decode_bytes()?;
        let mask = image::load_from_memory(&bytes)?.into_luma8();
        Ok(Self { mask })
    }

    /// Resize to `(width, height)` and drop all selection.
    pub fn initialize(&mut self, width: u32, height: u32) {
        self.mask = GrayImage::new(width, height);
    }

    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    pub fn height(&self) -> u32 {
        self.mask.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.mask.dimensions()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.mask
    }

    pub fn value_at(&self, x: u32, y: u32) -> Option<u8> {
        (x < self.mask.width() && y < self.mask.height()).then(|| self.mask.get_pixel(x, y)[0])
    }

    /// Stamp a filled circle of diameter `size` centred on `center`.
    pub fn stamp(&mut self, center: Point, size: f32, opacity: f32) {
        if !(size > 0.0) || !center.x.is_finite() || !center.y.is_finite() {
            return;
        }
        let intensity = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        if intensity == 0 {
            return;
        }

        let radius = size / 2.0;
        let radius_sq = radius * radius;
        let (w, h) = (self.mask.width() as i64, self.mask.height() as i64);
        let min_x = ((center.x - radius).floor() as i64).clamp(0, w);
        let max_x = ((center.x + radius).ceil() as i64).clamp(0, w);
        let min_y = ((center.y - radius).floor() as i64).clamp(0, h);
        let max_y = ((center.y + radius).ceil() as i64).clamp(0, h);

        for y in min_y..max_y {
            let dy = y as f32 + 0.5 - center.y;
            for x in min_x..max_x {
                let dx = x as f32 + 0.5 - center.x;
                if dx * dx + dy * dy <= radius_sq {
                    let px = self.mask.get_pixel_mut(x as u32, y as u32);
                    if intensity > px[0] {
                        *px = Luma([intensity]);
                    }
                }
            }
        }
    }

    /// Stamp along `from -> to`, dabs no more than `size / 4` apart so fast
    /// pointer motion leaves no gaps. Spacing never drops below
    /// [`MIN_DAB_SPACING`], and only the part of the segment that can reach
    /// the raster is walked. Both ends of that part are stamped.
    pub fn paint_stroke(&mut self, from: Point, to: Point, size: f32, opacity: f32) {
        if !(size > 0.0) || !from.distance(to).is_finite() {
            return;
        }
        let Some((t0, t1)) = self.reachable_span(from, to, size / 2.0) else {
            return;
        };
        let start = from.lerp(to, t0);
        let end = from.lerp(to, t1);

        let spacing = (size / 4.0).max(MIN_DAB_SPACING);
        let steps = ((start.distance(end) / spacing).ceil() as usize).max(1);
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            self.stamp(start.lerp(end, t), size, opacity);
        }
    }

    /// Parameter range of `from -> to` lying within `margin` of the raster
    /// (Liang-Barsky clip), or `None` when the segment never gets that close.
    fn reachable_span(&self, from: Point, to: Point, margin: f32) -> Option<(f32, f32)> {
        let max_x = self.mask.width() as f32 + margin;
        let max_y = self.mask.height() as f32 + margin;
        let (dx, dy) = (to.x - from.x, to.y - from.y);
        let edges = [
            (-dx, from.x + margin),
            (dx, max_x - from.x),
            (-dy, from.y + margin),
            (dy, max_y - from.y),
        ];

        let (mut t0, mut t1) = (0.0_f32, 1.0_f32);
        for (p, q) in edges {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
        }
        (t0 <= t1).then_some((t0, t1))
    }

    pub fn clear(&mut self) {
        self.mask.par_chunks_mut(4096).for_each(|chunk| chunk.fill(0));
    }

    /// True when no pixel carries any selection.
    pub fn is_empty(&self) -> bool {
        !self.mask.as_raw().par_iter().any(|&v| v > 0)
    }

    /// Fraction of pixels with any selection (0.0–1.0).
    pub fn coverage(&self) -> f32 {
        let total = self.mask.as_raw().len();
        if total == 0 {
            return 0.0;
        }
        let selected = self.mask.as_raw().par_iter().filter(|&&v| v > 0).count();
        selected as f32 / total as f32
    }

    /// PNG snapshot (opaque grayscale RGBA) for the edit endpoint.
    pub fn export(&self) -> Result<EncodedImage, ImageDataError> {
        EncodedImage::from_gray(&self.mask)
    }
}

// ============================================================================
// MASK CANVAS - pointer stroke lifecycle on top of the rasterizer
// ============================================================================

/// Owns the mask raster for the editing view and tracks the in-progress
/// stroke. Pointer positions arrive in screen space and are mapped through
/// the viewport, so a brush always covers the same image pixels at any zoom.
#[derive(Clone, Debug)]
pub struct MaskCanvas {
    raster: MaskRasterizer,
    last_point: Option<Point>,
}

impl MaskCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            raster: MaskRasterizer::new(width, height),
            last_point: None,
        }
    }

    pub fn raster(&self) -> &MaskRasterizer {
        &self.raster
    }

    pub fn is_drawing(&self) -> bool {
        self.last_point.is_some()
    }

    pub fn pointer_down(
        &mut self,
        screen: Point,
        origin: Point,
        viewport: &Viewport,
        brush: &BrushSettings,
    ) {
        let pos = viewport.screen_to_content(screen, origin);
        self.raster.stamp(pos, brush.size, brush.opacity);
        self.last_point = Some(pos);
    }

    pub fn pointer_move(
        &mut self,
        screen: Point,
        origin: Point,
        viewport: &Viewport,
        brush: &BrushSettings,
    ) {
        let Some(last) = self.last_point else { return };
        let pos = viewport.screen_to_content(screen, origin);
        self.raster.paint_stroke(last, pos, brush.size, brush.opacity);
        self.last_point = Some(pos);
    }

    /// End the stroke (pointer up or leave). Returns the exported mask when a
    /// stroke was in progress.
    pub fn pointer_up(&mut self) -> Result<Option<EncodedImage>, ImageDataError> {
        if self.last_point.take().is_none() {
            return Ok(None);
        }
        self.raster.export().map(Some)
    }

    pub fn clear(&mut self) {
        self.last_point = None;
        self.raster.clear();
    }

    /// Follow the session: a new image size reallocates the raster, and a
    /// session that no longer holds a mask (tool switch, commit, undo)
    /// clears it.
    pub fn sync_with(&mut self, session: &EditorSession) {
        let dims = session.image_dimensions();
        if self.raster.dimensions() != dims {
            self.raster.initialize(dims.0, dims.1);
            self.last_point = None;
        } else if session.mask_data().is_none() && !self.is_drawing() && !self.raster.is_empty() {
            self.raster.clear();
        }
    }
}

#[cfg(test)]
#[path = "mask_test.rs"]
mod tests;
