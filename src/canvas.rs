// ============================================================================
// VIEWPORT - zoom / pan transform between content space and screen space
// ============================================================================
//
// Content (image and mask) pixels map to the screen as
//   screen = origin + content * scale
// where `origin` is the on-screen top-left of the displayed image (it already
// includes the pan offset). Brush sizes are expressed in content pixels, so
// painting is independent of the zoom level.

use serde::{Deserialize, Serialize};

pub const DEFAULT_ZOOM: f32 = 1.0;
pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 5.0;
/// Step used by the zoom buttons and `+` / `-` shortcuts.
pub const ZOOM_STEP: f32 = 0.1;
/// Step applied per mouse-wheel notch.
pub const WHEEL_ZOOM_STEP: f32 = 0.05;
/// Margin kept around the image when fitting it into its container.
pub const FIT_PADDING: f32 = 40.0;

/// A point in screen or content space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn lerp(self, other: Point, t: f32) -> Point {
        Point {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

/// Zoom scale plus pan offset (screen pixels). Transient UI state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scale: DEFAULT_ZOOM,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

impl Viewport {
    pub fn zoom_in(&mut self) {
        self.zoom_at(ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.zoom_at(-ZOOM_STEP);
    }

    /// Adjust the scale by `delta`, clamped to `[MIN_ZOOM, MAX_ZOOM]`.
    pub fn zoom_at(&mut self, delta: f32) {
        self.scale = (self.scale + delta).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Mouse-wheel input: scrolling down (`delta_y > 0`) zooms out.
    pub fn wheel(&mut self, delta_y: f32) {
        if delta_y > 0.0 {
            self.zoom_at(-WHEEL_ZOOM_STEP);
        } else if delta_y < 0.0 {
            self.zoom_at(WHEEL_ZOOM_STEP);
        }
    }

    /// Pan by a screen-space delta. Unbounded.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.offset_x += dx;
        self.offset_y += dy;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Largest scale (never above 1:1) that shows the whole image inside the
    /// container with [`FIT_PADDING`] to spare. Offsets are reset.
    pub fn fit_to_container(
        &mut self,
        container_width: f32,
        container_height: f32,
        image_width: u32,
        image_height: u32,
    ) {
        if image_width == 0 || image_height == 0 {
            return;
        }
        let scale_x = (container_width - FIT_PADDING) / image_width as f32;
        let scale_y = (container_height - FIT_PADDING) / image_height as f32;
        self.scale = scale_x.min(scale_y).min(1.0).max(MIN_ZOOM);
        self.offset_x = 0.0;
        self.offset_y = 0.0;
    }

    /// Map a pointer position to content pixels, given the on-screen origin
    /// of the displayed content.
    pub fn screen_to_content(&self, screen: Point, origin: Point) -> Point {
        Point {
            x: (screen.x - origin.x) / self.scale,
            y: (screen.y - origin.y) / self.scale,
        }
    }

    pub fn content_to_screen(&self, content: Point, origin: Point) -> Point {
        Point {
            x: origin.x + content.x * self.scale,
            y: origin.y + content.y * self.scale,
        }
    }

    /// On-screen diameter of the brush outline for a content-space size.
    pub fn brush_cursor_diameter(&self, brush_size: f32) -> f32 {
        brush_size * self.scale
    }
}

/// Partial update for [`Viewport`]; unspecified fields keep their value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewportUpdate {
    pub scale: Option<f32>,
    pub offset_x: Option<f32>,
    pub offset_y: Option<f32>,
}

impl ViewportUpdate {
    pub fn scale(scale: f32) -> Self {
        Self { scale: Some(scale), ..Self::default() }
    }

    pub fn offset(offset_x: f32, offset_y: f32) -> Self {
        Self {
            offset_x: Some(offset_x),
            offset_y: Some(offset_y),
            ..Self::default()
        }
    }

    pub fn apply_to(self, viewport: &mut Viewport) {
        if let Some(scale) = self.scale {
            viewport.scale = scale;
        }
        if let Some(offset_x) = self.offset_x {
            viewport.offset_x = offset_x;
        }
        if let Some(offset_y) = self.offset_y {
            viewport.offset_y = offset_y;
        }
    }
}

#[cfg(test)]
#[path = "canvas_test.rs"]
mod tests;
