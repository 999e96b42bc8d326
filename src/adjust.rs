// Output adjustment: zoom the finished frame about its center and shift it,
// so the picture lines up with whatever it is shown on (mirror, projector).
// The frame keeps its size; uncovered areas are black.

use std::sync::Arc;

use image::RgbImage;
use image::imageops::{self, FilterType};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MIN_SCALE: f64 = 0.1;
const MAX_SCALE: f64 = 10.0;

/// Adjustment shared between the window thread (keys) and the render thread.
pub type SharedAdjustment = Arc<Mutex<Adjustment>>;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Adjustment {
    /// Zoom about the frame center; 1.0 leaves it unchanged.
    pub scale: f64,
    /// Shift to the right, in pixels, applied after zooming.
    pub x_offset: i32,
    /// Shift downwards, in pixels.
    pub y_offset: i32,
}

impl Default for Adjustment {
    fn default() -> Self {
        Self {
            scale: 1.0,
            x_offset: 0,
            y_offset: 0,
        }
    }
}

impl Adjustment {
    pub fn is_identity(&self) -> bool {
        self.scale == 1.0 && self.x_offset == 0 && self.y_offset == 0
    }

    pub fn validate(&self) -> Result<()> {
        if !self.scale.is_finite() || !(MIN_SCALE..=MAX_SCALE).contains(&self.scale) {
            return Err(Error::config(format!(
                "adjustment scale must be within {MIN_SCALE}..={MAX_SCALE}, got {}",
                self.scale
            )));
        }
        Ok(())
    }

    /// Step the scale and offsets, keeping the scale in range.
    pub fn nudge(&mut self, scale: f64, dx: i32, dy: i32) {
        self.scale = (self.scale + scale).clamp(MIN_SCALE, MAX_SCALE);
        self.x_offset = self.x_offset.saturating_add(dx);
        self.y_offset = self.y_offset.saturating_add(dy);
    }

    pub fn shared(self) -> SharedAdjustment {
        Arc::new(Mutex::new(self))
    }

    pub fn apply(&self, frame: RgbImage) -> RgbImage {
        if self.is_identity() {
            return frame;
        }
        let (w, h) = frame.dimensions();
        let sw = ((w as f64 * self.scale).round() as u32).max(1);
        let sh = ((h as f64 * self.scale).round() as u32).max(1);
        let scaled = if (sw, sh) == (w, h) {
            frame
        } else {
            imageops::resize(&frame, sw, sh, FilterType::CatmullRom)
        };

        let x = (w as i64 - sw as i64) / 2 + self.x_offset as i64;
        let y = (h as i64 - sh as i64) / 2 + self.y_offset as i64;
        let mut out = RgbImage::new(w, h);
        imageops::replace(&mut out, &scaled, x, y);
        out
    }
}
