// A landmark detector that replays recorded frames.
//
// Recording format: a JSON array with one entry per frame, either `null`
// (no face) or an array of `[x, y]` / `[x, y, z]` points in frame pixels.

use std::path::Path;

use image::RgbImage;

use crate::error::{Error, Result};
use crate::pipeline::LandmarkDetector;
use crate::types::{Landmark, LandmarkFrame};

#[derive(Clone, Debug)]
pub struct ReplayDetector {
    frames: Vec<Option<LandmarkFrame>>,
    next: usize,
}

impl ReplayDetector {
    pub fn new(frames: Vec<Option<LandmarkFrame>>) -> Self {
        Self { frames, next: 0 }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Vec<Option<Vec<Vec<f64>>>> = serde_json::from_str(json)?;
        let mut frames = Vec::with_capacity(raw.len());
        for (f, entry) in raw.into_iter().enumerate() {
            let Some(points) = entry else {
                frames.push(None);
                continue;
            };
            let mut landmarks = Vec::with_capacity(points.len());
            for (i, p) in points.iter().enumerate() {
                let lm = match p.as_slice() {
                    [x, y] => Landmark::new(*x, *y, 0.0),
                    [x, y, z] => Landmark::new(*x, *y, *z),
                    _ => {
                        return Err(Error::asset_load(format!(
                            "frame {f}, point {i}: expected 2 or 3 coordinates"
                        )));
                    }
                };
                landmarks.push(lm);
            }
            frames.push(Some(LandmarkFrame::new(landmarks)));
        }
        Ok(Self::new(frames))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::asset_load(format!("{}: {e}", path.display())))?;
        let replay = Self::from_json(&text)?;
        tracing::info!(path = %path.display(), frames = replay.len(), "loaded landmark recording");
        Ok(replay)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl LandmarkDetector for ReplayDetector {
    /// Next recorded frame, wrapping around at the end. Empty recordings never
    /// find a face.
    fn detect(&mut self, _frame: &RgbImage) -> Result<Option<LandmarkFrame>> {
        if self.frames.is_empty() {
            return Ok(None);
        }
        let out = self.frames[self.next].clone();
        self.next = (self.next + 1) % self.frames.len();
        Ok(out)
    }

    fn close(&mut self) {
        self.next = 0;
    }
}
