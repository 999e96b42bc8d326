// Core types shared by the warp engine, the assets and the frame loop.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Packed pixels for the minifb window.
#[derive(Clone)]
pub struct FrameBuffer {
    pub width: usize,     // how wide the frame is on screen (pixels)
    pub height: usize,    // how tall the frame is on screen (pixels)
    pub pixels: Vec<u32>, // each entry is 0x00RRGGBB for minifb
}

impl FrameBuffer {
    pub fn from_rgb(img: &image::RgbImage) -> Self {
        let (w, h) = img.dimensions();
        let pixels = img
            .pixels()
            .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32)
            .collect();
        Self {
            width: w as usize,
            height: h as usize,
            pixels,
        }
    }
}

/// A point in pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One detector output point. `z` is carried but never used for warping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Landmark {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn xy(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}

/// All landmarks of one face in one frame, in detector order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LandmarkFrame {
    pub points: Vec<Landmark>,
}

impl LandmarkFrame {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn from_xy(points: &[Point2]) -> Self {
        Self {
            points: points.iter().map(|p| Landmark::new(p.x, p.y, 0.0)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn to_xy(&self) -> Vec<Point2> {
        self.points.iter().map(Landmark::xy).collect()
    }
}

/// Index triple into a point array. Valid for every array of the same length and order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triangle(pub [usize; 3]);

impl Triangle {
    pub const fn new(a: usize, b: usize, c: usize) -> Self {
        Self([a, b, c])
    }

    pub fn indices(&self) -> [usize; 3] {
        self.0
    }

    pub fn contains(&self, idx: usize) -> bool {
        self.0.contains(&idx)
    }

    /// Gather the three vertices from `points`.
    #[inline]
    pub fn gather<T: Copy>(&self, points: &[T]) -> [T; 3] {
        [points[self.0[0]], points[self.0[1]], points[self.0[2]]]
    }
}

/// Selects the subset of landmarks an effect needs (e.g. only the lips).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointFilter {
    indices: Vec<usize>,
}

impl PointFilter {
    /// Indices must be in `0..full_len`.
    pub fn new(indices: Vec<usize>, full_len: usize) -> Result<Self> {
        if let Some(bad) = indices.iter().find(|&&i| i >= full_len) {
            return Err(Error::invalid_filter(format!(
                "index {bad} out of range for {full_len} points"
            )));
        }
        Ok(Self { indices })
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Pick the filtered entries, in filter order.
    pub fn apply<T: Copy>(&self, full: &[T]) -> Result<Vec<T>> {
        self.indices
            .iter()
            .map(|&i| {
                full.get(i).copied().ok_or_else(|| {
                    Error::invalid_filter(format!(
                        "index {i} out of range for {} points",
                        full.len()
                    ))
                })
            })
            .collect()
    }
}

/// Axis-aligned rectangle, `x`/`y` inclusive, `width`/`height` exclusive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f64, height as f64)
    }

    pub fn contains(&self, p: Point2) -> bool {
        p.x >= self.x && p.y >= self.y && p.x <= self.x + self.width && p.y <= self.y + self.height
    }
}

/// Desired color in user units: hue degrees, saturation and value in percent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHsv")]
pub struct Hsv {
    pub h: f64,
    pub s: f64,
    pub v: f64,
}

#[derive(Deserialize)]
struct RawHsv {
    h: f64,
    s: f64,
    v: f64,
}

impl TryFrom<RawHsv> for Hsv {
    type Error = Error;

    fn try_from(raw: RawHsv) -> Result<Self> {
        Hsv::new(raw.h, raw.s, raw.v)
    }
}

impl Hsv {
    pub fn new(h: f64, s: f64, v: f64) -> Result<Self> {
        if !(0.0..=360.0).contains(&h) {
            return Err(Error::invalid_color(format!("hue {h} outside 0..=360")));
        }
        if !(0.0..=100.0).contains(&s) {
            return Err(Error::invalid_color(format!("saturation {s} outside 0..=100")));
        }
        if !(0.0..=100.0).contains(&v) {
            return Err(Error::invalid_color(format!("value {v} outside 0..=100")));
        }
        Ok(Self { h, s, v })
    }

    /// Used by the fixed palettes, whose entries are known to be in range.
    pub(crate) const fn new_unchecked(h: f64, s: f64, v: f64) -> Self {
        Self { h, s, v }
    }
}

impl std::fmt::Display for Hsv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HSV({}, {}%, {}%)", self.h, self.s, self.v)
    }
}

impl std::str::FromStr for Hsv {
    type Err = Error;

    /// Parses `h,s,v`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(Error::invalid_color(format!("expected h,s,v but got '{s}'")));
        }
        let mut vals = [0.0f64; 3];
        for (slot, part) in vals.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| Error::invalid_color(format!("'{part}' is not a number")))?;
        }
        Hsv::new(vals[0], vals[1], vals[2])
    }
}
