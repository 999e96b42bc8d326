// Selective recolor of "marker" assets.
//
// Recolorable artwork is authored in pure blue: hue 120 on the 0..180 scale,
// saturation 255. The value channel carries the shading and is rescaled, so a
// gradient keeps its relative brightness under the new color.

use image::{Rgba, RgbaImage};

use crate::types::Hsv;

/// Marker hue on the half-degree (0..180) scale.
pub const MARKER_HUE: u8 = 120;
/// Marker saturation on the 0..255 scale.
pub const MARKER_SAT: u8 = 255;
/// Pixels with this value keep their value (pure black outlines).
const UNCHANGED_VALUE: u8 = 0;

/// 8-bit HSV: hue in half degrees (0..180), saturation and value in 0..=255.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hsv8 {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

/// RGB to 8-bit HSV with rounding, hue wrapped to 0..180.
pub fn rgb_to_hsv8(r: u8, g: u8, b: u8) -> Hsv8 {
    let (rf, gf, bf) = (r as f64, g as f64, b as f64);
    let v = r.max(g).max(b);
    let vmin = r.min(g).min(b);
    let diff = (v - vmin) as f64;

    let s = if v == 0 {
        0.0
    } else {
        (diff * 255.0 / v as f64).round()
    };

    let h_deg = if diff == 0.0 {
        0.0
    } else if v == r {
        60.0 * (gf - bf) / diff
    } else if v == g {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    let h_deg = if h_deg < 0.0 { h_deg + 360.0 } else { h_deg };
    let h = ((h_deg / 2.0).round() as u32 % 180) as u8;

    Hsv8 {
        h,
        s: s.clamp(0.0, 255.0) as u8,
        v,
    }
}

/// 8-bit HSV back to RGB, rounding each channel.
pub fn hsv8_to_rgb(hsv: Hsv8) -> [u8; 3] {
    let s = hsv.s as f64 / 255.0;
    let v = hsv.v as f64 / 255.0;
    let h = (hsv.h as f64 * 2.0) / 60.0;

    let sector = h.floor();
    let f = h - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match (sector as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    let to_u8 = |c: f64| (c * 255.0).round().clamp(0.0, 255.0) as u8;
    [to_u8(r), to_u8(g), to_u8(b)]
}

/// The target color on the 8-bit scales, truncated.
pub fn target_hsv8(target: Hsv) -> (u8, u8, f64) {
    let hue = (target.h / 2.0) as u32 % 180;
    let sat = (target.s / 100.0 * 255.0) as u8;
    let val = target.v / 100.0 * 255.0;
    (hue as u8, sat, val)
}

/// Retint the marker-colored parts of `image` to `target`.
///
/// Color is first scaled by alpha, then:
/// - pixels whose hue is [`MARKER_HUE`] take the target hue,
/// - pixels whose saturation is [`MARKER_SAT`] take the target saturation,
/// - every pixel with nonzero value gets `target_value * value / 255`.
///
/// The original alpha channel is reattached unchanged.
pub fn recolor(image: &RgbaImage, target: Hsv) -> RgbaImage {
    let (hue, sat, val) = target_hsv8(target);
    let mut out = RgbaImage::new(image.width(), image.height());

    for (src, dst) in image.pixels().zip(out.pixels_mut()) {
        let a = src[3];
        let af = a as f64 / 255.0;
        let premul = |c: u8| (c as f64 * af) as u8;

        let mut hsv = rgb_to_hsv8(premul(src[0]), premul(src[1]), premul(src[2]));
        if hsv.h == MARKER_HUE {
            hsv.h = hue;
        }
        if hsv.s == MARKER_SAT {
            hsv.s = sat;
        }
        if hsv.v != UNCHANGED_VALUE {
            hsv.v = (val * hsv.v as f64 / 255.0) as u8;
        }

        let [r, g, b] = hsv8_to_rgb(hsv);
        *dst = Rgba([r, g, b, a]);
    }
    out
}
