// Alpha compositing of the warped overlay onto the camera frame, plus the
// straight-alpha layering used to stack facepaint assets.
use image::{GrayImage, Luma, RgbImage, Rgba, RgbaImage};

use crate::error::{Error, Result};

/// Median filter of the alpha channel with a `(2*radius+1)` square aperture.
/// Borders replicate the edge pixels.
pub fn median_blur_alpha(img: &RgbaImage, radius: u32) -> GrayImage {
    let (w, h) = img.dimensions();
    let alpha = GrayImage::from_fn(w, h, |x, y| Luma([img.get_pixel(x, y)[3]]));
    if radius == 0 || w == 0 || h == 0 {
        return alpha;
    }

    let r = radius as i64;
    let mut window = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);
    let mut out = GrayImage::new(w, h);
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            window.clear();
            // Histogram-free: apertures here are small (a few pixels).
            for dy in -r..=r {
                let yy = (y + dy).clamp(0, h as i64 - 1) as u32;
                for dx in -r..=r {
                    let xx = (x + dx).clamp(0, w as i64 - 1) as u32;
                    window.push(alpha.get_pixel(xx, yy)[0]);
                }
            }
            let mid = window.len() / 2;
            let (_, median, _) = window.select_nth_unstable(mid);
            out.put_pixel(x as u32, y as u32, Luma([*median]));
        }
    }
    out
}

/// Put `foreground` over `background` using the foreground's alpha.
///
/// `out = fg * a/255 + bg * (1 - a/255)`, truncated per channel. With
/// `blur = Some(r)` the alpha is median-filtered first (radius `r`) to soften
/// jagged triangle seams.
pub fn overlay_image(
    background: &RgbImage,
    foreground: &RgbaImage,
    blur: Option<u32>,
) -> Result<RgbImage> {
    if background.dimensions() != foreground.dimensions() {
        let (bw, bh) = background.dimensions();
        let (fw, fh) = foreground.dimensions();
        return Err(Error::dimension_mismatch(format!(
            "overlay: background {bw}x{bh} vs foreground {fw}x{fh}"
        )));
    }

    let mask = match blur {
        Some(r) if r > 0 => Some(median_blur_alpha(foreground, r)),
        _ => None,
    };

    let mut out = background.clone();
    for (x, y, px) in out.enumerate_pixels_mut() {
        let fg = foreground.get_pixel(x, y);
        let a = match &mask {
            Some(m) => m.get_pixel(x, y)[0],
            None => fg[3],
        };
        if a == 0 {
            continue; // keep the camera pixel
        }
        let fa = a as f64 / 255.0;
        let ba = (255 - a) as f64 / 255.0;
        for c in 0..3 {
            px[c] = (fg[c] as f64 * fa + px[c] as f64 * ba) as u8;
        }
    }
    Ok(out)
}

/// Straight-alpha "over" of `front` onto `back` (both RGBA, equal size).
pub fn alpha_composite(back: &RgbaImage, front: &RgbaImage) -> Result<RgbaImage> {
    if back.dimensions() != front.dimensions() {
        return Err(Error::dimension_mismatch(
            "alpha_composite expects equal-size rgba images",
        ));
    }
    let mut out = back.clone();
    for (d, s) in out.pixels_mut().zip(front.pixels()) {
        *d = over(*d, *s);
    }
    Ok(out)
}

fn over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    if src[3] == 255 {
        return src;
    }
    if src[3] == 0 {
        return dst;
    }
    let sa = src[3] as f64 / 255.0;
    let da = dst[3] as f64 / 255.0;
    let oa = sa + da * (1.0 - sa);
    let mut out = [0u8; 4];
    for i in 0..3 {
        let c = (src[i] as f64 * sa + dst[i] as f64 * da * (1.0 - sa)) / oa;
        out[i] = c.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (oa * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}
