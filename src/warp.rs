// Piecewise-affine warp of an effect image onto per-frame landmarks.
// Every triangle is handled inside its own bounding box, so per-frame cost
// follows the triangles' footprint rather than the canvas size.

use image::{Rgba, RgbaImage};

use crate::delaunay::signed_area2;
use crate::error::{Error, Result};
use crate::types::{Point2, Triangle};

/// 2x3 affine map: `x' = a*x + b*y + c`, `y' = d*x + e*y + f`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 0.0,
        e: 1.0,
        f: 0.0,
    };

    /// The unique affine map taking `src[i]` to `dst[i]`.
    /// `None` when the source points are collinear.
    pub fn from_triangles(src: [Point2; 3], dst: [Point2; 3]) -> Option<Self> {
        let det = signed_area2(src[0], src[1], src[2]);
        if det.abs() < 1e-12 {
            return None;
        }
        // Cramer's rule on [x y 1] * [a b c]^T = x' (and the same for y').
        let solve = |t0: f64, t1: f64, t2: f64| -> (f64, f64, f64) {
            let [p0, p1, p2] = src;
            let a = (t0 * (p1.y - p2.y) + t1 * (p2.y - p0.y) + t2 * (p0.y - p1.y)) / det;
            let b = (t0 * (p2.x - p1.x) + t1 * (p0.x - p2.x) + t2 * (p1.x - p0.x)) / det;
            let c = (t0 * (p1.x * p2.y - p2.x * p1.y)
                + t1 * (p2.x * p0.y - p0.x * p2.y)
                + t2 * (p0.x * p1.y - p1.x * p0.y))
                / det;
            (a, b, c)
        };
        let (a, b, c) = solve(dst[0].x, dst[1].x, dst[2].x);
        let (d, e, f) = solve(dst[0].y, dst[1].y, dst[2].y);
        Some(Self { a, b, c, d, e, f })
    }

    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.b * y + self.c,
            self.d * x + self.e * y + self.f,
        )
    }

    pub fn invert(&self) -> Option<Self> {
        let det = self.a * self.e - self.b * self.d;
        if det.abs() < 1e-12 {
            return None;
        }
        let ia = self.e / det;
        let ib = -self.b / det;
        let id = -self.d / det;
        let ie = self.a / det;
        Some(Self {
            a: ia,
            b: ib,
            c: -(ia * self.c + ib * self.f),
            d: id,
            e: ie,
            f: -(id * self.c + ie * self.f),
        })
    }
}

/// Integer crop window inside an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropBox {
    /// Bounding box `floor(min)..=floor(max)` of `pts`, clipped to `img_w` x `img_h`.
    pub fn around(pts: &[Point2; 3], img_w: u32, img_h: u32) -> Option<Self> {
        let min_x = pts.iter().map(|p| p.x).fold(f64::INFINITY, f64::min).floor();
        let min_y = pts.iter().map(|p| p.y).fold(f64::INFINITY, f64::min).floor();
        let max_x = pts.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max).floor();
        let max_y = pts.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max).floor();

        let x0 = min_x.max(0.0);
        let y0 = min_y.max(0.0);
        let x1 = (max_x + 1.0).min(img_w as f64);
        let y1 = (max_y + 1.0).min(img_h as f64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }

    fn local(&self, p: Point2) -> Point2 {
        Point2::new(p.x - self.x as f64, p.y - self.y as f64)
    }
}

/// Reflect-101 border: `gfedcb|abcdefgh|gfedcba`.
#[inline]
pub fn reflect101(mut i: i64, len: i64) -> i64 {
    if len == 1 {
        return 0;
    }
    loop {
        if i < 0 {
            i = -i;
        } else if i >= len {
            i = 2 * len - 2 - i;
        } else {
            return i;
        }
    }
}

/// Bilinear sample of `img` restricted to `crop`, at crop-local `(sx, sy)`.
#[inline]
fn sample_bilinear(img: &RgbaImage, crop: &CropBox, sx: f64, sy: f64) -> [u8; 4] {
    let w = crop.width as i64;
    let h = crop.height as i64;
    let fx0 = sx.floor();
    let fy0 = sy.floor();
    let tx = sx - fx0;
    let ty = sy - fy0;
    let x0 = fx0 as i64;
    let y0 = fy0 as i64;

    let px = |x: i64, y: i64| -> Rgba<u8> {
        let xx = reflect101(x, w) as u32 + crop.x;
        let yy = reflect101(y, h) as u32 + crop.y;
        *img.get_pixel(xx, yy)
    };
    let p00 = px(x0, y0);
    let p10 = px(x0 + 1, y0);
    let p01 = px(x0, y0 + 1);
    let p11 = px(x0 + 1, y0 + 1);

    let w00 = (1.0 - tx) * (1.0 - ty);
    let w10 = tx * (1.0 - ty);
    let w01 = (1.0 - tx) * ty;
    let w11 = tx * ty;

    let mut out = [0u8; 4];
    for (c, slot) in out.iter_mut().enumerate() {
        let v = p00[c] as f64 * w00 + p10[c] as f64 * w10 + p01[c] as f64 * w01 + p11[c] as f64 * w11;
        *slot = v.round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Edge-inclusive point-in-triangle test.
#[inline]
pub fn triangle_contains(tri: &[Point2; 3], p: Point2) -> bool {
    let d0 = signed_area2(tri[0], tri[1], p);
    let d1 = signed_area2(tri[1], tri[2], p);
    let d2 = signed_area2(tri[2], tri[0], p);
    let has_neg = d0 < 0.0 || d1 < 0.0 || d2 < 0.0;
    let has_pos = d0 > 0.0 || d1 > 0.0 || d2 > 0.0;
    !(has_neg && has_pos)
}

/// Filled-triangle mask of `width` x `height`, row-major.
pub fn fill_triangle_mask(width: u32, height: u32, tri: &[Point2; 3]) -> Vec<bool> {
    let mut mask = vec![false; (width as usize) * (height as usize)];
    for y in 0..height {
        for x in 0..width {
            if triangle_contains(tri, Point2::new(x as f64, y as f64)) {
                mask[(y * width + x) as usize] = true;
            }
        }
    }
    mask
}

/// Destination vertices: z dropped, truncated toward zero to whole pixels.
#[inline]
fn to_pixel(p: Point2) -> Point2 {
    Point2::new(p.x.trunc(), p.y.trunc())
}

fn warp_one(
    source: &RgbaImage,
    overlay: &mut RgbaImage,
    tri: &Triangle,
    src_points: &[Point2],
    dst_points: &[Point2],
) -> Result<()> {
    let [i, j, k] = tri.indices();
    let degenerate = || Error::DegenerateTriangle(i, j, k);

    let src_tri = tri.gather(src_points);
    let dst_tri = tri.gather(dst_points).map(to_pixel);

    let dst_w = dst_tri.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max)
        - dst_tri.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let dst_h = dst_tri.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max)
        - dst_tri.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    if dst_w == 0.0 || dst_h == 0.0 {
        return Err(degenerate());
    }

    let (src_w, src_h) = source.dimensions();
    let (dst_cw, dst_ch) = overlay.dimensions();
    let src_box = CropBox::around(&src_tri, src_w, src_h).ok_or_else(degenerate)?;
    let dst_box = CropBox::around(&dst_tri, dst_cw, dst_ch).ok_or_else(degenerate)?;

    let src_local = src_tri.map(|p| src_box.local(p));
    let dst_local = dst_tri.map(|p| dst_box.local(p));

    let forward = Affine::from_triangles(src_local, dst_local).ok_or_else(degenerate)?;
    let inverse = forward.invert().ok_or_else(degenerate)?;

    let mask = fill_triangle_mask(dst_box.width, dst_box.height, &dst_local);
    for y in 0..dst_box.height {
        for x in 0..dst_box.width {
            if !mask[(y * dst_box.width + x) as usize] {
                continue;
            }
            let ox = dst_box.x + x;
            let oy = dst_box.y + y;
            // Already painted by a neighbor sharing this edge.
            if overlay.get_pixel(ox, oy)[3] != 0 {
                continue;
            }
            let (sx, sy) = inverse.apply(x as f64, y as f64);
            let s = sample_bilinear(source, &src_box, sx, sy);
            let dst = overlay.get_pixel_mut(ox, oy);
            for c in 0..4 {
                dst[c] = dst[c].saturating_add(s[c]);
            }
        }
    }
    Ok(())
}

/// Warp `source` triangle by triangle from `src_points` onto `dst_points`.
///
/// Returns a `canvas`-sized RGBA overlay whose alpha is nonzero only where a
/// triangle painted. Collapsed triangles are skipped.
pub fn warp_triangles(
    source: &RgbaImage,
    src_points: &[Point2],
    dst_points: &[Point2],
    triangles: &[Triangle],
    canvas: (u32, u32),
) -> Result<RgbaImage> {
    if src_points.len() != dst_points.len() {
        return Err(Error::LandmarkCount {
            expected: src_points.len(),
            actual: dst_points.len(),
        });
    }

    let mut overlay = RgbaImage::new(canvas.0, canvas.1);
    let mut skipped = 0usize;
    for tri in triangles {
        match warp_one(source, &mut overlay, tri, src_points, dst_points) {
            Ok(()) => {}
            Err(err @ Error::DegenerateTriangle(..)) => {
                tracing::trace!(%err, "skipping triangle");
                skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }
    if skipped > 0 {
        tracing::debug!(skipped, total = triangles.len(), "collapsed triangles skipped");
    }
    Ok(overlay)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            Rgba([(x * 3 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8, 255])
        })
    }

    fn pts(v: &[(f64, f64)]) -> Vec<Point2> {
        v.iter().map(|&(x, y)| Point2::new(x, y)).collect()
    }

    #[test]
    fn affine_maps_the_three_points() {
        let src = [Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), Point2::new(0.0, 10.0)];
        let dst = [Point2::new(5.0, 5.0), Point2::new(25.0, 5.0), Point2::new(5.0, 35.0)];
        let m = Affine::from_triangles(src, dst).unwrap();
        for (s, d) in src.iter().zip(&dst) {
            let (x, y) = m.apply(s.x, s.y);
            assert!((x - d.x).abs() < 1e-9 && (y - d.y).abs() < 1e-9);
        }
        let inv = m.invert().unwrap();
        let (x, y) = inv.apply(25.0, 5.0);
        assert!((x - 10.0).abs() < 1e-9 && y.abs() < 1e-9);
    }

    #[test]
    fn affine_of_identical_triangles_is_identity() {
        let t = [Point2::new(3.0, 1.0), Point2::new(9.0, 4.0), Point2::new(2.0, 8.0)];
        let m = Affine::from_triangles(t, t).unwrap();
        let id = Affine::IDENTITY;
        for (got, want) in [
            (m.a, id.a),
            (m.b, id.b),
            (m.c, id.c),
            (m.d, id.d),
            (m.e, id.e),
            (m.f, id.f),
        ] {
            assert!((got - want).abs() < 1e-12);
        }
    }

    #[test]
    fn collinear_source_has_no_affine() {
        let src = [Point2::new(0.0, 0.0), Point2::new(1.0, 1.0), Point2::new(2.0, 2.0)];
        assert!(Affine::from_triangles(src, src).is_none());
    }

    #[test]
    fn reflect101_mirrors_without_repeating_the_edge() {
        assert_eq!(reflect101(-1, 5), 1);
        assert_eq!(reflect101(-2, 5), 2);
        assert_eq!(reflect101(5, 5), 3);
        assert_eq!(reflect101(6, 5), 2);
        assert_eq!(reflect101(3, 5), 3);
        assert_eq!(reflect101(-7, 1), 0);
    }

    #[test]
    fn crop_box_is_inclusive_and_clipped() {
        let tri = [Point2::new(2.5, 3.0), Point2::new(7.9, 3.0), Point2::new(4.0, 9.0)];
        let b = CropBox::around(&tri, 100, 100).unwrap();
        assert_eq!(b, CropBox { x: 2, y: 3, width: 6, height: 7 });

        let off = [Point2::new(-5.0, -5.0), Point2::new(3.0, -5.0), Point2::new(-5.0, 4.0)];
        let b = CropBox::around(&off, 100, 100).unwrap();
        assert_eq!(b, CropBox { x: 0, y: 0, width: 4, height: 5 });

        let gone = [Point2::new(200.0, 5.0), Point2::new(210.0, 5.0), Point2::new(205.0, 9.0)];
        assert!(CropBox::around(&gone, 100, 100).is_none());
    }

    #[test]
    fn identical_triangles_copy_the_source_region() {
        let src = gradient(64, 64);
        let points = pts(&[(10.0, 10.0), (50.0, 12.0), (20.0, 55.0)]);
        let tris = [Triangle::new(0, 1, 2)];
        let out = warp_triangles(&src, &points, &points, &tris, (64, 64)).unwrap();

        let tri = [points[0], points[1], points[2]];
        let mut painted = 0;
        for (x, y, px) in out.enumerate_pixels() {
            if triangle_contains(&tri, Point2::new(x as f64, y as f64)) {
                assert_eq!(px, src.get_pixel(x, y), "pixel ({x}, {y})");
                painted += 1;
            } else {
                assert_eq!(px.0, [0, 0, 0, 0], "pixel ({x}, {y}) outside the triangle");
            }
        }
        assert!(painted > 500);
    }

    #[test]
    fn translated_triangle_moves_pixels() {
        let src = gradient(64, 64);
        let from = pts(&[(10.0, 10.0), (30.0, 10.0), (10.0, 30.0)]);
        let to = pts(&[(20.0, 25.0), (40.0, 25.0), (20.0, 45.0)]);
        let out = warp_triangles(&src, &from, &to, &[Triangle::new(0, 1, 2)], (64, 64)).unwrap();
        assert_eq!(out.get_pixel(25, 30), src.get_pixel(15, 15));
        assert_eq!(out.get_pixel(5, 5).0, [0, 0, 0, 0]);
    }

    #[test]
    fn shared_edges_are_painted_once() {
        let src = RgbaImage::from_pixel(32, 32, Rgba([100, 100, 100, 200]));
        let points = pts(&[(0.0, 0.0), (31.0, 0.0), (31.0, 31.0), (0.0, 31.0)]);
        let tris = [Triangle::new(0, 1, 2), Triangle::new(0, 2, 3)];
        let out = warp_triangles(&src, &points, &points, &tris, (32, 32)).unwrap();
        // The diagonal belongs to both triangles and must not be double-added.
        for i in 0..32 {
            assert_eq!(out.get_pixel(i, i).0, [100, 100, 100, 200]);
        }
    }

    #[test]
    fn collapsed_destination_triangles_are_skipped() {
        let src = gradient(32, 32);
        let from = pts(&[(0.0, 0.0), (20.0, 0.0), (0.0, 20.0), (20.0, 20.0)]);
        // Triangle 0 collapses onto a horizontal line; triangle 1 is fine.
        let to = pts(&[(5.0, 5.0), (15.0, 5.0), (9.0, 5.0), (15.0, 15.0)]);
        let tris = [Triangle::new(0, 1, 2), Triangle::new(1, 2, 3)];
        let out = warp_triangles(&src, &from, &to, &tris, (32, 32)).unwrap();
        assert!(out.pixels().any(|p| p[3] != 0));
    }

    #[test]
    fn triangles_outside_the_canvas_are_skipped() {
        let src = gradient(32, 32);
        let from = pts(&[(0.0, 0.0), (20.0, 0.0), (0.0, 20.0)]);
        let to = pts(&[(100.0, 100.0), (120.0, 100.0), (100.0, 120.0)]);
        let out = warp_triangles(&src, &from, &to, &[Triangle::new(0, 1, 2)], (32, 32)).unwrap();
        assert!(out.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn partly_visible_triangle_keeps_source_alignment() {
        let src = gradient(64, 64);
        let from = pts(&[(10.0, 10.0), (50.0, 10.0), (10.0, 50.0)]);
        // Same shape shifted up-left by 20, so it hangs off the top-left corner.
        let to = pts(&[(-10.0, -10.0), (30.0, -10.0), (-10.0, 30.0)]);
        let out = warp_triangles(&src, &from, &to, &[Triangle::new(0, 1, 2)], (64, 64)).unwrap();

        for (x, y) in [(0, 0), (5, 5), (15, 4), (4, 15), (20, 0)] {
            assert_eq!(
                out.get_pixel(x, y).0,
                src.get_pixel(x + 20, y + 20).0,
                "pixel ({x}, {y})"
            );
        }
        // Past the hypotenuse.
        assert_eq!(out.get_pixel(15, 15)[3], 0);
        assert_eq!(out.get_pixel(40, 5)[3], 0);
    }

    #[test]
    fn replaying_one_triangulation_on_two_arrays() {
        let src = gradient(64, 64);
        let reference = pts(&[(5.0, 5.0), (60.0, 5.0), (60.0, 60.0), (5.0, 60.0), (30.0, 30.0)]);
        let tris = crate::delaunay::build_triangulation(
            &reference,
            crate::types::Rect::from_size(64, 64),
        )
        .unwrap();

        let a = pts(&[(10.0, 10.0), (90.0, 12.0), (88.0, 70.0), (12.0, 75.0), (50.0, 40.0)]);
        let b = pts(&[(-20.0, 0.0), (30.0, -5.0), (140.0, 200.0), (0.0, 0.0), (0.0, 0.0)]);
        let out_a = warp_triangles(&src, &reference, &a, &tris, (100, 80)).unwrap();
        let out_b = warp_triangles(&src, &reference, &b, &tris, (100, 80)).unwrap();
        assert_eq!(out_a.dimensions(), (100, 80));
        assert_eq!(out_b.dimensions(), (100, 80));
        assert!(out_a.pixels().any(|p| p[3] != 0));
    }

    #[test]
    fn point_count_mismatch_is_reported() {
        let src = gradient(8, 8);
        let a = pts(&[(0.0, 0.0), (5.0, 0.0), (0.0, 5.0)]);
        let err = warp_triangles(&src, &a, &a[..2], &[Triangle::new(0, 1, 2)], (8, 8)).unwrap_err();
        assert!(matches!(err, Error::LandmarkCount { expected: 3, actual: 2 }));
    }
}
