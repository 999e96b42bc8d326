// Delaunay triangulation of the reference points (Bowyer-Watson).
// Runs once per asset; the index triples it returns are replayed on every frame
// against the detector's landmarks, so they must refer to input indices only.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{Point2, Rect, Triangle};

/// Directions of the three enclosing vertices. They sit infinitely far from
/// the input, so triangles touching them are tested symbolically.
const SUPER_DIRS: [Point2; 3] = [
    Point2 { x: -2.0, y: -1.0 },
    Point2 { x: 0.0, y: 2.0 },
    Point2 { x: 2.0, y: -1.0 },
];

/// The region a new point must fall in to invalidate a triangle.
enum Circumcircle {
    Disk { cx: f64, cy: f64, r2: f64 },
    /// One vertex at infinity: the open side of `ab` facing it, plus the
    /// open segment `ab` itself.
    Side { a: Point2, b: Point2, sign: f64 },
    /// Two vertices at infinity: the open half-plane through `a` along `normal`.
    Beyond { a: Point2, normal: Point2 },
    Everything,
}

struct Tri {
    v: [usize; 3],
    circle: Circumcircle,
}

impl Tri {
    /// `pts[..n]` are real points; indices `n..n + 3` are the vertices at
    /// infinity, placed around `mid`.
    fn new(v: [usize; 3], pts: &[Point2], n: usize, mid: Point2) -> Self {
        let real: Vec<Point2> = v.iter().filter(|&&i| i < n).map(|&i| pts[i]).collect();
        let far: Vec<Point2> = v
            .iter()
            .filter(|&&i| i >= n)
            .map(|&i| SUPER_DIRS[i - n])
            .collect();
        let circle = match (real.as_slice(), far.as_slice()) {
            (&[a, b, c], []) => disk(a, b, c),
            (&[a, b], &[d]) => side(a, b, d, mid),
            (&[a], &[di, dj]) => Circumcircle::Beyond {
                a,
                normal: circumcenter_from_origin(di, dj),
            },
            _ => Circumcircle::Everything,
        };
        Self { v, circle }
    }

    #[inline]
    fn circumcircle_contains(&self, p: Point2) -> bool {
        match self.circle {
            Circumcircle::Disk { cx, cy, r2 } => {
                let d2 = (p.x - cx).powi(2) + (p.y - cy).powi(2);
                d2 <= r2 * (1.0 + 1e-12)
            }
            Circumcircle::Side { a, b, sign } => {
                let o = signed_area2(a, b, p);
                if o != 0.0 {
                    return o.signum() == sign;
                }
                let (abx, aby) = (b.x - a.x, b.y - a.y);
                let t = (p.x - a.x) * abx + (p.y - a.y) * aby;
                t > 0.0 && t < abx * abx + aby * aby
            }
            Circumcircle::Beyond { a, normal } => {
                (p.x - a.x) * normal.x + (p.y - a.y) * normal.y > 0.0
            }
            Circumcircle::Everything => true,
        }
    }
}

fn disk(a: Point2, b: Point2, c: Point2) -> Circumcircle {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() < f64::EPSILON {
        // Flat: the next insertion always replaces it.
        return Circumcircle::Everything;
    }
    let a2 = a.x * a.x + a.y * a.y;
    let b2 = b.x * b.x + b.y * b.y;
    let c2 = c.x * c.x + c.y * c.y;
    let cx = (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d;
    let cy = (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d;
    let r2 = (a.x - cx).powi(2) + (a.y - cy).powi(2);
    Circumcircle::Disk { cx, cy, r2 }
}

/// Side of `ab` on which the vertex at infinity along `d` lies. When `d` is
/// parallel to `ab`, its offset through `mid` decides.
fn side(a: Point2, b: Point2, d: Point2, mid: Point2) -> Circumcircle {
    let along = (b.x - a.x) * d.y - (b.y - a.y) * d.x;
    let offset = if along != 0.0 { along } else { signed_area2(a, b, mid) };
    if offset == 0.0 {
        Circumcircle::Everything
    } else {
        Circumcircle::Side { a, b, sign: offset.signum() }
    }
}

/// Circumcenter of the triangle `(0, b, c)`.
fn circumcenter_from_origin(b: Point2, c: Point2) -> Point2 {
    let d = 2.0 * (b.x * c.y - b.y * c.x);
    let b2 = b.x * b.x + b.y * b.y;
    let c2 = c.x * c.x + c.y * c.y;
    Point2::new((c.y * b2 - b.y * c2) / d, (b.x * c2 - c.x * b2) / d)
}

#[inline]
fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}

/// Twice the signed area of `abc`.
#[inline]
pub fn signed_area2(a: Point2, b: Point2, c: Point2) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Triangulate `points` inside `bounds`, returning index triples into `points`.
///
/// Points sharing exact coordinates resolve to the first index that carries
/// them. Fails with [`Error::DegenerateInput`] when a point lies outside
/// `bounds`, when fewer than three distinct points are given, or when no
/// triangle can be formed (all points collinear).
#[tracing::instrument(skip(points), fields(n = points.len()))]
pub fn build_triangulation(points: &[Point2], bounds: Rect) -> Result<Vec<Triangle>> {
    for (i, p) in points.iter().enumerate() {
        if !p.x.is_finite() || !p.y.is_finite() {
            return Err(Error::degenerate_input(format!("point {i} is not finite")));
        }
        if !bounds.contains(*p) {
            return Err(Error::degenerate_input(format!(
                "point {i} ({}, {}) lies outside {bounds:?}",
                p.x, p.y
            )));
        }
    }

    // Exact-coordinate dedup; `original[k]` is the input index of vertex k.
    let mut seen: HashMap<(u64, u64), usize> = HashMap::with_capacity(points.len());
    let mut verts: Vec<Point2> = Vec::with_capacity(points.len());
    let mut original: Vec<usize> = Vec::with_capacity(points.len());
    for (i, p) in points.iter().enumerate() {
        let key = (p.x.to_bits(), p.y.to_bits());
        if seen.contains_key(&key) {
            continue;
        }
        seen.insert(key, i);
        verts.push(*p);
        original.push(i);
    }
    let n = verts.len();
    if n < 3 {
        return Err(Error::degenerate_input(format!(
            "need at least 3 distinct points, got {n}"
        )));
    }

    let mid = Point2::new(bounds.x + bounds.width / 2.0, bounds.y + bounds.height / 2.0);
    let mut tris = vec![Tri::new([n, n + 1, n + 2], &verts, n, mid)];
    let mut edges: HashMap<(usize, usize), u32> = HashMap::new();

    for pi in 0..n {
        let p = verts[pi];

        edges.clear();
        let mut kept = Vec::with_capacity(tris.len() + 2);
        for t in tris.drain(..) {
            if t.circumcircle_contains(p) {
                for (a, b) in [(t.v[0], t.v[1]), (t.v[1], t.v[2]), (t.v[2], t.v[0])] {
                    *edges.entry(edge_key(a, b)).or_insert(0) += 1;
                }
            } else {
                kept.push(t);
            }
        }
        tris = kept;

        // The cavity boundary is made of the edges owned by exactly one bad triangle.
        for (&(a, b), &count) in &edges {
            if count == 1 {
                tris.push(Tri::new([a, b, pi], &verts, n, mid));
            }
        }
    }

    let out: Vec<Triangle> = tris
        .iter()
        .filter(|t| t.v.iter().all(|&v| v < n))
        .filter(|t| {
            let [a, b, c] = t.v;
            signed_area2(verts[a], verts[b], verts[c]).abs() > f64::EPSILON
        })
        .map(|t| Triangle::new(original[t.v[0]], original[t.v[1]], original[t.v[2]]))
        .collect();

    if out.is_empty() {
        return Err(Error::degenerate_input("points are collinear"));
    }
    tracing::debug!(triangles = out.len(), "triangulation built");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_with_center() -> Vec<Point2> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(100.0, 0.0),
            Point2::new(100.0, 100.0),
            Point2::new(0.0, 100.0),
            Point2::new(50.0, 50.0),
        ]
    }

    // Small deterministic generator so the tests do not need a rand crate.
    fn scatter(count: usize, size: f64, mut seed: u32) -> Vec<Point2> {
        let mut next = || {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            (seed >> 8) as f64 / (1u32 << 24) as f64
        };
        (0..count)
            .map(|_| Point2::new((next() * size).floor(), (next() * size).floor()))
            .collect()
    }

    #[test]
    fn square_with_center_gives_four_fans() {
        let pts = square_with_center();
        let tris = build_triangulation(&pts, Rect::new(0.0, 0.0, 101.0, 101.0)).unwrap();
        assert_eq!(tris.len(), 4);

        let adjacent = [(0, 1), (1, 2), (2, 3), (3, 0)];
        for t in &tris {
            assert!(t.contains(4), "{t:?} misses the center");
            let corners: Vec<usize> = t.indices().into_iter().filter(|&i| i != 4).collect();
            assert_eq!(corners.len(), 2);
            let (a, b) = (corners[0], corners[1]);
            assert!(
                adjacent
                    .iter()
                    .any(|&(x, y)| (x, y) == (a, b) || (y, x) == (a, b)),
                "{t:?} joins non-adjacent corners"
            );
        }
    }

    #[test]
    fn triangles_cover_the_hull() {
        let pts = square_with_center();
        let tris = build_triangulation(&pts, Rect::new(0.0, 0.0, 101.0, 101.0)).unwrap();
        let area: f64 = tris
            .iter()
            .map(|t| {
                let [a, b, c] = t.gather(&pts);
                signed_area2(a, b, c).abs() / 2.0
            })
            .sum();
        assert!((area - 10_000.0).abs() < 1e-6);
    }

    /// Area of the convex hull (monotone chain).
    fn hull_area(pts: &[Point2]) -> f64 {
        let mut sorted = pts.to_vec();
        sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
        sorted.dedup();
        let mut hull: Vec<Point2> = Vec::with_capacity(2 * sorted.len());
        for pass in 0..2 {
            let start = hull.len();
            for &p in &sorted {
                while hull.len() >= start + 2
                    && signed_area2(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0
                {
                    hull.pop();
                }
                hull.push(p);
            }
            hull.pop();
            if pass == 0 {
                sorted.reverse();
            }
        }
        let origin = hull[0];
        hull.windows(2)
            .map(|w| signed_area2(origin, w[0], w[1]))
            .sum::<f64>()
            .abs()
            / 2.0
    }

    #[test]
    fn triangles_tile_the_hull_of_scattered_points() {
        let mut seed = 0x1234_5678u32;
        for trial in 0..100 {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223) | 1;
            let count = 20 + (seed as usize % 140);
            // Hundredths, like landmark files written with two decimals.
            let pts: Vec<Point2> = scatter(count, 102_300.0, seed)
                .into_iter()
                .map(|p| Point2::new(p.x / 100.0, p.y / 100.0))
                .collect();
            let tris = build_triangulation(&pts, Rect::from_size(1024, 1024)).unwrap();
            let area: f64 = tris
                .iter()
                .map(|t| {
                    let [a, b, c] = t.gather(&pts);
                    signed_area2(a, b, c).abs() / 2.0
                })
                .sum();
            let hull = hull_area(&pts);
            assert!(
                (area - hull).abs() <= hull * 1e-9,
                "trial {trial} n={count}: triangles {area} hull {hull}"
            );
        }
    }

    #[test]
    fn grid_points_tile_the_square() {
        let pts: Vec<Point2> = (0..20)
            .flat_map(|y| (0..20).map(move |x| Point2::new(x as f64 * 50.0, y as f64 * 50.0)))
            .collect();
        let tris = build_triangulation(&pts, Rect::from_size(1024, 1024)).unwrap();
        let area: f64 = tris
            .iter()
            .map(|t| {
                let [a, b, c] = t.gather(&pts);
                signed_area2(a, b, c).abs() / 2.0
            })
            .sum();
        assert!((area - 950.0 * 950.0).abs() < 1e-6);
    }

    #[test]
    fn too_few_points_is_degenerate() {
        let pts = [Point2::new(1.0, 1.0), Point2::new(2.0, 2.0)];
        let err = build_triangulation(&pts, Rect::from_size(10, 10)).unwrap_err();
        assert!(matches!(err, Error::DegenerateInput(_)));
    }

    #[test]
    fn duplicates_do_not_count_as_distinct() {
        let pts = [
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(2.0, 2.0),
        ];
        assert!(build_triangulation(&pts, Rect::from_size(10, 10)).is_err());
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let pts: Vec<Point2> = (0..6).map(|i| Point2::new(i as f64 * 10.0, 5.0)).collect();
        let err = build_triangulation(&pts, Rect::from_size(100, 100)).unwrap_err();
        assert!(matches!(err, Error::DegenerateInput(_)));
    }

    #[test]
    fn points_outside_bounds_are_rejected() {
        let pts = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 200.0),
        ];
        assert!(build_triangulation(&pts, Rect::from_size(100, 100)).is_err());
    }

    #[test]
    fn duplicate_points_resolve_to_first_index() {
        let pts = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 10.0),
            Point2::new(10.0, 0.0),
        ];
        let tris = build_triangulation(&pts, Rect::from_size(20, 20)).unwrap();
        assert_eq!(tris.len(), 1);
        assert!(!tris[0].contains(3));
    }

    #[test]
    fn scattered_points_are_delaunay_and_in_range() {
        let pts = scatter(120, 1024.0, 0xC0FFEE);
        let tris = build_triangulation(&pts, Rect::from_size(1024, 1024)).unwrap();
        assert!(!tris.is_empty());

        for t in &tris {
            for i in t.indices() {
                assert!(i < pts.len());
            }
            let [a, b, c] = t.gather(&pts);
            let Circumcircle::Disk { cx, cy, r2 } = disk(a, b, c) else {
                panic!("{t:?} is flat");
            };
            // Empty circumcircle, with a small tolerance for cocircular points.
            for (k, p) in pts.iter().enumerate() {
                if t.contains(k) {
                    continue;
                }
                let d2 = (p.x - cx).powi(2) + (p.y - cy).powi(2);
                assert!(d2 >= r2 * (1.0 - 1e-9), "point {k} inside {t:?}");
            }
        }
    }
}
