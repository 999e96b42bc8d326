// The effect asset: a canonical-size image, its reference points and the
// triangulation built from them once. Rendering replays that triangulation
// against every frame's landmarks.

use image::{RgbImage, RgbaImage};

use crate::composite::overlay_image;
use crate::delaunay::build_triangulation;
use crate::error::{Error, Result};
use crate::types::{LandmarkFrame, Point2, PointFilter, Rect, Triangle};
use crate::warp::warp_triangles;

/// Canonical asset resolution.
pub const EFFECT_IMAGE_WIDTH: u32 = 1024;
pub const EFFECT_IMAGE_HEIGHT: u32 = 1024;

pub fn check_asset_size(img: &RgbaImage, expected: (u32, u32)) -> Result<()> {
    let (width, height) = img.dimensions();
    if (width, height) != expected {
        return Err(Error::AssetSize {
            expected_width: expected.0,
            expected_height: expected.1,
            width,
            height,
        });
    }
    Ok(())
}

#[derive(Clone, Debug)]
pub struct EffectAsset {
    image: RgbaImage,
    size: (u32, u32),
    /// Reference points after filtering; the triangles index into these.
    points: Vec<Point2>,
    /// Length of an unfiltered landmark array.
    full_len: usize,
    filter: Option<PointFilter>,
    triangles: Vec<Triangle>,
}

impl EffectAsset {
    /// Build an asset at the canonical 1024x1024 size.
    pub fn new(
        image: RgbaImage,
        reference: &[Point2],
        filter: Option<PointFilter>,
    ) -> Result<Self> {
        Self::with_size(
            image,
            reference,
            filter,
            (EFFECT_IMAGE_WIDTH, EFFECT_IMAGE_HEIGHT),
        )
    }

    /// Build an asset whose images must be exactly `size`.
    #[tracing::instrument(skip(image, reference, filter), fields(points = reference.len()))]
    pub fn with_size(
        image: RgbaImage,
        reference: &[Point2],
        filter: Option<PointFilter>,
        size: (u32, u32),
    ) -> Result<Self> {
        check_asset_size(&image, size)?;

        let points = match &filter {
            Some(f) => f.apply(reference)?,
            None => reference.to_vec(),
        };
        let triangles = build_triangulation(&points, Rect::from_size(size.0, size.1))?;
        tracing::info!(
            points = points.len(),
            triangles = triangles.len(),
            filtered = filter.is_some(),
            "effect asset ready"
        );

        Ok(Self {
            image,
            size,
            points,
            full_len: reference.len(),
            filter,
            triangles,
        })
    }

    /// Swap the effect image. The triangulation only depends on the points,
    /// so it is kept.
    pub fn set_image(&mut self, image: RgbaImage) -> Result<()> {
        check_asset_size(&image, self.size)?;
        self.image = image;
        Ok(())
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn reference_points(&self) -> &[Point2] {
        &self.points
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn filter(&self) -> Option<&PointFilter> {
        self.filter.as_ref()
    }

    /// Landmark count every frame must carry.
    pub fn landmark_count(&self) -> usize {
        self.full_len
    }

    /// Frame landmarks in reference order (filtered, z dropped).
    pub fn select_landmarks(&self, frame: &LandmarkFrame) -> Result<Vec<Point2>> {
        if frame.len() != self.full_len {
            return Err(Error::LandmarkCount {
                expected: self.full_len,
                actual: frame.len(),
            });
        }
        let xy = frame.to_xy();
        match &self.filter {
            Some(f) => f.apply(&xy),
            None => Ok(xy),
        }
    }

    /// Warp the effect onto `frame`'s landmarks, producing a `canvas`-sized overlay.
    pub fn create_effect(&self, frame: &LandmarkFrame, canvas: (u32, u32)) -> Result<RgbaImage> {
        let target = self.select_landmarks(frame)?;
        warp_triangles(&self.image, &self.points, &target, &self.triangles, canvas)
    }

    /// Warp and composite onto `background` in one step.
    pub fn render(
        &self,
        background: &RgbImage,
        frame: &LandmarkFrame,
        blur: Option<u32>,
    ) -> Result<RgbImage> {
        let overlay = self.create_effect(frame, background.dimensions())?;
        overlay_image(background, &overlay, blur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba};

    fn corners_and_center(size: f64) -> Vec<Point2> {
        let m = size - 1.0;
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(m, 0.0),
            Point2::new(m, m),
            Point2::new(0.0, m),
            Point2::new((size / 2.0).floor(), (size / 2.0).floor()),
        ]
    }

    #[test]
    fn wrong_image_size_is_rejected() {
        let img = RgbaImage::new(512, 1024);
        let err = EffectAsset::new(img, &corners_and_center(512.0), None).unwrap_err();
        assert!(matches!(
            err,
            Error::AssetSize {
                width: 512,
                height: 1024,
                ..
            }
        ));
    }

    #[test]
    fn set_image_checks_size_and_keeps_triangles() {
        let img = RgbaImage::new(64, 64);
        let mut asset =
            EffectAsset::with_size(img, &corners_and_center(64.0), None, (64, 64)).unwrap();
        let before = asset.triangles().to_vec();
        assert!(asset.set_image(RgbaImage::new(32, 32)).is_err());
        asset
            .set_image(RgbaImage::from_pixel(64, 64, Rgba([1, 2, 3, 4])))
            .unwrap();
        assert_eq!(asset.triangles(), &before[..]);
        assert_eq!(asset.image().get_pixel(0, 0).0, [1, 2, 3, 4]);
    }

    #[test]
    fn filter_selects_reference_and_frame_points() {
        let mut reference = corners_and_center(64.0);
        // Two extra points the filter drops.
        reference.push(Point2::new(5.0, 60.0));
        reference.push(Point2::new(60.0, 5.0));
        let filter = PointFilter::new(vec![0, 1, 2, 3, 4], reference.len()).unwrap();
        let asset = EffectAsset::with_size(
            RgbaImage::new(64, 64),
            &reference,
            Some(filter),
            (64, 64),
        )
        .unwrap();
        assert_eq!(asset.reference_points().len(), 5);
        assert_eq!(asset.landmark_count(), 7);
        assert_eq!(asset.filter().map(|f| f.indices()), Some(&[0, 1, 2, 3, 4][..]));
        assert!(
            asset
                .triangles()
                .iter()
                .all(|t| t.indices().iter().all(|&i| i < 5))
        );

        let frame = LandmarkFrame::from_xy(&reference);
        assert_eq!(asset.select_landmarks(&frame).unwrap(), &reference[..5]);

        let short = LandmarkFrame::from_xy(&reference[..6]);
        assert!(matches!(
            asset.select_landmarks(&short),
            Err(Error::LandmarkCount {
                expected: 7,
                actual: 6
            })
        ));
    }

    #[test]
    fn collinear_reference_fails_initialization() {
        let reference: Vec<Point2> = (0..5).map(|i| Point2::new(i as f64, i as f64)).collect();
        let err = EffectAsset::with_size(RgbaImage::new(8, 8), &reference, None, (8, 8))
            .unwrap_err();
        assert!(matches!(err, Error::DegenerateInput(_)));
    }

    #[test]
    fn rendering_at_reference_pose_reproduces_the_asset() {
        let img = RgbaImage::from_fn(1024, 1024, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 200, 255])
        });
        let reference = corners_and_center(1024.0);
        let asset = EffectAsset::new(img.clone(), &reference, None).unwrap();
        assert_eq!(asset.triangles().len(), 4);

        let background = RgbImage::from_pixel(1024, 1024, Rgb([9, 9, 9]));
        let frame = LandmarkFrame::from_xy(&reference);
        let out = asset.render(&background, &frame, None).unwrap();
        for (x, y) in [(0, 0), (100, 700), (511, 511), (1023, 1023), (900, 20)] {
            let src = img.get_pixel(x, y);
            assert_eq!(out.get_pixel(x, y).0, [src[0], src[1], src[2]], "({x}, {y})");
        }
    }
}
