// Asset files on disk: effect images, reference points, point filters and
// facepaints, and the layering that turns a skin plus facepaints into one
// effect image.

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::composite::alpha_composite;
use crate::effect::check_asset_size;
use crate::error::{Error, Result};
use crate::recolor::recolor;
use crate::types::{Hsv, Point2, PointFilter};

/// Suffix of the layer drawn under a paint without recoloring.
pub const BASE_IMAGE_SUFFIX: &str = "-base.png";

/// Load an RGBA image that must be exactly `size`.
pub fn load_rgba(path: &Path, size: (u32, u32)) -> Result<RgbaImage> {
    let img = image::open(path)
        .map_err(|e| Error::asset_load(format!("{}: {e}", path.display())))?
        .into_rgba8();
    check_asset_size(&img, size)?;
    tracing::debug!(path = %path.display(), "loaded asset image");
    Ok(img)
}

/// Parse reference points from a JSON array of `[x, y]` or `[x, y, z]`.
pub fn parse_points(json: &str) -> Result<Vec<Point2>> {
    let raw: Vec<Vec<f64>> = serde_json::from_str(json)?;
    raw.iter()
        .enumerate()
        .map(|(i, p)| match p.as_slice() {
            [x, y] | [x, y, _] => Ok(Point2::new(*x, *y)),
            _ => Err(Error::asset_load(format!(
                "point {i} has {} coordinates, expected 2 or 3",
                p.len()
            ))),
        })
        .collect()
}

pub fn load_points(path: &Path) -> Result<Vec<Point2>> {
    let text = fs::read_to_string(path)
        .map_err(|e| Error::asset_load(format!("{}: {e}", path.display())))?;
    let points = parse_points(&text)?;
    tracing::debug!(path = %path.display(), count = points.len(), "loaded reference points");
    Ok(points)
}

/// Load a point filter (JSON array of indices) for a set of `full_len` points.
pub fn load_filter(path: &Path, full_len: usize) -> Result<PointFilter> {
    let text = fs::read_to_string(path)
        .map_err(|e| Error::asset_load(format!("{}: {e}", path.display())))?;
    let indices: Vec<usize> = serde_json::from_str(&text)?;
    PointFilter::new(indices, full_len)
}

/// One selectable makeup layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FacePaint {
    pub filename: String,
    pub image_dir: PathBuf,
    #[serde(default)]
    pub thumbnail_dir: Option<PathBuf>,
    #[serde(default)]
    pub hsv: Option<Hsv>,
    /// Set for paints of the per-part (custom) mode.
    #[serde(default)]
    pub part_kind: Option<String>,
}

impl FacePaint {
    pub fn new(filename: impl Into<String>, image_dir: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            image_dir: image_dir.into(),
            thumbnail_dir: None,
            hsv: None,
            part_kind: None,
        }
    }

    pub fn with_hsv(mut self, hsv: Hsv) -> Self {
        self.hsv = Some(hsv);
        self
    }

    pub fn image_path(&self) -> PathBuf {
        self.image_dir.join(&self.filename)
    }

    /// `lips.png` → `lips-base.png`, next to the paint.
    pub fn base_image_path(&self) -> PathBuf {
        self.image_dir
            .join(self.filename.replace(".png", BASE_IMAGE_SUFFIX))
    }

    /// The thumbnail with the paint's stem, `.png` preferred over `.PNG`.
    pub fn thumbnail_path(&self) -> Option<PathBuf> {
        let dir = self.thumbnail_dir.as_ref()?;
        let stem = self.filename.replace(".png", "").replace(".PNG", "");
        [".png", ".PNG"]
            .iter()
            .map(|ext| dir.join(format!("{stem}{ext}")))
            .find(|p| p.is_file())
    }
}

/// The skin layer retinted to `hsv`.
pub fn load_skin(path: &Path, size: (u32, u32), hsv: Hsv) -> Result<RgbaImage> {
    let skin = load_rgba(path, size)?;
    Ok(recolor(&skin, hsv))
}

/// Stack `facepaints` in order on top of `skin`.
///
/// A paint with a `-base.png` sibling first gets that base stacked unchanged;
/// the paint itself is then recolored (when it has a color) and stacked on top.
#[tracing::instrument(skip_all, fields(paints = facepaints.len()))]
pub fn compose_effect_image(skin: &RgbaImage, facepaints: &[FacePaint]) -> Result<RgbaImage> {
    let size = skin.dimensions();
    let mut effect = skin.clone();
    for paint in facepaints {
        let mut layer = load_rgba(&paint.image_path(), size)?;

        let base_path = paint.base_image_path();
        if base_path != paint.image_path() && base_path.is_file() {
            let base = load_rgba(&base_path, size)?;
            effect = alpha_composite(&effect, &base)?;
        }

        if let Some(hsv) = paint.hsv {
            layer = recolor(&layer, hsv);
        }
        effect = alpha_composite(&effect, &layer)?;
        tracing::debug!(paint = %paint.filename, "stacked facepaint");
    }
    Ok(effect)
}


#[cfg(test)]
mod tests {
    use super::testutil::scratch_dir;
    use super::*;
    use image::Rgba;

    #[test]
    fn points_accept_2d_and_3d_entries() {
        let pts = parse_points("[[1, 2], [3.5, 4, -0.2]]").unwrap();
        assert_eq!(pts, vec![Point2::new(1.0, 2.0), Point2::new(3.5, 4.0)]);
        assert!(parse_points("[[1]]").is_err());
        assert!(parse_points("{}").is_err());
    }

    #[test]
    fn filter_file_is_checked_against_point_count() {
        let dir = scratch_dir("filter");
        let path = dir.join("filter.json");
        fs::write(&path, "[0, 2, 4]").unwrap();
        assert_eq!(load_filter(&path, 5).unwrap().indices(), &[0, 2, 4]);
        assert!(matches!(
            load_filter(&path, 4),
            Err(Error::InvalidFilter(_))
        ));
    }

    #[test]
    fn wrong_size_image_is_rejected_at_load() {
        let dir = scratch_dir("size");
        let path = dir.join("small.png");
        RgbaImage::new(8, 4).save(&path).unwrap();
        assert!(matches!(
            load_rgba(&path, (8, 8)),
            Err(Error::AssetSize { width: 8, height: 4, .. })
        ));
        assert!(matches!(
            load_rgba(&dir.join("missing.png"), (8, 8)),
            Err(Error::AssetLoad(_))
        ));
    }

    #[test]
    fn facepaint_paths() {
        let dir = scratch_dir("thumbs");
        let thumbs = dir.join("thumbnails");
        fs::create_dir_all(&thumbs).unwrap();
        fs::write(thumbs.join("cheek.PNG"), b"").unwrap();

        let mut paint = FacePaint::new("cheek.png", &dir);
        assert_eq!(paint.image_path(), dir.join("cheek.png"));
        assert_eq!(paint.base_image_path(), dir.join("cheek-base.png"));
        assert_eq!(paint.thumbnail_path(), None);

        paint.thumbnail_dir = Some(thumbs.clone());
        assert_eq!(paint.thumbnail_path(), Some(thumbs.join("cheek.PNG")));
        fs::write(thumbs.join("cheek.png"), b"").unwrap();
        assert_eq!(paint.thumbnail_path(), Some(thumbs.join("cheek.png")));
    }

    #[test]
    fn paints_stack_over_skin_with_base_layer_untouched() {
        let dir = scratch_dir("compose");
        let skin = RgbaImage::from_pixel(4, 4, Rgba([10, 10, 10, 255]));

        // Paint covers the left column in marker blue; its base covers the right.
        let paint = RgbaImage::from_fn(4, 4, |x, _| {
            if x == 0 { Rgba([0, 0, 255, 255]) } else { Rgba([0, 0, 0, 0]) }
        });
        let base = RgbaImage::from_fn(4, 4, |x, _| {
            if x == 3 { Rgba([0, 0, 255, 255]) } else { Rgba([0, 0, 0, 0]) }
        });
        paint.save(dir.join("lips.png")).unwrap();
        base.save(dir.join("lips-base.png")).unwrap();

        let red = Hsv::new(0.0, 100.0, 100.0).unwrap();
        let out = compose_effect_image(&skin, &[FacePaint::new("lips.png", &dir).with_hsv(red)])
            .unwrap();
        assert_eq!(out.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(1, 1).0, [10, 10, 10, 255]);
        assert_eq!(out.get_pixel(3, 2).0, [0, 0, 255, 255]);
    }

    #[test]
    fn compose_without_paints_is_the_skin() {
        let skin = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        assert_eq!(compose_effect_image(&skin, &[]).unwrap(), skin);
    }

    #[test]
    fn skin_is_recolored() {
        let dir = scratch_dir("skin");
        let path = dir.join("skin.png");
        RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]))
            .save(&path)
            .unwrap();
        let skin = load_skin(&path, (4, 4), Hsv::new(0.0, 100.0, 50.0).unwrap()).unwrap();
        assert!(skin.pixels().all(|p| p.0 == [127, 0, 0, 255]));
    }
}
