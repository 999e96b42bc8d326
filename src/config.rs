// Application settings, read from a JSON file. Every field has a default so a
// partial file (or none at all) works.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::adjust::Adjustment;
use crate::error::{Error, Result};
use crate::palette::SKIN_PALETTE;
use crate::types::Hsv;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub camera: CameraConfig,
    pub window_title: String,
    pub assets: AssetPaths,
    /// Triangulate only the landmarks listed in `assets.filter`.
    pub use_filter: bool,
    /// Median blur radius for the overlay alpha; `None` disables it.
    pub blur: Option<u32>,
    /// Flip the displayed frame horizontally (selfie view).
    pub mirror: bool,
    /// Consecutive camera failures tolerated before the loop gives up.
    pub max_source_failures: u32,
    pub skin_hsv: Hsv,
    /// Zoom and shift of the finished frame.
    pub adjustment: Adjustment,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            window_title: "facepaint".to_string(),
            assets: AssetPaths::default(),
            use_filter: true,
            blur: None,
            mirror: true,
            max_source_failures: 30,
            skin_hsv: SKIN_PALETTE[0],
            adjustment: Adjustment::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device index (0 = default webcam).
    pub index: u32,
    /// Requested resolution; the device may pick the closest it supports.
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetPaths {
    pub reference_points: PathBuf,
    pub filter: PathBuf,
    pub skin_image: PathBuf,
    pub facepaints_root: PathBuf,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            reference_points: PathBuf::from("assets/reference_points.json"),
            filter: PathBuf::from("assets/filter_points.json"),
            skin_image: PathBuf::from("assets/facepaints/custom/skin/skin.png"),
            facepaints_root: PathBuf::from("assets/facepaints"),
        }
    }
}

impl AppConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: AppConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("{}: {e}", path.display())))?;
        let cfg = Self::from_json(&text)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(cfg)
    }

    /// Defaults when `path` is `None`.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(Error::config("camera resolution must be nonzero"));
        }
        if self.max_source_failures == 0 {
            return Err(Error::config("max_source_failures must be at least 1"));
        }
        self.adjustment.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let cfg = AppConfig::from_json("{}").unwrap();
        assert_eq!(cfg.camera.width, 640);
        assert!(cfg.mirror);
        assert!(cfg.use_filter);
        assert_eq!(cfg.blur, None);
        assert_eq!(cfg.skin_hsv, SKIN_PALETTE[0]);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = AppConfig::from_json(
            r#"{"camera": {"index": 2}, "blur": 3, "skin_hsv": {"h": 20, "s": 30, "v": 90}}"#,
        )
        .unwrap();
        assert_eq!(cfg.camera.index, 2);
        assert_eq!(cfg.camera.height, 480);
        assert_eq!(cfg.blur, Some(3));
        assert_eq!(cfg.skin_hsv, Hsv::new(20.0, 30.0, 90.0).unwrap());
        assert!(cfg.adjustment.is_identity());

        let cfg = AppConfig::from_json(r#"{"adjustment": {"x_offset": -160}}"#).unwrap();
        assert_eq!(cfg.adjustment.x_offset, -160);
        assert_eq!(cfg.adjustment.scale, 1.0);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(AppConfig::from_json(r#"{"skin_hsv": {"h": 400, "s": 0, "v": 0}}"#).is_err());
        assert!(AppConfig::from_json(r#"{"camera": {"width": 0}}"#).is_err());
        assert!(AppConfig::from_json(r#"{"max_source_failures": 0}"#).is_err());
        assert!(AppConfig::from_json(r#"{"adjustment": {"scale": -1.0}}"#).is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = AppConfig::default();
        let text = serde_json::to_string(&cfg).unwrap();
        let back = AppConfig::from_json(&text).unwrap();
        assert_eq!(back.assets.facepaints_root, cfg.assets.facepaints_root);
        assert_eq!(back.max_source_failures, cfg.max_source_failures);
    }
}
