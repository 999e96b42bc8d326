// Makeup modes as plain data: where a mode's paints live and how its choices
// are listed.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

use crate::assets::{BASE_IMAGE_SUFFIX, FacePaint};
use crate::error::{Error, Result};

const ICON_FILE: &str = "icon.png";
const MENU_FILE: &str = "menu.png";
const THUMBNAIL_DIR: &str = "thumbnails";
/// Per-part thumbnail of the custom mode, inside each part directory.
const PART_THUMBNAIL_FILE: &str = "thumbnail.png";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeKind {
    Event,
    Practice,
    Easy,
    Custom,
    Config,
}

impl ModeKind {
    pub const ALL: [ModeKind; 5] = [
        ModeKind::Event,
        ModeKind::Practice,
        ModeKind::Easy,
        ModeKind::Custom,
        ModeKind::Config,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ModeKind::Event => "event",
            ModeKind::Practice => "practice",
            ModeKind::Easy => "easy",
            ModeKind::Custom => "custom",
            ModeKind::Config => "config",
        }
    }
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ModeKind::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| Error::config(format!("unknown mode '{s}'")))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ChoiceRule {
    /// Every paint file directly in the mode directory.
    Flat,
    /// One directory per face part; `ignore` lists directories that are not parts.
    ByPart { ignore: Vec<String> },
    /// No choices, only a sample image warped while the output is adjusted.
    Adjustment { sample: PathBuf },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModeConfig {
    pub kind: ModeKind,
    pub assets_dir: PathBuf,
    pub thumbnails_dir: Option<PathBuf>,
    pub icon: PathBuf,
    pub menu_image: PathBuf,
    pub choices: ChoiceRule,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PartKind {
    pub name: String,
    pub thumbnail: PathBuf,
}

impl ModeConfig {
    /// Standard layout: `<facepaints_root>/<mode>/`.
    pub fn for_kind(kind: ModeKind, facepaints_root: &Path) -> Self {
        let assets_dir = facepaints_root.join(kind.name());
        let (thumbnails_dir, choices) = match kind {
            ModeKind::Event | ModeKind::Practice | ModeKind::Easy => {
                (Some(assets_dir.join(THUMBNAIL_DIR)), ChoiceRule::Flat)
            }
            ModeKind::Custom => (
                None,
                ChoiceRule::ByPart {
                    ignore: vec!["skin".to_string()],
                },
            ),
            ModeKind::Config => (
                None,
                ChoiceRule::Adjustment {
                    sample: assets_dir.join("sample.png"),
                },
            ),
        };
        Self {
            kind,
            icon: assets_dir.join(ICON_FILE),
            menu_image: assets_dir.join(MENU_FILE),
            assets_dir,
            thumbnails_dir,
            choices,
        }
    }

    /// The image warped while adjusting output scale and offset, if this mode
    /// is for that.
    pub fn adjustment_sample(&self) -> Option<&Path> {
        match &self.choices {
            ChoiceRule::Adjustment { sample } => Some(sample),
            _ => None,
        }
    }

    /// Part directories of a by-part mode, sorted by name.
    pub fn part_kinds(&self) -> Result<Vec<PartKind>> {
        let ChoiceRule::ByPart { ignore } = &self.choices else {
            return Ok(Vec::new());
        };
        let mut parts = Vec::new();
        for entry in fs::read_dir(&self.assets_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".png") || name.starts_with('.') || ignore.contains(&name) {
                continue;
            }
            if !entry.file_type()?.is_dir() {
                continue;
            }
            parts.push(PartKind {
                thumbnail: entry.path().join(PART_THUMBNAIL_FILE),
                name,
            });
        }
        parts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(parts)
    }

    /// Selectable paints, sorted by file name. By-part modes need `part`.
    pub fn list_choices(&self, part: Option<&str>) -> Result<Vec<FacePaint>> {
        let mut paints = match (&self.choices, part) {
            (ChoiceRule::Flat, None) => self.flat_choices()?,
            (ChoiceRule::Flat, Some(p)) => {
                return Err(Error::config(format!(
                    "mode '{}' has no parts (got '{p}')",
                    self.kind
                )));
            }
            (ChoiceRule::ByPart { .. }, Some(p)) => self.part_choices(p)?,
            (ChoiceRule::ByPart { .. }, None) => {
                return Err(Error::config(format!(
                    "mode '{}' lists choices per part",
                    self.kind
                )));
            }
            (ChoiceRule::Adjustment { .. }, _) => Vec::new(),
        };
        paints.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(paints)
    }

    fn flat_choices(&self) -> Result<Vec<FacePaint>> {
        let icon = file_name_of(&self.icon);
        let menu = file_name_of(&self.menu_image);
        let mut out = Vec::new();
        for name in file_names(&self.assets_dir)? {
            let is_png = name.ends_with(".png") || name.ends_with(".PNG");
            if !is_png || name == icon || name == menu || name.contains(BASE_IMAGE_SUFFIX) {
                continue;
            }
            let mut paint = FacePaint::new(name, &self.assets_dir);
            paint.thumbnail_dir = self.thumbnails_dir.clone();
            out.push(paint);
        }
        Ok(out)
    }

    fn part_choices(&self, part: &str) -> Result<Vec<FacePaint>> {
        let kinds = self.part_kinds()?;
        if !kinds.iter().any(|k| k.name == part) {
            let names: Vec<&str> = kinds.iter().map(|k| k.name.as_str()).collect();
            return Err(Error::config(format!(
                "part must be one of {names:?}, got '{part}'"
            )));
        }
        let dir = self.assets_dir.join(part);
        let mut out = Vec::new();
        for name in file_names(&dir)? {
            if !name.ends_with(".png") || name == PART_THUMBNAIL_FILE || name.contains(BASE_IMAGE_SUFFIX)
            {
                continue;
            }
            let mut paint = FacePaint::new(name, &dir);
            paint.thumbnail_dir = Some(dir.join(THUMBNAIL_DIR));
            paint.part_kind = Some(part.to_string());
            out.push(paint);
        }
        Ok(out)
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}
