// Fixed color palettes offered to the user.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::types::Hsv;

const fn hsv(h: f64, s: f64, v: f64) -> Hsv {
    Hsv::new_unchecked(h, s, v)
}

pub const SKIN_PALETTE: [Hsv; 5] = [
    hsv(15.0, 35.0, 100.0),
    hsv(25.0, 35.0, 100.0),
    hsv(35.0, 35.0, 100.0),
    hsv(25.0, 40.0, 75.0),
    hsv(25.0, 50.0, 70.0),
];

pub const COLOR_PALETTE: [Hsv; 20] = [
    hsv(41.0, 74.0, 55.0),
    hsv(40.0, 51.0, 86.0),
    hsv(15.0, 45.0, 82.0),
    hsv(77.0, 53.0, 70.0),
    hsv(177.0, 16.0, 85.0),
    hsv(28.0, 72.0, 38.0),
    hsv(315.0, 27.0, 69.0),
    hsv(14.0, 21.0, 89.0),
    hsv(210.0, 12.0, 91.0),
    hsv(217.0, 71.0, 45.0),
    hsv(25.0, 73.0, 28.0),
    hsv(20.0, 81.0, 58.0),
    hsv(33.0, 74.0, 76.0),
    hsv(214.0, 57.0, 64.0),
    hsv(1.0, 56.0, 62.0),
    hsv(9.0, 80.0, 27.0),
    hsv(334.0, 69.0, 75.0),
    hsv(195.0, 55.0, 41.0),
    hsv(138.0, 44.0, 32.0),
    hsv(180.0, 4.0, 32.0),
];

pub const DARK_PALETTE: [Hsv; 9] = [
    hsv(0.0, 0.0, 0.0), // black
    hsv(240.0, 51.0, 23.0),
    hsv(28.0, 72.0, 38.0),
    hsv(25.0, 73.0, 28.0),
    hsv(9.0, 80.0, 27.0),
    hsv(0.0, 0.0, 100.0), // white
    hsv(0.0, 100.0, 82.0),
    hsv(60.0, 100.0, 100.0),
    hsv(200.0, 100.0, 100.0),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Palette {
    Skin,
    Color,
    Dark,
}

impl Palette {
    pub const ALL: [Palette; 3] = [Palette::Skin, Palette::Color, Palette::Dark];

    pub fn colors(self) -> &'static [Hsv] {
        match self {
            Palette::Skin => &SKIN_PALETTE,
            Palette::Color => &COLOR_PALETTE,
            Palette::Dark => &DARK_PALETTE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Palette::Skin => "skin",
            Palette::Color => "color",
            Palette::Dark => "dark",
        }
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Palette {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Palette::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| Error::config(format!("unknown palette '{s}' (skin, color, dark)")))
    }
}
