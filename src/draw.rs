// Window + software drawing for the live view.
// 1) A window that shows the composited camera image.
// 2) A HUD line with the frame rate, plus a red border while no face is found.
// 3) A tiny 5x7 bitmap font to render that HUD on top of the video.

use image::RgbImage;
use minifb::{Key, KeyRepeat, Window, WindowOptions};

use crate::error::{Error, Result};
use crate::pipeline::{FrameInfo, FrameSink};
use crate::types::FrameBuffer;

const HUD_COLOR: u32 = 0x00_FF_FF_FF;
const NO_FACE_COLOR: u32 = 0x00_FF_30_30;

// One key press worth of adjustment.
const SCALE_STEP: f64 = 0.05;
const OFFSET_STEP: i32 = 4;

pub struct Drawer {
    window: Window, // the on-screen window
    hint: String,   // extra HUD text after the FPS readout
}

impl Drawer {
    /// Create a window sized to the camera feed.
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let window = Window::new(title, width, height, WindowOptions::default())
            .map_err(|e| Error::WindowInit(e.to_string()))?;
        Ok(Self {
            window,
            hint: String::new(),
        })
    }

    /// Text shown after the FPS readout, e.g. key bindings.
    pub fn set_hint(&mut self, hint: impl Into<String>) {
        self.hint = hint.into();
    }

    /// Push the pixels for this frame to the screen.
    pub fn present_buffer(&mut self, framebuffer: &FrameBuffer) -> Result<()> {
        self.window
            .update_with_buffer(&framebuffer.pixels, framebuffer.width, framebuffer.height)
            .map_err(|e| Error::WindowUpdate(e.to_string()))
    }

    /// Keep the window responsive while no new frame is ready.
    pub fn pump(&mut self) {
        self.window.update();
    }

    /// Returns false when the user closes the window (so we can stop the loop).
    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    /// True while ESC is held down.
    pub fn esc_pressed(&self) -> bool {
        self.window.is_key_down(Key::Escape)
    }

    /// N: switch to the next color.
    pub fn n_pressed_once(&self) -> bool {
        self.window.is_key_pressed(Key::N, KeyRepeat::No)
    }

    /// Arrow keys shift the picture, +/- zoom it. Held keys repeat.
    /// Returns (scale step, dx, dy); all zero when nothing is pressed.
    pub fn adjustment_keys(&self) -> (f64, i32, i32) {
        let pressed = |k: Key| self.window.is_key_pressed(k, KeyRepeat::Yes);
        let mut step = (0.0, 0, 0);
        if pressed(Key::Equal) || pressed(Key::NumPadPlus) {
            step.0 += SCALE_STEP;
        }
        if pressed(Key::Minus) || pressed(Key::NumPadMinus) {
            step.0 -= SCALE_STEP;
        }
        if pressed(Key::Left) {
            step.1 -= OFFSET_STEP;
        }
        if pressed(Key::Right) {
            step.1 += OFFSET_STEP;
        }
        if pressed(Key::Up) {
            step.2 -= OFFSET_STEP;
        }
        if pressed(Key::Down) {
            step.2 += OFFSET_STEP;
        }
        step
    }
}

impl FrameSink for Drawer {
    fn present(&mut self, frame: &RgbImage, info: &FrameInfo) -> Result<()> {
        // Pack to 0x00RRGGBB, draw the HUD on top, then push to the screen.
        let mut fb = FrameBuffer::from_rgb(frame);
        draw_hud(&mut fb, info, &self.hint);
        self.present_buffer(&fb)
    }

    fn is_open(&self) -> bool {
        Drawer::is_open(self) && !self.esc_pressed()
    }
}

/// FPS readout in the top-left corner; a red frame border when no face was found.
/// Visual: "FPS: 29.8 | NO FACE | N: NEXT COLOR" in white, with a black shadow
/// so it stays readable over bright skin.
pub fn draw_hud(fb: &mut FrameBuffer, info: &FrameInfo, hint: &str) {
    let mut text = format!("FPS: {:.1}", info.fps);
    if !info.face_found {
        text.push_str(" | NO FACE");
        let (w, h) = (fb.width as i32, fb.height as i32);
        // 3 px thick, hugging the window edge.
        for inset in 0..3 {
            draw_rect(fb, inset, inset, w - 1 - inset, h - 1 - inset, NO_FACE_COLOR);
        }
    }
    if !hint.is_empty() {
        text.push_str(" | ");
        text.push_str(hint);
    }
    draw_text_5x7(fb, 8, 8, &text, HUD_COLOR);
}

/* ---------- Software drawing: pixels, lines, tiny bitmap font ---------- */

/// Put a pixel on the framebuffer if (x,y) is inside bounds.
#[inline]
fn put_pixel(fb: &mut FrameBuffer, x: i32, y: i32, color: u32) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as usize, y as usize);
    if x >= fb.width || y >= fb.height {
        return;
    }
    let idx = y * fb.width + x;
    fb.pixels[idx] = color;
}

/// Draw a thin line between (x0,y0) and (x1,y1) using Bresenham.
fn draw_line(fb: &mut FrameBuffer, x0: i32, y0: i32, x1: i32, y1: i32, color: u32) {
    let (mut x0, mut y0) = (x0, y0);
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put_pixel(fb, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Outline of the rectangle with corners (x0,y0) and (x1,y1), inclusive.
fn draw_rect(fb: &mut FrameBuffer, x0: i32, y0: i32, x1: i32, y1: i32, color: u32) {
    draw_line(fb, x0, y0, x1, y0, color);
    draw_line(fb, x1, y0, x1, y1, color);
    draw_line(fb, x1, y1, x0, y1, color);
    draw_line(fb, x0, y1, x0, y0, color);
}

/* ---------- 5x7 bitmap font (the ASCII subset the HUD uses) ---------- */

/// Return a 5x7 glyph bitmap for a limited character set.
/// Each u8 is a row; the low 5 bits are the pixels (bit 4 = leftmost).
fn glyph5x7(ch: char) -> Option<[u8; 7]> {
    macro_rules! g { ($a:expr,$b:expr,$c:expr,$d:expr,$e:expr,$f:expr,$g:expr) => {
        Some([$a,$b,$c,$d,$e,$f,$g])
    }; }

    match ch.to_ascii_uppercase() {
        '0' => g!(0b01110,0b10001,0b10011,0b10101,0b11001,0b10001,0b01110),
        '1' => g!(0b00100,0b01100,0b00100,0b00100,0b00100,0b00100,0b01110),
        '2' => g!(0b01110,0b10001,0b00001,0b00010,0b00100,0b01000,0b11111),
        '3' => g!(0b11110,0b00001,0b00001,0b01110,0b00001,0b00001,0b11110),
        '4' => g!(0b00010,0b00110,0b01010,0b10010,0b11111,0b00010,0b00010),
        '5' => g!(0b11111,0b10000,0b11110,0b00001,0b00001,0b10001,0b01110),
        '6' => g!(0b00110,0b01000,0b10000,0b11110,0b10001,0b10001,0b01110),
        '7' => g!(0b11111,0b00001,0b00010,0b00100,0b01000,0b01000,0b01000),
        '8' => g!(0b01110,0b10001,0b10001,0b01110,0b10001,0b10001,0b01110),
        '9' => g!(0b01110,0b10001,0b10001,0b01111,0b00001,0b00010,0b01100),

        'A' => g!(0b01110,0b10001,0b10001,0b11111,0b10001,0b10001,0b10001),
        'C' => g!(0b01110,0b10001,0b10000,0b10000,0b10000,0b10001,0b01110),
        'E' => g!(0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b11111),
        'F' => g!(0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b10000),
        'I' => g!(0b01110,0b00100,0b00100,0b00100,0b00100,0b00100,0b01110),
        'L' => g!(0b10000,0b10000,0b10000,0b10000,0b10000,0b10000,0b11111),
        'M' => g!(0b10001,0b11011,0b10101,0b10101,0b10001,0b10001,0b10001),
        'N' => g!(0b10001,0b11001,0b10101,0b10011,0b10001,0b10001,0b10001),
        'O' => g!(0b01110,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110),
        'P' => g!(0b11110,0b10001,0b10001,0b11110,0b10000,0b10000,0b10000),
        'Q' => g!(0b01110,0b10001,0b10001,0b10001,0b10101,0b10010,0b01101),
        'R' => g!(0b11110,0b10001,0b10001,0b11110,0b10100,0b10010,0b10001),
        'S' => g!(0b01111,0b10000,0b10000,0b01110,0b00001,0b00001,0b11110),
        'T' => g!(0b11111,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100),
        'U' => g!(0b10001,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110),
        'V' => g!(0b10001,0b10001,0b10001,0b10001,0b10001,0b01010,0b00100),
        'W' => g!(0b10001,0b10001,0b10001,0b10101,0b10101,0b10101,0b01010),
        'X' => g!(0b10001,0b10001,0b01010,0b00100,0b01010,0b10001,0b10001),
        'Y' => g!(0b10001,0b10001,0b01010,0b00100,0b00100,0b00100,0b00100),
        'Z' => g!(0b11111,0b00001,0b00010,0b00100,0b01000,0b10000,0b11111),

        ' ' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00000,0b00000),
        '|' => g!(0b00100,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100),
        ':' => g!(0b00000,0b00100,0b00000,0b00000,0b00100,0b00000,0b00000),
        '.' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00100,0b00000),
        '+' => g!(0b00000,0b00100,0b00100,0b11111,0b00100,0b00100,0b00000),
        '-' => g!(0b00000,0b00000,0b00000,0b11111,0b00000,0b00000,0b00000),
        '/' => g!(0b00001,0b00001,0b00010,0b00100,0b01000,0b10000,0b10000),

        _ => None,
    }
}

/// Draw a single 5x7 character at (x,y) with a 1-pixel black shadow.
fn draw_char_5x7(fb: &mut FrameBuffer, x: i32, y: i32, ch: char, color: u32) {
    let Some(rows) = glyph5x7(ch) else {
        return;
    };
    for (dx, dy, c) in [(1, 1, 0x00000000), (0, 0, color)] {
        for (ry, rowbits) in rows.iter().enumerate() {
            for rx in 0..5 {
                if (rowbits & (1 << (4 - rx))) != 0 {
                    put_pixel(fb, x + rx as i32 + dx, y + ry as i32 + dy, c);
                }
            }
        }
    }
}

/// Draw a text string using 5x7 glyphs, 1 pixel apart. Unknown characters
/// leave a gap.
pub fn draw_text_5x7(fb: &mut FrameBuffer, mut x: i32, y: i32, text: &str, color: u32) {
    for ch in text.chars() {
        draw_char_5x7(fb, x, y, ch, color);
        x += 6; // 5 pixels glyph width + 1 pixel spacing
    }
}
