//! Canvas render signature: the fixed drawing script and a software surface.
//!
//! The script is identical for every invocation, so any difference between
//! two signatures comes from the surface that rasterized it.

use crate::probe::types::{CanvasScript, DrawOp, Rgba};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Surface width used for the signature.
pub const SIGNATURE_WIDTH: u32 = 200;

/// Surface height used for the signature.
pub const SIGNATURE_HEIGHT: u32 = 50;

const SIGNATURE_TEXT: &str = "Canvas Fingerprint";

/// Data URL prefix produced by [`SoftwareCanvas::to_data_url`].
pub const RAW_DATA_URL_PREFIX: &str = "data:image/x-rgba;base64,";

/// The fixed drawing sequence rendered for the signature.
pub fn signature_script() -> CanvasScript {
    CanvasScript {
        width: SIGNATURE_WIDTH,
        height: SIGNATURE_HEIGHT,
        ops: vec![
            DrawOp::FontSize(14),
            DrawOp::FillStyle(Rgba::opaque(0xff, 0x66, 0x00)),
            DrawOp::FillRect {
                x: 125,
                y: 1,
                w: 62,
                h: 20,
            },
            DrawOp::FillStyle(Rgba::opaque(0x00, 0x66, 0x99)),
            DrawOp::FillText {
                text: SIGNATURE_TEXT,
                x: 2,
                y: 15,
            },
            DrawOp::FillStyle(Rgba {
                r: 102,
                g: 204,
                b: 0,
                a: 0.7,
            }),
            DrawOp::FillText {
                text: SIGNATURE_TEXT,
                x: 4,
                y: 17,
            },
        ],
    }
}

/// Drop the format header of a data URL, keeping only the encoded payload.
///
/// The header is everything up to and including the first comma
/// (`data:image/png;base64,` is 22 bytes). A string without a comma is
/// returned unchanged.
pub fn strip_data_url_header(data_url: &str) -> &str {
    match data_url.find(',') {
        Some(idx) => &data_url[idx + 1..],
        None => data_url,
    }
}

/// Glyph geometry of a text rasterizer, relative to the font size.
///
/// Different rendering stacks lay text out differently; varying these
/// metrics is how the software surface models that.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GlyphMetrics {
    pub advance: f32,
    pub height: f32,
}

impl Default for GlyphMetrics {
    fn default() -> Self {
        Self {
            advance: 0.55,
            height: 0.72,
        }
    }
}

/// An off-screen RGBA surface with straight alpha.
pub struct SoftwareCanvas {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
    metrics: GlyphMetrics,
    fill: Rgba,
    font_size: u32,
}

impl SoftwareCanvas {
    pub fn new(width: u32, height: u32, metrics: GlyphMetrics) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0, 0, 0, 0]; (width as usize) * (height as usize)],
            metrics,
            fill: Rgba::opaque(0, 0, 0),
            font_size: 10,
        }
    }

    /// Render a script onto a fresh surface and export it.
    pub fn render(script: &CanvasScript, metrics: GlyphMetrics) -> String {
        let mut canvas = Self::new(script.width, script.height, metrics);
        canvas.run(script);
        canvas.to_data_url()
    }

    pub fn run(&mut self, script: &CanvasScript) {
        for op in &script.ops {
            match *op {
                DrawOp::FillStyle(color) => self.fill = color,
                DrawOp::FontSize(size) => self.font_size = size,
                DrawOp::FillRect { x, y, w, h } => self.fill_rect(x, y, w, h),
                DrawOp::FillText { text, x, y } => self.fill_text(text, x, y),
            }
        }
    }

    fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32) {
        let x_end = x.saturating_add(w as i32);
        let y_end = y.saturating_add(h as i32);
        for py in y.max(0)..y_end.min(self.height as i32) {
            for px in x.max(0)..x_end.min(self.width as i32) {
                self.blend(px as u32, py as u32);
            }
        }
    }

    // Block glyphs: each character's code selects which rows of its cell
    // are inked, so different strings leave different pixel patterns.
    fn fill_text(&mut self, text: &str, x: i32, y: i32) {
        let size = self.font_size as f32;
        let advance = (size * self.metrics.advance).round().max(1.0) as i32;
        let glyph_height = (size * self.metrics.height).round().max(1.0) as i32;
        let mut pen_x = x;

        for ch in text.chars() {
            if !ch.is_whitespace() {
                let code = ch as u32;
                for row in 0..glyph_height {
                    if (code >> (row % 8)) & 1 == 1 {
                        self.fill_rect(pen_x, y + row, (advance - 1).max(1) as u32, 1);
                    }
                }
            }
            pen_x += advance;
        }
    }

    fn blend(&mut self, x: u32, y: u32) {
        let idx = (y * self.width + x) as usize;
        let dst = self.pixels[idx];
        let src_a = self.fill.a.clamp(0.0, 1.0);
        let dst_a = dst[3] as f32 / 255.0;
        let out_a = src_a + dst_a * (1.0 - src_a);
        if out_a <= 0.0 {
            self.pixels[idx] = [0, 0, 0, 0];
            return;
        }

        let channel = |s: u8, d: u8| -> u8 {
            let value = (s as f32 * src_a + d as f32 * dst_a * (1.0 - src_a)) / out_a;
            value.round().clamp(0.0, 255.0) as u8
        };

        self.pixels[idx] = [
            channel(self.fill.r, dst[0]),
            channel(self.fill.g, dst[1]),
            channel(self.fill.b, dst[2]),
            (out_a * 255.0).round() as u8,
        ];
    }

    /// Export as a data URL: big-endian width and height, then RGBA rows.
    pub fn to_data_url(&self) -> String {
        let mut bytes = Vec::with_capacity(8 + self.pixels.len() * 4);
        bytes.extend_from_slice(&self.width.to_be_bytes());
        bytes.extend_from_slice(&self.height.to_be_bytes());
        for pixel in &self.pixels {
            bytes.extend_from_slice(pixel);
        }
        format!("{RAW_DATA_URL_PREFIX}{}", STANDARD.encode(bytes))
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x < self.width && y < self.height {
            Some(self.pixels[(y * self.width + x) as usize])
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_png_header() {
        let url = "data:image/png;base64,iVBORw0KGgo";
        assert_eq!(strip_data_url_header(url), "iVBORw0KGgo");
        assert_eq!("data:image/png;base64,".len(), 22);
        assert_eq!(strip_data_url_header("no-header"), "no-header");
    }

    #[test]
    fn test_rect_is_painted_opaque() {
        let mut canvas =
            SoftwareCanvas::new(SIGNATURE_WIDTH, SIGNATURE_HEIGHT, GlyphMetrics::default());
        canvas.run(&signature_script());

        // Inside the orange rect, right of where the text ends.
        assert_eq!(canvas.pixel(186, 2), Some([0xff, 0x66, 0x00, 0xff]));
        assert_eq!(canvas.pixel(199, 49), Some([0, 0, 0, 0]));
        assert_eq!(canvas.pixel(200, 0), None);
    }

    #[test]
    fn test_render_is_deterministic() {
        let script = signature_script();
        let first = SoftwareCanvas::render(&script, GlyphMetrics::default());
        let second = SoftwareCanvas::render(&script, GlyphMetrics::default());
        assert_eq!(first, second);
        assert!(first.starts_with(RAW_DATA_URL_PREFIX));
    }

    #[test]
    fn test_metrics_change_output() {
        let script = signature_script();
        let narrow = SoftwareCanvas::render(&script, GlyphMetrics::default());
        let wide = SoftwareCanvas::render(
            &script,
            GlyphMetrics {
                advance: 0.62,
                height: 0.8,
            },
        );
        assert_ne!(narrow, wide);
    }
}
