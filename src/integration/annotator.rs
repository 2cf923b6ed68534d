//! Live detection count overlay.

use ndarray::Axis;

use crate::integration::detector::Frame;

const GLYPH_WIDTH: usize = 5;
const GLYPH_HEIGHT: usize = 7;

/// Draws the person count and a fixed caption onto frames.
///
/// Text is rendered with a built-in 5x7 bitmap font; lowercase letters
/// are drawn as uppercase and unsupported characters as blanks.
#[derive(Debug, Clone)]
pub struct FrameAnnotator {
    caption: String,
    scale: usize,
    color: [u8; 3],
}

impl Default for FrameAnnotator {
    fn default() -> Self {
        Self {
            caption: String::new(),
            scale: 3,
            color: [0, 255, 0],
        }
    }
}

impl FrameAnnotator {
    pub fn new(caption: impl Into<String>) -> Self {
        Self {
            caption: caption.into(),
            ..Self::default()
        }
    }

    pub fn with_scale(mut self, scale: usize) -> Self {
        self.scale = scale.max(1);
        self
    }

    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = color;
        self
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    /// Draw `Detections: <count>` with its baseline at (10, 30) and the
    /// caption, if any, at (10, 60).
    pub fn annotate(&self, frame: &mut Frame, detection_count: usize) {
        self.draw_text(frame, &format!("Detections: {detection_count}"), 10, 30);
        if !self.caption.is_empty() {
            self.draw_text(frame, &self.caption, 10, 60);
        }
    }

    /// Draw `text` with its bottom-left corner at (`x`, `baseline`),
    /// clipped to the frame.
    fn draw_text(&self, frame: &mut Frame, text: &str, x: usize, baseline: usize) {
        let (height, width, channels) = frame.dim();
        let channels = channels.min(self.color.len());
        let top = baseline.saturating_sub(GLYPH_HEIGHT * self.scale);
        let advance = (GLYPH_WIDTH + 1) * self.scale;

        for (index, ch) in text.chars().enumerate() {
            let Some(rows) = glyph(ch) else { continue };
            let left = x + index * advance;
            if left >= width {
                break;
            }
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                        continue;
                    }
                    for dy in 0..self.scale {
                        let py = top + row * self.scale + dy;
                        if py >= height {
                            break;
                        }
                        for dx in 0..self.scale {
                            let px = left + col * self.scale + dx;
                            if px >= width {
                                break;
                            }
                            for c in 0..channels {
                                frame[[py, px, c]] = self.color[c];
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Swap the red and blue channels in place.
pub fn rgb_to_bgr(frame: &mut Frame) {
    if frame.dim().2 < 3 {
        return;
    }
    for mut pixel in frame.lanes_mut(Axis(2)) {
        pixel.swap(0, 2);
    }
}

fn glyph(ch: char) -> Option<[u8; GLYPH_HEIGHT]> {
    let rows = match ch.to_ascii_uppercase() {
        ' ' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'A' => [0x0E, 0x11, 0x11, 0x11, 0x1F, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ',' => [0x00, 0x00, 0x00, 0x00, 0x0C, 0x04, 0x08],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '!' => [0x04, 0x04, 0x04, 0x04, 0x04, 0x00, 0x04],
        '?' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
        '/' => [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00],
        _ => return None,
    };
    Some(rows)
}
