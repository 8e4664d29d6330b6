//! Half-block pixel grid: each terminal cell holds two vertically stacked pixels.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Color;
use ratatui::widgets::Widget;

use crate::waveform::DrawSurface;

const UPPER_HALF: &str = "▀";
const LOWER_HALF: &str = "▄";

#[derive(Debug, Clone, Default)]
pub struct CellCanvas {
    width: u32,
    height: u32,
    pixels: Vec<Option<Color>>,
}

impl CellCanvas {
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels[(y * self.width + x) as usize]
    }

    /// Terminal rows needed to show every pixel row.
    pub fn rows(&self) -> u32 {
        self.height.div_ceil(2)
    }
}

impl DrawSurface for CellCanvas {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels = vec![None; (width * height) as usize];
    }

    fn clear(&mut self) {
        self.pixels.fill(None);
    }

    fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: Color) {
        let x_end = x.saturating_add(w).min(self.width);
        let y_end = y.saturating_add(h).min(self.height);
        for py in y..y_end {
            for px in x..x_end {
                self.pixels[(py * self.width + px) as usize] = Some(color);
            }
        }
    }
}

impl Widget for &CellCanvas {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let cols = self.width.min(area.width as u32);
        let rows = self.rows().min(area.height as u32);
        for row in 0..rows {
            for col in 0..cols {
                let top = self.pixel(col, row * 2);
                let bottom = self.pixel(col, row * 2 + 1);
                let Some(cell) = buf.cell_mut((area.x + col as u16, area.y + row as u16)) else {
                    continue;
                };
                match (top, bottom) {
                    (Some(t), Some(b)) => {
                        cell.set_symbol(UPPER_HALF).set_fg(t).set_bg(b);
                    }
                    (Some(t), None) => {
                        cell.set_symbol(UPPER_HALF).set_fg(t);
                    }
                    (None, Some(b)) => {
                        cell.set_symbol(LOWER_HALF).set_fg(b);
                    }
                    (None, None) => {
                        cell.set_symbol(" ");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_is_clipped_to_the_canvas() {
        let mut c = CellCanvas::default();
        c.resize(4, 4);
        c.fill_rect(2, 1, 10, 10, Color::Red);
        assert_eq!(c.pixel(1, 1), None);
        assert_eq!(c.pixel(3, 3), Some(Color::Red));
        assert_eq!(c.pixel(4, 3), None);
        c.clear();
        assert_eq!(c.pixel(3, 3), None);
    }

    #[test]
    fn pixel_pairs_become_half_blocks() {
        let mut c = CellCanvas::default();
        c.resize(3, 2);
        c.fill_rect(0, 0, 1, 2, Color::Red);
        c.fill_rect(1, 0, 1, 1, Color::Green);
        c.fill_rect(2, 1, 1, 1, Color::Blue);

        let area = Rect::new(0, 0, 3, 1);
        let mut buf = Buffer::empty(area);
        (&c).render(area, &mut buf);

        assert_eq!(buf[(0, 0)].symbol(), UPPER_HALF);
        assert_eq!(buf[(0, 0)].bg, Color::Red);
        assert_eq!(buf[(1, 0)].symbol(), UPPER_HALF);
        assert_eq!(buf[(1, 0)].fg, Color::Green);
        assert_eq!(buf[(2, 0)].symbol(), LOWER_HALF);
        assert_eq!(buf[(2, 0)].fg, Color::Blue);
    }
}
