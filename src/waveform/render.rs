use std::str::FromStr;

use ratatui::style::Color;

use crate::config::WaveformSettings;

/// A pixel target the waveform can be drawn onto.
pub trait DrawSurface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Change the backing size. Contents are discarded.
    fn resize(&mut self, width: u32, height: u32);
    fn clear(&mut self);
    fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, color: Color);
}

/// Bar width plus trailing gap, in surface pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BarGeometry {
    pub bar_width: u32,
    pub spacing: u32,
}

impl BarGeometry {
    pub fn peak_unit(&self) -> u32 {
        self.bar_width + self.spacing
    }
}

impl From<&WaveformSettings> for BarGeometry {
    fn from(s: &WaveformSettings) -> Self {
        Self {
            bar_width: s.bar_width.max(1),
            spacing: s.bar_spacing,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Palette {
    pub played: Color,
    pub hovered: Color,
    pub unplayed: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            played: Color::Rgb(0xe0, 0xa0, 0x30),
            hovered: Color::Rgb(0xf5, 0xf5, 0xf5),
            unplayed: Color::Rgb(0x5a, 0x5a, 0x5a),
        }
    }
}

impl Palette {
    /// Parse the configured colours once; unparsable entries keep the default.
    pub fn resolve(settings: &WaveformSettings) -> Self {
        let fallback = Palette::default();
        let parse = |name: &str, raw: &str, default: Color| match Color::from_str(raw.trim()) {
            Ok(c) => c,
            Err(_) => {
                log::warn!("waveform.{name}: unrecognised colour {raw:?}, using default");
                default
            }
        };
        Self {
            played: parse("played_color", &settings.played_color, fallback.played),
            hovered: parse("hover_color", &settings.hover_color, fallback.hovered),
            unplayed: parse("unplayed_color", &settings.unplayed_color, fallback.unplayed),
        }
    }
}

/// Everything a single draw depends on.
#[derive(Debug, Clone, Copy)]
pub struct WaveformFrame<'a> {
    pub bars: &'a [f32],
    /// Played fraction, `0.0..=1.0`.
    pub progress: f64,
    pub hover_index: Option<usize>,
    pub hovering: bool,
}

pub fn bar_color(index: usize, frame: &WaveformFrame<'_>, palette: &Palette) -> Color {
    let total = frame.bars.len();
    if frame.hovering && frame.hover_index == Some(index) {
        palette.hovered
    } else if frame.progress > 0.0 && total > 0 && (index as f64 / total as f64) <= frame.progress
    {
        palette.played
    } else {
        palette.unplayed
    }
}

/// Clear `surface` and draw one vertically centred bar per value.
pub fn render(
    surface: &mut dyn DrawSurface,
    frame: &WaveformFrame<'_>,
    palette: &Palette,
    geometry: BarGeometry,
) {
    surface.clear();

    let height = surface.height();
    let width = surface.width();
    if height == 0 || width == 0 {
        return;
    }
    let unit = geometry.peak_unit().max(1);

    for (i, &amp) in frame.bars.iter().enumerate() {
        let x = i as u32 * unit;
        if x >= width {
            break;
        }
        let amp = if amp.is_finite() { amp.clamp(0.0, 1.0) } else { 0.0 };
        let mut bar_h = (amp as f64 * height as f64).round() as u32;
        if amp > 0.0 {
            bar_h = bar_h.max(1);
        }
        let bar_h = bar_h.min(height);
        if bar_h == 0 {
            continue;
        }
        let y = (height - bar_h) / 2;
        let w = geometry.bar_width.min(width - x);
        surface.fill_rect(x, y, w, bar_h, bar_color(i, frame, palette));
    }
}
