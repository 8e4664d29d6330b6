use ratatui::style::Color;

use super::render::bar_color;
use super::*;
use crate::config::WaveformSettings;

#[derive(Default)]
struct RecordingSurface {
    width: u32,
    height: u32,
    clears: usize,
    rects: Vec<(u32, u32, u32, u32, Color)>,
}

impl DrawSurface for RecordingSurface {
    fn width(&self) -> u32 {
        self.width
    }
    fn height(&self) -> u32 {
        self.height
    }
    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.rects.clear();
    }
    fn clear(&mut self) {
        self.clears += 1;
        self.rects.clear();
    }
    fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: Color) {
        self.rects.push((x, y, w, h, color));
    }
}

fn palette() -> Palette {
    Palette {
        played: Color::Red,
        hovered: Color::White,
        unplayed: Color::DarkGray,
    }
}

#[test]
fn resample_is_length_exact() {
    let input: Vec<f32> = (0..200).map(|i| (i % 7) as f32 / 7.0).collect();
    for target in 1..500 {
        assert_eq!(resample(&input, target).len(), target, "target {target}");
    }
    assert_eq!(resample(&[0.3], 17).len(), 17);
}

#[test]
fn resample_to_same_length_is_identity() {
    let input = vec![0.0, 0.25, 1.0, 0.5, 0.75];
    let out = resample(&input, input.len());
    for (a, b) in input.iter().zip(&out) {
        assert!((a - b).abs() < 1e-6);
    }
}

#[test]
fn resample_interpolates_between_neighbours() {
    assert_eq!(resample(&[0.0, 1.0], 3), vec![0.0, 0.5, 1.0]);
    let up = resample(&[0.0, 1.0, 0.0], 5);
    assert_eq!(up, vec![0.0, 0.5, 1.0, 0.5, 0.0]);
}

#[test]
fn resample_degenerate_targets() {
    assert!(resample(&[0.1, 0.2], 0).is_empty());
    assert_eq!(resample(&[0.1, 0.2], 1), vec![0.1]);
    assert!(resample(&[], 0).is_empty());
    assert_eq!(resample(&[], 3), vec![0.0; 3]);
}

#[test]
fn resample_is_deterministic() {
    let input: Vec<f32> = (0..37).map(|i| ((i * 13) % 11) as f32 / 11.0).collect();
    assert_eq!(resample(&input, 123), resample(&input, 123));
}

#[test]
fn bar_count_uses_peak_unit() {
    let g = BarGeometry {
        bar_width: 1,
        spacing: 1,
    };
    assert_eq!(bar_count(100, g), 50);
    assert_eq!(bar_count(101, g), 50);
    assert_eq!(bar_count(1, g), 0);
    let g = BarGeometry {
        bar_width: 2,
        spacing: 1,
    };
    assert_eq!(bar_count(10, g), 3);
}

#[test]
fn bar_colour_priority_is_hover_then_played_then_unplayed() {
    let bars = [0.5; 10];
    let frame = WaveformFrame {
        bars: &bars,
        progress: 0.5,
        hover_index: Some(2),
        hovering: true,
    };
    let p = palette();
    assert_eq!(bar_color(2, &frame, &p), Color::White);
    assert_eq!(bar_color(0, &frame, &p), Color::Red);
    assert_eq!(bar_color(5, &frame, &p), Color::Red);
    assert_eq!(bar_color(6, &frame, &p), Color::DarkGray);

    let idle = WaveformFrame {
        hovering: false,
        ..frame
    };
    assert_eq!(bar_color(2, &idle, &p), Color::Red);

    let fresh = WaveformFrame {
        progress: 0.0,
        ..idle
    };
    assert_eq!(bar_color(0, &fresh, &p), Color::DarkGray);
}

#[test]
fn render_clears_then_draws_centred_bars() {
    let mut surface = RecordingSurface {
        width: 8,
        height: 10,
        ..Default::default()
    };
    let bars = [1.0, 0.5, 0.0, 0.2];
    let frame = WaveformFrame {
        bars: &bars,
        progress: 0.0,
        hover_index: None,
        hovering: false,
    };
    let g = BarGeometry {
        bar_width: 1,
        spacing: 1,
    };

    render(&mut surface, &frame, &palette(), g);
    render(&mut surface, &frame, &palette(), g);

    assert_eq!(surface.clears, 2);
    assert_eq!(
        surface.rects,
        vec![
            (0, 0, 1, 10, Color::DarkGray),
            (2, 2, 1, 5, Color::DarkGray),
            (6, 4, 1, 2, Color::DarkGray),
        ]
    );
}

#[test]
fn render_on_empty_surface_draws_nothing() {
    let mut surface = RecordingSurface::default();
    let frame = WaveformFrame {
        bars: &[1.0],
        progress: 1.0,
        hover_index: None,
        hovering: false,
    };
    render(&mut surface, &frame, &palette(), BarGeometry { bar_width: 1, spacing: 0 });
    assert_eq!(surface.clears, 1);
    assert!(surface.rects.is_empty());
}

#[test]
fn palette_resolves_names_and_hex_with_fallback() {
    let settings = WaveformSettings {
        played_color: "red".into(),
        hover_color: "#102030".into(),
        unplayed_color: "not-a-colour".into(),
        ..Default::default()
    };
    let p = Palette::resolve(&settings);
    assert_eq!(p.played, Color::Red);
    assert_eq!(p.hovered, Color::Rgb(0x10, 0x20, 0x30));
    assert_eq!(p.unplayed, Palette::default().unplayed);
}
