//! UI rendering helpers for the terminal user interface.
//!
//! Layout is computed separately from drawing so the event loop can route mouse
//! events and size the waveform canvases before the frame is rendered.

pub mod canvas;
pub mod views;

use std::{collections::BTreeMap, sync::LazyLock};

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Padding, Paragraph, Wrap},
};

use crate::app::App;
use crate::config::ControlsSettings;
use crate::host::ButtonIcon;
use crate::library::display::{format_time, strip_markup, time_text};

static CONTROLS_MAP: LazyLock<BTreeMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut map = BTreeMap::new();
    map.insert("space", "play/pause");
    map.insert("n/p", "next/prev");
    map.insert("j/k", "select");
    map.insert("enter", "play selected");
    map.insert("+/-", "volume");
    map.insert("m", "mute");
    map.insert("i", "details");
    map.insert("q", "quit");
    map
});

/// Render the controls help text, incorporating the seek steps.
fn controls_text(controls: &ControlsSettings) -> String {
    let order = [
        "space", "n/p", "←/→", "S-←/→", "+/-", "m", "j/k", "enter", "i", "q",
    ];
    order
        .iter()
        .filter_map(|k| match *k {
            "←/→" => Some(format!("[←/→] seek -/+{}s", controls.seek_small_seconds)),
            "S-←/→" => Some(format!("[S-←/→] seek -/+{}s", controls.seek_large_seconds)),
            _ => CONTROLS_MAP.get(*k).map(|v| format!("[{k}] {v}")),
        })
        .collect::<Vec<String>>()
        .join(" | ")
}

pub fn icon_glyph(icon: ButtonIcon) -> &'static str {
    match icon {
        ButtonIcon::Play => "▶",
        ButtonIcon::Pause => "⏸",
    }
}

/// `[██████····] 60%`, or the empty gauge with `muted`.
pub fn volume_bar(volume: f64, muted: bool, width: usize) -> String {
    let level = if muted { 0.0 } else { volume.clamp(0.0, 1.0) };
    let filled = (level * width as f64).round() as usize;
    let gauge: String = "█".repeat(filled) + &"·".repeat(width - filled.min(width));
    if muted {
        format!("[{gauge}] muted")
    } else {
        format!("[{gauge}] {:>3}%", (level * 100.0).round() as u32)
    }
}

/// Top-level regions of the screen.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScreenAreas {
    pub header: Rect,
    pub playlist: Rect,
    pub footer: Rect,
}

pub fn screen_areas(area: Rect) -> ScreenAreas {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(4),
        ])
        .split(area);
    ScreenAreas {
        header: chunks[0],
        playlist: chunks[1],
        footer: chunks[2],
    }
}

/// Where one track is drawn: its title line and its waveform.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RowLayout {
    pub index: usize,
    pub header: Rect,
    pub wave: Rect,
}

impl RowLayout {
    /// The play/pause glyph at the start of the title line.
    pub fn button(&self) -> Rect {
        Rect {
            width: self.header.width.min(2),
            ..self.header
        }
    }
}

fn playlist_inner(area: Rect) -> Rect {
    Block::default().borders(Borders::ALL).inner(area)
}

/// Title line, waveform rows and a blank spacer.
fn block_height(wave_rows: u16) -> u16 {
    wave_rows.max(1) + 2
}

/// Width in cells every waveform gets.
pub fn wave_width(playlist: Rect) -> u16 {
    playlist_inner(playlist).width.saturating_sub(2)
}

/// How many whole tracks fit in the playlist area.
pub fn visible_tracks(playlist: Rect, wave_rows: u16) -> usize {
    (playlist_inner(playlist).height / block_height(wave_rows)) as usize
}

pub fn playlist_layout(playlist: Rect, count: usize, top: usize, wave_rows: u16) -> Vec<RowLayout> {
    let inner = playlist_inner(playlist);
    let block_h = block_height(wave_rows);
    let visible = visible_tracks(playlist, wave_rows);
    let width = wave_width(playlist);

    (top..count.min(top + visible))
        .enumerate()
        .map(|(slot, index)| {
            let y = inner.y + slot as u16 * block_h;
            RowLayout {
                index,
                header: Rect::new(inner.x, y, inner.width, 1),
                wave: Rect::new(inner.x + 1, y + 1, width, wave_rows.max(1)),
            }
        })
        .collect()
}

/// The footer's own play/pause glyph.
pub fn footer_button(footer: Rect) -> Rect {
    let inner = Block::default()
        .borders(Borders::ALL)
        .padding(Padding::left(1))
        .inner(footer);
    Rect {
        height: inner.height.min(1),
        width: inner.width.min(2),
        ..inner
    }
}

/// Compute a centered rectangle with given size constrained to `r`.
fn centered_rect_sized(mut width: u16, mut height: u16, r: Rect) -> Rect {
    // Keep the popup smaller and avoid covering the entire UI.
    width = width.min(r.width.saturating_sub(2)).max(10);
    height = height.min(r.height.saturating_sub(2)).max(5);

    let x = r.x + (r.width.saturating_sub(width) / 2);
    let y = r.y + (r.height.saturating_sub(height) / 2);
    Rect {
        x,
        y,
        width,
        height,
    }
}

fn details_text(app: &App) -> Vec<Line<'static>> {
    let Some(track) = app.transport.track(app.selected) else {
        return vec![Line::from("No track selected")];
    };
    let rec = track.record();
    let field = |v: &str| if v.trim().is_empty() { "-".to_string() } else { v.to_string() };

    let mut lines = vec![
        Line::from(format!("Title: {}", field(&rec.title))),
        Line::from(format!("Artist: {}", field(&rec.artist))),
        Line::from(format!("Date: {}", field(&rec.date))),
        Line::from(format!("Genre: {}", field(&rec.genre))),
        Line::from(format!(
            "Duration: {}",
            format_time(track.adapter().duration(), false)
        )),
        Line::from(format!("File: {}", rec.file_reference)),
    ];
    if let Some(markup) = &rec.details_markup {
        lines.push(Line::from(""));
        lines.extend(strip_markup(markup).into_iter().map(Line::from));
    }
    lines
}

/// Render the entire UI into the provided `frame`. `app.relayout` must have run
/// for this frame's area.
pub fn draw(frame: &mut Frame, app: &App, controls: &ControlsSettings) {
    let areas = screen_areas(frame.area());
    let played = app.palette.played;

    // Header
    let mut header_spans = vec![Span::raw(app.source.clone())];
    if let Some(link) = app.link.display() {
        header_spans.push(Span::raw("  "));
        header_spans.push(Span::styled(link, Style::default().fg(played)));
    }
    let header = Paragraph::new(Line::from(header_spans))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" wavedeck ")
                .title_alignment(Alignment::Center),
        );
    frame.render_widget(header, areas.header);

    // Playlist
    let active = app.transport.active_index();
    let list_block = Block::default().borders(Borders::ALL).title(" playlist ");
    if app.rows.is_empty() {
        let empty = Paragraph::new(format!("No tracks in {}", app.source))
            .alignment(Alignment::Center)
            .block(list_block);
        frame.render_widget(empty, areas.playlist);
    } else {
        frame.render_widget(list_block, areas.playlist);
    }
    for row_layout in &app.layout {
        let Some(row) = app.rows.get(row_layout.index) else {
            continue;
        };
        let Some(track) = app.transport.track(row_layout.index) else {
            continue;
        };

        let mut title_style = Style::default();
        if active == Some(row_layout.index) {
            title_style = title_style.fg(played).add_modifier(Modifier::BOLD);
        }
        if app.selected == row_layout.index {
            title_style = title_style.add_modifier(Modifier::REVERSED);
        }
        let title = Line::from(vec![
            Span::styled(
                format!("{} ", icon_glyph(row.icon())),
                Style::default().fg(played),
            ),
            Span::styled(track.record().display(), title_style),
        ]);
        frame.render_widget(Paragraph::new(title), row_layout.header);
        frame.render_widget(
            Paragraph::new(row.time()).alignment(Alignment::Right),
            row_layout.header,
        );
        frame.render_widget(&*row.canvas(), row_layout.wave);
    }

    // Details popup over the playlist
    if app.details_window {
        let popup_area = centered_rect_sized(72, 14, areas.playlist);
        frame.render_widget(Clear, popup_area);
        let details = Paragraph::new(details_text(app))
            .block(
                Block::default()
                    .padding(Padding::left(1))
                    .borders(Borders::ALL)
                    .title(" details (i closes) "),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(details, popup_area);
    }

    // Footer transport
    let now_playing = active
        .and_then(|i| app.transport.track(i))
        .map(|t| {
            let a = t.adapter();
            format!(
                "{}  {}",
                t.record().display(),
                time_text(a.current_time(), a.duration())
            )
        })
        .unwrap_or_else(|| "Stopped".to_string());
    let transport_line = Line::from(vec![
        Span::styled(
            format!("{} ", icon_glyph(app.footer.icon())),
            Style::default().fg(played),
        ),
        Span::raw(now_playing),
        Span::raw("  •  "),
        Span::raw(volume_bar(app.footer.volume(), app.footer.muted(), 10)),
    ]);
    let hints = Line::styled(controls_text(controls), Style::default().fg(Color::DarkGray));
    let footer = Paragraph::new(vec![transport_line, hints])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" transport ")
                .padding(Padding::left(1)),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, areas.footer);
}
