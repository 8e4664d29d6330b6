//! Application model: `App` ties the transport to what is on screen.
//!
//! It owns the terminal-side views, the current layout and the selection, and
//! turns mouse positions into track and transport calls.

use std::rc::Rc;

use ratatui::layout::{Position, Rect};

use crate::track::pointer::PointerKind;
use crate::transport::TransportCoordinator;
use crate::ui::views::{DeepLink, FooterState, ListViewport, TrackRow};
use crate::ui::{self, RowLayout};
use crate::waveform::Palette;

/// Host-side views the transport and tracks were built against.
pub struct AppViews {
    pub rows: Vec<Rc<TrackRow>>,
    pub footer: Rc<FooterState>,
    pub link: Rc<DeepLink>,
    pub viewport: Rc<ListViewport>,
}

/// What sits under a terminal cell.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Hit {
    Button(usize),
    Title(usize),
    /// `x` is in surface pixels from the waveform's left edge.
    Wave { index: usize, x: f64 },
    FooterButton,
    None,
}

/// The main application model.
pub struct App {
    pub transport: Rc<TransportCoordinator>,
    pub rows: Vec<Rc<TrackRow>>,
    pub footer: Rc<FooterState>,
    pub link: Rc<DeepLink>,
    pub viewport: Rc<ListViewport>,
    pub palette: Palette,
    /// Where the playlist came from, shown in the header.
    pub source: String,
    pub selected: usize,
    pub details_window: bool,
    pub layout: Vec<RowLayout>,
    pub footer_button: Rect,

    /// Track whose waveform received the button press.
    capture: Option<usize>,
    hovered: Option<usize>,
    last_active: Option<usize>,
}

impl App {
    pub fn new(
        transport: Rc<TransportCoordinator>,
        views: AppViews,
        palette: Palette,
        source: String,
    ) -> Self {
        Self {
            transport,
            rows: views.rows,
            footer: views.footer,
            link: views.link,
            viewport: views.viewport,
            palette,
            source,
            selected: 0,
            details_window: false,
            layout: Vec::new(),
            footer_button: Rect::default(),
            capture: None,
            hovered: None,
            last_active: None,
        }
    }

    pub fn has_tracks(&self) -> bool {
        !self.transport.is_empty()
    }

    pub fn toggle_details_window(&mut self) {
        self.details_window = !self.details_window;
    }

    /// Move the selection down one track, wrapping to the top.
    pub fn next(&mut self) {
        if !self.has_tracks() {
            return;
        }
        self.selected = (self.selected + 1) % self.transport.len();
    }

    /// Move the selection up one track, wrapping to the bottom.
    pub fn prev(&mut self) {
        if !self.has_tracks() {
            return;
        }
        let len = self.transport.len();
        self.selected = (self.selected + len - 1) % len;
    }

    pub fn set_selected(&mut self, index: usize) {
        if index < self.transport.len() {
            self.selected = index;
        }
    }

    pub fn toggle_selected(&self) {
        if self.has_tracks() {
            self.transport.toggle(Some(self.selected));
        }
    }

    /// Recompute the layout for a terminal of size `area` and report the waveform
    /// size to every track. The selection follows the active track when it changes.
    pub fn relayout(&mut self, area: Rect, wave_rows: u16) {
        let areas = ui::screen_areas(area);
        let count = self.transport.len();

        let active = self.transport.active_index();
        if active != self.last_active {
            if let Some(index) = active {
                self.selected = index;
            }
            self.last_active = active;
        }
        if count > 0 && self.selected >= count {
            self.selected = count - 1;
        }

        let visible = ui::visible_tracks(areas.playlist, wave_rows);
        let keep = (count > 0).then_some(self.selected);
        let top = self.viewport.settle(count, visible, keep);
        self.layout = ui::playlist_layout(areas.playlist, count, top, wave_rows);
        self.footer_button = ui::footer_button(areas.footer);

        let width = ui::wave_width(areas.playlist) as u32;
        let height = wave_rows.max(1) as u32 * 2;
        let tracks = self.transport.tracks().clone();
        for track in &tracks {
            track.observe_size(width, height);
        }
    }

    fn row(&self, index: usize) -> Option<&RowLayout> {
        self.layout.iter().find(|r| r.index == index)
    }

    pub fn hit(&self, col: u16, row: u16) -> Hit {
        let pos = Position::new(col, row);
        if self.footer_button.contains(pos) {
            return Hit::FooterButton;
        }
        for r in &self.layout {
            if r.button().contains(pos) {
                return Hit::Button(r.index);
            }
            if r.header.contains(pos) {
                return Hit::Title(r.index);
            }
            if r.wave.contains(pos) {
                return Hit::Wave {
                    index: r.index,
                    x: wave_x(r, col),
                };
            }
        }
        Hit::None
    }

    pub fn mouse_down(&mut self, col: u16, row: u16) {
        match self.hit(col, row) {
            Hit::Button(index) => {
                self.selected = index;
                self.transport.toggle(Some(index));
            }
            Hit::Title(index) => self.selected = index,
            Hit::Wave { index, x } => {
                self.selected = index;
                if let Some(track) = self.transport.track(index) {
                    self.capture = Some(index);
                    track.pointer_down(x, PointerKind::Mouse);
                }
            }
            Hit::FooterButton => self.transport.toggle(None),
            Hit::None => {}
        }
    }

    /// Button held and moving: only the captured waveform follows.
    pub fn mouse_drag(&mut self, col: u16, row: u16) {
        let Some(index) = self.capture else {
            self.mouse_move(col, row);
            return;
        };
        let (Some(track), Some(r)) = (self.transport.track(index), self.row(index)) else {
            return;
        };
        track.pointer_move(wave_x(r, col), PointerKind::Mouse);
    }

    pub fn mouse_up(&mut self, col: u16, row: u16) {
        let Some(index) = self.capture.take() else {
            return;
        };
        let Some(track) = self.transport.track(index) else {
            return;
        };
        let Some(r) = self.row(index).copied() else {
            track.pointer_cancel();
            return;
        };
        track.pointer_up(wave_x(&r, col));
        match self.hit(col, row) {
            Hit::Wave { index: over, .. } if over == index => self.hovered = Some(index),
            _ => {
                track.pointer_leave();
                if self.hovered == Some(index) {
                    self.hovered = None;
                }
            }
        }
    }

    /// Pointer moving with no button held.
    pub fn mouse_move(&mut self, col: u16, row: u16) {
        let over = match self.hit(col, row) {
            Hit::Wave { index, x } => Some((index, x)),
            _ => None,
        };
        let previous = self.hovered;
        if let Some(old) = previous.filter(|&old| over.map(|(i, _)| i) != Some(old)) {
            if let Some(track) = self.transport.track(old) {
                track.pointer_leave();
            }
        }
        self.hovered = over.map(|(i, _)| i);
        if let Some((index, x)) = over {
            if let Some(track) = self.transport.track(index) {
                track.pointer_move(x, PointerKind::Mouse);
            }
        }
    }

    /// The terminal lost the pointer (focus change, resize).
    pub fn mouse_cancel(&mut self) {
        for index in self.capture.take().into_iter().chain(self.hovered.take()) {
            if let Some(track) = self.transport.track(index) {
                track.pointer_cancel();
            }
        }
    }
}

/// Centre of the cell, so a click on the last column does not read as the end.
fn wave_x(r: &RowLayout, col: u16) -> f64 {
    col as f64 - r.wave.x as f64 + 0.5
}
