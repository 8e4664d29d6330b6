//! Terminal-side state behind the host traits: one `TrackRow` per track, the
//! footer, the deep link shown in the header and the list scroll position.

use std::cell::{Cell, RefCell, RefMut};

use crate::host::{ButtonIcon, Location, TrackView, TransportView, Viewport};
use crate::waveform::DrawSurface;

use super::canvas::CellCanvas;

pub struct TrackRow {
    icon: Cell<ButtonIcon>,
    time: RefCell<String>,
    canvas: RefCell<CellCanvas>,
}

impl Default for TrackRow {
    fn default() -> Self {
        Self {
            icon: Cell::new(ButtonIcon::Play),
            time: RefCell::new(String::new()),
            canvas: RefCell::new(CellCanvas::default()),
        }
    }
}

impl TrackRow {
    pub fn icon(&self) -> ButtonIcon {
        self.icon.get()
    }

    pub fn time(&self) -> String {
        self.time.borrow().clone()
    }

    pub fn canvas(&self) -> std::cell::Ref<'_, CellCanvas> {
        self.canvas.borrow()
    }
}

impl TrackView for TrackRow {
    fn set_button_icon(&self, icon: ButtonIcon) {
        self.icon.set(icon);
    }

    fn set_time_text(&self, text: &str) {
        let mut time = self.time.borrow_mut();
        time.clear();
        time.push_str(text);
    }

    fn surface(&self) -> RefMut<'_, dyn DrawSurface> {
        RefMut::map(self.canvas.borrow_mut(), |c| c as &mut dyn DrawSurface)
    }
}

pub struct FooterState {
    icon: Cell<ButtonIcon>,
    volume: Cell<f64>,
    muted: Cell<bool>,
}

impl Default for FooterState {
    fn default() -> Self {
        Self {
            icon: Cell::new(ButtonIcon::Play),
            volume: Cell::new(1.0),
            muted: Cell::new(false),
        }
    }
}

impl FooterState {
    pub fn icon(&self) -> ButtonIcon {
        self.icon.get()
    }

    pub fn volume(&self) -> f64 {
        self.volume.get()
    }

    pub fn muted(&self) -> bool {
        self.muted.get()
    }
}

impl TransportView for FooterState {
    fn set_button_icon(&self, icon: ButtonIcon) {
        self.icon.set(icon);
    }

    fn set_volume(&self, volume: f64) {
        self.volume.set(volume);
    }

    fn set_muted(&self, muted: bool) {
        self.muted.set(muted);
    }
}

/// The `#slug` the player was opened with, kept current with the active track.
#[derive(Debug, Default)]
pub struct DeepLink {
    slug: RefCell<Option<String>>,
}

impl DeepLink {
    /// Accepts `slug` or `#slug`; blank means none.
    pub fn new(initial: Option<&str>) -> Self {
        let slug = initial
            .map(|s| s.trim().trim_start_matches('#').to_string())
            .filter(|s| !s.is_empty());
        Self {
            slug: RefCell::new(slug),
        }
    }

    pub fn display(&self) -> Option<String> {
        self.slug.borrow().as_ref().map(|s| format!("#{s}"))
    }
}

impl Location for DeepLink {
    fn fragment(&self) -> Option<String> {
        self.slug.borrow().clone()
    }

    fn replace_fragment(&self, slug: &str) {
        log::debug!("fragment -> #{slug}");
        *self.slug.borrow_mut() = Some(slug.to_string());
    }
}

/// First visible track of the playlist, plus a pending request to centre one.
#[derive(Debug, Default)]
pub struct ListViewport {
    top: Cell<usize>,
    center: Cell<Option<usize>>,
}

impl ListViewport {
    pub fn top(&self) -> usize {
        self.top.get()
    }

    /// Settle the scroll position for `visible` rows out of `count`, keeping `keep`
    /// on screen. A pending centre request wins once.
    pub fn settle(&self, count: usize, visible: usize, keep: Option<usize>) -> usize {
        let top = scroll_top(count, visible, self.top.get(), self.center.take(), keep);
        self.top.set(top);
        top
    }
}

impl Viewport for ListViewport {
    fn center_on(&self, index: usize) {
        self.center.set(Some(index));
    }
}

/// Scroll offset that shows `center` in the middle, or else keeps `keep` visible
/// with as little movement as possible.
pub fn scroll_top(
    count: usize,
    visible: usize,
    current: usize,
    center: Option<usize>,
    keep: Option<usize>,
) -> usize {
    if visible == 0 || count <= visible {
        return 0;
    }
    let max_top = count - visible;
    let top = match (center, keep) {
        (Some(c), _) => c.saturating_sub(visible / 2),
        (None, Some(k)) if k < current => k,
        (None, Some(k)) if k >= current + visible => k + 1 - visible,
        _ => current,
    };
    top.min(max_top)
}
