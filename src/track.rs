//! One playlist entry: its adapter, its waveform and its pointer handling.

pub mod pointer;

use std::cell::{Cell, Ref, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::audio::{PlaybackAdapter, PlaybackEvent, SubscriptionId};
use crate::config::WaveformSettings;
use crate::host::{ButtonIcon, MediaMetadata, Scheduler, TaskId, TrackView};
use crate::library::TrackRecord;
use crate::library::display::time_text;
use crate::transport::TransportCoordinator;
use crate::waveform::{BarGeometry, Palette, WaveformFrame, bar_count, render, resample};

use pointer::{PointerEffect, PointerKind, PointerMachine, PointerState, hover_index, pointer_ratio};

#[derive(Debug, Clone, Copy)]
pub struct TrackOptions {
    pub palette: Palette,
    pub geometry: BarGeometry,
    pub resize_debounce: Duration,
}

impl From<&WaveformSettings> for TrackOptions {
    fn from(s: &WaveformSettings) -> Self {
        Self {
            palette: Palette::resolve(s),
            geometry: BarGeometry::from(s),
            resize_debounce: Duration::from_millis(s.resize_debounce_ms),
        }
    }
}

/// Per-track drawing state, rebuilt whenever the surface size changes.
#[derive(Debug, Clone, Default)]
pub struct WaveformViewState {
    /// One value per bar that fits the surface.
    pub bars: Vec<f32>,
    pub hover_index: Option<usize>,
    pub hovering: bool,
    pub hover_ratio: f64,
    pub width_px: u32,
    pub height_px: u32,
}

pub struct TrackController {
    index: usize,
    record: Rc<TrackRecord>,
    adapter: Rc<dyn PlaybackAdapter>,
    view: Rc<dyn TrackView>,
    scheduler: Rc<Scheduler>,
    transport: Weak<TransportCoordinator>,
    options: TrackOptions,
    wave: RefCell<WaveformViewState>,
    pointer: RefCell<PointerMachine>,
    resize_timer: Cell<Option<TaskId>>,
    pending_size: Cell<Option<(u32, u32)>>,
    subscriptions: RefCell<Vec<SubscriptionId>>,
}

impl TrackController {
    pub fn new(
        index: usize,
        record: Rc<TrackRecord>,
        adapter: Rc<dyn PlaybackAdapter>,
        view: Rc<dyn TrackView>,
        scheduler: Rc<Scheduler>,
        transport: Weak<TransportCoordinator>,
        options: TrackOptions,
    ) -> Rc<Self> {
        let track = Rc::new(Self {
            index,
            record,
            adapter,
            view,
            scheduler,
            transport,
            options,
            wave: RefCell::new(WaveformViewState::default()),
            pointer: RefCell::new(PointerMachine::default()),
            resize_timer: Cell::new(None),
            pending_size: Cell::new(None),
            subscriptions: RefCell::new(Vec::new()),
        });
        track.wire();
        track.view.set_button_icon(ButtonIcon::Play);
        track.refresh_time();
        track
    }

    fn wire(self: &Rc<Self>) {
        let handlers: [(PlaybackEvent, fn(&Rc<Self>)); 3] = [
            (PlaybackEvent::Progress, Self::on_progress),
            (PlaybackEvent::Ready, Self::on_ready),
            (PlaybackEvent::Completed, Self::on_completed),
        ];
        let mut subs = self.subscriptions.borrow_mut();
        for (event, handler) in handlers {
            let weak = Rc::downgrade(self);
            subs.push(self.adapter.subscribe(
                event,
                Rc::new(move || {
                    if let Some(track) = weak.upgrade() {
                        handler(&track);
                    }
                }),
            ));
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn record(&self) -> &Rc<TrackRecord> {
        &self.record
    }

    pub fn adapter(&self) -> &Rc<dyn PlaybackAdapter> {
        &self.adapter
    }

    pub fn wave_state(&self) -> Ref<'_, WaveformViewState> {
        self.wave.borrow()
    }

    pub fn pointer_state(&self) -> PointerState {
        self.pointer.borrow().state()
    }

    pub fn set_button_icon(&self, icon: ButtonIcon) {
        self.view.set_button_icon(icon);
    }

    /// Played fraction in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        let duration = self.adapter.duration();
        if duration > 0.0 {
            (self.adapter.current_time() / duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn media_metadata(&self) -> MediaMetadata {
        MediaMetadata {
            index: self.index,
            title: self.record.title.clone(),
            artist: self.record.artist.clone(),
            album: self.record.date.clone(),
            artwork: self.record.cover_image.clone(),
            duration: self.adapter.duration(),
        }
    }

    pub fn redraw(&self) {
        let progress = self.progress();
        let wave = self.wave.borrow();
        let frame = WaveformFrame {
            bars: &wave.bars,
            progress,
            hover_index: wave.hover_index,
            hovering: wave.hovering,
        };
        let mut surface = self.view.surface();
        render(
            &mut *surface,
            &frame,
            &self.options.palette,
            self.options.geometry,
        );
    }

    /// Hovered position while hovering, playback position otherwise.
    pub fn refresh_time(&self) {
        let duration = self.adapter.duration();
        let shown = {
            let wave = self.wave.borrow();
            if wave.hovering {
                wave.hover_ratio * duration
            } else {
                self.adapter.current_time()
            }
        };
        self.view.set_time_text(&time_text(shown, duration));
    }

    pub fn refresh(&self) {
        self.redraw();
        self.refresh_time();
    }

    /// This track's own play/pause button.
    pub fn toggle(&self) {
        if let Some(transport) = self.transport.upgrade() {
            transport.toggle(Some(self.index));
        }
    }

    pub fn seek_to(&self, seconds: f64) {
        let was_playing = self.adapter.is_playing();
        self.adapter.set_current_time(seconds);
        if was_playing && !self.adapter.is_playing() {
            // Parked at the end by the seek.
            self.view.set_button_icon(ButtonIcon::Play);
            if let Some(transport) = self.transport.upgrade() {
                transport.track_halted(self.index);
            }
        }
        self.refresh();
    }

    pub fn seek_by(&self, delta: f64) {
        self.seek_to(self.adapter.current_time() + delta);
    }

    fn on_progress(self: &Rc<Self>) {
        self.refresh();
        if let Some(transport) = self.transport.upgrade() {
            transport.publish_position(self.index);
        }
    }

    fn on_ready(self: &Rc<Self>) {
        self.refresh();
    }

    fn on_completed(self: &Rc<Self>) {
        self.view.set_button_icon(ButtonIcon::Play);
        self.refresh();
        if let Some(transport) = self.transport.upgrade() {
            transport.track_completed(self.index);
        }
    }

    fn ratio_at(&self, x: f64) -> f64 {
        let width = self.wave.borrow().width_px;
        pointer_ratio(x, 0.0, width as f64)
    }

    /// `x` is in surface pixels from the left edge.
    pub fn pointer_down(&self, x: f64, kind: PointerKind) {
        let ratio = self.ratio_at(x);
        let effect = self.pointer.borrow_mut().down(ratio, kind);
        self.apply_pointer(effect);
    }

    pub fn pointer_move(&self, x: f64, kind: PointerKind) {
        let ratio = self.ratio_at(x);
        let effect = self.pointer.borrow_mut().moved(ratio, kind);
        self.apply_pointer(effect);
    }

    pub fn pointer_up(&self, x: f64) {
        let ratio = self.ratio_at(x);
        let effect = self.pointer.borrow_mut().up(ratio);
        self.apply_pointer(effect);
    }

    pub fn pointer_leave(&self) {
        let effect = self.pointer.borrow_mut().leave();
        self.apply_pointer(effect);
    }

    pub fn pointer_cancel(&self) {
        let effect = self.pointer.borrow_mut().cancel();
        self.apply_pointer(effect);
    }

    pub fn is_dragging(&self) -> bool {
        self.pointer.borrow().is_seeking()
    }

    fn set_hover(&self, ratio: Option<f64>) {
        let mut wave = self.wave.borrow_mut();
        match ratio {
            Some(r) => {
                wave.hovering = true;
                wave.hover_ratio = r;
                wave.hover_index = hover_index(r, wave.bars.len());
            }
            None => {
                wave.hovering = false;
                wave.hover_index = None;
            }
        }
    }

    fn apply_pointer(&self, effect: PointerEffect) {
        match effect {
            PointerEffect::None => {}
            PointerEffect::Seek(ratio) => {
                self.set_hover(Some(ratio));
                self.seek_to(ratio * self.adapter.duration());
            }
            PointerEffect::Hover(ratio) => {
                self.set_hover(Some(ratio));
                self.refresh();
            }
            PointerEffect::Clear => {
                self.set_hover(None);
                self.refresh();
            }
        }
    }

    /// Surface size notification. The first layout applies at once; later changes
    /// are coalesced until they stop for the debounce period.
    pub fn observe_size(self: &Rc<Self>, width: u32, height: u32) {
        let current = {
            let wave = self.wave.borrow();
            (wave.width_px, wave.height_px)
        };
        let pending = self.pending_size.get();
        if pending == Some((width, height)) || (pending.is_none() && current == (width, height)) {
            return;
        }
        if current == (0, 0) && pending.is_none() {
            self.apply_size(width, height);
            return;
        }

        self.pending_size.set(Some((width, height)));
        if let Some(id) = self.resize_timer.take() {
            self.scheduler.cancel(id);
        }
        let weak = Rc::downgrade(self);
        let id = self.scheduler.set_timeout(
            self.options.resize_debounce,
            Box::new(move || {
                if let Some(track) = weak.upgrade() {
                    track.resize_timer.set(None);
                    if let Some((w, h)) = track.pending_size.take() {
                        track.apply_size(w, h);
                    }
                }
            }),
        );
        self.resize_timer.set(Some(id));
    }

    fn apply_size(&self, width: u32, height: u32) {
        self.view.surface().resize(width, height);
        {
            let mut wave = self.wave.borrow_mut();
            wave.width_px = width;
            wave.height_px = height;
            wave.bars = resample(
                &self.record.amplitude,
                bar_count(width, self.options.geometry),
            );
            if wave.hovering {
                wave.hover_index = hover_index(wave.hover_ratio, wave.bars.len());
            }
        }
        log::trace!("track {} resized to {width}x{height}", self.index);
        self.redraw();
    }
}

impl Drop for TrackController {
    fn drop(&mut self) {
        for id in self.subscriptions.borrow_mut().drain(..) {
            self.adapter.unsubscribe(id);
        }
        if let Some(id) = self.resize_timer.take() {
            self.scheduler.cancel(id);
        }
    }
}
