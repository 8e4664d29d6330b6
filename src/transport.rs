//! The global transport: which track is current, the shared volume, and the one
//! place that starts playback so that only one track is ever audible.

use std::cell::{Ref, RefCell};
use std::rc::{Rc, Weak};

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};
use futures::task::{LocalSpawn, LocalSpawnExt};

use crate::config::Settings;
use crate::host::{ButtonIcon, Location, MediaSession, PlaybackState, TransportView, Viewport};
use crate::track::TrackController;

/// Host surfaces the transport keeps in sync.
pub struct TransportHost {
    pub view: Rc<dyn TransportView>,
    pub location: Rc<dyn Location>,
    pub viewport: Rc<dyn Viewport>,
    pub session: Rc<dyn MediaSession>,
}

#[derive(Debug, Clone, Copy)]
pub struct TransportOptions {
    pub initial_volume: f64,
    /// Restored on unmute when the volume was zero at mute time.
    pub mute_restore_floor: f64,
    pub seek_small: f64,
    pub seek_large: f64,
    pub volume_step: f64,
}

impl From<&Settings> for TransportOptions {
    fn from(s: &Settings) -> Self {
        Self {
            initial_volume: s.audio.initial_volume,
            mute_restore_floor: s.audio.mute_restore_floor,
            seek_small: s.controls.seek_small_seconds,
            seek_large: s.controls.seek_large_seconds,
            volume_step: s.controls.volume_step,
        }
    }
}

/// Keyboard-level transport commands.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TransportCommand {
    TogglePlay,
    Next,
    Previous,
    ToggleMute,
    SeekBy(f64),
    VolumeBy(f64),
}

/// Actions requested by the OS media session.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum MediaAction {
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Previous,
    /// Offset in seconds; the small seek step when absent.
    SeekForward(Option<f64>),
    SeekBackward(Option<f64>),
    SeekTo(f64),
}

#[derive(Debug, Clone, Default)]
pub struct TransportState {
    /// The track the transport is attached to; stays set while paused.
    pub active_index: Option<usize>,
    pub muted: bool,
    /// Last volume set by the user; unchanged while muted.
    pub volume: f64,
    pub previous_non_zero_volume: f64,
    linked: Weak<TrackController>,
    /// Target of the latest start request, cleared by a pause of that track.
    requested: Option<usize>,
    request_seq: u64,
    /// Sequence number of the start request still waiting on `play()`.
    in_flight: Option<u64>,
}

pub struct TransportCoordinator {
    tracks: RefCell<Vec<Rc<TrackController>>>,
    state: RefCell<TransportState>,
    host: TransportHost,
    options: TransportOptions,
    spawner: Rc<dyn LocalSpawn>,
}

impl TransportCoordinator {
    pub fn new(
        host: TransportHost,
        options: TransportOptions,
        spawner: Rc<dyn LocalSpawn>,
    ) -> Rc<Self> {
        let volume = options.initial_volume.clamp(0.0, 1.0);
        Rc::new(Self {
            tracks: RefCell::new(Vec::new()),
            state: RefCell::new(TransportState {
                volume,
                previous_non_zero_volume: if volume > 0.0 {
                    volume
                } else {
                    options.mute_restore_floor
                },
                ..Default::default()
            }),
            host,
            options,
            spawner,
        })
    }

    /// Take over the playlist and apply the current volume to every track.
    pub fn attach(&self, tracks: Vec<Rc<TrackController>>) {
        *self.tracks.borrow_mut() = tracks;
        let (volume, muted) = {
            let s = self.state.borrow();
            (s.volume, s.muted)
        };
        self.apply_volume(if muted { 0.0 } else { volume });
        self.host.view.set_volume(if muted { 0.0 } else { volume });
        self.host.view.set_muted(muted);
        self.host.view.set_button_icon(ButtonIcon::Play);
    }

    pub fn tracks(&self) -> Ref<'_, Vec<Rc<TrackController>>> {
        self.tracks.borrow()
    }

    pub fn track(&self, index: usize) -> Option<Rc<TrackController>> {
        self.tracks.borrow().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.tracks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self) -> TransportState {
        self.state.borrow().clone()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.state.borrow().active_index
    }

    pub fn options(&self) -> &TransportOptions {
        &self.options
    }

    /// Index of the track whose slug is in the fragment.
    pub fn fragment_index(&self) -> Option<usize> {
        let fragment = self.host.location.fragment()?;
        let fragment = fragment.trim_start_matches('#');
        self.tracks
            .borrow()
            .iter()
            .position(|t| t.record().slug() == fragment)
    }

    /// Explicit index if valid, else the active track, else the fragment's, else the first.
    pub fn resolve_target(&self, explicit: Option<usize>) -> Option<usize> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        if let Some(i) = explicit {
            return (i < len).then_some(i);
        }
        self.active_index()
            .filter(|&i| i < len)
            .or_else(|| self.fragment_index())
            .or(Some(0))
    }

    fn spawn(&self, fut: LocalBoxFuture<'static, bool>) {
        if let Err(e) = self.spawner.spawn_local(fut.map(|_| ())) {
            log::error!("could not schedule transport task: {e}");
        }
    }

    fn pause_others(&self, keep: usize) {
        for track in self.tracks.borrow().iter() {
            if track.index() != keep {
                track.adapter().pause();
                track.set_button_icon(ButtonIcon::Play);
            }
        }
    }

    /// Start `target` (resolved as in [`resolve_target`](Self::resolve_target)) and make it
    /// the active track. Resolves `false` when playback did not start or a later request
    /// superseded this one; nothing is updated in that case.
    pub fn activate(
        self: &Rc<Self>,
        target: Option<usize>,
        reset_to_start: bool,
    ) -> LocalBoxFuture<'static, bool> {
        let Some(index) = self.resolve_target(target) else {
            return future::ready(false).boxed_local();
        };
        let Some(track) = self.track(index) else {
            return future::ready(false).boxed_local();
        };

        let seq = {
            let mut s = self.state.borrow_mut();
            s.request_seq += 1;
            s.requested = Some(index);
            s.in_flight = Some(s.request_seq);
            s.request_seq
        };

        self.pause_others(index);
        if reset_to_start {
            track.seek_to(0.0);
        }

        let start = track.adapter().play();
        let this = Rc::clone(self);
        async move {
            let started = start.await;

            let superseded = {
                let mut s = this.state.borrow_mut();
                if s.in_flight == Some(seq) {
                    s.in_flight = None;
                }
                s.requested != Some(index)
            };

            if !started {
                log::debug!("track {index}: playback did not start");
                return false;
            }
            if superseded {
                // Started after the user moved on.
                track.adapter().pause();
                track.set_button_icon(ButtonIcon::Play);
                return false;
            }

            this.finish_activation(&track);
            true
        }
        .boxed_local()
    }

    fn finish_activation(&self, track: &Rc<TrackController>) {
        let index = track.index();
        {
            let mut s = self.state.borrow_mut();
            s.active_index = Some(index);
            s.linked = Rc::downgrade(track);
        }

        self.pause_others(index);
        track.set_button_icon(ButtonIcon::Pause);
        self.host.view.set_button_icon(ButtonIcon::Pause);

        let slug = track.record().slug();
        let current = self.host.location.fragment();
        if current.as_deref().map(|f| f.trim_start_matches('#')) != Some(slug.as_str()) {
            self.host.location.replace_fragment(&slug);
        }
        self.host.viewport.center_on(index);

        self.host.session.set_metadata(&track.media_metadata());
        self.host.session.set_playback_state(PlaybackState::Playing);
        log::info!("playing track {index} ({slug})");
    }

    /// Pause `index`. The transport stays attached to it.
    pub fn deactivate(&self, index: usize) {
        let Some(track) = self.track(index) else {
            return;
        };
        let is_active = {
            let mut s = self.state.borrow_mut();
            if s.requested == Some(index) {
                s.requested = None;
                s.in_flight = None;
                s.request_seq += 1;
            }
            s.active_index == Some(index)
        };

        track.adapter().pause();
        track.set_button_icon(ButtonIcon::Play);
        track.refresh();
        if is_active {
            self.host.view.set_button_icon(ButtonIcon::Play);
            self.host.session.set_playback_state(PlaybackState::Paused);
        }
    }

    /// Play/pause button of a track (`Some`) or of the footer (`None`).
    pub fn toggle(self: &Rc<Self>, target: Option<usize>) {
        let Some(index) = self.resolve_target(target) else {
            return;
        };
        let Some(track) = self.track(index) else {
            return;
        };
        let pending = {
            let s = self.state.borrow();
            s.in_flight.is_some() && s.requested == Some(index)
        };
        if track.adapter().is_playing() || pending {
            self.deactivate(index);
        } else {
            self.spawn(self.activate(Some(index), false));
        }
    }

    /// One past the current track, from the start. Does nothing at the last track.
    pub fn next(self: &Rc<Self>) -> LocalBoxFuture<'static, bool> {
        match self.resolve_target(None) {
            Some(current) if current + 1 < self.len() => self.activate(Some(current + 1), true),
            _ => future::ready(false).boxed_local(),
        }
    }

    /// One before the active track, from the start. Does nothing at the first track
    /// or without an active track.
    pub fn previous(self: &Rc<Self>) -> LocalBoxFuture<'static, bool> {
        match self.active_index() {
            Some(current) if current > 0 => self.activate(Some(current - 1), true),
            _ => future::ready(false).boxed_local(),
        }
    }

    fn linked(&self) -> Option<Rc<TrackController>> {
        self.state.borrow().linked.upgrade()
    }

    /// Relative seek on the active track; nothing without one.
    pub fn seek_by(&self, delta: f64) {
        if let Some(track) = self.linked() {
            track.seek_by(delta);
        }
    }

    pub fn seek_to(&self, seconds: f64) {
        if let Some(track) = self.linked() {
            track.seek_to(seconds);
        }
    }

    fn apply_volume(&self, volume: f64) {
        for track in self.tracks.borrow().iter() {
            track.adapter().set_volume(volume);
        }
    }

    /// Set the shared volume on every track. Clears mute.
    pub fn set_volume(&self, volume: f64) {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            0.0
        };
        {
            let mut s = self.state.borrow_mut();
            s.volume = volume;
            s.muted = false;
            if volume > 0.0 {
                s.previous_non_zero_volume = volume;
            }
        }
        self.apply_volume(volume);
        self.host.view.set_volume(volume);
        self.host.view.set_muted(false);
    }

    /// Step the volume from what is audible now.
    pub fn nudge_volume(&self, delta: f64) {
        let base = {
            let s = self.state.borrow();
            if s.muted { 0.0 } else { s.volume }
        };
        self.set_volume(base + delta);
    }

    pub fn toggle_mute(&self) {
        let muted = self.state.borrow().muted;
        if muted {
            let restore = {
                let mut s = self.state.borrow_mut();
                s.muted = false;
                s.volume = s.previous_non_zero_volume;
                s.volume
            };
            self.apply_volume(restore);
            self.host.view.set_volume(restore);
            self.host.view.set_muted(false);
        } else {
            {
                let mut s = self.state.borrow_mut();
                s.previous_non_zero_volume = if s.volume == 0.0 {
                    self.options.mute_restore_floor
                } else {
                    s.volume
                };
                s.muted = true;
            }
            self.apply_volume(0.0);
            self.host.view.set_volume(0.0);
            self.host.view.set_muted(true);
        }
    }

    /// Called by a track that played to its end.
    pub fn track_completed(self: &Rc<Self>, index: usize) {
        let was_active = self.active_index() == Some(index);
        if !was_active {
            return;
        }
        {
            let mut s = self.state.borrow_mut();
            s.active_index = None;
            s.linked = Weak::new();
        }
        self.host.view.set_button_icon(ButtonIcon::Play);
        self.host.session.set_playback_state(PlaybackState::Paused);

        if index + 1 < self.len() {
            self.spawn(self.activate(Some(index + 1), true));
        }
    }

    /// Called by a track whose seek parked it at the end.
    pub fn track_halted(&self, index: usize) {
        if self.active_index() == Some(index) {
            self.host.view.set_button_icon(ButtonIcon::Play);
            self.host.session.set_playback_state(PlaybackState::Paused);
        }
    }

    pub fn publish_position(&self, index: usize) {
        if self.active_index() != Some(index) {
            return;
        }
        if let Some(track) = self.track(index) {
            let adapter = track.adapter();
            self.host
                .session
                .set_position(adapter.current_time(), adapter.duration());
        }
    }

    /// Silence everything, e.g. before the process exits.
    pub fn pause_all(&self) {
        {
            let mut s = self.state.borrow_mut();
            s.requested = None;
            s.in_flight = None;
            s.request_seq += 1;
        }
        for track in self.tracks.borrow().iter() {
            track.adapter().pause();
            track.set_button_icon(ButtonIcon::Play);
        }
        self.host.view.set_button_icon(ButtonIcon::Play);
        self.host.session.set_playback_state(PlaybackState::Paused);
    }

    pub fn handle_command(self: &Rc<Self>, command: TransportCommand) {
        match command {
            TransportCommand::TogglePlay => self.toggle(None),
            TransportCommand::Next => self.spawn(self.next()),
            TransportCommand::Previous => self.spawn(self.previous()),
            TransportCommand::ToggleMute => self.toggle_mute(),
            TransportCommand::SeekBy(delta) => self.seek_by(delta),
            TransportCommand::VolumeBy(delta) => self.nudge_volume(delta),
        }
    }

    pub fn handle_media_action(self: &Rc<Self>, action: MediaAction) {
        log::debug!("media action {action:?}");
        match action {
            MediaAction::Play => {
                let playing = self
                    .linked()
                    .map(|t| t.adapter().is_playing())
                    .unwrap_or(false);
                if !playing {
                    self.spawn(self.activate(None, false));
                }
            }
            MediaAction::Pause => {
                if let Some(i) = self.active_index() {
                    self.deactivate(i);
                }
            }
            MediaAction::PlayPause => self.toggle(None),
            MediaAction::Stop => {
                if let Some(i) = self.active_index() {
                    self.deactivate(i);
                    self.seek_to(0.0);
                }
            }
            MediaAction::Next => self.spawn(self.next()),
            MediaAction::Previous => self.spawn(self.previous()),
            MediaAction::SeekForward(offset) => {
                self.seek_by(offset.unwrap_or(self.options.seek_small))
            }
            MediaAction::SeekBackward(offset) => {
                self.seek_by(-offset.unwrap_or(self.options.seek_small))
            }
            MediaAction::SeekTo(seconds) => self.seek_to(seconds),
        }
    }
}
