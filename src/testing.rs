//! Test doubles for the audio backends and the host surfaces, plus a harness that
//! wires a transport to a handful of tracks.

use std::cell::{Cell, RefCell, RefMut};
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::executor::LocalPool;
use futures::future::{self, LocalBoxFuture};
use futures::task::LocalSpawn;
use ratatui::style::Color;

use crate::audio::{
    AudioGraph, BufferLoader, DecodedAudio, ElementSignal, MediaElement, NativeElementAdapter,
    PlaybackAdapter, Voice,
};
use crate::error::{PlayerError, Result};
use crate::host::{
    ButtonIcon, Location, MediaMetadata, MediaSession, PlaybackState, Scheduler, TrackView,
    TransportView, Viewport,
};
use crate::library::{Locator, TrackRecord};
use crate::track::{TrackController, TrackOptions};
use crate::transport::{TransportCoordinator, TransportHost, TransportOptions};
use crate::waveform::{BarGeometry, DrawSurface, Palette};

/// How a fake element answers `play()`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PlayMode {
    Immediate,
    /// Pending until [`FakeElement::resolve_play`] or [`FakeElement::reject_play`].
    Manual,
    Reject,
}

pub struct FakeElement {
    mode: Cell<PlayMode>,
    paused: Rc<Cell<bool>>,
    time: Cell<f64>,
    duration: Cell<Option<f64>>,
    volume: Cell<f64>,
    pending: RefCell<Vec<oneshot::Sender<Result<()>>>>,
    handler: RefCell<Option<Rc<dyn Fn(ElementSignal)>>>,
    pub play_calls: Cell<u32>,
    pub pause_calls: Cell<u32>,
}

impl FakeElement {
    pub fn new(duration: Option<f64>, mode: PlayMode) -> Rc<Self> {
        Rc::new(Self {
            mode: Cell::new(mode),
            paused: Rc::new(Cell::new(true)),
            time: Cell::new(0.0),
            duration: Cell::new(duration),
            volume: Cell::new(1.0),
            pending: RefCell::new(Vec::new()),
            handler: RefCell::new(None),
            play_calls: Cell::new(0),
            pause_calls: Cell::new(0),
        })
    }

    pub fn set_mode(&self, mode: PlayMode) {
        self.mode.set(mode);
    }

    pub fn resolve_play(&self) {
        for tx in self.pending.borrow_mut().drain(..) {
            let _ = tx.send(Ok(()));
        }
    }

    pub fn reject_play(&self) {
        for tx in self.pending.borrow_mut().drain(..) {
            let _ = tx.send(Err(PlayerError::PlayRejected("not allowed".into())));
        }
    }

    pub fn pending_plays(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn set_duration(&self, duration: Option<f64>) {
        self.duration.set(duration);
    }

    /// Move the playhead the way decoding would.
    pub fn set_time(&self, seconds: f64) {
        self.time.set(seconds);
    }

    pub fn signal(&self, signal: ElementSignal) {
        let handler = self.handler.borrow().clone();
        if let Some(h) = handler {
            h(signal);
        }
    }

    /// Run to the end: paused, rewound, then `Ended`.
    pub fn finish(&self) {
        self.paused.set(true);
        self.time.set(0.0);
        self.signal(ElementSignal::Ended);
    }
}

impl MediaElement for FakeElement {
    fn play(&self) -> LocalBoxFuture<'static, Result<()>> {
        self.play_calls.set(self.play_calls.get() + 1);
        match self.mode.get() {
            PlayMode::Immediate => {
                self.paused.set(false);
                future::ready(Ok(())).boxed_local()
            }
            PlayMode::Reject => {
                future::ready(Err(PlayerError::PlayRejected("not allowed".into()))).boxed_local()
            }
            PlayMode::Manual => {
                let (tx, rx) = oneshot::channel();
                self.pending.borrow_mut().push(tx);
                let paused = Rc::clone(&self.paused);
                async move {
                    let result = rx
                        .await
                        .unwrap_or_else(|_| Err(PlayerError::PlayRejected("dropped".into())));
                    if result.is_ok() {
                        paused.set(false);
                    }
                    result
                }
                .boxed_local()
            }
        }
    }

    fn pause(&self) {
        self.pause_calls.set(self.pause_calls.get() + 1);
        self.paused.set(true);
    }

    fn is_paused(&self) -> bool {
        self.paused.get()
    }

    fn current_time(&self) -> f64 {
        self.time.get()
    }

    fn set_current_time(&self, seconds: f64) {
        self.time.set(seconds);
    }

    fn duration(&self) -> Option<f64> {
        self.duration.get()
    }

    fn volume(&self) -> f64 {
        self.volume.get()
    }

    fn set_volume(&self, volume: f64) {
        self.volume.set(volume);
    }

    fn set_signal_handler(&self, handler: Rc<dyn Fn(ElementSignal)>) {
        *self.handler.borrow_mut() = Some(handler);
    }
}

#[derive(Debug)]
pub struct VoiceRecord {
    pub offset: f64,
    pub started_at: f64,
    pub gain: Cell<f64>,
    pub stopped: Cell<bool>,
}

struct FakeVoice(Rc<VoiceRecord>);

impl Voice for FakeVoice {
    fn set_gain(&self, gain: f64) {
        self.0.gain.set(gain);
    }

    fn stop(&self) {
        self.0.stopped.set(true);
    }
}

/// Output with a hand-driven clock.
pub struct FakeGraph {
    pub clock: Cell<f64>,
    pub suspended: Cell<bool>,
    pub resumes: Cell<u32>,
    pub fail_voices: Cell<bool>,
    pub voices: RefCell<Vec<Rc<VoiceRecord>>>,
}

impl FakeGraph {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            clock: Cell::new(0.0),
            suspended: Cell::new(true),
            resumes: Cell::new(0),
            fail_voices: Cell::new(false),
            voices: RefCell::new(Vec::new()),
        })
    }

    pub fn tick(&self, seconds: f64) {
        self.clock.set(self.clock.get() + seconds);
    }

    pub fn last_voice(&self) -> Option<Rc<VoiceRecord>> {
        self.voices.borrow().last().cloned()
    }

    pub fn sounding(&self) -> usize {
        self.voices
            .borrow()
            .iter()
            .filter(|v| !v.stopped.get())
            .count()
    }
}

impl AudioGraph for FakeGraph {
    fn now(&self) -> f64 {
        self.clock.get()
    }

    fn is_suspended(&self) -> bool {
        self.suspended.get()
    }

    fn resume(&self) {
        self.resumes.set(self.resumes.get() + 1);
        self.suspended.set(false);
    }

    fn start_voice(
        &self,
        _audio: &Rc<DecodedAudio>,
        offset: f64,
        gain: f64,
    ) -> Result<Box<dyn Voice>> {
        if self.fail_voices.get() {
            return Err(PlayerError::Output("no device".into()));
        }
        let record = Rc::new(VoiceRecord {
            offset,
            started_at: self.clock.get(),
            gain: Cell::new(gain),
            stopped: Cell::new(false),
        });
        self.voices.borrow_mut().push(Rc::clone(&record));
        Ok(Box::new(FakeVoice(record)))
    }
}

/// Loader that either answers at once or waits for [`FakeLoader::complete`].
pub struct FakeLoader {
    pub calls: Cell<u32>,
    immediate: RefCell<Option<Result<DecodedAudio>>>,
    pending: RefCell<Vec<oneshot::Sender<Result<DecodedAudio>>>>,
}

impl FakeLoader {
    pub fn immediate(audio: DecodedAudio) -> Rc<Self> {
        Rc::new(Self {
            calls: Cell::new(0),
            immediate: RefCell::new(Some(Ok(audio))),
            pending: RefCell::new(Vec::new()),
        })
    }

    pub fn failing() -> Rc<Self> {
        Rc::new(Self {
            calls: Cell::new(0),
            immediate: RefCell::new(Some(Err(PlayerError::Fetch {
                locator: "track.m4a".into(),
                reason: "404".into(),
            }))),
            pending: RefCell::new(Vec::new()),
        })
    }

    pub fn deferred() -> Rc<Self> {
        Rc::new(Self {
            calls: Cell::new(0),
            immediate: RefCell::new(None),
            pending: RefCell::new(Vec::new()),
        })
    }

    pub fn complete(&self, audio: DecodedAudio) {
        for tx in self.pending.borrow_mut().drain(..) {
            let _ = tx.send(Ok(audio.clone()));
        }
    }
}

impl BufferLoader for FakeLoader {
    fn load(&self, _locator: &Locator) -> LocalBoxFuture<'static, Result<DecodedAudio>> {
        self.calls.set(self.calls.get() + 1);
        if let Some(result) = self.immediate.borrow().as_ref() {
            let result = match result {
                Ok(audio) => Ok(audio.clone()),
                Err(e) => Err(PlayerError::Table(e.to_string())),
            };
            return future::ready(result).boxed_local();
        }
        let (tx, rx) = oneshot::channel();
        self.pending.borrow_mut().push(tx);
        async move {
            rx.await
                .unwrap_or_else(|_| Err(PlayerError::Table("loader dropped".into())))
        }
        .boxed_local()
    }
}

/// Silent mono PCM at 10 Hz.
pub fn pcm(duration: f64) -> DecodedAudio {
    DecodedAudio {
        samples: vec![0.0; (duration * 10.0).round() as usize],
        channels: 1,
        sample_rate: 10,
    }
}

#[derive(Default)]
pub struct TestSurface {
    pub width: u32,
    pub height: u32,
    pub rects: Vec<(u32, u32, u32, u32, Color)>,
}

impl DrawSurface for TestSurface {
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
        self.rects.clear();
    }
    fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: Color) {
        self.rects.push((x, y, w, h, color));
    }
}

pub struct RecordingTrackView {
    pub icon: Cell<ButtonIcon>,
    pub time: RefCell<String>,
    pub drawn: RefCell<TestSurface>,
}

impl RecordingTrackView {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            icon: Cell::new(ButtonIcon::Play),
            time: RefCell::new(String::new()),
            drawn: RefCell::new(TestSurface::default()),
        })
    }
}

impl TrackView for RecordingTrackView {
    fn set_button_icon(&self, icon: ButtonIcon) {
        self.icon.set(icon);
    }

    fn set_time_text(&self, text: &str) {
        *self.time.borrow_mut() = text.to_string();
    }

    fn surface(&self) -> RefMut<'_, dyn DrawSurface> {
        RefMut::map(self.drawn.borrow_mut(), |s| s as &mut dyn DrawSurface)
    }
}

pub struct FakeTransportView {
    pub icon: Cell<ButtonIcon>,
    pub volume: Cell<f64>,
    pub muted: Cell<bool>,
}

impl TransportView for FakeTransportView {
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

#[derive(Default)]
pub struct FakeLocation {
    pub fragment: RefCell<Option<String>>,
    pub replacements: Cell<u32>,
}

impl Location for FakeLocation {
    fn fragment(&self) -> Option<String> {
        self.fragment.borrow().clone()
    }
    fn replace_fragment(&self, slug: &str) {
        self.replacements.set(self.replacements.get() + 1);
        *self.fragment.borrow_mut() = Some(slug.to_string());
    }
}

#[derive(Default)]
pub struct FakeViewport {
    pub centered: RefCell<Vec<usize>>,
}

impl Viewport for FakeViewport {
    fn center_on(&self, index: usize) {
        self.centered.borrow_mut().push(index);
    }
}

#[derive(Default)]
pub struct FakeSession {
    pub metadata: RefCell<Option<MediaMetadata>>,
    pub states: RefCell<Vec<PlaybackState>>,
    pub positions: RefCell<Vec<(f64, f64)>>,
}

impl FakeSession {
    pub fn last_state(&self) -> Option<PlaybackState> {
        self.states.borrow().last().copied()
    }
}

impl MediaSession for FakeSession {
    fn set_metadata(&self, metadata: &MediaMetadata) {
        *self.metadata.borrow_mut() = Some(metadata.clone());
    }
    fn set_playback_state(&self, state: PlaybackState) {
        self.states.borrow_mut().push(state);
    }
    fn set_position(&self, position: f64, duration: f64) {
        self.positions.borrow_mut().push((position, duration));
    }
}

pub fn record(index: usize, duration: f64) -> TrackRecord {
    TrackRecord {
        file_reference: format!("Track {index}.m4a"),
        artist: "Artist".into(),
        title: format!("Title {index}"),
        date: "2020".into(),
        genre: "Ambient".into(),
        nominal_duration: duration,
        amplitude: vec![0.2, 0.8, 0.5, 1.0],
        ..Default::default()
    }
}

pub fn track_options() -> TrackOptions {
    TrackOptions {
        palette: Palette::default(),
        geometry: BarGeometry {
            bar_width: 1,
            spacing: 1,
        },
        resize_debounce: Duration::from_millis(150),
    }
}

pub fn transport_options() -> TransportOptions {
    TransportOptions {
        initial_volume: 0.8,
        mute_restore_floor: 0.1,
        seek_small: 5.0,
        seek_large: 30.0,
        volume_step: 0.05,
    }
}

/// A transport with one element-backed track per duration.
pub struct Harness {
    pub pool: LocalPool,
    pub t0: Instant,
    pub scheduler: Rc<Scheduler>,
    pub transport: Rc<TransportCoordinator>,
    pub tracks: Vec<Rc<TrackController>>,
    pub elements: Vec<Rc<FakeElement>>,
    pub views: Vec<Rc<RecordingTrackView>>,
    pub transport_view: Rc<FakeTransportView>,
    pub location: Rc<FakeLocation>,
    pub viewport: Rc<FakeViewport>,
    pub session: Rc<FakeSession>,
}

impl Harness {
    pub fn new(durations: &[f64], mode: PlayMode) -> Self {
        let pool = LocalPool::new();
        let spawner: Rc<dyn LocalSpawn> = Rc::new(pool.spawner());
        let t0 = Instant::now();
        let scheduler = Rc::new(Scheduler::new(t0));

        let transport_view = Rc::new(FakeTransportView {
            icon: Cell::new(ButtonIcon::Play),
            volume: Cell::new(-1.0),
            muted: Cell::new(false),
        });
        let location = Rc::new(FakeLocation::default());
        let viewport = Rc::new(FakeViewport::default());
        let session = Rc::new(FakeSession::default());

        let transport = TransportCoordinator::new(
            TransportHost {
                view: transport_view.clone(),
                location: location.clone(),
                viewport: viewport.clone(),
                session: session.clone(),
            },
            transport_options(),
            spawner,
        );

        let mut tracks = Vec::new();
        let mut elements = Vec::new();
        let mut views = Vec::new();
        for (i, &d) in durations.iter().enumerate() {
            let element = FakeElement::new(Some(d), mode);
            let adapter: Rc<dyn PlaybackAdapter> =
                Rc::new(NativeElementAdapter::new(element.clone(), d));
            let view = RecordingTrackView::new();
            let weak: Weak<TransportCoordinator> = Rc::downgrade(&transport);
            tracks.push(TrackController::new(
                i,
                Rc::new(record(i, d)),
                adapter,
                view.clone(),
                Rc::clone(&scheduler),
                weak,
                track_options(),
            ));
            elements.push(element);
            views.push(view);
        }
        transport.attach(tracks.clone());

        Self {
            pool,
            t0,
            scheduler,
            transport,
            tracks,
            elements,
            views,
            transport_view,
            location,
            viewport,
            session,
        }
    }

    /// Drive spawned tasks until nothing can make progress.
    pub fn run(&mut self) {
        self.pool.run_until_stalled();
    }

    pub fn advance(&self, ms: u64) {
        let now = self.scheduler.now() + Duration::from_millis(ms);
        self.scheduler.advance(now);
    }

    pub fn playing(&self) -> Vec<usize> {
        self.tracks
            .iter()
            .filter(|t| t.adapter().is_playing())
            .map(|t| t.index())
            .collect()
    }

    pub fn icons(&self) -> Vec<ButtonIcon> {
        self.views.iter().map(|v| v.icon.get()).collect()
    }
}
