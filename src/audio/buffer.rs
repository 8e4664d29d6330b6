use std::cell::RefCell;
use std::rc::{Rc, Weak};

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture, Shared};
use futures::task::{LocalSpawn, LocalSpawnExt};

use crate::error::Result;
use crate::host::{Scheduler, TaskId};
use crate::library::Locator;

use super::adapter::{PlaybackAdapter, Subscribers};
use super::decode::DecodedAudio;
use super::types::{PlaybackEvent, SubscriptionId};

/// The process-wide output every decoded-buffer track plays through.
pub trait AudioGraph {
    /// Monotonic clock in seconds.
    fn now(&self) -> f64;
    fn is_suspended(&self) -> bool;
    /// Must be called from the user's input path, before anything is awaited.
    fn resume(&self);
    /// Start a one-shot voice playing `audio` from `offset` seconds at `gain`.
    fn start_voice(&self, audio: &Rc<DecodedAudio>, offset: f64, gain: f64)
    -> Result<Box<dyn Voice>>;
}

/// One started playback. Cannot be restarted or repositioned.
pub trait Voice {
    fn set_gain(&self, gain: f64);
    fn stop(&self);
}

/// Fetches and decodes a whole resource.
pub trait BufferLoader {
    fn load(&self, locator: &Locator) -> LocalBoxFuture<'static, Result<DecodedAudio>>;
}

type DecodeFuture = Shared<LocalBoxFuture<'static, Option<Rc<DecodedAudio>>>>;

enum DecodeState {
    Idle,
    Pending(DecodeFuture),
    Ready(Rc<DecodedAudio>),
    Failed,
}

struct BufferState {
    playing: bool,
    /// Position while paused; position at `start_clock` while playing.
    offset: f64,
    start_clock: f64,
    volume: f64,
    /// Bumped by every pause so a start that resolves afterwards can tell.
    generation: u64,
    decode: DecodeState,
    voice: Option<Box<dyn Voice>>,
    frame: Option<TaskId>,
    ready_sent: bool,
}

struct BufferInner {
    locator: Locator,
    nominal_duration: f64,
    graph: Rc<dyn AudioGraph>,
    loader: Rc<dyn BufferLoader>,
    scheduler: Rc<Scheduler>,
    spawner: Rc<dyn LocalSpawn>,
    subscribers: Subscribers,
    state: RefCell<BufferState>,
}

/// Adapter that decodes the whole track and plays it through the shared graph.
///
/// Decoding is deferred to the first play or seek. Position is derived from the
/// graph clock while playing, and progress is synthesised once per frame.
pub struct DecodedBufferAdapter {
    inner: Rc<BufferInner>,
}

impl DecodedBufferAdapter {
    pub fn new(
        locator: Locator,
        nominal_duration: f64,
        graph: Rc<dyn AudioGraph>,
        loader: Rc<dyn BufferLoader>,
        scheduler: Rc<Scheduler>,
        spawner: Rc<dyn LocalSpawn>,
    ) -> Self {
        Self {
            inner: Rc::new(BufferInner {
                locator,
                nominal_duration,
                graph,
                loader,
                scheduler,
                spawner,
                subscribers: Subscribers::new(),
                state: RefCell::new(BufferState {
                    playing: false,
                    offset: 0.0,
                    start_clock: 0.0,
                    volume: 1.0,
                    generation: 0,
                    decode: DecodeState::Idle,
                    voice: None,
                    frame: None,
                    ready_sent: false,
                }),
            }),
        }
    }
}

impl BufferInner {
    fn duration_of(&self, state: &BufferState) -> f64 {
        match &state.decode {
            DecodeState::Ready(audio) => audio.duration_secs(),
            _ => self.nominal_duration,
        }
    }

    fn position_of(&self, state: &BufferState) -> f64 {
        if state.playing {
            let elapsed = (self.graph.now() - state.start_clock).max(0.0);
            (state.offset + elapsed).min(self.duration_of(state))
        } else {
            state.offset
        }
    }

    /// The decode result, starting the fetch if nothing has asked yet.
    fn decoded(self: &Rc<Self>) -> LocalBoxFuture<'static, Option<Rc<DecodedAudio>>> {
        let mut state = self.state.borrow_mut();
        match &state.decode {
            DecodeState::Ready(audio) => return future::ready(Some(Rc::clone(audio))).boxed_local(),
            DecodeState::Failed => return future::ready(None).boxed_local(),
            DecodeState::Pending(shared) => return shared.clone().boxed_local(),
            DecodeState::Idle => {}
        }

        let weak: Weak<BufferInner> = Rc::downgrade(self);
        let load = self.loader.load(&self.locator);
        let shared = async move {
            let result = load.await;
            let inner = weak.upgrade()?;
            inner.finish_decode(result)
        }
        .boxed_local()
        .shared();

        state.decode = DecodeState::Pending(shared.clone());
        shared.boxed_local()
    }

    fn finish_decode(&self, result: Result<DecodedAudio>) -> Option<Rc<DecodedAudio>> {
        match result {
            Ok(audio) => {
                let audio = Rc::new(audio);
                let first = {
                    let mut state = self.state.borrow_mut();
                    state.decode = DecodeState::Ready(Rc::clone(&audio));
                    !std::mem::replace(&mut state.ready_sent, true)
                };
                log::debug!(
                    "{}: decoded {:.1}s of audio",
                    self.locator,
                    audio.duration_secs()
                );
                if first {
                    self.subscribers.emit(PlaybackEvent::Ready);
                }
                Some(audio)
            }
            Err(e) => {
                log::warn!("{}: {e}", self.locator);
                self.state.borrow_mut().decode = DecodeState::Failed;
                None
            }
        }
    }

    /// Start a voice at the stored offset. The caller checked that nothing plays.
    fn start(self: &Rc<Self>, audio: &Rc<DecodedAudio>) -> bool {
        let (offset, volume) = {
            let state = self.state.borrow();
            (state.offset, state.volume)
        };
        let offset = if offset >= audio.duration_secs() { 0.0 } else { offset };

        match self.graph.start_voice(audio, offset, volume) {
            Ok(voice) => {
                {
                    let mut state = self.state.borrow_mut();
                    state.voice = Some(voice);
                    state.offset = offset;
                    state.start_clock = self.graph.now();
                    state.playing = true;
                }
                self.schedule_frame();
                true
            }
            Err(e) => {
                log::warn!("{}: could not start voice: {e}", self.locator);
                false
            }
        }
    }

    fn schedule_frame(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        let id = self.scheduler.request_frame(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_frame();
            }
        }));
        let old = self.state.borrow_mut().frame.replace(id);
        if let Some(old) = old {
            self.scheduler.cancel(old);
        }
    }

    fn cancel_frame(&self) {
        let frame = self.state.borrow_mut().frame.take();
        if let Some(id) = frame {
            self.scheduler.cancel(id);
        }
    }

    fn on_frame(self: &Rc<Self>) {
        let ended = {
            let mut state = self.state.borrow_mut();
            state.frame = None;
            if !state.playing {
                return;
            }
            let duration = self.duration_of(&state);
            if self.position_of(&state) >= duration {
                state.playing = false;
                state.offset = 0.0;
                if let Some(voice) = state.voice.take() {
                    voice.stop();
                }
                true
            } else {
                false
            }
        };

        if ended {
            self.subscribers.emit(PlaybackEvent::Completed);
            return;
        }

        self.subscribers.emit(PlaybackEvent::Progress);
        let still_playing = {
            let state = self.state.borrow();
            state.playing && state.frame.is_none()
        };
        if still_playing {
            self.schedule_frame();
        }
    }

    /// Stop the voice and keep the position. Leaves `generation` alone.
    fn halt(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.playing {
                state.offset = self.position_of(&state);
                state.playing = false;
            }
            if let Some(voice) = state.voice.take() {
                voice.stop();
            }
        }
        self.cancel_frame();
    }
}

impl PlaybackAdapter for DecodedBufferAdapter {
    fn play(&self) -> LocalBoxFuture<'static, bool> {
        let inner = Rc::clone(&self.inner);
        if inner.graph.is_suspended() {
            inner.graph.resume();
        }
        if inner.state.borrow().playing {
            return future::ready(true).boxed_local();
        }

        let generation = inner.state.borrow().generation;
        let decoded = inner.decoded();
        async move {
            let Some(audio) = decoded.await else {
                return false;
            };
            {
                let state = inner.state.borrow();
                if state.playing {
                    return true;
                }
                if state.generation != generation {
                    return false;
                }
            }
            inner.start(&audio)
        }
        .boxed_local()
    }

    fn pause(&self) {
        {
            let mut state = self.inner.state.borrow_mut();
            state.generation += 1;
        }
        self.inner.halt();
    }

    fn is_playing(&self) -> bool {
        self.inner.state.borrow().playing
    }

    fn current_time(&self) -> f64 {
        let state = self.inner.state.borrow();
        self.inner.position_of(&state)
    }

    fn set_current_time(&self, seconds: f64) {
        let inner = &self.inner;
        let seconds = if seconds.is_finite() { seconds } else { 0.0 };
        let (playing, duration, audio) = {
            let state = inner.state.borrow();
            let audio = match &state.decode {
                DecodeState::Ready(a) => Some(Rc::clone(a)),
                _ => None,
            };
            (state.playing, inner.duration_of(&state), audio)
        };
        let target = seconds.clamp(0.0, duration.max(0.0));

        match (playing, audio) {
            (true, Some(audio)) => {
                inner.halt();
                inner.state.borrow_mut().offset = target;
                if target >= duration {
                    // Parked at the end: no sound and no completion.
                    return;
                }
                inner.start(&audio);
            }
            _ => {
                let idle = {
                    let mut state = inner.state.borrow_mut();
                    state.offset = target;
                    matches!(state.decode, DecodeState::Idle)
                };
                if idle {
                    let decode = inner.decoded().map(|_| ());
                    if let Err(e) = inner.spawner.spawn_local(decode) {
                        log::warn!("{}: could not schedule decode: {e}", inner.locator);
                    }
                }
            }
        }
    }

    fn duration(&self) -> f64 {
        let state = self.inner.state.borrow();
        self.inner.duration_of(&state)
    }

    fn volume(&self) -> f64 {
        self.inner.state.borrow().volume
    }

    fn set_volume(&self, volume: f64) {
        let volume = volume.clamp(0.0, 1.0);
        let mut state = self.inner.state.borrow_mut();
        state.volume = volume;
        if let Some(voice) = &state.voice {
            voice.set_gain(volume);
        }
    }

    fn subscribe(&self, event: PlaybackEvent, callback: Rc<dyn Fn()>) -> SubscriptionId {
        self.inner.subscribers.subscribe(event, callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscribers.unsubscribe(id)
    }
}

impl Drop for DecodedBufferAdapter {
    fn drop(&mut self) {
        self.inner.halt();
    }
}
