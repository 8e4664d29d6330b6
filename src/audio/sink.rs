//! rodio-backed implementations of the playback host traits.
//!
//! `RodioGraph` owns the single output stream (opened lazily, shared by every
//! track). `SinkElement` streams a local file through its own `Sink`, and
//! `ThreadedLoader` fetches and decodes whole files off the UI thread.

use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::rc::{Rc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{self, LocalBoxFuture};
use rodio::buffer::SamplesBuffer;
use rodio::mixer::Mixer;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};

use crate::error::{PlayerError, Result};
use crate::host::{Scheduler, TaskId};
use crate::library::Locator;

use super::buffer::{AudioGraph, BufferLoader, Voice};
use super::decode::{DecodedAudio, decode_bytes};
use super::element::MediaElement;
use super::types::ElementSignal;

/// The shared audio output.
///
/// Starts out suspended; the first `resume` opens the device.
pub struct RodioGraph {
    stream: RefCell<Option<OutputStream>>,
    epoch: Instant,
    suspended: Cell<bool>,
}

impl Default for RodioGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl RodioGraph {
    pub fn new() -> Self {
        Self {
            stream: RefCell::new(None),
            epoch: Instant::now(),
            suspended: Cell::new(true),
        }
    }

    fn with_mixer<T>(&self, f: impl FnOnce(&Mixer) -> T) -> Result<T> {
        let mut slot = self.stream.borrow_mut();
        if slot.is_none() {
            let mut stream = OutputStreamBuilder::open_default_stream()
                .map_err(|e| PlayerError::Output(e.to_string()))?;
            // rodio logs to stderr when the stream is dropped; that would land on the TUI.
            stream.log_on_drop(false);
            *slot = Some(stream);
        }
        match slot.as_ref() {
            Some(stream) => Ok(f(stream.mixer())),
            None => Err(PlayerError::Output("output stream closed".to_string())),
        }
    }
}

struct SinkVoice {
    sink: Sink,
}

impl Voice for SinkVoice {
    fn set_gain(&self, gain: f64) {
        self.sink.set_volume(gain as f32);
    }

    fn stop(&self) {
        self.sink.stop();
    }
}

impl AudioGraph for RodioGraph {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn is_suspended(&self) -> bool {
        self.suspended.get()
    }

    fn resume(&self) {
        match self.with_mixer(|_| ()) {
            Ok(()) => self.suspended.set(false),
            Err(e) => log::warn!("{e}"),
        }
    }

    fn start_voice(
        &self,
        audio: &Rc<DecodedAudio>,
        offset: f64,
        gain: f64,
    ) -> Result<Box<dyn Voice>> {
        let data = audio.samples_from(offset);
        let source = SamplesBuffer::new(audio.channels, audio.sample_rate, data);
        let sink = self.with_mixer(Sink::connect_new)?;
        sink.set_volume(gain as f32);
        sink.append(source);
        sink.play();
        Ok(Box::new(SinkVoice { sink }))
    }
}

/// A local file streamed through its own `Sink`, reporting progress on an interval.
pub struct SinkElement {
    inner: Rc<SinkInner>,
}

struct SinkInner {
    path: PathBuf,
    output: Rc<RodioGraph>,
    scheduler: Rc<Scheduler>,
    interval: Duration,
    sink: RefCell<Option<Sink>>,
    /// File position the current sink started at.
    base: Cell<f64>,
    /// Position while there is no sink.
    position: Cell<f64>,
    duration: Cell<Option<f64>>,
    volume: Cell<f64>,
    paused: Cell<bool>,
    ticker: Cell<Option<TaskId>>,
    handler: RefCell<Option<Rc<dyn Fn(ElementSignal)>>>,
}

impl SinkElement {
    /// The duration probe runs on the next scheduler pass so the signal handler is in place.
    pub fn new(
        path: PathBuf,
        output: Rc<RodioGraph>,
        scheduler: Rc<Scheduler>,
        interval: Duration,
    ) -> Self {
        let inner = Rc::new(SinkInner {
            path,
            output,
            scheduler: Rc::clone(&scheduler),
            interval,
            sink: RefCell::new(None),
            base: Cell::new(0.0),
            position: Cell::new(0.0),
            duration: Cell::new(None),
            volume: Cell::new(1.0),
            paused: Cell::new(true),
            ticker: Cell::new(None),
            handler: RefCell::new(None),
        });

        let weak = Rc::downgrade(&inner);
        scheduler.set_timeout(
            Duration::ZERO,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.probe_duration();
                }
            }),
        );

        Self { inner }
    }
}

impl SinkInner {
    fn signal(&self, signal: ElementSignal) {
        let handler = self.handler.borrow().clone();
        if let Some(h) = handler {
            h(signal);
        }
    }

    fn probe_duration(&self) {
        if self.duration.get().is_some() {
            return;
        }
        match lofty::read_from_path(&self.path) {
            Ok(tagged) => {
                use lofty::prelude::AudioFile;
                let d = tagged.properties().duration().as_secs_f64();
                if d > 0.0 {
                    self.duration.set(Some(d));
                    self.signal(ElementSignal::LoadedMetadata);
                }
            }
            Err(e) => log::debug!("{}: no duration from headers: {e}", self.path.display()),
        }
    }

    /// A paused sink positioned at `start` seconds.
    fn open_at(&self, start: f64) -> Result<Sink> {
        let file = File::open(&self.path)?;
        let source = Decoder::new(BufReader::new(file))
            .map_err(|e| PlayerError::PlayRejected(format!("{}: {e}", self.path.display())))?;

        if self.duration.get().is_none() {
            if let Some(d) = source.total_duration() {
                self.duration.set(Some(d.as_secs_f64()));
                self.signal(ElementSignal::LoadedMetadata);
            }
        }

        // `skip_duration` is the seeking primitive; zero is fine.
        let source = source.skip_duration(Duration::from_secs_f64(start.max(0.0)));
        let sink = self.output.with_mixer(Sink::connect_new)?;
        sink.set_volume(self.volume.get() as f32);
        sink.pause();
        sink.append(source);
        self.base.set(start);
        Ok(sink)
    }

    fn position(&self) -> f64 {
        match self.sink.borrow().as_ref() {
            Some(sink) => self.base.get() + sink.get_pos().as_secs_f64(),
            None => self.position.get(),
        }
    }

    fn start_ticker(self: &Rc<Self>) {
        if self.ticker.get().is_some() {
            return;
        }
        let weak: Weak<SinkInner> = Rc::downgrade(self);
        let id = self.scheduler.set_interval(
            self.interval,
            Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.tick();
                }
            }),
        );
        self.ticker.set(Some(id));
    }

    fn stop_ticker(&self) {
        if let Some(id) = self.ticker.take() {
            self.scheduler.cancel(id);
        }
    }

    fn tick(&self) {
        let ended = self
            .sink
            .borrow()
            .as_ref()
            .map(|s| s.empty())
            .unwrap_or(true);

        if ended && !self.paused.get() {
            self.sink.borrow_mut().take();
            self.position.set(0.0);
            self.paused.set(true);
            self.stop_ticker();
            self.signal(ElementSignal::Ended);
        } else {
            self.signal(ElementSignal::TimeUpdate);
        }
    }

    fn at_end(&self, seconds: f64) -> bool {
        self.duration.get().is_some_and(|d| seconds >= d)
    }

    fn start(self: &Rc<Self>) -> Result<()> {
        if self.at_end(self.position()) {
            // Parked at the end: play from the top.
            if let Some(old) = self.sink.borrow_mut().take() {
                old.stop();
            }
            self.position.set(0.0);
        }
        if self.sink.borrow().is_none() {
            let sink = self.open_at(self.position.get())?;
            *self.sink.borrow_mut() = Some(sink);
        }
        if let Some(sink) = self.sink.borrow().as_ref() {
            sink.play();
        }
        self.paused.set(false);
        self.start_ticker();
        Ok(())
    }
}

impl MediaElement for SinkElement {
    fn play(&self) -> LocalBoxFuture<'static, Result<()>> {
        let result = if self.inner.paused.get() {
            self.inner.start()
        } else {
            Ok(())
        };
        future::ready(result).boxed_local()
    }

    fn pause(&self) {
        let inner = &self.inner;
        let pos = inner.position();
        if let Some(sink) = inner.sink.borrow().as_ref() {
            sink.pause();
        }
        inner.position.set(pos);
        inner.paused.set(true);
        inner.stop_ticker();
    }

    fn is_paused(&self) -> bool {
        self.inner.paused.get()
    }

    fn current_time(&self) -> f64 {
        self.inner.position()
    }

    fn set_current_time(&self, seconds: f64) {
        let inner = &self.inner;
        inner.position.set(seconds);
        if inner.at_end(seconds) {
            // An empty sink would read as a natural end; park silently instead.
            if let Some(old) = inner.sink.borrow_mut().take() {
                old.stop();
            }
            inner.paused.set(true);
            inner.stop_ticker();
            return;
        }
        let Some(old) = inner.sink.borrow_mut().take() else {
            return;
        };
        old.stop();

        match inner.open_at(seconds) {
            Ok(sink) => {
                if !inner.paused.get() {
                    sink.play();
                }
                *inner.sink.borrow_mut() = Some(sink);
            }
            Err(e) => {
                log::warn!("{}: seek failed: {e}", inner.path.display());
                inner.paused.set(true);
                inner.stop_ticker();
            }
        }
    }

    fn duration(&self) -> Option<f64> {
        self.inner.duration.get()
    }

    fn volume(&self) -> f64 {
        self.inner.volume.get()
    }

    fn set_volume(&self, volume: f64) {
        self.inner.volume.set(volume);
        if let Some(sink) = self.inner.sink.borrow().as_ref() {
            sink.set_volume(volume as f32);
        }
    }

    fn set_signal_handler(&self, handler: Rc<dyn Fn(ElementSignal)>) {
        *self.inner.handler.borrow_mut() = Some(handler);
    }
}

impl Drop for SinkElement {
    fn drop(&mut self) {
        self.inner.stop_ticker();
        if let Some(sink) = self.inner.sink.borrow_mut().take() {
            sink.stop();
        }
    }
}

/// Fetches over http(s) or reads from disk, then decodes, on a worker thread.
#[derive(Debug, Default)]
pub struct ThreadedLoader;

impl BufferLoader for ThreadedLoader {
    fn load(&self, locator: &Locator) -> LocalBoxFuture<'static, Result<DecodedAudio>> {
        let (tx, rx) = oneshot::channel();
        let locator = locator.clone();
        let label = locator.to_string();

        let spawned = thread::Builder::new()
            .name("wavedeck-decode".to_string())
            .spawn(move || {
                let result = fetch_bytes(&locator).and_then(|bytes| {
                    decode_bytes(bytes, locator.extension().as_deref(), &locator.to_string())
                });
                let _ = tx.send(result);
            });

        if let Err(e) = spawned {
            return future::ready(Err(PlayerError::Io(e))).boxed_local();
        }

        async move {
            rx.await.unwrap_or_else(|_| {
                Err(PlayerError::Fetch {
                    locator: label,
                    reason: "decode worker exited".to_string(),
                })
            })
        }
        .boxed_local()
    }
}

fn fetch_bytes(locator: &Locator) -> Result<Vec<u8>> {
    match locator {
        Locator::Path(path) => Ok(std::fs::read(path)?),
        Locator::Url(url) => {
            let fetch_err = |reason: String| PlayerError::Fetch {
                locator: url.to_string(),
                reason,
            };
            let response = ureq::get(url.as_str())
                .call()
                .map_err(|e| fetch_err(e.to_string()))?;
            let mut bytes = Vec::new();
            response
                .into_body()
                .into_reader()
                .read_to_end(&mut bytes)
                .map_err(|e| fetch_err(e.to_string()))?;
            Ok(bytes)
        }
        Locator::Unresolved(reference) => Err(PlayerError::Fetch {
            locator: reference.clone(),
            reason: "unresolvable file reference".into(),
        }),
    }
}
