use std::cell::Cell;
use std::rc::{Rc, Weak};

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};

use crate::error::Result;

use super::adapter::{PlaybackAdapter, Subscribers};
use super::types::{ElementSignal, PlaybackEvent, SubscriptionId};

/// A platform player that streams one resource and reports its own progress.
pub trait MediaElement {
    /// Start or resume. Resolves once sound is actually starting.
    fn play(&self) -> LocalBoxFuture<'static, Result<()>>;
    fn pause(&self);
    fn is_paused(&self) -> bool;
    fn current_time(&self) -> f64;
    fn set_current_time(&self, seconds: f64);
    /// `None` until the headers were parsed.
    fn duration(&self) -> Option<f64>;
    fn volume(&self) -> f64;
    fn set_volume(&self, volume: f64);
    fn set_signal_handler(&self, handler: Rc<dyn Fn(ElementSignal)>);
}

/// Adapter over a [`MediaElement`]; mostly a pass-through.
pub struct NativeElementAdapter {
    inner: Rc<ElementInner>,
}

struct ElementInner {
    element: Rc<dyn MediaElement>,
    nominal_duration: f64,
    subscribers: Subscribers,
    /// Bumped by every pause so a start that resolves afterwards can tell.
    generation: Cell<u64>,
    ready_sent: Cell<bool>,
}

impl NativeElementAdapter {
    pub fn new(element: Rc<dyn MediaElement>, nominal_duration: f64) -> Self {
        let inner = Rc::new(ElementInner {
            element,
            nominal_duration,
            subscribers: Subscribers::new(),
            generation: Cell::new(0),
            ready_sent: Cell::new(false),
        });

        let weak: Weak<ElementInner> = Rc::downgrade(&inner);
        inner
            .element
            .set_signal_handler(Rc::new(move |signal| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_signal(signal);
                }
            }));

        Self { inner }
    }
}

impl ElementInner {
    fn on_signal(&self, signal: ElementSignal) {
        match signal {
            ElementSignal::TimeUpdate => self.subscribers.emit(PlaybackEvent::Progress),
            ElementSignal::Ended => self.subscribers.emit(PlaybackEvent::Completed),
            ElementSignal::LoadedMetadata => {
                if !self.ready_sent.replace(true) {
                    self.subscribers.emit(PlaybackEvent::Ready);
                }
            }
        }
    }
}

impl PlaybackAdapter for NativeElementAdapter {
    fn play(&self) -> LocalBoxFuture<'static, bool> {
        if !self.inner.element.is_paused() {
            return future::ready(true).boxed_local();
        }

        let duration = self.duration();
        if self.inner.element.current_time() >= duration {
            self.inner.element.set_current_time(0.0);
        }

        let inner = Rc::clone(&self.inner);
        let generation = inner.generation.get();
        let start = inner.element.play();
        async move {
            match start.await {
                Ok(()) if inner.generation.get() == generation => true,
                Ok(()) => {
                    // Paused while the start was pending.
                    inner.element.pause();
                    false
                }
                Err(e) => {
                    log::debug!("element play rejected: {e}");
                    false
                }
            }
        }
        .boxed_local()
    }

    fn pause(&self) {
        self.inner.generation.set(self.inner.generation.get() + 1);
        self.inner.element.pause();
    }

    fn is_playing(&self) -> bool {
        !self.inner.element.is_paused()
    }

    fn current_time(&self) -> f64 {
        self.inner.element.current_time()
    }

    fn set_current_time(&self, seconds: f64) {
        let seconds = if seconds.is_finite() { seconds } else { 0.0 };
        let duration = self.duration().max(0.0);
        let t = seconds.clamp(0.0, duration);
        if t >= duration && self.is_playing() {
            // Parked at the end: silent, and not a completion.
            self.pause();
        }
        self.inner.element.set_current_time(t);
    }

    fn duration(&self) -> f64 {
        match self.inner.element.duration() {
            Some(d) if d.is_finite() && d > 0.0 => d,
            _ => self.inner.nominal_duration,
        }
    }

    fn volume(&self) -> f64 {
        self.inner.element.volume()
    }

    fn set_volume(&self, volume: f64) {
        self.inner.element.set_volume(volume.clamp(0.0, 1.0));
    }

    fn subscribe(&self, event: PlaybackEvent, callback: Rc<dyn Fn()>) -> SubscriptionId {
        self.inner.subscribers.subscribe(event, callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscribers.unsubscribe(id)
    }
}
