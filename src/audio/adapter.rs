use std::cell::{Cell, RefCell};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use futures::future::LocalBoxFuture;

use super::types::{PlaybackEvent, SubscriptionId};

/// Uniform playback capability over both backends.
///
/// `play` resolves to `false` when playback did not start; callers must not touch
/// play/pause UI before it resolves.
pub trait PlaybackAdapter {
    fn play(&self) -> LocalBoxFuture<'static, bool>;
    /// Stop sound and keep the position. Idempotent.
    fn pause(&self);
    fn is_playing(&self) -> bool;
    fn current_time(&self) -> f64;
    /// Seek. A playing adapter keeps playing from the new position.
    fn set_current_time(&self, seconds: f64);
    /// Decoded duration when known, otherwise the nominal one from the table.
    fn duration(&self) -> f64;
    fn volume(&self) -> f64;
    fn set_volume(&self, volume: f64);
    fn subscribe(&self, event: PlaybackEvent, callback: Rc<dyn Fn()>) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// Per-adapter subscriber list.
///
/// `emit` dispatches on a snapshot, so callbacks may subscribe or unsubscribe while
/// being called, and a panicking callback is logged without stopping the others.
#[derive(Default)]
pub struct Subscribers {
    next_id: Cell<SubscriptionId>,
    entries: RefCell<Vec<(SubscriptionId, PlaybackEvent, Rc<dyn Fn()>)>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, event: PlaybackEvent, callback: Rc<dyn Fn()>) -> SubscriptionId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.entries.borrow_mut().push((id, event, callback));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(sid, _, _)| *sid != id);
        entries.len() != before
    }

    pub fn emit(&self, event: PlaybackEvent) {
        let targets: Vec<Rc<dyn Fn()>> = self
            .entries
            .borrow()
            .iter()
            .filter(|(_, e, _)| *e == event)
            .map(|(_, _, cb)| Rc::clone(cb))
            .collect();

        for cb in targets {
            if catch_unwind(AssertUnwindSafe(|| cb())).is_err() {
                log::error!("{event:?} subscriber panicked; continuing dispatch");
            }
        }
    }
}
