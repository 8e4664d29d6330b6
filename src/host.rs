//! Surfaces the playback core drives but does not own: per-track views, the footer,
//! the deep link, the scroll position and the OS media session. Also the
//! single-threaded timer/frame scheduler everything periodic runs on.

use std::cell::{Cell, RefCell, RefMut};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::waveform::DrawSurface;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ButtonIcon {
    Play,
    Pause,
}

/// One track's widgets.
pub trait TrackView {
    fn set_button_icon(&self, icon: ButtonIcon);
    fn set_time_text(&self, text: &str);
    fn surface(&self) -> RefMut<'_, dyn DrawSurface>;
}

/// The global transport widgets.
pub trait TransportView {
    fn set_button_icon(&self, icon: ButtonIcon);
    fn set_volume(&self, volume: f64);
    fn set_muted(&self, muted: bool);
}

/// Fragment part of the page address.
pub trait Location {
    fn fragment(&self) -> Option<String>;
    fn replace_fragment(&self, slug: &str);
}

pub trait Viewport {
    /// Scroll so the track at `index` sits in the vertical centre.
    fn center_on(&self, index: usize);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaMetadata {
    pub index: usize,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Base64 encoded cover image.
    pub artwork: Option<String>,
    pub duration: f64,
}

/// OS level "now playing" integration.
pub trait MediaSession {
    fn set_metadata(&self, metadata: &MediaMetadata);
    fn set_playback_state(&self, state: PlaybackState);
    fn set_position(&self, position: f64, duration: f64);
}

pub type TaskId = u64;

enum TaskCallback {
    Once(Box<dyn FnOnce()>),
    Repeat(Rc<dyn Fn()>),
}

struct Timer {
    id: TaskId,
    due: Instant,
    period: Option<Duration>,
    callback: TaskCallback,
}

/// Timeouts, intervals and animation frames for the UI thread.
///
/// Nothing runs on its own: the event loop calls [`Scheduler::advance`] with the
/// current time and [`Scheduler::run_frame`] once per drawn frame. Callbacks run with
/// no internal borrow held, so they may schedule or cancel freely.
pub struct Scheduler {
    now: Cell<Instant>,
    next_id: Cell<TaskId>,
    timers: RefCell<Vec<Timer>>,
    frames: RefCell<Vec<(TaskId, Box<dyn FnOnce()>)>>,
}

impl Scheduler {
    pub fn new(now: Instant) -> Self {
        Self {
            now: Cell::new(now),
            next_id: Cell::new(1),
            timers: RefCell::new(Vec::new()),
            frames: RefCell::new(Vec::new()),
        }
    }

    fn alloc_id(&self) -> TaskId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// Time of the last [`advance`](Self::advance).
    pub fn now(&self) -> Instant {
        self.now.get()
    }

    pub fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TaskId {
        let id = self.alloc_id();
        self.timers.borrow_mut().push(Timer {
            id,
            due: self.now.get() + delay,
            period: None,
            callback: TaskCallback::Once(callback),
        });
        id
    }

    pub fn set_interval(&self, period: Duration, callback: Rc<dyn Fn()>) -> TaskId {
        let id = self.alloc_id();
        self.timers.borrow_mut().push(Timer {
            id,
            due: self.now.get() + period,
            period: Some(period),
            callback: TaskCallback::Repeat(callback),
        });
        id
    }

    /// Run `callback` on the next frame.
    pub fn request_frame(&self, callback: Box<dyn FnOnce()>) -> TaskId {
        let id = self.alloc_id();
        self.frames.borrow_mut().push((id, callback));
        id
    }

    /// Cancel a timeout, interval or frame. Unknown ids are ignored.
    pub fn cancel(&self, id: TaskId) {
        self.timers.borrow_mut().retain(|t| t.id != id);
        self.frames.borrow_mut().retain(|(fid, _)| *fid != id);
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Fire every timer due at `now`, earliest first.
    ///
    /// Each interval fires at most once per call; timers added by callbacks wait
    /// for the next call.
    pub fn advance(&self, now: Instant) {
        self.now.set(now);

        let mut due: Vec<(Instant, TaskId)> = self
            .timers
            .borrow()
            .iter()
            .filter(|t| t.due <= now)
            .map(|t| (t.due, t.id))
            .collect();
        due.sort();

        for (_, id) in due {
            let callback = {
                let mut timers = self.timers.borrow_mut();
                let Some(pos) = timers.iter().position(|t| t.id == id) else {
                    continue;
                };
                let period = timers[pos].period;
                match period {
                    Some(period) => {
                        let timer = &mut timers[pos];
                        timer.due += period;
                        if timer.due <= now {
                            timer.due = now + period;
                        }
                        match &timer.callback {
                            TaskCallback::Repeat(cb) => Some(TaskCallback::Repeat(Rc::clone(cb))),
                            TaskCallback::Once(_) => None,
                        }
                    }
                    None => Some(timers.remove(pos).callback),
                }
            };
            match callback {
                Some(TaskCallback::Once(cb)) => cb(),
                Some(TaskCallback::Repeat(cb)) => cb(),
                None => {}
            }
        }
    }

    /// Run the frame callbacks queued before this call.
    pub fn run_frame(&self) {
        let frames = std::mem::take(&mut *self.frames.borrow_mut());
        for (_, callback) in frames {
            callback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<u32>>, Rc<dyn Fn()>) {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        (count, Rc::new(move || c.set(c.get() + 1)))
    }

    #[test]
    fn timeout_fires_once_when_due() {
        let t0 = Instant::now();
        let s = Scheduler::new(t0);
        let (count, cb) = counter();
        s.set_timeout(Duration::from_millis(100), Box::new(move || cb()));

        s.advance(t0 + Duration::from_millis(50));
        assert_eq!(count.get(), 0);
        s.advance(t0 + Duration::from_millis(100));
        assert_eq!(count.get(), 1);
        s.advance(t0 + Duration::from_millis(500));
        assert_eq!(count.get(), 1);
        assert_eq!(s.pending_timers(), 0);
    }

    #[test]
    fn interval_repeats_until_cancelled() {
        let t0 = Instant::now();
        let s = Scheduler::new(t0);
        let (count, cb) = counter();
        let id = s.set_interval(Duration::from_millis(10), cb);

        s.advance(t0 + Duration::from_millis(10));
        s.advance(t0 + Duration::from_millis(20));
        // A long stall fires once, not once per missed period.
        s.advance(t0 + Duration::from_millis(200));
        assert_eq!(count.get(), 3);

        s.cancel(id);
        s.advance(t0 + Duration::from_millis(400));
        assert_eq!(count.get(), 3);
        assert_eq!(s.pending_timers(), 0);
    }

    #[test]
    fn cancelled_timeout_never_fires() {
        let t0 = Instant::now();
        let s = Scheduler::new(t0);
        let (count, cb) = counter();
        let id = s.set_timeout(Duration::ZERO, Box::new(move || cb()));
        s.cancel(id);
        s.advance(t0);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn frames_requested_during_a_frame_wait_for_the_next() {
        let s = Rc::new(Scheduler::new(Instant::now()));
        let (count, cb) = counter();
        let s2 = Rc::clone(&s);
        s.request_frame(Box::new(move || {
            cb();
            let cb = Rc::clone(&cb);
            s2.request_frame(Box::new(move || cb()));
        }));

        s.run_frame();
        assert_eq!(count.get(), 1);
        assert_eq!(s.pending_frames(), 1);
        s.run_frame();
        assert_eq!(count.get(), 2);
        assert_eq!(s.pending_frames(), 0);
    }

    #[test]
    fn callbacks_may_cancel_other_timers() {
        let t0 = Instant::now();
        let s = Rc::new(Scheduler::new(t0));
        let (count, cb) = counter();
        let victim = s.set_timeout(Duration::from_millis(20), Box::new(move || cb()));
        let s2 = Rc::clone(&s);
        s.set_timeout(Duration::from_millis(10), Box::new(move || s2.cancel(victim)));

        s.advance(t0 + Duration::from_millis(30));
        assert_eq!(count.get(), 0);
    }
}
