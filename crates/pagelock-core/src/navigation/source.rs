//! Navigation sources.
//!
//! Each in-page navigation mechanism is one implementation of
//! `NavigationSource`, composed by the watcher instead of patched in place:
//! an event queue the host feeds from programmatic history mutation,
//! back/forward navigation, and fragment changes, plus a fixed-interval
//! location poller for mechanisms that bypass all of those.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// A mechanism that detects location changes.
pub trait NavigationSource {
    /// Next pending location, if this source has detected one.
    fn poll(&mut self, now_ms: u64) -> Option<String>;
}

/// Queue fed by the host whenever a history mutation, back/forward
/// navigation, or fragment change fires. The handle stays with the host;
/// the source goes to the watcher.
#[derive(Debug, Default)]
pub struct EventSource {
    queue: Rc<RefCell<VecDeque<String>>>,
}

/// Host-side handle for pushing detected locations into an `EventSource`.
#[derive(Debug, Clone)]
pub struct EventSourceHandle {
    queue: Rc<RefCell<VecDeque<String>>>,
}

impl EventSource {
    pub fn channel() -> (EventSourceHandle, EventSource) {
        let queue = Rc::new(RefCell::new(VecDeque::new()));
        (
            EventSourceHandle {
                queue: Rc::clone(&queue),
            },
            EventSource { queue },
        )
    }
}

impl EventSourceHandle {
    pub fn push(&self, location: impl Into<String>) {
        self.queue.borrow_mut().push_back(location.into());
    }
}

impl NavigationSource for EventSource {
    fn poll(&mut self, _now_ms: u64) -> Option<String> {
        self.queue.borrow_mut().pop_front()
    }
}

/// Fallback source: re-reads the current location at a fixed interval and
/// reports it when it differs from the last read.
pub struct LocationPoller<F: FnMut() -> String> {
    read: F,
    interval_ms: u64,
    next_poll_ms: u64,
    last_seen: Option<String>,
}

impl<F: FnMut() -> String> LocationPoller<F> {
    pub fn new(read: F, interval_ms: u64) -> Self {
        Self {
            read,
            interval_ms,
            next_poll_ms: 0,
            last_seen: None,
        }
    }
}

impl<F: FnMut() -> String> NavigationSource for LocationPoller<F> {
    fn poll(&mut self, now_ms: u64) -> Option<String> {
        if now_ms < self.next_poll_ms {
            return None;
        }
        self.next_poll_ms = now_ms + self.interval_ms;
        let location = (self.read)();
        if self.last_seen.as_deref() == Some(location.as_str()) {
            return None;
        }
        self.last_seen = Some(location.clone());
        Some(location)
    }
}
