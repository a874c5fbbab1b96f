//! Virtual-clock timers
//!
//! One-shot delayed callbacks are the only asynchronous primitive the widget
//! runtime relies on. The clock only moves when [`Timers::advance`] is called,
//! which keeps every timing-dependent behaviour deterministic.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use rustc_hash::FxHashMap;

/// Handle for a scheduled callback
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

type TimerCallback = Box<dyn FnOnce()>;

struct TimersInner {
    /// Current virtual time in milliseconds
    now: Cell<u64>,
    next_id: Cell<u64>,
    /// Pending callbacks ordered by (due time, id)
    queue: RefCell<BTreeMap<(u64, u64), TimerCallback>>,
    /// id -> due time, for cancellation
    due: RefCell<FxHashMap<u64, u64>>,
}

/// Timer scheduler shared by a document and everything attached to it
#[derive(Clone)]
pub struct Timers {
    inner: Rc<TimersInner>,
}

impl Default for Timers {
    fn default() -> Self {
        Self::new()
    }
}

impl Timers {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(TimersInner {
                now: Cell::new(0),
                next_id: Cell::new(1),
                queue: RefCell::new(BTreeMap::new()),
                due: RefCell::new(FxHashMap::default()),
            }),
        }
    }

    /// Current virtual time in milliseconds
    pub fn now(&self) -> u64 {
        self.inner.now.get()
    }

    /// Number of callbacks waiting to fire
    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Schedule `callback` to run `delay` milliseconds from now
    pub fn set_timeout<F>(&self, delay: u64, callback: F) -> TimerId
    where
        F: FnOnce() + 'static,
    {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);

        let due = self.now().saturating_add(delay);
        self.inner
            .queue
            .borrow_mut()
            .insert((due, id), Box::new(callback));
        self.inner.due.borrow_mut().insert(id, due);

        TimerId(id)
    }

    /// Cancel a scheduled callback
    ///
    /// Returns `false` if it already fired or was never scheduled.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        let Some(due) = self.inner.due.borrow_mut().remove(&id.0) else {
            return false;
        };
        self.inner.queue.borrow_mut().remove(&(due, id.0)).is_some()
    }

    /// Move the clock forward by `ms`, firing every callback that falls due
    ///
    /// Callbacks run in due-time order (ties in scheduling order) with the
    /// clock set to their due time. Callbacks scheduled while advancing fire
    /// in the same call if they fall inside the window.
    pub fn advance(&self, ms: u64) {
        let target = self.now().saturating_add(ms);

        loop {
            let next = {
                let mut queue = self.inner.queue.borrow_mut();
                match queue.first_key_value() {
                    Some((&(due, _), _)) if due <= target => queue.pop_first(),
                    _ => None,
                }
            };

            let Some(((due, id), callback)) = next else {
                break;
            };

            self.inner.due.borrow_mut().remove(&id);
            self.inner.now.set(due);
            callback();
        }

        self.inner.now.set(target);
    }
}

/// Coalesces bursts of calls into one trailing call
///
/// Each [`call`](Debounce::call) cancels the previously scheduled callback,
/// so only the last one within `wait` milliseconds runs.
#[derive(Clone)]
pub struct Debounce {
    timers: Timers,
    wait: u64,
    pending: Rc<Cell<Option<TimerId>>>,
}

impl Debounce {
    pub fn new(timers: Timers, wait: u64) -> Self {
        Self {
            timers,
            wait,
            pending: Rc::new(Cell::new(None)),
        }
    }

    /// Schedule `callback`, replacing any callback still waiting
    pub fn call<F>(&self, callback: F)
    where
        F: FnOnce() + 'static,
    {
        self.cancel();

        let pending = self.pending.clone();
        let id = self.timers.set_timeout(self.wait, move || {
            pending.set(None);
            callback();
        });
        self.pending.set(Some(id));
    }

    /// Drop the waiting callback, if any
    pub fn cancel(&self) {
        if let Some(id) = self.pending.take() {
            self.timers.clear_timeout(id);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_fires_when_due() {
        let timers = Timers::new();
        let fired = Rc::new(Cell::new(false));

        let flag = fired.clone();
        timers.set_timeout(100, move || flag.set(true));

        timers.advance(99);
        assert!(!fired.get());
        timers.advance(1);
        assert!(fired.get());
        assert_eq!(timers.now(), 100);
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn test_clear_timeout() {
        let timers = Timers::new();
        let fired = Rc::new(Cell::new(false));

        let flag = fired.clone();
        let id = timers.set_timeout(10, move || flag.set(true));
        assert!(timers.clear_timeout(id));
        assert!(!timers.clear_timeout(id));

        timers.advance(50);
        assert!(!fired.get());
    }

    #[test]
    fn test_fire_order_and_nested_scheduling() {
        let timers = Timers::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let l = log.clone();
        timers.set_timeout(20, move || l.borrow_mut().push("b"));
        let l = log.clone();
        let t = timers.clone();
        timers.set_timeout(10, move || {
            l.borrow_mut().push("a");
            let l = l.clone();
            t.set_timeout(5, move || l.borrow_mut().push("a2"));
        });

        timers.advance(30);
        assert_eq!(*log.borrow(), vec!["a", "a2", "b"]);
    }

    #[test]
    fn test_debounce_keeps_last_call() {
        let timers = Timers::new();
        let debounce = Debounce::new(timers.clone(), 150);
        let seen = Rc::new(Cell::new(0));

        for i in 1..=3 {
            let seen = seen.clone();
            debounce.call(move || seen.set(i));
            timers.advance(100);
        }
        assert_eq!(seen.get(), 0);
        assert!(debounce.is_pending());

        timers.advance(50);
        assert_eq!(seen.get(), 3);
        assert!(!debounce.is_pending());
    }
}
