//! Custom event emitter owned by every widget
//!
//! Listeners receive a [`WidgetEvent`] (`{ type, target }`) followed by the
//! arguments passed to `emit`. A listener registered twice for the same type
//! is kept once; identity is the `Rc` allocation.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::value::{thin_ptr_eq, Value};
use crate::widget::Widget;

/// Callback for widget events
///
/// Uses Rc since widgets are single-threaded.
pub type Listener = Rc<dyn Fn(&WidgetEvent, &[Value])>;

/// First argument of every widget event listener
#[derive(Clone)]
pub struct WidgetEvent {
    kind: String,
    target: Widget,
}

impl WidgetEvent {
    pub fn new(kind: impl Into<String>, target: Widget) -> Self {
        Self {
            kind: kind.into(),
            target,
        }
    }

    /// Event type, e.g. `propertychange`
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The widget that emitted the event
    pub fn target(&self) -> &Widget {
        &self.target
    }
}

impl fmt::Debug for WidgetEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetEvent")
            .field("kind", &self.kind)
            .field("target", &self.target.id())
            .finish()
    }
}

#[derive(Clone)]
struct Entry {
    listener: Listener,
    once: bool,
}

/// Type-keyed listener table
#[derive(Default)]
pub struct EventEmitter {
    listeners: RefCell<IndexMap<String, SmallVec<[Entry; 2]>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `kind`
    pub fn on(&self, kind: &str, listener: Listener) {
        self.add(kind, listener, false);
    }

    /// Register a listener removed right before its first call
    pub fn once(&self, kind: &str, listener: Listener) {
        self.add(kind, listener, true);
    }

    fn add(&self, kind: &str, listener: Listener, once: bool) {
        let mut listeners = self.listeners.borrow_mut();
        let queue = listeners.entry(kind.to_string()).or_default();
        if !queue.iter().any(|e| thin_ptr_eq(&e.listener, &listener)) {
            queue.push(Entry { listener, once });
        }
    }

    /// Remove listeners
    ///
    /// - no type: every listener of every type
    /// - type only: every listener of that type
    /// - type and listener: that one listener
    pub fn off(&self, kind: Option<&str>, listener: Option<&Listener>) {
        let mut listeners = self.listeners.borrow_mut();
        match (kind, listener) {
            (None, _) => listeners.clear(),
            (Some(kind), None) => {
                listeners.shift_remove(kind);
            }
            (Some(kind), Some(listener)) => {
                if let Some(queue) = listeners.get_mut(kind) {
                    queue.retain(|e| !thin_ptr_eq(&e.listener, listener));
                    if queue.is_empty() {
                        listeners.shift_remove(kind);
                    }
                }
            }
        }
    }

    /// Call every listener of `event.kind()` in registration order
    ///
    /// The queue is snapshotted first, so listeners may add or remove
    /// listeners (or emit again) while running.
    pub fn emit(&self, event: &WidgetEvent, args: &[Value]) {
        let snapshot: SmallVec<[Entry; 2]> = {
            let mut listeners = self.listeners.borrow_mut();
            let Some(queue) = listeners.get_mut(event.kind()) else {
                return;
            };
            let snapshot = queue.clone();
            queue.retain(|e| !e.once);
            if queue.is_empty() {
                listeners.shift_remove(event.kind());
            }
            snapshot
        };

        for entry in snapshot {
            (entry.listener)(event, args);
        }
    }

    /// Number of listeners registered for `kind`
    pub fn listener_count(&self, kind: &str) -> usize {
        self.listeners.borrow().get(kind).map_or(0, SmallVec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::attribute::Schema;
    use crate::test_support::{probe, registry};
    use crate::widget::Options;

    fn event(kind: &str) -> WidgetEvent {
        let widget = Widget::new(&registry(), probe(Schema::new()), Options::new()).unwrap();
        WidgetEvent::new(kind, widget)
    }

    fn recorder(log: &Rc<RefCell<Vec<String>>>, tag: &'static str) -> Listener {
        let log = log.clone();
        Rc::new(move |ev, args| {
            log.borrow_mut().push(format!("{tag}:{}:{}", ev.kind(), args.len()));
        })
    }

    #[test]
    fn test_emit_in_registration_order() {
        let emitter = EventEmitter::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        emitter.on("change", recorder(&log, "a"));
        emitter.on("change", recorder(&log, "b"));
        emitter.on("other", recorder(&log, "c"));

        emitter.emit(&event("change"), &[Value::from(1), Value::from(2)]);
        assert_eq!(*log.borrow(), vec!["a:change:2", "b:change:2"]);
    }

    #[test]
    fn test_off_variants() {
        let emitter = EventEmitter::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = recorder(&log, "a");
        emitter.on("x", a.clone());
        emitter.on("x", recorder(&log, "b"));
        emitter.on("y", recorder(&log, "c"));

        emitter.off(Some("x"), Some(&a));
        assert_eq!(emitter.listener_count("x"), 1);
        emitter.off(Some("x"), None);
        assert_eq!(emitter.listener_count("x"), 0);
        assert_eq!(emitter.listener_count("y"), 1);
        emitter.off(None, None);
        assert!(emitter.is_empty());

        // Unknown type is a no-op
        emitter.off(Some("z"), Some(&a));
    }

    #[test]
    fn test_once_removed_before_call() {
        let emitter = Rc::new(EventEmitter::new());
        let calls = Rc::new(RefCell::new(0));

        let (e, c) = (emitter.clone(), calls.clone());
        emitter.once(
            "ping",
            Rc::new(move |ev, _| {
                *c.borrow_mut() += 1;
                // Re-entrant emit sees the listener already gone
                e.emit(ev, &[]);
            }),
        );

        emitter.emit(&event("ping"), &[]);
        emitter.emit(&event("ping"), &[]);
        assert_eq!(*calls.borrow(), 1);
        assert_eq!(emitter.listener_count("ping"), 0);
    }

    #[test]
    fn test_listener_added_during_emit_waits_for_next() {
        let emitter = Rc::new(EventEmitter::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        let (e, l) = (emitter.clone(), log.clone());
        emitter.on(
            "tick",
            Rc::new(move |_, _| {
                l.borrow_mut().push("outer".to_string());
                e.on("tick", recorder(&l, "inner"));
            }),
        );

        emitter.emit(&event("tick"), &[]);
        assert_eq!(*log.borrow(), vec!["outer"]);
        emitter.emit(&event("tick"), &[]);
        assert_eq!(log.borrow().len(), 3);
    }
}
