//! Element event bridge
//!
//! Widgets subscribe handlers to native events of elements through this
//! layer instead of attaching native listeners directly.
//!
//! # Architecture
//!
//! ```text
//! widget.add_event(node, "click", handler)
//!     ↓
//! DomEvents (per widget)      guid (stamped on the element) -> type -> queue
//!     ↓ first handler only
//! Dom::add_event_listener     one native listener per (element, type)
//!
//! widget.add_event(window, "resize", handler)
//!     ↓
//! GlobalEventPool (per registry)   (singleton, type) -> shared queue
//!     ↓ first subscriber only
//! Dom::add_event_listener     one native listener per (singleton, type),
//!                             resize/scroll debounced
//! ```
//!
//! Removing anything that was never added is a no-op.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use vane_dom::{Debounce, Dom, DomEvent, EventTarget, GlobalTarget, ListenerId};

use crate::value::thin_ptr_eq;
use crate::widget::{WeakWidget, Widget};

/// Coalescing window for `resize` and `scroll` on singleton targets, in ms
pub const DEBOUNCE_WAIT: u64 = 150;

/// Callback for native events routed through a widget
///
/// Receives the subscribing widget and the native event.
pub type DomHandler = Rc<dyn Fn(&Widget, &DomEvent)>;

fn is_debounced(kind: &str) -> bool {
    matches!(kind, "resize" | "scroll")
}

// =============================================================================
// Per-widget subscription table
// =============================================================================

#[derive(Default)]
struct HandlerQueue {
    handlers: SmallVec<[DomHandler; 2]>,
    /// Own native listener; `None` for singleton targets
    native: Option<ListenerId>,
}

struct ElementEvents {
    target: EventTarget,
    queues: IndexMap<String, HandlerQueue>,
}

/// Subscriptions of one widget, keyed by element guid
#[derive(Default)]
pub(crate) struct DomEvents {
    elements: IndexMap<String, ElementEvents>,
}

impl Widget {
    /// Subscribe `handler` to native `kind` events of `target`
    ///
    /// A handler already in the queue is not added twice. For window,
    /// document, the root element and body the handler joins the registry's
    /// shared pool instead of getting a listener of its own.
    pub fn add_event(&self, target: impl Into<EventTarget>, kind: &str, handler: DomHandler) {
        let target = target.into();
        let dom = self.dom().clone();

        let guid = match dom.event_key(target) {
            Some(guid) => guid,
            None => {
                let guid = self.registry().get_guid(None);
                dom.set_event_key(target, guid.clone());
                guid
            }
        };
        let global = dom.global_target(target);

        let needs_native = {
            let mut events = self.dom_events().borrow_mut();
            let element = events
                .elements
                .entry(guid.clone())
                .or_insert_with(|| ElementEvents {
                    target,
                    queues: IndexMap::new(),
                });
            let queue = element.queues.entry(kind.to_string()).or_default();

            if queue.handlers.iter().any(|h| thin_ptr_eq(h, &handler)) {
                return;
            }
            queue.handlers.push(handler.clone());
            global.is_none() && queue.native.is_none()
        };

        if let Some(global) = global {
            self.registry().event_pool().attach(global, kind, self, handler);
            return;
        }

        if needs_native {
            let weak = self.downgrade();
            let event_kind = kind.to_string();
            let listener_guid = guid.clone();
            let id = dom.add_event_listener(target, kind, move |event| {
                if let Some(widget) = weak.upgrade() {
                    widget.trigger_dom_event(&listener_guid, &event_kind, event);
                }
            });

            let mut events = self.dom_events().borrow_mut();
            if let Some(queue) = events
                .elements
                .get_mut(&guid)
                .and_then(|e| e.queues.get_mut(kind))
            {
                queue.native = Some(id);
            }
        }
    }

    /// Closure form of [`add_event`](Widget::add_event); returns the handler
    /// for later removal
    pub fn on_dom<F>(&self, target: impl Into<EventTarget>, kind: &str, handler: F) -> DomHandler
    where
        F: Fn(&Widget, &DomEvent) + 'static,
    {
        let handler: DomHandler = Rc::new(handler);
        self.add_event(target, kind, handler.clone());
        handler
    }

    /// Unsubscribe one handler, or every handler of `kind` when `None`
    ///
    /// The native listener goes away with the last handler.
    pub fn remove_event(
        &self,
        target: impl Into<EventTarget>,
        kind: &str,
        handler: Option<&DomHandler>,
    ) {
        let target = target.into();
        let dom = self.dom().clone();
        let Some(guid) = dom.event_key(target) else {
            return;
        };

        let native = {
            let mut events = self.dom_events().borrow_mut();
            let Some(element) = events.elements.get_mut(&guid) else {
                return;
            };
            let Some(queue) = element.queues.get_mut(kind) else {
                return;
            };

            match handler {
                Some(handler) => queue.handlers.retain(|h| !thin_ptr_eq(h, handler)),
                None => queue.handlers.clear(),
            }

            if !queue.handlers.is_empty() {
                None
            } else {
                let native = queue.native.take();
                element.queues.shift_remove(kind);
                if element.queues.is_empty() {
                    events.elements.shift_remove(&guid);
                }
                native
            }
        };

        if let Some(global) = dom.global_target(target) {
            self.registry().event_pool().detach(global, kind, self, handler);
        }

        if let Some(id) = native {
            dom.remove_event_listener(target, kind, id);
        }
    }

    /// Drop every subscription on `target`, or on every element when `None`
    pub fn clear_events(&self, target: Option<EventTarget>) {
        let subscriptions: Vec<(EventTarget, Vec<String>)> = {
            let events = self.dom_events().borrow();
            events
                .elements
                .values()
                .filter(|e| target.map_or(true, |t| t == e.target))
                .map(|e| (e.target, e.queues.keys().cloned().collect()))
                .collect()
        };

        for (target, kinds) in subscriptions {
            for kind in kinds {
                self.remove_event(target, &kind, None);
            }
        }
    }

    /// Number of handlers this widget has queued for `(target, kind)`
    pub fn event_queue_len(&self, target: impl Into<EventTarget>, kind: &str) -> usize {
        let Some(guid) = self.dom().event_key(target.into()) else {
            return 0;
        };
        self.dom_events()
            .borrow()
            .elements
            .get(&guid)
            .and_then(|e| e.queues.get(kind))
            .map_or(0, |q| q.handlers.len())
    }

    fn trigger_dom_event(&self, guid: &str, kind: &str, event: &DomEvent) {
        let handlers: SmallVec<[DomHandler; 2]> = {
            let events = self.dom_events().borrow();
            match events.elements.get(guid).and_then(|e| e.queues.get(kind)) {
                Some(queue) => queue.handlers.clone(),
                None => return,
            }
        };

        for handler in handlers {
            handler(self, event);
        }
    }
}

// =============================================================================
// Global event pool
// =============================================================================

#[derive(Clone)]
struct PoolEntry {
    widget: WeakWidget,
    handler: DomHandler,
}

struct SharedQueue {
    entries: Rc<RefCell<Vec<PoolEntry>>>,
    native: ListenerId,
    debounce: Option<Debounce>,
}

/// Shared handler queues for the singleton targets
///
/// Owned by the registry; at most one native listener exists per
/// (singleton, type) however many widgets subscribe.
pub struct GlobalEventPool {
    dom: Dom,
    queues: RefCell<FxHashMap<(GlobalTarget, String), SharedQueue>>,
}

impl GlobalEventPool {
    pub fn new(dom: Dom) -> Self {
        Self {
            dom,
            queues: RefCell::new(FxHashMap::default()),
        }
    }

    /// Add `(widget, handler)` to the shared queue
    pub fn attach(&self, global: GlobalTarget, kind: &str, widget: &Widget, handler: DomHandler) {
        let mut queues = self.queues.borrow_mut();
        let key = (global, kind.to_string());

        if let Some(queue) = queues.get(&key) {
            let mut entries = queue.entries.borrow_mut();
            let exists = entries
                .iter()
                .any(|e| e.widget.ptr_eq(widget) && thin_ptr_eq(&e.handler, &handler));
            if !exists {
                entries.push(PoolEntry {
                    widget: widget.downgrade(),
                    handler,
                });
            }
            return;
        }

        let entries = Rc::new(RefCell::new(vec![PoolEntry {
            widget: widget.downgrade(),
            handler,
        }]));
        let debounce =
            is_debounced(kind).then(|| Debounce::new(self.dom.timers().clone(), DEBOUNCE_WAIT));

        let shared = entries.clone();
        let coalesce = debounce.clone();
        let native = self
            .dom
            .add_event_listener(self.dom.global(global), kind, move |event| match &coalesce {
                Some(debounce) => {
                    let shared = shared.clone();
                    let event = event.clone();
                    debounce.call(move || dispatch(&shared, &event));
                }
                None => dispatch(&shared, event),
            });

        tracing::debug!(global = %global, kind, "global listener attached");
        queues.insert(
            key,
            SharedQueue {
                entries,
                native,
                debounce,
            },
        );
    }

    /// Remove `widget`'s entry for `handler`, or all of its entries when
    /// `None`
    ///
    /// The native listener is detached once the queue is empty.
    pub fn detach(
        &self,
        global: GlobalTarget,
        kind: &str,
        widget: &Widget,
        handler: Option<&DomHandler>,
    ) {
        let key = (global, kind.to_string());
        let closed = {
            let mut queues = self.queues.borrow_mut();
            let Some(queue) = queues.get(&key) else {
                return;
            };

            let empty = {
                let mut entries = queue.entries.borrow_mut();
                entries.retain(|e| {
                    let matches = e.widget.ptr_eq(widget)
                        && handler.map_or(true, |h| thin_ptr_eq(&e.handler, h));
                    !matches && e.widget.is_alive()
                });
                entries.is_empty()
            };

            if empty {
                queues.remove(&key)
            } else {
                None
            }
        };

        if let Some(queue) = closed {
            if let Some(debounce) = &queue.debounce {
                debounce.cancel();
            }
            self.dom
                .remove_event_listener(self.dom.global(global), kind, queue.native);
            tracing::debug!(global = %global, kind, "global listener detached");
        }
    }

    /// Number of `(widget, handler)` entries sharing the queue
    pub fn queue_len(&self, global: GlobalTarget, kind: &str) -> usize {
        self.queues
            .borrow()
            .get(&(global, kind.to_string()))
            .map_or(0, |q| q.entries.borrow().len())
    }

    /// Whether a native listener is attached for `(global, kind)`
    pub fn is_listening(&self, global: GlobalTarget, kind: &str) -> bool {
        self.queues
            .borrow()
            .contains_key(&(global, kind.to_string()))
    }
}

fn dispatch(entries: &RefCell<Vec<PoolEntry>>, event: &DomEvent) {
    let snapshot = entries.borrow().clone();
    for entry in snapshot {
        if let Some(widget) = entry.widget.upgrade() {
            (entry.handler)(&widget, event);
        }
    }
}
