//! Native event types
//!
//! These mirror the low-level listener surface of a browser document: a
//! target, an event type string, and listeners invoked in registration order.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::node::NodeId;

/// Callback for native events
///
/// Uses Rc since the document is single-threaded.
pub type NativeListener = Rc<dyn Fn(&DomEvent)>;

/// Handle returned by [`Dom::add_event_listener`](crate::Dom::add_event_listener)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

impl ListenerId {
    /// Raw numeric value
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

/// Anything a native listener can be attached to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventTarget {
    /// The window object
    Window,
    /// The document object
    Document,
    /// An element
    Node(NodeId),
}

impl From<NodeId> for EventTarget {
    fn from(node: NodeId) -> Self {
        EventTarget::Node(node)
    }
}

impl EventTarget {
    /// The element behind this target, if it is one
    pub fn node(self) -> Option<NodeId> {
        match self {
            EventTarget::Node(node) => Some(node),
            _ => None,
        }
    }
}

/// The four process-wide singleton targets
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GlobalTarget {
    Window,
    Document,
    /// The document element (`html`)
    Root,
    /// The `body` element
    Body,
}

impl fmt::Display for GlobalTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GlobalTarget::Window => "window",
            GlobalTarget::Document => "document",
            GlobalTarget::Root => "root",
            GlobalTarget::Body => "body",
        };
        f.write_str(name)
    }
}

/// A native event as seen by listeners
#[derive(Clone, Debug)]
pub struct DomEvent {
    kind: String,
    target: EventTarget,
    current_target: Cell<EventTarget>,
    /// Pointer position in page coordinates (touch / mouse events)
    pub page_x: f32,
    pub page_y: f32,
    /// Free-form payload, e.g. the value of a file input on `change`
    pub detail: Option<String>,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
}

impl DomEvent {
    /// Create an event of the given type
    ///
    /// The target is filled in by [`Dom::dispatch_event`](crate::Dom::dispatch_event).
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            target: EventTarget::Window,
            current_target: Cell::new(EventTarget::Window),
            page_x: 0.0,
            page_y: 0.0,
            detail: None,
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
        }
    }

    /// Set the pointer position
    pub fn with_page(mut self, x: f32, y: f32) -> Self {
        self.page_x = x;
        self.page_y = y;
        self
    }

    /// Attach a payload
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Event type, e.g. `click`
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The target the event was dispatched at
    pub fn target(&self) -> EventTarget {
        self.target
    }

    /// The target whose listeners are currently running
    pub fn current_target(&self) -> EventTarget {
        self.current_target.get()
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    /// Stop bubbling after the current target's listeners finish
    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub(crate) fn set_target(&mut self, target: EventTarget) {
        self.target = target;
        self.current_target.set(target);
    }

    pub(crate) fn set_current_target(&self, target: EventTarget) {
        self.current_target.set(target);
    }
}
