//! Vane Host Document
//!
//! A small, headless stand-in for the browser document that the widget
//! runtime talks to:
//!
//! - **Element tree**: arena-backed nodes with attributes, classes and inline styles
//! - **Selectors**: the simple selector subset widgets use to locate structure
//! - **Native listeners**: per-target listener tables with bubbling dispatch
//! - **Timers**: a virtual clock driving one-shot callbacks and debouncing
//!
//! Everything is single-threaded. Handles are cheap `Rc` clones and no
//! interior borrow is held while a listener or timer callback runs, so
//! callbacks are free to mutate the document again.
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use vane_dom::{Dom, DomEvent, EventTarget};
//!
//! let dom = Dom::new();
//! let button = dom.create_element("button");
//! dom.append_child(dom.body(), button);
//!
//! let clicks = Rc::new(Cell::new(0));
//! let counter = clicks.clone();
//! dom.add_event_listener(EventTarget::Document, "click", move |_| {
//!     counter.set(counter.get() + 1);
//! });
//!
//! dom.dispatch_event(EventTarget::Node(button), DomEvent::new("click"));
//! assert_eq!(clicks.get(), 1);
//! ```

pub mod error;
pub mod event;
pub mod node;
pub mod selector;
pub mod timer;

pub use error::{DomError, Result};
pub use event::{DomEvent, EventTarget, GlobalTarget, ListenerId, NativeListener};
pub use node::{Dom, NodeId};
pub use selector::Selector;
pub use timer::{Debounce, TimerId, Timers};
