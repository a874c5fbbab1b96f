//! Vane Core Runtime
//!
//! The attribute and lifecycle runtime every Vane widget is built on:
//!
//! - **Attributes**: declared descriptors with getters, setters, read-only and
//!   repaint flags; batched `set` with change detection via [`is_equal`]
//! - **States**: an open set of string flags (`init`, `render`, `disable`, ...)
//! - **Lifecycle**: `render` / `repaint` / `enable` / `disable` / `dispose`
//!   driven through the [`Lifecycle`] trait
//! - **Events**: a per-widget [`EventEmitter`] and a bridge for native
//!   element events, with one shared pool for window, document, root and body
//! - **Plugins**: optional capabilities enabled per widget
//! - **Registry**: ids, live instances, widget and plugin types, configuration
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use vane_core::{Attribute, Changes, Lifecycle, Options, Registry, Schema, Widget};
//!
//! struct Counter;
//!
//! impl Lifecycle for Counter {
//!     fn type_name(&self) -> &'static str {
//!         "Counter"
//!     }
//!
//!     fn attributes(&self) -> Schema {
//!         Schema::new().with("count", Attribute::new(0).repaint())
//!     }
//!
//!     fn repaint(&self, widget: &Widget, _changes: Option<&Changes>) {
//!         if let Some(main) = widget.main() {
//!             let text = widget.get("count").to_string();
//!             widget.dom().set_text(main, text);
//!         }
//!     }
//! }
//!
//! let registry = Registry::default();
//! let main = registry.dom().create_element("span");
//! let counter = Widget::new(&registry, Rc::new(Counter), Options::new().main(main)).unwrap();
//!
//! counter.render().unwrap();
//! counter.set("count", 3).unwrap();
//! assert_eq!(registry.dom().text(main), "3");
//! ```

pub mod attribute;
pub mod config;
pub mod dom_event;
pub mod emitter;
pub mod equal;
pub mod error;
pub mod plugin;
pub mod registry;
pub mod state;
pub mod timer;
pub mod value;
pub mod widget;

pub use attribute::{Attribute, Change, Changes, Getter, Schema, SetOptions, Setter};
pub use config::{RegistryConfig, RegistryConfigPatch};
pub use dom_event::{DomHandler, GlobalEventPool, DEBOUNCE_WAIT};
pub use emitter::{EventEmitter, Listener, WidgetEvent};
pub use equal::is_equal;
pub use error::{Result, WidgetError};
pub use plugin::{Plugin, PluginCore, PluginFactory};
pub use registry::{DisposeTarget, Registry, WidgetFactory, GUID_START};
pub use state::StateSet;
pub use timer::CancelToken;
pub use value::{classify, is_empty, is_plain_object, Map, Primitive, TypeTag, Value};
pub use widget::{AsAnyRc, Lifecycle, MainRef, Options, WeakWidget, Widget};

// Re-export the host document so consumers need a single dependency
pub use vane_dom as dom;
