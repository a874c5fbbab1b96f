//! Widget runtime
//!
//! A [`Widget`] is a cheap handle to one widget instance. The instance owns
//! the attribute schema, the state flags, the custom event emitter, the
//! element event queues and the active plugins. Type-specific behaviour is
//! supplied by a [`Lifecycle`] implementation the widget delegates to.
//!
//! # Lifecycle
//!
//! ```text
//! Widget::new   -> `init` state, emits `init`
//!     ↓ render()          (first call only: beforerender, init_structure,
//!     ↓                    init_event, `render` state)
//! repaint(None)           (every render call), afterrender once
//!     ↓ set(..)
//! repaint(Some(changes))  (once per set batch with repaint-flagged changes)
//!     ↓ dispose()
//! `dispose` state         (terminal)
//! ```
//!
//! All methods take `&self`. No interior borrow is held while user code
//! (getters, setters, listeners, lifecycle hooks) runs, so that code may call
//! back into the widget.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use vane_dom::{Dom, NodeId, TimerId};

use crate::attribute::{Attribute, Change, Changes, Schema, SetOptions};
use crate::dom_event::DomEvents;
use crate::emitter::{EventEmitter, Listener, WidgetEvent};
use crate::equal::is_equal;
use crate::error::{Result, WidgetError};
use crate::plugin::Plugin;
use crate::registry::Registry;
use crate::state::StateSet;
use crate::timer::CancelToken;
use crate::value::{Map, Value};

// =============================================================================
// Lifecycle
// =============================================================================

/// Downcast support for trait objects held in `Rc`
pub trait AsAnyRc: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Any> AsAnyRc for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// Type-specific widget behaviour
///
/// Every hook receives the widget handle; implementations keep their own
/// runtime data in `Cell`/`RefCell` fields.
pub trait Lifecycle: AsAnyRc {
    /// Registered type name, also the value of the read-only `type` attribute
    fn type_name(&self) -> &'static str;

    /// Attribute declarations, layered over the base `type`/`id`/`main`
    fn attributes(&self) -> Schema {
        Schema::new()
    }

    /// States present from construction, in addition to `disable`
    fn states(&self) -> &[&'static str] {
        &[]
    }

    /// Build the element structure (first render only)
    fn init_structure(&self, _widget: &Widget) -> Result<()> {
        Ok(())
    }

    /// Wire element events (first render only)
    fn init_event(&self, _widget: &Widget) -> Result<()> {
        Ok(())
    }

    /// Reflect state into the document
    ///
    /// `changes` is `None` when called from `render`, otherwise the
    /// repaint-flagged changes of one `set` batch.
    fn repaint(&self, _widget: &Widget, _changes: Option<&Changes>) {}

    /// Runs before the `disable` state is removed
    fn on_enable(&self, _widget: &Widget) {}

    /// Runs before the `disable` state is added
    fn on_disable(&self, _widget: &Widget) {}

    /// Release type-specific resources; the base teardown follows
    fn dispose(&self, _widget: &Widget) {}

    /// Called synchronously for every emitted event, before any listener
    fn handle_event(&self, _widget: &Widget, _event: &WidgetEvent, _args: &[Value]) {}
}

// =============================================================================
// Construction options
// =============================================================================

/// Where the main element comes from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MainRef {
    Node(NodeId),
    /// Resolved against the whole document at construction
    Selector(String),
}

/// Constructor options
///
/// `id` and `main` are taken out first. Keys of the form `on<Type>` holding
/// a function become event listeners. Everything else is written through
/// `set` before the widget enters the `init` state.
#[derive(Clone, Debug, Default)]
pub struct Options {
    id: Option<String>,
    main: Option<MainRef>,
    values: Map,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a plain mapping into options; `id` and `main` are recognised
    pub fn from_map(mut values: Map) -> Self {
        let id = values
            .shift_remove("id")
            .and_then(|v| v.as_str().map(str::to_string));
        let main = values.shift_remove("main").and_then(|v| match v {
            Value::Node(node) => Some(MainRef::Node(node)),
            other => other.as_str().map(|s| MainRef::Selector(s.to_string())),
        });

        Self { id, main, values }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn main(mut self, node: NodeId) -> Self {
        self.main = Some(MainRef::Node(node));
        self
    }

    pub fn main_selector(mut self, selector: impl Into<String>) -> Self {
        self.main = Some(MainRef::Selector(selector.into()));
        self
    }

    /// Initial attribute value
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Listener registered before any other initialisation
    pub fn on<F>(self, kind: &str, listener: F) -> Self
    where
        F: Fn(&WidgetEvent, &[Value]) + 'static,
    {
        self.listener(kind, Rc::new(listener))
    }

    pub fn listener(mut self, kind: &str, listener: Listener) -> Self {
        let mut chars = kind.chars();
        let key = match chars.next() {
            Some(first) => format!("on{}{}", first.to_ascii_uppercase(), chars.as_str()),
            None => "on".to_string(),
        };
        self.values.insert(key, Value::Function(listener));
        self
    }

    pub fn values(&self) -> &Map {
        &self.values
    }
}

fn handler_key() -> &'static Regex {
    static KEY: OnceLock<Regex> = OnceLock::new();
    KEY.get_or_init(|| Regex::new(r"^on[A-Z]").expect("constant pattern"))
}

/// Pull `on<Type>` function entries out of `values`
///
/// The event type is the key without `on`, with its first letter lowered.
fn take_event_handlers(values: &mut Map) -> Vec<(String, Listener)> {
    let keys: Vec<String> = values
        .iter()
        .filter(|(key, value)| handler_key().is_match(key) && value.as_function().is_some())
        .map(|(key, _)| key.clone())
        .collect();

    keys.into_iter()
        .filter_map(|key| {
            let listener = values.shift_remove(&key)?.as_function()?.clone();
            let kind = format!("{}{}", key[2..3].to_ascii_lowercase(), &key[3..]);
            Some((kind, listener))
        })
        .collect()
}

// =============================================================================
// Widget
// =============================================================================

pub(crate) struct WidgetInner {
    id: String,
    registry: Registry,
    behavior: Rc<dyn Lifecycle>,
    attrs: RefCell<Schema>,
    states: RefCell<StateSet>,
    emitter: EventEmitter,
    dom_events: RefCell<DomEvents>,
    plugins: RefCell<IndexMap<String, Rc<dyn Plugin>>>,
    main: Cell<Option<NodeId>>,
    options: Map,
    cancel: CancelToken,
    /// Set once teardown starts, before any dispose event is emitted
    disposing: Cell<bool>,
}

/// Handle to a widget instance (cheap to clone)
#[derive(Clone)]
pub struct Widget {
    inner: Rc<WidgetInner>,
}

/// Non-owning widget handle
#[derive(Clone)]
pub struct WeakWidget {
    inner: Weak<WidgetInner>,
}

impl WeakWidget {
    pub fn upgrade(&self) -> Option<Widget> {
        self.inner.upgrade().map(|inner| Widget { inner })
    }

    pub fn ptr_eq(&self, widget: &Widget) -> bool {
        std::ptr::eq(self.inner.as_ptr(), Rc::as_ptr(&widget.inner))
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl PartialEq for Widget {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Widget")
            .field("type", &self.type_name())
            .field("id", &self.id())
            .field("states", &*self.inner.states.borrow())
            .finish()
    }
}

impl Widget {
    /// Construct a widget and register it
    ///
    /// Fails if an option targets a read-only attribute or the main selector
    /// is invalid; nothing is registered in that case.
    pub fn new(registry: &Registry, behavior: Rc<dyn Lifecycle>, options: Options) -> Result<Widget> {
        let Options { id, main, mut values } = options;
        let type_name = behavior.type_name();

        let id = id.unwrap_or_else(|| registry.get_guid(None));
        let dom = registry.dom();
        let main = match main {
            Some(MainRef::Node(node)) => Some(node),
            Some(MainRef::Selector(selector)) => dom.query(&selector, dom.root())?,
            None => None,
        };

        let mut schema = base_schema(type_name);
        schema.extend(behavior.attributes());

        let mut states: StateSet = behavior.states().iter().copied().collect();
        states.add("disable");

        let handlers = take_event_handlers(&mut values);

        let widget = Widget {
            inner: Rc::new(WidgetInner {
                id,
                registry: registry.clone(),
                behavior,
                attrs: RefCell::new(schema),
                states: RefCell::new(states),
                emitter: EventEmitter::new(),
                dom_events: RefCell::new(DomEvents::default()),
                plugins: RefCell::new(IndexMap::new()),
                main: Cell::new(main),
                options: values.clone(),
                cancel: CancelToken::new(),
                disposing: Cell::new(false),
            }),
        };

        for (kind, listener) in handlers {
            widget.add_listener(&kind, listener);
        }

        widget.set_all(values, SetOptions::default())?;

        registry.add(&widget);
        widget.add_state("init");
        tracing::debug!(id = %widget.id(), kind = type_name, "widget created");

        widget.emit("init", &[]);
        Ok(widget)
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn type_name(&self) -> &'static str {
        self.inner.behavior.type_name()
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn dom(&self) -> &Dom {
        self.inner.registry.dom()
    }

    pub fn downgrade(&self) -> WeakWidget {
        WeakWidget {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn ptr_eq(&self, other: &Widget) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The behaviour object, if it is a `T`
    pub fn behavior<T: Lifecycle>(&self) -> Option<Rc<T>> {
        AsAnyRc::as_any_rc(Rc::clone(&self.inner.behavior))
            .downcast::<T>()
            .ok()
    }

    /// The main element
    pub fn main(&self) -> Option<NodeId> {
        self.inner.main.get()
    }

    /// Replace the main element
    ///
    /// For widgets that build their own main element in `init_structure`.
    /// The `main` attribute itself stays read-only.
    pub fn set_main(&self, node: Option<NodeId>) {
        self.inner.main.set(node);
    }

    /// Constructor options, without `id`, `main` and `on<Type>` listeners
    pub fn options(&self) -> &Map {
        &self.inner.options
    }

    pub fn is_disposed(&self) -> bool {
        self.is("dispose")
    }

    pub(crate) fn dom_events(&self) -> &RefCell<DomEvents> {
        &self.inner.dom_events
    }

    pub(crate) fn plugins(&self) -> &RefCell<IndexMap<String, Rc<dyn Plugin>>> {
        &self.inner.plugins
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(WidgetError::Disposed(self.id().to_string()));
        }
        Ok(())
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// Read an attribute through its getter, if any
    ///
    /// Unknown names read as `undefined`.
    pub fn get(&self, name: &str) -> Value {
        let (value, getter) = {
            let attrs = self.inner.attrs.borrow();
            match attrs.get(name) {
                Some(attr) => (attr.value.clone(), attr.getter.clone()),
                None => return Value::Undefined,
            }
        };

        match getter {
            Some(getter) => getter(self, &value, name),
            None => value,
        }
    }

    /// Snapshot of one attribute descriptor
    pub fn attribute(&self, name: &str) -> Option<Attribute> {
        self.inner.attrs.borrow().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.set_with(name, value, SetOptions::default())
    }

    pub fn set_with(&self, name: &str, value: impl Into<Value>, options: SetOptions) -> Result<()> {
        self.set_all([(name.to_string(), value.into())], options)
    }

    /// Write a batch of attributes
    ///
    /// A read-only name anywhere in the batch fails the whole call before
    /// anything is written. Per key, in input order: the setter runs, plain
    /// mappings merge into a previous plain mapping unless `overwrite` is
    /// set, the value is stored, and if it changed `propertychange` is
    /// emitted (after `init`, unless `silent`). Repaint-flagged changes are
    /// collected and passed to a single `repaint` once the batch is done,
    /// if the widget has rendered.
    pub fn set_all<I, K, V>(&self, values: I, options: SetOptions) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.ensure_alive()?;

        let batch: Vec<(String, Value)> = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        {
            let attrs = self.inner.attrs.borrow();
            if let Some((name, _)) = batch
                .iter()
                .find(|(name, _)| attrs.get(name).is_some_and(Attribute::is_read_only))
            {
                return Err(WidgetError::ReadOnly(name.clone()));
            }
        }

        let is_inited = self.is("init");
        let mut changes = Changes::new();

        for (key, mut value) in batch {
            let setter = self.inner.attrs.borrow_mut().entry(&key).setter.clone();
            if let Some(setter) = setter {
                setter(self, &value, &key);
            }

            let (old, repaint) = {
                let mut attrs = self.inner.attrs.borrow_mut();
                let attr = attrs.entry(&key);
                let old = attr.value.clone();

                let merged = match (&old, &value) {
                    (Value::Object(prev), Value::Object(next)) if !options.overwrite => {
                        let mut merged = (**prev).clone();
                        merged.extend(next.iter().map(|(k, v)| (k.clone(), v.clone())));
                        Some(Value::from(merged))
                    }
                    _ => None,
                };
                if let Some(merged) = merged {
                    value = merged;
                }

                attr.value = value.clone();
                (old, attr.repaint)
            };

            if is_equal(&value, &old) {
                continue;
            }

            if !options.silent && is_inited {
                self.emit(
                    "propertychange",
                    &[Value::from(key.as_str()), old.clone(), value.clone()],
                );
            }

            if repaint {
                changes.insert(key, Change { old, new: value });
            }
        }

        if self.is("render") && !changes.is_empty() {
            self.repaint(Some(&changes));
        }

        Ok(())
    }

    // =========================================================================
    // States
    // =========================================================================

    pub fn is(&self, state: &str) -> bool {
        self.inner.states.borrow().is(state)
    }

    pub fn add_state(&self, state: &str) {
        self.inner.states.borrow_mut().add(state);
    }

    pub fn remove_state(&self, state: &str) {
        self.inner.states.borrow_mut().remove(state);
    }

    pub fn toggle_state(&self, state: &str, force: Option<bool>) {
        self.inner.states.borrow_mut().toggle(state, force);
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Render the widget
    ///
    /// Structure and event hooks run on the first call only; every call
    /// repaints. The main element is stamped with the instance attribute.
    pub fn render(&self) -> Result<()> {
        self.ensure_alive()?;

        let rendered = self.is("render");
        if !rendered {
            tracing::debug!(id = %self.id(), kind = self.type_name(), "first render");
            self.emit("beforerender", &[]);

            self.inner.behavior.init_structure(self)?;
            self.inner.behavior.init_event(self)?;

            if let Some(main) = self.main() {
                let attr = self.registry().settings().instance_attr;
                self.dom().set_attribute(main, &attr, self.id());
            }

            self.add_state("render");
        }

        self.repaint(None);

        if !rendered {
            self.emit("afterrender", &[]);
        }

        Ok(())
    }

    pub fn repaint(&self, changes: Option<&Changes>) {
        self.inner.behavior.repaint(self, changes);
    }

    /// Leave the `disable` state; no-op if already enabled
    pub fn enable(&self) {
        if self.is("disable") && !self.is_disposed() {
            self.inner.behavior.on_enable(self);
            self.remove_state("disable");
            self.emit("enable", &[]);
        }
    }

    /// Enter the `disable` state; no-op if already disabled
    pub fn disable(&self) {
        if !self.is("disable") {
            self.inner.behavior.on_disable(self);
            self.add_state("disable");
            self.emit("disable", &[]);
        }
    }

    /// Tear the widget down; no-op if already disposed
    pub fn dispose(&self) {
        if self.inner.disposing.replace(true) || self.is_disposed() {
            return;
        }
        tracing::debug!(id = %self.id(), kind = self.type_name(), "disposing widget");

        self.emit("beforedispose", &[]);
        self.disable();

        self.inner.behavior.dispose(self);
        self.inner.cancel.revoke();

        self.clear_events(None);

        let registry = self.registry().clone();
        registry.dispose_plugins(self);
        registry.remove(self);

        self.emit("afterdispose", &[]);
        self.inner.emitter.off(None, None);

        self.add_state("dispose");

        if let Some(main) = self.inner.main.take() {
            let attr = registry.settings().instance_attr;
            self.dom().remove_attribute(main, &attr);
        }
    }

    // =========================================================================
    // Custom events
    // =========================================================================

    /// Listen for a widget event; returns the handle `off` accepts
    pub fn on<F>(&self, kind: &str, listener: F) -> Listener
    where
        F: Fn(&WidgetEvent, &[Value]) + 'static,
    {
        let listener: Listener = Rc::new(listener);
        self.add_listener(kind, listener.clone());
        listener
    }

    /// Listen for the next occurrence only
    pub fn once<F>(&self, kind: &str, listener: F) -> Listener
    where
        F: Fn(&WidgetEvent, &[Value]) + 'static,
    {
        let listener: Listener = Rc::new(listener);
        self.inner.emitter.once(kind, listener.clone());
        listener
    }

    pub fn add_listener(&self, kind: &str, listener: Listener) {
        self.inner.emitter.on(kind, listener);
    }

    /// Remove listeners; see [`EventEmitter::off`]
    pub fn off(&self, kind: Option<&str>, listener: Option<&Listener>) {
        self.inner.emitter.off(kind, listener);
    }

    /// Emit a widget event
    ///
    /// The behaviour's [`Lifecycle::handle_event`] runs first, then the
    /// listeners, all with `{ type, target }` followed by `args`.
    pub fn emit(&self, kind: &str, args: &[Value]) {
        let event = WidgetEvent::new(kind, self.clone());
        self.inner.behavior.handle_event(self, &event, args);
        self.inner.emitter.emit(&event, args);
    }

    pub fn listener_count(&self, kind: &str) -> usize {
        self.inner.emitter.listener_count(kind)
    }

    // =========================================================================
    // Timers
    // =========================================================================

    /// Run `callback` after `delay` ms unless the widget is disposed first
    pub fn set_timeout<F>(&self, delay: u64, callback: F) -> TimerId
    where
        F: FnOnce(&Widget) + 'static,
    {
        let token = self.inner.cancel.clone();
        let weak = self.downgrade();

        self.dom().timers().set_timeout(delay, move || {
            if token.is_revoked() {
                tracing::trace!("timer skipped, widget disposed");
                return;
            }
            if let Some(widget) = weak.upgrade() {
                callback(&widget);
            }
        })
    }

    pub fn clear_timeout(&self, id: TimerId) -> bool {
        self.dom().timers().clear_timeout(id)
    }

    // =========================================================================
    // Plugins
    // =========================================================================

    /// Active plugin instance by name
    pub fn plugin(&self, name: &str) -> Option<Rc<dyn Plugin>> {
        self.inner.plugins.borrow().get(name).cloned()
    }

    /// Active plugin instance by name, downcast to its concrete type
    pub fn plugin_as<T: Plugin>(&self, name: &str) -> Option<Rc<T>> {
        let plugin = self.plugin(name)?;
        AsAnyRc::as_any_rc(plugin).downcast::<T>().ok()
    }

    /// Enable a plugin, creating it on first use
    ///
    /// Options come from the constructor option `plugin.<option_name>`,
    /// where `option_name` defaults to the lower-cased plugin name.
    pub fn enable_plugin(&self, name: &str, option_name: Option<&str>) -> Result<()> {
        let option_name = option_name.map_or_else(|| name.to_lowercase(), str::to_string);
        let options = self
            .inner
            .options
            .get("plugin")
            .and_then(|plugins| plugins.get(&option_name))
            .cloned()
            .unwrap_or_default();

        self.registry().clone().enable_plugin(self, name, options)?;
        Ok(())
    }

    pub fn disable_plugin(&self, name: &str) {
        self.registry().clone().disable_plugin(self, name);
    }
}

fn base_schema(type_name: &'static str) -> Schema {
    Schema::new()
        .with("type", Attribute::new(type_name).read_only())
        .with(
            "id",
            Attribute::default()
                .read_only()
                .getter(|widget, _, _| Value::from(widget.id())),
        )
        .with(
            "main",
            Attribute::default()
                .read_only()
                .getter(|widget, _, _| widget.main().map_or(Value::Null, Value::Node)),
        )
}
