//! Widget registry
//!
//! One [`Registry`] value owns everything shared between widgets of a
//! document: the GUID counter, the live instances, the registered widget and
//! plugin types, the global configuration and the shared event pool for the
//! singleton targets. It is passed to widget constructors explicitly; tests
//! build as many isolated registries as they need.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use vane_dom::{Dom, NodeId};

use crate::config::{RegistryConfig, RegistryConfigPatch};
use crate::dom_event::GlobalEventPool;
use crate::error::{Result, WidgetError};
use crate::plugin::{Plugin, PluginFactory};
use crate::value::{Map, Value};
use crate::widget::{Options, Widget};

/// First GUID handed out by a fresh registry
pub const GUID_START: u64 = 0x861005;

const DEFAULT_GUID_PREFIX: &str = "s";

/// Builds a registered widget type
pub type WidgetFactory = Rc<dyn Fn(&Registry, Options) -> Result<Widget>>;

/// What [`Registry::dispose`] tears down
#[derive(Debug, Clone)]
pub enum DisposeTarget {
    /// Every live widget
    All,
    /// The widget with this id, if any
    Id(String),
    Widget(Widget),
    /// Every widget whose main element lies inside this element
    Element(NodeId),
}

impl From<&str> for DisposeTarget {
    fn from(id: &str) -> Self {
        DisposeTarget::Id(id.to_string())
    }
}

impl From<String> for DisposeTarget {
    fn from(id: String) -> Self {
        DisposeTarget::Id(id)
    }
}

impl From<&Widget> for DisposeTarget {
    fn from(widget: &Widget) -> Self {
        DisposeTarget::Widget(widget.clone())
    }
}

impl From<NodeId> for DisposeTarget {
    fn from(node: NodeId) -> Self {
        DisposeTarget::Element(node)
    }
}

impl<T: Into<DisposeTarget>> From<Option<T>> for DisposeTarget {
    fn from(target: Option<T>) -> Self {
        target.map_or(DisposeTarget::All, Into::into)
    }
}

struct RegistryInner {
    dom: Dom,
    config: RefCell<RegistryConfig>,
    guid: Cell<u64>,
    widgets: RefCell<IndexMap<String, Widget>>,
    types: RefCell<IndexMap<String, WidgetFactory>>,
    plugins: RefCell<IndexMap<String, PluginFactory>>,
    event_pool: GlobalEventPool,
}

/// Handle to a registry (cheap to clone)
#[derive(Clone)]
pub struct Registry {
    inner: Rc<RegistryInner>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Dom::new())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &*self.inner.config.borrow())
            .field("guid", &self.inner.guid.get())
            .field("widgets", &self.inner.widgets.borrow().len())
            .field("types", &self.inner.types.borrow().keys().collect::<Vec<_>>())
            .field("plugins", &self.inner.plugins.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    pub fn new(dom: Dom) -> Self {
        Self::with_config(dom, RegistryConfig::default())
    }

    pub fn with_config(dom: Dom, config: RegistryConfig) -> Self {
        Self {
            inner: Rc::new(RegistryInner {
                event_pool: GlobalEventPool::new(dom.clone()),
                dom,
                config: RefCell::new(config),
                guid: Cell::new(GUID_START),
                widgets: RefCell::new(IndexMap::new()),
                types: RefCell::new(IndexMap::new()),
                plugins: RefCell::new(IndexMap::new()),
            }),
        }
    }

    pub fn dom(&self) -> &Dom {
        &self.inner.dom
    }

    pub fn event_pool(&self) -> &GlobalEventPool {
        &self.inner.event_pool
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Merge a partial configuration into the current one
    pub fn config(&self, patch: RegistryConfigPatch) {
        self.inner.config.borrow_mut().apply(patch);
    }

    /// Configuration value by wire name (`configAttr`, `instanceAttr`,
    /// `uiClassPrefix`)
    pub fn get_config(&self, name: &str) -> Option<String> {
        self.inner.config.borrow().get(name).map(str::to_string)
    }

    /// Snapshot of the whole configuration
    pub fn settings(&self) -> RegistryConfig {
        self.inner.config.borrow().clone()
    }

    // =========================================================================
    // Ids and instances
    // =========================================================================

    /// Next unique id, `prefix` defaulting to `s`
    ///
    /// The counter never goes back, so ids stay unique across dispose and
    /// create cycles.
    pub fn get_guid(&self, prefix: Option<&str>) -> String {
        let n = self.inner.guid.get();
        self.inner.guid.set(n + 1);
        format!("{}{}", prefix.unwrap_or(DEFAULT_GUID_PREFIX), n)
    }

    /// Store a widget under its id, replacing a different instance
    pub fn add(&self, widget: &Widget) {
        let mut widgets = self.inner.widgets.borrow_mut();
        let replace = widgets
            .get(widget.id())
            .map_or(true, |existing| !existing.ptr_eq(widget));
        if replace {
            widgets.insert(widget.id().to_string(), widget.clone());
        }
    }

    /// Drop a widget, if it is the instance stored under its id
    pub fn remove(&self, widget: &Widget) {
        let mut widgets = self.inner.widgets.borrow_mut();
        if widgets
            .get(widget.id())
            .is_some_and(|existing| existing.ptr_eq(widget))
        {
            widgets.shift_remove(widget.id());
        }
    }

    pub fn get(&self, id: &str) -> Option<Widget> {
        self.inner.widgets.borrow().get(id).cloned()
    }

    /// Live widgets in creation order
    pub fn widgets(&self) -> Vec<Widget> {
        self.inner.widgets.borrow().values().cloned().collect()
    }

    /// Widgets whose main element lies inside `scope`, in document order
    ///
    /// Main elements are recognised by the instance attribute stamped at
    /// render, so unrendered widgets are not found.
    pub fn find(&self, scope: NodeId) -> Vec<Widget> {
        let attr = self.settings().instance_attr;
        let dom = self.dom();

        dom.descendants(scope)
            .into_iter()
            .filter_map(|node| dom.get_attribute(node, &attr))
            .filter_map(|id| self.get(&id))
            .collect()
    }

    /// Dispose every widget, one by id, one instance, or every widget
    /// inside an element
    pub fn dispose(&self, target: impl Into<DisposeTarget>) {
        let widgets = match target.into() {
            DisposeTarget::All => self.widgets(),
            DisposeTarget::Id(id) => self.get(&id).into_iter().collect(),
            DisposeTarget::Widget(widget) => vec![widget],
            DisposeTarget::Element(node) => self.find(node),
        };

        tracing::debug!(count = widgets.len(), "disposing widgets");
        for widget in widgets {
            widget.dispose();
        }
    }

    // =========================================================================
    // Widget types
    // =========================================================================

    /// Register a widget type; a name can be registered only once
    ///
    /// `name` must be the `type_name` of the widgets the factory builds.
    pub fn register<F>(&self, name: &str, factory: F) -> Result<()>
    where
        F: Fn(&Registry, Options) -> Result<Widget> + 'static,
    {
        let mut types = self.inner.types.borrow_mut();
        if types.contains_key(name) {
            return Err(WidgetError::DuplicateType(name.to_string()));
        }
        types.insert(name.to_string(), Rc::new(factory));
        tracing::debug!(kind = name, "widget type registered");
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.inner.types.borrow().contains_key(name)
    }

    /// Construct a registered widget type
    pub fn create(&self, name: &str, options: Options) -> Result<Widget> {
        let factory = self
            .inner
            .types
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| WidgetError::UnknownType(name.to_string()))?;
        let widget = factory(self, options)?;
        debug_assert_eq!(
            widget.type_name(),
            name,
            "factory registered as {name} built a {}",
            widget.type_name()
        );
        Ok(widget)
    }

    /// Build and render the widgets declared under `scope`
    ///
    /// Each element carrying the config attribute holds a JSON object with
    /// a `type` key naming a registered type; the other keys become
    /// options and the element becomes the main element. Elements already
    /// bound to a live widget are skipped.
    pub fn init(&self, scope: NodeId) -> Result<Vec<Widget>> {
        let settings = self.settings();
        let dom = self.dom().clone();

        let mut created = Vec::new();
        for node in std::iter::once(scope).chain(dom.descendants(scope)) {
            let Some(raw) = dom.get_attribute(node, &settings.config_attr) else {
                continue;
            };
            let bound = dom
                .get_attribute(node, &settings.instance_attr)
                .and_then(|id| self.get(&id))
                .is_some();
            if bound {
                continue;
            }

            let mut values = parse_declaration(&raw)?;
            let type_name = values
                .shift_remove("type")
                .and_then(|v| v.as_str().map(str::to_string))
                .ok_or_else(|| {
                    WidgetError::Config(format!("missing widget type in `{raw}`"))
                })?;

            let widget = self.create(&type_name, Options::from_map(values).main(node))?;
            widget.render()?;
            created.push(widget);
        }

        tracing::debug!(count = created.len(), "declared widgets initialised");
        Ok(created)
    }

    // =========================================================================
    // Plugins
    // =========================================================================

    /// Register a plugin type; a name can be registered only once
    pub fn register_plugin<F>(&self, name: &str, factory: F) -> Result<()>
    where
        F: Fn(&Widget, &Value) -> Result<Rc<dyn Plugin>> + 'static,
    {
        let mut plugins = self.inner.plugins.borrow_mut();
        if plugins.contains_key(name) {
            return Err(WidgetError::DuplicatePlugin(name.to_string()));
        }
        plugins.insert(name.to_string(), Rc::new(factory));
        Ok(())
    }

    pub fn is_plugin_registered(&self, name: &str) -> bool {
        self.inner.plugins.borrow().contains_key(name)
    }

    /// Enable `name` on `widget`, creating the instance on first use
    ///
    /// A widget holds at most one instance per plugin name; `options` only
    /// matter when the instance is created.
    pub fn enable_plugin(&self, widget: &Widget, name: &str, options: Value) -> Result<Rc<dyn Plugin>> {
        let existing = widget.plugins().borrow().get(name).cloned();
        let plugin = match existing {
            Some(plugin) => plugin,
            None => {
                let factory = self
                    .inner
                    .plugins
                    .borrow()
                    .get(name)
                    .cloned()
                    .ok_or_else(|| WidgetError::UnknownPlugin(name.to_string()))?;
                let plugin = factory(widget, &options)?;
                widget
                    .plugins()
                    .borrow_mut()
                    .insert(name.to_string(), plugin.clone());
                plugin
            }
        };

        plugin.enable()?;
        tracing::debug!(plugin = name, target = %widget.id(), "plugin enabled");
        Ok(plugin)
    }

    /// Disable `name` on `widget`, keeping the instance
    pub fn disable_plugin(&self, widget: &Widget, name: &str) {
        if let Some(plugin) = widget.plugin(name) {
            plugin.disable();
            tracing::debug!(plugin = name, target = %widget.id(), "plugin disabled");
        }
    }

    /// Dispose and drop every plugin instance of `widget`
    pub fn dispose_plugins(&self, widget: &Widget) {
        let plugins = std::mem::take(&mut *widget.plugins().borrow_mut());
        for (name, plugin) in plugins {
            plugin.dispose();
            tracing::trace!(plugin = %name, target = %widget.id(), "plugin disposed");
        }
    }
}

fn parse_declaration(raw: &str) -> Result<Map> {
    let json: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| WidgetError::Config(format!("invalid widget declaration `{raw}`: {e}")))?;

    match Value::from(json) {
        Value::Object(map) => Ok((*map).clone()),
        _ => Err(WidgetError::Config(format!(
            "widget declaration must be an object: `{raw}`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::attribute::Schema;
    use crate::plugin::PluginCore;
    use crate::test_support::{probe, registry};

    fn register_probe(registry: &Registry) {
        registry
            .register("Probe", |registry, options| {
                Widget::new(registry, probe(Schema::new()), options)
            })
            .unwrap();
    }

    fn rendered_in(registry: &Registry, parent: NodeId) -> Widget {
        let dom = registry.dom();
        let node = dom.create_element("div");
        dom.append_child(parent, node);
        let widget = registry.create("Probe", Options::new().main(node)).unwrap();
        widget.render().unwrap();
        widget
    }

    #[test]
    fn test_guid_strictly_increasing() {
        let registry = registry();
        register_probe(&registry);

        let mut last = registry.get_guid(None);
        assert_eq!(last, format!("s{}", GUID_START));
        for _ in 0..20 {
            let widget = registry.create("Probe", Options::new()).unwrap();
            widget.dispose();
            let next = registry.get_guid(Some("s"));
            let n = |s: &str| s[1..].parse::<u64>().unwrap();
            assert!(n(&next) > n(&last));
            last = next;
        }
        assert!(registry.get_guid(Some("e")).starts_with('e'));
    }

    #[test]
    fn test_duplicate_register_keeps_first() {
        let registry = registry();
        register_probe(&registry);

        let err = registry
            .register("Probe", |_, _| Err(WidgetError::UnknownType("never".into())))
            .unwrap_err();
        assert_eq!(err.to_string(), "Probe is exists!");
        assert!(registry.create("Probe", Options::new()).is_ok());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "factory registered as Other built a Probe")]
    fn test_factory_must_build_its_registered_type() {
        let registry = registry();
        registry
            .register("Other", |registry, options| {
                Widget::new(registry, probe(Schema::new()), options)
            })
            .unwrap();
        let _ = registry.create("Other", Options::new());
    }

    #[test]
    fn test_create_unknown_type() {
        let registry = registry();
        assert!(matches!(
            registry.create("Nope", Options::new()),
            Err(WidgetError::UnknownType(_))
        ));
    }

    #[test]
    fn test_add_replaces_and_remove_checks_identity() {
        let registry = registry();
        register_probe(&registry);
        let first = registry.create("Probe", Options::new().id("same")).unwrap();
        let second = registry.create("Probe", Options::new().id("same")).unwrap();
        assert!(registry.get("same").is_some_and(|w| w == second));

        registry.remove(&first);
        assert!(registry.get("same").is_some());
        registry.remove(&second);
        assert!(registry.get("same").is_none());
    }

    #[test]
    fn test_find_in_document_order() {
        let registry = registry();
        register_probe(&registry);
        let dom = registry.dom().clone();

        let scope = dom.create_element("section");
        let nested = dom.create_element("div");
        dom.append_child(dom.body(), scope);
        dom.append_child(scope, nested);

        let outside = rendered_in(&registry, dom.body());
        let deep = rendered_in(&registry, nested);
        let shallow = rendered_in(&registry, scope);
        let _unrendered = registry.create("Probe", Options::new().main(scope)).unwrap();

        let found = registry.find(scope);
        assert_eq!(found, vec![deep.clone(), shallow]);
        assert!(!found.contains(&outside));

        assert_eq!(registry.find(nested), vec![deep]);
    }

    #[test]
    fn test_dispose_polymorphic() {
        let registry = registry();
        register_probe(&registry);
        let dom = registry.dom().clone();
        let scope = dom.create_element("div");
        dom.append_child(dom.body(), scope);

        let a = registry.create("Probe", Options::new().id("a")).unwrap();
        let b = registry.create("Probe", Options::new()).unwrap();
        let c = rendered_in(&registry, scope);
        let d = registry.create("Probe", Options::new()).unwrap();

        registry.dispose("a");
        registry.dispose("missing");
        assert!(a.is_disposed());

        registry.dispose(&b);
        assert!(b.is_disposed());

        registry.dispose(scope);
        assert!(c.is_disposed());
        assert!(!d.is_disposed());

        registry.dispose(None::<&str>);
        assert!(d.is_disposed());
        assert!(registry.widgets().is_empty());
    }

    #[test]
    fn test_config_patch_and_get() {
        let registry = registry();
        assert_eq!(registry.get_config("instanceAttr").as_deref(), Some("s-id"));

        registry.config(RegistryConfigPatch {
            instance_attr: Some("data-wid".into()),
            ..Default::default()
        });
        assert_eq!(registry.get_config("instanceAttr").as_deref(), Some("data-wid"));
        assert_eq!(registry.get_config("configAttr").as_deref(), Some("s-ui"));
        assert_eq!(registry.get_config("nope"), None);

        register_probe(&registry);
        let node = registry.dom().create_element("div");
        let widget = registry.create("Probe", Options::new().main(node)).unwrap();
        widget.render().unwrap();
        assert!(registry.dom().has_attribute(node, "data-wid"));
    }

    #[test]
    fn test_init_declared_widgets() {
        let registry = registry();
        register_probe(&registry);
        let dom = registry.dom().clone();

        let first = dom.create_element("div");
        dom.set_attribute(first, "s-ui", r#"{"type":"Probe","id":"one","title":"hi"}"#);
        let second = dom.create_element("div");
        dom.set_attribute(second, "s-ui", r#"{"type":"Probe"}"#);
        dom.append_child(dom.body(), first);
        dom.append_child(dom.body(), second);

        let created = registry.init(dom.body()).unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].id(), "one");
        assert_eq!(created[0].main(), Some(first));
        assert_eq!(created[0].get("title").as_str(), Some("hi"));
        assert!(created[1].is("render"));

        // Already bound elements are skipped
        assert!(registry.init(dom.body()).unwrap().is_empty());
    }

    #[test]
    fn test_init_rejects_bad_declarations() {
        let registry = registry();
        register_probe(&registry);
        let dom = registry.dom().clone();
        let node = dom.create_element("div");
        dom.append_child(dom.body(), node);

        dom.set_attribute(node, "s-ui", "{not json");
        assert!(matches!(registry.init(dom.body()), Err(WidgetError::Config(_))));

        dom.set_attribute(node, "s-ui", r#"{"title":"x"}"#);
        assert!(matches!(registry.init(dom.body()), Err(WidgetError::Config(_))));

        dom.set_attribute(node, "s-ui", r#"{"type":"Other"}"#);
        assert!(matches!(registry.init(dom.body()), Err(WidgetError::UnknownType(_))));
    }

    struct Marker {
        core: PluginCore,
        events: Rc<RefCell<Vec<String>>>,
    }

    impl Plugin for Marker {
        fn type_name(&self) -> &'static str {
            "Marker"
        }

        fn core(&self) -> &PluginCore {
            &self.core
        }

        fn on_enable(&self, _target: &Widget) {
            self.events.borrow_mut().push("enable".into());
        }

        fn on_disable(&self, _target: &Widget) {
            self.events.borrow_mut().push("disable".into());
        }

        fn on_dispose(&self, _target: &Widget) {
            self.events.borrow_mut().push("dispose".into());
        }
    }

    #[test]
    fn test_plugin_table() {
        let registry = registry();
        let events = Rc::new(RefCell::new(Vec::new()));
        let created = Rc::new(Cell::new(0));

        let (e, c) = (events.clone(), created.clone());
        registry
            .register_plugin("Marker", move |target, options| {
                c.set(c.get() + 1);
                let level = options.get("level").and_then(Value::as_f64).unwrap_or_default();
                e.borrow_mut().push(format!("options:{level}"));
                Ok(Rc::new(Marker {
                    core: PluginCore::new(target, options.clone()),
                    events: e.clone(),
                }) as Rc<dyn Plugin>)
            })
            .unwrap();
        assert!(matches!(
            registry.register_plugin("Marker", |_, _| Err(WidgetError::UnknownPlugin("x".into()))),
            Err(WidgetError::DuplicatePlugin(_))
        ));

        let options = Options::new().set(
            "plugin",
            Value::object([("marker", Value::object([("level", 2)]))]),
        );
        let widget = Widget::new(&registry, probe(Schema::new()), options).unwrap();

        widget.enable_plugin("Marker", None).unwrap();
        widget.disable_plugin("Marker");
        widget.enable_plugin("Marker", None).unwrap();
        assert_eq!(created.get(), 1);
        assert!(widget.plugin_as::<Marker>("Marker").is_some());

        assert!(matches!(
            widget.enable_plugin("Ghost", None),
            Err(WidgetError::UnknownPlugin(_))
        ));

        widget.dispose();
        assert!(widget.plugin("Marker").is_none());
        assert_eq!(
            *events.borrow(),
            vec!["options:2", "enable", "disable", "enable", "disable", "dispose"]
        );
    }
}
