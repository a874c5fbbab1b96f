//! Plugin protocol
//!
//! A plugin is an optional capability attached to one target widget. Plugin
//! types are registered on the [`Registry`](crate::Registry) under a name;
//! `enable_plugin` creates the instance on first use and stores it on the
//! widget, `disable_plugin` only disables it, and the widget's `dispose`
//! tears every instance down.
//!
//! Plugins hold their target weakly: the widget owns the plugin, never the
//! other way round.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use vane_dom::NodeId;

use crate::error::Result;
use crate::state::StateSet;
use crate::value::Value;
use crate::widget::{AsAnyRc, WeakWidget, Widget};

/// Builds a plugin bound to `target` from its options
pub type PluginFactory = Rc<dyn Fn(&Widget, &Value) -> Result<Rc<dyn Plugin>>>;

/// State shared by every plugin implementation
pub struct PluginCore {
    target: WeakWidget,
    options: Value,
    states: RefCell<StateSet>,
    main: Cell<Option<NodeId>>,
}

impl PluginCore {
    /// Starts in the `disable` state
    pub fn new(target: &Widget, options: Value) -> Self {
        Self {
            target: target.downgrade(),
            options,
            states: RefCell::new(["disable"].into_iter().collect()),
            main: Cell::new(None),
        }
    }

    /// The target widget, while it is alive
    pub fn target(&self) -> Option<Widget> {
        self.target.upgrade()
    }

    pub fn options(&self) -> &Value {
        &self.options
    }

    /// Number option with a fallback
    pub fn option_f64(&self, name: &str, default: f64) -> f64 {
        self.options
            .get(name)
            .and_then(Value::as_f64)
            .unwrap_or(default)
    }

    pub fn is(&self, state: &str) -> bool {
        self.states.borrow().is(state)
    }

    pub fn add_state(&self, state: &str) {
        self.states.borrow_mut().add(state);
    }

    pub fn remove_state(&self, state: &str) {
        self.states.borrow_mut().remove(state);
    }

    pub fn main(&self) -> Option<NodeId> {
        self.main.get()
    }

    pub fn set_main(&self, node: Option<NodeId>) {
        self.main.set(node);
    }
}

impl fmt::Debug for PluginCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCore")
            .field("target", &self.target().map(|t| t.id().to_string()))
            .field("states", &*self.states.borrow())
            .field("main", &self.main.get())
            .finish()
    }
}

/// A widget capability with its own enable/disable/dispose lifecycle
///
/// Implementors provide [`core`](Plugin::core) and override the hooks they
/// need; the lifecycle methods are provided.
pub trait Plugin: AsAnyRc {
    /// Registered plugin name
    fn type_name(&self) -> &'static str;

    fn core(&self) -> &PluginCore;

    /// Build structure (first render only)
    fn init_dom(&self, _target: &Widget) -> Result<()> {
        Ok(())
    }

    /// Wire events (first render only)
    fn init_event(&self, _target: &Widget) -> Result<()> {
        Ok(())
    }

    fn repaint(&self, _target: &Widget) {}

    /// Runs before the `disable` state is removed
    fn on_enable(&self, _target: &Widget) {}

    /// Runs before the `disable` state is added
    fn on_disable(&self, _target: &Widget) {}

    /// Release resources; the plugin is disabled already
    fn on_dispose(&self, _target: &Widget) {}

    fn target(&self) -> Option<Widget> {
        self.core().target()
    }

    fn is(&self, state: &str) -> bool {
        self.core().is(state)
    }

    /// First call builds structure and events; every call repaints
    fn render(&self) -> Result<()> {
        let Some(target) = self.target() else {
            return Ok(());
        };

        if !self.is("render") {
            self.init_dom(&target)?;
            self.init_event(&target)?;
            self.core().add_state("render");
        }

        self.repaint(&target);
        Ok(())
    }

    /// Render on first use, then leave the `disable` state
    fn enable(&self) -> Result<()> {
        if !self.is("disable") || self.is("dispose") {
            return Ok(());
        }
        let Some(target) = self.target() else {
            return Ok(());
        };

        if !self.is("render") {
            self.render()?;
        }
        self.on_enable(&target);
        self.core().remove_state("disable");
        tracing::trace!(plugin = self.type_name(), target = %target.id(), "plugin enabled");
        Ok(())
    }

    fn disable(&self) {
        if self.is("disable") {
            return;
        }
        if let Some(target) = self.target() {
            self.on_disable(&target);
        }
        self.core().add_state("disable");
    }

    fn dispose(&self) {
        if self.is("dispose") {
            return;
        }
        self.disable();
        if let Some(target) = self.target() {
            self.on_dispose(&target);
        }
        self.core().set_main(None);
        self.core().add_state("dispose");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::Schema;
    use crate::test_support::{probe, registry};
    use crate::widget::Options;

    #[derive(Debug)]
    struct Counting {
        core: PluginCore,
        log: RefCell<Vec<&'static str>>,
    }

    impl Plugin for Counting {
        fn type_name(&self) -> &'static str {
            "Counting"
        }

        fn core(&self) -> &PluginCore {
            &self.core
        }

        fn init_dom(&self, _target: &Widget) -> Result<()> {
            self.log.borrow_mut().push("init_dom");
            Ok(())
        }

        fn repaint(&self, _target: &Widget) {
            self.log.borrow_mut().push("repaint");
        }

        fn on_enable(&self, _target: &Widget) {
            self.log.borrow_mut().push("enable");
        }

        fn on_disable(&self, _target: &Widget) {
            self.log.borrow_mut().push("disable");
        }

        fn on_dispose(&self, _target: &Widget) {
            self.log.borrow_mut().push("dispose");
        }
    }

    #[test]
    fn test_plugin_lifecycle() {
        let registry = registry();
        let widget = Widget::new(&registry, probe(Schema::new()), Options::new()).unwrap();
        let plugin = Counting {
            core: PluginCore::new(&widget, Value::object([("moveAt", 12)])),
            log: RefCell::new(Vec::new()),
        };

        assert!(plugin.is("disable"));
        assert_eq!(plugin.core().option_f64("moveAt", 10.0), 12.0);
        assert_eq!(plugin.core().option_f64("missing", 10.0), 10.0);

        plugin.enable().unwrap();
        plugin.enable().unwrap();
        plugin.disable();
        plugin.enable().unwrap();
        plugin.dispose();
        plugin.dispose();
        plugin.enable().unwrap();

        assert_eq!(
            *plugin.log.borrow(),
            vec!["init_dom", "repaint", "enable", "disable", "enable", "disable", "dispose"]
        );
        assert!(plugin.is("dispose"));
    }

    #[test]
    fn test_plugin_outliving_target_is_inert() {
        let registry = registry();
        let widget = Widget::new(&registry, probe(Schema::new()), Options::new()).unwrap();
        let plugin = Counting {
            core: PluginCore::new(&widget, Value::Undefined),
            log: RefCell::new(Vec::new()),
        };

        registry.remove(&widget);
        drop(widget);

        plugin.enable().unwrap();
        assert!(plugin.target().is_none());
        assert!(plugin.log.borrow().is_empty());
    }
}
