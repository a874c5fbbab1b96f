//! Full-screen mask around a widget's main element
//!
//! On first enable the target's main element is moved into a body-level
//! `ui-masker` container; enabling and disabling shows and hides it.

use std::cell::Cell;
use std::rc::Rc;

use vane_core::dom::NodeId;
use vane_core::{Plugin, PluginCore, Registry, Result, Value, Widget, WidgetError};

pub const MASKER: &str = "Masker";

#[derive(Debug)]
pub struct Masker {
    core: PluginCore,
    wrapper: Cell<Option<NodeId>>,
}

impl Masker {
    pub fn new(target: &Widget, options: &Value) -> Self {
        Self {
            core: PluginCore::new(target, options.clone()),
            wrapper: Cell::new(None),
        }
    }

    pub fn register(registry: &Registry) -> Result<()> {
        registry.register_plugin(MASKER, |target, options| {
            Ok(Rc::new(Masker::new(target, options)) as Rc<dyn Plugin>)
        })
    }

    /// The mask container, once rendered
    pub fn main(&self) -> Option<NodeId> {
        self.core.main()
    }

    /// Element holding the target's main element
    pub fn wrapper(&self) -> Option<NodeId> {
        self.wrapper.get()
    }
}

impl Plugin for Masker {
    fn type_name(&self) -> &'static str {
        MASKER
    }

    fn core(&self) -> &PluginCore {
        &self.core
    }

    fn init_dom(&self, target: &Widget) -> Result<()> {
        let content = target
            .main()
            .ok_or_else(|| WidgetError::MissingMain(MASKER.into()))?;
        let dom = target.dom();

        let main = dom.create_element("div");
        let class = target.registry().settings().ui_class("masker");
        dom.add_class(main, &class);

        let wrapper = dom.create_element("div");
        dom.set_data(wrapper, "role", "wrapper");
        dom.append_child(main, wrapper);
        dom.append_child(wrapper, content);
        dom.append_child(dom.body(), main);

        self.core.set_main(Some(main));
        self.wrapper.set(Some(wrapper));
        Ok(())
    }

    fn on_enable(&self, target: &Widget) {
        if let Some(main) = self.core.main() {
            target.dom().show(main);
        }
    }

    fn on_disable(&self, target: &Widget) {
        if let Some(main) = self.core.main() {
            target.dom().hide(main);
        }
    }

    fn on_dispose(&self, target: &Widget) {
        if let Some(main) = self.core.main() {
            target.dom().detach(main);
        }
        self.wrapper.set(None);
    }
}
