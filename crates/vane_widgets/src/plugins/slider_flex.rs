//! Keeps a slider sized to its container
//!
//! While enabled, every (debounced) window `resize` re-measures the target
//! slider and snaps it back onto the current item.

use std::cell::RefCell;
use std::rc::Rc;

use vane_core::dom::EventTarget;
use vane_core::{DomHandler, Plugin, PluginCore, Registry, Result, Value, Widget};

use crate::slider::{Slider, SLIDER_FLEX};

pub struct SliderFlex {
    core: PluginCore,
    handler: RefCell<Option<DomHandler>>,
}

fn refresh(target: &Widget) {
    let Some(slider) = Slider::from_widget(target) else {
        return;
    };
    if let Err(err) = slider.refresh() {
        tracing::warn!(id = %target.id(), %err, "slider refresh failed");
    }
}

impl SliderFlex {
    pub fn new(target: &Widget, options: &Value) -> Self {
        Self {
            core: PluginCore::new(target, options.clone()),
            handler: RefCell::new(None),
        }
    }

    pub fn register(registry: &Registry) -> Result<()> {
        registry.register_plugin(SLIDER_FLEX, |target, options| {
            Ok(Rc::new(SliderFlex::new(target, options)) as Rc<dyn Plugin>)
        })
    }

    pub fn is_listening(&self) -> bool {
        self.handler.borrow().is_some()
    }
}

impl Plugin for SliderFlex {
    fn type_name(&self) -> &'static str {
        SLIDER_FLEX
    }

    fn core(&self) -> &PluginCore {
        &self.core
    }

    fn on_enable(&self, target: &Widget) {
        let handler = target.on_dom(EventTarget::Window, "resize", |widget, _| refresh(widget));
        self.handler.replace(Some(handler));
        refresh(target);
    }

    fn on_disable(&self, target: &Widget) {
        if let Some(handler) = self.handler.take() {
            target.remove_event(EventTarget::Window, "resize", Some(&handler));
        }
    }
}
