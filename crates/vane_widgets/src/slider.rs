//! Slider widget
//!
//! A horizontal carousel over the children of a wrapper element:
//!
//! ```text
//! main
//! └── [data-role=wrapper]   (or the first child)
//!     ├── [data-role=item]
//!     └── [data-role=item]
//! ```
//!
//! Items are sized to the main element's width and the wrapper is translated
//! to show one at a time. While active, the slider advances every
//! `interval` ms if `auto` is set, and follows touch drags on the main
//! element.
//!
//! Events: `resize(from, to)`, `change(from, to)`, `active`, `inactive`.

use std::cell::Cell;
use std::ops::Deref;
use std::rc::Rc;

use vane_core::dom::{DomEvent, NodeId, TimerId};
use vane_core::{Attribute, Changes, Lifecycle, Options, Registry, Result, Schema, Value, Widget, WidgetError};

/// Registered type name
pub const SLIDER: &str = "Slider";

/// Plugin toggled by the `flex` attribute
pub const SLIDER_FLEX: &str = "SliderFlex";

#[derive(Clone, Copy, Debug, Default)]
struct Drag {
    start_x: f32,
    diff_x: f32,
    x: f32,
}

/// Runtime data of one slider
#[derive(Debug, Default)]
pub struct SliderRuntime {
    wrapper: Cell<Option<NodeId>>,
    length: Cell<usize>,
    width: Cell<Option<f32>>,
    /// Wrapper offset after the last completed move
    offset: Cell<f32>,
    timer: Cell<Option<TimerId>>,
    active: Cell<bool>,
    drag: Cell<Drag>,
}

fn number(widget: &Widget, name: &str) -> f64 {
    widget.get(name).as_f64().unwrap_or_default()
}

fn index_of(widget: &Widget) -> i64 {
    widget.get("index").as_i64().unwrap_or_default()
}

impl SliderRuntime {
    pub fn len(&self) -> usize {
        self.length.get()
    }

    pub fn is_empty(&self) -> bool {
        self.length.get() == 0
    }

    pub fn width(&self) -> Option<f32> {
        self.width.get()
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    pub fn is_looping(&self) -> bool {
        self.timer.get().is_some()
    }

    fn to(&self, widget: &Widget, index: i64) -> Result<()> {
        if !self.active.get() {
            return Ok(());
        }

        let from = index_of(widget);
        let last = self.length.get() as i64 - 1;
        let index = index.min(last).max(0);

        widget.set("index", index)?;

        let offset = -self.width.get().unwrap_or_default() * index as f32;
        self.offset.set(offset);
        self.move_to(widget, offset, number(widget, "speed"));

        if from != index {
            widget.emit("change", &[Value::from(from), Value::from(index)]);
        }
        Ok(())
    }

    fn move_to(&self, widget: &Widget, x: f32, speed: f64) {
        let Some(wrapper) = self.wrapper.get() else {
            return;
        };
        let dom = widget.dom();
        if widget.get("animate").is_truthy() {
            dom.set_style(wrapper, "transition-duration", format!("{speed}ms"));
        }
        dom.set_style(wrapper, "transform", format!("translate({x}px, 0) translateZ(0)"));
    }

    /// Size items to `width`, or to the measured main width when it changed
    fn resize(&self, widget: &Widget, width: Option<f32>) {
        let (Some(main), Some(wrapper)) = (widget.main(), self.wrapper.get()) else {
            return;
        };
        let dom = widget.dom();

        let width = match width.filter(|w| *w > 0.0) {
            Some(width) => width,
            None => {
                let measured = dom.style_px(main, "width");
                if Some(measured) == self.width.get() {
                    return;
                }
                measured
            }
        };

        let children = dom.children(wrapper);
        let px = width.trunc() as i64;
        for child in &children {
            dom.set_style(*child, "width", format!("{px}px"));
        }
        dom.set_style(wrapper, "width", format!("{}px", px * children.len() as i64));

        let old = self.width.replace(Some(width));
        tracing::trace!(id = %widget.id(), width, "slider resized");
        widget.emit("resize", &[Value::from(old), Value::from(width)]);
    }

    fn schedule(&self, widget: &Widget, stop: bool) {
        if let Some(timer) = self.timer.take() {
            widget.clear_timeout(timer);
        }

        let delay = number(widget, "interval");
        if stop || self.length.get() < 2 || !(delay > 0.0) {
            return;
        }

        let timer = widget.set_timeout(delay as u64, |widget| {
            let Some(slider) = Slider::from_widget(widget) else {
                return;
            };
            slider.runtime.timer.set(None);

            let next = index_of(widget) + 1;
            let next = if next < slider.runtime.len() as i64 { next } else { 0 };
            if let Err(err) = slider.to(next) {
                tracing::warn!(id = %widget.id(), %err, "slider auto advance failed");
            }
            slider.start();
        });
        self.timer.set(Some(timer));
    }

    fn start(&self, widget: &Widget) {
        if widget.get("auto").is_truthy() {
            self.schedule(widget, false);
        }
    }

    fn stop(&self, widget: &Widget) {
        if widget.get("auto").is_truthy() {
            self.schedule(widget, true);
        }
    }

    fn active(&self, widget: &Widget) {
        if !self.active.get() {
            self.active.set(true);
            self.start(widget);
            widget.emit("active", &[]);
        }
    }

    fn inactive(&self, widget: &Widget) {
        if self.active.get() {
            self.active.set(false);
            self.stop(widget);
            widget.emit("inactive", &[]);
        }
    }

    fn sync_flex(&self, widget: &Widget) {
        if widget.get("flex").is_truthy() {
            if let Err(err) = widget.enable_plugin(SLIDER_FLEX, Some("flex")) {
                tracing::warn!(id = %widget.id(), %err, "failed to enable slider flex");
            }
        } else {
            widget.disable_plugin(SLIDER_FLEX);
        }
    }

    fn touch_start(&self, widget: &Widget, event: &DomEvent) {
        if !self.active.get() {
            return;
        }
        self.stop(widget);
        self.drag.set(Drag {
            start_x: event.page_x,
            diff_x: 0.0,
            ..self.drag.get()
        });
    }

    fn touch_move(&self, widget: &Widget, event: &DomEvent) {
        if !self.active.get() {
            return;
        }
        let mut drag = self.drag.get();
        drag.diff_x = event.page_x - drag.start_x;

        if f64::from(drag.diff_x.abs()) > number(widget, "moveAt") {
            event.prevent_default();
            drag.x = self.offset.get() + drag.diff_x;
            self.move_to(widget, drag.x, 0.0);
        }
        self.drag.set(drag);
    }

    fn touch_end(&self, widget: &Widget) -> Result<()> {
        if !self.active.get() {
            return Ok(());
        }
        let drag = self.drag.get();
        let diff = f64::from(drag.diff_x.abs());
        if diff < number(widget, "moveAt") {
            return Ok(());
        }

        self.offset.set(drag.x);
        let index = index_of(widget);
        if diff > number(widget, "switchAt") {
            self.to(widget, index + if drag.diff_x < 0.0 { 1 } else { -1 })?;
        } else {
            self.to(widget, index)?;
        }

        self.start(widget);
        Ok(())
    }
}

impl Lifecycle for SliderRuntime {
    fn type_name(&self) -> &'static str {
        SLIDER
    }

    fn attributes(&self) -> Schema {
        Schema::new()
            .with("animate", Attribute::new(true))
            .with("auto", Attribute::new(true))
            .with("interval", Attribute::new(2000))
            .with("flex", Attribute::new(false).repaint())
            .with("index", Attribute::new(0))
            .with("speed", Attribute::new(400))
            .with("moveAt", Attribute::new(10))
            .with("switchAt", Attribute::new(30))
    }

    fn init_structure(&self, widget: &Widget) -> Result<()> {
        let main = widget
            .main()
            .ok_or_else(|| WidgetError::MissingMain(SLIDER.into()))?;
        let dom = widget.dom();

        let wrapper = match dom.query("[data-role=wrapper]", main)? {
            Some(wrapper) => Some(wrapper),
            None => dom.children(main).first().copied(),
        };

        let mut length = 0;
        if let Some(wrapper) = wrapper {
            dom.set_data(wrapper, "role", "wrapper");
            let items = dom.children(wrapper);
            for item in &items {
                dom.set_data(*item, "role", "item");
            }
            length = items.len();
        }

        self.length.set(length);
        self.wrapper.set(wrapper);
        Ok(())
    }

    fn init_event(&self, widget: &Widget) -> Result<()> {
        let main = widget
            .main()
            .ok_or_else(|| WidgetError::MissingMain(SLIDER.into()))?;
        self.offset.set(0.0);

        widget.on_dom(main, "touchstart", |widget, event| {
            if let Some(slider) = Slider::from_widget(widget) {
                slider.runtime.touch_start(widget, event);
            }
        });
        widget.on_dom(main, "touchmove", |widget, event| {
            if let Some(slider) = Slider::from_widget(widget) {
                slider.runtime.touch_move(widget, event);
            }
        });
        widget.on_dom(main, "touchend", |widget, _| {
            if let Some(slider) = Slider::from_widget(widget) {
                if let Err(err) = slider.runtime.touch_end(widget) {
                    tracing::warn!(id = %widget.id(), %err, "slider drag failed");
                }
            }
        });
        Ok(())
    }

    fn repaint(&self, widget: &Widget, changes: Option<&Changes>) {
        match changes {
            None => {
                self.resize(widget, self.width.get());
                self.active(widget);
                if widget.get("flex").is_truthy() {
                    self.sync_flex(widget);
                }
            }
            Some(changes) if changes.contains_key("flex") => self.sync_flex(widget),
            Some(_) => {}
        }
    }

    fn dispose(&self, widget: &Widget) {
        self.inactive(widget);
        self.schedule(widget, true);
    }
}

/// Handle to a slider widget
#[derive(Clone, Debug)]
pub struct Slider {
    widget: Widget,
    runtime: Rc<SliderRuntime>,
}

impl Deref for Slider {
    type Target = Widget;

    fn deref(&self) -> &Widget {
        &self.widget
    }
}

impl Slider {
    pub fn new(registry: &Registry, options: Options) -> Result<Self> {
        let runtime = Rc::new(SliderRuntime::default());
        let widget = Widget::new(registry, runtime.clone(), options)?;
        Ok(Self { widget, runtime })
    }

    /// Register the `Slider` type
    pub fn register(registry: &Registry) -> Result<()> {
        registry.register(SLIDER, |registry, options| {
            Ok(Slider::new(registry, options)?.into_widget())
        })
    }

    /// The slider behind `widget`, if it is one
    pub fn from_widget(widget: &Widget) -> Option<Self> {
        let runtime = widget.behavior::<SliderRuntime>()?;
        Some(Self {
            widget: widget.clone(),
            runtime,
        })
    }

    pub fn widget(&self) -> &Widget {
        &self.widget
    }

    pub fn into_widget(self) -> Widget {
        self.widget
    }

    pub fn runtime(&self) -> &SliderRuntime {
        &self.runtime
    }

    /// Move to `index`, clamped to the items; ignored while inactive
    pub fn to(&self, index: i64) -> Result<()> {
        self.runtime.to(&self.widget, index)
    }

    pub fn prev(&self) -> Result<()> {
        self.to(index_of(&self.widget) - 1)
    }

    pub fn next(&self) -> Result<()> {
        self.to(index_of(&self.widget) + 1)
    }

    /// Resume auto advance (when `auto` is set)
    pub fn start(&self) {
        self.runtime.start(&self.widget);
    }

    /// Pause auto advance (when `auto` is set)
    pub fn stop(&self) {
        self.runtime.stop(&self.widget);
    }

    pub fn active(&self) {
        self.runtime.active(&self.widget);
    }

    pub fn inactive(&self) {
        self.runtime.inactive(&self.widget);
    }

    /// Re-measure the main element and snap back to the current item
    pub fn refresh(&self) -> Result<()> {
        self.stop();
        self.runtime.resize(&self.widget, None);
        self.to(index_of(&self.widget))?;
        self.start();
        Ok(())
    }
}
