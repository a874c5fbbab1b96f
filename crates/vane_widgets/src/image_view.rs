//! Full-screen image viewer
//!
//! The viewer builds its own main element and appends it to the body:
//!
//! ```text
//! div.ui-imageview
//! ├── [data-role=toolbar]   close button + "n of m"
//! └── [data-role=wrapper]
//!     └── [data-role=item]  one per image, `img` created on first show
//! ```
//!
//! When constructed with a `main` element ("setup" mode) the images are
//! taken from its `[data-role=image]` descendants, and clicking one opens the
//! viewer on it. Enabling shows the viewer and turns on the `Masker` and
//! `Zoom` plugins; disabling hides it again.
//!
//! Events: `change(from, to)`.

use std::cell::Cell;
use std::ops::Deref;
use std::rc::Rc;

use vane_core::dom::{Dom, DomEvent, NodeId};
use vane_core::{Attribute, Changes, Lifecycle, Options, Registry, Result, Schema, Value, Widget};

use crate::plugins::{Zoom, MASKER, ZOOM};

/// Registered type name
pub const IMAGE_VIEW: &str = "ImageView";

#[derive(Clone, Copy, Debug, Default)]
struct Drag {
    start_x: f32,
    diff_x: f32,
    x: f32,
}

/// Displayed size of an image fitted into the viewport
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fit {
    pub width: f32,
    pub height: f32,
    /// Top margin centring a short image vertically
    pub margin_top: Option<f32>,
}

/// Shrink `natural` to fit `viewport`, width first, then scale by `scale`
pub fn fit_image(natural: (f32, f32), viewport: (f32, f32), scale: f32) -> Fit {
    let (mut w, mut h) = natural;
    let (max_w, max_h) = viewport;

    if w > max_w {
        h *= max_w / w;
        w = max_w;
    }
    if h > max_h {
        w *= max_h / h;
        h = max_h;
    }

    w *= scale;
    h *= scale;

    let margin_top = (h < max_h).then(|| ((max_h - h) / 2.0).max(0.0).round());
    Fit {
        width: w,
        height: h,
        margin_top,
    }
}

/// Runtime data of one image viewer
#[derive(Debug, Default)]
pub struct ImageViewRuntime {
    setup: Cell<Option<NodeId>>,
    toolbar: Cell<Option<NodeId>>,
    wrapper: Cell<Option<NodeId>>,
    viewport: Cell<(f32, f32)>,
    offset: Cell<f32>,
    drag: Cell<Drag>,
    last_tap: Cell<Option<u64>>,
}

fn number(widget: &Widget, name: &str) -> f64 {
    widget.get(name).as_f64().unwrap_or_default()
}

fn index_of(widget: &Widget) -> i64 {
    widget.get("index").as_i64().unwrap_or_default()
}

fn length_of(widget: &Widget) -> usize {
    widget.get("items").as_array().map_or(0, <[Value]>::len)
}

/// Image sources under `container`, tagging each image with its index
fn scan(dom: &Dom, container: NodeId) -> Result<Vec<Value>> {
    let images = dom.query_all("[data-role=image]", container)?;
    Ok(images
        .into_iter()
        .enumerate()
        .map(|(index, image)| {
            dom.set_data(image, "imageview", index.to_string());
            let src = dom
                .get_data(image, "src")
                .or_else(|| dom.get_attribute(image, "src"))
                .unwrap_or_default();
            Value::from(src)
        })
        .collect())
}

fn event_node(event: &DomEvent) -> Option<NodeId> {
    event.target().node()
}

impl ImageViewRuntime {
    pub fn toolbar(&self) -> Option<NodeId> {
        self.toolbar.get()
    }

    pub fn wrapper(&self) -> Option<NodeId> {
        self.wrapper.get()
    }

    /// The container images were scanned from, in setup mode
    pub fn setup_container(&self) -> Option<NodeId> {
        self.setup.get()
    }

    fn paint_toolbar(&self, widget: &Widget) {
        let Some(toolbar) = self.toolbar.get() else {
            return;
        };
        let dom = widget.dom();
        dom.clear_children(toolbar);

        let close = dom.create_element("span");
        dom.set_data(close, "role", "close");
        dom.set_text(close, "Close");
        dom.append_child(toolbar, close);

        let title = dom.create_element("h1");
        dom.set_text(
            title,
            format!("{} of {}", index_of(widget) + 1, length_of(widget)),
        );
        dom.append_child(toolbar, title);
    }

    fn append(&self, widget: &Widget) {
        let Some(wrapper) = self.wrapper.get() else {
            return;
        };
        let dom = widget.dom();
        let item = dom.create_element("div");
        dom.set_data(item, "role", "item");
        let left = dom.children(wrapper).len() * 100;
        dom.set_style(item, "left", format!("{left}%"));
        dom.append_child(wrapper, item);
    }

    fn rebuild_items(&self, widget: &Widget) {
        if let Some(wrapper) = self.wrapper.get() {
            widget.dom().clear_children(wrapper);
        }
        for _ in 0..length_of(widget) {
            self.append(widget);
        }
    }

    fn item(&self, widget: &Widget, index: usize) -> Option<NodeId> {
        let wrapper = self.wrapper.get()?;
        widget.dom().children(wrapper).get(index).copied()
    }

    fn image(&self, widget: &Widget, index: usize) -> Option<NodeId> {
        let item = self.item(widget, index)?;
        widget.dom().query("img", item).ok().flatten()
    }

    /// Create the image of item `index` on first show
    fn load(&self, widget: &Widget, index: usize) {
        let Some(item) = self.item(widget, index) else {
            return;
        };
        if self.image(widget, index).is_some() {
            return;
        }

        let dom = widget.dom();
        let src = widget
            .get("items")
            .as_array()
            .and_then(|items| items.get(index))
            .map(Value::to_js_string)
            .unwrap_or_default();

        let img = dom.create_element("img");
        dom.hide(img);
        dom.set_attribute(img, "src", src);
        widget.on_dom(img, "load", |widget, event| {
            if let (Some(view), Some(img)) = (ImageView::from_widget(widget), event_node(event)) {
                view.runtime.fit(widget, img);
            }
        });
        dom.append_child(item, img);
    }

    fn fit(&self, widget: &Widget, img: NodeId) {
        let dom = widget.dom();
        let natural = |name| {
            dom.get_attribute(img, name)
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or_default()
        };

        let fit = fit_image(
            (natural("width"), natural("height")),
            self.viewport.get(),
            number(widget, "zoomScale") as f32,
        );
        dom.set_style(img, "width", format!("{}px", fit.width));
        dom.set_style(img, "height", format!("{}px", fit.height));
        if let Some(margin) = fit.margin_top {
            dom.set_style(img, "margin-top", format!("{margin}px"));
        }
        dom.show(img);
        widget.remove_event(img, "load", None);
    }

    fn move_to(&self, widget: &Widget, x: f32, speed: f64) {
        let Some(wrapper) = self.wrapper.get() else {
            return;
        };
        let dom = widget.dom();
        if widget.get("animate").is_truthy() {
            dom.set_style(wrapper, "transition-duration", format!("{speed}ms"));
        }
        dom.set_style(
            wrapper,
            "transform",
            format!("translateX({x}px) translateY(0) translateZ(0)"),
        );
    }

    fn to(&self, widget: &Widget, index: i64, force: bool) -> Result<()> {
        if !force && widget.is("disable") {
            return Ok(());
        }
        if widget.is("zoom") {
            self.reset(widget);
        }

        let from = index_of(widget);
        let last = length_of(widget) as i64 - 1;
        let index = index.min(last).max(0);

        widget.set("index", index)?;

        let offset = -self.viewport.get().0 * index as f32;
        self.offset.set(offset);
        self.move_to(widget, offset, number(widget, "speed"));

        if from != index {
            widget.emit("change", &[Value::from(from), Value::from(index)]);
        }

        self.load(widget, index as usize);
        Ok(())
    }

    fn zoom(&self, widget: &Widget, index: usize) {
        let Some(zoom) = widget.plugin_as::<Zoom>(ZOOM) else {
            return;
        };
        if let Some(image) = self.image(widget, index) {
            zoom.scale(image);
        }
    }

    fn reset(&self, widget: &Widget) {
        if let Some(zoom) = widget.plugin_as::<Zoom>(ZOOM) {
            zoom.reset();
        }
    }

    fn touch_start(&self, widget: &Widget, event: &DomEvent) {
        if widget.is("disable") {
            return;
        }
        self.drag.set(Drag {
            start_x: event.page_x,
            diff_x: 0.0,
            ..self.drag.get()
        });
    }

    fn touch_move(&self, widget: &Widget, event: &DomEvent) {
        if widget.is("disable") {
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

    /// Drag end switches items; a tap toggles full mode and a double tap
    /// zooms
    fn touch_end(&self, widget: &Widget) -> Result<()> {
        if widget.is("disable") {
            return Ok(());
        }

        let now = widget.dom().timers().now();
        let since_last_tap = self.last_tap.replace(Some(now)).map(|last| now - last);

        let drag = self.drag.get();
        let diff = f64::from(drag.diff_x.abs());
        if diff > number(widget, "moveAt") {
            self.offset.set(drag.x);
            let index = index_of(widget);
            if diff > number(widget, "switchAt") {
                return self.to(widget, index + if drag.diff_x < 0.0 { 1 } else { -1 }, false);
            }
            return self.to(widget, index, false);
        }

        widget.set("full", !widget.is("full"))?;

        if since_last_tap.is_some_and(|elapsed| (elapsed as f64) < number(widget, "zoomAt")) {
            self.last_tap.set(None);
            self.zoom(widget, index_of(widget) as usize);
        }
        Ok(())
    }

    fn setup(&self, widget: &Widget, container: NodeId) -> Result<()> {
        if self.setup.get() == Some(container) {
            return Ok(());
        }
        self.setup.set(Some(container));
        let items = scan(widget.dom(), container)?;
        widget.set("items", items)
    }
}

impl Lifecycle for ImageViewRuntime {
    fn type_name(&self) -> &'static str {
        IMAGE_VIEW
    }

    fn attributes(&self) -> Schema {
        Schema::new()
            .with("animate", Attribute::new(true))
            .with("toolbar", Attribute::new(true).repaint())
            .with("speed", Attribute::new(200))
            .with("zoomAt", Attribute::new(500))
            .with("zoomScale", Attribute::new(0.88))
            .with("moveAt", Attribute::new(10))
            .with("switchAt", Attribute::new(30))
            .with("items", Attribute::new(Vec::<Value>::new()).repaint())
            .with("index", Attribute::new(0))
            .with(
                "full",
                Attribute::new(false).setter(|widget, value, _| {
                    let full = value.is_truthy();
                    widget.toggle_state("full", Some(full));
                    if let (true, Some(main)) = (widget.is("render"), widget.main()) {
                        widget.dom().toggle_class(main, "full", Some(full));
                    }
                }),
            )
            .with(
                "length",
                Attribute::default()
                    .read_only()
                    .getter(|widget, _, _| Value::from(length_of(widget))),
            )
    }

    fn init_structure(&self, widget: &Widget) -> Result<()> {
        let dom = widget.dom().clone();
        self.viewport.set(dom.viewport());

        if let Some(container) = widget.main() {
            self.setup.set(Some(container));
            widget.set("items", scan(&dom, container)?)?;
        }

        let main = dom.create_element("div");
        dom.add_class(main, &widget.registry().settings().ui_class("imageview"));
        dom.hide(main);
        if widget.is("full") {
            dom.add_class(main, "full");
        }

        let toolbar = dom.create_element("div");
        dom.set_data(toolbar, "role", "toolbar");
        dom.append_child(main, toolbar);
        self.toolbar.set(Some(toolbar));
        if !widget.get("toolbar").is_truthy() {
            dom.hide(toolbar);
        }

        let wrapper = dom.create_element("div");
        dom.set_data(wrapper, "role", "wrapper");
        dom.append_child(main, wrapper);
        self.wrapper.set(Some(wrapper));

        self.paint_toolbar(widget);
        self.rebuild_items(widget);

        dom.append_child(dom.body(), main);
        widget.set_main(Some(main));
        Ok(())
    }

    fn init_event(&self, widget: &Widget) -> Result<()> {
        if let Some(setup) = self.setup.get() {
            widget.on_dom(setup, "click", |widget, event| {
                let dom = widget.dom();
                let Some(node) = event_node(event) else {
                    return;
                };
                if !dom.matches(node, "[data-imageview]").unwrap_or(false) {
                    return;
                }
                if let Some(view) = ImageView::from_widget(widget) {
                    widget.enable();
                    if let Err(err) = view.to_image(node) {
                        tracing::warn!(id = %widget.id(), %err, "failed to open image");
                    }
                }
            });
        }

        if widget.get("toolbar").is_truthy() {
            if let Some(toolbar) = self.toolbar.get() {
                widget.on_dom(toolbar, "touchstart", |widget, event| {
                    event.prevent_default();
                    let is_close = event_node(event)
                        .is_some_and(|node| widget.dom().matches(node, "[data-role=close]").unwrap_or(false));
                    if is_close {
                        widget.disable();
                    }
                });
            }
            widget.on("change", |event, _| {
                let widget = event.target();
                if let Some(view) = ImageView::from_widget(widget) {
                    view.runtime.paint_toolbar(widget);
                }
            });
        }

        self.offset.set(0.0);
        if let Some(main) = widget.main() {
            widget.on_dom(main, "touchstart", |widget, event| {
                if let Some(view) = ImageView::from_widget(widget) {
                    view.runtime.touch_start(widget, event);
                }
            });
            widget.on_dom(main, "touchmove", |widget, event| {
                if let Some(view) = ImageView::from_widget(widget) {
                    view.runtime.touch_move(widget, event);
                }
            });
            widget.on_dom(main, "touchend", |widget, _| {
                if let Some(view) = ImageView::from_widget(widget) {
                    if let Err(err) = view.runtime.touch_end(widget) {
                        tracing::warn!(id = %widget.id(), %err, "image view gesture failed");
                    }
                }
            });
        }
        Ok(())
    }

    fn repaint(&self, widget: &Widget, changes: Option<&Changes>) {
        let Some(changes) = changes else {
            if let Err(err) = self.to(widget, index_of(widget), true) {
                tracing::warn!(id = %widget.id(), %err, "image view repaint failed");
            }
            return;
        };

        if changes.contains_key("items") {
            let enabled = !widget.is("disable");
            if enabled {
                widget.disable();
            }

            self.rebuild_items(widget);
            self.paint_toolbar(widget);

            if enabled {
                widget.enable();
                if let Err(err) = self.to(widget, 0, false) {
                    tracing::warn!(id = %widget.id(), %err, "image view reset failed");
                }
            }
        }

        if let (Some(change), Some(toolbar)) = (changes.get("toolbar"), self.toolbar.get()) {
            if change.new.is_truthy() {
                widget.dom().show(toolbar);
            } else {
                widget.dom().hide(toolbar);
            }
        }
    }

    fn on_enable(&self, widget: &Widget) {
        if !widget.is("render") {
            return;
        }
        for plugin in [MASKER, ZOOM] {
            if let Err(err) = widget.enable_plugin(plugin, None) {
                tracing::warn!(id = %widget.id(), plugin, %err, "failed to enable plugin");
            }
        }
        if let Some(main) = widget.main() {
            widget.dom().show(main);
        }
    }

    fn on_disable(&self, widget: &Widget) {
        if !widget.is("render") {
            return;
        }
        widget.disable_plugin(MASKER);
        widget.disable_plugin(ZOOM);
        if let Some(main) = widget.main() {
            widget.dom().hide(main);
        }
    }

    fn dispose(&self, widget: &Widget) {
        if let Some(main) = widget.main() {
            widget.dom().detach(main);
        }
    }
}

/// Handle to an image viewer widget
#[derive(Clone, Debug)]
pub struct ImageView {
    widget: Widget,
    runtime: Rc<ImageViewRuntime>,
}

impl Deref for ImageView {
    type Target = Widget;

    fn deref(&self) -> &Widget {
        &self.widget
    }
}

impl ImageView {
    pub fn new(registry: &Registry, options: Options) -> Result<Self> {
        let runtime = Rc::new(ImageViewRuntime::default());
        let widget = Widget::new(registry, runtime.clone(), options)?;
        Ok(Self { widget, runtime })
    }

    /// Register the `ImageView` type
    pub fn register(registry: &Registry) -> Result<()> {
        registry.register(IMAGE_VIEW, |registry, options| {
            Ok(ImageView::new(registry, options)?.into_widget())
        })
    }

    /// The image viewer behind `widget`, if it is one
    pub fn from_widget(widget: &Widget) -> Option<Self> {
        let runtime = widget.behavior::<ImageViewRuntime>()?;
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

    pub fn runtime(&self) -> &ImageViewRuntime {
        &self.runtime
    }

    /// Number of images
    pub fn len(&self) -> usize {
        length_of(&self.widget)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Show image `index`; `force` ignores the disabled state
    pub fn to(&self, index: i64, force: bool) -> Result<()> {
        self.runtime.to(&self.widget, index, force)
    }

    /// Show the image a setup-mode source element stands for
    pub fn to_image(&self, node: NodeId) -> Result<()> {
        let index = self
            .widget
            .dom()
            .get_data(node, "imageview")
            .and_then(|v| v.parse::<i64>().ok());
        match index {
            Some(index) => self.to(index, false),
            None => Ok(()),
        }
    }

    /// Toggle zoom on image `index`
    pub fn zoom(&self, index: usize) {
        self.runtime.zoom(&self.widget, index);
    }

    /// Undo any zoom
    pub fn reset(&self) {
        self.runtime.reset(&self.widget);
    }

    /// Rescan images from another container
    pub fn setup(&self, container: NodeId) -> Result<()> {
        self.runtime.setup(&self.widget, container)
    }

    /// The `img` element of item `index`, once loaded
    pub fn image(&self, index: usize) -> Option<NodeId> {
        self.runtime.image(&self.widget, index)
    }
}
