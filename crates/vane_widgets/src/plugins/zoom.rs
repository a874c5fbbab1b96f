//! Double-size zoom for one element of the target widget
//!
//! `scale(node)` toggles between normal and double size and mirrors the
//! result in the target's `zoom` state. While zoomed, the element follows
//! touch drags.

use std::cell::Cell;
use std::rc::Rc;

use vane_core::dom::{DomEvent, EventTarget, NodeId};
use vane_core::{Plugin, PluginCore, Registry, Result, Value, Widget};

pub const ZOOM: &str = "Zoom";

const DEFAULT_MOVE_AT: f64 = 10.0;

#[derive(Clone, Copy, Debug, Default)]
struct Pan {
    start: (f32, f32),
    diff: (f32, f32),
    xy: (f32, f32),
    last: (f32, f32),
}

#[derive(Debug)]
pub struct Zoom {
    core: PluginCore,
    pan: Cell<Pan>,
}

fn transform(target: &Widget, node: NodeId, transition: &str, (x, y): (f32, f32), scale: u8) {
    let dom = target.dom();
    dom.set_style(node, "transition", transition);
    dom.set_style(
        node,
        "transform",
        format!("translate3d({x}px, {y}px, 0) scale({scale})"),
    );
}

impl Zoom {
    pub fn new(target: &Widget, options: &Value) -> Self {
        Self {
            core: PluginCore::new(target, options.clone()),
            pan: Cell::new(Pan::default()),
        }
    }

    pub fn register(registry: &Registry) -> Result<()> {
        registry.register_plugin(ZOOM, |target, options| {
            Ok(Rc::new(Zoom::new(target, options)) as Rc<dyn Plugin>)
        })
    }

    /// The element currently bound for zooming
    pub fn main(&self) -> Option<NodeId> {
        self.core.main()
    }

    /// Zoom `node` in, or out if it is already zoomed
    pub fn scale(&self, node: NodeId) {
        if self.core.main().is_some_and(|main| main != node) {
            self.reset();
        }
        self.core.set_main(Some(node));
        self.zoom(false);
    }

    /// Back to normal size, dropping the drag listeners
    pub fn reset(&self) {
        if !self.is("disable") {
            self.toggle_touch_events(true);
            self.zoom(true);
        }
    }

    fn zoom(&self, reset: bool) {
        let (Some(main), Some(target)) = (self.core.main(), self.target()) else {
            return;
        };

        let zooming = reset || target.is("zoom");
        transform(&target, main, "all 500ms", (0.0, 0.0), if zooming { 1 } else { 2 });
        if zooming {
            target.remove_state("zoom");
        } else {
            target.add_state("zoom");
        }
        self.toggle_touch_events(zooming);
    }

    fn pan_to(&self, target: &Widget, xy: (f32, f32)) {
        if let Some(main) = self.core.main() {
            let scale = if target.is("zoom") { 2 } else { 1 };
            transform(target, main, "0ms", xy, scale);
        }
    }

    fn moved_enough(&self, diff: (f32, f32)) -> bool {
        let move_at = self.core.option_f64("moveAt", DEFAULT_MOVE_AT);
        f64::from(diff.0.abs()) > move_at || f64::from(diff.1.abs()) > move_at
    }

    fn toggle_touch_events(&self, off: bool) {
        let (Some(main), Some(target)) = (self.core.main(), self.target()) else {
            return;
        };

        if off {
            target.clear_events(Some(EventTarget::Node(main)));
            return;
        }

        self.pan.set(Pan::default());
        target.on_dom(main, "touchstart", |widget, event| {
            if let Some(zoom) = widget.plugin_as::<Zoom>(ZOOM) {
                zoom.touch_start(event);
            }
        });
        target.on_dom(main, "touchmove", |widget, event| {
            if let Some(zoom) = widget.plugin_as::<Zoom>(ZOOM) {
                zoom.touch_move(widget, event);
            }
        });
        target.on_dom(main, "touchend", |widget, event| {
            if let Some(zoom) = widget.plugin_as::<Zoom>(ZOOM) {
                zoom.touch_end(event);
            }
        });
    }

    fn touch_start(&self, event: &DomEvent) {
        event.stop_propagation();
        self.pan.set(Pan {
            start: (event.page_x, event.page_y),
            diff: (0.0, 0.0),
            ..self.pan.get()
        });
    }

    fn touch_move(&self, target: &Widget, event: &DomEvent) {
        event.stop_propagation();
        let mut pan = self.pan.get();
        pan.diff = (event.page_x - pan.start.0, event.page_y - pan.start.1);

        if self.moved_enough(pan.diff) {
            pan.xy = (pan.last.0 + pan.diff.0, pan.last.1 + pan.diff.1);
            self.pan_to(target, pan.xy);
        }
        self.pan.set(pan);
    }

    fn touch_end(&self, event: &DomEvent) {
        let mut pan = self.pan.get();
        if self.moved_enough(pan.diff) {
            event.stop_propagation();
            pan.last = pan.xy;
            self.pan.set(pan);
        }
    }
}

impl Plugin for Zoom {
    fn type_name(&self) -> &'static str {
        ZOOM
    }

    fn core(&self) -> &PluginCore {
        &self.core
    }

    fn on_disable(&self, _target: &Widget) {
        self.reset();
        self.core.set_main(None);
    }
}
