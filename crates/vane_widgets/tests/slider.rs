//! Slider behaviour driven through the host document

mod common;

use vane_core::dom::{DomEvent, EventTarget, NodeId};
use vane_core::{Options, Registry};
use vane_widgets::plugins::SliderFlex;
use vane_widgets::{Slider, SLIDER_FLEX};

fn fixture(registry: &Registry, items: usize) -> (NodeId, NodeId) {
    let dom = registry.dom();
    let main = dom.create_element("div");
    dom.set_style(main, "width", "300px");
    let wrapper = dom.create_element("ul");
    dom.append_child(main, wrapper);
    for _ in 0..items {
        let item = dom.create_element("li");
        dom.append_child(wrapper, item);
    }
    dom.append_child(dom.body(), main);
    (main, wrapper)
}

fn drag(registry: &Registry, main: NodeId, from: f32, to: f32) {
    let dom = registry.dom();
    dom.dispatch_event(EventTarget::Node(main), DomEvent::new("touchstart").with_page(from, 0.0));
    dom.dispatch_event(EventTarget::Node(main), DomEvent::new("touchmove").with_page(to, 0.0));
    dom.dispatch_event(EventTarget::Node(main), DomEvent::new("touchend").with_page(to, 0.0));
}

#[test]
fn test_render_sizes_items_to_main() {
    let registry = common::registry();
    let (main, wrapper) = fixture(&registry, 3);
    let slider = Slider::new(&registry, Options::new().main(main).set("auto", false)).unwrap();
    let log = common::record(&slider, &["resize", "active"]);

    slider.render().unwrap();

    let dom = registry.dom();
    assert_eq!(dom.get_data(wrapper, "role").as_deref(), Some("wrapper"));
    for item in dom.children(wrapper) {
        assert_eq!(dom.get_data(item, "role").as_deref(), Some("item"));
        assert_eq!(dom.get_style(item, "width").as_deref(), Some("300px"));
    }
    assert_eq!(dom.get_style(wrapper, "width").as_deref(), Some("900px"));
    assert_eq!(slider.runtime().len(), 3);
    assert!(slider.runtime().is_active());
    assert_eq!(*log.borrow(), vec!["resize:null,300", "active"]);
}

#[test]
fn test_navigation_clamps_and_reports_changes() {
    let registry = common::registry();
    let (main, wrapper) = fixture(&registry, 3);
    let slider = Slider::new(&registry, Options::new().main(main).set("auto", false)).unwrap();
    slider.render().unwrap();
    let log = common::record(&slider, &["change"]);

    slider.next().unwrap();
    assert_eq!(slider.get("index").as_i64(), Some(1));
    assert_eq!(
        registry.dom().get_style(wrapper, "transform").as_deref(),
        Some("translate(-300px, 0) translateZ(0)")
    );
    assert_eq!(
        registry.dom().get_style(wrapper, "transition-duration").as_deref(),
        Some("400ms")
    );

    slider.to(10).unwrap();
    assert_eq!(slider.get("index").as_i64(), Some(2));
    slider.next().unwrap();
    slider.prev().unwrap();
    slider.to(-4).unwrap();

    assert_eq!(*log.borrow(), vec!["change:0,1", "change:1,2", "change:2,1", "change:1,0"]);
}

#[test]
fn test_inactive_slider_ignores_moves() {
    let registry = common::registry();
    let (main, _) = fixture(&registry, 3);
    let slider = Slider::new(&registry, Options::new().main(main).set("auto", false)).unwrap();
    slider.render().unwrap();
    let log = common::record(&slider, &["inactive", "active"]);

    slider.inactive();
    slider.inactive();
    slider.next().unwrap();
    assert_eq!(slider.get("index").as_i64(), Some(0));

    slider.active();
    slider.next().unwrap();
    assert_eq!(slider.get("index").as_i64(), Some(1));
    assert_eq!(*log.borrow(), vec!["inactive", "active"]);
}

#[test]
fn test_auto_advance_wraps_around() {
    let registry = common::registry();
    let (main, _) = fixture(&registry, 3);
    let slider = Slider::new(&registry, Options::new().main(main).set("interval", 1000)).unwrap();
    slider.render().unwrap();
    assert!(slider.runtime().is_looping());

    let timers = registry.dom().timers();
    timers.advance(999);
    assert_eq!(slider.get("index").as_i64(), Some(0));
    timers.advance(1);
    assert_eq!(slider.get("index").as_i64(), Some(1));
    timers.advance(1000);
    assert_eq!(slider.get("index").as_i64(), Some(2));
    timers.advance(1000);
    assert_eq!(slider.get("index").as_i64(), Some(0));

    slider.stop();
    assert!(!slider.runtime().is_looping());
    timers.advance(5000);
    assert_eq!(slider.get("index").as_i64(), Some(0));
}

#[test]
fn test_single_item_never_loops() {
    let registry = common::registry();
    let (main, _) = fixture(&registry, 1);
    let slider = Slider::new(&registry, Options::new().main(main)).unwrap();
    slider.render().unwrap();
    assert!(!slider.runtime().is_looping());
}

#[test]
fn test_dispose_stops_the_loop() {
    let registry = common::registry();
    let (main, _) = fixture(&registry, 3);
    let slider = Slider::new(&registry, Options::new().main(main).set("interval", 500)).unwrap();
    slider.render().unwrap();

    slider.dispose();
    assert!(!slider.runtime().is_looping());
    assert!(!slider.runtime().is_active());

    registry.dom().timers().advance(5000);
    assert_eq!(registry.dom().timers().pending(), 0);
}

#[test]
fn test_drag_switches_items() {
    let registry = common::registry();
    let (main, _) = fixture(&registry, 3);
    let slider = Slider::new(&registry, Options::new().main(main).set("auto", false)).unwrap();
    slider.render().unwrap();

    drag(&registry, main, 200.0, 100.0);
    assert_eq!(slider.get("index").as_i64(), Some(1));

    drag(&registry, main, 100.0, 180.0);
    assert_eq!(slider.get("index").as_i64(), Some(0));

    // Past moveAt but short of switchAt snaps back
    drag(&registry, main, 100.0, 80.0);
    assert_eq!(slider.get("index").as_i64(), Some(0));
}

#[test]
fn test_touch_move_prevents_scrolling_once_dragging() {
    let registry = common::registry();
    let (main, _) = fixture(&registry, 3);
    let slider = Slider::new(&registry, Options::new().main(main).set("auto", false)).unwrap();
    slider.render().unwrap();

    let dom = registry.dom();
    dom.dispatch_event(EventTarget::Node(main), DomEvent::new("touchstart").with_page(100.0, 0.0));
    assert!(dom.dispatch_event(EventTarget::Node(main), DomEvent::new("touchmove").with_page(95.0, 0.0)));
    assert!(!dom.dispatch_event(EventTarget::Node(main), DomEvent::new("touchmove").with_page(50.0, 0.0)));
}

#[test]
fn test_flex_follows_window_resize() {
    let registry = common::registry();
    let (main, wrapper) = fixture(&registry, 2);
    let slider = Slider::new(
        &registry,
        Options::new().main(main).set("auto", false).set("flex", true),
    )
    .unwrap();
    slider.render().unwrap();

    let flex = slider.plugin_as::<SliderFlex>(SLIDER_FLEX).unwrap();
    assert!(flex.is_listening());

    let dom = registry.dom();
    dom.set_style(main, "width", "500px");
    dom.dispatch_event(EventTarget::Window, DomEvent::new("resize"));
    dom.dispatch_event(EventTarget::Window, DomEvent::new("resize"));
    assert_eq!(slider.runtime().width(), Some(300.0));

    dom.timers().advance(vane_core::DEBOUNCE_WAIT);
    assert_eq!(slider.runtime().width(), Some(500.0));
    assert_eq!(dom.get_style(wrapper, "width").as_deref(), Some("1000px"));

    slider.set("flex", false).unwrap();
    assert!(!flex.is_listening());
    dom.set_style(main, "width", "200px");
    dom.dispatch_event(EventTarget::Window, DomEvent::new("resize"));
    dom.timers().advance(vane_core::DEBOUNCE_WAIT);
    assert_eq!(slider.runtime().width(), Some(500.0));
}

#[test]
fn test_declared_slider_is_created_by_init() {
    let registry = common::registry();
    let (main, _) = fixture(&registry, 2);
    registry
        .dom()
        .set_attribute(main, "s-ui", r#"{"type":"Slider","auto":false,"speed":250}"#);

    let created = registry.init(registry.dom().body()).unwrap();
    assert_eq!(created.len(), 1);

    let slider = Slider::from_widget(&created[0]).unwrap();
    assert_eq!(slider.get("speed").as_i64(), Some(250));
    assert!(slider.is("render"));
    assert_eq!(registry.find(registry.dom().body()).len(), 1);

    assert!(registry.init(registry.dom().body()).unwrap().is_empty());
}
