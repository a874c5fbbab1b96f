//! Shared fixtures for the widget integration tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use tracing_subscriber::EnvFilter;
use vane_core::{Registry, Widget};

/// Route `tracing` output through the test harness (`RUST_LOG=debug`)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Registry with every bundled widget and plugin type
pub fn registry() -> Registry {
    init_tracing();
    let registry = Registry::default();
    vane_widgets::register_all(&registry).unwrap();
    registry
}

/// Records `kind` or `kind:arg,arg` for each listed widget event
pub fn record(widget: &Widget, kinds: &[&str]) -> Rc<RefCell<Vec<String>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    for kind in kinds {
        let log = log.clone();
        widget.on(kind, move |event, args| {
            let entry = if args.is_empty() {
                event.kind().to_string()
            } else {
                let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                format!("{}:{}", event.kind(), args.join(","))
            };
            log.borrow_mut().push(entry);
        });
    }
    log
}
