//! Element tree and document handle

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, Key, SlotMap};

use crate::error::Result;
use crate::event::{DomEvent, EventTarget, GlobalTarget, ListenerId, NativeListener};
use crate::selector::Selector;
use crate::timer::Timers;

new_key_type! {
    /// Unique identifier for an element
    pub struct NodeId;
}

impl NodeId {
    /// Convert to a raw u64 representation
    pub fn to_raw(self) -> u64 {
        self.data().as_ffi()
    }

    /// Create from a raw u64 produced by [`NodeId::to_raw`]
    pub fn from_raw(raw: u64) -> Self {
        Self::from(slotmap::KeyData::from_ffi(raw))
    }
}

/// Internal element storage
struct NodeData {
    tag: String,
    attributes: IndexMap<String, String>,
    styles: IndexMap<String, String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl NodeData {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: IndexMap::new(),
            styles: IndexMap::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}

type ListenerTable = IndexMap<String, Vec<(ListenerId, NativeListener)>>;

struct DomInner {
    nodes: RefCell<SlotMap<NodeId, NodeData>>,
    root: NodeId,
    body: NodeId,
    /// Expando slot per target, used by the widget event bridge
    event_keys: RefCell<FxHashMap<EventTarget, String>>,
    listeners: RefCell<FxHashMap<EventTarget, ListenerTable>>,
    next_listener: Cell<u64>,
    /// Window inner size in pixels
    viewport: Cell<(f32, f32)>,
    timers: Timers,
}

/// Handle to a host document (cheap to clone)
#[derive(Clone)]
pub struct Dom {
    inner: Rc<DomInner>,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dom")
            .field("nodes", &self.inner.nodes.borrow().len())
            .field("now", &self.inner.timers.now())
            .finish()
    }
}

impl Dom {
    /// Create a document with its `html` root and `body`
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(NodeData::new("html"));
        let body = nodes.insert(NodeData::new("body"));
        nodes[body].parent = Some(root);
        nodes[root].children.push(body);

        Self {
            inner: Rc::new(DomInner {
                nodes: RefCell::new(nodes),
                root,
                body,
                event_keys: RefCell::new(FxHashMap::default()),
                listeners: RefCell::new(FxHashMap::default()),
                next_listener: Cell::new(1),
                viewport: Cell::new((1024.0, 768.0)),
                timers: Timers::new(),
            }),
        }
    }

    /// Whether two handles refer to the same document
    pub fn ptr_eq(&self, other: &Dom) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The document element (`html`)
    pub fn root(&self) -> NodeId {
        self.inner.root
    }

    pub fn body(&self) -> NodeId {
        self.inner.body
    }

    /// Timer scheduler bound to this document
    pub fn timers(&self) -> &Timers {
        &self.inner.timers
    }

    /// Window inner size
    pub fn viewport(&self) -> (f32, f32) {
        self.inner.viewport.get()
    }

    pub fn set_viewport(&self, width: f32, height: f32) {
        self.inner.viewport.set((width, height));
    }

    // =========================================================================
    // Tree
    // =========================================================================

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.inner.nodes.borrow_mut().insert(NodeData::new(tag))
    }

    /// Check if a node handle is still live
    pub fn is_alive(&self, node: NodeId) -> bool {
        self.inner.nodes.borrow().contains_key(node)
    }

    /// Lower-case tag name
    pub fn tag(&self, node: NodeId) -> Option<String> {
        self.inner.nodes.borrow().get(node).map(|n| n.tag.clone())
    }

    /// Append `child` to `parent`, detaching it from its previous parent
    ///
    /// Appending a node into its own subtree is ignored.
    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        if self.contains(child, parent) {
            return;
        }
        self.detach(child);

        let mut nodes = self.inner.nodes.borrow_mut();
        if !nodes.contains_key(parent) || !nodes.contains_key(child) {
            return;
        }
        nodes[child].parent = Some(parent);
        nodes[parent].children.push(child);
    }

    /// Remove `child` from `parent`
    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> bool {
        if self.parent(child) != Some(parent) {
            return false;
        }
        self.detach(child);
        true
    }

    /// Detach a node from its parent (the node stays alive)
    pub fn detach(&self, node: NodeId) {
        let mut nodes = self.inner.nodes.borrow_mut();
        let Some(parent) = nodes.get(node).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = nodes.get_mut(parent) {
            p.children.retain(|&c| c != node);
        }
        nodes[node].parent = None;
    }

    /// Remove every child of `node`
    pub fn clear_children(&self, node: NodeId) {
        for child in self.children(node) {
            self.detach(child);
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.nodes.borrow().get(node).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner
            .nodes
            .borrow()
            .get(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Inclusive containment, like `Node.contains`
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let nodes = self.inner.nodes.borrow();
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = nodes.get(current).and_then(|n| n.parent);
        }
        false
    }

    /// Whether the node is part of the document tree
    pub fn is_attached(&self, node: NodeId) -> bool {
        self.contains(self.inner.root, node)
    }

    /// All descendants of `node` in document order (excluding `node`)
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let nodes = self.inner.nodes.borrow();
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match nodes.get(node) {
            Some(n) => n.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(n) = nodes.get(current) {
                stack.extend(n.children.iter().rev().copied());
            }
        }
        out
    }

    pub fn set_text(&self, node: NodeId, text: impl Into<String>) {
        if let Some(n) = self.inner.nodes.borrow_mut().get_mut(node) {
            n.text = text.into();
        }
    }

    pub fn text(&self, node: NodeId) -> String {
        self.inner
            .nodes
            .borrow()
            .get(node)
            .map(|n| n.text.clone())
            .unwrap_or_default()
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    pub fn get_attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.inner
            .nodes
            .borrow()
            .get(node)
            .and_then(|n| n.attributes.get(name).cloned())
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: impl Into<String>) {
        if let Some(n) = self.inner.nodes.borrow_mut().get_mut(node) {
            n.attributes.insert(name.to_string(), value.into());
        }
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) {
        if let Some(n) = self.inner.nodes.borrow_mut().get_mut(node) {
            n.attributes.shift_remove(name);
        }
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.inner
            .nodes
            .borrow()
            .get(node)
            .is_some_and(|n| n.attributes.contains_key(name))
    }

    /// Read a `data-*` attribute
    pub fn get_data(&self, node: NodeId, name: &str) -> Option<String> {
        self.get_attribute(node, &format!("data-{name}"))
    }

    /// Write a `data-*` attribute
    pub fn set_data(&self, node: NodeId, name: &str, value: impl Into<String>) {
        self.set_attribute(node, &format!("data-{name}"), value);
    }

    // =========================================================================
    // Classes
    // =========================================================================

    pub fn class_list(&self, node: NodeId) -> Vec<String> {
        self.get_attribute(node, "class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.class_list(node).iter().any(|c| c == class)
    }

    pub fn add_class(&self, node: NodeId, class: &str) {
        let mut classes = self.class_list(node);
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
            self.set_attribute(node, "class", classes.join(" "));
        }
    }

    pub fn remove_class(&self, node: NodeId, class: &str) {
        let mut classes = self.class_list(node);
        let before = classes.len();
        classes.retain(|c| c != class);
        if classes.len() != before {
            self.set_attribute(node, "class", classes.join(" "));
        }
    }

    /// Toggle a class; `force` pins the outcome
    pub fn toggle_class(&self, node: NodeId, class: &str, force: Option<bool>) {
        let add = force.unwrap_or_else(|| !self.has_class(node, class));
        if add {
            self.add_class(node, class);
        } else {
            self.remove_class(node, class);
        }
    }

    // =========================================================================
    // Inline styles
    // =========================================================================

    pub fn set_style(&self, node: NodeId, name: &str, value: impl Into<String>) {
        if let Some(n) = self.inner.nodes.borrow_mut().get_mut(node) {
            n.styles.insert(name.to_string(), value.into());
        }
    }

    pub fn get_style(&self, node: NodeId, name: &str) -> Option<String> {
        self.inner
            .nodes
            .borrow()
            .get(node)
            .and_then(|n| n.styles.get(name).cloned())
    }

    pub fn remove_style(&self, node: NodeId, name: &str) {
        if let Some(n) = self.inner.nodes.borrow_mut().get_mut(node) {
            n.styles.shift_remove(name);
        }
    }

    /// Numeric value of a pixel style such as `width: 320px` (0 when unset)
    pub fn style_px(&self, node: NodeId, name: &str) -> f32 {
        self.get_style(node, name)
            .and_then(|v| v.trim_end_matches("px").trim().parse::<f32>().ok())
            .unwrap_or(0.0)
    }

    pub fn hide(&self, node: NodeId) {
        self.set_style(node, "display", "none");
    }

    pub fn show(&self, node: NodeId) {
        self.remove_style(node, "display");
    }

    pub fn is_hidden(&self, node: NodeId) -> bool {
        self.get_style(node, "display").as_deref() == Some("none")
    }

    // =========================================================================
    // Selectors
    // =========================================================================

    /// First descendant of `scope` matching `selector`
    pub fn query(&self, selector: &str, scope: NodeId) -> Result<Option<NodeId>> {
        let selector = Selector::parse(selector)?;
        Ok(self
            .descendants(scope)
            .into_iter()
            .find(|&node| selector.matches(self, node)))
    }

    /// Every descendant of `scope` matching `selector`, in document order
    pub fn query_all(&self, selector: &str, scope: NodeId) -> Result<Vec<NodeId>> {
        let selector = Selector::parse(selector)?;
        Ok(self
            .descendants(scope)
            .into_iter()
            .filter(|&node| selector.matches(self, node))
            .collect())
    }

    pub fn matches(&self, node: NodeId, selector: &str) -> Result<bool> {
        Ok(Selector::parse(selector)?.matches(self, node))
    }

    // =========================================================================
    // Native events
    // =========================================================================

    /// Classify one of the four singleton targets
    pub fn global_target(&self, target: EventTarget) -> Option<GlobalTarget> {
        match target {
            EventTarget::Window => Some(GlobalTarget::Window),
            EventTarget::Document => Some(GlobalTarget::Document),
            EventTarget::Node(node) if node == self.inner.root => Some(GlobalTarget::Root),
            EventTarget::Node(node) if node == self.inner.body => Some(GlobalTarget::Body),
            EventTarget::Node(_) => None,
        }
    }

    /// The target behind a singleton
    pub fn global(&self, global: GlobalTarget) -> EventTarget {
        match global {
            GlobalTarget::Window => EventTarget::Window,
            GlobalTarget::Document => EventTarget::Document,
            GlobalTarget::Root => EventTarget::Node(self.inner.root),
            GlobalTarget::Body => EventTarget::Node(self.inner.body),
        }
    }

    /// Read the expando key stamped on a target
    pub fn event_key(&self, target: EventTarget) -> Option<String> {
        self.inner.event_keys.borrow().get(&target).cloned()
    }

    /// Stamp an expando key on a target
    pub fn set_event_key(&self, target: EventTarget, key: impl Into<String>) {
        self.inner.event_keys.borrow_mut().insert(target, key.into());
    }

    /// Attach a native listener
    pub fn add_event_listener<F>(&self, target: EventTarget, kind: &str, listener: F) -> ListenerId
    where
        F: Fn(&DomEvent) + 'static,
    {
        self.add_native_listener(target, kind, Rc::new(listener))
    }

    /// Attach an already shared native listener
    pub fn add_native_listener(
        &self,
        target: EventTarget,
        kind: &str,
        listener: NativeListener,
    ) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.get());
        self.inner.next_listener.set(id.0 + 1);

        self.inner
            .listeners
            .borrow_mut()
            .entry(target)
            .or_default()
            .entry(kind.to_string())
            .or_default()
            .push((id, listener));

        tracing::trace!(?target, kind, listener = id.0, "native listener attached");
        id
    }

    /// Detach a native listener; returns whether it was attached
    pub fn remove_event_listener(&self, target: EventTarget, kind: &str, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let Some(table) = listeners.get_mut(&target) else {
            return false;
        };
        let Some(queue) = table.get_mut(kind) else {
            return false;
        };

        let before = queue.len();
        queue.retain(|(existing, _)| *existing != id);
        let removed = queue.len() != before;

        if queue.is_empty() {
            table.shift_remove(kind);
        }
        if table.is_empty() {
            listeners.remove(&target);
        }

        if removed {
            tracing::trace!(?target, kind, listener = id.0, "native listener detached");
        }
        removed
    }

    /// Number of native listeners for `(target, kind)`
    pub fn listener_count(&self, target: EventTarget, kind: &str) -> usize {
        self.inner
            .listeners
            .borrow()
            .get(&target)
            .and_then(|t| t.get(kind))
            .map_or(0, Vec::len)
    }

    /// Dispatch an event at `target`
    ///
    /// Listeners on the target run first, then the event bubbles through the
    /// element's ancestors and, for attached elements, the document and the
    /// window. Returns `false` if a listener called `prevent_default`.
    pub fn dispatch_event(&self, target: EventTarget, mut event: DomEvent) -> bool {
        event.set_target(target);

        for current in self.propagation_path(target) {
            event.set_current_target(current);

            let queue: Vec<NativeListener> = self
                .inner
                .listeners
                .borrow()
                .get(&current)
                .and_then(|t| t.get(event.kind()))
                .map(|q| q.iter().map(|(_, l)| l.clone()).collect())
                .unwrap_or_default();

            for listener in queue {
                listener(&event);
            }

            if event.propagation_stopped() {
                break;
            }
        }

        !event.default_prevented()
    }

    fn propagation_path(&self, target: EventTarget) -> Vec<EventTarget> {
        match target {
            EventTarget::Window => vec![EventTarget::Window],
            EventTarget::Document => vec![EventTarget::Document, EventTarget::Window],
            EventTarget::Node(node) => {
                let mut path = vec![EventTarget::Node(node)];
                let mut cursor = self.parent(node);
                while let Some(parent) = cursor {
                    path.push(EventTarget::Node(parent));
                    cursor = self.parent(parent);
                }
                if self.is_attached(node) {
                    path.push(EventTarget::Document);
                    path.push(EventTarget::Window);
                }
                path
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_skeleton() {
        let dom = Dom::new();
        assert_eq!(dom.tag(dom.root()).as_deref(), Some("html"));
        assert_eq!(dom.parent(dom.body()), Some(dom.root()));
        assert!(dom.is_attached(dom.body()));
    }

    #[test]
    fn test_append_moves_node() {
        let dom = Dom::new();
        let a = dom.create_element("div");
        let b = dom.create_element("div");
        let child = dom.create_element("span");

        dom.append_child(a, child);
        dom.append_child(b, child);

        assert!(dom.children(a).is_empty());
        assert_eq!(dom.children(b), vec![child]);
        assert_eq!(dom.parent(child), Some(b));

        // Cycles are refused
        dom.append_child(child, b);
        assert_eq!(dom.parent(b), None);
    }

    #[test]
    fn test_descendants_document_order() {
        let dom = Dom::new();
        let a = dom.create_element("div");
        let a1 = dom.create_element("div");
        let a2 = dom.create_element("div");
        let b = dom.create_element("div");
        dom.append_child(dom.body(), a);
        dom.append_child(a, a1);
        dom.append_child(a, a2);
        dom.append_child(dom.body(), b);

        assert_eq!(dom.descendants(dom.body()), vec![a, a1, a2, b]);
    }

    #[test]
    fn test_classes_and_styles() {
        let dom = Dom::new();
        let node = dom.create_element("div");

        dom.add_class(node, "ui");
        dom.add_class(node, "full");
        dom.add_class(node, "ui");
        assert_eq!(dom.class_list(node), vec!["ui", "full"]);

        dom.toggle_class(node, "full", Some(false));
        assert!(!dom.has_class(node, "full"));
        dom.toggle_class(node, "full", None);
        assert!(dom.has_class(node, "full"));

        dom.set_style(node, "width", "320px");
        assert_eq!(dom.style_px(node, "width"), 320.0);
        dom.hide(node);
        assert!(dom.is_hidden(node));
        dom.show(node);
        assert!(!dom.is_hidden(node));
    }

    #[test]
    fn test_query() {
        let dom = Dom::new();
        let list = dom.create_element("ul");
        dom.append_child(dom.body(), list);
        let items: Vec<_> = (0..3)
            .map(|i| {
                let li = dom.create_element("li");
                dom.set_data(li, "role", "item");
                dom.set_attribute(li, "id", format!("item{i}"));
                dom.append_child(list, li);
                li
            })
            .collect();

        assert_eq!(dom.query_all("[data-role=item]", list).unwrap(), items);
        assert_eq!(dom.query("#item1", dom.root()).unwrap(), Some(items[1]));
        assert_eq!(dom.query("p", dom.root()).unwrap(), None);
        assert!(dom.query("!!", dom.root()).is_err());
    }

    #[test]
    fn test_dispatch_bubbles_to_window() {
        let dom = Dom::new();
        let node = dom.create_element("div");
        dom.append_child(dom.body(), node);

        let log = Rc::new(RefCell::new(Vec::new()));
        for target in [
            EventTarget::Node(node),
            EventTarget::Node(dom.body()),
            EventTarget::Document,
            EventTarget::Window,
        ] {
            let log = log.clone();
            dom.add_event_listener(target, "click", move |ev| {
                log.borrow_mut().push(ev.current_target());
            });
        }

        dom.dispatch_event(EventTarget::Node(node), DomEvent::new("click"));
        assert_eq!(
            *log.borrow(),
            vec![
                EventTarget::Node(node),
                EventTarget::Node(dom.body()),
                EventTarget::Document,
                EventTarget::Window,
            ]
        );
    }

    #[test]
    fn test_stop_propagation_and_prevent_default() {
        let dom = Dom::new();
        let node = dom.create_element("div");
        dom.append_child(dom.body(), node);

        let reached_body = Rc::new(Cell::new(false));
        dom.add_event_listener(EventTarget::Node(node), "touchstart", |ev| {
            ev.prevent_default();
            ev.stop_propagation();
        });
        let flag = reached_body.clone();
        dom.add_event_listener(EventTarget::Node(dom.body()), "touchstart", move |_| {
            flag.set(true);
        });

        let allowed = dom.dispatch_event(EventTarget::Node(node), DomEvent::new("touchstart"));
        assert!(!allowed);
        assert!(!reached_body.get());
    }

    #[test]
    fn test_listener_removal() {
        let dom = Dom::new();
        let id = dom.add_event_listener(EventTarget::Window, "resize", |_| {});
        assert_eq!(dom.listener_count(EventTarget::Window, "resize"), 1);
        assert!(dom.remove_event_listener(EventTarget::Window, "resize", id));
        assert!(!dom.remove_event_listener(EventTarget::Window, "resize", id));
        assert_eq!(dom.listener_count(EventTarget::Window, "resize"), 0);
    }

    #[test]
    fn test_global_targets() {
        let dom = Dom::new();
        let node = dom.create_element("div");
        assert_eq!(
            dom.global_target(EventTarget::Node(dom.body())),
            Some(GlobalTarget::Body)
        );
        assert_eq!(
            dom.global_target(EventTarget::Node(dom.root())),
            Some(GlobalTarget::Root)
        );
        assert_eq!(dom.global_target(EventTarget::Node(node)), None);
        assert_eq!(dom.global(GlobalTarget::Document), EventTarget::Document);
    }
}
