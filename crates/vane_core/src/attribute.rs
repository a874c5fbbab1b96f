//! Attribute descriptors
//!
//! Every widget owns a [`Schema`]: one [`Attribute`] per name, built from the
//! base attributes (`type`, `id`, `main`) followed by the widget's own.
//! Names that are written without being declared get a plain descriptor on
//! first `set`.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::value::Value;
use crate::widget::Widget;

/// Computed read: `(widget, stored value, name) -> value`
pub type Getter = Rc<dyn Fn(&Widget, &Value, &str) -> Value>;

/// Side effect run before a value is stored: `(widget, new value, name)`
pub type Setter = Rc<dyn Fn(&Widget, &Value, &str)>;

/// Descriptor for one named attribute
#[derive(Clone, Default)]
pub struct Attribute {
    pub(crate) value: Value,
    pub(crate) read_only: bool,
    pub(crate) getter: Option<Getter>,
    pub(crate) setter: Option<Setter>,
    pub(crate) repaint: bool,
}

impl Attribute {
    /// Attribute with an initial value
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// Reject writes through `set`
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Changes to this attribute trigger a repaint
    pub fn repaint(mut self) -> Self {
        self.repaint = true;
        self
    }

    pub fn getter<F>(mut self, getter: F) -> Self
    where
        F: Fn(&Widget, &Value, &str) -> Value + 'static,
    {
        self.getter = Some(Rc::new(getter));
        self
    }

    pub fn setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&Widget, &Value, &str) + 'static,
    {
        self.setter = Some(Rc::new(setter));
        self
    }

    /// The stored value, ignoring any getter
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_repaint(&self) -> bool {
        self.repaint
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("value", &self.value)
            .field("read_only", &self.read_only)
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .field("repaint", &self.repaint)
            .finish()
    }
}

/// Ordered attribute descriptors of one widget type
#[derive(Clone, Debug, Default)]
pub struct Schema {
    attrs: IndexMap<String, Attribute>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Schema::insert)
    pub fn with(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.insert(name, attr);
        self
    }

    /// Declare (or redeclare) an attribute
    pub fn insert(&mut self, name: impl Into<String>, attr: Attribute) {
        self.attrs.insert(name.into(), attr);
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attrs.get(name)
    }

    /// Fetch a descriptor, creating an empty one on first use
    pub(crate) fn entry(&mut self, name: &str) -> &mut Attribute {
        self.attrs.entry(name.to_string()).or_default()
    }

    /// Later declarations override earlier ones of the same name
    pub fn extend(&mut self, other: Schema) {
        self.attrs.extend(other.attrs);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

/// Options for [`Widget::set_with`](crate::Widget::set_with)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Do not emit `propertychange`
    pub silent: bool,
    /// Replace plain mappings instead of merging into the previous one
    pub overwrite: bool,
}

impl SetOptions {
    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::default()
        }
    }

    pub fn overwrite() -> Self {
        Self {
            overwrite: true,
            ..Self::default()
        }
    }
}

/// One attribute change: previous and new value
#[derive(Clone, Debug)]
pub struct Change {
    pub old: Value,
    pub new: Value,
}

/// Repaint-relevant changes of one `set` batch, in input order
pub type Changes = IndexMap<String, Change>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_flags() {
        let attr = Attribute::new(3).read_only().repaint();
        assert!(attr.is_read_only());
        assert!(attr.is_repaint());
        assert_eq!(attr.value().as_f64(), Some(3.0));
    }

    #[test]
    fn test_schema_override_order() {
        let mut base = Schema::new()
            .with("type", Attribute::new("Widget").read_only())
            .with("index", Attribute::new(0));
        base.extend(Schema::new().with("index", Attribute::new(5).repaint()));

        assert_eq!(base.names().collect::<Vec<_>>(), vec!["type", "index"]);
        let index = base.get("index").unwrap();
        assert!(index.is_repaint());
        assert_eq!(index.value().as_f64(), Some(5.0));
    }

    #[test]
    fn test_lazy_entry() {
        let mut schema = Schema::new();
        assert!(schema.get("extra").is_none());
        schema.entry("extra").value = Value::from("x");
        assert_eq!(schema.get("extra").and_then(|a| a.value().as_str()), Some("x"));
    }
}
