//! Dynamic attribute values
//!
//! Widget attributes are loosely typed: a slider index is a number, an image
//! list is an array of strings, a parameter bag is a plain mapping, and the
//! main element is an opaque node handle. [`Value`] covers all of them.
//!
//! Composite variants are reference counted and compare by identity at the
//! identity step of [`is_equal`](crate::equal::is_equal), so cloning a value
//! keeps it "the same object" while building a new one does not.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use vane_dom::NodeId;

use crate::emitter::Listener;

/// Insertion-ordered plain mapping
pub type Map = IndexMap<String, Value>;

/// A wrapped primitive (the `new String("a")` family)
#[derive(Clone, Debug)]
pub enum Primitive {
    Bool(bool),
    Number(f64),
    String(String),
}

/// A point in time, in milliseconds since the epoch
#[derive(Clone, Copy, Debug)]
pub struct Date {
    pub timestamp: f64,
}

/// A regular expression literal: source pattern plus flags
#[derive(Clone, Debug)]
pub struct RegExp {
    pub source: String,
    pub global: bool,
    pub ignore_case: bool,
    pub multiline: bool,
}

impl RegExp {
    fn flags(&self) -> String {
        let mut flags = String::new();
        if self.global {
            flags.push('g');
        }
        if self.ignore_case {
            flags.push('i');
        }
        if self.multiline {
            flags.push('m');
        }
        flags
    }
}

/// Type tag returned by [`classify`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Undefined,
    Null,
    Boolean,
    Number,
    String,
    Function,
    Array,
    Date,
    RegExp,
    Object,
    Error,
}

impl TypeTag {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::Undefined => "undefined",
            TypeTag::Null => "null",
            TypeTag::Boolean => "boolean",
            TypeTag::Number => "number",
            TypeTag::String => "string",
            TypeTag::Function => "function",
            TypeTag::Array => "array",
            TypeTag::Date => "date",
            TypeTag::RegExp => "regexp",
            TypeTag::Object => "object",
            TypeTag::Error => "error",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dynamically typed attribute value
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    /// Wrapped primitive with object identity
    Boxed(Rc<Primitive>),
    Array(Rc<Vec<Value>>),
    /// Plain mapping
    Object(Rc<Map>),
    Date(Rc<Date>),
    RegExp(Rc<RegExp>),
    Function(Listener),
    Error(Rc<str>),
    /// Element handle
    Node(NodeId),
    /// Anything else the host hands over; classified as a non-plain object
    Handle(Rc<dyn Any>),
}

impl Value {
    // =========================================================================
    // Constructors
    // =========================================================================

    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    /// Build a plain mapping
    pub fn object<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Object(Rc::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    /// Build an array
    pub fn array<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Value::Array(Rc::new(items.into_iter().map(Into::into).collect()))
    }

    pub fn date(timestamp: f64) -> Self {
        Value::Date(Rc::new(Date { timestamp }))
    }

    pub fn regexp(source: impl Into<String>, global: bool, ignore_case: bool, multiline: bool) -> Self {
        Value::RegExp(Rc::new(RegExp {
            source: source.into(),
            global,
            ignore_case,
            multiline,
        }))
    }

    pub fn boxed(primitive: Primitive) -> Self {
        Value::Boxed(Rc::new(primitive))
    }

    pub fn error(message: impl AsRef<str>) -> Self {
        Value::Error(Rc::from(message.as_ref()))
    }

    pub fn handle<T: Any>(value: T) -> Self {
        Value::Handle(Rc::new(value))
    }

    /// Wrap an event listener so it can travel through option mappings
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&crate::emitter::WidgetEvent, &[Value]) + 'static,
    {
        Value::Function(Rc::new(f))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Boolean content of a bare or wrapped boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Boxed(p) => match p.as_ref() {
                Primitive::Bool(b) => Some(*b),
                _ => None,
            },
            _ => None,
        }
    }

    /// Numeric content of a bare or wrapped number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Boxed(p) => match p.as_ref() {
                Primitive::Number(n) => Some(*n),
                _ => None,
            },
            _ => None,
        }
    }

    /// Numeric content truncated to an integer
    pub fn as_i64(&self) -> Option<i64> {
        self.as_f64().filter(|n| n.is_finite()).map(|n| n as i64)
    }

    /// String content of a bare or wrapped string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Boxed(p) => match p.as_ref() {
                Primitive::String(s) => Some(s),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(node) => Some(*node),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Listener> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_handle<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Handle(h) => h.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Look up a key of a plain mapping
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Truthiness with the usual loose rules
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Whether `typeof` would report `"object"`
    pub(crate) fn is_object_typed(&self) -> bool {
        !matches!(
            self,
            Value::Undefined
                | Value::Bool(_)
                | Value::Number(_)
                | Value::String(_)
                | Value::Function(_)
        )
    }

    /// Identity comparison: primitives by value, everything else by reference
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boxed(a), Value::Boxed(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Date(a), Value::Date(b)) => Rc::ptr_eq(a, b),
            (Value::RegExp(a), Value::RegExp(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => thin_ptr_eq(a, b),
            (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b),
            (Value::Node(a), Value::Node(b)) => a == b,
            (Value::Handle(a), Value::Handle(b)) => thin_ptr_eq(a, b),
            _ => false,
        }
    }

    /// String conversion with the usual loose rules (`null` -> `"null"`,
    /// arrays joined with commas, objects as `[object Object]`)
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Boxed(p) => match p.as_ref() {
                Primitive::Bool(b) => b.to_string(),
                Primitive::Number(n) => format_number(*n),
                Primitive::String(s) => s.clone(),
            },
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Undefined | Value::Null => String::new(),
                    other => other.to_js_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) | Value::Handle(_) => "[object Object]".into(),
            Value::Node(_) => "[object HTMLElement]".into(),
            Value::Date(d) => format!("Date({})", format_number(d.timestamp)),
            Value::RegExp(r) => format!("/{}/{}", r.source, r.flags()),
            Value::Function(_) => "function () { [native code] }".into(),
            Value::Error(message) => format!("Error: {message}"),
        }
    }
}

/// Compare two `Rc`s of possibly unsized data by address only
pub(crate) fn thin_ptr_eq<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.into()
    } else if n == 0.0 {
        // Covers -0
        "0".into()
    } else if n.abs() >= 1e21 {
        let exp = format!("{n:e}");
        match exp.split_once('e') {
            Some((mantissa, power)) if !power.starts_with('-') => format!("{mantissa}e+{power}"),
            _ => exp,
        }
    } else {
        // Shortest round-trip digits; whole numbers print without a fraction
        format!("{n}")
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Structural type tag of a value
///
/// Wrapped primitives classify as their primitive type; element and opaque
/// handles classify as `object`.
pub fn classify(value: &Value) -> TypeTag {
    match value {
        Value::Undefined => TypeTag::Undefined,
        Value::Null => TypeTag::Null,
        Value::Bool(_) => TypeTag::Boolean,
        Value::Number(_) => TypeTag::Number,
        Value::String(_) => TypeTag::String,
        Value::Boxed(p) => match p.as_ref() {
            Primitive::Bool(_) => TypeTag::Boolean,
            Primitive::Number(_) => TypeTag::Number,
            Primitive::String(_) => TypeTag::String,
        },
        Value::Array(_) => TypeTag::Array,
        Value::Object(_) | Value::Node(_) | Value::Handle(_) => TypeTag::Object,
        Value::Date(_) => TypeTag::Date,
        Value::RegExp(_) => TypeTag::RegExp,
        Value::Function(_) => TypeTag::Function,
        Value::Error(_) => TypeTag::Error,
    }
}

/// True only for bare mappings, never for element or host handles
pub fn is_plain_object(value: &Value) -> bool {
    matches!(value, Value::Object(_))
}

/// True for `null`, `undefined`, `""`, `[]` and `{}`
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Undefined | Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<NodeId> for Value {
    fn from(node: NodeId) -> Self {
        Value::Node(node)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(Rc::new(map))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(items))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::from(items.into_iter().map(Value::from).collect::<Vec<_>>())
            }
            serde_json::Value::Object(map) => Value::from(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect::<Map>(),
            ),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Boxed(p) => write!(f, "Boxed({p:?})"),
            Value::Array(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Object(map) => f.debug_map().entries(map.iter()).finish(),
            Value::Date(d) => write!(f, "Date({})", d.timestamp),
            Value::RegExp(r) => write!(f, "/{}/{}", r.source, r.flags()),
            Value::Function(_) => f.write_str("Function"),
            Value::Error(message) => write!(f, "Error({message:?})"),
            Value::Node(node) => write!(f, "Node({node:?})"),
            Value::Handle(_) => f.write_str("Handle"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_js_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_wrapped_primitives() {
        assert_eq!(classify(&Value::boxed(Primitive::String("a".into()))), TypeTag::String);
        assert_eq!(classify(&Value::boxed(Primitive::Number(1.0))), TypeTag::Number);
        assert_eq!(classify(&Value::boxed(Primitive::Bool(true))), TypeTag::Boolean);
        assert_eq!(classify(&Value::Null), TypeTag::Null);
        assert_eq!(classify(&Value::Undefined), TypeTag::Undefined);
        assert_eq!(classify(&Value::date(0.0)), TypeTag::Date);
        assert_eq!(classify(&Value::regexp("a", false, false, false)), TypeTag::RegExp);
        assert_eq!(classify(&Value::error("boom")), TypeTag::Error);
        assert_eq!(classify(&Value::function(|_, _| {})), TypeTag::Function);
        assert_eq!(classify(&Value::handle(42u8)), TypeTag::Object);
    }

    #[test]
    fn test_plain_object() {
        assert!(is_plain_object(&Value::object([("a", 1)])));
        assert!(!is_plain_object(&Value::handle(())));
        assert!(!is_plain_object(&Value::array([1])));
        assert!(!is_plain_object(&Value::Null));
    }

    #[test]
    fn test_is_empty() {
        assert!(is_empty(&Value::Null));
        assert!(is_empty(&Value::Undefined));
        assert!(is_empty(&Value::from("")));
        assert!(is_empty(&Value::array(Vec::<Value>::new())));
        assert!(is_empty(&Value::object(Vec::<(String, Value)>::new())));
        assert!(!is_empty(&Value::from(0)));
        assert!(!is_empty(&Value::from(false)));
        assert!(!is_empty(&Value::array([Value::Null])));
    }

    #[test]
    fn test_js_string() {
        assert_eq!(Value::array([1, 2]).to_js_string(), "1,2");
        assert_eq!(
            Value::array([Value::from(1), Value::Null, Value::from("x")]).to_js_string(),
            "1,,x"
        );
        assert_eq!(
            Value::array([Value::object([("a", 1)])]).to_js_string(),
            "[object Object]"
        );
        assert_eq!(Value::from(1.5).to_js_string(), "1.5");
        assert_eq!(Value::from(-0.0).to_js_string(), "0");
        assert_eq!(Value::from(1e19).to_js_string(), "10000000000000000000");
        assert_eq!(Value::from(-2e19).to_js_string(), "-20000000000000000000");
        assert_eq!(Value::from(1e21).to_js_string(), "1e+21");
        assert_eq!(Value::from(2.5e-30).to_js_string(), format!("{}", 2.5e-30));
    }

    #[test]
    fn test_from_json() {
        let json: serde_json::Value = serde_json::json!({"index": 2, "items": ["a", "b"]});
        let value = Value::from(json);
        assert_eq!(value.get("index").and_then(Value::as_f64), Some(2.0));
        assert_eq!(value.get("items").and_then(Value::as_array).map(<[Value]>::len), Some(2));
    }

    #[test]
    fn test_identity() {
        let a = Value::object([("a", 1)]);
        let b = a.clone();
        assert!(a.identical(&b));
        assert!(!a.identical(&Value::object([("a", 1)])));
        assert!(!Value::Number(f64::NAN).identical(&Value::Number(f64::NAN)));
    }
}
