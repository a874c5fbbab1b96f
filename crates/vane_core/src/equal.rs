//! Change detection
//!
//! [`is_equal`] decides whether an attribute write is a real change. It is
//! deliberately loose:
//!
//! - every "empty" value (`null`, `undefined`, `""`, `[]`, `{}`) equals every other
//! - arrays compare by their comma-joined form, and any array holding an
//!   object never equals anything but itself
//! - plain mappings compare one level deep, values by identity
//!
//! Attribute change events and repaint batching depend on these shortcuts,
//! so nested mapping changes two levels down are not detected.

use std::sync::OnceLock;

use regex::Regex;

use crate::value::{classify, is_empty, is_plain_object, TypeTag, Value};

/// Matches the generic `[object X]` stringification of a non-primitive
fn object_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"\[object\s").expect("constant pattern"))
}

/// Loose equality used to suppress redundant change notifications
pub fn is_equal(x: &Value, y: &Value) -> bool {
    if x.identical(y) {
        return true;
    }

    // Empty values are interchangeable, whatever their type
    if is_empty(x) && is_empty(y) {
        return true;
    }

    let tag = classify(x);
    if tag != classify(y) {
        return false;
    }

    match tag {
        TypeTag::String => return x.as_str() == y.as_str(),
        TypeTag::Number => return x.as_f64() == y.as_f64(),
        TypeTag::Boolean => return x.as_bool() == y.as_bool(),
        TypeTag::Array => {
            let (xs, ys) = (x.to_js_string(), y.to_js_string());
            let marker = object_marker();
            return !marker.is_match(&xs) && !marker.is_match(&ys) && xs == ys;
        }
        TypeTag::Date => {
            return match (x, y) {
                (Value::Date(a), Value::Date(b)) => a.timestamp == b.timestamp,
                _ => false,
            };
        }
        TypeTag::RegExp => {
            return match (x, y) {
                (Value::RegExp(a), Value::RegExp(b)) => {
                    a.source == b.source
                        && a.global == b.global
                        && a.ignore_case == b.ignore_case
                        && a.multiline == b.multiline
                }
                _ => false,
            };
        }
        _ => {}
    }

    if !x.is_object_typed() || !y.is_object_typed() {
        return false;
    }

    if is_plain_object(x) && is_plain_object(y) {
        let (Some(a), Some(b)) = (x.as_object(), y.as_object()) else {
            return false;
        };

        if sorted_keys(a.keys()) != sorted_keys(b.keys()) {
            return false;
        }

        // One level only: values compare by identity
        return a
            .iter()
            .all(|(key, value)| b.get(key).is_some_and(|other| value.identical(other)));
    }

    false
}

fn sorted_keys<'a>(keys: impl Iterator<Item = &'a String>) -> String {
    let mut keys: Vec<&str> = keys.map(String::as_str).collect();
    keys.sort_unstable();
    keys.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Primitive;

    fn empty_array() -> Value {
        Value::array(Vec::<Value>::new())
    }

    fn empty_object() -> Value {
        Value::object(Vec::<(String, Value)>::new())
    }

    #[test]
    fn test_empty_values_are_interchangeable() {
        let empties = [
            Value::Null,
            Value::Undefined,
            Value::from(""),
            empty_array(),
            empty_object(),
        ];
        for a in &empties {
            for b in &empties {
                assert!(is_equal(a, b), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn test_primitives_and_wrapped_primitives() {
        assert!(is_equal(&Value::from(1), &Value::from(1.0)));
        assert!(!is_equal(&Value::from(1), &Value::from(2)));
        assert!(!is_equal(&Value::from(1), &Value::from("1")));

        let boxed = Value::boxed(Primitive::String("a".into()));
        assert!(is_equal(&boxed, &Value::from("a")));
        assert!(is_equal(&Value::from("a"), &boxed));

        let boxed_true = Value::boxed(Primitive::Bool(true));
        assert!(is_equal(&boxed_true, &Value::from(true)));
        assert!(!is_equal(&boxed_true, &Value::from(false)));

        // Zero and false are not "empty"
        assert!(!is_equal(&Value::from(0), &Value::Null));
        assert!(!is_equal(&Value::from(false), &Value::Undefined));
    }

    #[test]
    fn test_nan_follows_strict_equality() {
        let nan = Value::from(f64::NAN);
        assert!(!is_equal(&nan, &nan));
    }

    #[test]
    fn test_arrays() {
        assert!(is_equal(&Value::array([1, 2]), &Value::array([1, 2])));
        assert!(!is_equal(&Value::array([1, 2]), &Value::array([2, 1])));
        assert!(is_equal(&Value::array(["1,2"]), &Value::array([1, 2])));

        let with_object = || Value::array([empty_object()]);
        assert!(!is_equal(&with_object(), &with_object()));

        let same = with_object();
        assert!(is_equal(&same, &same.clone()));
    }

    #[test]
    fn test_large_whole_numbers_stay_distinct() {
        assert!(!is_equal(&Value::array([1e19]), &Value::array([2e19])));
        assert!(!is_equal(&Value::array([9.3e18]), &Value::array([9.4e18])));
        assert!(is_equal(&Value::array([2e19]), &Value::array([2e19])));
        assert!(!is_equal(&Value::from(1e19), &Value::from(2e19)));
    }

    #[test]
    fn test_dates_and_regexps() {
        assert!(is_equal(&Value::date(10.0), &Value::date(10.0)));
        assert!(!is_equal(&Value::date(10.0), &Value::date(11.0)));

        let re = |g| Value::regexp("a+", g, false, false);
        assert!(is_equal(&re(true), &re(true)));
        assert!(!is_equal(&re(true), &re(false)));
        assert!(!is_equal(
            &Value::regexp("a+", false, false, false),
            &Value::regexp("b+", false, false, false)
        ));
    }

    #[test]
    fn test_plain_objects_are_shallow() {
        let shared = Value::object([("x", 1)]);

        let a = Value::object([("a", Value::from(1)), ("b", shared.clone())]);
        let b = Value::object([("b", shared.clone()), ("a", Value::from(1))]);
        assert!(is_equal(&a, &b));
        assert!(is_equal(&b, &a));

        let c = Value::object([("a", Value::from(1)), ("b", Value::object([("x", 1)]))]);
        assert!(!is_equal(&a, &c));

        let d = Value::object([("a", 1)]);
        assert!(!is_equal(&a, &d));
    }

    #[test]
    fn test_functions_and_handles() {
        let f = Value::function(|_, _| {});
        assert!(is_equal(&f, &f.clone()));
        assert!(!is_equal(&f, &Value::function(|_, _| {})));

        let h = Value::handle(1u8);
        assert!(is_equal(&h, &h.clone()));
        assert!(!is_equal(&h, &Value::handle(1u8)));
        assert!(!is_equal(&h, &Value::object([("a", 1)])));
    }

    #[test]
    fn test_symmetry_across_categories() {
        let samples = [
            Value::Null,
            Value::from(1),
            Value::from("1"),
            Value::from(true),
            Value::array([1]),
            Value::object([("a", 1)]),
            Value::date(1.0),
            Value::regexp("a", false, false, false),
            Value::error("e"),
            Value::boxed(Primitive::Number(1.0)),
        ];
        for a in &samples {
            assert!(is_equal(a, &a.clone()), "{a:?}");
            for b in &samples {
                assert_eq!(is_equal(a, b), is_equal(b, a), "{a:?} vs {b:?}");
            }
        }
    }
}
