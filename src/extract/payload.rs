//! Payload views for the object walker
//!
//! `PayloadNode` is the minimal surface the walker needs: a scalar view, a
//! container identity for cycle detection, and entry iteration. It is
//! implemented for `serde_json::Value` (request bodies, query objects) and for
//! `SharedPayload`, a reference-counted graph that can hold the cyclic
//! structures a structured-clone message may carry.

use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

// =============================================================================
// Scalar
// =============================================================================

/// 2^53 - 1, the largest integer every f64 between it and zero represents.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar<'a> {
    Null,
    Bool(bool),
    Number(f64),
    Text(Cow<'a, str>),
}

impl Scalar<'_> {
    /// Raw value as recorded on a hit. Integral numbers stay integers.
    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => Value::from(*n as i64),
            Scalar::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Scalar::Text(s) => Value::String(s.to_string()),
        }
    }
}

// =============================================================================
// PayloadNode
// =============================================================================

pub trait PayloadNode {
    /// `Some` for leaves, `None` for containers.
    fn scalar(&self) -> Option<Scalar<'_>>;

    /// Stable identity for containers; leaves return `None`.
    fn identity(&self) -> Option<usize>;

    /// Visit direct entries. Keyed structures pass `Some(key)`, sequences
    /// pass `None`.
    fn for_each_entry(&self, visit: &mut dyn FnMut(Option<&str>, &Self));

    /// The leaf as recorded on a hit.
    fn raw(&self) -> Value {
        self.scalar().map(|s| s.to_json()).unwrap_or(Value::Null)
    }
}

impl PayloadNode for Value {
    fn scalar(&self) -> Option<Scalar<'_>> {
        match self {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => Some(n.as_f64().map(Scalar::Number).unwrap_or(Scalar::Null)),
            Value::String(s) => Some(Scalar::Text(Cow::Borrowed(s.as_str()))),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    fn identity(&self) -> Option<usize> {
        match self {
            Value::Array(_) | Value::Object(_) => Some(self as *const Value as usize),
            _ => None,
        }
    }

    fn raw(&self) -> Value {
        self.clone()
    }

    fn for_each_entry(&self, visit: &mut dyn FnMut(Option<&str>, &Self)) {
        match self {
            Value::Array(items) => items.iter().for_each(|item| visit(None, item)),
            Value::Object(map) => map.iter().for_each(|(k, v)| visit(Some(k.as_str()), v)),
            _ => {}
        }
    }
}

// =============================================================================
// SharedPayload
// =============================================================================

pub type SharedList = Rc<RefCell<Vec<SharedPayload>>>;
pub type SharedMap = Rc<RefCell<Vec<(String, SharedPayload)>>>;

/// Reference-counted payload graph. Cloning shares containers, so a
/// container may (directly or indirectly) contain itself.
#[derive(Debug, Clone)]
pub enum SharedPayload {
    Null,
    Bool(bool),
    Number(f64),
    Text(Rc<str>),
    List(SharedList),
    Map(SharedMap),
}

impl SharedPayload {
    pub fn text(s: &str) -> Self {
        SharedPayload::Text(Rc::from(s))
    }

    pub fn new_list() -> Self {
        SharedPayload::List(Rc::new(RefCell::new(Vec::new())))
    }

    pub fn new_map() -> Self {
        SharedPayload::Map(Rc::new(RefCell::new(Vec::new())))
    }

    /// Append a keyed entry. No-op on anything but a map.
    pub fn insert(&self, key: &str, value: SharedPayload) {
        if let SharedPayload::Map(map) = self {
            map.borrow_mut().push((key.to_string(), value));
        }
    }

    /// Append an element. No-op on anything but a list.
    pub fn push(&self, value: SharedPayload) {
        if let SharedPayload::List(list) = self {
            list.borrow_mut().push(value);
        }
    }

    /// Depth-bounded copy into JSON. Cycles are cut at the bound.
    pub fn to_json(&self, max_depth: usize) -> Value {
        match self {
            SharedPayload::Null => Value::Null,
            SharedPayload::Bool(b) => Value::Bool(*b),
            SharedPayload::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            SharedPayload::Text(s) => Value::String(s.to_string()),
            _ if max_depth == 0 => Value::Null,
            SharedPayload::List(list) => Value::Array(
                list.borrow()
                    .iter()
                    .map(|v| v.to_json(max_depth - 1))
                    .collect(),
            ),
            SharedPayload::Map(map) => Value::Object(
                map.borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json(max_depth - 1)))
                    .collect(),
            ),
        }
    }
}

impl From<&Value> for SharedPayload {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => SharedPayload::Null,
            Value::Bool(b) => SharedPayload::Bool(*b),
            Value::Number(n) => n.as_f64().map(SharedPayload::Number).unwrap_or(SharedPayload::Null),
            Value::String(s) => SharedPayload::text(s),
            Value::Array(items) => {
                let list = SharedPayload::new_list();
                items.iter().for_each(|item| list.push(item.into()));
                list
            }
            Value::Object(map) => {
                let out = SharedPayload::new_map();
                map.iter().for_each(|(k, v)| out.insert(k, v.into()));
                out
            }
        }
    }
}

impl PayloadNode for SharedPayload {
    fn scalar(&self) -> Option<Scalar<'_>> {
        match self {
            SharedPayload::Null => Some(Scalar::Null),
            SharedPayload::Bool(b) => Some(Scalar::Bool(*b)),
            SharedPayload::Number(n) => Some(Scalar::Number(*n)),
            SharedPayload::Text(s) => Some(Scalar::Text(Cow::Borrowed(&**s))),
            SharedPayload::List(_) | SharedPayload::Map(_) => None,
        }
    }

    fn identity(&self) -> Option<usize> {
        match self {
            SharedPayload::List(list) => Some(Rc::as_ptr(list) as *const () as usize),
            SharedPayload::Map(map) => Some(Rc::as_ptr(map) as *const () as usize),
            _ => None,
        }
    }

    fn for_each_entry(&self, visit: &mut dyn FnMut(Option<&str>, &Self)) {
        match self {
            SharedPayload::List(list) => {
                // Clone the handles out so the borrow does not outlive the loop
                let items: Vec<SharedPayload> = list.borrow().clone();
                items.iter().for_each(|item| visit(None, item));
            }
            SharedPayload::Map(map) => {
                let entries: Vec<(String, SharedPayload)> = map.borrow().clone();
                entries.iter().for_each(|(k, v)| visit(Some(k.as_str()), v));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_identity_only_for_containers() {
        let v = json!({"a": [1, 2], "b": "x"});
        assert!(v.identity().is_some());
        assert!(v["a"].identity().is_some());
        assert!(v["b"].identity().is_none());
        assert_ne!(v.identity(), v["a"].identity());
    }

    #[test]
    fn test_shared_clone_keeps_identity() {
        let map = SharedPayload::new_map();
        let alias = map.clone();
        assert_eq!(map.identity(), alias.identity());
        assert_ne!(map.identity(), SharedPayload::new_map().identity());
    }

    #[test]
    fn test_scalar_raw_keeps_integers() {
        assert_eq!(Scalar::Number(1_700_000_000.0).to_json(), json!(1_700_000_000));
        assert_eq!(Scalar::Number(1.5).to_json(), json!(1.5));
        assert_eq!(Scalar::Number(f64::NAN).to_json(), Value::Null);
        assert_eq!(SharedPayload::Number(1_700_000_000.0).raw(), json!(1_700_000_000));
        assert_eq!(json!(1.0).raw(), json!(1.0));
    }

    #[test]
    fn test_cyclic_to_json_terminates() {
        let map = SharedPayload::new_map();
        map.insert("self", map.clone());
        map.insert("n", SharedPayload::Number(1.0));
        let out = map.to_json(2);
        assert_eq!(out["n"], json!(1.0));
        assert_eq!(out["self"]["self"], Value::Null);
    }

    #[test]
    fn test_from_json_roundtrip_shape() {
        let v = json!({"dates": ["2024-01-01", 3]});
        let shared = SharedPayload::from(&v);
        let mut keys = Vec::new();
        shared.for_each_entry(&mut |k, _| keys.push(k.map(str::to_string)));
        assert_eq!(keys, vec![Some("dates".to_string())]);
    }
}
