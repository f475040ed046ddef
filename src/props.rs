//! Prop values and the name→value list carried by vnodes.
//!
//! Props are a simple ordered key/value list, not a map: typical elements
//! carry a handful of props and render functions emit them in a stable
//! order, so linear scans beat hashing and keep attribute serialization
//! deterministic.
//!
//! Event handlers are ordinary prop values. Two handlers compare equal only
//! when they are the *same* allocation (`Rc` identity) — handler props are
//! replaced by reference during diffing, never merged or inspected.

use std::fmt;
use std::rc::Rc;

use compact_str::{CompactString, ToCompactString};

// =============================================================================
// EventHandler
// =============================================================================

/// A reference-compared callback stored in a prop or on a live element.
///
/// The payload is a single [`Value`]; hosts that need richer events wrap
/// them in a `Value::Str` or dispatch several times.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Value)>);

impl EventHandler {
    /// Wrap a callback.
    pub fn new(f: impl Fn(&Value) + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke the callback.
    pub fn call(&self, payload: &Value) {
        (self.0)(payload);
    }

    /// Identity comparison. This is the only equality handlers have.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", Rc::as_ptr(&self.0))
    }
}

// =============================================================================
// Value
// =============================================================================

/// A prop value: the closed union of everything a render function may put
/// into a vnode's prop list.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent/cleared value; serializes as a removed attribute.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(CompactString),
    /// Event handler; attaches to the element's handler table, never to an
    /// attribute.
    Handler(EventHandler),
}

impl Value {
    /// Borrow the string content, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Check if this value is an event handler.
    #[inline]
    pub fn is_handler(&self) -> bool {
        matches!(self, Value::Handler(_))
    }

    /// Attribute text for this value, or `None` when the attribute should be
    /// absent (`Null`, `Bool(false)`, handlers).
    pub fn to_attr(&self) -> Option<CompactString> {
        match self {
            Value::Null | Value::Bool(false) | Value::Handler(_) => None,
            Value::Bool(true) => Some(CompactString::const_new("")),
            Value::Int(n) => Some(n.to_compact_string()),
            Value::Float(n) => Some(n.to_compact_string()),
            Value::Str(s) => Some(s.clone()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Handler(a), Value::Handler(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v.into())
    }
}

impl From<CompactString> for Value {
    fn from(v: CompactString) -> Self {
        Value::Str(v)
    }
}

impl From<EventHandler> for Value {
    fn from(v: EventHandler) -> Self {
        Value::Handler(v)
    }
}

// =============================================================================
// Props
// =============================================================================

/// Prop list as ordered key-value pairs.
pub type Props = Vec<(CompactString, Value)>;

/// Extension trait for prop operations on [`Props`].
pub trait PropsExt {
    /// Get a prop value by name.
    fn get_prop(&self, name: &str) -> Option<&Value>;

    /// Check if a prop exists.
    fn has_prop(&self, name: &str) -> bool;

    /// Set a prop value (insert or update), returning the old value if present.
    fn set_prop(&mut self, name: impl Into<CompactString>, value: impl Into<Value>)
    -> Option<Value>;

    /// Remove a prop by name, returning the old value if present.
    fn remove_prop(&mut self, name: &str) -> Option<Value>;
}

impl PropsExt for Props {
    fn get_prop(&self, name: &str) -> Option<&Value> {
        self.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    fn has_prop(&self, name: &str) -> bool {
        self.iter().any(|(k, _)| k == name)
    }

    fn set_prop(
        &mut self,
        name: impl Into<CompactString>,
        value: impl Into<Value>,
    ) -> Option<Value> {
        let name = name.into();
        let value = value.into();
        if let Some(pair) = self.iter_mut().find(|(k, _)| *k == name) {
            Some(std::mem::replace(&mut pair.1, value))
        } else {
            self.push((name, value));
            None
        }
    }

    fn remove_prop(&mut self, name: &str) -> Option<Value> {
        self.iter()
            .position(|(k, _)| k == name)
            .map(|pos| self.remove(pos).1)
    }
}

/// Order-insensitive prop equality, used to skip no-op component updates.
pub(crate) fn props_equal(a: &Props, b: &Props) -> bool {
    a.len() == b.len() && b.iter().all(|(k, v)| a.get_prop(k) == Some(v))
}

// =============================================================================
// Tests
// =============================================================================
