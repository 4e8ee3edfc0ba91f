//! Runtime values crossing context boundaries
//!
//! The closed sum type over every kind the duplication engine understands.
//! Kinds outside the supported set never cross a boundary as themselves:
//! non-closure objects collapse to their truthiness and untranslatable
//! handles collapse to null.

use std::fmt;
use std::sync::Arc;

use crate::closure::Closure;
use crate::container::Container;
use crate::handle::Handle;
use crate::text::Text;

/// An opaque host object that is not a closure.
///
/// Object identity cannot safely cross a context boundary, so only the
/// truthiness of such a value survives duplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    class: String,
}

impl Object {
    pub fn new(class: impl Into<String>) -> Self {
        Object {
            class: class.into(),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }
}

/// Runtime value
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Text),
    Array(Container),
    Closure(Arc<Closure>),
    /// Non-closure host object; degrades to a boolean on duplication
    Object(Object),
    /// External handle; degrades to an integer descriptor or null
    Handle(Handle),
}

impl Value {
    /// Check if value is truthy
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(t) => !t.is_empty(),
            Value::Array(c) => !c.is_empty(),
            Value::Closure(_) => true,
            Value::Object(_) => true,
            Value::Handle(_) => true,
        }
    }

    /// Get kind name for messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "text",
            Value::Array(_) => "array",
            Value::Closure(_) => "closure",
            Value::Object(_) => "object",
            Value::Handle(_) => "handle",
        }
    }

    /// Whether the payload is shared under reference counting.
    ///
    /// Scalars copy inline; everything else carries a counted payload the
    /// duplication fast path must still recurse into.
    pub fn is_refcounted(&self) -> bool {
        matches!(
            self,
            Value::Str(_)
                | Value::Array(_)
                | Value::Closure(_)
                | Value::Object(_)
                | Value::Handle(_)
        )
    }

    /// Drop one logical reference from any counted payload.
    ///
    /// Container teardown recurses through here so every duplication path
    /// has a matching release path.
    pub(crate) fn release(&self) {
        if let Value::Array(container) = self {
            container.release_owned();
        }
        // text and closures are released by handle drop
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(t) => Some(t.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Container> {
        match self {
            Value::Array(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_closure(&self) -> Option<&Arc<Closure>> {
        match self {
            Value::Closure(c) => Some(c),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Text::new(s))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
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
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Closure(a), Value::Closure(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Handle(a), Value::Handle(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(t) => write!(f, "{:?}", t.as_str()),
            Value::Array(c) => write!(f, "{c}"),
            Value::Closure(c) => write!(f, "closure({})", c.unit().name()),
            Value::Object(o) => write!(f, "object({})", o.class()),
            Value::Handle(h) => write!(f, "{h}"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}
