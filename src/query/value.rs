//! Runtime values flowing through the executor and into result rows.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::model::PropertyValue;
use crate::types::{EdgeId, NodeId};

/// Scalar or entity value produced by query evaluation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Value {
    /// Absent or untyped value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// String value.
    String(String),
    /// Reference to a stored node.
    Node(NodeId),
    /// Reference to a stored edge.
    Edge(EdgeId),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&PropertyValue> for Value {
    fn from(value: &PropertyValue) -> Self {
        match value {
            PropertyValue::Bool(v) => Value::Bool(*v),
            PropertyValue::Int(v) => Value::Int(*v),
            PropertyValue::Float(v) => Value::Float(*v),
            PropertyValue::String(v) => Value::String(v.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::Node(id) => write!(f, "{id}"),
            Value::Edge(id) => write!(f, "{id}"),
        }
    }
}

/// Totally ordered, hashable wrapper over [`Value`].
///
/// Used as a grouping key and as the sort key for ORDER BY. Values of
/// different kinds order by kind rank; floats use their total order so NaN
/// neither panics nor breaks map invariants.
#[derive(Clone, Debug)]
pub struct ValueKey(Value);

impl ValueKey {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    fn rank(&self) -> u8 {
        match &self.0 {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::String(_) => 4,
            Value::Node(_) => 5,
            Value::Edge(_) => 6,
        }
    }
}

impl From<Value> for ValueKey {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl Ord for ValueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.0, &other.0) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Node(a), Value::Node(b)) => a.cmp(b),
            (Value::Edge(a), Value::Edge(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for ValueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ValueKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ValueKey {}

impl Hash for ValueKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.rank());
        match &self.0 {
            Value::Null => {}
            Value::Bool(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::String(v) => v.hash(state),
            Value::Node(id) => id.hash(state),
            Value::Edge(id) => id.hash(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_order_within_kind() {
        let mut keys = vec![
            ValueKey::new(Value::Int(3)),
            ValueKey::new(Value::Int(1)),
            ValueKey::new(Value::Int(2)),
        ];
        keys.sort();
        let sorted: Vec<_> = keys.into_iter().map(ValueKey::into_value).collect();
        assert_eq!(sorted, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn keys_order_across_kinds_by_rank() {
        let null = ValueKey::new(Value::Null);
        let int = ValueKey::new(Value::Int(0));
        let string = ValueKey::new(Value::String("a".into()));
        assert!(null < int);
        assert!(int < string);
    }

    #[test]
    fn float_keys_tolerate_nan() {
        let nan = ValueKey::new(Value::Float(f64::NAN));
        let one = ValueKey::new(Value::Float(1.0));
        assert_eq!(nan.cmp(&nan), Ordering::Equal);
        assert!(one < nan);
    }
}
