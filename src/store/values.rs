//! Dynamically typed scalars and the composite key/value tuples built from
//! them.

use std::cmp::Ordering;
use std::fmt;

/// A dynamically typed scalar stored in a cell.
///
/// Integers compare numerically across the signed/unsigned variants, so a
/// value written as `Int(7)` and read back as `UInt(7)` still lands on the
/// same spot in the tree. Text compares lexicographically. Comparing an
/// integer against text is a program error, the same way it is in the tree
/// this format descends from: keys in one tree position always share a type.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Text(String),
}

/// An ordered sequence of values. Tuples are ordered by [`compare`], never
/// by the container's own ordering: keys in a tree share an arity, and the
/// comparator holds them to it.
pub type Tuple = Vec<Value>;

/// Lexicographic element-wise tuple comparison.
///
/// Tuples of unequal length are not comparable and comparing them is a
/// program error, with one carve-out: a strict prefix (every common element
/// equal) orders before the longer tuple. That carve-out is what lets an
/// empty tuple position an iterator before the first key of a table.
pub fn compare(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = x.cmp(y);
        if ord != Ordering::Equal {
            if a.len() != b.len() {
                panic!(
                    "tuples of unequal length are not comparable: {} vs {} elements",
                    a.len(),
                    b.len()
                );
            }
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::UInt(_) => "unsigned integer",
            Value::Text(_) => "text",
        }
    }
}

fn cmp_int_uint(a: i64, b: u64) -> Ordering {
    if a < 0 {
        Ordering::Less
    } else {
        (a as u64).cmp(&b)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Text(_), Value::Text(_))
            | (Value::Int(_), Value::Int(_))
            | (Value::UInt(_), Value::UInt(_))
            | (Value::Int(_), Value::UInt(_))
            | (Value::UInt(_), Value::Int(_)) => self.cmp(other) == Ordering::Equal,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Value) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::UInt(a), Value::UInt(b)) => a.cmp(b),
            (Value::Int(a), Value::UInt(b)) => cmp_int_uint(*a, *b),
            (Value::UInt(a), Value::Int(b)) => cmp_int_uint(*b, *a).reverse(),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (a, b) => panic!(
                "values are not comparable: {} vs {}",
                a.type_name(),
                b.type_name()
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
        }
    }
}
