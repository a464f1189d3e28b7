//! Value definitions
//!
//! The closed set of types the wire protocol can carry.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use bytes::Bytes;

/// A protocol value
///
/// The variant of a decoded value is fully determined by its tag byte.
/// Maps compare as mappings: pair order is ignored and a repeated key counts
/// once, with its last value.
#[derive(Debug, Clone)]
pub enum Value {
    /// Simple string (`+`), a single line of text
    Simple(String),

    /// Error (`-`), a message distinguished from a normal reply
    Error(String),

    /// Integer (`:`)
    Integer(i64),

    /// Bulk string (`$`); `None` is the null marker (`$-1`)
    Bulk(Option<Bytes>),

    /// Array (`*`)
    Array(Vec<Value>),

    /// Map (`%`), key/value pairs in wire order
    Map(Vec<(Value, Value)>),
}

/// Pairs of a map with repeated keys collapsed
///
/// Each key keeps its first position and takes its last value.
pub(crate) fn unique_pairs(pairs: &[(Value, Value)]) -> Vec<(&Value, &Value)> {
    let mut index: HashMap<&Value, usize> = HashMap::with_capacity(pairs.len());
    let mut unique: Vec<(&Value, &Value)> = Vec::with_capacity(pairs.len());

    for (key, value) in pairs {
        match index.get(key) {
            Some(&slot) => unique[slot].1 = value,
            None => {
                index.insert(key, unique.len());
                unique.push((key, value));
            }
        }
    }

    unique
}

fn maps_equal(a: &[(Value, Value)], b: &[(Value, Value)]) -> bool {
    let a = unique_pairs(a);
    let b: HashMap<&Value, &Value> = unique_pairs(b).into_iter().collect();

    a.len() == b.len() && a.iter().all(|(key, value)| b.get(key) == Some(value))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Simple(a), Value::Simple(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Bulk(a), Value::Bulk(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => maps_equal(a, b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Simple(s) | Value::Error(s) => s.hash(state),
            Value::Integer(n) => n.hash(state),
            Value::Bulk(b) => b.hash(state),
            Value::Array(items) => items.hash(state),
            Value::Map(pairs) => {
                // Order-independent: sum the hashes of the entries
                let unique = unique_pairs(pairs);
                let mut sum = 0u64;
                for (key, value) in &unique {
                    let mut entry = DefaultHasher::new();
                    key.hash(&mut entry);
                    value.hash(&mut entry);
                    sum = sum.wrapping_add(entry.finish());
                }
                unique.len().hash(state);
                sum.hash(state);
            }
        }
    }
}

impl Value {
    /// Create a simple string
    pub fn simple(s: impl Into<String>) -> Self {
        Value::Simple(s.into())
    }

    /// Create an error value
    pub fn error(message: impl Into<String>) -> Self {
        Value::Error(message.into())
    }

    /// Create a bulk string
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Value::Bulk(Some(data.into()))
    }

    /// Create a map with unique keys
    ///
    /// A repeated key keeps its first position and takes its last value.
    pub fn map(pairs: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let mut index: HashMap<Value, usize> = HashMap::new();
        let mut unique: Vec<(Value, Value)> = Vec::new();

        for (key, value) in pairs {
            match index.get(&key) {
                Some(&slot) => unique[slot].1 = value,
                None => {
                    index.insert(key.clone(), unique.len());
                    unique.push((key, value));
                }
            }
        }

        Value::Map(unique)
    }

    /// The null bulk string
    pub fn null() -> Self {
        Value::Bulk(None)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Bulk(None))
    }

    /// Raw bytes of a non-null string variant
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Simple(s) => Some(s.as_bytes()),
            Value::Bulk(Some(b)) => Some(b),
            _ => None,
        }
    }

    /// UTF-8 text of a non-null string variant
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Short name of the variant, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Simple(_) => "simple string",
            Value::Error(_) => "error",
            Value::Integer(_) => "integer",
            Value::Bulk(Some(_)) => "bulk string",
            Value::Bulk(None) => "null",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Bulk(Some(Bytes::copy_from_slice(s.as_bytes())))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Bulk(Some(Bytes::from(s)))
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bulk(Some(Bytes::from(b)))
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Bulk(Some(b))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Simple(s) => write!(f, "{}", s),
            Value::Error(message) => write!(f, "(error) {}", message),
            Value::Integer(n) => write!(f, "(integer) {}", n),
            Value::Bulk(Some(b)) => write!(f, "\"{}\"", String::from_utf8_lossy(b)),
            Value::Bulk(None) => write!(f, "(nil)"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(pairs) => {
                write!(f, "{{")?;
                for (i, (key, value)) in unique_pairs(pairs).into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}
