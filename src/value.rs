//! Scalar Wire Value
//!
//! `Value` is the single scalar that crosses the command boundary: every
//! command argument is built from one, and every scalar reply is turned into
//! one before the codec decodes it into a domain type.

use bytes::Bytes;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value (null bulk reply, missing field, popped-from-empty).
    Nil,
    Int(i64),
    Float(f64),
    Data(Bytes),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Nil and the empty byte string both count as "no value" for decoding.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Nil => true,
            Value::Data(b) => b.is_empty(),
            _ => false,
        }
    }

    /// Wire representation used as a command argument.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Value::Nil => Bytes::new(),
            Value::Int(n) => Bytes::from(n.to_string()),
            Value::Float(f) => Bytes::from(format_float(*f)),
            Value::Data(b) => b.clone(),
        }
    }

    /// Text view of the value, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<std::borrow::Cow<'_, str>> {
        match self {
            Value::Nil => None,
            Value::Int(n) => Some(n.to_string().into()),
            Value::Float(f) => Some(format_float(*f).into()),
            Value::Data(b) => std::str::from_utf8(b).ok().map(Into::into),
        }
    }
}

/// Formats a float the way the store parses it back (`inf`, `-inf`,
/// shortest round-trip digits otherwise).
pub fn format_float(f: f64) -> String {
    if f.is_infinite() {
        if f > 0.0 { "+inf".to_string() } else { "-inf".to_string() }
    } else {
        format!("{}", f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "(nil)"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Data(b) => write!(f, "{}", String::from_utf8_lossy(b)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Data(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Data(Bytes::from(s))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Data(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Data(Bytes::from(b))
    }
}
