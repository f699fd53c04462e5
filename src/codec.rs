//! Value Codec
//!
//! Bidirectional conversion between domain values and the scalar [`Value`].
//!
//! The scalar kinds (booleans, chars, integers, floats, strings, raw bytes,
//! timestamps and `Value` itself) each have a direct rule. Structured types
//! go through serde_json, either by wrapping them in [`Json`] or by
//! registering them once with [`json_codec!`](crate::json_codec). A type with
//! no rule does not implement [`Codec`], so the mistake is caught at compile
//! time rather than on the first command.
//!
//! Decoding an absent (nil or empty) value yields the type's zero value.

use crate::error::{Error, Result};
use crate::value::Value;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::borrow::Cow;

pub trait Codec: Sized {
    fn encode(&self) -> Result<Value>;
    fn decode(value: Value) -> Result<Self>;
}

/// Decodes every element of a reply list.
pub fn decode_all<T: Codec>(values: Vec<Value>) -> Result<Vec<T>> {
    values.into_iter().map(T::decode).collect()
}

/// Encodes every element of a slice.
pub fn encode_all<T: Codec>(values: &[T]) -> Result<Vec<Value>> {
    values.iter().map(Codec::encode).collect()
}

fn text(value: &Value) -> Result<Cow<'_, str>> {
    value
        .as_str()
        .ok_or_else(|| Error::serialization(format!("value is not valid UTF-8: {:?}", value)))
}

// ============================================================================
// Scalars
// ============================================================================

impl Codec for Value {
    fn encode(&self) -> Result<Value> {
        Ok(self.clone())
    }

    fn decode(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl Codec for bool {
    fn encode(&self) -> Result<Value> {
        Ok(Value::Int(if *self { 1 } else { 0 }))
    }

    fn decode(value: Value) -> Result<Self> {
        if value.is_empty() {
            return Ok(false);
        }
        match value {
            Value::Int(n) => Ok(n != 0),
            other => {
                let s = text(&other)?;
                match s.trim() {
                    "1" => Ok(true),
                    "0" => Ok(false),
                    t if t.eq_ignore_ascii_case("true") => Ok(true),
                    t if t.eq_ignore_ascii_case("false") => Ok(false),
                    t => Err(Error::serialization(format!("'{}' is not a boolean", t))),
                }
            }
        }
    }
}

impl Codec for char {
    fn encode(&self) -> Result<Value> {
        Ok(Value::from(self.to_string()))
    }

    fn decode(value: Value) -> Result<Self> {
        if value.is_empty() {
            return Ok('\0');
        }
        let s = text(&value)?;
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(Error::serialization(format!("'{}' is not a single character", s))),
        }
    }
}

macro_rules! integer_codec {
    ($($t:ty),+) => {
        $(
            impl Codec for $t {
                fn encode(&self) -> Result<Value> {
                    match i64::try_from(*self) {
                        Ok(n) => Ok(Value::Int(n)),
                        Err(_) => Ok(Value::from(self.to_string())),
                    }
                }

                fn decode(value: Value) -> Result<Self> {
                    if value.is_empty() {
                        return Ok(0);
                    }
                    match value {
                        Value::Int(n) => <$t>::try_from(n).map_err(|_| {
                            Error::serialization(format!("{} out of range for {}", n, stringify!($t)))
                        }),
                        other => {
                            let s = text(&other)?;
                            s.trim().parse::<$t>().map_err(|e| {
                                Error::serialization(format!("'{}' as {}: {}", s, stringify!($t), e))
                            })
                        }
                    }
                }
            }
        )+
    };
}

integer_codec!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! float_codec {
    ($($t:ty),+) => {
        $(
            impl Codec for $t {
                fn encode(&self) -> Result<Value> {
                    if self.is_nan() {
                        return Err(Error::serialization("NaN cannot be stored"));
                    }
                    Ok(Value::Float(*self as f64))
                }

                fn decode(value: Value) -> Result<Self> {
                    if value.is_empty() {
                        return Ok(0.0);
                    }
                    match value {
                        Value::Int(n) => Ok(n as $t),
                        Value::Float(f) => Ok(f as $t),
                        other => {
                            let s = text(&other)?;
                            s.trim().parse::<$t>().map_err(|e| {
                                Error::serialization(format!("'{}' as {}: {}", s, stringify!($t), e))
                            })
                        }
                    }
                }
            }
        )+
    };
}

float_codec!(f32, f64);

impl Codec for String {
    fn encode(&self) -> Result<Value> {
        Ok(Value::from(self.as_str()))
    }

    fn decode(value: Value) -> Result<Self> {
        match value {
            Value::Nil => Ok(String::new()),
            Value::Data(b) => String::from_utf8(b.to_vec())
                .map_err(|e| Error::serialization(format!("invalid UTF-8: {}", e))),
            other => Ok(text(&other)?.into_owned()),
        }
    }
}

impl Codec for Vec<u8> {
    fn encode(&self) -> Result<Value> {
        Ok(Value::Data(Bytes::copy_from_slice(self)))
    }

    fn decode(value: Value) -> Result<Self> {
        Ok(value.to_bytes().to_vec())
    }
}

impl Codec for Bytes {
    fn encode(&self) -> Result<Value> {
        Ok(Value::Data(self.clone()))
    }

    fn decode(value: Value) -> Result<Self> {
        Ok(value.to_bytes())
    }
}

// ============================================================================
// Time
// ============================================================================

/// 100-nanosecond ticks per second.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Converts a timestamp to ticks since the Unix epoch. Integer ticks keep
/// full precision and sort the same way the timestamps do.
pub fn to_ticks(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp() * TICKS_PER_SECOND + i64::from(dt.timestamp_subsec_nanos()) / 100
}

pub fn from_ticks(ticks: i64) -> Result<DateTime<Utc>> {
    let secs = ticks.div_euclid(TICKS_PER_SECOND);
    let nanos = (ticks.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    Utc.timestamp_opt(secs, nanos)
        .single()
        .ok_or_else(|| Error::serialization(format!("{} ticks is out of range", ticks)))
}

impl Codec for DateTime<Utc> {
    fn encode(&self) -> Result<Value> {
        Ok(Value::Int(to_ticks(self)))
    }

    fn decode(value: Value) -> Result<Self> {
        from_ticks(i64::decode(value)?)
    }
}

impl Codec for std::time::Duration {
    fn encode(&self) -> Result<Value> {
        let ticks = i64::try_from(self.as_nanos() / 100)
            .map_err(|_| Error::serialization("duration too large"))?;
        Ok(Value::Int(ticks))
    }

    fn decode(value: Value) -> Result<Self> {
        let ticks = u64::decode(value)?;
        Ok(std::time::Duration::from_nanos(ticks.saturating_mul(100)))
    }
}

// ============================================================================
// Optional and structured values
// ============================================================================

/// `None` is stored as the empty value; an absent or empty value decodes to
/// `None`.
impl<T: Codec> Codec for Option<T> {
    fn encode(&self) -> Result<Value> {
        match self {
            Some(v) => v.encode(),
            None => Ok(Value::Nil),
        }
    }

    fn decode(value: Value) -> Result<Self> {
        if value.is_empty() {
            Ok(None)
        } else {
            T::decode(value).map(Some)
        }
    }
}

/// Whole-value JSON encoding for structured types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> std::ops::Deref for Json<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

pub fn encode_json<T: Serialize>(value: &T) -> Result<Value> {
    Ok(Value::Data(Bytes::from(serde_json::to_vec(value)?)))
}

pub fn decode_json<T: DeserializeOwned + Default>(value: Value) -> Result<T> {
    if value.is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_slice(&value.to_bytes())?)
}

impl<T> Codec for Json<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    fn encode(&self) -> Result<Value> {
        encode_json(&self.0)
    }

    fn decode(value: Value) -> Result<Self> {
        decode_json(value).map(Json)
    }
}

/// Registers serde types as JSON-encoded values so they can be used
/// directly as element types (`Item<User>`, `List<Post>`).
///
/// ```rust,ignore
/// #[derive(Serialize, Deserialize, Default)]
/// struct Post { id: u64, message: String }
/// redis_objects::json_codec!(Post);
/// ```
#[macro_export]
macro_rules! json_codec {
    ($($t:ty),+ $(,)?) => {
        $(
            impl $crate::Codec for $t {
                fn encode(&self) -> $crate::Result<$crate::Value> {
                    $crate::codec::encode_json(self)
                }

                fn decode(value: $crate::Value) -> $crate::Result<Self> {
                    $crate::codec::decode_json(value)
                }
            }
        )+
    };
}
