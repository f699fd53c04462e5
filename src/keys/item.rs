//! Single-value key.

use super::{decode_many, decode_one, full_names, key_object, Element, KeyBase, RedisKey, SetOptions, When};
use crate::command::Command;
use crate::error::Error;
use crate::pending::Pending;
use crate::resp::RespValue;
use std::marker::PhantomData;

/// A key holding one encoded value.
pub struct Item<T> {
    base: KeyBase,
    _marker: PhantomData<fn() -> T>,
}

key_object!(Item<T>);

impl<T: Element> Item<T> {
    /// The stored value, or `T`'s zero value when the key is missing.
    pub fn get(&self) -> Pending<T> {
        self.base.run(|key| Ok(Command::new("GET").arg(key)), decode_one)
    }

    pub fn set(&self, value: &T) -> Pending<bool> {
        self.set_with(value, SetOptions::default())
    }

    /// `SET` with an optional expiry and write condition. Resolves to false
    /// when the condition prevented the write.
    pub fn set_with(&self, value: &T, options: SetOptions) -> Pending<bool> {
        self.base.run(
            |key| {
                let mut cmd = Command::new("SET").arg(key).arg_value(&value.encode()?);
                if let Some(ttl) = options.expiry {
                    let ms = i64::try_from(ttl.as_millis())
                        .map_err(|_| Error::invalid_argument("expiry too large"))?;
                    cmd = cmd.arg("PX").arg_int(ms);
                }
                match options.when {
                    When::Always => {}
                    When::Exists => cmd = cmd.arg("XX"),
                    When::NotExists => cmd = cmd.arg("NX"),
                }
                Ok(cmd)
            },
            RespValue::into_bool,
        )
    }

    /// Appends to the stored bytes; resolves to the new length.
    pub fn append(&self, value: &T) -> Pending<i64> {
        self.base.run(
            |key| Ok(Command::new("APPEND").arg(key).arg_value(&value.encode()?)),
            RespValue::into_int,
        )
    }

    /// Byte length of the stored value.
    pub fn len(&self) -> Pending<i64> {
        self.base.run(|key| Ok(Command::new("STRLEN").arg(key)), RespValue::into_int)
    }

    /// Bytes `[start, end]`, negative offsets counting from the end.
    pub fn get_range(&self, start: i64, end: i64) -> Pending<T> {
        self.base.run(
            |key| Ok(Command::new("GETRANGE").arg(key).arg_int(start).arg_int(end)),
            decode_one,
        )
    }

    /// Overwrites bytes from `offset`, zero-padding as needed; resolves to
    /// the new length.
    pub fn set_range(&self, offset: i64, value: &T) -> Pending<i64> {
        self.base.run(
            |key| {
                if offset < 0 {
                    return Err(Error::invalid_argument("offset must not be negative"));
                }
                Ok(Command::new("SETRANGE").arg(key).arg_int(offset).arg_value(&value.encode()?))
            },
            RespValue::into_int,
        )
    }

    pub fn increment(&self, by: i64) -> Pending<i64> {
        self.base.run(
            |key| Ok(Command::new("INCRBY").arg(key).arg_int(by)),
            RespValue::into_int,
        )
    }

    pub fn increment_by_float(&self, by: f64) -> Pending<f64> {
        self.base.run(
            |key| Ok(Command::new("INCRBYFLOAT").arg(key).arg_float(by)),
            RespValue::into_float,
        )
    }

    pub fn decrement(&self, by: i64) -> Pending<i64> {
        self.base.run(
            |key| Ok(Command::new("DECRBY").arg(key).arg_int(by)),
            RespValue::into_int,
        )
    }

    pub fn decrement_by_float(&self, by: f64) -> Pending<f64> {
        self.increment_by_float(-by)
    }

    /// Stores `value` and resolves to the previous one.
    pub fn get_set(&self, value: &T) -> Pending<T> {
        self.base.run(
            |key| Ok(Command::new("GETSET").arg(key).arg_value(&value.encode()?)),
            decode_one,
        )
    }

    /// Reads several items in one `MGET`, sent through the first item's
    /// target. Missing keys decode to the zero value.
    pub fn get_multiple(items: &[&Item<T>]) -> Pending<Vec<T>> {
        let first = match items.first() {
            Some(first) => first,
            None => return Pending::failed(Error::invalid_argument("no items given")),
        };
        first.base.run(
            |_| Ok(Command::new("MGET").args_from(full_names(items.iter().copied())?)),
            decode_many,
        )
    }

    /// Writes several items in one `MSET` (or `MSETNX` with
    /// [`When::NotExists`], which writes all or nothing).
    pub fn set_multiple(pairs: &[(&Item<T>, T)], when: When) -> Pending<bool> {
        let first = match pairs.first() {
            Some((first, _)) => *first,
            None => return Pending::failed(Error::invalid_argument("no items given")),
        };
        first.base.run(
            |_| {
                let mut cmd = match when {
                    When::Always => Command::new("MSET"),
                    When::NotExists => Command::new("MSETNX"),
                    When::Exists => {
                        return Err(Error::invalid_argument("MSET does not support When::Exists"))
                    }
                };
                for (item, value) in pairs {
                    cmd = cmd.arg(item.full_name()?).arg_value(&value.encode()?);
                }
                Ok(cmd)
            },
            RespValue::into_bool,
        )
    }
}
