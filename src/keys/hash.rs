//! Field/value map key, and its record-mapped variant.

use super::scan::{cursor_stream, failed_stream};
use super::{decode_many, decode_one, decode_unit, key_object, Element, KeyBase, RedisKey, When};
use crate::codec::{encode_all, Codec};
use crate::command::Command;
use crate::dto::HashDto;
use crate::error::{Error, Result};
use crate::pending::Pending;
use crate::resp::RespValue;
use crate::value::Value;
use futures::stream::BoxStream;
use std::marker::PhantomData;
use std::ops::Deref;

/// A hash whose fields decode as `K` and values as `V`.
pub struct Hash<K, V> {
    base: KeyBase,
    _marker: PhantomData<fn() -> (K, V)>,
}

key_object!(Hash<K, V>);

fn not_empty<T>(items: &[T], what: &str) -> Result<()> {
    if items.is_empty() {
        Err(Error::invalid_argument(format!("no {} given", what)))
    } else {
        Ok(())
    }
}

/// Pairs a flat `[field, value, field, value, ...]` reply.
fn decode_pairs<K: Codec, V: Codec>(reply: RespValue) -> Result<Vec<(K, V)>> {
    let values = reply.into_values()?;
    if values.len() % 2 != 0 {
        return Err(Error::protocol("hash reply has an odd number of items"));
    }
    let mut out = Vec::with_capacity(values.len() / 2);
    let mut iter = values.into_iter();
    while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
        out.push((K::decode(field)?, V::decode(value)?));
    }
    Ok(out)
}

impl<K: Element, V: Element> Hash<K, V> {
    pub fn keys(&self) -> Pending<Vec<K>> {
        self.base.run(|key| Ok(Command::new("HKEYS").arg(key)), decode_many)
    }

    pub fn values(&self) -> Pending<Vec<V>> {
        self.base.run(|key| Ok(Command::new("HVALS").arg(key)), decode_many)
    }

    pub fn len(&self) -> Pending<i64> {
        self.base.run(|key| Ok(Command::new("HLEN").arg(key)), RespValue::into_int)
    }

    pub fn remove(&self, field: &K) -> Pending<bool> {
        self.base.run(
            |key| Ok(Command::new("HDEL").arg(key).arg_value(&field.encode()?)),
            RespValue::into_bool,
        )
    }

    /// Resolves to the number of fields that existed.
    pub fn remove_many(&self, fields: &[K]) -> Pending<i64> {
        self.base.run(
            |key| {
                not_empty(fields, "fields")?;
                Ok(Command::new("HDEL").arg(key).values_from(&encode_all(fields)?))
            },
            RespValue::into_int,
        )
    }

    pub fn contains(&self, field: &K) -> Pending<bool> {
        self.base.run(
            |key| Ok(Command::new("HEXISTS").arg(key).arg_value(&field.encode()?)),
            RespValue::into_bool,
        )
    }

    /// The field's value, or `V`'s zero value when absent.
    pub fn get(&self, field: &K) -> Pending<V> {
        self.base.run(
            |key| Ok(Command::new("HGET").arg(key).arg_value(&field.encode()?)),
            decode_one,
        )
    }

    pub fn get_many(&self, fields: &[K]) -> Pending<Vec<V>> {
        self.base.run(
            |key| {
                not_empty(fields, "fields")?;
                Ok(Command::new("HMGET").arg(key).values_from(&encode_all(fields)?))
            },
            decode_many,
        )
    }

    pub fn increment(&self, field: &K, by: i64) -> Pending<i64> {
        self.base.run(
            |key| Ok(Command::new("HINCRBY").arg(key).arg_value(&field.encode()?).arg_int(by)),
            RespValue::into_int,
        )
    }

    pub fn increment_by_float(&self, field: &K, by: f64) -> Pending<f64> {
        self.base.run(
            |key| {
                Ok(Command::new("HINCRBYFLOAT")
                    .arg(key)
                    .arg_value(&field.encode()?)
                    .arg_float(by))
            },
            RespValue::into_float,
        )
    }

    pub fn decrement(&self, field: &K, by: i64) -> Pending<i64> {
        self.increment(field, -by)
    }

    pub fn decrement_by_float(&self, field: &K, by: f64) -> Pending<f64> {
        self.increment_by_float(field, -by)
    }

    /// Resolves to true when the field was created.
    pub fn set(&self, field: &K, value: &V) -> Pending<bool> {
        self.set_with(field, value, When::Always)
    }

    /// [`When::NotExists`] only creates a missing field. The store has no
    /// update-only form, so [`When::Exists`] is rejected.
    pub fn set_with(&self, field: &K, value: &V, when: When) -> Pending<bool> {
        self.base.run(
            |key| {
                let name = match when {
                    When::Always => "HSET",
                    When::NotExists => "HSETNX",
                    When::Exists => {
                        return Err(Error::invalid_argument("hash fields cannot be set with When::Exists"))
                    }
                };
                Ok(Command::new(name)
                    .arg(key)
                    .arg_value(&field.encode()?)
                    .arg_value(&value.encode()?))
            },
            RespValue::into_bool,
        )
    }

    pub fn set_many(&self, entries: &[(K, V)]) -> Pending<()> {
        self.base.run(
            |key| {
                not_empty(entries, "entries")?;
                let mut cmd = Command::new("HSET").arg(key);
                for (field, value) in entries {
                    cmd = cmd.arg_value(&field.encode()?).arg_value(&value.encode()?);
                }
                Ok(cmd)
            },
            decode_unit,
        )
    }

    /// Every field and value.
    pub fn to_vec(&self) -> Pending<Vec<(K, V)>> {
        self.base.run(|key| Ok(Command::new("HGETALL").arg(key)), decode_pairs)
    }

    /// Walks the hash with `HSCAN`. Fields changed during the walk may be
    /// seen twice or not at all.
    pub fn scan(&self) -> BoxStream<'static, Result<(K, V)>> {
        match self.base.direct() {
            Ok((key, executor)) => cursor_stream(executor, "HSCAN", key, 2, |mut pair| {
                let value = V::decode(pair.pop().unwrap_or(Value::Nil))?;
                let field = K::decode(pair.pop().unwrap_or(Value::Nil))?;
                Ok((field, value))
            }),
            Err(e) => failed_stream(e),
        }
    }
}

// ============================================================================
// Record-mapped hash
// ============================================================================

/// A hash holding one record, one field per record member. All
/// [`Hash`] operations are available through `Deref`.
pub struct DtoHash<D> {
    hash: Hash<String, Value>,
    _marker: PhantomData<fn() -> D>,
}

impl<D> Clone for DtoHash<D> {
    fn clone(&self) -> Self {
        DtoHash {
            hash: self.hash.clone(),
            _marker: PhantomData,
        }
    }
}

impl<D> std::fmt::Debug for DtoHash<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DtoHash").field("base", &self.hash.base).finish()
    }
}

impl<D: HashDto> RedisKey for DtoHash<D> {
    fn from_base(base: KeyBase) -> Self {
        DtoHash {
            hash: Hash::from_base(base),
            _marker: PhantomData,
        }
    }

    fn base(&self) -> &KeyBase {
        &self.hash.base
    }

    fn base_mut(&mut self) -> &mut KeyBase {
        &mut self.hash.base
    }
}

impl<D> Deref for DtoHash<D> {
    type Target = Hash<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.hash
    }
}

impl<D: HashDto> DtoHash<D> {
    /// Reads the record. Missing fields keep their zero value and extra
    /// hash fields are ignored.
    pub fn to_dto(&self) -> Pending<D> {
        let names = D::field_names();
        let fields = names.clone();
        self.hash.base.run(
            |key| Ok(Command::new("HMGET").arg(key).args_from(&fields)),
            move |reply| {
                let values = reply.into_values()?;
                D::from_fields(names.into_iter().zip(values))
            },
        )
    }

    /// Writes every record field.
    pub fn from_dto(&self, dto: &D) -> Pending<()> {
        self.hash.base.run(
            |key| {
                let mut cmd = Command::new("HSET").arg(key);
                for (name, value) in dto.to_fields()? {
                    cmd = cmd.arg(name).arg_value(&value);
                }
                Ok(cmd)
            },
            decode_unit,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::Container;
    use futures::TryStreamExt;
    use std::sync::Arc;

    fn container() -> Container {
        Container::new(Arc::new(MemoryStore::new()), "t")
    }

    #[tokio::test]
    async fn test_fields() {
        let c = container();
        let h = c.get_key::<Hash<String, i64>>("h");
        assert!(h.set(&"a".into(), &1).await.unwrap());
        assert!(!h.set(&"a".into(), &2).await.unwrap());
        assert!(!h.set_with(&"a".into(), &3, When::NotExists).await.unwrap());
        assert_eq!(h.get(&"a".into()).await.unwrap(), 2);
        assert_eq!(h.get(&"missing".into()).await.unwrap(), 0);
        assert!(h.contains(&"a".into()).await.unwrap());
        assert!(matches!(
            h.set_with(&"a".into(), &3, When::Exists).await,
            Err(Error::InvalidArgument(_))
        ));

        h.set_many(&[("b".into(), 5), ("c".into(), 6)]).await.unwrap();
        assert_eq!(h.len().await.unwrap(), 3);
        let mut keys = h.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(h.get_many(&["c".into(), "x".into()]).await.unwrap(), vec![6, 0]);
        assert_eq!(h.remove_many(&["b".into(), "x".into()]).await.unwrap(), 1);
        assert!(h.remove(&"c".into()).await.unwrap());
        assert_eq!(h.to_vec().await.unwrap(), vec![("a".to_string(), 2)]);
        assert!(matches!(h.remove_many(&[]).await, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_increments() {
        let c = container();
        let h = c.get_key::<Hash<String, f64>>("counters");
        assert_eq!(h.increment(&"n".into(), 3).await.unwrap(), 3);
        assert_eq!(h.decrement(&"n".into(), 1).await.unwrap(), 2);
        assert_eq!(h.increment_by_float(&"f".into(), 0.25).await.unwrap(), 0.25);
        assert_eq!(h.get(&"n".into()).await.unwrap(), 2.0);
    }

    #[tokio::test]
    async fn test_scan_visits_every_field() {
        let c = container();
        let h = c.get_key::<Hash<i64, i64>>("big");
        let entries: Vec<(i64, i64)> = (0..250).map(|i| (i, i * 2)).collect();
        h.set_many(&entries).await.unwrap();
        let mut seen: Vec<(i64, i64)> = h.scan().try_collect().await.unwrap();
        seen.sort();
        assert_eq!(seen, entries);
    }

    #[derive(Debug, Default, PartialEq)]
    struct Profile {
        id: i64,
        user_name: String,
        score: f64,
    }

    crate::hash_dto!(Profile { id, user_name, score });

    #[tokio::test]
    async fn test_dto_round_trip() {
        let c = container();
        let h = c.get_key::<DtoHash<Profile>>("profile");
        let p = Profile {
            id: 7,
            user_name: "ann".into(),
            score: 1.5,
        };
        h.from_dto(&p).await.unwrap();
        assert_eq!(h.get(&"user_name".into()).await.unwrap(), Value::from("ann"));
        h.set(&"extra".into(), &Value::from("ignored")).await.unwrap();
        h.remove(&"score".into()).await.unwrap();
        let back = h.to_dto().await.unwrap();
        assert_eq!(back, Profile { score: 0.0, ..p });
    }
}
