//! Ordered sequence key.

use super::scan::{failed_stream, index_stream};
use super::{decode_many, decode_one, decode_unit, key_object, Element, KeyBase, RedisKey, SortOptions};
use crate::codec::encode_all;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::pending::Pending;
use crate::resp::RespValue;
use futures::stream::BoxStream;
use std::marker::PhantomData;

/// A list of `T`. Indexes are zero-based; negative indexes count from the
/// tail (-1 is the last element).
pub struct List<T> {
    base: KeyBase,
    _marker: PhantomData<fn() -> T>,
}

key_object!(List<T>);

impl<T: Element> List<T> {
    pub fn len(&self) -> Pending<i64> {
        self.base.run(|key| Ok(Command::new("LLEN").arg(key)), RespValue::into_int)
    }

    pub fn first(&self) -> Pending<T> {
        self.index(0)
    }

    pub fn last(&self) -> Pending<T> {
        self.index(-1)
    }

    /// The element at `index`, or `T`'s zero value when out of range.
    pub fn index(&self, index: i64) -> Pending<T> {
        self.base.run(
            |key| Ok(Command::new("LINDEX").arg(key).arg_int(index)),
            decode_one,
        )
    }

    fn insert(&self, position: &'static str, pivot: &T, value: &T) -> Pending<i64> {
        self.base.run(
            |key| {
                Ok(Command::new("LINSERT")
                    .arg(key)
                    .arg(position)
                    .arg_value(&pivot.encode()?)
                    .arg_value(&value.encode()?))
            },
            RespValue::into_int,
        )
    }

    /// Inserts before the first occurrence of `pivot`. Resolves to the new
    /// length, or -1 when `pivot` is not in the list.
    pub fn insert_before(&self, pivot: &T, value: &T) -> Pending<i64> {
        self.insert("BEFORE", pivot, value)
    }

    pub fn insert_after(&self, pivot: &T, value: &T) -> Pending<i64> {
        self.insert("AFTER", pivot, value)
    }

    fn push(&self, name: &'static str, values: &[T]) -> Pending<i64> {
        self.base.run(
            |key| {
                if values.is_empty() {
                    return Err(Error::invalid_argument("no values given"));
                }
                Ok(Command::new(name).arg(key).values_from(&encode_all(values)?))
            },
            RespValue::into_int,
        )
    }

    /// Resolves to the new length.
    pub fn push_front(&self, value: &T) -> Pending<i64> {
        self.push("LPUSH", std::slice::from_ref(value))
    }

    /// Pushes each value onto the head in turn, so the last one ends up
    /// first.
    pub fn push_front_many(&self, values: &[T]) -> Pending<i64> {
        self.push("LPUSH", values)
    }

    pub fn push_back(&self, value: &T) -> Pending<i64> {
        self.push("RPUSH", std::slice::from_ref(value))
    }

    pub fn push_back_many(&self, values: &[T]) -> Pending<i64> {
        self.push("RPUSH", values)
    }

    /// Removes and returns the head, or the zero value when empty.
    pub fn pop_front(&self) -> Pending<T> {
        self.base.run(|key| Ok(Command::new("LPOP").arg(key)), decode_one)
    }

    pub fn pop_back(&self) -> Pending<T> {
        self.base.run(|key| Ok(Command::new("RPOP").arg(key)), decode_one)
    }

    /// Moves the tail of this list onto the head of `dest` and returns it.
    /// `dest` may be this list, which rotates it.
    pub fn pop_push(&self, dest: &List<T>) -> Pending<T> {
        self.base.run(
            |key| Ok(Command::new("RPOPLPUSH").arg(key).arg(dest.full_name()?)),
            decode_one,
        )
    }

    /// Elements `[start, stop]`, both inclusive.
    pub fn range(&self, start: i64, stop: i64) -> Pending<Vec<T>> {
        self.base.run(
            |key| Ok(Command::new("LRANGE").arg(key).arg_int(start).arg_int(stop)),
            decode_many,
        )
    }

    pub fn to_vec(&self) -> Pending<Vec<T>> {
        self.range(0, -1)
    }

    /// Removes occurrences of `value`: the first `count` from the head when
    /// positive, from the tail when negative, all of them when zero.
    pub fn remove(&self, value: &T, count: i64) -> Pending<i64> {
        self.base.run(
            |key| Ok(Command::new("LREM").arg(key).arg_int(count).arg_value(&value.encode()?)),
            RespValue::into_int,
        )
    }

    /// Fails with a server error when `index` is out of range.
    pub fn set(&self, index: i64, value: &T) -> Pending<()> {
        self.base.run(
            |key| Ok(Command::new("LSET").arg(key).arg_int(index).arg_value(&value.encode()?)),
            decode_unit,
        )
    }

    /// Keeps only `[start, stop]`.
    pub fn trim(&self, start: i64, stop: i64) -> Pending<()> {
        self.base.run(
            |key| Ok(Command::new("LTRIM").arg(key).arg_int(start).arg_int(stop)),
            decode_unit,
        )
    }

    pub fn sort(&self, options: &SortOptions) -> Pending<Vec<T>> {
        self.base.run(|key| Ok(options.command(key, None)), decode_many)
    }

    /// Sorts into `dest`, replacing it; resolves to the stored length.
    pub fn sort_and_store(&self, dest: &List<T>, options: &SortOptions) -> Pending<i64> {
        self.base.run(
            |key| Ok(options.command(key, Some(dest.full_name()?))),
            RespValue::into_int,
        )
    }

    /// Walks the list head to tail, one `LINDEX` per element.
    pub fn stream(&self) -> BoxStream<'static, Result<T>> {
        match self.base.direct() {
            Ok((key, executor)) => index_stream(executor, key, T::decode),
            Err(e) => failed_stream(e),
        }
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
    async fn test_push_pop() {
        let c = container();
        let list = c.get_key::<List<i64>>("l");
        assert_eq!(list.push_back_many(&[2, 3]).await.unwrap(), 2);
        assert_eq!(list.push_front(&1).await.unwrap(), 3);
        assert_eq!(list.to_vec().await.unwrap(), vec![1, 2, 3]);
        assert_eq!(list.first().await.unwrap(), 1);
        assert_eq!(list.last().await.unwrap(), 3);
        assert_eq!(list.pop_front().await.unwrap(), 1);
        assert_eq!(list.pop_back().await.unwrap(), 3);
        assert_eq!(list.pop_back().await.unwrap(), 2);
        assert_eq!(list.pop_back().await.unwrap(), 0);
        assert!(matches!(list.push_back_many(&[]).await, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_insert_set_trim() {
        let c = container();
        let list = c.get_key::<List<String>>("words");
        list.push_back_many(&["a".into(), "c".into()]).await.unwrap();
        assert_eq!(list.insert_before(&"c".into(), &"b".into()).await.unwrap(), 3);
        assert_eq!(list.insert_after(&"zz".into(), &"x".into()).await.unwrap(), -1);
        list.set(0, &"A".into()).await.unwrap();
        assert!(matches!(list.set(10, &"x".into()).await, Err(Error::Server(_))));
        list.trim(1, -1).await.unwrap();
        assert_eq!(list.to_vec().await.unwrap(), vec!["b", "c"]);
        assert_eq!(list.remove(&"b".into(), 0).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_pop_push_and_sort() {
        let c = container();
        let src = c.get_key::<List<i64>>("src");
        let dest = c.get_key::<List<i64>>("dest");
        src.push_back_many(&[3, 1, 2]).await.unwrap();
        assert_eq!(src.pop_push(&dest).await.unwrap(), 2);
        assert_eq!(src.sort(&SortOptions::default()).await.unwrap(), vec![1, 3]);
        assert_eq!(
            src.sort(&SortOptions::default().descending()).await.unwrap(),
            vec![3, 1]
        );
        assert_eq!(src.sort_and_store(&dest, &SortOptions::default()).await.unwrap(), 2);
        assert_eq!(dest.to_vec().await.unwrap(), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_stream_in_order() {
        let c = container();
        let list = c.get_key::<List<i64>>("seq");
        list.push_back_many(&(0..20).collect::<Vec<_>>()).await.unwrap();
        let seen: Vec<i64> = list.stream().try_collect().await.unwrap();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());

        let empty = c.get_key::<List<i64>>("none");
        let seen: Vec<i64> = empty.stream().try_collect().await.unwrap();
        assert!(seen.is_empty());
    }
}
