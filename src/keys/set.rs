//! Unordered unique-member key.

use super::scan::{cursor_stream, failed_stream};
use super::{decode_many, full_names, key_object, Element, KeyBase, List, RedisKey, SortOptions};
use crate::codec::encode_all;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::pending::Pending;
use crate::resp::RespValue;
use crate::value::Value;
use futures::stream::BoxStream;
use std::marker::PhantomData;

pub struct Set<T> {
    base: KeyBase,
    _marker: PhantomData<fn() -> T>,
}

key_object!(Set<T>);

impl<T: Element> Set<T> {
    pub fn len(&self) -> Pending<i64> {
        self.base.run(|key| Ok(Command::new("SCARD").arg(key)), RespValue::into_int)
    }

    /// Resolves to true when the member was not already present.
    pub fn add(&self, member: &T) -> Pending<bool> {
        self.base.run(
            |key| Ok(Command::new("SADD").arg(key).arg_value(&member.encode()?)),
            RespValue::into_bool,
        )
    }

    /// Resolves to the number of members added.
    pub fn add_many(&self, members: &[T]) -> Pending<i64> {
        self.members_command("SADD", members)
    }

    pub fn remove(&self, member: &T) -> Pending<bool> {
        self.base.run(
            |key| Ok(Command::new("SREM").arg(key).arg_value(&member.encode()?)),
            RespValue::into_bool,
        )
    }

    pub fn remove_many(&self, members: &[T]) -> Pending<i64> {
        self.members_command("SREM", members)
    }

    fn members_command(&self, name: &'static str, members: &[T]) -> Pending<i64> {
        self.base.run(
            |key| {
                if members.is_empty() {
                    return Err(Error::invalid_argument("no members given"));
                }
                Ok(Command::new(name).arg(key).values_from(&encode_all(members)?))
            },
            RespValue::into_int,
        )
    }

    /// Removes and returns up to `count` random members.
    pub fn pop(&self, count: usize) -> Pending<Vec<T>> {
        self.base.run(
            |key| Ok(Command::new("SPOP").arg(key).arg(count.to_string())),
            decode_many,
        )
    }

    /// Returns up to `count` random members without removing them.
    pub fn peek(&self, count: usize) -> Pending<Vec<T>> {
        self.base.run(
            |key| Ok(Command::new("SRANDMEMBER").arg(key).arg(count.to_string())),
            decode_many,
        )
    }

    pub fn contains(&self, member: &T) -> Pending<bool> {
        self.base.run(
            |key| Ok(Command::new("SISMEMBER").arg(key).arg_value(&member.encode()?)),
            RespValue::into_bool,
        )
    }

    pub fn members(&self) -> Pending<Vec<T>> {
        self.base.run(|key| Ok(Command::new("SMEMBERS").arg(key)), decode_many)
    }

    fn algebra(&self, name: &'static str, others: &[&Set<T>]) -> Pending<Vec<T>> {
        self.base.run(
            |key| {
                Ok(Command::new(name)
                    .arg(key)
                    .args_from(full_names(others.iter().copied())?))
            },
            decode_many,
        )
    }

    fn algebra_store(&self, name: &'static str, dest: &Set<T>, others: &[&Set<T>]) -> Pending<i64> {
        self.base.run(
            |key| {
                Ok(Command::new(name)
                    .arg(dest.full_name()?)
                    .arg(key)
                    .args_from(full_names(others.iter().copied())?))
            },
            RespValue::into_int,
        )
    }

    /// Members of this set that are in none of `others`.
    pub fn difference(&self, others: &[&Set<T>]) -> Pending<Vec<T>> {
        self.algebra("SDIFF", others)
    }

    pub fn intersect(&self, others: &[&Set<T>]) -> Pending<Vec<T>> {
        self.algebra("SINTER", others)
    }

    pub fn union(&self, others: &[&Set<T>]) -> Pending<Vec<T>> {
        self.algebra("SUNION", others)
    }

    /// Stores [`difference`](Self::difference) in `dest`, replacing it;
    /// resolves to the stored size.
    pub fn difference_store(&self, dest: &Set<T>, others: &[&Set<T>]) -> Pending<i64> {
        self.algebra_store("SDIFFSTORE", dest, others)
    }

    pub fn intersect_store(&self, dest: &Set<T>, others: &[&Set<T>]) -> Pending<i64> {
        self.algebra_store("SINTERSTORE", dest, others)
    }

    pub fn union_store(&self, dest: &Set<T>, others: &[&Set<T>]) -> Pending<i64> {
        self.algebra_store("SUNIONSTORE", dest, others)
    }

    pub fn sort(&self, options: &SortOptions) -> Pending<Vec<T>> {
        self.base.run(|key| Ok(options.command(key, None)), decode_many)
    }

    pub fn sort_and_store(&self, dest: &List<T>, options: &SortOptions) -> Pending<i64> {
        self.base.run(
            |key| Ok(options.command(key, Some(dest.full_name()?))),
            RespValue::into_int,
        )
    }

    pub fn scan(&self) -> BoxStream<'static, Result<T>> {
        match self.base.direct() {
            Ok((key, executor)) => cursor_stream(executor, "SSCAN", key, 1, |mut one| {
                T::decode(one.pop().unwrap_or(Value::Nil))
            }),
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

    fn sorted(mut v: Vec<String>) -> Vec<String> {
        v.sort();
        v
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_membership() {
        let c = container();
        let s = c.get_key::<Set<String>>("s");
        assert!(s.add(&"a".into()).await.unwrap());
        assert!(!s.add(&"a".into()).await.unwrap());
        assert_eq!(s.add_many(&strings(&["b", "c"])).await.unwrap(), 2);
        assert!(s.contains(&"b".into()).await.unwrap());
        assert!(s.remove(&"b".into()).await.unwrap());
        assert_eq!(s.len().await.unwrap(), 2);
        assert_eq!(s.peek(5).await.unwrap().len(), 2);
        assert_eq!(s.pop(1).await.unwrap().len(), 1);
        assert_eq!(s.len().await.unwrap(), 1);
        assert!(matches!(s.remove_many(&[]).await, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_algebra_keeps_operand_order() {
        let c = container();
        let a = c.get_key::<Set<String>>("a");
        let b = c.get_key::<Set<String>>("b");
        a.add_many(&strings(&["a", "b", "c"])).await.unwrap();
        b.add_many(&strings(&["c", "d", "e"])).await.unwrap();

        assert_eq!(sorted(a.difference(&[&*b]).await.unwrap()), strings(&["a", "b"]));
        assert_eq!(sorted(b.difference(&[&*a]).await.unwrap()), strings(&["d", "e"]));
        assert_eq!(a.intersect(&[&*b]).await.unwrap(), strings(&["c"]));
        assert_eq!(a.union(&[&*b]).await.unwrap().len(), 5);

        let dest = c.get_key::<Set<String>>("dest");
        assert_eq!(a.union_store(&dest, &[&*b]).await.unwrap(), 5);
        assert_eq!(b.difference_store(&dest, &[&*a]).await.unwrap(), 2);
        assert_eq!(sorted(dest.members().await.unwrap()), strings(&["d", "e"]));
    }

    #[tokio::test]
    async fn test_sort_and_scan() {
        let c = container();
        let s = c.get_key::<Set<i64>>("nums");
        s.add_many(&(1..=150).rev().collect::<Vec<i64>>()).await.unwrap();
        let top = s.sort(&SortOptions::default().descending().limit(0, 3)).await.unwrap();
        assert_eq!(top, vec![150, 149, 148]);

        let out = c.get_key::<List<i64>>("sorted");
        assert_eq!(s.sort_and_store(&out, &SortOptions::default()).await.unwrap(), 150);
        assert_eq!(out.first().await.unwrap(), 1);

        let mut seen: Vec<i64> = s.scan().try_collect().await.unwrap();
        seen.sort();
        assert_eq!(seen, (1..=150).collect::<Vec<_>>());
    }
}
