//! Score-ordered unique-member key.

use super::scan::{cursor_stream, failed_stream};
use super::{
    decode_many, decode_scored, full_names, key_object, Aggregate, Element, Exclude, KeyBase, List,
    Order, RedisKey, SortOptions,
};
use crate::codec::Codec;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::pending::Pending;
use crate::resp::RespValue;
use crate::value::Value;
use futures::stream::BoxStream;
use std::marker::PhantomData;

/// Members of `T` ordered by score, ties broken by the members' bytes.
pub struct SortedSet<T> {
    base: KeyBase,
    _marker: PhantomData<fn() -> T>,
}

key_object!(SortedSet<T>);

/// `[member` / `(member`, or `-` / `+` for an open end.
fn lex_bound<T: Codec>(bound: Option<&T>, open: bool, unbounded: &str) -> Result<Vec<u8>> {
    match bound {
        None => Ok(unbounded.as_bytes().to_vec()),
        Some(v) => {
            let mut out = vec![if open { b'(' } else { b'[' }];
            out.extend_from_slice(&v.encode()?.to_bytes());
            Ok(out)
        }
    }
}

fn limit(cmd: Command, skip: i64, take: i64) -> Command {
    if skip != 0 || take != -1 {
        cmd.arg("LIMIT").arg_int(skip).arg_int(take)
    } else {
        cmd
    }
}

fn optional_rank(reply: RespValue) -> Result<Option<i64>> {
    if reply.is_null() {
        Ok(None)
    } else {
        reply.into_int().map(Some)
    }
}

fn optional_score(reply: RespValue) -> Result<Option<f64>> {
    if reply.is_null() {
        Ok(None)
    } else {
        reply.into_float().map(Some)
    }
}

impl<T: Element> SortedSet<T> {
    /// Adds or rescores a member; resolves to true when it was new.
    pub fn add(&self, member: &T, score: f64) -> Pending<bool> {
        self.base.run(
            |key| {
                Ok(Command::new("ZADD")
                    .arg(key)
                    .arg_float(score)
                    .arg_value(&member.encode()?))
            },
            RespValue::into_bool,
        )
    }

    /// Resolves to the number of new members.
    pub fn add_many(&self, members: &[(T, f64)]) -> Pending<i64> {
        self.base.run(
            |key| {
                if members.is_empty() {
                    return Err(Error::invalid_argument("no members given"));
                }
                let mut cmd = Command::new("ZADD").arg(key);
                for (member, score) in members {
                    cmd = cmd.arg_float(*score).arg_value(&member.encode()?);
                }
                Ok(cmd)
            },
            RespValue::into_int,
        )
    }

    pub fn len(&self) -> Pending<i64> {
        self.base.run(|key| Ok(Command::new("ZCARD").arg(key)), RespValue::into_int)
    }

    /// Members with a score in `[min, max]`, ends opened per `exclude`.
    pub fn count_by_score(&self, min: f64, max: f64, exclude: Exclude) -> Pending<i64> {
        self.base.run(
            |key| {
                Ok(Command::new("ZCOUNT")
                    .arg(key)
                    .arg(Exclude::score_bound(exclude.start(), min))
                    .arg(Exclude::score_bound(exclude.stop(), max)))
            },
            RespValue::into_int,
        )
    }

    /// Members between `min` and `max` by byte order. Only meaningful when
    /// every member has the same score. `None` leaves that end unbounded.
    pub fn count_by_value(&self, min: Option<&T>, max: Option<&T>, exclude: Exclude) -> Pending<i64> {
        self.base.run(
            |key| {
                Ok(Command::new("ZLEXCOUNT")
                    .arg(key)
                    .arg(lex_bound(min, exclude.start(), "-")?)
                    .arg(lex_bound(max, exclude.stop(), "+")?))
            },
            RespValue::into_int,
        )
    }

    fn range_command(key: &str, start: i64, stop: i64, order: Order) -> Command {
        let name = match order {
            Order::Ascending => "ZRANGE",
            Order::Descending => "ZREVRANGE",
        };
        Command::new(name).arg(key).arg_int(start).arg_int(stop)
    }

    /// Members by rank `[start, stop]`.
    pub fn range(&self, start: i64, stop: i64, order: Order) -> Pending<Vec<T>> {
        self.base.run(|key| Ok(Self::range_command(key, start, stop, order)), decode_many)
    }

    pub fn range_with_scores(&self, start: i64, stop: i64, order: Order) -> Pending<Vec<(T, f64)>> {
        self.base.run(
            |key| Ok(Self::range_command(key, start, stop, order).arg("WITHSCORES")),
            decode_scored,
        )
    }

    /// Members between `min` and `max` by byte order, then `skip`/`take`
    /// (`take == -1` means all).
    pub fn range_by_value(
        &self,
        min: Option<&T>,
        max: Option<&T>,
        exclude: Exclude,
        order: Order,
        skip: i64,
        take: i64,
    ) -> Pending<Vec<T>> {
        self.base.run(
            |key| {
                let lo = lex_bound(min, exclude.start(), "-")?;
                let hi = lex_bound(max, exclude.stop(), "+")?;
                let cmd = match order {
                    Order::Ascending => Command::new("ZRANGEBYLEX").arg(key).arg(lo).arg(hi),
                    Order::Descending => Command::new("ZREVRANGEBYLEX").arg(key).arg(hi).arg(lo),
                };
                Ok(limit(cmd, skip, take))
            },
            decode_many,
        )
    }

    /// Members with a score between `min` and `max`, then `skip`/`take`.
    pub fn range_by_score(
        &self,
        min: f64,
        max: f64,
        exclude: Exclude,
        order: Order,
        skip: i64,
        take: i64,
    ) -> Pending<Vec<T>> {
        self.base.run(
            |key| {
                let lo = Exclude::score_bound(exclude.start(), min);
                let hi = Exclude::score_bound(exclude.stop(), max);
                let cmd = match order {
                    Order::Ascending => Command::new("ZRANGEBYSCORE").arg(key).arg(lo).arg(hi),
                    Order::Descending => Command::new("ZREVRANGEBYSCORE").arg(key).arg(hi).arg(lo),
                };
                Ok(limit(cmd, skip, take))
            },
            decode_many,
        )
    }

    /// Zero-based rank in the given order; `None` if not a member.
    pub fn rank(&self, member: &T, order: Order) -> Pending<Option<i64>> {
        self.base.run(
            |key| {
                let name = match order {
                    Order::Ascending => "ZRANK",
                    Order::Descending => "ZREVRANK",
                };
                Ok(Command::new(name).arg(key).arg_value(&member.encode()?))
            },
            optional_rank,
        )
    }

    pub fn score(&self, member: &T) -> Pending<Option<f64>> {
        self.base.run(
            |key| Ok(Command::new("ZSCORE").arg(key).arg_value(&member.encode()?)),
            optional_score,
        )
    }

    /// Adds `by` to the member's score (creating it at `by`); resolves to
    /// the new score.
    pub fn increment_score(&self, member: &T, by: f64) -> Pending<f64> {
        self.base.run(
            |key| {
                Ok(Command::new("ZINCRBY")
                    .arg(key)
                    .arg_float(by)
                    .arg_value(&member.encode()?))
            },
            RespValue::into_float,
        )
    }

    pub fn remove(&self, member: &T) -> Pending<bool> {
        self.base.run(
            |key| Ok(Command::new("ZREM").arg(key).arg_value(&member.encode()?)),
            RespValue::into_bool,
        )
    }

    pub fn remove_many(&self, members: &[T]) -> Pending<i64> {
        self.base.run(
            |key| {
                if members.is_empty() {
                    return Err(Error::invalid_argument("no members given"));
                }
                let mut cmd = Command::new("ZREM").arg(key);
                for member in members {
                    cmd = cmd.arg_value(&member.encode()?);
                }
                Ok(cmd)
            },
            RespValue::into_int,
        )
    }

    pub fn remove_range_by_value(&self, min: Option<&T>, max: Option<&T>, exclude: Exclude) -> Pending<i64> {
        self.base.run(
            |key| {
                Ok(Command::new("ZREMRANGEBYLEX")
                    .arg(key)
                    .arg(lex_bound(min, exclude.start(), "-")?)
                    .arg(lex_bound(max, exclude.stop(), "+")?))
            },
            RespValue::into_int,
        )
    }

    pub fn remove_range_by_rank(&self, start: i64, stop: i64) -> Pending<i64> {
        self.base.run(
            |key| Ok(Command::new("ZREMRANGEBYRANK").arg(key).arg_int(start).arg_int(stop)),
            RespValue::into_int,
        )
    }

    pub fn remove_range_by_score(&self, min: f64, max: f64, exclude: Exclude) -> Pending<i64> {
        self.base.run(
            |key| {
                Ok(Command::new("ZREMRANGEBYSCORE")
                    .arg(key)
                    .arg(Exclude::score_bound(exclude.start(), min))
                    .arg(Exclude::score_bound(exclude.stop(), max)))
            },
            RespValue::into_int,
        )
    }

    /// Removes and returns the lowest-scored member (highest for
    /// [`Order::Descending`]); `None` when empty.
    pub fn pop(&self, order: Order) -> Pending<Option<(T, f64)>> {
        self.base.run(
            |key| {
                let name = match order {
                    Order::Ascending => "ZPOPMIN",
                    Order::Descending => "ZPOPMAX",
                };
                Ok(Command::new(name).arg(key))
            },
            |reply| Ok(decode_scored(reply)?.into_iter().next()),
        )
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

    fn store(
        &self,
        name: &'static str,
        dest: &SortedSet<T>,
        others: &[&SortedSet<T>],
        weights: Option<&[f64]>,
        aggregate: Aggregate,
    ) -> Pending<i64> {
        self.base.run(
            |key| {
                let mut keys = vec![key.to_string()];
                keys.extend(full_names(others.iter().copied())?);
                let mut cmd = Command::new(name)
                    .arg(dest.full_name()?)
                    .arg(keys.len().to_string())
                    .args_from(&keys);
                if let Some(weights) = weights {
                    if weights.len() != keys.len() {
                        return Err(Error::invalid_argument(format!(
                            "{} weights given for {} keys",
                            weights.len(),
                            keys.len()
                        )));
                    }
                    cmd = cmd.arg("WEIGHTS");
                    for w in weights {
                        cmd = cmd.arg_float(*w);
                    }
                }
                if aggregate != Aggregate::Sum {
                    cmd = cmd.arg("AGGREGATE").arg(aggregate.as_str());
                }
                Ok(cmd)
            },
            RespValue::into_int,
        )
    }

    /// Stores the members common to this set and every one of `others` in
    /// `dest`. `weights`, when given, has one entry per source, this set
    /// first.
    pub fn intersect_store(
        &self,
        dest: &SortedSet<T>,
        others: &[&SortedSet<T>],
        weights: Option<&[f64]>,
        aggregate: Aggregate,
    ) -> Pending<i64> {
        self.store("ZINTERSTORE", dest, others, weights, aggregate)
    }

    pub fn union_store(
        &self,
        dest: &SortedSet<T>,
        others: &[&SortedSet<T>],
        weights: Option<&[f64]>,
        aggregate: Aggregate,
    ) -> Pending<i64> {
        self.store("ZUNIONSTORE", dest, others, weights, aggregate)
    }

    /// Walks the set with `ZSCAN`, yielding members with their scores.
    pub fn scan(&self) -> BoxStream<'static, Result<(T, f64)>> {
        match self.base.direct() {
            Ok((key, executor)) => cursor_stream(executor, "ZSCAN", key, 2, |mut pair| {
                let score = f64::decode(pair.pop().unwrap_or(Value::Nil))?;
                let member = T::decode(pair.pop().unwrap_or(Value::Nil))?;
                Ok((member, score))
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

    fn s(v: &str) -> String {
        v.to_string()
    }

    #[tokio::test]
    async fn test_scores_and_ranks() {
        let c = container();
        let z = c.get_key::<SortedSet<String>>("z");
        assert!(z.add(&s("one"), 1.0).await.unwrap());
        assert!(!z.add(&s("one"), 1.0).await.unwrap());
        assert_eq!(z.add_many(&[(s("two"), 2.0), (s("three"), 3.0)]).await.unwrap(), 2);
        assert_eq!(z.len().await.unwrap(), 3);
        assert_eq!(z.rank(&s("three"), Order::Ascending).await.unwrap(), Some(2));
        assert_eq!(z.rank(&s("three"), Order::Descending).await.unwrap(), Some(0));
        assert_eq!(z.rank(&s("nope"), Order::Ascending).await.unwrap(), None);
        assert_eq!(z.score(&s("two")).await.unwrap(), Some(2.0));
        assert_eq!(z.score(&s("nope")).await.unwrap(), None);
        assert_eq!(z.increment_score(&s("one"), 4.5).await.unwrap(), 5.5);
        assert_eq!(
            z.range(0, -1, Order::Ascending).await.unwrap(),
            vec![s("two"), s("three"), s("one")]
        );
        assert_eq!(
            z.range_with_scores(0, 0, Order::Descending).await.unwrap(),
            vec![(s("one"), 5.5)]
        );
    }

    #[tokio::test]
    async fn test_score_ranges() {
        let c = container();
        let z = c.get_key::<SortedSet<i64>>("scores");
        z.add_many(&(1..=10).map(|i| (i, i as f64)).collect::<Vec<_>>()).await.unwrap();
        assert_eq!(z.count_by_score(2.0, 4.0, Exclude::None).await.unwrap(), 3);
        assert_eq!(z.count_by_score(2.0, 4.0, Exclude::Both).await.unwrap(), 1);
        assert_eq!(
            z.count_by_score(f64::NEG_INFINITY, f64::INFINITY, Exclude::None).await.unwrap(),
            10
        );
        assert_eq!(
            z.range_by_score(2.0, 8.0, Exclude::Start, Order::Ascending, 1, 2).await.unwrap(),
            vec![4, 5]
        );
        assert_eq!(
            z.range_by_score(2.0, 8.0, Exclude::None, Order::Descending, 0, -1).await.unwrap(),
            vec![8, 7, 6, 5, 4, 3, 2]
        );
        assert_eq!(z.remove_range_by_score(9.0, 10.0, Exclude::None).await.unwrap(), 2);
        assert_eq!(z.remove_range_by_rank(0, 1).await.unwrap(), 2);
        assert_eq!(z.pop(Order::Ascending).await.unwrap(), Some((3, 3.0)));
        assert_eq!(z.pop(Order::Descending).await.unwrap(), Some((8, 8.0)));
        assert_eq!(z.remove_many(&[4, 5, 6, 7]).await.unwrap(), 4);
        assert_eq!(z.pop(Order::Ascending).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_value_ranges() {
        let c = container();
        let z = c.get_key::<SortedSet<String>>("lex");
        let letters: Vec<(String, f64)> = ["a", "b", "c", "d", "e"].iter().map(|m| (s(m), 0.0)).collect();
        z.add_many(&letters).await.unwrap();
        assert_eq!(z.count_by_value(None, None, Exclude::None).await.unwrap(), 5);
        assert_eq!(z.count_by_value(Some(&s("b")), Some(&s("d")), Exclude::Stop).await.unwrap(), 2);
        assert_eq!(
            z.range_by_value(Some(&s("b")), None, Exclude::None, Order::Ascending, 0, 2).await.unwrap(),
            vec![s("b"), s("c")]
        );
        assert_eq!(
            z.range_by_value(None, Some(&s("c")), Exclude::None, Order::Descending, 0, -1).await.unwrap(),
            vec![s("c"), s("b"), s("a")]
        );
        assert_eq!(z.remove_range_by_value(Some(&s("a")), Some(&s("b")), Exclude::None).await.unwrap(), 2);
        assert_eq!(z.len().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_weighted_store() {
        let c = container();
        let a = c.get_key::<SortedSet<String>>("a");
        let b = c.get_key::<SortedSet<String>>("b");
        let dest = c.get_key::<SortedSet<String>>("dest");
        a.add_many(&[(s("x"), 1.0), (s("y"), 2.0)]).await.unwrap();
        b.add_many(&[(s("y"), 10.0), (s("z"), 20.0)]).await.unwrap();

        assert_eq!(a.intersect_store(&dest, &[&*b], None, Aggregate::Sum).await.unwrap(), 1);
        assert_eq!(dest.score(&s("y")).await.unwrap(), Some(12.0));

        assert_eq!(
            a.union_store(&dest, &[&*b], Some(&[2.0, 1.0]), Aggregate::Max).await.unwrap(),
            3
        );
        assert_eq!(dest.score(&s("x")).await.unwrap(), Some(2.0));
        assert_eq!(dest.score(&s("y")).await.unwrap(), Some(10.0));

        assert!(matches!(
            a.union_store(&dest, &[&*b], Some(&[1.0]), Aggregate::Sum).await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_scan_yields_scores() {
        let c = container();
        let z = c.get_key::<SortedSet<i64>>("scan");
        z.add_many(&(0..120).map(|i| (i, i as f64 / 2.0)).collect::<Vec<_>>()).await.unwrap();
        let mut seen: Vec<(i64, f64)> = z.scan().try_collect().await.unwrap();
        seen.sort_by_key(|(m, _)| *m);
        assert_eq!(seen.len(), 120);
        assert_eq!(seen[7], (7, 3.5));
    }
}
