//! Sorted-set commands.
//!
//! Members are ordered by score, then by member bytes, so equal scores come
//! back in lexicographic order.

use super::{
    arity_error, at_least, bulk, eq_ignore_case, exact, normalize_range, parse_float, parse_int,
    scan_page, syntax_error, CmdResult, Data, Db,
};
use crate::resp::RespValue;
use crate::value::format_float;
use ahash::AHashMap;
use bytes::Bytes;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Score with a total order.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Score(pub(crate) f64);

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ZSet {
    scores: AHashMap<Bytes, f64>,
    ordered: BTreeSet<(Score, Bytes)>,
}

impl ZSet {
    pub(crate) fn len(&self) -> usize {
        self.scores.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub(crate) fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// Inserts or updates; true when the member is new.
    pub(crate) fn insert(&mut self, member: Bytes, score: f64) -> bool {
        // Normalise -0.0 so it orders with 0.0.
        let score = if score == 0.0 { 0.0 } else { score };
        match self.scores.insert(member.clone(), score) {
            Some(old) => {
                self.ordered.remove(&(Score(old), member.clone()));
                self.ordered.insert((Score(score), member));
                false
            }
            None => {
                self.ordered.insert((Score(score), member));
                true
            }
        }
    }

    pub(crate) fn remove(&mut self, member: &[u8]) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.ordered.remove(&(Score(score), Bytes::copy_from_slice(member)));
                true
            }
            None => false,
        }
    }

    /// Members in ascending (score, member) order.
    pub(crate) fn iter(&self) -> impl DoubleEndedIterator<Item = (&Bytes, f64)> + '_ {
        self.ordered.iter().map(|(s, m)| (m, s.0))
    }

    pub(crate) fn rank(&self, member: &[u8]) -> Option<usize> {
        let score = self.score(member)?;
        let key = (Score(score), Bytes::copy_from_slice(member));
        Some(self.ordered.range(..key).count())
    }
}

// ============================================================================
// Range bounds
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct ScoreBound {
    value: f64,
    exclusive: bool,
}

impl ScoreBound {
    fn parse(arg: &[u8]) -> Result<Self, String> {
        let (exclusive, rest) = match arg.first() {
            Some(b'(') => (true, &arg[1..]),
            _ => (false, arg),
        };
        let value = parse_float(rest).map_err(|_| "ERR min or max is not a float".to_string())?;
        Ok(ScoreBound { value, exclusive })
    }

    fn above(&self, score: f64) -> bool {
        if self.exclusive { score > self.value } else { score >= self.value }
    }

    fn below(&self, score: f64) -> bool {
        if self.exclusive { score < self.value } else { score <= self.value }
    }
}

#[derive(Debug, Clone)]
enum LexBound {
    Min,
    Max,
    Inclusive(Bytes),
    Exclusive(Bytes),
}

impl LexBound {
    fn parse(arg: &Bytes) -> Result<Self, String> {
        match arg.first() {
            Some(b'-') if arg.len() == 1 => Ok(LexBound::Min),
            Some(b'+') if arg.len() == 1 => Ok(LexBound::Max),
            Some(b'[') => Ok(LexBound::Inclusive(arg.slice(1..))),
            Some(b'(') => Ok(LexBound::Exclusive(arg.slice(1..))),
            _ => Err("ERR min or max not valid string range item".to_string()),
        }
    }

    fn above(&self, member: &[u8]) -> bool {
        match self {
            LexBound::Min => true,
            LexBound::Max => false,
            LexBound::Inclusive(b) => member >= &b[..],
            LexBound::Exclusive(b) => member > &b[..],
        }
    }

    fn below(&self, member: &[u8]) -> bool {
        match self {
            LexBound::Min => false,
            LexBound::Max => true,
            LexBound::Inclusive(b) => member <= &b[..],
            LexBound::Exclusive(b) => member < &b[..],
        }
    }
}

/// Parses trailing `[WITHSCORES] [LIMIT offset count]` options.
fn range_options(args: &[Bytes], allow_scores: bool) -> Result<(bool, usize, Option<usize>), String> {
    let mut with_scores = false;
    let mut offset = 0usize;
    let mut count = None;
    let mut i = 0;
    while i < args.len() {
        if allow_scores && eq_ignore_case(&args[i], "WITHSCORES") {
            with_scores = true;
            i += 1;
        } else if eq_ignore_case(&args[i], "LIMIT") && i + 2 < args.len() {
            let off = parse_int(&args[i + 1])?;
            let cnt = parse_int(&args[i + 2])?;
            if off < 0 {
                return Ok((with_scores, 0, Some(0)));
            }
            offset = off as usize;
            count = if cnt < 0 { None } else { Some(cnt as usize) };
            i += 3;
        } else {
            return Err(syntax_error());
        }
    }
    Ok((with_scores, offset, count))
}

fn reply_members<'a, I>(members: I, with_scores: bool) -> RespValue
where
    I: IntoIterator<Item = (&'a Bytes, f64)>,
{
    let mut out = Vec::new();
    for (member, score) in members {
        out.push(bulk(member.clone()));
        if with_scores {
            out.push(bulk(format_float(score)));
        }
    }
    RespValue::Array(Some(out))
}

impl Db {
    /// ZADD key [NX|XX] [CH] score member [score member ...]
    pub(super) fn zadd(&mut self, args: &[Bytes]) -> CmdResult {
        at_least(args, 3, "zadd")?;
        let mut nx = false;
        let mut xx = false;
        let mut ch = false;
        let mut i = 1;
        while i < args.len() {
            if eq_ignore_case(&args[i], "NX") {
                nx = true;
            } else if eq_ignore_case(&args[i], "XX") {
                xx = true;
            } else if eq_ignore_case(&args[i], "CH") {
                ch = true;
            } else {
                break;
            }
            i += 1;
        }
        let pairs = &args[i..];
        if pairs.is_empty() || pairs.len() % 2 != 0 || (nx && xx) {
            return Err(syntax_error());
        }
        let mut parsed = Vec::with_capacity(pairs.len() / 2);
        for pair in pairs.chunks(2) {
            parsed.push((parse_float(&pair[0])?, pair[1].clone()));
        }
        let zset = self.zset_or_create(&args[0])?;
        let mut added = 0;
        let mut changed = 0;
        for (score, member) in parsed {
            match zset.score(&member) {
                Some(old) => {
                    if !nx && old != score {
                        zset.insert(member, score);
                        changed += 1;
                    }
                }
                None => {
                    if !xx {
                        zset.insert(member, score);
                        added += 1;
                    }
                }
            }
        }
        self.modified(&args[0]);
        Ok(RespValue::Integer(if ch { added + changed } else { added }))
    }

    pub(super) fn zcard(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 1, "zcard")?;
        Ok(RespValue::Integer(self.zset(&args[0])?.map_or(0, |z| z.len()) as i64))
    }

    pub(super) fn zcount(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 3, "zcount")?;
        let (min, max) = (ScoreBound::parse(&args[1])?, ScoreBound::parse(&args[2])?);
        let n = self
            .zset(&args[0])?
            .map_or(0, |z| z.iter().filter(|(_, s)| min.above(*s) && max.below(*s)).count());
        Ok(RespValue::Integer(n as i64))
    }

    pub(super) fn zlexcount(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 3, "zlexcount")?;
        let (min, max) = (LexBound::parse(&args[1])?, LexBound::parse(&args[2])?);
        let n = self
            .zset(&args[0])?
            .map_or(0, |z| z.iter().filter(|(m, _)| min.above(m) && max.below(m)).count());
        Ok(RespValue::Integer(n as i64))
    }

    pub(super) fn zscore(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 2, "zscore")?;
        Ok(match self.zset(&args[0])?.and_then(|z| z.score(&args[1])) {
            Some(score) => bulk(format_float(score)),
            None => RespValue::null(),
        })
    }

    pub(super) fn zincrby(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 3, "zincrby")?;
        let delta = parse_float(&args[1])?;
        let zset = self.zset_or_create(&args[0])?;
        let next = zset.score(&args[2]).unwrap_or(0.0) + delta;
        if next.is_nan() {
            return Err("ERR resulting score is not a number (NaN)".to_string());
        }
        zset.insert(args[2].clone(), next);
        self.modified(&args[0]);
        Ok(bulk(format_float(next)))
    }

    pub(super) fn zrank(&mut self, args: &[Bytes], reverse: bool) -> CmdResult {
        exact(args, 2, if reverse { "zrevrank" } else { "zrank" })?;
        Ok(match self.zset(&args[0])? {
            Some(z) => match z.rank(&args[1]) {
                Some(r) if reverse => RespValue::Integer((z.len() - 1 - r) as i64),
                Some(r) => RespValue::Integer(r as i64),
                None => RespValue::null(),
            },
            None => RespValue::null(),
        })
    }

    /// ZRANGE / ZREVRANGE key start stop [WITHSCORES]
    pub(super) fn zrange(&mut self, args: &[Bytes], reverse: bool) -> CmdResult {
        if args.len() != 3 && args.len() != 4 {
            return Err(arity_error(if reverse { "zrevrange" } else { "zrange" }));
        }
        let (start, stop) = (parse_int(&args[1])?, parse_int(&args[2])?);
        let (with_scores, _, _) = range_options(&args[3..], true)?;
        let zset = match self.zset(&args[0])? {
            Some(z) => z,
            None => return Ok(RespValue::Array(Some(Vec::new()))),
        };
        let (a, b) = match normalize_range(start, stop, zset.len()) {
            Some(w) => w,
            None => return Ok(RespValue::Array(Some(Vec::new()))),
        };
        let take = b - a + 1;
        Ok(if reverse {
            reply_members(zset.iter().rev().skip(a).take(take), with_scores)
        } else {
            reply_members(zset.iter().skip(a).take(take), with_scores)
        })
    }

    /// ZRANGEBYSCORE key min max / ZREVRANGEBYSCORE key max min, each with
    /// [WITHSCORES] [LIMIT offset count]
    pub(super) fn zrange_by_score(&mut self, args: &[Bytes], reverse: bool) -> CmdResult {
        at_least(args, 3, if reverse { "zrevrangebyscore" } else { "zrangebyscore" })?;
        let (lo, hi) = if reverse { (&args[2], &args[1]) } else { (&args[1], &args[2]) };
        let (min, max) = (ScoreBound::parse(lo)?, ScoreBound::parse(hi)?);
        let (with_scores, offset, count) = range_options(&args[3..], true)?;
        let zset = match self.zset(&args[0])? {
            Some(z) => z,
            None => return Ok(RespValue::Array(Some(Vec::new()))),
        };
        let in_range = |&(_, s): &(&Bytes, f64)| min.above(s) && max.below(s);
        let limit = count.unwrap_or(usize::MAX);
        Ok(if reverse {
            reply_members(zset.iter().rev().filter(in_range).skip(offset).take(limit), with_scores)
        } else {
            reply_members(zset.iter().filter(in_range).skip(offset).take(limit), with_scores)
        })
    }

    /// ZRANGEBYLEX key min max / ZREVRANGEBYLEX key max min, with
    /// [LIMIT offset count]
    pub(super) fn zrange_by_lex(&mut self, args: &[Bytes], reverse: bool) -> CmdResult {
        at_least(args, 3, if reverse { "zrevrangebylex" } else { "zrangebylex" })?;
        let (lo, hi) = if reverse { (&args[2], &args[1]) } else { (&args[1], &args[2]) };
        let (min, max) = (LexBound::parse(lo)?, LexBound::parse(hi)?);
        let (_, offset, count) = range_options(&args[3..], false)?;
        let zset = match self.zset(&args[0])? {
            Some(z) => z,
            None => return Ok(RespValue::Array(Some(Vec::new()))),
        };
        let in_range = |&(m, _): &(&Bytes, f64)| min.above(m) && max.below(m);
        let limit = count.unwrap_or(usize::MAX);
        Ok(if reverse {
            reply_members(zset.iter().rev().filter(in_range).skip(offset).take(limit), false)
        } else {
            reply_members(zset.iter().filter(in_range).skip(offset).take(limit), false)
        })
    }

    pub(super) fn zrem(&mut self, args: &[Bytes]) -> CmdResult {
        at_least(args, 2, "zrem")?;
        let removed = match self.zset(&args[0])? {
            Some(z) => args[1..].iter().filter(|m| z.remove(m)).count(),
            None => 0,
        };
        if removed > 0 {
            self.modified(&args[0]);
        }
        Ok(RespValue::Integer(removed as i64))
    }

    fn zremove_where<F>(&mut self, key: &[u8], select: F) -> CmdResult
    where
        F: Fn(usize, &Bytes, f64) -> bool,
    {
        let removed = match self.zset(key)? {
            Some(z) => {
                let doomed: Vec<Bytes> = z
                    .iter()
                    .enumerate()
                    .filter(|(rank, (m, s))| select(*rank, m, *s))
                    .map(|(_, (m, _))| m.clone())
                    .collect();
                for m in &doomed {
                    z.remove(m);
                }
                doomed.len()
            }
            None => 0,
        };
        if removed > 0 {
            self.modified(key);
        }
        Ok(RespValue::Integer(removed as i64))
    }

    pub(super) fn zremrange_by_rank(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 3, "zremrangebyrank")?;
        let (start, stop) = (parse_int(&args[1])?, parse_int(&args[2])?);
        let len = self.zset(&args[0])?.map_or(0, |z| z.len());
        match normalize_range(start, stop, len) {
            Some((a, b)) => self.zremove_where(&args[0], |rank, _, _| rank >= a && rank <= b),
            None => Ok(RespValue::Integer(0)),
        }
    }

    pub(super) fn zremrange_by_score(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 3, "zremrangebyscore")?;
        let (min, max) = (ScoreBound::parse(&args[1])?, ScoreBound::parse(&args[2])?);
        self.zremove_where(&args[0], |_, _, s| min.above(s) && max.below(s))
    }

    pub(super) fn zremrange_by_lex(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 3, "zremrangebylex")?;
        let (min, max) = (LexBound::parse(&args[1])?, LexBound::parse(&args[2])?);
        self.zremove_where(&args[0], |_, m, _| min.above(m) && max.below(m))
    }

    /// ZPOPMIN / ZPOPMAX key [count]
    pub(super) fn zpop(&mut self, args: &[Bytes], highest: bool) -> CmdResult {
        if args.is_empty() || args.len() > 2 {
            return Err(arity_error(if highest { "zpopmax" } else { "zpopmin" }));
        }
        let count = match args.get(1) {
            Some(c) => parse_int(c)?.max(0) as usize,
            None => 1,
        };
        let popped: Vec<(Bytes, f64)> = match self.zset(&args[0])? {
            Some(z) => {
                let picked: Vec<(Bytes, f64)> = if highest {
                    z.iter().rev().take(count).map(|(m, s)| (m.clone(), s)).collect()
                } else {
                    z.iter().take(count).map(|(m, s)| (m.clone(), s)).collect()
                };
                for (m, _) in &picked {
                    z.remove(m);
                }
                picked
            }
            None => Vec::new(),
        };
        if !popped.is_empty() {
            self.modified(&args[0]);
        }
        Ok(reply_members(popped.iter().map(|(m, s)| (m, *s)), true))
    }

    /// ZINTERSTORE / ZUNIONSTORE dest numkeys key [key ...]
    /// [WEIGHTS w [w ...]] [AGGREGATE SUM|MIN|MAX]
    pub(super) fn zstore(&mut self, args: &[Bytes], union: bool) -> CmdResult {
        let name = if union { "zunionstore" } else { "zinterstore" };
        at_least(args, 3, name)?;
        let numkeys = parse_int(&args[1])?;
        if numkeys <= 0 {
            return Err(format!("ERR at least 1 input key is needed for '{}' command", name));
        }
        let numkeys = numkeys as usize;
        if args.len() < 2 + numkeys {
            return Err(syntax_error());
        }
        let sources = &args[2..2 + numkeys];
        let mut weights = vec![1.0; numkeys];
        let mut aggregate = Aggregate::Sum;
        let mut i = 2 + numkeys;
        while i < args.len() {
            if eq_ignore_case(&args[i], "WEIGHTS") && i + numkeys < args.len() {
                for (w, arg) in weights.iter_mut().zip(&args[i + 1..=i + numkeys]) {
                    *w = parse_float(arg).map_err(|_| "ERR weight value is not a float".to_string())?;
                }
                i += 1 + numkeys;
            } else if eq_ignore_case(&args[i], "AGGREGATE") && i + 1 < args.len() {
                aggregate = Aggregate::parse(&args[i + 1])?;
                i += 2;
            } else {
                return Err(syntax_error());
            }
        }

        let mut inputs = Vec::with_capacity(numkeys);
        for key in sources {
            inputs.push(self.weighted_members(key)?);
        }
        let mut acc: AHashMap<Bytes, f64> = AHashMap::new();
        for (idx, members) in inputs.iter().enumerate() {
            let weight = weights[idx];
            if !union && idx > 0 {
                acc.retain(|m, _| members.contains_key(m));
            }
            for (member, score) in members.iter() {
                let weighted = mul_score(*score, weight);
                if idx == 0 || union {
                    acc.entry(member.clone())
                        .and_modify(|cur| *cur = aggregate.combine(*cur, weighted))
                        .or_insert(weighted);
                } else if let Some(cur) = acc.get_mut(member) {
                    *cur = aggregate.combine(*cur, weighted);
                }
            }
        }
        let mut result = ZSet::default();
        for (member, score) in acc {
            result.insert(member, if score.is_nan() { 0.0 } else { score });
        }
        let len = result.len();
        self.put(&args[0], Data::ZSet(result));
        Ok(RespValue::Integer(len as i64))
    }

    /// Members of a sorted set (or a plain set, scored 1) at `key`.
    fn weighted_members(&mut self, key: &[u8]) -> Result<AHashMap<Bytes, f64>, String> {
        match self.entry_mut(key) {
            None => Ok(AHashMap::new()),
            Some(entry) => match &entry.data {
                Data::ZSet(z) => Ok(z.iter().map(|(m, s)| (m.clone(), s)).collect()),
                Data::Set(s) => Ok(s.iter().map(|m| (m.clone(), 1.0)).collect()),
                _ => Err(super::wrong_type()),
            },
        }
    }

    pub(super) fn zscan(&mut self, args: &[Bytes]) -> CmdResult {
        at_least(args, 2, "zscan")?;
        let items = self.zset(&args[0])?.map_or_else(Vec::new, |z| {
            z.iter()
                .map(|(m, s)| (m.clone(), Some(Bytes::from(format_float(s)))))
                .collect()
        });
        scan_page(items, &args[1..])
    }
}

/// `inf * 0` is defined as 0 here.
fn mul_score(score: f64, weight: f64) -> f64 {
    let product = score * weight;
    if product.is_nan() { 0.0 } else { product }
}

#[derive(Debug, Clone, Copy)]
enum Aggregate {
    Sum,
    Min,
    Max,
}

impl Aggregate {
    fn parse(arg: &[u8]) -> Result<Self, String> {
        if eq_ignore_case(arg, "SUM") {
            Ok(Aggregate::Sum)
        } else if eq_ignore_case(arg, "MIN") {
            Ok(Aggregate::Min)
        } else if eq_ignore_case(arg, "MAX") {
            Ok(Aggregate::Max)
        } else {
            Err(syntax_error())
        }
    }

    fn combine(self, a: f64, b: f64) -> f64 {
        match self {
            Aggregate::Sum => a + b,
            Aggregate::Min => a.min(b),
            Aggregate::Max => a.max(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::run;
    use super::super::MemoryStore;
    use crate::resp::RespValue;

    fn strings(reply: RespValue) -> Vec<String> {
        reply
            .into_values()
            .unwrap()
            .into_iter()
            .map(|v| v.to_string())
            .collect()
    }

    #[test]
    fn test_ties_break_lexicographically() {
        let store = MemoryStore::new();
        run(&store, &["ZADD", "z", "0", "c", "0", "a", "0", "b"]);
        assert_eq!(strings(run(&store, &["ZRANGEBYLEX", "z", "-", "+"])), vec!["a", "b", "c"]);
        assert_eq!(strings(run(&store, &["ZRANGEBYLEX", "z", "(a", "[c", "LIMIT", "0", "1"])), vec!["b"]);
        assert_eq!(strings(run(&store, &["ZREVRANGEBYLEX", "z", "+", "-"])), vec!["c", "b", "a"]);
        assert_eq!(run(&store, &["ZLEXCOUNT", "z", "[b", "+"]), RespValue::Integer(2));
    }

    #[test]
    fn test_ranks_scores_and_ranges() {
        let store = MemoryStore::new();
        assert_eq!(run(&store, &["ZADD", "z", "1", "one", "2", "two", "3", "three"]), RespValue::Integer(3));
        assert_eq!(run(&store, &["ZRANK", "z", "two"]), RespValue::Integer(1));
        assert_eq!(run(&store, &["ZREVRANK", "z", "two"]), RespValue::Integer(1));
        assert_eq!(run(&store, &["ZREVRANK", "z", "one"]), RespValue::Integer(2));
        assert_eq!(run(&store, &["ZRANK", "z", "nope"]), RespValue::null());
        assert_eq!(run(&store, &["ZSCORE", "z", "three"]), RespValue::bulk("3"));
        assert_eq!(
            strings(run(&store, &["ZRANGE", "z", "0", "-1", "WITHSCORES"])),
            vec!["one", "1", "two", "2", "three", "3"]
        );
        assert_eq!(strings(run(&store, &["ZREVRANGE", "z", "0", "0"])), vec!["three"]);
        assert_eq!(strings(run(&store, &["ZRANGEBYSCORE", "z", "(1", "+inf"])), vec!["two", "three"]);
        assert_eq!(
            strings(run(&store, &["ZREVRANGEBYSCORE", "z", "3", "1", "LIMIT", "1", "1"])),
            vec!["two"]
        );
        assert_eq!(run(&store, &["ZCOUNT", "z", "-inf", "(3"]), RespValue::Integer(2));
        assert_eq!(run(&store, &["ZINCRBY", "z", "2.5", "one"]), RespValue::bulk("3.5"));
        assert_eq!(strings(run(&store, &["ZPOPMAX", "z"])), vec!["one", "3.5"]);
        assert_eq!(strings(run(&store, &["ZPOPMIN", "z"])), vec!["two", "2"]);
    }

    #[test]
    fn test_zadd_flags() {
        let store = MemoryStore::new();
        run(&store, &["ZADD", "z", "1", "a"]);
        assert_eq!(run(&store, &["ZADD", "z", "NX", "5", "a", "1", "b"]), RespValue::Integer(1));
        assert_eq!(run(&store, &["ZSCORE", "z", "a"]), RespValue::bulk("1"));
        assert_eq!(run(&store, &["ZADD", "z", "XX", "CH", "5", "a", "1", "c"]), RespValue::Integer(1));
        assert_eq!(run(&store, &["ZCARD", "z"]), RespValue::Integer(2));
    }

    #[test]
    fn test_remove_ranges() {
        let store = MemoryStore::new();
        run(&store, &["ZADD", "z", "1", "a", "2", "b", "3", "c", "4", "d"]);
        assert_eq!(run(&store, &["ZREMRANGEBYRANK", "z", "0", "0"]), RespValue::Integer(1));
        assert_eq!(run(&store, &["ZREMRANGEBYSCORE", "z", "(2", "3"]), RespValue::Integer(1));
        assert_eq!(run(&store, &["ZREMRANGEBYLEX", "z", "[b", "[b"]), RespValue::Integer(1));
        assert_eq!(strings(run(&store, &["ZRANGE", "z", "0", "-1"])), vec!["d"]);
    }

    #[test]
    fn test_weighted_store() {
        let store = MemoryStore::new();
        run(&store, &["ZADD", "a", "1", "x", "2", "y"]);
        run(&store, &["ZADD", "b", "10", "y", "20", "z"]);
        assert_eq!(
            run(&store, &["ZUNIONSTORE", "u", "2", "a", "b", "WEIGHTS", "2", "1"]),
            RespValue::Integer(3)
        );
        assert_eq!(run(&store, &["ZSCORE", "u", "y"]), RespValue::bulk("14"));
        assert_eq!(
            run(&store, &["ZINTERSTORE", "i", "2", "a", "b", "AGGREGATE", "MAX"]),
            RespValue::Integer(1)
        );
        assert_eq!(run(&store, &["ZSCORE", "i", "y"]), RespValue::bulk("10"));
        run(&store, &["SADD", "plain", "x"]);
        assert_eq!(run(&store, &["ZINTERSTORE", "j", "2", "a", "plain"]), RespValue::Integer(1));
        assert_eq!(run(&store, &["ZSCORE", "j", "x"]), RespValue::bulk("2"));
    }
}
