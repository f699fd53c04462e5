//! In-Memory Store
//!
//! A single-database, in-process store that speaks the same command set the
//! key objects issue. Every command runs under one write lock, so a
//! transaction is atomic simply by holding the lock for its whole length.
//!
//! Keys expire lazily when touched, and [`MemoryStore::evict_expired`] sweeps
//! the rest. Every write stamps the entry with a fresh version that
//! WATCH-style transactions compare against. Absent keys share one version,
//! the clock of the latest removal, so nothing is kept for deleted keys.

mod hashes;
mod keyspace;
mod lists;
mod sets;
mod sort;
mod strings;
mod zsets;

use crate::command::{Command, Condition};
use crate::error::Result;
use crate::executor::{check_reply, Executor};
use crate::resp::RespValue;
use ahash::{AHashMap, AHashSet};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

pub(crate) use zsets::ZSet;

/// Handler outcome: a reply, or the text of an error reply.
pub(crate) type CmdResult = std::result::Result<RespValue, String>;

pub(crate) fn wrong_type() -> String {
    "WRONGTYPE Operation against a key holding the wrong kind of value".to_string()
}

pub(crate) fn syntax_error() -> String {
    "ERR syntax error".to_string()
}

pub(crate) fn not_integer() -> String {
    "ERR value is not an integer or out of range".to_string()
}

pub(crate) fn not_float() -> String {
    "ERR value is not a valid float".to_string()
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ============================================================================
// Stored data
// ============================================================================

#[derive(Debug, Clone)]
pub(crate) enum Data {
    Str(Vec<u8>),
    Hash(AHashMap<Bytes, Bytes>),
    List(VecDeque<Bytes>),
    Set(AHashSet<Bytes>),
    ZSet(ZSet),
}

impl Data {
    fn type_name(&self) -> &'static str {
        match self {
            Data::Str(_) => "string",
            Data::Hash(_) => "hash",
            Data::List(_) => "list",
            Data::Set(_) => "set",
            Data::ZSet(_) => "zset",
        }
    }

    /// Aggregates disappear once their last element is removed.
    fn is_empty_aggregate(&self) -> bool {
        match self {
            Data::Str(_) => false,
            Data::Hash(h) => h.is_empty(),
            Data::List(l) => l.is_empty(),
            Data::Set(s) => s.is_empty(),
            Data::ZSet(z) => z.is_empty(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) data: Data,
    /// Absolute expiry, Unix milliseconds.
    pub(crate) expires_at: Option<i64>,
    pub(crate) last_access: Instant,
    version: u64,
}

impl Entry {
    fn new(data: Data, version: u64) -> Self {
        Entry {
            data,
            expires_at: None,
            last_access: Instant::now(),
            version,
        }
    }

    fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

macro_rules! typed_access {
    ($get:ident, $get_or_create:ident, $variant:ident, $ty:ty) => {
        pub(crate) fn $get(&mut self, key: &[u8]) -> std::result::Result<Option<&mut $ty>, String> {
            match self.entry_mut(key) {
                None => Ok(None),
                Some(Entry { data: Data::$variant(v), .. }) => Ok(Some(v)),
                Some(_) => Err(wrong_type()),
            }
        }

        pub(crate) fn $get_or_create(&mut self, key: &[u8]) -> std::result::Result<&mut $ty, String> {
            self.expire_if_due(key);
            let clock = &mut self.clock;
            let entry = self
                .entries
                .entry(Bytes::copy_from_slice(key))
                .or_insert_with(|| {
                    *clock += 1;
                    Entry::new(Data::$variant(Default::default()), *clock)
                });
            entry.last_access = Instant::now();
            match &mut entry.data {
                Data::$variant(v) => Ok(v),
                _ => Err(wrong_type()),
            }
        }
    };
}

// ============================================================================
// Database
// ============================================================================

#[derive(Debug, Default)]
pub(crate) struct Db {
    entries: AHashMap<Bytes, Entry>,
    clock: u64,
    /// Version reported for every absent key.
    removed_at: u64,
}

impl Db {
    fn expire_if_due(&mut self, key: &[u8]) {
        let expired = self
            .entries
            .get(key)
            .map_or(false, |e| e.is_expired(now_ms()));
        if expired {
            self.entries.remove(key);
            self.bump(key);
        }
    }

    /// Live entry, marked as accessed.
    pub(crate) fn entry_mut(&mut self, key: &[u8]) -> Option<&mut Entry> {
        self.expire_if_due(key);
        let entry = self.entries.get_mut(key)?;
        entry.last_access = Instant::now();
        Some(entry)
    }

    /// Live entry without touching its access time.
    pub(crate) fn peek(&mut self, key: &[u8]) -> Option<&Entry> {
        self.expire_if_due(key);
        self.entries.get(key)
    }

    pub(crate) fn exists(&mut self, key: &[u8]) -> bool {
        self.peek(key).is_some()
    }

    /// Stamps `key` with the next version. Call after the entry was
    /// written or removed.
    pub(crate) fn bump(&mut self, key: &[u8]) {
        self.clock += 1;
        match self.entries.get_mut(key) {
            Some(entry) => entry.version = self.clock,
            None => self.removed_at = self.clock,
        }
    }

    pub(crate) fn version(&mut self, key: &[u8]) -> u64 {
        self.expire_if_due(key);
        self.entries.get(key).map_or(self.removed_at, |e| e.version)
    }

    /// Records a write to `key`, dropping it if it became an empty aggregate.
    pub(crate) fn modified(&mut self, key: &[u8]) {
        if self
            .entries
            .get(key)
            .map_or(false, |e| e.data.is_empty_aggregate())
        {
            self.entries.remove(key);
        }
        self.bump(key);
    }

    /// Replaces whatever is stored at `key`; any TTL is cleared.
    pub(crate) fn put(&mut self, key: &[u8], data: Data) {
        if data.is_empty_aggregate() {
            self.entries.remove(key);
        } else {
            self.entries
                .insert(Bytes::copy_from_slice(key), Entry::new(data, 0));
        }
        self.bump(key);
    }

    pub(crate) fn remove(&mut self, key: &[u8]) -> bool {
        self.expire_if_due(key);
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.bump(key);
        }
        removed
    }

    pub(crate) fn keys(&mut self) -> Vec<Bytes> {
        let now = now_ms();
        self.entries
            .iter()
            .filter(|(_, e)| !e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn evict_expired(&mut self) -> usize {
        let now = now_ms();
        let expired: Vec<Bytes> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            self.entries.remove(key);
            self.bump(key);
        }
        expired.len()
    }

    fn flush(&mut self) {
        self.entries.clear();
        self.clock += 1;
        self.removed_at = self.clock;
    }

    typed_access!(string, string_or_create, Str, Vec<u8>);
    typed_access!(hash, hash_or_create, Hash, AHashMap<Bytes, Bytes>);
    typed_access!(list, list_or_create, List, VecDeque<Bytes>);
    typed_access!(set_data, set_data_or_create, Set, AHashSet<Bytes>);
    typed_access!(zset, zset_or_create, ZSet, ZSet);

    pub(crate) fn dispatch(&mut self, cmd: &Command) -> RespValue {
        let a = cmd.args();
        let result = match cmd.name() {
            // keyspace
            "PING" => keyspace::ping(a),
            "ECHO" => exact(a, 1, "echo").map(|_| RespValue::BulkString(Some(a[0].clone()))),
            "DEL" | "UNLINK" => self.del(a),
            "EXISTS" => self.exists_cmd(a),
            "TYPE" => self.type_cmd(a),
            "TTL" => self.ttl(a, 1000),
            "PTTL" => self.ttl(a, 1),
            "EXPIRE" => self.expire(a, 1000, false),
            "PEXPIRE" => self.expire(a, 1, false),
            "EXPIREAT" => self.expire(a, 1000, true),
            "PEXPIREAT" => self.expire(a, 1, true),
            "PERSIST" => self.persist(a),
            "OBJECT" => self.object(a),
            "KEYS" => self.keys_cmd(a),
            "DBSIZE" => Ok(RespValue::Integer(self.keys().len() as i64)),
            "FLUSHDB" | "FLUSHALL" => {
                self.flush();
                Ok(RespValue::ok())
            }
            // strings and bits
            "GET" => self.get(a),
            "SET" => self.set(a),
            "SETNX" => self.setnx(a),
            "GETSET" => self.getset(a),
            "APPEND" => self.append(a),
            "STRLEN" => self.strlen(a),
            "GETRANGE" | "SUBSTR" => self.getrange(a),
            "SETRANGE" => self.setrange(a),
            "INCR" => self.incr_by(a, 1, false, "incr"),
            "DECR" => self.incr_by(a, -1, false, "decr"),
            "INCRBY" => self.incr_by(a, 1, true, "incrby"),
            "DECRBY" => self.incr_by(a, -1, true, "decrby"),
            "INCRBYFLOAT" => self.incr_by_float(a),
            "MGET" => self.mget(a),
            "MSET" => self.mset(a),
            "MSETNX" => self.msetnx(a),
            "SETBIT" => self.setbit(a),
            "GETBIT" => self.getbit(a),
            "BITCOUNT" => self.bitcount(a),
            "BITPOS" => self.bitpos(a),
            "BITOP" => self.bitop(a),
            // hashes
            "HGET" => self.hget(a),
            "HSET" | "HMSET" => self.hset(a, cmd.name() == "HMSET"),
            "HSETNX" => self.hsetnx(a),
            "HMGET" => self.hmget(a),
            "HDEL" => self.hdel(a),
            "HEXISTS" => self.hexists(a),
            "HLEN" => self.hlen(a),
            "HKEYS" => self.hkeys(a),
            "HVALS" => self.hvals(a),
            "HGETALL" => self.hgetall(a),
            "HINCRBY" => self.hincrby(a),
            "HINCRBYFLOAT" => self.hincrbyfloat(a),
            "HSTRLEN" => self.hstrlen(a),
            "HSCAN" => self.hscan(a),
            // lists
            "LPUSH" => self.push(a, true, "lpush"),
            "RPUSH" => self.push(a, false, "rpush"),
            "LPOP" => self.pop(a, true, "lpop"),
            "RPOP" => self.pop(a, false, "rpop"),
            "LLEN" => self.llen(a),
            "LINDEX" => self.lindex(a),
            "LSET" => self.lset(a),
            "LINSERT" => self.linsert(a),
            "LRANGE" => self.lrange(a),
            "LTRIM" => self.ltrim(a),
            "LREM" => self.lrem(a),
            "RPOPLPUSH" => self.rpoplpush(a),
            // sets
            "SADD" => self.sadd(a),
            "SREM" => self.srem(a),
            "SCARD" => self.scard(a),
            "SISMEMBER" => self.sismember(a),
            "SMEMBERS" => self.smembers(a),
            "SPOP" => self.spop(a),
            "SRANDMEMBER" => self.srandmember(a),
            "SMOVE" => self.smove(a),
            "SDIFF" => self.set_algebra(a, sets::Algebra::Difference, false),
            "SINTER" => self.set_algebra(a, sets::Algebra::Intersect, false),
            "SUNION" => self.set_algebra(a, sets::Algebra::Union, false),
            "SDIFFSTORE" => self.set_algebra(a, sets::Algebra::Difference, true),
            "SINTERSTORE" => self.set_algebra(a, sets::Algebra::Intersect, true),
            "SUNIONSTORE" => self.set_algebra(a, sets::Algebra::Union, true),
            "SSCAN" => self.sscan(a),
            // sorted sets
            "ZADD" => self.zadd(a),
            "ZCARD" => self.zcard(a),
            "ZCOUNT" => self.zcount(a),
            "ZLEXCOUNT" => self.zlexcount(a),
            "ZSCORE" => self.zscore(a),
            "ZINCRBY" => self.zincrby(a),
            "ZRANK" => self.zrank(a, false),
            "ZREVRANK" => self.zrank(a, true),
            "ZRANGE" => self.zrange(a, false),
            "ZREVRANGE" => self.zrange(a, true),
            "ZRANGEBYSCORE" => self.zrange_by_score(a, false),
            "ZREVRANGEBYSCORE" => self.zrange_by_score(a, true),
            "ZRANGEBYLEX" => self.zrange_by_lex(a, false),
            "ZREVRANGEBYLEX" => self.zrange_by_lex(a, true),
            "ZREM" => self.zrem(a),
            "ZREMRANGEBYRANK" => self.zremrange_by_rank(a),
            "ZREMRANGEBYSCORE" => self.zremrange_by_score(a),
            "ZREMRANGEBYLEX" => self.zremrange_by_lex(a),
            "ZPOPMIN" => self.zpop(a, false),
            "ZPOPMAX" => self.zpop(a, true),
            "ZINTERSTORE" => self.zstore(a, false),
            "ZUNIONSTORE" => self.zstore(a, true),
            "ZSCAN" => self.zscan(a),
            // generic
            "SORT" => self.sort(a),
            other => Err(format!("ERR unknown command '{}'", other.to_ascii_lowercase())),
        };
        result.unwrap_or_else(RespValue::Error)
    }
}

// ============================================================================
// Argument helpers
// ============================================================================

pub(crate) fn arity_error(name: &str) -> String {
    format!("ERR wrong number of arguments for '{}' command", name)
}

pub(crate) fn exact(args: &[Bytes], n: usize, name: &str) -> std::result::Result<(), String> {
    if args.len() == n {
        Ok(())
    } else {
        Err(arity_error(name))
    }
}

pub(crate) fn at_least(args: &[Bytes], n: usize, name: &str) -> std::result::Result<(), String> {
    if args.len() >= n {
        Ok(())
    } else {
        Err(arity_error(name))
    }
}

pub(crate) fn parse_int(arg: &[u8]) -> std::result::Result<i64, String> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(not_integer)
}

pub(crate) fn parse_float(arg: &[u8]) -> std::result::Result<f64, String> {
    let s = std::str::from_utf8(arg).map_err(|_| not_float())?;
    let f = match s.to_ascii_lowercase().as_str() {
        "inf" | "+inf" | "infinity" | "+infinity" => f64::INFINITY,
        "-inf" | "-infinity" => f64::NEG_INFINITY,
        other => other.parse::<f64>().map_err(|_| not_float())?,
    };
    if f.is_nan() {
        return Err(not_float());
    }
    Ok(f)
}

pub(crate) fn eq_ignore_case(arg: &[u8], word: &str) -> bool {
    arg.eq_ignore_ascii_case(word.as_bytes())
}

/// Resolves an inclusive `[start, stop]` window with negative indices
/// counting from the end. `None` when the window is empty.
pub(crate) fn normalize_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (start + len).max(0) } else { start };
    let stop = if stop < 0 { stop + len } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len || stop < 0 {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

pub(crate) fn bulk(data: impl Into<Bytes>) -> RespValue {
    RespValue::BulkString(Some(data.into()))
}

pub(crate) fn bulk_array<I>(items: I) -> RespValue
where
    I: IntoIterator<Item = Bytes>,
{
    RespValue::Array(Some(items.into_iter().map(|b| RespValue::BulkString(Some(b))).collect()))
}

/// Cursor-based scan over a sorted snapshot of `items`.
pub(crate) fn scan_page(
    mut items: Vec<(Bytes, Option<Bytes>)>,
    args: &[Bytes],
) -> CmdResult {
    let cursor = args
        .first()
        .map(|c| parse_int(c))
        .transpose()
        .map_err(|_| "ERR invalid cursor".to_string())?
        .unwrap_or(0)
        .max(0) as usize;
    let mut pattern: Option<&[u8]> = None;
    let mut count = 10usize;
    let mut i = 1;
    while i < args.len() {
        if eq_ignore_case(&args[i], "MATCH") && i + 1 < args.len() {
            pattern = Some(&args[i + 1][..]);
            i += 2;
        } else if eq_ignore_case(&args[i], "COUNT") && i + 1 < args.len() {
            count = parse_int(&args[i + 1])?.max(1) as usize;
            i += 2;
        } else {
            return Err(syntax_error());
        }
    }
    items.sort_by(|a, b| a.0.cmp(&b.0));
    let end = (cursor + count).min(items.len());
    let mut out = Vec::new();
    for (key, value) in items.iter().skip(cursor).take(end.saturating_sub(cursor)) {
        if pattern.map_or(true, |p| glob_match(p, key)) {
            out.push(RespValue::BulkString(Some(key.clone())));
            if let Some(v) = value {
                out.push(RespValue::BulkString(Some(v.clone())));
            }
        }
    }
    let next = if end >= items.len() { 0 } else { end };
    Ok(RespValue::Array(Some(vec![
        bulk(next.to_string()),
        RespValue::Array(Some(out)),
    ])))
}

/// Glob-style matching: `*`, `?`, `[...]` classes and `\` escapes.
pub(crate) fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() {
            match pattern[p] {
                b'*' => {
                    star = Some((p, t));
                    p += 1;
                    continue;
                }
                b'?' => {
                    p += 1;
                    t += 1;
                    continue;
                }
                b'[' => {
                    if let Some((matched, next)) = match_class(pattern, p, text[t]) {
                        if matched {
                            p = next;
                            t += 1;
                            continue;
                        }
                    }
                }
                b'\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == text[t] {
                        p += 2;
                        t += 1;
                        continue;
                    }
                }
                c => {
                    if c == text[t] {
                        p += 1;
                        t += 1;
                        continue;
                    }
                }
            }
        }
        match star {
            Some((sp, st)) => {
                p = sp + 1;
                t = st + 1;
                star = Some((sp, st + 1));
            }
            None => return false,
        }
    }
    pattern[p..].iter().all(|&c| c == b'*')
}

fn match_class(pattern: &[u8], start: usize, c: u8) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = pattern.get(i) == Some(&b'^');
    if negate {
        i += 1;
    }
    let mut matched = false;
    while i < pattern.len() && pattern[i] != b']' {
        if pattern[i] == b'\\' && i + 1 < pattern.len() {
            matched |= pattern[i + 1] == c;
            i += 2;
        } else if i + 2 < pattern.len() && pattern[i + 1] == b'-' && pattern[i + 2] != b']' {
            let (lo, hi) = (pattern[i].min(pattern[i + 2]), pattern[i].max(pattern[i + 2]));
            matched |= lo <= c && c <= hi;
            i += 3;
        } else {
            matched |= pattern[i] == c;
            i += 1;
        }
    }
    if i >= pattern.len() {
        return None;
    }
    Some((matched != negate, i + 1))
}

// ============================================================================
// Store handle
// ============================================================================

/// Cloneable handle to one in-memory database.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    db: Arc<RwLock<Db>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one command and returns the raw reply (error replies included).
    pub fn apply(&self, cmd: &Command) -> RespValue {
        trace!(command = %cmd, "memory store command");
        self.db.write().dispatch(cmd)
    }

    /// Runs every command under one lock.
    pub fn apply_all(&self, cmds: &[Command]) -> Vec<RespValue> {
        trace!(commands = cmds.len(), "memory store pipeline");
        let mut db = self.db.write();
        cmds.iter().map(|c| db.dispatch(c)).collect()
    }

    /// Current version of `key`; any write to it changes the value.
    pub fn version(&self, key: &[u8]) -> u64 {
        self.db.write().version(key)
    }

    /// Applies `cmds` atomically unless one of the watched keys changed
    /// version since it was observed.
    pub fn apply_if_unchanged(
        &self,
        watched: &[(Bytes, u64)],
        cmds: &[Command],
    ) -> Option<Vec<RespValue>> {
        let mut db = self.db.write();
        if watched.iter().any(|(key, seen)| db.version(key) != *seen) {
            return None;
        }
        Some(cmds.iter().map(|c| db.dispatch(c)).collect())
    }

    pub fn with_lock<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut MemoryStoreGuard<'_>) -> R,
    {
        let mut db = self.db.write();
        let mut guard = MemoryStoreGuard { db: &mut *db };
        f(&mut guard)
    }

    /// Removes every expired key, returning how many went.
    pub fn evict_expired(&self) -> usize {
        self.db.write().evict_expired()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.db.write().keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Locked view used to run several commands without interleaving.
pub struct MemoryStoreGuard<'a> {
    db: &'a mut Db,
}

impl MemoryStoreGuard<'_> {
    pub fn apply(&mut self, cmd: &Command) -> RespValue {
        self.db.dispatch(cmd)
    }

    pub fn version(&mut self, key: &[u8]) -> u64 {
        self.db.version(key)
    }
}

#[async_trait]
impl Executor for MemoryStore {
    async fn execute(&self, cmd: Command) -> Result<RespValue> {
        check_reply(self.apply(&cmd))
    }

    async fn pipeline(&self, cmds: Vec<Command>) -> Result<Vec<Result<RespValue>>> {
        Ok(self.apply_all(&cmds).into_iter().map(check_reply).collect())
    }

    async fn transaction(
        &self,
        conditions: Vec<Condition>,
        cmds: Vec<Command>,
    ) -> Result<Option<Vec<Result<RespValue>>>> {
        self.with_lock(|db| {
            for condition in &conditions {
                let reply = db.apply(&condition.check_command());
                if !condition.holds(&reply) {
                    trace!(key = condition.key(), "precondition failed");
                    return Ok(None);
                }
            }
            Ok(Some(cmds.iter().map(|c| check_reply(db.apply(c))).collect()))
        })
    }
}
