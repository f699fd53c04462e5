//! Hash commands.

use super::{
    arity_error, at_least, bulk, bulk_array, exact, parse_float, parse_int, scan_page, CmdResult, Db,
};
use crate::resp::RespValue;
use crate::value::format_float;
use bytes::Bytes;

impl Db {
    pub(super) fn hget(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 2, "hget")?;
        Ok(match self.hash(&args[0])?.and_then(|h| h.get(&args[1])) {
            Some(v) => bulk(v.clone()),
            None => RespValue::null(),
        })
    }

    /// HSET returns the number of new fields; HMSET returns OK.
    pub(super) fn hset(&mut self, args: &[Bytes], legacy: bool) -> CmdResult {
        if args.len() < 3 || args.len() % 2 == 0 {
            return Err(arity_error(if legacy { "hmset" } else { "hset" }));
        }
        let hash = self.hash_or_create(&args[0])?;
        let added = args[1..]
            .chunks(2)
            .filter(|pair| hash.insert(pair[0].clone(), pair[1].clone()).is_none())
            .count();
        self.modified(&args[0]);
        Ok(if legacy {
            RespValue::ok()
        } else {
            RespValue::Integer(added as i64)
        })
    }

    pub(super) fn hsetnx(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 3, "hsetnx")?;
        let hash = self.hash_or_create(&args[0])?;
        if hash.contains_key(&args[1]) {
            return Ok(RespValue::Integer(0));
        }
        hash.insert(args[1].clone(), args[2].clone());
        self.modified(&args[0]);
        Ok(RespValue::Integer(1))
    }

    pub(super) fn hmget(&mut self, args: &[Bytes]) -> CmdResult {
        at_least(args, 2, "hmget")?;
        let hash = self.hash(&args[0])?;
        let values = args[1..]
            .iter()
            .map(|f| match hash.as_ref().and_then(|h| h.get(f)) {
                Some(v) => bulk(v.clone()),
                None => RespValue::null(),
            })
            .collect();
        Ok(RespValue::Array(Some(values)))
    }

    pub(super) fn hdel(&mut self, args: &[Bytes]) -> CmdResult {
        at_least(args, 2, "hdel")?;
        let removed = match self.hash(&args[0])? {
            Some(hash) => args[1..].iter().filter(|f| hash.remove(*f).is_some()).count(),
            None => 0,
        };
        if removed > 0 {
            self.modified(&args[0]);
        }
        Ok(RespValue::Integer(removed as i64))
    }

    pub(super) fn hexists(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 2, "hexists")?;
        let found = self.hash(&args[0])?.map_or(false, |h| h.contains_key(&args[1]));
        Ok(RespValue::Integer(found as i64))
    }

    pub(super) fn hlen(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 1, "hlen")?;
        Ok(RespValue::Integer(self.hash(&args[0])?.map_or(0, |h| h.len()) as i64))
    }

    pub(super) fn hkeys(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 1, "hkeys")?;
        let keys: Vec<Bytes> = self.hash(&args[0])?.map_or_else(Vec::new, |h| h.keys().cloned().collect());
        Ok(bulk_array(keys))
    }

    pub(super) fn hvals(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 1, "hvals")?;
        let vals: Vec<Bytes> = self.hash(&args[0])?.map_or_else(Vec::new, |h| h.values().cloned().collect());
        Ok(bulk_array(vals))
    }

    pub(super) fn hgetall(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 1, "hgetall")?;
        let flat: Vec<Bytes> = self.hash(&args[0])?.map_or_else(Vec::new, |h| {
            h.iter().flat_map(|(k, v)| [k.clone(), v.clone()]).collect()
        });
        Ok(bulk_array(flat))
    }

    pub(super) fn hincrby(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 3, "hincrby")?;
        let delta = parse_int(&args[2])?;
        let hash = self.hash_or_create(&args[0])?;
        let current = match hash.get(&args[1]) {
            Some(v) => parse_int(v).map_err(|_| "ERR hash value is not an integer".to_string())?,
            None => 0,
        };
        let next = current
            .checked_add(delta)
            .ok_or_else(|| "ERR increment or decrement would overflow".to_string())?;
        hash.insert(args[1].clone(), Bytes::from(next.to_string()));
        self.modified(&args[0]);
        Ok(RespValue::Integer(next))
    }

    pub(super) fn hincrbyfloat(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 3, "hincrbyfloat")?;
        let delta = parse_float(&args[2])?;
        let hash = self.hash_or_create(&args[0])?;
        let current = match hash.get(&args[1]) {
            Some(v) => parse_float(v).map_err(|_| "ERR hash value is not a float".to_string())?,
            None => 0.0,
        };
        let next = current + delta;
        if !next.is_finite() {
            return Err("ERR increment would produce NaN or Infinity".to_string());
        }
        let text = format_float(next);
        hash.insert(args[1].clone(), Bytes::from(text.clone()));
        self.modified(&args[0]);
        Ok(bulk(text))
    }

    pub(super) fn hstrlen(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 2, "hstrlen")?;
        let len = self
            .hash(&args[0])?
            .and_then(|h| h.get(&args[1]))
            .map_or(0, |v| v.len());
        Ok(RespValue::Integer(len as i64))
    }

    /// HSCAN key cursor [MATCH pattern] [COUNT n]
    pub(super) fn hscan(&mut self, args: &[Bytes]) -> CmdResult {
        at_least(args, 2, "hscan")?;
        let items = self.hash(&args[0])?.map_or_else(Vec::new, |h| {
            h.iter().map(|(k, v)| (k.clone(), Some(v.clone()))).collect()
        });
        scan_page(items, &args[1..])
    }
}
