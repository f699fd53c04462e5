//! String and bitmap commands.

use super::{
    arity_error, at_least, bulk, eq_ignore_case, exact, not_integer, now_ms, parse_float,
    parse_int, syntax_error, CmdResult, Data, Db,
};
use crate::resp::RespValue;
use crate::value::format_float;
use bytes::Bytes;

/// Clamps a byte range with negative offsets (GETRANGE / BITCOUNT rules).
fn byte_window(start: i64, end: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let mut start = if start < 0 { start + len } else { start };
    let mut end = if end < 0 { end + len } else { end };
    start = start.max(0);
    end = end.max(0).min(len - 1);
    if len == 0 || start > end {
        None
    } else {
        Some((start as usize, end as usize))
    }
}

impl Db {
    fn read_string(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, String> {
        Ok(self.string(key)?.map(|s| s.clone()))
    }

    pub(super) fn get(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 1, "get")?;
        Ok(match self.string(&args[0])? {
            Some(s) => bulk(s.clone()),
            None => RespValue::null(),
        })
    }

    /// SET key value [EX s | PX ms] [NX | XX] [KEEPTTL]
    pub(super) fn set(&mut self, args: &[Bytes]) -> CmdResult {
        at_least(args, 2, "set")?;
        let mut expires_at = None;
        let mut nx = false;
        let mut xx = false;
        let mut keep_ttl = false;
        let mut i = 2;
        while i < args.len() {
            let opt = &args[i];
            if eq_ignore_case(opt, "NX") {
                nx = true;
            } else if eq_ignore_case(opt, "XX") {
                xx = true;
            } else if eq_ignore_case(opt, "KEEPTTL") {
                keep_ttl = true;
            } else if (eq_ignore_case(opt, "EX") || eq_ignore_case(opt, "PX")) && i + 1 < args.len() {
                let amount = parse_int(&args[i + 1])?;
                if amount <= 0 {
                    return Err("ERR invalid expire time in 'set' command".to_string());
                }
                let unit = if eq_ignore_case(opt, "EX") { 1000 } else { 1 };
                expires_at = Some(now_ms() + amount * unit);
                i += 1;
            } else {
                return Err(syntax_error());
            }
            i += 1;
        }
        if (nx && xx) || (keep_ttl && expires_at.is_some()) {
            return Err(syntax_error());
        }
        let key = &args[0];
        let exists = self.exists(key);
        if (nx && exists) || (xx && !exists) {
            return Ok(RespValue::null());
        }
        let previous_ttl = if keep_ttl {
            self.peek(key).and_then(|e| e.expires_at)
        } else {
            None
        };
        self.put(key, Data::Str(args[1].to_vec()));
        if let Some(entry) = self.entry_mut(key) {
            entry.expires_at = expires_at.or(previous_ttl);
        }
        Ok(RespValue::ok())
    }

    pub(super) fn setnx(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 2, "setnx")?;
        if self.exists(&args[0]) {
            return Ok(RespValue::Integer(0));
        }
        self.put(&args[0], Data::Str(args[1].to_vec()));
        Ok(RespValue::Integer(1))
    }

    pub(super) fn getset(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 2, "getset")?;
        let old = self.read_string(&args[0])?;
        self.put(&args[0], Data::Str(args[1].to_vec()));
        Ok(old.map_or_else(RespValue::null, bulk))
    }

    pub(super) fn append(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 2, "append")?;
        let s = self.string_or_create(&args[0])?;
        s.extend_from_slice(&args[1]);
        let len = s.len();
        self.modified(&args[0]);
        Ok(RespValue::Integer(len as i64))
    }

    pub(super) fn strlen(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 1, "strlen")?;
        let len = self.string(&args[0])?.map_or(0, |s| s.len());
        Ok(RespValue::Integer(len as i64))
    }

    pub(super) fn getrange(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 3, "getrange")?;
        let (start, end) = (parse_int(&args[1])?, parse_int(&args[2])?);
        let s = self.read_string(&args[0])?.unwrap_or_default();
        Ok(match byte_window(start, end, s.len()) {
            Some((a, b)) => bulk(s[a..=b].to_vec()),
            None => bulk(Bytes::new()),
        })
    }

    pub(super) fn setrange(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 3, "setrange")?;
        let offset = parse_int(&args[1])?;
        if offset < 0 {
            return Err("ERR offset is out of range".to_string());
        }
        let offset = offset as usize;
        let value = &args[2];
        if value.is_empty() {
            let len = self.string(&args[0])?.map_or(0, |s| s.len());
            return Ok(RespValue::Integer(len as i64));
        }
        let s = self.string_or_create(&args[0])?;
        if s.len() < offset + value.len() {
            s.resize(offset + value.len(), 0);
        }
        s[offset..offset + value.len()].copy_from_slice(value);
        let len = s.len();
        self.modified(&args[0]);
        Ok(RespValue::Integer(len as i64))
    }

    /// INCR / DECR / INCRBY / DECRBY. `sign` is applied to the parsed amount.
    pub(super) fn incr_by(&mut self, args: &[Bytes], sign: i64, with_amount: bool, name: &str) -> CmdResult {
        exact(args, if with_amount { 2 } else { 1 }, name)?;
        let amount = if with_amount { parse_int(&args[1])? } else { 1 };
        let delta = amount.checked_mul(sign).ok_or_else(not_integer)?;
        let current = match self.string(&args[0])? {
            Some(s) => parse_int(s)?,
            None => 0,
        };
        let next = current
            .checked_add(delta)
            .ok_or_else(|| "ERR increment or decrement would overflow".to_string())?;
        let s = self.string_or_create(&args[0])?;
        *s = next.to_string().into_bytes();
        self.modified(&args[0]);
        Ok(RespValue::Integer(next))
    }

    pub(super) fn incr_by_float(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 2, "incrbyfloat")?;
        let delta = parse_float(&args[1])?;
        let current = match self.string(&args[0])? {
            Some(s) => parse_float(s)?,
            None => 0.0,
        };
        let next = current + delta;
        if !next.is_finite() {
            return Err("ERR increment would produce NaN or Infinity".to_string());
        }
        let text = format_float(next);
        let s = self.string_or_create(&args[0])?;
        *s = text.clone().into_bytes();
        self.modified(&args[0]);
        Ok(bulk(text))
    }

    pub(super) fn mget(&mut self, args: &[Bytes]) -> CmdResult {
        at_least(args, 1, "mget")?;
        let values = args
            .iter()
            .map(|k| match self.string(k) {
                Ok(Some(s)) => bulk(s.clone()),
                _ => RespValue::null(),
            })
            .collect();
        Ok(RespValue::Array(Some(values)))
    }

    pub(super) fn mset(&mut self, args: &[Bytes]) -> CmdResult {
        if args.is_empty() || args.len() % 2 != 0 {
            return Err(arity_error("mset"));
        }
        for pair in args.chunks(2) {
            self.put(&pair[0], Data::Str(pair[1].to_vec()));
        }
        Ok(RespValue::ok())
    }

    pub(super) fn msetnx(&mut self, args: &[Bytes]) -> CmdResult {
        if args.is_empty() || args.len() % 2 != 0 {
            return Err(arity_error("msetnx"));
        }
        if args.chunks(2).any(|pair| self.exists(&pair[0])) {
            return Ok(RespValue::Integer(0));
        }
        for pair in args.chunks(2) {
            self.put(&pair[0], Data::Str(pair[1].to_vec()));
        }
        Ok(RespValue::Integer(1))
    }

    // ------------------------------------------------------------------------
    // Bits. Bit 0 is the most significant bit of byte 0.
    // ------------------------------------------------------------------------

    pub(super) fn setbit(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 3, "setbit")?;
        let offset = parse_int(&args[1])?;
        if !(0..(1i64 << 32)).contains(&offset) {
            return Err("ERR bit offset is not an integer or out of range".to_string());
        }
        let on = match &args[2][..] {
            b"1" => true,
            b"0" => false,
            _ => return Err("ERR bit is not an integer or out of range".to_string()),
        };
        let offset = offset as usize;
        let (byte, mask) = (offset / 8, 0x80u8 >> (offset % 8));
        let s = self.string_or_create(&args[0])?;
        if s.len() <= byte {
            s.resize(byte + 1, 0);
        }
        let old = s[byte] & mask != 0;
        if on {
            s[byte] |= mask;
        } else {
            s[byte] &= !mask;
        }
        self.modified(&args[0]);
        Ok(RespValue::Integer(old as i64))
    }

    pub(super) fn getbit(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 2, "getbit")?;
        let offset = parse_int(&args[1])?;
        if offset < 0 {
            return Err("ERR bit offset is not an integer or out of range".to_string());
        }
        let offset = offset as usize;
        let bit = match self.string(&args[0])? {
            Some(s) => s.get(offset / 8).map_or(0, |b| (b >> (7 - offset % 8)) & 1),
            None => 0,
        };
        Ok(RespValue::Integer(bit as i64))
    }

    pub(super) fn bitcount(&mut self, args: &[Bytes]) -> CmdResult {
        if args.len() != 1 && args.len() != 3 {
            return Err(arity_error("bitcount"));
        }
        let s = self.read_string(&args[0])?.unwrap_or_default();
        let window = if args.len() == 3 {
            byte_window(parse_int(&args[1])?, parse_int(&args[2])?, s.len())
        } else if s.is_empty() {
            None
        } else {
            Some((0, s.len() - 1))
        };
        let count = window.map_or(0, |(a, b)| s[a..=b].iter().map(|b| b.count_ones()).sum::<u32>());
        Ok(RespValue::Integer(count as i64))
    }

    /// BITPOS key bit [start [end]]
    pub(super) fn bitpos(&mut self, args: &[Bytes]) -> CmdResult {
        if !(2..=4).contains(&args.len()) {
            return Err(arity_error("bitpos"));
        }
        let want = match &args[1][..] {
            b"1" => 1u8,
            b"0" => 0u8,
            _ => return Err("ERR The bit argument must be 1 or 0.".to_string()),
        };
        let s = match self.read_string(&args[0])? {
            Some(s) => s,
            None => return Ok(RespValue::Integer(if want == 1 { -1 } else { 0 })),
        };
        let start = if args.len() >= 3 { parse_int(&args[2])? } else { 0 };
        let end_given = args.len() == 4;
        let end = if end_given { parse_int(&args[3])? } else { -1 };
        let (a, b) = match byte_window(start, end, s.len()) {
            Some(w) => w,
            None => return Ok(RespValue::Integer(-1)),
        };
        for (i, byte) in s[a..=b].iter().enumerate() {
            for bit in 0..8 {
                if (byte >> (7 - bit)) & 1 == want {
                    return Ok(RespValue::Integer(((a + i) * 8 + bit) as i64));
                }
            }
        }
        // Looking for a clear bit with no explicit end: the string is treated
        // as padded with zeros on the right.
        if want == 0 && !end_given {
            return Ok(RespValue::Integer(((b + 1) * 8) as i64));
        }
        Ok(RespValue::Integer(-1))
    }

    /// BITOP AND|OR|XOR|NOT destkey key [key ...]
    pub(super) fn bitop(&mut self, args: &[Bytes]) -> CmdResult {
        at_least(args, 3, "bitop")?;
        let op = args[0].to_ascii_uppercase();
        let sources = &args[2..];
        let mut inputs = Vec::with_capacity(sources.len());
        for key in sources {
            inputs.push(self.read_string(key)?.unwrap_or_default());
        }
        let len = inputs.iter().map(Vec::len).max().unwrap_or(0);
        let byte_at = |v: &Vec<u8>, i: usize| v.get(i).copied().unwrap_or(0);
        let result: Vec<u8> = match &op[..] {
            b"NOT" => {
                if inputs.len() != 1 {
                    return Err("ERR BITOP NOT must be called with a single source key.".to_string());
                }
                inputs[0].iter().map(|b| !b).collect()
            }
            b"AND" => (0..len).map(|i| inputs.iter().fold(0xff, |acc, v| acc & byte_at(v, i))).collect(),
            b"OR" => (0..len).map(|i| inputs.iter().fold(0, |acc, v| acc | byte_at(v, i))).collect(),
            b"XOR" => (0..len).map(|i| inputs.iter().fold(0, |acc, v| acc ^ byte_at(v, i))).collect(),
            _ => return Err(syntax_error()),
        };
        let stored = result.len();
        if result.is_empty() {
            self.remove(&args[1]);
        } else {
            self.put(&args[1], Data::Str(result));
        }
        Ok(RespValue::Integer(stored as i64))
    }
}
