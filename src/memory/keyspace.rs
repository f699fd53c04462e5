//! Key-level commands: existence, deletion, expiry, idle time.

use super::{at_least, bulk, bulk_array, exact, glob_match, now_ms, parse_int, CmdResult, Db};
use crate::resp::RespValue;
use bytes::Bytes;

pub(super) fn ping(args: &[Bytes]) -> CmdResult {
    match args {
        [] => Ok(RespValue::SimpleString("PONG".to_string())),
        [msg] => Ok(bulk(msg.clone())),
        _ => Err(super::arity_error("ping")),
    }
}

impl Db {
    pub(super) fn del(&mut self, args: &[Bytes]) -> CmdResult {
        at_least(args, 1, "del")?;
        let removed = args.iter().filter(|k| self.remove(k)).count();
        Ok(RespValue::Integer(removed as i64))
    }

    pub(super) fn exists_cmd(&mut self, args: &[Bytes]) -> CmdResult {
        at_least(args, 1, "exists")?;
        let found = args.iter().filter(|k| self.exists(k)).count();
        Ok(RespValue::Integer(found as i64))
    }

    pub(super) fn type_cmd(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 1, "type")?;
        let name = self.peek(&args[0]).map_or("none", |e| e.data.type_name());
        Ok(RespValue::SimpleString(name.to_string()))
    }

    /// TTL / PTTL. `unit_ms` is 1000 for seconds, 1 for milliseconds.
    pub(super) fn ttl(&mut self, args: &[Bytes], unit_ms: i64) -> CmdResult {
        exact(args, 1, if unit_ms == 1 { "pttl" } else { "ttl" })?;
        let reply = match self.peek(&args[0]) {
            None => -2,
            Some(entry) => match entry.expires_at {
                None => -1,
                Some(at) => {
                    let left = (at - now_ms()).max(0);
                    (left + unit_ms / 2) / unit_ms
                }
            },
        };
        Ok(RespValue::Integer(reply))
    }

    /// EXPIRE / PEXPIRE / EXPIREAT / PEXPIREAT.
    pub(super) fn expire(&mut self, args: &[Bytes], unit_ms: i64, absolute: bool) -> CmdResult {
        exact(args, 2, "expire")?;
        let amount = parse_int(&args[1])?;
        let at = amount
            .checked_mul(unit_ms)
            .and_then(|ms| if absolute { Some(ms) } else { ms.checked_add(now_ms()) })
            .ok_or_else(|| "ERR invalid expire time".to_string())?;
        let key = &args[0];
        if !self.exists(key) {
            return Ok(RespValue::Integer(0));
        }
        if at <= now_ms() {
            self.remove(key);
        } else if let Some(entry) = self.entry_mut(key) {
            entry.expires_at = Some(at);
            self.bump(key);
        }
        Ok(RespValue::Integer(1))
    }

    pub(super) fn persist(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 1, "persist")?;
        let cleared = match self.entry_mut(&args[0]) {
            Some(entry) => entry.expires_at.take().is_some(),
            None => false,
        };
        if cleared {
            self.bump(&args[0]);
        }
        Ok(RespValue::Integer(cleared as i64))
    }

    /// OBJECT IDLETIME key (other subcommands are not kept).
    pub(super) fn object(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 2, "object")?;
        if !super::eq_ignore_case(&args[0], "IDLETIME") {
            return Err(format!(
                "ERR unknown subcommand '{}'",
                String::from_utf8_lossy(&args[0])
            ));
        }
        Ok(match self.peek(&args[1]) {
            Some(entry) => RespValue::Integer(entry.last_access.elapsed().as_secs() as i64),
            None => RespValue::null(),
        })
    }

    pub(super) fn keys_cmd(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 1, "keys")?;
        let mut keys: Vec<Bytes> = self
            .keys()
            .into_iter()
            .filter(|k| glob_match(&args[0], k))
            .collect();
        keys.sort();
        Ok(bulk_array(keys))
    }
}
