//! Set commands.

use super::{at_least, bulk, bulk_array, exact, parse_int, scan_page, CmdResult, Data, Db};
use crate::resp::RespValue;
use ahash::AHashSet;
use bytes::Bytes;
use rand::seq::{IteratorRandom, SliceRandom};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Algebra {
    Difference,
    Intersect,
    Union,
}

impl Db {
    fn read_set(&mut self, key: &[u8]) -> Result<AHashSet<Bytes>, String> {
        Ok(self.set_data(key)?.map(|s| s.clone()).unwrap_or_default())
    }

    pub(super) fn sadd(&mut self, args: &[Bytes]) -> CmdResult {
        at_least(args, 2, "sadd")?;
        let set = self.set_data_or_create(&args[0])?;
        let added = args[1..].iter().filter(|m| set.insert((*m).clone())).count();
        self.modified(&args[0]);
        Ok(RespValue::Integer(added as i64))
    }

    pub(super) fn srem(&mut self, args: &[Bytes]) -> CmdResult {
        at_least(args, 2, "srem")?;
        let removed = match self.set_data(&args[0])? {
            Some(set) => args[1..].iter().filter(|m| set.remove(*m)).count(),
            None => 0,
        };
        if removed > 0 {
            self.modified(&args[0]);
        }
        Ok(RespValue::Integer(removed as i64))
    }

    pub(super) fn scard(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 1, "scard")?;
        Ok(RespValue::Integer(self.set_data(&args[0])?.map_or(0, |s| s.len()) as i64))
    }

    pub(super) fn sismember(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 2, "sismember")?;
        let found = self.set_data(&args[0])?.map_or(false, |s| s.contains(&args[1]));
        Ok(RespValue::Integer(found as i64))
    }

    pub(super) fn smembers(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 1, "smembers")?;
        Ok(bulk_array(self.read_set(&args[0])?))
    }

    /// SPOP key [count]
    pub(super) fn spop(&mut self, args: &[Bytes]) -> CmdResult {
        if args.is_empty() || args.len() > 2 {
            return Err(super::arity_error("spop"));
        }
        let count = match args.get(1) {
            Some(c) => {
                let n = parse_int(c)?;
                if n < 0 {
                    return Err("ERR value is out of range, must be positive".to_string());
                }
                Some(n as usize)
            }
            None => None,
        };
        let set = match self.set_data(&args[0])? {
            Some(set) => set,
            None => {
                return Ok(if count.is_some() {
                    RespValue::Array(Some(Vec::new()))
                } else {
                    RespValue::null()
                })
            }
        };
        let mut rng = rand::thread_rng();
        let picked: Vec<Bytes> = set
            .iter()
            .cloned()
            .choose_multiple(&mut rng, count.unwrap_or(1));
        for member in &picked {
            set.remove(member);
        }
        self.modified(&args[0]);
        Ok(match count {
            Some(_) => bulk_array(picked),
            None => picked.into_iter().next().map_or_else(RespValue::null, bulk),
        })
    }

    /// SRANDMEMBER key [count]; a negative count may repeat members.
    pub(super) fn srandmember(&mut self, args: &[Bytes]) -> CmdResult {
        if args.is_empty() || args.len() > 2 {
            return Err(super::arity_error("srandmember"));
        }
        let count = args.get(1).map(|c| parse_int(c)).transpose()?;
        let members: Vec<Bytes> = self.read_set(&args[0])?.into_iter().collect();
        let mut rng = rand::thread_rng();
        Ok(match count {
            None => members.choose(&mut rng).cloned().map_or_else(RespValue::null, bulk),
            Some(n) if n >= 0 => {
                bulk_array(members.iter().cloned().choose_multiple(&mut rng, n as usize))
            }
            Some(n) => {
                let picks = if members.is_empty() { 0 } else { n.unsigned_abs() as usize };
                bulk_array((0..picks).filter_map(|_| members.choose(&mut rng).cloned()))
            }
        })
    }

    pub(super) fn smove(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 3, "smove")?;
        self.set_data(&args[1])?;
        let moved = self.set_data(&args[0])?.map_or(false, |s| s.remove(&args[2]));
        if !moved {
            return Ok(RespValue::Integer(0));
        }
        self.modified(&args[0]);
        self.set_data_or_create(&args[1])?.insert(args[2].clone());
        self.modified(&args[1]);
        Ok(RespValue::Integer(1))
    }

    /// SDIFF / SINTER / SUNION and their STORE forms. The first key is the
    /// left operand.
    pub(super) fn set_algebra(&mut self, args: &[Bytes], op: Algebra, store: bool) -> CmdResult {
        let name = match (op, store) {
            (Algebra::Difference, false) => "sdiff",
            (Algebra::Intersect, false) => "sinter",
            (Algebra::Union, false) => "sunion",
            (Algebra::Difference, true) => "sdiffstore",
            (Algebra::Intersect, true) => "sinterstore",
            (Algebra::Union, true) => "sunionstore",
        };
        at_least(args, if store { 2 } else { 1 }, name)?;
        let (dest, sources) = if store { (Some(&args[0]), &args[1..]) } else { (None, args) };
        let mut result = self.read_set(&sources[0])?;
        for key in &sources[1..] {
            let other = self.read_set(key)?;
            match op {
                Algebra::Difference => result.retain(|m| !other.contains(m)),
                Algebra::Intersect => result.retain(|m| other.contains(m)),
                Algebra::Union => result.extend(other),
            }
        }
        match dest {
            Some(dest) => {
                let len = result.len();
                self.put(dest, Data::Set(result));
                Ok(RespValue::Integer(len as i64))
            }
            None => Ok(bulk_array(result)),
        }
    }

    pub(super) fn sscan(&mut self, args: &[Bytes]) -> CmdResult {
        at_least(args, 2, "sscan")?;
        let items = self.read_set(&args[0])?.into_iter().map(|m| (m, None)).collect();
        scan_page(items, &args[1..])
    }
}
