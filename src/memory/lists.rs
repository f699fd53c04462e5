//! List commands.

use super::{at_least, bulk, bulk_array, eq_ignore_case, exact, normalize_range, parse_int, syntax_error, CmdResult, Db};
use crate::resp::RespValue;
use bytes::Bytes;

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { index + len } else { index };
    if (0..len).contains(&i) {
        Some(i as usize)
    } else {
        None
    }
}

impl Db {
    pub(super) fn push(&mut self, args: &[Bytes], front: bool, name: &str) -> CmdResult {
        at_least(args, 2, name)?;
        let list = self.list_or_create(&args[0])?;
        for value in &args[1..] {
            if front {
                list.push_front(value.clone());
            } else {
                list.push_back(value.clone());
            }
        }
        let len = list.len();
        self.modified(&args[0]);
        Ok(RespValue::Integer(len as i64))
    }

    /// LPOP / RPOP key [count]
    pub(super) fn pop(&mut self, args: &[Bytes], front: bool, name: &str) -> CmdResult {
        if args.is_empty() || args.len() > 2 {
            return Err(super::arity_error(name));
        }
        let count = match args.get(1) {
            Some(c) => Some(parse_int(c)?.max(0) as usize),
            None => None,
        };
        let list = match self.list(&args[0])? {
            Some(list) => list,
            None => {
                return Ok(if count.is_some() {
                    RespValue::Array(None)
                } else {
                    RespValue::null()
                })
            }
        };
        let mut popped = Vec::new();
        for _ in 0..count.unwrap_or(1) {
            let item = if front { list.pop_front() } else { list.pop_back() };
            match item {
                Some(v) => popped.push(v),
                None => break,
            }
        }
        self.modified(&args[0]);
        Ok(match count {
            Some(_) => bulk_array(popped),
            None => popped.pop().map_or_else(RespValue::null, bulk),
        })
    }

    pub(super) fn llen(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 1, "llen")?;
        Ok(RespValue::Integer(self.list(&args[0])?.map_or(0, |l| l.len()) as i64))
    }

    pub(super) fn lindex(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 2, "lindex")?;
        let index = parse_int(&args[1])?;
        let value = self
            .list(&args[0])?
            .and_then(|l| resolve_index(index, l.len()).and_then(|i| l.get(i).cloned()));
        Ok(value.map_or_else(RespValue::null, bulk))
    }

    pub(super) fn lset(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 3, "lset")?;
        let index = parse_int(&args[1])?;
        let list = self.list(&args[0])?.ok_or_else(|| "ERR no such key".to_string())?;
        let i = resolve_index(index, list.len()).ok_or_else(|| "ERR index out of range".to_string())?;
        list[i] = args[2].clone();
        self.modified(&args[0]);
        Ok(RespValue::ok())
    }

    /// LINSERT key BEFORE|AFTER pivot value
    pub(super) fn linsert(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 4, "linsert")?;
        let after = if eq_ignore_case(&args[1], "AFTER") {
            true
        } else if eq_ignore_case(&args[1], "BEFORE") {
            false
        } else {
            return Err(syntax_error());
        };
        let list = match self.list(&args[0])? {
            Some(list) => list,
            None => return Ok(RespValue::Integer(0)),
        };
        let pos = match list.iter().position(|v| *v == args[2]) {
            Some(pos) => pos,
            None => return Ok(RespValue::Integer(-1)),
        };
        list.insert(if after { pos + 1 } else { pos }, args[3].clone());
        let len = list.len();
        self.modified(&args[0]);
        Ok(RespValue::Integer(len as i64))
    }

    pub(super) fn lrange(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 3, "lrange")?;
        let (start, stop) = (parse_int(&args[1])?, parse_int(&args[2])?);
        let items: Vec<Bytes> = match self.list(&args[0])? {
            Some(list) => match normalize_range(start, stop, list.len()) {
                Some((a, b)) => list.range(a..=b).cloned().collect(),
                None => Vec::new(),
            },
            None => Vec::new(),
        };
        Ok(bulk_array(items))
    }

    /// Keeps positions `[start, stop]`; everything else goes.
    pub(super) fn ltrim(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 3, "ltrim")?;
        let (start, stop) = (parse_int(&args[1])?, parse_int(&args[2])?);
        if let Some(list) = self.list(&args[0])? {
            match normalize_range(start, stop, list.len()) {
                Some((a, b)) => {
                    list.truncate(b + 1);
                    list.drain(..a);
                }
                None => list.clear(),
            }
            self.modified(&args[0]);
        }
        Ok(RespValue::ok())
    }

    /// LREM key count value: count > 0 from the head, < 0 from the tail,
    /// 0 removes every occurrence.
    pub(super) fn lrem(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 3, "lrem")?;
        let count = parse_int(&args[1])?;
        let list = match self.list(&args[0])? {
            Some(list) => list,
            None => return Ok(RespValue::Integer(0)),
        };
        let limit = if count == 0 { usize::MAX } else { count.unsigned_abs() as usize };
        let mut removed = 0usize;
        if count >= 0 {
            let mut i = 0;
            while i < list.len() && removed < limit {
                if list[i] == args[2] {
                    list.remove(i);
                    removed += 1;
                } else {
                    i += 1;
                }
            }
        } else {
            let mut i = list.len();
            while i > 0 && removed < limit {
                i -= 1;
                if list[i] == args[2] {
                    list.remove(i);
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            self.modified(&args[0]);
        }
        Ok(RespValue::Integer(removed as i64))
    }

    pub(super) fn rpoplpush(&mut self, args: &[Bytes]) -> CmdResult {
        exact(args, 2, "rpoplpush")?;
        // Type-check the destination before touching the source.
        self.list(&args[1])?;
        let value = match self.list(&args[0])?.and_then(|l| l.pop_back()) {
            Some(v) => v,
            None => return Ok(RespValue::null()),
        };
        self.modified(&args[0]);
        self.list_or_create(&args[1])?.push_front(value.clone());
        self.modified(&args[1]);
        Ok(bulk(value))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::run;
    use super::super::MemoryStore;
    use crate::resp::RespValue;

    fn items(reply: RespValue) -> Vec<String> {
        reply
            .into_values()
            .unwrap()
            .into_iter()
            .map(|v| v.to_string())
            .collect()
    }

    #[test]
    fn test_push_pop_both_ends() {
        let store = MemoryStore::new();
        assert_eq!(run(&store, &["RPUSH", "l", "b", "c"]), RespValue::Integer(2));
        assert_eq!(run(&store, &["LPUSH", "l", "a"]), RespValue::Integer(3));
        assert_eq!(items(run(&store, &["LRANGE", "l", "0", "-1"])), vec!["a", "b", "c"]);
        assert_eq!(run(&store, &["LPOP", "l"]), RespValue::bulk("a"));
        assert_eq!(run(&store, &["RPOP", "l"]), RespValue::bulk("c"));
        assert_eq!(run(&store, &["RPOP", "l"]), RespValue::bulk("b"));
        assert_eq!(run(&store, &["RPOP", "l"]), RespValue::null());
        assert_eq!(run(&store, &["EXISTS", "l"]), RespValue::Integer(0));
    }

    #[test]
    fn test_index_insert_set() {
        let store = MemoryStore::new();
        run(&store, &["RPUSH", "l", "a", "c"]);
        assert_eq!(run(&store, &["LINSERT", "l", "BEFORE", "c", "b"]), RespValue::Integer(3));
        assert_eq!(run(&store, &["LINSERT", "l", "AFTER", "zz", "x"]), RespValue::Integer(-1));
        assert_eq!(run(&store, &["LINDEX", "l", "-1"]), RespValue::bulk("c"));
        assert_eq!(run(&store, &["LSET", "l", "0", "A"]), RespValue::ok());
        assert!(matches!(run(&store, &["LSET", "l", "5", "x"]), RespValue::Error(_)));
        assert_eq!(items(run(&store, &["LRANGE", "l", "0", "-1"])), vec!["A", "b", "c"]);
    }

    #[test]
    fn test_trim_is_idempotent() {
        let store = MemoryStore::new();
        run(&store, &["RPUSH", "l", "1", "2", "3", "4", "5"]);
        run(&store, &["LTRIM", "l", "1", "3"]);
        assert_eq!(items(run(&store, &["LRANGE", "l", "0", "-1"])), vec!["2", "3", "4"]);
        run(&store, &["LTRIM", "l", "0", "9"]);
        assert_eq!(items(run(&store, &["LRANGE", "l", "0", "-1"])), vec!["2", "3", "4"]);
        run(&store, &["LTRIM", "l", "5", "9"]);
        assert_eq!(run(&store, &["EXISTS", "l"]), RespValue::Integer(0));
    }

    #[test]
    fn test_lrem_directions() {
        let store = MemoryStore::new();
        run(&store, &["RPUSH", "l", "x", "a", "x", "b", "x"]);
        assert_eq!(run(&store, &["LREM", "l", "-1", "x"]), RespValue::Integer(1));
        assert_eq!(items(run(&store, &["LRANGE", "l", "0", "-1"])), vec!["x", "a", "x", "b"]);
        assert_eq!(run(&store, &["LREM", "l", "1", "x"]), RespValue::Integer(1));
        assert_eq!(items(run(&store, &["LRANGE", "l", "0", "-1"])), vec!["a", "x", "b"]);
        assert_eq!(run(&store, &["LREM", "l", "0", "x"]), RespValue::Integer(1));
    }

    #[test]
    fn test_rpoplpush_rotates() {
        let store = MemoryStore::new();
        run(&store, &["RPUSH", "src", "1", "2"]);
        assert_eq!(run(&store, &["RPOPLPUSH", "src", "src"]), RespValue::bulk("2"));
        assert_eq!(items(run(&store, &["LRANGE", "src", "0", "-1"])), vec!["2", "1"]);
        assert_eq!(run(&store, &["RPOPLPUSH", "src", "dst"]), RespValue::bulk("1"));
        assert_eq!(items(run(&store, &["LRANGE", "dst", "0", "-1"])), vec!["1"]);
    }
}
