//! Wire Commands and Transaction Preconditions

use crate::error::{Error, Result};
use crate::resp::RespValue;
use crate::value::{format_float, Value};
use bytes::Bytes;
use std::fmt;

/// One store command: an upper-cased name and binary-safe arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: String,
    args: Vec<Bytes>,
}

impl Command {
    pub fn new(name: &str) -> Self {
        Command {
            name: name.to_ascii_uppercase(),
            args: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    pub fn arg(mut self, arg: impl AsRef<[u8]>) -> Self {
        self.args.push(Bytes::copy_from_slice(arg.as_ref()));
        self
    }

    pub fn arg_bytes(mut self, arg: Bytes) -> Self {
        self.args.push(arg);
        self
    }

    pub fn arg_value(mut self, value: &Value) -> Self {
        self.args.push(value.to_bytes());
        self
    }

    pub fn arg_int(mut self, n: i64) -> Self {
        self.args.push(Bytes::from(n.to_string()));
        self
    }

    pub fn arg_float(mut self, f: f64) -> Self {
        self.args.push(Bytes::from(format_float(f)));
        self
    }

    pub fn args_from<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        self.args
            .extend(args.into_iter().map(|a| Bytes::copy_from_slice(a.as_ref())));
        self
    }

    pub fn values_from<'a, I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        self.args.extend(values.into_iter().map(Value::to_bytes));
        self
    }

    /// Parses a client request (an array of bulk strings).
    pub fn from_resp(value: &RespValue) -> Result<Command> {
        let items = match value {
            RespValue::Array(Some(items)) if !items.is_empty() => items,
            _ => return Err(Error::protocol("command must be a non-empty array")),
        };
        let mut parts = items.iter().map(|item| match item {
            RespValue::BulkString(Some(b)) => Ok(b.clone()),
            RespValue::SimpleString(s) => Ok(Bytes::from(s.clone())),
            RespValue::Integer(n) => Ok(Bytes::from(n.to_string())),
            _ => Err(Error::protocol("command arguments must be bulk strings")),
        });
        let name = match parts.next() {
            Some(first) => first?,
            None => return Err(Error::protocol("empty command")),
        };
        let name = std::str::from_utf8(&name)
            .map_err(|_| Error::protocol("command name is not UTF-8"))?
            .to_ascii_uppercase();
        let args = parts.collect::<Result<Vec<_>>>()?;
        Ok(Command { name, args })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for arg in &self.args {
            write!(f, " {}", String::from_utf8_lossy(arg))?;
        }
        Ok(())
    }
}

/// A precondition checked atomically with a transaction's commands.
///
/// Key names are fully qualified; use [`RedisKey::full_name`](crate::RedisKey::full_name)
/// to build one from a key object.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    KeyExists(String),
    KeyNotExists(String),
    StringEqual(String, Value),
    StringNotEqual(String, Value),
    HashFieldExists(String, Value),
    HashFieldNotExists(String, Value),
    HashFieldEqual(String, Value, Value),
    SetContains(String, Value),
    SetNotContains(String, Value),
    ListLengthEqual(String, i64),
    SortedSetContains(String, Value),
}

impl Condition {
    pub fn key_exists(key: impl Into<String>) -> Self {
        Condition::KeyExists(key.into())
    }

    pub fn key_not_exists(key: impl Into<String>) -> Self {
        Condition::KeyNotExists(key.into())
    }

    pub fn string_equal(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::StringEqual(key.into(), value.into())
    }

    pub fn string_not_equal(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::StringNotEqual(key.into(), value.into())
    }

    pub fn hash_field_exists(key: impl Into<String>, field: impl Into<Value>) -> Self {
        Condition::HashFieldExists(key.into(), field.into())
    }

    pub fn hash_field_not_exists(key: impl Into<String>, field: impl Into<Value>) -> Self {
        Condition::HashFieldNotExists(key.into(), field.into())
    }

    pub fn hash_field_equal(
        key: impl Into<String>,
        field: impl Into<Value>,
        value: impl Into<Value>,
    ) -> Self {
        Condition::HashFieldEqual(key.into(), field.into(), value.into())
    }

    pub fn set_contains(key: impl Into<String>, member: impl Into<Value>) -> Self {
        Condition::SetContains(key.into(), member.into())
    }

    pub fn set_not_contains(key: impl Into<String>, member: impl Into<Value>) -> Self {
        Condition::SetNotContains(key.into(), member.into())
    }

    pub fn list_length_equal(key: impl Into<String>, len: i64) -> Self {
        Condition::ListLengthEqual(key.into(), len)
    }

    pub fn sorted_set_contains(key: impl Into<String>, member: impl Into<Value>) -> Self {
        Condition::SortedSetContains(key.into(), member.into())
    }

    /// The key this condition watches.
    pub fn key(&self) -> &str {
        match self {
            Condition::KeyExists(k)
            | Condition::KeyNotExists(k)
            | Condition::StringEqual(k, _)
            | Condition::StringNotEqual(k, _)
            | Condition::HashFieldExists(k, _)
            | Condition::HashFieldNotExists(k, _)
            | Condition::HashFieldEqual(k, _, _)
            | Condition::SetContains(k, _)
            | Condition::SetNotContains(k, _)
            | Condition::ListLengthEqual(k, _)
            | Condition::SortedSetContains(k, _) => k,
        }
    }

    /// Read-only command whose reply decides the condition.
    pub fn check_command(&self) -> Command {
        match self {
            Condition::KeyExists(k) | Condition::KeyNotExists(k) => Command::new("EXISTS").arg(k),
            Condition::StringEqual(k, _) | Condition::StringNotEqual(k, _) => {
                Command::new("GET").arg(k)
            }
            Condition::HashFieldExists(k, f) | Condition::HashFieldNotExists(k, f) => {
                Command::new("HEXISTS").arg(k).arg_value(f)
            }
            Condition::HashFieldEqual(k, f, _) => Command::new("HGET").arg(k).arg_value(f),
            Condition::SetContains(k, m) | Condition::SetNotContains(k, m) => {
                Command::new("SISMEMBER").arg(k).arg_value(m)
            }
            Condition::ListLengthEqual(k, _) => Command::new("LLEN").arg(k),
            Condition::SortedSetContains(k, m) => Command::new("ZSCORE").arg(k).arg_value(m),
        }
    }

    /// Evaluates the reply of [`check_command`](Self::check_command).
    pub fn holds(&self, reply: &RespValue) -> bool {
        fn truthy(reply: &RespValue) -> bool {
            matches!(reply, RespValue::Integer(n) if *n != 0)
        }
        fn bulk_eq(reply: &RespValue, expected: &Value) -> bool {
            match reply {
                RespValue::BulkString(Some(b)) => *b == expected.to_bytes(),
                RespValue::BulkString(None) => expected.is_nil(),
                _ => false,
            }
        }
        match self {
            Condition::KeyExists(_)
            | Condition::HashFieldExists(_, _)
            | Condition::SetContains(_, _) => truthy(reply),
            Condition::KeyNotExists(_)
            | Condition::HashFieldNotExists(_, _)
            | Condition::SetNotContains(_, _) => matches!(reply, RespValue::Integer(0)),
            Condition::StringEqual(_, v) | Condition::HashFieldEqual(_, _, v) => bulk_eq(reply, v),
            Condition::StringNotEqual(_, v) => {
                !matches!(reply, RespValue::Error(_)) && !bulk_eq(reply, v)
            }
            Condition::ListLengthEqual(_, len) => matches!(reply, RespValue::Integer(n) if n == len),
            Condition::SortedSetContains(_, _) => matches!(reply, RespValue::BulkString(Some(_))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_uppercases_and_collects_args() {
        let cmd = Command::new("zadd").arg("k").arg_float(1.5).arg_value(&Value::from("m"));
        assert_eq!(cmd.name(), "ZADD");
        assert_eq!(cmd.args().len(), 3);
        assert_eq!(cmd.args()[1], Bytes::from_static(b"1.5"));
        assert_eq!(cmd.to_string(), "ZADD k 1.5 m");
    }

    #[test]
    fn test_from_resp() {
        let frame = RespValue::Array(Some(vec![RespValue::bulk("get"), RespValue::bulk("k")]));
        let cmd = Command::from_resp(&frame).unwrap();
        assert_eq!(cmd, Command::new("GET").arg("k"));
        assert!(Command::from_resp(&RespValue::Array(Some(vec![]))).is_err());
        assert!(Command::from_resp(&RespValue::ok()).is_err());
    }

    #[test]
    fn test_conditions_evaluate_replies() {
        assert!(Condition::key_not_exists("k").holds(&RespValue::Integer(0)));
        assert!(!Condition::key_not_exists("k").holds(&RespValue::Integer(1)));
        assert!(Condition::string_equal("k", "v").holds(&RespValue::bulk("v")));
        assert!(Condition::string_not_equal("k", "v").holds(&RespValue::null()));
        assert!(Condition::list_length_equal("k", 3).holds(&RespValue::Integer(3)));
        assert!(Condition::sorted_set_contains("k", "m").holds(&RespValue::bulk("2")));
        assert!(!Condition::sorted_set_contains("k", "m").holds(&RespValue::null()));
    }

    #[test]
    fn test_condition_check_commands() {
        let c = Condition::hash_field_equal("h", "f", 1i64);
        assert_eq!(c.key(), "h");
        assert_eq!(c.check_command(), Command::new("HGET").arg("h").arg("f"));
        assert!(c.holds(&RespValue::bulk("1")));
    }
}
