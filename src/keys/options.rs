//! Option types shared by the key objects.

use crate::command::Command;
use crate::value::format_float;
use std::time::Duration;

/// Write condition for `SET`-style commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum When {
    #[default]
    Always,
    /// Only overwrite an existing key or field.
    Exists,
    /// Only create a missing key or field.
    NotExists,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetOptions {
    pub expiry: Option<Duration>,
    pub when: When,
}

impl SetOptions {
    pub fn expiry(mut self, ttl: Duration) -> Self {
        self.expiry = Some(ttl);
        self
    }

    pub fn when(mut self, when: When) -> Self {
        self.when = when;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Ascending,
    Descending,
}

/// Which ends of a score or value range are open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Exclude {
    #[default]
    None,
    Start,
    Stop,
    Both,
}

impl Exclude {
    pub(crate) fn start(self) -> bool {
        matches!(self, Exclude::Start | Exclude::Both)
    }

    pub(crate) fn stop(self) -> bool {
        matches!(self, Exclude::Stop | Exclude::Both)
    }

    /// Score bound text: `(1.5` when open, `-inf`/`+inf` for infinities.
    pub(crate) fn score_bound(open: bool, score: f64) -> String {
        if open {
            format!("({}", format_float(score))
        } else {
            format_float(score)
        }
    }
}

/// How `ZUNIONSTORE`/`ZINTERSTORE` combine scores of the same member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregate {
    #[default]
    Sum,
    Min,
    Max,
}

impl Aggregate {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Aggregate::Sum => "SUM",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
        }
    }
}

/// `BITOP` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bitwise {
    And,
    Or,
    Xor,
    Not,
}

impl Bitwise {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Bitwise::And => "AND",
            Bitwise::Or => "OR",
            Bitwise::Xor => "XOR",
            Bitwise::Not => "NOT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortType {
    #[default]
    Numeric,
    Alphabetic,
}

/// Arguments to `SORT`. `take == -1` means every element after `skip`.
///
/// `by` and `get` patterns are sent verbatim; they are not namespaced.
#[derive(Debug, Clone, PartialEq)]
pub struct SortOptions {
    pub order: Order,
    pub sort_type: SortType,
    pub skip: i64,
    pub take: i64,
    pub by: Option<String>,
    pub get: Vec<String>,
}

impl Default for SortOptions {
    fn default() -> Self {
        SortOptions {
            order: Order::Ascending,
            sort_type: SortType::Numeric,
            skip: 0,
            take: -1,
            by: None,
            get: Vec::new(),
        }
    }
}

impl SortOptions {
    pub fn descending(mut self) -> Self {
        self.order = Order::Descending;
        self
    }

    pub fn alphabetic(mut self) -> Self {
        self.sort_type = SortType::Alphabetic;
        self
    }

    pub fn limit(mut self, skip: i64, take: i64) -> Self {
        self.skip = skip;
        self.take = take;
        self
    }

    pub fn by(mut self, pattern: impl Into<String>) -> Self {
        self.by = Some(pattern.into());
        self
    }

    pub fn get(mut self, pattern: impl Into<String>) -> Self {
        self.get.push(pattern.into());
        self
    }

    /// Builds `SORT key ...`, plus `STORE dest` when given.
    pub(crate) fn command(&self, key: &str, store: Option<&str>) -> Command {
        let mut cmd = Command::new("SORT").arg(key);
        if let Some(by) = &self.by {
            cmd = cmd.arg("BY").arg(by);
        }
        if self.skip != 0 || self.take != -1 {
            cmd = cmd.arg("LIMIT").arg_int(self.skip).arg_int(self.take);
        }
        for get in &self.get {
            cmd = cmd.arg("GET").arg(get);
        }
        if self.order == Order::Descending {
            cmd = cmd.arg("DESC");
        }
        if self.sort_type == SortType::Alphabetic {
            cmd = cmd.arg("ALPHA");
        }
        if let Some(dest) = store {
            cmd = cmd.arg("STORE").arg(dest);
        }
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_command_defaults_are_bare() {
        let cmd = SortOptions::default().command("k", None);
        assert_eq!(cmd.to_string(), "SORT k");
    }

    #[test]
    fn test_sort_command_full() {
        let cmd = SortOptions::default()
            .descending()
            .alphabetic()
            .limit(1, 5)
            .by("w_*")
            .get("#")
            .command("k", Some("out"));
        assert_eq!(
            cmd.to_string(),
            "SORT k BY w_* LIMIT 1 5 GET # DESC ALPHA STORE out"
        );
    }

    #[test]
    fn test_score_bounds() {
        assert_eq!(Exclude::score_bound(false, 1.5), "1.5");
        assert_eq!(Exclude::score_bound(true, 2.0), "(2");
        assert_eq!(Exclude::score_bound(false, f64::NEG_INFINITY), "-inf");
        assert!(Exclude::Both.start() && Exclude::Both.stop());
        assert!(!Exclude::Stop.start());
    }
}
