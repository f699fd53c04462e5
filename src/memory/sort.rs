//! SORT key [BY pattern] [LIMIT offset count] [GET pattern ...] [ASC|DESC]
//! [ALPHA] [STORE destination]

use super::{at_least, eq_ignore_case, parse_float, parse_int, syntax_error, CmdResult, Data, Db};
use crate::resp::RespValue;
use bytes::Bytes;
use std::cmp::Ordering;
use std::collections::VecDeque;

#[derive(Debug, Default)]
struct SortArgs {
    by: Option<Bytes>,
    offset: usize,
    count: Option<usize>,
    gets: Vec<Bytes>,
    desc: bool,
    alpha: bool,
    store: Option<Bytes>,
}

fn parse_sort_args(args: &[Bytes]) -> Result<SortArgs, String> {
    let mut out = SortArgs::default();
    let mut i = 0;
    while i < args.len() {
        let a = &args[i];
        if eq_ignore_case(a, "ASC") {
            out.desc = false;
        } else if eq_ignore_case(a, "DESC") {
            out.desc = true;
        } else if eq_ignore_case(a, "ALPHA") {
            out.alpha = true;
        } else if eq_ignore_case(a, "BY") && i + 1 < args.len() {
            out.by = Some(args[i + 1].clone());
            i += 1;
        } else if eq_ignore_case(a, "GET") && i + 1 < args.len() {
            out.gets.push(args[i + 1].clone());
            i += 1;
        } else if eq_ignore_case(a, "STORE") && i + 1 < args.len() {
            out.store = Some(args[i + 1].clone());
            i += 1;
        } else if eq_ignore_case(a, "LIMIT") && i + 2 < args.len() {
            let offset = parse_int(&args[i + 1])?;
            let count = parse_int(&args[i + 2])?;
            out.offset = offset.max(0) as usize;
            out.count = if count < 0 { None } else { Some(count as usize) };
            i += 2;
        } else {
            return Err(syntax_error());
        }
        i += 1;
    }
    Ok(out)
}

impl Db {
    /// Resolves a BY/GET pattern for one element: `#` is the element
    /// itself, `key*` reads a string, `key*->field` reads a hash field.
    fn lookup_pattern(&mut self, pattern: &[u8], element: &Bytes) -> Option<Bytes> {
        if pattern == b"#" {
            return Some(element.clone());
        }
        let star = pattern.iter().position(|&c| c == b'*')?;
        let (key_part, field) = match find(&pattern[star..], b"->") {
            Some(arrow) => (&pattern[..star + arrow], Some(&pattern[star + arrow + 2..])),
            None => (pattern, None),
        };
        let mut key = Vec::with_capacity(key_part.len() + element.len());
        key.extend_from_slice(&key_part[..star]);
        key.extend_from_slice(element);
        key.extend_from_slice(&key_part[star + 1..]);
        match field {
            Some(field) => match self.hash(&key) {
                Ok(Some(h)) => h.get(field).cloned(),
                _ => None,
            },
            None => match self.string(&key) {
                Ok(Some(s)) => Some(Bytes::from(s.clone())),
                _ => None,
            },
        }
    }

    pub(super) fn sort(&mut self, args: &[Bytes]) -> CmdResult {
        at_least(args, 1, "sort")?;
        let opts = parse_sort_args(&args[1..])?;
        let mut elements: Vec<Bytes> = match self.entry_mut(&args[0]) {
            None => Vec::new(),
            Some(entry) => match &entry.data {
                Data::List(l) => l.iter().cloned().collect(),
                Data::Set(s) => s.iter().cloned().collect(),
                Data::ZSet(z) => z.iter().map(|(m, _)| m.clone()).collect(),
                _ => return Err(super::wrong_type()),
            },
        };

        // A BY pattern without `*` means "do not sort".
        let sort = opts.by.as_ref().map_or(true, |by| by.contains(&b'*'));
        if sort {
            let mut keyed: Vec<(Option<Bytes>, Bytes)> = Vec::with_capacity(elements.len());
            for element in elements.drain(..) {
                let weight = match &opts.by {
                    Some(by) => self.lookup_pattern(by, &element),
                    None => Some(element.clone()),
                };
                keyed.push((weight, element));
            }
            if opts.alpha {
                keyed.sort_by(|a, b| {
                    let wa = a.0.as_deref().unwrap_or(b"");
                    let wb = b.0.as_deref().unwrap_or(b"");
                    wa.cmp(wb).then_with(|| a.1.cmp(&b.1))
                });
            } else {
                let mut scored = Vec::with_capacity(keyed.len());
                for (weight, element) in keyed {
                    let score = match weight {
                        Some(w) if !w.is_empty() => parse_float(&w).map_err(|_| {
                            "ERR One or more scores can't be converted into double".to_string()
                        })?,
                        _ => 0.0,
                    };
                    scored.push((score, element));
                }
                scored.sort_by(|a, b| {
                    a.0.partial_cmp(&b.0)
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| a.1.cmp(&b.1))
                });
                keyed = scored.into_iter().map(|(_, e)| (None, e)).collect();
            }
            elements = keyed.into_iter().map(|(_, e)| e).collect();
            if opts.desc {
                elements.reverse();
            }
        }

        let limit = opts.count.unwrap_or(usize::MAX);
        let window: Vec<Bytes> = elements.into_iter().skip(opts.offset).take(limit).collect();

        let mut out: Vec<Option<Bytes>> = Vec::new();
        if opts.gets.is_empty() {
            out.extend(window.into_iter().map(Some));
        } else {
            for element in &window {
                for get in &opts.gets {
                    out.push(self.lookup_pattern(get, element));
                }
            }
        }

        match opts.store {
            Some(dest) => {
                let len = out.len();
                let list: VecDeque<Bytes> = out.into_iter().map(Option::unwrap_or_default).collect();
                self.put(&dest, Data::List(list));
                Ok(RespValue::Integer(len as i64))
            }
            None => Ok(RespValue::Array(Some(
                out.into_iter().map(RespValue::BulkString).collect(),
            ))),
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
