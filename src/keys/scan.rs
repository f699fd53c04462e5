//! Cursor-driven enumeration (`HSCAN`, `SSCAN`, `ZSCAN`) and index-driven
//! list enumeration.

use crate::command::Command;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::value::Value;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;

const SCAN_COUNT: i64 = 100;

type Decode<T> = Arc<dyn Fn(Vec<Value>) -> Result<T> + Send + Sync>;

struct ScanState<T> {
    executor: Arc<dyn Executor>,
    command: &'static str,
    key: String,
    /// `None` once the server has returned cursor 0.
    cursor: Option<String>,
    chunk: usize,
    buffer: VecDeque<Value>,
    decode: Decode<T>,
}

/// Streams every element of an aggregate by following its scan cursor.
/// `chunk` is 1 for `SSCAN` and 2 for the field/value and member/score
/// pairs of `HSCAN`/`ZSCAN`.
pub(crate) fn cursor_stream<T, F>(
    executor: Arc<dyn Executor>,
    command: &'static str,
    key: String,
    chunk: usize,
    decode: F,
) -> BoxStream<'static, Result<T>>
where
    T: Send + 'static,
    F: Fn(Vec<Value>) -> Result<T> + Send + Sync + 'static,
{
    let state = ScanState {
        executor,
        command,
        key,
        cursor: Some("0".to_string()),
        chunk,
        buffer: VecDeque::new(),
        decode: Arc::new(decode),
    };
    stream::unfold(state, |mut st| async move {
        loop {
            if st.buffer.len() >= st.chunk {
                let items: Vec<Value> = st.buffer.drain(..st.chunk).collect();
                let item = (st.decode)(items);
                return Some((item, st));
            }
            let cursor = st.cursor.take()?;
            let cmd = Command::new(st.command)
                .arg(&st.key)
                .arg(&cursor)
                .arg("COUNT")
                .arg_int(SCAN_COUNT);
            match next_page(st.executor.execute(cmd).await) {
                Ok((next, items)) => {
                    st.cursor = (next != "0").then_some(next);
                    st.buffer.extend(items);
                }
                Err(e) => {
                    st.buffer.clear();
                    return Some((Err(e), st));
                }
            }
        }
    })
    .boxed()
}

fn next_page(reply: Result<crate::resp::RespValue>) -> Result<(String, Vec<Value>)> {
    let mut parts = reply?.into_array()?.into_iter();
    match (parts.next(), parts.next()) {
        (Some(cursor), Some(items)) => {
            let cursor = cursor.into_value()?.to_string();
            Ok((cursor, items.into_values()?))
        }
        _ => Err(Error::protocol("scan reply must be [cursor, items]")),
    }
}

/// Streams a list front to back with `LLEN` then one `LINDEX` per element.
/// Elements pushed during enumeration past the initial length are not seen.
pub(crate) fn index_stream<T, F>(
    executor: Arc<dyn Executor>,
    key: String,
    decode: F,
) -> BoxStream<'static, Result<T>>
where
    T: Send + 'static,
    F: Fn(Value) -> Result<T> + Send + Sync + 'static,
{
    let decode = Arc::new(decode);
    let init = (executor, key, 0i64, None::<i64>, false);
    stream::unfold(init, move |(executor, key, index, len, done)| {
        let decode = Arc::clone(&decode);
        async move {
            if done {
                return None;
            }
            let len = match len {
                Some(len) => len,
                None => match executor.execute(Command::new("LLEN").arg(&key)).await {
                    Ok(reply) => match reply.into_int() {
                        Ok(len) => len,
                        Err(e) => return Some((Err(e), (executor, key, index, Some(0), true))),
                    },
                    Err(e) => return Some((Err(e), (executor, key, index, Some(0), true))),
                },
            };
            if index >= len {
                return None;
            }
            let cmd = Command::new("LINDEX").arg(&key).arg_int(index);
            let item = match executor.execute(cmd).await {
                Ok(reply) => reply.into_value().and_then(|v| decode(v)),
                Err(e) => Err(e),
            };
            let done = item.is_err();
            Some((item, (executor, key, index + 1, Some(len), done)))
        }
    })
    .boxed()
}

/// A stream that yields one error, for keys that cannot enumerate.
pub(crate) fn failed_stream<T: Send + 'static>(err: Error) -> BoxStream<'static, Result<T>> {
    stream::once(async move { Err(err) }).boxed()
}
