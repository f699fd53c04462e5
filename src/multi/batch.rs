//! Pipelined command group.

use super::{deliver, fail_all, Proxy, Queued};
use crate::command::Command;
use crate::error::Result;
use crate::executor::Executor;
use crate::keys::RedisKey;
use crate::pending::Pending;
use crate::resp::RespValue;
use crate::telemetry::spans::transaction_span;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, Instrument};

struct BatchInner {
    executor: Arc<dyn Executor>,
    namespace: Arc<str>,
    commands: Mutex<Vec<Queued>>,
}

/// Commands queued here go out in one round trip. There is no atomicity:
/// each command succeeds or fails on its own.
#[derive(Clone)]
pub struct Batch {
    inner: Arc<BatchInner>,
}

impl std::fmt::Debug for Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("namespace", &self.inner.namespace)
            .field("commands", &self.inner.commands.lock().len())
            .finish()
    }
}

impl Batch {
    pub(crate) fn new(executor: Arc<dyn Executor>, namespace: Arc<str>) -> Self {
        Batch {
            inner: Arc::new(BatchInner {
                executor,
                namespace,
                commands: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn queued_len(&self) -> usize {
        self.inner.commands.lock().len()
    }

    /// Runs `op` on a copy of `key` bound to this batch.
    pub fn enqueue<K, R, F>(&self, key: &K, op: F) -> Pending<R>
    where
        K: RedisKey,
        F: FnOnce(&K) -> Pending<R>,
    {
        op(&key.with_batch(self))
    }

    pub(crate) fn submit(&self, cmd: Command) -> Pending<RespValue> {
        let (queued, pending) = Queued::new(cmd);
        self.inner.commands.lock().push(queued);
        pending
    }

    /// Flushes the queue. A transport failure is returned here and handed
    /// to every queued reply; per-command errors only reach their own reply.
    pub async fn execute(&self) -> Result<()> {
        let queued = std::mem::take(&mut *self.inner.commands.lock());
        let span = transaction_span("batch", queued.len(), 0);
        let (cmds, senders): (Vec<_>, Vec<_>) = queued.into_iter().map(|q| (q.cmd, q.reply)).unzip();
        if cmds.is_empty() {
            return Ok(());
        }
        let count = cmds.len();

        match self.inner.executor.pipeline(cmds).instrument(span).await {
            Ok(replies) => {
                debug!(commands = count, "batch executed");
                deliver(senders, replies);
                Ok(())
            }
            Err(e) => {
                fail_all(senders, &e);
                Err(e)
            }
        }
    }
}

impl Proxy for Batch {
    fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    fn send_command(&self, cmd: Command) -> Pending<RespValue> {
        self.submit(cmd)
    }

    fn is_connected(&self) -> bool {
        self.inner.executor.is_connected()
    }
}
