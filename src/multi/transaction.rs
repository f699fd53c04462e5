//! Atomic command group with optional preconditions.

use super::{deliver, fail_all, Proxy, Queued};
use crate::command::{Command, Condition};
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::keys::RedisKey;
use crate::pending::Pending;
use crate::resp::RespValue;
use crate::telemetry::spans::transaction_span;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, Instrument};

#[derive(Default)]
struct TxQueue {
    conditions: Vec<Condition>,
    commands: Vec<Queued>,
}

struct TxInner {
    executor: Arc<dyn Executor>,
    namespace: Arc<str>,
    queue: Mutex<TxQueue>,
}

/// Commands queued here are applied all together or not at all.
///
/// Handles are cheap to clone and share one queue. Every `execute()` drains
/// the queue and its conditions, so a reused transaction starts empty.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TxInner>,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let queue = self.inner.queue.lock();
        f.debug_struct("Transaction")
            .field("namespace", &self.inner.namespace)
            .field("conditions", &queue.conditions.len())
            .field("commands", &queue.commands.len())
            .finish()
    }
}

impl Transaction {
    pub(crate) fn new(executor: Arc<dyn Executor>, namespace: Arc<str>) -> Self {
        Transaction {
            inner: Arc::new(TxInner {
                executor,
                namespace,
                queue: Mutex::new(TxQueue::default()),
            }),
        }
    }

    /// Adds a precondition. Condition keys are fully-qualified names.
    pub fn add_condition(&self, condition: Condition) {
        self.inner.queue.lock().conditions.push(condition);
    }

    pub fn queued_len(&self) -> usize {
        self.inner.queue.lock().commands.len()
    }

    /// Runs `op` on a copy of `key` bound to this transaction.
    ///
    /// ```rust,ignore
    /// let moved = tx.enqueue(&list, |l| l.pop_push(&other));
    /// ```
    pub fn enqueue<K, R, F>(&self, key: &K, op: F) -> Pending<R>
    where
        K: RedisKey,
        F: FnOnce(&K) -> Pending<R>,
    {
        op(&key.with_tx(self))
    }

    pub(crate) fn submit(&self, cmd: Command) -> Pending<RespValue> {
        let (queued, pending) = Queued::new(cmd);
        self.inner.queue.lock().commands.push(queued);
        pending
    }

    /// Sends every queued command as one atomic unit.
    ///
    /// Resolves to `false` when a condition did not hold; nothing was
    /// applied and every queued reply resolves to [`Error::Discarded`]. A
    /// connection failure is returned here and delivered to every queued
    /// reply.
    pub async fn execute(&self) -> Result<bool> {
        let (conditions, queued) = {
            let mut queue = self.inner.queue.lock();
            (
                std::mem::take(&mut queue.conditions),
                std::mem::take(&mut queue.commands),
            )
        };
        let span = transaction_span("transaction", queued.len(), conditions.len());
        let (cmds, senders): (Vec<_>, Vec<_>) = queued.into_iter().map(|q| (q.cmd, q.reply)).unzip();
        let count = cmds.len();

        match self
            .inner
            .executor
            .transaction(conditions, cmds)
            .instrument(span)
            .await
        {
            Ok(Some(replies)) => {
                debug!(commands = count, "transaction committed");
                deliver(senders, replies);
                Ok(true)
            }
            Ok(None) => {
                debug!(commands = count, "transaction aborted: precondition failed");
                fail_all(senders, &Error::Discarded);
                Ok(false)
            }
            Err(e) => {
                fail_all(senders, &e);
                Err(e)
            }
        }
    }
}

impl Proxy for Transaction {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{Item, List};
    use crate::memory::MemoryStore;
    use crate::Container;

    fn container() -> Container {
        Container::new(Arc::new(MemoryStore::new()), "tx")
    }

    #[tokio::test]
    async fn test_queued_commands_wait_for_execute() {
        let c = container();
        let item = c.get_key::<Item<i64>>("n");
        let tx = c.create_transaction();
        let set = item.with_tx(&tx).set(&5);
        let incr = tx.enqueue(&*item, |i| i.increment(2));
        assert_eq!(tx.queued_len(), 2);
        assert_eq!(item.get().await.unwrap(), 0);

        assert!(tx.execute().await.unwrap());
        assert!(set.await.unwrap());
        assert_eq!(incr.await.unwrap(), 7);
        assert_eq!(tx.queued_len(), 0);
    }

    #[tokio::test]
    async fn test_failed_condition_discards_everything() {
        let c = container();
        let item = c.get_key::<Item<String>>("guarded");
        let tx = c.create_transaction();
        tx.add_condition(Condition::key_exists(item.full_name().unwrap()));
        let set = item.with_tx(&tx).set(&"v".to_string());

        assert!(!tx.execute().await.unwrap());
        assert_eq!(set.await.unwrap_err(), Error::Discarded);
        assert!(!item.exists().await.unwrap());

        // Conditions were consumed: the next round runs unconditionally.
        let set = item.with_tx(&tx).set(&"v".to_string());
        assert!(tx.execute().await.unwrap());
        assert!(set.await.unwrap());
    }

    #[tokio::test]
    async fn test_redirect_leaves_original_direct() {
        let c = container();
        let list = c.get_key::<List<i64>>("l");
        let tx = c.create_transaction();
        let queued = list.with_tx(&tx).push_back(&1);
        assert_eq!(list.push_back(&2).await.unwrap(), 1);
        assert!(tx.execute().await.unwrap());
        assert_eq!(queued.await.unwrap(), 2);
        assert_eq!(list.to_vec().await.unwrap(), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards() {
        let c = container();
        let item = c.get_key::<Item<i64>>("dropped");
        let tx = c.create_transaction();
        let pending = item.with_tx(&tx).set(&1);
        drop(tx);
        assert_eq!(pending.await.unwrap_err(), Error::Discarded);
        assert!(!item.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_proxy_commands_are_queued() {
        let c = container();
        c.get_key::<Item<i64>>("a").set(&1).await.unwrap();
        let tx = c.create_transaction();
        let exists = tx.key_exists("a", true);
        let deleted = tx.delete_keys(&["a", "b"], true);
        assert!(tx.execute().await.unwrap());
        assert!(exists.await.unwrap());
        assert_eq!(deleted.await.unwrap(), 1);
    }
}
