//! Transactions, Batches and Key-Level Commands
//!
//! [`Transaction`] and [`Batch`] collect commands from key objects bound to
//! them and send the whole lot on `execute()`. A transaction is atomic and
//! can carry [`Condition`](crate::Condition)s; a batch is only pipelined.
//!
//! [`Proxy`] is the small set of key-level commands that the container,
//! transactions and batches all answer to.

mod batch;
mod transaction;

pub use batch::Batch;
pub use transaction::Transaction;

use crate::command::Command;
use crate::error::{Error, Result};
use crate::keys::qualify;
use crate::pending::Pending;
use crate::resp::RespValue;
use tokio::sync::oneshot;

/// A command waiting for its transaction or batch to execute.
pub(crate) struct Queued {
    pub(crate) cmd: Command,
    pub(crate) reply: oneshot::Sender<Result<RespValue>>,
}

impl Queued {
    pub(crate) fn new(cmd: Command) -> (Queued, Pending<RespValue>) {
        let (tx, rx) = oneshot::channel();
        // A dropped sender means the queue was discarded unexecuted.
        let pending = Pending::new(async move { rx.await.unwrap_or(Err(Error::Discarded)) });
        (Queued { cmd, reply: tx }, pending)
    }
}

/// Delivers replies in queue order. Senders without a reply see
/// [`Error::Discarded`].
pub(crate) fn deliver(queued: Vec<oneshot::Sender<Result<RespValue>>>, replies: Vec<Result<RespValue>>) {
    for (sender, reply) in queued.into_iter().zip(replies) {
        let _ = sender.send(reply);
    }
}

pub(crate) fn fail_all(queued: Vec<oneshot::Sender<Result<RespValue>>>, err: &Error) {
    for sender in queued {
        let _ = sender.send(Err(err.clone()));
    }
}

fn key_names(namespace: &str, names: &[&str], use_namespace: bool) -> Result<Vec<String>> {
    if names.is_empty() {
        return Err(Error::invalid_argument("no key names given"));
    }
    Ok(names
        .iter()
        .map(|n| if use_namespace { qualify(namespace, n) } else { n.to_string() })
        .collect())
}

/// Key-level commands by name.
///
/// With `use_namespace` the name is qualified with the namespace the same
/// way key objects are; without it the name is used as-is.
pub trait Proxy {
    fn namespace(&self) -> &str;

    /// Sends a raw command through this proxy's target.
    fn send_command(&self, cmd: Command) -> Pending<RespValue>;

    fn is_connected(&self) -> bool;

    fn key_exists(&self, name: &str, use_namespace: bool) -> Pending<bool> {
        match key_names(self.namespace(), &[name], use_namespace) {
            Ok(keys) => self
                .send_command(Command::new("EXISTS").args_from(keys))
                .map(RespValue::into_bool),
            Err(e) => Pending::failed(e),
        }
    }

    /// Resolves to how many of `names` exist.
    fn keys_exist(&self, names: &[&str], use_namespace: bool) -> Pending<i64> {
        match key_names(self.namespace(), names, use_namespace) {
            Ok(keys) => self
                .send_command(Command::new("EXISTS").args_from(keys))
                .map(RespValue::into_int),
            Err(e) => Pending::failed(e),
        }
    }

    fn delete_key(&self, name: &str, use_namespace: bool) -> Pending<bool> {
        match key_names(self.namespace(), &[name], use_namespace) {
            Ok(keys) => self
                .send_command(Command::new("DEL").args_from(keys))
                .map(RespValue::into_bool),
            Err(e) => Pending::failed(e),
        }
    }

    /// Resolves to how many of `names` were deleted.
    fn delete_keys(&self, names: &[&str], use_namespace: bool) -> Pending<i64> {
        match key_names(self.namespace(), names, use_namespace) {
            Ok(keys) => self
                .send_command(Command::new("DEL").args_from(keys))
                .map(RespValue::into_int),
            Err(e) => Pending::failed(e),
        }
    }
}
