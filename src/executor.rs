//! Command Executor
//!
//! The seam between key objects and whatever actually runs commands: a TCP
//! connection to a store, the in-process [`MemoryStore`](crate::MemoryStore),
//! or a fault-injecting wrapper around either.

use crate::command::{Command, Condition};
use crate::error::{Error, Result};
use crate::resp::RespValue;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Connectivity change notification.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Failed { reason: String },
    Restored,
}

#[async_trait]
pub trait Executor: Send + Sync + 'static {
    /// Runs one command. Error replies come back as [`Error::Server`].
    async fn execute(&self, cmd: Command) -> Result<RespValue>;

    /// Sends every command in one round trip. The outer error is a transport
    /// failure; each inner result is that command's own outcome.
    async fn pipeline(&self, cmds: Vec<Command>) -> Result<Vec<Result<RespValue>>>;

    /// Runs `cmds` atomically if every condition holds.
    ///
    /// Returns `Ok(None)` when a condition failed (or a watched key changed)
    /// and nothing was applied.
    async fn transaction(
        &self,
        conditions: Vec<Condition>,
        cmds: Vec<Command>,
    ) -> Result<Option<Vec<Result<RespValue>>>>;

    fn is_connected(&self) -> bool {
        true
    }

    /// Connectivity notifications, for executors that have a transport.
    fn subscribe(&self) -> Option<broadcast::Receiver<ConnectionEvent>> {
        None
    }
}

/// Turns an error reply into [`Error::Server`].
pub fn check_reply(reply: RespValue) -> Result<RespValue> {
    match reply {
        RespValue::Error(msg) => Err(Error::Server(msg)),
        other => Ok(other),
    }
}
