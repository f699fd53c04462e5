//! Store Connection
//!
//! One multiplexed TCP connection speaking RESP2. Commands are serialized
//! through an async mutex so each request/reply pair (or pipeline) owns the
//! socket for its round trip.
//!
//! The socket is opened lazily. Any transport or framing failure drops it,
//! fails the command in flight with [`Error::Connection`] and broadcasts
//! [`ConnectionEvent::Failed`]; the next command reconnects and broadcasts
//! [`ConnectionEvent::Restored`]. Nothing is retried.
//!
//! A request whose future is dropped before its replies are read (a caller
//! timeout, say) leaves those replies on the wire. The socket is marked in
//! flight for the whole round trip and a marked socket is never reused.

use crate::command::{Command, Condition};
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::executor::{check_reply, ConnectionEvent, Executor};
use crate::resp::{RespCodec, RespValue};
use crate::telemetry::spans::command_span;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex, MutexGuard};
use tokio_util::codec::Framed;
use tracing::{debug, info, trace, warn, Instrument};

type Transport = Framed<TcpStream, RespCodec>;

struct Link {
    framed: Transport,
    /// Set while a round trip owns the socket.
    in_flight: bool,
}

static SHARED: OnceCell<Arc<RedisConnection>> = OnceCell::new();

pub struct RedisConnection {
    config: StoreConfig,
    transport: Mutex<Option<Link>>,
    connected: AtomicBool,
    failed: AtomicBool,
    events: broadcast::Sender<ConnectionEvent>,
}

impl std::fmt::Debug for RedisConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConnection")
            .field("addr", &self.config.addr)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish()
    }
}

impl RedisConnection {
    pub fn new(config: StoreConfig) -> Self {
        let (events, _) = broadcast::channel(16);
        RedisConnection {
            config,
            transport: Mutex::new(None),
            connected: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            events,
        }
    }

    /// The process-wide connection. The first call's `config` wins; later
    /// calls get the same instance whatever they pass.
    pub fn shared(config: StoreConfig) -> Arc<RedisConnection> {
        Arc::clone(SHARED.get_or_init(|| Arc::new(RedisConnection::new(config))))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Drops the socket. The next command reconnects.
    pub async fn close(&self) {
        let mut transport = self.transport.lock().await;
        if transport.take().is_some() {
            info!(addr = %self.config.addr, "connection closed");
        }
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn open(&self) -> Result<Link> {
        let addr = &self.config.addr;
        let stream = tokio::time::timeout(self.config.connect_timeout(), TcpStream::connect(addr))
            .await
            .map_err(|_| Error::Connection(format!("connect to {} timed out", addr)))?
            .map_err(|e| Error::Connection(format!("connect to {}: {}", addr, e)))?;
        stream.set_nodelay(true)?;
        Ok(Link {
            framed: Framed::new(stream, RespCodec),
            in_flight: false,
        })
    }

    /// Locks the transport, connecting first if needed. A socket left in
    /// flight by a cancelled request is replaced.
    async fn acquire(&self) -> Result<MutexGuard<'_, Option<Link>>> {
        let mut guard = self.transport.lock().await;
        if guard.as_ref().map_or(false, |link| link.in_flight) {
            debug!(addr = %self.config.addr, "dropping socket abandoned mid-request");
            *guard = None;
            self.connected.store(false, Ordering::SeqCst);
        }
        if guard.is_none() {
            match self.open().await {
                Ok(link) => {
                    *guard = Some(link);
                    self.connected.store(true, Ordering::SeqCst);
                    if self.failed.swap(false, Ordering::SeqCst) {
                        info!(addr = %self.config.addr, "connection restored");
                        let _ = self.events.send(ConnectionEvent::Restored);
                    }
                }
                Err(e) => {
                    self.mark_failed(&e);
                    return Err(e);
                }
            }
        }
        Ok(guard)
    }

    fn mark_failed(&self, err: &Error) {
        self.connected.store(false, Ordering::SeqCst);
        if !self.failed.swap(true, Ordering::SeqCst) {
            warn!(addr = %self.config.addr, error = %err, "connection failed");
            let _ = self.events.send(ConnectionEvent::Failed {
                reason: err.to_string(),
            });
        }
    }

    /// Runs `f` against the live transport. A failure other than an error
    /// reply leaves the stream in an unknown state, so it is dropped.
    async fn with_transport<T, F>(&self, f: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a mut Transport) -> futures::future::BoxFuture<'a, Result<T>>,
    {
        let mut guard = self.acquire().await?;
        let link = match guard.as_mut() {
            Some(link) => link,
            None => return Err(Error::Connection("not connected".into())),
        };
        link.in_flight = true;
        let result = f(&mut link.framed).await;
        link.in_flight = false;
        match result {
            Err(e) if !matches!(e, Error::Server(_)) => {
                *guard = None;
                let err = match e {
                    Error::Connection(_) => e,
                    other => Error::Connection(other.to_string()),
                };
                self.mark_failed(&err);
                Err(err)
            }
            result => result,
        }
    }
}

/// Writes every command, flushes once, then reads one reply per command.
async fn round_trip(transport: &mut Transport, cmds: Vec<Command>) -> Result<Vec<RespValue>> {
    let count = cmds.len();
    for cmd in cmds {
        transport.feed(cmd).await?;
    }
    SinkExt::<Command>::flush(transport).await?;
    let mut replies = Vec::with_capacity(count);
    for _ in 0..count {
        match transport.next().await {
            Some(reply) => replies.push(reply?),
            None => return Err(Error::Connection("connection closed by peer".into())),
        }
    }
    Ok(replies)
}

/// WATCH + condition checks, then MULTI ... EXEC.
async fn run_transaction(
    transport: &mut Transport,
    conditions: Vec<Condition>,
    cmds: Vec<Command>,
) -> Result<Option<Vec<Result<RespValue>>>> {
    if !conditions.is_empty() {
        let mut keys: Vec<&str> = conditions.iter().map(Condition::key).collect();
        keys.sort_unstable();
        keys.dedup();
        let mut checks = vec![Command::new("WATCH").args_from(keys)];
        checks.extend(conditions.iter().map(Condition::check_command));
        let mut replies = round_trip(transport, checks).await?.into_iter();
        if let Some(watch) = replies.next() {
            check_reply(watch)?;
        }
        for (condition, reply) in conditions.iter().zip(replies) {
            if !condition.holds(&reply) {
                trace!(key = condition.key(), "precondition failed");
                round_trip(transport, vec![Command::new("UNWATCH")]).await?;
                return Ok(None);
            }
        }
    }

    let mut all = Vec::with_capacity(cmds.len() + 2);
    all.push(Command::new("MULTI"));
    all.extend(cmds);
    all.push(Command::new("EXEC"));
    let mut replies = round_trip(transport, all).await?;
    let exec = replies
        .pop()
        .ok_or_else(|| Error::protocol("missing EXEC reply"))?;
    match exec {
        // A watched key changed between the checks and EXEC.
        RespValue::Array(None) => Ok(None),
        RespValue::Array(Some(items)) => Ok(Some(items.into_iter().map(check_reply).collect())),
        RespValue::Error(e) => Err(Error::Server(e)),
        other => Err(Error::protocol(format!("unexpected EXEC reply: {:?}", other))),
    }
}

#[async_trait]
impl Executor for RedisConnection {
    async fn execute(&self, cmd: Command) -> Result<RespValue> {
        let key = cmd.args().first().map(|k| String::from_utf8_lossy(k).into_owned());
        let span = command_span(cmd.name(), key.as_deref());
        async move {
            trace!(command = %cmd, "dispatch");
            let mut replies = self
                .with_transport(|t| Box::pin(round_trip(t, vec![cmd])))
                .await?;
            match replies.pop() {
                Some(reply) => check_reply(reply),
                None => Err(Error::protocol("missing reply")),
            }
        }
        .instrument(span)
        .await
    }

    async fn pipeline(&self, cmds: Vec<Command>) -> Result<Vec<Result<RespValue>>> {
        if cmds.is_empty() {
            return Ok(Vec::new());
        }
        trace!(commands = cmds.len(), "dispatch pipeline");
        let replies = self.with_transport(|t| Box::pin(round_trip(t, cmds))).await?;
        Ok(replies.into_iter().map(check_reply).collect())
    }

    async fn transaction(
        &self,
        conditions: Vec<Condition>,
        cmds: Vec<Command>,
    ) -> Result<Option<Vec<Result<RespValue>>>> {
        trace!(commands = cmds.len(), conditions = conditions.len(), "dispatch transaction");
        self.with_transport(|t| Box::pin(run_transaction(t, conditions, cmds)))
            .await
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ConnectionEvent>> {
        Some(self.events.subscribe())
    }
}
