//! RESP Server
//!
//! Serves a [`MemoryStore`] over TCP so [`RedisConnection`] can be exercised
//! end to end without an external store. Each client gets its own session
//! with WATCH/MULTI/EXEC/DISCARD state; EXEC applies the queued commands
//! under one lock, or replies nil if a watched key changed.
//!
//! [`RedisConnection`]: crate::connection::RedisConnection

use crate::command::Command;
use crate::error::Result;
use crate::memory::MemoryStore;
use crate::resp::{RespCodec, RespValue};
use crate::telemetry::spans::connection_span;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn, Instrument};

const SWEEP_INTERVAL: Duration = Duration::from_millis(100);

pub struct MemoryServer {
    listener: TcpListener,
    store: MemoryStore,
}

impl MemoryServer {
    pub async fn bind(addr: &str, store: MemoryStore) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(MemoryServer { listener, store })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Accepts clients until the task is dropped.
    pub async fn run(self) {
        let sweeper = tokio::spawn(sweep_expired(self.store.clone()));
        match self.listener.local_addr() {
            Ok(addr) => info!("Memory store listening on {}", addr),
            Err(e) => warn!("Memory store listening on unknown address: {}", e),
        }

        let _sweeper = AbortOnDrop(sweeper);
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let client_addr = addr.to_string();
                    let store = self.store.clone();
                    let span = connection_span(&client_addr);
                    tokio::spawn(handle_client(stream, store, client_addr).instrument(span));
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

struct AbortOnDrop(tokio::task::JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn sweep_expired(store: MemoryStore) {
    let mut tick = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        tick.tick().await;
        let evicted = store.evict_expired();
        if evicted > 0 {
            debug!("Evicted {} expired keys", evicted);
        }
    }
}

async fn handle_client(stream: TcpStream, store: MemoryStore, client_addr: String) {
    info!("Client connected: {}", client_addr);
    let mut framed = Framed::new(stream, RespCodec);
    let mut session = Session::new(store);

    while let Some(frame) = framed.next().await {
        let reply = match frame {
            Ok(value) => match Command::from_resp(&value) {
                Ok(cmd) => session.handle(cmd),
                Err(e) => {
                    warn!("Invalid command from {}: {}", client_addr, e);
                    RespValue::Error(format!("ERR {}", e))
                }
            },
            Err(e) => {
                warn!("Unreadable frame from {}: {}", client_addr, e);
                break;
            }
        };
        if let Err(e) = framed.send(reply).await {
            error!("Failed to write response to {}: {}", client_addr, e);
            break;
        }
    }
    info!("Client disconnected: {}", client_addr);
}

/// Per-client transaction state.
struct Session {
    store: MemoryStore,
    watched: Vec<(Bytes, u64)>,
    queued: Option<Vec<Command>>,
}

impl Session {
    fn new(store: MemoryStore) -> Self {
        Session {
            store,
            watched: Vec::new(),
            queued: None,
        }
    }

    fn handle(&mut self, cmd: Command) -> RespValue {
        match cmd.name() {
            "MULTI" => {
                if self.queued.is_some() {
                    return RespValue::err("ERR MULTI calls can not be nested");
                }
                self.queued = Some(Vec::new());
                RespValue::ok()
            }
            "EXEC" => match self.queued.take() {
                None => RespValue::err("ERR EXEC without MULTI"),
                Some(cmds) => {
                    let watched = std::mem::take(&mut self.watched);
                    match self.store.apply_if_unchanged(&watched, &cmds) {
                        Some(replies) => RespValue::Array(Some(replies)),
                        None => {
                            debug!(commands = cmds.len(), "EXEC aborted by watched key");
                            RespValue::Array(None)
                        }
                    }
                }
            },
            "DISCARD" => {
                if self.queued.take().is_none() {
                    return RespValue::err("ERR DISCARD without MULTI");
                }
                self.watched.clear();
                RespValue::ok()
            }
            "WATCH" => {
                if self.queued.is_some() {
                    return RespValue::err("ERR WATCH inside MULTI is not allowed");
                }
                if cmd.args().is_empty() {
                    return RespValue::err("ERR wrong number of arguments for 'watch' command");
                }
                for key in cmd.args() {
                    let version = self.store.version(key);
                    self.watched.push((key.clone(), version));
                }
                RespValue::ok()
            }
            "UNWATCH" => {
                self.watched.clear();
                RespValue::ok()
            }
            _ => match self.queued.as_mut() {
                Some(queue) => {
                    queue.push(cmd);
                    RespValue::SimpleString("QUEUED".to_string())
                }
                None => self.store.apply(&cmd),
            },
        }
    }
}
