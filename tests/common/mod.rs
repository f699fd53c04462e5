#![allow(dead_code)]

use redis_objects::{Container, MemoryServer, MemoryStore, RedisConnection, StoreConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Container over a fresh in-process store.
pub fn memory_container(namespace: &str) -> (Container, MemoryStore) {
    let store = MemoryStore::new();
    let container = Container::new(Arc::new(store.clone()), namespace);
    (container, store)
}

/// Starts a `MemoryServer` on an ephemeral port.
pub async fn spawn_server(store: MemoryStore) -> (StoreConfig, JoinHandle<()>) {
    let server = MemoryServer::bind("127.0.0.1:0", store)
        .await
        .expect("bind memory server");
    let addr = server.local_addr().expect("local addr");
    let handle = tokio::spawn(server.run());
    let config = StoreConfig::new(addr.to_string()).with_connect_timeout(Duration::from_secs(2));
    (config, handle)
}

/// Container over its own connection to `config.addr`, so tests talking to
/// different servers do not share the process-wide connection.
pub fn tcp_container(config: &StoreConfig) -> Container {
    Container::with_config(Arc::new(RedisConnection::new(config.clone())), config)
}
