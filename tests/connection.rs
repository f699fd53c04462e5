//! Connection Tests
//!
//! Key objects, transactions and batches over a real TCP connection to a
//! `MemoryServer`.

mod common;

use common::{spawn_server, tcp_container};
use redis_objects::{
    Condition, ConnectionEvent, Container, Error, Executor, Hash, Item, List, MemoryStore,
    RedisConnection, RedisKey, SortedSet,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_round_trip_over_tcp() {
    let (config, server) = spawn_server(MemoryStore::new()).await;
    let c = tcp_container(&config.clone().with_namespace("tcp"));

    let item = c.get_key::<Item<String>>("greeting");
    item.set(&"Hello world".into()).await.unwrap();
    item.set_range(6, &"Dolly".into()).await.unwrap();
    assert_eq!(item.get().await.unwrap(), "Hello Dolly");

    let hash = c.get_key::<Hash<String, f64>>("prices");
    hash.set(&"tea".into(), &2.5).await.unwrap();
    assert_eq!(hash.increment_by_float(&"tea".into(), 0.25).await.unwrap(), 2.75);

    let board = c.get_key::<SortedSet<String>>("board");
    board.add(&"a".into(), 2.0).await.unwrap();
    board.add(&"b".into(), 1.0).await.unwrap();
    assert_eq!(
        board.range_with_scores(0, -1, redis_objects::Order::Ascending).await.unwrap(),
        vec![("b".to_string(), 1.0), ("a".to_string(), 2.0)]
    );
    server.abort();
}

#[tokio::test]
async fn test_server_errors_do_not_break_the_connection() {
    let (config, server) = spawn_server(MemoryStore::new()).await;
    let c = tcp_container(&config);
    let text = c.get_key::<Item<String>>("text");
    text.set(&"abc".into()).await.unwrap();
    assert!(matches!(text.increment(1).await, Err(Error::Server(_))));
    assert_eq!(text.len().await.unwrap(), 3);
    server.abort();
}

#[tokio::test]
async fn test_conditional_transaction_over_tcp() {
    let store = MemoryStore::new();
    let (config, server) = spawn_server(store.clone()).await;
    let c = tcp_container(&config);
    let list = c.get_key::<List<i64>>("jobs");
    let guard = c.get_key::<Item<String>>("guard");

    let tx = c.create_transaction();
    tx.add_condition(Condition::key_not_exists(guard.full_name().unwrap()));
    let pushed = list.with_tx(&tx).push_back_many(&[1, 2]);
    let set = guard.with_tx(&tx).set(&"taken".into());
    assert!(tx.execute().await.unwrap());
    assert_eq!(pushed.await.unwrap(), 2);
    assert!(set.await.unwrap());

    // the guard now exists, so a second round aborts
    tx.add_condition(Condition::key_not_exists(guard.full_name().unwrap()));
    let again = list.with_tx(&tx).push_back(&3);
    assert!(!tx.execute().await.unwrap());
    assert!(matches!(again.await, Err(Error::Discarded)));
    assert_eq!(list.to_vec().await.unwrap(), vec![1, 2]);
    server.abort();
}

#[tokio::test]
async fn test_batch_over_tcp() {
    let (config, server) = spawn_server(MemoryStore::new()).await;
    let c = tcp_container(&config);
    let counter = c.get_key::<Item<i64>>("n");
    let batch = c.create_batch();
    let replies: Vec<_> = (0..10).map(|_| counter.with_batch(&batch).increment(1)).collect();
    batch.execute().await.unwrap();
    let mut last = 0;
    for reply in replies {
        last = reply.await.unwrap();
    }
    assert_eq!(last, 10);
    server.abort();
}

#[tokio::test]
async fn test_reconnects_after_server_restart() {
    let store = MemoryStore::new();
    let (config, server) = spawn_server(store.clone()).await;
    let conn = Arc::new(RedisConnection::new(config.clone()));
    let c = Container::with_config(conn.clone(), &config);
    let mut events = c.subscribe().unwrap();
    let item = c.get_key::<Item<i64>>("n");
    item.set(&1).await.unwrap();
    assert!(conn.is_connected());

    // stop accepting and drop the live socket
    server.abort();
    let _ = server.await;
    conn.close().await;

    let err = item.get().await.unwrap_err();
    assert!(err.is_connection());
    assert!(!conn.is_connected());
    assert!(matches!(events.recv().await, Ok(ConnectionEvent::Failed { .. })));

    // bring the store back on the same address
    let restarted = redis_objects::MemoryServer::bind(&config.addr, store).await.unwrap();
    let server = tokio::spawn(restarted.run());
    assert_eq!(item.get().await.unwrap(), 1);
    assert_eq!(events.recv().await, Ok(ConnectionEvent::Restored));
    server.abort();
}

#[tokio::test]
async fn test_unreachable_store_surfaces_connection_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let config = redis_objects::StoreConfig::new(addr).with_connect_timeout(Duration::from_millis(500));
    let c = tcp_container(&config);
    let item = c.get_key::<Item<i64>>("n");
    assert!(matches!(item.increment(1).await, Err(Error::Connection(_))));

    let batch = c.create_batch();
    let queued = item.with_batch(&batch).increment(1);
    assert!(batch.execute().await.unwrap_err().is_connection());
    assert!(matches!(queued.await, Err(Error::Connection(_))));
}
