//! Fault Injection Tests
//!
//! Connection failures surface to the caller as `Error::Connection` and
//! nothing is retried behind its back.

use redis_objects::fault::faults;
use redis_objects::{
    ConnectionEvent, Container, Error, FaultConfig, FaultyExecutor, Item, MemoryStore, RedisKey,
    Set,
};
use std::sync::Arc;

fn faulty_container(config: FaultConfig) -> (Container, Arc<FaultyExecutor<MemoryStore>>) {
    let faulty = Arc::new(FaultyExecutor::new(MemoryStore::new(), config));
    (Container::new(faulty.clone(), "faults"), faulty)
}

#[tokio::test]
async fn test_reset_surfaces_and_is_not_retried() {
    let (c, faulty) = faulty_container(FaultConfig::partitioned(3));
    let counter = c.get_key::<Item<i64>>("n");
    for _ in 0..5 {
        assert!(matches!(counter.increment(1).await, Err(Error::Connection(_))));
    }
    assert_eq!(faulty.injected(), 5);
    assert!(faulty.inner().is_empty());
}

#[tokio::test]
async fn test_dropped_reply_applied_exactly_once() {
    let mut config = FaultConfig::new(11);
    config.set(faults::DROP_REPLY, 1.0);
    let (c, faulty) = faulty_container(config);
    let counter = c.get_key::<Item<i64>>("n");

    assert!(counter.increment(1).await.unwrap_err().is_connection());
    faulty.set_config(FaultConfig::disabled());
    assert_eq!(counter.get().await.unwrap(), 1);
}

#[tokio::test]
async fn test_transaction_failure_reaches_every_reply() {
    let (c, _) = faulty_container(FaultConfig::partitioned(5));
    let set = c.get_key::<Set<String>>("s");
    let tx = c.create_transaction();
    let a = set.with_tx(&tx).add(&"a".into());
    let b = set.with_tx(&tx).add(&"b".into());
    assert!(tx.execute().await.unwrap_err().is_connection());
    assert!(matches!(a.await, Err(Error::Connection(_))));
    assert!(matches!(b.await, Err(Error::Connection(_))));
}

#[tokio::test]
async fn test_flaky_link_is_deterministic_per_seed() {
    async fn run(seed: u64) -> (Vec<bool>, i64) {
        let (c, faulty) = faulty_container(FaultConfig::flaky(seed));
        let counter = c.get_key::<Item<i64>>("n");
        let mut outcomes = Vec::new();
        for _ in 0..100 {
            outcomes.push(counter.increment(1).await.is_ok());
        }
        faulty.set_config(FaultConfig::disabled());
        (outcomes, counter.get().await.unwrap())
    }

    let (first, stored) = run(2024).await;
    let (second, _) = run(2024).await;
    assert_eq!(first, second);
    // dropped replies were applied, resets were not
    let succeeded = first.iter().filter(|ok| **ok).count() as i64;
    assert!(stored >= succeeded && stored <= 100);
}

#[tokio::test]
async fn test_container_sees_connectivity_events() {
    let (c, faulty) = faulty_container(FaultConfig::partitioned(9));
    let mut events = c.subscribe().unwrap();
    let item = c.get_key::<Item<String>>("k");
    assert!(item.get().await.is_err());
    faulty.set_config(FaultConfig::disabled());
    item.get().await.unwrap();
    assert!(matches!(events.recv().await, Ok(ConnectionEvent::Failed { .. })));
    assert_eq!(events.recv().await, Ok(ConnectionEvent::Restored));
}
