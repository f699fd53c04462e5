//! Transaction and Batch Tests

mod common;

use common::memory_container;
use redis_objects::{Condition, Error, Hash, Item, List, Proxy, RedisKey, Set, SortedSet};

// ============================================================================
// Transactions
// ============================================================================

#[tokio::test]
async fn test_failed_precondition_applies_nothing() {
    let (c, store) = memory_container("tx");
    let list = c.get_key::<List<String>>("inbox");
    let marker = c.get_key::<Item<String>>("marker");
    marker.set(&"present".into()).await.unwrap();

    let tx = c.create_transaction();
    tx.add_condition(Condition::key_not_exists(marker.full_name().unwrap()));
    let first = list.with_tx(&tx).push_back(&"one".into());
    let second = list.with_tx(&tx).push_back(&"two".into());

    assert!(!tx.execute().await.unwrap());
    assert!(matches!(first.await, Err(Error::Discarded)));
    assert!(matches!(second.await, Err(Error::Discarded)));
    assert_eq!(list.len().await.unwrap(), 0);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_commit_resolves_every_reply() {
    let (c, _) = memory_container("tx");
    let balance = c.get_key::<Hash<String, i64>>("balances");
    balance.set(&"alice".into(), &100).await.unwrap();

    let tx = c.create_transaction();
    tx.add_condition(Condition::hash_field_equal(
        balance.full_name().unwrap(),
        "alice",
        100i64,
    ));
    let debit = tx.enqueue(&*balance, |b| b.decrement(&"alice".into(), 30));
    let credit = tx.enqueue(&*balance, |b| b.increment(&"bob".into(), 30));
    assert_eq!(tx.queued_len(), 2);

    assert!(tx.execute().await.unwrap());
    assert_eq!(debit.await.unwrap(), 70);
    assert_eq!(credit.await.unwrap(), 30);
    assert_eq!(tx.queued_len(), 0);
}

#[tokio::test]
async fn test_conditions_reset_between_rounds() {
    let (c, _) = memory_container("tx");
    let seen = c.get_key::<Set<String>>("seen");
    let tx = c.create_transaction();

    tx.add_condition(Condition::set_contains(seen.full_name().unwrap(), "x"));
    let skipped = seen.with_tx(&tx).add(&"y".into());
    assert!(!tx.execute().await.unwrap());
    assert!(skipped.await.is_err());

    let added = seen.with_tx(&tx).add(&"y".into());
    assert!(tx.execute().await.unwrap());
    assert!(added.await.unwrap());
}

#[tokio::test]
async fn test_redirect_leaves_original_direct() {
    let (c, _) = memory_container("tx");
    let item = c.get_key::<Item<i64>>("n");
    let tx = c.create_transaction();
    let queued = item.with_tx(&tx).increment(1);

    // the key itself still talks to the store right away
    assert_eq!(item.increment(10).await.unwrap(), 10);
    assert!(tx.execute().await.unwrap());
    assert_eq!(queued.await.unwrap(), 11);
}

#[tokio::test]
async fn test_sorted_set_condition() {
    let (c, _) = memory_container("tx");
    let board = c.get_key::<SortedSet<String>>("board");
    board.add(&"ann".into(), 1.0).await.unwrap();

    let tx = c.create_transaction();
    tx.add_condition(Condition::sorted_set_contains(board.full_name().unwrap(), "ann"));
    tx.add_condition(Condition::list_length_equal(c.get_key::<List<i64>>("empty").full_name().unwrap(), 0));
    let bumped = board.with_tx(&tx).increment_score(&"ann".into(), 2.0);
    assert!(tx.execute().await.unwrap());
    assert_eq!(bumped.await.unwrap(), 3.0);
}

#[tokio::test]
async fn test_proxy_commands_in_transaction() {
    let (c, _) = memory_container("tx");
    c.get_key::<Item<i64>>("a").set(&1).await.unwrap();
    c.get_key::<Item<i64>>("b").set(&2).await.unwrap();

    let tx = c.create_transaction();
    let counted = tx.keys_exist(&["a", "b", "c"], true);
    let deleted = tx.delete_keys(&["a", "b"], true);
    assert!(tx.execute().await.unwrap());
    assert_eq!(counted.await.unwrap(), 2);
    assert_eq!(deleted.await.unwrap(), 2);
    assert!(!c.key_exists("a", true).await.unwrap());
}

// ============================================================================
// Batches
// ============================================================================

#[tokio::test]
async fn test_batch_replies_resolve_in_order() {
    let (c, _) = memory_container("batch");
    let list = c.get_key::<List<i64>>("numbers");
    let batch = c.create_batch();
    let pushes: Vec<_> = (1..=5).map(|n| list.with_batch(&batch).push_back(&n)).collect();
    let total = batch.enqueue(&*list, |l| l.len());

    batch.execute().await.unwrap();
    for (expected, push) in (1..=5).zip(pushes) {
        assert_eq!(push.await.unwrap(), expected);
    }
    assert_eq!(total.await.unwrap(), 5);
}

#[tokio::test]
async fn test_dropped_batch_discards_replies() {
    let (c, store) = memory_container("batch");
    let item = c.get_key::<Item<String>>("never");
    let pending = {
        let batch = c.create_batch();
        let pending = item.with_batch(&batch).set(&"x".into());
        drop(batch);
        pending
    };
    assert!(matches!(pending.await, Err(Error::Discarded)));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_empty_key_list_is_rejected_before_sending() {
    let (c, _) = memory_container("batch");
    let batch = c.create_batch();
    assert!(matches!(batch.delete_keys(&[], true).await, Err(Error::InvalidArgument(_))));
    assert_eq!(batch.queued_len(), 0);
}
