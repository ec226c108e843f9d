//! Ledger-level properties checked against the in-memory store.

use std::sync::Arc;

use common::CatalogItemId;
use futures_util::StreamExt;
use ledger::{LedgerBatch, LedgerError, StockLedger};
use stock_store::{
    Bucket, InMemoryStockStore, MovementOrigin, MovementQuery, StockCounters, Transition,
};

fn balanced(c: &StockCounters) -> bool {
    c.total == c.available + c.in_use + c.dirty
}

#[tokio::test]
async fn invariants_hold_after_every_operation() {
    let ledger = StockLedger::new(InMemoryStockStore::new());
    let item = CatalogItemId::new();
    ledger.register_item(item).await.unwrap();

    let steps: Vec<Result<StockCounters, LedgerError>> = vec![
        ledger.restock(item, 12).await,
        ledger.issue(item, 7).await,
        ledger.soil(item, 5).await,
        ledger.issue(item, 6).await,
        ledger.receive_from_laundry(item, 3).await,
        ledger.write_off(item, 1, Bucket::Dirty).await,
        ledger.write_off(item, 2, Bucket::InUse).await,
        ledger.soil(item, 10).await,
    ];

    for step in &steps {
        if let Ok(counters) = step {
            assert!(balanced(counters));
        }
    }
    let last = ledger.counters(item).await.unwrap();
    assert!(balanced(&last));
    assert_eq!(last.total, 9);
}

#[tokio::test]
async fn audit_log_reconciles_with_counters() {
    let ledger = StockLedger::new(InMemoryStockStore::new());
    let item = CatalogItemId::new();
    let before = ledger.register_item(item).await.unwrap();

    ledger.restock(item, 20).await.unwrap();
    ledger.issue(item, 8).await.unwrap();
    ledger.soil(item, 6).await.unwrap();
    ledger.receive_from_laundry(item, 4).await.unwrap();
    ledger.write_off(item, 1, Bucket::Available).await.unwrap();
    // A rejected call must not leave a record behind
    assert!(ledger.issue(item, 100).await.is_err());

    let after = ledger.counters(item).await.unwrap();
    let records = ledger
        .query_movements(MovementQuery::for_item(item))
        .await
        .unwrap();
    assert_eq!(records.len(), 5);

    let sum = |bucket| records.iter().map(|r| r.delta(bucket)).sum::<i64>();
    assert_eq!(
        sum(Bucket::Available),
        i64::from(after.available) - i64::from(before.available)
    );
    assert_eq!(
        sum(Bucket::InUse),
        i64::from(after.in_use) - i64::from(before.in_use)
    );
    assert_eq!(
        sum(Bucket::Dirty),
        i64::from(after.dirty) - i64::from(before.dirty)
    );
    assert_eq!(
        records.iter().map(|r| r.total_delta()).sum::<i64>(),
        i64::from(after.total) - i64::from(before.total)
    );
}

#[tokio::test]
async fn inner_transitions_conserve_the_total() {
    let ledger = StockLedger::new(InMemoryStockStore::new());
    let item = CatalogItemId::new();
    ledger.register_item(item).await.unwrap();
    ledger.restock(item, 10).await.unwrap();

    for counters in [
        ledger.issue(item, 5).await.unwrap(),
        ledger.soil(item, 3).await.unwrap(),
        ledger.receive_from_laundry(item, 2).await.unwrap(),
    ] {
        assert_eq!(counters.total, 10);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_issues_have_exactly_one_winner() {
    let ledger = Arc::new(StockLedger::new(InMemoryStockStore::new()));
    let item = CatalogItemId::new();
    ledger.register_item(item).await.unwrap();
    ledger.restock(item, 5).await.unwrap();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.issue(item, 5).await })
        })
        .collect();

    let mut successes = 0;
    let mut insufficient = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(LedgerError::InsufficientStock { .. }) => insufficient += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!((successes, insufficient), (1, 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn crossing_batches_do_not_deadlock() {
    let ledger = Arc::new(StockLedger::new(InMemoryStockStore::new()));
    let a = CatalogItemId::new();
    let b = CatalogItemId::new();
    for item in [a, b] {
        ledger.register_item(item).await.unwrap();
        ledger.restock(item, 100).await.unwrap();
    }

    // Transitions listed in opposite orders; locking is by id regardless.
    let handles: Vec<_> = (0..20)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            let (first, second) = if i % 2 == 0 { (a, b) } else { (b, a) };
            tokio::spawn(async move {
                ledger
                    .commit(
                        LedgerBatch::new(MovementOrigin::Manual)
                            .push(Transition::issue(first, 1))
                            .push(Transition::issue(second, 1)),
                    )
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(ledger.counters(a).await.unwrap().in_use, 20);
    assert_eq!(ledger.counters(b).await.unwrap().in_use, 20);
}

#[tokio::test]
async fn stream_matches_query() {
    let ledger = StockLedger::new(InMemoryStockStore::new());
    let item = CatalogItemId::new();
    ledger.register_item(item).await.unwrap();
    ledger.restock(item, 3).await.unwrap();
    ledger.issue(item, 1).await.unwrap();

    let queried = ledger.query_movements(MovementQuery::new()).await.unwrap();
    let streamed: Vec<_> = ledger
        .stream_movements(MovementQuery::new())
        .await
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
        .await;
    assert_eq!(queried, streamed);
}
