//! Concurrent access tests
//!
//! Many writers drawing from one batch must never overdraw it, and every
//! commit must leave balances, audit logs and distributions in agreement.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{breeding, exportation, harvest_input, kg, Ledger};
use rust_decimal::Decimal;
use shared::{DistributionPatch, HarvestBatchPatch};
use verdex_backend::store::TransactionConfig;
use verdex_backend::AppError;

fn contended_config() -> TransactionConfig {
    TransactionConfig {
        max_attempts: 50,
        attempt_timeout: Duration::from_secs(5),
        retry_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(20),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_never_overdraw() {
    let ledger = Arc::new(Ledger::with_config(contended_config()));
    let batch = ledger
        .harvests
        .create_harvest_batch(harvest_input("Tiwala 6", 100), "ana")
        .await
        .unwrap();

    // 20 requests of 7kg against 100kg: exactly 14 fit
    let mut handles = Vec::new();
    for i in 0..20 {
        let ledger = Arc::clone(&ledger);
        let seed_batch_id = batch.seed_batch_id.clone();
        handles.push(tokio::spawn(async move {
            let input = if i % 2 == 0 {
                exportation(&seed_batch_id, kg(7))
            } else {
                breeding(&seed_batch_id, kg(7))
            };
            ledger.distributions.create_distribution(input, "ben").await
        }));
    }

    let mut succeeded = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(AppError::InsufficientBalance { .. }) => rejected += 1,
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }
    // Retries must not give up on requests that still fit
    assert_eq!(succeeded, 14);
    assert_eq!(rejected, 6);

    let b = ledger.harvests.get_harvest_batch(batch.id).await.unwrap();
    assert_eq!(b.balance, kg(2));
    assert_eq!(b.out_quantity, kg(98));
    assert_eq!(b.logs.len(), 14);
    ledger.assert_consistent().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mixed_operations_stay_consistent() {
    let ledger = Arc::new(Ledger::with_config(contended_config()));
    let batch = ledger
        .harvests
        .create_harvest_batch(harvest_input("Tiwala 6", 60), "ana")
        .await
        .unwrap();

    // 40kg left after seeding; the racing writers draw at most 20 more in
    // any order, so every one of them must commit
    let mut seeded = Vec::new();
    for _ in 0..4 {
        let d = ledger
            .distributions
            .create_distribution(exportation(&batch.seed_batch_id, kg(5)), "ben")
            .await
            .unwrap();
        seeded.push(d.id);
    }

    let mut handles = Vec::new();
    let (deleted, updated) = (seeded[0], seeded[1]);
    for (i, id) in seeded.into_iter().enumerate() {
        let ledger = Arc::clone(&ledger);
        let seed_batch_id = batch.seed_batch_id.clone();
        handles.push(tokio::spawn(async move {
            match i {
                0 => ledger.distributions.delete_distribution(id).await.map(|_| ()),
                1 => {
                    let patch = DistributionPatch {
                        quantity: Some(kg(9)),
                        ..DistributionPatch::default()
                    };
                    ledger.distributions.update_distribution(id, patch).await.map(|_| ())
                }
                _ => ledger
                    .distributions
                    .create_distribution(breeding(&seed_batch_id, kg(8)), "ben")
                    .await
                    .map(|_| ()),
            }
        }));
    }
    // A batch edit racing with the distribution writers
    {
        let ledger = Arc::clone(&ledger);
        let id = batch.id;
        handles.push(tokio::spawn(async move {
            let patch = HarvestBatchPatch {
                remarks: Some("Re-weighed".into()),
                ..HarvestBatchPatch::default()
            };
            ledger.harvests.update_harvest_batch(id, patch).await.map(|_| ())
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // 60 - (5 + 5 + 9 + 8 + 8)
    let b = ledger.harvests.get_harvest_batch(batch.id).await.unwrap();
    assert_eq!(b.balance, kg(25));
    assert_eq!(b.out_quantity, kg(35));
    assert_eq!(b.logs.len(), 5);
    assert_eq!(b.remarks, "Re-weighed");

    let d = ledger.distributions.get_distribution(updated).await.unwrap();
    assert_eq!(d.quantity, kg(9));
    assert!(matches!(
        ledger.distributions.get_distribution(deleted).await,
        Err(AppError::NotFound(_))
    ));
    ledger.assert_consistent().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_on_separate_batches_all_succeed() {
    let ledger = Arc::new(Ledger::with_config(contended_config()));
    let mut batches = Vec::new();
    for variety in ["Tiwala 6", "Tiwala 10", "PSB Sy 2"] {
        batches.push(
            ledger
                .harvests
                .create_harvest_batch(harvest_input(variety, 30), "ana")
                .await
                .unwrap(),
        );
    }

    let mut handles = Vec::new();
    for batch in &batches {
        for _ in 0..3 {
            let ledger = Arc::clone(&ledger);
            let seed_batch_id = batch.seed_batch_id.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .distributions
                    .create_distribution(exportation(&seed_batch_id, kg(10)), "ben")
                    .await
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for batch in &batches {
        let b = ledger.harvests.get_harvest_batch(batch.id).await.unwrap();
        assert_eq!(b.balance, Decimal::ZERO);
        assert_eq!(b.logs.len(), 3);
    }
    ledger.assert_consistent().await;
}
