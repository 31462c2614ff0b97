//! Ledger engine integration tests
//!
//! Covers:
//! - Balance and audit log bookkeeping across create/update/delete
//! - Cascading batch deletion and seed batch id renames
//! - Delete symmetry and idempotent recompute
//! - Failure paths leaving the ledger untouched

mod common;

use chrono::Utc;
use common::{breeding, exportation, harvest_input, kg, Ledger};
use rust_decimal::Decimal;
use shared::{BatchStatus, DistributionPatch, HarvestBatchPatch};
use uuid::Uuid;
use verdex_backend::store::{ChangeSet, LedgerStore, Mutation};
use verdex_backend::AppError;

// ============================================================================
// Distribution Scenario
// ============================================================================

#[tokio::test]
async fn test_distribution_lifecycle_scenario() {
    let ledger = Ledger::new();
    let batch = ledger
        .harvests
        .create_harvest_batch(harvest_input("Tiwala 6", 100), "ana")
        .await
        .unwrap();
    assert_eq!(batch.seed_batch_id, "2023-09-SB-TIWALA_6");
    assert_eq!(batch.balance, kg(100));

    // Distribute 30 for export
    let first = ledger
        .distributions
        .create_distribution(exportation(&batch.seed_batch_id, kg(30)), "ben")
        .await
        .unwrap();
    let b = ledger.harvests.get_harvest_batch(batch.id).await.unwrap();
    assert_eq!(b.balance, kg(70));
    assert_eq!(b.out_quantity, kg(30));
    assert_eq!(b.status, BatchStatus::Active);
    assert_eq!(b.logs.len(), 1);
    assert_eq!(b.logs[0].quantity, kg(-30));
    assert_eq!(
        b.logs[0].note,
        "Distributed 30kg to Juan dela Cruz (PhilRice) for Field trial"
    );

    // Distribute the remaining 70 for breeding
    let second = ledger
        .distributions
        .create_distribution(breeding(&batch.seed_batch_id, kg(70)), "ben")
        .await
        .unwrap();
    let b = ledger.harvests.get_harvest_batch(batch.id).await.unwrap();
    assert_eq!(b.balance, Decimal::ZERO);
    assert_eq!(b.status, BatchStatus::Depleted);

    // One more kilogram is refused
    let err = ledger
        .distributions
        .create_distribution(exportation(&batch.seed_batch_id, kg(1)), "ben")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientBalance { .. }));
    let b = ledger.harvests.get_harvest_batch(batch.id).await.unwrap();
    assert_eq!(b.balance, Decimal::ZERO);
    assert_eq!(b.logs.len(), 2);

    // Shrink the breeding distribution from 70 to 50
    let patch = DistributionPatch {
        quantity: Some(kg(50)),
        ..DistributionPatch::default()
    };
    ledger.distributions.update_distribution(second.id, patch).await.unwrap();
    let b = ledger.harvests.get_harvest_batch(batch.id).await.unwrap();
    assert_eq!(b.balance, kg(20));
    assert_eq!(b.out_quantity, kg(80));
    assert_eq!(b.status, BatchStatus::Active);
    assert_eq!(b.log_for(second.id).unwrap().quantity, kg(-50));

    // Delete the export distribution
    let deletion = ledger.distributions.delete_distribution(first.id).await.unwrap();
    assert_eq!(deletion.updated_batch_id, batch.id);
    let b = ledger.harvests.get_harvest_batch(batch.id).await.unwrap();
    assert_eq!(b.balance, kg(50));
    assert_eq!(b.out_quantity, kg(50));
    assert!(b.log_for(first.id).is_none());
    assert_eq!(b.logs.len(), 1);

    ledger.assert_consistent().await;
}

// ============================================================================
// Delete Symmetry and Idempotent Recompute
// ============================================================================

#[tokio::test]
async fn test_create_then_delete_restores_batch() {
    let ledger = Ledger::new();
    let batch = ledger
        .harvests
        .create_harvest_batch(harvest_input("Tiwala 6", 100), "ana")
        .await
        .unwrap();
    ledger
        .distributions
        .create_distribution(exportation(&batch.seed_batch_id, kg(12)), "ben")
        .await
        .unwrap();
    let before = ledger.harvests.get_harvest_batch(batch.id).await.unwrap();

    let d = ledger
        .distributions
        .create_distribution(breeding(&batch.seed_batch_id, Decimal::new(255, 1)), "ben")
        .await
        .unwrap();
    ledger.distributions.delete_distribution(d.id).await.unwrap();

    let after = ledger.harvests.get_harvest_batch(batch.id).await.unwrap();
    assert_eq!(after.balance, before.balance);
    assert_eq!(after.out_quantity, before.out_quantity);
    assert_eq!(after.logs, before.logs);
    ledger.assert_consistent().await;
}

#[tokio::test]
async fn test_update_with_current_values_is_noop() {
    let ledger = Ledger::new();
    let batch = ledger
        .harvests
        .create_harvest_batch(harvest_input("Tiwala 6", 100), "ana")
        .await
        .unwrap();
    let d = ledger
        .distributions
        .create_distribution(exportation(&batch.seed_batch_id, kg(40)), "ben")
        .await
        .unwrap();
    let before = ledger.harvests.get_harvest_batch(batch.id).await.unwrap();

    let patch = DistributionPatch {
        quantity: Some(d.quantity),
        purpose: Some(d.purpose.clone()),
        recipient_name: Some("Juan dela Cruz".into()),
        affiliation: Some("PhilRice".into()),
        ..DistributionPatch::default()
    };
    let updated = ledger.distributions.update_distribution(d.id, patch).await.unwrap();
    assert_eq!(updated, d);

    let after = ledger.harvests.get_harvest_batch(batch.id).await.unwrap();
    assert_eq!(after.balance, before.balance);
    assert_eq!(after.out_quantity, before.out_quantity);
    assert_eq!(after.logs, before.logs);
}

#[tokio::test]
async fn test_update_rewrites_log_entry_fields() {
    let ledger = Ledger::new();
    let batch = ledger
        .harvests
        .create_harvest_batch(harvest_input("Tiwala 6", 100), "ana")
        .await
        .unwrap();
    let d = ledger
        .distributions
        .create_distribution(breeding(&batch.seed_batch_id, kg(10)), "ben")
        .await
        .unwrap();
    let logged_at = ledger.harvests.get_harvest_batch(batch.id).await.unwrap().logs[0].date;

    let patch = DistributionPatch {
        requested_by: Some("Dr. Santos".into()),
        remarks: Some("Collected in person".into()),
        ..DistributionPatch::default()
    };
    ledger.distributions.update_distribution(d.id, patch).await.unwrap();

    let b = ledger.harvests.get_harvest_batch(batch.id).await.unwrap();
    let entry = b.log_for(d.id).unwrap();
    assert_eq!(entry.note, "Distributed 10kg for breeding to Dr. Santos (Area: Plot B)");
    assert_eq!(entry.remarks, "Collected in person");
    assert_eq!(entry.date, logged_at);
    assert_eq!(b.balance, kg(90));
}

#[tokio::test]
async fn test_update_increase_beyond_balance_rejected() {
    let ledger = Ledger::new();
    let batch = ledger
        .harvests
        .create_harvest_batch(harvest_input("Tiwala 6", 50), "ana")
        .await
        .unwrap();
    let d = ledger
        .distributions
        .create_distribution(exportation(&batch.seed_batch_id, kg(30)), "ben")
        .await
        .unwrap();

    let patch = DistributionPatch {
        quantity: Some(kg(51)),
        ..DistributionPatch::default()
    };
    let err = ledger.distributions.update_distribution(d.id, patch).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::InsufficientBalance { requested, available, .. }
            if requested == kg(21) && available == kg(20)
    ));

    let unchanged = ledger.distributions.get_distribution(d.id).await.unwrap();
    assert_eq!(unchanged.quantity, kg(30));
    ledger.assert_consistent().await;
}

// ============================================================================
// Batch Cascade and Rename
// ============================================================================

#[tokio::test]
async fn test_delete_batch_cascades_to_distributions() {
    let ledger = Ledger::new();
    let batch = ledger
        .harvests
        .create_harvest_batch(harvest_input("Tiwala 6", 100), "ana")
        .await
        .unwrap();
    let other = ledger
        .harvests
        .create_harvest_batch(harvest_input("Tiwala 10", 100), "ana")
        .await
        .unwrap();

    let mut drawn = Vec::new();
    for quantity in [5, 10, 15] {
        let d = ledger
            .distributions
            .create_distribution(exportation(&batch.seed_batch_id, kg(quantity)), "ben")
            .await
            .unwrap();
        drawn.push(d.id);
    }
    let kept = ledger
        .distributions
        .create_distribution(breeding(&other.seed_batch_id, kg(1)), "ben")
        .await
        .unwrap();

    let deletion = ledger.harvests.delete_harvest_batch(batch.id).await.unwrap();
    assert_eq!(deletion.deleted_batch_id, batch.id);
    let mut deleted = deletion.deleted_distribution_ids.clone();
    deleted.sort();
    drawn.sort();
    assert_eq!(deleted, drawn);

    for id in drawn {
        assert!(matches!(
            ledger.distributions.get_distribution(id).await,
            Err(AppError::NotFound(_))
        ));
    }
    assert!(ledger.distributions.get_distribution(kept.id).await.is_ok());
    assert!(ledger
        .harvests
        .fetch_batch_by_seed_batch_id(&batch.seed_batch_id)
        .await
        .unwrap()
        .is_none());
    ledger.assert_consistent().await;

    let err = ledger.harvests.delete_harvest_batch(batch.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_rename_moves_distributions_to_new_key() {
    let ledger = Ledger::new();
    let batch = ledger
        .harvests
        .create_harvest_batch(harvest_input("Tiwala 6", 100), "ana")
        .await
        .unwrap();
    let d = ledger
        .distributions
        .create_distribution(exportation(&batch.seed_batch_id, kg(25)), "ben")
        .await
        .unwrap();

    let patch = HarvestBatchPatch {
        seed_batch_id: Some("2023-09-SB-TIWALA_6-B".into()),
        ..HarvestBatchPatch::default()
    };
    let renamed = ledger.harvests.update_harvest_batch(batch.id, patch).await.unwrap();
    assert_eq!(renamed.seed_batch_id, "2023-09-SB-TIWALA_6-B");

    let moved = ledger.distributions.get_distribution(d.id).await.unwrap();
    assert_eq!(moved.seed_batch_id, "2023-09-SB-TIWALA_6-B");
    assert!(ledger
        .harvests
        .fetch_batch_by_seed_batch_id("2023-09-SB-TIWALA_6")
        .await
        .unwrap()
        .is_none());

    // The moved distribution still resolves its batch
    ledger.distributions.delete_distribution(d.id).await.unwrap();
    let b = ledger.harvests.get_harvest_batch(batch.id).await.unwrap();
    assert_eq!(b.balance, kg(100));
    ledger.assert_consistent().await;
}

#[tokio::test]
async fn test_plain_update_keeps_balance() {
    let ledger = Ledger::new();
    let batch = ledger
        .harvests
        .create_harvest_batch(harvest_input("Tiwala 6", 100), "ana")
        .await
        .unwrap();
    ledger
        .distributions
        .create_distribution(exportation(&batch.seed_batch_id, kg(25)), "ben")
        .await
        .unwrap();

    let patch = HarvestBatchPatch {
        area: Some("Plot C".into()),
        germination: Some(kg(75)),
        ..HarvestBatchPatch::default()
    };
    let updated = ledger.harvests.update_harvest_batch(batch.id, patch).await.unwrap();
    assert_eq!(updated.area, "Plot C");
    assert_eq!(updated.balance, kg(75));
    assert_eq!(updated.out_quantity, kg(25));
    assert_eq!(updated.logs.len(), 1);
    ledger.assert_consistent().await;
}

// ============================================================================
// Status Precedence
// ============================================================================

#[tokio::test]
async fn test_archived_batch_stays_archived() {
    let ledger = Ledger::new();
    let batch = ledger
        .harvests
        .create_harvest_batch(harvest_input("Tiwala 6", 20), "ana")
        .await
        .unwrap();
    let patch = HarvestBatchPatch {
        status: Some(BatchStatus::Archived),
        ..HarvestBatchPatch::default()
    };
    ledger.harvests.update_harvest_batch(batch.id, patch).await.unwrap();

    let d = ledger
        .distributions
        .create_distribution(exportation(&batch.seed_batch_id, kg(20)), "ben")
        .await
        .unwrap();
    assert_eq!(
        ledger.harvests.get_harvest_batch(batch.id).await.unwrap().status,
        BatchStatus::Archived
    );

    ledger.distributions.delete_distribution(d.id).await.unwrap();
    assert_eq!(
        ledger.harvests.get_harvest_batch(batch.id).await.unwrap().status,
        BatchStatus::Archived
    );
}

// ============================================================================
// Failure Paths
// ============================================================================

#[tokio::test]
async fn test_missing_log_entry_is_integrity_error() {
    let ledger = Ledger::new();
    let batch = ledger
        .harvests
        .create_harvest_batch(harvest_input("Tiwala 6", 100), "ana")
        .await
        .unwrap();
    let d = ledger
        .distributions
        .create_distribution(exportation(&batch.seed_batch_id, kg(10)), "ben")
        .await
        .unwrap();

    // Corrupt the batch behind the engine's back
    let mut corrupted = ledger.harvests.get_harvest_batch(batch.id).await.unwrap();
    corrupted.logs.clear();
    ledger
        .store
        .commit(ChangeSet::new().with(Mutation::PutBatch(corrupted)))
        .await
        .unwrap();

    let patch = DistributionPatch {
        quantity: Some(kg(5)),
        ..DistributionPatch::default()
    };
    let err = ledger.distributions.update_distribution(d.id, patch).await.unwrap_err();
    assert!(matches!(err, AppError::Integrity(_)));

    let err = ledger.distributions.delete_distribution(d.id).await.unwrap_err();
    assert!(matches!(err, AppError::Integrity(_)));
    assert!(ledger.distributions.get_distribution(d.id).await.is_ok());
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let ledger = Ledger::new();
    let id = Uuid::new_v4();

    assert!(matches!(
        ledger.harvests.delete_harvest_batch(id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        ledger
            .distributions
            .update_distribution(id, DistributionPatch::default())
            .await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        ledger.distributions.delete_distribution(id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        ledger
            .distributions
            .create_distribution(exportation("2023-09-SB-NOWHERE", kg(1)), "ben")
            .await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_listings_are_ordered() {
    let ledger = Ledger::new();
    let older = ledger
        .harvests
        .create_harvest_batch(harvest_input("Tiwala 6", 100), "ana")
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    let newer = ledger
        .harvests
        .create_harvest_batch(harvest_input("Tiwala 10", 100), "ana")
        .await
        .unwrap();

    let listed = ledger
        .harvests
        .list_harvest_batches(&Default::default())
        .await
        .unwrap();
    assert_eq!(listed.iter().map(|b| b.id).collect::<Vec<_>>(), vec![newer.id, older.id]);

    let january = ledger
        .distributions
        .create_distribution(exportation(&older.seed_batch_id, kg(1)), "ben")
        .await
        .unwrap();
    let february = ledger
        .distributions
        .create_distribution(breeding(&older.seed_batch_id, kg(1)), "ben")
        .await
        .unwrap();
    let listed = ledger
        .distributions
        .list_distributions(&Default::default())
        .await
        .unwrap();
    assert_eq!(
        listed.iter().map(|d| d.id).collect::<Vec<_>>(),
        vec![february.id, january.id]
    );
    assert!(january.created_at <= Utc::now());
}
