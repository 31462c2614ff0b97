//! Harvest batch service: recording, correcting and removing batches

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use shared::{validate_new_harvest, HarvestBatch, HarvestBatchPatch, NewHarvestBatch};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::{
    run_atomic, BatchFilter, ChangeSet, LedgerStore, Mutation, Precondition, RecordKey,
    Transaction, TransactionConfig,
};

/// Harvest service for managing seed batches
#[derive(Clone)]
pub struct HarvestService {
    store: Arc<dyn LedgerStore>,
    txn: TransactionConfig,
}

/// What a batch deletion removed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeletion {
    pub deleted_batch_id: Uuid,
    pub deleted_distribution_ids: Vec<Uuid>,
}

impl HarvestService {
    pub fn new(store: Arc<dyn LedgerStore>, txn: TransactionConfig) -> Self {
        Self { store, txn }
    }

    /// Record a new batch with its full quantity on hand
    pub async fn create_harvest_batch(
        &self,
        input: NewHarvestBatch,
        created_by: &str,
    ) -> AppResult<HarvestBatch> {
        let draft = validate_new_harvest(&input).map_err(AppError::Validation)?;
        let batch = draft.into_batch(Uuid::new_v4(), created_by, Utc::now());

        self.store
            .commit(
                ChangeSet::new()
                    .require(Precondition::Absent(RecordKey::Batch(batch.id)))
                    .with(Mutation::PutBatch(batch.clone())),
            )
            .await?;

        tracing::info!(
            seed_batch_id = %batch.seed_batch_id,
            batch_id = %batch.id,
            in_quantity = %batch.in_quantity,
            "harvest batch recorded"
        );
        Ok(batch)
    }

    /// Apply a partial update. Renaming the seed batch id carries every
    /// referencing distribution over to the new id in the same commit.
    pub async fn update_harvest_batch(
        &self,
        id: Uuid,
        patch: HarvestBatchPatch,
    ) -> AppResult<HarvestBatch> {
        let updated = run_atomic(&self.store, &self.txn, |txn| {
            Box::pin(update_batch_in(txn, id, patch.clone()))
        })
        .await?;

        tracing::info!(seed_batch_id = %updated.seed_batch_id, batch_id = %id, "harvest batch updated");
        Ok(updated)
    }

    /// Delete a batch together with every distribution drawn from it
    pub async fn delete_harvest_batch(&self, id: Uuid) -> AppResult<BatchDeletion> {
        let deletion =
            run_atomic(&self.store, &self.txn, |txn| Box::pin(delete_batch_in(txn, id))).await?;

        tracing::info!(
            batch_id = %id,
            distributions = deletion.deleted_distribution_ids.len(),
            "harvest batch deleted"
        );
        Ok(deletion)
    }

    /// All batches, newest first
    pub async fn list_harvest_batches(&self, filter: &BatchFilter) -> AppResult<Vec<HarvestBatch>> {
        Ok(self.store.list_batches(filter).await?)
    }

    pub async fn get_harvest_batch(&self, id: Uuid) -> AppResult<HarvestBatch> {
        self.store
            .get_batch_by_id(id)
            .await?
            .map(|v| v.record)
            .ok_or_else(|| AppError::NotFound(format!("Harvest batch {}", id)))
    }

    /// Lookup by business key; absence is not an error here
    pub async fn fetch_batch_by_seed_batch_id(
        &self,
        seed_batch_id: &str,
    ) -> AppResult<Option<HarvestBatch>> {
        Ok(self
            .store
            .get_batch_by_seed_batch_id(seed_batch_id.trim())
            .await?
            .map(|v| v.record))
    }
}

async fn update_batch_in(
    txn: &mut Transaction,
    id: Uuid,
    patch: HarvestBatchPatch,
) -> AppResult<HarvestBatch> {
    let current = txn
        .batch_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Harvest batch {}", id)))?;
    let updated = patch.apply_to(&current).map_err(AppError::Validation)?;

    if let Some(new_key) = patch.renamed_seed_batch_id(&current.seed_batch_id) {
        if txn.batch_by_seed_batch_id(&new_key).await?.is_some() {
            return Err(AppError::DuplicateEntry(format!("seedBatchId {}", new_key)));
        }
        let referencing = txn.distributions_for_seed_batch_id(&current.seed_batch_id).await?;
        tracing::debug!(
            from = %current.seed_batch_id,
            to = %new_key,
            distributions = referencing.len(),
            "renaming seed batch id"
        );
        for mut distribution in referencing {
            distribution.seed_batch_id = new_key.clone();
            txn.put_distribution(distribution);
        }
    }

    txn.put_batch(updated.clone());
    Ok(updated)
}

async fn delete_batch_in(txn: &mut Transaction, id: Uuid) -> AppResult<BatchDeletion> {
    let batch = txn
        .batch_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Harvest batch {}", id)))?;

    let referencing = txn.distributions_for_seed_batch_id(&batch.seed_batch_id).await?;
    let deleted_distribution_ids: Vec<Uuid> = referencing.iter().map(|d| d.id).collect();
    for distribution_id in &deleted_distribution_ids {
        txn.delete_distribution(*distribution_id);
    }
    txn.delete_batch(batch.id);

    Ok(BatchDeletion {
        deleted_batch_id: batch.id,
        deleted_distribution_ids,
    })
}
