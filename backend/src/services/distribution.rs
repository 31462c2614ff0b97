//! Distribution service
//!
//! Each operation reads the batch balance inside the transaction and writes
//! the distribution and its batch back in one commit, so the batch audit log
//! always matches the distribution records.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{
    validate_new_distribution, validate_quantity, Distribution, DistributionDraft,
    DistributionPatch, NewDistribution,
};
use uuid::Uuid;

use super::ledger;
use crate::error::{AppError, AppResult};
use crate::store::{run_atomic, DistributionFilter, LedgerStore, Transaction, TransactionConfig};

#[derive(Clone)]
pub struct DistributionService {
    store: Arc<dyn LedgerStore>,
    txn: TransactionConfig,
}

/// What a distribution deletion touched
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionDeletion {
    pub deleted_distribution_id: Uuid,
    pub updated_batch_id: Uuid,
}

impl DistributionService {
    pub fn new(store: Arc<dyn LedgerStore>, txn: TransactionConfig) -> Self {
        Self { store, txn }
    }

    /// Draw seed from a batch.
    ///
    /// Not idempotent: submitting the same input twice records two
    /// distributions.
    pub async fn create_distribution(
        &self,
        input: NewDistribution,
        created_by: &str,
    ) -> AppResult<Distribution> {
        let draft = validate_new_distribution(&input).map_err(AppError::Validation)?;
        let id = Uuid::new_v4();
        let now = Utc::now();

        let distribution = run_atomic(&self.store, &self.txn, |txn| {
            Box::pin(create_distribution_in(
                txn,
                draft.clone(),
                id,
                created_by.to_string(),
                now,
            ))
        })
        .await?;

        tracing::info!(
            distribution_id = %distribution.id,
            seed_batch_id = %distribution.seed_batch_id,
            quantity = %distribution.quantity,
            mode = %distribution.mode(),
            "distribution recorded"
        );
        Ok(distribution)
    }

    pub async fn update_distribution(
        &self,
        id: Uuid,
        patch: DistributionPatch,
    ) -> AppResult<Distribution> {
        let updated = run_atomic(&self.store, &self.txn, |txn| {
            Box::pin(update_distribution_in(txn, id, patch.clone()))
        })
        .await?;

        tracing::info!(
            distribution_id = %id,
            seed_batch_id = %updated.seed_batch_id,
            quantity = %updated.quantity,
            "distribution updated"
        );
        Ok(updated)
    }

    /// Delete a distribution and return its quantity to the batch
    pub async fn delete_distribution(&self, id: Uuid) -> AppResult<DistributionDeletion> {
        let deletion =
            run_atomic(&self.store, &self.txn, |txn| Box::pin(delete_distribution_in(txn, id)))
                .await?;

        tracing::info!(
            distribution_id = %id,
            batch_id = %deletion.updated_batch_id,
            "distribution deleted"
        );
        Ok(deletion)
    }

    /// Distributions, newest first by date
    pub async fn list_distributions(
        &self,
        filter: &DistributionFilter,
    ) -> AppResult<Vec<Distribution>> {
        Ok(self.store.list_distributions(filter).await?)
    }

    pub async fn get_distribution(&self, id: Uuid) -> AppResult<Distribution> {
        self.store
            .get_distribution_by_id(id)
            .await?
            .map(|v| v.record)
            .ok_or_else(|| AppError::NotFound(format!("Distribution {}", id)))
    }
}

async fn create_distribution_in(
    txn: &mut Transaction,
    draft: DistributionDraft,
    id: Uuid,
    created_by: String,
    now: DateTime<Utc>,
) -> AppResult<Distribution> {
    let mut batch = txn
        .batch_by_seed_batch_id(&draft.seed_batch_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Harvest batch {}", draft.seed_batch_id)))?;
    let quantity = validate_quantity(draft.quantity).map_err(|e| AppError::Validation(vec![e]))?;

    let distribution = draft.into_distribution(id, quantity, &created_by, now);
    ledger::record_outflow(&mut batch, &distribution, now)?;

    txn.put_distribution(distribution.clone());
    txn.put_batch(batch);
    Ok(distribution)
}

async fn update_distribution_in(
    txn: &mut Transaction,
    id: Uuid,
    patch: DistributionPatch,
) -> AppResult<Distribution> {
    let current = txn
        .distribution_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Distribution {}", id)))?;
    let revised = patch.apply_to(&current).map_err(AppError::Validation)?;

    let mut batch = batch_for(txn, &current).await?;
    ledger::revise_outflow(&mut batch, &current, &revised)?;

    txn.put_distribution(revised.clone());
    txn.put_batch(batch);
    Ok(revised)
}

async fn delete_distribution_in(txn: &mut Transaction, id: Uuid) -> AppResult<DistributionDeletion> {
    let distribution = txn
        .distribution_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Distribution {}", id)))?;

    let mut batch = batch_for(txn, &distribution).await?;
    ledger::reverse_outflow(&mut batch, &distribution)?;

    let updated_batch_id = batch.id;
    txn.delete_distribution(id);
    txn.put_batch(batch);
    Ok(DistributionDeletion {
        deleted_distribution_id: id,
        updated_batch_id,
    })
}

/// The batch a stored distribution was drawn from. Its absence means the
/// ledger is already damaged.
async fn batch_for(
    txn: &mut Transaction,
    distribution: &Distribution,
) -> AppResult<shared::HarvestBatch> {
    match txn.batch_by_seed_batch_id(&distribution.seed_batch_id).await? {
        Some(batch) => Ok(batch),
        None => {
            tracing::error!(
                distribution_id = %distribution.id,
                seed_batch_id = %distribution.seed_batch_id,
                "distribution references a missing harvest batch"
            );
            Err(AppError::NotFound(format!(
                "Harvest batch {}",
                distribution.seed_batch_id
            )))
        }
    }
}
