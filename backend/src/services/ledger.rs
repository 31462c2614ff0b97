//! Balance and audit-log transitions shared by the harvest and distribution
//! services
//!
//! Every function here mutates a batch in memory only. Callers run them
//! inside a ledger transaction and write the batch back together with the
//! distribution that caused the change.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{Distribution, HarvestBatch, LogEntry};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub use shared::distribution_note;

/// Active while stock remains, Depleted at zero. Archived batches keep
/// their status.
pub fn recompute_status(batch: &mut HarvestBatch) {
    batch.status = batch.status.recompute(batch.balance);
}

fn insufficient(batch: &HarvestBatch, requested: Decimal) -> AppError {
    AppError::InsufficientBalance {
        seed_batch_id: batch.seed_batch_id.clone(),
        requested,
        available: batch.balance,
    }
}

fn missing_log_entry(batch: &HarvestBatch, distribution_id: Uuid) -> AppError {
    tracing::error!(
        seed_batch_id = %batch.seed_batch_id,
        %distribution_id,
        "harvest batch has no log entry for distribution"
    );
    AppError::Integrity(format!(
        "batch {} has no log entry for distribution {}",
        batch.seed_batch_id, distribution_id
    ))
}

/// Deduct a new distribution from `batch` and append its log entry
pub fn record_outflow(
    batch: &mut HarvestBatch,
    distribution: &Distribution,
    at: DateTime<Utc>,
) -> AppResult<()> {
    if distribution.quantity > batch.balance {
        return Err(insufficient(batch, distribution.quantity));
    }
    batch.balance -= distribution.quantity;
    batch.out_quantity += distribution.quantity;
    recompute_status(batch);
    batch.logs.push(LogEntry::for_distribution(distribution, at));
    Ok(())
}

/// Move `batch` from reflecting `previous` to reflecting `revised`.
///
/// The log entry is rebuilt from `revised` but keeps its original
/// timestamp.
pub fn revise_outflow(
    batch: &mut HarvestBatch,
    previous: &Distribution,
    revised: &Distribution,
) -> AppResult<()> {
    let index = batch
        .log_index(previous.id)
        .ok_or_else(|| missing_log_entry(batch, previous.id))?;

    let diff = revised.quantity - previous.quantity;
    if diff > Decimal::ZERO && batch.balance < diff {
        return Err(insufficient(batch, diff));
    }

    let logged_at = batch.logs[index].date;
    batch.logs[index] = LogEntry::for_distribution(revised, logged_at);
    batch.balance -= diff;
    batch.out_quantity += diff;
    recompute_status(batch);
    Ok(())
}

/// Return a deleted distribution's quantity to `batch` and drop its log entry
pub fn reverse_outflow(batch: &mut HarvestBatch, distribution: &Distribution) -> AppResult<()> {
    let index = batch
        .log_index(distribution.id)
        .ok_or_else(|| missing_log_entry(batch, distribution.id))?;

    batch.logs.remove(index);
    batch.balance += distribution.quantity;
    batch.out_quantity -= distribution.quantity;
    recompute_status(batch);
    Ok(())
}

/// A way in which stored records disagree with each other
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LedgerViolation {
    #[serde(rename_all = "camelCase")]
    BalanceMismatch {
        seed_batch_id: String,
        in_quantity: Decimal,
        out_quantity: Decimal,
        balance: Decimal,
    },
    #[serde(rename_all = "camelCase")]
    MissingLogEntry {
        seed_batch_id: String,
        distribution_id: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    DuplicateLogEntry {
        seed_batch_id: String,
        distribution_id: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    LogQuantityMismatch {
        distribution_id: Uuid,
        logged: Decimal,
        distributed: Decimal,
    },
    /// Log entry whose distribution no longer exists
    #[serde(rename_all = "camelCase")]
    OrphanLogEntry {
        seed_batch_id: String,
        distribution_id: Uuid,
    },
    /// Distribution pointing at a batch that does not exist
    #[serde(rename_all = "camelCase")]
    DanglingDistribution {
        distribution_id: Uuid,
        seed_batch_id: String,
    },
    #[serde(rename_all = "camelCase")]
    OutflowMismatch {
        seed_batch_id: String,
        out_quantity: Decimal,
        distributed: Decimal,
    },
}

/// Check one batch against the distributions that reference it
pub fn check_batch_consistency(
    batch: &HarvestBatch,
    distributions: &[Distribution],
) -> Vec<LedgerViolation> {
    let mut violations = Vec::new();
    let seed_batch_id = || batch.seed_batch_id.clone();

    if !batch.is_balanced() {
        violations.push(LedgerViolation::BalanceMismatch {
            seed_batch_id: seed_batch_id(),
            in_quantity: batch.in_quantity,
            out_quantity: batch.out_quantity,
            balance: batch.balance,
        });
    }

    let mut logged: HashMap<Uuid, Vec<&LogEntry>> = HashMap::new();
    for entry in &batch.logs {
        logged.entry(entry.distribution_id).or_default().push(entry);
    }

    let mut distributed = Decimal::ZERO;
    for distribution in distributions {
        distributed += distribution.quantity;
        match logged.get(&distribution.id).map(Vec::as_slice) {
            None | Some([]) => violations.push(LedgerViolation::MissingLogEntry {
                seed_batch_id: seed_batch_id(),
                distribution_id: distribution.id,
            }),
            Some([entry]) => {
                if entry.outflow() != distribution.quantity {
                    violations.push(LedgerViolation::LogQuantityMismatch {
                        distribution_id: distribution.id,
                        logged: entry.outflow(),
                        distributed: distribution.quantity,
                    });
                }
            }
            Some(_) => violations.push(LedgerViolation::DuplicateLogEntry {
                seed_batch_id: seed_batch_id(),
                distribution_id: distribution.id,
            }),
        }
    }

    for entry in &batch.logs {
        if !distributions.iter().any(|d| d.id == entry.distribution_id) {
            violations.push(LedgerViolation::OrphanLogEntry {
                seed_batch_id: seed_batch_id(),
                distribution_id: entry.distribution_id,
            });
        }
    }

    if batch.out_quantity != distributed {
        violations.push(LedgerViolation::OutflowMismatch {
            seed_batch_id: seed_batch_id(),
            out_quantity: batch.out_quantity,
            distributed,
        });
    }

    violations
}

/// Check every batch, plus distributions whose batch is gone
pub fn check_ledger(batches: &[HarvestBatch], distributions: &[Distribution]) -> Vec<LedgerViolation> {
    let mut by_batch: HashMap<&str, Vec<Distribution>> = HashMap::new();
    for distribution in distributions {
        by_batch
            .entry(distribution.seed_batch_id.as_str())
            .or_default()
            .push(distribution.clone());
    }

    let mut violations = Vec::new();
    for batch in batches {
        let referencing = by_batch.remove(batch.seed_batch_id.as_str()).unwrap_or_default();
        violations.extend(check_batch_consistency(batch, &referencing));
    }
    for (seed_batch_id, dangling) in by_batch {
        violations.extend(dangling.into_iter().map(|d| LedgerViolation::DanglingDistribution {
            distribution_id: d.id,
            seed_batch_id: seed_batch_id.to_string(),
        }));
    }
    violations
}
