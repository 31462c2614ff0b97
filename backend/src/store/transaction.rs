//! Optimistic multi-record transactions over a [`LedgerStore`]
//!
//! A [`Transaction`] records the version of every record it reads and
//! buffers every write. Committing turns the read set into preconditions,
//! so the writes land only if nothing the transaction looked at changed in
//! the meantime. [`run_atomic`] retries the whole unit of work when that
//! check fails.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use shared::{Distribution, HarvestBatch};
use uuid::Uuid;

use super::{ChangeSet, LedgerStore, Mutation, Precondition, RecordKey, StoreError, StoreResult};
use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};

/// Retry and timeout policy for [`run_atomic`]
#[derive(Debug, Clone)]
pub struct TransactionConfig {
    /// Attempts before giving up with `TransactionConflict`
    pub max_attempts: u32,
    /// Upper bound on a single attempt, commit included
    pub attempt_timeout: Duration,
    /// Delay before the first retry; doubles after each conflict
    pub retry_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            attempt_timeout: Duration::from_secs(5),
            retry_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(250),
        }
    }
}

impl From<&LedgerConfig> for TransactionConfig {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
enum Pending<T> {
    Put(T),
    Delete,
}

/// Handle passed to the unit of work in [`run_atomic`].
///
/// Reads see the transaction's own buffered writes. Reading the same record
/// twice at different versions fails with a conflict straight away.
pub struct Transaction {
    store: Arc<dyn LedgerStore>,
    reads: HashMap<RecordKey, Option<u64>>,
    batches: BTreeMap<Uuid, Pending<HarvestBatch>>,
    distributions: BTreeMap<Uuid, Pending<Distribution>>,
}

impl Transaction {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            reads: HashMap::new(),
            batches: BTreeMap::new(),
            distributions: BTreeMap::new(),
        }
    }

    fn record_read(&mut self, key: RecordKey, version: Option<u64>) -> StoreResult<()> {
        match self.reads.get(&key) {
            Some(seen) if *seen != version => {
                Err(StoreError::Conflict(format!("{} changed during transaction", key)))
            }
            Some(_) => Ok(()),
            None => {
                self.reads.insert(key, version);
                Ok(())
            }
        }
    }

    pub async fn batch_by_id(&mut self, id: Uuid) -> StoreResult<Option<HarvestBatch>> {
        if let Some(pending) = self.batches.get(&id) {
            return Ok(match pending {
                Pending::Put(batch) => Some(batch.clone()),
                Pending::Delete => None,
            });
        }
        let found = self.store.get_batch_by_id(id).await?;
        self.record_read(RecordKey::Batch(id), found.as_ref().map(|v| v.version))?;
        Ok(found.map(|v| v.record))
    }

    pub async fn batch_by_seed_batch_id(
        &mut self,
        seed_batch_id: &str,
    ) -> StoreResult<Option<HarvestBatch>> {
        let buffered = self.batches.values().find_map(|pending| match pending {
            Pending::Put(batch) if batch.seed_batch_id == seed_batch_id => Some(batch.clone()),
            _ => None,
        });
        if buffered.is_some() {
            return Ok(buffered);
        }

        let Some(found) = self.store.get_batch_by_seed_batch_id(seed_batch_id).await? else {
            return Ok(None);
        };
        self.record_read(RecordKey::Batch(found.record.id), Some(found.version))?;
        if self.batches.contains_key(&found.record.id) {
            // Renamed or deleted earlier in this transaction
            return Ok(None);
        }
        Ok(Some(found.record))
    }

    pub async fn distribution_by_id(&mut self, id: Uuid) -> StoreResult<Option<Distribution>> {
        if let Some(pending) = self.distributions.get(&id) {
            return Ok(match pending {
                Pending::Put(distribution) => Some(distribution.clone()),
                Pending::Delete => None,
            });
        }
        let found = self.store.get_distribution_by_id(id).await?;
        self.record_read(RecordKey::Distribution(id), found.as_ref().map(|v| v.version))?;
        Ok(found.map(|v| v.record))
    }

    /// Distributions currently referencing `seed_batch_id`, oldest first
    pub async fn distributions_for_seed_batch_id(
        &mut self,
        seed_batch_id: &str,
    ) -> StoreResult<Vec<Distribution>> {
        let stored = self.store.list_distributions_by_seed_batch_id(seed_batch_id).await?;
        let mut found = Vec::with_capacity(stored.len());
        for versioned in stored {
            let id = versioned.record.id;
            self.record_read(RecordKey::Distribution(id), Some(versioned.version))?;
            if !self.distributions.contains_key(&id) {
                found.push(versioned.record);
            }
        }
        found.extend(self.distributions.values().filter_map(|pending| match pending {
            Pending::Put(d) if d.seed_batch_id == seed_batch_id => Some(d.clone()),
            _ => None,
        }));
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    pub fn put_batch(&mut self, batch: HarvestBatch) {
        self.batches.insert(batch.id, Pending::Put(batch));
    }

    pub fn delete_batch(&mut self, id: Uuid) {
        self.batches.insert(id, Pending::Delete);
    }

    pub fn put_distribution(&mut self, distribution: Distribution) {
        self.distributions.insert(distribution.id, Pending::Put(distribution));
    }

    pub fn delete_distribution(&mut self, id: Uuid) {
        self.distributions.insert(id, Pending::Delete);
    }

    pub fn has_writes(&self) -> bool {
        !self.batches.is_empty() || !self.distributions.is_empty()
    }

    /// Change set guarded by everything this transaction has read. Records
    /// written without being read first must not exist yet.
    pub fn change_set(&self) -> ChangeSet {
        let mut changes = ChangeSet::new();
        for (key, version) in &self.reads {
            changes.preconditions.push(match version {
                Some(version) => Precondition::Version(*key, *version),
                None => Precondition::Absent(*key),
            });
        }

        for (id, pending) in &self.batches {
            let key = RecordKey::Batch(*id);
            if !self.reads.contains_key(&key) {
                changes.preconditions.push(Precondition::Absent(key));
            }
            changes.mutations.push(match pending {
                Pending::Put(batch) => Mutation::PutBatch(batch.clone()),
                Pending::Delete => Mutation::DeleteBatch(*id),
            });
        }
        for (id, pending) in &self.distributions {
            let key = RecordKey::Distribution(*id);
            if !self.reads.contains_key(&key) {
                changes.preconditions.push(Precondition::Absent(key));
            }
            changes.mutations.push(match pending {
                Pending::Put(distribution) => Mutation::PutDistribution(distribution.clone()),
                Pending::Delete => Mutation::DeleteDistribution(*id),
            });
        }
        changes.preconditions.sort_by_key(Precondition::key);
        changes
    }

    /// Submit buffered writes. Read-only transactions commit trivially.
    pub async fn commit(&mut self) -> StoreResult<()> {
        if !self.has_writes() {
            return Ok(());
        }
        let changes = self.change_set();
        self.store.commit(changes).await?;
        self.batches.clear();
        self.distributions.clear();
        Ok(())
    }
}

/// Run `work` inside a fresh [`Transaction`] and commit it.
///
/// On a write conflict the whole closure runs again against fresh reads,
/// up to `config.max_attempts` times with exponential backoff. Exhausting
/// the attempts, or an attempt outliving `config.attempt_timeout`, yields
/// [`AppError::TransactionConflict`]. Any other error aborts at once with
/// nothing written.
pub async fn run_atomic<T, F>(
    store: &Arc<dyn LedgerStore>,
    config: &TransactionConfig,
    mut work: F,
) -> AppResult<T>
where
    T: Send,
    F: for<'t> FnMut(&'t mut Transaction) -> BoxFuture<'t, AppResult<T>> + Send,
{
    let max_attempts = config.max_attempts.max(1);
    let mut backoff = config.retry_backoff;

    for attempt in 1..=max_attempts {
        let mut txn = Transaction::new(Arc::clone(store));
        let outcome = tokio::time::timeout(config.attempt_timeout, async {
            let value = work(&mut txn).await?;
            txn.commit().await?;
            Ok::<T, AppError>(value)
        })
        .await;

        match outcome {
            Ok(Ok(value)) => {
                if attempt > 1 {
                    tracing::debug!(attempt, "ledger transaction committed after retry");
                }
                return Ok(value);
            }
            Ok(Err(AppError::Store(StoreError::Conflict(reason)))) => {
                tracing::warn!(attempt, max_attempts, %reason, "ledger transaction conflict");
            }
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                tracing::warn!(
                    attempt,
                    timeout_ms = config.attempt_timeout.as_millis() as u64,
                    "ledger transaction timed out"
                );
                return Err(AppError::TransactionConflict);
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(config.max_backoff);
        }
    }

    tracing::warn!(max_attempts, "ledger transaction retries exhausted");
    Err(AppError::TransactionConflict)
}
