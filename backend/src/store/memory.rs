//! In-memory ledger store

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use shared::{Distribution, HarvestBatch};
use uuid::Uuid;

use super::{
    sort_batches, sort_distributions, BatchFilter, ChangeSet, DistributionFilter, LedgerStore,
    Mutation, Precondition, RecordKey, StoreError, StoreResult, Versioned,
};

#[derive(Default)]
struct Ledger {
    batches: HashMap<Uuid, Versioned<HarvestBatch>>,
    seed_index: HashMap<String, Uuid>,
    distributions: HashMap<Uuid, Versioned<Distribution>>,
    /// Source of record versions. Never reused, so a deleted and re-created
    /// record cannot match a stale precondition.
    clock: u64,
}

impl Ledger {
    fn version_of(&self, key: RecordKey) -> Option<u64> {
        match key {
            RecordKey::Batch(id) => self.batches.get(&id).map(|v| v.version),
            RecordKey::Distribution(id) => self.distributions.get(&id).map(|v| v.version),
        }
    }

    fn check(&self, precondition: &Precondition) -> StoreResult<()> {
        let current = self.version_of(precondition.key());
        let holds = match precondition {
            Precondition::Version(_, expected) => current == Some(*expected),
            Precondition::Absent(_) => current.is_none(),
        };
        if holds {
            Ok(())
        } else {
            Err(StoreError::Conflict(precondition.key().to_string()))
        }
    }

    /// Reject the change set if it would leave two batches sharing a seed
    /// batch id.
    fn check_unique_seed_ids(&self, mutations: &[Mutation]) -> StoreResult<()> {
        let touched: HashSet<Uuid> = mutations
            .iter()
            .filter_map(|m| match m {
                Mutation::PutBatch(batch) => Some(batch.id),
                Mutation::DeleteBatch(id) => Some(*id),
                _ => None,
            })
            .collect();

        let mut claimed: HashMap<&str, Uuid> = HashMap::new();
        for mutation in mutations {
            let Mutation::PutBatch(batch) = mutation else {
                continue;
            };
            let seed_batch_id = batch.seed_batch_id.as_str();
            if let Some(owner) = claimed.insert(seed_batch_id, batch.id) {
                if owner != batch.id {
                    return Err(StoreError::DuplicateKey(seed_batch_id.to_string()));
                }
            }
            if let Some(owner) = self.seed_index.get(seed_batch_id) {
                if *owner != batch.id && !touched.contains(owner) {
                    return Err(StoreError::DuplicateKey(seed_batch_id.to_string()));
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, mutation: Mutation) {
        self.clock += 1;
        let version = self.clock;
        match mutation {
            Mutation::PutBatch(batch) => {
                if let Some(previous) = self.batches.get(&batch.id) {
                    let old_key = previous.record.seed_batch_id.clone();
                    if self.seed_index.get(&old_key) == Some(&batch.id) {
                        self.seed_index.remove(&old_key);
                    }
                }
                self.seed_index.insert(batch.seed_batch_id.clone(), batch.id);
                self.batches.insert(batch.id, Versioned { record: batch, version });
            }
            Mutation::DeleteBatch(id) => {
                if let Some(removed) = self.batches.remove(&id) {
                    if self.seed_index.get(&removed.record.seed_batch_id) == Some(&id) {
                        self.seed_index.remove(&removed.record.seed_batch_id);
                    }
                }
            }
            Mutation::PutDistribution(distribution) => {
                self.distributions
                    .insert(distribution.id, Versioned { record: distribution, version });
            }
            Mutation::DeleteDistribution(id) => {
                self.distributions.remove(&id);
            }
        }
    }
}

/// Ledger held in process memory.
///
/// Backs the test suites and `store.backend = "memory"`. Commits validate
/// and apply under a single write lock, so a change set is never observed
/// half applied.
pub struct InMemoryLedgerStore {
    ledger: RwLock<Ledger>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            ledger: RwLock::new(Ledger::default()),
        }
    }

    pub fn batch_count(&self) -> usize {
        self.read().map(|ledger| ledger.batches.len()).unwrap_or(0)
    }

    pub fn distribution_count(&self) -> usize {
        self.read().map(|ledger| ledger.distributions.len()).unwrap_or(0)
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Ledger>> {
        self.ledger
            .read()
            .map_err(|_| StoreError::Unavailable("ledger lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Ledger>> {
        self.ledger
            .write()
            .map_err(|_| StoreError::Unavailable("ledger lock poisoned".into()))
    }
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn get_batch_by_id(&self, id: Uuid) -> StoreResult<Option<Versioned<HarvestBatch>>> {
        Ok(self.read()?.batches.get(&id).cloned())
    }

    async fn get_batch_by_seed_batch_id(
        &self,
        seed_batch_id: &str,
    ) -> StoreResult<Option<Versioned<HarvestBatch>>> {
        let ledger = self.read()?;
        Ok(ledger
            .seed_index
            .get(seed_batch_id)
            .and_then(|id| ledger.batches.get(id))
            .cloned())
    }

    async fn get_distribution_by_id(
        &self,
        id: Uuid,
    ) -> StoreResult<Option<Versioned<Distribution>>> {
        Ok(self.read()?.distributions.get(&id).cloned())
    }

    async fn list_batches(&self, filter: &BatchFilter) -> StoreResult<Vec<HarvestBatch>> {
        let mut batches: Vec<HarvestBatch> = self
            .read()?
            .batches
            .values()
            .filter(|v| filter.matches(&v.record))
            .map(|v| v.record.clone())
            .collect();
        sort_batches(&mut batches);
        Ok(batches)
    }

    async fn list_distributions(
        &self,
        filter: &DistributionFilter,
    ) -> StoreResult<Vec<Distribution>> {
        let mut distributions: Vec<Distribution> = self
            .read()?
            .distributions
            .values()
            .filter(|v| filter.matches(&v.record))
            .map(|v| v.record.clone())
            .collect();
        sort_distributions(&mut distributions);
        Ok(distributions)
    }

    async fn list_distributions_by_seed_batch_id(
        &self,
        seed_batch_id: &str,
    ) -> StoreResult<Vec<Versioned<Distribution>>> {
        Ok(self
            .read()?
            .distributions
            .values()
            .filter(|v| v.record.seed_batch_id == seed_batch_id)
            .cloned()
            .collect())
    }

    async fn commit(&self, changes: ChangeSet) -> StoreResult<()> {
        let mut ledger = self.write()?;
        for precondition in &changes.preconditions {
            ledger.check(precondition)?;
        }
        ledger.check_unique_seed_ids(&changes.mutations)?;
        for mutation in changes.mutations {
            ledger.apply(mutation);
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
