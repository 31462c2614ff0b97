//! Ledger store abstraction
//!
//! The store persists harvest batches and distributions as versioned
//! documents. Reads are plain point lookups and scans; every write goes
//! through [`LedgerStore::commit`], which applies a [`ChangeSet`] atomically
//! once all of its preconditions hold. Multi-record operations are built on
//! top of that with [`Transaction`] and [`run_atomic`].

use std::fmt;

use async_trait::async_trait;
use shared::{BatchStatus, Crop, Distribution, DistributionMode, HarvestBatch};
use uuid::Uuid;

pub mod error;
pub mod memory;
pub mod postgres;
pub mod transaction;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryLedgerStore;
pub use postgres::PgLedgerStore;
pub use transaction::{run_atomic, Transaction, TransactionConfig};

/// Identity of a stored document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKey {
    Batch(Uuid),
    Distribution(Uuid),
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Batch(id) => write!(f, "harvest batch {}", id),
            RecordKey::Distribution(id) => write!(f, "distribution {}", id),
        }
    }
}

/// A record together with the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub record: T,
    pub version: u64,
}

/// Condition that must hold at commit time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// The record still exists at exactly this version
    Version(RecordKey, u64),
    /// The record does not exist
    Absent(RecordKey),
}

impl Precondition {
    pub fn key(&self) -> RecordKey {
        match self {
            Precondition::Version(key, _) | Precondition::Absent(key) => *key,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    PutBatch(HarvestBatch),
    DeleteBatch(Uuid),
    PutDistribution(Distribution),
    DeleteDistribution(Uuid),
}

impl Mutation {
    pub fn key(&self) -> RecordKey {
        match self {
            Mutation::PutBatch(batch) => RecordKey::Batch(batch.id),
            Mutation::DeleteBatch(id) => RecordKey::Batch(*id),
            Mutation::PutDistribution(distribution) => RecordKey::Distribution(distribution.id),
            Mutation::DeleteDistribution(id) => RecordKey::Distribution(*id),
        }
    }
}

/// Preconditions plus the writes to apply if they all hold
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub preconditions: Vec<Precondition>,
    pub mutations: Vec<Mutation>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, precondition: Precondition) -> Self {
        self.preconditions.push(precondition);
        self
    }

    pub fn with(mut self, mutation: Mutation) -> Self {
        self.mutations.push(mutation);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchFilter {
    pub crop: Option<Crop>,
    pub status: Option<BatchStatus>,
}

impl BatchFilter {
    pub fn matches(&self, batch: &HarvestBatch) -> bool {
        self.crop.map_or(true, |crop| batch.crop == crop)
            && self.status.map_or(true, |status| batch.status == status)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DistributionFilter {
    pub seed_batch_id: Option<String>,
    pub mode: Option<DistributionMode>,
}

impl DistributionFilter {
    pub fn matches(&self, distribution: &Distribution) -> bool {
        self.seed_batch_id
            .as_deref()
            .map_or(true, |id| distribution.seed_batch_id == id)
            && self.mode.map_or(true, |mode| distribution.mode() == mode)
    }
}

/// Storage backend for the ledger.
///
/// Listing methods return batches newest first by creation time and
/// distributions newest first by date, undated ones last.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get_batch_by_id(&self, id: Uuid) -> StoreResult<Option<Versioned<HarvestBatch>>>;

    /// Lookup by business key. Every join from a distribution to its batch
    /// goes through here.
    async fn get_batch_by_seed_batch_id(
        &self,
        seed_batch_id: &str,
    ) -> StoreResult<Option<Versioned<HarvestBatch>>>;

    async fn get_distribution_by_id(&self, id: Uuid)
        -> StoreResult<Option<Versioned<Distribution>>>;

    async fn list_batches(&self, filter: &BatchFilter) -> StoreResult<Vec<HarvestBatch>>;

    async fn list_distributions(&self, filter: &DistributionFilter)
        -> StoreResult<Vec<Distribution>>;

    async fn list_distributions_by_seed_batch_id(
        &self,
        seed_batch_id: &str,
    ) -> StoreResult<Vec<Versioned<Distribution>>>;

    /// Apply `changes` atomically. Fails with [`StoreError::Conflict`] and
    /// applies nothing if any precondition does not hold.
    async fn commit(&self, changes: ChangeSet) -> StoreResult<()>;

    /// Cheap liveness probe
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str;
}

/// Newest-first ordering shared by the store implementations
pub(crate) fn sort_batches(batches: &mut [HarvestBatch]) {
    batches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

pub(crate) fn sort_distributions(distributions: &mut [Distribution]) {
    distributions.sort_by(|a, b| match (a.date, b.date) {
        (Some(a_date), Some(b_date)) => b_date.cmp(&a_date).then(b.created_at.cmp(&a.created_at)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => b.created_at.cmp(&a.created_at),
    });
}
