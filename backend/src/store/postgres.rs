//! PostgreSQL ledger store
//!
//! Documents live in JSONB columns next to the few fields the store needs
//! to index: the seed batch id, the distribution date and a row version
//! drawn from `ledger_version_seq`.

use async_trait::async_trait;
use shared::{Distribution, HarvestBatch};
use sqlx::{types::Json, PgPool, Postgres};
use uuid::Uuid;

use super::{
    BatchFilter, ChangeSet, DistributionFilter, LedgerStore, Mutation, Precondition, RecordKey,
    StoreError, StoreResult, Versioned,
};

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const UNIQUE_VIOLATION: &str = "23505";

/// Ledger store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgLedgerStore {
    db: PgPool,
}

impl PgLedgerStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

type BatchRow = (i64, Json<HarvestBatch>);
type DistributionRow = (i64, Json<Distribution>);

fn versioned<T>((version, Json(record)): (i64, Json<T>)) -> Versioned<T> {
    Versioned {
        record,
        version: version.max(0) as u64,
    }
}

/// Map driver errors onto the store's conflict and uniqueness variants
fn classify(err: sqlx::Error, context: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
                return StoreError::Conflict(format!("{}: {}", context, db_err.message()));
            }
            Some(UNIQUE_VIOLATION) => return StoreError::DuplicateKey(context.to_string()),
            _ => {}
        }
    }
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StoreError::Unavailable(err.to_string())
        }
        other => StoreError::Database(other),
    }
}

fn document<T: serde::Serialize>(id: Uuid, record: &T) -> StoreResult<serde_json::Value> {
    serde_json::to_value(record).map_err(|e| StoreError::Serialization {
        id,
        reason: e.to_string(),
    })
}

async fn locked_version(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    key: RecordKey,
) -> StoreResult<Option<u64>> {
    let (sql, id) = match key {
        RecordKey::Batch(id) => ("SELECT version FROM harvest_batches WHERE id = $1 FOR UPDATE", id),
        RecordKey::Distribution(id) => {
            ("SELECT version FROM distributions WHERE id = $1 FOR UPDATE", id)
        }
    };
    let version: Option<i64> = sqlx::query_scalar(sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| classify(e, &key.to_string()))?;
    Ok(version.map(|v| v.max(0) as u64))
}

async fn apply(tx: &mut sqlx::Transaction<'_, Postgres>, mutation: &Mutation) -> StoreResult<()> {
    match mutation {
        Mutation::PutBatch(batch) => {
            let doc = document(batch.id, batch)?;
            sqlx::query(
                r#"
                INSERT INTO harvest_batches (id, seed_batch_id, version, created_at, document)
                VALUES ($1, $2, nextval('ledger_version_seq'), $3, $4)
                ON CONFLICT (id) DO UPDATE
                SET seed_batch_id = EXCLUDED.seed_batch_id,
                    version = EXCLUDED.version,
                    document = EXCLUDED.document
                "#,
            )
            .bind(batch.id)
            .bind(&batch.seed_batch_id)
            .bind(batch.created_at)
            .bind(doc)
            .execute(&mut **tx)
            .await
            .map_err(|e| classify(e, &batch.seed_batch_id))?;
        }
        Mutation::DeleteBatch(id) => {
            sqlx::query("DELETE FROM harvest_batches WHERE id = $1")
                .bind(id)
                .execute(&mut **tx)
                .await
                .map_err(|e| classify(e, &mutation.key().to_string()))?;
        }
        Mutation::PutDistribution(distribution) => {
            let doc = document(distribution.id, distribution)?;
            sqlx::query(
                r#"
                INSERT INTO distributions
                    (id, seed_batch_id, distribution_date, version, created_at, document)
                VALUES ($1, $2, $3, nextval('ledger_version_seq'), $4, $5)
                ON CONFLICT (id) DO UPDATE
                SET seed_batch_id = EXCLUDED.seed_batch_id,
                    distribution_date = EXCLUDED.distribution_date,
                    version = EXCLUDED.version,
                    document = EXCLUDED.document
                "#,
            )
            .bind(distribution.id)
            .bind(&distribution.seed_batch_id)
            .bind(distribution.date)
            .bind(distribution.created_at)
            .bind(doc)
            .execute(&mut **tx)
            .await
            .map_err(|e| classify(e, &mutation.key().to_string()))?;
        }
        Mutation::DeleteDistribution(id) => {
            sqlx::query("DELETE FROM distributions WHERE id = $1")
                .bind(id)
                .execute(&mut **tx)
                .await
                .map_err(|e| classify(e, &mutation.key().to_string()))?;
        }
    }
    Ok(())
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn get_batch_by_id(&self, id: Uuid) -> StoreResult<Option<Versioned<HarvestBatch>>> {
        let row: Option<BatchRow> =
            sqlx::query_as("SELECT version, document FROM harvest_batches WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db)
                .await
                .map_err(|e| classify(e, "harvest batch lookup"))?;
        Ok(row.map(versioned))
    }

    async fn get_batch_by_seed_batch_id(
        &self,
        seed_batch_id: &str,
    ) -> StoreResult<Option<Versioned<HarvestBatch>>> {
        let row: Option<BatchRow> =
            sqlx::query_as("SELECT version, document FROM harvest_batches WHERE seed_batch_id = $1")
                .bind(seed_batch_id)
                .fetch_optional(&self.db)
                .await
                .map_err(|e| classify(e, "harvest batch lookup"))?;
        Ok(row.map(versioned))
    }

    async fn get_distribution_by_id(
        &self,
        id: Uuid,
    ) -> StoreResult<Option<Versioned<Distribution>>> {
        let row: Option<DistributionRow> =
            sqlx::query_as("SELECT version, document FROM distributions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db)
                .await
                .map_err(|e| classify(e, "distribution lookup"))?;
        Ok(row.map(versioned))
    }

    async fn list_batches(&self, filter: &BatchFilter) -> StoreResult<Vec<HarvestBatch>> {
        let rows: Vec<BatchRow> = sqlx::query_as(
            r#"
            SELECT version, document FROM harvest_batches
            WHERE ($1::text IS NULL OR document->>'crop' = $1)
              AND ($2::text IS NULL OR document->>'status' = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.crop.map(|c| c.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await
        .map_err(|e| classify(e, "harvest batch listing"))?;
        Ok(rows.into_iter().map(|row| versioned(row).record).collect())
    }

    async fn list_distributions(
        &self,
        filter: &DistributionFilter,
    ) -> StoreResult<Vec<Distribution>> {
        let rows: Vec<DistributionRow> = sqlx::query_as(
            r#"
            SELECT version, document FROM distributions
            WHERE ($1::text IS NULL OR seed_batch_id = $1)
              AND ($2::text IS NULL OR document->>'mode' = $2)
            ORDER BY distribution_date DESC NULLS LAST, created_at DESC
            "#,
        )
        .bind(filter.seed_batch_id.as_deref())
        .bind(filter.mode.map(|m| m.as_str()))
        .fetch_all(&self.db)
        .await
        .map_err(|e| classify(e, "distribution listing"))?;
        Ok(rows.into_iter().map(|row| versioned(row).record).collect())
    }

    async fn list_distributions_by_seed_batch_id(
        &self,
        seed_batch_id: &str,
    ) -> StoreResult<Vec<Versioned<Distribution>>> {
        let rows: Vec<DistributionRow> = sqlx::query_as(
            "SELECT version, document FROM distributions WHERE seed_batch_id = $1 ORDER BY created_at",
        )
        .bind(seed_batch_id)
        .fetch_all(&self.db)
        .await
        .map_err(|e| classify(e, "distribution listing"))?;
        Ok(rows.into_iter().map(versioned).collect())
    }

    async fn commit(&self, changes: ChangeSet) -> StoreResult<()> {
        let mut tx = self
            .db
            .begin()
            .await
            .map_err(|e| classify(e, "begin transaction"))?;

        // Lock in key order so concurrent commits cannot deadlock each other
        let mut preconditions = changes.preconditions;
        preconditions.sort_by_key(Precondition::key);
        for precondition in &preconditions {
            let current = locked_version(&mut tx, precondition.key()).await?;
            let holds = match precondition {
                Precondition::Version(_, expected) => current == Some(*expected),
                Precondition::Absent(_) => current.is_none(),
            };
            if !holds {
                return Err(StoreError::Conflict(precondition.key().to_string()));
            }
        }

        for mutation in &changes.mutations {
            apply(&mut tx, mutation).await?;
        }

        tx.commit().await.map_err(|e| classify(e, "commit"))?;
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.db)
            .await
            .map_err(|e| classify(e, "ping"))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
