//! Storage seam for job records.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::record::{JobRecord, JobRecordPatch, JobStatus};

/// Durable storage for job records. The Postgres implementation is the real
/// one; tests swap in `InMemoryJobRecordStore`.
#[async_trait]
pub trait JobRecordStore: Send + Sync {
    async fn create(&self, record: JobRecord) -> Result<JobRecord>;

    async fn get(&self, id: &str) -> Result<Option<JobRecord>>;

    /// Merge `patch` into the stored record (`result` merges shallowly).
    /// Returns `None` for unknown ids.
    async fn update(&self, id: &str, patch: JobRecordPatch) -> Result<Option<JobRecord>>;

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<JobRecord>>;

    /// Records still in flight, optionally only those submitted before the
    /// given instant (the stuck-job diagnostic).
    async fn list_incomplete(
        &self,
        submitted_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<JobRecord>>;

    /// Completed records whose result has not been consumed yet.
    async fn list_unprocessed_completed(&self) -> Result<Vec<JobRecord>>;

    /// Operator purge. Returns whether a record existed.
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// Postgres-backed store; all SQL lives on the `JobRecord` model.
pub struct PgJobRecordStore {
    pool: PgPool,
}

impl PgJobRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRecordStore for PgJobRecordStore {
    async fn create(&self, record: JobRecord) -> Result<JobRecord> {
        record.insert(&self.pool).await
    }

    async fn get(&self, id: &str) -> Result<Option<JobRecord>> {
        JobRecord::find_by_id(id, &self.pool).await
    }

    async fn update(&self, id: &str, patch: JobRecordPatch) -> Result<Option<JobRecord>> {
        JobRecord::apply_patch(id, &patch, &self.pool).await
    }

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<JobRecord>> {
        JobRecord::list_by_status(status, &self.pool).await
    }

    async fn list_incomplete(
        &self,
        submitted_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<JobRecord>> {
        JobRecord::list_incomplete(submitted_before, &self.pool).await
    }

    async fn list_unprocessed_completed(&self) -> Result<Vec<JobRecord>> {
        JobRecord::list_unprocessed_completed(&self.pool).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        JobRecord::delete_by_id(id, &self.pool).await
    }
}
