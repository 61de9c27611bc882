//! Durable record of one asynchronous enrichment job.
//!
//! A `JobRecord` is created by the submitter when the external service
//! accepts a job, advanced by the poller (status/progress/result), and
//! finally stamped `processed: true` inside `result` once the reconciler
//! has consumed the payload. Records survive process restarts and are the
//! single source of truth for in-flight work.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use typed_builder::TypedBuilder;

use enrich_client::EnrichmentOptions;

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_type", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    KeywordGeneration,
    BasicEnrichment,
    EnhancedEnrichment,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::KeywordGeneration => "keyword-generation",
            JobType::BasicEnrichment => "basic-enrichment",
            JobType::EnhancedEnrichment => "enhanced-enrichment",
        }
    }

    /// Whether the job's result feeds the business reconciler (as opposed to
    /// the industry keyword path).
    pub fn is_enrichment(&self) -> bool {
        matches!(self, JobType::BasicEnrichment | JobType::EnhancedEnrichment)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Queued,
    Processing,
    Active,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Active => "active",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Lifecycle rank. Status writes must be monotone: the poller never
    /// replaces a status with a lower-ranked one.
    pub fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Processing => 1,
            JobStatus::Active => 2,
            JobStatus::Completed | JobStatus::Failed => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Map the remote service's status vocabulary onto the local enum.
    /// Unknown strings yield `None`; the poller treats those as transient.
    pub fn from_remote(status: &str) -> Option<Self> {
        match status {
            "queued" => Some(JobStatus::Queued),
            "processing" => Some(JobStatus::Processing),
            "active" => Some(JobStatus::Active),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

// ============================================================================
// JobRecord Model
// ============================================================================

#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct JobRecord {
    /// Opaque id assigned by the external service at submission, shaped like
    /// `{type}:{unix-millis}:{random}`.
    pub id: String,
    pub job_type: JobType,
    #[builder(default)]
    pub status: JobStatus,
    #[builder(default = 0)]
    pub progress: i32,

    /// Echo of the submitted work item: `websiteUrl` or `industry`, the
    /// options struct, and `retryOf` when this record was minted by an
    /// operator retry.
    #[builder(default = serde_json::json!({}))]
    pub metadata: serde_json::Value,

    /// Raw remote payload once terminal. Writes to this field are shallow
    /// JSON merges, never replacements, so the reconciler can add its
    /// `processed` marker without discarding the original payload.
    #[builder(default, setter(strip_option))]
    pub result: Option<serde_json::Value>,
    #[builder(default, setter(strip_option))]
    pub error: Option<String>,

    pub poll_url: String,
    #[builder(default, setter(strip_option))]
    pub queue_position: Option<i32>,
    #[builder(default, setter(strip_option))]
    pub estimated_wait_secs: Option<i32>,

    #[builder(default = Utc::now())]
    pub submitted_at: DateTime<Utc>,
    #[builder(default, setter(strip_option))]
    pub completed_at: Option<DateTime<Utc>>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

/// Partial update applied by `JobRecordStore::update`. `None` fields are
/// left untouched; `result` merges into the stored JSON object.
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct JobRecordPatch {
    #[builder(default, setter(strip_option))]
    pub status: Option<JobStatus>,
    #[builder(default, setter(strip_option))]
    pub progress: Option<i32>,
    #[builder(default, setter(strip_option))]
    pub error: Option<String>,
    #[builder(default, setter(strip_option))]
    pub result: Option<serde_json::Value>,
    #[builder(default, setter(strip_option))]
    pub queue_position: Option<i32>,
    #[builder(default, setter(strip_option))]
    pub estimated_wait_secs: Option<i32>,
    #[builder(default, setter(strip_option))]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Has the reconciler already consumed this record's result?
    pub fn is_processed(&self) -> bool {
        self.result
            .as_ref()
            .and_then(|r| r.get("processed"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Website URL this job was submitted for (enrichment jobs).
    pub fn website_url(&self) -> Option<&str> {
        self.metadata.get("websiteUrl").and_then(|v| v.as_str())
    }

    /// Industry label this job was submitted for (keyword jobs).
    pub fn industry(&self) -> Option<&str> {
        self.metadata.get("industry").and_then(|v| v.as_str())
    }

    /// Options echoed at submission; defaults when absent or malformed.
    pub fn options(&self) -> EnrichmentOptions {
        self.metadata
            .get("options")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl JobRecord {
    /// Insert this record as-is.
    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        let record = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO job_records (
                id, job_type, status, progress, metadata, result, error, poll_url,
                queue_position, estimated_wait_secs, submitted_at, completed_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(&self.id)
        .bind(self.job_type)
        .bind(self.status)
        .bind(self.progress)
        .bind(&self.metadata)
        .bind(&self.result)
        .bind(&self.error)
        .bind(&self.poll_url)
        .bind(self.queue_position)
        .bind(self.estimated_wait_secs)
        .bind(self.submitted_at)
        .bind(self.completed_at)
        .bind(self.updated_at)
        .fetch_one(pool)
        .await?;
        Ok(record)
    }

    /// Find a record by its id.
    pub async fn find_by_id(id: &str, pool: &PgPool) -> Result<Option<Self>> {
        let record = sqlx::query_as::<_, Self>("SELECT * FROM job_records WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(record)
    }

    /// Apply a partial update. Unset patch fields keep their stored values;
    /// `result` merges shallowly into the stored object. Returns `None` when
    /// the id is unknown.
    pub async fn apply_patch(
        id: &str,
        patch: &JobRecordPatch,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        let record = sqlx::query_as::<_, Self>(
            r#"
            UPDATE job_records
            SET status = COALESCE($2, status),
                progress = COALESCE($3, progress),
                error = COALESCE($4, error),
                result = CASE
                    WHEN $5::jsonb IS NULL THEN result
                    ELSE COALESCE(result, '{}'::jsonb) || $5::jsonb
                END,
                queue_position = COALESCE($6, queue_position),
                estimated_wait_secs = COALESCE($7, estimated_wait_secs),
                completed_at = COALESCE($8, completed_at),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.status)
        .bind(patch.progress)
        .bind(&patch.error)
        .bind(&patch.result)
        .bind(patch.queue_position)
        .bind(patch.estimated_wait_secs)
        .bind(patch.completed_at)
        .fetch_optional(pool)
        .await?;
        Ok(record)
    }

    /// All records with the given status, newest first.
    pub async fn list_by_status(status: JobStatus, pool: &PgPool) -> Result<Vec<Self>> {
        let records = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM job_records
            WHERE status = $1
            ORDER BY submitted_at DESC
            "#,
        )
        .bind(status)
        .fetch_all(pool)
        .await?;
        Ok(records)
    }

    /// Records still in flight (not completed, not failed), oldest first.
    /// With `submitted_before` this doubles as the stuck-job diagnostic.
    pub async fn list_incomplete(
        submitted_before: Option<DateTime<Utc>>,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let records = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM job_records
            WHERE status NOT IN ('completed', 'failed')
              AND ($1::timestamptz IS NULL OR submitted_at < $1)
            ORDER BY submitted_at ASC
            "#,
        )
        .bind(submitted_before)
        .fetch_all(pool)
        .await?;
        Ok(records)
    }

    /// Completed records whose result has not been consumed yet. These come
    /// from operator resets; the periodic sweep re-reconciles them.
    pub async fn list_unprocessed_completed(pool: &PgPool) -> Result<Vec<Self>> {
        let records = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM job_records
            WHERE status = 'completed'
              AND (result ->> 'processed') IS DISTINCT FROM 'true'
            ORDER BY submitted_at ASC
            "#,
        )
        .fetch_all(pool)
        .await?;
        Ok(records)
    }

    /// Operator purge. Returns whether a row was deleted.
    pub async fn delete_by_id(id: &str, pool: &PgPool) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM job_records WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> JobRecord {
        JobRecord::builder()
            .id("basic-enrichment:1700000000000:a1b2c3d4".to_string())
            .job_type(JobType::BasicEnrichment)
            .poll_url("https://enrich.example.net/api/jobs/x".to_string())
            .metadata(serde_json::json!({"websiteUrl": "https://example.com"}))
            .build()
    }

    #[test]
    fn new_record_starts_queued_with_zero_progress() {
        let record = sample_record();
        assert_eq!(record.status, JobStatus::Queued);
        assert_eq!(record.progress, 0);
        assert!(record.result.is_none());
        assert!(record.completed_at.is_none());
    }

    #[test]
    fn status_ranks_are_monotone() {
        assert!(JobStatus::Queued.rank() < JobStatus::Processing.rank());
        assert!(JobStatus::Processing.rank() < JobStatus::Active.rank());
        assert!(JobStatus::Active.rank() < JobStatus::Completed.rank());
        assert_eq!(JobStatus::Completed.rank(), JobStatus::Failed.rank());
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(!JobStatus::Active.is_terminal());
    }

    #[test]
    fn unknown_remote_status_maps_to_none() {
        assert_eq!(JobStatus::from_remote("processing"), Some(JobStatus::Processing));
        assert_eq!(JobStatus::from_remote("active"), Some(JobStatus::Active));
        assert_eq!(JobStatus::from_remote("retrying"), None);
        assert_eq!(JobStatus::from_remote(""), None);
    }

    #[test]
    fn is_processed_requires_explicit_true() {
        let mut record = sample_record();
        assert!(!record.is_processed());

        record.result = Some(serde_json::json!({"company": {}}));
        assert!(!record.is_processed());

        record.result = Some(serde_json::json!({"processed": false}));
        assert!(!record.is_processed());

        record.result = Some(serde_json::json!({"processed": true}));
        assert!(record.is_processed());
    }

    #[test]
    fn metadata_helpers_read_submission_echo() {
        let record = JobRecord::builder()
            .id("enhanced-enrichment:1700000000000:ffffffff".to_string())
            .job_type(JobType::EnhancedEnrichment)
            .poll_url("https://enrich.example.net/api/jobs/y".to_string())
            .metadata(serde_json::json!({
                "websiteUrl": "https://acme.com",
                "options": {"includeStaffEnrichment": true}
            }))
            .build();

        assert_eq!(record.website_url(), Some("https://acme.com"));
        assert_eq!(record.industry(), None);
        assert!(record.options().include_staff_enrichment);
        assert!(!record.options().include_technology_extraction);
    }

    #[test]
    fn keyword_job_types_are_not_enrichment() {
        assert!(JobType::BasicEnrichment.is_enrichment());
        assert!(JobType::EnhancedEnrichment.is_enrichment());
        assert!(!JobType::KeywordGeneration.is_enrichment());
    }
}
