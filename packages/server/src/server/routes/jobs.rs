//! Job submission, queries, and operator actions.

use axum::extract::{Extension, Path, Query};
use axum::Json;
use chrono::{Duration, Utc};
use serde::Deserialize;

use enrich_client::EnrichmentOptions;

use crate::domains::enrichment::{JobRecord, JobRecordPatch, JobStatus, SubmitError};
use crate::server::app::AppState;

use super::{ApiError, ApiResult};

fn submit_error(e: SubmitError) -> ApiError {
    match &e {
        SubmitError::SubmissionFailed(_) => ApiError::bad_gateway(e.to_string()),
        SubmitError::NotRetryable { .. } | SubmitError::MissingWorkItem { .. } => {
            ApiError::conflict(e.to_string())
        }
        SubmitError::Store { .. } => ApiError::internal(e.to_string()),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitEnrichmentRequest {
    pub website_url: String,
    #[serde(default)]
    pub options: EnrichmentOptions,
}

pub async fn submit_enrichment_handler(
    Extension(state): Extension<AppState>,
    Json(body): Json<SubmitEnrichmentRequest>,
) -> ApiResult<JobRecord> {
    let record = state
        .deps
        .submitter
        .submit_enrichment(&body.website_url, body.options)
        .await
        .map_err(submit_error)?;
    Ok(Json(record))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitKeywordsRequest {
    pub industry: String,
}

pub async fn submit_keywords_handler(
    Extension(state): Extension<AppState>,
    Json(body): Json<SubmitKeywordsRequest>,
) -> ApiResult<JobRecord> {
    let record = state
        .deps
        .submitter
        .submit_keyword_generation(&body.industry)
        .await
        .map_err(submit_error)?;
    Ok(Json(record))
}

pub async fn get_job_handler(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> ApiResult<JobRecord> {
    let record = state
        .deps
        .job_store
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {id} not found")))?;
    Ok(Json(record))
}

#[derive(Deserialize)]
pub struct ListJobsQuery {
    pub status: JobStatus,
}

pub async fn list_jobs_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> ApiResult<Vec<JobRecord>> {
    let records = state.deps.job_store.list_by_status(query.status).await?;
    Ok(Json(records))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncompleteJobsQuery {
    /// Only records submitted more than this many minutes ago (the
    /// stuck-job diagnostic). Absent means all incomplete records.
    pub older_than_minutes: Option<i64>,
}

pub async fn incomplete_jobs_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<IncompleteJobsQuery>,
) -> ApiResult<Vec<JobRecord>> {
    let cutoff = query
        .older_than_minutes
        .map(|minutes| Utc::now() - Duration::minutes(minutes));
    let records = state.deps.job_store.list_incomplete(cutoff).await?;
    Ok(Json(records))
}

/// Re-submit a failed job's work item as a fresh record.
pub async fn retry_job_handler(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> ApiResult<JobRecord> {
    let record = state
        .deps
        .job_store
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {id} not found")))?;
    let retried = state
        .deps
        .submitter
        .resubmit(&record)
        .await
        .map_err(submit_error)?;
    Ok(Json(retried))
}

/// Clear a completed record's processed marker so the sweep re-reconciles
/// it. The only sanctioned way to reopen consumed work.
pub async fn reset_job_handler(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> ApiResult<JobRecord> {
    let record = state
        .deps
        .job_store
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {id} not found")))?;
    if record.status != JobStatus::Completed {
        return Err(ApiError::conflict(format!(
            "job {id} is {}; only completed jobs can be reset",
            record.status.as_str()
        )));
    }

    let updated = state
        .deps
        .job_store
        .update(
            &id,
            JobRecordPatch::builder()
                .result(serde_json::json!({ "processed": false }))
                .build(),
        )
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {id} not found")))?;
    tracing::info!(job_id = %id, "Job reset for re-processing");
    Ok(Json(updated))
}

/// Operator purge; records are never deleted automatically.
pub async fn delete_job_handler(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let deleted = state.deps.job_store.delete(&id).await?;
    if !deleted {
        return Err(ApiError::not_found(format!("job {id} not found")));
    }
    tracing::info!(job_id = %id, "Job record purged");
    Ok(Json(serde_json::json!({ "deleted": true })))
}
