//! Reconciliation entrypoint consumed by the CMS/admin layer.

use axum::extract::Extension;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::common::BusinessId;
use crate::domains::directory::{ReconcileError, ReconcileOutcome};
use crate::domains::enrichment::{JobRecordPatch, JobStatus};
use crate::server::app::AppState;

use super::{ApiError, ApiResult};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRequest {
    pub enrichment_result: serde_json::Value,
    /// When present, the matching job record is stamped processed on
    /// success.
    pub job_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResponse {
    pub success: bool,
    pub created: bool,
    pub updated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_id: Option<BusinessId>,
    pub message: String,
}

impl From<ReconcileOutcome> for ReconcileResponse {
    fn from(outcome: ReconcileOutcome) -> Self {
        Self {
            success: outcome.success,
            created: outcome.created,
            updated: outcome.updated,
            business_id: outcome.business_id,
            message: outcome.message,
        }
    }
}

pub async fn reconcile_handler(
    Extension(state): Extension<AppState>,
    Json(body): Json<ReconcileRequest>,
) -> ApiResult<ReconcileResponse> {
    let outcome = state
        .deps
        .reconciler
        .reconcile_json(&body.enrichment_result)
        .await
        .map_err(|e| match e {
            ReconcileError::Payload(_) => ApiError::bad_request(e.to_string()),
            other => ApiError::internal(other.to_string()),
        })?;

    if let Some(job_id) = &body.job_id {
        let stamp = serde_json::json!({
            "processed": true,
            "processedAt": Utc::now(),
            "outcome": &outcome,
        });
        let patched = state
            .deps
            .job_store
            .update(
                job_id,
                JobRecordPatch::builder()
                    .status(JobStatus::Completed)
                    .progress(100)
                    .completed_at(Utc::now())
                    .result(stamp)
                    .build(),
            )
            .await?;
        if patched.is_none() {
            tracing::warn!(job_id = %job_id, "Reconcile referenced an unknown job record");
        }
    }

    Ok(Json(outcome.into()))
}
