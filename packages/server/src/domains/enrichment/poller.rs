//! Poller / job processor.
//!
//! Scheduler-driven sweep over incomplete job records: fetch remote status
//! through each record's poll URL, advance the local record, and hand
//! terminal results to the reconciler. Records are polled concurrently;
//! per-website serialization happens inside the reconciler.
//!
//! Error posture, per record:
//! - transport error on poll: record untouched, next tick retries
//!   (unbounded; stuck records surface via the incomplete-jobs diagnostic)
//! - remote terminal failure: record marked `failed`, no auto-resubmission
//! - reconciliation failure: raw result kept, a `reconcileError` note is
//!   merged in, status stays incomplete so the next tick retries the whole
//!   step (safe by idempotence)
//! - validation rejection: the job itself succeeded, so the record is
//!   marked completed and processed with the rejection noted

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;

use crate::domains::directory::{payload, ReconcileError, ReconcileOutcome, Reconciler};

use super::record::{JobRecord, JobRecordPatch, JobStatus};
use super::store::JobRecordStore;
use crate::kernel::traits::BaseEnrichmentService;

/// What happened to one record during a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollOutcome {
    /// Transport error or unknown remote status; record untouched.
    Transient,
    /// Still running remotely; status/progress advanced.
    Advanced,
    /// Terminal success, result consumed, record completed.
    Completed,
    /// Remote reported failure; record marked failed.
    Failed,
    /// Terminal success but consuming the result failed; retried next tick.
    Deferred,
}

/// Counts for one sweep, logged per tick and returned as the task summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub polled: usize,
    pub advanced: usize,
    pub completed: usize,
    pub failed: usize,
    pub transient_errors: usize,
    pub deferred: usize,
}

impl PollSummary {
    fn record(&mut self, outcome: PollOutcome) {
        self.polled += 1;
        match outcome {
            PollOutcome::Transient => self.transient_errors += 1,
            PollOutcome::Advanced => self.advanced += 1,
            PollOutcome::Completed => self.completed += 1,
            PollOutcome::Failed => self.failed += 1,
            PollOutcome::Deferred => self.deferred += 1,
        }
    }
}

impl std::fmt::Display for PollSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "polled {} (advanced {}, completed {}, failed {}, transient {}, deferred {})",
            self.polled,
            self.advanced,
            self.completed,
            self.failed,
            self.transient_errors,
            self.deferred
        )
    }
}

pub struct JobPoller {
    enrichment: Arc<dyn BaseEnrichmentService>,
    store: Arc<dyn JobRecordStore>,
    reconciler: Arc<Reconciler>,
}

impl JobPoller {
    pub fn new(
        enrichment: Arc<dyn BaseEnrichmentService>,
        store: Arc<dyn JobRecordStore>,
        reconciler: Arc<Reconciler>,
    ) -> Self {
        Self {
            enrichment,
            store,
            reconciler,
        }
    }

    /// Poll every incomplete record once. Records fan out concurrently.
    pub async fn poll_incomplete(&self) -> Result<PollSummary> {
        let records = self.store.list_incomplete(None).await?;
        if records.is_empty() {
            return Ok(PollSummary::default());
        }

        let outcomes = join_all(records.into_iter().map(|record| self.poll_one(record))).await;

        let mut summary = PollSummary::default();
        for outcome in outcomes {
            summary.record(outcome);
        }
        tracing::info!(summary = %summary, "Poll sweep finished");
        Ok(summary)
    }

    /// Re-consume completed records whose result lost its processed marker
    /// (operator resets). The sweep body of the `process-completed-jobs`
    /// task.
    pub async fn process_unprocessed(&self) -> Result<PollSummary> {
        let records = self.store.list_unprocessed_completed().await?;
        let mut summary = PollSummary::default();

        for record in records {
            let Some(raw) = record.result.clone() else {
                continue;
            };
            summary.record(match self.consume_result(&record, &raw).await {
                true => PollOutcome::Completed,
                false => PollOutcome::Deferred,
            });
        }

        if summary.polled > 0 {
            tracing::info!(summary = %summary, "Unprocessed-jobs sweep finished");
        }
        Ok(summary)
    }

    async fn poll_one(&self, record: JobRecord) -> PollOutcome {
        let response = match self.enrichment.poll(&record.poll_url).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    job_id = %record.id,
                    error = %e,
                    "Poll failed at transport level; will retry next tick"
                );
                return PollOutcome::Transient;
            }
        };

        let Some(remote) = JobStatus::from_remote(&response.status) else {
            tracing::warn!(
                job_id = %record.id,
                status = %response.status,
                "Unknown remote status; leaving record untouched"
            );
            return PollOutcome::Transient;
        };

        match remote {
            JobStatus::Failed => {
                let error = response
                    .error
                    .unwrap_or_else(|| "remote job failed without detail".to_string());
                tracing::warn!(job_id = %record.id, error, "Remote job failed");
                self.patch(
                    &record.id,
                    JobRecordPatch::builder()
                        .status(JobStatus::Failed)
                        .error(error)
                        .completed_at(Utc::now())
                        .build(),
                )
                .await;
                PollOutcome::Failed
            }
            JobStatus::Completed => {
                let Some(raw) = response.result else {
                    tracing::warn!(
                        job_id = %record.id,
                        "Remote job completed without a result payload"
                    );
                    self.patch(
                        &record.id,
                        JobRecordPatch::builder()
                            .status(JobStatus::Failed)
                            .error("remote job completed without a result payload".to_string())
                            .completed_at(Utc::now())
                            .build(),
                    )
                    .await;
                    return PollOutcome::Failed;
                };

                // Persist the raw payload before consuming it, so a crash
                // between the two steps loses nothing.
                self.patch(
                    &record.id,
                    JobRecordPatch::builder()
                        .progress(100)
                        .result(raw.clone())
                        .build(),
                )
                .await;

                if self.consume_result(&record, &raw).await {
                    PollOutcome::Completed
                } else {
                    PollOutcome::Deferred
                }
            }
            remote => {
                // Monotone guard: a stale remote read never moves the
                // record backwards.
                let mut patch = JobRecordPatch::default();
                if remote.rank() > record.status.rank() {
                    patch.status = Some(remote);
                }
                patch.progress = response.progress;
                patch.queue_position = response.position;
                patch.estimated_wait_secs = response.estimated_wait_time;
                self.patch(&record.id, patch).await;
                PollOutcome::Advanced
            }
        }
    }

    /// Hand a terminal result to the reconciler (or the industry keyword
    /// path) and, only on success, mark the record completed and processed.
    /// Returns false when consumption must be retried next tick.
    async fn consume_result(&self, record: &JobRecord, raw: &serde_json::Value) -> bool {
        if record.job_type.is_enrichment() {
            match self.reconciler.reconcile_json(raw).await {
                Ok(outcome) => {
                    self.mark_processed(record, &outcome).await;
                    true
                }
                Err(ReconcileError::Payload(e)) => {
                    // The job succeeded; the payload just isn't usable.
                    tracing::warn!(job_id = %record.id, error = %e, "Enrichment payload rejected");
                    self.mark_rejected(record, &e.to_string()).await;
                    true
                }
                Err(e) => {
                    tracing::error!(job_id = %record.id, error = %e, "Reconciliation failed");
                    self.patch(
                        &record.id,
                        JobRecordPatch::builder()
                            .result(serde_json::json!({ "reconcileError": e.to_string() }))
                            .build(),
                    )
                    .await;
                    false
                }
            }
        } else {
            let result = match payload::parse_keywords(raw) {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(job_id = %record.id, error = %e, "Keyword payload rejected");
                    self.mark_rejected(record, &e.to_string()).await;
                    return true;
                }
            };
            match self.reconciler.apply_keywords(&result).await {
                Ok(industry) => {
                    let outcome = ReconcileOutcome {
                        success: true,
                        created: false,
                        updated: true,
                        business_id: None,
                        message: format!("attached {} keywords to {}", result.keywords.len(), industry.label),
                    };
                    self.mark_processed(record, &outcome).await;
                    true
                }
                Err(e) => {
                    tracing::error!(job_id = %record.id, error = %e, "Applying keywords failed");
                    false
                }
            }
        }
    }

    async fn mark_processed(&self, record: &JobRecord, outcome: &ReconcileOutcome) {
        let stamp = serde_json::json!({
            "processed": true,
            "processedAt": Utc::now(),
            "outcome": outcome,
        });
        self.patch(
            &record.id,
            JobRecordPatch::builder()
                .status(JobStatus::Completed)
                .progress(100)
                .completed_at(record.completed_at.unwrap_or_else(Utc::now))
                .result(stamp)
                .build(),
        )
        .await;
    }

    async fn mark_rejected(&self, record: &JobRecord, reason: &str) {
        let stamp = serde_json::json!({
            "processed": true,
            "processedAt": Utc::now(),
            "validationError": reason,
        });
        self.patch(
            &record.id,
            JobRecordPatch::builder()
                .status(JobStatus::Completed)
                .progress(100)
                .completed_at(record.completed_at.unwrap_or_else(Utc::now))
                .result(stamp)
                .build(),
        )
        .await;
    }

    /// Store writes inside the sweep must not abort the other records; a
    /// vanished id (operator purge mid-sweep) or store hiccup is logged and
    /// the record is picked up again next tick.
    async fn patch(&self, id: &str, patch: JobRecordPatch) {
        match self.store.update(id, patch).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::warn!(job_id = %id, "Job record disappeared during sweep");
            }
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "Job record update failed");
            }
        }
    }
}
