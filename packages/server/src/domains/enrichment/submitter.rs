//! Job submission: one external call, one queued record.

use std::sync::Arc;

use thiserror::Error;

use enrich_client::EnrichmentOptions;

use super::record::{JobRecord, JobStatus, JobType};
use super::store::JobRecordStore;
use crate::kernel::traits::BaseEnrichmentService;

#[derive(Debug, Error)]
pub enum SubmitError {
    /// The external service was unreachable or rejected the submission. No
    /// record was written; callers retry by submitting again.
    #[error("enrichment submission failed: {0}")]
    SubmissionFailed(#[source] anyhow::Error),

    /// The submission was accepted remotely but the record write failed.
    /// The remote job will run unobserved; the id is in the error for
    /// operator follow-up.
    #[error("job record write failed for {job_id}: {source}")]
    Store {
        job_id: String,
        #[source]
        source: anyhow::Error,
    },

    /// Only failed records can be retried.
    #[error("job {id} is {status}; only failed jobs can be retried")]
    NotRetryable { id: String, status: &'static str },

    /// The record's metadata no longer describes a submittable work item.
    #[error("job {id} metadata lacks a work item to resubmit")]
    MissingWorkItem { id: String },
}

/// Submits work items to the external enrichment service and persists the
/// accepted job handles as `queued` records.
///
/// Exactly one external call per invocation, no internal retry loop. A
/// transport failure writes nothing: a queued record without a poll target
/// could never make progress.
pub struct JobSubmitter {
    enrichment: Arc<dyn BaseEnrichmentService>,
    store: Arc<dyn JobRecordStore>,
}

impl JobSubmitter {
    pub fn new(enrichment: Arc<dyn BaseEnrichmentService>, store: Arc<dyn JobRecordStore>) -> Self {
        Self { enrichment, store }
    }

    /// Submit a website for enrichment. Enhanced mode is implied by the
    /// options (staff or technology extraction requested).
    pub async fn submit_enrichment(
        &self,
        website_url: &str,
        options: EnrichmentOptions,
    ) -> Result<JobRecord, SubmitError> {
        let metadata = serde_json::json!({
            "websiteUrl": website_url,
            "options": options,
        });
        self.submit_enrichment_inner(website_url, options, metadata)
            .await
    }

    /// Submit an industry label for keyword generation.
    pub async fn submit_keyword_generation(
        &self,
        industry: &str,
    ) -> Result<JobRecord, SubmitError> {
        let metadata = serde_json::json!({ "industry": industry });
        self.submit_keywords_inner(industry, metadata).await
    }

    /// Operator retry: re-submit the work item echoed in a failed record's
    /// metadata as a fresh record. The failed record stays as the audit
    /// trail; the new record carries `retryOf` pointing back at it.
    pub async fn resubmit(&self, record: &JobRecord) -> Result<JobRecord, SubmitError> {
        if record.status != JobStatus::Failed {
            return Err(SubmitError::NotRetryable {
                id: record.id.clone(),
                status: record.status.as_str(),
            });
        }

        if record.job_type.is_enrichment() {
            let website_url = record
                .website_url()
                .ok_or_else(|| SubmitError::MissingWorkItem {
                    id: record.id.clone(),
                })?
                .to_string();
            let options = record.options();
            let metadata = serde_json::json!({
                "websiteUrl": website_url,
                "options": options,
                "retryOf": record.id,
            });
            self.submit_enrichment_inner(&website_url, options, metadata)
                .await
        } else {
            let industry = record
                .industry()
                .ok_or_else(|| SubmitError::MissingWorkItem {
                    id: record.id.clone(),
                })?
                .to_string();
            let metadata = serde_json::json!({
                "industry": industry,
                "retryOf": record.id,
            });
            self.submit_keywords_inner(&industry, metadata).await
        }
    }

    async fn submit_enrichment_inner(
        &self,
        website_url: &str,
        options: EnrichmentOptions,
        metadata: serde_json::Value,
    ) -> Result<JobRecord, SubmitError> {
        let submitted = self
            .enrichment
            .submit_enrichment(website_url, &options)
            .await
            .map_err(|e| {
                tracing::warn!(website_url, error = %e, "Enrichment submission failed");
                SubmitError::SubmissionFailed(e)
            })?;

        let job_type = if options.is_enhanced() {
            JobType::EnhancedEnrichment
        } else {
            JobType::BasicEnrichment
        };

        self.persist(submitted, job_type, metadata).await
    }

    async fn submit_keywords_inner(
        &self,
        industry: &str,
        metadata: serde_json::Value,
    ) -> Result<JobRecord, SubmitError> {
        let submitted = self
            .enrichment
            .submit_keyword_generation(industry)
            .await
            .map_err(|e| {
                tracing::warn!(industry, error = %e, "Keyword submission failed");
                SubmitError::SubmissionFailed(e)
            })?;

        self.persist(submitted, JobType::KeywordGeneration, metadata)
            .await
    }

    async fn persist(
        &self,
        submitted: enrich_client::SubmittedJob,
        job_type: JobType,
        metadata: serde_json::Value,
    ) -> Result<JobRecord, SubmitError> {
        let mut record = JobRecord::builder()
            .id(submitted.job_id.clone())
            .job_type(job_type)
            .metadata(metadata)
            .poll_url(submitted.poll_url)
            .build();
        record.queue_position = submitted.position;
        record.estimated_wait_secs = submitted.estimated_wait_time;

        let record = self
            .store
            .create(record)
            .await
            .map_err(|source| SubmitError::Store {
                job_id: submitted.job_id.clone(),
                source,
            })?;

        tracing::info!(
            job_id = %record.id,
            job_type = job_type.as_str(),
            queue_position = ?record.queue_position,
            "Job submitted and recorded"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::enrichment::testing::{InMemoryJobRecordStore, MockEnrichmentService};

    fn submitter() -> (
        Arc<MockEnrichmentService>,
        Arc<InMemoryJobRecordStore>,
        JobSubmitter,
    ) {
        let service = Arc::new(MockEnrichmentService::new());
        let store = Arc::new(InMemoryJobRecordStore::new());
        let submitter = JobSubmitter::new(service.clone(), store.clone());
        (service, store, submitter)
    }

    #[tokio::test]
    async fn submit_writes_a_queued_record_with_poll_target() {
        let (service, store, submitter) = submitter();

        let record = submitter
            .submit_enrichment("https://example.com", EnrichmentOptions::default())
            .await
            .unwrap();

        assert_eq!(record.status, JobStatus::Queued);
        assert_eq!(record.job_type, JobType::BasicEnrichment);
        assert!(record.poll_url.starts_with("mock://poll/"));
        assert_eq!(record.website_url(), Some("https://example.com"));
        assert_eq!(service.submission_count(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn enhanced_options_submit_an_enhanced_job() {
        let (_, _, submitter) = submitter();

        let record = submitter
            .submit_enrichment(
                "https://example.com",
                EnrichmentOptions {
                    include_staff_enrichment: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(record.job_type, JobType::EnhancedEnrichment);
    }

    #[tokio::test]
    async fn submission_failure_writes_no_record() {
        let (service, store, submitter) = submitter();
        service.set_should_fail_submissions(true);

        let err = submitter
            .submit_enrichment("https://example.com", EnrichmentOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, SubmitError::SubmissionFailed(_)));
        assert!(store.is_empty());
        // The one external call still happened; there is no internal retry.
        assert_eq!(service.submission_attempts(), 1);
        assert_eq!(service.submission_count(), 0);
    }

    #[tokio::test]
    async fn keyword_submission_records_industry() {
        let (_, _, submitter) = submitter();

        let record = submitter.submit_keyword_generation("Plumbing").await.unwrap();

        assert_eq!(record.job_type, JobType::KeywordGeneration);
        assert_eq!(record.industry(), Some("Plumbing"));
        assert_eq!(record.website_url(), None);
    }

    #[tokio::test]
    async fn resubmit_failed_record_mints_fresh_record_with_retry_marker() {
        let (_, store, submitter) = submitter();

        let mut failed = submitter
            .submit_enrichment("https://example.com", EnrichmentOptions::default())
            .await
            .unwrap();
        failed.status = JobStatus::Failed;

        let retried = submitter.resubmit(&failed).await.unwrap();

        assert_ne!(retried.id, failed.id);
        assert_eq!(retried.status, JobStatus::Queued);
        assert_eq!(retried.website_url(), Some("https://example.com"));
        assert_eq!(
            retried.metadata.get("retryOf").and_then(|v| v.as_str()),
            Some(failed.id.as_str())
        );
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn resubmit_rejects_records_that_did_not_fail() {
        let (_, _, submitter) = submitter();

        let queued = submitter
            .submit_enrichment("https://example.com", EnrichmentOptions::default())
            .await
            .unwrap();

        let err = submitter.resubmit(&queued).await.unwrap_err();
        assert!(matches!(err, SubmitError::NotRetryable { .. }));
    }
}
