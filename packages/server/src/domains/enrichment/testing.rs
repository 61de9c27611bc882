//! Enrichment testing utilities.
//!
//! In-memory doubles for the job record store and the external enrichment
//! service, used by unit and integration tests.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use enrich_client::{EnrichmentOptions, PollResponse, SubmittedJob};

use super::record::{JobRecord, JobRecordPatch, JobStatus, JobType};
use super::store::JobRecordStore;
use crate::kernel::traits::BaseEnrichmentService;

/// Mint a job id in the shape the external service uses:
/// `{type}:{unix-millis}:{8-hex-random}`.
pub fn mint_job_id(job_type: JobType) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "{}:{}:{}",
        job_type.as_str(),
        Utc::now().timestamp_millis(),
        &random[..8]
    )
}

/// Shorthand poll responses for scripting the mock service.
pub fn poll_processing(progress: i32) -> PollResponse {
    PollResponse {
        status: "processing".to_string(),
        progress: Some(progress),
        position: None,
        estimated_wait_time: None,
        result: None,
        error: None,
    }
}

pub fn poll_completed(result: serde_json::Value) -> PollResponse {
    PollResponse {
        status: "completed".to_string(),
        progress: Some(100),
        position: None,
        estimated_wait_time: None,
        result: Some(result),
        error: None,
    }
}

pub fn poll_failed(error: &str) -> PollResponse {
    PollResponse {
        status: "failed".to_string(),
        progress: None,
        position: None,
        estimated_wait_time: None,
        result: None,
        error: Some(error.to_string()),
    }
}

// ============================================================================
// In-memory job record store
// ============================================================================

/// Job record store backed by a map. Mirrors the Postgres semantics: patch
/// updates merge field-wise, `result` merges shallowly, unknown ids yield
/// `None`.
pub struct InMemoryJobRecordStore {
    records: RwLock<HashMap<String, JobRecord>>,
}

impl Default for InMemoryJobRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryJobRecordStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// All stored records, unordered.
    pub fn records(&self) -> Vec<JobRecord> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

fn merge_result(target: &mut Option<serde_json::Value>, incoming: serde_json::Value) {
    match (target.as_mut(), incoming) {
        (Some(serde_json::Value::Object(existing)), serde_json::Value::Object(incoming)) => {
            existing.extend(incoming);
        }
        (_, incoming) => *target = Some(incoming),
    }
}

#[async_trait]
impl JobRecordStore for InMemoryJobRecordStore {
    async fn create(&self, record: JobRecord) -> Result<JobRecord> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        if records.contains_key(&record.id) {
            anyhow::bail!("job record {} already exists", record.id);
        }
        records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<JobRecord>> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned())
    }

    async fn update(&self, id: &str, patch: JobRecordPatch) -> Result<Option<JobRecord>> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let Some(record) = records.get_mut(id) else {
            return Ok(None);
        };

        if let Some(status) = patch.status {
            record.status = status;
        }
        if let Some(progress) = patch.progress {
            record.progress = progress;
        }
        if let Some(error) = patch.error {
            record.error = Some(error);
        }
        if let Some(incoming) = patch.result {
            merge_result(&mut record.result, incoming);
        }
        if let Some(position) = patch.queue_position {
            record.queue_position = Some(position);
        }
        if let Some(wait) = patch.estimated_wait_secs {
            record.estimated_wait_secs = Some(wait);
        }
        if let Some(at) = patch.completed_at {
            record.completed_at = Some(at);
        }
        record.updated_at = Utc::now();

        Ok(Some(record.clone()))
    }

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<JobRecord>> {
        let mut records: Vec<JobRecord> = self
            .records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        records.sort_by_key(|r| std::cmp::Reverse(r.submitted_at));
        Ok(records)
    }

    async fn list_incomplete(
        &self,
        submitted_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<JobRecord>> {
        let mut records: Vec<JobRecord> = self
            .records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|r| !r.status.is_terminal())
            .filter(|r| submitted_before.map_or(true, |cutoff| r.submitted_at < cutoff))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.submitted_at);
        Ok(records)
    }

    async fn list_unprocessed_completed(&self) -> Result<Vec<JobRecord>> {
        let mut records: Vec<JobRecord> = self
            .records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|r| r.status == JobStatus::Completed && !r.is_processed())
            .cloned()
            .collect();
        records.sort_by_key(|r| r.submitted_at);
        Ok(records)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self
            .records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
            .is_some())
    }
}

// ============================================================================
// Mock enrichment service
// ============================================================================

/// Scriptable stand-in for the external enrichment API.
///
/// Submissions mint job ids and `mock://poll/{id}` poll URLs. Polls return
/// whatever was last scripted for that URL via [`set_poll_response`]
/// (unscripted URLs report `processing`); [`set_poll_transport_failure`]
/// makes a URL error at the transport level until cleared.
///
/// [`set_poll_response`]: MockEnrichmentService::set_poll_response
/// [`set_poll_transport_failure`]: MockEnrichmentService::set_poll_transport_failure
pub struct MockEnrichmentService {
    submissions: RwLock<Vec<SubmittedJob>>,
    submission_attempts: RwLock<usize>,
    polled: RwLock<Vec<String>>,
    responses: RwLock<HashMap<String, PollResponse>>,
    transport_failures: RwLock<HashMap<String, bool>>,
    should_fail_submissions: RwLock<bool>,
}

impl Default for MockEnrichmentService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEnrichmentService {
    pub fn new() -> Self {
        Self {
            submissions: RwLock::new(Vec::new()),
            submission_attempts: RwLock::new(0),
            polled: RwLock::new(Vec::new()),
            responses: RwLock::new(HashMap::new()),
            transport_failures: RwLock::new(HashMap::new()),
            should_fail_submissions: RwLock::new(false),
        }
    }

    /// Every job handle this service has issued.
    pub fn submissions(&self) -> Vec<SubmittedJob> {
        self.submissions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Submission calls made, including rejected ones.
    pub fn submission_attempts(&self) -> usize {
        *self
            .submission_attempts
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Poll URLs in the order they were polled.
    pub fn polled_urls(&self) -> Vec<String> {
        self.polled
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Make all subsequent submissions fail at the transport level.
    pub fn set_should_fail_submissions(&self, should_fail: bool) {
        *self
            .should_fail_submissions
            .write()
            .unwrap_or_else(|e| e.into_inner()) = should_fail;
    }

    /// Script the response for a poll URL. Sticky until replaced.
    pub fn set_poll_response(&self, poll_url: &str, response: PollResponse) {
        self.responses
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(poll_url.to_string(), response);
    }

    /// Make polls of this URL fail with a transport error until cleared.
    pub fn set_poll_transport_failure(&self, poll_url: &str, should_fail: bool) {
        self.transport_failures
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(poll_url.to_string(), should_fail);
    }

    fn accept(&self, job_type: JobType) -> SubmittedJob {
        let job_id = mint_job_id(job_type);
        let submitted = SubmittedJob {
            job_id: job_id.clone(),
            poll_url: format!("mock://poll/{job_id}"),
            position: Some(self.submission_count() as i32 + 1),
            estimated_wait_time: Some(30),
        };
        self.submissions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(submitted.clone());
        submitted
    }
}

#[async_trait]
impl BaseEnrichmentService for MockEnrichmentService {
    async fn submit_enrichment(
        &self,
        _website_url: &str,
        options: &EnrichmentOptions,
    ) -> Result<SubmittedJob> {
        *self
            .submission_attempts
            .write()
            .unwrap_or_else(|e| e.into_inner()) += 1;
        if *self
            .should_fail_submissions
            .read()
            .unwrap_or_else(|e| e.into_inner())
        {
            anyhow::bail!("mock enrichment service: connection refused");
        }
        let job_type = if options.is_enhanced() {
            JobType::EnhancedEnrichment
        } else {
            JobType::BasicEnrichment
        };
        Ok(self.accept(job_type))
    }

    async fn submit_keyword_generation(&self, _industry: &str) -> Result<SubmittedJob> {
        *self
            .submission_attempts
            .write()
            .unwrap_or_else(|e| e.into_inner()) += 1;
        if *self
            .should_fail_submissions
            .read()
            .unwrap_or_else(|e| e.into_inner())
        {
            anyhow::bail!("mock enrichment service: connection refused");
        }
        Ok(self.accept(JobType::KeywordGeneration))
    }

    async fn poll(&self, poll_url: &str) -> Result<PollResponse> {
        self.polled
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(poll_url.to_string());

        if self
            .transport_failures
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(poll_url)
            .copied()
            .unwrap_or(false)
        {
            anyhow::bail!("mock enrichment service: network unreachable");
        }

        Ok(self
            .responses
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(poll_url)
            .cloned()
            .unwrap_or_else(|| poll_processing(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_ids_carry_type_and_are_unique() {
        let a = mint_job_id(JobType::BasicEnrichment);
        let b = mint_job_id(JobType::BasicEnrichment);
        assert!(a.starts_with("basic-enrichment:"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn in_memory_update_merges_result_shallowly() {
        let store = InMemoryJobRecordStore::new();
        let record = JobRecord::builder()
            .id(mint_job_id(JobType::BasicEnrichment))
            .job_type(JobType::BasicEnrichment)
            .poll_url("mock://poll/x".to_string())
            .build();
        let record = store.create(record).await.unwrap();

        store
            .update(
                &record.id,
                JobRecordPatch::builder()
                    .result(serde_json::json!({"company": {"name": "Acme"}}))
                    .build(),
            )
            .await
            .unwrap();

        let updated = store
            .update(
                &record.id,
                JobRecordPatch::builder()
                    .result(serde_json::json!({"processed": true}))
                    .build(),
            )
            .await
            .unwrap()
            .expect("record exists");

        let result = updated.result.unwrap();
        assert_eq!(result["company"]["name"], "Acme");
        assert_eq!(result["processed"], true);
    }

    #[tokio::test]
    async fn in_memory_update_of_unknown_id_returns_none() {
        let store = InMemoryJobRecordStore::new();
        let outcome = store
            .update("missing", JobRecordPatch::builder().progress(50).build())
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn mock_service_scripts_poll_responses() {
        let service = MockEnrichmentService::new();
        let submitted = service
            .submit_enrichment("https://example.com", &EnrichmentOptions::default())
            .await
            .unwrap();

        // Unscripted: benign processing response.
        let first = service.poll(&submitted.poll_url).await.unwrap();
        assert_eq!(first.status, "processing");

        service.set_poll_response(&submitted.poll_url, poll_failed("blocked by robots.txt"));
        let second = service.poll(&submitted.poll_url).await.unwrap();
        assert_eq!(second.status, "failed");
        assert_eq!(second.error.as_deref(), Some("blocked by robots.txt"));

        service.set_poll_transport_failure(&submitted.poll_url, true);
        assert!(service.poll(&submitted.poll_url).await.is_err());
    }
}
