//! Pure REST client for the external business enrichment API.
//!
//! The service runs website enrichment and keyword generation as slow,
//! queued jobs: a submission returns immediately with a job id and a poll
//! URL, and callers poll until the job reaches a terminal state. This crate
//! covers exactly that surface — one call to submit, one call to poll — and
//! keeps no state of its own.
//!
//! # Example
//!
//! ```rust,ignore
//! use enrich_client::{EnrichClient, EnrichmentOptions};
//!
//! let client = EnrichClient::new("https://enrich.example.net/api".into(), "api-key".into())?;
//!
//! let submitted = client
//!     .submit_enrichment("https://www.acme.com", &EnrichmentOptions::default())
//!     .await?;
//! let status = client.poll_job(&submitted.poll_url).await?;
//! println!("{}: {}", submitted.job_id, status.status);
//! ```

pub mod error;
pub mod types;

pub use error::{EnrichError, Result};
pub use types::{
    AddressInfo, BusinessAnalysis, CompanyInfo, ContactChannels, ContactInfo, EnrichRequest,
    EnrichmentOptions, EnrichmentResult, KeywordGenerationResult, KeywordRequest, PollResponse,
    SocialLink, StaffInfo, SubmittedJob, TechnologyInfo,
};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Remote status strings used by the enrichment service.
pub mod remote_status {
    pub const QUEUED: &str = "queued";
    pub const PROCESSING: &str = "processing";
    pub const ACTIVE: &str = "active";
    pub const COMPLETED: &str = "completed";
    pub const FAILED: &str = "failed";
}

pub struct EnrichClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl EnrichClient {
    /// Create a client with a 30 second request timeout.
    pub fn new(base_url: String, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Submit a website for enrichment. Returns immediately with the job id
    /// and poll URL; the actual work happens in the remote queue.
    pub async fn submit_enrichment(
        &self,
        website_url: &str,
        options: &EnrichmentOptions,
    ) -> Result<SubmittedJob> {
        let request = EnrichRequest {
            website_url: website_url.to_string(),
            options: options.clone(),
        };

        let url = format!("{}/enrich", self.base_url);
        let submitted: SubmittedJob = self.post_json(&url, &request).await?;

        tracing::debug!(
            job_id = %submitted.job_id,
            website_url,
            enhanced = options.is_enhanced(),
            "Enrichment job submitted"
        );
        Ok(submitted)
    }

    /// Submit an industry label for keyword generation.
    pub async fn submit_keyword_generation(&self, industry: &str) -> Result<SubmittedJob> {
        let request = KeywordRequest {
            industry: industry.to_string(),
        };

        let url = format!("{}/keywords", self.base_url);
        let submitted: SubmittedJob = self.post_json(&url, &request).await?;

        tracing::debug!(job_id = %submitted.job_id, industry, "Keyword generation job submitted");
        Ok(submitted)
    }

    /// Fetch the current remote state of a job. The poll URL is the one
    /// returned at submission and is treated as opaque.
    pub async fn poll_job(&self, poll_url: &str) -> Result<PollResponse> {
        let resp = self
            .client
            .get(poll_url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EnrichError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(resp.json().await?)
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, url: &str, body: &B) -> Result<T> {
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EnrichError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_stripped() {
        let client = EnrichClient::new("https://api.example.net/".into(), "k".into()).unwrap();
        assert_eq!(client.base_url, "https://api.example.net");
    }

    #[test]
    fn options_default_to_basic_mode() {
        let options = EnrichmentOptions::default();
        assert!(!options.is_enhanced());

        let enhanced = EnrichmentOptions {
            include_technology_extraction: true,
            ..Default::default()
        };
        assert!(enhanced.is_enhanced());
    }

    #[test]
    fn submitted_job_parses_camel_case() {
        let submitted: SubmittedJob = serde_json::from_str(
            r#"{"jobId":"basic-enrichment:123:abc","pollUrl":"https://api/x","position":4,"estimatedWaitTime":120}"#,
        )
        .unwrap();
        assert_eq!(submitted.job_id, "basic-enrichment:123:abc");
        assert_eq!(submitted.position, Some(4));
        assert_eq!(submitted.estimated_wait_time, Some(120));
    }

    #[test]
    fn poll_response_tolerates_missing_fields() {
        let poll: PollResponse = serde_json::from_str(r#"{"status":"processing"}"#).unwrap();
        assert_eq!(poll.status, remote_status::PROCESSING);
        assert!(poll.progress.is_none());
        assert!(poll.result.is_none());
    }

    #[test]
    fn enrichment_result_parses_wire_shape() {
        let result: EnrichmentResult = serde_json::from_str(
            r#"{
                "company": {"website": "https://Example.com/", "name": "Example Inc"},
                "analysis": {"isBusiness": true, "confidence": 0.9},
                "contact": {"addresses": [{"city": "Reno", "country": "USA"}]}
            }"#,
        )
        .unwrap();
        assert!(result.analysis.is_business);
        assert_eq!(result.company.name.as_deref(), Some("Example Inc"));
        assert_eq!(result.contact.addresses[0].city.as_deref(), Some("Reno"));
        assert!(result.staff.is_empty());
    }
}
