//! Adapter wiring the `enrich-client` crate into the `BaseEnrichmentService`
//! trait the domain services depend on.

use anyhow::Result;
use async_trait::async_trait;

use enrich_client::{EnrichClient, EnrichmentOptions, PollResponse, SubmittedJob};

use super::traits::BaseEnrichmentService;

pub struct EnrichmentApiService {
    client: EnrichClient,
}

impl EnrichmentApiService {
    pub fn new(base_url: String, api_key: String) -> Result<Self> {
        Ok(Self {
            client: EnrichClient::new(base_url, api_key)?,
        })
    }
}

#[async_trait]
impl BaseEnrichmentService for EnrichmentApiService {
    async fn submit_enrichment(
        &self,
        website_url: &str,
        options: &EnrichmentOptions,
    ) -> Result<SubmittedJob> {
        Ok(self.client.submit_enrichment(website_url, options).await?)
    }

    async fn submit_keyword_generation(&self, industry: &str) -> Result<SubmittedJob> {
        Ok(self.client.submit_keyword_generation(industry).await?)
    }

    async fn poll(&self, poll_url: &str) -> Result<PollResponse> {
        Ok(self.client.poll_job(poll_url).await?)
    }
}
