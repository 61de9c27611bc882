// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (like "reconcile an enrichment result") should be domain
// functions that use these traits.
//
// Naming convention: Base* for trait names (e.g., BaseEnrichmentService)

use anyhow::Result;
use async_trait::async_trait;

use enrich_client::{EnrichmentOptions, PollResponse, SubmittedJob};

// =============================================================================
// Enrichment Service Trait (Infrastructure - external job API)
// =============================================================================

#[async_trait]
pub trait BaseEnrichmentService: Send + Sync {
    /// Submit a website for enrichment. The remote service queues the work
    /// and returns a job handle immediately.
    async fn submit_enrichment(
        &self,
        website_url: &str,
        options: &EnrichmentOptions,
    ) -> Result<SubmittedJob>;

    /// Submit an industry label for keyword generation.
    async fn submit_keyword_generation(&self, industry: &str) -> Result<SubmittedJob>;

    /// Fetch the current remote state of a job via its poll URL.
    async fn poll(&self, poll_url: &str) -> Result<PollResponse>;
}
