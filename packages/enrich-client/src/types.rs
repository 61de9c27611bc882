use serde::{Deserialize, Serialize};

/// Feature toggles accepted by the enrichment service. Setting either of the
/// enhanced toggles upgrades the run from basic to enhanced mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentOptions {
    #[serde(default)]
    pub include_staff_enrichment: bool,
    #[serde(default)]
    pub include_technology_extraction: bool,
}

impl EnrichmentOptions {
    /// Whether these options request the enhanced enrichment pipeline.
    pub fn is_enhanced(&self) -> bool {
        self.include_staff_enrichment || self.include_technology_extraction
    }
}

/// Body for `POST /enrich`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichRequest {
    pub website_url: String,
    pub options: EnrichmentOptions,
}

/// Body for `POST /keywords`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordRequest {
    pub industry: String,
}

/// Acknowledgement returned by both submission endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedJob {
    pub job_id: String,
    pub poll_url: String,
    /// Depth of the remote queue at submission time, if the service reports it.
    #[serde(default)]
    pub position: Option<i32>,
    /// Estimated seconds until the job starts, if the service reports it.
    #[serde(default)]
    pub estimated_wait_time: Option<i32>,
}

/// Response of `GET {pollUrl}`.
///
/// `status` is kept as the raw remote vocabulary; mapping onto local job
/// status is the caller's concern.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub status: String,
    #[serde(default)]
    pub progress: Option<i32>,
    #[serde(default)]
    pub position: Option<i32>,
    #[serde(default)]
    pub estimated_wait_time: Option<i32>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

// =============================================================================
// Result payload shapes
//
// A completed enrichment job carries one of these in `PollResponse::result`.
// They are deserialized lazily by the consumer because the job record stores
// the raw JSON first.
// =============================================================================

/// Result of a basic or enhanced website enrichment run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentResult {
    pub company: CompanyInfo,
    pub analysis: BusinessAnalysis,
    #[serde(default)]
    pub contact: ContactInfo,
    #[serde(default)]
    pub socials: Vec<SocialLink>,
    /// Populated in enhanced mode when technology extraction is enabled.
    #[serde(default)]
    pub technologies: Vec<TechnologyInfo>,
    /// Populated in enhanced mode when staff enrichment is enabled.
    #[serde(default)]
    pub staff: Vec<StaffInfo>,
    /// Additional URLs the scraper discovered while crawling the site.
    #[serde(default)]
    pub discovered_urls: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessAnalysis {
    #[serde(default)]
    pub is_business: bool,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub business_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    #[serde(default)]
    pub primary: ContactChannels,
    #[serde(default)]
    pub addresses: Vec<AddressInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactChannels {
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub phones: Vec<String>,
    #[serde(default)]
    pub contact_page: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInfo {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, rename = "zipCode")]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    /// Free-form label such as "headquarters" or "branch".
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialLink {
    pub platform: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnologyInfo {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffInfo {
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Result of a keyword-generation run for an industry label.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordGenerationResult {
    pub industry: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}
