//! Storage seam for the business directory.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;

use crate::common::BusinessId;

use super::models::{
    AddressInput, Business, BusinessAddress, BusinessContact, BusinessDiscoveredUrl,
    BusinessEnrichment, BusinessFields, BusinessService, BusinessSocialProfile,
    BusinessStaffMember, BusinessTechnology, ContactInput, Industry, SocialProfileInput,
    StaffInput, TechnologyInput,
};

/// The child collections replaced during reconciliation. Used to name the
/// failing entity type in `ReconcileError::ChildMerge` and to script
/// failures in the in-memory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChildKind {
    Addresses,
    Contacts,
    Socials,
    Technologies,
    Services,
    Staff,
    IndustryLinks,
    DiscoveredUrls,
}

impl ChildKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChildKind::Addresses => "addresses",
            ChildKind::Contacts => "contacts",
            ChildKind::Socials => "socials",
            ChildKind::Technologies => "technologies",
            ChildKind::Services => "services",
            ChildKind::Staff => "staff",
            ChildKind::IndustryLinks => "industry-links",
            ChildKind::DiscoveredUrls => "discovered-urls",
        }
    }
}

impl std::fmt::Display for ChildKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable storage for the business aggregate. Each `replace_*` is a
/// clear-then-insert scoped to one business and one entity type, atomic for
/// that type (its own transaction in Postgres).
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn find_by_id(&self, id: BusinessId) -> Result<Option<Business>>;

    /// Look up by normalized website (the dedup key).
    async fn find_by_website(&self, website: &str) -> Result<Option<Business>>;

    /// Create a business for a normalized website. Fails if one already
    /// exists for that key (UNIQUE backstop behind the per-key lock).
    async fn create(&self, website: &str, fields: &BusinessFields) -> Result<Business>;

    /// Merge scalar fields: non-empty incoming values overwrite, empty or
    /// absent ones keep the stored value.
    async fn merge_fields(&self, id: BusinessId, fields: &BusinessFields) -> Result<Business>;

    async fn replace_addresses(&self, id: BusinessId, addresses: &[AddressInput]) -> Result<()>;
    async fn replace_contacts(&self, id: BusinessId, contacts: &[ContactInput]) -> Result<()>;
    async fn replace_socials(&self, id: BusinessId, socials: &[SocialProfileInput]) -> Result<()>;
    async fn replace_technologies(
        &self,
        id: BusinessId,
        technologies: &[TechnologyInput],
    ) -> Result<()>;
    async fn replace_services(&self, id: BusinessId, services: &[String]) -> Result<()>;
    async fn replace_staff(&self, id: BusinessId, staff: &[StaffInput]) -> Result<()>;
    async fn replace_discovered_urls(&self, id: BusinessId, urls: &[String]) -> Result<()>;

    /// Find-or-create industries for `labels` and replace the business's
    /// industry links with that set.
    async fn link_industries(&self, id: BusinessId, labels: &[String]) -> Result<()>;

    /// Find-or-create the industry for `label` and union `keywords` into it.
    async fn add_industry_keywords(&self, label: &str, keywords: &[String]) -> Result<Industry>;

    /// Append one immutable history row.
    async fn append_enrichment(
        &self,
        id: BusinessId,
        source: &str,
        mode: &str,
        raw_data: &serde_json::Value,
    ) -> Result<BusinessEnrichment>;

    async fn latest_enrichment(&self, id: BusinessId) -> Result<Option<BusinessEnrichment>>;

    /// Businesses with zero industry links (orphan-relink candidates).
    async fn list_without_industries(&self) -> Result<Vec<Business>>;
}

/// Postgres-backed store; all SQL lives on the directory models.
pub struct PgDirectoryStore {
    pool: PgPool,
}

impl PgDirectoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DirectoryStore for PgDirectoryStore {
    async fn find_by_id(&self, id: BusinessId) -> Result<Option<Business>> {
        Business::find_by_id(id, &self.pool).await
    }

    async fn find_by_website(&self, website: &str) -> Result<Option<Business>> {
        Business::find_by_website(website, &self.pool).await
    }

    async fn create(&self, website: &str, fields: &BusinessFields) -> Result<Business> {
        Business::create(website, fields, &self.pool).await
    }

    async fn merge_fields(&self, id: BusinessId, fields: &BusinessFields) -> Result<Business> {
        Business::merge_fields(id, fields, &self.pool).await
    }

    async fn replace_addresses(&self, id: BusinessId, addresses: &[AddressInput]) -> Result<()> {
        BusinessAddress::replace_for_business(id, addresses, &self.pool).await
    }

    async fn replace_contacts(&self, id: BusinessId, contacts: &[ContactInput]) -> Result<()> {
        BusinessContact::replace_for_business(id, contacts, &self.pool).await
    }

    async fn replace_socials(&self, id: BusinessId, socials: &[SocialProfileInput]) -> Result<()> {
        BusinessSocialProfile::replace_for_business(id, socials, &self.pool).await
    }

    async fn replace_technologies(
        &self,
        id: BusinessId,
        technologies: &[TechnologyInput],
    ) -> Result<()> {
        BusinessTechnology::replace_for_business(id, technologies, &self.pool).await
    }

    async fn replace_services(&self, id: BusinessId, services: &[String]) -> Result<()> {
        BusinessService::replace_for_business(id, services, &self.pool).await
    }

    async fn replace_staff(&self, id: BusinessId, staff: &[StaffInput]) -> Result<()> {
        BusinessStaffMember::replace_for_business(id, staff, &self.pool).await
    }

    async fn replace_discovered_urls(&self, id: BusinessId, urls: &[String]) -> Result<()> {
        BusinessDiscoveredUrl::replace_for_business(id, urls, &self.pool).await
    }

    async fn link_industries(&self, id: BusinessId, labels: &[String]) -> Result<()> {
        let mut industry_ids = Vec::with_capacity(labels.len());
        for label in labels {
            if label.trim().is_empty() {
                continue;
            }
            let industry = Industry::find_or_create(label, &self.pool).await?;
            industry_ids.push(industry.id);
        }
        Industry::replace_links_for_business(id, &industry_ids, &self.pool).await
    }

    async fn add_industry_keywords(&self, label: &str, keywords: &[String]) -> Result<Industry> {
        let industry = Industry::find_or_create(label, &self.pool).await?;
        Industry::add_keywords(industry.id, keywords, &self.pool).await
    }

    async fn append_enrichment(
        &self,
        id: BusinessId,
        source: &str,
        mode: &str,
        raw_data: &serde_json::Value,
    ) -> Result<BusinessEnrichment> {
        BusinessEnrichment::append(id, source, mode, raw_data, &self.pool).await
    }

    async fn latest_enrichment(&self, id: BusinessId) -> Result<Option<BusinessEnrichment>> {
        BusinessEnrichment::latest_for_business(id, &self.pool).await
    }

    async fn list_without_industries(&self) -> Result<Vec<Business>> {
        Business::find_without_industries(&self.pool).await
    }
}
