//! Directory testing utilities.
//!
//! `InMemoryDirectoryStore` mirrors the Postgres semantics the reconciler
//! depends on: website uniqueness, fill-gaps scalar merge, wholesale child
//! replacement, append-only history. Individual child kinds can be scripted
//! to fail so partial-merge behavior is testable.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use crate::common::{normalize_label, BusinessId, EnrichmentId, IndustryId};

use super::models::{
    AddressInput, Business, BusinessEnrichment, BusinessFields, ContactInput, Industry,
    SocialProfileInput, StaffInput, TechnologyInput,
};
use super::store::{ChildKind, DirectoryStore};

#[derive(Default)]
struct Inner {
    businesses: HashMap<BusinessId, Business>,
    by_website: HashMap<String, BusinessId>,
    addresses: HashMap<BusinessId, Vec<AddressInput>>,
    contacts: HashMap<BusinessId, Vec<ContactInput>>,
    socials: HashMap<BusinessId, Vec<SocialProfileInput>>,
    technologies: HashMap<BusinessId, Vec<TechnologyInput>>,
    services: HashMap<BusinessId, Vec<String>>,
    staff: HashMap<BusinessId, Vec<StaffInput>>,
    discovered_urls: HashMap<BusinessId, Vec<String>>,
    industry_links: HashMap<BusinessId, Vec<IndustryId>>,
    industries: HashMap<String, Industry>,
    enrichments: HashMap<BusinessId, Vec<BusinessEnrichment>>,
    failing: HashSet<ChildKind>,
}

impl Inner {
    fn find_or_create_industry(&mut self, label: &str) -> Industry {
        let key = normalize_label(label);
        self.industries
            .entry(key.clone())
            .or_insert_with(|| Industry {
                id: IndustryId::new(),
                label: label.trim().to_string(),
                normalized_label: key,
                keywords: Vec::new(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .clone()
    }
}

#[derive(Default)]
pub struct InMemoryDirectoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryDirectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `replace_*` for the given child kind fail until cleared.
    pub fn fail_replacing(&self, kind: ChildKind, should_fail: bool) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if should_fail {
            inner.failing.insert(kind);
        } else {
            inner.failing.remove(&kind);
        }
    }

    pub fn business_count(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .businesses
            .len()
    }

    pub fn get_by_website(&self, website: &str) -> Option<Business> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let id = inner.by_website.get(website)?;
        inner.businesses.get(id).cloned()
    }

    pub fn child_count(&self, id: BusinessId, kind: ChildKind) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        match kind {
            ChildKind::Addresses => inner.addresses.get(&id).map_or(0, Vec::len),
            ChildKind::Contacts => inner.contacts.get(&id).map_or(0, Vec::len),
            ChildKind::Socials => inner.socials.get(&id).map_or(0, Vec::len),
            ChildKind::Technologies => inner.technologies.get(&id).map_or(0, Vec::len),
            ChildKind::Services => inner.services.get(&id).map_or(0, Vec::len),
            ChildKind::Staff => inner.staff.get(&id).map_or(0, Vec::len),
            ChildKind::IndustryLinks => inner.industry_links.get(&id).map_or(0, Vec::len),
            ChildKind::DiscoveredUrls => inner.discovered_urls.get(&id).map_or(0, Vec::len),
        }
    }

    pub fn addresses(&self, id: BusinessId) -> Vec<AddressInput> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .addresses
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn industry_by_label(&self, label: &str) -> Option<Industry> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .industries
            .get(&normalize_label(label))
            .cloned()
    }

    pub fn enrichment_count(&self, id: BusinessId) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .enrichments
            .get(&id)
            .map_or(0, Vec::len)
    }

    /// Sever a business's industry links to set up orphan-relink tests.
    pub fn clear_industry_links(&self, id: BusinessId) {
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .industry_links
            .remove(&id);
    }

    fn check_failing(&self, kind: ChildKind) -> Result<()> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        if inner.failing.contains(&kind) {
            anyhow::bail!("scripted failure replacing {kind}");
        }
        Ok(())
    }
}

fn merge_scalar(existing: &mut Option<String>, incoming: &Option<String>) {
    if let Some(value) = incoming {
        if !value.trim().is_empty() {
            *existing = Some(value.clone());
        }
    }
}

#[async_trait]
impl DirectoryStore for InMemoryDirectoryStore {
    async fn find_by_id(&self, id: BusinessId) -> Result<Option<Business>> {
        Ok(self
            .inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .businesses
            .get(&id)
            .cloned())
    }

    async fn find_by_website(&self, website: &str) -> Result<Option<Business>> {
        Ok(self.get_by_website(website))
    }

    async fn create(&self, website: &str, fields: &BusinessFields) -> Result<Business> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if inner.by_website.contains_key(website) {
            // Mirrors the UNIQUE constraint on businesses.website.
            anyhow::bail!("duplicate website key: {website}");
        }
        let business = Business {
            id: BusinessId::new(),
            website: website.to_string(),
            name: fields.name.clone(),
            description: fields.description.clone(),
            business_type: fields.business_type.clone(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        inner.by_website.insert(website.to_string(), business.id);
        inner.businesses.insert(business.id, business.clone());
        Ok(business)
    }

    async fn merge_fields(&self, id: BusinessId, fields: &BusinessFields) -> Result<Business> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let business = inner
            .businesses
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("unknown business {id}"))?;
        merge_scalar(&mut business.name, &fields.name);
        merge_scalar(&mut business.description, &fields.description);
        merge_scalar(&mut business.business_type, &fields.business_type);
        business.updated_at = Utc::now();
        Ok(business.clone())
    }

    async fn replace_addresses(&self, id: BusinessId, addresses: &[AddressInput]) -> Result<()> {
        self.check_failing(ChildKind::Addresses)?;
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.addresses.insert(id, addresses.to_vec());
        Ok(())
    }

    async fn replace_contacts(&self, id: BusinessId, contacts: &[ContactInput]) -> Result<()> {
        self.check_failing(ChildKind::Contacts)?;
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.contacts.insert(id, contacts.to_vec());
        Ok(())
    }

    async fn replace_socials(&self, id: BusinessId, socials: &[SocialProfileInput]) -> Result<()> {
        self.check_failing(ChildKind::Socials)?;
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.socials.insert(id, socials.to_vec());
        Ok(())
    }

    async fn replace_technologies(
        &self,
        id: BusinessId,
        technologies: &[TechnologyInput],
    ) -> Result<()> {
        self.check_failing(ChildKind::Technologies)?;
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.technologies.insert(id, technologies.to_vec());
        Ok(())
    }

    async fn replace_services(&self, id: BusinessId, services: &[String]) -> Result<()> {
        self.check_failing(ChildKind::Services)?;
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.services.insert(id, services.to_vec());
        Ok(())
    }

    async fn replace_staff(&self, id: BusinessId, staff: &[StaffInput]) -> Result<()> {
        self.check_failing(ChildKind::Staff)?;
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.staff.insert(id, staff.to_vec());
        Ok(())
    }

    async fn replace_discovered_urls(&self, id: BusinessId, urls: &[String]) -> Result<()> {
        self.check_failing(ChildKind::DiscoveredUrls)?;
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.discovered_urls.insert(id, urls.to_vec());
        Ok(())
    }

    async fn link_industries(&self, id: BusinessId, labels: &[String]) -> Result<()> {
        self.check_failing(ChildKind::IndustryLinks)?;
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let mut ids = Vec::new();
        for label in labels {
            if label.trim().is_empty() {
                continue;
            }
            let industry = inner.find_or_create_industry(label);
            if !ids.contains(&industry.id) {
                ids.push(industry.id);
            }
        }
        inner.industry_links.insert(id, ids);
        Ok(())
    }

    async fn add_industry_keywords(&self, label: &str, keywords: &[String]) -> Result<Industry> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let industry = inner.find_or_create_industry(label);
        let entry = inner
            .industries
            .get_mut(&industry.normalized_label)
            .expect("just created");
        for keyword in keywords {
            if !entry.keywords.contains(keyword) {
                entry.keywords.push(keyword.clone());
            }
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn append_enrichment(
        &self,
        id: BusinessId,
        source: &str,
        mode: &str,
        raw_data: &serde_json::Value,
    ) -> Result<BusinessEnrichment> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let row = BusinessEnrichment {
            id: EnrichmentId::new(),
            business_id: id,
            source: source.to_string(),
            mode: mode.to_string(),
            raw_data: raw_data.clone(),
            processed_at: Utc::now(),
        };
        inner.enrichments.entry(id).or_default().push(row.clone());
        Ok(row)
    }

    async fn latest_enrichment(&self, id: BusinessId) -> Result<Option<BusinessEnrichment>> {
        Ok(self
            .inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .enrichments
            .get(&id)
            .and_then(|rows| rows.last())
            .cloned())
    }

    async fn list_without_industries(&self) -> Result<Vec<Business>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut orphans: Vec<Business> = inner
            .businesses
            .values()
            .filter(|b| inner.industry_links.get(&b.id).map_or(true, Vec::is_empty))
            .cloned()
            .collect();
        orphans.sort_by_key(|b| b.created_at);
        Ok(orphans)
    }
}
