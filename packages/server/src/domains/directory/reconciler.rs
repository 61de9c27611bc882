//! Reconciliation engine: merge one enrichment result into the deduplicated
//! business aggregate.
//!
//! Per attempt: `received → validated|rejected`, `validated →
//! matched|created`, then children replaced, then one history row appended.
//! Rejection (not a business, no usable website) is a successful no-op, not
//! an error. All writes for one normalized website are serialized behind a
//! per-key lock; the UNIQUE constraint on `businesses.website` is the
//! backstop.
//!
//! Re-running the identical payload is safe: scalar merge fills gaps only
//! and child replacement converges to the same set. A failure while
//! replacing one child type leaves earlier types committed; that partial
//! state is reported (not hidden) and the expected remedy is to re-run.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use enrich_client::{EnrichmentResult, KeywordGenerationResult};

use crate::common::{normalize_website_url, BusinessId, KeyedLock};

use super::models::Industry;
use super::payload::{self, EnrichmentSnapshot, PayloadError};
use super::store::{ChildKind, DirectoryStore};

/// Source tag stamped on history rows written by this engine.
pub const ENRICHMENT_SOURCE: &str = "enrichment-api";

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("invalid enrichment payload: {0}")]
    Payload(#[from] PayloadError),

    /// One child entity type failed to replace. Earlier types in the pass
    /// are already committed; re-running the reconciliation is the remedy.
    #[error("replacing {kind} failed: {source}")]
    ChildMerge {
        kind: ChildKind,
        #[source]
        source: anyhow::Error,
    },

    #[error("directory store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Result of one reconciliation attempt. `success` with neither flag set
/// means the payload was validated and skipped.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub success: bool,
    pub created: bool,
    pub updated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_id: Option<BusinessId>,
    pub message: String,
}

impl ReconcileOutcome {
    fn skipped(message: impl Into<String>) -> Self {
        Self {
            success: true,
            created: false,
            updated: false,
            business_id: None,
            message: message.into(),
        }
    }

    pub fn was_skipped(&self) -> bool {
        self.success && !self.created && !self.updated
    }
}

/// The business directory updater. Stateless apart from the per-website
/// lock registry; all data lives in the store.
pub struct Reconciler {
    store: Arc<dyn DirectoryStore>,
    locks: KeyedLock,
}

impl Reconciler {
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self {
            store,
            locks: KeyedLock::new(),
        }
    }

    /// Reconcile a raw JSON job result (the CMS-facing entrypoint).
    pub async fn reconcile_json(
        &self,
        raw: &serde_json::Value,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let result = payload::parse_enrichment(raw)?;
        self.reconcile(&result).await
    }

    /// Reconcile a validated enrichment result.
    pub async fn reconcile(
        &self,
        result: &EnrichmentResult,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        // Step 1: validate.
        if !result.analysis.is_business {
            let reason = result
                .analysis
                .reasoning
                .as_deref()
                .unwrap_or("analysis flagged as not a business");
            tracing::info!(reason, "Skipping enrichment result: not a business");
            return Ok(ReconcileOutcome::skipped(format!("skipped: {reason}")));
        }

        // Step 2: normalized website is the dedup key.
        let website = normalize_website_url(result.company.website.as_deref().unwrap_or(""));
        if website.is_empty() {
            tracing::info!("Skipping enrichment result: no usable website");
            return Ok(ReconcileOutcome::skipped("skipped: no usable website"));
        }

        // Steps 3-6 hold the per-website lock: two concurrent results for
        // the same site must not race the create-if-absent check.
        let _guard = self.locks.acquire(&website).await;

        let snapshot = EnrichmentSnapshot::from_result(result);
        let existing = self.store.find_by_website(&website).await?;
        let created = existing.is_none();
        let business = match existing {
            Some(business) => {
                self.store
                    .merge_fields(business.id, &snapshot.fields)
                    .await?
            }
            None => self.store.create(&website, &snapshot.fields).await?,
        };

        self.replace_children(business.id, &snapshot).await?;

        // Step 6: history is appended even when nothing changed, so the
        // audit trail covers every run.
        let raw_data = serde_json::to_value(result).map_err(anyhow::Error::from)?;
        let mode = if result.technologies.is_empty() && result.staff.is_empty() {
            "basic"
        } else {
            "enhanced"
        };
        self.store
            .append_enrichment(business.id, ENRICHMENT_SOURCE, mode, &raw_data)
            .await?;

        tracing::info!(
            business_id = %business.id,
            website,
            created,
            "Enrichment result reconciled"
        );
        Ok(ReconcileOutcome {
            success: true,
            created,
            updated: !created,
            business_id: Some(business.id),
            message: if created {
                format!("created business for {website}")
            } else {
                format!("updated business for {website}")
            },
        })
    }

    async fn replace_children(
        &self,
        id: BusinessId,
        snapshot: &EnrichmentSnapshot,
    ) -> Result<(), ReconcileError> {
        let merge = |kind: ChildKind| move |source| ReconcileError::ChildMerge { kind, source };

        self.store
            .replace_addresses(id, &snapshot.addresses)
            .await
            .map_err(merge(ChildKind::Addresses))?;
        self.store
            .replace_contacts(id, &snapshot.contacts)
            .await
            .map_err(merge(ChildKind::Contacts))?;
        self.store
            .replace_socials(id, &snapshot.socials)
            .await
            .map_err(merge(ChildKind::Socials))?;
        self.store
            .replace_technologies(id, &snapshot.technologies)
            .await
            .map_err(merge(ChildKind::Technologies))?;
        self.store
            .replace_services(id, &snapshot.services)
            .await
            .map_err(merge(ChildKind::Services))?;
        self.store
            .replace_staff(id, &snapshot.staff)
            .await
            .map_err(merge(ChildKind::Staff))?;
        self.store
            .link_industries(id, &snapshot.categories)
            .await
            .map_err(merge(ChildKind::IndustryLinks))?;
        self.store
            .replace_discovered_urls(id, &snapshot.discovered_urls)
            .await
            .map_err(merge(ChildKind::DiscoveredUrls))?;
        Ok(())
    }

    /// Apply a keyword-generation result: find-or-create the industry and
    /// union the keywords into it.
    pub async fn apply_keywords(
        &self,
        result: &KeywordGenerationResult,
    ) -> Result<Industry, ReconcileError> {
        let industry = self
            .store
            .add_industry_keywords(&result.industry, &result.keywords)
            .await?;
        tracing::info!(
            industry = %industry.label,
            keyword_count = industry.keywords.len(),
            "Keyword generation result applied"
        );
        Ok(industry)
    }

    /// Re-derive industry links for businesses that have none, from their
    /// most recent stored enrichment snapshot. Returns how many businesses
    /// were relinked.
    pub async fn relink_orphaned(&self) -> Result<u64, ReconcileError> {
        let orphans = self.store.list_without_industries().await?;
        let mut relinked = 0u64;

        for business in orphans {
            let Some(history) = self.store.latest_enrichment(business.id).await? else {
                continue;
            };
            let categories = match payload::parse_enrichment(&history.raw_data) {
                Ok(result) => result.company.categories,
                Err(e) => {
                    tracing::warn!(
                        business_id = %business.id,
                        error = %e,
                        "Stored enrichment snapshot is unparseable; skipping relink"
                    );
                    continue;
                }
            };
            if categories.is_empty() {
                continue;
            }

            let _guard = self.locks.acquire(&business.website).await;
            self.store
                .link_industries(business.id, &categories)
                .await
                .map_err(|source| ReconcileError::ChildMerge {
                    kind: ChildKind::IndustryLinks,
                    source,
                })?;
            relinked += 1;
            tracing::info!(
                business_id = %business.id,
                website = %business.website,
                categories = categories.len(),
                "Relinked orphaned business to industries"
            );
        }

        Ok(relinked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::directory::testing::InMemoryDirectoryStore;
    use serde_json::json;

    fn engine() -> (Arc<InMemoryDirectoryStore>, Reconciler) {
        let store = Arc::new(InMemoryDirectoryStore::new());
        let reconciler = Reconciler::new(store.clone());
        (store, reconciler)
    }

    fn sample_payload() -> serde_json::Value {
        json!({
            "company": {
                "website": "https://Example.com/",
                "name": "Example Inc",
                "services": ["Consulting"],
                "categories": ["Professional Services"]
            },
            "analysis": {"isBusiness": true, "confidence": 0.9},
            "contact": {"addresses": [{"city": "Reno", "country": "USA"}]}
        })
    }

    #[tokio::test]
    async fn creates_business_under_normalized_website() {
        let (store, reconciler) = engine();

        let outcome = reconciler.reconcile_json(&sample_payload()).await.unwrap();

        assert!(outcome.success);
        assert!(outcome.created);
        assert!(!outcome.updated);

        let business = store.get_by_website("example.com").expect("business exists");
        assert_eq!(business.name.as_deref(), Some("Example Inc"));
        assert_eq!(store.child_count(business.id, ChildKind::Addresses), 1);
        assert_eq!(store.child_count(business.id, ChildKind::Services), 1);
        assert_eq!(store.child_count(business.id, ChildKind::IndustryLinks), 1);
    }

    #[tokio::test]
    async fn rejects_non_businesses_without_creating_anything() {
        let (store, reconciler) = engine();

        let outcome = reconciler
            .reconcile_json(&json!({
                "company": {"website": "blog.example.com"},
                "analysis": {"isBusiness": false, "reasoning": "personal blog"}
            }))
            .await
            .unwrap();

        assert!(outcome.was_skipped());
        assert!(outcome.message.contains("personal blog"));
        assert_eq!(store.business_count(), 0);
    }

    #[tokio::test]
    async fn rejects_payloads_without_a_usable_website() {
        let (store, reconciler) = engine();

        let outcome = reconciler
            .reconcile_json(&json!({
                "company": {"website": "https://"},
                "analysis": {"isBusiness": true}
            }))
            .await
            .unwrap();

        assert!(outcome.was_skipped());
        assert_eq!(store.business_count(), 0);
    }

    #[tokio::test]
    async fn reprocessing_the_same_payload_is_idempotent() {
        let (store, reconciler) = engine();

        let first = reconciler.reconcile_json(&sample_payload()).await.unwrap();
        let second = reconciler.reconcile_json(&sample_payload()).await.unwrap();

        assert!(first.created);
        assert!(second.updated);
        assert_eq!(first.business_id, second.business_id);
        assert_eq!(store.business_count(), 1);

        let id = first.business_id.unwrap();
        assert_eq!(store.child_count(id, ChildKind::Addresses), 1);
        assert_eq!(store.child_count(id, ChildKind::Services), 1);
        assert_eq!(store.child_count(id, ChildKind::IndustryLinks), 1);

        // History is the exception: one append-only row per run.
        assert_eq!(store.enrichment_count(id), 2);
    }

    #[tokio::test]
    async fn empty_incoming_fields_never_erase_stored_values() {
        let (store, reconciler) = engine();
        reconciler.reconcile_json(&sample_payload()).await.unwrap();

        let outcome = reconciler
            .reconcile_json(&json!({
                "company": {"website": "example.com", "name": ""},
                "analysis": {"isBusiness": true}
            }))
            .await
            .unwrap();

        assert!(outcome.updated);
        let business = store.get_by_website("example.com").unwrap();
        assert_eq!(business.name.as_deref(), Some("Example Inc"));
    }

    #[tokio::test]
    async fn child_merge_failure_reports_the_failing_kind() {
        let (store, reconciler) = engine();
        store.fail_replacing(ChildKind::Technologies, true);

        let err = reconciler.reconcile_json(&sample_payload()).await.unwrap_err();
        match err {
            ReconcileError::ChildMerge { kind, .. } => {
                assert_eq!(kind, ChildKind::Technologies)
            }
            other => panic!("expected ChildMerge, got {other:?}"),
        }

        // Types replaced before the failure stay committed; the business
        // row exists and re-running after the fault clears converges.
        let business = store.get_by_website("example.com").unwrap();
        assert_eq!(store.child_count(business.id, ChildKind::Addresses), 1);

        store.fail_replacing(ChildKind::Technologies, false);
        let outcome = reconciler.reconcile_json(&sample_payload()).await.unwrap();
        assert!(outcome.success);
        assert_eq!(store.child_count(business.id, ChildKind::Services), 1);
    }

    #[tokio::test]
    async fn keyword_results_attach_to_industries_not_businesses() {
        let (store, reconciler) = engine();

        let industry = reconciler
            .apply_keywords(&enrich_client::KeywordGenerationResult {
                industry: "Plumbing".to_string(),
                keywords: vec!["emergency plumber".to_string()],
            })
            .await
            .unwrap();

        assert_eq!(industry.label, "Plumbing");
        assert_eq!(industry.keywords, vec!["emergency plumber"]);
        assert_eq!(store.business_count(), 0);
    }

    #[tokio::test]
    async fn relink_restores_industry_links_from_latest_snapshot() {
        let (store, reconciler) = engine();
        let outcome = reconciler.reconcile_json(&sample_payload()).await.unwrap();
        let id = outcome.business_id.unwrap();

        store.clear_industry_links(id);
        assert_eq!(store.child_count(id, ChildKind::IndustryLinks), 0);

        let relinked = reconciler.relink_orphaned().await.unwrap();
        assert_eq!(relinked, 1);
        assert_eq!(store.child_count(id, ChildKind::IndustryLinks), 1);

        // Second pass finds no orphans.
        assert_eq!(reconciler.relink_orphaned().await.unwrap(), 0);
    }
}
