//! Reconciliation engine tests: deduplication under concurrency, merge
//! convergence, and the audit history.

mod common;

use serde_json::json;

use directory_core::domains::directory::{ChildKind, DirectoryStore, ENRICHMENT_SOURCE};
use directory_core::kernel::test_dependencies::TestDeps;

use crate::common::{basic_payload, enhanced_payload};

#[tokio::test]
async fn concurrent_results_for_one_website_create_one_business() {
    let deps = TestDeps::new();

    // Spelling variants of the same site, reconciled concurrently. The
    // per-website lock serializes them onto one row.
    let variants = [
        "https://Acme.com/",
        "http://www.acme.com",
        "acme.com/",
        "https://ACME.COM",
    ];
    let outcomes = futures::future::join_all(variants.iter().map(|website| {
        let payload = basic_payload(website);
        let reconciler = &deps.reconciler;
        async move { reconciler.reconcile_json(&payload).await }
    }))
    .await;

    let mut created = 0;
    let mut updated = 0;
    for outcome in outcomes {
        let outcome = outcome.unwrap();
        assert!(outcome.success);
        if outcome.created {
            created += 1;
        }
        if outcome.updated {
            updated += 1;
        }
    }

    assert_eq!(created, 1);
    assert_eq!(updated, 3);
    assert_eq!(deps.directory.business_count(), 1);
    assert!(deps.directory.get_by_website("acme.com").is_some());
}

#[tokio::test]
async fn child_collections_converge_to_the_latest_payload() {
    let deps = TestDeps::new();

    let mut first = basic_payload("acme.com");
    first["contact"]["addresses"] = json!([
        {"city": "Reno", "country": "USA"},
        {"city": "Sparks", "country": "USA"}
    ]);
    deps.reconciler.reconcile_json(&first).await.unwrap();

    let business = deps.directory.get_by_website("acme.com").unwrap();
    assert_eq!(deps.directory.child_count(business.id, ChildKind::Addresses), 2);

    // A later result with one address replaces the set wholesale.
    deps.reconciler
        .reconcile_json(&basic_payload("acme.com"))
        .await
        .unwrap();
    let addresses = deps.directory.addresses(business.id);
    assert_eq!(addresses.len(), 1);
    assert_eq!(addresses[0].city.as_deref(), Some("Reno"));
}

#[tokio::test]
async fn scalar_merge_fills_gaps_without_erasing() {
    let deps = TestDeps::new();

    deps.reconciler
        .reconcile_json(&json!({
            "company": {"website": "acme.com", "name": "Acme Plumbing"},
            "analysis": {"isBusiness": true}
        }))
        .await
        .unwrap();

    // Second run adds a description and carries an empty name; the stored
    // name survives, the gap gets filled.
    deps.reconciler
        .reconcile_json(&json!({
            "company": {"website": "acme.com", "name": "", "description": "Plumbers in Reno"},
            "analysis": {"isBusiness": true}
        }))
        .await
        .unwrap();

    let business = deps.directory.get_by_website("acme.com").unwrap();
    assert_eq!(business.name.as_deref(), Some("Acme Plumbing"));
    assert_eq!(business.description.as_deref(), Some("Plumbers in Reno"));
}

#[tokio::test]
async fn industry_labels_dedupe_case_insensitively() {
    let deps = TestDeps::new();

    let mut first = basic_payload("acme.com");
    first["company"]["categories"] = json!(["Plumbing"]);
    deps.reconciler.reconcile_json(&first).await.unwrap();

    let mut second = basic_payload("other.com");
    second["company"]["website"] = json!("other.com");
    second["company"]["categories"] = json!(["  plumbing "]);
    deps.reconciler.reconcile_json(&second).await.unwrap();

    // One catalog entry; the first-seen casing wins.
    let industry = deps.directory.industry_by_label("PLUMBING").unwrap();
    assert_eq!(industry.label, "Plumbing");
}

#[tokio::test]
async fn every_run_appends_a_history_row_with_its_mode() {
    let deps = TestDeps::new();

    deps.reconciler
        .reconcile_json(&basic_payload("acme.com"))
        .await
        .unwrap();
    let business = deps.directory.get_by_website("acme.com").unwrap();

    let row = deps
        .directory
        .latest_enrichment(business.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.source, ENRICHMENT_SOURCE);
    assert_eq!(row.mode, "basic");

    deps.reconciler
        .reconcile_json(&enhanced_payload("acme.com"))
        .await
        .unwrap();
    let row = deps
        .directory
        .latest_enrichment(business.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.mode, "enhanced");
    assert_eq!(deps.directory.enrichment_count(business.id), 2);
}

#[tokio::test]
async fn partial_child_failure_is_repaired_by_rerunning() {
    let deps = TestDeps::new();

    deps.directory.fail_replacing(ChildKind::Socials, true);
    let err = deps
        .reconciler
        .reconcile_json(&basic_payload("acme.com"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("socials"));

    // The business row and the children merged before the fault remain.
    let business = deps.directory.get_by_website("acme.com").unwrap();
    assert_eq!(deps.directory.child_count(business.id, ChildKind::Contacts), 2);
    assert_eq!(deps.directory.child_count(business.id, ChildKind::Socials), 0);

    deps.directory.fail_replacing(ChildKind::Socials, false);
    let outcome = deps
        .reconciler
        .reconcile_json(&basic_payload("acme.com"))
        .await
        .unwrap();
    assert!(outcome.updated);
    assert_eq!(deps.directory.child_count(business.id, ChildKind::Socials), 1);
    assert_eq!(deps.directory.business_count(), 1);
}

#[tokio::test]
async fn relink_restores_severed_industry_links() {
    let deps = TestDeps::new();

    deps.reconciler
        .reconcile_json(&basic_payload("acme.com"))
        .await
        .unwrap();
    let business = deps.directory.get_by_website("acme.com").unwrap();
    deps.directory.clear_industry_links(business.id);

    let relinked = deps.reconciler.relink_orphaned().await.unwrap();
    assert_eq!(relinked, 1);
    assert_eq!(
        deps.directory
            .child_count(business.id, ChildKind::IndustryLinks),
        1
    );
}
