//! Fixtures for driving the pipeline against the in-memory doubles.

#![allow(dead_code)]

use std::time::Duration;

use serde_json::json;

use directory_core::kernel::Scheduler;

/// A minimal but valid enrichment payload for the given website.
pub fn basic_payload(website: &str) -> serde_json::Value {
    json!({
        "company": {
            "website": website,
            "name": "Acme Plumbing",
            "description": "Residential plumbing services",
            "services": ["Drain cleaning"],
            "categories": ["Plumbing"]
        },
        "analysis": {"isBusiness": true, "confidence": 0.92, "businessType": "Contractor"},
        "contact": {
            "primary": {"emails": ["info@acme.com"], "phones": ["+1 775 555 0100"]},
            "addresses": [{"street": "1 Main St", "city": "Reno", "state": "NV", "country": "USA"}]
        },
        "socials": [{"platform": "linkedin", "url": "linkedin.com/company/acme"}]
    })
}

/// An enhanced-mode payload: carries technologies and staff.
pub fn enhanced_payload(website: &str) -> serde_json::Value {
    let mut payload = basic_payload(website);
    payload["technologies"] = json!([{"name": "WordPress", "category": "CMS"}]);
    payload["staff"] = json!([{"name": "Jo Smith", "role": "Owner"}]);
    payload
}

pub fn keyword_payload(industry: &str, keywords: &[&str]) -> serde_json::Value {
    json!({ "industry": industry, "keywords": keywords })
}

/// Poll task states until the given task stops running.
pub async fn wait_for_task_idle(scheduler: &Scheduler, id: &str) {
    for _ in 0..200 {
        let running = scheduler
            .task_states()
            .into_iter()
            .find(|t| t.id == id)
            .map(|t| t.is_running)
            .unwrap_or(false);
        if !running {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {id} never finished");
}
