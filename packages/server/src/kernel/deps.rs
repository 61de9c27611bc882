//! Central dependency container.
//!
//! All external services sit behind trait objects so domain logic can be
//! exercised against in-memory doubles; see `kernel/test_dependencies.rs`.
//! Nothing here is a module-level singleton: the container is built once in
//! main and handed around as `Arc<ServerDeps>`.

use std::sync::Arc;

use anyhow::Result;
use sqlx::PgPool;

use crate::domains::directory::{DirectoryStore, PgDirectoryStore, Reconciler};
use crate::domains::enrichment::{JobPoller, JobRecordStore, JobSubmitter, PgJobRecordStore};
use crate::kernel::enrichment::EnrichmentApiService;
use crate::kernel::scheduler::TaskContext;
use crate::kernel::traits::BaseEnrichmentService;

pub struct ServerDeps {
    pub db_pool: PgPool,
    pub enrichment: Arc<dyn BaseEnrichmentService>,
    pub job_store: Arc<dyn JobRecordStore>,
    pub directory: Arc<dyn DirectoryStore>,
    pub submitter: Arc<JobSubmitter>,
    pub reconciler: Arc<Reconciler>,
    pub poller: Arc<JobPoller>,
}

impl ServerDeps {
    /// Production wiring: Postgres stores plus the real enrichment API.
    pub fn new(
        pool: PgPool,
        enrichment_api_url: String,
        enrichment_api_key: String,
    ) -> Result<Self> {
        let enrichment: Arc<dyn BaseEnrichmentService> = Arc::new(EnrichmentApiService::new(
            enrichment_api_url,
            enrichment_api_key,
        )?);
        Ok(Self::with_services(pool, enrichment))
    }

    /// Wiring with an injected enrichment service (tests swap in the mock).
    pub fn with_services(pool: PgPool, enrichment: Arc<dyn BaseEnrichmentService>) -> Self {
        let job_store: Arc<dyn JobRecordStore> = Arc::new(PgJobRecordStore::new(pool.clone()));
        let directory: Arc<dyn DirectoryStore> = Arc::new(PgDirectoryStore::new(pool.clone()));
        let reconciler = Arc::new(Reconciler::new(directory.clone()));
        let submitter = Arc::new(JobSubmitter::new(enrichment.clone(), job_store.clone()));
        let poller = Arc::new(JobPoller::new(
            enrichment.clone(),
            job_store.clone(),
            reconciler.clone(),
        ));

        Self {
            db_pool: pool,
            enrichment,
            job_store,
            directory,
            submitter,
            reconciler,
            poller,
        }
    }

    /// Service handles for scheduled task bodies.
    pub fn task_context(&self) -> TaskContext {
        TaskContext {
            poller: self.poller.clone(),
            reconciler: self.reconciler.clone(),
        }
    }
}
