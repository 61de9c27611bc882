//! Test dependency bundle.
//!
//! `TestDeps` wires the domain services over the in-memory stores and the
//! mock enrichment service, mirroring `ServerDeps` without a database.

use std::sync::Arc;

use crate::domains::directory::testing::InMemoryDirectoryStore;
use crate::domains::directory::Reconciler;
use crate::domains::enrichment::testing::{InMemoryJobRecordStore, MockEnrichmentService};
use crate::domains::enrichment::{JobPoller, JobSubmitter};
use crate::kernel::scheduler::TaskContext;

pub struct TestDeps {
    pub enrichment: Arc<MockEnrichmentService>,
    pub job_store: Arc<InMemoryJobRecordStore>,
    pub directory: Arc<InMemoryDirectoryStore>,
    pub submitter: Arc<JobSubmitter>,
    pub reconciler: Arc<Reconciler>,
    pub poller: Arc<JobPoller>,
}

impl Default for TestDeps {
    fn default() -> Self {
        Self::new()
    }
}

impl TestDeps {
    pub fn new() -> Self {
        let enrichment = Arc::new(MockEnrichmentService::new());
        let job_store = Arc::new(InMemoryJobRecordStore::new());
        let directory = Arc::new(InMemoryDirectoryStore::new());
        let reconciler = Arc::new(Reconciler::new(directory.clone()));
        let submitter = Arc::new(JobSubmitter::new(enrichment.clone(), job_store.clone()));
        let poller = Arc::new(JobPoller::new(
            enrichment.clone(),
            job_store.clone(),
            reconciler.clone(),
        ));

        Self {
            enrichment,
            job_store,
            directory,
            submitter,
            reconciler,
            poller,
        }
    }

    pub fn task_context(&self) -> TaskContext {
        TaskContext {
            poller: self.poller.clone(),
            reconciler: self.reconciler.clone(),
        }
    }
}
