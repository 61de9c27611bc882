//! Enrichment job domain: durable job records, submission to the external
//! enrichment service, and the polling sweep that advances records and
//! feeds terminal results to the directory reconciler.

pub mod poller;
pub mod record;
pub mod store;
pub mod submitter;
pub mod testing;

pub use poller::{JobPoller, PollSummary};
pub use record::{JobRecord, JobRecordPatch, JobStatus, JobType};
pub use store::{JobRecordStore, PgJobRecordStore};
pub use submitter::{JobSubmitter, SubmitError};
