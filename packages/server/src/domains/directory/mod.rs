//! Business directory domain: the normalized, deduplicated business
//! aggregate and the reconciliation engine that feeds it.

pub mod models;
pub mod payload;
pub mod reconciler;
pub mod store;
pub mod testing;

pub use payload::{EnrichmentSnapshot, PayloadError};
pub use reconciler::{ReconcileError, ReconcileOutcome, Reconciler, ENRICHMENT_SOURCE};
pub use store::{ChildKind, DirectoryStore, PgDirectoryStore};
