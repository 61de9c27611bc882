//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod enrichment;
pub mod scheduled_tasks;
pub mod scheduler;
pub mod test_dependencies;
pub mod traits;

pub use deps::ServerDeps;
pub use enrichment::EnrichmentApiService;
pub use scheduled_tasks::register_default_tasks;
pub use scheduler::{ScheduledTask, Scheduler, TaskContext, TaskSpec};
pub use traits::BaseEnrichmentService;
