//! The recurring maintenance tasks registered with the scheduler.
//!
//! Task bodies are thin: they call one domain service and return a one-line
//! summary for the run log. All scheduling state (running flag, last/next
//! run, logs) is owned by the scheduler itself.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::scheduler::{ScheduledTask, Scheduler, TaskContext, TaskSpec};

/// Sweep incomplete job records: poll the external service and advance or
/// complete each one.
pub struct PollEnrichmentJobsTask;

#[async_trait]
impl ScheduledTask for PollEnrichmentJobsTask {
    async fn run(&self, ctx: &TaskContext) -> Result<String> {
        let summary = ctx.poller.poll_incomplete().await?;
        Ok(summary.to_string())
    }
}

/// Re-reconcile completed records whose processed marker was cleared by an
/// operator reset.
pub struct ProcessCompletedJobsTask;

#[async_trait]
impl ScheduledTask for ProcessCompletedJobsTask {
    async fn run(&self, ctx: &TaskContext) -> Result<String> {
        let summary = ctx.poller.process_unprocessed().await?;
        Ok(summary.to_string())
    }
}

/// Re-derive industry links for businesses that lost all of theirs, from
/// their latest stored enrichment snapshot.
pub struct RelinkOrphanedBusinessesTask;

#[async_trait]
impl ScheduledTask for RelinkOrphanedBusinessesTask {
    async fn run(&self, ctx: &TaskContext) -> Result<String> {
        let relinked = ctx.reconciler.relink_orphaned().await?;
        Ok(format!("relinked {relinked} orphaned businesses"))
    }
}

/// Register the production task set.
pub fn register_default_tasks(scheduler: &Scheduler) -> Result<()> {
    scheduler.register(
        TaskSpec::builder()
            .id("poll-enrichment-jobs")
            .name("Poll enrichment jobs")
            .cron("*/30 * * * * *")
            .build(),
        Arc::new(PollEnrichmentJobsTask),
    )?;
    scheduler.register(
        TaskSpec::builder()
            .id("process-completed-jobs")
            .name("Process completed enrichment jobs")
            .cron("0 */5 * * * *")
            .build(),
        Arc::new(ProcessCompletedJobsTask),
    )?;
    scheduler.register(
        TaskSpec::builder()
            .id("relink-orphaned-businesses")
            .name("Re-link orphaned businesses")
            .cron("0 0 * * * *")
            .build(),
        Arc::new(RelinkOrphanedBusinessesTask),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::TestDeps;

    #[tokio::test]
    async fn default_task_set_registers_cleanly() {
        let scheduler = Scheduler::new(TestDeps::new().task_context());
        register_default_tasks(&scheduler).unwrap();

        let ids: Vec<String> = scheduler.task_states().into_iter().map(|t| t.id).collect();
        assert_eq!(
            ids,
            vec![
                "poll-enrichment-jobs",
                "process-completed-jobs",
                "relink-orphaned-businesses"
            ]
        );
        assert!(scheduler.task_states().iter().all(|t| t.enabled));
        assert!(scheduler.task_states().iter().all(|t| t.next_run.is_some()));
    }

    #[tokio::test]
    async fn poll_task_reports_an_empty_sweep() {
        let deps = TestDeps::new();
        let summary = PollEnrichmentJobsTask
            .run(&deps.task_context())
            .await
            .unwrap();
        assert!(summary.contains("polled 0"));
    }
}
