//! Cron-style task runner.
//!
//! Owns a registry of named recurring tasks, each with explicit per-task
//! state (enabled, running flag, last/next run, bounded log ring) managed
//! here rather than captured in callback closures. Task bodies implement
//! [`ScheduledTask`] and work through a [`TaskContext`] of shared service
//! handles.
//!
//! Guarantees:
//! - at most one concurrent execution per task id; a due tick (or manual
//!   trigger) while the task runs is logged as `skipped`, never queued
//! - `stop()` halts the tick loop without aborting in-flight runs
//! - task errors are caught, ring-logged, and leave the task enabled

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use typed_builder::TypedBuilder;

use crate::domains::directory::Reconciler;
use crate::domains::enrichment::JobPoller;

/// Ring-buffer capacity of per-task run logs.
pub const MAX_TASK_LOG_ENTRIES: usize = 50;

/// Shared service handles task bodies run against. Tasks own no state of
/// their own; everything mutable lives behind these services' stores.
#[derive(Clone)]
pub struct TaskContext {
    pub poller: Arc<JobPoller>,
    pub reconciler: Arc<Reconciler>,
}

/// A task body. Returns a one-line summary for the run log.
#[async_trait]
pub trait ScheduledTask: Send + Sync {
    async fn run(&self, ctx: &TaskContext) -> Result<String>;
}

#[derive(Debug, Clone, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct TaskSpec {
    pub id: String,
    pub name: String,
    /// Cron expression with seconds field, e.g. `*/30 * * * * *`.
    pub cron: String,
    #[builder(default = true)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskRunOutcome {
    Ok,
    Error,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskLogEntry {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: TaskRunOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Snapshot of one task's state for the control surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStateView {
    pub id: String,
    pub name: String,
    pub cron: String,
    pub enabled: bool,
    pub is_running: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
}

struct TaskState {
    enabled: bool,
    is_running: bool,
    last_run: Option<DateTime<Utc>>,
    next_run: Option<DateTime<Utc>>,
    logs: VecDeque<TaskLogEntry>,
}

struct RegisteredTask {
    id: String,
    name: String,
    cron: String,
    schedule: Schedule,
    body: Arc<dyn ScheduledTask>,
    state: Mutex<TaskState>,
}

impl RegisteredTask {
    fn push_log(state: &mut TaskState, entry: TaskLogEntry) {
        if state.logs.len() == MAX_TASK_LOG_ENTRIES {
            state.logs.pop_front();
        }
        state.logs.push_back(entry);
    }
}

pub struct Scheduler {
    tasks: Mutex<Vec<Arc<RegisteredTask>>>,
    ctx: TaskContext,
    cancel: Mutex<Option<CancellationToken>>,
}

impl Scheduler {
    pub fn new(ctx: TaskContext) -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            ctx,
            cancel: Mutex::new(None),
        }
    }

    /// Register a task. Fails on an invalid cron expression or a duplicate
    /// id.
    pub fn register(&self, spec: TaskSpec, body: Arc<dyn ScheduledTask>) -> Result<()> {
        let schedule = Schedule::from_str(&spec.cron)
            .with_context(|| format!("invalid cron expression for task {}: {}", spec.id, spec.cron))?;

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if tasks.iter().any(|t| t.id == spec.id) {
            anyhow::bail!("task {} is already registered", spec.id);
        }

        let next_run = schedule.upcoming(Utc).next();
        tasks.push(Arc::new(RegisteredTask {
            id: spec.id,
            name: spec.name,
            cron: spec.cron,
            schedule,
            body,
            state: Mutex::new(TaskState {
                enabled: spec.enabled,
                is_running: false,
                last_run: None,
                next_run,
                logs: VecDeque::new(),
            }),
        }));
        Ok(())
    }

    /// Begin evaluating enabled tasks on their schedules. Idempotent: a
    /// second call while running is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut cancel = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
        if cancel.is_some() {
            return;
        }
        let token = CancellationToken::new();
        *cancel = Some(token.clone());
        drop(cancel);

        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(1));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tracing::info!("Scheduler started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tick.tick() => scheduler.dispatch_due(Utc::now()),
                }
            }
            tracing::info!("Scheduler stopped; in-flight runs continue");
        });
    }

    /// Halt schedule evaluation. In-flight runs are not cancelled.
    pub fn stop(&self) {
        if let Some(token) = self
            .cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            token.cancel();
        }
    }

    /// Dispatch every enabled task whose next occurrence has passed. A due
    /// task that is still running gets a `skipped` log entry instead of a
    /// second execution.
    fn dispatch_due(&self, now: DateTime<Utc>) {
        let tasks: Vec<Arc<RegisteredTask>> = self
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        for task in tasks {
            let due = {
                let mut state = task.state.lock().unwrap_or_else(|e| e.into_inner());
                if !state.enabled {
                    continue;
                }
                match state.next_run {
                    Some(next) if next <= now => {
                        state.next_run = task.schedule.after(&now).next();
                        true
                    }
                    Some(_) => false,
                    None => {
                        state.next_run = task.schedule.after(&now).next();
                        false
                    }
                }
            };
            if due {
                Self::spawn_run(task, self.ctx.clone());
            }
        }
    }

    /// Run a task immediately regardless of schedule. Returns false when
    /// the id is unknown or the task is disabled. A trigger while the task
    /// is running is accepted but skipped (non-overlap guard).
    pub fn trigger_task(&self, id: &str) -> bool {
        let Some(task) = self.find(id) else {
            return false;
        };
        if !task.state.lock().unwrap_or_else(|e| e.into_inner()).enabled {
            return false;
        }
        Self::spawn_run(task, self.ctx.clone());
        true
    }

    /// Enable or disable a task. Disabling never cancels an in-flight run.
    pub fn set_task_enabled(&self, id: &str, enabled: bool) -> bool {
        let Some(task) = self.find(id) else {
            return false;
        };
        let mut state = task.state.lock().unwrap_or_else(|e| e.into_inner());
        state.enabled = enabled;
        if enabled && state.next_run.is_none() {
            state.next_run = task.schedule.upcoming(Utc).next();
        }
        tracing::info!(task_id = id, enabled, "Task enabled flag changed");
        true
    }

    pub fn get_task_logs(&self, id: &str) -> Option<Vec<TaskLogEntry>> {
        let task = self.find(id)?;
        let state = task.state.lock().unwrap_or_else(|e| e.into_inner());
        Some(state.logs.iter().cloned().collect())
    }

    /// Snapshot of every registered task, in registration order.
    pub fn task_states(&self) -> Vec<TaskStateView> {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|task| {
                let state = task.state.lock().unwrap_or_else(|e| e.into_inner());
                TaskStateView {
                    id: task.id.clone(),
                    name: task.name.clone(),
                    cron: task.cron.clone(),
                    enabled: state.enabled,
                    is_running: state.is_running,
                    last_run: state.last_run,
                    next_run: state.next_run,
                }
            })
            .collect()
    }

    fn find(&self, id: &str) -> Option<Arc<RegisteredTask>> {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }

    fn spawn_run(task: Arc<RegisteredTask>, ctx: TaskContext) {
        {
            let mut state = task.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.is_running {
                tracing::info!(task_id = %task.id, "Task skipped - already running");
                RegisteredTask::push_log(
                    &mut state,
                    TaskLogEntry {
                        started_at: Utc::now(),
                        duration_ms: 0,
                        outcome: TaskRunOutcome::Skipped,
                        summary: Some("skipped - already running".to_string()),
                        error: None,
                    },
                );
                return;
            }
            state.is_running = true;
        }

        tokio::spawn(async move {
            let started_at = Utc::now();
            let timer = Instant::now();
            let result = task.body.run(&ctx).await;
            let duration_ms = timer.elapsed().as_millis() as u64;

            let mut state = task.state.lock().unwrap_or_else(|e| e.into_inner());
            state.is_running = false;
            state.last_run = Some(started_at);
            // Dispatch already advanced next_run past the occurrence it
            // fired on; rewriting it from the wall clock here would rewind
            // that and re-dispatch the same occurrence. Only fill a hole.
            if state.next_run.is_none() {
                state.next_run = task.schedule.upcoming(Utc).next();
            }
            match result {
                Ok(summary) => {
                    tracing::info!(task_id = %task.id, duration_ms, summary, "Task finished");
                    RegisteredTask::push_log(
                        &mut state,
                        TaskLogEntry {
                            started_at,
                            duration_ms,
                            outcome: TaskRunOutcome::Ok,
                            summary: Some(summary),
                            error: None,
                        },
                    );
                }
                Err(e) => {
                    // Errors never disable the task or kill the loop.
                    tracing::error!(task_id = %task.id, duration_ms, error = %e, "Task failed");
                    RegisteredTask::push_log(
                        &mut state,
                        TaskLogEntry {
                            started_at,
                            duration_ms,
                            outcome: TaskRunOutcome::Error,
                            summary: None,
                            error: Some(format!("{e:#}")),
                        },
                    );
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::TestDeps;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTask {
        runs: Arc<AtomicUsize>,
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl ScheduledTask for CountingTask {
        async fn run(&self, _ctx: &TaskContext) -> Result<String> {
            tokio::time::sleep(self.delay).await;
            let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                anyhow::bail!("scripted task failure");
            }
            Ok(format!("run {run}"))
        }
    }

    fn spec(id: &str) -> TaskSpec {
        TaskSpec::builder()
            .id(id)
            .name(format!("Test task {id}"))
            .cron("0 0 * * * *")
            .build()
    }

    fn scheduler_with(
        id: &str,
        delay: Duration,
        fail: bool,
    ) -> (Arc<Scheduler>, Arc<AtomicUsize>) {
        let scheduler = Arc::new(Scheduler::new(TestDeps::new().task_context()));
        let runs = Arc::new(AtomicUsize::new(0));
        scheduler
            .register(
                spec(id),
                Arc::new(CountingTask {
                    runs: runs.clone(),
                    delay,
                    fail,
                }),
            )
            .unwrap();
        (scheduler, runs)
    }

    async fn wait_until_idle(scheduler: &Scheduler, id: &str) {
        for _ in 0..100 {
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

    #[tokio::test]
    async fn register_rejects_bad_cron_and_duplicate_ids() {
        let scheduler = Scheduler::new(TestDeps::new().task_context());
        let body = Arc::new(CountingTask {
            runs: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
            fail: false,
        });

        let bad = TaskSpec::builder()
            .id("bad")
            .name("Bad")
            .cron("not a cron")
            .build();
        assert!(scheduler.register(bad, body.clone()).is_err());

        scheduler.register(spec("dup"), body.clone()).unwrap();
        assert!(scheduler.register(spec("dup"), body).is_err());
    }

    #[tokio::test]
    async fn trigger_runs_the_task_and_logs_the_outcome() {
        let (scheduler, runs) = scheduler_with("t", Duration::ZERO, false);

        assert!(scheduler.trigger_task("t"));
        wait_until_idle(&scheduler, "t").await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        let logs = scheduler.get_task_logs("t").unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].outcome, TaskRunOutcome::Ok);
        assert_eq!(logs[0].summary.as_deref(), Some("run 1"));

        let state = &scheduler.task_states()[0];
        assert!(state.last_run.is_some());
        assert!(!state.is_running);
    }

    #[tokio::test]
    async fn trigger_is_false_for_unknown_or_disabled_tasks() {
        let (scheduler, runs) = scheduler_with("t", Duration::ZERO, false);

        assert!(!scheduler.trigger_task("nope"));
        assert!(scheduler.set_task_enabled("t", false));
        assert!(!scheduler.trigger_task("t"));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_trigger_is_skipped_not_queued() {
        let (scheduler, runs) = scheduler_with("slow", Duration::from_millis(150), false);

        assert!(scheduler.trigger_task("slow"));
        tokio::time::sleep(Duration::from_millis(30)).await;
        // Second trigger while running: accepted, but no second execution.
        assert!(scheduler.trigger_task("slow"));
        wait_until_idle(&scheduler, "slow").await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        let logs = scheduler.get_task_logs("slow").unwrap();
        let outcomes: Vec<TaskRunOutcome> = logs.iter().map(|l| l.outcome).collect();
        assert!(outcomes.contains(&TaskRunOutcome::Skipped));
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| **o == TaskRunOutcome::Ok)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn failing_task_is_logged_and_stays_enabled() {
        let (scheduler, _) = scheduler_with("flaky", Duration::ZERO, true);

        assert!(scheduler.trigger_task("flaky"));
        wait_until_idle(&scheduler, "flaky").await;

        let logs = scheduler.get_task_logs("flaky").unwrap();
        assert_eq!(logs[0].outcome, TaskRunOutcome::Error);
        assert!(logs[0].error.as_deref().unwrap().contains("scripted"));
        assert!(scheduler.task_states()[0].enabled);

        // Still triggerable after a failure.
        assert!(scheduler.trigger_task("flaky"));
        wait_until_idle(&scheduler, "flaky").await;
        assert_eq!(scheduler.get_task_logs("flaky").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn log_ring_is_bounded() {
        let (scheduler, _) = scheduler_with("busy", Duration::ZERO, false);

        for _ in 0..(MAX_TASK_LOG_ENTRIES + 10) {
            scheduler.trigger_task("busy");
            wait_until_idle(&scheduler, "busy").await;
        }

        let logs = scheduler.get_task_logs("busy").unwrap();
        assert_eq!(logs.len(), MAX_TASK_LOG_ENTRIES);
        // Oldest entries were evicted: the first kept run is not "run 1".
        assert_ne!(logs[0].summary.as_deref(), Some("run 1"));
    }

    #[tokio::test]
    async fn dispatch_runs_due_tasks_and_reschedules() {
        let (scheduler, runs) = scheduler_with("due", Duration::ZERO, false);

        // Not due yet: next_run is in the future.
        scheduler.dispatch_due(Utc::now());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        // Jump past the next occurrence.
        let later = Utc::now() + chrono::Duration::hours(2);
        scheduler.dispatch_due(later);
        wait_until_idle(&scheduler, "due").await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // The completed run must not rewind next_run to the wall clock:
        // it stays ahead of the simulated dispatch time.
        let next = scheduler.task_states()[0].next_run.unwrap();
        assert!(next > later);

        // Same instant again: next_run was advanced past `later`.
        scheduler.dispatch_due(later);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_tasks_are_not_dispatched() {
        let (scheduler, runs) = scheduler_with("off", Duration::ZERO, false);
        scheduler.set_task_enabled("off", false);

        scheduler.dispatch_due(Utc::now() + chrono::Duration::hours(2));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stop_halts_ticks_but_not_in_flight_runs() {
        let (scheduler, runs) = scheduler_with("slow", Duration::from_millis(100), false);
        scheduler.start();
        scheduler.trigger_task("slow");
        tokio::time::sleep(Duration::from_millis(20)).await;

        scheduler.stop();
        wait_until_idle(&scheduler, "slow").await;
        // The run that was in flight at stop() completed.
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
