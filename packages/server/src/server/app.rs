//! Application setup and router configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::kernel::{Scheduler, ServerDeps};
use crate::server::routes::{
    delete_job_handler, get_job_handler, health_handler, incomplete_jobs_handler,
    list_jobs_handler, list_tasks_handler, reconcile_handler, reset_job_handler,
    retry_job_handler, set_task_enabled_handler, submit_enrichment_handler,
    submit_keywords_handler, task_logs_handler, trigger_task_handler,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub deps: Arc<ServerDeps>,
    pub scheduler: Arc<Scheduler>,
}

/// Build the Axum router: health, job submission/queries and operator
/// actions, the reconciliation entrypoint, and the scheduler control
/// surface.
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_origin(Any);

    Router::new()
        .route("/health", get(health_handler))
        // Job submission and queries
        .route("/api/jobs", get(list_jobs_handler))
        .route("/api/jobs/enrich", post(submit_enrichment_handler))
        .route("/api/jobs/keywords", post(submit_keywords_handler))
        .route("/api/jobs/incomplete", get(incomplete_jobs_handler))
        .route("/api/jobs/:id", get(get_job_handler).delete(delete_job_handler))
        // Operator actions
        .route("/api/jobs/:id/retry", post(retry_job_handler))
        .route("/api/jobs/:id/reset", post(reset_job_handler))
        // Reconciliation entrypoint (the CMS-facing collaborator contract)
        .route("/api/reconcile", post(reconcile_handler))
        // Scheduler control surface
        .route("/api/tasks", get(list_tasks_handler))
        .route("/api/tasks/:id/trigger", post(trigger_task_handler))
        .route("/api/tasks/:id/enabled", put(set_task_enabled_handler))
        .route("/api/tasks/:id/logs", get(task_logs_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
