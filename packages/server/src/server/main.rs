// Main entry point for the directory enrichment server

use std::sync::Arc;

use anyhow::{Context, Result};
use directory_core::kernel::{register_default_tasks, Scheduler, ServerDeps};
use directory_core::server::{build_app, AppState};
use directory_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,directory_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting directory enrichment server");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // Wire dependencies
    let deps = Arc::new(
        ServerDeps::new(
            pool.clone(),
            config.enrichment_api_url,
            config.enrichment_api_key,
        )
        .context("Failed to build server dependencies")?,
    );

    // Scheduler: registered always, started only when enabled so an
    // operator can still trigger tasks by hand via the API.
    let scheduler = Arc::new(Scheduler::new(deps.task_context()));
    register_default_tasks(&scheduler).context("Failed to register scheduled tasks")?;
    if config.scheduler_enabled {
        scheduler.start();
        tracing::info!("Scheduler started");
    } else {
        tracing::warn!("Scheduler disabled via SCHEDULER_ENABLED");
    }

    // Build application
    let app = build_app(AppState {
        db_pool: pool,
        deps,
        scheduler: scheduler.clone(),
    });

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(scheduler))
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal(scheduler: Arc<Scheduler>) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received, stopping scheduler");
    scheduler.stop();
}
