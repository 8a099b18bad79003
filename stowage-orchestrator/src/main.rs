//! Stowage Orchestrator
//!
//! Hosts the backup engine: persists targets, runs and schedule policies in
//! PostgreSQL, keeps policy triggers registered and serves the HTTP API.

use anyhow::{Context, Result};
use std::sync::Arc;
use stowage_runner::{BackupExecutor, BackupScheduler, RunLauncher, RunnerConfig, SshChannel, Stores};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod db;
pub mod repository;
pub mod service;

use crate::config::ServerConfig;
use crate::repository::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "stowage_orchestrator=debug,stowage_runner=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Stowage Orchestrator...");

    let server_config = load_server_config()?;
    let runner_config = load_runner_config()?;

    info!("Connecting to database...");

    let pool = db::create_pool(&server_config.database_url)
        .await
        .context("Failed to create database pool")?;

    info!("Database connection pool created");

    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    // Wire the engine against the database
    let stores = Stores::shared(Arc::new(PgStore::new(pool.clone())));
    let channel = Arc::new(SshChannel::new(runner_config.clone()));
    let executor = Arc::new(BackupExecutor::new(channel, stores.clone(), runner_config));
    let launcher = RunLauncher::new(executor, stores.runs.clone());

    let scheduler = Arc::new(
        BackupScheduler::new(&stores, launcher.clone())
            .await
            .context("Failed to create scheduler")?,
    );

    let loaded = scheduler
        .load_all()
        .await
        .context("Failed to load schedule policies")?;
    scheduler.start().await.context("Failed to start scheduler")?;

    info!("{} schedule policies active", loaded);

    let app = api::create_router(api::AppState {
        pool,
        scheduler: scheduler.clone(),
        launcher,
    });

    info!("Listening on {}", server_config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&server_config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", server_config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    scheduler.shutdown().await?;
    Ok(())
}

/// Loads server configuration from the environment with fallback to defaults
fn load_server_config() -> Result<ServerConfig> {
    match ServerConfig::from_env() {
        Ok(config) => {
            config.validate()?;
            Ok(config)
        }
        Err(e) => {
            info!("{}, using defaults", e);
            let config = ServerConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn load_runner_config() -> Result<RunnerConfig> {
    let config = RunnerConfig::from_env().context("Invalid runner configuration")?;
    config.validate()?;
    Ok(config)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
