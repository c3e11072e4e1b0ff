use anyhow::Context;
use dotenvy::dotenv;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::settings::AppConfig;
use crate::infrastructure::db::pool::{connect_to_db, run_migrations};
use crate::infrastructure::encoder::FfmpegEncoder;
use crate::infrastructure::storage::artifacts::ArtifactStore;
use crate::modules::video::repository::{JobStore, MemoryJobStore, PgJobStore};
use crate::state::AppState;
use crate::workers::TranscodePipeline;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod modules;
mod routes;
mod state;
mod workers;

#[cfg(test)]
mod testing;

async fn open_job_store(config: &AppConfig) -> anyhow::Result<Arc<dyn JobStore>> {
    match &config.database_url {
        Some(url) => {
            let pool = connect_to_db(url).await.context("Failed to connect to PostgreSQL")?;
            run_migrations(&pool).await.context("Failed to run migrations")?;
            Ok(Arc::new(PgJobStore::new(pool)))
        }
        None => {
            warn!("DATABASE_URL is not set, job records will only live in memory");
            Ok(Arc::new(MemoryJobStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    info!("Starting server...");

    let config = AppConfig::new().context("Invalid configuration")?;
    let jobs = open_job_store(&config).await?;

    let artifacts = ArtifactStore::new(config.upload_dir.clone(), config.hls_dir.clone());
    artifacts
        .ensure_roots()
        .await
        .context("Failed to create upload/HLS directories")?;

    let encoder = Arc::new(FfmpegEncoder::new(&config, &artifacts));
    let pipeline = TranscodePipeline::start(
        jobs.clone(),
        artifacts.clone(),
        encoder,
        config.transcode_workers,
        config.transcode_timeout(),
    );
    pipeline.recover().await.context("Startup recovery failed")?;

    let addr = format!("0.0.0.0:{}", config.server_port);
    let state = AppState::new(config, jobs, artifacts, pipeline);
    let app = app::create_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
