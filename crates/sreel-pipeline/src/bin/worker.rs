//! Pipeline worker binary.
//!
//! Connects the real providers, resumes any render jobs orphaned by a
//! previous process, and keeps polling until shutdown.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sreel_pipeline::{PipelineConfig, StorylinePipeline};
use sreel_providers::{ChatToolClient, ImagesApiClient, RenderApiClient, WhisperClient};
use sreel_storage::S3MediaStore;
use sreel_store::PgStorylineStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("sreel=info".parse().expect("valid directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting sreel-worker");

    let config = PipelineConfig::from_env();
    info!("Pipeline config: {:?}", config);

    if let Err(e) = run(config).await {
        error!("Worker failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: PipelineConfig) -> anyhow::Result<()> {
    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL not set"))?;
    let store = PgStorylineStore::connect(&database_url).await?;
    let media = S3MediaStore::from_env().await?;

    let pipeline = StorylinePipeline::new(
        config,
        Arc::new(store),
        Arc::new(media),
        Arc::new(WhisperClient::from_env()?),
        Arc::new(ChatToolClient::from_env()?),
        Arc::new(ImagesApiClient::from_env()?),
        Arc::new(RenderApiClient::from_env()?),
    );

    let resumed = pipeline.resume_outstanding_jobs().await?;
    info!("Resumed {} outstanding render jobs", resumed);

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}
