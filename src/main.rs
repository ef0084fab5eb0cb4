mod config;
mod context;
mod error;
mod health;
mod models;
mod platform;
mod processing;
mod store;
mod utils;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context as _, Result};
use tokio::signal::ctrl_c;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::context::RunContext;
use crate::models::RunSummary;
use crate::platform::{Platform, SerenityPlatform};
use crate::store::{GitHubMirror, StateStore};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Config::from_env().context("invalid configuration")?;
    let start_time = Instant::now();

    let port = config.port;
    tokio::spawn(async move {
        if let Err(e) = health::serve(port).await {
            error!("❌ Liveness endpoint stopped: {:#}", e);
        }
    });

    let platform: Arc<dyn Platform> = Arc::new(SerenityPlatform::new(&config.token));

    let source = platform
        .guild_name(config.source_guild)
        .await
        .with_context(|| format!("source server {} not found", config.source_guild))?;
    let target = platform
        .guild_name(config.target_guild)
        .await
        .with_context(|| format!("target server {} not found", config.target_guild))?;
    info!("✅ Source: {} ({})", source, config.source_guild);
    info!("✅ Target: {} ({})", target, config.target_guild);

    let mirror = config.github.clone().map(GitHubMirror::new);
    let mut store = StateStore::new(config.progress_path.clone(), mirror);
    let progress = store.load().await?;

    let mut ctx = RunContext::new(config, platform, store, progress);

    let outcome = tokio::select! {
        result = processing::run(&mut ctx) => Some(result),
        _ = ctrl_c() => None,
    };

    match outcome {
        Some(Ok(report)) => {
            if !report.structure.skipped {
                info!(
                    "🏗️ Structure: {} deleted, {} created, {} failed",
                    report.structure.deleted, report.structure.created, report.structure.failed
                );
            }
            info!(
                "🏁 Run finished: {} channels completed, {} interrupted, {} missing",
                report.content.completed, report.content.interrupted, report.content.missing
            );
        }
        Some(Err(e)) => {
            // Whatever was flushed before the failure is still resumable.
            if let Err(save_error) = ctx.checkpoint() {
                warn!("⚠️ Could not save progress after failure: {}", save_error);
            }
            ctx.sync_remote().await;
            RunSummary::from_progress(&ctx.progress, start_time).print_stats();
            return Err(e).context("clone run failed");
        }
        None => {
            warn!("⚠️ Received Ctrl+C, stopping. Progress is saved.");
            ctx.checkpoint()?;
            ctx.sync_remote().await;
        }
    }

    RunSummary::from_progress(&ctx.progress, start_time).print_stats();
    Ok(())
}
