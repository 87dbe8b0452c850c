use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tapedeck::cli::{Cli, Commands};
use tapedeck::core::types::parse_source_list;
use tapedeck::core::web_server::{start_web_server, WebState};
use tapedeck::core::{init_logger, log_tooling_configuration, metrics, Config};
use tapedeck::download::video::{download_best_video, log_progress_steps};
use tapedeck::download::{BatchFetchPipeline, WorkerPool};
use tapedeck::storage::cleanup_stale_jobs;

/// Main entry point
///
/// Parses CLI arguments, loads configuration and dispatches to the subcommand.
/// With no subcommand the HTTP service is started.
///
/// # Errors
/// Returns an error if configuration, logging, or the chosen command fails.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env if present
    let _ = dotenv();

    let config = Config::from_env().context("Invalid configuration")?;
    init_logger(&config.log_file_path, &config.log_level)?;

    match cli.command {
        Some(Commands::Serve { bind }) => run_server(config, bind).await,
        Some(Commands::Batch { urls, output }) => run_batch(config, &urls, output).await,
        Some(Commands::Video { url, dir }) => run_video(&config, &url, &dir).await,
        None => {
            log::info!("No command specified, starting the HTTP service");
            run_server(config, None).await
        }
    }
}

/// Worker pool and pipeline shared by every batch in this process.
fn build_pipeline(config: &Config) -> Arc<BatchFetchPipeline> {
    log_tooling_configuration(config);
    metrics::init_metrics();

    match cleanup_stale_jobs(&config.work_dir, config.stale_job_age) {
        Ok(0) => {}
        Ok(n) => log::info!("Removed {} stale job directories", n),
        Err(e) => log::warn!("Failed to sweep {}: {}", config.work_dir.display(), e),
    }

    let pool = WorkerPool::new(config.max_workers);
    Arc::new(BatchFetchPipeline::from_config(config, pool))
}

async fn run_server(mut config: Config, bind: Option<std::net::SocketAddr>) -> Result<()> {
    if let Some(addr) = bind {
        config.bind_addr = addr;
    }

    let pipeline = build_pipeline(&config);
    start_web_server(config.bind_addr, WebState::new(pipeline))
        .await
        .context("Web server failed")?;

    log::info!("Web server stopped");
    Ok(())
}

async fn run_batch(config: Config, urls: &str, output: Option<PathBuf>) -> Result<()> {
    let pipeline = build_pipeline(&config);
    let identifiers = parse_source_list(urls);

    let batch = pipeline.run(&identifiers).await?;
    let failed = batch.failed();

    let dest = output.unwrap_or_else(|| PathBuf::from(&config.archive_name));
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::copy(batch.archive_path(), &dest)
        .await
        .with_context(|| format!("Failed to write {}", dest.display()))?;

    log::info!(
        "Wrote {} ({} entries, {} failed)",
        dest.display(),
        batch.artifact.len(),
        failed
    );
    for entry in &batch.artifact.entries {
        println!("{}", entry);
    }

    Ok(())
}

async fn run_video(config: &Config, url: &str, dir: &Path) -> Result<()> {
    log_tooling_configuration(config);

    let video = download_best_video(&config.ytdl_bin, url, dir, config.fetch_timeout, log_progress_steps()).await?;

    log::info!(
        "Download completed: {} ({})",
        video.title.as_deref().unwrap_or("untitled"),
        video.path.display()
    );
    println!("{}", video.path.display());

    Ok(())
}
