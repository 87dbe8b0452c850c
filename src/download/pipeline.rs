//! Batch fetch pipeline.
//!
//! Turns a list of source identifiers into one archive:
//!   validate → job dir → one task per identifier (bounded by the worker pool)
//!   → join barrier → keep successes → package
//!
//! A failed item never fails the batch. The batch fails only when nothing was
//! fetched, when packaging fails, or when the input was empty.

use crate::core::config::Config;
use crate::core::error::AppError;
use crate::core::metrics;
use crate::core::types::SourceIdentifier;
use crate::download::error::FetchError;
use crate::download::queue::WorkerPool;
use crate::download::ytdlp::YtDlpFetcher;
use crate::download::MediaFetcher;
use crate::storage::archive::{ArchiveArtifact, ArchiveWriter, ZipArchiveWriter};
use crate::storage::jobs::JobDir;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinSet;

/// Result of fetching one identifier
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fetched { identifier: SourceIdentifier, path: PathBuf },
    Failed { identifier: SourceIdentifier, error: FetchError },
}

impl FetchOutcome {
    pub fn identifier(&self) -> &SourceIdentifier {
        match self {
            FetchOutcome::Fetched { identifier, .. } | FetchOutcome::Failed { identifier, .. } => identifier,
        }
    }

    pub fn is_fetched(&self) -> bool {
        matches!(self, FetchOutcome::Fetched { .. })
    }
}

/// Batch-level failures
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("No URLs provided")]
    EmptyInput,

    #[error("No valid MP3 files were downloaded")]
    NoValidResults,

    #[error("Failed to package archive: {0}")]
    Packaging(AppError),

    #[error("Failed to prepare job directory: {0}")]
    Workspace(std::io::Error),
}

impl BatchError {
    /// Label used for the batch metrics
    pub fn label(&self) -> &'static str {
        match self {
            BatchError::EmptyInput => "empty_input",
            BatchError::NoValidResults => "no_valid_results",
            BatchError::Packaging(_) => "packaging_failure",
            BatchError::Workspace(_) => "workspace_failure",
        }
    }
}

/// A packaged batch.
///
/// Owns the job directory: the archive lives inside it and is deleted when
/// this value (or the `JobDir` taken out of it) is dropped.
#[derive(Debug)]
pub struct CompletedBatch {
    pub artifact: ArchiveArtifact,
    pub outcomes: Vec<FetchOutcome>,
    job: JobDir,
}

impl CompletedBatch {
    pub fn archive_path(&self) -> &Path {
        &self.artifact.path
    }

    pub fn job(&self) -> &JobDir {
        &self.job
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_fetched()).count()
    }

    /// Split into the artifact and the guard that keeps it on disk.
    pub fn into_parts(self) -> (ArchiveArtifact, JobDir) {
        (self.artifact, self.job)
    }
}

/// Orchestrates fetch tasks and packaging for one batch at a time.
///
/// Cheap to share: every field is reference-counted or small, and each `run`
/// works in its own job directory.
pub struct BatchFetchPipeline {
    fetcher: Arc<dyn MediaFetcher>,
    archiver: Arc<dyn ArchiveWriter>,
    pool: WorkerPool,
    work_root: PathBuf,
    fetch_timeout: Duration,
    archive_name: String,
}

impl BatchFetchPipeline {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        archiver: Arc<dyn ArchiveWriter>,
        pool: WorkerPool,
        work_root: impl Into<PathBuf>,
        fetch_timeout: Duration,
        archive_name: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            archiver,
            pool,
            work_root: work_root.into(),
            fetch_timeout,
            archive_name: archive_name.into(),
        }
    }

    /// yt-dlp fetcher and ZIP writer configured from `config`, sharing `pool`.
    pub fn from_config(config: &Config, pool: WorkerPool) -> Self {
        Self::new(
            Arc::new(YtDlpFetcher::from_config(config)),
            Arc::new(ZipArchiveWriter::new()),
            pool,
            config.work_dir.clone(),
            config.fetch_timeout,
            config.archive_name.clone(),
        )
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn archive_name(&self) -> &str {
        &self.archive_name
    }

    /// Fetch every identifier and package the successes.
    pub async fn run(&self, identifiers: &[SourceIdentifier]) -> Result<CompletedBatch, BatchError> {
        let started = Instant::now();
        let result = self.run_inner(identifiers).await;

        match &result {
            Ok(batch) => {
                metrics::record_batch("archived", started.elapsed());
                log::info!(
                    "Batch {} packaged {} of {} items into {} in {:.1}s",
                    batch.job.id(),
                    batch.artifact.len(),
                    batch.outcomes.len(),
                    batch.artifact.path.display(),
                    started.elapsed().as_secs_f64()
                );
            }
            Err(e) => {
                metrics::record_batch(e.label(), started.elapsed());
                log::warn!("Batch failed: {}", e);
            }
        }

        result
    }

    async fn run_inner(&self, identifiers: &[SourceIdentifier]) -> Result<CompletedBatch, BatchError> {
        let identifiers: Vec<SourceIdentifier> = identifiers
            .iter()
            .filter(|id| !id.as_str().trim().is_empty())
            .cloned()
            .collect();
        if identifiers.is_empty() {
            return Err(BatchError::EmptyInput);
        }

        let job = JobDir::create(&self.work_root).map_err(BatchError::Workspace)?;
        log::info!(
            "Batch {} started: {} items via {}, {} workers ({} idle)",
            job.id(),
            identifiers.len(),
            self.fetcher.name(),
            self.pool.size(),
            self.pool.available()
        );

        let mut tasks = JoinSet::new();
        for (index, identifier) in identifiers.into_iter().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let pool = self.pool.clone();
            let slot = job.slot_dir(index);
            let timeout = self.fetch_timeout;
            tasks.spawn(fetch_one(fetcher, pool, identifier, slot, timeout));
        }

        // Join barrier: outcomes arrive in completion order.
        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => log::error!("Fetch task for batch {} did not complete: {}", job.id(), e),
            }
        }

        let paths: Vec<PathBuf> = outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                FetchOutcome::Fetched { path, .. } if path.exists() => Some(path.clone()),
                FetchOutcome::Fetched { identifier, path } => {
                    log::warn!("Fetched file for {} is gone: {}", identifier, path.display());
                    None
                }
                FetchOutcome::Failed { .. } => None,
            })
            .collect();

        if paths.is_empty() {
            return Err(BatchError::NoValidResults);
        }

        let dest = job.path().join(&self.archive_name);
        let artifact = self
            .archiver
            .package(&paths, &dest)
            .await
            .map_err(BatchError::Packaging)?;
        if artifact.is_empty() {
            return Err(BatchError::NoValidResults);
        }
        metrics::record_archive_entries(artifact.len());

        Ok(CompletedBatch { artifact, outcomes, job })
    }
}

/// One fetch task: wait for a worker, fetch under the timeout, absorb any failure.
async fn fetch_one(
    fetcher: Arc<dyn MediaFetcher>,
    pool: WorkerPool,
    identifier: SourceIdentifier,
    slot: PathBuf,
    timeout: Duration,
) -> FetchOutcome {
    let attempt = async {
        let _permit = pool
            .acquire()
            .await
            .map_err(|e| FetchError::Other(format!("Worker pool closed: {}", e)))?;

        let started = Instant::now();
        tokio::fs::create_dir_all(&slot)
            .await
            .map_err(|e| FetchError::Process(format!("Failed to create {}: {}", slot.display(), e)))?;

        let result = match tokio::time::timeout(timeout, fetcher.fetch(&identifier, &slot)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(format!(
                "Fetch timed out after {}s",
                timeout.as_secs()
            ))),
        };

        match &result {
            Ok(_) => metrics::record_fetch_success(started.elapsed()),
            Err(e) => metrics::record_fetch_failure(e.subcategory(), started.elapsed()),
        }
        result
    };

    let result = AssertUnwindSafe(attempt)
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(FetchError::Other(format!("Fetch task panicked: {}", panic_message(&*panic)))));

    match result {
        Ok(path) => {
            log::info!("Fetched {} -> {}", identifier, path.display());
            FetchOutcome::Fetched { identifier, path }
        }
        Err(error) => {
            log::error!("Error downloading {}: {}", identifier, error);
            FetchOutcome::Failed { identifier, error }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
