//! Common test utilities
//!
//! This module is shared across all integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tapedeck::core::types::SourceIdentifier;
use tapedeck::download::{BatchFetchPipeline, FetchError, MediaFetcher, WorkerPool};
use tapedeck::storage::ZipArchiveWriter;

/// What the scripted fetcher does for one identifier
#[derive(Debug, Clone)]
pub enum Step {
    /// Write `<title>.mp3` after `delay`
    Produce { title: String, delay: Duration },
    /// Fail with this error after `delay`
    Fail { error: FetchError, delay: Duration },
    /// Report `<title>.mp3` as fetched without writing it
    Vanish { title: String },
    /// Never finish
    Hang,
}

impl Step {
    pub fn produce(title: &str) -> Self {
        Step::Produce {
            title: title.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn produce_after(title: &str, delay: Duration) -> Self {
        Step::Produce {
            title: title.to_string(),
            delay,
        }
    }

    pub fn vanish(title: &str) -> Self {
        Step::Vanish {
            title: title.to_string(),
        }
    }

    pub fn fail(message: &str) -> Self {
        Step::Fail {
            error: FetchError::Unavailable(message.to_string()),
            delay: Duration::ZERO,
        }
    }
}

/// Fetcher that follows a per-identifier script instead of running yt-dlp.
///
/// Unknown identifiers fail as unsupported. Tracks how many fetches ran and
/// the highest number running at once.
#[derive(Default)]
pub struct ScriptedFetcher {
    script: HashMap<String, Step>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    seen_dirs: Mutex<Vec<PathBuf>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, identifier: &str, step: Step) -> Self {
        self.script.insert(identifier.to_string(), step);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn seen_dirs(&self) -> Vec<PathBuf> {
        self.seen_dirs.lock().unwrap().clone()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaFetcher for ScriptedFetcher {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self, identifier: &SourceIdentifier, output_dir: &Path) -> Result<PathBuf, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);
        self.seen_dirs.lock().unwrap().push(output_dir.to_path_buf());

        match self.script.get(identifier.as_str()).cloned() {
            Some(Step::Produce { title, delay }) => {
                tokio::time::sleep(delay).await;
                let path = output_dir.join(format!("{}.mp3", title));
                tokio::fs::write(&path, format!("audio for {}", identifier))
                    .await
                    .map_err(|e| FetchError::Other(e.to_string()))?;
                Ok(path)
            }
            Some(Step::Fail { error, delay }) => {
                tokio::time::sleep(delay).await;
                Err(error)
            }
            Some(Step::Vanish { title }) => Ok(output_dir.join(format!("{}.mp3", title))),
            Some(Step::Hang) => {
                std::future::pending::<()>().await;
                Err(FetchError::Other("unreachable".to_string()))
            }
            None => Err(FetchError::Unsupported(format!("Unsupported URL: {}", identifier))),
        }
    }
}

/// Pipeline over `fetcher` with a ZIP writer, rooted at `work_root`.
pub fn pipeline_for(
    fetcher: Arc<ScriptedFetcher>,
    work_root: &Path,
    workers: usize,
    timeout: Duration,
) -> BatchFetchPipeline {
    BatchFetchPipeline::new(
        fetcher,
        Arc::new(ZipArchiveWriter::new()),
        WorkerPool::new(workers),
        work_root,
        timeout,
        "downloaded_mp3s.zip",
    )
}

/// Entry names of the ZIP at `path`, in archive order.
pub fn zip_entry_names(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

/// Entry names of a ZIP held in memory.
pub fn zip_entry_names_from_bytes(bytes: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}
