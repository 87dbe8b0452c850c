//! Bounded worker pool shared by every batch in the process.
//!
//! Built once in `main` and handed to the pipeline. Every fetch task holds a
//! permit for the whole of its external download + transcode, so the pool
//! size is the ceiling on concurrent yt-dlp/ffmpeg processes across all
//! requests.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Fixed-size permit pool. Clones share the same permits.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool with `size` workers (at least one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Configured number of workers
    pub fn size(&self) -> usize {
        self.size
    }

    /// Workers currently idle
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Workers currently busy
    pub fn busy(&self) -> usize {
        self.size.saturating_sub(self.available())
    }

    /// Wait for a free worker. The slot is released when the permit drops.
    ///
    /// The semaphore is never closed, so this only fails if that invariant
    /// is broken; callers treat it like any other task failure.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, tokio::sync::AcquireError> {
        Arc::clone(&self.semaphore).acquire_owned().await
    }
}
