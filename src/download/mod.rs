//! Download management and processing
//!
//! Provides the `MediaFetcher` trait for pluggable fetch backends, the
//! yt-dlp backend, the bounded worker pool, and the batch pipeline that ties
//! them together with an `ArchiveWriter`.

pub mod error;
pub mod pipeline;
pub mod progress;
pub mod queue;
pub mod video;
pub mod ytdlp;
pub mod ytdlp_errors;

use crate::core::types::SourceIdentifier;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use error::FetchError;
pub use pipeline::{BatchError, BatchFetchPipeline, CompletedBatch, FetchOutcome};
pub use queue::WorkerPool;
pub use ytdlp::YtDlpFetcher;

/// Resolve one identifier, download its best audio and transcode it.
///
/// Treated as a single atomic external operation: either a finished file
/// lands in `output_dir`, or an error comes back. Implementations must not
/// write outside `output_dir`.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Human-readable name of this backend (e.g., "yt-dlp")
    fn name(&self) -> &str;

    /// Fetch `identifier` into `output_dir`, returning the produced file.
    async fn fetch(&self, identifier: &SourceIdentifier, output_dir: &Path) -> Result<PathBuf, FetchError>;
}
