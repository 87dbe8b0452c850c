//! tapedeck - batch audio downloader
//!
//! Takes a list of video URLs, fetches each one as MP3 through yt-dlp and
//! ffmpeg on a bounded worker pool, and packages every success into a single
//! ZIP archive. Failed items are logged and left out; the batch only fails
//! when nothing could be fetched.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, metrics, the HTTP front end
//! - `download`: fetcher trait, yt-dlp fetcher, worker pool, batch pipeline
//! - `storage`: per-batch job directories and ZIP packaging
//! - `cli`: command-line arguments

pub mod cli;
pub mod core;
pub mod download;
pub mod storage;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppError, Config, SourceIdentifier};
pub use crate::download::{
    BatchError, BatchFetchPipeline, CompletedBatch, FetchError, FetchOutcome, MediaFetcher, WorkerPool,
};
pub use crate::storage::{ArchiveArtifact, ArchiveWriter, ZipArchiveWriter};
