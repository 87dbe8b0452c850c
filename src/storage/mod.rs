//! Scratch directories and archive packaging

pub mod archive;
pub mod jobs;

pub use archive::{ArchiveArtifact, ArchiveWriter, ZipArchiveWriter};
pub use jobs::{cleanup_stale_jobs, JobDir};
