//! Process execution utilities
//!
//! Helpers for running external processes (yt-dlp, ffmpeg) so that a child
//! never outlives the future driving it.

use std::process::{Output, Stdio};
use tokio::process::Command;

use crate::download::error::FetchError;

/// Run an async Command to completion, capturing stdout and stderr.
///
/// The child is spawned with `kill_on_drop`. There is no time budget here:
/// the caller bounds the future (the batch pipeline wraps every fetch in
/// `tokio::time::timeout`), and dropping it kills the process.
pub async fn run_captured(cmd: &mut Command) -> Result<Output, FetchError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    cmd.output()
        .await
        .map_err(|e| FetchError::Process(format!("Failed to run process: {}", e)))
}
