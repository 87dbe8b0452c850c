//! Single-video download at the highest progressive resolution.
//!
//! Backs the `video` subcommand: no transcoding, no archive, just one file
//! with audio and video muxed by the source (`-f best`), the title printed up
//! front and progress reported while it downloads.

use crate::download::error::FetchError;
use crate::download::progress::{parse_progress, ProgressInfo};
use crate::download::ytdlp_errors::{analyze_ytdlp_error, to_fetch_error};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Result of a single-video download
#[derive(Debug, Clone, PartialEq)]
pub struct VideoDownload {
    pub title: Option<String>,
    pub path: PathBuf,
}

/// yt-dlp arguments for one progressive-stream download
pub fn build_video_args(url: &str, dest_dir: &Path) -> Vec<String> {
    vec![
        "-f".into(),
        "best".into(),
        "-o".into(),
        dest_dir.join("%(title)s.%(ext)s").to_string_lossy().into_owned(),
        "--no-playlist".into(),
        "--newline".into(),
        "--progress".into(),
        "--no-warnings".into(),
        "--print".into(),
        "before_dl:title".into(),
        "--print".into(),
        "after_move:filepath".into(),
        "--".into(),
        url.to_string(),
    ]
}

/// Status prefixes yt-dlp writes for its own steps.
const STATUS_PREFIXES: &[&str] = &[
    "[download]",
    "[info]",
    "[debug]",
    "[generic]",
    "[youtube]",
    "[youtube:tab]",
    "[hlsnative]",
    "[dashsegments]",
    "[Merger]",
    "[ExtractAudio]",
    "[FixupM3u8]",
    "[FixupM4a]",
    "[VideoConvertor]",
];

/// True for yt-dlp's own step lines, not for titles that merely start with `[`.
fn is_status_line(line: &str) -> bool {
    STATUS_PREFIXES.iter().any(|prefix| {
        line.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(' '))
    })
}

/// Split non-progress stdout lines into (title, final path).
///
/// `before_dl:title` is printed first and `after_move:filepath` last; anything
/// in between is noise.
fn split_printed_lines(lines: &[String]) -> (Option<String>, Option<PathBuf>) {
    match lines {
        [] => (None, None),
        [only] => (None, Some(PathBuf::from(only))),
        [first, .., last] => (Some(first.clone()), Some(PathBuf::from(last))),
    }
}

/// Download `url` into `dest_dir`, calling `on_progress` for every progress line.
pub async fn download_best_video<F>(
    ytdl_bin: &str,
    url: &str,
    dest_dir: &Path,
    timeout: Duration,
    mut on_progress: F,
) -> Result<VideoDownload, FetchError>
where
    F: FnMut(&ProgressInfo) + Send,
{
    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|e| FetchError::Process(format!("Failed to create {}: {}", dest_dir.display(), e)))?;

    let args = build_video_args(url, dest_dir);
    log::debug!("yt-dlp command: {} {}", ytdl_bin, args.join(" "));

    let mut child = Command::new(ytdl_bin)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| FetchError::Process(format!("Failed to spawn {}: {}", ytdl_bin, e)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| FetchError::Process("yt-dlp stdout not captured".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| FetchError::Process("yt-dlp stderr not captured".to_string()))?;

    // `--print` puts yt-dlp in quiet mode, which sends progress to stderr.
    // Both streams are read so progress is seen wherever it lands.
    let run = async {
        let mut printed = Vec::new();
        let mut stderr_text = String::new();
        let mut seen_progress = false;
        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let mut out_done = false;
        let mut err_done = false;

        while !(out_done && err_done) {
            tokio::select! {
                line = out_lines.next_line(), if !out_done => {
                    let line = line
                        .map_err(|e| FetchError::Process(format!("Failed to read yt-dlp output: {}", e)))?;
                    let Some(line) = line else {
                        out_done = true;
                        continue;
                    };
                    if let Some(info) = parse_progress(&line) {
                        seen_progress = true;
                        on_progress(&info);
                        continue;
                    }
                    let trimmed = line.trim();
                    if trimmed.is_empty() || is_status_line(trimmed) {
                        continue;
                    }
                    // The title is printed before the download starts.
                    if printed.is_empty() && !seen_progress {
                        log::info!("Title: {}", trimmed);
                    }
                    printed.push(trimmed.to_string());
                }
                line = err_lines.next_line(), if !err_done => {
                    let line = line
                        .map_err(|e| FetchError::Process(format!("Failed to read yt-dlp stderr: {}", e)))?;
                    let Some(line) = line else {
                        err_done = true;
                        continue;
                    };
                    match parse_progress(&line) {
                        Some(info) => {
                            seen_progress = true;
                            on_progress(&info);
                        }
                        None => {
                            stderr_text.push_str(&line);
                            stderr_text.push('\n');
                        }
                    }
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| FetchError::Process(format!("Failed to wait for yt-dlp: {}", e)))?;
        Ok::<_, FetchError>((status, printed, stderr_text))
    };

    let (status, printed, stderr_text) = tokio::time::timeout(timeout, run)
        .await
        .map_err(|_| FetchError::Timeout(format!("yt-dlp timed out after {}s", timeout.as_secs())))??;

    if !status.success() {
        let error_type = analyze_ytdlp_error(&stderr_text);
        return Err(to_fetch_error(&error_type, &stderr_text));
    }

    let (title, path) = split_printed_lines(&printed);
    let path = path
        .filter(|p| p.is_file())
        .ok_or_else(|| FetchError::FileNotFound(format!("yt-dlp did not report a file for {}", url)))?;

    Ok(VideoDownload { title, path })
}

/// Progress callback that logs every time a new 10% step is reached.
pub fn log_progress_steps() -> impl FnMut(&ProgressInfo) + Send {
    let mut last_step: Option<u8> = None;
    move |info: &ProgressInfo| {
        let step = info.percent / 10;
        if last_step != Some(step) {
            last_step = Some(step);
            match info.eta_seconds {
                Some(eta) => log::info!("Downloading... {}% (ETA {}s)", info.percent, eta),
                None => log::info!("Downloading... {}%", info.percent),
            }
        }
    }
}
