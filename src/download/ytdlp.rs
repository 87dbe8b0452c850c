//! YtDlpFetcher: the production `MediaFetcher`, powered by yt-dlp.
//!
//! One yt-dlp run per identifier does resolution, best-audio download and the
//! ffmpeg `ExtractAudio` post-processing step. yt-dlp prints the final path
//! (`--print after_move:filepath`) so we do not have to guess it from the
//! title template.

use crate::core::config::{AudioSettings, Config};
use crate::core::process::run_captured;
use crate::core::types::SourceIdentifier;
use crate::download::error::FetchError;
use crate::download::ytdlp_errors::{analyze_ytdlp_error, to_fetch_error};
use crate::download::MediaFetcher;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::process::Command;

/// Container extensions yt-dlp may leave on the printed name before the audio
/// post-processor renames the file.
const SOURCE_EXTENSIONS: &[&str] = &["webm", "m4a", "mp4", "opus", "ogg", "mkv"];

/// Output template, relative to the task's directory
const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Fetch backend that shells out to yt-dlp.
///
/// Runs without a time budget of its own; the pipeline's per-item timeout
/// drops the fetch and `kill_on_drop` ends the child.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    ytdl_bin: String,
    ffmpeg_location: Option<String>,
    audio: AudioSettings,
}

impl YtDlpFetcher {
    pub fn new(ytdl_bin: impl Into<String>, audio: AudioSettings) -> Self {
        Self {
            ytdl_bin: ytdl_bin.into(),
            ffmpeg_location: None,
            audio,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            ytdl_bin: config.ytdl_bin.clone(),
            ffmpeg_location: config.ffmpeg_location.clone(),
            audio: config.audio.clone(),
        }
    }

    /// Arguments for one audio fetch, URL last.
    pub fn build_args(&self, url: &str, output_dir: &Path) -> Vec<String> {
        let template = output_dir.join(OUTPUT_TEMPLATE);

        let mut args: Vec<String> = vec![
            "-f".into(),
            "bestaudio/best".into(),
            "-o".into(),
            template.to_string_lossy().into_owned(),
            "--no-playlist".into(),
            "--extract-audio".into(),
            "--audio-format".into(),
            self.audio.format.clone(),
            "--audio-quality".into(),
            self.audio.quality.clone(),
            "--concurrent-fragments".into(),
            self.audio.concurrent_fragments.to_string(),
            "--no-warnings".into(),
            "--quiet".into(),
            "--no-progress".into(),
            "--print".into(),
            "after_move:filepath".into(),
        ];

        if let Some(ref location) = self.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(location.clone());
        }

        // Keep a URL that starts with '-' from being read as an option.
        args.push("--".into());
        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn fetch(&self, identifier: &SourceIdentifier, output_dir: &Path) -> Result<PathBuf, FetchError> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| FetchError::Process(format!("Failed to create {}: {}", output_dir.display(), e)))?;

        let args = self.build_args(identifier.as_str(), output_dir);
        log::debug!("yt-dlp command: {} {}", self.ytdl_bin, args.join(" "));

        let mut cmd = Command::new(&self.ytdl_bin);
        cmd.args(&args);

        let output = run_captured(&mut cmd).await.map_err(|e| match e {
            FetchError::Process(msg) => FetchError::Process(format!("{} ({})", msg, self.ytdl_bin)),
            other => other,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let error_type = analyze_ytdlp_error(&stderr);
            log::debug!("yt-dlp stderr for {}: {}", identifier, stderr.trim());
            return Err(to_fetch_error(&error_type, &stderr));
        }

        resolve_output_path(&stdout, output_dir, &self.audio.format)
    }
}

/// Last non-empty stdout line, which is what `--print after_move:filepath` emits.
pub fn extract_printed_path(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .map(PathBuf::from)
}

/// Replace a known source container extension with the target audio one.
///
/// ```
/// use std::path::{Path, PathBuf};
/// use tapedeck::download::ytdlp::swap_to_audio_extension;
///
/// assert_eq!(
///     swap_to_audio_extension(Path::new("/tmp/Song1.webm"), "mp3"),
///     PathBuf::from("/tmp/Song1.mp3")
/// );
/// ```
pub fn swap_to_audio_extension(path: &Path, audio_format: &str) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if SOURCE_EXTENSIONS.contains(&ext.to_lowercase().as_str()) => path.with_extension(audio_format),
        _ => path.to_path_buf(),
    }
}

/// Work out where yt-dlp left the transcoded file.
///
/// Tries, in order: the printed path, the printed path with its container
/// extension swapped for the audio one, and the newest file with the audio
/// extension in `output_dir`. Each task owns its `output_dir`, so the last
/// step cannot pick up a sibling's file.
pub fn resolve_output_path(stdout: &str, output_dir: &Path, audio_format: &str) -> Result<PathBuf, FetchError> {
    if let Some(printed) = extract_printed_path(stdout) {
        let printed = if printed.is_absolute() {
            printed
        } else {
            output_dir.join(printed)
        };

        if printed.is_file() {
            return Ok(printed);
        }

        let swapped = swap_to_audio_extension(&printed, audio_format);
        if swapped.is_file() {
            return Ok(swapped);
        }

        log::warn!("yt-dlp printed {} but no such file exists", printed.display());
    }

    newest_with_extension(output_dir, audio_format).ok_or_else(|| {
        FetchError::FileNotFound(format!(
            "No .{} file found in {} after yt-dlp finished",
            audio_format,
            output_dir.display()
        ))
    })
}

fn newest_with_extension(dir: &Path, extension: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;

    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        })
        .max_by_key(|path| {
            std::fs::metadata(path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH)
        })
}
