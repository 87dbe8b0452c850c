//! yt-dlp stderr analysis
//!
//! yt-dlp reports everything through free-form stderr text. This module maps
//! that text onto a small set of error kinds so the fetcher can turn a failed
//! run into a categorized `FetchError`.

use crate::download::error::FetchError;

/// Kinds of yt-dlp failure we distinguish
#[derive(Debug, Clone, PartialEq)]
pub enum YtDlpErrorType {
    /// Video is private, removed or region-locked
    VideoUnavailable,
    /// No extractor matched the URL
    UnsupportedUrl,
    /// The source flagged us as a bot
    BotDetection,
    /// Timeouts, refused connections, DNS
    NetworkError,
    /// ffmpeg/ffprobe missing or the audio post-processor failed
    PostprocessingError,
    /// Anything else
    Unknown,
}

/// Classify yt-dlp stderr output
pub fn analyze_ytdlp_error(stderr: &str) -> YtDlpErrorType {
    let stderr_lower = stderr.to_lowercase();

    if stderr_lower.contains("unsupported url")
        || stderr_lower.contains("is not a valid url")
        || stderr_lower.contains("no video formats found")
    {
        return YtDlpErrorType::UnsupportedUrl;
    }

    if stderr_lower.contains("private video")
        || stderr_lower.contains("video unavailable")
        || stderr_lower.contains("this video is not available")
        || stderr_lower.contains("video is private")
        || stderr_lower.contains("video has been removed")
        || stderr_lower.contains("this video does not exist")
        || stderr_lower.contains("video is not available")
    {
        return YtDlpErrorType::VideoUnavailable;
    }

    if stderr_lower.contains("sign in to confirm you're not a bot")
        || stderr_lower.contains("bot detection")
        || stderr_lower.contains("http error 403")
        || stderr_lower.contains("http error 429")
    {
        return YtDlpErrorType::BotDetection;
    }

    // Checked before network: "ffprobe not found" mentions neither, but
    // "postprocessing: ... connection" would otherwise read as network.
    if stderr_lower.contains("postprocessing")
        || stderr_lower.contains("ffmpeg not found")
        || stderr_lower.contains("ffprobe and ffmpeg not found")
        || stderr_lower.contains("audio conversion failed")
        || stderr_lower.contains("error opening output")
    {
        return YtDlpErrorType::PostprocessingError;
    }

    if stderr_lower.contains("timeout")
        || stderr_lower.contains("timed out")
        || stderr_lower.contains("connection")
        || stderr_lower.contains("network")
        || stderr_lower.contains("socket")
        || stderr_lower.contains("name or service not known")
        || stderr_lower.contains("failed to resolve")
    {
        return YtDlpErrorType::NetworkError;
    }

    YtDlpErrorType::Unknown
}

/// Build a categorized `FetchError` from a failed yt-dlp run.
///
/// Keeps the last meaningful stderr line as the message; the full text goes
/// to the debug log at the call site.
pub fn to_fetch_error(error_type: &YtDlpErrorType, stderr: &str) -> FetchError {
    let detail = last_error_line(stderr).unwrap_or_else(|| "yt-dlp exited with an error".to_string());

    match error_type {
        YtDlpErrorType::VideoUnavailable => FetchError::Unavailable(detail),
        YtDlpErrorType::UnsupportedUrl => FetchError::Unsupported(detail),
        YtDlpErrorType::BotDetection => FetchError::BotDetection(detail),
        YtDlpErrorType::NetworkError => FetchError::Network(detail),
        YtDlpErrorType::PostprocessingError => FetchError::Transcode(detail),
        YtDlpErrorType::Unknown => FetchError::YtDlp(detail),
    }
}

/// Last line starting with `ERROR:`, or the last non-empty line.
fn last_error_line(stderr: &str) -> Option<String> {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .map(|l| l.to_string())
}
