use std::fmt;

/// Why a single fetch (resolve + download + transcode) failed.
///
/// Categorized so the batch can log and count failures per kind. A
/// `FetchError` never escapes the batch on its own; it is absorbed into a
/// `FetchOutcome::Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// yt-dlp exited with an error we could not classify further
    YtDlp(String),
    /// Video is private, removed, region-locked or otherwise gone
    Unavailable(String),
    /// No extractor understands the identifier
    Unsupported(String),
    /// Network failure (DNS, connection reset, socket timeout)
    Network(String),
    /// Source refused the request as automated
    BotDetection(String),
    /// FFmpeg post-processing (audio extraction / transcoding) failed
    Transcode(String),
    /// yt-dlp reported success but no output file could be found
    FileNotFound(String),
    /// The fetch exceeded its time budget
    Timeout(String),
    /// The external process could not be spawned or waited on
    Process(String),
    /// Catch-all for uncategorized errors
    Other(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for FetchError {}

impl FetchError {
    /// Returns subcategory for metrics
    pub fn subcategory(&self) -> &'static str {
        match self {
            FetchError::YtDlp(_) => "ytdlp",
            FetchError::Unavailable(_) => "unavailable",
            FetchError::Unsupported(_) => "unsupported",
            FetchError::Network(_) => "network",
            FetchError::BotDetection(_) => "bot_detection",
            FetchError::Transcode(_) => "transcode",
            FetchError::FileNotFound(_) => "file_not_found",
            FetchError::Timeout(_) => "timeout",
            FetchError::Process(_) => "process",
            FetchError::Other(_) => "other",
        }
    }

    /// Returns the inner message
    pub fn message(&self) -> &str {
        match self {
            FetchError::YtDlp(msg)
            | FetchError::Unavailable(msg)
            | FetchError::Unsupported(msg)
            | FetchError::Network(msg)
            | FetchError::BotDetection(msg)
            | FetchError::Transcode(msg)
            | FetchError::FileNotFound(msg)
            | FetchError::Timeout(msg)
            | FetchError::Process(msg)
            | FetchError::Other(msg) => msg,
        }
    }
}
