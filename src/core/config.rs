//! Runtime configuration
//!
//! Everything is read once from the environment (after `.env` has been loaded
//! by `main`) into a plain [`Config`] value that is passed down explicitly.

use crate::core::error::AppError;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound for the default worker count
pub const MAX_DEFAULT_WORKERS: usize = 32;

/// Workers per available CPU for the default worker count
pub const WORKERS_PER_CPU: usize = 5;

/// Default listen address for `serve`
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";

/// Default per-fetch time budget (10 minutes)
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 600;

/// Job directories older than this are swept at startup (1 hour)
pub const DEFAULT_STALE_JOB_SECS: u64 = 3600;

/// Name of the archive handed back to the client
pub const DEFAULT_ARCHIVE_NAME: &str = "downloaded_mp3s.zip";

/// Default worker pool size: `min(32, cores * 5)`.
///
/// Sized to bound concurrent outbound connections and concurrent ffmpeg
/// processes rather than to saturate the CPU.
pub fn default_max_workers() -> usize {
    let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    (cores * WORKERS_PER_CPU).min(MAX_DEFAULT_WORKERS)
}

/// Audio extraction settings passed to yt-dlp
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSettings {
    /// Target codec (`--audio-format`)
    pub format: String,
    /// Target quality (`--audio-quality`), e.g. `192K`
    pub quality: String,
    /// Fragments downloaded in parallel for DASH/HLS sources
    pub concurrent_fragments: u32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            format: "mp3".to_string(),
            quality: "192K".to_string(),
            concurrent_fragments: 5,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server listens on
    pub bind_addr: SocketAddr,
    /// yt-dlp binary (`YTDL_BIN`)
    pub ytdl_bin: String,
    /// Optional ffmpeg location forwarded to yt-dlp (`FFMPEG_LOCATION`)
    pub ffmpeg_location: Option<String>,
    /// Root under which each job gets its own directory
    pub work_dir: PathBuf,
    /// Worker pool size
    pub max_workers: usize,
    /// Time budget for one fetch
    pub fetch_timeout: Duration,
    /// Age after which leftover job directories are removed at startup
    pub stale_job_age: Duration,
    /// File name of the produced archive
    pub archive_name: String,
    pub audio: AudioSettings,
    /// Log file path
    pub log_file_path: String,
    /// Log level name (`error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            ytdl_bin: "yt-dlp".to_string(),
            ffmpeg_location: None,
            work_dir: env::temp_dir().join("tapedeck"),
            max_workers: default_max_workers(),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            stale_job_age: Duration::from_secs(DEFAULT_STALE_JOB_SECS),
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
            audio: AudioSettings::default(),
            log_file_path: "tapedeck.log".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Build the configuration from process environment variables.
    ///
    /// Unset variables fall back to [`Config::default`]. A variable that is
    /// set but cannot be parsed is an error rather than a silent default.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let bind_addr = match get("BIND_ADDR") {
            Some(raw) => parse_value("BIND_ADDR", &raw)?,
            None => defaults.bind_addr,
        };

        let max_workers = match get("MAX_WORKERS") {
            Some(raw) => {
                let n: usize = parse_value("MAX_WORKERS", &raw)?;
                if n == 0 {
                    return Err(AppError::Config("MAX_WORKERS must be at least 1".to_string()));
                }
                n
            }
            None => defaults.max_workers,
        };

        let fetch_timeout = match get("FETCH_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = parse_value("FETCH_TIMEOUT_SECS", &raw)?;
                if secs == 0 {
                    return Err(AppError::Config("FETCH_TIMEOUT_SECS must be at least 1".to_string()));
                }
                Duration::from_secs(secs)
            }
            None => defaults.fetch_timeout,
        };

        let stale_job_age = match get("STALE_JOB_SECS") {
            Some(raw) => Duration::from_secs(parse_value("STALE_JOB_SECS", &raw)?),
            None => defaults.stale_job_age,
        };

        let concurrent_fragments = match get("CONCURRENT_FRAGMENTS") {
            Some(raw) => parse_value("CONCURRENT_FRAGMENTS", &raw)?,
            None => defaults.audio.concurrent_fragments,
        };

        let work_dir = get("WORK_DIR")
            .map(|raw| PathBuf::from(shellexpand::tilde(&raw).into_owned()))
            .unwrap_or(defaults.work_dir);

        Ok(Self {
            bind_addr,
            ytdl_bin: get("YTDL_BIN").unwrap_or(defaults.ytdl_bin),
            ffmpeg_location: get("FFMPEG_LOCATION").map(|raw| shellexpand::tilde(&raw).into_owned()),
            work_dir,
            max_workers,
            fetch_timeout,
            stale_job_age,
            archive_name: get("ARCHIVE_NAME").unwrap_or(defaults.archive_name),
            audio: AudioSettings {
                format: get("AUDIO_FORMAT").unwrap_or(defaults.audio.format),
                quality: get("AUDIO_QUALITY").unwrap_or(defaults.audio.quality),
                concurrent_fragments,
            },
            log_file_path: get("LOG_FILE_PATH").unwrap_or(defaults.log_file_path),
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| AppError::Config(format!("{} has invalid value {:?}: {}", key, raw, e)))
}
