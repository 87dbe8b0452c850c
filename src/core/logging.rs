//! Logging initialization and tooling checks
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - Startup diagnostics for the external binaries the fetcher shells out to

use anyhow::Result;
use simplelog::{ColorChoice, CombinedLogger, LevelFilter, TermLogger, TerminalMode, WriteLogger};
use std::fs::File;
use std::process::{Command, Stdio};

use crate::core::config::Config;

/// Parse a level name, falling back to `Info` for anything unknown.
pub fn parse_level(level: &str) -> LevelFilter {
    level.trim().parse::<LevelFilter>().unwrap_or(LevelFilter::Info)
}

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
/// * `level` - Level name, e.g. `info` or `debug`
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to create the file or a logger is already set
pub fn init_logger(log_file_path: &str, level: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;
    let level = parse_level(level);

    CombinedLogger::init(vec![
        TermLogger::new(level, simplelog::Config::default(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(level, simplelog::Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Run `<bin> <version_arg>` and return the first output line.
fn probe_version(bin: &str, version_arg: &str) -> Option<String> {
    let output = Command::new(bin)
        .arg(version_arg)
        .stdin(Stdio::null())
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|l| l.trim().to_string())
}

/// Logs which external tools are available at application startup
///
/// Validates and logs:
/// - the yt-dlp binary (`YTDL_BIN`)
/// - ffmpeg, either at `FFMPEG_LOCATION` or on `PATH`
///
/// Missing tools are logged, not fatal: every fetch would fail, which the
/// batch already reports as "No valid MP3 files were downloaded".
pub fn log_tooling_configuration(config: &Config) {
    log::info!("Tooling check");

    match probe_version(&config.ytdl_bin, "--version") {
        Some(version) => log::info!("yt-dlp: {} ({})", config.ytdl_bin, version),
        None => {
            log::error!("yt-dlp: {} (NOT FOUND or not runnable)", config.ytdl_bin);
            log::error!("   Every download will fail. Install yt-dlp or set YTDL_BIN.");
        }
    }

    let ffmpeg_bin = match config.ffmpeg_location.as_deref() {
        Some(location) if std::path::Path::new(location).is_dir() => {
            std::path::Path::new(location).join("ffmpeg").to_string_lossy().into_owned()
        }
        Some(location) => location.to_string(),
        None => "ffmpeg".to_string(),
    };

    match probe_version(&ffmpeg_bin, "-version") {
        Some(version) => log::info!("ffmpeg: {}", version),
        None => {
            log::error!("ffmpeg: {} (NOT FOUND)", ffmpeg_bin);
            log::error!("   yt-dlp cannot transcode to {} without it.", config.audio.format);
        }
    }

    log::info!(
        "Workers: {}, fetch timeout: {}s, work dir: {}",
        config.max_workers,
        config.fetch_timeout.as_secs(),
        config.work_dir.display()
    );
}
