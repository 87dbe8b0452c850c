//! yt-dlp progress line parsing
//!
//! Used by the `video` subcommand, which runs yt-dlp with `--newline` and
//! reports progress as it goes. The batch endpoint does not report progress.

/// Progress of one yt-dlp download
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressInfo {
    pub percent: u8,
    pub speed_mbs: Option<f64>,
    pub eta_seconds: Option<u64>,
    pub current_size: Option<u64>,
    pub total_size: Option<u64>,
}

/// Parses progress from yt-dlp output line
/// Example: "[download]  45.2% of 10.00MiB at 500.00KiB/s ETA 00:10"
pub fn parse_progress(line: &str) -> Option<ProgressInfo> {
    if !line.contains("[download]") || !line.contains('%') {
        return None;
    }

    let mut percent = None;
    let mut speed_mbs = None;
    let mut eta_seconds = None;
    let mut total_size = None;

    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if part.ends_with('%') {
            if let Ok(p) = part.trim_end_matches('%').parse::<f32>() {
                percent = Some(p.clamp(0.0, 100.0) as u8);
            }
        }

        // "of 10.00MiB" or "of ~10.00MiB" for estimated sizes
        if *part == "of" && i + 1 < parts.len() {
            if let Some(size_bytes) = parse_size(parts[i + 1].trim_start_matches('~')) {
                total_size = Some(size_bytes);
            }
        }

        // "at 500.00KiB/s" or "at 2.3MiB/s"
        if *part == "at" && i + 1 < parts.len() {
            if let Some(speed) = parse_size(parts[i + 1]) {
                speed_mbs = Some(speed as f64 / (1024.0 * 1024.0));
            }
        }

        // "ETA 00:10" or "ETA 1:02:03"
        if *part == "ETA" && i + 1 < parts.len() {
            eta_seconds = parse_eta(parts[i + 1]);
        }
    }

    let percent = percent?;
    let current_size = total_size.map(|total| (total as f64 * (percent as f64 / 100.0)) as u64);

    Some(ProgressInfo {
        percent,
        speed_mbs,
        eta_seconds,
        current_size,
        total_size,
    })
}

/// Parse "10.00MiB", "500.00KiB/s" or "1.2GiB" into bytes
fn parse_size(size_str: &str) -> Option<u64> {
    let size_str = size_str.trim_end_matches("/s");
    let (number, multiplier) = if let Some(n) = size_str.strip_suffix("GiB") {
        (n, 1024.0 * 1024.0 * 1024.0)
    } else if let Some(n) = size_str.strip_suffix("MiB") {
        (n, 1024.0 * 1024.0)
    } else if let Some(n) = size_str.strip_suffix("KiB") {
        (n, 1024.0)
    } else if let Some(n) = size_str.strip_suffix('B') {
        (n, 1.0)
    } else {
        return None;
    };

    number.parse::<f64>().ok().map(|v| (v * multiplier) as u64)
}

/// Parse "00:10", "1:23" or "1:02:03" into seconds
fn parse_eta(eta_str: &str) -> Option<u64> {
    let mut total = 0u64;
    let mut fields = 0;
    for field in eta_str.split(':') {
        total = total * 60 + field.parse::<u64>().ok()?;
        fields += 1;
    }
    (2..=3).contains(&fields).then_some(total)
}
