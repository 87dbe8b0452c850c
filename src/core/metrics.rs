//! Prometheus metrics for fetches and batches
//!
//! Registered lazily in the default registry and exposed at `/metrics`.

// Registration only fails on duplicate names, which is a programming error.
#![allow(clippy::expect_used)]

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter_vec, Encoder, Histogram, IntCounterVec, TextEncoder,
};
use std::time::Duration;

/// Fetch outcomes
/// Labels: outcome (success/failure)
pub static FETCH_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!("tapedeck_fetch_total", "Fetches finished, by outcome", &["outcome"])
        .expect("tapedeck_fetch_total registers")
});

/// Failed fetches
/// Labels: error_type (FetchError::subcategory)
pub static FETCH_FAILURE_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tapedeck_fetch_failure_total",
        "Failed fetches, by error category",
        &["error_type"]
    )
    .expect("tapedeck_fetch_failure_total registers")
});

/// Time spent in one fetch (download + transcode)
pub static FETCH_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "tapedeck_fetch_duration_seconds",
        "Time spent fetching one item",
        vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]
    )
    .expect("tapedeck_fetch_duration_seconds registers")
});

/// Batches finished
/// Labels: result (archived, or a BatchError label)
pub static BATCH_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!("tapedeck_batch_total", "Batches finished, by result", &["result"])
        .expect("tapedeck_batch_total registers")
});

/// Wall time of a whole batch
pub static BATCH_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "tapedeck_batch_duration_seconds",
        "Time from request to archive",
        vec![1.0, 10.0, 30.0, 60.0, 180.0, 600.0, 1800.0]
    )
    .expect("tapedeck_batch_duration_seconds registers")
});

/// Entries per produced archive
pub static ARCHIVE_ENTRIES: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "tapedeck_archive_entries",
        "Number of files per produced archive",
        vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]
    )
    .expect("tapedeck_archive_entries registers")
});

/// Record a successful fetch
pub fn record_fetch_success(elapsed: Duration) {
    FETCH_TOTAL.with_label_values(&["success"]).inc();
    FETCH_DURATION_SECONDS.observe(elapsed.as_secs_f64());
}

/// Record a failed fetch with its error category
pub fn record_fetch_failure(error_type: &str, elapsed: Duration) {
    FETCH_TOTAL.with_label_values(&["failure"]).inc();
    FETCH_FAILURE_TOTAL.with_label_values(&[error_type]).inc();
    FETCH_DURATION_SECONDS.observe(elapsed.as_secs_f64());
}

/// Record a finished batch
pub fn record_batch(result: &str, elapsed: Duration) {
    BATCH_TOTAL.with_label_values(&[result]).inc();
    BATCH_DURATION_SECONDS.observe(elapsed.as_secs_f64());
}

/// Record the size of a produced archive
pub fn record_archive_entries(count: usize) {
    ARCHIVE_ENTRIES.observe(count as f64);
}

/// Touch every metric so it shows up in the first scrape.
pub fn init_metrics() {
    Lazy::force(&FETCH_TOTAL);
    Lazy::force(&FETCH_FAILURE_TOTAL);
    Lazy::force(&FETCH_DURATION_SECONDS);
    Lazy::force(&BATCH_TOTAL);
    Lazy::force(&BATCH_DURATION_SECONDS);
    Lazy::force(&ARCHIVE_ENTRIES);
}

/// Encode the default registry in the text exposition format.
///
/// Returns the content type together with the encoded body.
pub fn render() -> Result<(String, Vec<u8>), prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok((encoder.format_type().to_string(), buffer))
}
